pub mod poi_visits;
pub mod simple_events;
pub mod tracking_events;
pub mod view_events;
pub mod vr_sessions;

pub mod prelude {
    pub use super::poi_visits::Entity as PoiVisits;
    pub use super::simple_events::Entity as SimpleEvents;
    pub use super::tracking_events::Entity as TrackingEvents;
    pub use super::view_events::Entity as ViewEvents;
    pub use super::vr_sessions::Entity as VrSessions;
}
