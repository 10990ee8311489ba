//! Payload shape classification
//!
//! The universal endpoint receives loosely structured JSON objects. Which
//! record they describe is decided by the key combinations present, walking an
//! ordered rule list where the first match wins. Classification is total:
//! every payload maps to exactly one [`ClassifiedRecord`], with
//! [`ClassifiedRecord::Rejected`] covering everything that cannot be stored.

use std::fmt;
use std::str::FromStr;

use nexero_core::UtcDateTime;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::normalize::{parse_duration, parse_timestamp};
use crate::types::{Position, Rotation, TrackingBatchRequest, TrackingEventRequest};

pub type Payload = Map<String, Value>;

/// How payloads matching none of the known shapes are treated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClassificationPolicy {
    /// Exact key pairs required, anything else is rejected
    #[default]
    Strict,
    /// Any single marker key is enough, unknown shapes become generic events
    Lenient,
}

impl ClassificationPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Strict => "strict",
            Self::Lenient => "lenient",
        }
    }

    fn rules(&self) -> &'static [Rule] {
        match self {
            Self::Strict => STRICT_RULES,
            Self::Lenient => LENIENT_RULES,
        }
    }
}

impl fmt::Display for ClassificationPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ClassificationPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "strict" => Ok(Self::Strict),
            "lenient" => Ok(Self::Lenient),
            other => Err(format!(
                "unknown classification policy '{}', expected 'strict' or 'lenient'",
                other
            )),
        }
    }
}

/// Shapes the strict policy accepts, as reported to clients
pub const UNKNOWN_SHAPE_DETAIL: &str = "Data must contain either: (session_start + session_end), (Parent + POI_Duration), or (View + TotalDuration)";

/// Why a payload cannot be stored
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Rejection {
    #[error("unrecognised payload shape, received keys: [{}]", .received_keys.join(", "))]
    UnknownShape { received_keys: Vec<String> },

    #[error("field '{field}' must be {expected}")]
    InvalidField {
        field: String,
        expected: &'static str,
    },

    #[error("{field} is required")]
    MissingField { field: &'static str },
}

impl Rejection {
    fn invalid(field: &str, expected: &'static str) -> Self {
        Self::InvalidField {
            field: field.to_string(),
            expected,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SessionRecord {
    pub started_at: UtcDateTime,
    pub ended_at: UtcDateTime,
    pub customer_id: Option<String>,
    pub property_id: Option<String>,
}

impl SessionRecord {
    /// Whole seconds between start and end
    pub fn duration_seconds(&self) -> i64 {
        (self.ended_at - self.started_at).num_seconds()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PoiRecord {
    pub poi: String,
    pub parent: String,
    /// Duration as the client sent it
    pub duration: String,
    pub duration_seconds: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ViewRecord {
    pub view: String,
    pub duration: String,
    pub duration_seconds: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GenericEvent {
    pub event_type: String,
    pub payload: Payload,
}

/// A tracking event with its session resolved
#[derive(Debug, Clone, PartialEq)]
pub struct TrackingEvent {
    pub session_id: String,
    pub event_type: String,
    pub timestamp: Option<Value>,
    pub zone_name: Option<String>,
    pub object_name: Option<String>,
    pub gaze_target: Option<String>,
    pub interaction_type: Option<String>,
    pub dwell_time_ms: Option<i64>,
    pub position: Option<Position>,
    pub rotation: Option<Rotation>,
    pub metadata: Payload,
    /// Keys the client sent that have no column of their own
    pub extra: Payload,
}

impl TrackingEvent {
    /// Resolve the session id, falling back to the one inherited from a batch.
    pub fn from_request(
        request: TrackingEventRequest,
        inherited_session_id: Option<&str>,
    ) -> Result<Self, Rejection> {
        let session_id = request
            .session_id
            .filter(|id| !id.trim().is_empty())
            .or_else(|| {
                inherited_session_id
                    .filter(|id| !id.trim().is_empty())
                    .map(str::to_string)
            })
            .ok_or(Rejection::MissingField { field: "session_id" })?;

        if request.event_type.trim().is_empty() {
            return Err(Rejection::MissingField { field: "event_type" });
        }

        // tracking_events.timestamp is a typed column
        if let Some(timestamp) = request.timestamp.as_ref().filter(|v| !v.is_null()) {
            if parse_timestamp(timestamp).is_none() {
                return Err(Rejection::invalid(
                    "timestamp",
                    "a Unix epoch or ISO 8601 timestamp",
                ));
            }
        }

        Ok(Self {
            session_id,
            event_type: request.event_type,
            timestamp: request.timestamp,
            zone_name: request.zone_name,
            object_name: request.object_name,
            gaze_target: request.gaze_target,
            interaction_type: request.interaction_type,
            dwell_time_ms: request.dwell_time_ms,
            position: request.position,
            rotation: request.rotation,
            metadata: request.metadata,
            extra: request.extra,
        })
    }

    /// Parse one raw batch entry.
    pub fn from_value(
        value: Value,
        inherited_session_id: Option<&str>,
    ) -> Result<Self, Rejection> {
        let request: TrackingEventRequest = serde_json::from_value(value)
            .map_err(|_| Rejection::invalid("event", "a tracking event object"))?;
        Self::from_request(request, inherited_session_id)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrackingBatch {
    pub session_id: String,
    pub sent_at: Option<Value>,
    /// One entry per submitted event, in order; malformed ones carry their rejection
    pub events: Vec<Result<TrackingEvent, Rejection>>,
}

impl TrackingBatch {
    pub fn from_request(request: TrackingBatchRequest) -> Result<Self, Rejection> {
        let session_id = request.session_id.trim().to_string();
        if session_id.is_empty() {
            return Err(Rejection::MissingField { field: "session_id" });
        }

        let events = request
            .events
            .into_iter()
            .enumerate()
            .map(|(index, value)| {
                TrackingEvent::from_value(value, Some(&session_id)).map_err(|rejection| {
                    match rejection {
                        Rejection::InvalidField { field, expected } => Rejection::InvalidField {
                            field: if field == "event" {
                                format!("events[{}]", index)
                            } else {
                                format!("events[{}].{}", index, field)
                            },
                            expected,
                        },
                        other => other,
                    }
                })
            })
            .collect();

        Ok(Self {
            session_id,
            sent_at: request.sent_at,
            events,
        })
    }

    pub fn total(&self) -> usize {
        self.events.len()
    }

    pub fn malformed(&self) -> usize {
        self.events.iter().filter(|event| event.is_err()).count()
    }
}

/// Result of classifying a payload
#[derive(Debug, Clone, PartialEq)]
pub enum ClassifiedRecord {
    Session(SessionRecord),
    Poi(PoiRecord),
    View(ViewRecord),
    Generic(GenericEvent),
    TrackingEvent(TrackingEvent),
    TrackingBatch(TrackingBatch),
    Rejected(Rejection),
}

impl ClassifiedRecord {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Session(_) => "session",
            Self::Poi(_) => "poi",
            Self::View(_) => "view",
            Self::Generic(_) => "generic",
            Self::TrackingEvent(_) => "tracking_event",
            Self::TrackingBatch(_) => "tracking_batch",
            Self::Rejected(_) => "rejected",
        }
    }
}

impl From<TrackingEvent> for ClassifiedRecord {
    fn from(event: TrackingEvent) -> Self {
        Self::TrackingEvent(event)
    }
}

impl From<TrackingBatch> for ClassifiedRecord {
    fn from(batch: TrackingBatch) -> Self {
        Self::TrackingBatch(batch)
    }
}

impl From<Rejection> for ClassifiedRecord {
    fn from(rejection: Rejection) -> Self {
        Self::Rejected(rejection)
    }
}

/// Decide which record a universal-endpoint payload describes.
pub fn classify(payload: &Payload, policy: ClassificationPolicy) -> ClassifiedRecord {
    policy
        .rules()
        .iter()
        .find(|rule| (rule.applies)(payload))
        .map(|rule| (rule.build)(payload).unwrap_or_else(ClassifiedRecord::Rejected))
        .unwrap_or_else(|| {
            let mut received_keys: Vec<String> = payload.keys().cloned().collect();
            received_keys.sort();
            ClassifiedRecord::Rejected(Rejection::UnknownShape { received_keys })
        })
}

struct Rule {
    applies: fn(&Payload) -> bool,
    build: fn(&Payload) -> Result<ClassifiedRecord, Rejection>,
}

const SESSION_KEYS: [&str; 2] = ["session_start", "session_end"];
const POI_PAIR: [&str; 2] = ["Parent", "POI_Duration"];
const VIEW_PAIR: [&str; 2] = ["View", "TotalDuration"];
const POI_MARKERS: [&str; 3] = ["POI", "Parent", "POI_Duration"];

static STRICT_RULES: &[Rule] = &[
    Rule {
        applies: is_session,
        build: session_record,
    },
    Rule {
        applies: is_strict_poi,
        build: poi_record,
    },
    Rule {
        applies: is_strict_view,
        build: view_record,
    },
];

static LENIENT_RULES: &[Rule] = &[
    Rule {
        applies: is_session,
        build: session_record,
    },
    Rule {
        applies: is_lenient_poi,
        build: poi_record,
    },
    Rule {
        applies: is_lenient_view,
        build: view_record,
    },
    Rule {
        applies: always,
        build: generic_event,
    },
];

fn has_all(payload: &Payload, keys: &[&str]) -> bool {
    keys.iter().all(|key| payload.contains_key(*key))
}

fn has_any(payload: &Payload, keys: &[&str]) -> bool {
    keys.iter().any(|key| payload.contains_key(*key))
}

fn is_session(payload: &Payload) -> bool {
    has_all(payload, &SESSION_KEYS)
}

fn is_strict_poi(payload: &Payload) -> bool {
    has_all(payload, &POI_PAIR)
}

fn is_strict_view(payload: &Payload) -> bool {
    has_all(payload, &VIEW_PAIR)
}

fn is_lenient_poi(payload: &Payload) -> bool {
    has_any(payload, &POI_MARKERS)
}

fn is_lenient_view(payload: &Payload) -> bool {
    has_any(payload, &VIEW_PAIR)
}

fn always(_: &Payload) -> bool {
    true
}

fn session_record(payload: &Payload) -> Result<ClassifiedRecord, Rejection> {
    Ok(ClassifiedRecord::Session(SessionRecord {
        started_at: instant(payload, "session_start")?,
        ended_at: instant(payload, "session_end")?,
        customer_id: optional_id(payload, "customer_id")?,
        property_id: optional_id(payload, "property_id")?,
    }))
}

fn poi_record(payload: &Payload) -> Result<ClassifiedRecord, Rejection> {
    let duration = text(payload, "POI_Duration")?.unwrap_or_default();
    Ok(ClassifiedRecord::Poi(PoiRecord {
        poi: optional_id(payload, "POI")?.unwrap_or_default(),
        parent: text(payload, "Parent")?.unwrap_or_default(),
        duration_seconds: parse_duration(&duration),
        duration,
    }))
}

fn view_record(payload: &Payload) -> Result<ClassifiedRecord, Rejection> {
    let duration = text(payload, "TotalDuration")?.unwrap_or_default();
    Ok(ClassifiedRecord::View(ViewRecord {
        view: text(payload, "View")?.unwrap_or_default(),
        duration_seconds: parse_duration(&duration),
        duration,
    }))
}

fn generic_event(payload: &Payload) -> Result<ClassifiedRecord, Rejection> {
    let event_type = payload
        .get("event_type")
        .and_then(Value::as_str)
        .filter(|event_type| !event_type.is_empty())
        .unwrap_or("Generic")
        .to_string();

    Ok(ClassifiedRecord::Generic(GenericEvent {
        event_type,
        payload: payload.clone(),
    }))
}

/// Strings as-is, numbers as their text; absent is `None`.
fn text(payload: &Payload, field: &str) -> Result<Option<String>, Rejection> {
    match payload.get(field) {
        None => Ok(None),
        Some(Value::String(value)) => Ok(Some(value.clone())),
        Some(Value::Number(value)) => Ok(Some(value.to_string())),
        Some(_) => Err(Rejection::invalid(field, "text or a number")),
    }
}

/// Like [`text`], but `null` reads as absent.
fn optional_id(payload: &Payload, field: &str) -> Result<Option<String>, Rejection> {
    match payload.get(field) {
        Some(Value::Null) => Ok(None),
        _ => text(payload, field),
    }
}

fn instant(payload: &Payload, field: &str) -> Result<UtcDateTime, Rejection> {
    payload
        .get(field)
        .and_then(parse_timestamp)
        .ok_or_else(|| Rejection::invalid(field, "epoch seconds or an ISO 8601 timestamp"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn payload(value: Value) -> Payload {
        match value {
            Value::Object(map) => map,
            other => panic!("expected an object, got {}", other),
        }
    }

    fn strict(value: Value) -> ClassifiedRecord {
        classify(&payload(value), ClassificationPolicy::Strict)
    }

    fn lenient(value: Value) -> ClassifiedRecord {
        classify(&payload(value), ClassificationPolicy::Lenient)
    }

    #[test]
    fn test_session_payload() {
        let record = strict(json!({
            "session_start": 1700000000,
            "session_end": 1700000300,
            "customer_id": "c1"
        }));

        let ClassifiedRecord::Session(session) = record else {
            panic!("expected a session, got {:?}", record);
        };
        assert_eq!(session.duration_seconds(), 300);
        assert_eq!(session.started_at.to_rfc3339(), "2023-11-14T22:13:20+00:00");
        assert_eq!(session.customer_id.as_deref(), Some("c1"));
        assert_eq!(session.property_id, None);
    }

    #[test]
    fn test_session_accepts_mixed_encodings() {
        let record = strict(json!({
            "session_start": "1700000000",
            "session_end": "2023-11-14T22:15:00Z",
            "customer_id": null,
            "property_id": 42
        }));

        let ClassifiedRecord::Session(session) = record else {
            panic!("expected a session, got {:?}", record);
        };
        assert_eq!(session.duration_seconds(), 100);
        assert_eq!(session.customer_id, None);
        assert_eq!(session.property_id.as_deref(), Some("42"));
    }

    #[test]
    fn test_session_wins_over_other_shapes() {
        let record = strict(json!({
            "session_start": 1700000000,
            "session_end": 1700000060,
            "Parent": "Unit_A",
            "POI_Duration": "0:45",
            "View": "Balcony",
            "TotalDuration": "1:00",
            "unexpected": true
        }));
        assert_eq!(record.kind(), "session");
    }

    #[test]
    fn test_unparseable_session_timestamp_is_invalid_field() {
        let record = strict(json!({
            "session_start": "whenever",
            "session_end": 1700000300
        }));
        assert_eq!(
            record,
            ClassifiedRecord::Rejected(Rejection::InvalidField {
                field: "session_start".to_string(),
                expected: "epoch seconds or an ISO 8601 timestamp",
            })
        );
    }

    #[test]
    fn test_poi_payload() {
        let record = strict(json!({"Parent": "Unit_A", "POI": "Kitchen", "POI_Duration": "0:45"}));
        assert_eq!(
            record,
            ClassifiedRecord::Poi(PoiRecord {
                poi: "Kitchen".to_string(),
                parent: "Unit_A".to_string(),
                duration: "0:45".to_string(),
                duration_seconds: 45,
            })
        );
    }

    #[test]
    fn test_poi_name_may_be_absent() {
        let ClassifiedRecord::Poi(poi) = strict(json!({"Parent": "Lobby", "POI_Duration": "1:30"}))
        else {
            panic!("expected a poi");
        };
        assert_eq!(poi.poi, "");
        assert_eq!(poi.duration_seconds, 90);
    }

    #[test]
    fn test_view_payload() {
        let record = strict(json!({"View": "Balcony", "TotalDuration": 75}));
        assert_eq!(
            record,
            ClassifiedRecord::View(ViewRecord {
                view: "Balcony".to_string(),
                duration: "75".to_string(),
                duration_seconds: 75,
            })
        );
    }

    #[test]
    fn test_wrong_field_type_is_invalid_field() {
        let record = strict(json!({"Parent": ["Unit_A"], "POI_Duration": "0:45"}));
        assert!(matches!(
            record,
            ClassifiedRecord::Rejected(Rejection::InvalidField { ref field, .. }) if field == "Parent"
        ));
    }

    #[test]
    fn test_strict_rejects_unknown_shape_with_sorted_keys() {
        assert_eq!(
            strict(json!({"random_field": "x"})),
            ClassifiedRecord::Rejected(Rejection::UnknownShape {
                received_keys: vec!["random_field".to_string()],
            })
        );

        let ClassifiedRecord::Rejected(Rejection::UnknownShape { received_keys }) =
            strict(json!({"zeta": 1, "POI": "Kitchen", "alpha": 2}))
        else {
            panic!("expected rejection");
        };
        assert_eq!(received_keys, vec!["POI", "alpha", "zeta"]);
    }

    #[test]
    fn test_lenient_single_markers() {
        assert_eq!(lenient(json!({"POI": "Kitchen"})).kind(), "poi");
        assert_eq!(lenient(json!({"Parent": "Unit_A"})).kind(), "poi");
        assert_eq!(lenient(json!({"TotalDuration": "0:10"})).kind(), "view");
        assert_eq!(lenient(json!({"View": "Garden"})).kind(), "view");
    }

    #[test]
    fn test_lenient_generic_fallback() {
        let record = lenient(json!({"event_type": "Menu_Open", "menu": "main"}));
        let ClassifiedRecord::Generic(event) = record else {
            panic!("expected a generic event");
        };
        assert_eq!(event.event_type, "Menu_Open");
        assert_eq!(event.payload.get("menu"), Some(&json!("main")));

        let ClassifiedRecord::Generic(event) = lenient(json!({"event_type": 7})) else {
            panic!("expected a generic event");
        };
        assert_eq!(event.event_type, "Generic");

        assert_eq!(lenient(json!({})).kind(), "generic");
    }

    #[test]
    fn test_classification_is_total() {
        let samples = vec![
            json!({}),
            json!({"session_start": null, "session_end": null}),
            json!({"Parent": null, "POI_Duration": null}),
            json!({"View": {}, "TotalDuration": []}),
            json!({"session_start": 1e300, "session_end": -1e300}),
            json!({"POI_Duration": "9:99:99"}),
        ];

        for sample in samples {
            for policy in [ClassificationPolicy::Strict, ClassificationPolicy::Lenient] {
                let record = classify(&payload(sample.clone()), policy);
                assert!(!record.kind().is_empty());
            }
        }
    }

    #[test]
    fn test_policy_from_str() {
        assert_eq!(
            "Lenient".parse::<ClassificationPolicy>(),
            Ok(ClassificationPolicy::Lenient)
        );
        assert_eq!(ClassificationPolicy::default(), ClassificationPolicy::Strict);
        assert!("loose".parse::<ClassificationPolicy>().is_err());
    }

    #[test]
    fn test_tracking_event_inherits_batch_session() {
        let event = TrackingEvent::from_value(
            json!({"event_type": "gaze", "zone_name": "kitchen", "heat": "high"}),
            Some("s-1"),
        )
        .unwrap();
        assert_eq!(event.session_id, "s-1");
        assert_eq!(event.extra.get("heat"), Some(&json!("high")));

        let own = TrackingEvent::from_value(
            json!({"event_type": "gaze", "session_id": "s-2"}),
            Some("s-1"),
        )
        .unwrap();
        assert_eq!(own.session_id, "s-2");
        assert_eq!(ClassifiedRecord::from(own).kind(), "tracking_event");
    }

    #[test]
    fn test_tracking_event_requires_session() {
        let err = TrackingEvent::from_value(json!({"event_type": "gaze", "session_id": ""}), None)
            .unwrap_err();
        assert_eq!(err, Rejection::MissingField { field: "session_id" });
        assert_eq!(err.to_string(), "session_id is required");
    }

    #[test]
    fn test_tracking_event_rejects_unparseable_timestamp() {
        let err = TrackingEvent::from_value(
            json!({"event_type": "gaze", "timestamp": "yesterday"}),
            Some("s-1"),
        )
        .unwrap_err();
        assert!(matches!(
            &err,
            Rejection::InvalidField { field, .. } if field == "timestamp"
        ));

        for timestamp in [json!(null), json!(1700000000), json!("2023-11-14T22:13:20Z")] {
            assert!(TrackingEvent::from_value(
                json!({"event_type": "gaze", "timestamp": timestamp}),
                Some("s-1"),
            )
            .is_ok());
        }
    }

    #[test]
    fn test_batch_counts_malformed_entries() {
        let request: TrackingBatchRequest = serde_json::from_value(json!({
            "session_id": "s-1",
            "sent_at": 1727654100.5,
            "events": [
                {"event_type": "gaze"},
                "not an event",
                {"zone_name": "kitchen"},
                {"event_type": "zone_enter", "position": {"x": 1.0, "y": 2.0, "z": 3.0}},
                {"event_type": "gaze", "timestamp": "later"}
            ]
        }))
        .unwrap();

        let batch = TrackingBatch::from_request(request).unwrap();
        assert_eq!(batch.total(), 5);
        assert_eq!(batch.malformed(), 3);
        assert!(matches!(
            &batch.events[1],
            Err(Rejection::InvalidField { field, .. }) if field == "events[1]"
        ));
        assert!(matches!(
            &batch.events[4],
            Err(Rejection::InvalidField { field, .. }) if field == "events[4].timestamp"
        ));
        assert_eq!(ClassifiedRecord::from(batch).kind(), "tracking_batch");
    }
}
