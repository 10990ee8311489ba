//! Shared date/time types

use chrono::{DateTime as ChronoDateTime, NaiveDateTime, Utc};

/// Datetime type of every `TIMESTAMPTZ` column.
pub type DBDateTime = ChronoDateTime<Utc>;

/// Standard UTC datetime used in API responses and services.
///
/// When used in a `ToSchema` type, annotate the field with
/// `#[schema(value_type = String, format = DateTime)]`.
pub type UtcDateTime = ChronoDateTime<Utc>;

/// Parse an ISO 8601 instant, assuming UTC when no offset is given.
///
/// Accepts `2024-01-15T14:30:00Z`, `2024-01-15T14:30:00+02:00`,
/// `2024-01-15T14:30:00` and `2024-01-15T14:30:00.125`.
pub fn parse_iso_datetime(input: &str) -> Option<UtcDateTime> {
    let input = input.trim();
    if let Ok(dt) = ChronoDateTime::parse_from_rfc3339(input) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(input, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(input, "%Y-%m-%d %H:%M:%S%.f"))
        .ok()
        .map(|naive| naive.and_utc())
}
