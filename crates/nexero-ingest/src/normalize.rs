//! Timestamp and duration normalization
//!
//! VR clients send instants as epoch seconds (numbers or numeric strings) or
//! as ISO 8601 text, and durations as `M:SS` or bare seconds. Everything here
//! is total: bad input degrades to a textual fallback or to zero.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use nexero_core::{parse_iso_datetime, UtcDateTime};
use serde_json::Value;

/// Canonical text for a timestamp value.
///
/// Numbers and plain decimal strings are epoch seconds and become RFC 3339
/// with a `+00:00` offset. Other strings are returned as given. Any other
/// JSON value, or an epoch chrono cannot represent, falls back to its JSON text.
pub fn normalize_timestamp(value: &Value) -> String {
    match value {
        Value::Number(number) => number
            .as_f64()
            .and_then(epoch_to_rfc3339)
            .unwrap_or_else(|| number.to_string()),
        Value::String(text) => {
            let trimmed = text.trim();
            if is_plain_decimal(trimmed) {
                trimmed
                    .parse::<f64>()
                    .ok()
                    .and_then(epoch_to_rfc3339)
                    .unwrap_or_else(|| text.clone())
            } else {
                text.clone()
            }
        }
        other => other.to_string(),
    }
}

/// Convert a zoned date-time to canonical UTC text.
pub fn normalize_datetime<Tz: TimeZone>(value: &DateTime<Tz>) -> String {
    value.with_timezone(&Utc).to_rfc3339()
}

/// Naive date-times carry no offset and are taken to be UTC.
pub fn normalize_naive_datetime(value: &NaiveDateTime) -> String {
    value.and_utc().to_rfc3339()
}

/// Normalize then parse into an instant, if the value describes one.
pub fn parse_timestamp(value: &Value) -> Option<UtcDateTime> {
    parse_iso_datetime(&normalize_timestamp(value))
}

/// Seconds in a `M:SS` or `S` duration string; 0 when it cannot be read.
pub fn parse_duration(text: &str) -> u32 {
    let text = text.trim();
    if text.is_empty() {
        return 0;
    }

    let parts: Vec<&str> = text.split(':').collect();
    match parts.as_slice() {
        [minutes, seconds] => match (duration_part(minutes), duration_part(seconds)) {
            (Some(minutes), Some(seconds)) => minutes.saturating_mul(60).saturating_add(seconds),
            _ => 0,
        },
        [seconds] => duration_part(seconds).unwrap_or(0),
        _ => 0,
    }
}

fn duration_part(part: &str) -> Option<u32> {
    part.trim().parse::<u32>().ok()
}

fn epoch_to_rfc3339(seconds: f64) -> Option<String> {
    epoch_to_datetime(seconds).map(|dt| dt.to_rfc3339())
}

/// Epoch seconds to an instant, keeping microsecond precision.
fn epoch_to_datetime(seconds: f64) -> Option<UtcDateTime> {
    if !seconds.is_finite() {
        return None;
    }

    let whole = seconds.floor();
    let mut micros = ((seconds - whole) * 1_000_000.0).round() as i64;
    let mut whole = whole as i64;
    if micros >= 1_000_000 {
        whole = whole.checked_add(1)?;
        micros -= 1_000_000;
    }

    DateTime::<Utc>::from_timestamp(whole, (micros * 1_000) as u32)
}

/// `-?digits(.digits)?`
fn is_plain_decimal(text: &str) -> bool {
    let unsigned = text.strip_prefix('-').unwrap_or(text);
    let (integer, fraction) = match unsigned.split_once('.') {
        Some((integer, fraction)) => (integer, Some(fraction)),
        None => (unsigned, None),
    };

    let all_digits = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());
    all_digits(integer) && fraction.map_or(true, all_digits)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, NaiveDate};
    use serde_json::json;

    #[test]
    fn test_parse_duration_examples() {
        assert_eq!(parse_duration("0:45"), 45);
        assert_eq!(parse_duration("1:30"), 90);
        assert_eq!(parse_duration("2:00"), 120);
        assert_eq!(parse_duration("90"), 90);
        assert_eq!(parse_duration(""), 0);
        assert_eq!(parse_duration("abc"), 0);
    }

    #[test]
    fn test_parse_duration_degrades_to_zero() {
        assert_eq!(parse_duration("   "), 0);
        assert_eq!(parse_duration("1:2:3"), 0);
        assert_eq!(parse_duration("1:xx"), 0);
        assert_eq!(parse_duration("-5"), 0);
        assert_eq!(parse_duration("1.5"), 0);
        assert_eq!(parse_duration(":"), 0);
        assert_eq!(parse_duration(" 3:05 "), 185);
    }

    #[test]
    fn test_epoch_encodings_agree() {
        let expected = "2023-11-14T22:13:20+00:00";
        assert_eq!(normalize_timestamp(&json!(1700000000)), expected);
        assert_eq!(normalize_timestamp(&json!(1700000000.0)), expected);
        assert_eq!(normalize_timestamp(&json!("1700000000")), expected);
        assert_eq!(normalize_timestamp(&json!(" 1700000000 ")), expected);
    }

    #[test]
    fn test_fractional_epoch_keeps_millis() {
        assert_eq!(
            normalize_timestamp(&json!(1727653855.450)),
            "2024-09-29T23:50:55.450+00:00"
        );
        assert_eq!(
            normalize_timestamp(&json!("1727653855.450")),
            normalize_timestamp(&json!(1727653855.450))
        );
    }

    #[test]
    fn test_numeric_text_needs_digits_on_both_sides_of_the_point() {
        assert_eq!(normalize_timestamp(&json!("1.")), "1.");
        assert_eq!(normalize_timestamp(&json!(".5")), ".5");
        assert_eq!(normalize_timestamp(&json!("-5")), "1969-12-31T23:59:55+00:00");
        assert_eq!(normalize_timestamp(&json!("-")), "-");
    }

    #[test]
    fn test_non_numeric_text_passes_through() {
        assert_eq!(
            normalize_timestamp(&json!("2024-01-15T14:30:00Z")),
            "2024-01-15T14:30:00Z"
        );
        assert_eq!(normalize_timestamp(&json!("yesterday")), "yesterday");
        assert_eq!(normalize_timestamp(&json!("1e9")), "1e9");
    }

    #[test]
    fn test_other_values_use_json_text() {
        assert_eq!(normalize_timestamp(&json!(null)), "null");
        assert_eq!(normalize_timestamp(&json!(true)), "true");
        assert_eq!(normalize_timestamp(&json!(1e300)), "1e300");
    }

    #[test]
    fn test_datetime_helpers() {
        let offset = FixedOffset::east_opt(2 * 3600).unwrap();
        let zoned = offset.with_ymd_and_hms(2024, 1, 15, 16, 30, 0).unwrap();
        assert_eq!(normalize_datetime(&zoned), "2024-01-15T14:30:00+00:00");

        let naive = NaiveDate::from_ymd_opt(2024, 1, 15)
            .unwrap()
            .and_hms_opt(14, 30, 0)
            .unwrap();
        assert_eq!(normalize_naive_datetime(&naive), "2024-01-15T14:30:00+00:00");
    }

    #[test]
    fn test_parse_timestamp() {
        let from_epoch = parse_timestamp(&json!("1700000000")).unwrap();
        let from_iso = parse_timestamp(&json!("2023-11-14T22:13:20")).unwrap();
        assert_eq!(from_epoch, from_iso);
        assert_eq!(from_epoch.timestamp(), 1_700_000_000);

        assert!(parse_timestamp(&json!("soon")).is_none());
        assert!(parse_timestamp(&json!(null)).is_none());
    }
}
