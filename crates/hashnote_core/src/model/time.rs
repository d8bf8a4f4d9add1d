//! Timestamp helpers. All persisted timestamps are Unix epoch milliseconds.

use chrono::{DateTime, Utc};
use serde_json::Value;

/// Current wall clock in epoch milliseconds.
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Current wall clock as RFC 3339 text (backup `exportDate`).
pub fn now_rfc3339() -> String {
    Utc::now().to_rfc3339()
}

/// Parses a persisted or imported timestamp.
///
/// Accepts integral milliseconds and RFC 3339 strings. Anything else is
/// reported as missing so callers can apply their fallback policy.
pub fn parse_timestamp_text(value: &str) -> Option<i64> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(millis) = trimmed.parse::<i64>() {
        return Some(millis);
    }
    DateTime::parse_from_rfc3339(trimmed)
        .ok()
        .map(|parsed| parsed.timestamp_millis())
}

/// JSON flavour of [`parse_timestamp_text`]; floats are truncated.
pub fn parse_timestamp_json(value: &Value) -> Option<i64> {
    match value {
        Value::Number(number) => number.as_i64().or_else(|| {
            number
                .as_f64()
                .filter(|float| float.is_finite())
                .map(|float| float as i64)
        }),
        Value::String(text) => parse_timestamp_text(text),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::{parse_timestamp_json, parse_timestamp_text};
    use serde_json::json;

    #[test]
    fn parses_millis_and_rfc3339() {
        assert_eq!(parse_timestamp_text("1700000000000"), Some(1_700_000_000_000));
        assert_eq!(
            parse_timestamp_text("2023-11-14T22:13:20Z"),
            Some(1_700_000_000_000)
        );
    }

    #[test]
    fn garbage_is_missing() {
        assert_eq!(parse_timestamp_text("not a date"), None);
        assert_eq!(parse_timestamp_text("  "), None);
        assert_eq!(parse_timestamp_json(&json!(true)), None);
        assert_eq!(parse_timestamp_json(&json!(null)), None);
    }

    #[test]
    fn json_numbers_are_accepted() {
        assert_eq!(parse_timestamp_json(&json!(1234)), Some(1234));
        assert_eq!(parse_timestamp_json(&json!(1234.9)), Some(1234));
        assert_eq!(parse_timestamp_json(&json!("1234")), Some(1234));
    }
}
