//! Timestamp shapes accepted from remote documents.
//!
//! Documents written by this crate carry RFC 3339 strings. Older documents may carry
//! epoch milliseconds or a `{seconds, nanoseconds}` object.

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::Value as JsonValue;

pub fn parse_timestamp(value: &JsonValue) -> Option<DateTime<Utc>> {
    match value {
        JsonValue::String(s) => DateTime::parse_from_rfc3339(s.trim())
            .ok()
            .map(|dt| dt.with_timezone(&Utc)),
        JsonValue::Number(n) => n.as_i64().and_then(DateTime::<Utc>::from_timestamp_millis),
        JsonValue::Object(map) => {
            let seconds = map
                .get("seconds")
                .or_else(|| map.get("_seconds"))
                .and_then(JsonValue::as_i64)?;
            let nanos = map
                .get("nanoseconds")
                .or_else(|| map.get("_nanoseconds"))
                .and_then(JsonValue::as_u64)
                .unwrap_or(0);
            let nanos = u32::try_from(nanos).ok()?;
            DateTime::<Utc>::from_timestamp(seconds, nanos)
        }
        _ => None,
    }
}

pub fn timestamp_value(ts: DateTime<Utc>) -> JsonValue {
    JsonValue::String(ts.to_rfc3339_opts(SecondsFormat::Millis, true))
}
