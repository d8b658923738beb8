//! Timestamp property decoding.
//!
//! A time property is either a JSON number of Unix seconds or a
//! date-time string. Strings are tried as RFC 3339 first; a string
//! without an offset (`2023-11-14T22:13:20`, or with a space instead of
//! `T`) is read as UTC.

use chrono::{DateTime, NaiveDateTime, TimeZone};
use serde_json::Value;

const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// Decode a time property into Unix seconds.
///
/// `null` decodes to `None`, like a missing property.
pub(crate) fn seconds_from_value(value: &Value) -> Result<Option<f64>, String> {
    match value {
        Value::Null => Ok(None),
        Value::Number(number) => number
            .as_f64()
            .filter(|seconds| seconds.is_finite())
            .map(Some)
            .ok_or_else(|| format!("{number} is not a finite number of seconds")),
        Value::String(text) => seconds_from_str(text).map(Some),
        Value::Bool(_) => Err("expected a number or a date-time string, found a boolean".into()),
        Value::Array(_) => Err("expected a number or a date-time string, found an array".into()),
        Value::Object(_) => Err("expected a number or a date-time string, found an object".into()),
    }
}

fn seconds_from_str(text: &str) -> Result<f64, String> {
    if let Ok(datetime) = DateTime::parse_from_rfc3339(text) {
        return Ok(unix_seconds(&datetime));
    }
    NAIVE_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
        .map(|naive| unix_seconds(&naive.and_utc()))
        .ok_or_else(|| format!("{text:?} is not an RFC 3339 date-time"))
}

#[allow(clippy::cast_precision_loss)]
fn unix_seconds<Tz: TimeZone>(datetime: &DateTime<Tz>) -> f64 {
    datetime.timestamp() as f64 + f64::from(datetime.timestamp_subsec_nanos()) / 1e9
}
