//! Response normalization
//!
//! Strips the OData v2 envelope and metadata keys from raw responses,
//! flattens expanded navigation results and decodes embedded `/Date(...)/`
//! literals into locale-formatted strings.

use chrono::{DateTime, Timelike};
use serde_json::Value;

use super::constants::{DATE_LITERAL, ENVELOPE_KEY, METADATA_SIGIL, RESULTS_KEY};

/// Normalize a raw response into plain application data.
///
/// Handles single-result objects, `results` collections and doubly-wrapped
/// batches (an outer array of per-entity envelopes) uniformly: envelopes are
/// unwrapped, every key starting with the metadata sigil is dropped,
/// expanded navigation objects collapse to plain objects or arrays, and date
/// literals become formatted strings.
pub fn normalize(raw: &Value) -> Value {
    match raw {
        Value::Array(items) => Value::Array(items.iter().map(normalize).collect()),
        Value::Object(map) => {
            if let Some(inner) = map.get(ENVELOPE_KEY) {
                return normalize(inner);
            }
            if let Some(Value::Array(results)) = map.get(RESULTS_KEY) {
                return Value::Array(results.iter().map(normalize_value).collect());
            }
            normalize_value(raw)
        }
        other => normalize_value(other),
    }
}

fn normalize_value(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            // An expanded multi-valued navigation carries only a results
            // collection (plus metadata); it collapses to a plain array
            if let Some(Value::Array(results)) = map.get(RESULTS_KEY) {
                if map.keys().all(|k| k == RESULTS_KEY || k.starts_with(METADATA_SIGIL)) {
                    return Value::Array(results.iter().map(normalize_value).collect());
                }
            }
            Value::Object(
                map.iter()
                    .filter(|(key, _)| !key.starts_with(METADATA_SIGIL))
                    .map(|(key, v)| (key.clone(), normalize_value(v)))
                    .collect(),
            )
        }
        Value::Array(items) => Value::Array(items.iter().map(normalize_value).collect()),
        Value::String(s) => match decode_date_literal(s) {
            Some(formatted) => Value::String(formatted),
            None => value.clone(),
        },
        other => other.clone(),
    }
}

/// Decode a `/Date(<ms>[±<minutes>])/` literal into `dd.mm.YYYY`, or
/// `dd.mm.YYYY HH:MM:SS` when the time of day is non-zero. `None` when the
/// string is not a date literal.
pub fn decode_date_literal(s: &str) -> Option<String> {
    let caps = DATE_LITERAL.captures(s)?;
    let millis: i64 = caps[1].parse().ok()?;
    let offset_minutes: i64 = caps
        .get(2)
        .and_then(|m| m.as_str().parse().ok())
        .unwrap_or(0);

    let adjusted = millis.checked_add(offset_minutes.checked_mul(60_000)?)?;
    let datetime = DateTime::from_timestamp_millis(adjusted)?.naive_utc();

    if datetime.num_seconds_from_midnight() == 0 {
        Some(datetime.format("%d.%m.%Y").to_string())
    } else {
        Some(datetime.format("%d.%m.%Y %H:%M:%S").to_string())
    }
}
