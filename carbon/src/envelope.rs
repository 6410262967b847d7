//! Wire format for stored values.
//!
//! An envelope is the JSON object `{"item": .., "stored": .., "ttl": ..}`.
//! Decoding is strict: malformed content is an error, never a cache miss.

use crate::domain::Envelope;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use shared::{Error, Result, TtlMs};

/// Current time in milliseconds since the UNIX epoch.
pub fn now_millis() -> u64 {
    chrono::Utc::now().timestamp_millis().max(0) as u64
}

#[derive(Serialize)]
struct EnvelopeRef<'a, V> {
    item: &'a V,
    stored: u64,
    ttl: i64,
}

/// Serialize `value` into envelope text stamped with the current time.
///
/// Serialization failures are returned as-is inside `Error::Serialization`.
pub fn encode<V: Serialize>(value: &V, ttl: TtlMs) -> Result<String> {
    let envelope = EnvelopeRef {
        item: value,
        stored: now_millis(),
        ttl: ttl.0,
    };
    Ok(serde_json::to_string(&envelope)?)
}

/// Parse raw store content. `None` and empty text mean "not found".
pub fn decode<V: DeserializeOwned>(raw: Option<&str>) -> Result<Option<Envelope<V>>> {
    let raw = match raw {
        Some(raw) if !raw.is_empty() => raw,
        _ => return Ok(None),
    };

    let parsed: Value = serde_json::from_str(raw).map_err(|_| Error::BadEnvelope)?;
    if is_falsy(&parsed) {
        return Err(Error::BadEnvelope);
    }

    // Presence of `item` is structural: 0, false, "" and null are all valid items.
    let Value::Object(mut fields) = parsed else {
        return Err(Error::EnvelopeStructure);
    };
    let item = fields.remove("item").ok_or(Error::EnvelopeStructure)?;
    let stored = fields
        .get("stored")
        .filter(|stored| !is_falsy(stored))
        .and_then(as_millis)
        .ok_or(Error::EnvelopeStructure)?;
    let ttl = match fields.get("ttl") {
        None | Some(Value::Null) => 0,
        Some(ttl) => ttl
            .as_i64()
            .or_else(|| ttl.as_f64().filter(|t| t.fract() == 0.0).map(|t| t as i64))
            .ok_or(Error::EnvelopeStructure)?,
    };

    // Only the item itself can fail to match the caller's type.
    let item = serde_json::from_value(item)?;
    Ok(Some(Envelope::new(item, stored, ttl)))
}

/// Epoch milliseconds from a JSON number, accepting integral floats such as `1.7e12`.
fn as_millis(value: &Value) -> Option<u64> {
    value.as_u64().or_else(|| {
        value
            .as_f64()
            .filter(|ms| *ms > 0.0 && ms.fract() == 0.0 && *ms <= u64::MAX as f64)
            .map(|ms| ms as u64)
    })
}

fn is_falsy(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64().is_some_and(|n| n == 0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(_) | Value::Object(_) => false,
    }
}
