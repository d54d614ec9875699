/// Canonical JSON serialization for PoA payloads.
///
/// Two rules produce a unique byte form for every payload:
/// - The top level is always `goal`, `url`, `timestamp`, `result_json`,
///   in that order. serde_json emits struct fields in declaration order,
///   so the `PoaPayload` declaration below IS the canonical order.
/// - Inside `result_json`, every object's keys are sorted (recursively,
///   arrays walked element-wise). Two payloads that differ only in key
///   order therefore serialize to identical bytes.
///
/// No whitespace is emitted and strings keep serde_json's minimal
/// escaping. Finite numbers use serde_json's shortest-round-trip
/// formatting; non-finite numbers have no JSON form and fail with
/// `TrailError::Serialization` instead of being coerced to null.
use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::{Result, TrailError};

/// The tuple a PoA hash commits to. Field order is the canonical order.
#[derive(Debug, Serialize)]
struct PoaPayload<'a> {
    goal: &'a str,
    url: &'a str,
    timestamp: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    result_json: Option<Value>,
}

/// Serialize a payload to its canonical byte form.
///
/// An absent `result_json` omits the key entirely; an explicit JSON
/// null is emitted as `"result_json":null`. The two hash differently.
pub fn canonical_bytes(
    goal: &str,
    url: &str,
    timestamp: &str,
    result_json: Option<&Value>,
) -> Result<Vec<u8>> {
    let payload = PoaPayload {
        goal,
        url,
        timestamp,
        result_json: result_json.map(sort_keys),
    };

    serde_json::to_vec(&payload)
        .map_err(|e| TrailError::Serialization(format!("canonical serialization failed: {e}")))
}

/// Convert any serializable result into a JSON value suitable for hashing.
///
/// This is the boundary where native numbers enter the payload: NaN and
/// infinity cannot be represented in JSON and are rejected here.
pub fn result_value<T: Serialize>(result: &T) -> Result<Value> {
    serde_json::to_value(result)
        .map_err(|e| TrailError::Serialization(format!("result payload is not valid JSON: {e}")))
}

/// Rebuild a value with every object's keys in sorted order.
///
/// The rebuild is explicit rather than relying on the map backing so the
/// output is sorted regardless of which map implementation serde_json
/// was compiled with.
fn sort_keys(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));

            let mut sorted = Map::new();
            for (key, val) in entries {
                sorted.insert(key.clone(), sort_keys(val));
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.iter().map(sort_keys).collect()),
        other => other.clone(),
    }
}
