// ── Status normalizer ──
//
// Turns whatever the hub sent (pull response or push payload) into a
// `StatusBatch`. Pure functions: the same input always yields the same
// batch. Bad records are dropped one at a time; the rest of the payload
// still applies.

use serde_json::{Map, Value};
use tracing::debug;

use crate::model::{
    ColorMode, MAX_BRIGHTNESS, MAX_TEMPERATURE, MIN_BRIGHTNESS, MIN_TEMPERATURE, PowerState,
    StatusBatch, StatusPatch, clamp_u8, clamp_u16, non_negative,
};

/// Keys under which hubs wrap their device collection.
const WRAPPER_KEYS: [&str; 2] = ["devices", "data"];

const ID_KEY: &str = "device_id";

/// Why a single record was rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Malformed {
    NotAnObject,
    MissingId,
    WrongType(&'static str),
}

impl std::fmt::Display for Malformed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotAnObject => f.write_str("record is not an object"),
            Self::MissingId => f.write_str("record has no usable device_id"),
            Self::WrongType(field) => write!(f, "field `{field}` has the wrong type"),
        }
    }
}

/// Parse raw text and normalize it. Undecodable text yields an empty batch.
pub fn normalize_str(raw: &str) -> StatusBatch {
    match serde_json::from_str::<Value>(raw) {
        Ok(value) => normalize(&value),
        Err(e) => {
            debug!(error = %e, "discarding undecodable status payload");
            StatusBatch::new()
        }
    }
}

/// Normalize any of the accepted payload shapes:
///
/// - an array of records, each carrying `device_id`
/// - an object wrapping such a collection under `devices` or `data`
/// - a single record carrying `device_id`
/// - a keyed object `{ "<id>": { ...record } }`
pub fn normalize(value: &Value) -> StatusBatch {
    let mut batch = StatusBatch::new();
    collect(value, &mut batch);
    batch
}

fn collect(value: &Value, batch: &mut StatusBatch) {
    match value {
        Value::Array(items) => {
            for (index, item) in items.iter().enumerate() {
                match identified_record(item) {
                    Ok((id, patch)) => insert(batch, id, &patch),
                    Err(reason) => debug!(index, %reason, "skipping malformed status record"),
                }
            }
        }
        Value::Object(map) => {
            if let Some(inner) = WRAPPER_KEYS
                .iter()
                .filter_map(|key| map.get(*key))
                .find(|inner| is_collection(inner))
            {
                collect(inner, batch);
            } else if map.contains_key(ID_KEY) {
                match identified_record(value) {
                    Ok((id, patch)) => insert(batch, id, &patch),
                    Err(reason) => debug!(%reason, "skipping malformed status record"),
                }
            } else {
                for (id, record) in map {
                    match record_patch(record) {
                        Ok(patch) => insert(batch, id.clone(), &patch),
                        Err(reason) => {
                            debug!(device_id = %id, %reason, "skipping malformed status record");
                        }
                    }
                }
            }
        }
        other => debug!(kind = json_kind(other), "status payload is neither array nor object"),
    }
}

/// What a `devices`/`data` wrapper may hold. A plain record under one of
/// those keys is a device that happens to carry that id.
fn is_collection(value: &Value) -> bool {
    match value {
        Value::Array(_) => true,
        Value::Object(map) => map.values().all(Value::is_object),
        _ => false,
    }
}

/// Repeated ids in one payload fold together in payload order.
fn insert(batch: &mut StatusBatch, id: String, patch: &StatusPatch) {
    batch.entry(id).or_default().merge(patch);
}

/// A record that names itself via `device_id`.
pub(crate) fn identified_record(value: &Value) -> Result<(String, StatusPatch), Malformed> {
    let map = value.as_object().ok_or(Malformed::NotAnObject)?;
    let id = device_id(map).ok_or(Malformed::MissingId)?;
    Ok((id, fields(map)?))
}

/// A record whose id comes from outside (its key).
pub(crate) fn record_patch(value: &Value) -> Result<StatusPatch, Malformed> {
    let map = value.as_object().ok_or(Malformed::NotAnObject)?;
    fields(map)
}

fn device_id(map: &Map<String, Value>) -> Option<String> {
    match map.get(ID_KEY)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

// ── Field extraction ────────────────────────────────────────────────

fn fields(map: &Map<String, Value>) -> Result<StatusPatch, Malformed> {
    let channel = |key: &'static str| number(map, key).map(|v| v.map(|v| clamp_u8(v, 0, 255)));

    let temperature = match number(map, "temp")? {
        Some(v) => Some(v),
        None => number(map, "temperature")?,
    };

    Ok(StatusPatch {
        state: boolean(map, "ison")?.map(PowerState::from),
        red: channel("red")?,
        green: channel("green")?,
        blue: channel("blue")?,
        power: number(map, "power")?.map(non_negative),
        energy: number(map, "energy")?.map(non_negative),
        brightness: number(map, "brightness")?
            .map(|v| clamp_u8(v, MIN_BRIGHTNESS, MAX_BRIGHTNESS)),
        temperature: temperature.map(|v| clamp_u16(v, MIN_TEMPERATURE, MAX_TEMPERATURE)),
        mode: mode(map)?,
    })
}

/// `null` counts as absent.
fn present<'a>(map: &'a Map<String, Value>, key: &str) -> Option<&'a Value> {
    map.get(key).filter(|v| !v.is_null())
}

fn number(map: &Map<String, Value>, key: &'static str) -> Result<Option<f64>, Malformed> {
    present(map, key)
        .map(|v| v.as_f64().ok_or(Malformed::WrongType(key)))
        .transpose()
}

/// Some firmware reports flags as `0`/`1`.
fn boolean(map: &Map<String, Value>, key: &'static str) -> Result<Option<bool>, Malformed> {
    present(map, key)
        .map(|v| match v {
            Value::Bool(b) => Ok(*b),
            Value::Number(n) => match n.as_u64() {
                Some(0) => Ok(false),
                Some(1) => Ok(true),
                _ => Err(Malformed::WrongType(key)),
            },
            _ => Err(Malformed::WrongType(key)),
        })
        .transpose()
}

/// Unknown mode names drop the field only.
fn mode(map: &Map<String, Value>) -> Result<Option<ColorMode>, Malformed> {
    let Some(value) = present(map, "mode") else {
        return Ok(None);
    };
    let name = value.as_str().ok_or(Malformed::WrongType("mode"))?;
    match name.parse::<ColorMode>() {
        Ok(mode) => Ok(Some(mode)),
        Err(_) => {
            debug!(mode = name, "ignoring unknown color mode");
            Ok(None)
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;
    use crate::model::Rgb;

    #[test]
    fn keyed_object_maps_wire_fields() {
        let batch = normalize(&json!({
            "a": {
                "ison": true, "red": 10, "green": 20, "blue": 30,
                "power": 5.5, "energy": 1.25, "brightness": 80,
                "temp": 3500, "mode": "white"
            }
        }));

        let patch = &batch["a"];
        assert_eq!(patch.state, Some(PowerState::On));
        assert_eq!((patch.red, patch.green, patch.blue), (Some(10), Some(20), Some(30)));
        assert_eq!(patch.power, Some(5.5));
        assert_eq!(patch.energy, Some(1.25));
        assert_eq!(patch.brightness, Some(80));
        assert_eq!(patch.temperature, Some(3500));
        assert_eq!(patch.mode, Some(ColorMode::White));
    }

    #[test]
    fn missing_fields_stay_unset() {
        let batch = normalize(&json!({ "a": { "ison": true, "power": 5 } }));
        assert_eq!(
            batch["a"],
            StatusPatch::default()
                .with_state(PowerState::On)
                .with_power(5.0)
        );
    }

    #[test]
    fn accepts_array_wrapper_and_single_record() {
        let array = normalize(&json!([{ "device_id": "a", "ison": false }]));
        let wrapped = normalize(&json!({ "devices": [{ "device_id": "a", "ison": false }] }));
        let data = normalize(&json!({ "type": "x", "data": [{ "device_id": "a", "ison": false }] }));
        let single = normalize(&json!({ "device_id": "a", "ison": false }));

        assert_eq!(array, wrapped);
        assert_eq!(array, data);
        assert_eq!(array, single);
        assert_eq!(array["a"].state, Some(PowerState::Off));
    }

    #[test]
    fn numeric_ids_are_stringified() {
        let batch = normalize(&json!([{ "device_id": 42, "ison": true }]));
        assert!(batch.contains_key("42"));
    }

    #[test]
    fn out_of_range_values_are_clamped() {
        let batch = normalize(&json!({
            "a": { "red": 300, "green": -4, "blue": 12.6, "brightness": 0,
                   "temperature": 9000, "power": -1 }
        }));
        let patch = &batch["a"];
        let mut status = crate::model::DeviceStatus::default();
        patch.apply_to(&mut status);

        assert_eq!(status.color, Rgb::new(255, 0, 13));
        assert_eq!(status.brightness, 1);
        assert_eq!(status.temperature, 6500);
        assert!(status.power.abs() < f64::EPSILON);
    }

    #[test]
    fn partial_batch_skips_only_the_malformed_record() {
        let batch = normalize(&json!([
            { "device_id": "d1", "ison": true },
            { "device_id": "d2", "ison": true },
            { "device_id": "d3", "ison": "yes" },
            { "device_id": "d4", "ison": false },
            { "device_id": "d5", "brightness": 50 }
        ]));

        assert_eq!(batch.len(), 4);
        assert!(!batch.contains_key("d3"));
    }

    #[test]
    fn numeric_power_flags_are_accepted() {
        let batch = normalize(&json!({
            "a": { "ison": 1, "brightness": 40 },
            "b": { "ison": 0 },
            "c": { "ison": 2, "brightness": 40 }
        }));
        assert_eq!(batch["a"].state, Some(PowerState::On));
        assert_eq!(batch["a"].brightness, Some(40));
        assert_eq!(batch["b"].state, Some(PowerState::Off));
        assert!(!batch.contains_key("c"));
    }

    #[test]
    fn device_named_like_a_wrapper_stays_a_device() {
        let batch = normalize(&json!({
            "devices": { "ison": true },
            "data": { "ison": false, "brightness": 20 },
            "hall": { "ison": true }
        }));
        assert_eq!(batch.len(), 3);
        assert_eq!(batch["devices"].state, Some(PowerState::On));
        assert_eq!(batch["data"].brightness, Some(20));

        // A keyed collection under the wrapper key is still unwrapped.
        let wrapped = normalize(&json!({ "devices": { "a": { "ison": true } } }));
        assert_eq!(wrapped.keys().collect::<Vec<_>>(), vec!["a"]);
    }

    #[test]
    fn records_without_id_or_object_are_skipped() {
        let batch = normalize(&json!([
            { "ison": true },
            "garbage",
            { "device_id": "", "ison": true },
            { "device_id": "ok" }
        ]));
        assert_eq!(batch.keys().collect::<Vec<_>>(), vec!["ok"]);
    }

    #[test]
    fn unknown_mode_drops_only_that_field() {
        let batch = normalize(&json!({ "a": { "ison": true, "mode": "disco" } }));
        assert_eq!(batch["a"].mode, None);
        assert_eq!(batch["a"].state, Some(PowerState::On));
    }

    #[test]
    fn null_fields_count_as_absent() {
        let batch = normalize(&json!({ "a": { "ison": null, "power": 3 } }));
        assert_eq!(batch["a"].state, None);
        assert_eq!(batch["a"].power, Some(3.0));
    }

    #[test]
    fn undecodable_text_is_empty() {
        assert!(normalize_str("{not json").is_empty());
        assert!(normalize(&json!(17)).is_empty());
    }

    #[test]
    fn normalizing_twice_is_identical() {
        let raw = r#"{"a":{"ison":true,"power":5},"b":{"red":999,"mode":"WHITE"}}"#;
        assert_eq!(normalize_str(raw), normalize_str(raw));
    }
}
