// ── ACS document → snapshot conversion ──
//
// GenieACS stores each parameter as an object carrying `_value`, `_type`,
// `_writable` and `_timestamp`; objects carry `_object: true` plus their
// children. Keys starting with `_` are metadata and never become nodes.

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

use crate::error::CoreError;
use crate::model::{Children, ConfigNode, DeviceId, DeviceIdentity, DeviceSnapshot, Leaf, Scalar};

/// Deepest nesting accepted from a device document.
pub const MAX_DEPTH: usize = 32;

const DEFAULT_WIRE_TYPE: &str = "xsd:string";

// ── Helpers ────────────────────────────────────────────────────────

fn parse_timestamp(raw: Option<&Value>) -> Option<DateTime<Utc>> {
    match raw? {
        Value::String(s) => DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|dt| dt.with_timezone(&Utc)),
        Value::Number(n) => n.as_i64().and_then(DateTime::from_timestamp_millis),
        _ => None,
    }
}

/// Map a JSON `_value` onto a `Scalar`. Compound values are kept as their
/// JSON text.
pub fn scalar_from_json(value: &Value) -> Scalar {
    match value {
        Value::Null => Scalar::Null,
        Value::Bool(b) => Scalar::Bool(*b),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Scalar::Int(i)
            } else if let Some(u) = n.as_u64() {
                Scalar::UInt(u)
            } else {
                n.as_f64().map_or(Scalar::Null, Scalar::Float)
            }
        }
        Value::String(s) => Scalar::Text(s.clone()),
        Value::Array(_) | Value::Object(_) => Scalar::Text(value.to_string()),
    }
}

fn is_leaf(obj: &Map<String, Value>) -> bool {
    obj.contains_key("_value")
        || obj.contains_key("_type")
        || obj.get("_object") == Some(&Value::Bool(false))
}

fn leaf_from_object(obj: &Map<String, Value>) -> Leaf {
    // GenieACS sometimes stores `_value` as `[value, type]`.
    let (value, inline_type) = match obj.get("_value") {
        Some(Value::Array(pair)) if pair.len() == 2 => (
            pair.first().map_or(Scalar::Null, scalar_from_json),
            pair.get(1).and_then(Value::as_str),
        ),
        Some(v) => (scalar_from_json(v), None),
        None => (Scalar::Null, None),
    };

    let wire_type = obj
        .get("_type")
        .and_then(Value::as_str)
        .or(inline_type)
        .unwrap_or(DEFAULT_WIRE_TYPE)
        .to_owned();

    Leaf {
        value,
        wire_type,
        writable: obj.get("_writable").and_then(Value::as_bool).unwrap_or(true),
        observed_at: parse_timestamp(obj.get("_timestamp")),
    }
}

fn container_from_object(obj: &Map<String, Value>, depth: usize) -> Result<ConfigNode, CoreError> {
    let mut children = Children::new();
    for (name, child) in obj {
        if name.starts_with('_') {
            continue;
        }
        if let Some(node) = node_at_depth(child, depth + 1)? {
            children.insert(name.clone(), node);
        }
    }
    Ok(ConfigNode::Container { children })
}

fn node_at_depth(value: &Value, depth: usize) -> Result<Option<ConfigNode>, CoreError> {
    if depth > MAX_DEPTH {
        return Err(CoreError::Internal(format!(
            "device document nested deeper than {MAX_DEPTH} levels"
        )));
    }
    match value {
        Value::Object(obj) if is_leaf(obj) => Ok(Some(ConfigNode::Leaf(leaf_from_object(obj)))),
        Value::Object(obj) => container_from_object(obj, depth).map(Some),
        // Bare values outside a parameter object carry no metadata; skip them.
        _ => Ok(None),
    }
}

// ── Public API ─────────────────────────────────────────────────────

/// Convert one JSON node (parameter or object) into a `ConfigNode`.
pub fn node_from_json(value: &Value) -> Result<ConfigNode, CoreError> {
    Ok(node_at_depth(value, 0)?.unwrap_or_default())
}

/// Read the `_deviceId` identity block.
pub fn identity_from_document(doc: &Value) -> DeviceIdentity {
    let block = doc.get("_deviceId");
    let field = |name: &str| {
        block
            .and_then(|b| b.get(name))
            .and_then(Value::as_str)
            .map(str::to_owned)
    };
    DeviceIdentity {
        manufacturer: field("_Manufacturer"),
        oui: field("_OUI"),
        product_class: field("_ProductClass"),
        serial_number: field("_SerialNumber"),
    }
}

/// Build a snapshot from a full device document.
///
/// Rejects documents whose `_id` names a different device.
pub fn snapshot_from_document(device_id: &DeviceId, doc: &Value) -> Result<DeviceSnapshot, CoreError> {
    let Value::Object(obj) = doc else {
        return Err(CoreError::Internal(format!(
            "device document for {device_id} is not a JSON object"
        )));
    };

    if let Some(id) = obj.get("_id").and_then(Value::as_str) {
        if id != device_id.as_str() {
            return Err(CoreError::DeviceMismatch {
                expected: device_id.to_string(),
                got: id.to_owned(),
            });
        }
    }

    let root = container_from_object(obj, 0)?;
    Ok(DeviceSnapshot::new(
        device_id.clone(),
        root,
        identity_from_document(doc),
    ))
}
