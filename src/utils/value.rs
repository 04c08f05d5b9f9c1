use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Convert arbitrary JSON values into sanitized strings.
///
/// Backend identifiers show up as numbers on some resources and as strings on
/// others; everything is normalised to a string on our side.
pub fn value_to_string(value: Value) -> String {
    let raw = match value {
        Value::String(s) => s,
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => "null".to_string(),
        other => other.to_string(),
    };
    sanitize(raw)
}

fn sanitize(s: String) -> String {
    s.chars().filter(|c| !c.is_control()).collect()
}

/// Serde helper for identifier fields that may be a JSON string or number.
pub fn deserialize_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(value_to_string)
}

/// Like [`deserialize_id`], but `null` and missing fields become `None`.
pub fn deserialize_opt_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<Value>::deserialize(deserializer).map(|v| match v {
        None | Some(Value::Null) => None,
        Some(v) => Some(value_to_string(v)),
    })
}
