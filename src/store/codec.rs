//! Conversion between Firestore typed values and plain JSON.
//!
//! Firestore wraps every value in a single-key object naming its type
//! (`{"stringValue": "a"}`, `{"integerValue": "5"}`, `{"mapValue": {"fields": {...}}}`).
//! Records handed to the rest of the crate are plain JSON; timestamps surface as RFC 3339
//! strings and integers as JSON numbers.

use crate::query::Record;
use serde_json::{Map, Number, Value, json};

use super::types::Document;

/// Decode a single Firestore value. Unknown or malformed values decode to `null`.
pub fn decode_value(value: &Value) -> Value {
    let Some((kind, inner)) = value.as_object().and_then(|object| object.iter().next()) else {
        return Value::Null;
    };

    match kind.as_str() {
        "nullValue" => Value::Null,
        "booleanValue" => inner.as_bool().map(Value::Bool).unwrap_or(Value::Null),
        "integerValue" => match inner {
            Value::String(text) => text
                .parse::<i64>()
                .map(Value::from)
                .unwrap_or_else(|_| Value::String(text.clone())),
            Value::Number(number) => Value::Number(number.clone()),
            _ => Value::Null,
        },
        "doubleValue" => inner
            .as_f64()
            .and_then(Number::from_f64)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        "stringValue" | "timestampValue" | "referenceValue" | "bytesValue" => inner.clone(),
        "geoPointValue" => json!({
            "latitude": inner.get("latitude").cloned().unwrap_or(json!(0.0)),
            "longitude": inner.get("longitude").cloned().unwrap_or(json!(0.0)),
        }),
        "mapValue" => Value::Object(
            inner
                .get("fields")
                .and_then(Value::as_object)
                .map(decode_fields)
                .unwrap_or_default(),
        ),
        "arrayValue" => Value::Array(
            inner
                .get("values")
                .and_then(Value::as_array)
                .map(|values| values.iter().map(decode_value).collect())
                .unwrap_or_default(),
        ),
        other => {
            tracing::warn!(kind = other, "Unknown Firestore value type");
            Value::Null
        }
    }
}

/// Decode every field of a Firestore `fields` map.
pub fn decode_fields(fields: &Map<String, Value>) -> Record {
    fields
        .iter()
        .map(|(key, value)| (key.clone(), decode_value(value)))
        .collect()
}

/// Decode a Firestore document, filling `id` from the document name when absent.
pub(crate) fn decode_document(document: &Document) -> Record {
    let mut record = decode_fields(&document.fields);
    if !record.contains_key("id")
        && let Some(id) = document.name.rsplit('/').next().filter(|id| !id.is_empty())
    {
        record.insert("id".into(), Value::String(id.to_string()));
    }
    record
}

/// Encode a JSON value as a Firestore typed value.
pub fn encode_value(value: &Value) -> Value {
    match value {
        Value::Null => json!({ "nullValue": null }),
        Value::Bool(flag) => json!({ "booleanValue": flag }),
        Value::Number(number) => match number.as_i64() {
            Some(integer) => json!({ "integerValue": integer.to_string() }),
            None => json!({ "doubleValue": number.as_f64().unwrap_or_default() }),
        },
        Value::String(text) => json!({ "stringValue": text }),
        Value::Array(values) => json!({
            "arrayValue": { "values": values.iter().map(encode_value).collect::<Vec<_>>() }
        }),
        Value::Object(fields) => json!({ "mapValue": { "fields": encode_fields(fields) } }),
    }
}

/// Encode every field of a record.
pub fn encode_fields(record: &Record) -> Map<String, Value> {
    record
        .iter()
        .map(|(key, value)| (key.clone(), encode_value(value)))
        .collect()
}

/// Encode an RFC 3339 string as a Firestore timestamp.
pub fn encode_timestamp(rfc3339: &str) -> Value {
    json!({ "timestampValue": rfc3339 })
}

/// Quote a field name for use in a Firestore field path.
///
/// Simple identifiers pass through; anything else is wrapped in backticks.
pub fn field_path(field: &str) -> String {
    let mut chars = field.chars();
    let simple = matches!(chars.next(), Some(first) if first == '_' || first.is_ascii_alphabetic())
        && chars.all(|c| c == '_' || c.is_ascii_alphanumeric());
    if simple {
        field.to_string()
    } else {
        format!("`{}`", field.replace('\\', "\\\\").replace('`', "\\`"))
    }
}
