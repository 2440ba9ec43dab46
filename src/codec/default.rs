//! Default serializer for fields without a codec
//!
//! Strings pass through untouched; everything else is JSON text. On the way
//! back anything that is not valid JSON is kept as the raw string, which means
//! text such as `true` or `123` comes back as a boolean or number. Fields that
//! must hold such text verbatim need a [`super::StringCodec`].

use serde_json::Value;

use super::CodecError;

/// Convert a value into query text
///
/// Strings are returned verbatim with no escaping of any kind.
pub fn default_format(value: &Value) -> Result<String, CodecError> {
    match value {
        Value::String(s) => Ok(s.clone()),
        other => serde_json::to_string(other).map_err(|e| CodecError::format(e.to_string())),
    }
}

/// Convert query text into a value, falling back to the raw string
pub fn default_parse(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}
