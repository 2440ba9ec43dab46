//! Built-in codecs

use serde_json::{Number, Value};
use std::sync::Arc;

use super::{Codec, CodecError};

/// Keeps query text as a string, never interpreting it as JSON
#[derive(Debug, Clone, Copy, Default)]
pub struct StringCodec;

impl Codec for StringCodec {
    fn parse(&self, raw: &str) -> Result<Value, CodecError> {
        Ok(Value::String(raw.to_string()))
    }

    fn format(&self, value: &Value) -> Result<String, CodecError> {
        match value {
            Value::String(s) => Ok(s.clone()),
            other => Err(CodecError::format(format!("expected a string, got {}", other))),
        }
    }
}

/// Signed 64-bit integers
#[derive(Debug, Clone, Copy, Default)]
pub struct IntegerCodec;

impl Codec for IntegerCodec {
    fn parse(&self, raw: &str) -> Result<Value, CodecError> {
        raw.trim()
            .parse::<i64>()
            .map(Value::from)
            .map_err(|e| CodecError::parse(raw, e.to_string()))
    }

    fn format(&self, value: &Value) -> Result<String, CodecError> {
        value
            .as_i64()
            .map(|n| n.to_string())
            .ok_or_else(|| CodecError::format(format!("expected an integer, got {}", value)))
    }
}

/// Finite floating point numbers
#[derive(Debug, Clone, Copy, Default)]
pub struct NumberCodec;

impl Codec for NumberCodec {
    fn parse(&self, raw: &str) -> Result<Value, CodecError> {
        let n = raw
            .trim()
            .parse::<f64>()
            .map_err(|e| CodecError::parse(raw, e.to_string()))?;
        Number::from_f64(n)
            .map(Value::Number)
            .ok_or_else(|| CodecError::parse(raw, "not a finite number"))
    }

    fn format(&self, value: &Value) -> Result<String, CodecError> {
        match value {
            Value::Number(n) => Ok(n.to_string()),
            other => Err(CodecError::format(format!("expected a number, got {}", other))),
        }
    }
}

/// Booleans, accepting `true`/`false` and `1`/`0`
#[derive(Debug, Clone, Copy, Default)]
pub struct BoolCodec;

impl Codec for BoolCodec {
    fn parse(&self, raw: &str) -> Result<Value, CodecError> {
        match raw.trim() {
            "true" | "1" => Ok(Value::Bool(true)),
            "false" | "0" => Ok(Value::Bool(false)),
            _ => Err(CodecError::parse(raw, "expected true, false, 1 or 0")),
        }
    }

    fn format(&self, value: &Value) -> Result<String, CodecError> {
        value
            .as_bool()
            .map(|b| b.to_string())
            .ok_or_else(|| CodecError::format(format!("expected a boolean, got {}", value)))
    }
}

/// Strict JSON: strings are quoted and invalid text is rejected
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn parse(&self, raw: &str) -> Result<Value, CodecError> {
        serde_json::from_str(raw).map_err(|e| CodecError::parse(raw, e.to_string()))
    }

    fn format(&self, value: &Value) -> Result<String, CodecError> {
        serde_json::to_string(value).map_err(|e| CodecError::format(e.to_string()))
    }
}

/// Lists of strings joined by a separator (`a,b,c`)
#[derive(Debug, Clone, Copy)]
pub struct ListCodec {
    separator: char,
}

impl ListCodec {
    pub fn new(separator: char) -> Self {
        Self { separator }
    }
}

impl Default for ListCodec {
    fn default() -> Self {
        Self::new(',')
    }
}

impl Codec for ListCodec {
    fn parse(&self, raw: &str) -> Result<Value, CodecError> {
        if raw.is_empty() {
            return Ok(Value::Array(Vec::new()));
        }
        Ok(Value::Array(
            raw.split(self.separator)
                .map(|item| Value::String(item.to_string()))
                .collect(),
        ))
    }

    fn format(&self, value: &Value) -> Result<String, CodecError> {
        let Value::Array(items) = value else {
            return Err(CodecError::format(format!("expected a list, got {}", value)));
        };

        let mut parts = Vec::with_capacity(items.len());
        for item in items {
            let text = match item {
                Value::String(s) => s.clone(),
                Value::Number(n) => n.to_string(),
                Value::Bool(b) => b.to_string(),
                other => {
                    return Err(CodecError::format(format!(
                        "list items must be scalars, got {}",
                        other
                    )))
                }
            };
            if text.contains(self.separator) {
                return Err(CodecError::format(format!(
                    "list item {:?} contains the separator {:?}",
                    text, self.separator
                )));
            }
            parts.push(text);
        }
        if parts.len() == 1 && parts[0].is_empty() {
            return Err(CodecError::format("a single empty item reads back as an empty list"));
        }
        Ok(parts.join(&self.separator.to_string()))
    }
}

type ParseFn = Arc<dyn Fn(&str) -> Result<Value, CodecError> + Send + Sync>;
type FormatFn = Arc<dyn Fn(&Value) -> Result<String, CodecError> + Send + Sync>;

/// Codec assembled from a pair of closures
#[derive(Clone)]
pub struct FnCodec {
    parse: ParseFn,
    format: FormatFn,
}

impl FnCodec {
    pub fn new<P, F>(parse: P, format: F) -> Self
    where
        P: Fn(&str) -> Result<Value, CodecError> + Send + Sync + 'static,
        F: Fn(&Value) -> Result<String, CodecError> + Send + Sync + 'static,
    {
        Self {
            parse: Arc::new(parse),
            format: Arc::new(format),
        }
    }
}

impl Codec for FnCodec {
    fn parse(&self, raw: &str) -> Result<Value, CodecError> {
        (self.parse)(raw)
    }

    fn format(&self, value: &Value) -> Result<String, CodecError> {
        (self.format)(value)
    }
}

impl std::fmt::Debug for FnCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnCodec").finish_non_exhaustive()
    }
}
