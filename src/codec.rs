//! Field codecs - string <-> value conversion for query parameters
//!
//! Every field of a synchronized state is converted to query text on the way
//! out and back to a [`serde_json::Value`] on the way in. A field may carry its
//! own [`Codec`]; anything without one goes through the default serializer,
//! which passes strings through verbatim and JSON-encodes everything else.
//!
//! Percent-encoding is never performed here. The query container in
//! [`crate::query`] is the only layer that escapes text, so values are encoded
//! exactly once.

mod builtin;
mod default;
mod registry;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;

pub use builtin::{
    BoolCodec, FnCodec, IntegerCodec, JsonCodec, ListCodec, NumberCodec, StringCodec,
};
pub use default::{default_format, default_parse};
pub use registry::CodecRegistry;

/// Failure raised by a codec
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    /// Raw query text could not be turned into a value
    #[error("cannot parse {raw:?}: {reason}")]
    Parse { raw: String, reason: String },
    /// A value has no query-text representation
    #[error("cannot format value: {reason}")]
    Format { reason: String },
}

impl CodecError {
    pub fn parse(raw: impl Into<String>, reason: impl Into<String>) -> Self {
        CodecError::Parse {
            raw: raw.into(),
            reason: reason.into(),
        }
    }

    pub fn format(reason: impl Into<String>) -> Self {
        CodecError::Format {
            reason: reason.into(),
        }
    }
}

/// Per-field parse/format pair
///
/// Both directions must be pure. `parse` failures make the reader drop the
/// field; `format` failures propagate to whoever triggered the write.
pub trait Codec: Send + Sync {
    /// Convert decoded query text into a value
    fn parse(&self, raw: &str) -> Result<Value, CodecError>;

    /// Convert a value into query text (not percent-encoded)
    fn format(&self, value: &Value) -> Result<String, CodecError>;
}

/// Named built-in codecs, used by configuration files
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum CodecKind {
    String,
    Integer,
    Number,
    Boolean,
    Json,
    List,
}

impl CodecKind {
    /// Instantiate the codec this name refers to
    pub fn build(self) -> Arc<dyn Codec> {
        match self {
            CodecKind::String => Arc::new(StringCodec),
            CodecKind::Integer => Arc::new(IntegerCodec),
            CodecKind::Number => Arc::new(NumberCodec),
            CodecKind::Boolean => Arc::new(BoolCodec),
            CodecKind::Json => Arc::new(JsonCodec),
            CodecKind::List => Arc::new(ListCodec::default()),
        }
    }
}

impl std::fmt::Display for CodecKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CodecKind::String => write!(f, "string"),
            CodecKind::Integer => write!(f, "integer"),
            CodecKind::Number => write!(f, "number"),
            CodecKind::Boolean => write!(f, "boolean"),
            CodecKind::Json => write!(f, "json"),
            CodecKind::List => write!(f, "list"),
        }
    }
}
