//! Per-field codec lookup

use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

use super::{default_format, default_parse, Codec, CodecError};

/// Maps field names to their codecs
///
/// Fields without an entry use the default serializer. Cloning is cheap; the
/// codecs themselves are shared.
#[derive(Clone, Default)]
pub struct CodecRegistry {
    codecs: HashMap<String, Arc<dyn Codec>>,
}

impl CodecRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style registration
    pub fn with<C>(mut self, field: impl Into<String>, codec: C) -> Self
    where
        C: Codec + 'static,
    {
        self.register(field, Arc::new(codec));
        self
    }

    /// Register (or replace) the codec for a field
    pub fn register(&mut self, field: impl Into<String>, codec: Arc<dyn Codec>) {
        self.codecs.insert(field.into(), codec);
    }

    pub fn get(&self, field: &str) -> Option<&Arc<dyn Codec>> {
        self.codecs.get(field)
    }

    pub fn is_empty(&self) -> bool {
        self.codecs.is_empty()
    }

    /// Format a field's value with its codec or the default serializer
    pub fn format(&self, field: &str, value: &Value) -> Result<String, CodecError> {
        match self.codecs.get(field) {
            Some(codec) => codec.format(value),
            None => default_format(value),
        }
    }

    /// Parse a field's raw text with its codec or the default serializer
    ///
    /// The default serializer never fails; only custom codecs return errors.
    pub fn parse(&self, field: &str, raw: &str) -> Result<Value, CodecError> {
        match self.codecs.get(field) {
            Some(codec) => codec.parse(raw),
            None => Ok(default_parse(raw)),
        }
    }
}

impl std::fmt::Debug for CodecRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut fields: Vec<&String> = self.codecs.keys().collect();
        fields.sort();
        f.debug_struct("CodecRegistry").field("fields", &fields).finish()
    }
}
