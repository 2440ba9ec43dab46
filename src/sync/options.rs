//! Per-instance configuration

use std::sync::Arc;
use std::time::Duration;

use super::types::{ChangeEvent, ChangeHandler, Patch, Sanitize};
use crate::codec::{Codec, CodecRegistry};
use crate::location::HistoryMode;

/// Options recognized by [`super::UrlStateSync::initialize`]
///
/// ```ignore
/// let options = SyncOptions::new()
///     .namespace("users")
///     .codec("page", IntegerCodec)
///     .history(HistoryMode::Push)
///     .debounce_ms(150);
/// ```
#[derive(Clone)]
pub struct SyncOptions {
    /// Key prefix; `None` means bare keys
    pub namespace: Option<String>,
    pub codecs: CodecRegistry,
    pub sanitize: Option<Sanitize>,
    pub on_change: Option<ChangeHandler>,
    /// Default: replace
    pub history: HistoryMode,
    /// `None` writes synchronously
    pub debounce: Option<Duration>,
    /// Default: true
    pub sync_on_navigation: bool,
    /// Instances bound through a registry with the same key share one engine
    pub share_key: Option<String>,
}

impl SyncOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    pub fn codec<C>(mut self, field: impl Into<String>, codec: C) -> Self
    where
        C: Codec + 'static,
    {
        self.codecs.register(field, Arc::new(codec));
        self
    }

    pub fn codecs(mut self, codecs: CodecRegistry) -> Self {
        self.codecs = codecs;
        self
    }

    pub fn sanitize<F>(mut self, sanitize: F) -> Self
    where
        F: Fn(Patch) -> Patch + Send + Sync + 'static,
    {
        self.sanitize = Some(Arc::new(sanitize));
        self
    }

    pub fn on_change<F>(mut self, on_change: F) -> Self
    where
        F: Fn(&ChangeEvent) + Send + Sync + 'static,
    {
        self.on_change = Some(Arc::new(on_change));
        self
    }

    pub fn history(mut self, history: HistoryMode) -> Self {
        self.history = history;
        self
    }

    /// Zero disables debouncing
    pub fn debounce_ms(self, ms: u64) -> Self {
        self.debounce(Duration::from_millis(ms))
    }

    pub fn debounce(mut self, delay: Duration) -> Self {
        self.debounce = (!delay.is_zero()).then_some(delay);
        self
    }

    pub fn sync_on_navigation(mut self, enabled: bool) -> Self {
        self.sync_on_navigation = enabled;
        self
    }

    pub fn share_key(mut self, key: impl Into<String>) -> Self {
        self.share_key = Some(key.into());
        self
    }
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            namespace: None,
            codecs: CodecRegistry::new(),
            sanitize: None,
            on_change: None,
            history: HistoryMode::Replace,
            debounce: None,
            sync_on_navigation: true,
            share_key: None,
        }
    }
}

impl std::fmt::Debug for SyncOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncOptions")
            .field("namespace", &self.namespace)
            .field("codecs", &self.codecs)
            .field("sanitize", &self.sanitize.is_some())
            .field("on_change", &self.on_change.is_some())
            .field("history", &self.history)
            .field("debounce", &self.debounce)
            .field("sync_on_navigation", &self.sync_on_navigation)
            .field("share_key", &self.share_key)
            .finish()
    }
}
