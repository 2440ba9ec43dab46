//! Configuration for a synchronization instance
//!
//! Loaded from YAML. Every field is optional; an empty file yields the same
//! behavior as `SyncOptions::default()` with no defaults.

use anyhow::{Context, Result};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tokio::fs;

use crate::codec::{CodecKind, CodecRegistry};
use crate::location::HistoryMode;
use crate::sync::{Defaults, State, SyncOptions};

/// Root configuration structure
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct SyncConfig {
    /// Key prefix for every field, e.g. `users` gives `users.page`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub history: Option<HistoryMode>,
    /// Debounce window in milliseconds; zero or negative writes synchronously
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub debounce_ms: Option<i64>,
    #[serde(default = "default_true")]
    pub sync_on_navigation: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub share_key: Option<String>,
    /// Per-field codec by name
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub codecs: BTreeMap<String, CodecKind>,
    /// Default state used for fields absent from the URL
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    #[schemars(with = "BTreeMap<String, serde_json::Value>")]
    pub defaults: State,
    /// Initial URL for the playground
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl SyncConfig {
    /// Load configuration from a YAML file
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::from_yaml(&contents)
            .with_context(|| format!("Failed to parse YAML config: {}", path.display()))
    }

    pub fn from_yaml(contents: &str) -> Result<Self> {
        // An empty document deserializes as null
        if contents.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(contents)?)
    }

    /// Save configuration to a YAML file
    pub async fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let yaml = serde_yaml::to_string(self).context("Failed to serialize config")?;
        fs::write(path, yaml)
            .await
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    /// JSON schema of the configuration file, pretty-printed
    pub fn schema() -> Result<String> {
        let schema = schemars::schema_for!(SyncConfig);
        serde_json::to_string_pretty(&schema).context("Failed to serialize config schema")
    }

    /// Split into engine inputs
    pub fn into_parts(self) -> (Defaults, SyncOptions) {
        let mut codecs = CodecRegistry::new();
        for (field, kind) in self.codecs {
            codecs.register(field, kind.build());
        }

        let mut options = SyncOptions::new()
            .codecs(codecs)
            .history(self.history.unwrap_or_default())
            .debounce_ms(self.debounce_ms.map_or(0, |ms| ms.max(0) as u64))
            .sync_on_navigation(self.sync_on_navigation);
        if let Some(namespace) = self.namespace {
            options = options.namespace(namespace);
        }
        if let Some(key) = self.share_key {
            options = options.share_key(key);
        }

        (Defaults::value(self.defaults), options)
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            namespace: None,
            history: None,
            debounce_ms: None,
            sync_on_navigation: true,
            share_key: None,
            codecs: BTreeMap::new(),
            defaults: State::new(),
            url: None,
        }
    }
}

fn default_true() -> bool {
    true
}
