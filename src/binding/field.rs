//! Typed single-field accessor

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::marker::PhantomData;
use tracing::debug;

use crate::error::{Result, SyncError};
use crate::sync::UrlStateSync;

/// One field of a synchronized state, read and written as `V`
pub struct FieldHandle<V> {
    sync: UrlStateSync,
    name: String,
    _value: PhantomData<fn() -> V>,
}

impl<V> FieldHandle<V> {
    pub(super) fn new(sync: UrlStateSync, name: String) -> Self {
        Self {
            sync,
            name,
            _value: PhantomData,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Remove the field from the snapshot and the URL
    pub fn remove(&self) -> Result<()> {
        self.sync.set(&self.name, None)
    }
}

impl<V: DeserializeOwned> FieldHandle<V> {
    /// Current value, or `None` if absent or not representable as `V`
    pub fn get(&self) -> Option<V> {
        let value = self.sync.get(&self.name)?;
        match serde_json::from_value(value) {
            Ok(value) => Some(value),
            Err(e) => {
                debug!(field = %self.name, error = %e, "Field does not match the requested type");
                None
            }
        }
    }
}

impl<V: Serialize> FieldHandle<V> {
    /// Set the field; `None` removes it
    pub fn set(&self, value: Option<V>) -> Result<()> {
        let value = value
            .map(serde_json::to_value)
            .transpose()
            .map_err(|source| SyncError::Serialize {
                field: self.name.clone(),
                source,
            })?;
        self.sync.set(&self.name, value)
    }
}

impl<V> Clone for FieldHandle<V> {
    fn clone(&self) -> Self {
        Self::new(self.sync.clone(), self.name.clone())
    }
}
