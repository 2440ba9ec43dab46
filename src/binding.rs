//! Reactive binding - exposes one synchronization instance to a UI layer
//!
//! A [`Binding`] pairs a [`UrlStateSync`] handle with a `tokio::sync::watch`
//! receiver, so a component can render the current snapshot and await the
//! next change. [`FieldHandle`] narrows a binding to one typed field.
//!
//! Whether independent call sites share one engine is decided by
//! [`SyncRegistry`]: bindings created with the same `share_key` reuse the live
//! instance (and so coalesce debounced writes across fields), anything else
//! gets its own instance.

mod field;
mod registry;

use std::ops::Deref;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;

use crate::sync::{State, UrlStateSync};

pub use field::FieldHandle;
pub use registry::SyncRegistry;

/// UI-facing view of a synchronization instance
///
/// Dereferences to [`UrlStateSync`] for the mutation operations.
#[derive(Clone)]
pub struct Binding {
    sync: UrlStateSync,
    rx: watch::Receiver<State>,
}

impl Binding {
    pub fn new(sync: UrlStateSync) -> Self {
        let rx = sync.watch();
        Self { sync, rx }
    }

    /// Snapshot as last published
    pub fn state(&self) -> State {
        self.rx.borrow().clone()
    }

    /// Wait for the snapshot to change
    ///
    /// The binding keeps its instance alive, so this only returns `None` if
    /// the watch channel is closed, which does not happen while `self` exists.
    pub async fn changed(&mut self) -> Option<State> {
        self.rx.changed().await.ok()?;
        Some(self.rx.borrow_and_update().clone())
    }

    /// Snapshot changes as a stream, starting with the current value
    pub fn stream(&self) -> WatchStream<State> {
        WatchStream::new(self.rx.clone())
    }

    /// Typed accessor for one field of this instance
    pub fn field<V>(&self, name: impl Into<String>) -> FieldHandle<V> {
        FieldHandle::new(self.sync.clone(), name.into())
    }

    pub fn sync(&self) -> &UrlStateSync {
        &self.sync
    }
}

impl Deref for Binding {
    type Target = UrlStateSync;

    fn deref(&self) -> &Self::Target {
        &self.sync
    }
}

impl From<UrlStateSync> for Binding {
    fn from(sync: UrlStateSync) -> Self {
        Binding::new(sync)
    }
}
