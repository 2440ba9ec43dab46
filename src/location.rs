//! Host capabilities - URL access, history commits, navigation events
//!
//! The synchronization engine never touches a browser directly. Everything it
//! needs from its environment is behind three small traits, bundled together
//! in a [`Host`]:
//!
//! - [`UrlReader`] - read the current URL
//! - [`HistoryCommitter`] - commit a new URL via push or replace, without a reload
//! - [`NavigationSource`] - back/forward notifications
//!
//! Two adapters ship with the crate: [`MemoryHistory`], an in-memory history
//! stack used by tests and the playground binary, and [`Host::detached`] for
//! execution contexts that have no URL at all.

mod detached;
mod memory;

use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub use detached::Detached;
pub use memory::MemoryHistory;

/// How a URL change is committed to history
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, schemars::JsonSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum HistoryMode {
    /// Overwrite the current entry (no new back-button stop)
    #[default]
    Replace,
    /// Add a new history entry
    Push,
}

impl std::fmt::Display for HistoryMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HistoryMode::Replace => write!(f, "replace"),
            HistoryMode::Push => write!(f, "push"),
        }
    }
}

impl std::str::FromStr for HistoryMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "replace" => Ok(HistoryMode::Replace),
            "push" => Ok(HistoryMode::Push),
            other => Err(format!("unknown history mode: {}", other)),
        }
    }
}

/// Identifier returned by [`NavigationSource::subscribe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(pub u64);

/// Callback fired after a back/forward navigation
pub type NavigationListener = Arc<dyn Fn() + Send + Sync>;

/// Read access to the current URL
pub trait UrlReader: Send + Sync {
    /// Absolute URL of the current page, or `None` when there is no URL context
    fn current_url(&self) -> Option<String>;
}

/// Commits URL changes to history without navigating
pub trait HistoryCommitter: Send + Sync {
    fn commit(&self, url: &str, mode: HistoryMode);
}

/// Source of back/forward navigation notifications
pub trait NavigationSource: Send + Sync {
    fn subscribe(&self, listener: NavigationListener) -> ListenerId;

    fn unsubscribe(&self, id: ListenerId);
}

/// The three host capabilities an engine instance runs against
#[derive(Clone)]
pub struct Host {
    reader: Arc<dyn UrlReader>,
    committer: Arc<dyn HistoryCommitter>,
    navigation: Arc<dyn NavigationSource>,
}

impl Host {
    pub fn new(
        reader: Arc<dyn UrlReader>,
        committer: Arc<dyn HistoryCommitter>,
        navigation: Arc<dyn NavigationSource>,
    ) -> Self {
        Self {
            reader,
            committer,
            navigation,
        }
    }

    /// Build a host from one object implementing all three capabilities
    pub fn from_location<L>(location: Arc<L>) -> Self
    where
        L: UrlReader + HistoryCommitter + NavigationSource + 'static,
    {
        Self {
            reader: location.clone(),
            committer: location.clone(),
            navigation: location,
        }
    }

    /// Host for contexts without a URL: reads are empty, writes do nothing
    pub fn detached() -> Self {
        Self::from_location(Arc::new(Detached))
    }

    pub fn reader(&self) -> &dyn UrlReader {
        self.reader.as_ref()
    }

    pub fn committer(&self) -> &dyn HistoryCommitter {
        self.committer.as_ref()
    }

    pub fn navigation(&self) -> &dyn NavigationSource {
        self.navigation.as_ref()
    }
}

impl From<Arc<MemoryHistory>> for Host {
    fn from(history: Arc<MemoryHistory>) -> Self {
        Host::from_location(history)
    }
}
