//! Host adapter for execution contexts without a URL (servers, workers, CLIs)

use tracing::trace;

use super::{HistoryCommitter, ListenerId, NavigationListener, NavigationSource, UrlReader};

/// Has no URL, drops every commit, never navigates
#[derive(Debug, Clone, Copy, Default)]
pub struct Detached;

impl UrlReader for Detached {
    fn current_url(&self) -> Option<String> {
        None
    }
}

impl HistoryCommitter for Detached {
    fn commit(&self, url: &str, mode: super::HistoryMode) {
        trace!(url, %mode, "Detached host ignoring commit");
    }
}

impl NavigationSource for Detached {
    fn subscribe(&self, _listener: NavigationListener) -> ListenerId {
        ListenerId(0)
    }

    fn unsubscribe(&self, _id: ListenerId) {}
}
