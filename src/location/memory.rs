//! In-memory history stack
//!
//! Behaves like a browser tab's session history for the purposes of the
//! engine: commits never notify listeners (like `pushState`/`replaceState`),
//! while moving through history does (like `popstate`).

use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use tracing::{debug, trace};

use super::{
    HistoryCommitter, HistoryMode, ListenerId, NavigationListener, NavigationSource, UrlReader,
};

struct HistoryStack {
    entries: Vec<String>,
    cursor: usize,
}

/// Session history kept in memory
pub struct MemoryHistory {
    stack: Mutex<HistoryStack>,
    listeners: RwLock<Vec<(ListenerId, NavigationListener)>>,
    next_listener: AtomicU64,
    /// Number of commits performed (push or replace)
    commits: AtomicUsize,
}

impl MemoryHistory {
    /// Create a history with a single entry
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            stack: Mutex::new(HistoryStack {
                entries: vec![url.into()],
                cursor: 0,
            }),
            listeners: RwLock::new(Vec::new()),
            next_listener: AtomicU64::new(1),
            commits: AtomicUsize::new(0),
        }
    }

    /// URL of the current entry
    pub fn current(&self) -> String {
        let stack = self.stack.lock();
        stack.entries[stack.cursor].clone()
    }

    /// All entries, oldest first
    pub fn entries(&self) -> Vec<String> {
        self.stack.lock().entries.clone()
    }

    /// Index of the current entry
    pub fn cursor(&self) -> usize {
        self.stack.lock().cursor
    }

    pub fn len(&self) -> usize {
        self.stack.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// How many commits the engine has made
    pub fn commit_count(&self) -> usize {
        self.commits.load(Ordering::SeqCst)
    }

    /// Go back one entry; returns false at the start of history
    pub fn back(&self) -> bool {
        self.go(-1)
    }

    /// Go forward one entry; returns false at the end of history
    pub fn forward(&self) -> bool {
        self.go(1)
    }

    /// Move `delta` entries through history and notify listeners
    pub fn go(&self, delta: isize) -> bool {
        {
            let mut stack = self.stack.lock();
            let Some(target) = stack.cursor.checked_add_signed(delta) else {
                return false;
            };
            if target >= stack.entries.len() || delta == 0 {
                return false;
            }
            stack.cursor = target;
            debug!(
                "History moved to entry {} of {}: {}",
                target,
                stack.entries.len(),
                stack.entries[target]
            );
        }

        self.notify();
        true
    }

    /// User-driven same-document navigation: push a new entry and notify
    pub fn navigate(&self, url: impl Into<String>) {
        self.push_entry(url.into());
        self.notify();
    }

    fn push_entry(&self, url: String) {
        let mut stack = self.stack.lock();
        let keep = stack.cursor + 1;
        stack.entries.truncate(keep);
        stack.entries.push(url);
        stack.cursor = keep;
    }

    fn notify(&self) {
        // Snapshot so listeners may (un)subscribe while being called
        let listeners: Vec<NavigationListener> = self
            .listeners
            .read()
            .iter()
            .map(|(_, listener)| listener.clone())
            .collect();

        for listener in listeners {
            listener();
        }
    }
}

impl UrlReader for MemoryHistory {
    fn current_url(&self) -> Option<String> {
        Some(self.current())
    }
}

impl HistoryCommitter for MemoryHistory {
    fn commit(&self, url: &str, mode: HistoryMode) {
        match mode {
            HistoryMode::Push => self.push_entry(url.to_string()),
            HistoryMode::Replace => {
                let mut stack = self.stack.lock();
                let cursor = stack.cursor;
                stack.entries[cursor] = url.to_string();
            }
        }
        let count = self.commits.fetch_add(1, Ordering::SeqCst) + 1;
        trace!(url, %mode, "History commit #{}", count);
    }
}

impl NavigationSource for MemoryHistory {
    fn subscribe(&self, listener: NavigationListener) -> ListenerId {
        let id = ListenerId(self.next_listener.fetch_add(1, Ordering::SeqCst));
        self.listeners.write().push((id, listener));
        id
    }

    fn unsubscribe(&self, id: ListenerId) {
        self.listeners.write().retain(|(existing, _)| *existing != id);
    }
}

impl std::fmt::Debug for MemoryHistory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let stack = self.stack.lock();
        f.debug_struct("MemoryHistory")
            .field("entries", &stack.entries)
            .field("cursor", &stack.cursor)
            .field("commits", &self.commits.load(Ordering::SeqCst))
            .finish()
    }
}
