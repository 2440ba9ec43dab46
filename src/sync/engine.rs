//! UrlStateSync - owns the snapshot and exposes the mutation operations

use parking_lot::{Mutex, RwLock};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info};

use super::defaults::Defaults;
use super::options::SyncOptions;
use super::scheduler::{PendingWrite, ScheduledWrite};
use super::types::{
    defined, overlay, patch_of, ChangeEvent, ChangeHandler, ChangeSource, Patch, Sanitize, State,
    SubscriptionId,
};
use crate::codec::CodecRegistry;
use crate::error::{Result, SyncError};
use crate::location::{HistoryMode, Host, ListenerId};
use crate::query::QueryMapper;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lifecycle {
    Ready,
    TornDown,
}

/// Mutable part of an instance, guarded by one lock
pub(super) struct CoreState {
    lifecycle: Lifecycle,
    /// Current snapshot; a `None` slot is a field patched to undefined
    snapshot: Patch,
    pub(super) pending: Option<PendingWrite>,
    /// Bumped on every debounced schedule so stale timers can tell
    pub(super) generation: u64,
    navigation: Option<ListenerId>,
}

pub(super) struct Inner {
    pub(super) mapper: QueryMapper,
    pub(super) host: Host,
    pub(super) history: HistoryMode,
    pub(super) debounce: Option<Duration>,
    sanitize: Option<Sanitize>,
    on_change: Option<ChangeHandler>,
    listeners: RwLock<Vec<(SubscriptionId, ChangeHandler)>>,
    next_subscription: AtomicU64,
    cell: watch::Sender<State>,
    pub(super) core: Mutex<CoreState>,
}

/// Handle to one synchronization instance
///
/// Cheap to clone; all clones drive the same snapshot. The instance is torn
/// down explicitly with [`UrlStateSync::teardown`] or implicitly when the last
/// handle is dropped.
///
/// # Example
///
/// ```ignore
/// let history = Arc::new(MemoryHistory::new("https://app.test/?users.page=7"));
/// let sync = UrlStateSync::initialize(
///     Host::from(history.clone()),
///     Defaults::value(defaults),
///     SyncOptions::new().namespace("users"),
/// );
///
/// sync.set("q", json!("ada"))?;
/// assert_eq!(history.current(), "https://app.test/?users.page=7&users.q=ada");
/// ```
#[derive(Clone)]
pub struct UrlStateSync {
    inner: Arc<Inner>,
}

/// Non-owning handle, used by the shared-instance registry
#[derive(Clone)]
pub(crate) struct WeakSync(Weak<Inner>);

impl WeakSync {
    /// Handle that never upgrades
    pub(crate) fn dangling() -> Self {
        WeakSync(Weak::new())
    }

    pub(crate) fn upgrade(&self) -> Option<UrlStateSync> {
        self.0.upgrade().map(|inner| UrlStateSync { inner })
    }
}

impl UrlStateSync {
    /// Read the URL, merge it over the defaults and start listening for
    /// navigation
    ///
    /// Persisted values win field by field; fields the URL does not mention
    /// keep their default. The sanitize hook sees the URL-derived partial
    /// before the merge.
    pub fn initialize(host: Host, defaults: Defaults, options: SyncOptions) -> Self {
        let SyncOptions {
            namespace,
            codecs,
            sanitize,
            on_change,
            history,
            debounce,
            sync_on_navigation,
            share_key: _,
        } = options;

        let mapper = QueryMapper::new(namespace, Arc::new(codecs));

        let mut snapshot = patch_of(defaults.resolve());
        let persisted = sanitized(&sanitize, mapper.read(host.reader()));
        overlay(&mut snapshot, &persisted);

        let (cell, _) = watch::channel(defined(&snapshot));

        let inner = Arc::new(Inner {
            mapper,
            host,
            history,
            debounce,
            sanitize,
            on_change,
            listeners: RwLock::new(Vec::new()),
            next_subscription: AtomicU64::new(1),
            cell,
            core: Mutex::new(CoreState {
                lifecycle: Lifecycle::Ready,
                snapshot,
                pending: None,
                generation: 0,
                navigation: None,
            }),
        });

        if sync_on_navigation {
            let weak = Arc::downgrade(&inner);
            let id = inner.host.navigation().subscribe(Arc::new(move || {
                if let Some(inner) = weak.upgrade() {
                    inner.reconcile();
                }
            }));
            inner.core.lock().navigation = Some(id);
        }

        info!(
            "URL state sync initialized (namespace: {:?}, {} persisted of {} fields, debounce: {:?})",
            inner.mapper.namespace(),
            persisted.len(),
            inner.core.lock().snapshot.len(),
            inner.debounce
        );

        Self { inner }
    }

    pub fn namespace(&self) -> Option<&str> {
        self.inner.mapper.namespace()
    }

    /// False once the instance has been torn down
    pub fn is_ready(&self) -> bool {
        self.inner.core.lock().lifecycle == Lifecycle::Ready
    }

    /// Current snapshot (defined fields only)
    pub fn state(&self) -> State {
        defined(&self.inner.core.lock().snapshot)
    }

    /// Current snapshot deserialized into a typed record
    pub fn state_as<T: DeserializeOwned>(&self) -> std::result::Result<T, serde_json::Error> {
        serde_json::from_value(Value::Object(self.state()))
    }

    /// Current value of one field; never touches the URL
    pub fn get(&self, field: &str) -> Option<Value> {
        self.inner.core.lock().snapshot.get(field).cloned().flatten()
    }

    /// Set one field, or remove it when `value` is `None`
    pub fn set(&self, field: &str, value: impl Into<Option<Value>>) -> Result<()> {
        let value = value.into();
        let base = self.inner.mutate(|snapshot| match &value {
            Some(v) => {
                snapshot.insert(field.to_string(), Some(v.clone()));
            }
            None => {
                snapshot.shift_remove(field);
            }
        })?;

        let mut payload = Patch::new();
        payload.insert(field.to_string(), value);
        self.inner
            .schedule(ScheduledWrite::new(payload, ChangeSource::Patch, base))
    }

    /// Shallow-merge several fields
    ///
    /// A `None` entry keeps an empty slot in the snapshot (the field reads as
    /// absent) and removes the key from the URL. An empty patch writes an
    /// empty payload, which removes every key under the namespace.
    pub fn patch<I, K>(&self, entries: I) -> Result<()>
    where
        I: IntoIterator<Item = (K, Option<Value>)>,
        K: Into<String>,
    {
        let payload: Patch = entries.into_iter().map(|(k, v)| (k.into(), v)).collect();

        let base = self.inner.mutate(|snapshot| {
            for (field, value) in &payload {
                snapshot.insert(field.clone(), value.clone());
            }
        })?;

        self.inner
            .schedule(ScheduledWrite::new(payload, ChangeSource::Patch, base))
    }

    /// Remove the named fields from the snapshot and the URL
    ///
    /// Like [`UrlStateSync::patch`], an empty list clears the namespace.
    pub fn remove<I, K>(&self, fields: I) -> Result<()>
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        let payload: Patch = fields.into_iter().map(|f| (f.into(), None)).collect();

        let base = self.inner.mutate(|snapshot| {
            for field in payload.keys() {
                snapshot.shift_remove(field);
            }
        })?;

        self.inner
            .schedule(ScheduledWrite::new(payload, ChangeSource::Patch, base))
    }

    /// Replace the whole state
    ///
    /// Only the fields of `next` are written. Keys that existed before but are
    /// absent from `next` stay in the URL unless removed explicitly.
    pub fn replace(&self, next: State) -> Result<()> {
        let next = patch_of(next);
        let base = self.inner.mutate(|snapshot| *snapshot = next.clone())?;

        self.inner
            .schedule(ScheduledWrite::new(next, ChangeSource::Set, base))
    }

    /// Replace the whole state with a function of the current one
    ///
    /// The updater runs outside the instance lock and may read the handle.
    pub fn replace_with<F>(&self, updater: F) -> Result<()>
    where
        F: FnOnce(&State) -> State,
    {
        self.inner.ensure_ready()?;
        let next = updater(&self.state());
        self.replace(next)
    }

    /// Empty the snapshot and remove every key under the namespace
    pub fn clear(&self) -> Result<()> {
        let base = self.inner.mutate(|snapshot| snapshot.clear())?;

        self.inner
            .schedule(ScheduledWrite::cleared(ChangeSource::Set, base))
    }

    /// Write a pending debounced payload now instead of waiting for the timer
    pub fn flush(&self) -> Result<()> {
        self.inner.flush_pending()
    }

    /// Register for change notifications (flushes and external navigation)
    pub fn subscribe<F>(&self, listener: F) -> SubscriptionId
    where
        F: Fn(&ChangeEvent) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.inner.next_subscription.fetch_add(1, Ordering::SeqCst));
        self.inner.listeners.write().push((id, Arc::new(listener)));
        id
    }

    /// Returns false if the subscription was not registered
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut listeners = self.inner.listeners.write();
        let before = listeners.len();
        listeners.retain(|(existing, _)| *existing != id);
        listeners.len() != before
    }

    /// Reactive cell holding the snapshot, updated on every mutation
    pub fn watch(&self) -> watch::Receiver<State> {
        self.inner.cell.subscribe()
    }

    /// Stop listening for navigation and drop any pending write unflushed
    pub fn teardown(&self) {
        let navigation = {
            let mut core = self.inner.core.lock();
            if core.lifecycle == Lifecycle::TornDown {
                return;
            }
            core.lifecycle = Lifecycle::TornDown;
            if let Some(pending) = core.pending.take() {
                debug!(
                    "Discarding pending write of {} fields on teardown",
                    pending.payload.len()
                );
                pending.cancel();
            }
            core.navigation.take()
        };

        if let Some(id) = navigation {
            self.inner.host.navigation().unsubscribe(id);
        }
        info!(
            "URL state sync torn down (namespace: {:?})",
            self.inner.mapper.namespace()
        );
    }

    pub(crate) fn downgrade(&self) -> WeakSync {
        WeakSync(Arc::downgrade(&self.inner))
    }

    /// Codecs in use by this instance
    pub fn codecs(&self) -> &CodecRegistry {
        self.inner.mapper.codecs()
    }
}

impl Inner {
    pub(super) fn ensure_ready(&self) -> Result<()> {
        match self.core.lock().lifecycle {
            Lifecycle::Ready => Ok(()),
            Lifecycle::TornDown => Err(SyncError::TornDown),
        }
    }

    /// Apply `change` to the snapshot and publish it; returns the new snapshot
    fn mutate<F>(&self, change: F) -> Result<Patch>
    where
        F: FnOnce(&mut Patch),
    {
        let snapshot = {
            let mut core = self.core.lock();
            if core.lifecycle == Lifecycle::TornDown {
                return Err(SyncError::TornDown);
            }
            change(&mut core.snapshot);
            core.snapshot.clone()
        };

        self.cell.send_replace(defined(&snapshot));
        Ok(snapshot)
    }

    pub(super) fn sanitized(&self, patch: Patch) -> Patch {
        sanitized(&self.sanitize, patch)
    }

    /// Pull the URL back into the snapshot after back/forward navigation
    ///
    /// Fields present in the URL overwrite, fields sanitized to `None` are
    /// removed, and fields the URL does not mention are left alone.
    fn reconcile(&self) {
        let incoming = self.sanitized(self.mapper.read(self.host.reader()));

        let state = {
            let mut core = self.core.lock();
            if core.lifecycle == Lifecycle::TornDown {
                return;
            }
            overlay(&mut core.snapshot, &incoming);
            defined(&core.snapshot)
        };

        debug!(
            "Reconciled {} fields from navigation (namespace: {:?})",
            incoming.len(),
            self.mapper.namespace()
        );
        self.cell.send_replace(state.clone());
        self.notify(ChangeEvent {
            state,
            source: ChangeSource::External,
        });
    }

    /// Invoke the `on_change` hook and every subscriber, outside all locks
    pub(super) fn notify(&self, event: ChangeEvent) {
        if let Some(on_change) = &self.on_change {
            on_change(&event);
        }

        let listeners: Vec<ChangeHandler> = self
            .listeners
            .read()
            .iter()
            .map(|(_, listener)| listener.clone())
            .collect();
        for listener in listeners {
            listener(&event);
        }
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        let core = self.core.get_mut();
        if let Some(pending) = core.pending.take() {
            pending.cancel();
        }
        if let Some(id) = core.navigation.take() {
            self.host.navigation().unsubscribe(id);
        }
    }
}

fn sanitized(sanitize: &Option<Sanitize>, patch: Patch) -> Patch {
    match sanitize {
        Some(sanitize) => sanitize(patch),
        None => patch,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{CodecError, FnCodec, IntegerCodec};
    use crate::location::{HistoryCommitter, MemoryHistory};
    use serde::Deserialize;
    use serde_json::json;

    fn state(value: Value) -> State {
        value.as_object().cloned().unwrap_or_default()
    }

    fn setup(
        url: &str,
        defaults: Value,
        options: SyncOptions,
    ) -> (Arc<MemoryHistory>, UrlStateSync) {
        let history = Arc::new(MemoryHistory::new(url));
        let sync = UrlStateSync::initialize(
            Host::from(history.clone()),
            Defaults::value(state(defaults)),
            options,
        );
        (history, sync)
    }

    fn recorder(sync: &UrlStateSync) -> Arc<Mutex<Vec<ChangeEvent>>> {
        let events = Arc::new(Mutex::new(Vec::new()));
        let events_clone = events.clone();
        sync.subscribe(move |event| events_clone.lock().push(event.clone()));
        events
    }

    #[test]
    fn test_initialize_merges_url_over_defaults() {
        let (_, sync) = setup(
            "https://app.test/?ns.page=7",
            json!({"q": "", "page": 1, "sort": "asc"}),
            SyncOptions::new().namespace("ns"),
        );

        assert_eq!(
            Value::Object(sync.state()),
            json!({"q": "", "page": 7, "sort": "asc"})
        );
    }

    #[test]
    fn test_initialize_applies_sanitize_to_persisted() {
        let (_, sync) = setup(
            "https://app.test/?page=-4&q=hi",
            json!({"page": 1}),
            SyncOptions::new().sanitize(|mut patch: Patch| {
                if let Some(Some(page)) = patch.get("page") {
                    if page.as_i64().unwrap_or(0) < 1 {
                        patch.insert("page".to_string(), Some(json!(1)));
                    }
                }
                patch
            }),
        );

        assert_eq!(sync.get("page"), Some(json!(1)));
        assert_eq!(sync.get("q"), Some(json!("hi")));
    }

    #[test]
    fn test_set_writes_synchronously() {
        let (history, sync) = setup(
            "https://app.test/",
            json!({}),
            SyncOptions::new().namespace("users"),
        );

        sync.set("email", json!("john@example.com")).unwrap();
        assert_eq!(sync.get("email"), Some(json!("john@example.com")));
        assert_eq!(history.current(), "https://app.test/?users.email=john%40example.com");
        assert_eq!(history.commit_count(), 1);
    }

    #[test]
    fn test_set_none_removes_field() {
        let (history, sync) = setup(
            "https://app.test/?q=abc&page=2",
            json!({}),
            SyncOptions::new(),
        );

        sync.set("q", None).unwrap();
        assert_eq!(sync.get("q"), None);
        assert_eq!(history.current(), "https://app.test/?page=2");
    }

    #[test]
    fn test_set_notifies_with_patch_source() {
        let (_, sync) = setup("https://app.test/", json!({"page": 1}), SyncOptions::new());
        let events = recorder(&sync);

        sync.set("page", json!(2)).unwrap();

        let events = events.lock();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].source, ChangeSource::Patch);
        assert_eq!(Value::Object(events[0].state.clone()), json!({"page": 2}));
    }

    #[test]
    fn test_patch_keeps_undefined_slot_but_deletes_key() {
        let (history, sync) = setup(
            "https://app.test/?q=abc&page=2",
            json!({}),
            SyncOptions::new(),
        );

        sync.patch([("q", None), ("page", Some(json!(3)))]).unwrap();

        assert_eq!(sync.get("q"), None);
        assert_eq!(Value::Object(sync.state()), json!({"page": 3}));
        assert_eq!(sync.inner.core.lock().snapshot.get("q"), Some(&None));
        assert_eq!(history.current(), "https://app.test/?page=3");
    }

    fn namespaced(url: &str) -> (Arc<MemoryHistory>, UrlStateSync) {
        setup(url, json!({}), SyncOptions::new().namespace("ns"))
    }

    #[test]
    fn test_empty_patch_clears_namespace() {
        let (history, sync) = namespaced("https://app.test/?ns.q=a&ns.page=2&other=1");

        sync.patch(Vec::<(String, Option<Value>)>::new()).unwrap();
        assert_eq!(history.current(), "https://app.test/?other=1");
        assert_eq!(history.commit_count(), 1);
        // The snapshot itself is untouched by an empty patch
        assert_eq!(Value::Object(sync.state()), json!({"q": "a", "page": 2}));
    }

    #[test]
    fn test_empty_remove_clears_namespace() {
        let (history, sync) = namespaced("https://app.test/?ns.q=a&ns.page=2&other=1");

        sync.remove(Vec::<String>::new()).unwrap();
        assert_eq!(history.current(), "https://app.test/?other=1");
    }

    #[test]
    fn test_replace_with_empty_state_clears_namespace() {
        let (history, sync) = namespaced("https://app.test/?ns.q=a&ns.page=2&other=1");
        let events = recorder(&sync);

        sync.replace(State::new()).unwrap();
        assert!(sync.state().is_empty());
        assert_eq!(history.current(), "https://app.test/?other=1");
        assert_eq!(history.commit_count(), 1);
        assert_eq!(events.lock()[0].source, ChangeSource::Set);
    }

    #[test]
    fn test_sanitized_to_empty_clears_namespace() {
        let (history, sync) = setup(
            "https://app.test/?ns.q=a&other=1",
            json!({}),
            SyncOptions::new()
                .namespace("ns")
                .sanitize(|patch: Patch| {
                    patch
                        .into_iter()
                        .filter(|(field, _)| field != "secret")
                        .collect()
                }),
        );

        sync.set("secret", json!("x")).unwrap();
        assert_eq!(history.current(), "https://app.test/?other=1");
        assert_eq!(history.commit_count(), 1);
    }

    #[test]
    fn test_empty_patch_without_namespace_keeps_query() {
        let (history, sync) = setup("https://app.test/?q=a", json!({}), SyncOptions::new());

        sync.patch(Vec::<(String, Option<Value>)>::new()).unwrap();
        assert_eq!(history.current(), "https://app.test/?q=a");
    }

    #[test]
    fn test_remove_fields() {
        let (history, sync) = setup(
            "https://app.test/?ns.q=abc&ns.page=2&ns.sort=asc",
            json!({}),
            SyncOptions::new().namespace("ns"),
        );
        let events = recorder(&sync);

        sync.remove(["q", "sort"]).unwrap();
        assert_eq!(Value::Object(sync.state()), json!({"page": 2}));
        assert_eq!(history.current(), "https://app.test/?ns.page=2");
        assert_eq!(events.lock()[0].source, ChangeSource::Patch);
    }

    #[test]
    fn test_replace_keeps_stale_keys_in_url() {
        // Known quirk: replace writes only the new fields
        let (history, sync) = setup(
            "https://app.test/?q=abc&page=2",
            json!({}),
            SyncOptions::new(),
        );
        let events = recorder(&sync);

        sync.replace(state(json!({"page": 5}))).unwrap();

        assert_eq!(Value::Object(sync.state()), json!({"page": 5}));
        assert_eq!(history.current(), "https://app.test/?q=abc&page=5");
        assert_eq!(events.lock()[0].source, ChangeSource::Set);
    }

    #[test]
    fn test_replace_with_updater() {
        let (_, sync) = setup("https://app.test/?page=2", json!({}), SyncOptions::new());

        sync.replace_with(|prev| {
            let mut next = prev.clone();
            let page = prev.get("page").and_then(Value::as_i64).unwrap_or(0);
            next.insert("page".to_string(), json!(page + 1));
            next
        })
        .unwrap();

        assert_eq!(sync.get("page"), Some(json!(3)));
    }

    #[test]
    fn test_clear_removes_namespace_only() {
        let (history, sync) = setup(
            "https://app.test/?ns.q=test&ns.page=5&other=keep",
            json!({}),
            SyncOptions::new().namespace("ns"),
        );

        sync.clear().unwrap();
        assert!(sync.state().is_empty());
        assert_eq!(history.current(), "https://app.test/?other=keep");
    }

    #[test]
    fn test_push_history_mode() {
        let (history, sync) = setup(
            "https://app.test/",
            json!({}),
            SyncOptions::new().history(HistoryMode::Push),
        );

        sync.set("page", json!(2)).unwrap();
        sync.set("page", json!(3)).unwrap();
        assert_eq!(history.len(), 3);
    }

    #[test]
    fn test_format_error_propagates_without_rollback() {
        let (history, sync) = setup(
            "https://app.test/?page=1",
            json!({}),
            SyncOptions::new().codec("page", IntegerCodec),
        );

        let err = sync.set("page", json!("seven")).unwrap_err();
        assert!(matches!(err, SyncError::Format { ref field, .. } if field == "page"));

        // Snapshot and URL diverge after a format error
        assert_eq!(sync.get("page"), Some(json!("seven")));
        assert_eq!(history.current(), "https://app.test/?page=1");
    }

    #[test]
    fn test_codec_parse_error_falls_back_to_default() {
        let (_, sync) = setup(
            "https://app.test/?page=invalid&q=shoes",
            json!({"page": 1, "q": ""}),
            SyncOptions::new().codec(
                "page",
                FnCodec::new(
                    |raw| {
                        raw.parse::<i64>()
                            .map(Value::from)
                            .map_err(|e| CodecError::parse(raw, e.to_string()))
                    },
                    |value| Ok(value.to_string()),
                ),
            ),
        );

        assert_eq!(sync.get("page"), Some(json!(1)));
        assert_eq!(sync.get("q"), Some(json!("shoes")));
    }

    #[test]
    fn test_sanitize_applies_to_outgoing_payload_only() {
        let (history, sync) = setup(
            "https://app.test/",
            json!({}),
            SyncOptions::new().sanitize(|patch: Patch| {
                patch
                    .into_iter()
                    .map(|(k, v)| {
                        let v = v.map(|v| match v {
                            Value::String(s) => Value::String(s.trim().to_string()),
                            other => other,
                        });
                        (k, v)
                    })
                    .collect()
            }),
        );
        let events = recorder(&sync);

        sync.set("q", json!("  padded  ")).unwrap();
        assert_eq!(sync.get("q"), Some(json!("  padded  ")));
        assert_eq!(history.current(), "https://app.test/?q=padded");
        assert_eq!(events.lock()[0].state["q"], json!("padded"));
    }

    #[test]
    fn test_external_navigation_reconciles_owned_fields() {
        let (history, sync) = setup(
            "https://app.test/?ns.q=abc&ns.page=3",
            json!({}),
            SyncOptions::new().namespace("ns").history(HistoryMode::Push),
        );
        history.navigate("https://app.test/?ns.q=xyz");
        let events = recorder(&sync);

        // Already applied by the navigate() notification; go back and forth
        assert_eq!(Value::Object(sync.state()), json!({"q": "xyz", "page": 3}));
        history.back();
        history.forward();

        let events = events.lock();
        assert_eq!(events.len(), 2);
        assert_eq!(events[1].source, ChangeSource::External);
        assert_eq!(Value::Object(events[1].state.clone()), json!({"q": "xyz", "page": 3}));
    }

    #[test]
    fn test_reconcile_does_not_write_back() {
        let (history, _sync) = setup("https://app.test/?q=a", json!({}), SyncOptions::new());
        history.commit("https://app.test/?q=b", HistoryMode::Push);
        history.back();
        assert_eq!(history.current(), "https://app.test/?q=a");
        assert_eq!(history.commit_count(), 1);
    }

    #[test]
    fn test_sync_on_navigation_disabled() {
        let (history, sync) = setup(
            "https://app.test/?q=a",
            json!({}),
            SyncOptions::new().sync_on_navigation(false),
        );
        history.navigate("https://app.test/?q=b");
        assert_eq!(sync.get("q"), Some(json!("a")));
    }

    #[test]
    fn test_on_change_option_sees_events() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = seen.clone();
        let (_, sync) = setup(
            "https://app.test/",
            json!({}),
            SyncOptions::new().on_change(move |event| seen_clone.lock().push(event.source)),
        );

        sync.set("a", json!(1)).unwrap();
        sync.replace(state(json!({"b": 2}))).unwrap();
        assert_eq!(*seen.lock(), vec![ChangeSource::Patch, ChangeSource::Set]);
    }

    #[test]
    fn test_listener_may_reenter_handle() {
        let (_, sync) = setup("https://app.test/", json!({}), SyncOptions::new());
        let reader = sync.clone();
        let seen = Arc::new(Mutex::new(None));
        let seen_clone = seen.clone();
        sync.subscribe(move |_| *seen_clone.lock() = reader.get("a"));

        sync.set("a", json!(1)).unwrap();
        assert_eq!(*seen.lock(), Some(json!(1)));
    }

    #[test]
    fn test_unsubscribe() {
        let (_, sync) = setup("https://app.test/", json!({}), SyncOptions::new());
        let events = Arc::new(Mutex::new(0));
        let events_clone = events.clone();
        let id = sync.subscribe(move |_| *events_clone.lock() += 1);

        sync.set("a", json!(1)).unwrap();
        assert!(sync.unsubscribe(id));
        assert!(!sync.unsubscribe(id));
        sync.set("a", json!(2)).unwrap();
        assert_eq!(*events.lock(), 1);
    }

    #[test]
    fn test_teardown_stops_everything() {
        let (history, sync) = setup("https://app.test/?q=a", json!({}), SyncOptions::new());

        sync.teardown();
        assert!(!sync.is_ready());
        assert!(matches!(sync.set("q", json!("b")), Err(SyncError::TornDown)));

        history.navigate("https://app.test/?q=c");
        assert_eq!(sync.get("q"), Some(json!("a")));
        assert_eq!(history.commit_count(), 0);
    }

    #[test]
    fn test_dropping_last_handle_unsubscribes() {
        let (history, sync) = setup("https://app.test/", json!({}), SyncOptions::new());
        let weak = sync.downgrade();
        drop(sync);

        assert!(weak.upgrade().is_none());
        history.navigate("https://app.test/?q=x");
    }

    #[test]
    fn test_namespace_isolation() {
        let history = Arc::new(MemoryHistory::new("https://app.test/?q=bare&products.q=shoes"));
        let users = UrlStateSync::initialize(
            Host::from(history.clone()),
            Defaults::none(),
            SyncOptions::new().namespace("users"),
        );

        users.set("q", json!("ada")).unwrap();
        users.remove(["q"]).unwrap();
        users.set("q", json!("grace")).unwrap();
        users.clear().unwrap();

        assert_eq!(history.current(), "https://app.test/?q=bare&products.q=shoes");
    }

    #[test]
    fn test_detached_host_uses_defaults() {
        let sync = UrlStateSync::initialize(
            Host::detached(),
            Defaults::value(state(json!({"page": 1}))),
            SyncOptions::new().namespace("ns"),
        );
        assert_eq!(sync.get("page"), Some(json!(1)));
        sync.set("page", json!(2)).unwrap();
        assert_eq!(sync.get("page"), Some(json!(2)));
    }

    #[test]
    fn test_state_as_typed() {
        #[derive(Debug, Deserialize, PartialEq)]
        struct Filters {
            q: String,
            page: u32,
        }

        let (_, sync) = setup(
            "https://app.test/?page=4",
            json!({"q": "", "page": 1}),
            SyncOptions::new(),
        );
        assert_eq!(
            sync.state_as::<Filters>().unwrap(),
            Filters {
                q: String::new(),
                page: 4
            }
        );
    }

    #[test]
    fn test_watch_cell_tracks_every_mutation() {
        let (_, sync) = setup("https://app.test/", json!({}), SyncOptions::new());
        let rx = sync.watch();

        sync.set("a", json!(1)).unwrap();
        assert_eq!(rx.borrow()["a"], json!(1));
        sync.clear().unwrap();
        assert!(rx.borrow().is_empty());
    }
}
