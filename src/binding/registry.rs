//! Shared-instance registry keyed by `share_key`

use dashmap::DashMap;
use tracing::debug;

use super::Binding;
use crate::location::Host;
use crate::sync::{Defaults, SyncOptions, UrlStateSync, WeakSync};

/// Hands out bindings, reusing live instances that share a key
///
/// Entries are weak: once every binding of a shared instance is dropped the
/// instance tears itself down and the next `bind` with that key creates a
/// fresh one.
#[derive(Default)]
pub struct SyncRegistry {
    instances: DashMap<String, WeakSync>,
}

impl SyncRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind to an instance
    ///
    /// Without a `share_key` every call initializes a new instance. With one,
    /// a live instance registered under the same key is reused and `host`,
    /// `defaults` and the remaining options are ignored.
    pub fn bind(&self, host: Host, defaults: Defaults, options: SyncOptions) -> Binding {
        let Some(key) = options.share_key.clone() else {
            return Binding::new(UrlStateSync::initialize(host, defaults, options));
        };

        if let Some(sync) = self.get(&key) {
            debug!("Reusing shared URL state instance '{}'", key);
            return Binding::new(sync);
        }

        // Built without holding a shard lock: the defaults factory and the
        // sanitize hook may call back into this registry
        let sync = UrlStateSync::initialize(host, defaults, options);

        let mut entry = self.instances.entry(key.clone()).or_insert_with(WeakSync::dangling);
        if let Some(existing) = entry.upgrade().filter(UrlStateSync::is_ready) {
            debug!("Shared URL state instance '{}' registered concurrently, reusing it", key);
            drop(entry);
            sync.teardown();
            return Binding::new(existing);
        }
        *entry = sync.downgrade();
        debug!("Registered shared URL state instance '{}'", key);
        Binding::new(sync)
    }

    /// Live instance registered under `key`
    pub fn get(&self, key: &str) -> Option<UrlStateSync> {
        self.instances.get(key)?.upgrade().filter(UrlStateSync::is_ready)
    }

    /// Drop entries whose instance is gone; returns how many remain
    pub fn prune(&self) -> usize {
        self.instances
            .retain(|_, weak| weak.upgrade().is_some_and(|sync| sync.is_ready()));
        self.instances.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::location::MemoryHistory;
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;

    fn host() -> (Arc<MemoryHistory>, Host) {
        let history = Arc::new(MemoryHistory::new("https://app.test/"));
        let host = Host::from(history.clone());
        (history, host)
    }

    #[test]
    fn test_unkeyed_bindings_are_independent() {
        let registry = SyncRegistry::new();
        let (_, host) = host();

        let a = registry.bind(host.clone(), Defaults::none(), SyncOptions::new());
        let b = registry.bind(host, Defaults::none(), SyncOptions::new());

        a.set("q", json!("x")).unwrap();
        assert_eq!(b.get("q"), None);
    }

    #[test]
    fn test_shared_key_reuses_instance() {
        let registry = SyncRegistry::new();
        let (_, host) = host();
        let options = || SyncOptions::new().namespace("grid").share_key("grid");

        let a = registry.bind(host.clone(), Defaults::none(), options());
        let b = registry.bind(host, Defaults::none(), options());

        a.set("page", json!(2)).unwrap();
        assert_eq!(b.get("page"), Some(json!(2)));
        assert!(registry.get("grid").is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_shared_instance_coalesces_writes_across_fields() {
        let registry = SyncRegistry::new();
        let (history, host) = host();
        let options = || SyncOptions::new().share_key("filters").debounce_ms(100);

        let sort = registry.bind(host.clone(), Defaults::none(), options());
        let page = registry.bind(host, Defaults::none(), options());

        sort.field::<String>("sort").set(Some("asc".to_string())).unwrap();
        page.field::<i64>("page").set(Some(3)).unwrap();

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(history.commit_count(), 1);
        assert_eq!(history.current(), "https://app.test/?sort=asc&page=3");
    }

    #[test]
    fn test_dropped_instance_is_replaced() {
        let registry = SyncRegistry::new();
        let (_, host) = host();
        let options = || SyncOptions::new().share_key("k");

        let first = registry.bind(host.clone(), Defaults::none(), options());
        first.set("q", json!("old")).unwrap();
        drop(first);

        assert!(registry.get("k").is_none());
        assert_eq!(registry.prune(), 0);

        let second = registry.bind(host, Defaults::none(), options());
        assert_eq!(second.get("q"), Some(json!("old")));
    }

    #[test]
    fn test_defaults_factory_may_use_registry() {
        let registry = Arc::new(SyncRegistry::new());
        let (_, host) = host();

        let lookup = registry.clone();
        let defaults = Defaults::factory(move || {
            let mut state = crate::sync::State::new();
            state.insert("seen".to_string(), json!(lookup.get("k").is_some()));
            state
        });

        let binding = registry.bind(host, defaults, SyncOptions::new().share_key("k"));
        assert_eq!(binding.get("seen"), Some(json!(false)));
        assert!(registry.get("k").is_some());
    }

    #[test]
    fn test_torn_down_instance_is_replaced() {
        let registry = SyncRegistry::new();
        let (_, host) = host();
        let options = || SyncOptions::new().share_key("k");

        let first = registry.bind(host.clone(), Defaults::none(), options());
        first.teardown();

        let second = registry.bind(host, Defaults::none(), options());
        assert!(second.is_ready());
        second.set("q", json!(1)).unwrap();
    }
}
