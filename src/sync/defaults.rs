//! Default state, given as a value or a memoized factory

use once_cell::sync::OnceCell;
use serde_json::Value;
use std::sync::Arc;
use tracing::warn;

use super::types::State;

type Factory = Arc<dyn Fn() -> State + Send + Sync>;

#[derive(Clone)]
enum Source {
    Value(State),
    Factory { make: Factory, memo: Arc<OnceCell<State>> },
}

/// Defaults merged under whatever the URL provides
///
/// A factory runs at most once per `Defaults` instance; clones share the
/// memoized result. Building a new `Defaults` from a new closure recomputes,
/// even if the closure would produce the same value.
#[derive(Clone)]
pub struct Defaults(Source);

impl Defaults {
    /// No defaults: the initial state is exactly what the URL holds
    pub fn none() -> Self {
        Defaults(Source::Value(State::new()))
    }

    pub fn value(state: State) -> Self {
        Defaults(Source::Value(state))
    }

    pub fn factory<F>(make: F) -> Self
    where
        F: Fn() -> State + Send + Sync + 'static,
    {
        Defaults(Source::Factory {
            make: Arc::new(make),
            memo: Arc::new(OnceCell::new()),
        })
    }

    /// Defaults from a JSON value; anything but an object yields no defaults
    pub fn from_json(value: Value) -> Self {
        match value {
            Value::Object(state) => Self::value(state),
            Value::Null => Self::none(),
            other => {
                warn!("Ignoring non-object defaults: {}", other);
                Self::none()
            }
        }
    }

    /// Resolve to a concrete state
    pub fn resolve(&self) -> State {
        match &self.0 {
            Source::Value(state) => state.clone(),
            Source::Factory { make, memo } => memo.get_or_init(|| make()).clone(),
        }
    }
}

impl Default for Defaults {
    fn default() -> Self {
        Self::none()
    }
}

impl From<State> for Defaults {
    fn from(state: State) -> Self {
        Self::value(state)
    }
}

impl std::fmt::Debug for Defaults {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.0 {
            Source::Value(state) => f.debug_tuple("Defaults").field(state).finish(),
            Source::Factory { memo, .. } => f
                .debug_struct("Defaults")
                .field("memoized", &memo.get())
                .finish_non_exhaustive(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_factory_memoized_per_instance() {
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = calls.clone();
        let defaults = Defaults::factory(move || {
            calls_clone.fetch_add(1, Ordering::SeqCst);
            json!({"page": 1}).as_object().cloned().unwrap_or_default()
        });

        let shared = defaults.clone();
        assert_eq!(defaults.resolve()["page"], json!(1));
        assert_eq!(shared.resolve()["page"], json!(1));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_new_factory_recomputes() {
        let calls = Arc::new(AtomicUsize::new(0));
        for _ in 0..3 {
            let calls = calls.clone();
            Defaults::factory(move || {
                calls.fetch_add(1, Ordering::SeqCst);
                State::new()
            })
            .resolve();
        }
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_from_json() {
        assert_eq!(Defaults::from_json(json!({"q": ""})).resolve()["q"], json!(""));
        assert!(Defaults::from_json(json!(null)).resolve().is_empty());
        assert!(Defaults::from_json(json!([1, 2])).resolve().is_empty());
    }
}
