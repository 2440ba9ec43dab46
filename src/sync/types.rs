//! Value types shared by the synchronization engine

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;

/// A complete state: field name -> defined value
pub type State = Map<String, Value>;

/// A partial state; `None` marks a field as undefined (a removal)
///
/// Insertion order is kept so URL writes are deterministic.
pub type Patch = IndexMap<String, Option<Value>>;

/// Why a change notification fired
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeSource {
    /// Whole-state replacement (`replace`, `replace_with`, `clear`)
    Set,
    /// Field-level writes (`set`, `patch`, `remove`)
    Patch,
    /// Back/forward navigation reconciled from the URL
    External,
}

impl std::fmt::Display for ChangeSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChangeSource::Set => write!(f, "set"),
            ChangeSource::Patch => write!(f, "patch"),
            ChangeSource::External => write!(f, "external"),
        }
    }
}

/// Payload of a change notification
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChangeEvent {
    /// State after the change
    pub state: State,
    pub source: ChangeSource,
}

/// Change notification callback
pub type ChangeHandler = Arc<dyn Fn(&ChangeEvent) + Send + Sync>;

/// Partial-state transform applied before merge-in and before write-out
pub type Sanitize = Arc<dyn Fn(Patch) -> Patch + Send + Sync>;

/// Identifier returned by `subscribe`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub u64);

/// Turn a state into a patch that defines every field
pub fn patch_of(state: State) -> Patch {
    state.into_iter().map(|(k, v)| (k, Some(v))).collect()
}

/// Keep only the defined fields of a patch
pub fn defined(patch: &Patch) -> State {
    patch
        .iter()
        .filter_map(|(k, v)| v.as_ref().map(|v| (k.clone(), v.clone())))
        .collect()
}

/// Overlay `incoming` onto `target`: defined values insert, `None` removes
pub fn overlay(target: &mut Patch, incoming: &Patch) {
    for (field, value) in incoming {
        match value {
            Some(value) => {
                target.insert(field.clone(), Some(value.clone()));
            }
            None => {
                target.shift_remove(field);
            }
        }
    }
}
