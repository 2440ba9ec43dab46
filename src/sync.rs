//! Synchronization core - state snapshot <-> URL query string
//!
//! A [`UrlStateSync`] owns the in-memory snapshot of one synchronized state.
//! Every mutation updates the snapshot synchronously and schedules a URL
//! write, either immediately or after a debounce window. Back/forward
//! navigation is reconciled into the snapshot without writing back.
//!
//! # Lifecycle
//!
//! ```text
//! initialize() ──► Ready ──(set/patch/remove/replace/clear, navigation)──► Ready
//!                    │
//!                    └── teardown() / last handle dropped ──► TornDown
//! ```
//!
//! Teardown removes the navigation listener and cancels a pending debounced
//! write without flushing it.
//!
//! # Debouncing
//!
//! With a debounce window configured, writes accumulate in a single pending
//! payload (latest value per field wins) and one timer is re-armed on every
//! mutation. When the timer fires the accumulated payload is written once.

mod engine;
mod defaults;
mod options;
mod scheduler;
pub mod types;

pub use engine::UrlStateSync;
pub(crate) use engine::WeakSync;
pub use defaults::Defaults;
pub use options::SyncOptions;
pub use types::{ChangeEvent, ChangeHandler, ChangeSource, Patch, Sanitize, State, SubscriptionId};
