//! urlstate - keep application state in the URL query string
//!
//! A synchronization instance owns an in-memory snapshot of a flat state
//! record and mirrors it into namespaced query parameters (`users.page=7`).
//! Mutations update the snapshot synchronously and write the URL immediately
//! or after a debounce window; back/forward navigation flows back into the
//! snapshot without writing again.
//!
//! - [`codec`]: per-field string conversion and the default serializer
//! - [`query`]: namespaced query keys <-> partial state, encoded exactly once
//! - [`location`]: host capabilities (read URL, commit history, navigation)
//! - [`sync`]: the synchronization core
//! - [`binding`]: reactive and typed views for UI layers
//! - [`config`]: YAML configuration

pub mod binding;
pub mod cli;
pub mod codec;
pub mod config;
pub mod error;
pub mod location;
pub mod query;
pub mod sync;

pub use binding::{Binding, FieldHandle, SyncRegistry};
pub use codec::{Codec, CodecError, CodecKind, CodecRegistry};
pub use config::SyncConfig;
pub use error::{Result, SyncError};
pub use location::{HistoryMode, Host, MemoryHistory};
pub use sync::{ChangeEvent, ChangeSource, Defaults, Patch, State, SyncOptions, UrlStateSync};
