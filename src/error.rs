//! Error types for the synchronization engine
//!
//! Read-path problems (unparseable parameters, missing URL context) never
//! surface here: they are logged and the offending field is dropped. Only
//! write-path failures reach the caller.

use thiserror::Error;

use crate::codec::CodecError;

/// Errors returned by mutation operations
#[derive(Debug, Error)]
pub enum SyncError {
    /// A field's codec could not represent its value as query text.
    ///
    /// The in-memory snapshot has already been updated when this is
    /// returned; the URL is left untouched.
    #[error("failed to format field `{field}` for the query string")]
    Format {
        field: String,
        #[source]
        source: CodecError,
    },

    /// A typed value could not be converted into a JSON value
    #[error("value for field `{field}` is not representable as JSON")]
    Serialize {
        field: String,
        #[source]
        source: serde_json::Error,
    },

    /// The instance was torn down and no longer accepts mutations
    #[error("synchronization instance has been torn down")]
    TornDown,
}

/// Result alias used throughout the library
pub type Result<T> = std::result::Result<T, SyncError>;
