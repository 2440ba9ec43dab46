//! Query mapper - namespaced query parameters <-> partial state
//!
//! A namespace owns exactly the keys `{namespace}.{field}`; without a
//! namespace a field owns the bare key `{field}`. Writes only ever touch owned
//! keys, so instances with different namespaces can share one URL.
//!
//! The `url` crate's form-urlencoded query container does all escaping and
//! unescaping. Malformed escapes such as `%2` are kept literally instead of
//! failing the read.

use std::sync::Arc;
use tracing::{debug, trace};
use url::Url;

use crate::codec::CodecRegistry;
use crate::error::{Result, SyncError};
use crate::location::{HistoryMode, Host, UrlReader};
use crate::sync::types::Patch;

/// Separator between namespace and field name
pub const NAMESPACE_SEPARATOR: char = '.';

/// Translates between the query string and partial state for one namespace
#[derive(Debug, Clone)]
pub struct QueryMapper {
    namespace: Option<String>,
    codecs: Arc<CodecRegistry>,
}

impl QueryMapper {
    pub fn new(namespace: Option<String>, codecs: Arc<CodecRegistry>) -> Self {
        Self { namespace, codecs }
    }

    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    pub fn codecs(&self) -> &CodecRegistry {
        &self.codecs
    }

    /// Query key owned by `field`
    pub fn key_for(&self, field: &str) -> String {
        match &self.namespace {
            Some(ns) => format!("{}{}{}", ns, NAMESPACE_SEPARATOR, field),
            None => field.to_string(),
        }
    }

    /// Field name for a query key, if this namespace owns it
    pub fn field_for<'k>(&self, key: &'k str) -> Option<&'k str> {
        match &self.namespace {
            Some(ns) => key
                .strip_prefix(ns.as_str())
                .and_then(|rest| rest.strip_prefix(NAMESPACE_SEPARATOR))
                .filter(|field| !field.is_empty()),
            None => Some(key),
        }
    }

    /// Read every owned parameter of the current URL
    ///
    /// Parameters whose codec fails are dropped individually. Without a URL
    /// context the result is empty.
    pub fn read(&self, reader: &dyn UrlReader) -> Patch {
        let mut partial = Patch::new();
        let Some(url) = current_url(reader) else {
            return partial;
        };

        for (key, raw) in url.query_pairs() {
            let Some(field) = self.field_for(&key) else {
                continue;
            };

            match self.codecs.parse(field, &raw) {
                Ok(value) => {
                    partial.insert(field.to_string(), Some(value));
                }
                Err(e) => {
                    debug!(field, error = %e, "Dropping unparseable query parameter");
                }
            }
        }

        trace!(
            namespace = self.namespace(),
            fields = partial.len(),
            "Read partial state from URL"
        );
        partial
    }

    /// Apply `partial` to the owned keys of the current URL and commit it
    ///
    /// An empty `partial` under a namespace removes every owned key. A `None`
    /// value removes that field's key. Codec format errors abort the write
    /// before anything is committed.
    pub fn write(&self, host: &Host, partial: &Patch, mode: HistoryMode) -> Result<()> {
        self.commit(host, partial.is_empty(), partial, mode)
    }

    /// Remove every owned key, then apply `partial`, in a single commit
    ///
    /// Used when a clear was coalesced with later writes. Without a namespace
    /// nothing is removed, matching [`QueryMapper::write`] with an empty patch.
    pub fn write_cleared(&self, host: &Host, partial: &Patch, mode: HistoryMode) -> Result<()> {
        self.commit(host, true, partial, mode)
    }

    fn commit(
        &self,
        host: &Host,
        clear_owned: bool,
        partial: &Patch,
        mode: HistoryMode,
    ) -> Result<()> {
        let Some(mut url) = current_url(host.reader()) else {
            trace!("No URL context, skipping write");
            return Ok(());
        };

        let mut pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();

        if clear_owned {
            if let Some(ns) = &self.namespace {
                let prefix = format!("{}{}", ns, NAMESPACE_SEPARATOR);
                pairs.retain(|(key, _)| !key.starts_with(&prefix));
            }
        }

        for (field, value) in partial {
            let key = self.key_for(field);
            match value {
                None => pairs.retain(|(existing, _)| *existing != key),
                Some(value) => {
                    let text = self.codecs.format(field, value).map_err(|source| SyncError::Format {
                        field: field.clone(),
                        source,
                    })?;
                    set_pair(&mut pairs, key, text);
                }
            }
        }

        if pairs.is_empty() {
            url.set_query(None);
        } else {
            url.query_pairs_mut().clear().extend_pairs(pairs.iter());
        }

        trace!(url = url.as_str(), %mode, "Committing URL");
        host.committer().commit(url.as_str(), mode);
        Ok(())
    }
}

/// Replace the first occurrence of `key` and drop the rest, or append it
fn set_pair(pairs: &mut Vec<(String, String)>, key: String, value: String) {
    match pairs.iter().position(|(existing, _)| *existing == key) {
        Some(first) => {
            pairs[first].1 = value;
            let mut index = 0;
            pairs.retain(|(existing, _)| {
                let keep = index <= first || *existing != key;
                index += 1;
                keep
            });
        }
        None => pairs.push((key, value)),
    }
}

fn current_url(reader: &dyn UrlReader) -> Option<Url> {
    let href = reader.current_url()?;
    match Url::parse(&href) {
        Ok(url) => Some(url),
        Err(e) => {
            debug!(href = %href, error = %e, "Current URL is unparseable, treating as absent");
            None
        }
    }
}
