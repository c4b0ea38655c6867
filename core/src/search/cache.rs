//! In-memory query cache

use crate::error::{Result, SearchError};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// Compiled-query key to the ordered paths it produced.
///
/// Entries are write-once and live as long as the owning searcher. There
/// is no eviction and no invalidation: the host's filesystem is assumed
/// not to change underneath a session.
#[derive(Debug, Default)]
pub struct QueryCache {
    entries: RwLock<HashMap<String, Arc<[String]>>>,
}

impl QueryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lookup(&self, key: &str) -> Option<Arc<[String]>> {
        self.entries.read().get(key).cloned()
    }

    /// Exact-key lookup that fails when nothing is stored
    pub fn get(&self, key: &str) -> Result<Arc<[String]>> {
        self.lookup(key).ok_or_else(|| {
            SearchError::NotFound {
                key: key.to_string(),
            }
            .into()
        })
    }

    /// Store paths under `key`. An existing entry is kept as is; the
    /// entry that ends up stored is returned.
    pub fn store(&self, key: String, paths: Vec<String>) -> Arc<[String]> {
        self.entries
            .write()
            .entry(key)
            .or_insert_with(|| paths.into())
            .clone()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}
