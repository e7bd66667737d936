//! LRU cache of parsed partials.

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use hashlink::LruCache;

use crate::loader::LookupType;
use crate::parser::Template;

/// Cache key: root lookups are shared by name, relative lookups are
/// keyed by the file that referenced them.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    Lookup(LookupType, String),
    Relative { current: String, name: String },
}

/// Parsed templates shared across renders.
///
/// Only successfully parsed templates are inserted, and the lock is
/// never held across a parse. Two threads missing on the same key may
/// both parse it; the second insert replaces an identical result.
pub struct PartialCache {
    entries: Mutex<LruCache<CacheKey, Arc<Template>>>,
}

impl PartialCache {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
        }
    }

    #[must_use]
    pub fn get(&self, key: &CacheKey) -> Option<Arc<Template>> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.get(key).cloned()
    }

    pub fn insert(&self, key: CacheKey, template: Arc<Template>) {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.insert(key, template);
    }

    pub fn remove(&self, key: &CacheKey) -> Option<Arc<Template>> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.remove(key)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

impl fmt::Debug for PartialCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PartialCache")
            .field("len", &self.len())
            .finish_non_exhaustive()
    }
}
