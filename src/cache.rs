//! Lazily populated, read-mostly caches.
//!
//! Entries are built once under the write lock. Whatever diagnostics the
//! build produced are stored with the entry and returned on every hit, so a
//! failed build is reported again instead of being retried.

use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

use crate::diag::Diagnostics;

#[derive(Debug)]
struct Entry<V> {
    value: Option<Arc<V>>,
    diagnostics: Diagnostics,
}

/// A memoizing cache keyed by `K`.
#[derive(Debug)]
pub struct MemoCache<K, V> {
    entries: RwLock<BTreeMap<K, Entry<V>>>,
}

impl<K: Ord + Clone, V> Default for MemoCache<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Ord + Clone, V> MemoCache<K, V> {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(BTreeMap::new()),
        }
    }

    /// Returns the cached entry for `key`, building it with `init` on first use.
    ///
    /// `init` returns `None` when it could not build a value; its diagnostics
    /// are cached either way.
    pub fn get_or_init<F>(&self, key: &K, init: F) -> (Option<Arc<V>>, Diagnostics)
    where
        F: FnOnce() -> (Option<V>, Diagnostics),
    {
        if let Some(entry) = self.entries.read().get(key) {
            return (entry.value.clone(), entry.diagnostics.clone());
        }

        let mut entries = self.entries.write();
        // Another caller may have built it between the two locks.
        if let Some(entry) = entries.get(key) {
            return (entry.value.clone(), entry.diagnostics.clone());
        }

        let (value, diagnostics) = init();
        let entry = Entry {
            value: value.map(Arc::new),
            diagnostics,
        };
        if entry.diagnostics.has_error() {
            debug!(errors = entry.diagnostics.error_count(), "Caching failed entry");
        }
        let result = (entry.value.clone(), entry.diagnostics.clone());
        entries.insert(key.clone(), entry);
        result
    }

    /// Returns the entry for `key` if it has been built.
    pub fn get(&self, key: &K) -> Option<(Option<Arc<V>>, Diagnostics)> {
        self.entries
            .read()
            .get(key)
            .map(|entry| (entry.value.clone(), entry.diagnostics.clone()))
    }

    /// Number of built entries, failed ones included.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Whether nothing has been built yet.
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diag::{Diagnostic, DiagnosticClass};
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_builds_once() {
        let cache: MemoCache<String, usize> = MemoCache::new();
        let calls = AtomicUsize::new(0);
        let build = || {
            calls.fetch_add(1, Ordering::SeqCst);
            (Some(42), Diagnostics::new())
        };

        let (first, _) = cache.get_or_init(&"a".to_string(), build);
        let (second, _) = cache.get_or_init(&"a".to_string(), || unreachable!("cached"));
        assert_eq!(first.as_deref(), Some(&42));
        assert_eq!(second.as_deref(), Some(&42));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_failure_is_sticky() {
        let cache: MemoCache<&str, usize> = MemoCache::new();
        let failing = || {
            (
                None,
                Diagnostic::error(
                    DiagnosticClass::SchemaDefinition,
                    "Duplicate Resource Type Defined",
                    "twice",
                )
                .into(),
            )
        };

        let (value, diags) = cache.get_or_init(&"types", failing);
        assert!(value.is_none());
        assert!(diags.has_error());

        let (value, diags) = cache.get_or_init(&"types", || (Some(1), Diagnostics::new()));
        assert!(value.is_none());
        assert_eq!(diags.error_count(), 1);
    }

    #[test]
    fn test_concurrent_init() {
        let cache = Arc::new(MemoCache::<u8, String>::new());
        let calls = Arc::new(AtomicUsize::new(0));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = Arc::clone(&cache);
                let calls = Arc::clone(&calls);
                std::thread::spawn(move || {
                    cache
                        .get_or_init(&1, || {
                            calls.fetch_add(1, Ordering::SeqCst);
                            (Some("built".to_string()), Diagnostics::new())
                        })
                        .0
                })
            })
            .collect();
        for handle in handles {
            let value = handle.join().expect("thread");
            assert_eq!(value.as_deref().map(String::as_str), Some("built"));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
