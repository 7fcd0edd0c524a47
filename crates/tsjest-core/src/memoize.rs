//! Explicit memoization for pure methods
//!
//! Each memoized method owns one [`Memoized`] table, created in the owning
//! struct's constructor. The table is keyed by the method's argument; the
//! method name is kept for tracing.

use rustc_hash::FxHashMap;
use std::hash::Hash;
use std::sync::Mutex;
use tracing::trace;

pub struct Memoized<K, V> {
    method: &'static str,
    entries: Mutex<FxHashMap<K, V>>,
}

impl<K, V> Memoized<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new(method: &'static str) -> Self {
        Self {
            method,
            entries: Mutex::new(FxHashMap::default()),
        }
    }

    /// Return the cached value for `key`, computing and storing it on first use
    pub fn get_or_compute(&self, key: &K, compute: impl FnOnce(&K) -> V) -> V {
        if let Some(value) = self.entries.lock().unwrap().get(key) {
            return value.clone();
        }

        trace!(method = self.method, "memo miss");
        // Computed outside the lock so that `compute` may use other memo tables.
        let value = compute(key);
        self.entries
            .lock()
            .unwrap()
            .entry(key.clone())
            .or_insert(value)
            .clone()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<K, V> std::fmt::Debug for Memoized<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Memoized")
            .field("method", &self.method)
            .finish_non_exhaustive()
    }
}
