//! Rule Result Cache
//!
//! [`CachedDataset`] wraps any dataset and memoizes the tuples each rule
//! derives, keyed by [`CacheKey`] (rule + instantiated head).
//!
//! ## Design
//!
//! ```text
//! (absent) --scan_cache--> pending --complete_cache--> complete
//!                             `------abandon_cache---> (absent)
//! ```
//!
//! A miss reserves the key under a single write lock, so exactly one
//! evaluation owns each pending entry and fills it as tuples are derived.
//! Other lookups of a pending entry get [`CacheLookup::Pending`] with the
//! tuples so far; the evaluator reads those only when it is re-entering that
//! same evaluation, and otherwise computes the rule itself. Writes to entries
//! that are not pending are ignored.

use super::{CacheKey, CacheLookup, Dataset, IndexedScan, RuleCache};
use crate::ast::{Expression, Rule};
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Tuples derived for one cache key, in derivation order
#[derive(Debug, Clone, Default)]
struct CacheEntry {
    tuples: Vec<Expression>,
    seen: HashSet<Expression>,
    access_count: usize,
    complete: bool,
}

impl CacheEntry {
    fn push(&mut self, tuple: Expression) {
        if self.seen.insert(tuple.clone()) {
            self.tuples.push(tuple);
        }
    }
}

/// Cache statistics
#[derive(Debug, Clone, Default)]
pub struct CacheStats {
    /// Lookups answered by a complete entry
    pub hits: usize,

    /// Lookups that reserved a new entry
    pub misses: usize,

    /// Lookups that found an entry still being filled
    pub pending: usize,

    /// Pending entries dropped before completion
    pub abandoned: usize,

    /// Number of entries currently in cache
    pub size: usize,

    /// Number of tuples stored across all entries
    pub tuples: usize,
}

impl CacheStats {
    /// Calculate hit rate (0.0 to 1.0)
    #[allow(clippy::cast_precision_loss)]
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    /// Reset counters, keeping the size figures
    pub fn reset(&mut self) {
        self.hits = 0;
        self.misses = 0;
        self.pending = 0;
        self.abandoned = 0;
    }
}

/// Dataset wrapper adding the [`RuleCache`] capability
pub struct CachedDataset<D> {
    inner: D,
    entries: RwLock<HashMap<CacheKey, CacheEntry>>,
    stats: RwLock<CacheStats>,
}

impl<D: Dataset> CachedDataset<D> {
    pub fn new(inner: D) -> Self {
        CachedDataset {
            inner,
            entries: RwLock::new(HashMap::new()),
            stats: RwLock::new(CacheStats::default()),
        }
    }

    pub fn inner(&self) -> &D {
        &self.inner
    }

    /// Mutable access to the wrapped dataset; drops cached results since they
    /// may no longer hold
    pub fn inner_mut(&mut self) -> &mut D {
        self.clear_cache();
        &mut self.inner
    }

    pub fn into_inner(self) -> D {
        self.inner
    }

    /// Get cache statistics
    pub fn stats(&self) -> CacheStats {
        let mut stats = self.stats.read().clone();
        let entries = self.entries.read();
        stats.size = entries.len();
        stats.tuples = entries.values().map(|e| e.tuples.len()).sum();
        stats
    }

    /// Number of lookups served for `key`
    pub fn access_count(&self, key: &CacheKey) -> usize {
        self.entries.read().get(key).map_or(0, |e| e.access_count)
    }

    /// Drop every entry
    pub fn clear_cache(&self) {
        self.entries.write().clear();
        self.stats.write().reset();
    }
}

impl<D: Dataset> Dataset for CachedDataset<D> {
    fn tuples(&self) -> Box<dyn Iterator<Item = Expression> + '_> {
        self.inner.tuples()
    }

    fn rules(&self) -> Box<dyn Iterator<Item = Arc<Rule>> + '_> {
        self.inner.rules()
    }

    fn indexed(&self) -> Option<&dyn IndexedScan> {
        self.inner.indexed()
    }

    fn cache(&self) -> Option<&dyn RuleCache> {
        Some(self)
    }
}

impl<D: Dataset> RuleCache for CachedDataset<D> {
    fn scan_cache(&self, key: &CacheKey) -> CacheLookup {
        let mut entries = self.entries.write();
        if let Some(entry) = entries.get_mut(key) {
            entry.access_count += 1;
            let tuples = entry.tuples.clone();
            let mut stats = self.stats.write();
            return if entry.complete {
                stats.hits += 1;
                CacheLookup::Complete(tuples)
            } else {
                stats.pending += 1;
                CacheLookup::Pending(tuples)
            };
        }

        entries.insert(key.clone(), CacheEntry::default());
        self.stats.write().misses += 1;
        CacheLookup::Reserved
    }

    fn cache_tuple(&self, key: &CacheKey, tuple: Expression) {
        if let Some(entry) = self.entries.write().get_mut(key) {
            if !entry.complete {
                entry.push(tuple);
            }
        }
    }

    fn complete_cache(&self, key: &CacheKey) {
        if let Some(entry) = self.entries.write().get_mut(key) {
            entry.complete = true;
        }
    }

    fn abandon_cache(&self, key: &CacheKey) {
        let mut entries = self.entries.write();
        if entries.get(key).is_some_and(|entry| !entry.complete) {
            entries.remove(key);
            self.stats.write().abandoned += 1;
        }
    }
}
