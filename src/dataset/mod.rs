//! # Datasets
//!
//! The storage side the evaluator queries. Every dataset provides its stored
//! facts and its rules; some additionally offer optional capabilities the
//! evaluator picks up when present:
//!
//! ```text
//! Dataset                      tuples(), rules()
//!   |-- indexed() -> IndexedScan   scan_index(expr): candidate facts for a pattern
//!   `-- cache()   -> RuleCache     scan_cache(key) / cache_tuple(key, tuple)
//!                                  complete_cache(key) / abandon_cache(key)
//! ```
//!
//! A dataset without a capability returns `None` from the accessor and the
//! evaluator falls back to a full scan or to uncached rule evaluation.
//!
//! Reference implementations:
//! - [`MemoryDataset`]: plain ordered facts and rules
//! - [`IndexedDataset`]: per-column hash indexes over the facts
//! - [`CachedDataset`]: memoizes rule-derived tuples for any inner dataset

use crate::ast::{Expression, Rule};
use std::fmt;
use std::io;
use std::sync::Arc;
use thiserror::Error;

mod cached;
mod indexed;
mod memory;

pub use cached::{CacheStats, CachedDataset};
pub use indexed::{ColumnKey, IndexStats, IndexedDataset};
pub use memory::MemoryDataset;

/// Source of facts and rules for evaluation
pub trait Dataset: Send + Sync {
    /// Stored facts, in a stable order
    fn tuples(&self) -> Box<dyn Iterator<Item = Expression> + '_>;

    /// Rules, in a stable order
    fn rules(&self) -> Box<dyn Iterator<Item = Arc<Rule>> + '_>;

    /// Indexed fact lookup, if supported
    fn indexed(&self) -> Option<&dyn IndexedScan> {
        None
    }

    /// Rule result cache, if supported
    fn cache(&self) -> Option<&dyn RuleCache> {
        None
    }
}

/// Capability: narrow the candidate facts for a pattern
pub trait IndexedScan {
    /// Every fact that could unify with `expr`, possibly more; never fewer
    fn scan_index(&self, expr: &Expression) -> Box<dyn Iterator<Item = Expression> + '_>;
}

/// Result of a [`RuleCache::scan_cache`] lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheLookup {
    /// The evaluation that filled the entry ran to the end
    Complete(Vec<Expression>),
    /// Some evaluation is still filling the entry; tuples recorded so far
    Pending(Vec<Expression>),
    /// No entry existed. The caller now owns a pending entry and must finish
    /// it with [`RuleCache::complete_cache`] or drop it with
    /// [`RuleCache::abandon_cache`].
    Reserved,
}

/// Capability: memoize the tuples a rule derives for a given head instantiation
///
/// Entries move from pending to complete. Only the evaluation that reserved an
/// entry writes to it.
pub trait RuleCache {
    /// Look up `key`, reserving it on a miss in the same step
    fn scan_cache(&self, key: &CacheKey) -> CacheLookup;

    /// Record a tuple derived under a pending `key`
    fn cache_tuple(&self, key: &CacheKey, tuple: Expression);

    /// Mark a pending `key` complete
    fn complete_cache(&self, key: &CacheKey);

    /// Remove a pending `key` whose evaluation stopped early
    fn abandon_cache(&self, key: &CacheKey);
}

/// Identifies one rule evaluation: the rule plus its head after substituting
/// the bindings taken from the caller's query
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub rule: Arc<Rule>,
    pub head: Expression,
}

impl CacheKey {
    pub fn new(rule: Arc<Rule>, head: Expression) -> Self {
        CacheKey { rule, head }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} @ {}", self.head, self.rule)
    }
}

/// Dataset errors
#[derive(Error, Debug)]
pub enum DatasetError {
    /// Stored facts must be ground
    #[error("Fact contains a variable: {0}")]
    NonGroundFact(Expression),

    /// Rule rejected by `try_add_rule`
    #[error("Unsafe rule: {0}")]
    UnsafeRule(Box<Rule>),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for dataset operations
pub type DatasetResult<T> = Result<T, DatasetError>;
