//! # Query Evaluator
//!
//! Top-down, lazy evaluation of queries over a [`Dataset`].
//!
//! ## Pipeline
//!
//! ```text
//! select(expr, bindings)
//!   |-- "=" built-in              compare both sides, no dataset access
//!   |-- fact scan                 index lookup or full scan, unify each tuple
//!   `-- rule scan                 rules whose head shares expr's predicate
//!         `-- join(rule body)     first positive clause seeds the rows
//!               |-- join          select(clause) per row, extend bindings
//!               `-- antijoin      drop rows whose negated clause has a match
//! ```
//!
//! `select` and `join` call each other lazily: nothing is evaluated until the
//! returned iterator is pulled, and a caller can stop pulling at any point.
//!
//! Two guards keep evaluation finite:
//! - the *recursion guard* holds the rules being expanded on the current path.
//!   It is persistent, so each branch extends its own copy.
//! - the *select guard* holds the derived tuples one `select` call has already
//!   produced. It is shared by all rule branches of that call.
//!
//! A dataset with a [`RuleCache`](crate::dataset::RuleCache) guards on cache
//! keys instead of rules. A complete entry is replayed. An entry this path is
//! still filling is re-entered by reading the tuples derived so far. An entry
//! another evaluation is filling is ignored, and the rule is evaluated
//! directly. Either way this approximates the fixpoint and is not guaranteed
//! complete for arbitrary recursive programs.
//!
//! ## Usage
//!
//! ```rust
//! use datalog_evaluator::ast::builders::{fact, ExprBuilder};
//! use datalog_evaluator::dataset::MemoryDataset;
//! use datalog_evaluator::evaluator::select;
//!
//! let mut db = MemoryDataset::new();
//! db.add_fact(fact("parent", ["tom", "bob"])).unwrap();
//!
//! let query = ExprBuilder::new("parent").var("X").constant("bob").build();
//! let answers: Vec<_> = select(&db, &query).collect::<Result<_, _>>().unwrap();
//! assert_eq!(answers[0].bindings.value_of("X").and_then(|v| v.as_str()), Some("tom"));
//! ```

mod join;
mod select;

use crate::ast::{Clause, Expression, Rule};
use crate::bindings::Bindings;
use crate::config::{Config, EvaluatorConfig};
use crate::dataset::{CacheKey, Dataset, IndexedScan, RuleCache};
use crate::error::EvalResult;
use rayon::prelude::*;
use std::fmt;
use std::sync::Arc;

/// Rules and cache keys currently being expanded on one evaluation path
///
/// `filled` holds keys whose pending cache entry this path owns; `bypassed`
/// holds keys evaluated without the cache because another evaluation owns
/// the entry.
#[derive(Debug, Clone, Default)]
pub(crate) struct RecursionGuard {
    rules: im::HashSet<Arc<Rule>>,
    filled: im::HashSet<CacheKey>,
    bypassed: im::HashSet<CacheKey>,
}

impl RecursionGuard {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn contains_rule(&self, rule: &Arc<Rule>) -> bool {
        self.rules.contains(rule)
    }

    pub(crate) fn is_filling(&self, key: &CacheKey) -> bool {
        self.filled.contains(key)
    }

    pub(crate) fn is_bypassing(&self, key: &CacheKey) -> bool {
        self.bypassed.contains(key)
    }

    pub(crate) fn depth(&self) -> usize {
        self.rules.len()
    }

    /// Path extended by expanding `rule` without a cache
    pub(crate) fn expanding(&self, rule: &Arc<Rule>) -> Self {
        let mut next = self.clone();
        next.rules.insert(Arc::clone(rule));
        next
    }

    /// Path extended by filling the cache entry for `key`
    pub(crate) fn filling(&self, key: &CacheKey) -> Self {
        let mut next = self.expanding(&key.rule);
        next.filled.insert(key.clone());
        next
    }

    /// Path extended by evaluating `key` past another evaluation's entry
    pub(crate) fn bypassing(&self, key: &CacheKey) -> Self {
        let mut next = self.expanding(&key.rule);
        next.bypassed.insert(key.clone());
        next
    }
}

/// Lazy, fallible result sequence
pub type Stream<'a, T> = Box<dyn Iterator<Item = EvalResult<T>> + 'a>;

/// Output of [`select`]
pub type Answers<'a> = Stream<'a, Answer>;

/// Output of [`join`]
pub type Solutions<'a> = Stream<'a, Bindings>;

/// One `select` result: the matching tuple and the caller's bindings extended
/// by the match
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Answer {
    pub tuple: Expression,
    pub bindings: Bindings,
}

impl Answer {
    pub fn new(tuple: Expression, bindings: Bindings) -> Self {
        Answer { tuple, bindings }
    }

    pub fn into_parts(self) -> (Expression, Bindings) {
        (self.tuple, self.bindings)
    }
}

impl fmt::Display for Answer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.tuple, self.bindings)
    }
}

/// One `join` result with the tuples that satisfied each positive clause,
/// in evaluation order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Derivation {
    pub support: Vec<Expression>,
    pub bindings: Bindings,
}

/// Evaluates queries against one dataset
#[derive(Clone, Copy)]
pub struct Evaluator<'a> {
    db: &'a dyn Dataset,
    options: EvaluatorConfig,
}

impl<'a> Evaluator<'a> {
    /// Evaluator using every capability the dataset offers
    pub fn new(db: &'a dyn Dataset) -> Self {
        Evaluator {
            db,
            options: EvaluatorConfig::default(),
        }
    }

    pub fn with_options(db: &'a dyn Dataset, options: EvaluatorConfig) -> Self {
        Evaluator { db, options }
    }

    pub fn from_config(db: &'a dyn Dataset, config: &Config) -> Self {
        Self::with_options(db, config.evaluator)
    }

    pub fn options(&self) -> EvaluatorConfig {
        self.options
    }

    /// All tuples matching `expr`, stored facts first, then rule-derived ones
    pub fn select(self, expr: &Expression, bindings: Option<&Bindings>) -> Answers<'a> {
        self.select_guarded(
            expr.clone(),
            bindings.cloned().unwrap_or_default(),
            RecursionGuard::new(),
        )
    }

    /// All binding sets satisfying a rule body
    pub fn join(self, pattern: &Expression, clauses: &[Clause], bindings: Bindings) -> Solutions<'a> {
        self.join_guarded(pattern, clauses, bindings, RecursionGuard::new())
    }

    /// Like [`Evaluator::join`], keeping the supporting tuples of each solution
    pub fn join_with_support(
        self,
        pattern: &Expression,
        clauses: &[Clause],
        bindings: Bindings,
    ) -> Stream<'a, Derivation> {
        self.join_rows(pattern, clauses, bindings, RecursionGuard::new())
    }

    /// Evaluate independent queries in parallel, one result set per query
    ///
    /// Each query runs with its own guards; only the dataset (and its cache,
    /// if any) is shared.
    pub fn select_batch(self, queries: &[Expression]) -> Vec<EvalResult<Vec<Answer>>> {
        queries
            .par_iter()
            .map(|query| self.select(query, None).collect())
            .collect()
    }

    fn index(self) -> Option<&'a dyn IndexedScan> {
        if self.options.use_index {
            self.db.indexed()
        } else {
            None
        }
    }

    fn cache(self) -> Option<&'a dyn RuleCache> {
        if self.options.use_cache {
            self.db.cache()
        } else {
            None
        }
    }
}

/// Select with default options and no seed bindings
pub fn select<'a>(db: &'a dyn Dataset, expr: &Expression) -> Answers<'a> {
    Evaluator::new(db).select(expr, None)
}

/// Select with default options, extending `bindings`
pub fn select_with<'a>(db: &'a dyn Dataset, expr: &Expression, bindings: &Bindings) -> Answers<'a> {
    Evaluator::new(db).select(expr, Some(bindings))
}

/// Join a rule body with default options
pub fn join<'a>(
    db: &'a dyn Dataset,
    pattern: &Expression,
    clauses: &[Clause],
    bindings: Bindings,
) -> Solutions<'a> {
    Evaluator::new(db).join(pattern, clauses, bindings)
}
