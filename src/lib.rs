//! # Datalog Evaluator
//!
//! Lazy, top-down evaluation of Datalog queries over a pluggable fact/rule
//! store, with an `=` built-in and negation as failure (negated clauses are
//! checked after every positive clause of the rule body).
//!
//! ## Architecture
//!
//! ```text
//! Query (Expression + optional Bindings)
//!     ↓
//! [Evaluator::select]       → stored facts, then rule-derived tuples
//!     ↓           ↑
//! [Evaluator::join]         → rule body, clause by clause
//!     ↓
//! Lazy stream of (tuple, bindings)
//! ```
//!
//! ### Datasets
//! ```text
//! Dataset (trait)
//!     ├── MemoryDataset      facts + rules in insertion order, JSON snapshots
//!     ├── IndexedDataset     + per-column hash index (IndexedScan)
//!     └── CachedDataset<D>   + memoized rule results (RuleCache)
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use datalog_evaluator::ast::builders::{fact, ExprBuilder, RuleBuilder};
//! use datalog_evaluator::dataset::{CachedDataset, MemoryDataset};
//! use datalog_evaluator::Evaluator;
//!
//! let mut db = MemoryDataset::new();
//! db.add_facts([fact("edge", ["a", "b"]), fact("edge", ["b", "c"])]).unwrap();
//! db.add_rule(RuleBuilder::new("path").head_vars(["X", "Y"]).body("edge", ["X", "Y"]).build());
//! db.add_rule(
//!     RuleBuilder::new("path")
//!         .head_vars(["X", "Z"])
//!         .body("edge", ["X", "Y"])
//!         .body("path", ["Y", "Z"])
//!         .build(),
//! );
//!
//! let db = CachedDataset::new(db);
//! let query = ExprBuilder::new("path").constant("a").var("Z").build();
//! let reached = Evaluator::new(&db).select(&query, None).count();
//! assert_eq!(reached, 2);
//! ```
//!
//! ## Module Organization
//!
//! - [`value`]: constant values
//! - [`ast`]: terms, expressions, clauses and rules
//! - [`bindings`]: persistent variable bindings
//! - [`unify`]: matching and substitution
//! - [`dataset`]: the store trait and reference implementations
//! - [`evaluator`]: select and join
//! - [`config`], [`logging`]: ambient setup

pub mod ast;
pub mod bindings;
pub mod config;
pub mod dataset;
pub mod error;
pub mod evaluator;
pub mod logging;
pub mod unify;
pub mod value;

pub use ast::{Clause, Expression, LVar, Rule, Term, EQUALITY_PREDICATE};
pub use bindings::Bindings;
pub use config::{Config, EvaluatorConfig, LogFormat, LoggingConfig};
pub use dataset::{
    CacheKey, CacheLookup, CacheStats, CachedDataset, Dataset, DatasetError, DatasetResult, IndexedDataset,
    IndexedScan, MemoryDataset, RuleCache,
};
pub use error::{EvalError, EvalResult};
pub use evaluator::{join, select, select_with, Answer, Answers, Derivation, Evaluator, Solutions};
pub use unify::{apply_bindings, unify, Substitution};
pub use value::Value;
