//! Hash-indexed dataset. O(1) candidate lookup by any constant column.
//!
//! # Architecture
//!
//! ```text
//! IndexedDataset
//!   |-- MemoryDataset                       (facts + rules, insertion order)
//!   |-- HashMap<ColumnKey, Vec<usize>>      ((column, value) -> fact positions)
//!   `-- IndexStats                          (lookup / full scan counters)
//! ```
//!
//! Every column of every fact is indexed, the predicate symbol at column 0
//! included. A lookup reads each constant position of the pattern and scans
//! the shortest posting list; a pattern with no constants falls back to a full
//! scan. Posting lists hold ascending positions, so candidates come back in
//! insertion order either way.
//!
//! # Example
//!
//! ```
//! use datalog_evaluator::ast::builders::{fact, ExprBuilder};
//! use datalog_evaluator::dataset::{IndexedDataset, IndexedScan};
//!
//! let mut db = IndexedDataset::new();
//! db.add_fact(fact("edge", [1i64, 2])).unwrap();
//! db.add_fact(fact("edge", [1i64, 3])).unwrap();
//! db.add_fact(fact("edge", [2i64, 4])).unwrap();
//!
//! let pattern = ExprBuilder::new("edge").constant(1i64).var("Y").build();
//! assert_eq!(db.scan_index(&pattern).count(), 2);
//! ```

use super::{Dataset, DatasetResult, IndexedScan, MemoryDataset};
use crate::ast::{Expression, Rule, Term};
use crate::value::Value;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// Index key: a constant at a given column.
#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub struct ColumnKey {
    /// Column position (0 = predicate symbol)
    pub column: usize,
    pub value: Value,
}

impl ColumnKey {
    pub fn new(column: usize, value: Value) -> Self {
        ColumnKey { column, value }
    }
}

/// Index usage counters
#[derive(Debug, Clone, Default)]
pub struct IndexStats {
    /// Scans answered from a posting list
    pub lookups: usize,
    /// Scans with no constant to look up
    pub full_scans: usize,
    /// Candidate facts handed out by lookups
    pub candidates: usize,
}

#[derive(Debug, Default)]
pub struct IndexedDataset {
    base: MemoryDataset,
    postings: HashMap<ColumnKey, Vec<usize>>,
    stats: RwLock<IndexStats>,
}

impl IndexedDataset {
    pub fn new() -> Self {
        IndexedDataset::default()
    }

    /// Index an existing dataset
    pub fn from_memory(base: MemoryDataset) -> Self {
        let mut postings: HashMap<ColumnKey, Vec<usize>> = HashMap::new();
        for (position, fact) in base.facts().iter().enumerate() {
            Self::index_fact(&mut postings, position, fact);
        }
        IndexedDataset {
            base,
            postings,
            stats: RwLock::new(IndexStats::default()),
        }
    }

    fn index_fact(postings: &mut HashMap<ColumnKey, Vec<usize>>, position: usize, fact: &Expression) {
        for (column, term) in fact.iter().enumerate() {
            if let Term::Constant(value) = term {
                postings
                    .entry(ColumnKey::new(column, value.clone()))
                    .or_default()
                    .push(position);
            }
        }
    }

    pub fn add_fact(&mut self, fact: Expression) -> DatasetResult<()> {
        let position = self.base.fact_count();
        self.base.add_fact(fact.clone())?;
        Self::index_fact(&mut self.postings, position, &fact);
        Ok(())
    }

    pub fn add_facts(&mut self, facts: impl IntoIterator<Item = Expression>) -> DatasetResult<()> {
        for fact in facts {
            self.add_fact(fact)?;
        }
        Ok(())
    }

    pub fn add_rule(&mut self, rule: Rule) {
        self.base.add_rule(rule);
    }

    pub fn try_add_rule(&mut self, rule: Rule) -> DatasetResult<()> {
        self.base.try_add_rule(rule)
    }

    /// Positions of facts holding `key`
    pub fn postings(&self, key: &ColumnKey) -> &[usize] {
        self.postings.get(key).map_or(&[], Vec::as_slice)
    }

    /// Number of distinct (column, value) keys
    pub fn key_count(&self) -> usize {
        self.postings.len()
    }

    pub fn stats(&self) -> IndexStats {
        self.stats.read().clone()
    }

    /// Shortest posting list among the pattern's constant positions
    fn best_postings(&self, expr: &Expression) -> Option<&[usize]> {
        expr.iter()
            .enumerate()
            .filter_map(|(column, term)| {
                term.as_constant()
                    .map(|value| self.postings(&ColumnKey::new(column, value.clone())))
            })
            .min_by_key(|postings| postings.len())
    }
}

impl Dataset for IndexedDataset {
    fn tuples(&self) -> Box<dyn Iterator<Item = Expression> + '_> {
        self.base.tuples()
    }

    fn rules(&self) -> Box<dyn Iterator<Item = Arc<Rule>> + '_> {
        self.base.rules()
    }

    fn indexed(&self) -> Option<&dyn IndexedScan> {
        Some(self)
    }
}

impl IndexedScan for IndexedDataset {
    fn scan_index(&self, expr: &Expression) -> Box<dyn Iterator<Item = Expression> + '_> {
        match self.best_postings(expr) {
            Some(positions) => {
                {
                    let mut stats = self.stats.write();
                    stats.lookups += 1;
                    stats.candidates += positions.len();
                }
                let facts = self.base.facts();
                Box::new(positions.iter().map(move |&i| facts[i].clone()))
            }
            None => {
                self.stats.write().full_scans += 1;
                self.base.tuples()
            }
        }
    }
}
