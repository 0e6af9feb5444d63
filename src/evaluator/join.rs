//! Join: solve a rule body clause by clause.
//!
//! The first positive clause seeds the rows. Every further positive clause is
//! joined in body order, then each negated clause filters the surviving rows.
//! Rows carry the tuples that satisfied each positive clause so callers can
//! ask how a solution was derived.

use super::{Derivation, Evaluator, RecursionGuard, Solutions, Stream};
use crate::ast::{Clause, Expression};
use crate::bindings::Bindings;
use crate::error::EvalError;
use crate::unify::substitute;
use std::iter;

impl<'a> Evaluator<'a> {
    pub(crate) fn join_guarded(
        self,
        pattern: &Expression,
        clauses: &[Clause],
        bindings: Bindings,
        guard: RecursionGuard,
    ) -> Solutions<'a> {
        Box::new(
            self.join_rows(pattern, clauses, bindings, guard)
                .map(|row| {
                    let row = row?;
                    tracing::trace!(
                        bindings = %row.bindings,
                        support = ?row.support,
                        "join_solution"
                    );
                    Ok(row.bindings)
                }),
        )
    }

    pub(crate) fn join_rows(
        self,
        pattern: &Expression,
        clauses: &[Clause],
        bindings: Bindings,
        guard: RecursionGuard,
    ) -> Stream<'a, Derivation> {
        let mut positives = clauses.iter().filter(|c| c.is_positive()).map(Clause::expression);
        let Some(init) = positives.next() else {
            return Box::new(iter::once(Err(EvalError::NoPositiveClause {
                pattern: pattern.clone(),
            })));
        };

        let seed = self
            .select_guarded(init.clone(), bindings, guard.clone())
            .map(|answer| {
                let answer = answer?;
                Ok(Derivation {
                    support: vec![answer.tuple],
                    bindings: answer.bindings,
                })
            });

        let mut rows: Stream<'a, Derivation> = Box::new(seed);
        for clause in positives {
            rows = self.join_clause(rows, clause.clone(), guard.clone());
        }
        for clause in clauses.iter().filter(|c| !c.is_positive()) {
            rows = self.antijoin_clause(rows, clause.expression().clone(), guard.clone());
        }
        rows
    }

    /// Extend each row with every match of `clause` under its bindings
    fn join_clause(self, rows: Stream<'a, Derivation>, clause: Expression, guard: RecursionGuard) -> Stream<'a, Derivation> {
        Box::new(rows.flat_map(move |row| -> Stream<'a, Derivation> {
            let Derivation { support, bindings } = match row {
                Ok(row) => row,
                Err(e) => return Box::new(iter::once(Err(e))),
            };
            let bound = substitute(&clause, &bindings);
            let matches = self.select_guarded(bound, bindings.clone(), guard.clone());
            Box::new(matches.map(move |answer| {
                let answer = answer?;
                let mut support = support.clone();
                support.push(answer.tuple);
                Ok(Derivation {
                    support,
                    bindings: bindings.merged(&answer.bindings),
                })
            }))
        }))
    }

    /// Keep only rows for which `clause` has no match
    ///
    /// Stops at the first match; the negated select starts from empty bindings
    /// since every variable it needs was substituted in.
    fn antijoin_clause(self, rows: Stream<'a, Derivation>, clause: Expression, guard: RecursionGuard) -> Stream<'a, Derivation> {
        Box::new(rows.filter_map(move |row| {
            let row = match row {
                Ok(row) => row,
                Err(e) => return Some(Err(e)),
            };
            let bound = substitute(&clause, &row.bindings);
            match self.select_guarded(bound, Bindings::new(), guard.clone()).next() {
                None => Some(Ok(row)),
                Some(Ok(_)) => None,
                Some(Err(e)) => Some(Err(e)),
            }
        }))
    }
}
