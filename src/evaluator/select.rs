//! Selector: facts and rule-derived tuples matching one expression.

use super::{Answer, Answers, Evaluator, RecursionGuard, Stream};
use crate::ast::{Expression, Rule};
use crate::bindings::Bindings;
use crate::dataset::{CacheKey, CacheLookup, RuleCache};
use crate::error::EvalResult;
use crate::unify::{apply_bindings, substitute, unify, Substitution};
use std::cell::RefCell;
use std::collections::HashSet;
use std::iter;
use std::rc::Rc;
use std::sync::Arc;

impl<'a> Evaluator<'a> {
    pub(crate) fn select_guarded(self, expr: Expression, bindings: Bindings, guard: RecursionGuard) -> Answers<'a> {
        if expr.is_equality() {
            return Self::select_equality(expr, bindings);
        }

        let facts = self.scan_tuples(&expr, &bindings);
        let derived = self.scan_rules(expr, bindings, guard);
        Box::new(facts.chain(derived))
    }

    /// `("=", A, B)` holds once when both sides are equal after substitution
    fn select_equality(expr: Expression, bindings: Bindings) -> Answers<'a> {
        let bound = substitute(&expr, &bindings);
        if bound.terms()[1] == bound.terms()[2] {
            Box::new(iter::once(Ok(Answer::new(expr, bindings))))
        } else {
            Box::new(iter::empty())
        }
    }

    fn scan_tuples(self, expr: &Expression, bindings: &Bindings) -> Answers<'a> {
        let candidates = match self.index() {
            Some(index) => index.scan_index(&substitute(expr, bindings)),
            None => self.db.tuples(),
        };
        let expr = expr.clone();
        let bindings = bindings.clone();
        Box::new(candidates.filter_map(move |tuple| {
            unify(&tuple, &expr, Some(&bindings)).map(|matched| Ok(Answer::new(tuple, matched)))
        }))
    }

    fn scan_rules(self, expr: Expression, bindings: Bindings, guard: RecursionGuard) -> Answers<'a> {
        let cached = self.cache().is_some();
        let yielded: Rc<RefCell<HashSet<Expression>>> = Rc::default();
        let leading = expr.leading().cloned();

        let rules = self
            .db
            .rules()
            .filter(move |rule| rule.pattern.leading() == leading.as_ref());

        Box::new(rules.flat_map(move |rule| -> Answers<'a> {
            if !cached && guard.contains_rule(&rule) {
                tracing::debug!(rule = %rule, depth = guard.depth(), "rule_skipped_recursion_guard");
                return Box::new(iter::empty());
            }

            let expr = expr.clone();
            let bindings = bindings.clone();
            let yielded = Rc::clone(&yielded);
            let derived = self.derive(rule, &expr, guard.clone());

            Box::new(derived.filter_map(move |tuple| {
                let tuple = match tuple {
                    Ok(tuple) => tuple,
                    Err(e) => return Some(Err(e)),
                };
                // re-match in the caller's namespace, then drop repeats
                let matched = unify(&tuple, &expr, Some(&bindings))?;
                if !yielded.borrow_mut().insert(tuple.clone()) {
                    return None;
                }
                Some(Ok(Answer::new(tuple, matched)))
            }))
        }))
    }

    /// Tuples `rule` derives for the instantiation `expr` asks for
    fn derive(self, rule: Arc<Rule>, expr: &Expression, guard: RecursionGuard) -> Stream<'a, Expression> {
        let base = unify(expr, &rule.pattern, None).unwrap_or_default();
        let head = substitute(&rule.pattern, &base);
        let key = CacheKey::new(rule, head);

        let Some(cache) = self.cache() else {
            tracing::debug!(rule = %key.rule, head = %key.head, depth = guard.depth(), "rule_expand");
            let guard = guard.expanding(&key.rule);
            return self.instantiate(key, base, guard);
        };

        match cache.scan_cache(&key) {
            CacheLookup::Complete(tuples) => {
                tracing::debug!(head = %key.head, tuples = tuples.len(), "rule_cache_hit");
                Box::new(tuples.into_iter().map(Ok))
            }
            CacheLookup::Pending(tuples) if guard.is_filling(&key) => {
                tracing::debug!(head = %key.head, tuples = tuples.len(), "rule_cache_reentry");
                Box::new(tuples.into_iter().map(Ok))
            }
            CacheLookup::Pending(_) if guard.is_bypassing(&key) => {
                tracing::debug!(head = %key.head, depth = guard.depth(), "rule_skipped_recursion_guard");
                Box::new(iter::empty())
            }
            CacheLookup::Pending(_) => {
                tracing::debug!(rule = %key.rule, head = %key.head, depth = guard.depth(), "rule_cache_bypass");
                let guard = guard.bypassing(&key);
                self.instantiate(key, base, guard)
            }
            CacheLookup::Reserved => {
                tracing::debug!(rule = %key.rule, head = %key.head, depth = guard.depth(), "rule_expand");
                let guard = guard.filling(&key);
                let tuples = self.instantiate(key.clone(), base, guard);
                Box::new(CacheFill::new(cache, key, tuples))
            }
        }
    }

    /// Rule body solutions turned into ground head tuples
    fn instantiate(self, key: CacheKey, base: Bindings, guard: RecursionGuard) -> Stream<'a, Expression> {
        let solutions = self.join_guarded(&key.rule.pattern, &key.rule.clauses, base, guard);
        Box::new(solutions.map(move |solution| {
            solution.and_then(|bindings| apply_bindings(&key.rule.pattern, &bindings, Substitution::Strict))
        }))
    }
}

/// Records the tuples of one derivation under its reserved cache entry
///
/// The entry is completed when the derivation runs to the end without error.
/// If it fails, or is dropped before the end, the entry is abandoned.
struct CacheFill<'a> {
    cache: &'a dyn RuleCache,
    key: CacheKey,
    tuples: Stream<'a, Expression>,
    done: bool,
    failed: bool,
}

impl<'a> CacheFill<'a> {
    fn new(cache: &'a dyn RuleCache, key: CacheKey, tuples: Stream<'a, Expression>) -> Self {
        CacheFill {
            cache,
            key,
            tuples,
            done: false,
            failed: false,
        }
    }
}

impl Iterator for CacheFill<'_> {
    type Item = EvalResult<Expression>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.tuples.next() {
            Some(Ok(tuple)) => {
                self.cache.cache_tuple(&self.key, tuple.clone());
                Some(Ok(tuple))
            }
            Some(Err(e)) => {
                self.failed = true;
                Some(Err(e))
            }
            None => {
                self.done = true;
                if self.failed {
                    self.cache.abandon_cache(&self.key);
                } else {
                    self.cache.complete_cache(&self.key);
                }
                None
            }
        }
    }
}

impl Drop for CacheFill<'_> {
    fn drop(&mut self) {
        if !self.done {
            tracing::debug!(head = %self.key.head, "rule_cache_abandoned");
            self.cache.abandon_cache(&self.key);
        }
    }
}
