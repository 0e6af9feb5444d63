//! # Datalog AST - Terms, Expressions and Rules
//!
//! The objects the evaluator is handed: logic variables, constants, fixed-arity
//! expressions built from them, and rules made of a head pattern and a body.
//!
//! An [`Expression`] plays two roles:
//! - a *pattern* (query or clause), e.g. `("parent", X, "bob")`
//! - a *stored tuple* (all constants) in a dataset
//!
//! By convention the leading term of an expression is its predicate symbol.
//!
//! ## Builders
//!
//! For programmatic construction see the [`builders`] module, which provides
//! fluent APIs like `ExprBuilder` and `RuleBuilder`.

use crate::error::{EvalError, EvalResult};
use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

pub mod builders;

/// Predicate symbol of the built-in equality check `("=", A, B)`
pub const EQUALITY_PREDICATE: &str = "=";

/// A logic variable, identified by name
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LVar(Arc<str>);

impl LVar {
    pub fn new(name: &str) -> Self {
        LVar(Arc::from(name))
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LVar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A single position in an expression
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Term {
    /// Atomic value, compared by value
    Constant(Value),
    /// Placeholder bound during unification; never stored in a fact
    Var(LVar),
}

impl Term {
    pub fn constant(value: impl Into<Value>) -> Self {
        Term::Constant(value.into())
    }

    pub fn var(name: &str) -> Self {
        Term::Var(LVar::new(name))
    }

    pub fn is_var(&self) -> bool {
        matches!(self, Term::Var(_))
    }

    pub fn as_constant(&self) -> Option<&Value> {
        match self {
            Term::Constant(value) => Some(value),
            Term::Var(_) => None,
        }
    }

    pub fn as_var(&self) -> Option<&LVar> {
        match self {
            Term::Var(var) => Some(var),
            Term::Constant(_) => None,
        }
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Term::Constant(value) => write!(f, "{value}"),
            Term::Var(var) => write!(f, "{var}"),
        }
    }
}

impl From<Value> for Term {
    fn from(value: Value) -> Self {
        Term::Constant(value)
    }
}

impl From<LVar> for Term {
    fn from(var: LVar) -> Self {
        Term::Var(var)
    }
}

/// Ordered, fixed-arity sequence of terms
///
/// Cheap to clone: the terms live behind an `Arc`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Expression(Arc<[Term]>);

impl Expression {
    pub fn new(terms: Vec<Term>) -> Self {
        Expression(Arc::from(terms))
    }

    pub fn terms(&self) -> &[Term] {
        &self.0
    }

    pub fn arity(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Term> {
        self.0.iter()
    }

    /// The leading term, used as the predicate-symbol prefilter for rules
    pub fn leading(&self) -> Option<&Term> {
        self.0.first()
    }

    /// Leading term when it is a constant
    pub fn predicate(&self) -> Option<&Value> {
        self.leading().and_then(Term::as_constant)
    }

    /// True when no position holds a variable (i.e. it can be stored as a fact)
    pub fn is_ground(&self) -> bool {
        !self.0.iter().any(Term::is_var)
    }

    /// True for the built-in `("=", A, B)`
    pub fn is_equality(&self) -> bool {
        self.arity() == 3 && self.predicate().and_then(Value::as_str) == Some(EQUALITY_PREDICATE)
    }

    pub fn variables(&self) -> BTreeSet<LVar> {
        self.0.iter().filter_map(Term::as_var).cloned().collect()
    }
}

impl FromIterator<Term> for Expression {
    fn from_iter<I: IntoIterator<Item = Term>>(iter: I) -> Self {
        Expression(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a Expression {
    type Item = &'a Term;
    type IntoIter = std::slice::Iter<'a, Term>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // predicate(args) when the leading term is a string symbol, tuple syntax otherwise
        let (head, args) = match self.predicate().and_then(Value::as_str) {
            Some(symbol) => (symbol, &self.0[1..]),
            None => ("", &self.0[..]),
        };
        write!(f, "{head}(")?;
        for (i, term) in args.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{term}")?;
        }
        write!(f, ")")
    }
}

/// A body subgoal
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Clause {
    Positive(Expression),
    /// Negation as failure: holds when the inner expression has no match
    Negated(Expression),
}

impl Clause {
    pub fn expression(&self) -> &Expression {
        match self {
            Clause::Positive(expr) | Clause::Negated(expr) => expr,
        }
    }

    pub fn is_positive(&self) -> bool {
        matches!(self, Clause::Positive(_))
    }
}

impl From<Expression> for Clause {
    fn from(expr: Expression) -> Self {
        Clause::Positive(expr)
    }
}

impl fmt::Display for Clause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Clause::Positive(expr) => write!(f, "{expr}"),
            Clause::Negated(expr) => write!(f, "not {expr}"),
        }
    }
}

/// Represents a single Datalog rule
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rule {
    /// Head; its variables are bound by the body
    pub pattern: Expression,
    /// Conjunctive body in source order
    pub clauses: Vec<Clause>,
}

impl Rule {
    /// Create a new rule
    pub fn new(pattern: Expression, clauses: Vec<Clause>) -> Self {
        Rule { pattern, clauses }
    }

    /// Create a rule with only positive clauses (no negation)
    pub fn new_simple(pattern: Expression, body: Vec<Expression>) -> Self {
        Rule {
            pattern,
            clauses: body.into_iter().map(Clause::Positive).collect(),
        }
    }

    pub fn positive_clauses(&self) -> impl Iterator<Item = &Expression> {
        self.clauses.iter().filter_map(|clause| match clause {
            Clause::Positive(expr) => Some(expr),
            Clause::Negated(_) => None,
        })
    }

    pub fn negated_clauses(&self) -> impl Iterator<Item = &Expression> {
        self.clauses.iter().filter_map(|clause| match clause {
            Clause::Negated(expr) => Some(expr),
            Clause::Positive(_) => None,
        })
    }

    /// Variables bound by positive clauses
    ///
    /// Equality clauses only compare, so they bind nothing.
    pub fn positive_variables(&self) -> BTreeSet<LVar> {
        self.positive_clauses()
            .filter(|expr| !expr.is_equality())
            .flat_map(Expression::variables)
            .collect()
    }

    /// Get all variables in this rule
    pub fn variables(&self) -> BTreeSet<LVar> {
        let mut vars = self.pattern.variables();
        for clause in &self.clauses {
            vars.extend(clause.expression().variables());
        }
        vars
    }

    /// Report the error evaluation of this rule would raise, if any
    pub fn check(&self) -> EvalResult<()> {
        if self.positive_clauses().next().is_none() {
            return Err(EvalError::NoPositiveClause {
                pattern: self.pattern.clone(),
            });
        }
        let bound = self.positive_variables();
        if let Some(var) = self.pattern.variables().into_iter().find(|v| !bound.contains(v)) {
            return Err(EvalError::UnboundVariable {
                var,
                expr: self.pattern.clone(),
            });
        }
        Ok(())
    }

    /// Check if this rule is safe (range-restricted)
    ///
    /// A rule is safe if:
    /// 1. It evaluates without error (see [`Rule::check`])
    /// 2. All variables in negated clauses appear in positive clauses
    pub fn is_safe(&self) -> bool {
        if self.check().is_err() {
            return false;
        }
        let bound = self.positive_variables();
        self.negated_clauses()
            .all(|expr| expr.variables().is_subset(&bound))
    }

    /// Check if this rule is recursive (head predicate appears in body)
    pub fn is_recursive(&self) -> bool {
        self.clauses
            .iter()
            .any(|clause| clause.expression().leading() == self.pattern.leading())
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} :- ", self.pattern)?;
        for (i, clause) in self.clauses.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{clause}")?;
        }
        write!(f, ".")
    }
}
