//! Builder Patterns for AST Construction
//!
//! Provides fluent APIs for constructing expressions and rules, particularly
//! useful for tests and for callers assembling ad-hoc queries.
//!
//! ## Example
//!
//! ```rust
//! use datalog_evaluator::ast::builders::{fact, ExprBuilder, RuleBuilder};
//!
//! // A stored tuple: parent("tom", "bob")
//! let tuple = fact("parent", ["tom", "bob"]);
//!
//! // A query: parent(X, "bob")
//! let query = ExprBuilder::new("parent").var("X").constant("bob").build();
//!
//! // ancestor(X, Y) :- edge(X, Z), ancestor(Z, Y).
//! let rule = RuleBuilder::new("ancestor")
//!     .head_vars(["X", "Y"])
//!     .body("edge", ["X", "Z"])
//!     .body("ancestor", ["Z", "Y"])
//!     .build();
//! ```

use super::{Clause, Expression, Rule, Term};
use crate::value::Value;

/// Build a ground tuple from a predicate symbol and constant arguments
pub fn fact<V, I>(predicate: &str, args: I) -> Expression
where
    V: Into<Value>,
    I: IntoIterator<Item = V>,
{
    std::iter::once(Term::constant(predicate))
        .chain(args.into_iter().map(Term::constant))
        .collect()
}

/// Build a pattern whose arguments are all variables
pub fn atom<'a>(predicate: &str, vars: impl IntoIterator<Item = &'a str>) -> Expression {
    std::iter::once(Term::constant(predicate))
        .chain(vars.into_iter().map(Term::var))
        .collect()
}

// ExprBuilder
/// Builder for constructing Expression instances
#[derive(Debug, Clone, Default)]
pub struct ExprBuilder {
    terms: Vec<Term>,
}

impl ExprBuilder {
    /// Start an expression with a predicate symbol as its leading term
    pub fn new(predicate: &str) -> Self {
        ExprBuilder {
            terms: vec![Term::constant(predicate)],
        }
    }

    /// Start an expression with no leading predicate symbol
    pub fn tuple() -> Self {
        ExprBuilder::default()
    }

    pub fn var(mut self, name: &str) -> Self {
        self.terms.push(Term::var(name));
        self
    }

    pub fn constant(mut self, value: impl Into<Value>) -> Self {
        self.terms.push(Term::constant(value));
        self
    }

    pub fn term(mut self, term: Term) -> Self {
        self.terms.push(term);
        self
    }

    pub fn build(self) -> Expression {
        Expression::new(self.terms)
    }
}

// RuleBuilder
/// Builder for constructing Rule instances
#[derive(Debug, Clone)]
pub struct RuleBuilder {
    head: ExprBuilder,
    clauses: Vec<Clause>,
}

impl RuleBuilder {
    pub fn new(predicate: &str) -> Self {
        RuleBuilder {
            head: ExprBuilder::new(predicate),
            clauses: Vec::new(),
        }
    }

    /// Append variables to the head
    pub fn head_vars<'a>(mut self, vars: impl IntoIterator<Item = &'a str>) -> Self {
        for var in vars {
            self.head = self.head.var(var);
        }
        self
    }

    /// Append a constant to the head
    pub fn head_constant(mut self, value: impl Into<Value>) -> Self {
        self.head = self.head.constant(value);
        self
    }

    /// Positive clause with variable arguments
    pub fn body<'a>(self, predicate: &str, vars: impl IntoIterator<Item = &'a str>) -> Self {
        self.clause(Clause::Positive(atom(predicate, vars)))
    }

    /// Negated clause with variable arguments
    pub fn negated<'a>(self, predicate: &str, vars: impl IntoIterator<Item = &'a str>) -> Self {
        self.clause(Clause::Negated(atom(predicate, vars)))
    }

    pub fn clause(mut self, clause: Clause) -> Self {
        self.clauses.push(clause);
        self
    }

    pub fn build(self) -> Rule {
        Rule::new(self.head.build(), self.clauses)
    }
}
