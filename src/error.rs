//! Evaluation Error Types

use crate::ast::{Expression, LVar};
use thiserror::Error;

/// Errors raised while evaluating a query
///
/// A pattern that matches nothing is not an error; these variants only signal
/// rules that cannot be evaluated as written.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EvalError {
    /// Strict substitution found a variable with no binding, usually a rule
    /// head variable that no positive body clause binds
    #[error("Unbound variable {var} in strict substitution of {expr}")]
    UnboundVariable { var: LVar, expr: Expression },

    /// Rule body consists only of negated clauses
    #[error("Rule {pattern} has no positive clause to seed join")]
    NoPositiveClause { pattern: Expression },
}

/// Result type for evaluation operations
pub type EvalResult<T> = Result<T, EvalError>;
