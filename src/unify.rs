//! # Unification and Substitution
//!
//! [`unify`] matches a stored tuple against a pattern position by position,
//! extending a copy of the caller's bindings. Failure is `None`, not an error.
//!
//! [`apply_bindings`] goes the other way and writes bound constants back into
//! a pattern, either requiring every variable to be bound ([`Substitution::Strict`])
//! or leaving unbound ones in place ([`Substitution::Lenient`]).

use crate::ast::{Expression, Term};
use crate::bindings::Bindings;
use crate::error::{EvalError, EvalResult};

/// How [`apply_bindings`] treats a variable missing from the bindings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Substitution {
    /// Missing binding is an [`EvalError::UnboundVariable`]
    Strict,
    /// Missing binding leaves the variable in place
    Lenient,
}

/// Unify `tuple` against `pattern`, extending a copy of `bindings`
///
/// Positional rules:
/// - pattern variable vs tuple variable: skipped, the two are not unified
/// - unbound pattern variable: bound to the tuple's constant
/// - bound pattern variable: the tuple's constant must equal the bound value
/// - pattern constant: the tuple term must be the same constant
///
/// Expressions of different arity never match.
pub fn unify(tuple: &Expression, pattern: &Expression, bindings: Option<&Bindings>) -> Option<Bindings> {
    if tuple.arity() != pattern.arity() {
        return None;
    }

    let mut out = bindings.cloned().unwrap_or_default();
    for (expected, actual) in pattern.iter().zip(tuple.iter()) {
        match (expected, actual) {
            (Term::Var(_), Term::Var(_)) => {}
            (Term::Var(var), Term::Constant(value)) => match out.get(var) {
                Some(bound) if bound != value => return None,
                Some(_) => {}
                None => out.insert(var.clone(), value.clone()),
            },
            (Term::Constant(_), _) => {
                if expected != actual {
                    return None;
                }
            }
        }
    }
    Some(out)
}

/// Replace every bound variable in `expr` with its constant
pub fn apply_bindings(expr: &Expression, bindings: &Bindings, mode: Substitution) -> EvalResult<Expression> {
    expr.iter()
        .map(|term| match term {
            Term::Var(var) => match (bindings.get(var), mode) {
                (Some(value), _) => Ok(Term::Constant(value.clone())),
                (None, Substitution::Lenient) => Ok(term.clone()),
                (None, Substitution::Strict) => Err(EvalError::UnboundVariable {
                    var: var.clone(),
                    expr: expr.clone(),
                }),
            },
            Term::Constant(_) => Ok(term.clone()),
        })
        .collect::<EvalResult<Vec<_>>>()
        .map(Expression::new)
}

/// Lenient substitution, which cannot fail
pub(crate) fn substitute(expr: &Expression, bindings: &Bindings) -> Expression {
    if bindings.is_empty() {
        return expr.clone();
    }
    expr.iter()
        .map(|term| match term {
            Term::Var(var) => bindings
                .get(var)
                .map_or_else(|| term.clone(), |value| Term::Constant(value.clone())),
            Term::Constant(_) => term.clone(),
        })
        .collect()
}
