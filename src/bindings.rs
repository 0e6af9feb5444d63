//! Binding maps: partial substitutions from logic variables to constants.
//!
//! Backed by a persistent `im::HashMap`, so cloning is O(1) and extending a
//! clone leaves the original untouched. Alternative branches of a search can
//! therefore share a binding prefix without copying it.

use crate::ast::LVar;
use crate::value::Value;
use std::fmt;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Bindings(im::HashMap<LVar, Value>);

impl Bindings {
    pub fn new() -> Self {
        Bindings(im::HashMap::new())
    }

    pub fn get(&self, var: &LVar) -> Option<&Value> {
        self.0.get(var)
    }

    /// Lookup by variable name
    pub fn value_of(&self, name: &str) -> Option<&Value> {
        self.0.get(&LVar::new(name))
    }

    pub fn contains(&self, var: &LVar) -> bool {
        self.0.contains_key(var)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&LVar, &Value)> {
        self.0.iter()
    }

    pub fn insert(&mut self, var: LVar, value: Value) {
        self.0.insert(var, value);
    }

    /// Copy extended with one more binding
    pub fn with(&self, var: LVar, value: Value) -> Self {
        Bindings(self.0.update(var, value))
    }

    /// `self` overlaid with `other`; `other` wins on shared keys
    pub fn merged(&self, other: &Bindings) -> Self {
        Bindings(other.0.clone().union(self.0.clone()))
    }

    /// Keep only the given variables
    pub fn restricted<'a>(&self, vars: impl IntoIterator<Item = &'a LVar>) -> Self {
        vars.into_iter()
            .filter_map(|var| self.get(var).map(|value| (var.clone(), value.clone())))
            .collect()
    }

    /// Bindings sorted by variable name, for stable output
    pub fn sorted(&self) -> Vec<(&LVar, &Value)> {
        let mut pairs: Vec<_> = self.0.iter().collect();
        pairs.sort_by(|a, b| a.0.cmp(b.0));
        pairs
    }
}

impl FromIterator<(LVar, Value)> for Bindings {
    fn from_iter<I: IntoIterator<Item = (LVar, Value)>>(iter: I) -> Self {
        Bindings(iter.into_iter().collect())
    }
}

impl fmt::Display for Bindings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, (var, value)) in self.sorted().into_iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{var}: {value}")?;
        }
        write!(f, "}}")
    }
}
