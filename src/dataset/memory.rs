//! In-memory dataset: facts and rules kept in insertion order.

use super::{Dataset, DatasetError, DatasetResult};
use crate::ast::{Expression, Rule};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::sync::Arc;

#[derive(Debug, Clone, Default)]
pub struct MemoryDataset {
    facts: Vec<Expression>,
    rules: Vec<Arc<Rule>>,
}

/// On-disk JSON layout
#[derive(Serialize, Deserialize)]
struct Snapshot {
    #[serde(default)]
    facts: Vec<Expression>,
    #[serde(default)]
    rules: Vec<Rule>,
}

impl MemoryDataset {
    pub fn new() -> Self {
        MemoryDataset::default()
    }

    /// Store a fact; rejects expressions containing variables
    pub fn add_fact(&mut self, fact: Expression) -> DatasetResult<()> {
        if !fact.is_ground() {
            return Err(DatasetError::NonGroundFact(fact));
        }
        self.facts.push(fact);
        Ok(())
    }

    pub fn add_facts(&mut self, facts: impl IntoIterator<Item = Expression>) -> DatasetResult<()> {
        for fact in facts {
            self.add_fact(fact)?;
        }
        Ok(())
    }

    /// Store a rule as given
    ///
    /// Rules that cannot be evaluated surface as errors at query time.
    pub fn add_rule(&mut self, rule: Rule) {
        self.rules.push(Arc::new(rule));
    }

    /// Store a rule only if it is safe (see [`Rule::is_safe`])
    pub fn try_add_rule(&mut self, rule: Rule) -> DatasetResult<()> {
        if !rule.is_safe() {
            return Err(DatasetError::UnsafeRule(Box::new(rule)));
        }
        self.add_rule(rule);
        Ok(())
    }

    pub fn facts(&self) -> &[Expression] {
        &self.facts
    }

    pub fn rule_list(&self) -> &[Arc<Rule>] {
        &self.rules
    }

    pub fn fact_count(&self) -> usize {
        self.facts.len()
    }

    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    pub fn to_json_string(&self) -> DatasetResult<String> {
        let snapshot = Snapshot {
            facts: self.facts.clone(),
            rules: self.rules.iter().map(|rule| rule.as_ref().clone()).collect(),
        };
        Ok(serde_json::to_string_pretty(&snapshot)?)
    }

    /// Parse a JSON snapshot, validating facts as they are added
    pub fn from_json_str(json: &str) -> DatasetResult<Self> {
        let snapshot: Snapshot = serde_json::from_str(json)?;
        let mut dataset = MemoryDataset::new();
        dataset.add_facts(snapshot.facts)?;
        for rule in snapshot.rules {
            dataset.add_rule(rule);
        }
        Ok(dataset)
    }

    pub fn save_json(&self, path: impl AsRef<Path>) -> DatasetResult<()> {
        fs::write(path, self.to_json_string()?)?;
        Ok(())
    }

    pub fn load_json(path: impl AsRef<Path>) -> DatasetResult<Self> {
        let json = fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }
}

impl Dataset for MemoryDataset {
    fn tuples(&self) -> Box<dyn Iterator<Item = Expression> + '_> {
        Box::new(self.facts.iter().cloned())
    }

    fn rules(&self) -> Box<dyn Iterator<Item = Arc<Rule>> + '_> {
        Box::new(self.rules.iter().cloned())
    }
}
