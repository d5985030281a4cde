//! Goal specifications
//!
//! Hosts describe what the exercised experience is supposed to achieve in
//! several shapes (a plain sentence, structured criteria, an ordered list of
//! sub-goals). All of them resolve into one tagged union at the boundary so
//! the aggregation and decision core only ever sees a single concrete shape.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Structured goal criteria.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GoalCriteria {
    /// What the experience should accomplish
    pub description: String,
    /// Conditions that indicate success
    pub success_conditions: Vec<String>,
    /// Issues that, if observed, make an evaluation urgent
    pub critical_issues: Vec<String>,
}

/// A resolved goal specification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum GoalSpec {
    /// Free-text goal
    Text(String),
    /// Structured criteria with success conditions and critical issues
    Criteria(GoalCriteria),
    /// Ordered sub-goals
    Sequence(Vec<GoalSpec>),
}

impl GoalSpec {
    /// Human-readable description of the goal.
    pub fn description(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::Criteria(c) => c.description.clone(),
            Self::Sequence(goals) => goals
                .iter()
                .map(GoalSpec::description)
                .collect::<Vec<_>>()
                .join("; "),
        }
    }

    /// All critical issues declared anywhere in the goal.
    pub fn critical_issues(&self) -> BTreeSet<String> {
        match self {
            Self::Text(_) => BTreeSet::new(),
            Self::Criteria(c) => c.critical_issues.iter().cloned().collect(),
            Self::Sequence(goals) => goals.iter().flat_map(GoalSpec::critical_issues).collect(),
        }
    }

    /// Whether any of the given issues is declared critical by this goal.
    pub fn any_critical<'a>(&self, issues: impl IntoIterator<Item = &'a String>) -> bool {
        let critical = self.critical_issues();
        issues.into_iter().any(|issue| critical.contains(issue))
    }
}

impl From<&str> for GoalSpec {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<String> for GoalSpec {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<GoalCriteria> for GoalSpec {
    fn from(criteria: GoalCriteria) -> Self {
        Self::Criteria(criteria)
    }
}

impl From<Vec<GoalSpec>> for GoalSpec {
    fn from(goals: Vec<GoalSpec>) -> Self {
        Self::Sequence(goals)
    }
}
