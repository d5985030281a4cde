//! Observation notes

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

use crate::error::EngineError;

/// Valid score range for a note.
pub const SCORE_MIN: f64 = 0.0;
/// Upper bound of the score range.
pub const SCORE_MAX: f64 = 10.0;

/// One timestamped observation of the experience under exercise.
///
/// Notes are immutable once created: the engine consumes them, it never
/// mutates them. Scores are optional — a purely descriptive note carries
/// `None` and contributes issues/text but no weight to any window average.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Note {
    /// Unique identifier
    pub id: Uuid,
    /// Epoch milliseconds when the observation was made
    pub timestamp_ms: i64,
    /// Quality score in [0, 10], if the observer assigned one
    pub score: Option<f64>,
    /// Free-text observation
    pub observation: String,
    /// Issues spotted at this point (stable, deduplicated ordering)
    pub issues: BTreeSet<String>,
    /// Whether this note marks a user/agent action (click, keypress, move)
    pub is_action_event: bool,
    /// Whether this note observes something not seen before in the session
    pub is_novel: bool,
    /// Whether this note was fed back from an external evaluation
    pub synthetic: bool,
}

impl Note {
    /// Create a new scored note.
    pub fn new(timestamp_ms: i64, score: f64, observation: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp_ms,
            score: Some(score),
            observation: observation.to_string(),
            issues: BTreeSet::new(),
            is_action_event: false,
            is_novel: false,
            synthetic: false,
        }
    }

    /// Create a scored note stamped with the current wall clock.
    pub fn now(score: f64, observation: &str) -> Self {
        Self::new(chrono::Utc::now().timestamp_millis(), score, observation)
    }

    /// Create a descriptive note without a score.
    pub fn unscored(timestamp_ms: i64, observation: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp_ms,
            score: None,
            observation: observation.to_string(),
            issues: BTreeSet::new(),
            is_action_event: false,
            is_novel: false,
            synthetic: false,
        }
    }

    /// Attach an issue.
    pub fn with_issue(mut self, issue: &str) -> Self {
        self.issues.insert(issue.to_string());
        self
    }

    /// Mark as an action event.
    pub fn action(mut self) -> Self {
        self.is_action_event = true;
        self
    }

    /// Mark as novel.
    pub fn novel(mut self) -> Self {
        self.is_novel = true;
        self
    }

    /// Mark as synthetic (produced from evaluator feedback).
    pub fn synthetic(mut self) -> Self {
        self.synthetic = true;
        self
    }

    /// Validate the note against the engine's input contract.
    ///
    /// A malformed note is never fatal: callers drop it with a warning.
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.timestamp_ms <= 0 {
            return Err(EngineError::MalformedNote(format!(
                "non-positive timestamp {}",
                self.timestamp_ms
            )));
        }
        if let Some(score) = self.score {
            if !score.is_finite() || !(SCORE_MIN..=SCORE_MAX).contains(&score) {
                return Err(EngineError::MalformedNote(format!(
                    "score {score} outside [{SCORE_MIN}, {SCORE_MAX}]"
                )));
            }
        }
        Ok(())
    }

    /// Age of this note in milliseconds relative to a reference time.
    pub fn age_ms(&self, reference_ms: i64) -> i64 {
        (reference_ms - self.timestamp_ms).max(0)
    }
}
