//! Evaluator seam
//!
//! The external semantic-judgment oracle lives behind this trait. The engine
//! never calls it on its own: hosts wire a [`Decision`](crate::Decision) to
//! an evaluator and feed the response back into the stream as a synthetic
//! note. A mock implementation covers tests and local development.

use async_trait::async_trait;
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use vigil_core::{EngineError, Note, WindowSummary};

use crate::decision::Urgency;

/// Response from an external evaluation.
#[derive(Debug, Clone)]
pub struct Evaluation {
    /// Judged quality score in [0, 10]
    pub score: f64,
    /// Issues the judge identified
    pub issues: BTreeSet<String>,
    /// Free-text reasoning
    pub reasoning: String,
}

impl Evaluation {
    /// Convert the response into a synthetic note for future aggregation.
    pub fn into_note(self, timestamp_ms: i64) -> Note {
        let mut note = Note::new(timestamp_ms, self.score.clamp(0.0, 10.0), &self.reasoning)
            .synthetic();
        note.issues = self.issues;
        note
    }
}

/// External semantic-judgment oracle.
#[async_trait]
pub trait Evaluator: Send + Sync {
    fn name(&self) -> &str;

    /// Judge the current aggregated summary at the given urgency.
    async fn evaluate(
        &self,
        summary: &WindowSummary,
        urgency: Urgency,
    ) -> Result<Evaluation, EngineError>;
}

/// A mock evaluator that cycles through predefined responses.
#[derive(Debug)]
pub struct MockEvaluator {
    responses: Vec<Evaluation>,
    index: AtomicUsize,
    latency: Duration,
    jitter: bool,
}

impl MockEvaluator {
    /// Mock with the given responses, cycled in order.
    pub fn scripted(responses: Vec<Evaluation>) -> Self {
        Self {
            responses,
            index: AtomicUsize::new(0),
            latency: Duration::from_millis(10),
            jitter: false,
        }
    }

    /// Mock that always returns the same score with no issues.
    pub fn constant(score: f64) -> Self {
        Self::scripted(vec![Evaluation {
            score,
            issues: BTreeSet::new(),
            reasoning: "mock evaluation".to_string(),
        }])
    }

    /// Add score jitter, for exercising downstream coherence paths.
    pub fn with_jitter(mut self) -> Self {
        self.jitter = true;
        self
    }

    /// Simulated call latency.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }
}

#[async_trait]
impl Evaluator for MockEvaluator {
    fn name(&self) -> &str {
        "mock"
    }

    async fn evaluate(
        &self,
        _summary: &WindowSummary,
        _urgency: Urgency,
    ) -> Result<Evaluation, EngineError> {
        tokio::time::sleep(self.latency).await;

        if self.responses.is_empty() {
            return Err(EngineError::Evaluator("mock has no responses".to_string()));
        }
        let idx = self.index.fetch_add(1, Ordering::Relaxed) % self.responses.len();
        let mut response = self.responses[idx].clone();
        if self.jitter {
            let offset: f64 = rand::random::<f64>() * 0.5 - 0.25;
            response.score = (response.score + offset).clamp(0.0, 10.0);
        }
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_constant_mock_returns_score() {
        let evaluator = MockEvaluator::constant(7.0).with_latency(Duration::from_millis(1));
        let result = evaluator
            .evaluate(&WindowSummary::empty(), Urgency::Low)
            .await
            .unwrap();
        assert_eq!(result.score, 7.0);
    }

    #[tokio::test]
    async fn test_scripted_mock_cycles() {
        let evaluator = MockEvaluator::scripted(vec![
            Evaluation {
                score: 3.0,
                issues: BTreeSet::new(),
                reasoning: "first".into(),
            },
            Evaluation {
                score: 8.0,
                issues: BTreeSet::new(),
                reasoning: "second".into(),
            },
        ])
        .with_latency(Duration::from_millis(1));

        let summary = WindowSummary::empty();
        let a = evaluator.evaluate(&summary, Urgency::Low).await.unwrap();
        let b = evaluator.evaluate(&summary, Urgency::Low).await.unwrap();
        let c = evaluator.evaluate(&summary, Urgency::Low).await.unwrap();
        assert_eq!((a.score, b.score, c.score), (3.0, 8.0, 3.0));
    }

    #[test]
    fn test_evaluation_becomes_synthetic_note() {
        let mut issues = BTreeSet::new();
        issues.insert("dialogue overlaps portrait".to_string());
        let evaluation = Evaluation {
            score: 4.5,
            issues,
            reasoning: "layout regression in the dialogue box".to_string(),
        };

        let note = evaluation.into_note(5_000);
        assert!(note.synthetic);
        assert_eq!(note.score, Some(4.5));
        assert!(note.issues.contains("dialogue overlaps portrait"));
    }
}
