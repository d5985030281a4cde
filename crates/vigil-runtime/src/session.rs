//! Per-stream session façade
//!
//! Ties one processor, one decision manager, and one goal into the unit a
//! host creates per exercised experience. Sessions own all of their state;
//! running several concurrently shares nothing.

use tracing::debug;
use uuid::Uuid;

use vigil_core::{EngineError, GoalSpec, Note};

use crate::decision::{Decision, DecisionConfig, DecisionManager};
use crate::evaluator::Evaluator;
use crate::processor::{AdaptiveProcessor, ProcessorConfig, StreamSummary};

/// One observed stream: ingest notes, query summaries, gate evaluations.
pub struct ObservationSession {
    pub id: Uuid,
    processor: AdaptiveProcessor,
    decisions: DecisionManager,
}

impl ObservationSession {
    /// New session with default configuration.
    pub fn new(goal: impl Into<GoalSpec>) -> Self {
        Self::with_config(goal, ProcessorConfig::default(), DecisionConfig::default())
    }

    pub fn with_config(
        goal: impl Into<GoalSpec>,
        processor: ProcessorConfig,
        decisions: DecisionConfig,
    ) -> Self {
        let id = Uuid::new_v4();
        debug!(session_id = %id, "Starting observation session");
        Self {
            id,
            processor: AdaptiveProcessor::new(processor),
            decisions: DecisionManager::new(goal.into(), decisions),
        }
    }

    /// Ingest one note. Malformed notes are dropped with a warning.
    pub fn ingest(&mut self, note: Note) -> bool {
        self.processor.ingest(note)
    }

    /// Current summary via the adaptive fast path.
    pub fn summary(&mut self, now_ms: i64) -> StreamSummary {
        self.processor.summary(now_ms)
    }

    /// [`Self::summary`] against the current wall clock.
    pub fn summary_now(&mut self) -> StreamSummary {
        self.summary(chrono::Utc::now().timestamp_millis())
    }

    /// [`Self::decide`] against the current wall clock.
    pub fn decide_now(&mut self) -> (StreamSummary, Decision) {
        self.decide(chrono::Utc::now().timestamp_millis())
    }

    /// Current summary plus the gating verdict for it.
    pub fn decide(&mut self, now_ms: i64) -> (StreamSummary, Decision) {
        let summary = self.processor.summary(now_ms);
        let decision = self
            .decisions
            .decide(&summary, self.processor.newest(), now_ms);
        (summary, decision)
    }

    /// Run an external evaluation of the given summary and feed the response
    /// back into the stream as a synthetic note.
    ///
    /// This is host wiring made convenient; the engine itself never invokes
    /// an evaluator. Evaluator failures propagate — the stream is unchanged.
    pub async fn evaluate_and_ingest(
        &mut self,
        evaluator: &dyn Evaluator,
        summary: &StreamSummary,
        decision: Decision,
        now_ms: i64,
    ) -> Result<(), EngineError> {
        let evaluation = evaluator
            .evaluate(&summary.aggregated, decision.urgency)
            .await?;
        debug!(session_id = %self.id, score = evaluation.score, "Ingesting evaluator feedback");
        self.ingest(evaluation.into_note(now_ms));
        Ok(())
    }

    /// Wait for any in-flight background recompute.
    pub async fn finish_background(&mut self) {
        self.processor.finish_background().await;
    }

    /// Retained notes, for inspection.
    pub fn notes(&self) -> &[Note] {
        self.processor.notes()
    }
}
