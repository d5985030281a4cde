//! Engine error types

use thiserror::Error;

/// Errors surfaced by the observation engine.
///
/// All of these are local and recoverable. Aggregation itself never fails:
/// malformed input is dropped with a warning and empty input yields a neutral
/// result, so errors only appear at explicit seams (ingest validation, the
/// evaluator boundary).
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Malformed note: {0}")]
    MalformedNote(String),
    #[error("Evaluator failed: {0}")]
    Evaluator(String),
}
