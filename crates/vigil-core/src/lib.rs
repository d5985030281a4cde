//! # Vigil Core
//!
//! Core types for the Vigil observation engine:
//! - [`Note`] — one timestamped, scored observation from the capture layer
//! - [`Window`] / [`WindowSummary`] / [`MultiScaleResult`] — aggregation output
//! - [`GoalSpec`] — resolved goal specification (tagged union)
//! - [`coherence`] — pure coherence scoring over score sequences

pub mod coherence;
pub mod error;
pub mod goal;
pub mod note;
pub mod window;

pub use coherence::{observation_consistency, score_coherence, sequence_coherence};
pub use error::EngineError;
pub use goal::{GoalCriteria, GoalSpec};
pub use note::Note;
pub use window::{MultiScaleResult, Window, WindowSummary};
