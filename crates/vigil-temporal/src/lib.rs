//! # Vigil Temporal
//!
//! Stream-shape analysis and temporal aggregation:
//! - [`WindowedAggregator`] — fixed-size decayed windows over a note stream
//! - [`MultiScaleAggregator`] — the same stream at several time scales with
//!   attention-based note weighting
//! - [`ActivityDetector`] — arrival-rate classification (high/medium/low)
//! - [`AdaptiveWindowSizer`] — window size from the recent stream pattern

pub mod activity;
pub mod multiscale;
pub mod sizing;
pub mod windowed;

pub use activity::{ActivityConfig, ActivityDetector, ActivityLevel};
pub use multiscale::{attention_weight, prune_by_attention, MultiScaleAggregator, MultiScaleConfig, ScaleSet};
pub use sizing::{AdaptiveWindowSizer, StreamPattern};
pub use windowed::{WindowedAggregator, WindowedConfig};
