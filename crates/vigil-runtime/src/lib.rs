//! # Vigil Runtime
//!
//! Per-session machinery around the aggregators:
//! - [`CacheEntry`] — single most-recent aggregation result with explicit
//!   validity rules
//! - [`AdaptiveProcessor`] — activity-routed summaries: cache hit, fast
//!   synchronous compute, or single-flight background recomputation
//! - [`DecisionManager`] — gates expensive external evaluations
//! - [`Evaluator`] — trait seam to the external semantic-judgment oracle
//! - [`ObservationSession`] — one stream's processor + decision manager
//!
//! Every piece of state here is owned by one session. Nothing is a process
//! singleton; two concurrent sessions never share a cache.

pub mod cache;
pub mod decision;
pub mod evaluator;
pub mod processor;
pub mod session;

pub use cache::{CacheConfig, CacheEntry};
pub use decision::{Decision, DecisionConfig, DecisionManager, DecisionReason, ManagerState, Urgency};
pub use evaluator::{Evaluation, Evaluator, MockEvaluator};
pub use processor::{AdaptiveProcessor, ProcessorConfig, Source, StreamSummary};
pub use session::ObservationSession;
