//! Single-entry aggregation cache with explicit validity rules
//!
//! This is deliberately not a keyed cache: each stream holds exactly one
//! most-recent result, owned by that stream's processor. Validity is decided
//! by age and by note-count drift since the result was computed.
//!
//! Invalidation is count-based, not content-based. Content drift without
//! count drift goes undetected for at most `max_age_ms`; a content hash
//! would cost a full pass over the note set on every validity check.

use serde::{Deserialize, Serialize};

use vigil_core::{MultiScaleResult, WindowSummary};

/// Validity thresholds for a cache entry.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Maximum age before a result is stale
    pub max_age_ms: i64,
    /// Note-count drift, as a fraction of the current count, at or beyond
    /// which a result is stale
    pub drift_fraction: f64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_age_ms: 5_000,
            drift_fraction: 0.2,
        }
    }
}

/// The most recent aggregation result for one stream.
///
/// Either fully empty or fully populated; readers never observe a partial
/// write. `generation` increments on every successful store, letting a
/// background job detect that it was superseded before publishing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheEntry {
    pub aggregated: Option<WindowSummary>,
    pub multi_scale: Option<MultiScaleResult>,
    pub coherence: Option<f64>,
    pub last_compute_ms: i64,
    pub note_count_at_compute: usize,
    pub generation: u64,
}

impl CacheEntry {
    /// Fresh, empty entry for a new stream.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_populated(&self) -> bool {
        self.aggregated.is_some()
    }

    /// Overwrite the entry wholesale with a new result.
    pub fn store(
        &mut self,
        aggregated: WindowSummary,
        multi_scale: Option<MultiScaleResult>,
        note_count: usize,
        now_ms: i64,
    ) {
        self.coherence = Some(aggregated.coherence);
        self.aggregated = Some(aggregated);
        self.multi_scale = multi_scale;
        self.last_compute_ms = now_ms;
        self.note_count_at_compute = note_count;
        self.generation += 1;
    }

    fn drifted(&self, config: &CacheConfig, note_count: usize) -> bool {
        let drift = note_count.abs_diff(self.note_count_at_compute);
        drift as f64 >= config.drift_fraction * note_count as f64 && drift > 0
    }

    /// Whether the entry can be served as-is.
    pub fn is_valid(&self, config: &CacheConfig, note_count: usize, now_ms: i64) -> bool {
        self.is_populated()
            && now_ms - self.last_compute_ms <= config.max_age_ms
            && !self.drifted(config, note_count)
    }

    /// Looser validity (double the age bound) used to decide whether a stale
    /// entry is still worth serving while a background recompute runs.
    pub fn is_partially_valid(&self, config: &CacheConfig, note_count: usize, now_ms: i64) -> bool {
        self.is_populated()
            && now_ms - self.last_compute_ms <= config.max_age_ms * 2
            && !self.drifted(config, note_count)
    }
}
