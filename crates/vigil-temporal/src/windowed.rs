//! Fixed-size decayed window aggregation

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::warn;

use vigil_core::coherence::sequence_coherence;
use vigil_core::{Note, Window, WindowSummary};

/// Configuration for windowed aggregation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct WindowedConfig {
    /// Width of each window in milliseconds
    pub window_size_ms: i64,
    /// Per-window-size multiplicative weight reduction for older notes
    pub decay_factor: f64,
}

impl Default for WindowedConfig {
    fn default() -> Self {
        Self {
            window_size_ms: 10_000,
            decay_factor: 0.9,
        }
    }
}

impl WindowedConfig {
    /// Config with a specific window size, default decay.
    pub fn with_window_size(window_size_ms: i64) -> Self {
        Self {
            window_size_ms,
            ..Self::default()
        }
    }
}

/// Groups notes into fixed-size windows with exponential age decay.
#[derive(Debug, Clone, Default)]
pub struct WindowedAggregator {
    config: WindowedConfig,
}

impl WindowedAggregator {
    pub fn new(config: WindowedConfig) -> Self {
        Self { config }
    }

    /// Weight of a note at the given age, relative to the newest note in its
    /// window. Strictly non-increasing in age for decay factors in (0, 1).
    pub fn decay_weight(&self, age_ms: i64) -> f64 {
        self.config
            .decay_factor
            .powf(age_ms.max(0) as f64 / self.config.window_size_ms as f64)
    }

    /// Aggregate a note stream into decayed windows.
    ///
    /// Malformed notes are dropped with a warning; out-of-order arrivals are
    /// tolerated by sorting internally. Windows in which no note carries a
    /// score are excluded from the result. Never fails: an empty (or fully
    /// malformed) stream yields the neutral empty summary.
    pub fn aggregate(&self, notes: &[Note]) -> WindowSummary {
        let mut valid: Vec<&Note> = notes
            .iter()
            .filter(|note| match note.validate() {
                Ok(()) => true,
                Err(e) => {
                    warn!(note_id = %note.id, error = %e, "Dropping malformed note");
                    false
                }
            })
            .collect();
        if valid.is_empty() {
            return WindowSummary::empty();
        }
        valid.sort_by_key(|note| note.timestamp_ms);

        let base_ms = valid[0].timestamp_ms;
        let size = self.config.window_size_ms.max(1);

        // Bucket by window index relative to the earliest note.
        let mut buckets: Vec<Vec<&Note>> = Vec::new();
        for note in &valid {
            let idx = ((note.timestamp_ms - base_ms) / size) as usize;
            if buckets.len() <= idx {
                buckets.resize_with(idx + 1, Vec::new);
            }
            buckets[idx].push(note);
        }

        let mut windows = Vec::new();
        let mut prior_issues: Option<BTreeSet<String>> = None;
        for (idx, bucket) in buckets.iter().enumerate() {
            if bucket.is_empty() {
                continue;
            }
            if let Some(mut window) = self.reduce_bucket(bucket, base_ms + idx as i64 * size, size)
            {
                if let Some(previous) = &prior_issues {
                    window.conflicts = detect_conflicts(previous, &window.issues, bucket);
                }
                prior_issues = Some(window.issues.clone());
                windows.push(window);
            }
        }

        let scores: Vec<f64> = valid.iter().filter_map(|n| n.score).collect();
        let texts: Vec<&str> = valid
            .iter()
            .filter(|n| n.score.is_some())
            .map(|n| n.observation.as_str())
            .collect();

        WindowSummary {
            windows,
            coherence: sequence_coherence(&scores, &texts),
            note_count: valid.len(),
        }
    }

    /// Reduce one bucket to a window, or `None` if no note carries a score.
    fn reduce_bucket(&self, bucket: &[&Note], start_ms: i64, size: i64) -> Option<Window> {
        let scored: Vec<&&Note> = bucket.iter().filter(|n| n.score.is_some()).collect();
        if scored.is_empty() {
            return None;
        }

        let newest_ms = bucket.iter().map(|n| n.timestamp_ms).max().unwrap_or(start_ms);
        let mut weighted_sum = 0.0;
        let mut weight_sum = 0.0;
        for note in &scored {
            let weight = self.decay_weight(note.age_ms(newest_ms));
            weighted_sum += note.score.unwrap_or(0.0) * weight;
            weight_sum += weight;
        }

        let scores: Vec<f64> = scored.iter().filter_map(|n| n.score).collect();
        let texts: Vec<&str> = scored.iter().map(|n| n.observation.as_str()).collect();

        Some(Window {
            start_ms,
            end_ms: start_ms + size,
            weighted_score: weighted_sum / weight_sum,
            note_count: bucket.len(),
            issues: bucket.iter().flat_map(|n| n.issues.iter().cloned()).collect(),
            coherence: sequence_coherence(&scores, &texts),
            conflicts: Vec::new(),
        })
    }
}

/// Flag issues that silently disappeared between consecutive windows.
///
/// Heuristic contradiction detector: an issue reported earlier but absent
/// now, with no note in the current window mentioning a resolution, is a
/// likely contradiction between observations rather than an actual fix.
fn detect_conflicts(
    previous: &BTreeSet<String>,
    current: &BTreeSet<String>,
    bucket: &[&Note],
) -> Vec<String> {
    let resolved_mentioned = bucket.iter().any(|note| {
        let text = note.observation.to_lowercase();
        text.contains("resolv") || text.contains("fixed")
    });
    if resolved_mentioned {
        return Vec::new();
    }
    previous
        .difference(current)
        .map(|issue| format!("issue '{issue}' no longer reported and never marked resolved"))
        .collect()
}
