//! Multi-scale aggregation with attention weighting
//!
//! Runs the windowed reduction at several scales at once, from sub-second
//! "immediate" context out to minute-scale trends. Within each bucket notes
//! are weighted by attention: recency decay combined with salience (extreme
//! scores, many issues), an action-event boost, and a novelty boost.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::warn;

use vigil_core::coherence::score_coherence;
use vigil_core::{MultiScaleResult, Note, Window};

/// Named window sizes, coarsest last.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScaleSet {
    scales: Vec<(String, i64)>,
}

impl Default for ScaleSet {
    fn default() -> Self {
        Self {
            scales: vec![
                ("immediate".to_string(), 100),
                ("short".to_string(), 1_000),
                ("medium".to_string(), 10_000),
                ("long".to_string(), 60_000),
            ],
        }
    }
}

impl ScaleSet {
    /// Custom scale set. Non-positive window sizes are dropped with a warning.
    pub fn new(scales: Vec<(String, i64)>) -> Self {
        let scales = scales
            .into_iter()
            .filter(|(name, size)| {
                if *size <= 0 {
                    warn!(scale = %name, size_ms = size, "Dropping non-positive scale");
                    false
                } else {
                    true
                }
            })
            .collect();
        Self { scales }
    }

    /// Scale names in declaration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.scales.iter().map(|(name, _)| name.as_str())
    }

    /// (name, window size) pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, i64)> {
        self.scales.iter().map(|(name, size)| (name.as_str(), *size))
    }
}

/// Configuration for multi-scale aggregation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MultiScaleConfig {
    pub scales: ScaleSet,
    /// Recency decay factor, shared across scales
    pub decay_factor: f64,
}

impl Default for MultiScaleConfig {
    fn default() -> Self {
        Self {
            scales: ScaleSet::default(),
            decay_factor: 0.9,
        }
    }
}

/// Attention weight of a note relative to the newest note in its bucket.
///
/// Recency decays exponentially with age per window size; salience rises for
/// scores far from the neutral midpoint and for issue-heavy notes; action
/// events and novel observations get multiplicative boosts.
pub fn attention_weight(note: &Note, newest_ms: i64, window_size_ms: i64, decay_factor: f64) -> f64 {
    let recency =
        decay_factor.powf(note.age_ms(newest_ms) as f64 / window_size_ms.max(1) as f64);

    let score_salience = note
        .score
        .map(|s| (s - 5.0).abs() / 5.0 * 0.5)
        .unwrap_or(0.0);
    let issue_salience = 0.15 * note.issues.len().min(4) as f64;
    let salience = 1.0 + score_salience + issue_salience;

    let action = if note.is_action_event { 1.5 } else { 1.0 };
    let novelty = if note.is_novel { 1.3 } else { 1.0 };

    recency * salience * action * novelty
}

/// Prune a note buffer to the `cap` highest-attention notes.
///
/// Bounds memory on long-running sessions. Attention is measured against the
/// newest note at the given window size; survivors are re-sorted by
/// timestamp so windowing order is preserved.
pub fn prune_by_attention(notes: &mut Vec<Note>, cap: usize, window_size_ms: i64, decay_factor: f64) {
    if notes.len() <= cap {
        return;
    }
    let newest_ms = notes.iter().map(|n| n.timestamp_ms).max().unwrap_or(0);
    notes.sort_by(|a, b| {
        let wa = attention_weight(a, newest_ms, window_size_ms, decay_factor);
        let wb = attention_weight(b, newest_ms, window_size_ms, decay_factor);
        wb.partial_cmp(&wa).unwrap_or(std::cmp::Ordering::Equal)
    });
    notes.truncate(cap);
    notes.sort_by_key(|n| n.timestamp_ms);
}

/// Aggregates one note stream at several time scales simultaneously.
#[derive(Debug, Clone, Default)]
pub struct MultiScaleAggregator {
    config: MultiScaleConfig,
}

impl MultiScaleAggregator {
    pub fn new(config: MultiScaleConfig) -> Self {
        Self { config }
    }

    /// Aggregate the stream at every configured scale.
    ///
    /// A bucket with no scored note is dropped from its scale's list
    /// entirely; downstream code reads window fields unconditionally.
    pub fn aggregate(&self, notes: &[Note]) -> MultiScaleResult {
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
            return MultiScaleResult::empty(self.config.scales.names());
        }
        valid.sort_by_key(|note| note.timestamp_ms);

        let scores: Vec<f64> = valid.iter().filter_map(|n| n.score).collect();
        let mut scales = BTreeMap::new();
        let mut coherence_by_scale = BTreeMap::new();
        for (name, size) in self.config.scales.iter() {
            scales.insert(name.to_string(), self.aggregate_scale(&valid, size));
            coherence_by_scale.insert(name.to_string(), score_coherence(&scores));
        }

        MultiScaleResult {
            scales,
            coherence_by_scale,
        }
    }

    fn aggregate_scale(&self, sorted: &[&Note], size: i64) -> Vec<Window> {
        let base_ms = sorted[0].timestamp_ms;

        let mut buckets: Vec<Vec<&Note>> = Vec::new();
        for note in sorted {
            let idx = ((note.timestamp_ms - base_ms) / size) as usize;
            if buckets.len() <= idx {
                buckets.resize_with(idx + 1, Vec::new);
            }
            buckets[idx].push(note);
        }

        let mut windows = Vec::new();
        for (idx, bucket) in buckets.iter().enumerate() {
            let scored: Vec<&&Note> = bucket.iter().filter(|n| n.score.is_some()).collect();
            if scored.is_empty() {
                continue;
            }

            let newest_ms = bucket.iter().map(|n| n.timestamp_ms).max().unwrap_or(base_ms);
            let mut weighted_sum = 0.0;
            let mut weight_sum = 0.0;
            for note in &scored {
                let weight = attention_weight(note, newest_ms, size, self.config.decay_factor);
                weighted_sum += note.score.unwrap_or(0.0) * weight;
                weight_sum += weight;
            }

            let scores: Vec<f64> = scored.iter().filter_map(|n| n.score).collect();
            let start_ms = base_ms + idx as i64 * size;
            windows.push(Window {
                start_ms,
                end_ms: start_ms + size,
                weighted_score: weighted_sum / weight_sum,
                note_count: bucket.len(),
                issues: bucket.iter().flat_map(|n| n.issues.iter().cloned()).collect(),
                coherence: score_coherence(&scores),
                conflicts: Vec::new(),
            });
        }
        windows
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn note(ts: i64, score: f64) -> Note {
        Note::new(ts, score, "observing")
    }

    #[test]
    fn test_every_window_has_a_score() {
        let aggregator = MultiScaleAggregator::default();
        let notes = vec![
            note(10, 5.0),
            Note::unscored(500, "blank frame"),
            note(2_500, 7.0),
            note(61_000, 3.0),
        ];

        let result = aggregator.aggregate(&notes);
        for windows in result.scales.values() {
            for window in windows {
                assert!(window.weighted_score.is_finite());
                assert!(window.note_count > 0);
            }
        }
    }

    #[test]
    fn test_empty_buckets_absent() {
        let aggregator = MultiScaleAggregator::default();
        // Two notes 10 s apart: at the immediate (100 ms) scale the gap spans
        // ~100 empty buckets, none of which may appear.
        let notes = vec![note(10, 5.0), note(10_010, 6.0)];

        let result = aggregator.aggregate(&notes);
        assert_eq!(result.scales["immediate"].len(), 2);
        assert_eq!(result.scales["long"].len(), 1);
    }

    #[test]
    fn test_empty_stream_covers_all_scales() {
        let aggregator = MultiScaleAggregator::default();
        let result = aggregator.aggregate(&[]);
        assert_eq!(result.scales.len(), 4);
        assert!(result.scales.values().all(Vec::is_empty));
        assert!(result.coherence_by_scale.values().all(|&c| c == 1.0));
    }

    #[test]
    fn test_action_event_boosts_weight() {
        let plain = note(1_000, 5.0);
        let action = note(1_000, 5.0).action();
        let w_plain = attention_weight(&plain, 1_000, 10_000, 0.9);
        let w_action = attention_weight(&action, 1_000, 10_000, 0.9);
        assert!(w_action > w_plain);
    }

    #[test]
    fn test_extreme_scores_more_salient() {
        let neutral = note(1_000, 5.0);
        let extreme = note(1_000, 10.0);
        let w_neutral = attention_weight(&neutral, 1_000, 10_000, 0.9);
        let w_extreme = attention_weight(&extreme, 1_000, 10_000, 0.9);
        assert!(w_extreme > w_neutral);
    }

    #[test]
    fn test_novelty_and_issues_raise_attention() {
        let plain = note(1_000, 6.0);
        let loaded = note(1_000, 6.0).novel().with_issue("ui freeze");
        assert!(
            attention_weight(&loaded, 1_000, 10_000, 0.9)
                > attention_weight(&plain, 1_000, 10_000, 0.9)
        );
    }

    #[test]
    fn test_prune_keeps_high_attention_notes() {
        let mut notes = vec![
            note(1_000, 5.0),
            note(2_000, 5.1),
            note(3_000, 5.0),
            note(4_000, 9.8).action().with_issue("crash dialog"),
            note(5_000, 5.0),
        ];
        prune_by_attention(&mut notes, 2, 10_000, 0.9);

        assert_eq!(notes.len(), 2);
        assert!(notes.iter().any(|n| n.is_action_event));
        // Survivors stay in timestamp order.
        assert!(notes[0].timestamp_ms <= notes[1].timestamp_ms);
    }

    #[test]
    fn test_prune_noop_under_cap() {
        let mut notes = vec![note(1_000, 5.0)];
        prune_by_attention(&mut notes, 64, 10_000, 0.9);
        assert_eq!(notes.len(), 1);
    }
}
