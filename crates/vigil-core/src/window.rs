//! Aggregation output types

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// One time-bounded group of notes reduced to a weighted summary.
///
/// A `Window` is only ever constructed fully populated: a bucket in which no
/// note carried a score is excluded from the result entirely, never emitted
/// with a placeholder score. Downstream code may therefore read any field
/// without checking.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Window {
    /// Inclusive start of the window (epoch ms)
    pub start_ms: i64,
    /// Exclusive end of the window (epoch ms)
    pub end_ms: i64,
    /// Decay/attention-weighted average of the scored notes in the window
    pub weighted_score: f64,
    /// Number of notes that fell in the window (scored or not)
    pub note_count: usize,
    /// Union of all issues observed in the window
    pub issues: BTreeSet<String>,
    /// Coherence of the window's score sequence, in [0, 1]
    pub coherence: f64,
    /// Detected contradictions against earlier windows
    pub conflicts: Vec<String>,
}

/// Result of one full windowed-aggregation pass over a note stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WindowSummary {
    /// Windows in ascending time order; empty for an empty stream
    pub windows: Vec<Window>,
    /// Coherence of the whole stream's score sequence
    pub coherence: f64,
    /// Notes considered in this pass
    pub note_count: usize,
}

impl WindowSummary {
    /// Neutral summary for an empty stream: no windows, vacuously coherent.
    pub fn empty() -> Self {
        Self {
            windows: Vec::new(),
            coherence: 1.0,
            note_count: 0,
        }
    }

    /// Most recent window, if any note carried a score.
    pub fn latest(&self) -> Option<&Window> {
        self.windows.last()
    }

    /// Union of issues across all windows.
    pub fn all_issues(&self) -> BTreeSet<String> {
        self.windows
            .iter()
            .flat_map(|w| w.issues.iter().cloned())
            .collect()
    }
}

/// Per-scale aggregation result.
///
/// Scale names map to their window lists; a scale whose every bucket was
/// empty maps to an empty list, and empty buckets within a scale are absent,
/// not present-with-null.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MultiScaleResult {
    /// Scale name → windows at that scale, ascending time order
    pub scales: BTreeMap<String, Vec<Window>>,
    /// Scale name → coherence of that scale's scored notes
    pub coherence_by_scale: BTreeMap<String, f64>,
}

impl MultiScaleResult {
    /// Empty result covering the given scale names.
    pub fn empty<'a>(scale_names: impl IntoIterator<Item = &'a str>) -> Self {
        let mut scales = BTreeMap::new();
        let mut coherence_by_scale = BTreeMap::new();
        for name in scale_names {
            scales.insert(name.to_string(), Vec::new());
            coherence_by_scale.insert(name.to_string(), 1.0);
        }
        Self {
            scales,
            coherence_by_scale,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_summary_is_neutral() {
        let summary = WindowSummary::empty();
        assert!(summary.windows.is_empty());
        assert_eq!(summary.coherence, 1.0);
        assert!(summary.latest().is_none());
    }

    #[test]
    fn test_all_issues_unions_windows() {
        let mut a = BTreeSet::new();
        a.insert("flicker".to_string());
        let mut b = BTreeSet::new();
        b.insert("flicker".to_string());
        b.insert("lag".to_string());

        let summary = WindowSummary {
            windows: vec![
                Window {
                    start_ms: 0,
                    end_ms: 10_000,
                    weighted_score: 5.0,
                    note_count: 2,
                    issues: a,
                    coherence: 1.0,
                    conflicts: Vec::new(),
                },
                Window {
                    start_ms: 10_000,
                    end_ms: 20_000,
                    weighted_score: 4.0,
                    note_count: 1,
                    issues: b,
                    coherence: 1.0,
                    conflicts: Vec::new(),
                },
            ],
            coherence: 0.9,
            note_count: 3,
        };

        let issues = summary.all_issues();
        assert_eq!(issues.len(), 2);
        assert!(issues.contains("lag"));
    }
}
