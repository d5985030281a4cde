//! Adaptive window sizing from the recent stream pattern

use serde::{Deserialize, Serialize};

use vigil_core::Note;

/// Shape of the recent note stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StreamPattern {
    /// Scores moving quickly at a steady cadence
    FastChange,
    /// Slow drift over widely spaced notes
    SlowChange,
    /// Stable scores, regular cadence
    Consistent,
    /// High variance in both cadence and scores
    Erratic,
}

impl StreamPattern {
    /// Recommended aggregation window for this pattern.
    pub fn window_size_ms(&self) -> i64 {
        match self {
            Self::FastChange => 5_000,
            Self::SlowChange => 20_000,
            Self::Consistent | Self::Erratic => 10_000,
        }
    }
}

/// Thresholds for pattern classification.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SizerConfig {
    /// Score-delta variance above which the stream counts as fast-moving
    pub fast_delta_variance: f64,
    /// Squared coefficient of variation of intervals above which cadence
    /// counts as irregular
    pub erratic_interval_cv2: f64,
    /// Mean inter-note interval above which a calm stream counts as slow
    pub slow_interval_ms: f64,
}

impl Default for SizerConfig {
    fn default() -> Self {
        Self {
            fast_delta_variance: 4.0,
            erratic_interval_cv2: 1.0,
            slow_interval_ms: 5_000.0,
        }
    }
}

/// Picks a window size from the variance of inter-note intervals and of
/// score deltas.
#[derive(Debug, Clone, Copy, Default)]
pub struct AdaptiveWindowSizer {
    config: SizerConfig,
}

impl AdaptiveWindowSizer {
    pub fn new(config: SizerConfig) -> Self {
        Self { config }
    }

    /// Classify the recent stream shape. Streams too short to judge
    /// (fewer than three notes) default to `Consistent`.
    pub fn classify(&self, notes: &[Note]) -> StreamPattern {
        if notes.len() < 3 {
            return StreamPattern::Consistent;
        }

        let mut timestamps: Vec<i64> = notes.iter().map(|n| n.timestamp_ms).collect();
        timestamps.sort_unstable();
        let intervals: Vec<f64> = timestamps.windows(2).map(|w| (w[1] - w[0]) as f64).collect();
        let (interval_mean, interval_var) = mean_variance(&intervals);
        let interval_cv2 = if interval_mean > 0.0 {
            interval_var / (interval_mean * interval_mean)
        } else {
            0.0
        };

        let scores: Vec<f64> = notes.iter().filter_map(|n| n.score).collect();
        let deltas: Vec<f64> = scores.windows(2).map(|w| w[1] - w[0]).collect();
        let (_, delta_var) = mean_variance(&deltas);

        let fast = delta_var > self.config.fast_delta_variance;
        let irregular = interval_cv2 > self.config.erratic_interval_cv2;
        match (fast, irregular) {
            (true, true) => StreamPattern::Erratic,
            (true, false) => StreamPattern::FastChange,
            (false, _) => {
                if interval_mean > self.config.slow_interval_ms {
                    StreamPattern::SlowChange
                } else {
                    StreamPattern::Consistent
                }
            }
        }
    }

    /// Window size for the current stream, feeding the windowed aggregator.
    pub fn window_size_ms(&self, notes: &[Note]) -> i64 {
        self.classify(notes).window_size_ms()
    }
}

fn mean_variance(values: &[f64]) -> (f64, f64) {
    if values.is_empty() {
        return (0.0, 0.0);
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    (mean, variance)
}
