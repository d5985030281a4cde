//! Note arrival-rate classification

use serde::{Deserialize, Serialize};

use vigil_core::Note;

/// Coarse classification of note arrival rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActivityLevel {
    /// More than `high_rate` notes per second
    High,
    /// Between the two thresholds, boundaries included
    Medium,
    /// Fewer than `low_rate` notes per second
    Low,
}

/// Configuration for activity detection.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ActivityConfig {
    /// Trailing window over which the rate is measured
    pub trailing_window_ms: i64,
    /// Rates strictly above this are High
    pub high_rate: f64,
    /// Rates strictly below this are Low
    pub low_rate: f64,
}

impl Default for ActivityConfig {
    fn default() -> Self {
        Self {
            trailing_window_ms: 1_000,
            high_rate: 10.0,
            low_rate: 1.0,
        }
    }
}

/// Classifies the current arrival rate of a note stream.
#[derive(Debug, Clone, Copy, Default)]
pub struct ActivityDetector {
    config: ActivityConfig,
}

impl ActivityDetector {
    pub fn new(config: ActivityConfig) -> Self {
        Self { config }
    }

    /// Arrival rate in notes per second at `now_ms`.
    ///
    /// Counts notes in the trailing window. When sampling is too sparse for
    /// the window to say anything (fewer than two notes in it), the rate is
    /// derived from the mean inter-arrival time of the most recent notes
    /// instead.
    pub fn rate(&self, notes: &[Note], now_ms: i64) -> f64 {
        let window_start = now_ms - self.config.trailing_window_ms;
        let in_window = notes
            .iter()
            .filter(|n| n.timestamp_ms > window_start && n.timestamp_ms <= now_ms)
            .count();

        if in_window < 2 && notes.len() >= 2 {
            return self.sparse_rate(notes, now_ms);
        }
        in_window as f64 / (self.config.trailing_window_ms as f64 / 1_000.0)
    }

    /// Rate from mean inter-arrival time of the last few notes.
    fn sparse_rate(&self, notes: &[Note], now_ms: i64) -> f64 {
        let mut timestamps: Vec<i64> = notes.iter().map(|n| n.timestamp_ms).collect();
        timestamps.sort_unstable();
        let recent = &timestamps[timestamps.len().saturating_sub(6)..];

        let mut intervals: Vec<i64> = recent.windows(2).map(|w| w[1] - w[0]).collect();
        // The silence since the newest note is an interval too. Without it a
        // stream that burst and then died would look fast forever.
        let gap = now_ms - recent[recent.len() - 1];
        if gap > 0 {
            intervals.push(gap);
        }
        let mean_interval =
            intervals.iter().sum::<i64>() as f64 / intervals.len().max(1) as f64;
        if mean_interval <= 0.0 {
            return self.config.high_rate + 1.0; // simultaneous arrivals
        }
        1_000.0 / mean_interval
    }

    /// Classify the current activity level.
    ///
    /// Boundary rates (exactly `high_rate` or `low_rate`) classify as
    /// `Medium` — inclusive boundaries belong to the stricter class. This is
    /// a documented convention, not a discovered correct answer.
    pub fn classify(&self, notes: &[Note], now_ms: i64) -> ActivityLevel {
        let rate = self.rate(notes, now_ms);
        if rate > self.config.high_rate {
            ActivityLevel::High
        } else if rate < self.config.low_rate {
            ActivityLevel::Low
        } else {
            ActivityLevel::Medium
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn burst(count: usize, interval_ms: i64, end_ms: i64) -> Vec<Note> {
        (0..count)
            .map(|i| Note::new(end_ms - (count - 1 - i) as i64 * interval_ms, 5.0, "tick"))
            .collect()
    }

    #[test]
    fn test_fifteen_per_second_is_high() {
        let detector = ActivityDetector::default();
        let notes = burst(15, 66, 10_000);
        assert_eq!(detector.classify(&notes, 10_000), ActivityLevel::High);
    }

    #[test]
    fn test_five_per_second_is_medium() {
        let detector = ActivityDetector::default();
        let notes = burst(5, 200, 10_000);
        assert_eq!(detector.classify(&notes, 10_000), ActivityLevel::Medium);
    }

    #[test]
    fn test_half_note_per_second_is_low() {
        let detector = ActivityDetector::default();
        // One note every two seconds: the trailing window sees at most one,
        // so the sparse fallback kicks in.
        let notes = burst(5, 2_000, 20_000);
        assert_eq!(detector.classify(&notes, 20_000), ActivityLevel::Low);
    }

    #[test]
    fn test_boundary_rates_are_medium() {
        let detector = ActivityDetector::default();
        // Exactly 10 notes in the trailing second.
        let notes = burst(10, 100, 10_000);
        assert_eq!(detector.classify(&notes, 10_000), ActivityLevel::Medium);
        // Sparse stream at exactly one note per second.
        let notes = burst(4, 1_000, 10_000);
        assert_eq!(detector.classify(&notes, 10_000), ActivityLevel::Medium);
    }

    #[test]
    fn test_silence_after_burst_decays_to_low() {
        let detector = ActivityDetector::default();
        // Ten rapid notes, then ~99.5 s of nothing: a dead stream, not a
        // fast one.
        let notes = burst(10, 50, 500);
        assert_eq!(detector.classify(&notes, 100_000), ActivityLevel::Low);
    }

    #[test]
    fn test_empty_stream_is_low() {
        let detector = ActivityDetector::default();
        assert_eq!(detector.classify(&[], 10_000), ActivityLevel::Low);
    }
}
