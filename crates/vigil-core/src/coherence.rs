//! Coherence scoring over score sequences
//!
//! Coherence estimates how logically consistent a sequence of observation
//! scores is: a stable or steadily-trending sequence scores near 1.0, an
//! erratic one near 0.0. It is a fixed-weight blend of four components:
//! direction consistency, delta stability, variance coherence (with a
//! direction-change penalty), and keyword overlap across observation texts.

const W_DIRECTION: f64 = 0.35;
const W_STABILITY: f64 = 0.25;
const W_VARIANCE: f64 = 0.25;
const W_OBSERVATION: f64 = 0.15;

const DELTA_EPS: f64 = 1e-9;

fn delta_sign(d: f64) -> i8 {
    if d > DELTA_EPS {
        1
    } else if d < -DELTA_EPS {
        -1
    } else {
        0
    }
}

/// Score-component blend shared by both entry points.
struct ScoreComponents {
    direction: f64,
    stability: f64,
    adjusted_variance: f64,
}

fn score_components(scores: &[f64]) -> ScoreComponents {
    let deltas: Vec<f64> = scores.windows(2).map(|w| w[1] - w[0]).collect();
    let transitions = deltas.len();

    // Fraction of deltas agreeing with the overall first->last direction.
    // Zero deltas always count as consistent.
    let overall = delta_sign(scores[scores.len() - 1] - scores[0]);
    let consistent = deltas
        .iter()
        .filter(|&&d| {
            let s = delta_sign(d);
            s == 0 || s == overall
        })
        .count();
    let direction = consistent as f64 / transitions.max(1) as f64;

    // Sign flips between consecutive deltas.
    let sign_changes = deltas
        .windows(2)
        .filter(|pair| {
            let a = delta_sign(pair[0]);
            let b = delta_sign(pair[1]);
            a != 0 && b != 0 && a != b
        })
        .count();
    let stability = 1.0 - sign_changes as f64 / (transitions.saturating_sub(1)).max(1) as f64;

    // Population variance (divide by N: N-1 understates variance for the
    // short sequences seen here and breaks the downstream thresholds).
    let n = scores.len() as f64;
    let mean = scores.iter().sum::<f64>() / n;
    let variance = scores.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / n;

    let min = scores.iter().cloned().fold(f64::INFINITY, f64::min);
    let max = scores.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let range = max - min;
    let max_variance = (range / 2.0).powi(2).max((mean * 0.5).powi(2)).max(10.0);
    let variance_coherence = 1.0 - variance / max_variance;

    let direction_change_penalty = sign_changes as f64 / transitions.max(1) as f64;
    let adjusted_variance =
        (variance_coherence * (1.0 - direction_change_penalty * 0.7)).clamp(0.0, 1.0);

    ScoreComponents {
        direction,
        stability,
        adjusted_variance,
    }
}

/// Coherence of a score sequence alone, in [0, 1].
///
/// With no observation texts available the text term is dropped and the
/// remaining weights renormalized. Total over all inputs: one score (or
/// none) is vacuously coherent and yields 1.0.
pub fn score_coherence(scores: &[f64]) -> f64 {
    if scores.len() <= 1 {
        return 1.0;
    }
    let c = score_components(scores);
    let base = W_DIRECTION * c.direction + W_STABILITY * c.stability + W_VARIANCE * c.adjusted_variance;
    (base / (W_DIRECTION + W_STABILITY + W_VARIANCE)).clamp(0.0, 1.0)
}

/// Coherence of a score sequence plus its observation texts, in [0, 1].
pub fn sequence_coherence(scores: &[f64], observations: &[&str]) -> f64 {
    if scores.len() <= 1 {
        return 1.0;
    }
    if observations.len() < 2 {
        return score_coherence(scores);
    }
    let c = score_components(scores);
    let coherence = W_DIRECTION * c.direction
        + W_STABILITY * c.stability
        + W_VARIANCE * c.adjusted_variance
        + W_OBSERVATION * observation_consistency(observations);
    (coherence / (W_DIRECTION + W_STABILITY + W_VARIANCE + W_OBSERVATION)).clamp(0.0, 1.0)
}

/// Keyword-overlap consistency across consecutive observation texts, in [0, 1].
///
/// Heuristic: lowercase words of four or more characters, Jaccard overlap per
/// consecutive pair, averaged. Two texts with no keywords at all have nothing
/// to disagree about and count as fully consistent. Fewer than two texts
/// yield 0.0 (no cross-note consistency to measure).
pub fn observation_consistency(observations: &[&str]) -> f64 {
    if observations.len() < 2 {
        return 0.0;
    }

    let keyword_sets: Vec<std::collections::BTreeSet<String>> = observations
        .iter()
        .map(|text| {
            text.to_lowercase()
                .split(|c: char| !c.is_alphanumeric())
                .filter(|w| w.len() >= 4)
                .map(str::to_string)
                .collect()
        })
        .collect();

    let mut total = 0.0;
    let mut pairs = 0usize;
    for pair in keyword_sets.windows(2) {
        let (a, b) = (&pair[0], &pair[1]);
        total += if a.is_empty() && b.is_empty() {
            1.0
        } else {
            let intersection = a.intersection(b).count() as f64;
            let union = a.union(b).count() as f64;
            intersection / union
        };
        pairs += 1;
    }
    total / pairs as f64
}
