//! Evaluation gating
//!
//! Every external semantic judgment is slow and costly, so the manager's one
//! job is to say "not yet" almost all of the time. It emits only on coherence
//! drops, action events, issue-signature changes, or a periodic backstop,
//! and never twice in a row for an unchanged stream.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;
use tracing::info;
use uuid::Uuid;

use vigil_core::{GoalSpec, Note};

use crate::processor::StreamSummary;

/// Qualitative severity attached to an evaluation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Urgency {
    Low,
    Medium,
    High,
}

/// Why an evaluation was (or was not) requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DecisionReason {
    CoherenceDrop,
    ActionEvent,
    StateChange,
    Periodic,
    None,
}

/// The manager's verdict for one summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
    pub should_evaluate: bool,
    pub urgency: Urgency,
    pub reason: DecisionReason,
}

impl Decision {
    /// The non-decision: keep observing.
    pub fn skip() -> Self {
        Self {
            should_evaluate: false,
            urgency: Urgency::Low,
            reason: DecisionReason::None,
        }
    }
}

/// Lifecycle state, cycling `Idle → Observing → Deciding → Emitted → Observing`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ManagerState {
    Idle,
    Observing,
    Deciding,
    Emitted,
}

/// Gating thresholds.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DecisionConfig {
    /// Coherence drop (vs. the last emission) that triggers an evaluation
    pub coherence_drop: f64,
    /// Drop beyond which the evaluation is urgent
    pub severe_drop: f64,
    /// Periodic backstop: evaluate at least this often...
    pub max_interval_ms: i64,
    /// ...but only once this many notes have accumulated since last time
    pub min_notes: usize,
}

impl Default for DecisionConfig {
    fn default() -> Self {
        Self {
            coherence_drop: 0.3,
            severe_drop: 0.5,
            max_interval_ms: 30_000,
            min_notes: 3,
        }
    }
}

/// Decides whether the current summary is worth an external evaluation.
#[derive(Debug, Clone)]
pub struct DecisionManager {
    config: DecisionConfig,
    goal: GoalSpec,
    state: ManagerState,
    started_ms: Option<i64>,
    last_emit_ms: Option<i64>,
    coherence_at_emit: Option<f64>,
    signature_at_emit: Option<String>,
    /// Newest note the last emission already accounted for; an action event
    /// only triggers once per note.
    newest_at_emit: Option<Uuid>,
    note_count_at_emit: usize,
}

impl DecisionManager {
    pub fn new(goal: GoalSpec, config: DecisionConfig) -> Self {
        Self {
            config,
            goal,
            state: ManagerState::Idle,
            started_ms: None,
            last_emit_ms: None,
            coherence_at_emit: None,
            signature_at_emit: None,
            newest_at_emit: None,
            note_count_at_emit: 0,
        }
    }

    pub fn state(&self) -> ManagerState {
        self.state
    }

    /// Judge one aggregated summary.
    ///
    /// `newest` is the most recent note of the stream, used for the
    /// action-event trigger. Emitting updates the baselines, so an unchanged
    /// stream can never trigger twice in a row.
    pub fn decide(&mut self, summary: &StreamSummary, newest: Option<&Note>, now_ms: i64) -> Decision {
        // A fresh summary counts as observation, whether the manager was
        // idle or had just emitted.
        self.state = ManagerState::Observing;
        self.started_ms.get_or_insert(now_ms);
        self.state = ManagerState::Deciding;

        let coherence = summary.aggregated.coherence;
        let issues = summary.aggregated.all_issues();
        let signature = issue_signature(&issues);

        let drop = self
            .coherence_at_emit
            .map(|baseline| baseline - coherence)
            .unwrap_or(0.0);

        let reason = if drop > self.config.coherence_drop {
            DecisionReason::CoherenceDrop
        } else if newest.is_some_and(|n| n.is_action_event && Some(n.id) != self.newest_at_emit) {
            DecisionReason::ActionEvent
        } else if self
            .signature_at_emit
            .as_ref()
            .is_some_and(|prior| prior != &signature)
        {
            DecisionReason::StateChange
        } else if self.periodic_due(summary, now_ms) {
            DecisionReason::Periodic
        } else {
            self.state = ManagerState::Observing;
            return Decision::skip();
        };

        let urgency = if drop > self.config.severe_drop || self.goal.any_critical(&issues) {
            Urgency::High
        } else if matches!(reason, DecisionReason::CoherenceDrop | DecisionReason::ActionEvent) {
            Urgency::Medium
        } else {
            Urgency::Low
        };

        self.state = ManagerState::Emitted;
        self.last_emit_ms = Some(now_ms);
        self.coherence_at_emit = Some(coherence);
        self.signature_at_emit = Some(signature);
        self.newest_at_emit = newest.map(|n| n.id);
        self.note_count_at_emit = summary.aggregated.note_count;

        info!(?reason, ?urgency, coherence, "Requesting external evaluation");
        Decision {
            should_evaluate: true,
            urgency,
            reason,
        }
    }

    fn periodic_due(&self, summary: &StreamSummary, now_ms: i64) -> bool {
        let since = self.last_emit_ms.or(self.started_ms).unwrap_or(now_ms);
        let accumulated = summary
            .aggregated
            .note_count
            .saturating_sub(self.note_count_at_emit);
        now_ms - since > self.config.max_interval_ms && accumulated >= self.config.min_notes
    }
}

/// Stable signature of an issue set, for change detection.
fn issue_signature(issues: &BTreeSet<String>) -> String {
    let mut hasher = Sha256::new();
    for issue in issues {
        hasher.update(issue.as_bytes());
        hasher.update(b"\n");
    }
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processor::{Source, StreamSummary};
    use vigil_core::{Window, WindowSummary};
    use vigil_temporal::ActivityLevel;

    fn summary_with(coherence: f64, issues: &[&str], note_count: usize) -> StreamSummary {
        let window = Window {
            start_ms: 1,
            end_ms: 10_001,
            weighted_score: 5.0,
            note_count,
            issues: issues.iter().map(|s| s.to_string()).collect(),
            coherence,
            conflicts: Vec::new(),
        };
        StreamSummary {
            aggregated: WindowSummary {
                windows: vec![window],
                coherence,
                note_count,
            },
            multi_scale: None,
            activity: ActivityLevel::Medium,
            source: Source::Computed,
        }
    }

    fn manager() -> DecisionManager {
        DecisionManager::new(GoalSpec::from("finish the level"), DecisionConfig::default())
    }

    #[test]
    fn test_first_summary_does_not_emit() {
        let mut manager = manager();
        let decision = manager.decide(&summary_with(0.9, &[], 2), None, 1_000);
        assert!(!decision.should_evaluate);
        assert_eq!(manager.state(), ManagerState::Observing);
    }

    #[test]
    fn test_action_event_triggers_medium() {
        let mut manager = manager();
        let newest = Note::new(1_000, 5.0, "pressed attack").action();
        let decision = manager.decide(&summary_with(0.9, &[], 2), Some(&newest), 1_000);
        assert!(decision.should_evaluate);
        assert_eq!(decision.reason, DecisionReason::ActionEvent);
        assert_eq!(decision.urgency, Urgency::Medium);
        assert_eq!(manager.state(), ManagerState::Emitted);
    }

    #[test]
    fn test_coherence_drop_triggers() {
        let mut manager = manager();
        let newest = Note::new(1_000, 5.0, "go").action();
        // Establish a baseline via an action emission.
        manager.decide(&summary_with(0.9, &[], 2), Some(&newest), 1_000);

        let decision = manager.decide(&summary_with(0.5, &[], 3), None, 2_000);
        assert!(decision.should_evaluate);
        assert_eq!(decision.reason, DecisionReason::CoherenceDrop);
        assert_eq!(decision.urgency, Urgency::Medium);
    }

    #[test]
    fn test_severe_drop_is_high_urgency() {
        let mut manager = manager();
        let newest = Note::new(1_000, 5.0, "go").action();
        manager.decide(&summary_with(0.95, &[], 2), Some(&newest), 1_000);

        let decision = manager.decide(&summary_with(0.2, &[], 3), None, 2_000);
        assert_eq!(decision.urgency, Urgency::High);
    }

    #[test]
    fn test_issue_signature_change_triggers() {
        let mut manager = manager();
        let newest = Note::new(1_000, 5.0, "go").action();
        manager.decide(&summary_with(0.9, &["lag"], 2), Some(&newest), 1_000);

        let decision = manager.decide(&summary_with(0.9, &["lag", "crash dialog"], 3), None, 2_000);
        assert!(decision.should_evaluate);
        assert_eq!(decision.reason, DecisionReason::StateChange);
    }

    #[test]
    fn test_unchanged_stream_never_emits_twice() {
        let mut manager = manager();
        let newest = Note::new(1_000, 5.0, "go").action();
        let first = manager.decide(&summary_with(0.9, &["lag"], 2), Some(&newest), 1_000);
        assert!(first.should_evaluate);

        // Nothing new arrived: the same action note stays newest, coherence
        // and issue signature are unchanged. No re-emission, ever.
        let same = summary_with(0.9, &["lag"], 2);
        let second = manager.decide(&same, Some(&newest), 2_000);
        let third = manager.decide(&same, Some(&newest), 3_000);
        assert!(!second.should_evaluate);
        assert!(!third.should_evaluate);
    }

    #[test]
    fn test_fresh_action_note_triggers_again() {
        let mut manager = manager();
        let first_action = Note::new(1_000, 5.0, "opened door").action();
        manager.decide(&summary_with(0.9, &[], 2), Some(&first_action), 1_000);

        // Consumed note: no trigger. A genuinely new action note: trigger.
        let skip = manager.decide(&summary_with(0.9, &[], 2), Some(&first_action), 1_500);
        assert!(!skip.should_evaluate);

        let second_action = Note::new(2_000, 5.0, "pressed attack").action();
        let decision = manager.decide(&summary_with(0.9, &[], 3), Some(&second_action), 2_000);
        assert!(decision.should_evaluate);
        assert_eq!(decision.reason, DecisionReason::ActionEvent);
    }

    #[test]
    fn test_lifecycle_cycles_through_observing() {
        let mut manager = manager();
        assert_eq!(manager.state(), ManagerState::Idle);

        // A quiet summary leaves the manager observing.
        manager.decide(&summary_with(0.9, &[], 2), None, 1_000);
        assert_eq!(manager.state(), ManagerState::Observing);

        // An action event parks it at Emitted...
        let newest = Note::new(1_500, 5.0, "go").action();
        manager.decide(&summary_with(0.9, &[], 3), Some(&newest), 1_500);
        assert_eq!(manager.state(), ManagerState::Emitted);

        // ...and the next quiet decide returns it to Observing.
        manager.decide(&summary_with(0.9, &[], 3), Some(&newest), 2_000);
        assert_eq!(manager.state(), ManagerState::Observing);
    }

    #[test]
    fn test_periodic_backstop_needs_notes() {
        let mut manager = manager();
        // Quiet stream with too few notes: no periodic emission.
        manager.decide(&summary_with(0.9, &[], 1), None, 1_000);
        let decision = manager.decide(&summary_with(0.9, &[], 2), None, 40_000);
        assert!(!decision.should_evaluate);

        // Enough notes accumulated: the backstop fires at low urgency.
        let decision = manager.decide(&summary_with(0.9, &[], 5), None, 45_000);
        assert!(decision.should_evaluate);
        assert_eq!(decision.reason, DecisionReason::Periodic);
        assert_eq!(decision.urgency, Urgency::Low);
    }

    #[test]
    fn test_critical_issue_is_high_urgency() {
        let goal = GoalSpec::Criteria(vigil_core::GoalCriteria {
            description: "stay alive".into(),
            success_conditions: vec![],
            critical_issues: vec!["save corrupted".into()],
        });
        let mut manager = DecisionManager::new(goal, DecisionConfig::default());
        let newest = Note::new(1_000, 5.0, "saving").action();

        let decision =
            manager.decide(&summary_with(0.9, &["save corrupted"], 2), Some(&newest), 1_000);
        assert_eq!(decision.urgency, Urgency::High);
    }
}
