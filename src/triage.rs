//! Triage engine — maps a risk verdict to a delivery decision.
//!
//! Pure decision logic: no side effects, no I/O. The caller supplies the
//! current time so deadlines are reproducible under a fake clock.

use chrono::{DateTime, Utc};

use crate::config::TriageConfig;
use crate::review::model::{Priority, RiskVerdict};

/// What to do with a generated reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TriageDecision {
    /// Safe to deliver without human review.
    AutoDeliver,
    /// Hold for counselor review with the given priority and deadline.
    HoldForReview {
        priority: Priority,
        deadline: DateTime<Utc>,
    },
}

/// Maps risk verdicts to triage decisions using the configured SLA table
/// and level-to-priority mapping.
#[derive(Debug, Clone)]
pub struct TriageEngine {
    config: TriageConfig,
}

impl TriageEngine {
    pub fn new(config: TriageConfig) -> Self {
        Self { config }
    }

    /// Decide whether a reply may be auto-delivered or must be held.
    ///
    /// A verdict that blocks auto-response is held even when the
    /// classifier did not flag it for review — fail safe, never fail open.
    pub fn decide(&self, verdict: &RiskVerdict, now: DateTime<Utc>) -> TriageDecision {
        if !verdict.requires_review && !verdict.blocks_auto_response {
            return TriageDecision::AutoDeliver;
        }

        let priority = self.config.priority_for(verdict.level);
        let deadline = now
            + chrono::Duration::from_std(self.config.sla(priority))
                .unwrap_or_else(|_| chrono::Duration::hours(4));

        TriageDecision::HoldForReview { priority, deadline }
    }

    /// The decision for a message whose verdict could not be obtained
    /// (classifier timeout, unparseable level). Held at high priority.
    pub fn fail_safe_decision(&self, now: DateTime<Utc>) -> TriageDecision {
        self.decide(&RiskVerdict::fail_safe(), now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::review::model::RiskLevel;

    fn engine() -> TriageEngine {
        TriageEngine::new(TriageConfig::default())
    }

    #[test]
    fn no_review_needed_auto_delivers() {
        for level in [
            RiskLevel::Low,
            RiskLevel::Medium,
            RiskLevel::High,
            RiskLevel::Critical,
        ] {
            let verdict = RiskVerdict::new(level, 0.9, false);
            assert_eq!(
                engine().decide(&verdict, Utc::now()),
                TriageDecision::AutoDeliver
            );
        }
    }

    #[test]
    fn critical_holds_at_urgent_with_15min_deadline() {
        let now = Utc::now();
        let verdict = RiskVerdict::new(RiskLevel::Critical, 0.95, true);
        match engine().decide(&verdict, now) {
            TriageDecision::HoldForReview { priority, deadline } => {
                assert_eq!(priority, Priority::Urgent);
                assert_eq!(deadline - now, chrono::Duration::minutes(15));
            }
            TriageDecision::AutoDeliver => panic!("critical verdict must be held"),
        }
    }

    #[test]
    fn high_holds_at_high_with_1h_deadline() {
        let now = Utc::now();
        let verdict = RiskVerdict::new(RiskLevel::High, 0.8, true);
        match engine().decide(&verdict, now) {
            TriageDecision::HoldForReview { priority, deadline } => {
                assert_eq!(priority, Priority::High);
                assert_eq!(deadline - now, chrono::Duration::hours(1));
            }
            TriageDecision::AutoDeliver => panic!("expected hold"),
        }
    }

    #[test]
    fn low_and_medium_hold_at_normal() {
        let now = Utc::now();
        for level in [RiskLevel::Low, RiskLevel::Medium] {
            let verdict = RiskVerdict::new(level, 0.5, true);
            match engine().decide(&verdict, now) {
                TriageDecision::HoldForReview { priority, deadline } => {
                    assert_eq!(priority, Priority::Normal);
                    assert_eq!(deadline - now, chrono::Duration::hours(4));
                }
                TriageDecision::AutoDeliver => panic!("expected hold"),
            }
        }
    }

    #[test]
    fn blocking_verdict_is_held_even_without_review_flag() {
        let verdict = RiskVerdict::new(RiskLevel::Medium, 0.6, false).blocking();
        assert!(matches!(
            engine().decide(&verdict, Utc::now()),
            TriageDecision::HoldForReview { .. }
        ));
    }

    #[test]
    fn fail_safe_decision_holds_at_high() {
        match engine().fail_safe_decision(Utc::now()) {
            TriageDecision::HoldForReview { priority, .. } => {
                assert_eq!(priority, Priority::High);
            }
            TriageDecision::AutoDeliver => panic!("fail-safe must never auto-deliver"),
        }
    }

    #[test]
    fn custom_sla_overrides_deadline() {
        let config = TriageConfig {
            sla_urgent: std::time::Duration::from_secs(5 * 60),
            ..TriageConfig::default()
        };
        let now = Utc::now();
        let verdict = RiskVerdict::new(RiskLevel::Critical, 1.0, true);
        match TriageEngine::new(config).decide(&verdict, now) {
            TriageDecision::HoldForReview { deadline, .. } => {
                assert_eq!(deadline - now, chrono::Duration::minutes(5));
            }
            TriageDecision::AutoDeliver => panic!("expected hold"),
        }
    }
}
