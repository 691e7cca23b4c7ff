//! Review data model — risk verdicts, pending items, counselors, and the
//! append-only audit trail.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Risk level assigned by the classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Low => write!(f, "low"),
            Self::Medium => write!(f, "medium"),
            Self::High => write!(f, "high"),
            Self::Critical => write!(f, "critical"),
        }
    }
}

impl std::str::FromStr for RiskLevel {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            "critical" => Ok(Self::Critical),
            _ => Err(format!("Unknown risk level: {}", s)),
        }
    }
}

/// Risk verdict produced once per message by the classifier. Never mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskVerdict {
    /// Classified risk level.
    pub level: RiskLevel,
    /// Risk categories detected (e.g. "self_harm", "violence").
    pub categories: BTreeSet<String>,
    /// Classifier confidence (0.0–1.0).
    pub confidence: f32,
    /// Whether a human must review the reply before delivery.
    pub requires_review: bool,
    /// Whether an automatic response is blocked outright.
    pub blocks_auto_response: bool,
}

impl RiskVerdict {
    /// Create a verdict with confidence clamped to [0, 1].
    pub fn new(level: RiskLevel, confidence: f32, requires_review: bool) -> Self {
        Self {
            level,
            categories: BTreeSet::new(),
            confidence: confidence.clamp(0.0, 1.0),
            requires_review,
            blocks_auto_response: false,
        }
    }

    /// Add a risk category.
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.categories.insert(category.into());
        self
    }

    /// Mark the verdict as blocking any automatic response.
    pub fn blocking(mut self) -> Self {
        self.blocks_auto_response = true;
        self
    }

    /// The verdict used when the classifier times out or fails: treat the
    /// message as requiring review rather than letting it through unseen.
    pub fn fail_safe() -> Self {
        Self {
            level: RiskLevel::High,
            categories: BTreeSet::from(["classification_unavailable".to_string()]),
            confidence: 0.0,
            requires_review: true,
            blocks_auto_response: false,
        }
    }
}

/// Review priority of a held item. Ordering is by urgency, so
/// `Urgent > High > Normal`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Normal,
    High,
    Urgent,
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Normal => write!(f, "normal"),
            Self::High => write!(f, "high"),
            Self::Urgent => write!(f, "urgent"),
        }
    }
}

impl std::str::FromStr for Priority {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "normal" => Ok(Self::Normal),
            "high" => Ok(Self::High),
            "urgent" => Ok(Self::Urgent),
            _ => Err(format!("Unknown priority: {}", s)),
        }
    }
}

/// Status of a held item. Transitions only move forward — an item never
/// returns to `Pending` once resolved. Escalation keeps the item pending;
/// it is recorded on the audit trail, not as an item status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewStatus {
    /// Waiting for counselor action.
    Pending,
    /// Counselor approved the candidate reply as-is.
    Approved,
    /// Counselor edited the reply before sending.
    Modified,
    /// Counselor replaced the reply entirely.
    Rejected,
    /// Deadline passed without a decision; system sent the candidate.
    AutoApproved,
}

impl ReviewStatus {
    /// Whether this status is terminal (a final reply has been delivered).
    pub fn is_resolved(self) -> bool {
        !matches!(self, Self::Pending)
    }
}

impl std::fmt::Display for ReviewStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Approved => write!(f, "approved"),
            Self::Modified => write!(f, "modified"),
            Self::Rejected => write!(f, "rejected"),
            Self::AutoApproved => write!(f, "auto_approved"),
        }
    }
}

impl std::str::FromStr for ReviewStatus {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "approved" => Ok(Self::Approved),
            "modified" => Ok(Self::Modified),
            "rejected" => Ok(Self::Rejected),
            "auto_approved" => Ok(Self::AutoApproved),
            _ => Err(format!("Unknown review status: {}", s)),
        }
    }
}

/// A held response awaiting human review — the central entity of the
/// pipeline. Owned by the review queue until resolved, immutable after.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingItem {
    /// Unique item ID.
    pub id: Uuid,
    /// ID of the user message this reply answers. Exactly one final reply
    /// is ever delivered per message ID.
    pub message_id: String,
    /// The user who sent the message.
    pub user_id: String,
    /// The AI entity the user was chatting with.
    pub ai_entity_id: String,
    /// Organization whose counselors review this item.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub organization_id: Option<String>,
    /// The user's original message text.
    pub original_message: String,
    /// The AI-generated candidate reply under review.
    pub candidate_reply: String,
    /// Review priority, derived from the risk level.
    pub priority: Priority,
    /// Counselor currently assigned, if any. Changes only via escalation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assigned_counselor_id: Option<String>,
    /// When the item auto-resolves if nobody acts. Immutable once set.
    pub deadline: DateTime<Utc>,
    /// Current lifecycle status.
    pub status: ReviewStatus,
    /// The reply actually delivered to the user, set on resolution.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_reply: Option<String>,
    /// When the item was created.
    pub created_at: DateTime<Utc>,
    /// When the item was resolved, if it has been.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolved_at: Option<DateTime<Utc>>,
    /// Notes left by the resolving counselor.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reviewer_notes: Option<String>,
    /// How many times this item has been escalated.
    #[serde(default)]
    pub escalation_count: u32,
    /// Optimistic-concurrency version, bumped on every write.
    #[serde(default)]
    pub version: u64,
}

impl PendingItem {
    /// Create a new pending item. The deadline is `created_at + sla` and
    /// never changes afterwards.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        message_id: impl Into<String>,
        user_id: impl Into<String>,
        ai_entity_id: impl Into<String>,
        original_message: impl Into<String>,
        candidate_reply: impl Into<String>,
        priority: Priority,
        created_at: DateTime<Utc>,
        sla: std::time::Duration,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            message_id: message_id.into(),
            user_id: user_id.into(),
            ai_entity_id: ai_entity_id.into(),
            organization_id: None,
            original_message: original_message.into(),
            candidate_reply: candidate_reply.into(),
            priority,
            assigned_counselor_id: None,
            deadline: created_at
                + chrono::Duration::from_std(sla).unwrap_or_else(|_| chrono::Duration::hours(4)),
            status: ReviewStatus::Pending,
            final_reply: None,
            created_at,
            resolved_at: None,
            reviewer_notes: None,
            escalation_count: 0,
            version: 0,
        }
    }

    /// Set the owning organization.
    pub fn with_organization(mut self, org_id: impl Into<String>) -> Self {
        self.organization_id = Some(org_id.into());
        self
    }

    /// Set the assigned counselor.
    pub fn with_counselor(mut self, counselor_id: impl Into<String>) -> Self {
        self.assigned_counselor_id = Some(counselor_id.into());
        self
    }

    /// Whether this item is past its deadline at `now`.
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        self.status == ReviewStatus::Pending && now >= self.deadline
    }
}

/// A counselor who reviews held items. Written by external admin tooling;
/// read-only to this core except for computed load.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Counselor {
    /// Unique counselor ID.
    pub id: String,
    /// Organization the counselor belongs to.
    pub organization_id: String,
    /// Whether the counselor is currently accepting cases.
    pub is_available: bool,
    /// Maximum concurrent pending items (soft limit under races).
    pub max_concurrent_cases: usize,
}

/// What a review action did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewActionType {
    Approved,
    Modified,
    Rejected,
    Escalated,
    AutoApproved,
}

impl std::fmt::Display for ReviewActionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Approved => write!(f, "approved"),
            Self::Modified => write!(f, "modified"),
            Self::Rejected => write!(f, "rejected"),
            Self::Escalated => write!(f, "escalated"),
            Self::AutoApproved => write!(f, "auto_approved"),
        }
    }
}

/// Append-only audit record of a counselor or system action on an item.
/// Created once, never mutated or deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewAction {
    /// Unique action ID.
    pub id: Uuid,
    /// Acting counselor; `None` for system actions (auto-approval).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub counselor_id: Option<String>,
    /// The item acted on.
    pub pending_item_id: Uuid,
    /// What was done.
    pub action_type: ReviewActionType,
    /// The candidate reply at the time of the action.
    pub original_reply: String,
    /// The reply delivered, if the action resolved the item.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_reply: Option<String>,
    /// Counselor-supplied reason or notes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Seconds between item creation and this action.
    pub review_duration_seconds: i64,
    /// When the action happened.
    pub created_at: DateTime<Utc>,
}

impl ReviewAction {
    /// Record an action against an item at `now`.
    pub fn record(
        item: &PendingItem,
        counselor_id: Option<String>,
        action_type: ReviewActionType,
        final_reply: Option<String>,
        reason: Option<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            counselor_id,
            pending_item_id: item.id,
            action_type,
            original_reply: item.candidate_reply.clone(),
            final_reply,
            reason,
            review_duration_seconds: (now - item.created_at).num_seconds(),
            created_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn make_item(priority: Priority, sla_secs: u64) -> PendingItem {
        PendingItem::new(
            "msg_1",
            "user_1",
            "entity_1",
            "original text",
            "candidate reply",
            priority,
            Utc::now(),
            Duration::from_secs(sla_secs),
        )
    }

    #[test]
    fn new_item_is_pending_with_deadline() {
        let item = make_item(Priority::Urgent, 900);
        assert_eq!(item.status, ReviewStatus::Pending);
        assert_eq!(item.deadline - item.created_at, chrono::Duration::minutes(15));
        assert_eq!(item.version, 0);
        assert!(item.final_reply.is_none());
    }

    #[test]
    fn verdict_confidence_is_clamped() {
        let v = RiskVerdict::new(RiskLevel::Low, 1.7, false);
        assert_eq!(v.confidence, 1.0);
        let v = RiskVerdict::new(RiskLevel::Low, -0.3, false);
        assert_eq!(v.confidence, 0.0);
    }

    #[test]
    fn fail_safe_verdict_requires_review() {
        let v = RiskVerdict::fail_safe();
        assert!(v.requires_review);
        assert_eq!(v.level, RiskLevel::High);
        assert!(v.categories.contains("classification_unavailable"));
    }

    #[test]
    fn priority_orders_by_urgency() {
        assert!(Priority::Urgent > Priority::High);
        assert!(Priority::High > Priority::Normal);
    }

    #[test]
    fn status_resolution_check() {
        assert!(!ReviewStatus::Pending.is_resolved());
        assert!(ReviewStatus::Approved.is_resolved());
        assert!(ReviewStatus::Modified.is_resolved());
        assert!(ReviewStatus::Rejected.is_resolved());
        assert!(ReviewStatus::AutoApproved.is_resolved());
    }

    #[test]
    fn overdue_only_when_pending_and_past_deadline() {
        let mut item = make_item(Priority::Normal, 60);
        assert!(!item.is_overdue(item.created_at));
        assert!(item.is_overdue(item.created_at + chrono::Duration::seconds(61)));

        item.status = ReviewStatus::Approved;
        assert!(!item.is_overdue(item.created_at + chrono::Duration::seconds(61)));
    }

    #[test]
    fn status_serde_roundtrip() {
        for status in [
            ReviewStatus::Pending,
            ReviewStatus::Approved,
            ReviewStatus::Modified,
            ReviewStatus::Rejected,
            ReviewStatus::AutoApproved,
        ] {
            let json = serde_json::to_string(&status).unwrap();
            let parsed: ReviewStatus = serde_json::from_str(&json).unwrap();
            assert_eq!(status, parsed);
        }
        assert_eq!(
            serde_json::to_string(&ReviewStatus::AutoApproved).unwrap(),
            "\"auto_approved\""
        );
    }

    #[test]
    fn risk_level_display_and_fromstr() {
        assert_eq!(RiskLevel::Critical.to_string(), "critical");
        assert_eq!("high".parse::<RiskLevel>().unwrap(), RiskLevel::High);
        assert!("severe".parse::<RiskLevel>().is_err());
    }

    #[test]
    fn review_action_computes_duration() {
        let item = make_item(Priority::High, 3600);
        let later = item.created_at + chrono::Duration::seconds(125);
        let action = ReviewAction::record(
            &item,
            Some("c1".into()),
            ReviewActionType::Approved,
            Some(item.candidate_reply.clone()),
            None,
            later,
        );
        assert_eq!(action.review_duration_seconds, 125);
        assert_eq!(action.original_reply, "candidate reply");
        assert_eq!(action.pending_item_id, item.id);
    }

    #[test]
    fn system_action_has_no_counselor() {
        let item = make_item(Priority::Normal, 60);
        let action = ReviewAction::record(
            &item,
            None,
            ReviewActionType::AutoApproved,
            Some(item.candidate_reply.clone()),
            None,
            Utc::now(),
        );
        assert!(action.counselor_id.is_none());
        let json = serde_json::to_string(&action).unwrap();
        assert!(!json.contains("\"counselor_id\""));
    }

    #[test]
    fn item_serde_roundtrip_preserves_escalation_count() {
        let mut item = make_item(Priority::Urgent, 900).with_organization("org_1");
        item.escalation_count = 2;
        let json = serde_json::to_string(&item).unwrap();
        let parsed: PendingItem = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.escalation_count, 2);
        assert_eq!(parsed.organization_id.as_deref(), Some("org_1"));
    }
}
