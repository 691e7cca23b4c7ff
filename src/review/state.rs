//! Review state machine — the lifecycle of a held item.
//!
//! `pending` moves forward into exactly one of `approved`, `modified`,
//! `rejected`, or `auto_approved`; there is no path back. Escalation is
//! not a status change: it reassigns the item, forces urgent priority and
//! bumps `escalation_count` while the item stays pending, so audit
//! continuity is never lost.
//!
//! Resolving transitions are idempotent under retry: invoked on an
//! already-resolved item they return the stored resolution and append no
//! second audit action. Mutations go through the store's versioned write,
//! so a counselor action racing an auto-approval has exactly one winner —
//! the loser re-reads and observes the existing resolution.

use std::sync::Arc;

use tracing::{error, info, warn};
use uuid::Uuid;

use crate::assignment::AssignmentPolicy;
use crate::clock::Clock;
use crate::error::{Error, ReviewError, Result, StoreError};
use crate::external::DeliveryGateway;
use crate::review::model::{
    PendingItem, Priority, ReviewAction, ReviewActionType, ReviewStatus,
};
use crate::store::ReviewStore;

/// Attempts at the versioned write before a conflict propagates.
const MAX_WRITE_ATTEMPTS: u32 = 2;

/// Outcome of a resolving transition.
#[derive(Debug, Clone)]
pub struct ResolutionOutcome {
    /// The item after the transition (the stored resolution on a retry).
    pub item: PendingItem,
    /// Whether this call performed the resolution. `false` means the item
    /// was already resolved and this was the idempotent no-op path.
    pub newly_resolved: bool,
    /// Whether the final reply reached the delivery gateway on this call.
    pub delivered: bool,
}

/// What a resolving transition does to the item.
enum ResolveKind {
    Approve {
        counselor_id: String,
        notes: Option<String>,
    },
    Modify {
        counselor_id: String,
        new_reply: String,
        notes: Option<String>,
    },
    Reject {
        counselor_id: String,
        replacement_reply: String,
        reason: String,
    },
    AutoApprove,
}

impl ResolveKind {
    fn action_type(&self) -> ReviewActionType {
        match self {
            Self::Approve { .. } => ReviewActionType::Approved,
            Self::Modify { .. } => ReviewActionType::Modified,
            Self::Reject { .. } => ReviewActionType::Rejected,
            Self::AutoApprove => ReviewActionType::AutoApproved,
        }
    }

    fn status(&self) -> ReviewStatus {
        match self {
            Self::Approve { .. } => ReviewStatus::Approved,
            Self::Modify { .. } => ReviewStatus::Modified,
            Self::Reject { .. } => ReviewStatus::Rejected,
            Self::AutoApprove => ReviewStatus::AutoApproved,
        }
    }

    fn counselor_id(&self) -> Option<String> {
        match self {
            Self::Approve { counselor_id, .. }
            | Self::Modify { counselor_id, .. }
            | Self::Reject { counselor_id, .. } => Some(counselor_id.clone()),
            Self::AutoApprove => None,
        }
    }

    /// The reply this resolution delivers. Approval and auto-approval send
    /// the candidate as-is; modify and reject always send something else —
    /// a rejection still delivers a safe replacement, never silence.
    fn final_reply(&self, item: &PendingItem) -> String {
        match self {
            Self::Approve { .. } | Self::AutoApprove => item.candidate_reply.clone(),
            Self::Modify { new_reply, .. } => new_reply.clone(),
            Self::Reject {
                replacement_reply, ..
            } => replacement_reply.clone(),
        }
    }

    fn notes(&self) -> Option<String> {
        match self {
            Self::Approve { notes, .. } | Self::Modify { notes, .. } => notes.clone(),
            Self::Reject { reason, .. } => Some(reason.clone()),
            Self::AutoApprove => None,
        }
    }
}

/// Drives held items through their lifecycle.
pub struct ReviewStateMachine {
    store: Arc<dyn ReviewStore>,
    gateway: Arc<dyn DeliveryGateway>,
    assignment: Arc<AssignmentPolicy>,
    clock: Arc<dyn Clock>,
}

impl ReviewStateMachine {
    pub fn new(
        store: Arc<dyn ReviewStore>,
        gateway: Arc<dyn DeliveryGateway>,
        assignment: Arc<AssignmentPolicy>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            gateway,
            assignment,
            clock,
        }
    }

    /// Approve the candidate reply as-is.
    pub async fn approve(
        &self,
        item_id: Uuid,
        counselor_id: &str,
        notes: Option<String>,
    ) -> Result<ResolutionOutcome> {
        self.resolve(
            item_id,
            ResolveKind::Approve {
                counselor_id: counselor_id.to_string(),
                notes,
            },
        )
        .await
    }

    /// Deliver an edited reply instead of the candidate.
    pub async fn modify(
        &self,
        item_id: Uuid,
        counselor_id: &str,
        new_reply: impl Into<String>,
        notes: Option<String>,
    ) -> Result<ResolutionOutcome> {
        self.resolve(
            item_id,
            ResolveKind::Modify {
                counselor_id: counselor_id.to_string(),
                new_reply: new_reply.into(),
                notes,
            },
        )
        .await
    }

    /// Reject the candidate and deliver a safe replacement instead.
    pub async fn reject(
        &self,
        item_id: Uuid,
        counselor_id: &str,
        replacement_reply: impl Into<String>,
        reason: impl Into<String>,
    ) -> Result<ResolutionOutcome> {
        self.resolve(
            item_id,
            ResolveKind::Reject {
                counselor_id: counselor_id.to_string(),
                replacement_reply: replacement_reply.into(),
                reason: reason.into(),
            },
        )
        .await
    }

    /// System-triggered resolution of an item past its deadline.
    pub async fn auto_approve(&self, item_id: Uuid) -> Result<ResolutionOutcome> {
        let now = self.clock.now();
        let item = self.fetch(item_id).await?;
        if item.status == ReviewStatus::Pending && now < item.deadline {
            let remaining = (item.deadline - now)
                .to_std()
                .unwrap_or(std::time::Duration::ZERO);
            return Err(ReviewError::DeadlineNotReached {
                id: item_id,
                remaining,
            }
            .into());
        }
        self.resolve(item_id, ResolveKind::AutoApprove).await
    }

    /// Reassign the item and raise it to urgent. Does not resolve.
    ///
    /// When `target_counselor_id` is not given, the assignment policy
    /// picks one; `NoAvailableCounselor` surfaces to the caller and the
    /// item is left untouched.
    pub async fn escalate(
        &self,
        item_id: Uuid,
        counselor_id: &str,
        reason: impl Into<String>,
        target_counselor_id: Option<String>,
    ) -> Result<PendingItem> {
        let reason = reason.into();
        let mut attempts = 0;
        let updated = loop {
            let item = self.fetch(item_id).await?;

            if item.status.is_resolved() {
                return Err(ReviewError::InvalidState {
                    id: item_id,
                    state: item.status.to_string(),
                    attempted: "escalate".to_string(),
                }
                .into());
            }

            let target = match &target_counselor_id {
                Some(id) => {
                    if self
                        .store
                        .get_counselor(id)
                        .await
                        .map_err(Error::Store)?
                        .is_none()
                    {
                        return Err(ReviewError::CounselorNotFound { id: id.clone() }.into());
                    }
                    id.clone()
                }
                None => {
                    let org_id = item.organization_id.clone();
                    let candidate = match org_id.as_deref() {
                        Some(org) => self.assignment.assign(org).await.map_err(Error::Store)?,
                        None => None,
                    };
                    candidate.ok_or(ReviewError::NoAvailableCounselor { org_id })?
                }
            };

            let mut next = item.clone();
            next.assigned_counselor_id = Some(target);
            next.priority = Priority::Urgent;
            next.escalation_count += 1;

            match self.store.update_item(&next, item.version).await {
                Ok(committed) => break committed,
                Err(e @ StoreError::Conflict { .. }) => {
                    attempts += 1;
                    if attempts >= MAX_WRITE_ATTEMPTS {
                        warn!(item_id = %item_id, attempts, "Giving up after repeated version conflicts");
                        return Err(e.into());
                    }
                    // Lost the race; re-read. A concurrent resolution
                    // surfaces as InvalidState on the next pass.
                    continue;
                }
                Err(e) => return Err(e.into()),
            }
        };

        let action = ReviewAction::record(
            &updated,
            Some(counselor_id.to_string()),
            ReviewActionType::Escalated,
            None,
            Some(reason.clone()),
            self.clock.now(),
        );
        self.store.append_action(&action).await.map_err(Error::Store)?;

        info!(
            item_id = %item_id,
            from = counselor_id,
            to = updated.assigned_counselor_id.as_deref().unwrap_or("unassigned"),
            escalation_count = updated.escalation_count,
            reason = %reason,
            "Item escalated"
        );
        Ok(updated)
    }

    /// Full audit trail for an item, oldest first.
    pub async fn audit_trail(&self, item_id: Uuid) -> Result<Vec<ReviewAction>> {
        Ok(self.store.actions_for_item(item_id).await.map_err(Error::Store)?)
    }

    async fn fetch(&self, item_id: Uuid) -> Result<PendingItem> {
        self.store
            .get_item(item_id)
            .await
            .map_err(Error::Store)?
            .ok_or_else(|| ReviewError::ItemNotFound { id: item_id }.into())
    }

    /// Shared resolution path for approve/modify/reject/auto-approve.
    ///
    /// Order matters: the versioned write commits the resolution first,
    /// the audit action is appended second, and delivery happens last.
    /// The gateway is therefore invoked at most once per item, by the
    /// writer that won the version check.
    async fn resolve(&self, item_id: Uuid, kind: ResolveKind) -> Result<ResolutionOutcome> {
        let mut attempts = 0;
        let committed = loop {
            let item = self.fetch(item_id).await?;

            if item.status.is_resolved() {
                info!(
                    item_id = %item_id,
                    status = %item.status,
                    attempted = %kind.action_type(),
                    "Item already resolved, returning existing result"
                );
                return Ok(ResolutionOutcome {
                    item,
                    newly_resolved: false,
                    delivered: false,
                });
            }

            let now = self.clock.now();
            let mut updated = item.clone();
            updated.status = kind.status();
            updated.final_reply = Some(kind.final_reply(&item));
            updated.resolved_at = Some(now);
            updated.reviewer_notes = kind.notes();

            match self.store.update_item(&updated, item.version).await {
                Ok(committed) => break committed,
                Err(e @ StoreError::Conflict { .. }) => {
                    attempts += 1;
                    if attempts >= MAX_WRITE_ATTEMPTS {
                        warn!(item_id = %item_id, attempts, "Giving up after repeated version conflicts");
                        return Err(e.into());
                    }
                    // Lost the race; re-read and either observe the winner's
                    // resolution or try once more.
                    continue;
                }
                Err(e) => return Err(e.into()),
            }
        };

        let action = ReviewAction::record(
            &committed,
            kind.counselor_id(),
            kind.action_type(),
            committed.final_reply.clone(),
            kind.notes(),
            self.clock.now(),
        );
        self.store.append_action(&action).await.map_err(Error::Store)?;

        let reply = committed.final_reply.clone().unwrap_or_default();
        let delivered = match self
            .gateway
            .deliver(&committed.user_id, &committed.ai_entity_id, &reply)
            .await
        {
            Ok(()) => true,
            Err(e) => {
                // The resolution is committed; the gateway owns retries.
                error!(item_id = %item_id, error = %e, "Final reply delivery failed");
                false
            }
        };

        info!(
            item_id = %item_id,
            action = %action.action_type,
            counselor = action.counselor_id.as_deref().unwrap_or("system"),
            review_duration_s = action.review_duration_seconds,
            delivered,
            "Item resolved"
        );

        Ok(ResolutionOutcome {
            item: committed,
            newly_resolved: true,
            delivered,
        })
    }
}
