//! Triage service — the pipeline surface the surrounding application calls.
//!
//! Wires classifier → triage → (auto-deliver | assign + enqueue), and
//! exposes counselor actions, queue listings, metrics, and the expiry
//! scan. External calls are bounded: a classifier or generator timeout is
//! handled fail-safe (hold for review), never surfaced to the user.

use std::sync::Arc;

use tracing::{info, warn};
use uuid::Uuid;

use crate::assignment::AssignmentPolicy;
use crate::clock::Clock;
use crate::config::TriageConfig;
use crate::error::{Error, ExternalError, Result};
use crate::external::{ConversationContext, DeliveryGateway, ResponseGenerator, RiskClassifier};
use crate::review::model::{PendingItem, Priority, ReviewAction, ReviewStatus, RiskVerdict};
use crate::review::queue::ReviewQueue;
use crate::review::state::{ResolutionOutcome, ReviewStateMachine};
use crate::review::{QueueMetrics, QueueSnapshot};
use crate::scanner::{ExpiryScanner, ScanOutcome};
use crate::store::ReviewStore;
use crate::triage::{TriageDecision, TriageEngine};

/// Candidate placed on a held item when the generator produced nothing.
const NO_CANDIDATE_PLACEHOLDER: &str =
    "No automatic reply was generated. A counselor will respond.";

/// An inbound user message entering the pipeline.
#[derive(Debug, Clone)]
pub struct InboundMessage {
    /// Channel-native message ID. One final reply per message ID, ever.
    pub message_id: String,
    /// The sending user.
    pub user_id: String,
    /// The AI entity being addressed.
    pub ai_entity_id: String,
    /// Organization whose counselors review held replies.
    pub organization_id: Option<String>,
    /// Message text.
    pub text: String,
    /// Conversation context for the classifier.
    pub context: ConversationContext,
}

/// What the caller tells the user after triage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TriageOutcome {
    /// The reply was delivered immediately.
    Delivered { reply: String },
    /// The reply is held for review; show the placeholder.
    Queued {
        pending_item_id: Uuid,
        placeholder: String,
    },
}

/// The risk-triaged response pipeline.
pub struct TriageService {
    config: TriageConfig,
    store: Arc<dyn ReviewStore>,
    engine: TriageEngine,
    classifier: Arc<dyn RiskClassifier>,
    generator: Arc<dyn ResponseGenerator>,
    gateway: Arc<dyn DeliveryGateway>,
    queue: Arc<ReviewQueue>,
    machine: Arc<ReviewStateMachine>,
    assignment: Arc<AssignmentPolicy>,
    metrics: QueueMetrics,
    scanner: ExpiryScanner,
    clock: Arc<dyn Clock>,
}

impl TriageService {
    /// Wire the pipeline over a store and the three external collaborators.
    pub fn new(
        config: TriageConfig,
        store: Arc<dyn ReviewStore>,
        classifier: Arc<dyn RiskClassifier>,
        generator: Arc<dyn ResponseGenerator>,
        gateway: Arc<dyn DeliveryGateway>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let engine = TriageEngine::new(config.clone());
        let queue = Arc::new(ReviewQueue::new(store.clone()));
        let assignment = Arc::new(AssignmentPolicy::new(store.clone()));
        let machine = Arc::new(ReviewStateMachine::new(
            store.clone(),
            gateway.clone(),
            assignment.clone(),
            clock.clone(),
        ));
        let metrics = QueueMetrics::new(store.clone());
        let scanner = ExpiryScanner::new(queue.clone(), machine.clone(), clock.clone());

        Self {
            config,
            store,
            engine,
            classifier,
            generator,
            gateway,
            queue,
            machine,
            assignment,
            metrics,
            scanner,
            clock,
        }
    }

    /// Classify, generate, and either deliver or hold an AI reply.
    ///
    /// The user always gets either the real reply or the review
    /// placeholder — never an error for classifier/generator trouble.
    pub async fn submit_for_triage(&self, message: &InboundMessage) -> Result<TriageOutcome> {
        // At-least-once intake: a redelivered message whose reply is
        // already held points back at the existing item instead of
        // creating a second one.
        if let Some(existing) = self
            .store
            .pending_for_message(&message.message_id)
            .await
            .map_err(Error::Store)?
        {
            info!(
                message_id = %message.message_id,
                item_id = %existing.id,
                "Message already held for review"
            );
            return Ok(TriageOutcome::Queued {
                pending_item_id: existing.id,
                placeholder: self.config.review_placeholder.clone(),
            });
        }

        let verdict = self.classify(message).await;
        let (candidate, generation_failed) = self.generate(message, &verdict).await;

        let now = self.clock.now();
        let mut decision = self.engine.decide(&verdict, now);
        if generation_failed && decision == TriageDecision::AutoDeliver {
            // No unreviewed auto-send of a placeholder; hold instead.
            decision = self.engine.fail_safe_decision(now);
        }

        match decision {
            TriageDecision::AutoDeliver => {
                self.gateway
                    .deliver(&message.user_id, &message.ai_entity_id, &candidate)
                    .await
                    .map_err(Error::External)?;
                info!(
                    message_id = %message.message_id,
                    level = %verdict.level,
                    "Reply auto-delivered"
                );
                Ok(TriageOutcome::Delivered { reply: candidate })
            }
            TriageDecision::HoldForReview { priority, deadline } => {
                let item = self
                    .hold(message, candidate, priority, deadline, now)
                    .await?;
                Ok(TriageOutcome::Queued {
                    pending_item_id: item.id,
                    placeholder: self.config.review_placeholder.clone(),
                })
            }
        }
    }

    async fn classify(&self, message: &InboundMessage) -> RiskVerdict {
        let classify = self.classifier.classify(&message.text, &message.context);
        match tokio::time::timeout(self.config.classify_timeout, classify).await {
            Ok(Ok(verdict)) => verdict,
            Ok(Err(e)) => {
                warn!(
                    message_id = %message.message_id,
                    error = %e,
                    "Classification failed, holding for review"
                );
                RiskVerdict::fail_safe()
            }
            Err(_) => {
                let e = ExternalError::ClassificationTimeout {
                    timeout: self.config.classify_timeout,
                };
                warn!(
                    message_id = %message.message_id,
                    error = %e,
                    "Classification timed out, holding for review"
                );
                RiskVerdict::fail_safe()
            }
        }
    }

    /// Generate the candidate reply. Returns `(candidate, failed)` — on
    /// timeout or error the candidate is a placeholder and the message
    /// must not auto-deliver.
    async fn generate(&self, message: &InboundMessage, verdict: &RiskVerdict) -> (String, bool) {
        let generate = self.generator.generate(&message.text, verdict);
        match tokio::time::timeout(self.config.generate_timeout, generate).await {
            Ok(Ok(reply)) => (reply, false),
            Ok(Err(e)) => {
                warn!(message_id = %message.message_id, error = %e, "Generation failed");
                (NO_CANDIDATE_PLACEHOLDER.to_string(), true)
            }
            Err(_) => {
                let e = ExternalError::GenerationTimeout {
                    timeout: self.config.generate_timeout,
                };
                warn!(message_id = %message.message_id, error = %e, "Generation timed out");
                (NO_CANDIDATE_PLACEHOLDER.to_string(), true)
            }
        }
    }

    async fn hold(
        &self,
        message: &InboundMessage,
        candidate: String,
        priority: Priority,
        deadline: chrono::DateTime<chrono::Utc>,
        now: chrono::DateTime<chrono::Utc>,
    ) -> Result<PendingItem> {
        let mut item = PendingItem::new(
            &message.message_id,
            &message.user_id,
            &message.ai_entity_id,
            &message.text,
            candidate,
            priority,
            now,
            std::time::Duration::ZERO,
        );
        // The engine computed the deadline from the SLA table already.
        item.deadline = deadline;
        if let Some(org) = &message.organization_id {
            item = item.with_organization(org.clone());

            // Items without a free counselor are queued unassigned rather
            // than dropped; supervisors pick them up via list_unassigned.
            match self.assignment.assign(org).await.map_err(Error::Store)? {
                Some(counselor_id) => item = item.with_counselor(counselor_id),
                None => warn!(
                    message_id = %message.message_id,
                    org_id = %org,
                    priority = %priority,
                    "No counselor available, queuing unassigned"
                ),
            }
        }

        self.queue.enqueue(&item).await.map_err(Error::Store)?;
        Ok(item)
    }

    // ── Counselor actions ───────────────────────────────────────────

    pub async fn approve(
        &self,
        item_id: Uuid,
        counselor_id: &str,
        notes: Option<String>,
    ) -> Result<ResolutionOutcome> {
        self.machine.approve(item_id, counselor_id, notes).await
    }

    pub async fn modify(
        &self,
        item_id: Uuid,
        counselor_id: &str,
        new_reply: impl Into<String>,
        notes: Option<String>,
    ) -> Result<ResolutionOutcome> {
        self.machine.modify(item_id, counselor_id, new_reply, notes).await
    }

    pub async fn reject(
        &self,
        item_id: Uuid,
        counselor_id: &str,
        replacement_reply: impl Into<String>,
        reason: impl Into<String>,
    ) -> Result<ResolutionOutcome> {
        self.machine
            .reject(item_id, counselor_id, replacement_reply, reason)
            .await
    }

    pub async fn escalate(
        &self,
        item_id: Uuid,
        counselor_id: &str,
        reason: impl Into<String>,
        target_counselor_id: Option<String>,
    ) -> Result<PendingItem> {
        self.machine
            .escalate(item_id, counselor_id, reason, target_counselor_id)
            .await
    }

    // ── Queue queries ───────────────────────────────────────────────

    pub async fn get_item(&self, item_id: Uuid) -> Result<Option<PendingItem>> {
        Ok(self.queue.get(item_id).await.map_err(Error::Store)?)
    }

    pub async fn list_for_counselor(
        &self,
        counselor_id: &str,
        status: ReviewStatus,
    ) -> Result<Vec<PendingItem>> {
        Ok(self
            .queue
            .list_for_counselor(counselor_id, status)
            .await
            .map_err(Error::Store)?)
    }

    pub async fn list_for_organization(
        &self,
        org_id: &str,
        status: ReviewStatus,
        priority: Option<Priority>,
    ) -> Result<Vec<PendingItem>> {
        Ok(self
            .queue
            .list_for_organization(org_id, status, priority)
            .await
            .map_err(Error::Store)?)
    }

    pub async fn list_unassigned(&self, org_id: Option<&str>) -> Result<Vec<PendingItem>> {
        Ok(self.queue.list_unassigned(org_id).await.map_err(Error::Store)?)
    }

    pub async fn audit_trail(&self, item_id: Uuid) -> Result<Vec<ReviewAction>> {
        self.machine.audit_trail(item_id).await
    }

    pub async fn queue_snapshot(&self) -> Result<QueueSnapshot> {
        Ok(self
            .metrics
            .snapshot(self.clock.now())
            .await
            .map_err(Error::Store)?)
    }

    // ── Background ──────────────────────────────────────────────────

    /// One expiry pass; call from any scheduler, or use
    /// [`crate::scanner::spawn_expiry_scanner`] with the pieces directly.
    pub async fn run_expiry_scan(&self) -> ScanOutcome {
        self.scanner.run_once().await
    }
}
