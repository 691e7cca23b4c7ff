//! Expiry scanner — auto-resolves pending items that aged past their
//! deadline.
//!
//! Runs as a recurring background task. Failures are isolated per item:
//! one item failing to auto-approve never blocks the rest, it is logged
//! and picked up again on the next tick.

use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info};

use crate::clock::Clock;
use crate::review::queue::ReviewQueue;
use crate::review::state::ReviewStateMachine;

/// Result of one scan pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanOutcome {
    /// Items auto-approved this pass.
    pub auto_approved: usize,
    /// Items that failed and will be retried next tick.
    pub failed: usize,
}

/// Finds expired pending items and drives them through auto-approval.
pub struct ExpiryScanner {
    queue: Arc<ReviewQueue>,
    machine: Arc<ReviewStateMachine>,
    clock: Arc<dyn Clock>,
}

impl ExpiryScanner {
    pub fn new(
        queue: Arc<ReviewQueue>,
        machine: Arc<ReviewStateMachine>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            queue,
            machine,
            clock,
        }
    }

    /// One scan pass: list expired items and auto-approve each.
    pub async fn run_once(&self) -> ScanOutcome {
        let now = self.clock.now();
        let expired = match self.queue.list_expired(now).await {
            Ok(items) => items,
            Err(e) => {
                error!(error = %e, "Expiry scan could not list expired items");
                return ScanOutcome::default();
            }
        };

        let mut outcome = ScanOutcome::default();
        for item in expired {
            match self.machine.auto_approve(item.id).await {
                Ok(resolution) => {
                    if resolution.newly_resolved {
                        outcome.auto_approved += 1;
                    }
                    // Already resolved by a concurrent counselor action:
                    // nothing to do.
                }
                Err(e) => {
                    error!(item_id = %item.id, error = %e, "Auto-approval failed, will retry next tick");
                    outcome.failed += 1;
                }
            }
        }

        if outcome.auto_approved > 0 || outcome.failed > 0 {
            info!(
                auto_approved = outcome.auto_approved,
                failed = outcome.failed,
                "Expiry scan complete"
            );
        }
        outcome
    }
}

/// Spawn a background task that runs the scanner every `interval`.
pub fn spawn_expiry_scanner(
    scanner: Arc<ExpiryScanner>,
    interval: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            scanner.run_once().await;
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assignment::AssignmentPolicy;
    use crate::clock::ManualClock;
    use crate::error::{ExternalError, StoreError};
    use crate::external::DeliveryGateway;
    use crate::review::model::{
        Counselor, PendingItem, Priority, ReviewAction, ReviewStatus,
    };
    use crate::store::{MemoryStore, ReviewStore};
    use async_trait::async_trait;
    use chrono::{DateTime, Utc};
    use std::sync::Mutex;
    use uuid::Uuid;

    struct CountingGateway {
        delivered: Mutex<Vec<String>>,
        fail_for_user: Option<String>,
    }

    #[async_trait]
    impl DeliveryGateway for CountingGateway {
        async fn deliver(
            &self,
            user_id: &str,
            _ai_entity_id: &str,
            reply: &str,
        ) -> Result<(), ExternalError> {
            if self.fail_for_user.as_deref() == Some(user_id) {
                return Err(ExternalError::DeliveryFailed {
                    user_id: user_id.to_string(),
                    reason: "unreachable".to_string(),
                });
            }
            self.delivered.lock().unwrap().push(reply.to_string());
            Ok(())
        }
    }

    fn scanner_fixture(
        fail_for_user: Option<String>,
    ) -> (Arc<MemoryStore>, Arc<ManualClock>, ExpiryScanner) {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let gateway = Arc::new(CountingGateway {
            delivered: Mutex::new(Vec::new()),
            fail_for_user,
        });
        let machine = Arc::new(ReviewStateMachine::new(
            store.clone(),
            gateway,
            Arc::new(AssignmentPolicy::new(store.clone())),
            clock.clone(),
        ));
        let queue = Arc::new(ReviewQueue::new(store.clone()));
        let scanner = ExpiryScanner::new(queue, machine, clock.clone());
        (store, clock, scanner)
    }

    async fn insert_pending(
        store: &MemoryStore,
        message_id: &str,
        user_id: &str,
        created_at: chrono::DateTime<Utc>,
        sla_secs: u64,
    ) -> PendingItem {
        let item = PendingItem::new(
            message_id,
            user_id,
            "entity_1",
            "original",
            "candidate",
            Priority::Urgent,
            created_at,
            std::time::Duration::from_secs(sla_secs),
        );
        store.insert_item(&item).await.unwrap();
        item
    }

    #[tokio::test]
    async fn expired_items_auto_approved_within_one_pass() {
        let (store, clock, scanner) = scanner_fixture(None);
        let start = clock.now();
        let expired = insert_pending(&store, "m1", "u1", start, 900).await;
        let fresh = insert_pending(&store, "m2", "u2", start, 14400).await;

        clock.advance(chrono::Duration::minutes(16));
        let outcome = scanner.run_once().await;
        assert_eq!(outcome, ScanOutcome { auto_approved: 1, failed: 0 });

        let resolved = store.get_item(expired.id).await.unwrap().unwrap();
        assert_eq!(resolved.status, ReviewStatus::AutoApproved);
        let untouched = store.get_item(fresh.id).await.unwrap().unwrap();
        assert_eq!(untouched.status, ReviewStatus::Pending);
    }

    #[tokio::test]
    async fn nothing_expired_is_a_quiet_pass() {
        let (store, clock, scanner) = scanner_fixture(None);
        insert_pending(&store, "m1", "u1", clock.now(), 3600).await;

        assert_eq!(scanner.run_once().await, ScanOutcome::default());
    }

    #[tokio::test]
    async fn scan_is_idempotent_across_passes() {
        let (store, clock, scanner) = scanner_fixture(None);
        insert_pending(&store, "m1", "u1", clock.now(), 900).await;

        clock.advance(chrono::Duration::hours(1));
        assert_eq!(scanner.run_once().await.auto_approved, 1);
        assert_eq!(scanner.run_once().await.auto_approved, 0);
    }

    #[tokio::test]
    async fn delivery_failure_still_counts_as_resolved() {
        // Delivery fails for u1, but the resolution itself commits, so
        // the pass reports both items as auto-approved.
        let (store, clock, scanner) = scanner_fixture(Some("u1".to_string()));
        insert_pending(&store, "m1", "u1", clock.now(), 900).await;
        insert_pending(&store, "m2", "u2", clock.now(), 900).await;

        clock.advance(chrono::Duration::hours(1));
        let outcome = scanner.run_once().await;
        assert_eq!(outcome.auto_approved, 2);
        assert_eq!(outcome.failed, 0);

        for item in store.pending_items().await.unwrap() {
            panic!("item {} should have been resolved", item.id);
        }
    }

    /// Store wrapper whose versioned write fails for one chosen item.
    struct FlakyStore {
        inner: MemoryStore,
        fail_item: Mutex<Option<Uuid>>,
    }

    #[async_trait]
    impl ReviewStore for FlakyStore {
        async fn insert_item(&self, item: &PendingItem) -> Result<(), StoreError> {
            self.inner.insert_item(item).await
        }

        async fn get_item(&self, id: Uuid) -> Result<Option<PendingItem>, StoreError> {
            self.inner.get_item(id).await
        }

        async fn update_item(
            &self,
            item: &PendingItem,
            expected_version: u64,
        ) -> Result<PendingItem, StoreError> {
            if *self.fail_item.lock().unwrap() == Some(item.id) {
                return Err(StoreError::Unavailable("write path down".into()));
            }
            self.inner.update_item(item, expected_version).await
        }

        async fn expired_items(
            &self,
            now: DateTime<Utc>,
        ) -> Result<Vec<PendingItem>, StoreError> {
            self.inner.expired_items(now).await
        }

        async fn append_action(&self, action: &ReviewAction) -> Result<(), StoreError> {
            self.inner.append_action(action).await
        }

        async fn items_for_counselor(
            &self,
            _counselor_id: &str,
            _status: ReviewStatus,
        ) -> Result<Vec<PendingItem>, StoreError> {
            unimplemented!()
        }

        async fn items_for_organization(
            &self,
            _org_id: &str,
            _status: ReviewStatus,
            _priority: Option<Priority>,
        ) -> Result<Vec<PendingItem>, StoreError> {
            unimplemented!()
        }

        async fn unassigned_items(
            &self,
            _org_id: Option<&str>,
        ) -> Result<Vec<PendingItem>, StoreError> {
            unimplemented!()
        }

        async fn pending_items(&self) -> Result<Vec<PendingItem>, StoreError> {
            unimplemented!()
        }

        async fn pending_for_message(
            &self,
            _message_id: &str,
        ) -> Result<Option<PendingItem>, StoreError> {
            unimplemented!()
        }

        async fn actions_for_item(
            &self,
            _item_id: Uuid,
        ) -> Result<Vec<ReviewAction>, StoreError> {
            unimplemented!()
        }

        async fn recent_actions(&self, _limit: usize) -> Result<Vec<ReviewAction>, StoreError> {
            unimplemented!()
        }

        async fn upsert_counselor(&self, _counselor: &Counselor) -> Result<(), StoreError> {
            unimplemented!()
        }

        async fn get_counselor(&self, _id: &str) -> Result<Option<Counselor>, StoreError> {
            unimplemented!()
        }

        async fn available_counselors(
            &self,
            _org_id: &str,
        ) -> Result<Vec<Counselor>, StoreError> {
            unimplemented!()
        }

        async fn counselor_load(&self, _counselor_id: &str) -> Result<usize, StoreError> {
            unimplemented!()
        }
    }

    #[tokio::test]
    async fn one_failing_item_does_not_block_the_rest() {
        let store = Arc::new(FlakyStore {
            inner: MemoryStore::new(),
            fail_item: Mutex::new(None),
        });
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let gateway = Arc::new(CountingGateway {
            delivered: Mutex::new(Vec::new()),
            fail_for_user: None,
        });
        let machine = Arc::new(ReviewStateMachine::new(
            store.clone(),
            gateway,
            Arc::new(AssignmentPolicy::new(store.clone())),
            clock.clone(),
        ));
        let queue = Arc::new(ReviewQueue::new(store.clone()));
        let scanner = ExpiryScanner::new(queue, machine, clock.clone());

        let start = clock.now();
        let broken = insert_pending(&store.inner, "m1", "u1", start, 900).await;
        let healthy = insert_pending(&store.inner, "m2", "u2", start, 900).await;
        *store.fail_item.lock().unwrap() = Some(broken.id);

        clock.advance(chrono::Duration::hours(1));
        let outcome = scanner.run_once().await;
        assert_eq!(outcome, ScanOutcome { auto_approved: 1, failed: 1 });

        let stuck = store.get_item(broken.id).await.unwrap().unwrap();
        assert_eq!(stuck.status, ReviewStatus::Pending);
        let resolved = store.get_item(healthy.id).await.unwrap().unwrap();
        assert_eq!(resolved.status, ReviewStatus::AutoApproved);

        // Once the store recovers, the next tick picks the item up.
        *store.fail_item.lock().unwrap() = None;
        assert_eq!(
            scanner.run_once().await,
            ScanOutcome { auto_approved: 1, failed: 0 }
        );
    }
}
