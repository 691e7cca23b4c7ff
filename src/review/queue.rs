//! Review queue — durable collection of held items with an ordering
//! contract.
//!
//! Listing order is part of the contract, not an implementation detail:
//! priority descending, then created_at ascending (oldest-urgent first).
//! It determines what a counselor sees first, so it is enforced here
//! rather than trusted to the backend.

use std::cmp::Reverse;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::info;
use uuid::Uuid;

use crate::error::StoreError;
use crate::review::model::{PendingItem, Priority, ReviewStatus};
use crate::store::ReviewStore;

/// Queue of held items over the persistence boundary.
pub struct ReviewQueue {
    store: Arc<dyn ReviewStore>,
}

impl ReviewQueue {
    pub fn new(store: Arc<dyn ReviewStore>) -> Self {
        Self { store }
    }

    /// Persist a newly-held item.
    pub async fn enqueue(&self, item: &PendingItem) -> Result<(), StoreError> {
        self.store.insert_item(item).await?;
        info!(
            item_id = %item.id,
            message_id = %item.message_id,
            priority = %item.priority,
            counselor = item.assigned_counselor_id.as_deref().unwrap_or("unassigned"),
            deadline = %item.deadline,
            "Item enqueued for review"
        );
        Ok(())
    }

    /// Get one item by ID.
    pub async fn get(&self, id: Uuid) -> Result<Option<PendingItem>, StoreError> {
        self.store.get_item(id).await
    }

    /// Items assigned to a counselor, in review order.
    pub async fn list_for_counselor(
        &self,
        counselor_id: &str,
        status: ReviewStatus,
    ) -> Result<Vec<PendingItem>, StoreError> {
        let mut items = self.store.items_for_counselor(counselor_id, status).await?;
        order_for_review(&mut items);
        Ok(items)
    }

    /// Items for an organization, optionally filtered by priority, in
    /// review order.
    pub async fn list_for_organization(
        &self,
        org_id: &str,
        status: ReviewStatus,
        priority: Option<Priority>,
    ) -> Result<Vec<PendingItem>, StoreError> {
        let mut items = self
            .store
            .items_for_organization(org_id, status, priority)
            .await?;
        order_for_review(&mut items);
        Ok(items)
    }

    /// Pending items with no assigned counselor, in review order.
    pub async fn list_unassigned(
        &self,
        org_id: Option<&str>,
    ) -> Result<Vec<PendingItem>, StoreError> {
        let mut items = self.store.unassigned_items(org_id).await?;
        order_for_review(&mut items);
        Ok(items)
    }

    /// Pending items past their deadline at `now`, oldest deadline first.
    pub async fn list_expired(&self, now: DateTime<Utc>) -> Result<Vec<PendingItem>, StoreError> {
        let mut items = self.store.expired_items(now).await?;
        items.sort_by_key(|i| i.deadline);
        Ok(items)
    }
}

/// Sort by priority descending, then created_at ascending.
fn order_for_review(items: &mut [PendingItem]) {
    items.sort_by_key(|i| (Reverse(i.priority), i.created_at));
}
