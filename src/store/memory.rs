//! In-memory `ReviewStore` backend.
//!
//! Reference implementation used in tests and single-process deployments.
//! The version check in `update_item` is taken under the write lock, so it
//! is a true compare-and-swap for this backend.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::StoreError;
use crate::review::model::{Counselor, PendingItem, Priority, ReviewAction, ReviewStatus};
use crate::store::traits::ReviewStore;

/// In-memory store backed by `tokio::sync::RwLock` maps.
#[derive(Default)]
pub struct MemoryStore {
    items: RwLock<HashMap<Uuid, PendingItem>>,
    actions: RwLock<Vec<ReviewAction>>,
    counselors: RwLock<HashMap<String, Counselor>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ReviewStore for MemoryStore {
    async fn insert_item(&self, item: &PendingItem) -> Result<(), StoreError> {
        let mut items = self.items.write().await;
        items.insert(item.id, item.clone());
        Ok(())
    }

    async fn get_item(&self, id: Uuid) -> Result<Option<PendingItem>, StoreError> {
        Ok(self.items.read().await.get(&id).cloned())
    }

    async fn update_item(
        &self,
        item: &PendingItem,
        expected_version: u64,
    ) -> Result<PendingItem, StoreError> {
        let mut items = self.items.write().await;
        let stored = items.get_mut(&item.id).ok_or_else(|| {
            StoreError::Query(format!("item {} not found on update", item.id))
        })?;

        if stored.version != expected_version {
            return Err(StoreError::Conflict {
                id: item.id,
                expected: expected_version,
                found: stored.version,
            });
        }

        let mut updated = item.clone();
        updated.version = expected_version + 1;
        *stored = updated.clone();
        Ok(updated)
    }

    async fn items_for_counselor(
        &self,
        counselor_id: &str,
        status: ReviewStatus,
    ) -> Result<Vec<PendingItem>, StoreError> {
        let items = self.items.read().await;
        Ok(items
            .values()
            .filter(|i| {
                i.status == status && i.assigned_counselor_id.as_deref() == Some(counselor_id)
            })
            .cloned()
            .collect())
    }

    async fn items_for_organization(
        &self,
        org_id: &str,
        status: ReviewStatus,
        priority: Option<Priority>,
    ) -> Result<Vec<PendingItem>, StoreError> {
        let items = self.items.read().await;
        Ok(items
            .values()
            .filter(|i| {
                i.status == status
                    && i.organization_id.as_deref() == Some(org_id)
                    && priority.is_none_or(|p| i.priority == p)
            })
            .cloned()
            .collect())
    }

    async fn expired_items(&self, now: DateTime<Utc>) -> Result<Vec<PendingItem>, StoreError> {
        let items = self.items.read().await;
        Ok(items.values().filter(|i| i.is_overdue(now)).cloned().collect())
    }

    async fn unassigned_items(
        &self,
        org_id: Option<&str>,
    ) -> Result<Vec<PendingItem>, StoreError> {
        let items = self.items.read().await;
        Ok(items
            .values()
            .filter(|i| {
                i.status == ReviewStatus::Pending
                    && i.assigned_counselor_id.is_none()
                    && org_id.is_none_or(|o| i.organization_id.as_deref() == Some(o))
            })
            .cloned()
            .collect())
    }

    async fn pending_items(&self) -> Result<Vec<PendingItem>, StoreError> {
        let items = self.items.read().await;
        Ok(items
            .values()
            .filter(|i| i.status == ReviewStatus::Pending)
            .cloned()
            .collect())
    }

    async fn pending_for_message(
        &self,
        message_id: &str,
    ) -> Result<Option<PendingItem>, StoreError> {
        let items = self.items.read().await;
        Ok(items
            .values()
            .find(|i| i.status == ReviewStatus::Pending && i.message_id == message_id)
            .cloned())
    }

    async fn append_action(&self, action: &ReviewAction) -> Result<(), StoreError> {
        self.actions.write().await.push(action.clone());
        Ok(())
    }

    async fn actions_for_item(&self, item_id: Uuid) -> Result<Vec<ReviewAction>, StoreError> {
        let actions = self.actions.read().await;
        let mut found: Vec<ReviewAction> = actions
            .iter()
            .filter(|a| a.pending_item_id == item_id)
            .cloned()
            .collect();
        found.sort_by_key(|a| a.created_at);
        Ok(found)
    }

    async fn recent_actions(&self, limit: usize) -> Result<Vec<ReviewAction>, StoreError> {
        let actions = self.actions.read().await;
        let mut all: Vec<ReviewAction> = actions.iter().cloned().collect();
        all.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        all.truncate(limit);
        Ok(all)
    }

    async fn upsert_counselor(&self, counselor: &Counselor) -> Result<(), StoreError> {
        let mut counselors = self.counselors.write().await;
        counselors.insert(counselor.id.clone(), counselor.clone());
        Ok(())
    }

    async fn get_counselor(&self, id: &str) -> Result<Option<Counselor>, StoreError> {
        Ok(self.counselors.read().await.get(id).cloned())
    }

    async fn available_counselors(&self, org_id: &str) -> Result<Vec<Counselor>, StoreError> {
        let counselors = self.counselors.read().await;
        let mut found: Vec<Counselor> = counselors
            .values()
            .filter(|c| c.is_available && c.organization_id == org_id)
            .cloned()
            .collect();
        found.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(found)
    }

    async fn counselor_load(&self, counselor_id: &str) -> Result<usize, StoreError> {
        let items = self.items.read().await;
        Ok(items
            .values()
            .filter(|i| {
                i.status == ReviewStatus::Pending
                    && i.assigned_counselor_id.as_deref() == Some(counselor_id)
            })
            .count())
    }
}
