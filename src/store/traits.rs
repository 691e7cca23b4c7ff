//! `ReviewStore` trait — single async interface for all pipeline persistence.
//!
//! The surrounding application owns the real database; this trait is the
//! narrow slice of it the pipeline consumes. `MemoryStore` is the
//! reference backend and the test double.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::StoreError;
use crate::review::model::{Counselor, PendingItem, Priority, ReviewAction, ReviewStatus};

/// Backend-agnostic persistence covering pending items, the audit trail,
/// and counselor reads.
#[async_trait]
pub trait ReviewStore: Send + Sync {
    // ── Pending items ───────────────────────────────────────────────

    /// Insert a new pending item.
    async fn insert_item(&self, item: &PendingItem) -> Result<(), StoreError>;

    /// Get an item by ID.
    async fn get_item(&self, id: Uuid) -> Result<Option<PendingItem>, StoreError>;

    /// Write back an item, succeeding only if the stored version still
    /// equals `expected_version`. The stored copy gets `version + 1`.
    ///
    /// This is the per-item mutual exclusion: a counselor action and a
    /// concurrent auto-approval cannot both win.
    async fn update_item(
        &self,
        item: &PendingItem,
        expected_version: u64,
    ) -> Result<PendingItem, StoreError>;

    /// All items assigned to a counselor with the given status.
    async fn items_for_counselor(
        &self,
        counselor_id: &str,
        status: ReviewStatus,
    ) -> Result<Vec<PendingItem>, StoreError>;

    /// All items for an organization with the given status, optionally
    /// filtered by priority.
    async fn items_for_organization(
        &self,
        org_id: &str,
        status: ReviewStatus,
        priority: Option<Priority>,
    ) -> Result<Vec<PendingItem>, StoreError>;

    /// Pending items past their deadline at `now`.
    async fn expired_items(&self, now: DateTime<Utc>) -> Result<Vec<PendingItem>, StoreError>;

    /// Pending items with no assigned counselor, optionally scoped to an
    /// organization.
    async fn unassigned_items(
        &self,
        org_id: Option<&str>,
    ) -> Result<Vec<PendingItem>, StoreError>;

    /// All currently pending items (metrics surface).
    async fn pending_items(&self) -> Result<Vec<PendingItem>, StoreError>;

    /// The pending item already held for this message ID, if any. At most
    /// one exists at a time: intake consults this before creating another.
    async fn pending_for_message(
        &self,
        message_id: &str,
    ) -> Result<Option<PendingItem>, StoreError>;

    // ── Audit trail ─────────────────────────────────────────────────

    /// Append a review action. Actions are never updated or deleted.
    async fn append_action(&self, action: &ReviewAction) -> Result<(), StoreError>;

    /// Audit trail for one item, oldest first.
    async fn actions_for_item(&self, item_id: Uuid) -> Result<Vec<ReviewAction>, StoreError>;

    /// Most recent actions across all items, newest first, up to `limit`.
    async fn recent_actions(&self, limit: usize) -> Result<Vec<ReviewAction>, StoreError>;

    // ── Counselors ──────────────────────────────────────────────────

    /// Insert or replace a counselor record (written by admin tooling).
    async fn upsert_counselor(&self, counselor: &Counselor) -> Result<(), StoreError>;

    /// Get a counselor by ID.
    async fn get_counselor(&self, id: &str) -> Result<Option<Counselor>, StoreError>;

    /// Available counselors for an organization, id ascending.
    async fn available_counselors(&self, org_id: &str) -> Result<Vec<Counselor>, StoreError>;

    /// Current load: count of pending items assigned to this counselor.
    async fn counselor_load(&self, counselor_id: &str) -> Result<usize, StoreError>;
}
