//! Queue metrics — counts and review-duration aggregates for dashboards.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use crate::error::StoreError;
use crate::review::model::Priority;
use crate::store::ReviewStore;

/// How many recent actions feed the average-duration figure.
const DURATION_SAMPLE: usize = 200;

/// Point-in-time view of the review queue.
#[derive(Debug, Clone, Serialize)]
pub struct QueueSnapshot {
    /// When the snapshot was taken.
    pub taken_at: DateTime<Utc>,
    /// Pending items per priority.
    pub pending_urgent: usize,
    pub pending_high: usize,
    pub pending_normal: usize,
    /// Pending items past their deadline.
    pub overdue: usize,
    /// Pending items with no assigned counselor.
    pub unassigned: usize,
    /// Pending load per counselor.
    pub counselor_load: HashMap<String, usize>,
    /// Mean seconds from creation to resolution over recent actions,
    /// `None` when nothing has been resolved yet.
    pub avg_review_duration_seconds: Option<f64>,
}

/// Computes queue snapshots from the store.
pub struct QueueMetrics {
    store: Arc<dyn ReviewStore>,
}

impl QueueMetrics {
    pub fn new(store: Arc<dyn ReviewStore>) -> Self {
        Self { store }
    }

    /// Take a snapshot at `now`.
    pub async fn snapshot(&self, now: DateTime<Utc>) -> Result<QueueSnapshot, StoreError> {
        let pending = self.store.pending_items().await?;

        let mut by_priority: HashMap<Priority, usize> = HashMap::new();
        let mut counselor_load: HashMap<String, usize> = HashMap::new();
        let mut overdue = 0;
        let mut unassigned = 0;

        for item in &pending {
            *by_priority.entry(item.priority).or_default() += 1;
            if item.is_overdue(now) {
                overdue += 1;
            }
            match &item.assigned_counselor_id {
                Some(id) => *counselor_load.entry(id.clone()).or_default() += 1,
                None => unassigned += 1,
            }
        }

        let recent = self.store.recent_actions(DURATION_SAMPLE).await?;
        let resolutions: Vec<i64> = recent
            .iter()
            .filter(|a| a.final_reply.is_some())
            .map(|a| a.review_duration_seconds)
            .collect();
        let avg_review_duration_seconds = if resolutions.is_empty() {
            None
        } else {
            Some(resolutions.iter().sum::<i64>() as f64 / resolutions.len() as f64)
        };

        let snapshot = QueueSnapshot {
            taken_at: now,
            pending_urgent: by_priority.get(&Priority::Urgent).copied().unwrap_or(0),
            pending_high: by_priority.get(&Priority::High).copied().unwrap_or(0),
            pending_normal: by_priority.get(&Priority::Normal).copied().unwrap_or(0),
            overdue,
            unassigned,
            counselor_load,
            avg_review_duration_seconds,
        };

        info!(
            urgent = snapshot.pending_urgent,
            high = snapshot.pending_high,
            normal = snapshot.pending_normal,
            overdue = snapshot.overdue,
            unassigned = snapshot.unassigned,
            "Queue snapshot"
        );
        Ok(snapshot)
    }
}
