//! Assignment policy — picks the least-loaded available counselor.
//!
//! Selection only; the caller performs the actual write. Load is
//! read-then-write, so concurrent enqueues can briefly exceed
//! `max_concurrent_cases` (soft limit).

use std::sync::Arc;

use tracing::debug;

use crate::error::StoreError;
use crate::store::ReviewStore;

/// Chooses a counselor for a newly-held item.
pub struct AssignmentPolicy {
    store: Arc<dyn ReviewStore>,
}

impl AssignmentPolicy {
    pub fn new(store: Arc<dyn ReviewStore>) -> Self {
        Self { store }
    }

    /// Pick the available counselor in `org_id` with the strictly lowest
    /// current load, under capacity. Ties break by counselor id ascending
    /// (the store returns them sorted), keeping assignment deterministic.
    ///
    /// Returns `None` when nobody qualifies — the caller queues the item
    /// unassigned or escalates, depending on priority.
    pub async fn assign(&self, org_id: &str) -> Result<Option<String>, StoreError> {
        let candidates = self.store.available_counselors(org_id).await?;

        let mut best: Option<(String, usize)> = None;
        for counselor in candidates {
            let load = self.store.counselor_load(&counselor.id).await?;
            if load >= counselor.max_concurrent_cases {
                debug!(
                    counselor_id = %counselor.id,
                    load,
                    max = counselor.max_concurrent_cases,
                    "Counselor at capacity, skipping"
                );
                continue;
            }
            match &best {
                Some((_, best_load)) if load >= *best_load => {}
                _ => best = Some((counselor.id, load)),
            }
        }

        if let Some((ref id, load)) = best {
            debug!(counselor_id = %id, load, org_id, "Selected counselor");
        } else {
            debug!(org_id, "No counselor under capacity");
        }

        Ok(best.map(|(id, _)| id))
    }
}
