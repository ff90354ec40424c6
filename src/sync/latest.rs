//! Most-recent sample tracker
//!
//! A single cached slot, recomputed from the cache after each mutation cycle.
//! Only the reconciler worker writes it; anyone may read.

use std::sync::{Arc, RwLock};

use tracing::{trace, warn};

use crate::cache::LocalCache;
use crate::model::SampleRecord;

#[derive(Debug, Clone, Default)]
pub struct LatestValueTracker {
    slot: Arc<RwLock<Option<SampleRecord>>>,
}

impl LatestValueTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached latest sample; `None` when the cache is empty
    pub fn get(&self) -> Option<SampleRecord> {
        match self.slot.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Recompute from the cache. On read failure the previous value is kept.
    pub(crate) fn refresh(&self, cache: &LocalCache) {
        match cache.latest() {
            Ok(latest) => {
                trace!(id = ?latest.as_ref().map(|s| s.id.as_str()), "Latest sample refreshed");
                self.set(latest);
            }
            Err(e) => warn!(error = %e, "Failed to refresh latest sample"),
        }
    }

    fn set(&self, value: Option<SampleRecord>) {
        match self.slot.write() {
            Ok(mut guard) => *guard = value,
            Err(poisoned) => *poisoned.into_inner() = value,
        }
    }
}
