//! Remote store boundary
//!
//! The remote store is authoritative and may be unavailable at any moment.
//! Implementations own their change-feed cursor; consumers only see the
//! batches they deliver.

pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::error::RemoteError;
use crate::model::{SampleId, SampleRecord};

pub use memory::MemoryRemoteStore;

/// One delivery from the change feed
#[derive(Debug, Clone, Default)]
pub struct ChangeBatch {
    pub added: Vec<SampleRecord>,
    pub deleted: Vec<SampleId>,
    /// Feed-level failure; the batch carries no usable changes when set
    pub error: Option<RemoteError>,
    /// Cursor position after this batch, as reported by the store
    pub anchor: u64,
}

impl ChangeBatch {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.deleted.is_empty()
    }
}

/// Delete predicate: `from <= start < before`, optionally restricted to one
/// provenance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeletePredicate {
    pub from: DateTime<Utc>,
    pub before: DateTime<Utc>,
    pub provenance: Option<String>,
}

impl DeletePredicate {
    pub fn matches(&self, record: &SampleRecord) -> bool {
        record.start >= self.from
            && record.start < self.before
            && self
                .provenance
                .as_deref()
                .map_or(true, |p| p == record.provenance)
    }
}

/// Capability the store consumes from the authoritative backend
#[async_trait]
pub trait RemoteStoreClient: Send + Sync {
    /// Persist records. `Ok(false)` means the store declined without error.
    async fn add(&self, records: &[SampleRecord]) -> Result<bool, RemoteError>;

    /// Records with `start <= sample.start <= end`, ascending
    async fn query(
        &self,
        start: DateTime<Utc>,
        end: Option<DateTime<Utc>>,
    ) -> Result<Vec<SampleRecord>, RemoteError>;

    /// Delete every record matching the predicate; returns the count removed
    async fn delete_matching(&self, predicate: &DeletePredicate) -> Result<u64, RemoteError>;

    /// Open the change feed. Each subscriber sees every batch from the point
    /// it subscribed.
    async fn subscribe(&self) -> mpsc::UnboundedReceiver<ChangeBatch>;
}
