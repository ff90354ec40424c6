//! In-process remote store
//!
//! Keeps records in memory, advances an anchor on every change and pushes
//! batches to subscribers. Failures can be injected to exercise the
//! unavailable / rejected paths.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, trace};

use super::{ChangeBatch, DeletePredicate, RemoteStoreClient};
use crate::error::RemoteError;
use crate::model::{SampleId, SampleRecord};

#[derive(Default)]
struct Inner {
    records: BTreeMap<SampleId, SampleRecord>,
    anchor: u64,
    subscribers: Vec<mpsc::UnboundedSender<ChangeBatch>>,
    /// Error returned by every call while set
    unavailable: Option<RemoteError>,
    /// Error returned by the next `add` only
    fail_next_add: Option<RemoteError>,
    delete_requests: Vec<DeletePredicate>,
}

impl Inner {
    fn publish(&mut self, added: Vec<SampleRecord>, deleted: Vec<SampleId>) {
        if added.is_empty() && deleted.is_empty() {
            return;
        }
        self.anchor += 1;
        let batch = ChangeBatch {
            added,
            deleted,
            error: None,
            anchor: self.anchor,
        };
        trace!(anchor = self.anchor, "Publishing change batch");
        self.subscribers.retain(|tx| tx.send(batch.clone()).is_ok());
    }

    fn check_available(&self) -> Result<(), RemoteError> {
        match &self.unavailable {
            Some(e) => Err(e.clone()),
            None => Ok(()),
        }
    }
}

#[derive(Default)]
pub struct MemoryRemoteStore {
    inner: Mutex<Inner>,
}

impl MemoryRemoteStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every call fail with `error` until cleared with `None`
    pub async fn set_unavailable(&self, error: Option<RemoteError>) {
        self.inner.lock().await.unavailable = error;
    }

    pub async fn fail_next_add(&self, error: RemoteError) {
        self.inner.lock().await.fail_next_add = Some(error);
    }

    /// Changes made by another writer, delivered through the feed
    pub async fn external_change(&self, added: Vec<SampleRecord>, deleted: Vec<SampleId>) {
        let mut inner = self.inner.lock().await;
        let mut fresh = Vec::new();
        for record in added {
            if !inner.records.contains_key(&record.id) {
                inner.records.insert(record.id.clone(), record.clone());
                fresh.push(record);
            }
        }
        let mut gone = Vec::new();
        for id in deleted {
            if inner.records.remove(&id).is_some() {
                gone.push(id);
            }
        }
        inner.publish(fresh, gone);
    }

    /// Deliver a raw batch without touching stored records
    pub async fn push_batch(&self, batch: ChangeBatch) {
        let inner = self.inner.lock().await;
        for tx in &inner.subscribers {
            let _ = tx.send(batch.clone());
        }
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.records.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub async fn contains(&self, id: &SampleId) -> bool {
        self.inner.lock().await.records.contains_key(id)
    }

    pub async fn anchor(&self) -> u64 {
        self.inner.lock().await.anchor
    }

    /// Delete predicates received so far, successful or not
    pub async fn delete_requests(&self) -> Vec<DeletePredicate> {
        self.inner.lock().await.delete_requests.clone()
    }
}

#[async_trait]
impl RemoteStoreClient for MemoryRemoteStore {
    async fn add(&self, records: &[SampleRecord]) -> Result<bool, RemoteError> {
        let mut inner = self.inner.lock().await;
        inner.check_available()?;
        if let Some(e) = inner.fail_next_add.take() {
            return Err(e);
        }

        let mut fresh = Vec::new();
        for record in records {
            if !inner.records.contains_key(&record.id) {
                inner.records.insert(record.id.clone(), record.clone());
                fresh.push(record.clone());
            }
        }
        debug!(requested = records.len(), stored = fresh.len(), "Remote add");
        inner.publish(fresh, Vec::new());
        Ok(true)
    }

    async fn query(
        &self,
        start: DateTime<Utc>,
        end: Option<DateTime<Utc>>,
    ) -> Result<Vec<SampleRecord>, RemoteError> {
        let inner = self.inner.lock().await;
        inner.check_available()?;
        let mut results: Vec<SampleRecord> = inner
            .records
            .values()
            .filter(|r| r.start >= start && end.map_or(true, |end| r.start <= end))
            .cloned()
            .collect();
        results.sort_by(|a, b| a.start.cmp(&b.start).then_with(|| a.id.cmp(&b.id)));
        Ok(results)
    }

    async fn delete_matching(&self, predicate: &DeletePredicate) -> Result<u64, RemoteError> {
        let mut inner = self.inner.lock().await;
        inner.delete_requests.push(predicate.clone());
        inner.check_available()?;

        let doomed: Vec<SampleId> = inner
            .records
            .values()
            .filter(|r| predicate.matches(r))
            .map(|r| r.id.clone())
            .collect();
        for id in &doomed {
            inner.records.remove(id);
        }
        debug!(removed = doomed.len(), "Remote delete");
        let removed = doomed.len() as u64;
        inner.publish(Vec::new(), doomed);
        Ok(removed)
    }

    async fn subscribe(&self) -> mpsc::UnboundedReceiver<ChangeBatch> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.inner.lock().await.subscribers.push(tx);
        rx
    }
}
