//! Reconciler - the single writer of the local cache
//!
//! A worker owns the [`LocalCache`] and executes commands one at a time in
//! submission order. Each mutating command settles before the next begins:
//! apply batch, purge, refresh latest, notify. Remote calls never run on the
//! worker; their results are sent back to it as new commands.

use std::sync::Arc;

use chrono::Utc;
use tokio::runtime::Handle;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

use super::latest::LatestValueTracker;
use super::purge::PurgeScheduler;
use crate::cache::{BatchOutcome, CacheStats, LocalCache, SampleQuery};
use crate::config::SharedRetention;
use crate::error::{CacheError, RemoteError, StoreError};
use crate::events::{CacheChanged, ChangeNotifier, ChangeSource};
use crate::model::{SampleId, SampleRecord};
use crate::remote::{ChangeBatch, RemoteStoreClient};

enum Command {
    ApplyRemote {
        added: Vec<SampleRecord>,
        deleted: Vec<SampleId>,
        reply: Option<oneshot::Sender<bool>>,
    },
    ApplyLocalWrite {
        records: Vec<SampleRecord>,
        reply: oneshot::Sender<()>,
    },
    Fetch {
        query: SampleQuery,
        reply: oneshot::Sender<Result<Vec<SampleRecord>, CacheError>>,
    },
    Stats {
        reply: oneshot::Sender<Result<CacheStats, CacheError>>,
    },
    Purge {
        reply: oneshot::Sender<usize>,
    },
}

/// Worker state. Lives on the worker task only.
struct Reconciler {
    cache: LocalCache,
    purge: PurgeScheduler,
    latest: LatestValueTracker,
    notifier: Arc<ChangeNotifier>,
    runtime: Handle,
}

impl Reconciler {
    async fn run(mut self, mut commands: mpsc::UnboundedReceiver<Command>) {
        self.latest.refresh(&self.cache);
        info!("Reconciler started");

        // Cache I/O is synchronous and holds the queue, never the caller
        while let Some(command) = commands.recv().await {
            self.handle(command);
        }

        info!("Reconciler stopped");
    }

    fn handle(&mut self, command: Command) {
        match command {
            Command::ApplyRemote { added, deleted, reply } => {
                let changed = self.apply_remote(&added, &deleted);
                if let Some(reply) = reply {
                    let _ = reply.send(changed);
                }
            }
            Command::ApplyLocalWrite { records, reply } => {
                self.apply_local_write(&records);
                let _ = reply.send(());
            }
            Command::Fetch { query, reply } => {
                let _ = reply.send(self.cache.fetch(&query));
            }
            Command::Stats { reply } => {
                let _ = reply.send(self.cache.stats());
            }
            Command::Purge { reply } => {
                let purged = self.purge_now();
                let _ = reply.send(purged);
            }
        }
    }

    /// Returns whether the cache changed. No-op batches settle nothing and
    /// fire no notification.
    fn apply_remote(&mut self, added: &[SampleRecord], deleted: &[SampleId]) -> bool {
        let outcome = match self.cache.apply(added, deleted) {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(error = %e, added = added.len(), deleted = deleted.len(), "Failed to apply remote changes");
                return false;
            }
        };

        if !outcome.changed() {
            debug!(added = added.len(), deleted = deleted.len(), "Remote batch was a no-op");
            return false;
        }

        self.settle(ChangeSource::RemoteSync, &outcome);
        true
    }

    /// Mirror records the remote store has already accepted. Always settles:
    /// the caller is owed a confirmation even if nothing was new.
    fn apply_local_write(&mut self, records: &[SampleRecord]) {
        let outcome = match self.cache.apply(records, &[]) {
            Ok(outcome) => outcome,
            Err(e) => {
                // The remote write stands; the next sync pass repairs the cache
                error!(error = %e, records = records.len(), "Failed to cache confirmed samples");
                BatchOutcome::default()
            }
        };
        self.settle(ChangeSource::LocalWrite, &outcome);
    }

    /// Purge outside of a mutation; notifies only when rows were removed
    fn purge_now(&mut self) -> usize {
        let (purged, _) = self.purge.run_cycle(&mut self.cache, &self.runtime, Utc::now());
        self.latest.refresh(&self.cache);
        if purged > 0 {
            self.notifier.emit(CacheChanged {
                source: ChangeSource::Purge,
                inserted: 0,
                deleted: 0,
                purged,
            });
        }
        purged
    }

    fn settle(&mut self, source: ChangeSource, outcome: &BatchOutcome) {
        let (purged, _) = self.purge.run_cycle(&mut self.cache, &self.runtime, Utc::now());
        self.latest.refresh(&self.cache);
        self.notifier.emit(CacheChanged {
            source,
            inserted: outcome.inserted.len(),
            deleted: outcome.deleted,
            purged,
        });
    }
}

/// Cloneable front door to the reconciler worker
#[derive(Clone)]
pub struct ReconcilerHandle {
    commands: mpsc::UnboundedSender<Command>,
    remote: Arc<dyn RemoteStoreClient>,
    latest: LatestValueTracker,
}

impl ReconcilerHandle {
    /// Start the worker and subscribe it to the remote change feed.
    ///
    /// Must be called from within a tokio runtime.
    pub async fn start(
        cache: LocalCache,
        remote: Arc<dyn RemoteStoreClient>,
        retention: SharedRetention,
        provenance: impl Into<String>,
        notifier: Arc<ChangeNotifier>,
    ) -> Self {
        let runtime = Handle::current();
        let latest = LatestValueTracker::new();
        let (tx, rx) = mpsc::unbounded_channel();

        let worker = Reconciler {
            cache,
            purge: PurgeScheduler::new(retention, Arc::clone(&remote), provenance),
            latest: latest.clone(),
            notifier,
            runtime: runtime.clone(),
        };
        runtime.spawn(worker.run(rx));

        let feed = remote.subscribe().await;
        runtime.spawn(pump_changes(feed, tx.clone()));

        Self {
            commands: tx,
            remote,
            latest,
        }
    }

    fn send(&self, command: Command) -> Result<(), StoreError> {
        self.commands.send(command).map_err(|_| StoreError::Closed)
    }

    /// Insert absent records and delete present ids as one batch.
    /// Returns whether anything changed.
    pub async fn apply_remote_changes(
        &self,
        added: Vec<SampleRecord>,
        deleted: Vec<SampleId>,
    ) -> Result<bool, StoreError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::ApplyRemote {
            added,
            deleted,
            reply: Some(reply),
        })?;
        rx.await.map_err(|_| StoreError::Closed)
    }

    /// Write to the remote store, then mirror into the cache.
    ///
    /// A remote failure leaves the cache untouched. A cache failure after a
    /// successful remote write is logged, not returned.
    pub async fn submit_new_records(
        &self,
        records: Vec<SampleRecord>,
    ) -> Result<Vec<SampleRecord>, StoreError> {
        if records.is_empty() {
            return Ok(records);
        }

        let stored = self.remote.add(&records).await.map_err(|e| {
            warn!(error = %e, records = records.len(), "Remote write failed");
            e
        })?;
        if !stored {
            return Err(RemoteError::Rejected("remote store declined the write".into()).into());
        }

        let (reply, rx) = oneshot::channel();
        self.send(Command::ApplyLocalWrite {
            records: records.clone(),
            reply,
        })?;
        rx.await.map_err(|_| StoreError::Closed)?;
        Ok(records)
    }

    pub async fn fetch(&self, query: SampleQuery) -> Result<Vec<SampleRecord>, StoreError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Fetch { query, reply })?;
        Ok(rx.await.map_err(|_| StoreError::Closed)??)
    }

    pub async fn stats(&self) -> Result<CacheStats, StoreError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Stats { reply })?;
        Ok(rx.await.map_err(|_| StoreError::Closed)??)
    }

    /// Run a purge cycle outside of any mutation; returns rows purged locally
    pub async fn purge(&self) -> Result<usize, StoreError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Purge { reply })?;
        rx.await.map_err(|_| StoreError::Closed)
    }

    pub fn latest(&self) -> Option<SampleRecord> {
        self.latest.get()
    }
}

/// Forward change-feed batches to the worker until either side goes away
async fn pump_changes(
    mut feed: mpsc::UnboundedReceiver<ChangeBatch>,
    commands: mpsc::UnboundedSender<Command>,
) {
    while let Some(batch) = feed.recv().await {
        if let Some(e) = batch.error {
            if e.is_transient() {
                debug!(error = %e, "Change feed temporarily unavailable");
            } else {
                warn!(error = %e, "Change feed reported an error");
            }
            continue;
        }
        if batch.is_empty() {
            continue;
        }

        debug!(
            anchor = batch.anchor,
            added = batch.added.len(),
            deleted = batch.deleted.len(),
            "Received remote changes"
        );
        let command = Command::ApplyRemote {
            added: batch.added,
            deleted: batch.deleted,
            reply: None,
        };
        if commands.send(command).is_err() {
            break;
        }
    }
    debug!("Change feed closed");
}
