//! Retention purge for both tiers
//!
//! Local purge is synchronous and runs on the reconciler worker. Remote purge
//! is best-effort and runs detached; its failures never touch the cache.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::cache::LocalCache;
use crate::config::SharedRetention;
use crate::error::CacheError;
use crate::remote::{DeletePredicate, RemoteStoreClient};

pub struct PurgeScheduler {
    retention: SharedRetention,
    remote: Arc<dyn RemoteStoreClient>,
    /// Only records of our own provenance are purged remotely
    provenance: String,
}

impl PurgeScheduler {
    pub fn new(
        retention: SharedRetention,
        remote: Arc<dyn RemoteStoreClient>,
        provenance: impl Into<String>,
    ) -> Self {
        Self {
            retention,
            remote,
            provenance: provenance.into(),
        }
    }

    /// Drop cached samples with `start < now - cache_length`
    pub fn purge_local(&self, cache: &mut LocalCache, now: DateTime<Utc>) -> Result<usize, CacheError> {
        let cutoff = before(now, self.retention.load().cache_length());
        cache.purge_before(cutoff)
    }

    /// `[now - max_purge_interval, now - managed_interval)` for our provenance,
    /// or `None` when remote purge is disabled
    pub fn remote_predicate(&self, now: DateTime<Utc>) -> Option<DeletePredicate> {
        let retention = self.retention.load();
        let managed = retention.managed_interval()?;
        Some(DeletePredicate {
            from: before(now, retention.max_purge_interval()),
            before: before(now, managed),
            provenance: Some(self.provenance.clone()),
        })
    }

    /// Fire the remote delete. Transient failures are logged and dropped.
    pub fn spawn_remote_purge(&self, runtime: &Handle, now: DateTime<Utc>) -> Option<JoinHandle<()>> {
        let predicate = self.remote_predicate(now)?;
        let remote = Arc::clone(&self.remote);

        Some(runtime.spawn(async move {
            match remote.delete_matching(&predicate).await {
                Ok(removed) => {
                    if removed > 0 {
                        info!(removed, "Purged managed samples from remote store");
                    }
                }
                Err(e) if e.is_transient() => {
                    debug!(error = %e, "Remote purge skipped");
                }
                Err(e) => {
                    warn!(error = %e, "Remote purge failed");
                }
            }
        }))
    }

    /// Local purge, then remote purge. Local failures are logged and count as
    /// nothing removed.
    pub fn run_cycle(
        &self,
        cache: &mut LocalCache,
        runtime: &Handle,
        now: DateTime<Utc>,
    ) -> (usize, Option<JoinHandle<()>>) {
        let purged = match self.purge_local(cache, now) {
            Ok(n) => n,
            Err(e) => {
                warn!(error = %e, "Local purge failed");
                0
            }
        };
        let remote = self.spawn_remote_purge(runtime, now);
        (purged, remote)
    }
}

/// `now - window`, saturating at the earliest representable instant
fn before(now: DateTime<Utc>, window: Duration) -> DateTime<Utc> {
    now.checked_sub_signed(window).unwrap_or(DateTime::<Utc>::MIN_UTC)
}
