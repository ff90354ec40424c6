//! Glucose store facade
//!
//! Query API over the reconciler, the remote store and the analytics
//! functions. Every read path goes through [`read_with_fallback`].

use std::fmt::Write as _;
use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::broadcast;
use tracing::{info, warn};

use crate::analytics;
use crate::cache::{LocalCache, SampleQuery};
use crate::config::{Config, RetentionConfig, SharedRetention};
use crate::error::StoreError;
use crate::events::{CacheChanged, ChangeNotifier};
use crate::model::{EffectPoint, SampleId, SampleRecord, VelocityPoint};
use crate::remote::RemoteStoreClient;
use crate::sync::ReconcilerHandle;

/// Which tier answered a read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    Remote,
    Cache,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TierRead<T> {
    pub value: T,
    pub tier: Tier,
}

/// Try `primary`, then `fallback` if it fails. `fallback` is not polled
/// unless needed.
pub async fn read_with_fallback<T, P, F>(
    primary: (Tier, P),
    fallback: (Tier, F),
) -> Result<TierRead<T>, StoreError>
where
    P: Future<Output = Result<T, StoreError>>,
    F: Future<Output = Result<T, StoreError>>,
{
    let (tier, first) = primary;
    match first.await {
        Ok(value) => Ok(TierRead { value, tier }),
        Err(e) => {
            warn!(tier = ?tier, error = %e, "Read failed, trying fallback tier");
            let (tier, second) = fallback;
            let value = second.await?;
            Ok(TierRead { value, tier })
        }
    }
}

pub struct GlucoseStore {
    reconciler: ReconcilerHandle,
    remote: Arc<dyn RemoteStoreClient>,
    retention: SharedRetention,
    notifier: Arc<ChangeNotifier>,
    provenance: String,
}

impl GlucoseStore {
    /// Open the cache at the configured path and start reconciling
    pub async fn open(config: &Config, remote: Arc<dyn RemoteStoreClient>) -> Result<Self, StoreError> {
        let retention = config.retention()?;
        let cache = LocalCache::open(&config.cache.path)?;
        Self::start(cache, remote, config, retention).await
    }

    /// Start over an already-open cache. Fails if the retention settings are
    /// out of range.
    pub async fn with_cache(
        cache: LocalCache,
        remote: Arc<dyn RemoteStoreClient>,
        config: &Config,
    ) -> Result<Self, StoreError> {
        let retention = config.retention()?;
        Self::start(cache, remote, config, retention).await
    }

    async fn start(
        cache: LocalCache,
        remote: Arc<dyn RemoteStoreClient>,
        config: &Config,
        retention: RetentionConfig,
    ) -> Result<Self, StoreError> {
        let retention = SharedRetention::new(retention);
        let notifier = Arc::new(ChangeNotifier::with_capacity(config.notifier.capacity));
        let provenance = config.source.provenance.clone();

        let reconciler = ReconcilerHandle::start(
            cache,
            Arc::clone(&remote),
            retention.clone(),
            provenance.clone(),
            Arc::clone(&notifier),
        )
        .await;

        info!(provenance = %provenance, "Glucose store ready");
        Ok(Self {
            reconciler,
            remote,
            retention,
            notifier,
            provenance,
        })
    }

    pub fn reconciler(&self) -> &ReconcilerHandle {
        &self.reconciler
    }

    pub fn provenance(&self) -> &str {
        &self.provenance
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CacheChanged> {
        self.notifier.subscribe()
    }

    pub fn retention(&self) -> Arc<RetentionConfig> {
        self.retention.load()
    }

    /// Replace the retention windows. Takes effect at the next purge.
    pub fn set_retention(&self, retention: RetentionConfig) {
        info!(
            cache_length_secs = retention.cache_length().num_seconds(),
            momentum_window_secs = retention.momentum_window().num_seconds(),
            "Retention updated"
        );
        self.retention.store(retention);
    }

    /// Oldest start time the cache is expected to hold
    pub fn earliest_cache_date(&self) -> DateTime<Utc> {
        Utc::now() - self.retention.load().cache_length()
    }

    async fn query_remote(
        &self,
        start: DateTime<Utc>,
        end: Option<DateTime<Utc>>,
    ) -> Result<Vec<SampleRecord>, StoreError> {
        Ok(self.remote.query(start, end).await?)
    }

    async fn query_cache(
        &self,
        start: DateTime<Utc>,
        end: Option<DateTime<Utc>>,
    ) -> Result<Vec<SampleRecord>, StoreError> {
        self.reconciler.fetch(SampleQuery::range(start, end)).await
    }

    /// Authoritative read: remote first, cache on remote failure
    pub async fn get_values(
        &self,
        start: DateTime<Utc>,
        end: Option<DateTime<Utc>>,
    ) -> Result<TierRead<Vec<SampleRecord>>, StoreError> {
        read_with_fallback(
            (Tier::Remote, self.query_remote(start, end)),
            (Tier::Cache, self.query_cache(start, end)),
        )
        .await
    }

    /// Cache first when the cache window covers `start`, otherwise remote
    /// first. Either way the other tier is the fallback.
    pub async fn get_cached_values(
        &self,
        start: DateTime<Utc>,
        end: Option<DateTime<Utc>>,
    ) -> Result<TierRead<Vec<SampleRecord>>, StoreError> {
        if start >= self.earliest_cache_date() {
            read_with_fallback(
                (Tier::Cache, self.query_cache(start, end)),
                (Tier::Remote, self.query_remote(start, end)),
            )
            .await
        } else {
            read_with_fallback(
                (Tier::Remote, self.query_remote(start, end)),
                (Tier::Cache, self.query_cache(start, end)),
            )
            .await
        }
    }

    pub fn get_latest(&self) -> Option<SampleRecord> {
        self.reconciler.latest()
    }

    pub async fn add_records(&self, records: Vec<SampleRecord>) -> Result<Vec<SampleRecord>, StoreError> {
        self.reconciler.submit_new_records(records).await
    }

    /// Mirror a batch delivered out-of-band (the feed is applied automatically)
    pub async fn apply_remote_changes(
        &self,
        added: Vec<SampleRecord>,
        deleted: Vec<SampleId>,
    ) -> Result<bool, StoreError> {
        self.reconciler.apply_remote_changes(added, deleted).await
    }

    /// Run a retention cycle now. Emits a `Purge` notification when local
    /// rows were removed.
    pub async fn purge(&self) -> Result<usize, StoreError> {
        self.reconciler.purge().await
    }

    /// Samples for analytics; read failures degrade to an empty window
    async fn analytics_window(&self, start: DateTime<Utc>, end: Option<DateTime<Utc>>) -> Vec<SampleRecord> {
        match self.get_cached_values(start, end).await {
            Ok(read) => read.value,
            Err(e) => {
                warn!(error = %e, "No samples available for analytics");
                Vec::new()
            }
        }
    }

    /// Linear projection of the last momentum window
    pub async fn get_momentum_effect(&self) -> Vec<EffectPoint> {
        let window = self.retention.load().momentum_window();
        let samples = self.analytics_window(Utc::now() - window, None).await;
        analytics::momentum_effect(&samples, window, analytics::momentum_delta())
    }

    pub async fn get_change(
        &self,
        start: DateTime<Utc>,
        end: Option<DateTime<Utc>>,
    ) -> Option<(SampleRecord, SampleRecord)> {
        let samples = self.analytics_window(start, end).await;
        analytics::recent_change(&samples)
    }

    pub async fn get_counteraction_effects(
        &self,
        start: DateTime<Utc>,
        end: Option<DateTime<Utc>>,
        effects: &[EffectPoint],
    ) -> Vec<VelocityPoint> {
        let samples = self.analytics_window(start, end).await;
        analytics::counteraction_effects(&samples, effects)
    }

    /// Human-readable snapshot of configuration and cache contents.
    ///
    /// Cache rows are read in a single worker task; formatting happens here.
    pub async fn diagnostic_report(&self) -> Result<String, StoreError> {
        let samples = self.reconciler.fetch(SampleQuery::all()).await?;
        let retention = self.retention.load();
        let latest = self.get_latest();

        let mut report = String::new();
        let _ = writeln!(report, "## GlucoseStore");
        let _ = writeln!(report);
        let _ = writeln!(report, "* provenance: {}", self.provenance);
        let _ = writeln!(report, "* cacheLength: {}s", retention.cache_length().num_seconds());
        let _ = writeln!(report, "* momentumWindow: {}s", retention.momentum_window().num_seconds());
        let _ = writeln!(
            report,
            "* managedInterval: {}",
            retention
                .managed_interval()
                .map_or_else(|| "disabled".to_string(), |d| format!("{}s", d.num_seconds()))
        );
        let _ = writeln!(report, "* maxPurgeInterval: {}s", retention.max_purge_interval().num_seconds());
        let _ = writeln!(report, "* subscribers: {}", self.notifier.subscriber_count());
        let _ = writeln!(
            report,
            "* latest: {}",
            latest.map_or_else(
                || "none".to_string(),
                |s| format!("{} {} @ {}", s.id, s.quantity, s.start.to_rfc3339())
            )
        );
        let _ = writeln!(report);
        let _ = writeln!(report, "### cachedSamples ({})", samples.len());
        let _ = writeln!(report);
        let _ = writeln!(report, "| id | start | value | provenance | displayOnly |");
        let _ = writeln!(report, "|----|-------|-------|------------|-------------|");
        for s in &samples {
            let _ = writeln!(
                report,
                "| {} | {} | {} | {} | {} |",
                s.id,
                s.start.to_rfc3339(),
                s.quantity,
                s.provenance,
                s.is_display_only
            );
        }
        Ok(report)
    }
}
