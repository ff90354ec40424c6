//! Store configuration
//!
//! The file config is plain TOML. Retention settings are also kept live in a
//! [`SharedRetention`] that is swapped as a whole so readers never observe a
//! half-applied change.

use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use crate::error::StoreError;

/// Default cache directory
pub fn default_cache_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("glucose-store")
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub retention: RetentionSettings,
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub notifier: NotifierConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// SQLite file backing the local cache
    #[serde(default = "default_cache_path")]
    pub path: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetentionSettings {
    #[serde(default = "default_cache_length")]
    pub cache_length_secs: u64,

    #[serde(default = "default_momentum_window")]
    pub momentum_window_secs: u64,

    /// Remote data older than this (and younger than the purge ceiling) is
    /// ours to delete. Zero disables remote purge.
    #[serde(default = "default_managed_interval")]
    pub managed_interval_secs: Option<u64>,

    #[serde(default = "default_max_purge_interval")]
    pub max_purge_interval_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Provenance identifier stamped on records written by this process
    #[serde(default = "default_provenance")]
    pub provenance: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifierConfig {
    #[serde(default = "default_notifier_capacity")]
    pub capacity: usize,
}

const HOUR: u64 = 60 * 60;

pub const DEFAULT_MANAGED_INTERVAL_SECS: u64 = 24 * HOUR;

/// Upper bound for any retention window (100 years)
pub const MAX_RETENTION_SECS: u64 = 100 * 365 * 24 * HOUR;

fn default_cache_path() -> PathBuf { default_cache_dir().join("samples.db") }
fn default_cache_length() -> u64 { 24 * HOUR }
fn default_momentum_window() -> u64 { 15 * 60 }
fn default_managed_interval() -> Option<u64> { Some(DEFAULT_MANAGED_INTERVAL_SECS) }
fn default_max_purge_interval() -> u64 { 7 * DEFAULT_MANAGED_INTERVAL_SECS }
fn default_provenance() -> String { "glucose-store".to_string() }
fn default_notifier_capacity() -> usize { 256 }

impl Default for CacheConfig {
    fn default() -> Self {
        Self { path: default_cache_path() }
    }
}

impl Default for RetentionSettings {
    fn default() -> Self {
        Self {
            cache_length_secs: default_cache_length(),
            momentum_window_secs: default_momentum_window(),
            managed_interval_secs: default_managed_interval(),
            max_purge_interval_secs: default_max_purge_interval(),
        }
    }
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self { provenance: default_provenance() }
    }
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self { capacity: default_notifier_capacity() }
    }
}

impl Config {
    /// Load config from file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, std::io::Error> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    }

    /// Save config to file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), std::io::Error> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, content)
    }

    /// Validated retention windows; out-of-range settings are rejected
    pub fn retention(&self) -> Result<RetentionConfig, StoreError> {
        RetentionConfig::try_from(&self.retention)
    }
}

/// Validated retention windows
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetentionConfig {
    cache_length: Duration,
    momentum_window: Duration,
    managed_interval: Option<Duration>,
    max_purge_interval: Duration,
}

impl RetentionConfig {
    /// Every window is clamped to `0..=MAX_RETENTION_SECS`, then
    /// `cache_length` is raised to `momentum_window` when shorter.
    pub fn new(
        cache_length: Duration,
        momentum_window: Duration,
        managed_interval: Option<Duration>,
        max_purge_interval: Duration,
    ) -> Self {
        let momentum_window = clamp(momentum_window);
        Self {
            cache_length: clamp(cache_length).max(momentum_window),
            momentum_window,
            managed_interval: managed_interval.map(clamp),
            max_purge_interval: clamp(max_purge_interval),
        }
    }

    pub fn cache_length(&self) -> Duration {
        self.cache_length
    }

    pub fn momentum_window(&self) -> Duration {
        self.momentum_window
    }

    pub fn managed_interval(&self) -> Option<Duration> {
        self.managed_interval
    }

    pub fn max_purge_interval(&self) -> Duration {
        self.max_purge_interval
    }
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self::new(
            Duration::seconds(default_cache_length() as i64),
            Duration::seconds(default_momentum_window() as i64),
            Some(Duration::seconds(DEFAULT_MANAGED_INTERVAL_SECS as i64)),
            Duration::seconds(default_max_purge_interval() as i64),
        )
    }
}

impl TryFrom<&RetentionSettings> for RetentionConfig {
    type Error = StoreError;

    fn try_from(s: &RetentionSettings) -> Result<Self, Self::Error> {
        let managed_interval = match s.managed_interval_secs.filter(|v| *v > 0) {
            Some(v) => Some(secs("managed_interval_secs", v)?),
            None => None,
        };
        Ok(Self::new(
            secs("cache_length_secs", s.cache_length_secs)?,
            secs("momentum_window_secs", s.momentum_window_secs)?,
            managed_interval,
            secs("max_purge_interval_secs", s.max_purge_interval_secs)?,
        ))
    }
}

fn secs(field: &str, v: u64) -> Result<Duration, StoreError> {
    if v > MAX_RETENTION_SECS {
        return Err(StoreError::Config(format!(
            "retention.{} = {} exceeds the maximum of {}",
            field, v, MAX_RETENTION_SECS
        )));
    }
    Ok(Duration::seconds(v as i64))
}

fn clamp(d: Duration) -> Duration {
    d.max(Duration::zero())
        .min(Duration::seconds(MAX_RETENTION_SECS as i64))
}

/// Process-wide retention, replaced atomically
#[derive(Debug, Clone)]
pub struct SharedRetention {
    inner: Arc<RwLock<Arc<RetentionConfig>>>,
}

impl SharedRetention {
    pub fn new(config: RetentionConfig) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Arc::new(config))),
        }
    }

    /// Current snapshot
    pub fn load(&self) -> Arc<RetentionConfig> {
        match self.inner.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn store(&self, config: RetentionConfig) {
        let next = Arc::new(config);
        match self.inner.write() {
            Ok(mut guard) => *guard = next,
            Err(poisoned) => *poisoned.into_inner() = next,
        }
    }
}

impl Default for SharedRetention {
    fn default() -> Self {
        Self::new(RetentionConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_length_floor_is_momentum_window() {
        let r = RetentionConfig::new(
            Duration::minutes(5),
            Duration::minutes(15),
            None,
            Duration::days(7),
        );
        assert_eq!(r.cache_length(), Duration::minutes(15));
        assert_eq!(r.momentum_window(), Duration::minutes(15));
    }

    #[test]
    fn test_default_retention() {
        let r = RetentionConfig::default();
        assert_eq!(r.cache_length(), Duration::hours(24));
        assert_eq!(r.momentum_window(), Duration::minutes(15));
        assert_eq!(r.managed_interval(), Some(Duration::hours(24)));
        assert_eq!(r.max_purge_interval(), Duration::days(7));
    }

    #[test]
    fn test_shared_retention_swap() {
        let shared = SharedRetention::default();
        let before = shared.load();
        shared.store(RetentionConfig::new(
            Duration::hours(6),
            Duration::minutes(30),
            None,
            Duration::days(1),
        ));
        let after = shared.load();
        assert_eq!(before.cache_length(), Duration::hours(24));
        assert_eq!(after.cache_length(), Duration::hours(6));
        assert_eq!(after.managed_interval(), None);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: Config = toml::from_str(
            r#"
[retention]
cache_length_secs = 3600

[source]
provenance = "com.example.cgm"
"#,
        )
        .unwrap();
        assert_eq!(config.retention.cache_length_secs, 3600);
        assert_eq!(config.retention.momentum_window_secs, 900);
        assert_eq!(config.source.provenance, "com.example.cgm");
        assert_eq!(config.notifier.capacity, 256);
        assert_eq!(config.retention().unwrap().cache_length(), Duration::hours(1));
    }

    #[test]
    fn test_zero_managed_interval_disables_remote_purge() {
        let config: Config = toml::from_str("[retention]\nmanaged_interval_secs = 0\n").unwrap();
        assert_eq!(config.retention().unwrap().managed_interval(), None);
    }

    #[test]
    fn test_oversized_retention_is_rejected() {
        let config: Config =
            toml::from_str("[retention]\ncache_length_secs = 10000000000000000\n").unwrap();
        match config.retention() {
            Err(StoreError::Config(msg)) => assert!(msg.contains("cache_length_secs")),
            other => panic!("expected config error, got {:?}", other),
        }

        let config: Config =
            toml::from_str("[retention]\nmanaged_interval_secs = 9000000000000\n").unwrap();
        assert!(matches!(config.retention(), Err(StoreError::Config(_))));
    }

    #[test]
    fn test_retention_at_maximum_is_accepted() {
        let mut config = Config::default();
        config.retention.cache_length_secs = MAX_RETENTION_SECS;
        let r = config.retention().unwrap();
        assert_eq!(r.cache_length(), Duration::seconds(MAX_RETENTION_SECS as i64));
    }

    #[test]
    fn test_programmatic_windows_are_clamped() {
        let r = RetentionConfig::new(
            Duration::seconds(9_000_000_000_000),
            Duration::seconds(-5),
            Some(Duration::days(1_000_000)),
            Duration::seconds(9_000_000_000_000),
        );
        let max = Duration::seconds(MAX_RETENTION_SECS as i64);
        assert_eq!(r.cache_length(), max);
        assert_eq!(r.momentum_window(), Duration::zero());
        assert_eq!(r.managed_interval(), Some(max));
        assert_eq!(r.max_purge_interval(), max);
    }
}
