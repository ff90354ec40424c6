//! glucose-store - local mirror of a remote glucose sample store
//!
//! Samples live authoritatively in a remote store that may be unavailable at
//! any time. This crate keeps a durable SQLite mirror of a rolling window of
//! those samples so reads keep working offline.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                        GlucoseStore                           │
//! ├──────────────────────────────────────────────────────────────┤
//! │  ReconcilerHandle  - serial worker, sole writer of the cache  │
//! │  PurgeScheduler    - retention on both tiers                  │
//! │  LatestValueTracker - most recent sample, read from any task  │
//! │  ChangeNotifier    - broadcast of cache changes               │
//! │  analytics         - momentum, change, counteraction          │
//! └──────────────────────────────────────────────────────────────┘
//!          │ RemoteStoreClient                 │ LocalCache
//!          ▼                                   ▼
//!    authoritative store                 samples.db (SQLite)
//! ```

pub mod analytics;
pub mod cache;
pub mod config;
pub mod error;
pub mod events;
pub mod model;
pub mod remote;
pub mod store;
pub mod sync;

// Re-exports
pub use cache::{CacheStats, LocalCache, SampleQuery};
pub use config::{Config, RetentionConfig, SharedRetention};
pub use error::{CacheError, RemoteError, StoreError};
pub use events::{CacheChanged, ChangeNotifier, ChangeSource};
pub use model::{
    Device, EffectPoint, GlucoseUnit, Quantity, SampleId, SampleRecord, SyncVersion, VelocityPoint,
};
pub use remote::{ChangeBatch, DeletePredicate, MemoryRemoteStore, RemoteStoreClient};
pub use store::{read_with_fallback, GlucoseStore, Tier, TierRead};
pub use sync::{LatestValueTracker, PurgeScheduler, ReconcilerHandle};
