//! Cache reconciliation
//!
//! ```text
//! remote feed ──► pump ──┐
//!                        ▼
//! add_records ──► remote.add ──► worker (serial) ──► cache
//!                                   │ purge local, then remote (detached)
//!                                   │ refresh latest
//!                                   └► notify
//! ```

pub mod latest;
pub mod purge;
pub mod reconciler;

pub use latest::LatestValueTracker;
pub use purge::PurgeScheduler;
pub use reconciler::ReconcilerHandle;
