//! Local sample cache backed by SQLite
//!
//! One row per sample identity. Every mutation runs inside a rusqlite
//! transaction; dropping an uncommitted transaction rolls it back, so a batch
//! either lands whole or not at all.
//!
//! The cache is owned by the reconciler's worker task. Nothing else holds a
//! handle to it.

pub mod samples;
pub mod schema;

use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use serde::Serialize;
use tracing::{debug, info};

use crate::error::CacheError;
use crate::model::{SampleId, SampleRecord};

pub use samples::{Order, SampleQuery};

/// Result of applying a batch to the cache
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchOutcome {
    pub inserted: Vec<SampleRecord>,
    pub deleted: usize,
}

impl BatchOutcome {
    pub fn changed(&self) -> bool {
        !self.inserted.is_empty() || self.deleted > 0
    }
}

/// Cache statistics
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheStats {
    pub count: u64,
    pub earliest: Option<DateTime<Utc>>,
    pub latest: Option<DateTime<Utc>>,
}

pub struct LocalCache {
    conn: Connection,
}

impl LocalCache {
    /// Open or create the cache database at `path`
    pub fn open(path: &Path) -> Result<Self, CacheError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        info!(path = %path.display(), "Opening sample cache");

        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;
        schema::init_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Open an in-memory cache (for testing)
    pub fn open_in_memory() -> Result<Self, CacheError> {
        debug!("Opening in-memory sample cache");
        let conn = Connection::open_in_memory()?;
        schema::init_schema(&conn)?;
        Ok(Self { conn })
    }

    /// Insert records whose identity is absent and delete the given ids, in
    /// one transaction.
    pub fn apply(
        &mut self,
        added: &[SampleRecord],
        deleted: &[SampleId],
    ) -> Result<BatchOutcome, CacheError> {
        let tx = self.conn.transaction()?;
        let mut outcome = BatchOutcome::default();

        for record in added {
            if samples::insert_if_absent(&tx, record)? {
                outcome.inserted.push(record.clone());
            }
        }
        for id in deleted {
            if samples::delete_by_id(&tx, id)? {
                outcome.deleted += 1;
            }
        }

        tx.commit()?;
        debug!(
            inserted = outcome.inserted.len(),
            deleted = outcome.deleted,
            "Applied batch to cache"
        );
        Ok(outcome)
    }

    /// Delete every sample with `start < cutoff`
    pub fn purge_before(&mut self, cutoff: DateTime<Utc>) -> Result<usize, CacheError> {
        let tx = self.conn.transaction()?;
        let removed = samples::delete_before(&tx, cutoff)?;
        tx.commit()?;
        if removed > 0 {
            debug!(removed, %cutoff, "Purged cache");
        }
        Ok(removed)
    }

    pub fn fetch(&self, query: &SampleQuery) -> Result<Vec<SampleRecord>, CacheError> {
        samples::fetch(&self.conn, query)
    }

    /// Sample with the greatest start timestamp
    pub fn latest(&self) -> Result<Option<SampleRecord>, CacheError> {
        Ok(self.fetch(&SampleQuery::latest())?.into_iter().next())
    }

    pub fn contains(&self, id: &SampleId) -> Result<bool, CacheError> {
        samples::contains(&self.conn, id)
    }

    pub fn stats(&self) -> Result<CacheStats, CacheError> {
        let count = samples::count(&self.conn)?;
        let bounds = samples::bounds(&self.conn)?;
        Ok(CacheStats {
            count,
            earliest: bounds.map(|(lo, _)| lo),
            latest: bounds.map(|(_, hi)| hi),
        })
    }
}
