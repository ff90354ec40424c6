//! Sample row mapping and queries

use chrono::{DateTime, TimeZone, Utc};
use rusqlite::{params, Connection, Row, Transaction};

use crate::error::CacheError;
use crate::model::{Device, GlucoseUnit, Quantity, SampleId, SampleRecord, SyncVersion};

/// Sort order by start timestamp
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Order {
    Ascending,
    Descending,
}

/// Predicate for fetching samples
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampleQuery {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub order: Order,
    pub limit: Option<u32>,
}

impl SampleQuery {
    /// `start <= sample.start <= end`, ascending
    pub fn range(start: DateTime<Utc>, end: Option<DateTime<Utc>>) -> Self {
        Self {
            start: Some(start),
            end,
            order: Order::Ascending,
            limit: None,
        }
    }

    pub fn all() -> Self {
        Self {
            start: None,
            end: None,
            order: Order::Ascending,
            limit: None,
        }
    }

    pub fn latest() -> Self {
        Self {
            start: None,
            end: None,
            order: Order::Descending,
            limit: Some(1),
        }
    }
}

pub(crate) fn to_millis(t: DateTime<Utc>) -> i64 {
    t.timestamp_millis()
}

fn ceil_millis(t: DateTime<Utc>) -> i64 {
    let ms = t.timestamp_millis();
    if t.timestamp_subsec_nanos() % 1_000_000 == 0 {
        ms
    } else {
        ms.saturating_add(1)
    }
}

fn from_millis(ms: i64) -> Result<DateTime<Utc>, CacheError> {
    Utc.timestamp_millis_opt(ms)
        .single()
        .ok_or_else(|| CacheError::Corrupt(format!("timestamp out of range: {}", ms)))
}

struct RawRow {
    id: String,
    value: f64,
    unit: String,
    start_ms: i64,
    is_display_only: bool,
    device_json: Option<String>,
    provenance: String,
    sync_identifier: Option<String>,
    sync_version: Option<i64>,
}

impl RawRow {
    fn from_row(row: &Row) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            value: row.get("value")?,
            unit: row.get("unit")?,
            start_ms: row.get("start_ms")?,
            is_display_only: row.get("is_display_only")?,
            device_json: row.get("device_json")?,
            provenance: row.get("provenance")?,
            sync_identifier: row.get("sync_identifier")?,
            sync_version: row.get("sync_version")?,
        })
    }

    fn into_record(self) -> Result<SampleRecord, CacheError> {
        let unit = GlucoseUnit::parse(&self.unit)
            .ok_or_else(|| CacheError::Corrupt(format!("unknown unit {} on {}", self.unit, self.id)))?;
        let device = match self.device_json {
            Some(json) => Some(
                serde_json::from_str::<Device>(&json)
                    .map_err(|e| CacheError::Corrupt(format!("device on {}: {}", self.id, e)))?,
            ),
            None => None,
        };
        let sync_version = match (self.sync_identifier, self.sync_version) {
            (Some(sync_identifier), Some(version)) => Some(SyncVersion { sync_identifier, version }),
            _ => None,
        };
        Ok(SampleRecord {
            id: SampleId(self.id),
            quantity: Quantity::new(self.value, unit),
            start: from_millis(self.start_ms)?,
            is_display_only: self.is_display_only,
            device,
            provenance: self.provenance,
            sync_version,
        })
    }
}

/// Insert a record unless its identity is present. Returns true if inserted.
pub fn insert_if_absent(tx: &Transaction, record: &SampleRecord) -> Result<bool, CacheError> {
    let device_json = match &record.device {
        Some(device) => Some(
            serde_json::to_string(device).map_err(|e| CacheError::Corrupt(e.to_string()))?,
        ),
        None => None,
    };
    let changed = tx.execute(
        r#"
        INSERT OR IGNORE INTO samples (
            id, value, unit, start_ms, is_display_only, device_json,
            provenance, sync_identifier, sync_version
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
        params![
            record.id.as_str(),
            record.quantity.value,
            record.quantity.unit.as_str(),
            to_millis(record.start),
            record.is_display_only,
            device_json,
            record.provenance,
            record.sync_version.as_ref().map(|v| v.sync_identifier.as_str()),
            record.sync_version.as_ref().map(|v| v.version),
        ],
    )?;
    Ok(changed > 0)
}

/// Delete by identity. Returns true if a row was removed.
pub fn delete_by_id(tx: &Transaction, id: &SampleId) -> Result<bool, CacheError> {
    let changed = tx.execute("DELETE FROM samples WHERE id = ?", params![id.as_str()])?;
    Ok(changed > 0)
}

/// Delete every sample strictly older than `cutoff`.
///
/// Stored starts are whole millis, so `stored < cutoff` holds exactly when
/// `stored < ceil_millis(cutoff)`.
pub fn delete_before(tx: &Transaction, cutoff: DateTime<Utc>) -> Result<usize, CacheError> {
    Ok(tx.execute("DELETE FROM samples WHERE start_ms < ?", params![ceil_millis(cutoff)])?)
}

pub fn contains(conn: &Connection, id: &SampleId) -> Result<bool, CacheError> {
    let mut stmt = conn.prepare_cached("SELECT 1 FROM samples WHERE id = ?")?;
    Ok(stmt.exists(params![id.as_str()])?)
}

pub fn fetch(conn: &Connection, query: &SampleQuery) -> Result<Vec<SampleRecord>, CacheError> {
    let mut sql = String::from("SELECT * FROM samples WHERE start_ms >= ?1 AND start_ms <= ?2");
    sql.push_str(match query.order {
        Order::Ascending => " ORDER BY start_ms ASC, id ASC",
        Order::Descending => " ORDER BY start_ms DESC, id DESC",
    });
    if let Some(limit) = query.limit {
        sql.push_str(&format!(" LIMIT {}", limit));
    }

    let lower = query.start.map(to_millis).unwrap_or(i64::MIN);
    let upper = query.end.map(to_millis).unwrap_or(i64::MAX);

    let mut stmt = conn.prepare_cached(&sql)?;
    let rows = stmt.query_map(params![lower, upper], RawRow::from_row)?;

    let mut results = Vec::new();
    for row in rows {
        results.push(row?.into_record()?);
    }
    Ok(results)
}

pub fn count(conn: &Connection) -> Result<u64, CacheError> {
    let n: i64 = conn.query_row("SELECT COUNT(*) FROM samples", [], |row| row.get(0))?;
    Ok(n as u64)
}

pub fn bounds(conn: &Connection) -> Result<Option<(DateTime<Utc>, DateTime<Utc>)>, CacheError> {
    let (min, max): (Option<i64>, Option<i64>) = conn.query_row(
        "SELECT MIN(start_ms), MAX(start_ms) FROM samples",
        [],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?;
    match (min, max) {
        (Some(min), Some(max)) => Ok(Some((from_millis(min)?, from_millis(max)?))),
        _ => Ok(None),
    }
}
