//! Cache schema definitions

use rusqlite::Connection;
use tracing::info;

use crate::error::CacheError;

/// Current schema version
pub const SCHEMA_VERSION: i32 = 1;

/// Initialize the cache schema
pub fn init_schema(conn: &Connection) -> Result<(), CacheError> {
    let current_version = get_schema_version(conn)?;

    if current_version == 0 {
        info!("Creating cache schema v{}", SCHEMA_VERSION);
        conn.execute_batch(SAMPLES_SCHEMA)?;
        set_schema_version(conn, SCHEMA_VERSION)?;
    }

    Ok(())
}

fn get_schema_version(conn: &Connection) -> Result<i32, CacheError> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL)",
        [],
    )?;

    let version: i32 = conn
        .query_row("SELECT version FROM schema_version LIMIT 1", [], |row| row.get(0))
        .unwrap_or(0);

    Ok(version)
}

fn set_schema_version(conn: &Connection, version: i32) -> Result<(), CacheError> {
    conn.execute("DELETE FROM schema_version", [])?;
    conn.execute("INSERT INTO schema_version (version) VALUES (?)", [version])?;
    Ok(())
}

/// Samples table. `start_ms` is Unix millis.
const SAMPLES_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS samples (
    id TEXT PRIMARY KEY,
    value REAL NOT NULL,
    unit TEXT NOT NULL,
    start_ms INTEGER NOT NULL,
    is_display_only INTEGER NOT NULL DEFAULT 0,
    device_json TEXT,
    provenance TEXT NOT NULL,
    sync_identifier TEXT,
    sync_version INTEGER
);

CREATE INDEX IF NOT EXISTS idx_samples_start ON samples(start_ms);
"#;
