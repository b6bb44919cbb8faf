//! Database schema definitions
//!
//! This module contains all SQL schema definitions for the harvest database.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- Track harvest runs
CREATE TABLE IF NOT EXISTS runs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    started_at TEXT NOT NULL,
    finished_at TEXT,
    config_hash TEXT NOT NULL,
    total_tasks INTEGER NOT NULL DEFAULT 0,
    status TEXT NOT NULL
);

-- Successfully harvested tasks
CREATE TABLE IF NOT EXISTS records (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    run_id INTEGER NOT NULL REFERENCES runs(id),
    source_row INTEGER NOT NULL,
    address TEXT NOT NULL,
    hint_title TEXT,
    title TEXT,
    label TEXT,
    fields_json TEXT NOT NULL,
    variant_count INTEGER NOT NULL DEFAULT 0,
    attempts INTEGER NOT NULL,
    pages_visited INTEGER NOT NULL,
    harvested_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_records_run ON records(run_id);
CREATE INDEX IF NOT EXISTS idx_records_address ON records(address);

-- Tasks whose retry budget was exhausted
CREATE TABLE IF NOT EXISTS failures (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    run_id INTEGER NOT NULL REFERENCES runs(id),
    source_row INTEGER NOT NULL,
    address TEXT NOT NULL,
    hint_title TEXT,
    error_kind TEXT NOT NULL,
    message TEXT NOT NULL,
    attempts_made INTEGER NOT NULL,
    failed_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_failures_run ON failures(run_id);
CREATE INDEX IF NOT EXISTS idx_failures_kind ON failures(error_kind);
"#;

/// Initializes the database schema
///
/// # Arguments
///
/// * `conn` - The database connection
///
/// # Returns
///
/// * `Ok(())` - Schema initialized successfully
/// * `Err(rusqlite::Error)` - Failed to initialize schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
