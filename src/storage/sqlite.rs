//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the Storage trait.

use crate::record::{ErrorKind, FailureEntry, Field, FieldSet, Record};
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{Storage, StorageError, StorageResult};
use crate::storage::{RunRecord, RunStatus};
use crate::HarvestError;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::HashMap;
use std::path::Path;

const RUN_COLUMNS: &str = "id, started_at, finished_at, config_hash, total_tasks, status";

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Creates a new SqliteStorage instance
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStorage)` - Successfully opened/created database
    /// * `Err(HarvestError)` - Failed to open database
    pub fn new(path: &Path) -> Result<Self, HarvestError> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database (for testing)
    #[cfg(test)]
    pub fn new_in_memory() -> Result<Self, HarvestError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }

    fn run_from_row(row: &Row<'_>) -> rusqlite::Result<RunRecord> {
        Ok(RunRecord {
            id: row.get(0)?,
            started_at: row.get(1)?,
            finished_at: row.get(2)?,
            config_hash: row.get(3)?,
            total_tasks: row.get::<_, i64>(4)? as u64,
            status: RunStatus::from_db_string(&row.get::<_, String>(5)?)
                .unwrap_or(RunStatus::Running),
        })
    }
}

impl Storage for SqliteStorage {
    // ===== Run Management =====

    fn create_run(&mut self, config_hash: &str, total_tasks: usize) -> StorageResult<i64> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO runs (started_at, config_hash, total_tasks, status) VALUES (?1, ?2, ?3, ?4)",
            params![
                now,
                config_hash,
                total_tasks as i64,
                RunStatus::Running.to_db_string()
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord> {
        let sql = format!("SELECT {} FROM runs WHERE id = ?1", RUN_COLUMNS);
        self.conn
            .query_row(&sql, params![run_id], Self::run_from_row)
            .optional()?
            .ok_or(StorageError::RunNotFound(run_id))
    }

    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>> {
        let sql = format!("SELECT {} FROM runs ORDER BY id DESC LIMIT 1", RUN_COLUMNS);
        let run = self
            .conn
            .query_row(&sql, [], Self::run_from_row)
            .optional()?;
        Ok(run)
    }

    fn update_run_status(&mut self, run_id: i64, status: RunStatus) -> StorageResult<()> {
        let updated = self.conn.execute(
            "UPDATE runs SET status = ?1 WHERE id = ?2",
            params![status.to_db_string(), run_id],
        )?;
        if updated == 0 {
            return Err(StorageError::RunNotFound(run_id));
        }
        Ok(())
    }

    fn complete_run(&mut self, run_id: i64, status: RunStatus) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        let updated = self.conn.execute(
            "UPDATE runs SET status = ?1, finished_at = ?2 WHERE id = ?3",
            params![status.to_db_string(), now, run_id],
        )?;
        if updated == 0 {
            return Err(StorageError::RunNotFound(run_id));
        }
        Ok(())
    }

    // ===== Outcomes =====

    fn insert_record(&mut self, run_id: i64, record: &Record) -> StorageResult<i64> {
        insert_record_row(&self.conn, run_id, record)?;
        Ok(self.conn.last_insert_rowid())
    }

    fn insert_failure(&mut self, run_id: i64, failure: &FailureEntry) -> StorageResult<i64> {
        insert_failure_row(&self.conn, run_id, failure)?;
        Ok(self.conn.last_insert_rowid())
    }

    fn insert_batch(
        &mut self,
        run_id: i64,
        records: &[Record],
        failures: &[FailureEntry],
    ) -> StorageResult<()> {
        let tx = self.conn.transaction()?;
        for record in records {
            insert_record_row(&tx, run_id, record)?;
        }
        for failure in failures {
            insert_failure_row(&tx, run_id, failure)?;
        }
        tx.commit()?;
        Ok(())
    }

    // ===== Statistics =====

    fn count_records(&self, run_id: i64) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM records WHERE run_id = ?1",
            params![run_id],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn count_failures(&self, run_id: i64) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM failures WHERE run_id = ?1",
            params![run_id],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn failures_by_kind(&self, run_id: i64) -> StorageResult<HashMap<ErrorKind, u64>> {
        let mut stmt = self.conn.prepare(
            "SELECT error_kind, COUNT(*) FROM failures WHERE run_id = ?1 GROUP BY error_kind",
        )?;
        let rows = stmt.query_map(params![run_id], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;

        let mut summary = HashMap::new();
        for row in rows {
            let (kind, count) = row?;
            match ErrorKind::from_db_string(&kind) {
                Some(kind) => {
                    summary.insert(kind, count as u64);
                }
                None => tracing::warn!("Unknown error kind in database: {}", kind),
            }
        }
        Ok(summary)
    }

    fn field_coverage(&self, run_id: i64) -> StorageResult<Vec<(Field, u64)>> {
        let mut stmt = self
            .conn
            .prepare("SELECT fields_json FROM records WHERE run_id = ?1")?;
        let rows = stmt.query_map(params![run_id], |row| row.get::<_, String>(0))?;

        let mut counts: HashMap<Field, u64> = HashMap::new();
        for row in rows {
            let fields: FieldSet = serde_json::from_str(&row?)?;
            for field in fields.present_fields() {
                *counts.entry(field).or_insert(0) += 1;
            }
        }

        Ok(Field::ALL
            .into_iter()
            .map(|f| (f, counts.get(&f).copied().unwrap_or(0)))
            .collect())
    }
}

fn insert_record_row(conn: &Connection, run_id: i64, record: &Record) -> StorageResult<()> {
    let fields_json = serde_json::to_string(&record.fields)?;
    let now = Utc::now().to_rfc3339();
    conn.execute(
        "INSERT INTO records (run_id, source_row, address, hint_title, title, label, fields_json,
         variant_count, attempts, pages_visited, harvested_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        params![
            run_id,
            record.task.row as i64,
            record.task.address.as_str(),
            record.task.hint_title,
            record.fields.title,
            record.label,
            fields_json,
            record.fields.variant_count() as i64,
            record.attempts,
            record.pages_visited as i64,
            now
        ],
    )?;
    Ok(())
}

fn insert_failure_row(conn: &Connection, run_id: i64, failure: &FailureEntry) -> StorageResult<()> {
    let now = Utc::now().to_rfc3339();
    conn.execute(
        "INSERT INTO failures (run_id, source_row, address, hint_title, error_kind, message,
         attempts_made, failed_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            run_id,
            failure.task.row as i64,
            failure.task.address.as_str(),
            failure.task.hint_title,
            failure.last_error.to_db_string(),
            failure.message,
            failure.attempts_made,
            now
        ],
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Variant;
    use crate::task::Task;
    use url::Url;

    fn task(address: &str, row: usize) -> Task {
        Task::new(Url::parse(address).unwrap()).with_row(row)
    }

    fn record(address: &str, fields: FieldSet) -> Record {
        Record {
            task: task(address, 1),
            fields,
            label: None,
            attempts: 1,
            pages_visited: 1,
        }
    }

    #[test]
    fn test_create_in_memory() {
        assert!(SqliteStorage::new_in_memory().is_ok());
    }

    #[test]
    fn test_create_run() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        let run_id = storage.create_run("test_hash", 12).unwrap();
        assert!(run_id > 0);

        let run = storage.get_run(run_id).unwrap();
        assert_eq!(run.config_hash, "test_hash");
        assert_eq!(run.total_tasks, 12);
        assert_eq!(run.status, RunStatus::Running);
        assert!(run.finished_at.is_none());
    }

    #[test]
    fn test_get_missing_run() {
        let storage = SqliteStorage::new_in_memory().unwrap();
        assert!(matches!(
            storage.get_run(99),
            Err(StorageError::RunNotFound(99))
        ));
    }

    #[test]
    fn test_latest_run_and_completion() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        assert!(storage.get_latest_run().unwrap().is_none());

        storage.create_run("first", 1).unwrap();
        let second = storage.create_run("second", 2).unwrap();
        storage.complete_run(second, RunStatus::Interrupted).unwrap();

        let latest = storage.get_latest_run().unwrap().unwrap();
        assert_eq!(latest.id, second);
        assert_eq!(latest.status, RunStatus::Interrupted);
        assert!(latest.finished_at.is_some());
    }

    #[test]
    fn test_update_status_of_missing_run() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        assert!(storage.update_run_status(7, RunStatus::Failed).is_err());
    }

    #[test]
    fn test_insert_and_count_outcomes() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        let run_id = storage.create_run("hash", 3).unwrap();

        let fields = FieldSet {
            title: Some("Kettle".to_string()),
            ..FieldSet::default()
        };
        storage
            .insert_record(run_id, &record("https://shop.example.com/a", fields))
            .unwrap();

        for (i, kind) in [ErrorKind::Timeout, ErrorKind::Timeout, ErrorKind::Blocked]
            .into_iter()
            .enumerate()
        {
            let failure = FailureEntry {
                task: task(&format!("https://shop.example.com/f{}", i), i + 2),
                last_error: kind,
                message: "failed".to_string(),
                attempts_made: 3,
            };
            storage.insert_failure(run_id, &failure).unwrap();
        }

        assert_eq!(storage.count_records(run_id).unwrap(), 1);
        assert_eq!(storage.count_failures(run_id).unwrap(), 3);

        let by_kind = storage.failures_by_kind(run_id).unwrap();
        assert_eq!(by_kind.get(&ErrorKind::Timeout), Some(&2));
        assert_eq!(by_kind.get(&ErrorKind::Blocked), Some(&1));
        assert_eq!(by_kind.get(&ErrorKind::NotFound), None);
    }

    #[test]
    fn test_counts_are_per_run() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        let first = storage.create_run("hash", 1).unwrap();
        let second = storage.create_run("hash", 1).unwrap();
        storage
            .insert_record(first, &record("https://shop.example.com/a", FieldSet::new()))
            .unwrap();

        assert_eq!(storage.count_records(first).unwrap(), 1);
        assert_eq!(storage.count_records(second).unwrap(), 0);
    }

    #[test]
    fn test_field_coverage() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        let run_id = storage.create_run("hash", 2).unwrap();

        let variant = Variant {
            address: Url::parse("https://shop.example.com/a-red").unwrap(),
            label: Some("Red".to_string()),
            fields: FieldSet::new(),
        };
        let full = FieldSet {
            title: Some("Kettle".to_string()),
            price: Some("$99".to_string()),
            swatch_variants: Some(vec![variant]),
            ..FieldSet::default()
        };
        let sparse = FieldSet {
            title: Some("Toaster".to_string()),
            ..FieldSet::default()
        };
        storage
            .insert_record(run_id, &record("https://shop.example.com/a", full))
            .unwrap();
        storage
            .insert_record(run_id, &record("https://shop.example.com/b", sparse))
            .unwrap();

        let coverage: HashMap<Field, u64> =
            storage.field_coverage(run_id).unwrap().into_iter().collect();
        assert_eq!(coverage.len(), 8);
        assert_eq!(coverage[&Field::Title], 2);
        assert_eq!(coverage[&Field::Price], 1);
        assert_eq!(coverage[&Field::SwatchVariants], 1);
        assert_eq!(coverage[&Field::Teaser], 0);
    }

    #[test]
    fn test_batch_is_all_or_nothing() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        let run_id = storage.create_run("hash", 2).unwrap();
        storage.conn.execute_batch("DROP TABLE failures;").unwrap();

        let failure = FailureEntry {
            task: task("https://shop.example.com/b", 2),
            last_error: ErrorKind::NotFound,
            message: "HTTP 404".to_string(),
            attempts_made: 1,
        };
        let result = storage.insert_batch(
            run_id,
            &[record("https://shop.example.com/a", FieldSet::new())],
            &[failure],
        );

        assert!(result.is_err());
        assert_eq!(storage.count_records(run_id).unwrap(), 0);
    }

    #[test]
    fn test_batch_insert() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        let run_id = storage.create_run("hash", 2).unwrap();
        let mut labelled = record("https://shop.example.com/a", FieldSet::new());
        labelled.label = Some("Brushed Steel".to_string());

        storage
            .insert_batch(
                run_id,
                &[labelled, record("https://shop.example.com/b", FieldSet::new())],
                &[],
            )
            .unwrap();

        assert_eq!(storage.count_records(run_id).unwrap(), 2);
        let label: Option<String> = storage
            .conn
            .query_row(
                "SELECT label FROM records WHERE address = ?1",
                ["https://shop.example.com/a"],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(label.as_deref(), Some("Brushed Steel"));
    }
}
