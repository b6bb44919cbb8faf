//! Storage traits and error types
//!
//! This module defines the trait interface for storage backends and
//! associated error types.

use crate::record::{ErrorKind, FailureEntry, Field, Record};
use crate::storage::{RunRecord, RunStatus};
use std::collections::HashMap;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Run not found: {0}")]
    RunNotFound(i64),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for storage backend implementations
///
/// This trait defines all database operations needed by a harvest run and
/// by the reporting commands.
pub trait Storage {
    // ===== Run Management =====

    /// Creates a new harvest run
    ///
    /// # Arguments
    ///
    /// * `config_hash` - Hash of the configuration file
    /// * `total_tasks` - Number of tasks handed to the run
    ///
    /// # Returns
    ///
    /// The ID of the newly created run
    fn create_run(&mut self, config_hash: &str, total_tasks: usize) -> StorageResult<i64>;

    /// Gets a run by ID
    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord>;

    /// Gets the most recent run
    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>>;

    /// Updates the status of a run
    fn update_run_status(&mut self, run_id: i64, status: RunStatus) -> StorageResult<()>;

    /// Marks a run as finished with the given status and a finish timestamp
    fn complete_run(&mut self, run_id: i64, status: RunStatus) -> StorageResult<()>;

    // ===== Outcomes =====

    /// Stores a harvested record, returning its row ID
    fn insert_record(&mut self, run_id: i64, record: &Record) -> StorageResult<i64>;

    /// Stores a failure entry, returning its row ID
    fn insert_failure(&mut self, run_id: i64, failure: &FailureEntry) -> StorageResult<i64>;

    /// Stores a batch of outcomes in one transaction
    ///
    /// Either every outcome of the batch is stored or none is.
    fn insert_batch(
        &mut self,
        run_id: i64,
        records: &[Record],
        failures: &[FailureEntry],
    ) -> StorageResult<()>;

    // ===== Statistics =====

    /// Counts records stored for a run
    fn count_records(&self, run_id: i64) -> StorageResult<u64>;

    /// Counts failures stored for a run
    fn count_failures(&self, run_id: i64) -> StorageResult<u64>;

    /// Counts failures by their last error kind
    fn failures_by_kind(&self, run_id: i64) -> StorageResult<HashMap<ErrorKind, u64>>;

    /// Counts, for every field, how many records of the run carry it
    ///
    /// The result is in column order and lists every field, including those
    /// no record carries.
    fn field_coverage(&self, run_id: i64) -> StorageResult<Vec<(Field, u64)>>;
}
