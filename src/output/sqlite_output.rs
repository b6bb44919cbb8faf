//! SQLite-based harvest sink
//!
//! Outcomes are buffered in memory and written to the storage backend on
//! every flush as one transaction. A batch stays buffered until it is stored.

use crate::output::traits::{HarvestSink, OutputError, OutputResult};
use crate::record::{FailureEntry, Record};
use crate::storage::{RunStatus, Storage};
use std::sync::{Arc, Mutex, MutexGuard};

/// Shared handle to a storage backend
pub type SharedStorage = Arc<Mutex<dyn Storage + Send>>;

#[derive(Default)]
struct Pending {
    records: Vec<Record>,
    failures: Vec<FailureEntry>,
}

/// SQLite-based harvest sink
///
/// This sink records outcomes in the storage backend under one run.
pub struct SqliteSink {
    storage: SharedStorage,
    run_id: i64,
    pending: Mutex<Pending>,
}

impl SqliteSink {
    /// Creates a new SQLite sink
    ///
    /// # Arguments
    ///
    /// * `storage` - The storage backend to use
    /// * `run_id` - The current run ID
    pub fn new(storage: SharedStorage, run_id: i64) -> Self {
        Self {
            storage,
            run_id,
            pending: Mutex::new(Pending::default()),
        }
    }

    pub fn run_id(&self) -> i64 {
        self.run_id
    }

    fn storage(&self) -> OutputResult<MutexGuard<'_, dyn Storage + Send + 'static>> {
        self.storage
            .lock()
            .map_err(|e| OutputError::Storage(format!("Failed to lock storage: {}", e)))
    }

    fn pending(&self) -> OutputResult<MutexGuard<'_, Pending>> {
        self.pending
            .lock()
            .map_err(|e| OutputError::Storage(format!("Failed to lock pending outcomes: {}", e)))
    }
}

impl HarvestSink for SqliteSink {
    fn record_success(&self, record: &Record) -> OutputResult<()> {
        self.pending()?.records.push(record.clone());
        Ok(())
    }

    fn record_failure(&self, failure: &FailureEntry) -> OutputResult<()> {
        self.pending()?.failures.push(failure.clone());
        Ok(())
    }

    fn flush(&self) -> OutputResult<()> {
        let mut pending = self.pending()?;
        if pending.records.is_empty() && pending.failures.is_empty() {
            return Ok(());
        }

        self.storage()?
            .insert_batch(self.run_id, &pending.records, &pending.failures)
            .map_err(|e| OutputError::Storage(e.to_string()))?;

        tracing::debug!(
            "Saved {} record(s) and {} failure(s) to run {}",
            pending.records.len(),
            pending.failures.len(),
            self.run_id
        );
        *pending = Pending::default();
        Ok(())
    }

    fn finalize(&self, status: RunStatus) -> OutputResult<()> {
        // Unsaved outcomes mean the stored run is incomplete
        let flushed = self.flush();
        let status = if flushed.is_ok() {
            status
        } else {
            RunStatus::Failed
        };

        self.storage()?
            .complete_run(self.run_id, status)
            .map_err(|e| OutputError::Storage(e.to_string()))?;

        flushed
    }
}
