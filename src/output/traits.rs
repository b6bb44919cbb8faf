//! Output sink traits and types
//!
//! This module defines the trait interface for harvest sinks and the data
//! structure used for run summaries.

use crate::record::{ErrorKind, FailureEntry, Field, Record};
use crate::storage::RunStatus;
use std::collections::HashMap;
use thiserror::Error;

/// Errors that can occur during output operations
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("Failed to write output: {0}")]
    Write(String),

    #[error("Failed to format output: {0}")]
    Format(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Storage error: {0}")]
    Storage(String),
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;

/// Summary statistics for a harvest run
#[derive(Debug, Clone, Default)]
pub struct HarvestSummary {
    // Run metadata
    pub run_id: i64,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub duration_seconds: Option<u64>,
    pub status: String,
    pub config_hash: String,

    // Overall statistics
    pub total_tasks: u64,
    pub records: u64,
    pub failures: u64,

    // Failures by last error kind
    pub failures_by_kind: HashMap<ErrorKind, u64>,

    // Records carrying each field, in column order
    pub field_coverage: Vec<(Field, u64)>,
}

impl HarvestSummary {
    /// Creates a new empty summary
    pub fn new() -> Self {
        Self::default()
    }

    /// Tasks that reached a final outcome
    pub fn total_finished(&self) -> u64 {
        self.records + self.failures
    }

    /// Tasks handed to the run but never started (cancelled runs)
    pub fn unprocessed(&self) -> u64 {
        self.total_tasks.saturating_sub(self.total_finished())
    }

    /// Returns the success rate as a percentage of finished tasks
    pub fn success_rate(&self) -> f64 {
        let finished = self.total_finished();
        if finished == 0 {
            return 0.0;
        }
        (self.records as f64 / finished as f64) * 100.0
    }

    /// Share of records carrying `field`, as a percentage
    pub fn coverage_rate(&self, field: Field) -> f64 {
        if self.records == 0 {
            return 0.0;
        }
        let count = self
            .field_coverage
            .iter()
            .find(|(f, _)| *f == field)
            .map_or(0, |(_, c)| *c);
        (count as f64 / self.records as f64) * 100.0
    }
}

/// Receives harvest outcomes as they complete
///
/// Sinks are shared between the driver's collector and the caller, so
/// implementations must be thread-safe. Buffered sinks persist their data on
/// `flush`; `finalize` is called once, after the last outcome.
pub trait HarvestSink: Send + Sync {
    /// Records a successfully harvested task
    fn record_success(&self, record: &Record) -> OutputResult<()>;

    /// Records a task whose retry budget was exhausted
    fn record_failure(&self, failure: &FailureEntry) -> OutputResult<()>;

    /// Persists everything recorded so far
    fn flush(&self) -> OutputResult<()>;

    /// Finalizes the output
    ///
    /// # Arguments
    ///
    /// * `status` - The final status of the harvest run
    fn finalize(&self, status: RunStatus) -> OutputResult<()>;
}

/// Forwards every call to several sinks
///
/// All sinks receive every call; the first error is returned after the
/// remaining sinks have been served.
#[derive(Default)]
pub struct FanoutSink {
    sinks: Vec<std::sync::Arc<dyn HarvestSink>>,
}

impl FanoutSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sink: std::sync::Arc<dyn HarvestSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }

    fn each(&self, f: impl Fn(&dyn HarvestSink) -> OutputResult<()>) -> OutputResult<()> {
        let mut first_error = None;
        for sink in &self.sinks {
            if let Err(e) = f(sink.as_ref()) {
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

impl HarvestSink for FanoutSink {
    fn record_success(&self, record: &Record) -> OutputResult<()> {
        self.each(|sink| sink.record_success(record))
    }

    fn record_failure(&self, failure: &FailureEntry) -> OutputResult<()> {
        self.each(|sink| sink.record_failure(failure))
    }

    fn flush(&self) -> OutputResult<()> {
        self.each(|sink| sink.flush())
    }

    fn finalize(&self, status: RunStatus) -> OutputResult<()> {
        self.each(|sink| sink.finalize(status))
    }
}
