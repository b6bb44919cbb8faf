//! Output module for harvest results and reports
//!
//! This module handles:
//! - Writing records and failures to CSV files and the database as they complete
//! - Generating markdown summaries of a run
//! - Loading and printing run statistics

mod csv_output;
mod markdown;
mod sqlite_output;
pub mod stats;
mod traits;

pub use csv_output::{failure_row, record_row, CsvSink, FAILURE_COLUMNS, RESULT_COLUMNS};
pub use markdown::{format_markdown_summary, generate_markdown_summary};
pub use sqlite_output::{SharedStorage, SqliteSink};
pub use stats::{load_statistics, print_statistics, HarvestStatistics};
pub use traits::{FanoutSink, HarvestSink, HarvestSummary, OutputError, OutputResult};

use crate::storage::Storage;
use crate::HarvestError;

/// Generates a summary of the latest run from storage
///
/// # Arguments
///
/// * `storage` - The storage backend containing harvest data
///
/// # Returns
///
/// * `Ok(HarvestSummary)` - Successfully generated summary
/// * `Err(HarvestError)` - No run recorded, or the query failed
pub fn generate_summary(storage: &dyn Storage) -> Result<HarvestSummary, HarvestError> {
    let stats = stats::load_statistics(storage)?.ok_or_else(|| {
        HarvestError::Output(OutputError::Storage(
            "No harvest runs found in database".to_string(),
        ))
    })?;
    let run = stats.run;

    let duration_seconds = match (
        run.started_at.parse::<chrono::DateTime<chrono::Utc>>(),
        run.finished_at
            .as_deref()
            .map(str::parse::<chrono::DateTime<chrono::Utc>>),
    ) {
        (Ok(started), Some(Ok(finished))) => Some((finished - started).num_seconds().max(0) as u64),
        _ => None,
    };

    Ok(HarvestSummary {
        run_id: run.id,
        started_at: run.started_at,
        finished_at: run.finished_at,
        duration_seconds,
        status: run.status.to_db_string().to_string(),
        config_hash: run.config_hash,
        total_tasks: run.total_tasks,
        records: stats.records,
        failures: stats.failures,
        failures_by_kind: stats.failures_by_kind,
        field_coverage: stats.field_coverage,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{RunStatus, SqliteStorage};

    #[test]
    fn test_summary_requires_a_run() {
        let storage = SqliteStorage::new_in_memory().unwrap();
        assert!(generate_summary(&storage).is_err());
    }

    #[test]
    fn test_summary_of_finished_run() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        let run_id = storage.create_run("cafe", 4).unwrap();
        storage.complete_run(run_id, RunStatus::Completed).unwrap();

        let summary = generate_summary(&storage).unwrap();
        assert_eq!(summary.run_id, run_id);
        assert_eq!(summary.status, "completed");
        assert_eq!(summary.config_hash, "cafe");
        assert_eq!(summary.total_tasks, 4);
        assert_eq!(summary.unprocessed(), 4);
        assert!(summary.duration_seconds.is_some());
        assert_eq!(summary.field_coverage.len(), 8);
    }
}
