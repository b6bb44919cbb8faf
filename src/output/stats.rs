//! Statistics generation from the harvest database
//!
//! This module provides functionality for extracting and displaying
//! run statistics from the storage layer.

use crate::record::{ErrorKind, Field};
use crate::storage::{RunRecord, Storage};
use crate::HarvestError;
use std::collections::HashMap;

/// Harvest statistics for one run
#[derive(Debug, Clone)]
pub struct HarvestStatistics {
    /// The run the statistics belong to
    pub run: RunRecord,

    /// Number of harvested records
    pub records: u64,

    /// Number of exhausted tasks
    pub failures: u64,

    /// Failures by last error kind
    pub failures_by_kind: HashMap<ErrorKind, u64>,

    /// Records carrying each field, in column order
    pub field_coverage: Vec<(Field, u64)>,
}

/// Loads statistics for the latest run
///
/// # Arguments
///
/// * `storage` - The storage backend to query
///
/// # Returns
///
/// * `Ok(Some(HarvestStatistics))` - Statistics of the latest run
/// * `Ok(None)` - The database holds no runs yet
/// * `Err(HarvestError)` - Failed to query statistics
pub fn load_statistics(storage: &dyn Storage) -> Result<Option<HarvestStatistics>, HarvestError> {
    let Some(run) = storage.get_latest_run()? else {
        return Ok(None);
    };

    let records = storage.count_records(run.id)?;
    let failures = storage.count_failures(run.id)?;
    let failures_by_kind = storage.failures_by_kind(run.id)?;
    let field_coverage = storage.field_coverage(run.id)?;

    Ok(Some(HarvestStatistics {
        run,
        records,
        failures,
        failures_by_kind,
        field_coverage,
    }))
}

/// Prints statistics to stdout in a formatted manner
///
/// # Arguments
///
/// * `stats` - The statistics to display
pub fn print_statistics(stats: &HarvestStatistics) {
    println!("=== Harvest Statistics ===\n");

    println!("Run {} ({})", stats.run.id, stats.run.status.to_db_string());
    println!("  Started: {}", stats.run.started_at);
    if let Some(finished) = &stats.run.finished_at {
        println!("  Finished: {}", finished);
    }
    println!();

    println!("Overview:");
    println!("  Tasks: {}", stats.run.total_tasks);
    println!("  Records: {}", stats.records);
    println!("  Failures: {}", stats.failures);
    let unprocessed = stats
        .run
        .total_tasks
        .saturating_sub(stats.records + stats.failures);
    if unprocessed > 0 {
        println!("  Unprocessed: {}", unprocessed);
    }
    println!();

    if !stats.failures_by_kind.is_empty() {
        println!("Failures by Kind:");
        let mut kinds: Vec<_> = stats.failures_by_kind.iter().collect();
        kinds.sort_by(|a, b| b.1.cmp(a.1));
        for (kind, count) in kinds {
            println!("  {}: {}", kind, count);
        }
        println!();
    }

    if stats.records > 0 {
        println!("Field Coverage:");
        for (field, count) in &stats.field_coverage {
            let percentage = (*count as f64 / stats.records as f64) * 100.0;
            println!("  {}: {} ({:.1}%)", field, count, percentage);
        }
        println!();
    }

    let finished = stats.records + stats.failures;
    let success_rate = if finished > 0 {
        (stats.records as f64 / finished as f64) * 100.0
    } else {
        0.0
    };

    println!(
        "Success Rate: {:.1}% ({} / {} tasks harvested)",
        success_rate, stats.records, finished
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{FailureEntry, FieldSet, Record};
    use crate::storage::SqliteStorage;
    use crate::task::Task;
    use url::Url;

    #[test]
    fn test_no_runs_yields_none() {
        let storage = SqliteStorage::new_in_memory().unwrap();
        assert!(load_statistics(&storage).unwrap().is_none());
    }

    #[test]
    fn test_statistics_of_latest_run() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        storage.create_run("old", 5).unwrap();
        let run_id = storage.create_run("new", 2).unwrap();

        let task = Task::new(Url::parse("https://shop.example.com/a").unwrap());
        storage
            .insert_record(
                run_id,
                &Record {
                    task: task.clone(),
                    fields: FieldSet {
                        title: Some("Kettle".to_string()),
                        ..FieldSet::default()
                    },
                    label: None,
                    attempts: 1,
                    pages_visited: 1,
                },
            )
            .unwrap();
        storage
            .insert_failure(
                run_id,
                &FailureEntry {
                    task,
                    last_error: ErrorKind::Timeout,
                    message: "timed out".to_string(),
                    attempts_made: 3,
                },
            )
            .unwrap();

        let stats = load_statistics(&storage).unwrap().unwrap();
        assert_eq!(stats.run.id, run_id);
        assert_eq!(stats.records, 1);
        assert_eq!(stats.failures, 1);
        assert_eq!(stats.failures_by_kind.get(&ErrorKind::Timeout), Some(&1));
        assert_eq!(stats.field_coverage[0], (Field::Title, 1));
    }
}
