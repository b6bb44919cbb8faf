//! CSV result and failure files

use crate::output::traits::{HarvestSink, OutputError, OutputResult};
use crate::record::{FailureEntry, Record};
use crate::storage::RunStatus;
use std::fs::File;
use std::path::Path;
use std::sync::Mutex;

/// Columns of the result file
pub const RESULT_COLUMNS: [&str; 14] = [
    "row",
    "address",
    "hint_title",
    "title",
    "label",
    "price",
    "description",
    "specifications",
    "teaser",
    "images",
    "documents",
    "swatch_variants",
    "attempts",
    "pages_visited",
];

/// Columns of the failure file
pub const FAILURE_COLUMNS: [&str; 6] = [
    "row",
    "address",
    "hint_title",
    "last_error",
    "attempts_made",
    "message",
];

const LIST_SEPARATOR: &str = " | ";

/// Writes results and failures to two CSV files
///
/// Both files are created (truncated) with their header row on construction.
pub struct CsvSink {
    results: Mutex<csv::Writer<File>>,
    failures: Mutex<csv::Writer<File>>,
}

impl CsvSink {
    pub fn create(results_path: &Path, failures_path: &Path) -> OutputResult<Self> {
        let mut results = csv::Writer::from_path(results_path)?;
        results.write_record(RESULT_COLUMNS)?;
        results.flush()?;

        let mut failures = csv::Writer::from_path(failures_path)?;
        failures.write_record(FAILURE_COLUMNS)?;
        failures.flush()?;

        Ok(Self {
            results: Mutex::new(results),
            failures: Mutex::new(failures),
        })
    }
}

/// Flattens a record into result columns
pub fn record_row(record: &Record) -> OutputResult<Vec<String>> {
    let fields = &record.fields;
    let text = |value: &Option<String>| value.clone().unwrap_or_default();

    let images = fields
        .images
        .as_ref()
        .map(|images| images.join(LIST_SEPARATOR))
        .unwrap_or_default();

    let documents = fields
        .documents
        .as_ref()
        .map(|docs| {
            docs.iter()
                .map(|d| format!("{} <{}>", d.text, d.href))
                .collect::<Vec<_>>()
                .join(LIST_SEPARATOR)
        })
        .unwrap_or_default();

    let variants = match &fields.swatch_variants {
        Some(variants) => serde_json::to_string(variants)
            .map_err(|e| OutputError::Format(format!("swatch variants: {}", e)))?,
        None => String::new(),
    };

    Ok(vec![
        record.task.row.to_string(),
        record.task.address.to_string(),
        text(&record.task.hint_title),
        text(&fields.title),
        text(&record.label),
        text(&fields.price),
        text(&fields.description),
        text(&fields.specifications),
        text(&fields.teaser),
        images,
        documents,
        variants,
        record.attempts.to_string(),
        record.pages_visited.to_string(),
    ])
}

/// Flattens a failure entry into failure columns
pub fn failure_row(failure: &FailureEntry) -> Vec<String> {
    vec![
        failure.task.row.to_string(),
        failure.task.address.to_string(),
        failure.task.hint_title.clone().unwrap_or_default(),
        failure.last_error.to_string(),
        failure.attempts_made.to_string(),
        failure.message.clone(),
    ]
}

fn lock<'a>(
    writer: &'a Mutex<csv::Writer<File>>,
) -> OutputResult<std::sync::MutexGuard<'a, csv::Writer<File>>> {
    writer
        .lock()
        .map_err(|e| OutputError::Write(format!("Failed to lock CSV writer: {}", e)))
}

impl HarvestSink for CsvSink {
    fn record_success(&self, record: &Record) -> OutputResult<()> {
        let row = record_row(record)?;
        lock(&self.results)?.write_record(&row)?;
        Ok(())
    }

    fn record_failure(&self, failure: &FailureEntry) -> OutputResult<()> {
        lock(&self.failures)?.write_record(failure_row(failure))?;
        Ok(())
    }

    fn flush(&self) -> OutputResult<()> {
        lock(&self.results)?.flush()?;
        lock(&self.failures)?.flush()?;
        Ok(())
    }

    fn finalize(&self, _status: RunStatus) -> OutputResult<()> {
        self.flush()
    }
}
