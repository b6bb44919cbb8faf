use crate::task::{Task, TaskSourceError};
use calamine::{open_workbook_auto, Reader};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use url::Url;

const ADDRESS_COLUMNS: &[&str] = &["address", "url"];
const HINT_COLUMNS: &[&str] = &["hint_title", "title"];

/// A row that was rejected before reaching the harvester
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedRow {
    /// 1-based data row
    pub row: usize,
    pub reason: String,
}

/// Tasks read from a source, plus the rows that were rejected
#[derive(Debug, Default)]
pub struct TaskLoad {
    pub tasks: Vec<Task>,
    pub rejected: Vec<RejectedRow>,
}

/// Loads tasks from a CSV file, a TSV file (`.tsv`) or an Excel workbook
/// (`.xlsx`, `.xls`, `.ods`; first sheet only)
///
/// # Arguments
///
/// * `path` - Path to the task file
///
/// # Returns
///
/// * `Ok(TaskLoad)` - Valid tasks and rejected rows
/// * `Err(TaskSourceError)` - The file could not be read or has no address column
pub fn load_tasks(path: &Path) -> Result<TaskLoad, TaskSourceError> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    let load = match extension.as_deref() {
        Some("xlsx" | "xlsm" | "xls" | "ods") => parse_workbook(path)?,
        Some("tsv") => parse_tasks(File::open(path)?, b'\t')?,
        _ => parse_tasks(File::open(path)?, b',')?,
    };

    if !load.rejected.is_empty() {
        tracing::warn!(
            "Rejected {} malformed row(s) from {}",
            load.rejected.len(),
            path.display()
        );
    }
    tracing::info!("Loaded {} task(s) from {}", load.tasks.len(), path.display());

    Ok(load)
}

/// Parses tasks from any reader
///
/// Rows with a blank or unparseable address are rejected; they never become tasks.
pub fn parse_tasks<R: Read>(reader: R, delimiter: u8) -> Result<TaskLoad, TaskSourceError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers: Vec<String> = csv_reader.headers()?.iter().map(str::to_string).collect();
    let rows = csv_reader.records().map(|result| {
        result
            .map(|record| record.iter().map(str::to_string).collect())
            .map_err(|e| e.to_string())
    });

    tasks_from_rows(&headers, rows)
}

/// Reads tasks from the first sheet of a workbook; the first row is the header
fn parse_workbook(path: &Path) -> Result<TaskLoad, TaskSourceError> {
    let mut workbook = open_workbook_auto(path)?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or(TaskSourceError::EmptyWorkbook)??;

    let mut rows = range
        .rows()
        .map(|cells| cells.iter().map(|c| c.to_string()).collect::<Vec<_>>());
    let headers = rows.next().ok_or(TaskSourceError::MissingAddressColumn)?;

    tasks_from_rows(&headers, rows.map(Ok))
}

/// Turns header plus data rows into tasks, rejecting unusable rows
pub fn tasks_from_rows<I>(headers: &[String], rows: I) -> Result<TaskLoad, TaskSourceError>
where
    I: IntoIterator<Item = Result<Vec<String>, String>>,
{
    let address_idx =
        find_column(headers, ADDRESS_COLUMNS).ok_or(TaskSourceError::MissingAddressColumn)?;
    let hint_idx = find_column(headers, HINT_COLUMNS);

    let mut load = TaskLoad::default();

    for (i, result) in rows.into_iter().enumerate() {
        let row = i + 1;
        let record = match result {
            Ok(r) => r,
            Err(reason) => {
                load.rejected.push(RejectedRow { row, reason });
                continue;
            }
        };

        let address = record.get(address_idx).map(|s| s.trim()).unwrap_or("");
        if address.is_empty() {
            load.rejected.push(RejectedRow {
                row,
                reason: "missing address".to_string(),
            });
            continue;
        }

        let url = match parse_address(address) {
            Ok(u) => u,
            Err(reason) => {
                tracing::debug!("Row {} rejected: {}", row, reason);
                load.rejected.push(RejectedRow { row, reason });
                continue;
            }
        };

        let hint_title = hint_idx
            .and_then(|idx| record.get(idx))
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .map(str::to_string);

        load.tasks.push(Task {
            address: url,
            hint_title,
            row,
        });
    }

    Ok(load)
}

fn find_column(headers: &[String], names: &[&str]) -> Option<usize> {
    names.iter().find_map(|name| {
        headers
            .iter()
            .position(|h| h.trim().eq_ignore_ascii_case(name))
    })
}

fn parse_address(address: &str) -> Result<Url, String> {
    let url = Url::parse(address).map_err(|e| format!("invalid address '{}': {}", address, e))?;
    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(format!("unsupported scheme in '{}'", address));
    }
    if url.host_str().is_none() {
        return Err(format!("address '{}' has no host", address));
    }
    Ok(url)
}
