//! Harvest tasks and the tabular task source
//!
//! A task is one product page to harvest. Tasks are read from a CSV/TSV file
//! or the first sheet of an Excel workbook, with an `address` (or `url`)
//! column and an optional `hint_title` (or `title`) column.

mod source;

pub use source::{load_tasks, parse_tasks, tasks_from_rows, RejectedRow, TaskLoad};

use thiserror::Error;
use url::Url;

/// One product page to harvest
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    /// Main product page
    pub address: Url,

    /// Title supplied by the input, kept for cross-checking
    pub hint_title: Option<String>,

    /// 1-based data row in the source file
    pub row: usize,
}

impl Task {
    pub fn new(address: Url) -> Self {
        Self {
            address,
            hint_title: None,
            row: 0,
        }
    }

    pub fn with_hint_title(mut self, title: impl Into<String>) -> Self {
        self.hint_title = Some(title.into());
        self
    }

    pub fn with_row(mut self, row: usize) -> Self {
        self.row = row;
        self
    }
}

/// Errors that make the task source unusable
#[derive(Debug, Error)]
pub enum TaskSourceError {
    #[error("Failed to read task file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse task file: {0}")]
    Csv(#[from] csv::Error),

    #[error("Failed to read workbook: {0}")]
    Excel(#[from] calamine::Error),

    #[error("Workbook has no sheets")]
    EmptyWorkbook,

    #[error("Task file has no address column (expected 'address' or 'url')")]
    MissingAddressColumn,
}
