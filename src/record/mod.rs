//! Harvest outcome types
//!
//! Every task ends as exactly one `Record` (success, possibly partial) or
//! exactly one `FailureEntry` (retry budget exhausted).

mod fields;

pub use fields::{DocumentLink, Field, FieldSet, FieldValue, Variant};

use crate::harvest::{ExtractError, FetchError, FetchErrorKind};
use crate::task::Task;
use std::fmt;

/// Classification of a page-level failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The page did not load within the per-operation timeout
    Timeout,

    /// The page does not exist (HTTP 404/410)
    NotFound,

    /// The site refused the request (HTTP 401/403/429/503)
    Blocked,

    /// Connection, protocol or other HTTP failure
    Transport,

    /// The page loaded but its content is unusable
    MalformedPage,
}

impl ErrorKind {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Timeout => "timeout",
            Self::NotFound => "not_found",
            Self::Blocked => "blocked",
            Self::Transport => "transport",
            Self::MalformedPage => "malformed_page",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "timeout" => Some(Self::Timeout),
            "not_found" => Some(Self::NotFound),
            "blocked" => Some(Self::Blocked),
            "transport" => Some(Self::Transport),
            "malformed_page" => Some(Self::MalformedPage),
            _ => None,
        }
    }

    pub fn all_kinds() -> Vec<Self> {
        vec![
            Self::Timeout,
            Self::NotFound,
            Self::Blocked,
            Self::Transport,
            Self::MalformedPage,
        ]
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_string())
    }
}

impl From<FetchErrorKind> for ErrorKind {
    fn from(kind: FetchErrorKind) -> Self {
        match kind {
            FetchErrorKind::Timeout => Self::Timeout,
            FetchErrorKind::NotFound => Self::NotFound,
            FetchErrorKind::Blocked => Self::Blocked,
            FetchErrorKind::Transport => Self::Transport,
        }
    }
}

/// A page-level error observed during an attempt
#[derive(Debug, Clone, PartialEq)]
pub struct PageError {
    pub kind: ErrorKind,
    pub message: String,
}

impl fmt::Display for PageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl From<FetchError> for PageError {
    fn from(err: FetchError) -> Self {
        Self {
            kind: err.kind.into(),
            message: err.to_string(),
        }
    }
}

impl From<ExtractError> for PageError {
    fn from(err: ExtractError) -> Self {
        Self {
            kind: ErrorKind::MalformedPage,
            message: err.to_string(),
        }
    }
}

/// Combined data for one successfully harvested task
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub task: Task,

    /// Main page fields, with variants merged under `swatch_variants`
    pub fields: FieldSet,

    /// Colour or finish label shown on the main page
    pub label: Option<String>,

    /// Attempt number that produced this record (1-based)
    pub attempts: u32,

    /// Pages fetched successfully in the winning attempt (main + variants)
    pub pages_visited: usize,
}

/// A task whose retry budget was exhausted
#[derive(Debug, Clone, PartialEq)]
pub struct FailureEntry {
    pub task: Task,
    pub last_error: ErrorKind,
    pub message: String,
    pub attempts_made: u32,
}
