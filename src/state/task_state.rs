/// Task state definitions for the per-task retry state machine
///
/// This module defines the states a task moves through while it is harvested
/// and which transitions between them are legal.
use crate::HarvestError;
use std::fmt;

/// Represents the current state of a task in the harvest pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskState {
    // ===== Active States =====
    /// Task has not been started
    Pending,

    /// A page (main or variant) is being fetched
    Fetching,

    /// Fields are being extracted from a fetched page
    Extracting,

    /// Variant sub-pages are being discovered
    Expanding,

    /// Main page and variant fields are being merged into a record
    Combining,

    /// The current attempt failed and another one will start
    Retrying,

    // ===== Terminal States =====
    /// A record was produced
    Succeeded,

    /// All attempts failed
    Exhausted,
}

impl TaskState {
    /// Returns true if no further processing will happen
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Exhausted)
    }

    /// Returns true if the task is still being worked on
    pub fn is_active(&self) -> bool {
        !self.is_terminal()
    }

    /// Returns true if `next` may directly follow this state
    ///
    /// ```text
    /// Pending -> Fetching -> Extracting -> (Expanding -> Fetching -> Extracting)*
    ///         -> Combining -> Succeeded
    /// Fetching | Extracting | Expanding -> Retrying | Exhausted
    /// Retrying -> Fetching
    /// ```
    pub fn can_transition_to(&self, next: TaskState) -> bool {
        use TaskState::*;
        matches!(
            (self, next),
            (Pending, Fetching)
                | (Fetching, Extracting)
                | (Fetching, Expanding)
                | (Fetching, Retrying)
                | (Fetching, Exhausted)
                | (Extracting, Expanding)
                | (Extracting, Combining)
                | (Extracting, Retrying)
                | (Extracting, Exhausted)
                | (Expanding, Fetching)
                | (Expanding, Combining)
                | (Expanding, Retrying)
                | (Expanding, Exhausted)
                | (Combining, Succeeded)
                | (Retrying, Fetching)
        )
    }

    /// Moves to `next`, rejecting illegal transitions
    pub fn transition(self, next: TaskState) -> Result<TaskState, HarvestError> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(HarvestError::InvalidTransition {
                from: self,
                to: next,
            })
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Fetching => "fetching",
            Self::Extracting => "extracting",
            Self::Expanding => "expanding",
            Self::Combining => "combining",
            Self::Retrying => "retrying",
            Self::Succeeded => "succeeded",
            Self::Exhausted => "exhausted",
        }
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
