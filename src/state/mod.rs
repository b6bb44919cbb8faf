//! State module for tracking harvest progress
//!
//! # Components
//!
//! - `TaskState`: the per-task state machine (fetching, extracting, expanding, retrying, ...)

mod task_state;

pub use task_state::TaskState;
