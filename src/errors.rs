//! Typed error hierarchy for roadcrew.
//!
//! One enum per pipeline stage, folded together by `RunError`:
//! - `RoadmapError`: roadmap file missing or unreadable
//! - `SelectionError`: user input that cannot be turned into a selection
//! - `AgentError`: agent runner failures (may carry partial output)
//! - `ReconcileError`: status report that is not a JSON array of strings
//! - `QueueError`: job submission rejected by the queue
//! - `RunError`: the terminal failure recorded for a run

use std::path::PathBuf;

use thiserror::Error;

/// Errors from reading the roadmap document.
#[derive(Debug, Error)]
pub enum RoadmapError {
    #[error("Roadmap file '{}' was not found", path.display())]
    NotFound { path: PathBuf },

    #[error("Failed to read roadmap file at {}: {source}", path.display())]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid roadmap heading pattern: {0}")]
    Pattern(#[from] regex::Error),
}

/// Errors from interpreting the user's selection input.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SelectionError {
    #[error("Input is empty")]
    EmptyInput,

    #[error("'{0}' is not a phase number")]
    InvalidIndex(String),
}

/// Errors from the agent runner.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("Failed to launch agent command '{command}': {source}")]
    SpawnFailed {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Agent exited with code {code:?}: {stderr}")]
    NonZeroExit { code: Option<i32>, stderr: String },

    #[error("Agent produced no output")]
    EmptyOutput,

    #[error("Agent call timed out after {secs}s")]
    TimedOut { secs: u64 },

    #[error("Work item '{item}' failed: {source}")]
    Interrupted {
        item: String,
        partial: String,
        #[source]
        source: Box<AgentError>,
    },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl AgentError {
    /// Text produced before the failure, if any.
    pub fn partial_output(&self) -> Option<&str> {
        match self {
            AgentError::Interrupted { partial, .. } if !partial.is_empty() => Some(partial),
            _ => None,
        }
    }
}

/// Errors from parsing the status-report agent output.
#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("Status report is not valid JSON: {0}")]
    InvalidJson(#[source] serde_json::Error),

    #[error("Status report must be a JSON array of strings, got {found}")]
    NotAnArray { found: &'static str },

    #[error("Status report entry {index} is not a string")]
    NonStringEntry { index: usize },
}

/// Errors from submitting a job to the queue.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum QueueError {
    #[error("Job queue is full; try again later")]
    Full,

    #[error("Job queue is shutting down")]
    Closed,
}

/// The terminal failure of a single run.
#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Roadmap(#[from] RoadmapError),

    #[error("Invalid selection: {0}")]
    Selection(#[from] SelectionError),

    #[error("Planning stage failed: {0}")]
    Planning(#[source] AgentError),

    #[error("Development stage failed: {0}")]
    Development(#[source] AgentError),

    #[error("Status update agent failed: {0}")]
    StatusAgent(#[source] AgentError),

    #[error("Status update rejected: {0}")]
    StatusReport(#[from] ReconcileError),

    #[error("Failed to save project status: {0:#}")]
    StatusPersist(#[source] anyhow::Error),
}
