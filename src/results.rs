//! The persisted record of the most recent run.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::tasks::WorkItem;
use crate::util::write_atomic;

/// Outcome of one orchestration run.
///
/// `error` is set whenever the run failed; planning and development text
/// produced before the failure is kept.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunResult {
    pub planning_result: Option<String>,
    pub development_result: Option<String>,
    #[serde(default)]
    pub newly_completed_items: Vec<String>,
    pub error: Option<String>,
    #[serde(default)]
    pub current_completed_tasks_after_run: Vec<String>,
    #[serde(default)]
    pub work_items: Vec<WorkItem>,
    #[serde(default)]
    pub finished_at: Option<DateTime<Utc>>,
}

impl RunResult {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    /// One-line description for logs and job status.
    pub fn summary(&self) -> String {
        match &self.error {
            Some(err) => format!("Run failed: {}", err),
            None if self.newly_completed_items.is_empty() => {
                "Run finished; no new items completed.".to_string()
            }
            None => format!(
                "Run finished; newly completed: {}.",
                self.newly_completed_items.join(", ")
            ),
        }
    }
}

/// Reads and writes the last-run results file.
#[derive(Debug, Clone)]
pub struct LastRunStore {
    path: PathBuf,
}

impl LastRunStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the last run, or `None` if there is none or it cannot be parsed.
    pub fn load(&self) -> Option<RunResult> {
        if !self.path.exists() {
            return None;
        }
        let parsed = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read {}", self.path.display()))
            .and_then(|content| {
                serde_json::from_str::<RunResult>(&content)
                    .with_context(|| format!("Failed to parse {}", self.path.display()))
            });
        match parsed {
            Ok(result) => Some(result),
            Err(err) => {
                tracing::warn!(error = %format!("{:#}", err), "ignoring unreadable last-run file");
                None
            }
        }
    }

    /// Async wrapper around [`LastRunStore::load`].
    pub async fn load_async(&self) -> Option<RunResult> {
        let store = self.clone();
        match tokio::task::spawn_blocking(move || store.load()).await {
            Ok(result) => result,
            Err(err) => {
                tracing::error!(error = %err, "last run load task failed");
                None
            }
        }
    }

    /// Overwrite the last-run file.
    pub fn save(&self, result: &RunResult) -> Result<()> {
        let json = serde_json::to_string_pretty(result).context("Failed to serialize run result")?;
        write_atomic(&self.path, &json)
            .with_context(|| format!("Failed to save last run to {}", self.path.display()))
    }
}
