//! Agent execution boundary.
//!
//! The orchestrator only sees [`AgentRunner`]; [`ClaudeCliRunner`] is the
//! production implementation that shells out to the agent CLI.

pub mod claude;
pub mod prompts;
pub mod roles;

pub use claude::ClaudeCliRunner;
pub use roles::AgentRole;

use async_trait::async_trait;
use std::path::Path;

use crate::errors::AgentError;
use crate::tasks::WorkItem;

/// Project documents inlined into agent prompts.
#[derive(Debug, Clone, Default)]
pub struct ProjectDocs {
    pub roadmap: String,
    pub system_flow: Option<String>,
    pub der: Option<String>,
}

impl ProjectDocs {
    /// Read the optional supporting documents next to an already-read roadmap.
    pub async fn load(roadmap: String, system_flow: &Path, der: &Path) -> Self {
        let (system_flow, der) = tokio::join!(read_optional(system_flow), read_optional(der));
        Self {
            roadmap,
            system_flow,
            der,
        }
    }
}

async fn read_optional(path: &Path) -> Option<String> {
    match tokio::fs::read_to_string(path).await {
        Ok(content) => Some(content),
        Err(err) => {
            tracing::debug!(path = %path.display(), error = %err, "project document unavailable");
            None
        }
    }
}

/// What every agent call gets to know about the project.
#[derive(Debug, Clone, Default)]
pub struct RunContext {
    /// Completed items at the start of the run
    pub completed: Vec<String>,
    pub docs: ProjectDocs,
}

/// Abstraction over agent execution for testability.
/// Real implementation: `ClaudeCliRunner`. Test doubles script the answers.
#[async_trait]
pub trait AgentRunner: Send + Sync {
    /// Produce a development plan for the instruction.
    async fn run_planning(&self, instruction: &str, ctx: &RunContext)
    -> Result<String, AgentError>;

    /// Execute the ordered work items and return their combined output.
    async fn run_development(
        &self,
        items: &[WorkItem],
        ctx: &RunContext,
    ) -> Result<String, AgentError>;

    /// Ask for the names completed by this run, as a JSON array of strings.
    async fn report_completions(
        &self,
        planning: &str,
        development: &str,
        ctx: &RunContext,
    ) -> Result<String, AgentError>;
}
