//! Agent runner backed by the Claude CLI (or any command speaking its flags).

use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use super::prompts::{planning_prompt, status_report_prompt, work_item_prompt};
use super::{AgentRole, AgentRunner, RunContext};
use crate::config::AgentSection;
use crate::errors::AgentError;
use crate::tasks::WorkItem;

/// Runs each agent call as `<command> <extra args> --print --output-format text
/// [--model M] --system-prompt <role>` with the prompt on stdin.
#[derive(Debug, Clone)]
pub struct ClaudeCliRunner {
    command: String,
    model: Option<String>,
    extra_args: Vec<String>,
    timeout: Option<Duration>,
    working_dir: Option<PathBuf>,
}

impl ClaudeCliRunner {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            model: None,
            extra_args: Vec::new(),
            timeout: None,
            working_dir: None,
        }
    }

    pub fn from_config(agent: &AgentSection, working_dir: PathBuf) -> Self {
        Self {
            command: agent.command.clone(),
            model: agent.model.clone(),
            extra_args: agent.extra_args.clone(),
            timeout: agent.timeout_secs.map(Duration::from_secs),
            working_dir: Some(working_dir),
        }
    }

    pub fn with_extra_args(mut self, args: Vec<String>) -> Self {
        self.extra_args = args;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    fn build_command(&self, role: AgentRole) -> Command {
        let mut cmd = Command::new(&self.command);
        cmd.args(&self.extra_args)
            .arg("--print")
            .arg("--output-format")
            .arg("text");
        if let Some(model) = &self.model {
            cmd.arg("--model").arg(model);
        }
        cmd.arg("--system-prompt").arg(role.system_prompt());
        if let Some(dir) = &self.working_dir {
            cmd.current_dir(dir);
        }
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }

    /// Run one agent call and return its trimmed stdout.
    async fn call(&self, role: AgentRole, prompt: &str) -> Result<String, AgentError> {
        let start = Instant::now();
        tracing::debug!(role = %role, prompt_chars = prompt.len(), "invoking agent");

        let mut child = self
            .build_command(role)
            .spawn()
            .map_err(|source| AgentError::SpawnFailed {
                command: self.command.clone(),
                source,
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            let written = match stdin.write_all(prompt.as_bytes()).await {
                Ok(()) => stdin.shutdown().await,
                Err(err) => Err(err),
            };
            // A command that exits without reading stdin still reports through its exit status.
            match written {
                Ok(()) => {}
                Err(err) if err.kind() == ErrorKind::BrokenPipe => {
                    tracing::debug!(role = %role, "agent closed stdin early");
                }
                Err(err) => {
                    return Err(AgentError::Other(
                        anyhow::Error::new(err).context("Failed to write prompt to agent"),
                    ));
                }
            }
        }

        let output = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, child.wait_with_output())
                .await
                .map_err(|_| AgentError::TimedOut {
                    secs: limit.as_secs(),
                })?,
            None => child.wait_with_output().await,
        }
        .map_err(|err| {
            AgentError::Other(anyhow::Error::new(err).context("Failed to wait for agent"))
        })?;

        tracing::debug!(
            role = %role,
            exit = output.status.code().unwrap_or(-1),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "agent finished"
        );

        if !output.status.success() {
            return Err(AgentError::NonZeroExit {
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let text = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if text.is_empty() {
            return Err(AgentError::EmptyOutput);
        }
        Ok(text)
    }
}

#[async_trait]
impl AgentRunner for ClaudeCliRunner {
    async fn run_planning(
        &self,
        instruction: &str,
        ctx: &RunContext,
    ) -> Result<String, AgentError> {
        self.call(AgentRole::ProductOwner, &planning_prompt(instruction, ctx))
            .await
    }

    async fn run_development(
        &self,
        items: &[WorkItem],
        ctx: &RunContext,
    ) -> Result<String, AgentError> {
        let mut finished: Vec<(WorkItem, String)> = Vec::with_capacity(items.len());
        for &item in items {
            tracing::info!(item = %item, role = %item.role(), "running work item");
            let prompt = work_item_prompt(item, &finished, ctx);
            match self.call(item.role(), &prompt).await {
                Ok(output) => finished.push((item, output)),
                Err(source) => {
                    return Err(AgentError::Interrupted {
                        item: item.title().to_string(),
                        partial: combine_outputs(&finished),
                        source: Box::new(source),
                    });
                }
            }
        }
        Ok(combine_outputs(&finished))
    }

    async fn report_completions(
        &self,
        planning: &str,
        development: &str,
        ctx: &RunContext,
    ) -> Result<String, AgentError> {
        self.call(
            AgentRole::ProductOwner,
            &status_report_prompt(planning, development, ctx),
        )
        .await
    }
}

/// Join per-item outputs under their titles.
pub fn combine_outputs(outputs: &[(WorkItem, String)]) -> String {
    outputs
        .iter()
        .map(|(item, text)| format!("## {}\n\n{}", item.title(), text))
        .collect::<Vec<_>>()
        .join("\n\n")
}
