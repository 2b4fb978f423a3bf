//! Orchestration of a single run.
//!
//! Stages, in order: load status → read roadmap → select → assemble tasks →
//! plan → develop → status report → merge completions. Every failure is
//! terminal for the run and recorded in the returned `RunResult`, which is
//! also persisted as the last run.

use async_trait::async_trait;
use chrono::Utc;
use std::path::PathBuf;
use std::sync::Arc;

use crate::agent::{AgentRunner, ProjectDocs, RunContext};
use crate::config::Config;
use crate::errors::{RoadmapError, RunError};
use crate::jobs::RunExecutor;
use crate::reconcile::parse_completions;
use crate::results::{LastRunStore, RunResult};
use crate::roadmap::RoadmapReader;
use crate::selection::{RunRequest, Selection, select};
use crate::status::{CompletedItems, StatusStore};
use crate::tasks::{WorkItem, assemble};

/// Development text recorded when the selection maps to no work items.
pub const NO_DEVELOPMENT_TASKS: &str = "No development tasks were executed.";

pub struct Orchestrator {
    runner: Arc<dyn AgentRunner>,
    roadmap: RoadmapReader,
    status: StatusStore,
    last_run: LastRunStore,
    system_flow_file: PathBuf,
    der_file: PathBuf,
}

impl Orchestrator {
    pub fn new(config: &Config, runner: Arc<dyn AgentRunner>) -> Result<Self, RoadmapError> {
        Ok(Self {
            runner,
            roadmap: RoadmapReader::new(config.roadmap_file(), &config.roadmap.heading_word)?,
            status: StatusStore::new(config.status_file()),
            last_run: LastRunStore::new(config.last_run_file()),
            system_flow_file: config.system_flow_file(),
            der_file: config.der_file(),
        })
    }

    pub fn roadmap(&self) -> &RoadmapReader {
        &self.roadmap
    }

    pub fn status_store(&self) -> &StatusStore {
        &self.status
    }

    pub fn last_run_store(&self) -> &LastRunStore {
        &self.last_run
    }

    /// Selection and task assembly only, without any agent calls.
    pub fn plan(&self, request: &RunRequest) -> Result<(Selection, Vec<WorkItem>), RunError> {
        plan(&self.roadmap, request)
    }

    /// Execute one run end to end and persist its result.
    pub async fn execute(&self, request: &RunRequest) -> RunResult {
        let before = self.status.load_async().await;
        let mut result = RunResult {
            current_completed_tasks_after_run: before.to_vec(),
            ..RunResult::default()
        };

        tracing::info!(input = %request.input, mode = %request.mode, "run started");
        match self.run_stages(request, &before, &mut result).await {
            Ok(()) => tracing::info!(
                newly_completed = result.newly_completed_items.len(),
                "run finished"
            ),
            Err(err) => {
                tracing::error!(error = %err, "run failed");
                result.error = Some(err.to_string());
                result.newly_completed_items.clear();
                result.current_completed_tasks_after_run = before.to_vec();
            }
        }
        result.finished_at = Some(Utc::now());

        let store = self.last_run.clone();
        let snapshot = result.clone();
        match tokio::task::spawn_blocking(move || store.save(&snapshot)).await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                tracing::warn!(error = %format!("{:#}", err), "failed to save last run");
            }
            Err(err) => tracing::warn!(error = %err, "last run save task failed"),
        }
        result
    }

    async fn run_stages(
        &self,
        request: &RunRequest,
        before: &CompletedItems,
        result: &mut RunResult,
    ) -> Result<(), RunError> {
        let document = self.roadmap.read_document_async().await?;
        let phases = self.roadmap.phases_in(&document);
        let selection = select(&request.input, request.mode, &phases)?;
        let items = assemble(&selection);
        result.work_items = items.clone();
        tracing::info!(
            phases = selection.phases().len(),
            work_items = items.len(),
            "tasks assembled"
        );

        let ctx = RunContext {
            completed: before.to_vec(),
            docs: ProjectDocs::load(document, &self.system_flow_file, &self.der_file).await,
        };

        let planning = self
            .runner
            .run_planning(&selection.planning_brief(), &ctx)
            .await
            .map_err(RunError::Planning)?;
        result.planning_result = Some(planning.clone());
        tracing::info!("planning stage complete");

        let development = if items.is_empty() {
            NO_DEVELOPMENT_TASKS.to_string()
        } else {
            match self.runner.run_development(&items, &ctx).await {
                Ok(text) => text,
                Err(err) => {
                    result.development_result = err.partial_output().map(str::to_string);
                    return Err(RunError::Development(err));
                }
            }
        };
        result.development_result = Some(development.clone());
        tracing::info!("development stage complete");

        let report = self
            .runner
            .report_completions(&planning, &development, &ctx)
            .await
            .map_err(RunError::StatusAgent)?;
        let reported = parse_completions(&report)?;

        let after = self
            .status
            .merge_async(reported.clone())
            .await
            .map_err(RunError::StatusPersist)?;

        let mut newly = Vec::new();
        for name in reported {
            if !before.contains(&name) && !newly.contains(&name) {
                newly.push(name);
            }
        }
        result.newly_completed_items = newly;
        result.current_completed_tasks_after_run = after.to_vec();
        Ok(())
    }
}

/// Read the roadmap, interpret the request and assemble the ordered work items.
pub fn plan(
    roadmap: &RoadmapReader,
    request: &RunRequest,
) -> Result<(Selection, Vec<WorkItem>), RunError> {
    let phases = roadmap.read_phases()?;
    let selection = select(&request.input, request.mode, &phases)?;
    let items = assemble(&selection);
    Ok((selection, items))
}

#[async_trait]
impl RunExecutor for Orchestrator {
    async fn execute(&self, request: &RunRequest) -> RunResult {
        Orchestrator::execute(self, request).await
    }
}
