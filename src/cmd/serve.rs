//! `roadcrew serve`: dashboard plus background workers.

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;

use roadcrew::agent::ClaudeCliRunner;
use roadcrew::config::Config;
use roadcrew::jobs::JobQueue;
use roadcrew::orchestrator::Orchestrator;
use roadcrew::web::{AppState, ServerOptions, start_server};

/// How long in-flight runs get to finish after the server stops.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(30);

pub struct ServeOverrides {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub workers: Option<usize>,
    pub dev: bool,
    pub open: bool,
}

pub async fn cmd_serve(mut config: Config, overrides: ServeOverrides) -> Result<()> {
    if let Some(host) = overrides.host {
        config.server.host = host;
    }
    if let Some(port) = overrides.port {
        config.server.port = port;
    }
    if let Some(workers) = overrides.workers {
        config.queue.workers = workers;
    }
    config.server.dev_mode |= overrides.dev;
    config.validate()?;

    let runner = Arc::new(ClaudeCliRunner::from_config(
        &config.agent,
        config.project_dir.clone(),
    ));
    let orchestrator =
        Arc::new(Orchestrator::new(&config, runner).context("Invalid roadmap settings")?);
    let (queue, workers) = JobQueue::start(orchestrator, &config.queue);
    let state = Arc::new(AppState::new(&config, queue).context("Invalid roadmap settings")?);

    tracing::info!(
        project = %config.project_dir.display(),
        agent = %config.agent.command,
        "serving project"
    );

    let served = start_server(
        state,
        ServerOptions {
            host: config.server.host.clone(),
            port: config.server.port,
            dev_mode: config.server.dev_mode,
            open_browser: overrides.open,
        },
    )
    .await;

    workers.shutdown(SHUTDOWN_GRACE).await;
    served
}
