use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use roadcrew::config::Config;
use roadcrew::logging;
use roadcrew::selection::{RunRequest, SelectionMode};

mod cmd;

#[derive(Parser)]
#[command(name = "roadcrew")]
#[command(version, about = "Roadmap-driven planning and code generation with role-based LLM agents")]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Project directory holding the roadmap, specs and status file (defaults to cwd)
    #[arg(long, global = true)]
    pub project_dir: Option<PathBuf>,

    /// Explicit config file instead of <project-dir>/roadcrew.toml
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Exactly one way of saying what to work on.
#[derive(Args, Clone, Debug)]
#[group(required = true, multiple = false)]
pub struct SelectionArgs {
    /// Comma-separated 1-based roadmap phase numbers, e.g. "1,2"
    #[arg(long)]
    pub phases: Option<String>,

    /// Free-text instruction, never read as phase numbers
    #[arg(long)]
    pub instruction: Option<String>,

    /// Phase numbers if the input is an integer list, otherwise an instruction
    #[arg(long)]
    pub input: Option<String>,
}

impl SelectionArgs {
    pub fn to_request(&self) -> RunRequest {
        match (&self.phases, &self.instruction, &self.input) {
            (Some(phases), _, _) => RunRequest::new(phases.clone(), SelectionMode::Phases),
            (_, Some(text), _) => RunRequest::new(text.clone(), SelectionMode::Instruction),
            (_, _, Some(raw)) => RunRequest::new(raw.clone(), SelectionMode::Auto),
            (None, None, None) => RunRequest::new(String::new(), SelectionMode::Auto),
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the web dashboard and background workers
    Serve {
        #[arg(long)]
        host: Option<String>,

        #[arg(short, long)]
        port: Option<u16>,

        /// Number of runs executed concurrently
        #[arg(long)]
        workers: Option<usize>,

        /// Enable dev mode (permissive CORS, listen on all interfaces)
        #[arg(long)]
        dev: bool,

        /// Open the dashboard in a browser once listening
        #[arg(long)]
        open: bool,
    },
    /// Execute one run in the foreground
    Run {
        #[command(flatten)]
        selection: SelectionArgs,

        /// Print the run result as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show the work items a selection would run, without calling agents
    Tasks {
        #[command(flatten)]
        selection: SelectionArgs,
    },
    /// List roadmap phases with their selection numbers
    Phases,
    /// Show completed items and the last run
    Status,
    /// Create example roadmap, spec documents and an empty status file
    Init {
        /// Overwrite existing files
        #[arg(long)]
        force: bool,
    },
    /// View or validate configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand, Clone)]
pub enum ConfigCommands {
    /// Show the effective configuration
    Show,
    /// Validate configuration
    Validate,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let project_dir = match cli.project_dir.clone() {
        Some(dir) => dir,
        None => std::env::current_dir().context("Failed to get current directory")?,
    };

    // Project .env first; variables already set in the environment win.
    let _ = dotenvy::from_path(project_dir.join(".env"));

    let mut config = Config::load_for_project(&project_dir, cli.config.as_deref())?;
    config.apply_env(|key| std::env::var(key).ok())?;

    let _log_guard = logging::init(config.logging.format, config.log_dir().as_deref(), cli.verbose)?;

    match &cli.command {
        Commands::Serve {
            host,
            port,
            workers,
            dev,
            open,
        } => {
            let overrides = cmd::serve::ServeOverrides {
                host: host.clone(),
                port: *port,
                workers: *workers,
                dev: *dev,
                open: *open,
            };
            cmd::cmd_serve(config, overrides).await?;
        }
        Commands::Run { selection, json } => {
            cmd::cmd_run(&config, selection.to_request(), *json).await?;
        }
        Commands::Tasks { selection } => cmd::cmd_tasks(&config, &selection.to_request())?,
        Commands::Phases => cmd::cmd_phases(&config)?,
        Commands::Status => cmd::cmd_status(&config)?,
        Commands::Init { force } => cmd::cmd_init(&config, *force)?,
        Commands::Config { command } => cmd::cmd_config(&config, command.clone())?,
    }

    Ok(())
}
