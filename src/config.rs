//! Configuration for roadcrew.
//!
//! Settings are layered: built-in defaults, then `roadcrew.toml` in the
//! project directory (or an explicit `--config` path), then environment
//! variables (a `.env` file is loaded first), then CLI flags.
//!
//! # Configuration File Format
//!
//! ```toml
//! [paths]
//! status_file = "project_status.json"
//! roadmap_file = "project_spec/technologies_and_roadmap.md"
//! system_flow_file = "project_spec/system_flow.md"
//! der_file = "project_spec/der.md"
//! last_run_file = "last_run_results.json"
//!
//! [roadmap]
//! heading_word = "Phase"
//!
//! [server]
//! host = "127.0.0.1"
//! port = 5000
//!
//! [queue]
//! workers = 1
//! capacity = 32
//! history = 100
//!
//! [agent]
//! command = "claude"
//! model = "sonnet"
//! timeout_secs = 900
//!
//! [logging]
//! format = "text"
//! directory = "logs"
//! ```

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Name of the configuration file looked up in the project directory.
pub const CONFIG_FILE_NAME: &str = "roadcrew.toml";

/// Locations of the files a run reads and writes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    #[serde(default = "default_status_file")]
    pub status_file: PathBuf,
    #[serde(default = "default_roadmap_file")]
    pub roadmap_file: PathBuf,
    #[serde(default = "default_system_flow_file")]
    pub system_flow_file: PathBuf,
    #[serde(default = "default_der_file")]
    pub der_file: PathBuf,
    #[serde(default = "default_last_run_file")]
    pub last_run_file: PathBuf,
}

fn default_status_file() -> PathBuf {
    PathBuf::from("project_status.json")
}

fn default_roadmap_file() -> PathBuf {
    PathBuf::from("project_spec/technologies_and_roadmap.md")
}

fn default_system_flow_file() -> PathBuf {
    PathBuf::from("project_spec/system_flow.md")
}

fn default_der_file() -> PathBuf {
    PathBuf::from("project_spec/der.md")
}

fn default_last_run_file() -> PathBuf {
    PathBuf::from("last_run_results.json")
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            status_file: default_status_file(),
            roadmap_file: default_roadmap_file(),
            system_flow_file: default_system_flow_file(),
            der_file: default_der_file(),
            last_run_file: default_last_run_file(),
        }
    }
}

/// Roadmap parsing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoadmapSection {
    /// Word that opens a phase heading ("Phase" in `Phase 1: ...`, "Fase" in Portuguese documents)
    #[serde(default = "default_heading_word")]
    pub heading_word: String,
}

fn default_heading_word() -> String {
    "Phase".to_string()
}

impl Default for RoadmapSection {
    fn default() -> Self {
        Self {
            heading_word: default_heading_word(),
        }
    }
}

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSection {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Permissive CORS for a locally served front-end
    #[serde(default)]
    pub dev_mode: bool,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    5000
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            dev_mode: false,
        }
    }
}

/// Background job queue settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueSection {
    /// Number of runs executed concurrently
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// Maximum number of jobs waiting to be picked up
    #[serde(default = "default_capacity")]
    pub capacity: usize,
    /// Finished jobs kept for status polling
    #[serde(default = "default_history")]
    pub history: usize,
}

fn default_workers() -> usize {
    1
}

fn default_capacity() -> usize {
    32
}

fn default_history() -> usize {
    100
}

impl Default for QueueSection {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            capacity: default_capacity(),
            history: default_history(),
        }
    }
}

/// Agent CLI settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSection {
    /// Agent CLI command (default: "claude")
    #[serde(default = "default_agent_command")]
    pub command: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Per-call timeout; no timeout when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
    /// Extra arguments placed before the generated ones
    #[serde(default)]
    pub extra_args: Vec<String>,
}

fn default_agent_command() -> String {
    "claude".to_string()
}

impl Default for AgentSection {
    fn default() -> Self {
        Self {
            command: default_agent_command(),
            model: None,
            timeout_secs: None,
            extra_args: Vec::new(),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            _ => bail!("Invalid log format '{}'. Valid values: text, json", s),
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingSection {
    #[serde(default)]
    pub format: LogFormat,
    /// Directory for daily-rolling JSON log files
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub directory: Option<PathBuf>,
}

/// The complete configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Directory relative paths are resolved against
    #[serde(skip)]
    pub project_dir: PathBuf,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub roadmap: RoadmapSection,
    #[serde(default)]
    pub server: ServerSection,
    #[serde(default)]
    pub queue: QueueSection,
    #[serde(default)]
    pub agent: AgentSection,
    #[serde(default)]
    pub logging: LoggingSection,
}

impl Config {
    /// Parse configuration from a TOML string.
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse roadcrew.toml")
    }

    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::parse(&content)
    }

    /// Load `roadcrew.toml` from the project directory, or an explicit file.
    /// Returns defaults when no file exists at the implicit location.
    pub fn load_for_project(project_dir: &Path, explicit: Option<&Path>) -> Result<Self> {
        let mut config = match explicit {
            Some(path) => Self::load(path)?,
            None => {
                let path = project_dir.join(CONFIG_FILE_NAME);
                if path.exists() {
                    Self::load(&path)?
                } else {
                    Self::default()
                }
            }
        };
        config.project_dir = project_dir.to_path_buf();
        Ok(config)
    }

    /// Save configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize roadcrew.toml")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    /// Apply environment overrides. `lookup` is `std::env::var(..).ok()` in
    /// production and a map in tests.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let path_vars: [(&str, &mut PathBuf); 5] = [
            ("PROJECT_STATUS_PATH", &mut self.paths.status_file),
            ("TECHNOLOGIES_AND_ROADMAP_SPEC_PATH", &mut self.paths.roadmap_file),
            ("SYSTEM_FLOW_SPEC_PATH", &mut self.paths.system_flow_file),
            ("DER_SPEC_PATH", &mut self.paths.der_file),
            ("LAST_RUN_RESULTS_PATH", &mut self.paths.last_run_file),
        ];
        for (var, slot) in path_vars {
            if let Some(value) = lookup(var).filter(|v| !v.trim().is_empty()) {
                *slot = PathBuf::from(value);
            }
        }

        if let Some(word) = lookup("ROADMAP_HEADING_WORD") {
            self.roadmap.heading_word = word;
        }
        if let Some(host) = lookup("ROADCREW_HOST") {
            self.server.host = host;
        }
        if let Some(port) = lookup("ROADCREW_PORT") {
            self.server.port = port
                .parse()
                .with_context(|| format!("ROADCREW_PORT is not a valid port: {}", port))?;
        }
        if let Some(workers) = lookup("ROADCREW_WORKERS") {
            self.queue.workers = workers
                .parse()
                .with_context(|| format!("ROADCREW_WORKERS is not a number: {}", workers))?;
        }
        if let Some(cmd) = lookup("CLAUDE_CMD") {
            self.agent.command = cmd;
        }
        if let Some(model) = lookup("AGENT_MODEL") {
            self.agent.model = Some(model);
        }
        if let Some(secs) = lookup("AGENT_TIMEOUT_SECS") {
            self.agent.timeout_secs = Some(
                secs.parse()
                    .with_context(|| format!("AGENT_TIMEOUT_SECS is not a number: {}", secs))?,
            );
        }
        if let Some(format) = lookup("ROADCREW_LOG_FORMAT") {
            self.logging.format = format.parse()?;
        }
        Ok(())
    }

    /// Reject settings the runtime cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.queue.workers == 0 {
            bail!("queue.workers must be at least 1");
        }
        if self.queue.capacity == 0 {
            bail!("queue.capacity must be at least 1");
        }
        if self.roadmap.heading_word.trim().is_empty() {
            bail!("roadmap.heading_word must not be empty");
        }
        if self.agent.command.trim().is_empty() {
            bail!("agent.command must not be empty");
        }
        Ok(())
    }

    /// Resolve a configured path against the project directory.
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.project_dir.join(path)
        }
    }

    pub fn status_file(&self) -> PathBuf {
        self.resolve(&self.paths.status_file)
    }

    pub fn roadmap_file(&self) -> PathBuf {
        self.resolve(&self.paths.roadmap_file)
    }

    pub fn system_flow_file(&self) -> PathBuf {
        self.resolve(&self.paths.system_flow_file)
    }

    pub fn der_file(&self) -> PathBuf {
        self.resolve(&self.paths.der_file)
    }

    pub fn last_run_file(&self) -> PathBuf {
        self.resolve(&self.paths.last_run_file)
    }

    pub fn log_dir(&self) -> Option<PathBuf> {
        self.logging.directory.as_deref().map(|d| self.resolve(d))
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::tempdir;

    fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.paths.status_file, PathBuf::from("project_status.json"));
        assert_eq!(config.roadmap.heading_word, "Phase");
        assert_eq!(config.server.port, 5000);
        assert_eq!(config.queue.workers, 1);
        assert_eq!(config.agent.command, "claude");
        assert_eq!(config.logging.format, LogFormat::Text);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_partial_file_keeps_defaults() {
        let config = Config::parse(
            r#"
            [roadmap]
            heading_word = "Fase"

            [queue]
            workers = 3
            "#,
        )
        .unwrap();
        assert_eq!(config.roadmap.heading_word, "Fase");
        assert_eq!(config.queue.workers, 3);
        assert_eq!(config.queue.capacity, 32);
        assert_eq!(config.paths.der_file, PathBuf::from("project_spec/der.md"));
    }

    #[test]
    fn test_parse_invalid_toml() {
        let result = Config::parse("[queue\nworkers = ");
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("roadcrew.toml"));
    }

    #[test]
    fn test_env_overrides_paths_and_agent() {
        let mut config = Config::default();
        config
            .apply_env(env_from(&[
                ("PROJECT_STATUS_PATH", "state/status.json"),
                ("TECHNOLOGIES_AND_ROADMAP_SPEC_PATH", "docs/roadmap.md"),
                ("CLAUDE_CMD", "/opt/bin/claude"),
                ("AGENT_MODEL", "opus"),
                ("ROADCREW_PORT", "8080"),
                ("ROADCREW_LOG_FORMAT", "json"),
            ]))
            .unwrap();
        assert_eq!(config.paths.status_file, PathBuf::from("state/status.json"));
        assert_eq!(config.paths.roadmap_file, PathBuf::from("docs/roadmap.md"));
        assert_eq!(config.agent.command, "/opt/bin/claude");
        assert_eq!(config.agent.model.as_deref(), Some("opus"));
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.logging.format, LogFormat::Json);
    }

    #[test]
    fn test_blank_env_path_is_ignored() {
        let mut config = Config::default();
        config
            .apply_env(env_from(&[("PROJECT_STATUS_PATH", "  ")]))
            .unwrap();
        assert_eq!(config.paths.status_file, default_status_file());
    }

    #[test]
    fn test_env_rejects_bad_port() {
        let mut config = Config::default();
        let result = config.apply_env(env_from(&[("ROADCREW_PORT", "eighty")]));
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_rejects_zero_workers() {
        let mut config = Config::default();
        config.queue.workers = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_blank_heading_word() {
        let mut config = Config::default();
        config.roadmap.heading_word = " ".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_resolve_relative_and_absolute() {
        let mut config = Config::default();
        config.project_dir = PathBuf::from("/srv/project");
        assert_eq!(
            config.status_file(),
            PathBuf::from("/srv/project/project_status.json")
        );
        config.paths.der_file = PathBuf::from("/abs/der.md");
        assert_eq!(config.der_file(), PathBuf::from("/abs/der.md"));
    }

    #[test]
    fn test_load_for_project_without_file_uses_defaults() {
        let dir = tempdir().unwrap();
        let config = Config::load_for_project(dir.path(), None).unwrap();
        assert_eq!(config.project_dir, dir.path());
        assert_eq!(config.server.host, "127.0.0.1");
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempdir().unwrap();
        let mut config = Config::default();
        config.agent.model = Some("sonnet".into());
        config.queue.history = 7;
        let path = dir.path().join(CONFIG_FILE_NAME);
        config.save(&path).unwrap();

        let loaded = Config::load_for_project(dir.path(), None).unwrap();
        assert_eq!(loaded.agent.model.as_deref(), Some("sonnet"));
        assert_eq!(loaded.queue.history, 7);
    }
}
