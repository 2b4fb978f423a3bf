//! Project commands: `roadcrew init`, `roadcrew phases`, `roadcrew status`.

use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

use roadcrew::config::{CONFIG_FILE_NAME, Config};
use roadcrew::results::LastRunStore;
use roadcrew::roadmap::RoadmapReader;
use roadcrew::status::{CompletedItems, StatusStore};
use roadcrew::tasks::KnownPhase;

const EXAMPLE_ROADMAP: &str = "# Technologies and Development Roadmap\n\n\
## Phase 1: Discovery and Design\n\
## Phase 2: Configuration and Bootstrap\n\
## Phase 3: Iterative Development by Modules/Features\n\
## Phase 4: Comprehensive Testing and Quality\n\
## Phase 5: Deployment and Operation\n";

const EXAMPLE_SYSTEM_FLOW: &str = "# System Flow\n\n\
- User login\n\
- Appointment scheduling\n\
- Chat with patients\n";

const EXAMPLE_DER: &str = "# Entity-Relationship Diagram\n\n\
USER { id PK, name, email }\n\
APPOINTMENT { id PK, user_id FK, date, time }\n";

/// Write `content` to `path` unless it exists (or `force`). Returns whether it was written.
fn seed(path: &Path, content: &str, force: bool) -> Result<bool> {
    if path.exists() && !force {
        return Ok(false);
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    fs::write(path, content).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(true)
}

pub fn cmd_init(config: &Config, force: bool) -> Result<()> {
    let documents = [
        (config.roadmap_file(), EXAMPLE_ROADMAP),
        (config.system_flow_file(), EXAMPLE_SYSTEM_FLOW),
        (config.der_file(), EXAMPLE_DER),
    ];
    for (path, content) in &documents {
        if seed(path, content, force)? {
            println!("Created {}", path.display());
        } else {
            println!("Kept existing {}", path.display());
        }
    }

    let status = StatusStore::new(config.status_file());
    if force || !status.path().exists() {
        status.save(&CompletedItems::new())?;
        println!("Created {}", status.path().display());
    }

    let config_path = config.project_dir.join(CONFIG_FILE_NAME);
    if !config_path.exists() {
        config.save(&config_path)?;
        println!("Created {}", config_path.display());
    }

    println!("Initialized roadcrew project in {}", config.project_dir.display());
    Ok(())
}

pub fn cmd_phases(config: &Config) -> Result<()> {
    let reader = RoadmapReader::new(config.roadmap_file(), &config.roadmap.heading_word)?;
    let phases = reader.read_phases()?;
    if phases.is_empty() {
        println!(
            "No '{} N: ...' headings found in {}",
            config.roadmap.heading_word,
            reader.path().display()
        );
        return Ok(());
    }

    let completed = StatusStore::new(config.status_file()).load();
    for (pos, phase) in phases.iter().enumerate() {
        let mapped = match KnownPhase::from_title(&phase.title) {
            Some(known) => format!("{} work items", known.work_items().len()),
            None => "no mapped work items".to_string(),
        };
        let done = if completed.contains(&phase.name) {
            " [completed]"
        } else {
            ""
        };
        println!("{:>3}. {} ({}){}", pos + 1, phase.name, mapped, done);
    }
    Ok(())
}

pub fn cmd_status(config: &Config) -> Result<()> {
    let completed = StatusStore::new(config.status_file()).load();
    if completed.is_empty() {
        println!("No completed items.");
    } else {
        println!("Completed items ({}):", completed.len());
        for item in completed.iter() {
            println!("  - {}", item);
        }
    }

    println!();
    match LastRunStore::new(config.last_run_file()).load() {
        Some(run) => {
            let when = run
                .finished_at
                .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
                .unwrap_or_else(|| "unknown time".to_string());
            println!("Last run ({}): {}", when, run.summary());
        }
        None => println!("No runs yet."),
    }
    Ok(())
}
