//! Foreground run and dry-run commands: `roadcrew run`, `roadcrew tasks`.

use anyhow::{Context, Result, bail};
use std::sync::Arc;

use roadcrew::agent::ClaudeCliRunner;
use roadcrew::config::Config;
use roadcrew::orchestrator::{self, Orchestrator};
use roadcrew::results::RunResult;
use roadcrew::roadmap::RoadmapReader;
use roadcrew::selection::{RunRequest, Selection};

pub async fn cmd_run(config: &Config, request: RunRequest, json: bool) -> Result<()> {
    config.validate()?;
    let runner = Arc::new(ClaudeCliRunner::from_config(
        &config.agent,
        config.project_dir.clone(),
    ));
    let orchestrator = Orchestrator::new(config, runner).context("Invalid roadmap settings")?;

    let result = orchestrator.execute(&request).await;

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&result).context("Failed to serialize run result")?
        );
    } else {
        print_result(&result);
    }

    if let Some(err) = &result.error {
        bail!("{}", err);
    }
    Ok(())
}

fn print_result(result: &RunResult) {
    if let Some(plan) = &result.planning_result {
        println!("=== Plan ===\n{}\n", plan);
    }
    if let Some(dev) = &result.development_result {
        println!("=== Development ===\n{}\n", dev);
    }
    if result.newly_completed_items.is_empty() {
        println!("No new items completed.");
    } else {
        println!("Newly completed:");
        for item in &result.newly_completed_items {
            println!("  - {}", item);
        }
    }
    println!(
        "Completed items: {}",
        result.current_completed_tasks_after_run.len()
    );
}

pub fn cmd_tasks(config: &Config, request: &RunRequest) -> Result<()> {
    let reader = RoadmapReader::new(config.roadmap_file(), &config.roadmap.heading_word)?;
    let (selection, items) = orchestrator::plan(&reader, request)?;

    match &selection {
        Selection::Phases(selected) if selected.is_empty() => {
            println!("No roadmap phases matched the selection.");
        }
        Selection::Phases(selected) => {
            println!("Selected phases:");
            for phase in selected {
                println!("  - {}", phase.name);
            }
        }
        Selection::Instruction(text) => println!("Instruction: {}", text),
    }

    println!();
    if items.is_empty() {
        println!("No work items.");
        return Ok(());
    }
    println!("Work items (in execution order):");
    for (pos, item) in items.iter().enumerate() {
        println!(
            "  {}. {:<34} {} [{}]",
            pos + 1,
            item.id(),
            item.title(),
            item.role()
        );
    }
    Ok(())
}
