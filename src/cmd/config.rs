//! Configuration view and validation commands: `roadcrew config`.

use anyhow::{Context, Result};

use roadcrew::config::{CONFIG_FILE_NAME, Config};

use super::super::ConfigCommands;

pub fn cmd_config(config: &Config, command: Option<ConfigCommands>) -> Result<()> {
    match command {
        None | Some(ConfigCommands::Show) => {
            let config_path = config.project_dir.join(CONFIG_FILE_NAME);
            if config_path.exists() {
                println!("# Config file: {}", config_path.display());
            } else {
                println!("# No {} found; defaults shown", CONFIG_FILE_NAME);
            }
            println!("# Effective values (with env overrides)");
            println!();
            print!(
                "{}",
                toml::to_string_pretty(config).context("Failed to render configuration")?
            );
            println!();
            println!("# Resolved paths");
            println!("#   status:      {}", config.status_file().display());
            println!("#   roadmap:     {}", config.roadmap_file().display());
            println!("#   system flow: {}", config.system_flow_file().display());
            println!("#   ER spec:     {}", config.der_file().display());
            println!("#   last run:    {}", config.last_run_file().display());
        }
        Some(ConfigCommands::Validate) => {
            config.validate()?;
            let roadmap = config.roadmap_file();
            if !roadmap.exists() {
                println!("Warning: roadmap file {} does not exist", roadmap.display());
            }
            println!("Configuration is valid.");
        }
    }
    Ok(())
}
