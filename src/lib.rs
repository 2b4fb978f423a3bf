pub mod agent;
pub mod config;
pub mod errors;
pub mod jobs;
pub mod logging;
pub mod orchestrator;
pub mod reconcile;
pub mod results;
pub mod roadmap;
pub mod selection;
pub mod status;
pub mod tasks;
pub mod util;
pub mod web;
