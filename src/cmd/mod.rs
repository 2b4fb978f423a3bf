//! CLI command implementations.
//!
//! | Module    | Commands handled             |
//! |-----------|------------------------------|
//! | `serve`   | `Serve`                      |
//! | `run`     | `Run`, `Tasks`               |
//! | `project` | `Init`, `Phases`, `Status`   |
//! | `config`  | `Config`                     |

pub mod config;
pub mod project;
pub mod run;
pub mod serve;

pub use config::cmd_config;
pub use project::{cmd_init, cmd_phases, cmd_status};
pub use run::{cmd_run, cmd_tasks};
pub use serve::cmd_serve;
