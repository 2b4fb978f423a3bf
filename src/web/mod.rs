//! HTTP surface: dashboard, run submission and job polling.

pub mod api;
pub mod page;
pub mod server;

pub use api::{AppState, SharedState};
pub use server::{ServerOptions, build_router, start_server};
