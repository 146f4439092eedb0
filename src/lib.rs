pub mod client;
pub mod core;
pub mod handler;
pub mod models;
pub mod observability;
pub mod server;

pub use crate::core::config::Config;
pub use handler::{handle_event, DriftService};
pub use models::assessment::{DriftError, DriftResult, Severity};
