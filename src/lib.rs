// ronmgr - instance-based mod manager for Ready or Not under Proton
//
// This is the library crate containing the activation engine, persistence and state.
// The binary crate (main.rs) provides the command-line entry point.

pub mod cli;
pub mod config;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod persistence;
pub mod services;
pub mod state;

// Re-export commonly used types for convenience
pub use config::ConfigManager;
pub use error::InvalidOperation;
pub use metrics::Metrics;
pub use models::{AppState, Instance, InstanceId, InstanceState, Mod, ModId, ModRef, UserConfig};
pub use persistence::{JsonStore, Store};
pub use services::{ActivationEngine, ModLibrary, ModManager};
pub use state::{ActivationGuard, StateChange, StateManager};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
