//! Data models for ronmgr.
//!
//! - [`Mod`] / [`ModId`]: a `.pak` file tracked by the central library
//! - [`Instance`] / [`ModRef`] / [`InstanceId`]: a named profile selecting which mods are enabled
//! - [`AppState`]: the active-instance pointer plus the runtime activation marker
//! - [`UserConfig`]: user settings loaded from `ronmgr.yaml`
//!
//! # Architecture Note
//!
//! Instances and library entries are plain serializable values. Whether an instance is active is
//! never stored on the instance itself; it is derived from [`AppState`], which is only reachable
//! through [`StateManager`](crate::state::StateManager).

pub mod app_state;
pub mod config;
pub mod instance;
pub mod mod_entry;

pub use app_state::{AppState, InstanceState};
pub use config::UserConfig;
pub use instance::{Instance, InstanceId, ModRef};
pub use mod_entry::{Mod, ModId};
