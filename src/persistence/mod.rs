//! Persistence of instance records and the active-instance pointer.
//!
//! The core only depends on the [`Store`] contract: one record per instance and one global
//! [`AppState`] record. [`JsonStore`] is the on-disk implementation:
//!
//! ```text
//! <data>/state.json                     {"active_instance": "realism"}
//! <data>/instances/<id>/instance.json   {"id", "name", "created", "mods": [{"id", "enabled"}]}
//! ```

pub mod json;

pub use json::JsonStore;

use crate::models::{AppState, Instance, InstanceId};
use anyhow::Result;

/// Key-value contract over persisted records.
#[cfg_attr(test, mockall::automock)]
pub trait Store: Send + Sync {
    /// Load the global state record, or the default when none was ever written.
    fn load_state(&self) -> Result<AppState>;

    fn save_state(&self, state: &AppState) -> Result<()>;

    /// Load every readable instance record.
    fn load_instances(&self) -> Result<Vec<Instance>>;

    fn save_instance(&self, instance: &Instance) -> Result<()>;

    fn delete_instance(&self, id: &InstanceId) -> Result<()>;
}
