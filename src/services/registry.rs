//! Instance registry: create, rename and delete instances and edit their mod lists.
//!
//! Every mutation goes through the [`Store`] before the in-memory copy changes. The registry never
//! touches the managed directory; whether an instance is active is read from [`StateManager`].

use crate::error::InvalidOperation;
use crate::models::{Instance, InstanceId, InstanceState, ModId};
use crate::persistence::Store;
use crate::services::library::ModLibrary;
use crate::state::StateManager;
use anyhow::Context;
use indexmap::IndexMap;
use std::sync::Arc;
use thiserror::Error;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("Instance '{0}' not found")]
    NotFound(String),

    #[error("An instance named '{0}' already exists")]
    InstanceExists(InstanceId),

    #[error("Invalid instance name: '{0}'")]
    InvalidName(String),

    #[error("Mod '{mod_id}' is not part of instance '{instance}'")]
    ModNotInInstance { instance: InstanceId, mod_id: ModId },

    #[error(transparent)]
    Invalid(#[from] InvalidOperation),

    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

/// Result of adding several mods at once.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ModsAdded {
    pub added: usize,
    pub skipped: usize,
}

pub struct InstanceRegistry {
    store: Arc<dyn Store>,
    state: StateManager,
    instances: IndexMap<InstanceId, Instance>,
}

impl InstanceRegistry {
    /// Load every persisted instance record.
    pub fn load(store: Arc<dyn Store>, state: StateManager) -> anyhow::Result<Self> {
        let instances = store
            .load_instances()
            .context("Failed to load instances")?
            .into_iter()
            .map(|instance| (instance.id.clone(), instance))
            .collect();
        let mut registry = Self {
            store,
            state,
            instances,
        };
        registry.sort();
        Ok(registry)
    }

    fn sort(&mut self) {
        self.instances
            .sort_by(|_, a, _, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()));
    }

    /// Instances ordered by display name.
    pub fn list(&self) -> impl Iterator<Item = &Instance> + '_ {
        self.instances.values()
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    pub fn get(&self, id: &InstanceId) -> Option<&Instance> {
        self.instances.get(id)
    }

    /// Look an instance up by identifier, then by display name (case-insensitive).
    pub fn find(&self, query: &str) -> Option<&Instance> {
        if let Some(instance) = self.instances.get(&InstanceId::new(query)) {
            return Some(instance);
        }
        let lowered = query.to_lowercase();
        self.instances
            .values()
            .find(|instance| instance.name.to_lowercase() == lowered)
            .or_else(|| {
                InstanceId::from_name(query).and_then(|slug| self.instances.get(&slug))
            })
    }

    /// Like [`find`](Self::find) but returns the identifier or `NotFound`.
    pub fn resolve(&self, query: &str) -> Result<InstanceId, RegistryError> {
        self.find(query)
            .map(|instance| instance.id.clone())
            .ok_or_else(|| RegistryError::NotFound(query.to_string()))
    }

    pub fn state_of(&self, id: &InstanceId) -> InstanceState {
        self.state.read(|state| state.instance_state(id))
    }

    pub fn create(&mut self, name: &str) -> Result<&Instance, RegistryError> {
        let name = name.trim();
        let id =
            InstanceId::from_name(name).ok_or_else(|| RegistryError::InvalidName(name.to_string()))?;
        if self.instances.contains_key(&id) {
            return Err(RegistryError::InstanceExists(id));
        }

        let created = OffsetDateTime::now_utc()
            .format(&Rfc3339)
            .context("Failed to format creation time")?;
        let instance = Instance::new(id.clone(), name, created);
        self.store.save_instance(&instance)?;
        tracing::info!("Created instance '{}' ({})", instance.name, id);

        self.instances.insert(id.clone(), instance);
        self.sort();
        self.instances
            .get(&id)
            .ok_or_else(|| RegistryError::NotFound(id.to_string()))
    }

    /// Change the display name. The identifier stays the same.
    pub fn rename(&mut self, id: &InstanceId, name: &str) -> Result<(), RegistryError> {
        let name = name.trim();
        if InstanceId::from_name(name).is_none() {
            return Err(RegistryError::InvalidName(name.to_string()));
        }
        let name = name.to_string();
        self.mutate(id, |instance| instance.name = name)?;
        self.sort();
        Ok(())
    }

    /// Delete an instance record. Refused while the instance is active or being activated.
    pub fn delete(&mut self, id: &InstanceId) -> Result<Instance, RegistryError> {
        if !self.instances.contains_key(id) {
            return Err(RegistryError::NotFound(id.to_string()));
        }
        self.ensure_not_busy(id)?;
        if self.state.read(|state| state.is_active(id)) {
            return Err(InvalidOperation::InstanceActive(id.clone()).into());
        }

        self.store.delete_instance(id)?;
        let removed = self
            .instances
            .shift_remove(id)
            .ok_or_else(|| RegistryError::NotFound(id.to_string()))?;
        tracing::info!("Deleted instance '{}'", removed.name);
        Ok(removed)
    }

    /// Append `mod_id` as enabled. Returns `false` if it was already referenced.
    pub fn add_mod(&mut self, id: &InstanceId, mod_id: ModId) -> Result<bool, RegistryError> {
        self.ensure_not_busy(id)?;
        if self.require(id)?.contains(&mod_id) {
            return Ok(false);
        }
        self.mutate(id, |instance| instance.add_mod(mod_id))
    }

    /// Append every mod in `mod_ids` that the instance does not reference yet.
    pub fn add_mods<I>(&mut self, id: &InstanceId, mod_ids: I) -> Result<ModsAdded, RegistryError>
    where
        I: IntoIterator<Item = ModId>,
    {
        let mod_ids: Vec<ModId> = mod_ids.into_iter().collect();
        self.mutate(id, |instance| {
            let mut summary = ModsAdded::default();
            for mod_id in mod_ids {
                if instance.add_mod(mod_id) {
                    summary.added += 1;
                } else {
                    summary.skipped += 1;
                }
            }
            summary
        })
    }

    /// Add every library mod not already present.
    pub fn add_library_mods(
        &mut self,
        id: &InstanceId,
        library: &ModLibrary,
    ) -> Result<ModsAdded, RegistryError> {
        let summary = self.add_mods(id, library.mods().map(|m| m.id.clone()))?;
        tracing::info!(
            "Scanned library into '{}': {} added, {} already present",
            id,
            summary.added,
            summary.skipped
        );
        Ok(summary)
    }

    pub fn remove_mod(&mut self, id: &InstanceId, mod_id: &ModId) -> Result<(), RegistryError> {
        self.require_mod(id, mod_id)?;
        self.mutate(id, |instance| {
            instance.remove_mod(mod_id);
        })
    }

    pub fn set_enabled(
        &mut self,
        id: &InstanceId,
        mod_id: &ModId,
        enabled: bool,
    ) -> Result<(), RegistryError> {
        self.require_mod(id, mod_id)?;
        self.mutate(id, |instance| {
            instance.set_enabled(mod_id, enabled);
        })
    }

    /// Flip the enabled flag. Returns the new value.
    pub fn toggle(&mut self, id: &InstanceId, mod_id: &ModId) -> Result<bool, RegistryError> {
        let index = self.require_mod(id, mod_id)?;
        let enabled = !self.require(id)?.mods[index].enabled;
        self.set_enabled(id, mod_id, enabled)?;
        Ok(enabled)
    }

    pub fn move_up(&mut self, id: &InstanceId, mod_id: &ModId) -> Result<(), RegistryError> {
        let index = self.require_mod(id, mod_id)?;
        self.mutate(id, |instance| instance.move_up(index))
    }

    pub fn move_down(&mut self, id: &InstanceId, mod_id: &ModId) -> Result<(), RegistryError> {
        let index = self.require_mod(id, mod_id)?;
        self.mutate(id, |instance| instance.move_down(index))
    }

    /// Move a mod to a zero-based `position`, clamped to the end of the list.
    pub fn move_to(
        &mut self,
        id: &InstanceId,
        mod_id: &ModId,
        position: usize,
    ) -> Result<(), RegistryError> {
        self.require_mod(id, mod_id)?;
        self.mutate(id, |instance| {
            instance.move_to(mod_id, position);
        })
    }

    fn require(&self, id: &InstanceId) -> Result<&Instance, RegistryError> {
        self.instances
            .get(id)
            .ok_or_else(|| RegistryError::NotFound(id.to_string()))
    }

    fn require_mod(&self, id: &InstanceId, mod_id: &ModId) -> Result<usize, RegistryError> {
        self.require(id)?
            .position_of(mod_id)
            .ok_or_else(|| RegistryError::ModNotInInstance {
                instance: id.clone(),
                mod_id: mod_id.clone(),
            })
    }

    fn ensure_not_busy(&self, id: &InstanceId) -> Result<(), InvalidOperation> {
        if self.state.read(|state| state.is_activation_target(id)) {
            return Err(InvalidOperation::InstanceBusy(id.clone()));
        }
        Ok(())
    }

    /// Apply `f` to a copy, persist the copy, then replace the in-memory record.
    fn mutate<F, R>(&mut self, id: &InstanceId, f: F) -> Result<R, RegistryError>
    where
        F: FnOnce(&mut Instance) -> R,
    {
        self.ensure_not_busy(id)?;
        let mut updated = self.require(id)?.clone();
        let result = f(&mut updated);
        self.store.save_instance(&updated)?;
        tracing::debug!("Saved instance '{}' ({} mods)", updated.id, updated.mods.len());
        self.instances.insert(id.clone(), updated);
        Ok(result)
    }
}
