//! Orchestration of the registry, library, activation engine and state.
//!
//! [`ModManager`] is the entry point front ends call. It owns the sequencing rules:
//!
//! 1. reject invalid operations before touching the filesystem
//! 2. run the filesystem step through [`ActivationEngine`]
//! 3. only then persist and publish the new active-instance pointer

use crate::error::InvalidOperation;
use crate::metrics::Metrics;
use crate::models::{Instance, InstanceId, Mod, ModId};
use crate::persistence::{JsonStore, Store};
use crate::services::activation::{
    ActivationEngine, ActivationError, ActivationReport, DeactivationReport, DriftReport,
};
use crate::services::conflicts::{ConflictDetector, ConflictWarning};
use crate::services::library::{ImportOutcome, LibraryError, ModLibrary};
use crate::services::registry::{InstanceRegistry, ModsAdded, RegistryError};
use crate::state::{StateError, StateManager};
use anyhow::Context;
use camino::{Utf8Path, Utf8PathBuf};
use std::sync::Arc;
use thiserror::Error;

/// Library directory name under the data directory.
pub const LIBRARY_DIR: &str = "mods";

#[derive(Error, Debug)]
pub enum ManagerError {
    #[error("Game mod directory is not available; configure game_mods_dir or install the game")]
    NoManagedDirectory,

    #[error(transparent)]
    Activation(#[from] ActivationError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Library(#[from] LibraryError),

    #[error(transparent)]
    State(#[from] StateError),

    #[error(transparent)]
    Invalid(#[from] InvalidOperation),
}

/// What an activation did, plus the advisory warnings computed before it ran.
#[derive(Debug, Clone)]
pub struct ActivationResult {
    pub report: ActivationReport,
    pub warnings: Vec<ConflictWarning>,
}

/// A path that could not be imported.
#[derive(Debug)]
pub struct ImportFailure {
    pub path: Utf8PathBuf,
    pub error: LibraryError,
}

#[derive(Debug, Default)]
pub struct ImportSummary {
    pub imported: Vec<Mod>,
    pub already_present: Vec<Mod>,
    pub failures: Vec<ImportFailure>,
    /// Set when the mods were also added to an instance
    pub added: Option<ModsAdded>,
}

impl ImportSummary {
    /// Every mod the import resolved, new or not, in import order.
    pub fn mod_ids(&self) -> Vec<ModId> {
        self.imported
            .iter()
            .chain(self.already_present.iter())
            .map(|m| m.id.clone())
            .collect()
    }
}

/// Snapshot for `status`.
#[derive(Debug, Clone)]
pub struct Status {
    pub active: Option<Instance>,
    /// Set when the persisted pointer names an instance that no longer exists
    pub dangling_active: Option<InstanceId>,
    pub managed_dir: Option<Utf8PathBuf>,
    pub drift: Option<DriftReport>,
    pub library_mods: usize,
    pub instances: usize,
}

pub struct ModManager {
    state: StateManager,
    registry: InstanceRegistry,
    library: ModLibrary,
    engine: Option<ActivationEngine>,
    detector: ConflictDetector,
    metrics: Arc<Metrics>,
}

impl ModManager {
    /// Assemble a manager from its parts. `engine` is `None` when no game directory was found;
    /// everything except activation and deactivation still works.
    pub fn new(
        store: Arc<dyn Store>,
        library: ModLibrary,
        engine: Option<ActivationEngine>,
    ) -> anyhow::Result<Self> {
        let state = StateManager::load(Arc::clone(&store)).context("Failed to load state")?;
        let registry = InstanceRegistry::load(store, state.clone())?;
        Ok(Self {
            state,
            registry,
            library,
            engine,
            detector: ConflictDetector::default(),
            metrics: Arc::new(Metrics::new()),
        })
    }

    /// JSON store and library under `data_dir`, engine bound to `managed_dir` if given.
    pub fn open(data_dir: &Utf8Path, managed_dir: Option<&Utf8Path>) -> anyhow::Result<Self> {
        let store: Arc<dyn Store> = Arc::new(JsonStore::open(data_dir)?);
        let library = ModLibrary::open(data_dir.join(LIBRARY_DIR))
            .context("Failed to open mod library")?;
        Self::new(store, library, managed_dir.map(ActivationEngine::new))
    }

    pub fn with_detector(mut self, detector: ConflictDetector) -> Self {
        self.detector = detector;
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn state(&self) -> &StateManager {
        &self.state
    }

    pub fn registry(&self) -> &InstanceRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut InstanceRegistry {
        &mut self.registry
    }

    pub fn library(&self) -> &ModLibrary {
        &self.library
    }

    pub fn engine(&self) -> Option<&ActivationEngine> {
        self.engine.as_ref()
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    pub fn active_instance(&self) -> Option<InstanceId> {
        self.state.active_instance()
    }

    fn require_engine(&self) -> Result<&ActivationEngine, ManagerError> {
        self.engine.as_ref().ok_or(ManagerError::NoManagedDirectory)
    }

    fn require_instance(&self, id: &InstanceId) -> Result<&Instance, ManagerError> {
        self.registry
            .get(id)
            .ok_or_else(|| RegistryError::NotFound(id.to_string()).into())
    }

    /// Make `id` the active instance. Switching from another instance is the same call.
    pub fn activate(&mut self, id: &InstanceId) -> Result<ActivationResult, ManagerError> {
        self.require_engine()?;
        let instance = self.require_instance(id)?.clone();
        let _slot = self.state.begin_activation(id)?;

        self.library.refresh()?;

        let enabled: Vec<ModId> = instance.enabled_mods().cloned().collect();
        let warnings = self.detector.evaluate(&enabled);
        for warning in &warnings {
            tracing::warn!("Conflict check: {}", warning);
        }

        let engine = self.require_engine()?;
        let report = engine.activate(&instance, &self.library)?;
        self.metrics.record_activation(&report);

        let changes = self.state.set_active_instance(Some(id.clone()))?;
        self.metrics.record_state_update(&changes);
        tracing::info!("Instance '{}' is now active ({})", instance.name, report.summary());

        Ok(ActivationResult { report, warnings })
    }

    /// Remove every managed entry and clear the active pointer.
    pub fn deactivate(&mut self) -> Result<DeactivationReport, ManagerError> {
        if self.state.read(|state| state.is_activating()) {
            return Err(InvalidOperation::ActivationInProgress.into());
        }
        let report = self.require_engine()?.deactivate()?;
        self.metrics.record_deactivation(&report);

        let changes = self.state.set_active_instance(None)?;
        self.metrics.record_state_update(&changes);
        Ok(report)
    }

    /// Delete an instance. With `force`, an active instance is deactivated first.
    pub fn delete_instance(&mut self, id: &InstanceId, force: bool) -> Result<Instance, ManagerError> {
        self.require_instance(id)?;
        if force && self.state.read(|state| state.is_active(id)) {
            tracing::info!("Deactivating '{}' before deletion", id);
            self.deactivate()?;
        }
        Ok(self.registry.delete(id)?)
    }

    /// Mods referenced by the instance that the library cannot resolve right now.
    pub fn verify(&self, id: &InstanceId) -> Result<Vec<ModId>, ManagerError> {
        let instance = self.require_instance(id)?;
        Ok(self
            .library
            .missing(instance.mods.iter().map(|entry| &entry.mod_id)))
    }

    /// Advisory warnings for the instance's enabled mods.
    pub fn conflicts(&self, id: &InstanceId) -> Result<Vec<ConflictWarning>, ManagerError> {
        let enabled: Vec<ModId> = self.require_instance(id)?.enabled_mods().cloned().collect();
        Ok(self.detector.evaluate(&enabled))
    }

    /// Import `.pak` files and archives, then optionally add the results to `into`.
    ///
    /// A path that fails to import is recorded and the rest are still imported.
    pub fn import<P: AsRef<Utf8Path>>(
        &mut self,
        paths: &[P],
        into: Option<&InstanceId>,
    ) -> Result<ImportSummary, ManagerError> {
        if let Some(id) = into {
            self.require_instance(id)?;
        }

        let mut summary = ImportSummary::default();
        for path in paths {
            let path = path.as_ref();
            match self.library.import_path(path) {
                Ok(outcomes) => {
                    for outcome in outcomes {
                        match outcome {
                            ImportOutcome::Imported(m) => summary.imported.push(m),
                            ImportOutcome::AlreadyPresent(m) => summary.already_present.push(m),
                        }
                    }
                }
                Err(error) => {
                    tracing::warn!("Failed to import {}: {}", path, error);
                    summary.failures.push(ImportFailure {
                        path: path.to_path_buf(),
                        error,
                    });
                }
            }
        }

        if let Some(id) = into {
            summary.added = Some(self.registry.add_mods(id, summary.mod_ids())?);
        }
        Ok(summary)
    }

    /// Add every library mod to the instance.
    pub fn scan_into(&mut self, id: &InstanceId) -> Result<ModsAdded, ManagerError> {
        self.library.refresh()?;
        Ok(self.registry.add_library_mods(id, &self.library)?)
    }

    /// Delete a file from the library. Instances keep their references; they show as missing.
    pub fn delete_library_mod(&mut self, mod_id: &ModId) -> Result<Mod, ManagerError> {
        Ok(self.library.delete_mod(mod_id)?)
    }

    pub fn refresh_library(&mut self) -> Result<(), ManagerError> {
        Ok(self.library.refresh()?)
    }

    pub fn status(&self) -> Result<Status, ManagerError> {
        let active_id = self.state.active_instance();
        let active = active_id.as_ref().and_then(|id| self.registry.get(id)).cloned();
        let dangling_active = active_id.filter(|_| active.is_none());

        let drift = match &self.engine {
            Some(engine) => Some(engine.inspect(active.as_ref(), &self.library)?),
            None => None,
        };

        Ok(Status {
            active,
            dangling_active,
            managed_dir: self.engine.as_ref().map(|e| e.managed_dir().to_path_buf()),
            drift,
            library_mods: self.library.len(),
            instances: self.registry.len(),
        })
    }
}
