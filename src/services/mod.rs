//! Services module - business logic for instance activation.
//!
//! The services have no dependencies on any front end, so the CLI (and tests) drive them
//! directly.
//!
//! # Components
//!
//! - [`ActivationEngine`]: clears and rebuilds the reserved-prefix symlinks in the game's mod
//!   directory. Produces:
//!   - [`ActivationReport`]: per-mod outcomes ([`ModStatus`]: created, missing, failed)
//!   - [`DeactivationReport`]: removed entries and per-entry removal failures
//!   - [`DriftReport`]: difference between disk and the active instance
//!
//! - [`ConflictDetector`]: advisory [`ConflictRule`]s over an instance's enabled mods
//!
//! - [`InstanceRegistry`]: instance CRUD and mod-list editing, persisted through the store
//!
//! - [`ModLibrary`]: the central `.pak` store, with `.zip`/`.7z` import
//!
//! - [`game_detection`]: Steam/Proton discovery of the game's mod directory
//!
//! - [`ModManager`]: sequencing of all of the above (validate, filesystem, then state)
//!
//! # Usage Example
//!
//! ```ignore
//! use ronmgr::services::ModManager;
//!
//! let mut manager = ModManager::open(&data_dir, Some(&mods_dir))?;
//! let id = manager.registry_mut().create("Realism")?.id.clone();
//! manager.import(&["WeaponPack.pak"], Some(&id))?;
//!
//! let result = manager.activate(&id)?;
//! println!("{}", result.report.summary());
//! ```

pub mod activation;
pub mod conflicts;
pub mod game_detection;
pub mod library;
pub mod manager;
pub mod registry;

pub use activation::{
    ActivationEngine, ActivationError, ActivationReport, DeactivationReport, DriftReport,
    FailureReason, ModOutcome, ModStatus, SYMLINK_PREFIX,
};
pub use conflicts::{
    AiBehaviorRule, ConflictDetector, ConflictRule, ConflictWarning, DuplicateVersionRule,
};
pub use game_detection::{GameDetectionError, GameLocator, launch_command};
pub use library::{ImportOutcome, LibraryError, ModLibrary};
pub use manager::{ActivationResult, ImportSummary, ManagerError, ModManager, Status};
pub use registry::{InstanceRegistry, ModsAdded, RegistryError};
