//! Activation engine: projects one instance's enabled mods into the game directory.
//!
//! Every entry the engine creates in the managed directory is a symlink whose name starts with
//! [`SYMLINK_PREFIX`]. That prefix is the only thing separating manager-owned entries from files
//! the user or the game put there, and the engine never reads, modifies or deletes anything
//! without it.
//!
//! Activation always clears every prefixed entry first and then rebuilds the set from the target
//! instance. The engine never diffs against what a previous run intended, so leftovers from a
//! crashed run are removed by the next activation of any instance.

use crate::models::{Instance, InstanceId, Mod, ModId};
use crate::services::library::ModLibrary;
use camino::{Utf8Path, Utf8PathBuf};
use std::collections::{BTreeSet, HashMap};
use std::ffi::OsStr;
use std::fmt;
use std::fs;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Reserved filename prefix of manager-owned entries. Must never change between releases,
/// otherwise links created by older versions can no longer be cleaned up.
pub const SYMLINK_PREFIX: &str = "ronmgr_";

/// Fatal errors: the whole call is aborted before any entry is touched.
#[derive(Error, Debug)]
pub enum ActivationError {
    #[error("Managed directory unavailable: {path}: {source}")]
    DirectoryUnavailable {
        path: Utf8PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Why a single mod could not be linked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
    /// An earlier mod in the same pass already claimed the link name
    NameCollision { first: ModId },
    /// Symlink creation failed (already exists, permission, unsupported filesystem)
    Io(String),
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::NameCollision { first } => {
                write!(f, "name collision with {}", first)
            }
            FailureReason::Io(message) => f.write_str(message),
        }
    }
}

/// Outcome for one enabled mod.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModStatus {
    Created { link: Utf8PathBuf },
    Missing,
    Failed(FailureReason),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModOutcome {
    pub mod_id: ModId,
    pub status: ModStatus,
}

impl fmt::Display for ModOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.status {
            ModStatus::Created { link } => write!(f, "linked {} -> {}", self.mod_id, link),
            ModStatus::Missing => write!(f, "missing {} (not in library)", self.mod_id),
            ModStatus::Failed(reason) => write!(f, "failed {}: {}", self.mod_id, reason),
        }
    }
}

/// A managed entry that could not be removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemovalFailure {
    pub path: PathBuf,
    pub reason: String,
}

/// Paths are plain `PathBuf`s: a stale prefixed entry may carry a name that is not UTF-8.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeactivationReport {
    pub removed: Vec<PathBuf>,
    pub failures: Vec<RemovalFailure>,
}

impl DeactivationReport {
    pub fn removed_count(&self) -> usize {
        self.removed.len()
    }

    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ActivationCounts {
    pub created: usize,
    pub missing: usize,
    pub failed: usize,
}

/// Full result of one activation. Partial success is the common case, so callers get every
/// per-mod outcome rather than a single flag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivationReport {
    pub instance: InstanceId,
    /// What the unconditional clear step removed
    pub cleared: DeactivationReport,
    /// One entry per enabled mod, in instance order
    pub outcomes: Vec<ModOutcome>,
}

impl ActivationReport {
    pub fn counts(&self) -> ActivationCounts {
        let mut counts = ActivationCounts::default();
        for outcome in &self.outcomes {
            match outcome.status {
                ModStatus::Created { .. } => counts.created += 1,
                ModStatus::Missing => counts.missing += 1,
                ModStatus::Failed(_) => counts.failed += 1,
            }
        }
        counts
    }

    pub fn created(&self) -> usize {
        self.counts().created
    }

    pub fn missing(&self) -> usize {
        self.counts().missing
    }

    pub fn failed(&self) -> usize {
        self.counts().failed
    }

    pub fn is_complete(&self) -> bool {
        let counts = self.counts();
        counts.missing == 0 && counts.failed == 0 && self.cleared.is_clean()
    }

    /// Outcomes other than `Created`.
    pub fn problems(&self) -> impl Iterator<Item = &ModOutcome> + '_ {
        self.outcomes
            .iter()
            .filter(|outcome| !matches!(outcome.status, ModStatus::Created { .. }))
    }

    pub fn summary(&self) -> String {
        let counts = self.counts();
        let mut summary = format!(
            "{} created, {} missing, {} failed",
            counts.created, counts.missing, counts.failed
        );
        if !self.cleared.is_clean() {
            summary.push_str(&format!(
                " ({} stale entr{} could not be removed)",
                self.cleared.failures.len(),
                if self.cleared.failures.len() == 1 { "y" } else { "ies" }
            ));
        }
        summary
    }
}

/// Difference between the managed entries on disk and what the active instance implies.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DriftReport {
    /// Prefixed entries present but not expected (non UTF-8 names are shown lossily)
    pub unexpected: Vec<String>,
    /// Expected link names that are not present
    pub absent: Vec<String>,
}

impl DriftReport {
    pub fn is_converged(&self) -> bool {
        self.unexpected.is_empty() && self.absent.is_empty()
    }
}

/// Reconciler bound to one managed directory.
#[derive(Debug, Clone)]
pub struct ActivationEngine {
    managed_dir: Utf8PathBuf,
    prefix: String,
}

impl ActivationEngine {
    pub fn new<P: AsRef<Utf8Path>>(managed_dir: P) -> Self {
        Self::with_prefix(managed_dir, SYMLINK_PREFIX)
    }

    pub fn with_prefix<P: AsRef<Utf8Path>>(managed_dir: P, prefix: impl Into<String>) -> Self {
        Self {
            managed_dir: managed_dir.as_ref().to_path_buf(),
            prefix: prefix.into(),
        }
    }

    pub fn managed_dir(&self) -> &Utf8Path {
        &self.managed_dir
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn link_name(&self, m: &Mod) -> String {
        format!("{}{}", self.prefix, m.filename)
    }

    /// Prefix test on the raw name, so entries with non UTF-8 names are still recognised.
    pub fn is_managed_name<S: AsRef<OsStr> + ?Sized>(&self, name: &S) -> bool {
        name.as_ref()
            .as_encoded_bytes()
            .starts_with(self.prefix.as_bytes())
    }

    fn unavailable(&self, source: io::Error) -> ActivationError {
        ActivationError::DirectoryUnavailable {
            path: self.managed_dir.clone(),
            source,
        }
    }

    /// Prefixed entries currently in the managed directory, sorted by name.
    pub fn managed_entries(&self) -> Result<Vec<PathBuf>, ActivationError> {
        let mut entries = Vec::new();
        for entry in fs::read_dir(&self.managed_dir).map_err(|e| self.unavailable(e))? {
            let entry = entry.map_err(|e| self.unavailable(e))?;
            if self.is_managed_name(&entry.file_name()) {
                entries.push(entry.path());
            }
        }
        entries.sort();
        Ok(entries)
    }

    /// Remove every prefixed entry. Individual failures are collected and the rest of the
    /// batch is still removed.
    pub fn deactivate(&self) -> Result<DeactivationReport, ActivationError> {
        let entries = self.managed_entries()?;
        let mut report = DeactivationReport::default();

        for path in entries {
            // remove_file unlinks the symlink itself and never follows it into the library
            match fs::remove_file(&path) {
                Ok(()) => {
                    tracing::debug!("Removed {}", path.display());
                    report.removed.push(path);
                }
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    tracing::debug!("{} disappeared before removal", path.display());
                }
                Err(e) => {
                    tracing::warn!("Failed to remove {}: {}", path.display(), e);
                    report.failures.push(RemovalFailure {
                        path,
                        reason: e.to_string(),
                    });
                }
            }
        }

        tracing::info!(
            "Deactivated {}: removed {} managed entr{}, {} failure(s)",
            self.managed_dir,
            report.removed_count(),
            if report.removed_count() == 1 { "y" } else { "ies" },
            report.failures.len()
        );
        Ok(report)
    }

    /// Clear the managed directory and link every enabled, present mod of `instance`.
    ///
    /// Missing mods and failed links are recorded and skipped; links already created in this
    /// pass are kept. Only an unreachable managed directory aborts the call.
    pub fn activate(
        &self,
        instance: &Instance,
        library: &ModLibrary,
    ) -> Result<ActivationReport, ActivationError> {
        let cleared = self.deactivate()?;

        let mut outcomes = Vec::with_capacity(instance.enabled_count());
        let mut claimed: HashMap<String, ModId> = HashMap::new();

        for mod_id in instance.enabled_mods() {
            let status = match library.resolve(mod_id) {
                None => {
                    tracing::warn!("Mod file not found: {}", mod_id);
                    ModStatus::Missing
                }
                Some(m) => {
                    let name = self.link_name(m);
                    if let Some(first) = claimed.get(&name) {
                        tracing::warn!(
                            "Link name {} already used by {}, skipping {}",
                            name,
                            first,
                            mod_id
                        );
                        ModStatus::Failed(FailureReason::NameCollision {
                            first: first.clone(),
                        })
                    } else {
                        let link = self.managed_dir.join(&name);
                        match create_symlink(&m.path, &link) {
                            Ok(()) => {
                                tracing::debug!("Linked {} -> {}", link, m.path);
                                claimed.insert(name, mod_id.clone());
                                ModStatus::Created { link }
                            }
                            Err(e) => {
                                tracing::warn!("Failed to create symlink for {}: {}", mod_id, e);
                                ModStatus::Failed(FailureReason::Io(e.to_string()))
                            }
                        }
                    }
                }
            };
            outcomes.push(ModOutcome {
                mod_id: mod_id.clone(),
                status,
            });
        }

        let report = ActivationReport {
            instance: instance.id.clone(),
            cleared,
            outcomes,
        };
        tracing::info!("Activated instance '{}': {}", instance.id, report.summary());
        Ok(report)
    }

    /// Link names that must exist while `instance` is active, with first-wins collisions.
    pub fn expected_links(&self, instance: &Instance, library: &ModLibrary) -> BTreeSet<String> {
        instance
            .enabled_mods()
            .filter_map(|id| library.resolve(id))
            .map(|m| self.link_name(m))
            .collect()
    }

    /// Compare the managed entries on disk with what `active` implies (nothing when `None`).
    pub fn inspect(
        &self,
        active: Option<&Instance>,
        library: &ModLibrary,
    ) -> Result<DriftReport, ActivationError> {
        let expected = active
            .map(|instance| self.expected_links(instance, library))
            .unwrap_or_default();
        let actual: BTreeSet<String> = self
            .managed_entries()?
            .iter()
            .filter_map(|path| path.file_name())
            .map(|name| name.to_string_lossy().into_owned())
            .collect();

        Ok(DriftReport {
            unexpected: actual.difference(&expected).cloned().collect(),
            absent: expected.difference(&actual).cloned().collect(),
        })
    }
}

#[cfg(unix)]
fn create_symlink(source: &Utf8Path, dest: &Utf8Path) -> io::Result<()> {
    std::os::unix::fs::symlink(source, dest)
}

#[cfg(windows)]
fn create_symlink(source: &Utf8Path, dest: &Utf8Path) -> io::Result<()> {
    std::os::windows::fs::symlink_file(source, dest)
}

#[cfg(not(any(unix, windows)))]
fn create_symlink(_source: &Utf8Path, _dest: &Utf8Path) -> io::Result<()> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "symlink unavailable on this platform",
    ))
}
