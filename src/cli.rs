//! Command-line front end.
//!
//! Parsing is done with clap derive; [`execute`] runs one [`Command`] against a [`ModManager`]
//! and writes human-readable output to any [`Write`], so commands can be exercised in tests.

use crate::models::{Instance, InstanceId, InstanceState, ModId};
use crate::services::activation::ModStatus;
use crate::services::game_detection::{self, GameLocator};
use crate::services::manager::{ActivationResult, ModManager};
use anyhow::{Context, Result, bail};
use camino::{Utf8Path, Utf8PathBuf};
use clap::{Parser, Subcommand};
use std::io::Write;

#[derive(Parser, Debug)]
#[command(name = "ronmgr", version)]
#[command(about = "Instance-based mod manager for Ready or Not under Proton", long_about = None)]
pub struct Cli {
    /// Data directory (library, instances, state, logs)
    #[arg(long, global = true, value_name = "DIR")]
    pub data_dir: Option<Utf8PathBuf>,

    /// Game mod directory; skips Steam discovery
    #[arg(long, global = true, value_name = "DIR")]
    pub game_dir: Option<Utf8PathBuf>,

    /// Debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List instances
    List,

    /// Show an instance's mods in load order
    Show { instance: String },

    /// Create an empty instance
    Create { name: String },

    /// Rename an instance (its id stays the same)
    Rename { instance: String, name: String },

    /// Delete an instance
    Delete {
        instance: String,

        /// Deactivate first if the instance is active
        #[arg(long)]
        force: bool,
    },

    /// Import .pak files or .zip/.7z archives and add them to an instance
    Add {
        instance: String,

        #[arg(required = true)]
        paths: Vec<Utf8PathBuf>,
    },

    /// Remove mods from an instance (library files are kept)
    Remove {
        instance: String,

        #[arg(required = true)]
        mods: Vec<String>,
    },

    /// Enable a mod in an instance
    Enable {
        instance: String,
        #[arg(value_name = "MOD")]
        mod_name: String,
    },

    /// Disable a mod in an instance
    Disable {
        instance: String,
        #[arg(value_name = "MOD")]
        mod_name: String,
    },

    /// Move a mod to a 1-based position in the load order
    Move {
        instance: String,
        #[arg(value_name = "MOD")]
        mod_name: String,
        #[arg(value_parser = clap::value_parser!(u64).range(1..))]
        position: u64,
    },

    /// Add every library mod to an instance
    Scan { instance: String },

    /// List the mod library
    Library,

    /// Delete a mod file from the library
    Purge {
        #[arg(value_name = "MOD")]
        mod_name: String,
    },

    /// Show advisory conflict warnings for an instance
    Conflicts { instance: String },

    /// List an instance's mods that are missing from the library
    Verify { instance: String },

    /// Activate an instance (replaces whatever is active)
    Activate { instance: String },

    /// Remove all managed links from the game directory
    Deactivate,

    /// Show the active instance and whether the game directory matches it
    Status,

    /// Print the detected game mod directory
    GamePath,

    /// Start the game through Steam
    Launch,
}

/// Resolve the managed directory: explicit override first, then Steam discovery.
pub fn locate_mods_dir(override_dir: Option<&Utf8Path>) -> Result<Utf8PathBuf> {
    match override_dir {
        Some(dir) => Ok(game_detection::validate_override(dir)?),
        None => Ok(GameLocator::from_home()?.detect_mods_dir()?),
    }
}

/// Find a mod reference by id, by file name without extension, or by case-insensitive stem.
fn resolve_mod(instance: &Instance, query: &str) -> Result<ModId> {
    let lowered = query.to_lowercase();
    let with_ext = format!("{}.pak", lowered);
    instance
        .mods
        .iter()
        .map(|entry| &entry.mod_id)
        .find(|id| id.as_str() == query)
        .or_else(|| {
            instance.mods.iter().map(|entry| &entry.mod_id).find(|id| {
                let name = id.as_str().to_lowercase();
                name == lowered || name == with_ext || id.stem().to_lowercase() == lowered
            })
        })
        .cloned()
        .with_context(|| format!("Mod '{}' is not part of instance '{}'", query, instance.name))
}

fn resolve_instance(manager: &ModManager, query: &str) -> Result<InstanceId> {
    Ok(manager.registry().resolve(query)?)
}

fn instance_of<'a>(manager: &'a ModManager, id: &InstanceId) -> Result<&'a Instance> {
    manager
        .registry()
        .get(id)
        .with_context(|| format!("Instance '{}' not found", id))
}

fn state_label(state: InstanceState) -> &'static str {
    match state {
        InstanceState::Active => "active",
        InstanceState::Draft => "draft",
    }
}

fn print_activation<W: Write>(out: &mut W, name: &str, result: &ActivationResult) -> Result<()> {
    let report = &result.report;
    writeln!(out, "Activated '{}': {}", name, report.summary())?;
    if report.cleared.removed_count() > 0 {
        writeln!(out, "  cleared {} previous link(s)", report.cleared.removed_count())?;
    }
    for failure in &report.cleared.failures {
        writeln!(out, "  could not remove {}: {}", failure.path.display(), failure.reason)?;
    }
    for outcome in &report.outcomes {
        let marker = match outcome.status {
            ModStatus::Created { .. } => "+",
            ModStatus::Missing => "?",
            ModStatus::Failed(_) => "!",
        };
        writeln!(out, "  {} {}", marker, outcome)?;
    }
    for warning in &result.warnings {
        writeln!(out, "warning: {}", warning)?;
    }
    Ok(())
}

/// Run one command.
///
/// `game_dir_error` carries the reason game discovery failed, if it did, for `game-path`.
pub fn execute<W: Write>(
    command: Command,
    manager: &mut ModManager,
    game_dir_error: Option<&str>,
    out: &mut W,
) -> Result<()> {
    match command {
        Command::List => {
            if manager.registry().is_empty() {
                writeln!(out, "No instances. Create one with `ronmgr create <name>`.")?;
            }
            for instance in manager.registry().list() {
                writeln!(
                    out,
                    "{:<20} {:<8} {}/{} mods enabled  ({})",
                    instance.name,
                    state_label(manager.registry().state_of(&instance.id)),
                    instance.enabled_count(),
                    instance.mods.len(),
                    instance.id
                )?;
            }
        }

        Command::Show { instance } => {
            let id = resolve_instance(manager, &instance)?;
            let instance = instance_of(manager, &id)?;
            writeln!(
                out,
                "{} ({}) [{}] created {}",
                instance.name,
                instance.id,
                state_label(manager.registry().state_of(&id)),
                instance.created
            )?;
            for (position, entry) in instance.mods.iter().enumerate() {
                let present = manager.library().resolve(&entry.mod_id).is_some();
                writeln!(
                    out,
                    "{:>3}. [{}] {}{}",
                    position + 1,
                    if entry.enabled { "x" } else { " " },
                    entry.mod_id,
                    if present { "" } else { "  (missing)" }
                )?;
            }
        }

        Command::Create { name } => {
            let created = manager.registry_mut().create(&name)?;
            writeln!(out, "Created instance '{}' ({})", created.name, created.id)?;
        }

        Command::Rename { instance, name } => {
            let id = resolve_instance(manager, &instance)?;
            manager.registry_mut().rename(&id, &name)?;
            writeln!(out, "Renamed '{}' to '{}'", id, name.trim())?;
        }

        Command::Delete { instance, force } => {
            let id = resolve_instance(manager, &instance)?;
            let removed = manager.delete_instance(&id, force)?;
            writeln!(out, "Deleted instance '{}'", removed.name)?;
        }

        Command::Add { instance, paths } => {
            let id = resolve_instance(manager, &instance)?;
            let summary = manager.import(&paths, Some(&id))?;
            for m in &summary.imported {
                writeln!(out, "Imported {} ({})", m.filename, m.size_label())?;
            }
            for m in &summary.already_present {
                writeln!(out, "Already in library: {}", m.filename)?;
            }
            for failure in &summary.failures {
                writeln!(out, "Failed to import {}: {}", failure.path, failure.error)?;
            }
            if let Some(added) = summary.added {
                writeln!(
                    out,
                    "Added {} mod(s) to '{}' ({} already present)",
                    added.added, id, added.skipped
                )?;
            }
        }

        Command::Remove { instance, mods } => {
            let id = resolve_instance(manager, &instance)?;
            for query in mods {
                let mod_id = resolve_mod(instance_of(manager, &id)?, &query)?;
                manager.registry_mut().remove_mod(&id, &mod_id)?;
                writeln!(out, "Removed {} from '{}'", mod_id, id)?;
            }
        }

        Command::Enable { instance, mod_name } => {
            set_enabled(manager, &instance, &mod_name, true, out)?;
        }

        Command::Disable { instance, mod_name } => {
            set_enabled(manager, &instance, &mod_name, false, out)?;
        }

        Command::Move {
            instance,
            mod_name,
            position,
        } => {
            let id = resolve_instance(manager, &instance)?;
            let mod_id = resolve_mod(instance_of(manager, &id)?, &mod_name)?;
            let index = usize::try_from(position - 1).unwrap_or(usize::MAX);
            manager.registry_mut().move_to(&id, &mod_id, index)?;
            let actual = instance_of(manager, &id)?
                .position_of(&mod_id)
                .map_or(0, |p| p + 1);
            writeln!(out, "Moved {} to position {}", mod_id, actual)?;
        }

        Command::Scan { instance } => {
            let id = resolve_instance(manager, &instance)?;
            let added = manager.scan_into(&id)?;
            writeln!(
                out,
                "Added {} mod(s) to '{}' ({} already present)",
                added.added, id, added.skipped
            )?;
        }

        Command::Library => {
            manager.refresh_library()?;
            let library = manager.library();
            writeln!(out, "{} mod(s) in {}", library.len(), library.root())?;
            for m in library.mods() {
                writeln!(out, "  {:<40} {:>10}", m.filename, m.size_label())?;
            }
        }

        Command::Purge { mod_name } => {
            let mod_id = ModId::new(if mod_name.to_lowercase().ends_with(".pak") {
                mod_name
            } else {
                format!("{}.pak", mod_name)
            });
            let removed = manager.delete_library_mod(&mod_id)?;
            writeln!(out, "Deleted {} from the library", removed.filename)?;
        }

        Command::Conflicts { instance } => {
            let id = resolve_instance(manager, &instance)?;
            let warnings = manager.conflicts(&id)?;
            if warnings.is_empty() {
                writeln!(out, "No conflicts detected")?;
            }
            for warning in warnings {
                writeln!(out, "warning: {}", warning)?;
            }
        }

        Command::Verify { instance } => {
            let id = resolve_instance(manager, &instance)?;
            let missing = manager.verify(&id)?;
            if missing.is_empty() {
                writeln!(out, "All mods of '{}' are present", id)?;
            } else {
                writeln!(out, "{} mod(s) missing from the library:", missing.len())?;
                for mod_id in missing {
                    writeln!(out, "  {}", mod_id)?;
                }
            }
        }

        Command::Activate { instance } => {
            let id = resolve_instance(manager, &instance)?;
            let name = instance_of(manager, &id)?.name.clone();
            let result = manager.activate(&id)?;
            print_activation(out, &name, &result)?;
        }

        Command::Deactivate => {
            let report = manager.deactivate()?;
            writeln!(out, "Removed {} managed link(s)", report.removed_count())?;
            for failure in &report.failures {
                writeln!(out, "  could not remove {}: {}", failure.path.display(), failure.reason)?;
            }
        }

        Command::Status => {
            let status = manager.status()?;
            match (&status.active, &status.dangling_active) {
                (Some(instance), _) => {
                    writeln!(out, "Active instance: {} ({})", instance.name, instance.id)?
                }
                (None, Some(id)) => writeln!(out, "Active instance: {} (record missing)", id)?,
                (None, None) => writeln!(out, "Active instance: none")?,
            }
            match &status.managed_dir {
                Some(dir) => writeln!(out, "Game mod directory: {}", dir)?,
                None => writeln!(out, "Game mod directory: not found")?,
            }
            writeln!(
                out,
                "Library: {} mod(s), {} instance(s)",
                status.library_mods, status.instances
            )?;
            if let Some(drift) = &status.drift {
                if drift.is_converged() {
                    writeln!(out, "Game directory is in sync")?;
                } else {
                    for name in &drift.unexpected {
                        writeln!(out, "  unexpected: {}", name)?;
                    }
                    for name in &drift.absent {
                        writeln!(out, "  absent: {}", name)?;
                    }
                    writeln!(out, "Re-activate the instance to repair the game directory")?;
                }
            }
        }

        Command::GamePath => match manager.engine() {
            Some(engine) => writeln!(out, "{}", engine.managed_dir())?,
            None => bail!(
                "{}",
                game_dir_error.unwrap_or("Game mod directory not found")
            ),
        },

        Command::Launch => {
            let command = game_detection::launch_command();
            std::process::Command::new(&command[0])
                .args(&command[1..])
                .spawn()
                .with_context(|| format!("Failed to run `{}`", command.join(" ")))?;
            writeln!(out, "Launching Ready or Not through Steam")?;
        }
    }
    Ok(())
}

fn set_enabled<W: Write>(
    manager: &mut ModManager,
    instance: &str,
    mod_name: &str,
    enabled: bool,
    out: &mut W,
) -> Result<()> {
    let id = resolve_instance(manager, instance)?;
    let mod_id = resolve_mod(instance_of(manager, &id)?, mod_name)?;
    manager.registry_mut().set_enabled(&id, &mod_id, enabled)?;
    writeln!(
        out,
        "{} {} in '{}'",
        if enabled { "Enabled" } else { "Disabled" },
        mod_id,
        id
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "ronmgr",
            "activate",
            "Realism",
            "--game-dir",
            "/tmp/Paks",
            "--debug",
        ])
        .unwrap();
        assert!(cli.debug);
        assert_eq!(cli.game_dir.as_deref(), Some(Utf8Path::new("/tmp/Paks")));
        assert!(matches!(cli.command, Command::Activate { instance } if instance == "Realism"));
    }

    #[test]
    fn test_move_position_is_one_based() {
        assert!(Cli::try_parse_from(["ronmgr", "move", "pvp", "Maps", "0"]).is_err());
        assert!(Cli::try_parse_from(["ronmgr", "move", "pvp", "Maps", "1"]).is_ok());
    }

    #[test]
    fn test_resolve_mod_by_stem() {
        let mut instance = Instance::new(InstanceId::new("pvp"), "PvP", "");
        instance.add_mod(ModId::from("WeaponPack_v2.pak"));

        assert_eq!(
            resolve_mod(&instance, "weaponpack_v2").unwrap(),
            ModId::from("WeaponPack_v2.pak")
        );
        assert!(resolve_mod(&instance, "Other").is_err());
    }
}
