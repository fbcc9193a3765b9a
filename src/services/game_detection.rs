//! Locating the Ready or Not mod directory inside a Steam/Proton install.
//!
//! Steam keeps one or more `steamapps` library directories. The primary ones live under the
//! native (`~/.steam/steam`) and Flatpak (`~/.var/app/com.valvesoftware.Steam/.steam/steam`)
//! roots; additional ones are listed in each library's `libraryfolders.vdf`.
//!
//! For the first library that has the game's app manifest, the Proton prefix must exist, and
//! the mod directory is:
//!
//! ```text
//! <steamapps>/compatdata/1144200/pfx/drive_c/users/steamuser/AppData/Local/ReadyOrNot/Saved/Paks
//! ```
//!
//! # Examples
//!
//! ```ignore
//! use ronmgr::services::game_detection::GameLocator;
//!
//! let locator = GameLocator::from_home()?;
//! let mods_dir = locator.detect_mods_dir()?;
//! ```

use anyhow::Context;
use camino::{Utf8Path, Utf8PathBuf};
use directories::BaseDirs;
use regex::Regex;
use std::fs;
use thiserror::Error;

/// Steam application id of Ready or Not.
pub const STEAM_APP_ID: u32 = 1144200;

/// Folder name of the game under `steamapps/common`.
pub const GAME_FOLDER: &str = "Ready Or Not";

const NATIVE_STEAM_ROOT: &str = ".steam/steam";
const FLATPAK_STEAM_ROOT: &str = ".var/app/com.valvesoftware.Steam/.steam/steam";
const LIBRARY_FOLDERS_FILE: &str = "libraryfolders.vdf";

/// Path from the prefix's `steamuser` directory to `AppData/Local`.
const APPDATA_LOCAL: &str = "drive_c/users/steamuser/AppData/Local";
const PAKS_UNDER_LOCAL: &str = "ReadyOrNot/Saved/Paks";

#[derive(Error, Debug)]
pub enum GameDetectionError {
    #[error(
        "Steam installation not detected (looked for ~/{NATIVE_STEAM_ROOT}/steamapps and ~/{FLATPAK_STEAM_ROOT}/steamapps)"
    )]
    SteamNotFound,

    #[error("Ready or Not is not installed in any detected Steam library (checked {checked})")]
    NotInstalled { checked: usize },

    #[error(
        "Ready or Not is registered in {library} but game files are missing; verify the game files in Steam"
    )]
    GameFilesMissing { library: Utf8PathBuf },

    #[error("Proton prefix not found at {prefix}; launch the game once in Steam to generate it")]
    PrefixMissing { prefix: Utf8PathBuf },

    #[error("Proton prefix is incomplete: {missing} does not exist; launch the game once in Steam")]
    PrefixIncomplete { missing: Utf8PathBuf },

    #[error("Failed to create mod directory {path}")]
    CreateFailed {
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Configured mod directory does not exist: {0}")]
    OverrideMissing(Utf8PathBuf),
}

/// Steam library discovery relative to a home directory.
pub struct GameLocator {
    home: Utf8PathBuf,
    library_path_pattern: Regex,
}

impl GameLocator {
    pub fn new<P: AsRef<Utf8Path>>(home: P) -> Self {
        Self {
            home: home.as_ref().to_path_buf(),
            library_path_pattern: Regex::new(r#""path"\s+"([^"]+)""#)
                .expect("Invalid library path regex"),
        }
    }

    /// Locator for the current user's home directory.
    pub fn from_home() -> anyhow::Result<Self> {
        let home = BaseDirs::new()
            .map(|base| base.home_dir().to_path_buf())
            .context("Could not determine the home directory")?;
        let home = Utf8PathBuf::from_path_buf(home)
            .map_err(|p| anyhow::anyhow!("Home directory is not valid UTF-8: {}", p.display()))?;
        Ok(Self::new(home))
    }

    pub fn home(&self) -> &Utf8Path {
        &self.home
    }

    /// Library paths listed in a `libraryfolders.vdf` body.
    pub fn parse_library_folders(&self, content: &str) -> Vec<Utf8PathBuf> {
        self.library_path_pattern
            .captures_iter(content)
            .filter_map(|caps| caps.get(1))
            .map(|m| Utf8PathBuf::from(m.as_str().replace("\\\\", "\\")))
            .collect()
    }

    /// Every existing `steamapps` directory: native first, then Flatpak, each followed by the
    /// libraries its `libraryfolders.vdf` lists. Duplicates are dropped.
    pub fn find_steam_libraries(&self) -> Vec<Utf8PathBuf> {
        let mut libraries: Vec<Utf8PathBuf> = Vec::new();

        for root in [NATIVE_STEAM_ROOT, FLATPAK_STEAM_ROOT] {
            let steamapps = self.home.join(root).join("steamapps");
            if !steamapps.is_dir() {
                tracing::debug!("No Steam library at {}", steamapps);
                continue;
            }
            if !libraries.contains(&steamapps) {
                libraries.push(steamapps.clone());
            }

            let vdf = steamapps.join(LIBRARY_FOLDERS_FILE);
            if !vdf.is_file() {
                continue;
            }
            match fs::read_to_string(&vdf) {
                Ok(content) => {
                    for folder in self.parse_library_folders(&content) {
                        let extra = folder.join("steamapps");
                        if extra.is_dir() && !libraries.contains(&extra) {
                            libraries.push(extra);
                        }
                    }
                }
                Err(e) => tracing::warn!("Error reading {}: {}", vdf, e),
            }
        }

        tracing::debug!("Found {} Steam librar(ies)", libraries.len());
        libraries
    }

    /// Locate the mod directory, creating `Saved/Paks` inside an initialised prefix if needed.
    pub fn detect_mods_dir(&self) -> Result<Utf8PathBuf, GameDetectionError> {
        let libraries = self.find_steam_libraries();
        if libraries.is_empty() {
            return Err(GameDetectionError::SteamNotFound);
        }

        for steamapps in &libraries {
            if let Some(mods_dir) = mods_dir_in_library(steamapps)? {
                tracing::info!("Found Ready or Not mod directory: {}", mods_dir);
                return Ok(mods_dir);
            }
        }

        Err(GameDetectionError::NotInstalled {
            checked: libraries.len(),
        })
    }
}

/// Check one `steamapps` directory.
///
/// Returns `Ok(None)` when the game is not registered in this library, so the search goes on.
pub fn mods_dir_in_library(steamapps: &Utf8Path) -> Result<Option<Utf8PathBuf>, GameDetectionError> {
    let manifest = steamapps.join(format!("appmanifest_{STEAM_APP_ID}.acf"));
    if !manifest.is_file() {
        return Ok(None);
    }

    if !steamapps.join("common").join(GAME_FOLDER).is_dir() {
        return Err(GameDetectionError::GameFilesMissing {
            library: steamapps.to_path_buf(),
        });
    }

    let prefix = steamapps
        .join("compatdata")
        .join(STEAM_APP_ID.to_string())
        .join("pfx");
    if !prefix.is_dir() {
        return Err(GameDetectionError::PrefixMissing { prefix });
    }

    let appdata_local = prefix.join(APPDATA_LOCAL);
    let mods_dir = appdata_local.join(PAKS_UNDER_LOCAL);
    if mods_dir.is_dir() {
        return Ok(Some(mods_dir));
    }

    if !appdata_local.is_dir() {
        return Err(GameDetectionError::PrefixIncomplete {
            missing: appdata_local,
        });
    }

    fs::create_dir_all(&mods_dir).map_err(|source| GameDetectionError::CreateFailed {
        path: mods_dir.clone(),
        source,
    })?;
    tracing::info!("Created mod directory: {}", mods_dir);
    Ok(Some(mods_dir))
}

/// Use a configured directory instead of discovery. It must already exist.
pub fn validate_override(dir: &Utf8Path) -> Result<Utf8PathBuf, GameDetectionError> {
    if dir.is_dir() {
        Ok(dir.to_path_buf())
    } else {
        Err(GameDetectionError::OverrideMissing(dir.to_path_buf()))
    }
}

/// Command line that asks Steam to start the game.
pub fn launch_command() -> Vec<String> {
    vec![
        "steam".to_string(),
        format!("steam://rungameid/{STEAM_APP_ID}"),
    ]
}
