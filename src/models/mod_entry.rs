use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable identifier of a library mod: its file name, e.g. `WeaponPack.pak`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModId(String);

impl ModId {
    pub fn new(filename: impl Into<String>) -> Self {
        Self(filename.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// File name without the extension, used as the display name.
    pub fn stem(&self) -> &str {
        Utf8Path::new(&self.0).file_stem().unwrap_or(&self.0)
    }
}

impl fmt::Display for ModId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ModId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for ModId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// A mod file owned by the library.
///
/// Immutable once imported; the only mutation is deletion through
/// [`ModLibrary::delete_mod`](crate::services::library::ModLibrary::delete_mod).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mod {
    pub id: ModId,
    /// File stem, e.g. `WeaponPack`
    pub name: String,
    /// Full file name, e.g. `WeaponPack.pak`
    pub filename: String,
    /// Absolute path inside the library directory
    pub path: Utf8PathBuf,
    /// File size in bytes
    pub size: u64,
}

impl Mod {
    /// Build a library entry for a file on disk. Returns `None` for paths without a UTF-8 name.
    pub fn from_path(path: &Utf8Path, size: u64) -> Option<Self> {
        let filename = path.file_name()?.to_string();
        let name = path.file_stem().unwrap_or(&filename).to_string();
        Some(Self {
            id: ModId::new(filename.clone()),
            name,
            filename,
            path: path.to_path_buf(),
            size,
        })
    }

    /// Whether the backing file still exists.
    pub fn is_present(&self) -> bool {
        self.path.is_file()
    }

    /// Human readable size, e.g. `12.4 MB`.
    pub fn size_label(&self) -> String {
        const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
        let mut size = self.size as f64;
        let mut unit = 0;
        while size >= 1024.0 && unit < UNITS.len() - 1 {
            size /= 1024.0;
            unit += 1;
        }
        if unit == 0 {
            format!("{} {}", self.size, UNITS[0])
        } else {
            format!("{:.1} {}", size, UNITS[unit])
        }
    }
}
