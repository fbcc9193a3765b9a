//! Central mod library: every imported `.pak` lives here, keyed by file name.
//!
//! Instances only reference library entries by [`ModId`]; activation projects library paths into
//! the game directory through symlinks, so nothing outside [`ModLibrary::delete_mod`] ever removes
//! a library file.

use crate::models::{Mod, ModId};
use camino::{Utf8Path, Utf8PathBuf};
use indexmap::IndexMap;
use std::fs::{self, File};
use std::io;
use std::path::{Component, Path};
use thiserror::Error;
use walkdir::WalkDir;

pub const MOD_EXTENSION: &str = "pak";

#[derive(Error, Debug)]
pub enum LibraryError {
    #[error("File not found: {0}")]
    FileNotFound(Utf8PathBuf),

    #[error("Not a .pak file: {0}")]
    NotAPak(Utf8PathBuf),

    #[error("Unsupported archive format: {0}")]
    UnsupportedArchive(String),

    #[error("No .pak files found in archive {0}")]
    NoModsInArchive(Utf8PathBuf),

    #[error("Failed to extract {path}: {message}")]
    Extraction { path: Utf8PathBuf, message: String },

    #[error("Mod {0} is not in the library")]
    UnknownMod(ModId),

    #[error("Library I/O error on {path}: {source}")]
    Io {
        path: Utf8PathBuf,
        #[source]
        source: io::Error,
    },
}

impl LibraryError {
    fn io(path: &Utf8Path, source: io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Result of importing a single `.pak`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportOutcome {
    Imported(Mod),
    /// A file with that name was already in the library; it was not overwritten
    AlreadyPresent(Mod),
}

impl ImportOutcome {
    pub fn into_mod(self) -> Mod {
        match self {
            ImportOutcome::Imported(m) | ImportOutcome::AlreadyPresent(m) => m,
        }
    }

    pub fn is_new(&self) -> bool {
        matches!(self, ImportOutcome::Imported(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveKind {
    Zip,
    SevenZip,
    Rar,
}

impl ArchiveKind {
    /// Archive kind from a file extension; `Err` carries the unsupported suffix.
    pub fn from_path(path: &Utf8Path) -> Result<Self, LibraryError> {
        let ext = path.extension().unwrap_or_default().to_ascii_lowercase();
        match ext.as_str() {
            "zip" => Ok(ArchiveKind::Zip),
            "7z" => Ok(ArchiveKind::SevenZip),
            "rar" => Ok(ArchiveKind::Rar),
            _ => Err(LibraryError::UnsupportedArchive(format!(".{}", ext))),
        }
    }
}

pub fn is_pak(path: &Utf8Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case(MOD_EXTENSION))
}

/// Snapshot of the library directory.
#[derive(Debug, Clone)]
pub struct ModLibrary {
    root: Utf8PathBuf,
    mods: IndexMap<ModId, Mod>,
}

impl ModLibrary {
    /// Open (creating if needed) the library directory and scan it.
    pub fn open<P: AsRef<Utf8Path>>(root: P) -> Result<Self, LibraryError> {
        let requested = root.as_ref();
        fs::create_dir_all(requested).map_err(|e| LibraryError::io(requested, e))?;
        // Symlink targets must be absolute to resolve from the game directory.
        let root = std::path::absolute(requested)
            .map_err(|e| LibraryError::io(requested, e))
            .and_then(|abs| {
                Utf8PathBuf::from_path_buf(abs).map_err(|_| {
                    LibraryError::io(
                        requested,
                        io::Error::new(io::ErrorKind::InvalidData, "library path is not UTF-8"),
                    )
                })
            })?;
        let mut library = Self {
            root,
            mods: IndexMap::new(),
        };
        library.refresh()?;
        Ok(library)
    }

    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    /// Rescan the library directory. Entries are ordered case-insensitively by name.
    pub fn refresh(&mut self) -> Result<(), LibraryError> {
        let mut mods = Vec::new();
        for entry in fs::read_dir(&self.root).map_err(|e| LibraryError::io(&self.root, e))? {
            let entry = entry.map_err(|e| LibraryError::io(&self.root, e))?;
            let Ok(path) = Utf8PathBuf::from_path_buf(entry.path()) else {
                tracing::warn!("Skipping non UTF-8 library entry: {:?}", entry.path());
                continue;
            };
            if !is_pak(&path) {
                continue;
            }
            let meta = match entry.metadata() {
                Ok(meta) if meta.is_file() => meta,
                _ => continue,
            };
            if let Some(m) = Mod::from_path(&path, meta.len()) {
                mods.push(m);
            }
        }
        mods.sort_by_key(|m| m.name.to_lowercase());
        self.mods = mods.into_iter().map(|m| (m.id.clone(), m)).collect();
        tracing::debug!("Library scan found {} mod(s) in {}", self.mods.len(), self.root);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.mods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mods.is_empty()
    }

    pub fn mods(&self) -> impl Iterator<Item = &Mod> + '_ {
        self.mods.values()
    }

    /// Entry recorded by the last scan, whether or not its file still exists.
    pub fn get(&self, id: &ModId) -> Option<&Mod> {
        self.mods.get(id)
    }

    /// Entry whose backing file exists right now.
    pub fn resolve(&self, id: &ModId) -> Option<&Mod> {
        self.get(id).filter(|m| m.is_present())
    }

    /// Of the given identifiers, those the library cannot resolve, in input order.
    pub fn missing<'a, I>(&self, ids: I) -> Vec<ModId>
    where
        I: IntoIterator<Item = &'a ModId>,
    {
        ids.into_iter()
            .filter(|id| self.resolve(id).is_none())
            .cloned()
            .collect()
    }

    #[cfg(test)]
    pub(crate) fn with_entry(mut self, m: Mod) -> Self {
        self.mods.insert(m.id.clone(), m);
        self
    }

    /// Copy a `.pak` into the library.
    pub fn import_pak(&mut self, source: &Utf8Path) -> Result<ImportOutcome, LibraryError> {
        if !source.is_file() {
            return Err(LibraryError::FileNotFound(source.to_path_buf()));
        }
        if !is_pak(source) {
            return Err(LibraryError::NotAPak(source.to_path_buf()));
        }
        let filename = source
            .file_name()
            .ok_or_else(|| LibraryError::NotAPak(source.to_path_buf()))?;
        let dest = self.root.join(filename);

        if dest.exists() {
            let size = fs::metadata(&dest)
                .map_err(|e| LibraryError::io(&dest, e))?
                .len();
            let existing = Mod::from_path(&dest, size)
                .ok_or_else(|| LibraryError::NotAPak(dest.clone()))?;
            tracing::debug!("{} already in library", filename);
            self.mods.insert(existing.id.clone(), existing.clone());
            return Ok(ImportOutcome::AlreadyPresent(existing));
        }

        let size = fs::copy(source, &dest).map_err(|e| LibraryError::io(&dest, e))?;
        let imported =
            Mod::from_path(&dest, size).ok_or_else(|| LibraryError::NotAPak(dest.clone()))?;
        tracing::info!("Imported {} ({})", imported.filename, imported.size_label());
        self.mods.insert(imported.id.clone(), imported.clone());
        self.mods.sort_by(|_, a, _, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()));
        Ok(ImportOutcome::Imported(imported))
    }

    /// Extract an archive and import every `.pak` inside it.
    pub fn import_archive(&mut self, archive: &Utf8Path) -> Result<Vec<ImportOutcome>, LibraryError> {
        if !archive.is_file() {
            return Err(LibraryError::FileNotFound(archive.to_path_buf()));
        }
        let kind = ArchiveKind::from_path(archive)?;

        let staging = tempfile::Builder::new()
            .prefix("ronmgr-extract-")
            .tempdir()
            .map_err(|e| LibraryError::io(archive, e))?;
        extract(kind, archive, staging.path())?;

        let mut outcomes = Vec::new();
        for entry in WalkDir::new(staging.path()).sort_by_file_name() {
            let entry = entry.map_err(|e| LibraryError::Extraction {
                path: archive.to_path_buf(),
                message: e.to_string(),
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            let Ok(path) = Utf8PathBuf::from_path_buf(entry.into_path()) else {
                continue;
            };
            if is_pak(&path) {
                outcomes.push(self.import_pak(&path)?);
            }
        }

        if outcomes.is_empty() {
            return Err(LibraryError::NoModsInArchive(archive.to_path_buf()));
        }
        tracing::info!("Imported {} mod(s) from {}", outcomes.len(), archive);
        Ok(outcomes)
    }

    /// Import a `.pak` or a supported archive, dispatching on the extension.
    pub fn import_path(&mut self, path: &Utf8Path) -> Result<Vec<ImportOutcome>, LibraryError> {
        if is_pak(path) {
            self.import_pak(path).map(|outcome| vec![outcome])
        } else {
            self.import_archive(path)
        }
    }

    /// Delete a mod file from the library.
    pub fn delete_mod(&mut self, id: &ModId) -> Result<Mod, LibraryError> {
        let m = self
            .mods
            .shift_remove(id)
            .ok_or_else(|| LibraryError::UnknownMod(id.clone()))?;
        if m.path.exists() {
            fs::remove_file(&m.path).map_err(|e| LibraryError::io(&m.path, e))?;
        }
        tracing::info!("Deleted {} from library", m.filename);
        Ok(m)
    }
}

fn extract(kind: ArchiveKind, archive: &Utf8Path, dest: &Path) -> Result<(), LibraryError> {
    let fail = |message: String| LibraryError::Extraction {
        path: archive.to_path_buf(),
        message,
    };
    match kind {
        ArchiveKind::Zip => {
            let file = File::open(archive).map_err(|e| LibraryError::io(archive, e))?;
            let mut zip = zip::ZipArchive::new(file).map_err(|e| fail(e.to_string()))?;
            zip.extract(dest).map_err(|e| fail(e.to_string()))?;
        }
        ArchiveKind::SevenZip => {
            sevenz_rust::decompress_file(archive.as_std_path(), dest)
                .map_err(|e| fail(e.to_string()))?;
        }
        ArchiveKind::Rar => extract_rar(archive, dest)?,
    }
    Ok(())
}

fn extract_rar(archive: &Utf8Path, dest: &Path) -> Result<(), LibraryError> {
    let fail = |message: String| LibraryError::Extraction {
        path: archive.to_path_buf(),
        message,
    };
    let archive_path = archive.as_std_path().to_path_buf();
    let mut open = unrar::Archive::new(&archive_path)
        .open_for_processing()
        .map_err(|e| fail(e.to_string()))?;

    while let Some(header) = open.read_header().map_err(|e| fail(e.to_string()))? {
        let entry = header.entry();
        let relative = entry.filename.clone();
        // Entries must stay inside the staging directory
        let contained = relative
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
        if entry.is_directory() || !contained {
            if !contained {
                tracing::warn!("Skipping unsafe entry {} in {}", relative.display(), archive);
            }
            open = header.skip().map_err(|e| fail(e.to_string()))?;
            continue;
        }

        let out_path = dest.join(&relative);
        if let Some(parent) = out_path.parent() {
            fs::create_dir_all(parent).map_err(|e| LibraryError::io(archive, e))?;
        }
        open = header
            .extract_to(&out_path)
            .map_err(|e| fail(e.to_string()))?;
    }
    Ok(())
}
