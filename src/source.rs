//! Bundled document sources
//!
//! A bundle is laid out as `<level>/<subject>/schema.json`. The loader only
//! talks to the [`DocumentSource`] trait, so the compiled-in bundle can be
//! swapped for a directory on disk.

use include_dir::{include_dir, Dir};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::error::{BootstrapError, Result};

/// File holding each subject's schema document
pub const SCHEMA_FILE: &str = "schema.json";

/// Schemas compiled into the binary
pub static BUNDLED_SCHEMAS: Dir<'static> = include_dir!("$CARGO_MANIFEST_DIR/schemas");

/// Read-only access to a bundled tree
pub trait DocumentSource {
    /// Numeric levels present at the bundle root, in any order
    fn levels(&self) -> Result<Vec<u32>>;

    /// Subject names stored at a level, in any order
    fn list(&self, level: u32) -> Result<Vec<String>>;

    /// Raw bytes of a subject's schema document
    fn read(&self, level: u32, name: &str) -> Result<Vec<u8>>;
}

/// Source backed by a directory embedded with `include_dir!`
pub struct EmbeddedSource {
    root: &'static Dir<'static>,
}

impl EmbeddedSource {
    pub fn new(root: &'static Dir<'static>) -> Self {
        Self { root }
    }

    /// The bundle compiled into this crate
    pub fn bundled() -> Self {
        Self::new(&BUNDLED_SCHEMAS)
    }
}

impl DocumentSource for EmbeddedSource {
    fn levels(&self) -> Result<Vec<u32>> {
        Ok(self
            .root
            .dirs()
            .filter_map(|dir| parse_level(dir.path()))
            .collect())
    }

    fn list(&self, level: u32) -> Result<Vec<String>> {
        let dir = self
            .root
            .get_dir(level.to_string())
            .ok_or(BootstrapError::MissingLevel { level })?;

        Ok(dir
            .dirs()
            .filter_map(|entry| entry.path().file_name())
            .map(|name| name.to_string_lossy().into_owned())
            .collect())
    }

    fn read(&self, level: u32, name: &str) -> Result<Vec<u8>> {
        let path = format!("{}/{}/{}", level, name, SCHEMA_FILE);
        self.root
            .get_file(&path)
            .map(|file| file.contents().to_vec())
            .ok_or_else(|| BootstrapError::MissingDocument {
                level,
                name: name.to_string(),
            })
    }
}

/// Source backed by a directory on disk, e.g. the mirror's output
pub struct FsSource {
    root: PathBuf,
}

impl FsSource {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }
}

impl DocumentSource for FsSource {
    fn levels(&self) -> Result<Vec<u32>> {
        Ok(subdirectories(&self.root)?
            .iter()
            .filter_map(|name| name.parse().ok())
            .collect())
    }

    fn list(&self, level: u32) -> Result<Vec<String>> {
        let level_dir = self.root.join(level.to_string());
        if !level_dir.is_dir() {
            return Err(BootstrapError::MissingLevel { level });
        }
        subdirectories(&level_dir)
    }

    fn read(&self, level: u32, name: &str) -> Result<Vec<u8>> {
        let path = self
            .root
            .join(level.to_string())
            .join(name)
            .join(SCHEMA_FILE);

        fs::read(&path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => BootstrapError::MissingDocument {
                level,
                name: name.to_string(),
            },
            _ => BootstrapError::Io(e),
        })
    }
}

/// Names of the directories directly under `dir`, symlinks resolved
fn subdirectories(dir: &Path) -> Result<Vec<String>> {
    let mut names = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1).follow_links(true) {
        let entry = entry.map_err(std::io::Error::from)?;
        if entry.file_type().is_dir() {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
    }
    Ok(names)
}

fn parse_level(path: &Path) -> Option<u32> {
    path.file_name()?.to_str()?.parse().ok()
}
