//! Content storage for uploaded photographs.
//!
//! A thin filesystem wrapper addressed by stored filename. Names follow the
//! `{application_id}_{timestamp}{ext}` scheme, so they never collide across
//! submissions even when submitters upload identically named files.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Filesystem-backed photo storage rooted at the configured upload directory.
#[derive(Debug, Clone)]
pub struct FileStorage {
    root: PathBuf,
}

impl FileStorage {
    /// Create storage rooted at `root`, creating the directory if needed.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)
            .with_context(|| format!("failed to create upload dir {}", root.display()))?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    /// Write `bytes` under `name`, overwriting any existing file.
    pub fn write(&self, name: &str, bytes: &[u8]) -> Result<()> {
        let path = self.resolve(name);
        std::fs::write(&path, bytes)
            .with_context(|| format!("failed to write {}", path.display()))
    }

    /// Read the stored bytes for `name`.
    pub fn read(&self, name: &str) -> Result<Vec<u8>> {
        let path = self.resolve(name);
        std::fs::read(&path).with_context(|| format!("failed to read {}", path.display()))
    }

    /// Delete the file for `name`. Missing files are not an error.
    pub fn delete(&self, name: &str) -> Result<()> {
        let path = self.resolve(name);
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("failed to delete {}", path.display())),
        }
    }

    /// Whether a file exists for `name`.
    pub fn exists(&self, name: &str) -> bool {
        self.resolve(name).is_file()
    }

    /// Delete every stored file. Returns the number removed. Used by the
    /// administrative reset.
    pub fn purge(&self) -> Result<usize> {
        let mut removed = 0;
        for entry in std::fs::read_dir(&self.root)
            .with_context(|| format!("failed to list {}", self.root.display()))?
        {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                std::fs::remove_file(entry.path())
                    .with_context(|| format!("failed to delete {}", entry.path().display()))?;
                removed += 1;
            }
        }
        Ok(removed)
    }
}
