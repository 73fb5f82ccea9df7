//! Named filesystems
//!
//! The map is plain process state: build it at startup, hand an `Arc` to
//! whatever resolves `scheme://name/path` URLs, and clear it on shutdown.

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use regex::Regex;
use tracing::debug;

use crate::error::{FsError, Result};
use crate::filesystem::Filesystem;

static NAME_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[-_a-zA-Z0-9]+$").expect("valid filesystem name regex"));

/// Registry of filesystems by logical name, iterated in insertion order
#[derive(Default)]
pub struct FilesystemMap {
    entries: RwLock<IndexMap<String, Filesystem>>,
}

impl FilesystemMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `fs` under `name`, replacing any previous entry
    pub fn set(&self, name: &str, fs: Filesystem) -> Result<()> {
        if !NAME_PATTERN.is_match(name) {
            return Err(FsError::InvalidArgument(format!(
                "Invalid filesystem name {:?}: only letters, digits, '-' and '_' are allowed",
                name
            )));
        }
        debug!("Registering filesystem {}", name);
        self.entries.write().insert(name.to_string(), fs);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Result<Filesystem> {
        self.entries
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| FsError::NotFound(format!("filesystem {:?}", name)))
    }

    pub fn has(&self, name: &str) -> bool {
        self.entries.read().contains_key(name)
    }

    pub fn remove(&self, name: &str) -> Result<Filesystem> {
        self.entries
            .write()
            .shift_remove(name)
            .ok_or_else(|| FsError::NotFound(format!("filesystem {:?}", name)))
    }

    pub fn clear(&self) {
        self.entries.write().clear();
    }

    /// Snapshot of every `(name, filesystem)` pair
    pub fn entries(&self) -> Vec<(String, Filesystem)> {
        self.entries
            .read()
            .iter()
            .map(|(name, fs)| (name.clone(), fs.clone()))
            .collect()
    }

    pub fn names(&self) -> Vec<String> {
        self.entries.read().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}
