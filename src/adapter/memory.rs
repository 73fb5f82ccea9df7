//! In-memory and null adapters
//!
//! `MemoryAdapter` keeps every file in process memory and backs the `array`
//! driver. `NullAdapter` backs the `null` driver: writes succeed and are
//! discarded, nothing is ever present.

use std::collections::BTreeMap;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::RwLock;
use tracing::trace;

use crate::adapter::{
    now_timestamp, Adapter, Capabilities, Metadata, MetadataStream, Visibility, WriteOptions,
};
use crate::error::{FsError, Result};
use crate::path::{dirname, is_descendant};

#[derive(Debug, Clone)]
struct StoredFile {
    data: Bytes,
    meta: Metadata,
}

#[derive(Default)]
struct MemoryState {
    files: BTreeMap<String, StoredFile>,
    dirs: BTreeMap<String, Metadata>,
}

impl MemoryState {
    /// Register every missing ancestor of `path` as a directory
    fn ensure_parents(&mut self, path: &str, timestamp: i64) {
        let mut parent = dirname(path);
        while !parent.is_empty() {
            self.dirs
                .entry(parent.to_string())
                .or_insert_with(|| Metadata::directory(parent, Some(timestamp)));
            parent = dirname(parent);
        }
    }

    fn entries(&self) -> impl Iterator<Item = &Metadata> {
        self.files
            .values()
            .map(|f| &f.meta)
            .chain(self.dirs.values())
    }
}

/// In-memory adapter
#[derive(Default)]
pub struct MemoryAdapter {
    state: RwLock<MemoryState>,
}

impl MemoryAdapter {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Adapter for MemoryAdapter {
    fn name(&self) -> &str {
        "array"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            seekable: true,
            atomic_rename: true,
            visibility: true,
            real_directories: true,
            permissions: false,
            symlinks: false,
        }
    }

    async fn has(&self, path: &str) -> Result<bool> {
        let state = self.state.read();
        Ok(path.is_empty() || state.files.contains_key(path) || state.dirs.contains_key(path))
    }

    async fn read(&self, path: &str) -> Result<Bytes> {
        trace!("read: path={}", path);
        self.state
            .read()
            .files
            .get(path)
            .map(|f| f.data.clone())
            .ok_or_else(|| FsError::NotFound(path.to_string()))
    }

    async fn write(&self, path: &str, contents: Bytes, options: &WriteOptions) -> Result<Metadata> {
        trace!("write: path={} size={}", path, contents.len());
        let mut state = self.state.write();
        if state.dirs.contains_key(path) {
            return Err(FsError::InvalidArgument(format!("{} is a directory", path)));
        }

        let timestamp = now_timestamp();
        let previous_visibility = state.files.get(path).and_then(|f| f.meta.visibility);
        let meta = Metadata::file(path, contents.len() as u64, timestamp)
            .with_visibility(
                options
                    .visibility
                    .or(previous_visibility)
                    .unwrap_or_default(),
            )
            .with_mimetype(options.mimetype.clone());

        state.ensure_parents(path, timestamp);
        state.files.insert(
            path.to_string(),
            StoredFile {
                data: contents,
                meta: meta.clone(),
            },
        );
        Ok(meta)
    }

    async fn delete(&self, path: &str) -> Result<()> {
        self.state
            .write()
            .files
            .remove(path)
            .map(|_| ())
            .ok_or_else(|| FsError::NotFound(path.to_string()))
    }

    async fn delete_dir(&self, path: &str) -> Result<()> {
        let mut state = self.state.write();
        let had_dir = state.dirs.remove(path).is_some();
        let before = state.files.len() + state.dirs.len();
        state.files.retain(|p, _| !is_descendant(p, path));
        state.dirs.retain(|p, _| !is_descendant(p, path));
        let removed = before - (state.files.len() + state.dirs.len());

        if !had_dir && removed == 0 {
            return Err(FsError::NotFound(path.to_string()));
        }
        Ok(())
    }

    /// Moves a file, or a directory with everything below it
    async fn rename(&self, from: &str, to: &str) -> Result<()> {
        let mut state = self.state.write();
        let timestamp = now_timestamp();
        if let Some(mut file) = state.files.remove(from) {
            file.meta.path = to.to_string();
            state.ensure_parents(to, timestamp);
            state.files.insert(to.to_string(), file);
            return Ok(());
        }

        if !state.dirs.contains_key(from) {
            return Err(FsError::NotFound(from.to_string()));
        }
        if is_descendant(to, from) {
            return Err(FsError::InvalidArgument(format!(
                "Cannot move {} into itself",
                from
            )));
        }

        let moved = |old: &str| format!("{}{}", to, &old[from.len()..]);
        let files: Vec<String> = state
            .files
            .keys()
            .filter(|p| is_descendant(p, from))
            .cloned()
            .collect();
        for old in files {
            if let Some(mut file) = state.files.remove(&old) {
                file.meta.path = moved(&old);
                state.files.insert(file.meta.path.clone(), file);
            }
        }
        let dirs: Vec<String> = state
            .dirs
            .keys()
            .filter(|p| p.as_str() == from || is_descendant(p, from))
            .cloned()
            .collect();
        for old in dirs {
            if let Some(mut meta) = state.dirs.remove(&old) {
                meta.path = moved(&old);
                state.dirs.insert(meta.path.clone(), meta);
            }
        }
        state.ensure_parents(to, timestamp);
        trace!("rename: moved directory {} to {}", from, to);
        Ok(())
    }

    async fn copy(&self, from: &str, to: &str) -> Result<()> {
        let mut state = self.state.write();
        let mut file = state
            .files
            .get(from)
            .cloned()
            .ok_or_else(|| FsError::NotFound(from.to_string()))?;
        let timestamp = now_timestamp();
        file.meta.path = to.to_string();
        file.meta.timestamp = Some(timestamp);
        state.ensure_parents(to, timestamp);
        state.files.insert(to.to_string(), file);
        Ok(())
    }

    async fn create_dir(&self, path: &str, options: &WriteOptions) -> Result<Metadata> {
        let mut state = self.state.write();
        if state.files.contains_key(path) {
            return Err(FsError::AlreadyExists(path.to_string()));
        }
        let timestamp = now_timestamp();
        let meta = Metadata::directory(path, Some(timestamp))
            .with_visibility(options.visibility.unwrap_or_default());
        state.ensure_parents(path, timestamp);
        state.dirs.insert(path.to_string(), meta.clone());
        Ok(meta)
    }

    fn list_contents(&self, dir: &str, recursive: bool) -> MetadataStream {
        let state = self.state.read();
        let mut entries: Vec<Metadata> = state
            .entries()
            .filter(|m| {
                if recursive {
                    is_descendant(&m.path, dir)
                } else {
                    !m.path.is_empty() && dirname(&m.path) == dir
                }
            })
            .cloned()
            .collect();
        entries.sort_by(|a, b| a.path.cmp(&b.path));
        Box::pin(futures::stream::iter(entries.into_iter().map(Ok)))
    }

    async fn metadata(&self, path: &str) -> Result<Metadata> {
        if path.is_empty() {
            return Ok(Metadata::directory("", None));
        }
        let state = self.state.read();
        if let Some(file) = state.files.get(path) {
            return Ok(file.meta.clone());
        }
        state
            .dirs
            .get(path)
            .cloned()
            .ok_or_else(|| FsError::NotFound(path.to_string()))
    }

    async fn set_visibility(&self, path: &str, visibility: Visibility) -> Result<()> {
        let mut state = self.state.write();
        if let Some(file) = state.files.get_mut(path) {
            file.meta.visibility = Some(visibility);
            return Ok(());
        }
        match state.dirs.get_mut(path) {
            Some(dir) => {
                dir.visibility = Some(visibility);
                Ok(())
            }
            None => Err(FsError::NotFound(path.to_string())),
        }
    }
}

/// Adapter that stores nothing
#[derive(Debug, Default)]
pub struct NullAdapter;

#[async_trait]
impl Adapter for NullAdapter {
    fn name(&self) -> &str {
        "null"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::default()
    }

    async fn has(&self, _path: &str) -> Result<bool> {
        Ok(false)
    }

    async fn read(&self, path: &str) -> Result<Bytes> {
        Err(FsError::NotFound(path.to_string()))
    }

    async fn write(&self, path: &str, contents: Bytes, options: &WriteOptions) -> Result<Metadata> {
        Ok(Metadata::file(path, contents.len() as u64, now_timestamp())
            .with_visibility(options.visibility.unwrap_or_default()))
    }

    async fn delete(&self, path: &str) -> Result<()> {
        Err(FsError::NotFound(path.to_string()))
    }

    async fn delete_dir(&self, path: &str) -> Result<()> {
        Err(FsError::NotFound(path.to_string()))
    }

    async fn rename(&self, from: &str, _to: &str) -> Result<()> {
        Err(FsError::NotFound(from.to_string()))
    }

    async fn copy(&self, _from: &str, _to: &str) -> Result<()> {
        Ok(())
    }

    async fn create_dir(&self, path: &str, _options: &WriteOptions) -> Result<Metadata> {
        Ok(Metadata::directory(path, None))
    }

    fn list_contents(&self, _dir: &str, _recursive: bool) -> MetadataStream {
        Box::pin(futures::stream::empty())
    }

    async fn metadata(&self, path: &str) -> Result<Metadata> {
        Err(FsError::NotFound(path.to_string()))
    }

    async fn set_visibility(&self, _path: &str, _visibility: Visibility) -> Result<()> {
        Ok(())
    }
}
