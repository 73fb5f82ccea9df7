//! Metadata cache decorator
//!
//! Entries are `Some(metadata)` for a path known to exist and `None` for a
//! path known to be absent. A directory listing that has been read in full
//! is recorded as complete, after which lookups below it are answered from
//! the table alone. Every successful mutation updates the table before the
//! call returns; the table lock is never held across an await.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use futures::{stream, StreamExt};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace, warn};

use crate::adapter::{
    Adapter, ByteStream, Capabilities, Metadata, MetadataStream, Visibility, WriteOptions,
};
use crate::cache::{CacheSettings, CacheStore};
use crate::error::{FsError, Result};
use crate::path::{dirname, is_descendant};

/// Serialized form of the cache table
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
struct CacheTable {
    entries: BTreeMap<String, Option<Metadata>>,
    /// Directories whose listing is fully known; `true` when that includes
    /// every level below
    complete: BTreeMap<String, bool>,
    /// Directories only inferred from a descendant; they answer existence
    /// but not metadata
    #[serde(default)]
    implied: BTreeSet<String>,
}

impl CacheTable {
    fn put(&mut self, meta: Metadata) {
        self.ensure_parents(&meta.path);
        self.implied.remove(&meta.path);
        self.entries.insert(meta.path.clone(), Some(meta));
    }

    fn put_missing(&mut self, path: &str) {
        self.implied.remove(path);
        self.entries.insert(path.to_string(), None);
    }

    fn ensure_parents(&mut self, path: &str) {
        let mut parent = dirname(path);
        while !parent.is_empty() {
            let known = matches!(self.entries.get(parent), Some(Some(_)));
            if !known {
                self.entries
                    .insert(parent.to_string(), Some(Metadata::directory(parent, None)));
                self.implied.insert(parent.to_string());
            }
            parent = dirname(parent);
        }
    }

    /// Drop everything known about `path` and below it
    fn remove_tree(&mut self, path: &str) {
        self.entries.retain(|p, _| p != path && !is_descendant(p, path));
        self.complete.retain(|p, _| p != path && !is_descendant(p, path));
        self.implied.retain(|p| p != path && !is_descendant(p, path));
    }

    /// Make the entries under `dir` agree with a fresh backend listing
    fn replace_listing(&mut self, dir: &str, recursive: bool, seen: Vec<Metadata>) {
        let stale: Vec<String> = {
            let returned: BTreeSet<&str> = seen.iter().map(|m| m.path.as_str()).collect();
            self.entries
                .keys()
                .filter(|p| is_descendant(p, dir) && (recursive || dirname(p) == dir))
                .filter(|p| !returned.contains(p.as_str()))
                .cloned()
                .collect()
        };
        for path in stale {
            trace!("list_contents: dropping stale entry {}", path);
            self.remove_tree(&path);
        }
        for meta in seen {
            self.put(meta);
        }
        self.mark_complete(dir, recursive);
    }

    fn listing_complete(&self, dir: &str, recursive: bool) -> bool {
        match self.complete.get(dir) {
            Some(true) => return true,
            Some(false) if !recursive => return true,
            _ => {}
        }
        // A recursive listing of an ancestor covers this directory too
        let mut parent = dir;
        while !parent.is_empty() {
            parent = dirname(parent);
            if self.complete.get(parent) == Some(&true) {
                return true;
            }
        }
        false
    }

    fn listing(&self, dir: &str, recursive: bool) -> Vec<Metadata> {
        self.entries
            .iter()
            .filter(|(path, _)| {
                if recursive {
                    is_descendant(path, dir)
                } else {
                    is_descendant(path, dir) && dirname(path) == dir
                }
            })
            .filter_map(|(_, entry)| entry.clone())
            .collect()
    }

    fn mark_complete(&mut self, dir: &str, recursive: bool) {
        let entry = self.complete.entry(dir.to_string()).or_insert(false);
        *entry |= recursive;
    }

    /// Undo completeness claims that `path` can no longer back up
    fn invalidate_listing_of(&mut self, path: &str) {
        let mut parent = dirname(path);
        loop {
            self.complete.remove(parent);
            if parent.is_empty() {
                break;
            }
            parent = dirname(parent);
        }
    }
}

/// Adapter decorator caching metadata
pub struct CachedAdapter {
    inner: Arc<dyn Adapter>,
    store: Arc<dyn CacheStore>,
    settings: CacheSettings,
    table: Arc<RwLock<CacheTable>>,
}

impl CachedAdapter {
    pub fn new(inner: Arc<dyn Adapter>, store: Arc<dyn CacheStore>, settings: CacheSettings) -> Self {
        Self {
            inner,
            store,
            settings,
            table: Arc::new(RwLock::new(CacheTable::default())),
        }
    }

    /// The wrapped adapter
    pub fn inner(&self) -> &Arc<dyn Adapter> {
        &self.inner
    }

    pub fn settings(&self) -> &CacheSettings {
        &self.settings
    }

    /// Replace the table with the stored snapshot, if there is one.
    ///
    /// Store or decode failures leave the table empty and are only logged.
    pub async fn load(&self) {
        let raw = match self.store.get(&self.settings.key).await {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                debug!("No cache snapshot under {}", self.settings.key);
                return;
            }
            Err(e) => {
                warn!("Failed to load cache {}: {}", self.settings.key, e);
                return;
            }
        };

        match serde_json::from_slice::<CacheTable>(&raw) {
            Ok(table) => {
                info!(
                    "Loaded cache {} with {} entries",
                    self.settings.key,
                    table.entries.len()
                );
                *self.table.write() = table;
            }
            Err(e) => warn!("Discarding unreadable cache {}: {}", self.settings.key, e),
        }
    }

    /// Write the table to the store; failures are logged and swallowed.
    pub async fn save(&self) {
        persist(&self.store, &self.settings, &self.table).await;
    }

    /// Forget everything
    pub async fn flush(&self) {
        debug!("Flushing cache {}", self.settings.key);
        *self.table.write() = CacheTable::default();
        self.autosave().await;
    }

    /// Cached metadata for `path`, without consulting the adapter
    pub fn cached(&self, path: &str) -> Option<Metadata> {
        self.table.read().entries.get(path).cloned().flatten()
    }

    /// Cached metadata that came from the backend rather than being
    /// inferred from a descendant
    fn cached_complete(&self, path: &str) -> Option<Metadata> {
        let table = self.table.read();
        if table.implied.contains(path) {
            return None;
        }
        table.entries.get(path).cloned().flatten()
    }

    /// Whether anything, present or absent, is recorded for `path`
    pub fn is_cached(&self, path: &str) -> bool {
        self.table.read().entries.contains_key(path)
    }

    /// Drop what is known about `path` after it changed outside the adapter
    pub fn forget(&self, path: &str) {
        let mut table = self.table.write();
        table.remove_tree(path);
        table.invalidate_listing_of(path);
    }

    pub fn len(&self) -> usize {
        self.table.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.read().entries.is_empty()
    }

    async fn autosave(&self) {
        if self.settings.autosave {
            self.save().await;
        }
    }

    /// `Some(answer)` when the table alone decides whether `path` exists
    fn known_existence(&self, path: &str) -> Option<bool> {
        let table = self.table.read();
        match table.entries.get(path) {
            Some(Some(_)) => Some(true),
            Some(None) => Some(false),
            None if !path.is_empty() && table.listing_complete(dirname(path), false) => {
                Some(false)
            }
            None => None,
        }
    }

    fn record_not_found<T>(&self, path: &str, result: &Result<T>) {
        if let Err(FsError::NotFound(_)) = result {
            self.table.write().put_missing(path);
        }
    }

    fn record_write(&self, mut meta: Metadata, options: &WriteOptions) {
        if meta.visibility.is_none() {
            meta.visibility = options.visibility;
        }
        if meta.mimetype.is_none() {
            meta.mimetype = options.mimetype.clone();
        }
        self.table.write().put(meta);
    }
}

async fn persist(store: &Arc<dyn CacheStore>, settings: &CacheSettings, table: &RwLock<CacheTable>) {
    let encoded = {
        let table = table.read();
        serde_json::to_vec(&*table)
    };
    let encoded = match encoded {
        Ok(encoded) => encoded,
        Err(e) => {
            warn!("Failed to encode cache {}: {}", settings.key, e);
            return;
        }
    };

    match store.set(&settings.key, encoded, settings.ttl).await {
        Ok(()) => trace!("Saved cache {}", settings.key),
        Err(e) => warn!("Failed to save cache {}: {}", settings.key, e),
    }
}

#[async_trait]
impl Adapter for CachedAdapter {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn capabilities(&self) -> Capabilities {
        self.inner.capabilities()
    }

    async fn has(&self, path: &str) -> Result<bool> {
        if let Some(known) = self.known_existence(path) {
            trace!("has: path={} cached={}", path, known);
            return Ok(known);
        }

        let exists = self.inner.has(path).await?;
        if !exists {
            self.table.write().put_missing(path);
        }
        Ok(exists)
    }

    async fn read(&self, path: &str) -> Result<Bytes> {
        if self.known_existence(path) == Some(false) {
            return Err(FsError::NotFound(path.to_string()));
        }
        let result = self.inner.read(path).await;
        self.record_not_found(path, &result);
        result
    }

    async fn read_stream(&self, path: &str) -> Result<ByteStream> {
        if self.known_existence(path) == Some(false) {
            return Err(FsError::NotFound(path.to_string()));
        }
        let result = self.inner.read_stream(path).await;
        self.record_not_found(path, &result);
        result
    }

    async fn write(&self, path: &str, contents: Bytes, options: &WriteOptions) -> Result<Metadata> {
        let meta = self.inner.write(path, contents, options).await?;
        self.record_write(meta.clone(), options);
        self.autosave().await;
        Ok(meta)
    }

    async fn write_stream(
        &self,
        path: &str,
        stream: ByteStream,
        options: &WriteOptions,
    ) -> Result<Metadata> {
        let meta = self.inner.write_stream(path, stream, options).await?;
        self.record_write(meta.clone(), options);
        self.autosave().await;
        Ok(meta)
    }

    async fn delete(&self, path: &str) -> Result<()> {
        self.inner.delete(path).await?;
        self.table.write().put_missing(path);
        self.autosave().await;
        Ok(())
    }

    async fn delete_dir(&self, path: &str) -> Result<()> {
        self.inner.delete_dir(path).await?;
        {
            let mut table = self.table.write();
            table.remove_tree(path);
            table.put_missing(path);
        }
        self.autosave().await;
        Ok(())
    }

    async fn rename(&self, from: &str, to: &str) -> Result<()> {
        self.inner.rename(from, to).await?;
        {
            let mut table = self.table.write();
            let moved: Vec<(String, Metadata, bool)> = table
                .entries
                .iter()
                .filter(|(p, _)| p.as_str() == from || is_descendant(p, from))
                .filter_map(|(p, entry)| {
                    entry
                        .clone()
                        .map(|m| (p.clone(), m, table.implied.contains(p.as_str())))
                })
                .collect();
            let source_known = table.entries.contains_key(from);

            table.remove_tree(from);
            table.remove_tree(to);
            table.put_missing(from);
            for (old_path, mut meta, implied) in moved {
                meta.path = format!("{}{}", to, &old_path[from.len()..]);
                let new_path = meta.path.clone();
                table.put(meta);
                if implied {
                    table.implied.insert(new_path);
                }
            }
            if !source_known {
                table.ensure_parents(to);
                table.invalidate_listing_of(to);
            }
        }
        self.autosave().await;
        Ok(())
    }

    async fn copy(&self, from: &str, to: &str) -> Result<()> {
        self.inner.copy(from, to).await?;
        let source = self.cached(from);
        match source {
            Some(mut meta) => {
                meta.path = to.to_string();
                self.table.write().put(meta);
            }
            None => match self.inner.metadata(to).await {
                Ok(meta) => self.table.write().put(meta),
                Err(_) => {
                    let mut table = self.table.write();
                    table.entries.remove(to);
                    table.invalidate_listing_of(to);
                }
            },
        }
        self.autosave().await;
        Ok(())
    }

    async fn create_dir(&self, path: &str, options: &WriteOptions) -> Result<Metadata> {
        let meta = self.inner.create_dir(path, options).await?;
        self.table.write().put(meta.clone());
        self.autosave().await;
        Ok(meta)
    }

    fn list_contents(&self, dir: &str, recursive: bool) -> MetadataStream {
        {
            let table = self.table.read();
            if table.listing_complete(dir, recursive) {
                trace!("list_contents: dir={} served from cache", dir);
                let entries = table.listing(dir, recursive);
                return Box::pin(stream::iter(entries.into_iter().map(Ok)));
            }
        }

        let inner = self.inner.list_contents(dir, recursive);
        let table = self.table.clone();
        let store = self.store.clone();
        let settings = self.settings.clone();
        let dir = dir.to_string();

        Box::pin(async_stream::try_stream! {
            let mut inner = inner;
            let mut seen = Vec::new();
            while let Some(entry) = inner.next().await {
                let entry = entry?;
                seen.push(entry.clone());
                yield entry;
            }

            table.write().replace_listing(&dir, recursive, seen);
            if settings.autosave {
                persist(&store, &settings, &table).await;
            }
        })
    }

    async fn metadata(&self, path: &str) -> Result<Metadata> {
        match self.known_existence(path) {
            Some(true) => {
                if let Some(meta) = self.cached_complete(path) {
                    trace!("metadata: path={} served from cache", path);
                    return Ok(meta);
                }
            }
            Some(false) => return Err(FsError::NotFound(path.to_string())),
            None => {}
        }

        let result = self.inner.metadata(path).await;
        match &result {
            Ok(meta) => self.table.write().put(meta.clone()),
            Err(FsError::NotFound(_)) => self.table.write().put_missing(path),
            Err(_) => {}
        }
        result
    }

    async fn mimetype(&self, path: &str) -> Result<Option<String>> {
        if let Some(mimetype) = self.cached(path).and_then(|m| m.mimetype) {
            return Ok(Some(mimetype));
        }
        let mimetype = self.inner.mimetype(path).await?;
        if let Some(Some(meta)) = self.table.write().entries.get_mut(path) {
            meta.mimetype = mimetype.clone();
        }
        Ok(mimetype)
    }

    async fn visibility(&self, path: &str) -> Result<Visibility> {
        if let Some(visibility) = self.cached(path).and_then(|m| m.visibility) {
            return Ok(visibility);
        }
        let visibility = self.inner.visibility(path).await?;
        if let Some(Some(meta)) = self.table.write().entries.get_mut(path) {
            meta.visibility = Some(visibility);
        }
        Ok(visibility)
    }

    async fn set_visibility(&self, path: &str, visibility: Visibility) -> Result<()> {
        self.inner.set_visibility(path, visibility).await?;
        if let Some(Some(meta)) = self.table.write().entries.get_mut(path) {
            meta.visibility = Some(visibility);
        }
        self.autosave().await;
        Ok(())
    }

    fn path_prefix(&self) -> &str {
        self.inner.path_prefix()
    }

    fn local_root(&self) -> Option<&std::path::Path> {
        self.inner.local_root()
    }
}
