//! Bundled cache stores

use std::path::PathBuf;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use dashmap::DashMap;
use tracing::{debug, trace};

use crate::cache::CacheStore;
use crate::error::{FsError, Result};

struct StoredValue {
    data: Vec<u8>,
    expires_at: Option<Instant>,
}

/// Process-local store
#[derive(Default)]
pub struct MemoryStore {
    values: DashMap<String, StoredValue>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[async_trait]
impl CacheStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let expired = match self.values.get(key) {
            None => return Ok(None),
            Some(value) => match value.expires_at {
                Some(at) if at <= Instant::now() => true,
                _ => return Ok(Some(value.data.clone())),
            },
        };
        if expired {
            trace!("Expiring cache key {}", key);
            self.values.remove(key);
        }
        Ok(None)
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> Result<()> {
        self.values.insert(
            key.to_string(),
            StoredValue {
                data: value,
                expires_at: ttl.map(|ttl| Instant::now() + ttl),
            },
        );
        Ok(())
    }

    async fn forget(&self, key: &str) -> Result<()> {
        self.values.remove(key);
        Ok(())
    }
}

/// One file per key below a directory.
///
/// Each file starts with a header line holding the expiry as unix seconds
/// (`0` for never), followed by the raw value.
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn key_path(&self, key: &str) -> PathBuf {
        let safe_name: String = key
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        if safe_name.is_empty() {
            self.dir.join("_default.cache")
        } else {
            self.dir.join(format!("{}.cache", safe_name))
        }
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

fn store_error(action: &str, err: impl std::fmt::Display) -> FsError {
    FsError::Cache(format!("Failed to {} cache file: {}", action, err))
}

#[async_trait]
impl CacheStore for FileStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.key_path(key);
        let raw = match tokio::fs::read(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(store_error("read", e)),
        };

        let newline = raw
            .iter()
            .position(|b| *b == b'\n')
            .ok_or_else(|| FsError::Cache(format!("Corrupt cache file {:?}", path)))?;
        let expires_at: u64 = std::str::from_utf8(&raw[..newline])
            .ok()
            .and_then(|s| s.trim().parse().ok())
            .ok_or_else(|| FsError::Cache(format!("Corrupt cache header in {:?}", path)))?;

        if expires_at != 0 && expires_at <= unix_now() {
            debug!("Cache file {:?} expired", path);
            let _ = tokio::fs::remove_file(&path).await;
            return Ok(None);
        }
        Ok(Some(raw[newline + 1..].to_vec()))
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| store_error("create directory for", e))?;

        let expires_at = ttl.map(|ttl| unix_now() + ttl.as_secs().max(1)).unwrap_or(0);
        let mut contents = format!("{}\n", expires_at).into_bytes();
        contents.extend_from_slice(&value);

        let path = self.key_path(key);
        let tmp = path.with_extension("cache.tmp");
        tokio::fs::write(&tmp, &contents)
            .await
            .map_err(|e| store_error("write", e))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|e| store_error("replace", e))
    }

    async fn forget(&self, key: &str) -> Result<()> {
        match tokio::fs::remove_file(self.key_path(key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(store_error("remove", e)),
        }
    }
}
