//! Metadata caching
//!
//! [`CachedAdapter`] wraps another adapter and remembers what it has learned
//! about paths. Snapshots of that table persist through a [`CacheStore`],
//! a plain key/value interface with two bundled implementations.

pub mod decorator;
pub mod store;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::config::{CacheStoreConfig, CachingConfig};
use crate::error::Result;

pub use decorator::CachedAdapter;
pub use store::{FileStore, MemoryStore};

/// Key/value persistence for cache snapshots
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Store `value`; with a TTL the entry disappears once it elapses.
    async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> Result<()>;

    async fn forget(&self, key: &str) -> Result<()>;
}

/// Decorator settings derived from the `caching` section
#[derive(Debug, Clone)]
pub struct CacheSettings {
    pub key: String,
    pub ttl: Option<Duration>,
    pub autosave: bool,
}

impl CacheSettings {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            ttl: None,
            autosave: true,
        }
    }
}

impl From<&CachingConfig> for CacheSettings {
    fn from(config: &CachingConfig) -> Self {
        Self {
            key: config.key.clone(),
            ttl: config.ttl.map(Duration::from_secs),
            autosave: config.autosave,
        }
    }
}

/// Build the store named by the configuration
pub fn create_store(config: &CacheStoreConfig) -> Arc<dyn CacheStore> {
    match config {
        CacheStoreConfig::Memory => Arc::new(MemoryStore::new()),
        CacheStoreConfig::File { path } => Arc::new(FileStore::new(path.clone())),
    }
}
