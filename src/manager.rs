//! Connection manager
//!
//! [`FileManager`] owns the configuration, the connector registry and the
//! cache store shared by every cached connection. It builds [`Filesystem`]
//! facades by connection name and the [`FilesystemMap`] that URL based
//! access resolves against.

use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info};

use crate::adapter::Adapter;
use crate::cache::{create_store, CacheSettings, CacheStore, CachedAdapter};
use crate::config::Config;
use crate::connector::ConnectorRegistry;
use crate::error::Result;
use crate::filesystem::{Filesystem, FilesystemOptions};
use crate::map::FilesystemMap;
use crate::stream::StreamWrapper;

struct ManagerInner {
    config: Config,
    registry: ConnectorRegistry,
    cache_store: Option<Arc<dyn CacheStore>>,
}

/// Builds filesystems from one configuration; cheap to clone
#[derive(Clone)]
pub struct FileManager {
    inner: Arc<ManagerInner>,
}

impl FileManager {
    pub fn new(config: Config) -> Self {
        let cache_store = config
            .caching
            .enable
            .then(|| create_store(&config.caching.store));
        Self {
            inner: Arc::new(ManagerInner {
                config,
                registry: ConnectorRegistry::new(),
                cache_store,
            }),
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        Ok(Self::new(Config::from_file(path)?))
    }

    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// Registry used for every connection; register custom connectors here
    pub fn registry(&self) -> &ConnectorRegistry {
        &self.inner.registry
    }

    pub fn resolve_alias(&self, name: &str) -> Result<String> {
        Ok(self.inner.config.resolve_alias(name)?)
    }

    pub fn has_driver(&self, name: &str) -> bool {
        self.inner.config.has_driver(name) || self.inner.registry.has_custom(name)
    }

    pub fn stream_protocol(&self) -> &str {
        &self.inner.config.stream_protocol
    }

    /// Names of the configured connections followed by the aliases
    pub fn connections(&self) -> Vec<String> {
        let config = &self.inner.config;
        config
            .connections
            .keys()
            .chain(config.aliases.keys())
            .cloned()
            .collect()
    }

    /// Build the filesystem for connection `name`
    pub async fn make_connection(&self, name: &str) -> Result<Filesystem> {
        let config = &self.inner.config;
        let resolved = config.resolve_alias(name)?;
        let adapter = self.inner.registry.make_named(&resolved, config).await?;

        let options = FilesystemOptions {
            visibility: config.visibility,
            disable_asserts: config.pirate,
        };
        let fs = match &self.inner.cache_store {
            Some(store) => {
                let cache = Arc::new(self.cached_adapter(&resolved, adapter, store.clone()));
                cache.load().await;
                Filesystem::cached(cache)
            }
            None => Filesystem::new(adapter),
        };

        info!("Connection {} ready", resolved);
        Ok(fs.with_options(options).with_manager(self.clone()))
    }

    pub async fn default_connection(&self) -> Result<Filesystem> {
        self.make_connection(&self.inner.config.default).await
    }

    fn cached_adapter(
        &self,
        name: &str,
        adapter: Arc<dyn Adapter>,
        store: Arc<dyn CacheStore>,
    ) -> CachedAdapter {
        let mut settings = CacheSettings::from(&self.inner.config.caching);
        settings.key = format!("{}.{}", settings.key, name);
        debug!("Caching connection {} under {}", name, settings.key);
        CachedAdapter::new(adapter, store, settings)
    }

    /// Map holding every configured connection under its own name
    pub async fn filesystem_map(&self) -> Result<FilesystemMap> {
        let map = FilesystemMap::new();
        for name in self.inner.config.connections.keys() {
            map.set(name, self.make_connection(name).await?)?;
        }
        Ok(map)
    }

    /// URL access over [`FileManager::filesystem_map`] using the configured
    /// stream protocol
    pub async fn stream_wrapper(&self) -> Result<StreamWrapper> {
        let map = self.filesystem_map().await?;
        Ok(StreamWrapper::new(self.stream_protocol(), Arc::new(map)))
    }
}
