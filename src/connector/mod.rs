//! Connector registry
//!
//! A connector turns one connection's configuration map into an adapter.
//! Built-in drivers are a closed [`Driver`] enum; hosts extend the set at
//! runtime with [`ConnectorRegistry::register`] or hand over a ready adapter
//! with [`ConnectorRegistry::register_adapter`]. Both kinds of registration
//! win over a built-in driver of the same name.

pub mod drivers;

use std::sync::Arc;

use async_trait::async_trait;
use indexmap::IndexMap;
use parking_lot::RwLock;
use tracing::{debug, info};

use crate::adapter::dropbox::DropboxAdapter;
use crate::adapter::local::LocalAdapter;
use crate::adapter::memory::{MemoryAdapter, NullAdapter};
use crate::adapter::object_store::ObjectStoreAdapter;
use crate::adapter::s3::S3Adapter;
use crate::adapter::Adapter;
use crate::config::{Config, ConfigMap};
use crate::error::{FsError, Result};

pub use drivers::{Driver, DriverConfig};

/// Factory producing an adapter from a connection's configuration map
#[async_trait]
pub trait Connector: Send + Sync {
    /// Validate `config` and construct the adapter.
    ///
    /// Missing or malformed keys fail here, never on first use.
    async fn connect(&self, config: &ConfigMap) -> Result<Arc<dyn Adapter>>;
}

/// Connector for one of the built-in drivers
pub struct BuiltinConnector {
    driver: Driver,
}

impl BuiltinConnector {
    pub fn new(driver: Driver) -> Self {
        Self { driver }
    }

    pub fn driver(&self) -> Driver {
        self.driver
    }
}

#[async_trait]
impl Connector for BuiltinConnector {
    async fn connect(&self, config: &ConfigMap) -> Result<Arc<dyn Adapter>> {
        let settings = self.driver.validate(config)?;
        debug!("Validated {} configuration", self.driver);

        let adapter: Arc<dyn Adapter> = match settings {
            DriverConfig::Local(options) => Arc::new(LocalAdapter::new(options)?),
            DriverConfig::AwsS3(options) => Arc::new(S3Adapter::new(options).await?),
            DriverConfig::Azure(c) => Arc::new(ObjectStoreAdapter::azure(
                &c.account_name,
                &c.api_key,
                &c.container,
                c.prefix.as_deref(),
            )?),
            DriverConfig::Dropbox(c) => Arc::new(DropboxAdapter::new(c.token, Some(&c.prefix))),
            DriverConfig::Gcs(c) => Arc::new(ObjectStoreAdapter::gcs(
                &c.bucket,
                c.key_file.as_deref(),
                c.prefix.as_deref(),
            )?),
            DriverConfig::WebDav(c) => {
                Arc::new(ObjectStoreAdapter::webdav(&c.base_uri, c.credentials(), c.prefix.as_deref())?)
            }
            DriverConfig::Null => Arc::new(NullAdapter),
            DriverConfig::Array => Arc::new(MemoryAdapter::new()),
            DriverConfig::Ftp(_)
            | DriverConfig::Sftp(_)
            | DriverConfig::GridFs(_)
            | DriverConfig::Rackspace(_)
            | DriverConfig::Zip(_) => {
                return Err(FsError::BackendUnavailable(self.driver.name().to_string()))
            }
        };

        info!("Connected {} adapter", self.driver);
        Ok(adapter)
    }
}

/// Maps driver names to connectors
#[derive(Default)]
pub struct ConnectorRegistry {
    connectors: RwLock<IndexMap<String, Arc<dyn Connector>>>,
    adapters: RwLock<IndexMap<String, Arc<dyn Adapter>>>,
}

impl ConnectorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a custom connector for `driver`
    pub fn register(&self, driver: impl Into<String>, connector: Arc<dyn Connector>) {
        let driver = driver.into();
        debug!("Registering custom connector {}", driver);
        self.connectors.write().insert(driver, connector);
    }

    /// Register a ready-made adapter under a connection name
    pub fn register_adapter(&self, name: impl Into<String>, adapter: Arc<dyn Adapter>) {
        let name = name.into();
        debug!("Registering adapter instance {}", name);
        self.adapters.write().insert(name, adapter);
    }

    pub fn has_custom(&self, name: &str) -> bool {
        self.connectors.read().contains_key(name) || self.adapters.read().contains_key(name)
    }

    /// Connector for `driver`; custom registrations take precedence.
    pub fn create_connector(&self, driver: &str) -> Result<Arc<dyn Connector>> {
        if let Some(connector) = self.connectors.read().get(driver) {
            return Ok(connector.clone());
        }
        let builtin: Driver = driver.parse()?;
        Ok(Arc::new(BuiltinConnector::new(builtin)))
    }

    /// Build the adapter for the configured default connection
    pub async fn make_adapter(&self, config: &Config) -> Result<Arc<dyn Adapter>> {
        self.make_named(&config.default, config).await
    }

    /// Build the adapter for connection `name` (aliases resolved).
    pub async fn make_named(&self, name: &str, config: &Config) -> Result<Arc<dyn Adapter>> {
        let name = config.resolve_alias(name)?;
        if let Some(adapter) = self.adapters.read().get(&name) {
            return Ok(adapter.clone());
        }

        let driver = config.driver_for(&name);
        let settings = config.connection(&name).cloned().unwrap_or_default();
        debug!("Connecting {} with driver {}", name, driver);

        let connector = self.create_connector(&driver)?;
        connector.connect(&settings).await
    }
}
