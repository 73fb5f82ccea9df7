//! Configuration builder for e2e tests
//!
//! Generates YAML configuration files in the format `unifs::config::Config`
//! reads.

use anyhow::Result;
use serde::Serialize;
use serde_yaml::{Mapping, Value};
use std::path::Path;

/// Logging configuration
#[derive(Debug, Clone, Serialize)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "debug".to_string(),
        }
    }
}

/// Cache store selection
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum CacheStoreConfig {
    Memory,
    File { path: String },
}

/// Metadata cache configuration
#[derive(Debug, Clone, Serialize)]
pub struct CachingConfig {
    pub enable: bool,
    pub key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ttl: Option<u64>,
    pub autosave: bool,
    pub store: CacheStoreConfig,
}

impl Default for CachingConfig {
    fn default() -> Self {
        Self {
            enable: false,
            key: "e2e".to_string(),
            ttl: None,
            autosave: true,
            store: CacheStoreConfig::Memory,
        }
    }
}

/// Full test configuration
#[derive(Debug, Clone, Serialize)]
pub struct TestConfig {
    pub logging: LoggingConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream_protocol: Option<String>,
    pub pirate: bool,
    pub aliases: Mapping,
    pub caching: CachingConfig,
    /// Connection name to its configuration map, in insertion order
    pub connections: Mapping,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            logging: LoggingConfig::default(),
            default: None,
            stream_protocol: None,
            pirate: false,
            aliases: Mapping::new(),
            caching: CachingConfig::default(),
            connections: Mapping::new(),
        }
    }
}

impl TestConfig {
    /// Create a new configuration builder
    pub fn builder() -> TestConfigBuilder {
        TestConfigBuilder::new()
    }

    /// Serialize to YAML string
    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Write configuration to a file
    pub fn write_to_file(&self, path: &Path) -> Result<()> {
        let yaml = self.to_yaml()?;
        std::fs::write(path, yaml)?;
        Ok(())
    }
}

/// Builder for test configurations
pub struct TestConfigBuilder {
    config: TestConfig,
}

impl Default for TestConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TestConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: TestConfig::default(),
        }
    }

    /// Set the logging level
    pub fn logging_level(mut self, level: &str) -> Self {
        self.config.logging.level = level.to_string();
        self
    }

    pub fn default_connection(mut self, name: &str) -> Self {
        self.config.default = Some(name.to_string());
        self
    }

    pub fn stream_protocol(mut self, scheme: &str) -> Self {
        self.config.stream_protocol = Some(scheme.to_string());
        self
    }

    pub fn pirate(mut self, enabled: bool) -> Self {
        self.config.pirate = enabled;
        self
    }

    pub fn alias(mut self, alias: &str, target: &str) -> Self {
        self.config
            .aliases
            .insert(Value::from(alias), Value::from(target));
        self
    }

    /// Add a connection with an arbitrary configuration map
    pub fn connection(mut self, name: &str, settings: &[(&str, Value)]) -> Self {
        let mut map = Mapping::new();
        for (key, value) in settings {
            map.insert(Value::from(*key), value.clone());
        }
        self.config.connections.insert(Value::from(name), Value::Mapping(map));
        self
    }

    /// Add a local disk connection rooted at `root`
    pub fn local(self, name: &str, root: &Path) -> Self {
        self.connection(
            name,
            &[
                ("driver", Value::from("local")),
                ("path", Value::from(root.to_string_lossy().to_string())),
            ],
        )
    }

    /// Add an in-memory connection
    pub fn memory(self, name: &str) -> Self {
        self.connection(name, &[("driver", Value::from("array"))])
    }

    /// Add an S3 connection against an S3 compatible endpoint
    pub fn s3(self, name: &str, endpoint: &str, bucket: &str, prefix: &str) -> Self {
        self.connection(
            name,
            &[
                ("driver", Value::from("awss3")),
                ("region", Value::from("us-east-1")),
                ("version", Value::from("latest")),
                ("bucket", Value::from(bucket)),
                ("endpoint", Value::from(endpoint)),
                ("prefix", Value::from(prefix)),
                ("use_path_style_endpoint", Value::from(true)),
            ],
        )
    }

    /// Enable the metadata cache with the in-memory store
    pub fn memory_cache(mut self) -> Self {
        self.config.caching.enable = true;
        self.config.caching.store = CacheStoreConfig::Memory;
        self
    }

    /// Enable the metadata cache persisting under `dir`
    pub fn file_cache(mut self, dir: &Path, autosave: bool) -> Self {
        self.config.caching.enable = true;
        self.config.caching.autosave = autosave;
        self.config.caching.store = CacheStoreConfig::File {
            path: dir.to_string_lossy().to_string(),
        };
        self
    }

    pub fn build(self) -> TestConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_yaml_parses() {
        let yaml = TestConfig::builder()
            .memory("mem")
            .local("disk", Path::new("/tmp/unifs-e2e"))
            .alias("files", "disk")
            .default_connection("files")
            .memory_cache()
            .build()
            .to_yaml()
            .unwrap();

        let config = unifs::config::Config::from_str(&yaml).unwrap();
        assert_eq!(config.default, "files");
        assert_eq!(config.driver_for("disk"), "local");
        assert!(config.caching.enable);
        assert_eq!(
            config.connections.keys().collect::<Vec<_>>(),
            vec!["mem", "disk"]
        );
    }
}
