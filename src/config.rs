//! Configuration parsing and structures
//!
//! The YAML file names a default connection, optional aliases, caching
//! settings and one flat configuration map per connection. Connection maps
//! are kept untyped here; each driver validates its own keys when the
//! connector runs.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;

use crate::adapter::Visibility;
use crate::env::substitute_env_vars;

/// Flat per-connection configuration map, in file order
pub type ConfigMap = IndexMap<String, serde_yaml::Value>;

static SCHEME_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z][a-zA-Z0-9+.-]*$").expect("valid scheme pattern"));

pub const DEFAULT_CONNECTION: &str = "local";
pub const FALLBACK_CONNECTION: &str = "array";
pub const DEFAULT_STREAM_PROTOCOL: &str = "flysystem";
pub const DEFAULT_CACHE_KEY: &str = "flysystem";

// =============================================================================
// Raw Config (Deserialized from YAML)
// =============================================================================

/// Raw configuration as deserialized from YAML.
/// This is converted to `Config` via `resolve()`.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawConfig {
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Name of the default connection
    pub default: Option<String>,

    /// Scheme served by the stream wrapper
    pub stream_protocol: Option<String>,

    /// Visibility applied to writes that do not name one
    pub visibility: Option<Visibility>,

    /// Disable the facade's existence assertions
    #[serde(default)]
    pub pirate: bool,

    #[serde(default)]
    pub aliases: IndexMap<String, String>,

    #[serde(default)]
    pub caching: CachingConfig,

    /// Connection name to driver name
    #[serde(default)]
    pub adapters: IndexMap<String, String>,

    #[serde(default)]
    pub connections: IndexMap<String, ConfigMap>,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// Metadata cache settings
#[derive(Debug, Clone, Deserialize)]
pub struct CachingConfig {
    #[serde(default)]
    pub enable: bool,

    /// Key the snapshot is stored under
    #[serde(default = "default_cache_key")]
    pub key: String,

    /// Snapshot lifetime in seconds; `None` keeps it forever
    pub ttl: Option<u64>,

    /// Save after every mutation instead of only on explicit `save`
    #[serde(default = "default_autosave")]
    pub autosave: bool,

    #[serde(default)]
    pub store: CacheStoreConfig,
}

fn default_cache_key() -> String {
    DEFAULT_CACHE_KEY.to_string()
}

fn default_autosave() -> bool {
    true
}

impl Default for CachingConfig {
    fn default() -> Self {
        Self {
            enable: false,
            key: default_cache_key(),
            ttl: None,
            autosave: default_autosave(),
            store: CacheStoreConfig::default(),
        }
    }
}

/// Where cache snapshots persist
#[derive(Debug, Clone, Deserialize, Default, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum CacheStoreConfig {
    /// Process-local, lost on exit
    #[default]
    Memory,

    /// One file per key below `path`
    File { path: PathBuf },
}

// =============================================================================
// Resolved Config (Ready for use)
// =============================================================================

/// Top-level configuration (resolved from RawConfig)
#[derive(Debug, Clone)]
pub struct Config {
    pub logging: LoggingConfig,
    pub default: String,
    pub stream_protocol: String,
    pub visibility: Option<Visibility>,
    pub pirate: bool,
    pub aliases: IndexMap<String, String>,
    pub caching: CachingConfig,
    pub adapters: IndexMap<String, String>,
    pub connections: IndexMap<String, ConfigMap>,
}

impl Default for Config {
    fn default() -> Self {
        RawConfig::default().resolve()
    }
}

impl RawConfig {
    /// Fill in defaults; validation is a separate step.
    ///
    /// Without an explicit `default`, the `local` connection is used when
    /// one is declared and the in-memory `array` driver otherwise.
    pub fn resolve(self) -> Config {
        let default = match self.default.filter(|d| !d.is_empty()) {
            Some(name) => name,
            None if self.connections.contains_key(DEFAULT_CONNECTION) => {
                DEFAULT_CONNECTION.to_string()
            }
            None => FALLBACK_CONNECTION.to_string(),
        };
        Config {
            logging: self.logging,
            default,
            stream_protocol: self
                .stream_protocol
                .filter(|p| !p.is_empty())
                .unwrap_or_else(|| DEFAULT_STREAM_PROTOCOL.to_string()),
            visibility: self.visibility,
            pirate: self.pirate,
            aliases: self.aliases,
            caching: self.caching,
            adapters: self.adapters,
            connections: self.connections,
        }
    }
}

impl Config {
    /// Load configuration from a YAML file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadError(path.to_path_buf(), e.to_string()))?;

        Self::from_str(&content)
    }

    /// Parse configuration from a YAML string, substituting `${VAR}`
    /// references first
    pub fn from_str(content: &str) -> Result<Self, ConfigError> {
        let content = substitute_env_vars(content)?;
        let raw: RawConfig =
            serde_yaml::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        let config = raw.resolve();
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !SCHEME_PATTERN.is_match(&self.stream_protocol) {
            return Err(ConfigError::ValidationError(format!(
                "Invalid stream protocol: {:?}",
                self.stream_protocol
            )));
        }

        if self.caching.key.is_empty() {
            return Err(ConfigError::ValidationError(
                "Cache key cannot be empty".to_string(),
            ));
        }

        for alias in self.aliases.keys() {
            self.resolve_alias(alias)?;
        }

        for (name, driver) in &self.adapters {
            if driver.is_empty() {
                return Err(ConfigError::ValidationError(format!(
                    "Adapter entry {:?} names no driver",
                    name
                )));
            }
        }

        Ok(())
    }

    /// Follow aliases until a name that is not an alias is reached.
    pub fn resolve_alias(&self, name: &str) -> Result<String, ConfigError> {
        let mut current = name.to_string();
        let mut visited = HashSet::new();
        while let Some(target) = self.aliases.get(&current) {
            if !visited.insert(current.clone()) {
                return Err(ConfigError::ValidationError(format!(
                    "Alias cycle detected at {:?}",
                    current
                )));
            }
            current = target.clone();
        }
        Ok(current)
    }

    /// Configuration map of a connection, if one is declared
    pub fn connection(&self, name: &str) -> Option<&ConfigMap> {
        self.connections.get(name)
    }

    /// Driver name for a connection: an explicit `driver` key, then the
    /// `adapters` table, then the connection name itself.
    pub fn driver_for(&self, name: &str) -> String {
        self.connections
            .get(name)
            .and_then(|c| c.get("driver"))
            .and_then(|d| d.as_str())
            .map(|d| d.to_string())
            .or_else(|| self.adapters.get(name).cloned())
            .unwrap_or_else(|| name.to_string())
    }

    /// Whether `name` (after alias resolution) can be turned into a
    /// connection
    pub fn has_driver(&self, name: &str) -> bool {
        let Ok(name) = self.resolve_alias(name) else {
            return false;
        };
        self.connections.contains_key(&name)
            || self.adapters.contains_key(&name)
            || matches!(name.as_str(), "array" | "null")
    }
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {0}: {1}")]
    ReadError(PathBuf, String),

    #[error("Failed to parse config: {0}")]
    ParseError(String),

    #[error("Configuration validation error: {0}")]
    ValidationError(String),

    #[error("The {driver} connector requires \"{key}\" configuration.")]
    MissingKey { driver: String, key: String },

    #[error("The {driver} connector requires authentication (missing \"{key}\").")]
    MissingAuthentication { driver: String, key: String },

    #[error("The {driver} connector has an invalid \"{key}\" value: {reason}")]
    InvalidValue {
        driver: String,
        key: String,
        reason: String,
    },
}

impl ConfigError {
    /// The configuration key this error is about, when it names one
    pub fn key(&self) -> Option<&str> {
        match self {
            ConfigError::MissingKey { key, .. }
            | ConfigError::MissingAuthentication { key, .. }
            | ConfigError::InvalidValue { key, .. } => Some(key),
            _ => None,
        }
    }
}
