//! Built-in drivers and their configuration validation

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde_yaml::Value;

use crate::adapter::local::{LinkHandling, LocalOptions, PermissionMap, WriteFlags};
use crate::adapter::s3::S3Options;
use crate::config::{ConfigError, ConfigMap};
use crate::error::FsError;

/// Every driver name the registry knows without a custom registration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Driver {
    Local,
    AwsS3,
    Azure,
    Dropbox,
    Ftp,
    Gcs,
    GridFs,
    Null,
    Array,
    Rackspace,
    Sftp,
    WebDav,
    Zip,
}

impl Driver {
    pub const ALL: [Driver; 13] = [
        Driver::Local,
        Driver::AwsS3,
        Driver::Azure,
        Driver::Dropbox,
        Driver::Ftp,
        Driver::Gcs,
        Driver::GridFs,
        Driver::Null,
        Driver::Array,
        Driver::Rackspace,
        Driver::Sftp,
        Driver::WebDav,
        Driver::Zip,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Driver::Local => "local",
            Driver::AwsS3 => "awss3",
            Driver::Azure => "azure",
            Driver::Dropbox => "dropbox",
            Driver::Ftp => "ftp",
            Driver::Gcs => "gcs",
            Driver::GridFs => "gridfs",
            Driver::Null => "null",
            Driver::Array => "array",
            Driver::Rackspace => "rackspace",
            Driver::Sftp => "sftp",
            Driver::WebDav => "webdav",
            Driver::Zip => "zip",
        }
    }

    /// Keys that must be present for [`Driver::validate`] to succeed
    pub fn required_keys(&self) -> &'static [&'static str] {
        match self {
            Driver::Local => &["path"],
            Driver::AwsS3 => &["region", "version", "bucket"],
            Driver::Azure => &["account-name", "api-key", "container"],
            Driver::Dropbox => &["token"],
            Driver::Gcs => &["projectId", "bucket"],
            Driver::GridFs => &["server", "database"],
            Driver::Rackspace => &["username", "apiKey", "endpoint", "region", "container"],
            Driver::WebDav => &["baseUri"],
            Driver::Zip => &["path"],
            Driver::Ftp | Driver::Sftp | Driver::Null | Driver::Array => &[],
        }
    }

    /// Check `config` against this driver's rules and extract its settings.
    ///
    /// Host applications registering their own connector under a built-in
    /// name can call this to keep the same validation.
    pub fn validate(&self, config: &ConfigMap) -> Result<DriverConfig, ConfigError> {
        let v = Validator {
            driver: self.name(),
            config,
        };

        Ok(match self {
            Driver::Local => DriverConfig::Local(LocalOptions {
                root: PathBuf::from(v.required_str("path")?),
                write_flags: v.write_flags()?,
                link_handling: v.link_handling()?,
                permissions: v.permissions()?,
            }),
            Driver::AwsS3 => {
                let region = v.required_str("region")?;
                v.required_str("version")?;
                let (key, secret) = v.credential_pair("key", "secret")?;
                let bucket = v.required_str("bucket")?;
                v.optional_bool("bucket_endpoint")?;
                v.optional_bool("calculate_md5")?;
                let scheme = v.optional_str("scheme")?;
                if let Some(scheme) = &scheme {
                    if scheme != "http" && scheme != "https" {
                        return Err(v.invalid("scheme", "expected http or https"));
                    }
                }
                let endpoint = v.optional_str("endpoint")?;
                DriverConfig::AwsS3(S3Options {
                    bucket,
                    region: Some(region),
                    force_path_style: v.optional_bool("use_path_style_endpoint")?.unwrap_or(endpoint.is_some()),
                    endpoint,
                    key,
                    secret,
                    prefix: v.optional_str("prefix")?,
                })
            }
            Driver::Azure => {
                let account_name = v.auth_str("account-name")?;
                let api_key = v.auth_str("api-key")?;
                DriverConfig::Azure(AzureConfig {
                    account_name,
                    api_key,
                    container: v.required_str("container")?,
                    prefix: v.optional_str("prefix")?,
                })
            }
            Driver::Dropbox => DriverConfig::Dropbox(DropboxConfig {
                token: v.auth_str("token")?,
                prefix: v.optional_str("prefix")?.unwrap_or_default(),
            }),
            Driver::Gcs => {
                // The project is implied by the bucket and the credentials
                v.required_str("projectId")?;
                DriverConfig::Gcs(GcsConfig {
                    bucket: v.required_str("bucket")?,
                    key_file: v.optional_str("keyFile")?,
                    prefix: v.optional_str("prefix")?,
                })
            }
            Driver::GridFs => DriverConfig::GridFs(GridFsConfig {
                server: v.required_str("server")?,
                database: v.required_str("database")?,
            }),
            Driver::Rackspace => {
                let username = v.auth_str("username")?;
                let api_key = v.auth_str("apiKey")?;
                DriverConfig::Rackspace(RackspaceConfig {
                    username,
                    api_key,
                    endpoint: v.required_str("endpoint")?,
                    region: v.required_str("region")?,
                    container: v.required_str("container")?,
                    internal: v.optional_bool("internal")?.unwrap_or(false),
                })
            }
            Driver::WebDav => {
                let base_uri = v.required_str("baseUri")?;
                let (user_name, password) = v.credential_pair("userName", "password")?;
                DriverConfig::WebDav(WebDavConfig {
                    base_uri,
                    user_name,
                    password,
                    prefix: v.optional_str("prefix")?,
                })
            }
            Driver::Zip => DriverConfig::Zip(ZipConfig {
                path: PathBuf::from(v.required_str("path")?),
            }),
            Driver::Ftp => DriverConfig::Ftp(config.clone()),
            Driver::Sftp => DriverConfig::Sftp(config.clone()),
            Driver::Null => DriverConfig::Null,
            Driver::Array => DriverConfig::Array,
        })
    }
}

impl fmt::Display for Driver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Driver {
    type Err = FsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Driver::ALL
            .iter()
            .copied()
            .find(|d| d.name() == s)
            .ok_or_else(|| FsError::UnsupportedDriver(s.to_string()))
    }
}

/// Validated, typed settings of one driver
#[derive(Debug, Clone)]
pub enum DriverConfig {
    Local(LocalOptions),
    AwsS3(S3Options),
    Azure(AzureConfig),
    Dropbox(DropboxConfig),
    /// Protocol specific keys passed through untouched
    Ftp(ConfigMap),
    Gcs(GcsConfig),
    GridFs(GridFsConfig),
    Null,
    Array,
    Rackspace(RackspaceConfig),
    Sftp(ConfigMap),
    WebDav(WebDavConfig),
    Zip(ZipConfig),
}

#[derive(Debug, Clone)]
pub struct AzureConfig {
    pub account_name: String,
    pub api_key: String,
    pub container: String,
    pub prefix: Option<String>,
}

#[derive(Debug, Clone)]
pub struct DropboxConfig {
    pub token: String,
    pub prefix: String,
}

#[derive(Debug, Clone)]
pub struct GcsConfig {
    pub bucket: String,
    pub key_file: Option<String>,
    pub prefix: Option<String>,
}

#[derive(Debug, Clone)]
pub struct GridFsConfig {
    pub server: String,
    pub database: String,
}

#[derive(Debug, Clone)]
pub struct RackspaceConfig {
    pub username: String,
    pub api_key: String,
    pub endpoint: String,
    pub region: String,
    pub container: String,
    /// Use the internal service URL instead of the public one
    pub internal: bool,
}

#[derive(Debug, Clone)]
pub struct WebDavConfig {
    pub base_uri: String,
    pub user_name: Option<String>,
    pub password: Option<String>,
    pub prefix: Option<String>,
}

impl WebDavConfig {
    /// Basic auth pair; validation guarantees both halves or neither
    pub fn credentials(&self) -> Option<(&str, &str)> {
        Some((self.user_name.as_deref()?, self.password.as_deref()?))
    }
}

#[derive(Debug, Clone)]
pub struct ZipConfig {
    pub path: PathBuf,
}

/// Typed accessors over one driver's configuration map
struct Validator<'a> {
    driver: &'static str,
    config: &'a ConfigMap,
}

impl<'a> Validator<'a> {
    fn get(&self, key: &str) -> Option<&'a Value> {
        self.config.get(key).filter(|v| !v.is_null())
    }

    fn missing(&self, key: &str) -> ConfigError {
        ConfigError::MissingKey {
            driver: self.driver.to_string(),
            key: key.to_string(),
        }
    }

    fn invalid(&self, key: &str, reason: &str) -> ConfigError {
        ConfigError::InvalidValue {
            driver: self.driver.to_string(),
            key: key.to_string(),
            reason: reason.to_string(),
        }
    }

    fn as_string(&self, key: &str, value: &Value) -> Result<String, ConfigError> {
        match value {
            Value::String(s) => Ok(s.clone()),
            Value::Number(n) => Ok(n.to_string()),
            Value::Bool(b) => Ok(b.to_string()),
            _ => Err(self.invalid(key, "expected a scalar value")),
        }
    }

    fn required_str(&self, key: &str) -> Result<String, ConfigError> {
        let value = self.get(key).ok_or_else(|| self.missing(key))?;
        self.as_string(key, value)
    }

    /// Like `required_str`, but reported as an authentication failure
    fn auth_str(&self, key: &str) -> Result<String, ConfigError> {
        let value = self.get(key).ok_or_else(|| ConfigError::MissingAuthentication {
            driver: self.driver.to_string(),
            key: key.to_string(),
        })?;
        self.as_string(key, value)
    }

    fn optional_str(&self, key: &str) -> Result<Option<String>, ConfigError> {
        self.get(key).map(|v| self.as_string(key, v)).transpose()
    }

    fn optional_bool(&self, key: &str) -> Result<Option<bool>, ConfigError> {
        match self.get(key) {
            None => Ok(None),
            Some(Value::Bool(b)) => Ok(Some(*b)),
            Some(Value::String(s)) if s == "true" => Ok(Some(true)),
            Some(Value::String(s)) if s == "false" => Ok(Some(false)),
            Some(_) => Err(self.invalid(key, "expected a boolean")),
        }
    }

    /// Both halves of a credential must be given together
    fn credential_pair(
        &self,
        first: &str,
        second: &str,
    ) -> Result<(Option<String>, Option<String>), ConfigError> {
        let a = self.optional_str(first)?;
        let b = self.optional_str(second)?;
        match (&a, &b) {
            (Some(_), None) => Err(ConfigError::MissingAuthentication {
                driver: self.driver.to_string(),
                key: second.to_string(),
            }),
            (None, Some(_)) => Err(ConfigError::MissingAuthentication {
                driver: self.driver.to_string(),
                key: first.to_string(),
            }),
            _ => Ok((a, b)),
        }
    }

    fn write_flags(&self) -> Result<WriteFlags, ConfigError> {
        match self.get("write_flags") {
            None => Ok(WriteFlags::ExclusiveLock),
            Some(Value::String(s)) if s == "exclusive-lock" => Ok(WriteFlags::ExclusiveLock),
            Some(Value::String(s)) if s == "none" => Ok(WriteFlags::None),
            // Raw flock flags: LOCK_EX is 2
            Some(Value::Number(n)) if n.as_u64() == Some(2) => Ok(WriteFlags::ExclusiveLock),
            Some(Value::Number(n)) if n.as_u64() == Some(0) => Ok(WriteFlags::None),
            Some(_) => Err(self.invalid("write_flags", "expected exclusive-lock or none")),
        }
    }

    fn link_handling(&self) -> Result<LinkHandling, ConfigError> {
        match self.get("link_handling") {
            None => Ok(LinkHandling::DisallowLinks),
            Some(Value::String(s)) if s == "disallow-links" => Ok(LinkHandling::DisallowLinks),
            Some(Value::String(s)) if s == "skip-links" => Ok(LinkHandling::SkipLinks),
            Some(Value::Number(n)) if n.as_u64() == Some(2) => Ok(LinkHandling::DisallowLinks),
            Some(Value::Number(n)) if n.as_u64() == Some(1) => Ok(LinkHandling::SkipLinks),
            Some(_) => Err(self.invalid("link_handling", "expected disallow-links or skip-links")),
        }
    }

    fn permissions(&self) -> Result<PermissionMap, ConfigError> {
        let mut map = PermissionMap::default();
        let Some(value) = self.get("permissions") else {
            return Ok(map);
        };
        let Value::Mapping(sections) = value else {
            return Err(self.invalid("permissions", "expected a mapping"));
        };

        for (section, entries) in sections {
            let section = section.as_str().unwrap_or_default();
            let Value::Mapping(entries) = entries else {
                return Err(self.invalid("permissions", "expected file/dir mappings"));
            };
            for (visibility, mode) in entries {
                let mode = self.mode(mode)?;
                match (section, visibility.as_str().unwrap_or_default()) {
                    ("file", "public") => map.file_public = mode,
                    ("file", "private") => map.file_private = mode,
                    ("dir", "public") => map.dir_public = mode,
                    ("dir", "private") => map.dir_private = mode,
                    (s, v) => {
                        return Err(self.invalid(
                            "permissions",
                            &format!("unknown entry {}.{}", s, v),
                        ))
                    }
                }
            }
        }
        Ok(map)
    }

    /// Integers are taken as-is; strings are read as octal (`"0644"`)
    fn mode(&self, value: &Value) -> Result<u32, ConfigError> {
        match value {
            Value::Number(n) => n
                .as_u64()
                .and_then(|n| u32::try_from(n).ok())
                .filter(|n| *n <= 0o7777)
                .ok_or_else(|| self.invalid("permissions", "mode out of range")),
            Value::String(s) => {
                let digits = s.trim_start_matches("0o");
                u32::from_str_radix(digits, 8)
                    .ok()
                    .filter(|n| *n <= 0o7777)
                    .ok_or_else(|| self.invalid("permissions", "expected an octal mode"))
            }
            _ => Err(self.invalid("permissions", "expected a mode")),
        }
    }
}
