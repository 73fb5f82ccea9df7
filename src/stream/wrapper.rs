//! `scheme://name/path` resolution

use std::sync::Arc;

use percent_encoding::percent_decode_str;
use tracing::{debug, trace};
use url::Url;

use crate::error::{FsError, Result};
use crate::filesystem::Filesystem;
use crate::map::FilesystemMap;
use crate::path::basename;
use crate::stream::{FileStream, StreamMode, StreamStat};

/// A URL split into the filesystem name and the key inside it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VirtualPath {
    pub name: String,
    /// Root-relative path, with `?query` and `#fragment` re-appended
    pub key: String,
}

/// File access through URLs naming a filesystem of a [`FilesystemMap`]
pub struct StreamWrapper {
    scheme: String,
    map: Arc<FilesystemMap>,
}

impl StreamWrapper {
    pub fn new(scheme: impl Into<String>, map: Arc<FilesystemMap>) -> Self {
        Self {
            scheme: scheme.into(),
            map,
        }
    }

    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    pub fn map(&self) -> &Arc<FilesystemMap> {
        &self.map
    }

    /// Split `url` into filesystem name and key.
    ///
    /// The key may be empty (the root) only when `allow_root` is set.
    pub fn parse(&self, url: &str, allow_root: bool) -> Result<VirtualPath> {
        let invalid = || FsError::InvalidPath(format!("The specified path ({}) is invalid.", url));

        let parsed = Url::parse(url).map_err(|_| invalid())?;
        if parsed.scheme() != self.scheme {
            return Err(invalid());
        }
        let name = parsed
            .host_str()
            .filter(|h| !h.is_empty())
            .ok_or_else(invalid)?
            .to_string();

        let path = percent_decode_str(parsed.path())
            .decode_utf8()
            .map_err(|_| invalid())?;
        let mut key = path.trim_start_matches('/').to_string();
        if key.is_empty() && !allow_root {
            return Err(invalid());
        }
        if let Some(query) = parsed.query() {
            key.push('?');
            key.push_str(query);
        }
        if let Some(fragment) = parsed.fragment() {
            key.push('#');
            key.push_str(fragment);
        }

        trace!("parse: url={} name={} key={}", url, name, key);
        Ok(VirtualPath { name, key })
    }

    fn resolve(&self, url: &str, allow_root: bool) -> Result<(Filesystem, String)> {
        let target = self.parse(url, allow_root)?;
        let fs = self.map.get(&target.name)?;
        Ok((fs, target.key))
    }

    /// Open a handle; `Ok(None)` when the path's existence does not fit
    /// `mode`
    pub async fn open(&self, url: &str, mode: &str) -> Result<Option<Box<dyn FileStream>>> {
        let mode: StreamMode = mode.parse()?;
        let (fs, key) = self.resolve(url, false)?;
        let mut stream = fs.create_stream(&key)?;
        if stream.open(&mode).await? {
            debug!("Opened {} with mode {}", url, mode);
            Ok(Some(stream))
        } else {
            Ok(None)
        }
    }

    /// Stat record, or `None` when nothing exists at `url`
    pub async fn url_stat(&self, url: &str) -> Result<Option<StreamStat>> {
        let (fs, key) = self.resolve(url, true)?;
        if !fs.has(&key).await? {
            return Ok(None);
        }
        let stream = fs.create_stream(&key)?;
        stream.stat().await.map(Some)
    }

    /// Delete the file at `url` through a truncating handle; `NotFound`
    /// when nothing is there
    pub async fn unlink(&self, url: &str) -> Result<bool> {
        let (fs, key) = self.resolve(url, false)?;
        if !fs.has(&key).await? {
            return Err(FsError::NotFound(key));
        }
        let mut stream = fs.create_stream(&key)?;
        if !stream.open(&"w+".parse()?).await? {
            return Ok(false);
        }
        let deleted = stream.unlink().await?;
        stream.close().await;
        Ok(deleted)
    }

    pub async fn mkdir(&self, url: &str) -> Result<bool> {
        let (fs, key) = self.resolve(url, false)?;
        fs.create_dir(&key).await
    }

    pub async fn rmdir(&self, url: &str) -> Result<bool> {
        let (fs, key) = self.resolve(url, false)?;
        fs.delete_dir(&key).await
    }

    /// Names of the direct children of the directory at `url`
    pub async fn read_dir(&self, url: &str) -> Result<Vec<String>> {
        let (fs, key) = self.resolve(url, true)?;
        Ok(fs
            .list_contents(&key, false)
            .await?
            .into_iter()
            .map(|m| basename(&m.path).to_string())
            .collect())
    }
}
