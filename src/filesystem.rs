//! Filesystem facade
//!
//! [`Filesystem`] is what application code talks to. It owns one adapter,
//! optionally behind a [`CachedAdapter`], normalizes every path before it
//! reaches the backend and layers the file-manager helpers (append, touch,
//! checksum, permissions, symlinks, stream handles) on top of the adapter
//! contract.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use bytes::{Bytes, BytesMut};
use futures::{StreamExt, TryStreamExt};
use md5::{Digest, Md5};
use sha2::Sha256;
use tokio_util::io::ReaderStream;
use tracing::{debug, trace, warn};

use crate::adapter::{
    local::read_locked, Adapter, ByteStream, Metadata, Visibility, WriteOptions,
};
use crate::cache::CachedAdapter;
use crate::error::{FsError, Result};
use crate::manager::FileManager;
use crate::path;
use crate::platform::default_link_creator;
use crate::stream::{FileStream, StreamBuffer};

/// Mode applied by [`Filesystem::touch`] when none is given
pub const DEFAULT_FILE_MODE: u32 = 0o664;

/// Permission bits OR'd into every directory mode
const DIRECTORY_MODE_BITS: u32 = 0o40775;

/// Reported by [`Filesystem::get_permissions`] for backends without POSIX
/// permissions: a world-readable regular file (`0o100664`)
pub const SYNTHETIC_PERMISSIONS: u32 = 33204;

/// Facade behaviour taken from configuration
#[derive(Debug, Clone, Default)]
pub struct FilesystemOptions {
    /// Visibility applied to writes that do not ask for one
    pub visibility: Option<Visibility>,
    /// Skip the existence assertions around write/update/read/delete
    pub disable_asserts: bool,
}

/// Checksum algorithms offered by [`Filesystem::checksum_with`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChecksumAlgorithm {
    #[default]
    Md5,
    Sha256,
}

/// A file received from outside, e.g. an HTTP upload spooled to disk
#[derive(Debug, Clone)]
pub struct UploadedFile {
    path: PathBuf,
    original_name: Option<String>,
}

impl UploadedFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            original_name: None,
        }
    }

    /// Keep the client supplied name; its extension wins over the spool file's
    pub fn with_original_name(mut self, name: impl Into<String>) -> Self {
        self.original_name = Some(name.into());
        self
    }

    pub fn real_path(&self) -> &Path {
        &self.path
    }

    pub fn original_name(&self) -> Option<&str> {
        self.original_name.as_deref()
    }

    pub fn extension(&self) -> String {
        let name = match &self.original_name {
            Some(name) => name.clone(),
            None => self.path.to_string_lossy().replace('\\', "/"),
        };
        path::extension(&name)
    }

    /// Random file name keeping the upload's extension
    pub fn hash_name(&self) -> String {
        let id = uuid::Uuid::new_v4().simple().to_string();
        match self.extension() {
            ext if ext.is_empty() => id,
            ext => format!("{}.{}", id, ext),
        }
    }

    pub async fn stream(&self) -> Result<ByteStream> {
        let file = tokio::fs::File::open(&self.path)
            .await
            .map_err(|e| FsError::from_io(e, &self.path.to_string_lossy()))?;
        Ok(Box::pin(ReaderStream::new(file).map(|chunk| chunk.map_err(FsError::Io))))
    }
}

/// Anything `put` can store
pub enum Contents {
    Bytes(Bytes),
    Stream(ByteStream),
    Upload(UploadedFile),
}

impl From<Bytes> for Contents {
    fn from(data: Bytes) -> Self {
        Contents::Bytes(data)
    }
}

impl From<Vec<u8>> for Contents {
    fn from(data: Vec<u8>) -> Self {
        Contents::Bytes(Bytes::from(data))
    }
}

impl From<&[u8]> for Contents {
    fn from(data: &[u8]) -> Self {
        Contents::Bytes(Bytes::copy_from_slice(data))
    }
}

impl From<&str> for Contents {
    fn from(data: &str) -> Self {
        Contents::Bytes(Bytes::copy_from_slice(data.as_bytes()))
    }
}

impl From<String> for Contents {
    fn from(data: String) -> Self {
        Contents::Bytes(Bytes::from(data))
    }
}

impl From<ByteStream> for Contents {
    fn from(stream: ByteStream) -> Self {
        Contents::Stream(stream)
    }
}

impl From<UploadedFile> for Contents {
    fn from(upload: UploadedFile) -> Self {
        Contents::Upload(upload)
    }
}

/// Unified filesystem over one adapter
///
/// Cloning is cheap; clones share the adapter and its cache.
#[derive(Clone)]
pub struct Filesystem {
    adapter: Arc<dyn Adapter>,
    cache: Option<Arc<CachedAdapter>>,
    options: FilesystemOptions,
    manager: Option<FileManager>,
}

impl std::fmt::Debug for Filesystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Filesystem")
            .field("adapter", &self.underlying_adapter().name())
            .field("cached", &self.cache.is_some())
            .field("options", &self.options)
            .finish()
    }
}

impl Filesystem {
    pub fn new(adapter: Arc<dyn Adapter>) -> Self {
        Self {
            adapter,
            cache: None,
            options: FilesystemOptions::default(),
            manager: None,
        }
    }

    /// Facade over a cache decorated adapter
    pub fn cached(cache: Arc<CachedAdapter>) -> Self {
        Self {
            adapter: cache.clone(),
            cache: Some(cache),
            options: FilesystemOptions::default(),
            manager: None,
        }
    }

    pub fn with_options(mut self, options: FilesystemOptions) -> Self {
        self.options = options;
        self
    }

    /// Manager used by [`Filesystem::create_connection`]
    pub fn with_manager(mut self, manager: FileManager) -> Self {
        self.manager = Some(manager);
        self
    }

    pub fn options(&self) -> &FilesystemOptions {
        &self.options
    }

    /// The adapter calls go through, cache decorator included
    pub fn adapter(&self) -> &Arc<dyn Adapter> {
        &self.adapter
    }

    pub fn cache(&self) -> Option<&Arc<CachedAdapter>> {
        self.cache.as_ref()
    }

    /// The backend adapter with the cache decorator unwrapped
    pub fn underlying_adapter(&self) -> &Arc<dyn Adapter> {
        match &self.cache {
            Some(cache) => cache.inner(),
            None => &self.adapter,
        }
    }

    pub fn is_local(&self) -> bool {
        self.underlying_adapter().local_root().is_some()
    }

    /// On-disk location of `path` for local backends
    pub fn local_path(&self, path: &str) -> Option<PathBuf> {
        let root = self.underlying_adapter().local_root()?;
        let path = path::normalize_path(path).ok()?;
        Some(if path.is_empty() { root.to_path_buf() } else { root.join(path) })
    }

    fn write_options(&self) -> WriteOptions {
        WriteOptions::with_visibility(self.options.visibility)
    }

    async fn assert_present(&self, path: &str) -> Result<()> {
        if !self.options.disable_asserts && !self.adapter.has(path).await? {
            return Err(FsError::NotFound(path.to_string()));
        }
        Ok(())
    }

    async fn assert_absent(&self, path: &str) -> Result<()> {
        if !self.options.disable_asserts && self.adapter.has(path).await? {
            return Err(FsError::AlreadyExists(path.to_string()));
        }
        Ok(())
    }

    fn forget(&self, path: &str) {
        if let Some(cache) = &self.cache {
            cache.forget(path);
        }
    }

    // ---------------------------------------------------------------------
    // Adapter delegation
    // ---------------------------------------------------------------------

    pub async fn has(&self, path: &str) -> Result<bool> {
        let path = path::normalize_path(path)?;
        self.adapter.has(&path).await
    }

    pub async fn read(&self, path: &str) -> Result<Bytes> {
        let path = path::normalize_path(path)?;
        self.assert_present(&path).await?;
        self.adapter.read(&path).await
    }

    pub async fn read_stream(&self, path: &str) -> Result<ByteStream> {
        let path = path::normalize_path(path)?;
        self.assert_present(&path).await?;
        self.adapter.read_stream(&path).await
    }

    pub async fn read_and_delete(&self, path: &str) -> Result<Bytes> {
        let contents = self.read(path).await?;
        self.delete(path).await?;
        Ok(contents)
    }

    /// Create a new file; fails when `path` already exists
    pub async fn write(&self, path: &str, contents: impl Into<Bytes>) -> Result<bool> {
        let path = path::normalize_path(path)?;
        self.assert_absent(&path).await?;
        self.adapter
            .write(&path, contents.into(), &self.write_options())
            .await?;
        Ok(true)
    }

    pub async fn write_stream(&self, path: &str, stream: ByteStream) -> Result<bool> {
        let path = path::normalize_path(path)?;
        self.assert_absent(&path).await?;
        self.adapter
            .write_stream(&path, stream, &self.write_options())
            .await?;
        Ok(true)
    }

    /// Replace an existing file; fails when `path` is missing
    pub async fn update(&self, path: &str, contents: impl Into<Bytes>) -> Result<bool> {
        let path = path::normalize_path(path)?;
        self.assert_present(&path).await?;
        self.adapter
            .write(&path, contents.into(), &self.write_options())
            .await?;
        Ok(true)
    }

    /// Create or replace a file
    pub async fn put(&self, path: &str, contents: impl Into<Contents>) -> Result<bool> {
        let path = path::normalize_path(path)?;
        let options = self.write_options();
        match contents.into() {
            Contents::Bytes(data) => {
                debug!("put: path={} size={}", path, data.len());
                self.adapter.write(&path, data, &options).await?;
            }
            Contents::Stream(stream) => {
                debug!("put: path={} (stream)", path);
                self.adapter.write_stream(&path, stream, &options).await?;
            }
            Contents::Upload(upload) => {
                let name = upload.hash_name();
                self.put_file_as(&path, &upload, &name).await?;
            }
        }
        Ok(true)
    }

    /// Store an upload under `dir` with a generated name, returning the
    /// stored path
    pub async fn put_file(&self, dir: &str, upload: &UploadedFile) -> Result<String> {
        self.put_file_as(dir, upload, &upload.hash_name()).await
    }

    pub async fn put_file_as(&self, dir: &str, upload: &UploadedFile, name: &str) -> Result<String> {
        let dir = path::normalize_path(dir)?;
        let target = path::normalize_path(&path::join(&dir, name))?;
        debug!("put_file_as: source={:?} path={}", upload.real_path(), target);
        let stream = upload.stream().await?;
        self.adapter
            .write_stream(&target, stream, &self.write_options())
            .await?;
        Ok(target)
    }

    /// `data`, `separator` and the current contents, in that order.
    /// Read-modify-write: concurrent writers may lose updates.
    pub async fn prepend(&self, path: &str, data: &[u8], separator: &[u8]) -> Result<bool> {
        if !self.has(path).await? {
            return self.put(path, data).await;
        }
        let existing = self.read(path).await?;
        let mut combined = BytesMut::with_capacity(data.len() + separator.len() + existing.len());
        combined.extend_from_slice(data);
        combined.extend_from_slice(separator);
        combined.extend_from_slice(&existing);
        self.put(path, combined.freeze()).await
    }

    /// Current contents, `separator` and `data`, in that order.
    /// Read-modify-write: concurrent writers may lose updates.
    pub async fn append(&self, path: &str, data: &[u8], separator: &[u8]) -> Result<bool> {
        if !self.has(path).await? {
            return self.put(path, data).await;
        }
        let existing = self.read(path).await?;
        let mut combined = BytesMut::with_capacity(existing.len() + separator.len() + data.len());
        combined.extend_from_slice(&existing);
        combined.extend_from_slice(separator);
        combined.extend_from_slice(data);
        self.put(path, combined.freeze()).await
    }

    pub async fn delete(&self, path: &str) -> Result<bool> {
        let path = path::normalize_path(path)?;
        self.assert_present(&path).await?;
        self.adapter.delete(&path).await?;
        Ok(true)
    }

    pub async fn delete_dir(&self, dir: &str) -> Result<bool> {
        let dir = path::normalize_path(dir)?;
        if dir.is_empty() {
            return Err(FsError::InvalidPath(
                "Root directories can not be deleted".to_string(),
            ));
        }
        self.adapter.delete_dir(&dir).await?;
        Ok(true)
    }

    pub async fn create_dir(&self, dir: &str) -> Result<bool> {
        let dir = path::normalize_path(dir)?;
        self.adapter.create_dir(&dir, &self.write_options()).await?;
        Ok(true)
    }

    pub async fn copy(&self, from: &str, to: &str) -> Result<bool> {
        let from = path::normalize_path(from)?;
        let to = path::normalize_path(to)?;
        self.assert_present(&from).await?;
        self.assert_absent(&to).await?;
        self.adapter.copy(&from, &to).await?;
        Ok(true)
    }

    pub async fn rename(&self, from: &str, to: &str) -> Result<bool> {
        let from = path::normalize_path(from)?;
        let to = path::normalize_path(to)?;
        self.assert_present(&from).await?;
        self.assert_absent(&to).await?;
        self.adapter.rename(&from, &to).await?;
        Ok(true)
    }

    /// Rename that always requires the source to exist
    pub async fn move_file(&self, from: &str, to: &str) -> Result<bool> {
        if !self.has(from).await? {
            return Err(FsError::NotFound(from.to_string()));
        }
        self.rename(from, to).await
    }

    pub async fn list_contents(&self, dir: &str, recursive: bool) -> Result<Vec<Metadata>> {
        let dir = path::normalize_path(dir)?;
        self.adapter.list_contents(&dir, recursive).try_collect().await
    }

    pub async fn get_metadata(&self, path: &str) -> Result<Metadata> {
        let path = path::normalize_path(path)?;
        self.assert_present(&path).await?;
        self.adapter.metadata(&path).await
    }

    pub async fn get_size(&self, path: &str) -> Result<u64> {
        let meta = self.get_metadata(path).await?;
        match meta.size {
            Some(size) => Ok(size),
            None if meta.is_dir() => Ok(0),
            None => Err(FsError::Backend(format!("No size reported for {}", meta.path))),
        }
    }

    pub async fn get_timestamp(&self, path: &str) -> Result<i64> {
        self.get_metadata(path)
            .await?
            .timestamp
            .ok_or_else(|| FsError::Backend(format!("No timestamp reported for {}", path)))
    }

    pub async fn get_mimetype(&self, path: &str) -> Result<Option<String>> {
        let path = path::normalize_path(path)?;
        self.assert_present(&path).await?;
        self.adapter.mimetype(&path).await
    }

    pub async fn get_visibility(&self, path: &str) -> Result<Visibility> {
        let path = path::normalize_path(path)?;
        self.assert_present(&path).await?;
        self.adapter.visibility(&path).await
    }

    pub async fn set_visibility(&self, path: &str, visibility: Visibility) -> Result<bool> {
        let path = path::normalize_path(path)?;
        self.assert_present(&path).await?;
        self.adapter.set_visibility(&path, visibility).await?;
        Ok(true)
    }

    /// Clear the metadata cache; no-op without one
    pub async fn flush_cache(&self) {
        if let Some(cache) = &self.cache {
            cache.flush().await;
        }
    }

    // ---------------------------------------------------------------------
    // File manager helpers
    // ---------------------------------------------------------------------

    /// Normalized path with the backend prefix in front
    pub fn path(&self, path: &str) -> Result<String> {
        let path = path::normalize_path(path)?;
        Ok(format!("{}{}", self.underlying_adapter().path_prefix(), path))
    }

    pub fn normalize_path(&self, path: &str) -> Result<String> {
        path::normalize_path(path)
    }

    pub fn extension(&self, path: &str) -> String {
        path::extension(&path.replace('\\', "/"))
    }

    pub fn relative_path(&self, path: &str, from: &str) -> Result<String> {
        path::relative_path(path, from)
    }

    /// Read under a shared lock on local disk; a plain read elsewhere
    pub async fn shared_get(&self, path: &str) -> Result<Bytes> {
        let Some(full) = self.local_path(path) else {
            return self.read(path).await;
        };
        let display = path.to_string();
        let data = tokio::task::spawn_blocking(move || read_locked(&full))
            .await
            .map_err(|e| FsError::Backend(format!("read task failed: {}", e)))?
            .map_err(|e| FsError::from_io(e, &display))?;
        Ok(Bytes::from(data))
    }

    /// Absolute on-disk path of an existing file
    pub async fn local_filename(&self, path: &str) -> Result<PathBuf> {
        let Some(full) = self.local_path(path) else {
            return Err(FsError::NotSupported(format!(
                "{} adapter has no local filenames",
                self.underlying_adapter().name()
            )));
        };
        if !self.has(path).await? {
            return Err(FsError::NotFound(path.to_string()));
        }
        Ok(full)
    }

    /// Update the modification time (creating the file if needed) and
    /// apply `mode`, falling back to [`DEFAULT_FILE_MODE`].
    ///
    /// Only the permission step applies off local disk, so non-local
    /// backends report whatever [`Filesystem::set_permissions`] reports.
    pub async fn touch(&self, path: &str, mode: Option<u32>) -> Result<bool> {
        if let Some(full) = self.local_path(path) {
            let normalized = path::normalize_path(path)?;
            let touched = tokio::task::spawn_blocking(move || touch_file(&full))
                .await
                .map_err(|e| FsError::Backend(format!("touch task failed: {}", e)))?;
            self.forget(&normalized);
            if let Err(e) = touched {
                warn!("Failed to touch {}: {}", normalized, e);
                return Ok(false);
            }
        }
        self.set_permissions(path, mode.unwrap_or(DEFAULT_FILE_MODE)).await
    }

    pub async fn checksum(&self, path: &str) -> Result<String> {
        self.checksum_with(path, ChecksumAlgorithm::Md5).await
    }

    /// Hex digest of the full contents
    pub async fn checksum_with(&self, path: &str, algorithm: ChecksumAlgorithm) -> Result<String> {
        if !self.has(path).await? {
            return Err(FsError::NotFound(path.to_string()));
        }
        let mut stream = self.read_stream(path).await?;
        let digest = match algorithm {
            ChecksumAlgorithm::Md5 => {
                let mut hasher = Md5::new();
                while let Some(chunk) = stream.next().await {
                    hasher.update(&chunk?);
                }
                hex::encode(hasher.finalize())
            }
            ChecksumAlgorithm::Sha256 => {
                let mut hasher = Sha256::new();
                while let Some(chunk) = stream.next().await {
                    hasher.update(&chunk?);
                }
                hex::encode(hasher.finalize())
            }
        };
        trace!("checksum: path={} algorithm={:?} digest={}", path, algorithm, digest);
        Ok(digest)
    }

    /// `false` rather than an error when the path is missing
    pub async fn is_directory(&self, path: &str) -> bool {
        match path::normalize_path(path) {
            Ok(p) if p.is_empty() => true,
            Ok(p) => self
                .adapter
                .metadata(&p)
                .await
                .map(|m| m.is_dir())
                .unwrap_or(false),
            Err(_) => false,
        }
    }

    /// `false` rather than an error when the path is missing
    pub async fn is_file(&self, path: &str) -> bool {
        match path::normalize_path(path) {
            Ok(p) if !p.is_empty() => self
                .adapter
                .metadata(&p)
                .await
                .map(|m| m.is_file())
                .unwrap_or(false),
            _ => false,
        }
    }

    /// Full `st_mode` on local disk, [`SYNTHETIC_PERMISSIONS`] elsewhere
    pub async fn get_permissions(&self, path: &str) -> Result<u32> {
        if !self.has(path).await? {
            return Err(FsError::NotFound(path.to_string()));
        }
        match self.local_path(path) {
            Some(full) => {
                let meta = tokio::fs::metadata(&full)
                    .await
                    .map_err(|e| FsError::from_io(e, path))?;
                Ok(mode_bits(&meta))
            }
            None => Ok(SYNTHETIC_PERMISSIONS),
        }
    }

    /// Apply `mode`, OR'ing the directory bits in for directories.
    ///
    /// Returns `false` when the backend cannot hold POSIX permissions or
    /// the chmod fails.
    pub async fn set_permissions(&self, path: &str, mode: u32) -> Result<bool> {
        let is_dir = self.is_directory(path).await;
        let mode = if is_dir { mode | DIRECTORY_MODE_BITS } else { mode };
        let Some(full) = self.local_path(path) else {
            return Ok(false);
        };

        let current = self.get_permissions(path).await?;
        if current & 0o7777 == mode & 0o7777 {
            return Ok(true);
        }

        debug!("set_permissions: path={} mode={:o}", path, mode);
        let result = tokio::task::spawn_blocking(move || chmod(&full, mode & 0o7777))
            .await
            .map_err(|e| FsError::Backend(format!("chmod task failed: {}", e)))?;
        self.forget(&path::normalize_path(path)?);
        match result {
            Ok(()) => Ok(true),
            Err(e) => {
                warn!("Failed to change permissions of {}: {}", path, e);
                Ok(false)
            }
        }
    }

    /// Link `link` (an OS path) to `target` inside this filesystem.
    ///
    /// `Ok(false)` when the backend is not on local disk or the link could
    /// not be created.
    pub async fn create_symlink(&self, target: &str, link: &Path) -> Result<bool> {
        let Some(full) = self.local_path(target) else {
            return Ok(false);
        };
        if !self.has(target).await? {
            return Err(FsError::NotFound(target.to_string()));
        }
        let is_dir = self.is_directory(target).await;
        let link = link.to_path_buf();
        let result = tokio::task::spawn_blocking(move || {
            default_link_creator().create_link(&full, &link, is_dir)
        })
        .await
        .map_err(|e| FsError::Backend(format!("link task failed: {}", e)))?;

        match result {
            Ok(()) => Ok(true),
            Err(e) => {
                warn!("Failed to link {}: {}", target, e);
                Ok(false)
            }
        }
    }

    /// Facade for another named connection of the same configuration
    pub async fn create_connection(&self, name: &str) -> Result<Filesystem> {
        match &self.manager {
            Some(manager) => manager.make_connection(name).await,
            None => Err(FsError::NotSupported(
                "filesystem was not built by a file manager".to_string(),
            )),
        }
    }

    pub async fn get_files(&self, dir: &str, recursive: bool) -> Result<Vec<String>> {
        Ok(self
            .list_contents(dir, recursive)
            .await?
            .into_iter()
            .filter(|m| m.is_file())
            .map(|m| m.path)
            .collect())
    }

    pub async fn get_directories(&self, dir: &str, recursive: bool) -> Result<Vec<String>> {
        Ok(self
            .list_contents(dir, recursive)
            .await?
            .into_iter()
            .filter(|m| m.is_dir())
            .map(|m| m.path)
            .collect())
    }

    /// Paths of every entry matching a glob pattern such as `logs/**/*.txt`
    pub async fn glob(&self, pattern: &str) -> Result<Vec<String>> {
        let matcher = globset::GlobBuilder::new(pattern.trim_start_matches('/'))
            .literal_separator(true)
            .build()
            .map_err(|e| FsError::InvalidArgument(format!("Invalid glob {:?}: {}", pattern, e)))?
            .compile_matcher();
        Ok(self
            .list_contents("", true)
            .await?
            .into_iter()
            .filter(|m| matcher.is_match(&m.path))
            .map(|m| m.path)
            .collect())
    }

    /// A file handle on `path`: the adapter's own when it has one, a
    /// [`StreamBuffer`] otherwise
    pub fn create_stream(&self, path: &str) -> Result<Box<dyn FileStream>> {
        let path = path::normalize_path(path)?;
        if let Some(stream) = self.underlying_adapter().native_stream(&path) {
            return Ok(stream);
        }
        Ok(Box::new(StreamBuffer::new(self.clone(), path)))
    }
}

fn touch_file(path: &Path) -> std::io::Result<()> {
    let file = std::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(false)
        .open(path)?;
    file.set_modified(SystemTime::now())
}

#[cfg(unix)]
fn mode_bits(meta: &std::fs::Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    meta.permissions().mode()
}

#[cfg(not(unix))]
fn mode_bits(meta: &std::fs::Metadata) -> u32 {
    match (meta.is_dir(), meta.permissions().readonly()) {
        (true, _) => DIRECTORY_MODE_BITS,
        (false, true) => 0o100444,
        (false, false) => SYNTHETIC_PERMISSIONS,
    }
}

#[cfg(unix)]
fn chmod(path: &Path, mode: u32) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode))
}

#[cfg(not(unix))]
fn chmod(path: &Path, mode: u32) -> std::io::Result<()> {
    let mut permissions = std::fs::metadata(path)?.permissions();
    permissions.set_readonly(mode & 0o200 == 0);
    std::fs::set_permissions(path, permissions)
}
