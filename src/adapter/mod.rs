pub mod dropbox;
pub mod local;
pub mod memory;
pub mod object_store;
pub mod s3;

use std::path::Path;
use std::pin::Pin;
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};

use crate::error::{FsError, Result};
use crate::stream::FileStream;

/// Entry type enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    File,
    Dir,
}

/// Public/private access control, mapped onto permission bits where a
/// backend has no native ACL concept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    #[default]
    Public,
    Private,
}

impl Visibility {
    pub fn as_str(&self) -> &'static str {
        match self {
            Visibility::Public => "public",
            Visibility::Private => "private",
        }
    }
}

impl std::str::FromStr for Visibility {
    type Err = FsError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "public" => Ok(Visibility::Public),
            "private" => Ok(Visibility::Private),
            other => Err(FsError::InvalidArgument(format!(
                "Unknown visibility: {}",
                other
            ))),
        }
    }
}

/// Metadata for a file or directory
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    pub path: String,
    #[serde(rename = "type")]
    pub kind: EntryKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    /// Modification time in seconds since the unix epoch
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visibility: Option<Visibility>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mimetype: Option<String>,
}

impl Metadata {
    pub fn file(path: impl Into<String>, size: u64, timestamp: i64) -> Self {
        Self {
            path: path.into(),
            kind: EntryKind::File,
            size: Some(size),
            timestamp: Some(timestamp),
            visibility: None,
            mimetype: None,
        }
    }

    pub fn directory(path: impl Into<String>, timestamp: Option<i64>) -> Self {
        Self {
            path: path.into(),
            kind: EntryKind::Dir,
            size: None,
            timestamp,
            visibility: None,
            mimetype: None,
        }
    }

    pub fn with_visibility(mut self, visibility: Visibility) -> Self {
        self.visibility = Some(visibility);
        self
    }

    pub fn with_mimetype(mut self, mimetype: Option<String>) -> Self {
        self.mimetype = mimetype;
        self
    }

    pub fn is_file(&self) -> bool {
        matches!(self.kind, EntryKind::File)
    }

    pub fn is_dir(&self) -> bool {
        matches!(self.kind, EntryKind::Dir)
    }
}

/// Current time as unix seconds
pub fn now_timestamp() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

/// Per-call write options
#[derive(Debug, Clone, Default)]
pub struct WriteOptions {
    pub visibility: Option<Visibility>,
    pub mimetype: Option<String>,
}

impl WriteOptions {
    pub fn with_visibility(visibility: Option<Visibility>) -> Self {
        Self {
            visibility,
            mimetype: None,
        }
    }
}

/// Adapter capabilities declaration
#[derive(Debug, Clone, Default)]
pub struct Capabilities {
    /// Random access into file contents is cheap
    pub seekable: bool,
    /// Rename is a single backend operation rather than copy+delete
    pub atomic_rename: bool,
    /// Visibility can be changed after a write
    pub visibility: bool,
    /// Directories exist independently of their contents
    pub real_directories: bool,
    /// Backend stores real POSIX permission bits
    pub permissions: bool,
    /// Backend can hold symbolic links
    pub symlinks: bool,
}

impl Capabilities {
    /// Capabilities of a flat object store (S3, Azure, GCS, ...)
    pub fn object_store() -> Self {
        Self {
            seekable: false,
            atomic_rename: false,
            visibility: false,
            real_directories: false,
            permissions: false,
            symlinks: false,
        }
    }
}

/// Stream type for file contents
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes>> + Send>>;

/// Stream type for directory listings
pub type MetadataStream = Pin<Box<dyn Stream<Item = Result<Metadata>> + Send>>;

/// Drain a byte stream into one contiguous buffer
pub async fn collect_stream(mut stream: ByteStream) -> Result<Bytes> {
    let mut buffer = BytesMut::new();
    while let Some(chunk) = stream.next().await {
        buffer.extend_from_slice(&chunk?);
    }
    Ok(buffer.freeze())
}

/// Wrap a finished buffer as a single-chunk byte stream
pub fn once_stream(data: Bytes) -> ByteStream {
    Box::pin(futures::stream::once(async move { Ok(data) }))
}

/// Core adapter trait for storage backends
///
/// Adapters are path-based. Each operation receives a normalized,
/// root-relative path (see [`crate::path::normalize_path`]). Existence
/// assertions are the facade's job; adapters report what the backend says.
#[async_trait]
pub trait Adapter: Send + Sync {
    /// Driver name this adapter was built for (diagnostics only)
    fn name(&self) -> &str;

    /// Get adapter capabilities
    fn capabilities(&self) -> Capabilities;

    /// Check if a path exists
    ///
    /// Default implementation uses metadata()
    async fn has(&self, path: &str) -> Result<bool> {
        match self.metadata(path).await {
            Ok(_) => Ok(true),
            Err(FsError::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Read the whole file
    async fn read(&self, path: &str) -> Result<Bytes>;

    /// Read the file as a stream
    ///
    /// Default implementation yields the result of read() as one chunk
    async fn read_stream(&self, path: &str) -> Result<ByteStream> {
        Ok(once_stream(self.read(path).await?))
    }

    /// Create or replace a file
    async fn write(&self, path: &str, contents: Bytes, options: &WriteOptions)
        -> Result<Metadata>;

    /// Create or replace a file from a stream
    ///
    /// Default implementation buffers the stream and calls write()
    async fn write_stream(
        &self,
        path: &str,
        stream: ByteStream,
        options: &WriteOptions,
    ) -> Result<Metadata> {
        let contents = collect_stream(stream).await?;
        self.write(path, contents, options).await
    }

    /// Remove a file
    async fn delete(&self, path: &str) -> Result<()>;

    /// Remove a directory and everything below it
    async fn delete_dir(&self, path: &str) -> Result<()>;

    /// Rename/move a file
    async fn rename(&self, from: &str, to: &str) -> Result<()>;

    /// Copy a file
    async fn copy(&self, from: &str, to: &str) -> Result<()>;

    /// Create a directory (and missing parents)
    async fn create_dir(&self, path: &str, options: &WriteOptions) -> Result<Metadata>;

    /// List directory contents as a stream
    fn list_contents(&self, dir: &str, recursive: bool) -> MetadataStream;

    /// Get metadata for a path
    async fn metadata(&self, path: &str) -> Result<Metadata>;

    /// Get the mimetype of a file
    ///
    /// Default implementation reads it from metadata()
    async fn mimetype(&self, path: &str) -> Result<Option<String>> {
        Ok(self.metadata(path).await?.mimetype)
    }

    /// Get the visibility of a path
    ///
    /// Default implementation reads it from metadata(), falling back to public
    async fn visibility(&self, path: &str) -> Result<Visibility> {
        Ok(self.metadata(path).await?.visibility.unwrap_or_default())
    }

    /// Change the visibility of a path
    ///
    /// Default implementation returns NotSupported
    async fn set_visibility(&self, _path: &str, _visibility: Visibility) -> Result<()> {
        Err(FsError::NotSupported(format!(
            "{} adapter cannot change visibility",
            self.name()
        )))
    }

    /// Prefix the backend puts in front of every path
    fn path_prefix(&self) -> &str {
        ""
    }

    /// Root directory on local disk, only for adapters backed by it
    fn local_root(&self) -> Option<&Path> {
        None
    }

    /// A stream handle implemented natively by the backend, if any
    fn native_stream(&self, _path: &str) -> Option<Box<dyn FileStream>> {
        None
    }
}
