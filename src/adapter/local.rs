//! Local disk adapter
//!
//! Files live below a root directory. Writes of whole buffers take an
//! exclusive `flock` unless the connection is configured with
//! `write_flags: none`; [`read_locked`] is the shared-lock counterpart used
//! by `Filesystem::shared_get`.

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use async_stream::try_stream;
use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use tokio::io::AsyncWriteExt;
use tokio_util::io::ReaderStream;
use tracing::{debug, trace};

use crate::adapter::{
    now_timestamp, Adapter, ByteStream, Capabilities, Metadata, MetadataStream, Visibility,
    WriteOptions,
};
use crate::config::ConfigError;
use crate::error::{FsError, Result};
use crate::path::join;

/// Locking applied to whole-buffer writes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WriteFlags {
    #[default]
    ExclusiveLock,
    None,
}

/// What a listing does when it meets a symbolic link
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LinkHandling {
    #[default]
    DisallowLinks,
    SkipLinks,
}

/// Permission bits used to express visibility on disk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PermissionMap {
    pub file_public: u32,
    pub file_private: u32,
    pub dir_public: u32,
    pub dir_private: u32,
}

impl Default for PermissionMap {
    fn default() -> Self {
        Self {
            file_public: 0o644,
            file_private: 0o600,
            dir_public: 0o755,
            dir_private: 0o700,
        }
    }
}

impl PermissionMap {
    fn mode_for(&self, is_dir: bool, visibility: Visibility) -> u32 {
        match (is_dir, visibility) {
            (false, Visibility::Public) => self.file_public,
            (false, Visibility::Private) => self.file_private,
            (true, Visibility::Public) => self.dir_public,
            (true, Visibility::Private) => self.dir_private,
        }
    }
}

/// Options for the local adapter (validated by the `local` connector)
#[derive(Debug, Clone)]
pub struct LocalOptions {
    pub root: PathBuf,
    pub write_flags: WriteFlags,
    pub link_handling: LinkHandling,
    pub permissions: PermissionMap,
}

impl LocalOptions {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            write_flags: WriteFlags::default(),
            link_handling: LinkHandling::default(),
            permissions: PermissionMap::default(),
        }
    }
}

/// Local disk adapter
pub struct LocalAdapter {
    root: PathBuf,
    prefix: String,
    write_flags: WriteFlags,
    link_handling: LinkHandling,
    permissions: PermissionMap,
}

impl LocalAdapter {
    /// Create the adapter, creating the root directory if it is missing.
    ///
    /// The root must end up being a readable directory; anything else is a
    /// configuration error raised here rather than on first use.
    pub fn new(options: LocalOptions) -> Result<Self> {
        let root = options.root;
        if !root.exists() {
            debug!("Creating local root {:?}", root);
            std::fs::create_dir_all(&root).map_err(|e| {
                ConfigError::ValidationError(format!(
                    "Impossible to create the root directory {:?}: {}",
                    root, e
                ))
            })?;
        }
        if !root.is_dir() {
            return Err(ConfigError::ValidationError(format!(
                "The root path {:?} is not a directory",
                root
            ))
            .into());
        }
        std::fs::read_dir(&root).map_err(|e| {
            ConfigError::ValidationError(format!("The root path {:?} is not readable: {}", root, e))
        })?;

        let mut prefix = root.to_string_lossy().to_string();
        if !prefix.ends_with('/') {
            prefix.push('/');
        }

        Ok(Self {
            root,
            prefix,
            write_flags: options.write_flags,
            link_handling: options.link_handling,
            permissions: options.permissions,
        })
    }

    fn full_path(&self, path: &str) -> PathBuf {
        if path.is_empty() {
            self.root.clone()
        } else {
            self.root.join(path)
        }
    }

    async fn ensure_parent(&self, path: &str) -> Result<()> {
        let full = self.full_path(path);
        if let Some(parent) = full.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| FsError::from_io(e, path))?;
        }
        Ok(())
    }

    async fn apply_visibility(&self, path: &str, is_dir: bool, visibility: Visibility) -> Result<()> {
        let mode = self.permissions.mode_for(is_dir, visibility);
        set_mode(&self.full_path(path), mode)
            .await
            .map_err(|e| FsError::from_io(e, path))
    }
}

/// Build metadata from what the OS reports for `path`
fn metadata_from_fs(path: &str, meta: &std::fs::Metadata) -> Metadata {
    let timestamp = meta
        .modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_secs() as i64);

    let base = if meta.is_dir() {
        Metadata::directory(path, timestamp)
    } else {
        Metadata::file(path, meta.len(), timestamp.unwrap_or_else(now_timestamp))
    };
    base.with_visibility(visibility_from_fs(meta))
}

#[cfg(unix)]
fn visibility_from_fs(meta: &std::fs::Metadata) -> Visibility {
    use std::os::unix::fs::PermissionsExt;
    if meta.permissions().mode() & 0o044 != 0 {
        Visibility::Public
    } else {
        Visibility::Private
    }
}

#[cfg(not(unix))]
fn visibility_from_fs(meta: &std::fs::Metadata) -> Visibility {
    if meta.permissions().readonly() {
        Visibility::Private
    } else {
        Visibility::Public
    }
}

#[cfg(unix)]
async fn set_mode(path: &Path, mode: u32) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(mode)).await
}

#[cfg(not(unix))]
async fn set_mode(_path: &Path, _mode: u32) -> io::Result<()> {
    Ok(())
}

#[cfg(unix)]
fn flock(file: &File, operation: libc::c_int) -> io::Result<()> {
    use std::os::unix::io::AsRawFd;
    let rc = unsafe { libc::flock(file.as_raw_fd(), operation) };
    if rc == 0 {
        Ok(())
    } else {
        Err(io::Error::last_os_error())
    }
}

#[cfg(unix)]
const LOCK_SHARED: libc::c_int = libc::LOCK_SH;
#[cfg(unix)]
const LOCK_EXCLUSIVE: libc::c_int = libc::LOCK_EX;
#[cfg(unix)]
const LOCK_RELEASE: libc::c_int = libc::LOCK_UN;

#[cfg(not(unix))]
fn flock(_file: &File, _operation: i32) -> io::Result<()> {
    Ok(())
}

#[cfg(not(unix))]
const LOCK_SHARED: i32 = 1;
#[cfg(not(unix))]
const LOCK_EXCLUSIVE: i32 = 2;
#[cfg(not(unix))]
const LOCK_RELEASE: i32 = 8;

/// Hold `operation` on `file` while `body` runs; the lock is released on
/// every exit path, including a failing body.
fn with_lock<T>(
    file: &File,
    operation: i32,
    body: impl FnOnce(&File) -> io::Result<T>,
) -> io::Result<T> {
    flock(file, operation)?;
    let file = scopeguard::guard(file, |f| {
        let _ = flock(f, LOCK_RELEASE);
    });
    body(*file)
}

/// Read a whole file under a shared lock
pub fn read_locked(path: &Path) -> io::Result<Vec<u8>> {
    let file = File::open(path)?;
    with_lock(&file, LOCK_SHARED, |mut f| {
        let mut contents = Vec::new();
        f.read_to_end(&mut contents)?;
        Ok(contents)
    })
}

/// Open `path` for replacement, emptied and, with `lock`, held under an
/// exclusive lock the caller must release
fn open_for_replace(path: &Path, lock: bool) -> io::Result<File> {
    let file = OpenOptions::new().write(true).create(true).truncate(false).open(path)?;
    if lock {
        flock(&file, LOCK_EXCLUSIVE)?;
    }
    if let Err(e) = file.set_len(0) {
        if lock {
            let _ = flock(&file, LOCK_RELEASE);
        }
        return Err(e);
    }
    Ok(file)
}

fn write_file(path: &Path, contents: &[u8], lock: bool) -> io::Result<std::fs::Metadata> {
    let file = OpenOptions::new().write(true).create(true).truncate(!lock).open(path)?;
    let write = |mut f: &File| -> io::Result<()> {
        f.set_len(0)?;
        f.write_all(contents)?;
        f.flush()
    };
    if lock {
        with_lock(&file, LOCK_EXCLUSIVE, write)?;
    } else {
        write(&file)?;
    }
    file.metadata()
}

#[async_trait]
impl Adapter for LocalAdapter {
    fn name(&self) -> &str {
        "local"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            seekable: true,
            atomic_rename: true,
            visibility: true,
            real_directories: true,
            permissions: cfg!(unix),
            symlinks: cfg!(unix),
        }
    }

    async fn has(&self, path: &str) -> Result<bool> {
        tokio::fs::try_exists(self.full_path(path))
            .await
            .map_err(|e| FsError::from_io(e, path))
    }

    async fn read(&self, path: &str) -> Result<Bytes> {
        trace!("read: path={}", path);
        let data = tokio::fs::read(self.full_path(path))
            .await
            .map_err(|e| FsError::from_io(e, path))?;
        Ok(Bytes::from(data))
    }

    async fn read_stream(&self, path: &str) -> Result<ByteStream> {
        let file = tokio::fs::File::open(self.full_path(path))
            .await
            .map_err(|e| FsError::from_io(e, path))?;
        Ok(Box::pin(ReaderStream::new(file).map(|chunk| chunk.map_err(FsError::Io))))
    }

    async fn write(&self, path: &str, contents: Bytes, options: &WriteOptions) -> Result<Metadata> {
        debug!("write: path={} size={}", path, contents.len());
        self.ensure_parent(path).await?;

        let full = self.full_path(path);
        let lock = self.write_flags == WriteFlags::ExclusiveLock;
        let fs_meta = tokio::task::spawn_blocking(move || write_file(&full, &contents, lock))
            .await
            .map_err(|e| FsError::Backend(format!("write task failed: {}", e)))?
            .map_err(|e| FsError::from_io(e, path))?;

        if let Some(visibility) = options.visibility {
            self.apply_visibility(path, false, visibility).await?;
            return Ok(metadata_from_fs(path, &fs_meta).with_visibility(visibility));
        }
        Ok(metadata_from_fs(path, &fs_meta))
    }

    async fn write_stream(
        &self,
        path: &str,
        mut stream: ByteStream,
        options: &WriteOptions,
    ) -> Result<Metadata> {
        debug!("write_stream: path={}", path);
        self.ensure_parent(path).await?;

        let full = self.full_path(path);
        let lock = self.write_flags == WriteFlags::ExclusiveLock;
        let opened = tokio::task::spawn_blocking(move || open_for_replace(&full, lock))
            .await
            .map_err(|e| FsError::Backend(format!("open task failed: {}", e)))?
            .map_err(|e| FsError::from_io(e, path))?;

        // flock is per open file description: the clone writes under it
        let held = scopeguard::guard(opened, move |f| {
            if lock {
                let _ = flock(&f, LOCK_RELEASE);
            }
        });
        let mut file = tokio::fs::File::from_std(held.try_clone()?);
        while let Some(chunk) = stream.next().await {
            file.write_all(&chunk?).await?;
        }
        file.flush().await?;
        drop(file);
        drop(held);

        if let Some(visibility) = options.visibility {
            self.apply_visibility(path, false, visibility).await?;
        }
        self.metadata(path).await
    }

    async fn delete(&self, path: &str) -> Result<()> {
        debug!("delete: path={}", path);
        tokio::fs::remove_file(self.full_path(path))
            .await
            .map_err(|e| FsError::from_io(e, path))
    }

    async fn delete_dir(&self, path: &str) -> Result<()> {
        debug!("delete_dir: path={}", path);
        if path.is_empty() {
            return Err(FsError::InvalidPath("refusing to delete the root".to_string()));
        }
        tokio::fs::remove_dir_all(self.full_path(path))
            .await
            .map_err(|e| FsError::from_io(e, path))
    }

    async fn rename(&self, from: &str, to: &str) -> Result<()> {
        debug!("rename: from={} to={}", from, to);
        self.ensure_parent(to).await?;
        tokio::fs::rename(self.full_path(from), self.full_path(to))
            .await
            .map_err(|e| FsError::from_io(e, from))
    }

    async fn copy(&self, from: &str, to: &str) -> Result<()> {
        debug!("copy: from={} to={}", from, to);
        self.ensure_parent(to).await?;
        tokio::fs::copy(self.full_path(from), self.full_path(to))
            .await
            .map(|_| ())
            .map_err(|e| FsError::from_io(e, from))
    }

    async fn create_dir(&self, path: &str, options: &WriteOptions) -> Result<Metadata> {
        debug!("create_dir: path={}", path);
        let full = self.full_path(path);
        tokio::fs::create_dir_all(&full)
            .await
            .map_err(|e| FsError::from_io(e, path))?;
        let visibility = options.visibility.unwrap_or_default();
        self.apply_visibility(path, true, visibility).await?;
        Ok(Metadata::directory(path, Some(now_timestamp())).with_visibility(visibility))
    }

    fn list_contents(&self, dir: &str, recursive: bool) -> MetadataStream {
        let root = self.root.clone();
        let dir = dir.to_string();
        let link_handling = self.link_handling;

        Box::pin(try_stream! {
            let mut pending = vec![dir];

            while let Some(current) = pending.pop() {
                let full = if current.is_empty() { root.clone() } else { root.join(&current) };
                let mut reader = match tokio::fs::read_dir(&full).await {
                    Ok(reader) => reader,
                    Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
                    Err(e) => Err(FsError::from_io(e, &current))?,
                };

                while let Some(entry) = reader
                    .next_entry()
                    .await
                    .map_err(|e| FsError::from_io(e, &current))?
                {
                    let name = entry.file_name().to_string_lossy().to_string();
                    let rel = join(&current, &name);
                    let file_type = entry
                        .file_type()
                        .await
                        .map_err(|e| FsError::from_io(e, &rel))?;

                    if file_type.is_symlink() {
                        if link_handling == LinkHandling::SkipLinks {
                            continue;
                        }
                        Err::<(), _>(FsError::NotSupported(format!(
                            "Links are not supported, encountered link at {}",
                            rel
                        )))?;
                    }

                    let meta = entry
                        .metadata()
                        .await
                        .map_err(|e| FsError::from_io(e, &rel))?;
                    let meta = metadata_from_fs(&rel, &meta);
                    if recursive && meta.is_dir() {
                        pending.push(rel.clone());
                    }
                    yield meta;
                }
            }
        })
    }

    async fn metadata(&self, path: &str) -> Result<Metadata> {
        let meta = tokio::fs::metadata(self.full_path(path))
            .await
            .map_err(|e| FsError::from_io(e, path))?;
        Ok(metadata_from_fs(path, &meta))
    }

    async fn set_visibility(&self, path: &str, visibility: Visibility) -> Result<()> {
        let meta = self.metadata(path).await?;
        self.apply_visibility(path, meta.is_dir(), visibility).await
    }

    fn path_prefix(&self) -> &str {
        &self.prefix
    }

    fn local_root(&self) -> Option<&Path> {
        Some(&self.root)
    }
}
