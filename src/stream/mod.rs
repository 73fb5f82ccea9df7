//! File-handle style access to any adapter
//!
//! [`StreamBuffer`] gives backends without native streaming an
//! open/read/write/seek/close handle by holding the whole file in memory
//! and writing it back through the facade. [`StreamWrapper`] resolves
//! `scheme://name/path` URLs against a [`FilesystemMap`](crate::map::FilesystemMap).

pub mod buffer;
pub mod mode;
pub mod wrapper;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::Result;

pub use buffer::StreamBuffer;
pub use mode::StreamMode;
pub use wrapper::StreamWrapper;

pub const SEEK_SET: i32 = 0;
pub const SEEK_CUR: i32 = 1;
pub const SEEK_END: i32 = 2;

/// File type bits used when a backend has no real mode to report
pub const SYNTHETIC_DIR_MODE: u32 = 0o40775;
pub const SYNTHETIC_FILE_MODE: u32 = 0o100664;

/// POSIX style stat record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StreamStat {
    pub dev: u64,
    pub ino: u64,
    pub mode: u32,
    pub nlink: u64,
    pub uid: u32,
    pub gid: u32,
    pub rdev: u64,
    pub size: u64,
    pub atime: i64,
    pub mtime: i64,
    pub ctime: i64,
    /// `-1` when unknown
    pub blksize: i64,
    /// `-1` when unknown
    pub blocks: i64,
}

impl StreamStat {
    /// Plausible values for a backend that reports no stat of its own
    pub fn synthetic(is_dir: bool, size: u64, timestamp: i64) -> Self {
        Self {
            dev: 0,
            ino: 0,
            mode: if is_dir { SYNTHETIC_DIR_MODE } else { SYNTHETIC_FILE_MODE },
            nlink: 1,
            uid: 0,
            gid: 0,
            rdev: 0,
            size,
            atime: timestamp,
            mtime: timestamp,
            ctime: timestamp,
            blksize: -1,
            blocks: -1,
        }
    }

    #[cfg(unix)]
    pub fn from_fs(meta: &std::fs::Metadata) -> Self {
        use std::os::unix::fs::MetadataExt;
        Self {
            dev: meta.dev(),
            ino: meta.ino(),
            mode: meta.mode(),
            nlink: meta.nlink(),
            uid: meta.uid(),
            gid: meta.gid(),
            rdev: meta.rdev(),
            size: meta.size(),
            atime: meta.atime(),
            mtime: meta.mtime(),
            ctime: meta.ctime(),
            blksize: meta.blksize() as i64,
            blocks: meta.blocks() as i64,
        }
    }

    #[cfg(not(unix))]
    pub fn from_fs(meta: &std::fs::Metadata) -> Self {
        let mtime = meta
            .modified()
            .ok()
            .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0);
        Self::synthetic(meta.is_dir(), meta.len(), mtime)
    }

    pub fn is_dir(&self) -> bool {
        self.mode & 0o170000 == 0o040000
    }
}

/// An open file handle
#[async_trait]
pub trait FileStream: Send {
    /// Open under `mode`; `Ok(false)` when the path's existence does not
    /// fit the mode.
    async fn open(&mut self, mode: &StreamMode) -> Result<bool>;

    /// Up to `count` bytes from the current position
    async fn read(&mut self, count: usize) -> Result<Bytes>;

    /// Write at the current position, returning the number of bytes taken
    async fn write(&mut self, data: &[u8]) -> Result<usize>;

    /// Move the position; `false` for an unknown whence or a negative
    /// result
    fn seek(&mut self, offset: i64, whence: i32) -> bool;

    fn tell(&self) -> u64;

    fn eof(&self) -> bool;

    /// Push buffered content to the backend; failures come back as `false`
    async fn flush(&mut self) -> bool;

    async fn close(&mut self) -> bool;

    async fn stat(&self) -> Result<StreamStat>;

    /// Delete the backing file
    async fn unlink(&mut self) -> Result<bool>;
}
