//! In-memory file handle over a [`Filesystem`]

use async_trait::async_trait;
use bytes::Bytes;
use tracing::{debug, trace, warn};

use crate::adapter::now_timestamp;
use crate::error::{FsError, Result};
use crate::filesystem::Filesystem;
use crate::stream::{FileStream, StreamMode, StreamStat, SEEK_CUR, SEEK_END, SEEK_SET};

/// Whole-file buffer synchronized back on flush/close
pub struct StreamBuffer {
    fs: Filesystem,
    path: String,
    mode: Option<StreamMode>,
    content: Vec<u8>,
    position: u64,
    synchronized: bool,
}

impl StreamBuffer {
    pub fn new(fs: Filesystem, path: impl Into<String>) -> Self {
        Self {
            fs,
            path: path.into(),
            mode: None,
            content: Vec::new(),
            position: 0,
            synchronized: true,
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn mode(&self) -> Option<&StreamMode> {
        self.mode.as_ref()
    }

    pub fn num_bytes(&self) -> u64 {
        self.content.len() as u64
    }

    pub fn is_synchronized(&self) -> bool {
        self.synchronized
    }

    fn open_mode(&self) -> Result<&StreamMode> {
        self.mode
            .as_ref()
            .ok_or_else(|| FsError::StreamState(format!("Stream for {} is not open", self.path)))
    }
}

#[async_trait]
impl FileStream for StreamBuffer {
    async fn open(&mut self, mode: &StreamMode) -> Result<bool> {
        let exists = self.fs.has(&self.path).await?;
        if exists && !mode.allows_existing() {
            debug!("open: path={} mode={} refused, path exists", self.path, mode);
            return Ok(false);
        }
        if !exists && !mode.allows_new() {
            debug!("open: path={} mode={} refused, path missing", self.path, mode);
            return Ok(false);
        }

        self.content.clear();
        if mode.implies_truncate() || !exists {
            // Truncation and creation are visible to other readers at once
            self.fs.put(&self.path, Bytes::new()).await?;
        } else if self.fs.is_file(&self.path).await {
            self.content = self.fs.read(&self.path).await?.to_vec();
        }

        self.position = if mode.implies_position_at_end() {
            self.content.len() as u64
        } else {
            0
        };
        self.synchronized = true;
        self.mode = Some(mode.clone());
        trace!("open: path={} mode={} size={}", self.path, mode, self.content.len());
        Ok(true)
    }

    async fn read(&mut self, count: usize) -> Result<Bytes> {
        if !self.open_mode()?.allows_read() {
            return Err(FsError::StreamState(format!(
                "Stream for {} is not readable",
                self.path
            )));
        }

        let len = self.content.len() as u64;
        let start = self.position.min(len) as usize;
        let end = (self.position.saturating_add(count as u64)).min(len) as usize;
        let chunk = Bytes::copy_from_slice(&self.content[start..end]);
        self.position += chunk.len() as u64;
        Ok(chunk)
    }

    async fn write(&mut self, data: &[u8]) -> Result<usize> {
        let mode = self.open_mode()?;
        if !mode.allows_write() {
            return Err(FsError::StreamState(format!(
                "Stream for {} is not writable",
                self.path
            )));
        }
        if mode.implies_position_at_end() {
            self.position = self.content.len() as u64;
        }

        let position = usize::try_from(self.position)
            .map_err(|_| FsError::StreamState("Stream position out of range".to_string()))?;
        if position >= self.content.len() {
            // Gap between the old end and the write position is filled with spaces
            self.content.resize(position, b' ');
            self.content.extend_from_slice(data);
        } else {
            let end = position + data.len();
            if end > self.content.len() {
                self.content.resize(end, 0);
            }
            self.content[position..end].copy_from_slice(data);
        }

        self.position += data.len() as u64;
        self.synchronized = false;
        Ok(data.len())
    }

    fn seek(&mut self, offset: i64, whence: i32) -> bool {
        let base = match whence {
            SEEK_SET => 0,
            SEEK_CUR => self.position as i64,
            SEEK_END => self.content.len() as i64,
            _ => return false,
        };
        match base.checked_add(offset) {
            Some(target) if target >= 0 => {
                self.position = target as u64;
                true
            }
            _ => false,
        }
    }

    fn tell(&self) -> u64 {
        self.position
    }

    fn eof(&self) -> bool {
        self.position >= self.content.len() as u64
    }

    async fn flush(&mut self) -> bool {
        let Some(mode) = &self.mode else {
            return false;
        };
        if !mode.allows_write() {
            return self.synchronized;
        }

        match self.fs.put(&self.path, Bytes::copy_from_slice(&self.content)).await {
            Ok(true) => {
                self.synchronized = true;
                true
            }
            Ok(false) => false,
            Err(e) => {
                warn!("Failed to flush stream for {}: {}", self.path, e);
                false
            }
        }
    }

    async fn close(&mut self) -> bool {
        if self.mode.is_none() {
            return true;
        }
        let result = if self.synchronized { true } else { self.flush().await };
        self.mode = None;
        self.content = Vec::new();
        self.position = 0;
        self.synchronized = true;
        result
    }

    async fn stat(&self) -> Result<StreamStat> {
        if let Some(full) = self.fs.local_path(&self.path) {
            if let Ok(meta) = tokio::fs::metadata(&full).await {
                let mut stat = StreamStat::from_fs(&meta);
                if !self.synchronized {
                    stat.size = self.content.len() as u64;
                }
                return Ok(stat);
            }
        }

        if self.mode.is_some() {
            let timestamp = self.fs.get_timestamp(&self.path).await.unwrap_or_else(|_| now_timestamp());
            return Ok(StreamStat::synthetic(false, self.content.len() as u64, timestamp));
        }

        let meta = self.fs.get_metadata(&self.path).await?;
        Ok(StreamStat::synthetic(
            meta.is_dir(),
            meta.size.unwrap_or(0),
            meta.timestamp.unwrap_or_else(now_timestamp),
        ))
    }

    async fn unlink(&mut self) -> Result<bool> {
        if !self.open_mode()?.implies_truncate() {
            return Err(FsError::StreamState(format!(
                "Stream for {} was not opened with a truncating mode",
                self.path
            )));
        }
        let deleted = self.fs.delete(&self.path).await?;
        self.content.clear();
        self.position = 0;
        self.synchronized = true;
        Ok(deleted)
    }
}
