//! unifs: one filesystem API over interchangeable storage backends
//!
//! Application code works with a [`Filesystem`], which wraps exactly one
//! storage adapter and exposes path based CRUD, listings and file-manager
//! helpers on top of it.
//!
//! # Architecture
//!
//! - **Adapters**: storage backends (local disk, memory, S3, Azure, GCS,
//!   WebDAV, Dropbox) implementing the `Adapter` trait.
//! - **Connectors**: validate a connection's configuration map and build its
//!   adapter; hosts can register their own for any driver name.
//! - **Cache Layer**: optional decorator remembering metadata, persisted to a
//!   key/value `CacheStore`.
//! - **Streams**: `StreamBuffer` file handles for backends without native
//!   streaming, plus `scheme://name/path` URL resolution over a
//!   `FilesystemMap`.
//! - **File Manager**: builds filesystems by connection name from one
//!   configuration.
//!
//! # Example
//!
//! ```no_run
//! use unifs::config::Config;
//! use unifs::manager::FileManager;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::from_file("unifs.yaml".as_ref())?;
//! let manager = FileManager::new(config);
//!
//! let fs = manager.default_connection().await?;
//! fs.put("reports/today.txt", "hello").await?;
//! fs.append("reports/today.txt", b"world", b"\n").await?;
//! println!("{}", fs.checksum("reports/today.txt").await?);
//! # Ok(())
//! # }
//! ```

pub mod adapter;
pub mod cache;
pub mod config;
pub mod connector;
pub mod env;
pub mod error;
pub mod filesystem;
pub mod manager;
pub mod map;
pub mod path;
pub mod platform;
pub mod stream;

pub use error::{FsError, Result};
pub use filesystem::{Contents, Filesystem, FilesystemOptions, UploadedFile};
pub use manager::FileManager;
pub use map::FilesystemMap;
