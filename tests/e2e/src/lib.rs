//! E2E test harness for unifs
//!
//! Tests build a [`TestContext`] from a generated YAML configuration and
//! drive the resulting filesystems through the public API only.
//!
//! ```ignore
//! use unifs_e2e::TestContext;
//!
//! #[tokio::test]
//! async fn my_test() -> anyhow::Result<()> {
//!     let ctx = TestContext::local()?;
//!     let fs = ctx.fs().await?;
//!     fs.put("a.txt", "hello").await?;
//!     Ok(())
//! }
//! ```
//!
//! S3 tests need an S3 compatible endpoint in `MINIO_ENDPOINT` (plus the
//! usual `AWS_ACCESS_KEY_ID`/`AWS_SECRET_ACCESS_KEY`) and skip themselves
//! otherwise.

pub mod config;
pub mod harness;

pub use assertions::*;
pub use config::{CacheStoreConfig, CachingConfig, TestConfig, TestConfigBuilder};
pub use harness::{ensure_bucket, init_logging, minio_endpoint, ScratchPaths, TestContext};
