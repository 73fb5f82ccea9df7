//! Test harness
//!
//! Every [`TestContext`] owns a scratch directory holding its generated
//! configuration file, a local workspace and a file cache directory, so
//! tests never share state.

use crate::config::{TestConfig, TestConfigBuilder};
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;
use unifs::{FileManager, Filesystem};

/// Initialize logging for tests (call once per test run)
pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_test_writer()
        .try_init();
}

/// Isolated manager built from a generated configuration file
pub struct TestContext {
    dir: TempDir,
    manager: FileManager,
    config: TestConfig,
}

impl TestContext {
    /// Context whose default connection `local` is a workspace directory
    pub fn local() -> Result<Self> {
        Self::with_config(|builder, ctx| {
            builder
                .local("local", &ctx.workspace)
                .default_connection("local")
        })
    }

    /// Context whose default connection is in memory
    pub fn memory() -> Result<Self> {
        Self::with_config(|builder, _| builder.memory("mem").default_connection("mem"))
    }

    /// Build the configuration from scratch locations
    pub fn with_config<F>(config_fn: F) -> Result<Self>
    where
        F: FnOnce(TestConfigBuilder, &ScratchPaths) -> TestConfigBuilder,
    {
        init_logging();
        let dir = TempDir::new().context("Failed to create scratch directory")?;
        let paths = ScratchPaths {
            workspace: dir.path().join("ws"),
            cache: dir.path().join("cache"),
        };

        let config = config_fn(TestConfig::builder(), &paths).build();
        let config_path = dir.path().join("unifs.yaml");
        config.write_to_file(&config_path)?;
        debug!("Wrote test config to {:?}", config_path);

        let manager = FileManager::from_file(&config_path)
            .with_context(|| format!("Failed to load {:?}", config_path))?;
        info!("Test context ready in {:?}", dir.path());

        Ok(Self {
            dir,
            manager,
            config,
        })
    }

    pub fn manager(&self) -> &FileManager {
        &self.manager
    }

    pub fn config(&self) -> &TestConfig {
        &self.config
    }

    /// Workspace directory backing `local` connections
    pub fn workspace(&self) -> PathBuf {
        self.dir.path().join("ws")
    }

    pub fn cache_dir(&self) -> PathBuf {
        self.dir.path().join("cache")
    }

    pub fn scratch(&self) -> &Path {
        self.dir.path()
    }

    /// The default connection
    pub async fn fs(&self) -> Result<Filesystem> {
        Ok(self.manager.default_connection().await?)
    }

    pub async fn connection(&self, name: &str) -> Result<Filesystem> {
        Ok(self.manager.make_connection(name).await?)
    }

    /// A second manager reading the same configuration, as another process
    /// would
    pub fn reload(&self) -> Result<FileManager> {
        Ok(FileManager::from_file(&self.dir.path().join("unifs.yaml"))?)
    }
}

/// Locations inside a context's scratch directory
pub struct ScratchPaths {
    pub workspace: PathBuf,
    pub cache: PathBuf,
}

/// S3 compatible endpoint (e.g. MinIO) to test against, taken from
/// `MINIO_ENDPOINT`; S3 tests are skipped without it
pub fn minio_endpoint() -> Option<String> {
    std::env::var("MINIO_ENDPOINT").ok().filter(|e| !e.is_empty())
}

/// Bucket used by the S3 tests, created on first use
pub async fn ensure_bucket(endpoint: &str, bucket: &str) -> Result<()> {
    let config = aws_config::defaults(aws_config::BehaviorVersion::latest())
        .region(aws_config::Region::new("us-east-1"))
        .endpoint_url(endpoint)
        .load()
        .await;
    let client = aws_sdk_s3::Client::from_conf(
        aws_sdk_s3::config::Builder::from(&config)
            .force_path_style(true)
            .build(),
    );

    if client.head_bucket().bucket(bucket).send().await.is_ok() {
        return Ok(());
    }
    client
        .create_bucket()
        .bucket(bucket)
        .send()
        .await
        .context("Failed to create test bucket")?;
    Ok(())
}
