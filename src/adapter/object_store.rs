//! Adapter over any [`object_store::ObjectStore`]
//!
//! Backs the `azure`, `gcs` and `webdav` drivers. Directories are implied by
//! object prefixes; `create_dir` does not write anything.

use std::sync::Arc;

use async_stream::try_stream;
use async_trait::async_trait;
use base64::Engine;
use bytes::Bytes;
use futures::{StreamExt, TryStreamExt};
use object_store::path::Path as ObjectPath;
use object_store::{ClientOptions, ObjectMeta, ObjectStore, PutPayload};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use tracing::{debug, trace};

use crate::adapter::{
    now_timestamp, Adapter, ByteStream, Capabilities, Metadata, MetadataStream, WriteOptions,
};
use crate::error::{FsError, Result};

/// Adapter wrapping a shared object store
pub struct ObjectStoreAdapter {
    name: String,
    store: Arc<dyn ObjectStore>,
    prefix: String,
}

impl ObjectStoreAdapter {
    pub fn new(name: impl Into<String>, store: Arc<dyn ObjectStore>, prefix: Option<&str>) -> Self {
        Self {
            name: name.into(),
            store,
            prefix: prefix.unwrap_or_default().trim_matches('/').to_string(),
        }
    }

    /// Azure Blob Storage container
    pub fn azure(account_name: &str, api_key: &str, container: &str, prefix: Option<&str>) -> Result<Self> {
        let store = object_store::azure::MicrosoftAzureBuilder::new()
            .with_account(account_name)
            .with_access_key(api_key)
            .with_container_name(container)
            .build()
            .map_err(|e| FsError::Backend(format!("Failed to build azure store: {}", e)))?;
        Ok(Self::new("azure", Arc::new(store), prefix))
    }

    /// Google Cloud Storage bucket, authenticated by a service account key
    /// file when one is given and by application default credentials
    /// otherwise.
    pub fn gcs(bucket: &str, key_file: Option<&str>, prefix: Option<&str>) -> Result<Self> {
        let mut builder = object_store::gcp::GoogleCloudStorageBuilder::new().with_bucket_name(bucket);
        if let Some(key_file) = key_file {
            builder = builder.with_service_account_path(key_file);
        }
        let store = builder
            .build()
            .map_err(|e| FsError::Backend(format!("Failed to build gcs store: {}", e)))?;
        Ok(Self::new("gcs", Arc::new(store), prefix))
    }

    /// WebDAV server rooted at `base_uri`, with HTTP basic auth when
    /// `credentials` are given
    pub fn webdav(
        base_uri: &str,
        credentials: Option<(&str, &str)>,
        prefix: Option<&str>,
    ) -> Result<Self> {
        let mut builder = object_store::http::HttpBuilder::new().with_url(base_uri);
        if let Some((user, password)) = credentials {
            debug!("webdav: authenticating as {}", user);
            builder = builder.with_client_options(
                ClientOptions::new().with_default_headers(basic_auth_headers(user, password)?),
            );
        }
        let store = builder
            .build()
            .map_err(|e| FsError::Backend(format!("Failed to build webdav store: {}", e)))?;
        Ok(Self::new("webdav", Arc::new(store), prefix))
    }

    fn location(&self, path: &str) -> ObjectPath {
        location(&self.prefix, path)
    }

    fn map_error(err: object_store::Error, path: &str) -> FsError {
        match err {
            object_store::Error::NotFound { .. } => FsError::NotFound(path.to_string()),
            object_store::Error::AlreadyExists { .. } => FsError::AlreadyExists(path.to_string()),
            object_store::Error::NotSupported { source } => FsError::NotSupported(source.to_string()),
            other => FsError::Backend(other.to_string()),
        }
    }
}

fn basic_auth_headers(user: &str, password: &str) -> Result<HeaderMap> {
    let encoded = base64::engine::general_purpose::STANDARD.encode(format!("{}:{}", user, password));
    let mut value = HeaderValue::from_str(&format!("Basic {}", encoded))
        .map_err(|e| FsError::InvalidArgument(format!("Invalid webdav credentials: {}", e)))?;
    value.set_sensitive(true);

    let mut headers = HeaderMap::new();
    headers.insert(AUTHORIZATION, value);
    Ok(headers)
}

fn location(prefix: &str, path: &str) -> ObjectPath {
    match (prefix.is_empty(), path.is_empty()) {
        (true, _) => ObjectPath::from(path),
        (false, true) => ObjectPath::from(prefix),
        (false, false) => ObjectPath::from(format!("{}/{}", prefix, path)),
    }
}

/// Strip the adapter prefix from a store location
fn relative(prefix: &str, location: &ObjectPath) -> String {
    let full = location.as_ref();
    if prefix.is_empty() {
        return full.to_string();
    }
    full.strip_prefix(prefix)
        .map(|rest| rest.trim_start_matches('/'))
        .unwrap_or(full)
        .to_string()
}

fn file_metadata(path: String, meta: &ObjectMeta) -> Metadata {
    Metadata::file(path, meta.size, meta.last_modified.timestamp())
}

#[async_trait]
impl Adapter for ObjectStoreAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::object_store()
    }

    async fn read(&self, path: &str) -> Result<Bytes> {
        trace!("read: path={}", path);
        let result = self
            .store
            .get(&self.location(path))
            .await
            .map_err(|e| Self::map_error(e, path))?;
        result.bytes().await.map_err(|e| Self::map_error(e, path))
    }

    async fn read_stream(&self, path: &str) -> Result<ByteStream> {
        let result = self
            .store
            .get(&self.location(path))
            .await
            .map_err(|e| Self::map_error(e, path))?;
        let path = path.to_string();
        Ok(Box::pin(
            result
                .into_stream()
                .map_err(move |e| Self::map_error(e, &path)),
        ))
    }

    async fn write(&self, path: &str, contents: Bytes, _options: &WriteOptions) -> Result<Metadata> {
        debug!("write: path={} size={}", path, contents.len());
        let size = contents.len() as u64;
        self.store
            .put(&self.location(path), PutPayload::from(contents))
            .await
            .map_err(|e| Self::map_error(e, path))?;
        Ok(Metadata::file(path, size, now_timestamp()))
    }

    async fn delete(&self, path: &str) -> Result<()> {
        debug!("delete: path={}", path);
        self.store
            .delete(&self.location(path))
            .await
            .map_err(|e| Self::map_error(e, path))
    }

    async fn delete_dir(&self, path: &str) -> Result<()> {
        debug!("delete_dir: path={}", path);
        let prefix = self.location(path);
        let locations: Vec<ObjectPath> = self
            .store
            .list(Some(&prefix))
            .map_ok(|meta| meta.location)
            .try_collect()
            .await
            .map_err(|e| Self::map_error(e, path))?;
        for location in locations {
            self.store
                .delete(&location)
                .await
                .map_err(|e| Self::map_error(e, path))?;
        }
        Ok(())
    }

    async fn rename(&self, from: &str, to: &str) -> Result<()> {
        debug!("rename: from={} to={}", from, to);
        self.store
            .rename(&self.location(from), &self.location(to))
            .await
            .map_err(|e| Self::map_error(e, from))
    }

    async fn copy(&self, from: &str, to: &str) -> Result<()> {
        debug!("copy: from={} to={}", from, to);
        self.store
            .copy(&self.location(from), &self.location(to))
            .await
            .map_err(|e| Self::map_error(e, from))
    }

    async fn create_dir(&self, path: &str, _options: &WriteOptions) -> Result<Metadata> {
        Ok(Metadata::directory(path, Some(now_timestamp())))
    }

    fn list_contents(&self, dir: &str, recursive: bool) -> MetadataStream {
        let store = self.store.clone();
        let prefix = self.prefix.clone();
        let base = self.location(dir);
        let dir = dir.to_string();

        Box::pin(try_stream! {
            if recursive {
                let mut seen = std::collections::BTreeSet::new();
                let mut listing = store.list(Some(&base));
                while let Some(meta) = listing.next().await {
                    let meta = meta.map_err(|e| Self::map_error(e, &dir))?;
                    let rel = relative(&prefix, &meta.location);

                    let mut parents = Vec::new();
                    let mut parent = crate::path::dirname(&rel).to_string();
                    while parent.len() > dir.len() && seen.insert(parent.clone()) {
                        parents.push(parent.clone());
                        parent = crate::path::dirname(&parent).to_string();
                    }
                    for implied in parents.into_iter().rev() {
                        yield Metadata::directory(implied, None);
                    }
                    yield file_metadata(rel, &meta);
                }
            } else {
                let listing = store
                    .list_with_delimiter(Some(&base))
                    .await
                    .map_err(|e| Self::map_error(e, &dir))?;
                for common_prefix in &listing.common_prefixes {
                    yield Metadata::directory(relative(&prefix, common_prefix), None);
                }
                for meta in &listing.objects {
                    yield file_metadata(relative(&prefix, &meta.location), meta);
                }
            }
        })
    }

    async fn metadata(&self, path: &str) -> Result<Metadata> {
        trace!("metadata: path={}", path);
        if path.is_empty() {
            return Ok(Metadata::directory(path, None));
        }

        match self.store.head(&self.location(path)).await {
            Ok(meta) => return Ok(file_metadata(path.to_string(), &meta)),
            Err(object_store::Error::NotFound { .. }) => {}
            Err(e) => return Err(Self::map_error(e, path)),
        }

        let listing = self
            .store
            .list_with_delimiter(Some(&self.location(path)))
            .await
            .map_err(|e| Self::map_error(e, path))?;
        if listing.objects.is_empty() && listing.common_prefixes.is_empty() {
            Err(FsError::NotFound(path.to_string()))
        } else {
            Ok(Metadata::directory(path, None))
        }
    }

    fn path_prefix(&self) -> &str {
        &self.prefix
    }
}
