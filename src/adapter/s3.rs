//! Amazon S3 adapter
//!
//! Works against Amazon S3 or S3-compatible storage (MinIO, LocalStack).
//! Directories are virtual: a prefix exists when any object lives under it,
//! and `create_dir` writes a zero-byte `dir/` marker object.

use std::collections::BTreeSet;

use async_stream::try_stream;
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::config::{Credentials, Region};
use aws_sdk_s3::error::ProvideErrorMetadata;
use aws_sdk_s3::primitives::ByteStream as S3Body;
use aws_sdk_s3::types::{Delete, ObjectCannedAcl, ObjectIdentifier, Permission};
use aws_sdk_s3::Client;
use bytes::Bytes;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use tracing::{debug, trace};

use crate::adapter::{
    now_timestamp, Adapter, ByteStream, Capabilities, Metadata, MetadataStream, Visibility,
    WriteOptions,
};
use crate::error::{FsError, Result};
use crate::path::dirname;

const ALL_USERS_GROUP: &str = "http://acs.amazonaws.com/groups/global/AllUsers";

/// Characters escaped in the `x-amz-copy-source` header
const COPY_SOURCE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'/')
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Settings for [`S3Adapter`], validated by the `awss3` connector
#[derive(Debug, Clone, Default)]
pub struct S3Options {
    pub bucket: String,
    pub region: Option<String>,
    pub endpoint: Option<String>,
    pub key: Option<String>,
    pub secret: Option<String>,
    pub prefix: Option<String>,
    pub force_path_style: bool,
}

/// S3 adapter for Amazon S3 and S3-compatible storage
pub struct S3Adapter {
    client: Client,
    bucket: String,
    prefix: String,
}

impl S3Adapter {
    /// Build a client from `options`.
    ///
    /// Static credentials are used when both key and secret are present;
    /// otherwise the default AWS provider chain is consulted.
    pub async fn new(options: S3Options) -> Result<Self> {
        let mut builder = match (&options.key, &options.secret) {
            (Some(key), Some(secret)) => {
                let credentials = Credentials::new(key, secret, None, None, "unifs-static");
                let mut builder = aws_sdk_s3::Config::builder()
                    .behavior_version(BehaviorVersion::latest())
                    .credentials_provider(credentials);
                if let Some(region) = &options.region {
                    builder = builder.region(Region::new(region.clone()));
                }
                builder
            }
            _ => {
                let mut loader = aws_config::defaults(BehaviorVersion::latest());
                if let Some(region) = &options.region {
                    loader = loader.region(Region::new(region.clone()));
                }
                let sdk_config = loader.load().await;
                aws_sdk_s3::config::Builder::from(&sdk_config)
            }
        };

        if let Some(endpoint) = &options.endpoint {
            builder = builder.endpoint_url(endpoint);
        }
        if options.force_path_style {
            builder = builder.force_path_style(true);
        }

        let prefix = options
            .prefix
            .map(|p| p.trim_matches('/').to_string())
            .unwrap_or_default();

        Ok(Self {
            client: Client::from_conf(builder.build()),
            bucket: options.bucket,
            prefix,
        })
    }

    /// Convert a normalized path to an object key
    fn path_to_key(&self, path: &str) -> String {
        if path.is_empty() {
            self.prefix.clone()
        } else if self.prefix.is_empty() {
            path.to_string()
        } else {
            format!("{}/{}", self.prefix, path)
        }
    }

    fn dir_key(&self, path: &str) -> String {
        let key = self.path_to_key(path);
        if key.is_empty() {
            key
        } else {
            format!("{}/", key)
        }
    }

    fn backend_error(op: &str, err: impl std::fmt::Display) -> FsError {
        FsError::Backend(format!("S3 {} error: {}", op, err))
    }

    async fn prefix_exists(&self, path: &str) -> Result<bool> {
        let dir_key = self.dir_key(path);
        let listing = self
            .client
            .list_objects_v2()
            .bucket(&self.bucket)
            .prefix(&dir_key)
            .max_keys(1)
            .send()
            .await
            .map_err(|e| Self::backend_error("ListObjectsV2", e.into_service_error()))?;
        Ok(listing.key_count().unwrap_or(0) > 0 || !listing.common_prefixes().is_empty())
    }

    async fn put(
        &self,
        key: &str,
        body: Bytes,
        options: &WriteOptions,
    ) -> Result<()> {
        let mut request = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(S3Body::from(body));
        if let Some(mimetype) = &options.mimetype {
            request = request.content_type(mimetype);
        }
        if let Some(visibility) = options.visibility {
            request = request.acl(canned_acl(visibility));
        }
        request
            .send()
            .await
            .map_err(|e| Self::backend_error("PutObject", e.into_service_error()))?;
        Ok(())
    }
}

fn canned_acl(visibility: Visibility) -> ObjectCannedAcl {
    match visibility {
        Visibility::Public => ObjectCannedAcl::PublicRead,
        Visibility::Private => ObjectCannedAcl::Private,
    }
}

#[async_trait]
impl Adapter for S3Adapter {
    fn name(&self) -> &str {
        "awss3"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            visibility: true,
            ..Capabilities::object_store()
        }
    }

    async fn has(&self, path: &str) -> Result<bool> {
        match self.metadata(path).await {
            Ok(_) => Ok(true),
            Err(FsError::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn read(&self, path: &str) -> Result<Bytes> {
        let key = self.path_to_key(path);
        trace!("read: path={} key={}", path, key);

        let output = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(&key)
            .send()
            .await
            .map_err(|e| {
                let service_error = e.into_service_error();
                if service_error.is_no_such_key() {
                    FsError::NotFound(path.to_string())
                } else {
                    Self::backend_error("GetObject", service_error)
                }
            })?;

        let body = output
            .body
            .collect()
            .await
            .map_err(|e| Self::backend_error("read body", e))?;
        Ok(body.into_bytes())
    }

    async fn read_stream(&self, path: &str) -> Result<ByteStream> {
        let key = self.path_to_key(path);
        trace!("read_stream: path={} key={}", path, key);

        let output = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(&key)
            .send()
            .await
            .map_err(|e| {
                let service_error = e.into_service_error();
                if service_error.is_no_such_key() {
                    FsError::NotFound(path.to_string())
                } else {
                    Self::backend_error("GetObject", service_error)
                }
            })?;

        let mut body = output.body;
        Ok(Box::pin(try_stream! {
            while let Some(chunk) = body
                .try_next()
                .await
                .map_err(|e| Self::backend_error("read body", e))?
            {
                yield chunk;
            }
        }))
    }

    async fn write(&self, path: &str, contents: Bytes, options: &WriteOptions) -> Result<Metadata> {
        let key = self.path_to_key(path);
        debug!("write: path={} key={} size={}", path, key, contents.len());

        let size = contents.len() as u64;
        self.put(&key, contents, options).await?;

        let mut meta = Metadata::file(path, size, now_timestamp()).with_mimetype(options.mimetype.clone());
        meta.visibility = options.visibility;
        Ok(meta)
    }

    async fn delete(&self, path: &str) -> Result<()> {
        let key = self.path_to_key(path);
        debug!("delete: path={} key={}", path, key);

        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(&key)
            .send()
            .await
            .map_err(|e| Self::backend_error("DeleteObject", e.into_service_error()))?;
        Ok(())
    }

    async fn delete_dir(&self, path: &str) -> Result<()> {
        let key = self.dir_key(path);
        debug!("delete_dir: path={} key={}", path, key);

        let mut continuation_token: Option<String> = None;
        loop {
            let mut request = self
                .client
                .list_objects_v2()
                .bucket(&self.bucket)
                .prefix(&key);
            if let Some(token) = continuation_token.take() {
                request = request.continuation_token(token);
            }

            let listing = request
                .send()
                .await
                .map_err(|e| Self::backend_error("ListObjectsV2", e.into_service_error()))?;

            let identifiers = listing
                .contents()
                .iter()
                .filter_map(|obj| obj.key())
                .map(|k| ObjectIdentifier::builder().key(k).build())
                .collect::<std::result::Result<Vec<_>, _>>()
                .map_err(|e| Self::backend_error("build delete", e))?;

            if !identifiers.is_empty() {
                let delete = Delete::builder()
                    .set_objects(Some(identifiers))
                    .build()
                    .map_err(|e| Self::backend_error("build delete", e))?;
                self.client
                    .delete_objects()
                    .bucket(&self.bucket)
                    .delete(delete)
                    .send()
                    .await
                    .map_err(|e| Self::backend_error("DeleteObjects", e.into_service_error()))?;
            }

            if listing.is_truncated().unwrap_or(false) {
                continuation_token = listing.next_continuation_token().map(|s| s.to_string());
            } else {
                break;
            }
        }
        Ok(())
    }

    async fn rename(&self, from: &str, to: &str) -> Result<()> {
        // No native rename; copy then delete the source
        self.copy(from, to).await?;
        self.delete(from).await
    }

    async fn copy(&self, from: &str, to: &str) -> Result<()> {
        let source_key = self.path_to_key(from);
        let dest_key = self.path_to_key(to);
        debug!("copy: from={} to={}", source_key, dest_key);

        let copy_source = format!(
            "{}/{}",
            self.bucket,
            utf8_percent_encode(&source_key, COPY_SOURCE)
        );
        self.client
            .copy_object()
            .bucket(&self.bucket)
            .key(&dest_key)
            .copy_source(copy_source)
            .send()
            .await
            .map_err(|e| {
                let service_error = e.into_service_error();
                if service_error.code() == Some("NoSuchKey") {
                    FsError::NotFound(from.to_string())
                } else {
                    Self::backend_error("CopyObject", service_error)
                }
            })?;
        Ok(())
    }

    async fn create_dir(&self, path: &str, options: &WriteOptions) -> Result<Metadata> {
        let key = self.dir_key(path);
        debug!("create_dir: path={} key={}", path, key);

        self.put(&key, Bytes::new(), options).await?;
        Ok(Metadata::directory(path, Some(now_timestamp())))
    }

    fn list_contents(&self, dir: &str, recursive: bool) -> MetadataStream {
        let prefix = self.dir_key(dir);
        let root = self.dir_key("");
        let client = self.client.clone();
        let bucket = self.bucket.clone();
        let dir = dir.to_string();

        Box::pin(try_stream! {
            let mut continuation_token: Option<String> = None;
            let mut seen_dirs: BTreeSet<String> = BTreeSet::new();

            loop {
                let mut request = client.list_objects_v2().bucket(&bucket).prefix(&prefix);
                if !recursive {
                    request = request.delimiter("/");
                }
                if let Some(token) = continuation_token.take() {
                    request = request.continuation_token(token);
                }

                let result = request.send().await.map_err(|e| {
                    FsError::Backend(format!(
                        "S3 ListObjectsV2 error: {}",
                        e.into_service_error()
                    ))
                })?;

                for obj in result.contents() {
                    let Some(key) = obj.key() else { continue };
                    if key == prefix {
                        continue;
                    }
                    let rel = key.strip_prefix(&root).unwrap_or(key);

                    // Emit implied parent directories for recursive listings
                    let mut parent = dirname(rel.trim_end_matches('/')).to_string();
                    let mut parents = Vec::new();
                    while parent.len() > dir.len() && seen_dirs.insert(parent.clone()) {
                        parents.push(parent.clone());
                        parent = dirname(&parent).to_string();
                    }
                    for implied in parents.into_iter().rev() {
                        yield Metadata::directory(implied, None);
                    }

                    if let Some(marker) = rel.strip_suffix('/') {
                        if seen_dirs.insert(marker.to_string()) {
                            yield Metadata::directory(marker, None);
                        }
                        continue;
                    }

                    let timestamp = obj
                        .last_modified()
                        .map(|dt| dt.secs())
                        .unwrap_or_else(now_timestamp);
                    let size = obj.size().unwrap_or(0).max(0) as u64;
                    yield Metadata::file(rel, size, timestamp);
                }

                for common_prefix in result.common_prefixes() {
                    let Some(p) = common_prefix.prefix() else { continue };
                    let rel = p.strip_prefix(&root).unwrap_or(p).trim_end_matches('/');
                    if !rel.is_empty() && seen_dirs.insert(rel.to_string()) {
                        yield Metadata::directory(rel, None);
                    }
                }

                if result.is_truncated().unwrap_or(false) {
                    continuation_token = result.next_continuation_token().map(|s| s.to_string());
                } else {
                    break;
                }
            }
        })
    }

    async fn metadata(&self, path: &str) -> Result<Metadata> {
        let key = self.path_to_key(path);
        trace!("metadata: path={} key={}", path, key);

        if path.is_empty() {
            return Ok(Metadata::directory(path, None));
        }

        let head = self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(&key)
            .send()
            .await;

        match head {
            Ok(output) => {
                let size = output.content_length().unwrap_or(0).max(0) as u64;
                let timestamp = output
                    .last_modified()
                    .map(|dt| dt.secs())
                    .unwrap_or_else(now_timestamp);
                return Ok(Metadata::file(path, size, timestamp)
                    .with_mimetype(output.content_type().map(|s| s.to_string())));
            }
            Err(e) => {
                let service_error = e.into_service_error();
                if !service_error.is_not_found() {
                    return Err(Self::backend_error("HeadObject", service_error));
                }
            }
        }

        if self.prefix_exists(path).await? {
            return Ok(Metadata::directory(path, None));
        }
        Err(FsError::NotFound(path.to_string()))
    }

    async fn visibility(&self, path: &str) -> Result<Visibility> {
        let key = self.path_to_key(path);
        let acl = self
            .client
            .get_object_acl()
            .bucket(&self.bucket)
            .key(&key)
            .send()
            .await
            .map_err(|e| Self::backend_error("GetObjectAcl", e.into_service_error()))?;

        let public = acl.grants().iter().any(|grant| {
            let everyone = grant
                .grantee()
                .and_then(|g| g.uri())
                .map(|uri| uri == ALL_USERS_GROUP)
                .unwrap_or(false);
            everyone && grant.permission() == Some(&Permission::Read)
        });
        Ok(if public {
            Visibility::Public
        } else {
            Visibility::Private
        })
    }

    async fn set_visibility(&self, path: &str, visibility: Visibility) -> Result<()> {
        let key = self.path_to_key(path);
        debug!("set_visibility: path={} key={} visibility={}", path, key, visibility.as_str());

        self.client
            .put_object_acl()
            .bucket(&self.bucket)
            .key(&key)
            .acl(canned_acl(visibility))
            .send()
            .await
            .map_err(|e| Self::backend_error("PutObjectAcl", e.into_service_error()))?;
        Ok(())
    }

    fn path_prefix(&self) -> &str {
        &self.prefix
    }
}
