//! Dropbox adapter speaking the HTTP API v2 directly.

use async_trait::async_trait;
use async_stream::try_stream;
use bytes::Bytes;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, trace};

use crate::adapter::{
    now_timestamp, Adapter, Capabilities, Metadata, MetadataStream, WriteOptions,
};
use crate::error::{FsError, Result};

const API_URL: &str = "https://api.dropboxapi.com/2";
const CONTENT_URL: &str = "https://content.dropboxapi.com/2";

/// One entry of a `get_metadata` or `list_folder` response
#[derive(Debug, Deserialize)]
struct DropboxEntry {
    #[serde(rename = ".tag")]
    tag: String,
    path_display: Option<String>,
    size: Option<u64>,
    server_modified: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ListFolderResponse {
    entries: Vec<DropboxEntry>,
    cursor: String,
    has_more: bool,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    error_summary: String,
}

/// Dropbox adapter authenticated by a long-lived access token
pub struct DropboxAdapter {
    client: reqwest::Client,
    token: String,
    prefix: String,
}

impl DropboxAdapter {
    pub fn new(token: impl Into<String>, prefix: Option<&str>) -> Self {
        Self {
            client: reqwest::Client::new(),
            token: token.into(),
            prefix: prefix.unwrap_or_default().trim_matches('/').to_string(),
        }
    }

    /// Dropbox addresses the root as `""` and everything else with a
    /// leading slash.
    fn api_path(&self, path: &str) -> String {
        api_path(&self.prefix, path)
    }

    fn relative(&self, path_display: &str) -> String {
        relative(&self.prefix, path_display)
    }

    fn to_metadata(&self, entry: &DropboxEntry) -> Metadata {
        let path = entry
            .path_display
            .as_deref()
            .map(|p| self.relative(p))
            .unwrap_or_default();
        let timestamp = entry
            .server_modified
            .as_deref()
            .and_then(|t| chrono::DateTime::parse_from_rfc3339(t).ok())
            .map(|t| t.timestamp());

        if entry.tag == "folder" {
            Metadata::directory(path, timestamp)
        } else {
            Metadata::file(path, entry.size.unwrap_or(0), timestamp.unwrap_or_else(now_timestamp))
        }
    }

    async fn rpc(&self, endpoint: &str, body: Value, path: &str) -> Result<Value> {
        trace!("rpc: endpoint={} path={}", endpoint, path);
        let response = self
            .client
            .post(format!("{}/{}", API_URL, endpoint))
            .bearer_auth(&self.token)
            .json(&body)
            .send()
            .await
            .map_err(|e| FsError::Backend(format!("Dropbox {} request failed: {}", endpoint, e)))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| FsError::Backend(format!("Dropbox {} response failed: {}", endpoint, e)))?;
        if !status.is_success() {
            return Err(api_error(endpoint, status.as_u16(), &text, path));
        }
        serde_json::from_str(&text)
            .map_err(|e| FsError::Backend(format!("Dropbox {} returned invalid JSON: {}", endpoint, e)))
    }

    async fn list_page(&self, endpoint: &str, body: Value, dir: &str) -> Result<ListFolderResponse> {
        let value = self.rpc(endpoint, body, dir).await?;
        serde_json::from_value(value)
            .map_err(|e| FsError::Backend(format!("Dropbox {} returned unexpected data: {}", endpoint, e)))
    }
}

fn api_path(prefix: &str, path: &str) -> String {
    match (prefix.is_empty(), path.is_empty()) {
        (true, true) => String::new(),
        (true, false) => format!("/{}", path),
        (false, true) => format!("/{}", prefix),
        (false, false) => format!("/{}/{}", prefix, path),
    }
}

fn relative(prefix: &str, path_display: &str) -> String {
    let trimmed = path_display.trim_start_matches('/');
    if prefix.is_empty() {
        return trimmed.to_string();
    }
    trimmed
        .strip_prefix(prefix)
        .map(|rest| rest.trim_start_matches('/'))
        .unwrap_or(trimmed)
        .to_string()
}

/// Dropbox reports missing paths as HTTP 409 with a `not_found` summary
fn api_error(endpoint: &str, status: u16, body: &str, path: &str) -> FsError {
    let summary = serde_json::from_str::<ApiError>(body)
        .map(|e| e.error_summary)
        .unwrap_or_else(|_| body.to_string());
    if status == 409 && summary.contains("not_found") {
        FsError::NotFound(path.to_string())
    } else if status == 409 && summary.contains("conflict") {
        FsError::AlreadyExists(path.to_string())
    } else if status == 401 || status == 403 {
        FsError::PermissionDenied(format!("Dropbox {}: {}", endpoint, summary))
    } else {
        FsError::Backend(format!("Dropbox {} failed ({}): {}", endpoint, status, summary))
    }
}

#[async_trait]
impl Adapter for DropboxAdapter {
    fn name(&self) -> &str {
        "dropbox"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            atomic_rename: true,
            real_directories: true,
            ..Capabilities::object_store()
        }
    }

    async fn read(&self, path: &str) -> Result<Bytes> {
        trace!("read: path={}", path);
        let arg = json!({ "path": self.api_path(path) }).to_string();
        let response = self
            .client
            .post(format!("{}/files/download", CONTENT_URL))
            .bearer_auth(&self.token)
            .header("Dropbox-API-Arg", arg)
            .send()
            .await
            .map_err(|e| FsError::Backend(format!("Dropbox download request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(api_error("files/download", status.as_u16(), &text, path));
        }
        response
            .bytes()
            .await
            .map_err(|e| FsError::Backend(format!("Dropbox download failed: {}", e)))
    }

    async fn write(&self, path: &str, contents: Bytes, _options: &WriteOptions) -> Result<Metadata> {
        debug!("write: path={} size={}", path, contents.len());
        let arg = json!({ "path": self.api_path(path), "mode": "overwrite", "mute": true }).to_string();
        let response = self
            .client
            .post(format!("{}/files/upload", CONTENT_URL))
            .bearer_auth(&self.token)
            .header("Dropbox-API-Arg", arg)
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .body(contents)
            .send()
            .await
            .map_err(|e| FsError::Backend(format!("Dropbox upload request failed: {}", e)))?;

        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(api_error("files/upload", status.as_u16(), &text, path));
        }
        let entry: DropboxEntry = serde_json::from_str(&text)
            .map_err(|e| FsError::Backend(format!("Dropbox upload returned unexpected data: {}", e)))?;
        Ok(self.to_metadata(&entry))
    }

    async fn delete(&self, path: &str) -> Result<()> {
        debug!("delete: path={}", path);
        self.rpc("files/delete_v2", json!({ "path": self.api_path(path) }), path)
            .await
            .map(|_| ())
    }

    async fn delete_dir(&self, path: &str) -> Result<()> {
        self.delete(path).await
    }

    async fn rename(&self, from: &str, to: &str) -> Result<()> {
        debug!("rename: from={} to={}", from, to);
        let body = json!({ "from_path": self.api_path(from), "to_path": self.api_path(to) });
        self.rpc("files/move_v2", body, from).await.map(|_| ())
    }

    async fn copy(&self, from: &str, to: &str) -> Result<()> {
        debug!("copy: from={} to={}", from, to);
        let body = json!({ "from_path": self.api_path(from), "to_path": self.api_path(to) });
        self.rpc("files/copy_v2", body, from).await.map(|_| ())
    }

    async fn create_dir(&self, path: &str, _options: &WriteOptions) -> Result<Metadata> {
        debug!("create_dir: path={}", path);
        match self
            .rpc("files/create_folder_v2", json!({ "path": self.api_path(path) }), path)
            .await
        {
            Ok(_) | Err(FsError::AlreadyExists(_)) => Ok(Metadata::directory(path, Some(now_timestamp()))),
            Err(e) => Err(e),
        }
    }

    fn list_contents(&self, dir: &str, recursive: bool) -> MetadataStream {
        let dir = dir.to_string();
        let adapter = DropboxAdapter {
            client: self.client.clone(),
            token: self.token.clone(),
            prefix: self.prefix.clone(),
        };

        Box::pin(try_stream! {
            let first = adapter
                .list_page(
                    "files/list_folder",
                    json!({ "path": adapter.api_path(&dir), "recursive": recursive }),
                    &dir,
                )
                .await;
            let mut page = match first {
                Ok(page) => page,
                Err(FsError::NotFound(_)) => ListFolderResponse { entries: Vec::new(), cursor: String::new(), has_more: false },
                Err(e) => Err(e)?,
            };

            loop {
                for entry in &page.entries {
                    if entry.tag == "deleted" {
                        continue;
                    }
                    let meta = adapter.to_metadata(entry);
                    // Recursive listings include the folder itself
                    if meta.path == dir {
                        continue;
                    }
                    yield meta;
                }
                if !page.has_more {
                    break;
                }
                page = adapter
                    .list_page("files/list_folder/continue", json!({ "cursor": page.cursor }), &dir)
                    .await?;
            }
        })
    }

    async fn metadata(&self, path: &str) -> Result<Metadata> {
        if path.is_empty() {
            return Ok(Metadata::directory(path, None));
        }
        let value = self
            .rpc("files/get_metadata", json!({ "path": self.api_path(path) }), path)
            .await?;
        let entry: DropboxEntry = serde_json::from_value(value)
            .map_err(|e| FsError::Backend(format!("Dropbox get_metadata returned unexpected data: {}", e)))?;
        Ok(self.to_metadata(&entry))
    }

    fn path_prefix(&self) -> &str {
        &self.prefix
    }
}
