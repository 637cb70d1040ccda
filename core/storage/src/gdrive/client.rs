//! Google Drive API client.

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::{header, redirect, Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tokio_util::io::ReaderStream;
use uuid::Uuid;

use driveup_common::{Error, Result};

use super::auth::{Credentials, TokenManager};

/// Google Drive API base URL.
const DRIVE_API_BASE: &str = "https://www.googleapis.com/drive/v3";
/// Google Drive upload API base URL.
const DRIVE_UPLOAD_BASE: &str = "https://www.googleapis.com/upload/drive/v3";

/// MIME type Drive uses for folders.
pub const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";

/// Fields requested for every file resource.
const FILE_FIELDS: &str = "id,name,mimeType,parents";

/// Files above this size go through a resumable session.
const SIMPLE_UPLOAD_LIMIT: u64 = 5 * 1024 * 1024;

/// Chunk size for resumable uploads (must be a multiple of 256KB).
const CHUNK_SIZE: usize = 256 * 1024;

/// Folder lookups request one page only; a second hit flags a name collision.
const FOLDER_LOOKUP_PAGE_SIZE: &str = "10";

/// Google Drive file metadata from API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriveFile {
    /// File ID.
    pub id: String,
    /// File name.
    pub name: String,
    /// MIME type.
    #[serde(default)]
    pub mime_type: String,
    /// Parent folder IDs.
    #[serde(default)]
    pub parents: Vec<String>,
}

impl DriveFile {
    /// Check if this is a folder.
    pub fn is_folder(&self) -> bool {
        self.mime_type == FOLDER_MIME_TYPE
    }
}

/// Response from listing files.
#[derive(Debug, Deserialize)]
struct FileListResponse {
    #[serde(default)]
    files: Vec<DriveFile>,
}

/// The three Drive calls an upload is built from.
#[async_trait]
pub trait DriveApi: Send + Sync {
    /// List non-trashed folders named exactly `name` directly under
    /// `parent_id`, in the order the service returns them.
    async fn find_folders(&self, name: &str, parent_id: &str) -> Result<Vec<DriveFile>>;

    /// Create a folder under `parent_id`.
    async fn create_folder(&self, name: &str, parent_id: &str) -> Result<DriveFile>;

    /// Upload `local_path` as a new file under `parent_id`.
    async fn create_file(&self, name: &str, parent_id: &str, local_path: &Path)
        -> Result<DriveFile>;
}

/// Escape a value for use inside a single-quoted Drive query literal.
pub fn escape_query_literal(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}

/// Build the query selecting folders by exact name under a parent.
pub fn folder_query(name: &str, parent_id: &str) -> String {
    format!(
        "name = '{}' and '{}' in parents and mimeType = '{}' and trashed = false",
        escape_query_literal(name),
        escape_query_literal(parent_id),
        FOLDER_MIME_TYPE
    )
}

/// Google Drive API client over HTTPS.
pub struct DriveClient {
    http: Client,
    token_manager: Arc<TokenManager>,
}

impl DriveClient {
    /// Create a new Drive client. Issues no requests.
    pub fn new(credentials: Credentials) -> Result<Self> {
        let http = Client::builder()
            .user_agent(concat!("driveup/", env!("CARGO_PKG_VERSION")))
            // Resumable uploads answer 308 without a Location to follow
            .redirect(redirect::Policy::none())
            .build()
            .map_err(|e| Error::Network(format!("Failed to create HTTP client: {}", e)))?;

        let token_manager = Arc::new(TokenManager::new(credentials, http.clone()));

        Ok(Self {
            http,
            token_manager,
        })
    }

    async fn auth_header(&self) -> Result<String> {
        let token = self.token_manager.access_token().await?;
        Ok(format!("Bearer {}", token))
    }

    /// Upload a small file in a single multipart request.
    async fn upload_simple(&self, name: &str, parent_id: &str, data: Vec<u8>) -> Result<DriveFile> {
        let url = format!("{}/files", DRIVE_UPLOAD_BASE);
        let auth = self.auth_header().await?;

        let metadata = serde_json::json!({
            "name": name,
            "parents": [parent_id]
        });
        let metadata_json = serde_json::to_string(&metadata)?;

        let boundary = format!("driveup-{}", Uuid::new_v4().simple());
        let mut body = Vec::with_capacity(data.len() + metadata_json.len() + 256);

        // Metadata part
        body.extend_from_slice(format!("--{}\r\n", boundary).as_bytes());
        body.extend_from_slice(b"Content-Type: application/json; charset=UTF-8\r\n\r\n");
        body.extend_from_slice(metadata_json.as_bytes());
        body.extend_from_slice(b"\r\n");

        // Media part
        body.extend_from_slice(format!("--{}\r\n", boundary).as_bytes());
        body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
        body.extend_from_slice(&data);
        body.extend_from_slice(b"\r\n");

        body.extend_from_slice(format!("--{}--", boundary).as_bytes());

        let response = self
            .http
            .post(&url)
            .header(header::AUTHORIZATION, auth)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/related; boundary={}", boundary),
            )
            .query(&[("uploadType", "multipart"), ("fields", FILE_FIELDS)])
            .body(body)
            .send()
            .await
            .map_err(|e| Error::Network(format!("Failed to upload file: {}", e)))?;

        handle_response(response).await
    }

    /// Start a resumable upload session and return its URI.
    async fn start_resumable_upload(
        &self,
        name: &str,
        parent_id: &str,
        total_size: u64,
    ) -> Result<String> {
        let url = format!("{}/files", DRIVE_UPLOAD_BASE);
        let auth = self.auth_header().await?;

        let metadata = serde_json::json!({
            "name": name,
            "parents": [parent_id]
        });

        let response = self
            .http
            .post(&url)
            .header(header::AUTHORIZATION, auth)
            .header("X-Upload-Content-Length", total_size.to_string())
            .query(&[("uploadType", "resumable"), ("fields", FILE_FIELDS)])
            .json(&metadata)
            .send()
            .await
            .map_err(|e| Error::Network(format!("Failed to start resumable upload: {}", e)))?;

        if !response.status().is_success() {
            return Err(status_error(response).await);
        }

        let upload_uri = response
            .headers()
            .get(header::LOCATION)
            .ok_or_else(|| Error::Network("No upload URI in response".to_string()))?
            .to_str()
            .map_err(|e| Error::Network(format!("Invalid upload URI: {}", e)))?
            .to_string();

        Ok(upload_uri)
    }

    /// Upload one chunk of a resumable session.
    async fn upload_chunk(
        &self,
        upload_uri: &str,
        data: Vec<u8>,
        range: ChunkRange,
        total_size: u64,
    ) -> Result<ChunkOutcome> {
        let response = self
            .http
            .put(upload_uri)
            .header(header::CONTENT_LENGTH, data.len().to_string())
            .header(header::CONTENT_RANGE, range.content_range(total_size))
            .body(data)
            .send()
            .await
            .map_err(|e| Error::Network(format!("Failed to upload chunk: {}", e)))?;

        match response.status() {
            StatusCode::OK | StatusCode::CREATED => {
                let file = response
                    .json()
                    .await
                    .map_err(|e| Error::Network(format!("Failed to parse upload response: {}", e)))?;
                Ok(ChunkOutcome::Complete(file))
            }
            // 308 Resume Incomplete
            StatusCode::PERMANENT_REDIRECT => {
                let range_header = response
                    .headers()
                    .get(header::RANGE)
                    .map(|v| v.to_str().unwrap_or_default());
                Ok(ChunkOutcome::Incomplete(committed_bytes(range_header)?))
            }
            _ => Err(status_error(response).await),
        }
    }

    /// Stream a large file from disk through a resumable session.
    async fn upload_resumable(
        &self,
        name: &str,
        parent_id: &str,
        local_path: &Path,
        total_size: u64,
    ) -> Result<DriveFile> {
        let upload_uri = self
            .start_resumable_upload(name, parent_id, total_size)
            .await?;

        let file = tokio::fs::File::open(local_path).await?;
        let mut stream = ReaderStream::with_capacity(file, CHUNK_SIZE);
        let mut buffer = Vec::with_capacity(CHUNK_SIZE);

        for range in chunk_ranges(total_size) {
            while (buffer.len() as u64) < range.len {
                match stream.next().await {
                    Some(chunk) => buffer.extend_from_slice(&chunk?),
                    None => {
                        return Err(Error::InvalidInput(format!(
                            "{} shrank during upload",
                            local_path.display()
                        )))
                    }
                }
            }

            let data: Vec<u8> = buffer.drain(..range.len as usize).collect();
            match self
                .upload_chunk(&upload_uri, data, range, total_size)
                .await?
            {
                ChunkOutcome::Complete(file) => return Ok(file),
                // No partial-failure recovery: the server must keep every byte sent
                ChunkOutcome::Incomplete(committed) if committed != range.end_exclusive() => {
                    return Err(Error::Network(format!(
                        "Upload of {} stalled: server kept {} of {} bytes sent",
                        local_path.display(),
                        committed,
                        range.end_exclusive()
                    )));
                }
                ChunkOutcome::Incomplete(_) => {}
            }
        }

        Err(Error::Network(format!(
            "Upload of {} did not complete after {} bytes",
            local_path.display(),
            total_size
        )))
    }
}

/// Byte range of one resumable-upload chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ChunkRange {
    pub start: u64,
    pub len: u64,
}

impl ChunkRange {
    fn end_exclusive(&self) -> u64 {
        self.start + self.len
    }

    /// `Content-Range` header value for this chunk.
    pub(crate) fn content_range(&self, total_size: u64) -> String {
        format!(
            "bytes {}-{}/{}",
            self.start,
            self.end_exclusive() - 1,
            total_size
        )
    }
}

/// Split `total_size` bytes into `CHUNK_SIZE` chunks, the last one short.
pub(crate) fn chunk_ranges(total_size: u64) -> Vec<ChunkRange> {
    let chunk = CHUNK_SIZE as u64;
    (0..total_size)
        .step_by(CHUNK_SIZE)
        .map(|start| ChunkRange {
            start,
            len: chunk.min(total_size - start),
        })
        .collect()
}

enum ChunkOutcome {
    Complete(DriveFile),
    /// Bytes the server has stored so far.
    Incomplete(u64),
}

/// Parse the `Range` header of a 308 response into a committed byte count.
///
/// An absent header means nothing has been stored yet.
fn committed_bytes(range_header: Option<&str>) -> Result<u64> {
    let Some(value) = range_header else {
        return Ok(0);
    };

    value
        .strip_prefix("bytes=0-")
        .and_then(|end| end.trim().parse::<u64>().ok())
        .map(|last| last + 1)
        .ok_or_else(|| Error::Network(format!("Malformed Range header: {}", value)))
}

#[async_trait]
impl DriveApi for DriveClient {
    async fn find_folders(&self, name: &str, parent_id: &str) -> Result<Vec<DriveFile>> {
        let url = format!("{}/files", DRIVE_API_BASE);
        let auth = self.auth_header().await?;
        let query = folder_query(name, parent_id);
        let fields = format!("files({})", FILE_FIELDS);

        let response = self
            .http
            .get(&url)
            .header(header::AUTHORIZATION, auth)
            .query(&[
                ("q", query.as_str()),
                ("fields", fields.as_str()),
                ("pageSize", FOLDER_LOOKUP_PAGE_SIZE),
            ])
            .send()
            .await
            .map_err(|e| Error::Network(format!("Failed to list folders: {}", e)))?;

        let list: FileListResponse = handle_response(response).await?;
        Ok(list.files)
    }

    async fn create_folder(&self, name: &str, parent_id: &str) -> Result<DriveFile> {
        let url = format!("{}/files", DRIVE_API_BASE);
        let auth = self.auth_header().await?;

        let metadata = serde_json::json!({
            "name": name,
            "mimeType": FOLDER_MIME_TYPE,
            "parents": [parent_id]
        });

        let response = self
            .http
            .post(&url)
            .header(header::AUTHORIZATION, auth)
            .query(&[("fields", FILE_FIELDS)])
            .json(&metadata)
            .send()
            .await
            .map_err(|e| Error::Network(format!("Failed to create folder: {}", e)))?;

        handle_response(response).await
    }

    async fn create_file(
        &self,
        name: &str,
        parent_id: &str,
        local_path: &Path,
    ) -> Result<DriveFile> {
        let total_size = tokio::fs::metadata(local_path).await?.len();

        if total_size > SIMPLE_UPLOAD_LIMIT {
            self.upload_resumable(name, parent_id, local_path, total_size)
                .await
        } else {
            let data = tokio::fs::read(local_path).await?;
            self.upload_simple(name, parent_id, data).await
        }
    }
}

/// Map a non-success response to an error, keeping the body for context.
async fn status_error(response: reqwest::Response) -> Error {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    match status {
        StatusCode::NOT_FOUND => Error::NotFound(format!("Resource not found: {}", body)),
        StatusCode::UNAUTHORIZED => {
            Error::Authentication(format!("Invalid or expired token: {}", body))
        }
        StatusCode::FORBIDDEN => Error::PermissionDenied(format!("Access denied: {}", body)),
        _ => Error::Network(format!("API error: {} - {}", status, body)),
    }
}

/// Handle API response with error checking.
async fn handle_response<T: serde::de::DeserializeOwned>(response: reqwest::Response) -> Result<T> {
    if response.status().is_success() {
        response
            .json()
            .await
            .map_err(|e| Error::Network(format!("Failed to parse response: {}", e)))
    } else {
        Err(status_error(response).await)
    }
}
