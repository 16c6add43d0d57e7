//! Clip upload
//!
//! `POST {api_base}/upload/{invite_id}` with the clip in the multipart field
//! `file`. Failures are reported to the caller and never retried here.

use super::transport::{FormPart, HttpRequest, HttpTransport, TransportError};
use crate::capture::Clip;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Upload errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UploadError {
    #[error("Invalid invite ID")]
    InvalidInvite,

    #[error("Upload failed: {0}")]
    NetworkError(#[from] TransportError),

    #[error("Upload failed (HTTP {status}): {body}")]
    ServerRejected { status: u16, body: String },

    #[error("Could not read video file: {0}")]
    File(String),
}

/// Server acknowledgement of an upload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadAck {
    #[serde(default = "default_status")]
    pub status: String,
    #[serde(default)]
    pub video_url: Option<String>,
}

fn default_status() -> String {
    "uploaded".to_string()
}

impl Default for UploadAck {
    fn default() -> Self {
        Self {
            status: default_status(),
            video_url: None,
        }
    }
}

/// Sends finished clips to the screening API
#[derive(Clone)]
pub struct UploadClient {
    transport: Arc<dyn HttpTransport>,
    api_base: String,
    timeout: Duration,
}

impl UploadClient {
    pub fn new(transport: Arc<dyn HttpTransport>, api_base: &str, timeout: Duration) -> Self {
        Self {
            transport,
            api_base: api_base.trim_end_matches('/').to_string(),
            timeout,
        }
    }

    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    /// Endpoint for an invite; the id is percent-encoded as one path segment
    pub fn upload_url(&self, invite_id: &str) -> String {
        format!("{}/upload/{}", self.api_base, urlencoding::encode(invite_id))
    }

    /// Upload a clip, consuming it
    pub async fn upload(&self, clip: Clip, invite_id: &str) -> Result<UploadAck, UploadError> {
        let file_name = format!("{}.{}", urlencoding::encode(invite_id.trim()), clip.extension());
        let content_type = clip.mime_type().to_string();
        self.send(invite_id, file_name, content_type, clip.bytes().into())
            .await
    }

    /// Upload a video file picked from disk
    pub async fn upload_file(&self, path: &Path, invite_id: &str) -> Result<UploadAck, UploadError> {
        let data = tokio::fs::read(path)
            .await
            .map_err(|e| UploadError::File(format!("{}: {e}", path.display())))?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| format!("{}.webm", urlencoding::encode(invite_id.trim())));
        let content_type = mime_for_path(path).to_string();
        self.send(invite_id, file_name, content_type, data.into()).await
    }

    async fn send(
        &self,
        invite_id: &str,
        file_name: String,
        content_type: String,
        data: Arc<[u8]>,
    ) -> Result<UploadAck, UploadError> {
        let invite_id = invite_id.trim();
        if invite_id.is_empty() {
            return Err(UploadError::InvalidInvite);
        }

        let url = self.upload_url(invite_id);
        let size = data.len();
        let request = HttpRequest::post_multipart(
            url.clone(),
            vec![FormPart {
                name: "file".to_string(),
                file_name: Some(file_name),
                content_type: Some(content_type),
                data,
            }],
        )
        .with_timeout(self.timeout);

        tracing::info!("Uploading {} bytes to {}", size, url);
        let response = self.transport.send(request).await?;

        if !response.is_success() {
            let text = response.text();
            let body = if text.trim().is_empty() {
                response.reason.clone().unwrap_or_default()
            } else {
                text
            };
            tracing::warn!("Upload to {} rejected with {}: {}", url, response.status, body);
            return Err(UploadError::ServerRejected {
                status: response.status,
                body,
            });
        }

        let ack = serde_json::from_slice::<UploadAck>(&response.body).unwrap_or_default();
        tracing::info!("Upload to {} accepted ({})", url, ack.status);
        Ok(ack)
    }
}

fn mime_for_path(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .as_deref()
    {
        Some("webm") => "video/webm",
        Some("mp4") | Some("m4v") => "video/mp4",
        Some("mov") => "video/quicktime",
        Some("mkv") => "video/x-matroska",
        _ => "application/octet-stream",
    }
}
