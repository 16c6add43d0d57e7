//! Error types and handling
//!
//! `AppError` collects the subsystem errors; `ErrorResponse` is the shape
//! handed to the frontend.

use crate::api::{GraphqlError, InviteError, TransportError, UploadError};
use crate::capture::CaptureError;
use crate::config::ConfigError;
use crate::recorder::{RecorderError, TransitionError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Application-wide error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Capture(#[from] CaptureError),

    #[error(transparent)]
    Recorder(#[from] RecorderError),

    #[error(transparent)]
    Upload(#[from] UploadError),

    #[error(transparent)]
    Invite(#[from] InviteError),

    #[error(transparent)]
    Graphql(#[from] GraphqlError),

    #[error("No invite ID provided. Please check your invite link.")]
    InvalidInvite,

    #[error("Upload for invite {0} belongs to a page that is no longer open")]
    StaleUpload(String),
}

impl AppError {
    /// Stable code for the frontend
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Io(_) => "IO_ERROR",
            AppError::Serialization(_) => "SERIALIZATION_ERROR",
            AppError::Config(_) => "CONFIG_ERROR",
            AppError::Capture(e) => capture_code(e),
            AppError::Recorder(e) => match e {
                RecorderError::Capture(e) => capture_code(e),
                RecorderError::Upload(e) => upload_code(e),
                RecorderError::Transition(TransitionError::Disabled) => "RECORDER_DISABLED",
                RecorderError::Transition(TransitionError::CaptureNotReady) => "CAPTURE_NOT_READY",
                RecorderError::Transition(_) => "INVALID_STATE",
                RecorderError::NoClip => "NO_CLIP",
            },
            AppError::Upload(e) => upload_code(e),
            AppError::Invite(e) => match e {
                InviteError::InvalidInvite => "INVALID_INVITE",
                InviteError::NotFound(_) => "NOT_FOUND",
                InviteError::AlreadyExists(_) => "ALREADY_EXISTS",
                InviteError::EmptyTag => "EMPTY_TAG",
                InviteError::Graphql(e) => graphql_code(e),
            },
            AppError::Graphql(e) => graphql_code(e),
            AppError::InvalidInvite => "INVALID_INVITE",
            AppError::StaleUpload(_) => "STALE_UPLOAD",
        }
    }
}

fn capture_code(error: &CaptureError) -> &'static str {
    match error {
        CaptureError::PermissionDenied(_) => "PERMISSION_DENIED",
        CaptureError::DeviceUnavailable(_) => "DEVICE_UNAVAILABLE",
        CaptureError::EncoderNotActive => "ENCODER_NOT_ACTIVE",
        CaptureError::EncoderAlreadyActive => "ENCODER_ALREADY_ACTIVE",
        CaptureError::StreamNotAcquired => "STREAM_NOT_ACQUIRED",
        CaptureError::Encoder(_) => "ENCODER_ERROR",
    }
}

fn upload_code(error: &UploadError) -> &'static str {
    match error {
        UploadError::InvalidInvite => "INVALID_INVITE",
        UploadError::NetworkError(_) => "NETWORK_ERROR",
        UploadError::ServerRejected { .. } => "SERVER_REJECTED",
        UploadError::File(_) => "FILE_ERROR",
    }
}

fn graphql_code(error: &GraphqlError) -> &'static str {
    match error {
        GraphqlError::Transport(TransportError::Timeout { .. })
        | GraphqlError::Transport(TransportError::Connect { .. })
        | GraphqlError::Transport(TransportError::Other(_)) => "NETWORK_ERROR",
        GraphqlError::Status { .. } => "SERVER_REJECTED",
        GraphqlError::Decode(_) => "BAD_RESPONSE",
        GraphqlError::Server(_) => "GRAPHQL_ERROR",
    }
}

/// Error response for frontend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
}

impl From<AppError> for ErrorResponse {
    fn from(error: AppError) -> Self {
        ErrorResponse {
            code: error.code().to_string(),
            message: error.to_string(),
        }
    }
}

impl std::fmt::Display for ErrorResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

/// Result type alias using AppError
pub type AppResult<T> = Result<T, AppError>;
