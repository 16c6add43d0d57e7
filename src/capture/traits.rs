//! Capture trait definitions
//!
//! Platform-agnostic seams for camera/microphone acquisition and encoding.
//! The recorder only ever talks to these traits, so tests and other hosts can
//! substitute their own devices.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;

/// Capture-related errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CaptureError {
    #[error("Camera or microphone access was denied: {0}. Allow access in your system settings and try again.")]
    PermissionDenied(String),

    #[error("No usable camera or microphone: {0}. Connect a device and try again.")]
    DeviceUnavailable(String),

    #[error("The recorder is not currently encoding")]
    EncoderNotActive,

    #[error("The recorder is already encoding")]
    EncoderAlreadyActive,

    #[error("No media stream has been acquired")]
    StreamNotAcquired,

    #[error("Encoder failure: {0}")]
    Encoder(String),
}

pub type CaptureResult<T> = Result<T, CaptureError>;

/// Which tracks to request from the devices
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaConstraints {
    pub video: bool,
    pub audio: bool,
}

impl Default for MediaConstraints {
    fn default() -> Self {
        Self {
            video: true,
            audio: true,
        }
    }
}

/// Describes a live stream, enough for the frontend to bind a preview
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamInfo {
    /// Unique stream ID
    pub id: String,

    /// Label of the video track, if one was acquired
    pub video_label: Option<String>,

    /// Label of the audio track, if one was acquired
    pub audio_label: Option<String>,
}

/// Information about an audio device
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioDeviceInfo {
    /// Unique device ID
    pub id: String,

    /// Device name
    pub name: String,

    /// Whether this is the default device
    pub is_default: bool,
}

/// Information about a camera/webcam
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CameraInfo {
    /// Unique device ID
    pub id: String,

    /// Device name
    pub name: String,
}

/// Receiving end of an encoder's chunk sequence
pub type ChunkReceiver = mpsc::UnboundedReceiver<Vec<u8>>;

/// Sending end handed to an encoder. Chunks must be sent in production
/// order; dropping the sender ends the sequence.
pub type ChunkSink = mpsc::UnboundedSender<Vec<u8>>;

/// Entry point for acquiring camera + microphone streams
#[async_trait]
pub trait MediaDevices: Send + Sync {
    /// Acquire a live audiovisual stream
    async fn acquire(&self, constraints: MediaConstraints) -> CaptureResult<Box<dyn MediaStream>>;
}

/// A live stream owned by the capture layer
#[async_trait]
pub trait MediaStream: Send + Sync {
    fn info(&self) -> &StreamInfo;

    fn is_live(&self) -> bool;

    /// Begin encoding the stream. Encoded chunks go to `sink` in order.
    async fn start_encoder(
        &mut self,
        mime_type: &str,
        sink: ChunkSink,
    ) -> CaptureResult<Box<dyn EncoderHandle>>;

    /// Stop all tracks. The stream cannot be reused afterwards.
    fn release(&mut self);
}

/// Control handle for a running encoder
#[async_trait]
pub trait EncoderHandle: Send + Sync {
    /// Ask the encoder to flush and finish. Returns once every chunk has
    /// been handed to the sink and the sink has been dropped.
    async fn finish(self: Box<Self>) -> CaptureResult<()>;

    /// Drop the encoder without waiting for trailing output
    fn abandon(self: Box<Self>);
}
