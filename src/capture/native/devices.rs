//! Native device discovery
//!
//! Cameras are enumerated with nokhwa, microphones with cpal. Acquisition
//! checks that both exist (and, on macOS, that camera access was granted)
//! before handing out a stream backed by the FFmpeg encoder.

use super::ffmpeg::{ffmpeg_available, FfmpegEncoder, InputDevices};
use crate::capture::traits::{
    AudioDeviceInfo, CameraInfo, CaptureError, CaptureResult, ChunkSink, EncoderHandle,
    MediaConstraints, MediaDevices, MediaStream, StreamInfo,
};
use async_trait::async_trait;
use cpal::traits::{DeviceTrait, HostTrait};
use nokhwa::utils::{ApiBackend, CameraIndex};

/// Get list of available cameras
pub fn list_cameras() -> Vec<CameraInfo> {
    match nokhwa::query(ApiBackend::Auto) {
        Ok(cameras) => cameras
            .into_iter()
            .map(|info| {
                let id = match info.index() {
                    CameraIndex::Index(i) => i.to_string(),
                    CameraIndex::String(s) => s.to_string(),
                };
                CameraInfo {
                    id,
                    name: info.human_name().to_string(),
                }
            })
            .collect(),
        Err(e) => {
            tracing::warn!("Failed to enumerate cameras: {:?}", e);
            Vec::new()
        }
    }
}

/// Get list of available microphones
pub fn list_microphones() -> Vec<AudioDeviceInfo> {
    let host = cpal::default_host();
    let default_name = host
        .default_input_device()
        .and_then(|device| device.name().ok());

    match host.input_devices() {
        Ok(devices) => devices
            .enumerate()
            .filter_map(|(index, device)| {
                let name = device.name().ok()?;
                Some(AudioDeviceInfo {
                    id: index.to_string(),
                    is_default: default_name.as_deref() == Some(name.as_str()),
                    name,
                })
            })
            .collect(),
        Err(e) => {
            tracing::warn!("Failed to enumerate microphones: {}", e);
            Vec::new()
        }
    }
}

#[cfg(target_os = "macos")]
fn camera_permission_granted() -> bool {
    nokhwa::nokhwa_check()
}

#[cfg(not(target_os = "macos"))]
fn camera_permission_granted() -> bool {
    // Linux and Windows report denial as an open failure instead
    true
}

/// Camera + microphone backend for desktop hosts
#[derive(Debug, Default, Clone)]
pub struct NativeDevices;

impl NativeDevices {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl MediaDevices for NativeDevices {
    async fn acquire(&self, constraints: MediaConstraints) -> CaptureResult<Box<dyn MediaStream>> {
        if constraints.video && !camera_permission_granted() {
            return Err(CaptureError::PermissionDenied(
                "camera access has not been granted".to_string(),
            ));
        }

        let (cameras, microphones) =
            tokio::task::spawn_blocking(|| (list_cameras(), list_microphones()))
                .await
                .map_err(|e| CaptureError::DeviceUnavailable(format!("device query failed: {e}")))?;

        let camera = if constraints.video {
            Some(cameras.into_iter().next().ok_or_else(|| {
                CaptureError::DeviceUnavailable("no camera found".to_string())
            })?)
        } else {
            None
        };

        let microphone = if constraints.audio {
            let mut microphones = microphones;
            let default_index = microphones.iter().position(|m| m.is_default).unwrap_or(0);
            if microphones.is_empty() {
                return Err(CaptureError::DeviceUnavailable(
                    "no microphone found".to_string(),
                ));
            }
            Some(microphones.swap_remove(default_index))
        } else {
            None
        };

        if !ffmpeg_available().await {
            return Err(CaptureError::Encoder(
                "FFmpeg not found. Please install FFmpeg and make sure it is on PATH".to_string(),
            ));
        }

        let info = StreamInfo {
            id: uuid::Uuid::new_v4().to_string(),
            video_label: camera.as_ref().map(|c| c.name.clone()),
            audio_label: microphone.as_ref().map(|m| m.name.clone()),
        };

        Ok(Box::new(NativeStream {
            info,
            inputs: InputDevices { camera, microphone },
            live: true,
        }))
    }
}

/// Selected devices, encoded on demand by FFmpeg
struct NativeStream {
    info: StreamInfo,
    inputs: InputDevices,
    live: bool,
}

#[async_trait]
impl MediaStream for NativeStream {
    fn info(&self) -> &StreamInfo {
        &self.info
    }

    fn is_live(&self) -> bool {
        self.live
    }

    async fn start_encoder(
        &mut self,
        mime_type: &str,
        sink: ChunkSink,
    ) -> CaptureResult<Box<dyn EncoderHandle>> {
        if !self.live {
            return Err(CaptureError::StreamNotAcquired);
        }
        let encoder = FfmpegEncoder::spawn(&self.inputs, mime_type, sink)?;
        Ok(Box::new(encoder))
    }

    fn release(&mut self) {
        self.live = false;
        tracing::debug!("Native stream {} released", self.info.id);
    }
}
