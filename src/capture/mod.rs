//! Camera and microphone capture
//!
//! `traits` defines the device seams, `media` owns the live stream and the
//! encoded-chunk buffer, and `native` (feature `native-capture`) provides
//! the real device backend.

pub mod media;
pub mod traits;

#[cfg(feature = "native-capture")]
pub mod native;

pub use media::{extension_for_mime, Clip, MediaCapture};
pub use traits::{
    AudioDeviceInfo, CameraInfo, CaptureError, CaptureResult, ChunkSink, EncoderHandle,
    MediaConstraints, MediaDevices, MediaStream, StreamInfo,
};
