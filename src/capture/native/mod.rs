//! Native capture backend (nokhwa/cpal discovery, FFmpeg encoding)

pub mod devices;
pub mod ffmpeg;

pub use devices::{list_cameras, list_microphones, NativeDevices};
