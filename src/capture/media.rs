//! Stream ownership and chunk buffering
//!
//! `MediaCapture` owns at most one live stream and at most one running
//! encoder. Chunks are buffered in arrival order and concatenated into a
//! [`Clip`] when the encoder is stopped.

use super::traits::{
    CaptureError, CaptureResult, ChunkReceiver, EncoderHandle, MediaConstraints, MediaDevices,
    MediaStream, StreamInfo,
};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::mpsc;

/// The finalized, immutable recording
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Clip {
    data: Arc<[u8]>,
    mime_type: String,
    recorded_at: DateTime<Utc>,
}

impl Clip {
    pub fn new(data: Vec<u8>, mime_type: impl Into<String>) -> Self {
        Self {
            data: data.into(),
            mime_type: mime_type.into(),
            recorded_at: Utc::now(),
        }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn recorded_at(&self) -> DateTime<Utc> {
        self.recorded_at
    }

    /// File extension matching the container type
    pub fn extension(&self) -> &'static str {
        extension_for_mime(&self.mime_type)
    }
}

/// Map a mime type (parameters allowed) to a file extension
pub fn extension_for_mime(mime_type: &str) -> &'static str {
    let essence = mime_type.split(';').next().unwrap_or_default().trim();
    match essence {
        "video/webm" | "audio/webm" => "webm",
        "video/mp4" | "audio/mp4" => "mp4",
        "video/x-matroska" => "mkv",
        "video/quicktime" => "mov",
        _ => "bin",
    }
}

struct ActiveEncoder {
    handle: Box<dyn EncoderHandle>,
    chunks: ChunkReceiver,
    buffer: Vec<Vec<u8>>,
    mime_type: String,
}

impl ActiveEncoder {
    /// Move whatever has already arrived into the buffer
    fn drain_ready(&mut self) {
        while let Ok(chunk) = self.chunks.try_recv() {
            self.buffer.push(chunk);
        }
    }
}

/// Owns the live stream and the encoded-chunk buffer
pub struct MediaCapture {
    devices: Arc<dyn MediaDevices>,
    stream: Option<Box<dyn MediaStream>>,
    encoder: Option<ActiveEncoder>,
}

impl MediaCapture {
    pub fn new(devices: Arc<dyn MediaDevices>) -> Self {
        Self {
            devices,
            stream: None,
            encoder: None,
        }
    }

    /// Acquire camera + microphone. An already-live stream is reused.
    pub async fn acquire(&mut self) -> CaptureResult<StreamInfo> {
        if let Some(stream) = &self.stream {
            if stream.is_live() {
                return Ok(stream.info().clone());
            }
        }

        let stream = self.devices.acquire(MediaConstraints::default()).await?;
        let info = stream.info().clone();
        tracing::info!(
            "Acquired media stream {} (video: {:?}, audio: {:?})",
            info.id,
            info.video_label,
            info.audio_label
        );
        self.stream = Some(stream);
        Ok(info)
    }

    /// Stream info bound to the local preview
    pub fn preview(&self) -> Option<&StreamInfo> {
        self.stream
            .as_ref()
            .filter(|s| s.is_live())
            .map(|s| s.info())
    }

    /// A live stream is bound and no encoder is running
    pub fn is_ready(&self) -> bool {
        self.preview().is_some() && self.encoder.is_none()
    }

    pub fn is_encoding(&self) -> bool {
        self.encoder.is_some()
    }

    /// Start encoding the live stream
    pub async fn begin_encoding(&mut self, mime_type: &str) -> CaptureResult<()> {
        if self.encoder.is_some() {
            return Err(CaptureError::EncoderAlreadyActive);
        }
        let stream = self
            .stream
            .as_mut()
            .filter(|s| s.is_live())
            .ok_or(CaptureError::StreamNotAcquired)?;

        let (sink, chunks) = mpsc::unbounded_channel();
        let handle = stream.start_encoder(mime_type, sink).await?;

        self.encoder = Some(ActiveEncoder {
            handle,
            chunks,
            buffer: Vec::new(),
            mime_type: mime_type.to_string(),
        });
        tracing::info!("Encoder started ({})", mime_type);
        Ok(())
    }

    /// Number of chunks received so far by the running encoder
    pub fn buffered_chunks(&mut self) -> usize {
        match self.encoder.as_mut() {
            Some(encoder) => {
                encoder.drain_ready();
                encoder.buffer.len()
            }
            None => 0,
        }
    }

    /// Finalize the running encoder into a clip. The stream stays live.
    pub async fn stop(&mut self) -> CaptureResult<Clip> {
        let mut encoder = self.encoder.take().ok_or(CaptureError::EncoderNotActive)?;

        encoder.handle.finish().await?;
        while let Some(chunk) = encoder.chunks.recv().await {
            encoder.buffer.push(chunk);
        }

        let total: usize = encoder.buffer.iter().map(Vec::len).sum();
        let mut data = Vec::with_capacity(total);
        for chunk in &encoder.buffer {
            data.extend_from_slice(chunk);
        }

        tracing::info!(
            "Encoder stopped: {} chunks, {} bytes",
            encoder.buffer.len(),
            total
        );
        Ok(Clip::new(data, encoder.mime_type))
    }

    /// Drop a running encoder without producing a clip
    pub fn abandon_encoder(&mut self) {
        if let Some(encoder) = self.encoder.take() {
            tracing::debug!("Abandoning encoder with {} buffered chunks", encoder.buffer.len());
            encoder.handle.abandon();
        }
    }

    /// Stop the encoder (if any) and every track of the stream
    pub fn release(&mut self) {
        self.abandon_encoder();
        if let Some(mut stream) = self.stream.take() {
            tracing::info!("Releasing media stream {}", stream.info().id);
            stream.release();
        }
    }
}

impl Drop for MediaCapture {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeDevices;

    #[tokio::test]
    async fn test_stop_concatenates_in_arrival_order() {
        let devices = FakeDevices::with_chunks(vec![b"ab".to_vec(), b"cd".to_vec(), b"e".to_vec()]);
        let mut capture = MediaCapture::new(devices);

        capture.acquire().await.unwrap();
        assert!(capture.is_ready());

        capture.begin_encoding("video/webm").await.unwrap();
        assert!(!capture.is_ready());

        let clip = capture.stop().await.unwrap();
        assert_eq!(clip.bytes(), b"abcde");
        assert_eq!(clip.mime_type(), "video/webm");
        assert_eq!(clip.extension(), "webm");
    }

    #[tokio::test]
    async fn test_stop_without_encoder_fails() {
        let mut capture = MediaCapture::new(FakeDevices::with_chunks(vec![]));
        capture.acquire().await.unwrap();
        assert_eq!(capture.stop().await.unwrap_err(), CaptureError::EncoderNotActive);
    }

    #[tokio::test]
    async fn test_stream_stays_live_after_stop() {
        let devices = FakeDevices::with_chunks(vec![b"x".to_vec()]);
        let mut capture = MediaCapture::new(devices.clone());
        capture.acquire().await.unwrap();
        capture.begin_encoding("video/webm").await.unwrap();
        capture.stop().await.unwrap();

        assert!(capture.is_ready());
        // Reacquiring reuses the live stream
        capture.acquire().await.unwrap();
        assert_eq!(devices.acquisitions(), 1);
    }

    #[tokio::test]
    async fn test_begin_encoding_requires_stream() {
        let mut capture = MediaCapture::new(FakeDevices::with_chunks(vec![]));
        assert_eq!(
            capture.begin_encoding("video/webm").await.unwrap_err(),
            CaptureError::StreamNotAcquired
        );
    }

    #[tokio::test]
    async fn test_second_encoder_rejected() {
        let mut capture = MediaCapture::new(FakeDevices::with_chunks(vec![]));
        capture.acquire().await.unwrap();
        capture.begin_encoding("video/webm").await.unwrap();
        assert_eq!(
            capture.begin_encoding("video/webm").await.unwrap_err(),
            CaptureError::EncoderAlreadyActive
        );
    }

    #[tokio::test]
    async fn test_acquire_errors_propagate() {
        let devices = FakeDevices::failing(CaptureError::PermissionDenied("camera".into()));
        let mut capture = MediaCapture::new(devices);
        assert!(matches!(
            capture.acquire().await,
            Err(CaptureError::PermissionDenied(_))
        ));
        assert!(capture.preview().is_none());
    }

    #[tokio::test]
    async fn test_release_drops_preview() {
        let mut capture = MediaCapture::new(FakeDevices::with_chunks(vec![]));
        capture.acquire().await.unwrap();
        capture.release();
        assert!(capture.preview().is_none());
        assert!(!capture.is_ready());
    }

    #[test]
    fn test_extension_for_mime() {
        assert_eq!(extension_for_mime("video/webm;codecs=vp8,opus"), "webm");
        assert_eq!(extension_for_mime("video/mp4"), "mp4");
        assert_eq!(extension_for_mime("application/x-unknown"), "bin");
    }
}
