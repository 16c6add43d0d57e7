//! FFmpeg-backed encoder
//!
//! FFmpeg reads the camera and microphone directly and writes a streamable
//! container to stdout. Stdout is read in arrival order and forwarded to the
//! chunk sink; sending `q` on stdin asks FFmpeg to flush and exit.

use crate::capture::traits::{
    AudioDeviceInfo, CameraInfo, CaptureError, CaptureResult, ChunkSink, EncoderHandle,
};
use async_trait::async_trait;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;

const READ_CHUNK_BYTES: usize = 64 * 1024;
const CAPTURE_FPS: u32 = 30;

/// Devices selected when the stream was acquired
#[derive(Debug, Clone)]
pub struct InputDevices {
    pub camera: Option<CameraInfo>,
    pub microphone: Option<AudioDeviceInfo>,
}

/// Check if FFmpeg is available
pub async fn ffmpeg_available() -> bool {
    Command::new("ffmpeg")
        .arg("-version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await
        .map(|status| status.success())
        .unwrap_or(false)
}

/// Platform-specific input arguments
pub fn input_args(inputs: &InputDevices) -> Vec<String> {
    let mut args = Vec::new();

    #[cfg(target_os = "macos")]
    {
        let video = inputs.camera.as_ref().map(|c| c.id.as_str()).unwrap_or("none");
        let audio = inputs.microphone.as_ref().map(|m| m.id.as_str()).unwrap_or("none");
        args.extend([
            "-f".to_string(),
            "avfoundation".to_string(),
            "-framerate".to_string(),
            CAPTURE_FPS.to_string(),
            "-i".to_string(),
            format!("{video}:{audio}"),
        ]);
    }

    #[cfg(target_os = "windows")]
    {
        let mut spec = Vec::new();
        if let Some(camera) = &inputs.camera {
            spec.push(format!("video={}", camera.name));
        }
        if let Some(mic) = &inputs.microphone {
            spec.push(format!("audio={}", mic.name));
        }
        args.extend([
            "-f".to_string(),
            "dshow".to_string(),
            "-framerate".to_string(),
            CAPTURE_FPS.to_string(),
            "-i".to_string(),
            spec.join(":"),
        ]);
    }

    #[cfg(not(any(target_os = "macos", target_os = "windows")))]
    {
        if let Some(camera) = &inputs.camera {
            let device = if camera.id.starts_with('/') {
                camera.id.clone()
            } else {
                format!("/dev/video{}", camera.id)
            };
            args.extend([
                "-f".to_string(),
                "v4l2".to_string(),
                "-framerate".to_string(),
                CAPTURE_FPS.to_string(),
                "-i".to_string(),
                device,
            ]);
        }
        if inputs.microphone.is_some() {
            args.extend([
                "-f".to_string(),
                "alsa".to_string(),
                "-i".to_string(),
                "default".to_string(),
            ]);
        }
    }

    args
}

/// Output arguments writing a streamable container to stdout
pub fn output_args(mime_type: &str) -> CaptureResult<Vec<&'static str>> {
    match crate::capture::extension_for_mime(mime_type) {
        "webm" => Ok(vec![
            "-c:v", "libvpx",
            "-deadline", "realtime",
            "-b:v", "1M",
            "-c:a", "libopus",
            "-f", "webm",
            "-",
        ]),
        "mp4" => Ok(vec![
            "-c:v", "libx264",
            "-preset", "veryfast",
            "-pix_fmt", "yuv420p",
            "-c:a", "aac",
            // Fragmented MP4 so the output can be written to a pipe
            "-movflags", "frag_keyframe+empty_moov",
            "-f", "mp4",
            "-",
        ]),
        _ => Err(CaptureError::Encoder(format!(
            "unsupported mime type {mime_type:?}"
        ))),
    }
}

/// A running FFmpeg capture process
pub struct FfmpegEncoder {
    child: Child,
    reader: JoinHandle<()>,
    stderr_reader: Option<JoinHandle<()>>,
}

impl FfmpegEncoder {
    pub fn spawn(inputs: &InputDevices, mime_type: &str, sink: ChunkSink) -> CaptureResult<Self> {
        let output = output_args(mime_type)?;
        let mut args: Vec<String> = vec!["-hide_banner".into(), "-loglevel".into(), "error".into()];
        args.extend(input_args(inputs));
        args.extend(output.iter().map(|s| s.to_string()));

        let mut child = Command::new("ffmpeg")
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| CaptureError::Encoder(format!("Failed to start FFmpeg: {e}")))?;

        let mut stdout = child
            .stdout
            .take()
            .ok_or_else(|| CaptureError::Encoder("FFmpeg stdout not captured".to_string()))?;

        let reader = tokio::spawn(async move {
            let mut total = 0usize;
            loop {
                let mut buf = vec![0u8; READ_CHUNK_BYTES];
                match stdout.read(&mut buf).await {
                    Ok(0) => break,
                    Ok(n) => {
                        buf.truncate(n);
                        total += n;
                        if sink.send(buf).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        tracing::warn!("FFmpeg stdout read failed: {}", e);
                        break;
                    }
                }
            }
            tracing::debug!("FFmpeg output closed after {} bytes", total);
        });

        let stderr_reader = child.stderr.take().map(|stderr| {
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    tracing::warn!("ffmpeg: {}", line);
                }
            })
        });

        tracing::info!("Started FFmpeg encoder: ffmpeg {}", args.join(" "));

        Ok(Self {
            child,
            reader,
            stderr_reader,
        })
    }
}

#[async_trait]
impl EncoderHandle for FfmpegEncoder {
    async fn finish(mut self: Box<Self>) -> CaptureResult<()> {
        if let Some(mut stdin) = self.child.stdin.take() {
            // FFmpeg finalizes the container when it reads `q`
            if let Err(e) = stdin.write_all(b"q").await {
                tracing::debug!("FFmpeg stdin closed early: {}", e);
            }
            let _ = stdin.flush().await;
        }

        let status = self
            .child
            .wait()
            .await
            .map_err(|e| CaptureError::Encoder(format!("Failed to wait for FFmpeg: {e}")))?;

        let this = *self;
        this.reader
            .await
            .map_err(|e| CaptureError::Encoder(format!("FFmpeg reader task failed: {e}")))?;
        if let Some(stderr_reader) = this.stderr_reader {
            let _ = stderr_reader.await;
        }

        // `q` makes FFmpeg exit with 255 on some platforms after a clean flush
        if !status.success() && status.code() != Some(255) {
            return Err(CaptureError::Encoder(format!("FFmpeg exited with {status}")));
        }
        Ok(())
    }

    fn abandon(mut self: Box<Self>) {
        if let Err(e) = self.child.start_kill() {
            tracing::debug!("FFmpeg already exited: {}", e);
        }
        self.reader.abort();
        if let Some(stderr_reader) = self.stderr_reader.take() {
            stderr_reader.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_webm_output_streams_to_stdout() {
        let args = output_args("video/webm").unwrap();
        assert!(args.contains(&"libvpx"));
        assert!(args.contains(&"libopus"));
        assert_eq!(args.last(), Some(&"-"));
    }

    #[test]
    fn test_mp4_output_is_fragmented() {
        let args = output_args("video/mp4").unwrap();
        assert!(args.contains(&"frag_keyframe+empty_moov"));
    }

    #[test]
    fn test_unknown_mime_rejected() {
        assert!(output_args("image/png").is_err());
    }

    #[test]
    fn test_input_args_name_an_input() {
        let inputs = InputDevices {
            camera: Some(CameraInfo {
                id: "0".to_string(),
                name: "Camera".to_string(),
            }),
            microphone: None,
        };
        let args = input_args(&inputs);
        assert!(args.iter().any(|a| a == "-i"));
    }
}
