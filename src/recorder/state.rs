//! Recording state management
//!
//! Defines the lifecycle states, recorder settings and the serializable
//! snapshot handed to the frontend.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Lifecycle state of a recording session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RecordingState {
    /// Nothing recorded yet, or reset after an outcome
    #[default]
    Idle,
    /// Encoder running, timer ticking
    Recording,
    /// Clip finalized and held for upload
    Stopped,
    /// Upload in flight
    Uploading,
    /// Upload acknowledged by the server
    Uploaded,
    /// Upload or encoder failure
    Error,
}

impl RecordingState {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordingState::Idle => "idle",
            RecordingState::Recording => "recording",
            RecordingState::Stopped => "stopped",
            RecordingState::Uploading => "uploading",
            RecordingState::Uploaded => "uploaded",
            RecordingState::Error => "error",
        }
    }

    /// States a reset may leave from
    pub fn is_resettable(&self) -> bool {
        matches!(
            self,
            RecordingState::Stopped | RecordingState::Uploaded | RecordingState::Error
        )
    }
}

impl std::fmt::Display for RecordingState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Recorder settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecorderConfig {
    /// Recording stops automatically once this many seconds have elapsed
    pub max_seconds: u32,

    /// Container/codec requested from the encoder
    pub mime_type: String,

    /// Timer granularity
    #[serde(skip, default = "default_tick_period")]
    pub tick_period: Duration,
}

fn default_tick_period() -> Duration {
    Duration::from_secs(1)
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            max_seconds: 120,
            mime_type: "video/webm".to_string(),
            tick_period: default_tick_period(),
        }
    }
}

impl From<&crate::config::AppConfig> for RecorderConfig {
    fn from(config: &crate::config::AppConfig) -> Self {
        Self {
            max_seconds: config.max_recording_secs.max(1),
            mime_type: config.mime_type.clone(),
            tick_period: default_tick_period(),
        }
    }
}

/// Point-in-time view of a session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordingSnapshot {
    pub session_id: String,
    pub state: RecordingState,
    pub elapsed_secs: u32,
    pub max_secs: u32,
    pub clip_bytes: Option<usize>,
    pub last_error: Option<String>,
    pub disabled: bool,
}

impl RecordingSnapshot {
    /// Elapsed share of the maximum, clamped to 100
    pub fn progress_percent(&self) -> f64 {
        if self.max_secs == 0 {
            return 100.0;
        }
        (f64::from(self.elapsed_secs) / f64::from(self.max_secs) * 100.0).min(100.0)
    }

    pub fn max_reached(&self) -> bool {
        self.elapsed_secs >= self.max_secs
    }
}
