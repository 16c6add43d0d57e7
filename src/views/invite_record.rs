//! Candidate recording page
//!
//! Composes the recording controller with the upload client for one invite
//! and renders the page state: status text, elapsed time, available actions
//! and the error banner.

use crate::api::upload::{UploadAck, UploadClient, UploadError};
use crate::capture::{Clip, StreamInfo};
use crate::recorder::{RecorderResult, RecordingController, RecordingEvent, RecordingState};
use crate::utils::error::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

pub const INVALID_INVITE_MESSAGE: &str = "No invite ID provided. Please check your invite link.";

/// Buttons offered to the candidate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RecorderAction {
    Start,
    Stop,
    Upload,
    RecordAgain,
    TryAgain,
}

/// Status line shown under the preview
pub fn status_message(state: RecordingState) -> &'static str {
    match state {
        RecordingState::Idle => "Click 'Start Recording' to begin your video response",
        RecordingState::Recording => "Recording in progress... Speak clearly and look at the camera",
        RecordingState::Stopped => "Recording completed! You can upload this video or record again",
        RecordingState::Uploading => "Uploading your video... Please wait",
        RecordingState::Uploaded => {
            "Video uploaded successfully! You can record another video if needed"
        }
        RecordingState::Error => "An error occurred. Please try recording again",
    }
}

pub fn available_actions(state: RecordingState) -> Vec<RecorderAction> {
    match state {
        RecordingState::Idle => vec![RecorderAction::Start],
        RecordingState::Recording => vec![RecorderAction::Stop],
        RecordingState::Stopped => vec![RecorderAction::Upload, RecorderAction::RecordAgain],
        RecordingState::Uploading => Vec::new(),
        RecordingState::Uploaded => vec![RecorderAction::RecordAgain],
        RecordingState::Error => vec![RecorderAction::TryAgain],
    }
}

/// Rendered page state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InviteRecordModel {
    pub invite_id: Option<String>,
    pub state: RecordingState,
    pub status_message: String,
    pub elapsed_secs: u32,
    pub max_secs: u32,
    pub progress_percent: f64,
    pub max_reached: bool,
    pub actions: Vec<RecorderAction>,
    pub recorder_disabled: bool,
    pub banner: Option<String>,
    pub video_url: Option<String>,
}

/// A clip handed out for upload. Sending does not touch the view, so a
/// shared view need not stay locked during the request.
pub struct PendingUpload {
    clip: Clip,
    session_id: Uuid,
    invite_id: String,
    client: UploadClient,
}

impl PendingUpload {
    pub fn invite_id(&self) -> &str {
        &self.invite_id
    }

    pub async fn send(self) -> UploadOutcome {
        let result = self.client.upload(self.clip, &self.invite_id).await;
        UploadOutcome {
            session_id: self.session_id,
            invite_id: self.invite_id,
            result,
        }
    }
}

/// Result of a [`PendingUpload`], tagged with the session that started it
#[derive(Debug)]
pub struct UploadOutcome {
    pub session_id: Uuid,
    pub invite_id: String,
    pub result: Result<UploadAck, UploadError>,
}

/// Candidate-facing recording page for one invite
pub struct InviteRecordView {
    invite_id: Option<String>,
    controller: RecordingController,
    uploader: UploadClient,
    banner: Option<String>,
    video_url: Option<String>,
}

impl InviteRecordView {
    pub fn new(invite_id: Option<&str>, controller: RecordingController, uploader: UploadClient) -> Self {
        let invite_id = invite_id
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(str::to_string);
        if invite_id.is_none() {
            tracing::warn!("Recording page opened without an invite id");
        }
        Self {
            invite_id,
            controller,
            uploader,
            banner: None,
            video_url: None,
        }
    }

    pub fn invite_id(&self) -> AppResult<&str> {
        self.invite_id.as_deref().ok_or(AppError::InvalidInvite)
    }

    pub fn controller(&self) -> &RecordingController {
        &self.controller
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RecordingEvent> {
        self.controller.subscribe()
    }

    /// Acquire the camera and bind the preview
    pub async fn prepare(&mut self) -> AppResult<StreamInfo> {
        self.invite_id()?;
        let result = self.controller.prepare().await;
        self.track(result)
    }

    pub async fn start(&mut self) -> AppResult<()> {
        self.invite_id()?;
        let result = self.controller.start().await;
        if result.is_ok() {
            self.banner = None;
        }
        self.track(result)
    }

    pub async fn stop(&mut self) -> AppResult<()> {
        let result = self.controller.stop().await;
        self.track(result)
    }

    pub async fn on_tick(&mut self, generation: u64) -> AppResult<()> {
        let result = self.controller.on_tick(generation).await;
        self.track(result)
    }

    /// External disable signal, passed through to the controller
    pub async fn set_disabled(&mut self, disabled: bool) -> AppResult<()> {
        let result = self.controller.set_disabled(disabled).await;
        self.track(result)
    }

    /// Enter `uploading`, disable the recorder and hand out the clip
    pub async fn begin_upload(&mut self) -> AppResult<PendingUpload> {
        let invite_id = self.invite_id()?.to_string();
        let result = self.controller.begin_upload();
        let clip = self.track(result)?;
        self.controller.set_disabled(true).await?;
        Ok(PendingUpload {
            clip,
            session_id: self.controller.session_id(),
            invite_id,
            client: self.uploader.clone(),
        })
    }

    /// Re-enable the recorder and record the upload outcome. An outcome
    /// from another session or invite is refused and leaves the page as is.
    pub async fn finish_upload(&mut self, outcome: UploadOutcome) -> AppResult<UploadAck> {
        let current = self.controller.session_id();
        if outcome.session_id != current
            || self.invite_id.as_deref() != Some(outcome.invite_id.as_str())
            || self.controller.state() != RecordingState::Uploading
        {
            tracing::warn!(
                "Dropping upload outcome for invite {} (session {}); page is on session {}",
                outcome.invite_id,
                outcome.session_id,
                current
            );
            return Err(AppError::StaleUpload(outcome.invite_id));
        }

        self.controller.set_disabled(false).await?;
        let result = self.controller.finish_upload(outcome.result);
        let ack = self.track(result)?;
        self.video_url = ack.video_url.clone();
        self.banner = None;
        Ok(ack)
    }

    pub async fn upload(&mut self) -> AppResult<UploadAck> {
        let pending = self.begin_upload().await?;
        let outcome = pending.send().await;
        self.finish_upload(outcome).await
    }

    /// Record again / try again
    pub async fn record_again(&mut self) -> AppResult<()> {
        let result = self.controller.reset().await;
        self.track(result)?;
        self.banner = None;
        Ok(())
    }

    pub fn teardown(&mut self) {
        self.controller.teardown();
    }

    pub fn render(&self) -> InviteRecordModel {
        let snapshot = self.controller.snapshot();
        let (status, actions, banner) = match &self.invite_id {
            Some(_) => (
                status_message(snapshot.state).to_string(),
                available_actions(snapshot.state),
                self.banner.clone().or_else(|| snapshot.last_error.clone()),
            ),
            None => (
                INVALID_INVITE_MESSAGE.to_string(),
                Vec::new(),
                Some(INVALID_INVITE_MESSAGE.to_string()),
            ),
        };

        InviteRecordModel {
            invite_id: self.invite_id.clone(),
            state: snapshot.state,
            status_message: status,
            elapsed_secs: snapshot.elapsed_secs,
            max_secs: snapshot.max_secs,
            progress_percent: snapshot.progress_percent(),
            max_reached: snapshot.max_reached(),
            actions,
            recorder_disabled: snapshot.disabled || snapshot.state == RecordingState::Uploading,
            banner,
            video_url: self.video_url.clone(),
        }
    }

    fn track<T>(&mut self, result: RecorderResult<T>) -> AppResult<T> {
        result.map_err(|e| {
            self.banner = Some(e.to_string());
            AppError::from(e)
        })
    }
}
