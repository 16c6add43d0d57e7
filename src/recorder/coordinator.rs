//! Recording controller
//!
//! Owns one session: the state machine, the media capture, the timer guard
//! and the finalized clip. Every public operation feeds an [`Input`] to the
//! machine and then carries out the returned effects.

use super::machine::{Effect, Input, SessionMachine, Transition, TransitionError};
use super::scheduler::{Scheduler, TimerGuard};
use super::state::{RecorderConfig, RecordingSnapshot, RecordingState};
use crate::api::upload::{UploadAck, UploadClient, UploadError};
use crate::capture::{CaptureError, Clip, MediaCapture, MediaDevices, StreamInfo};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::broadcast;
use uuid::Uuid;

/// Recorder errors
#[derive(Error, Debug)]
pub enum RecorderError {
    #[error(transparent)]
    Transition(#[from] TransitionError),

    #[error(transparent)]
    Capture(#[from] CaptureError),

    #[error(transparent)]
    Upload(#[from] UploadError),

    #[error("No recorded video to upload")]
    NoClip,
}

pub type RecorderResult<T> = Result<T, RecorderError>;

/// Timer generations are unique across every controller in the process,
/// so a tick queued for a torn-down session never matches a new one.
static NEXT_GENERATION: AtomicU64 = AtomicU64::new(1);

/// Events emitted during a session
#[derive(Debug, Clone, PartialEq)]
pub enum RecordingEvent {
    StateChanged {
        from: RecordingState,
        to: RecordingState,
    },
    /// Timer advanced
    Tick { elapsed_secs: u32 },
    /// Maximum duration reached and the recording stopped on its own
    Completed,
    Error(String),
}

/// Drives a single candidate recording session
pub struct RecordingController {
    config: RecorderConfig,
    session_id: Uuid,
    machine: SessionMachine,
    capture: MediaCapture,
    scheduler: Arc<dyn Scheduler>,
    timer: Option<TimerGuard>,
    generation: u64,
    clip: Option<Clip>,
    event_tx: broadcast::Sender<RecordingEvent>,
}

impl RecordingController {
    pub fn new(
        config: RecorderConfig,
        devices: Arc<dyn MediaDevices>,
        scheduler: Arc<dyn Scheduler>,
    ) -> Self {
        let (event_tx, _) = broadcast::channel(100);
        Self {
            machine: SessionMachine::new(config.max_seconds),
            config,
            session_id: Uuid::new_v4(),
            capture: MediaCapture::new(devices),
            scheduler,
            timer: None,
            generation: 0,
            clip: None,
            event_tx,
        }
    }

    pub fn state(&self) -> RecordingState {
        self.machine.state()
    }

    /// Current session; replaced on every reset
    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn elapsed_secs(&self) -> u32 {
        self.machine.elapsed_secs()
    }

    pub fn clip(&self) -> Option<&Clip> {
        self.clip.as_ref()
    }

    pub fn config(&self) -> &RecorderConfig {
        &self.config
    }

    /// Generation of the timer currently attached
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn preview(&self) -> Option<&StreamInfo> {
        self.capture.preview()
    }

    /// Subscribe to session events
    pub fn subscribe(&self) -> broadcast::Receiver<RecordingEvent> {
        self.event_tx.subscribe()
    }

    pub fn snapshot(&self) -> RecordingSnapshot {
        RecordingSnapshot {
            session_id: self.session_id.to_string(),
            state: self.machine.state(),
            elapsed_secs: self.machine.elapsed_secs(),
            max_secs: self.machine.max_secs(),
            clip_bytes: self.clip.as_ref().map(Clip::len),
            last_error: self.machine.last_error().map(str::to_string),
            disabled: self.machine.is_disabled(),
        }
    }

    /// Acquire camera and microphone and bind the preview
    pub async fn prepare(&mut self) -> RecorderResult<StreamInfo> {
        match self.capture.acquire().await {
            Ok(info) => Ok(info),
            Err(e) => {
                tracing::warn!("Media acquisition failed: {}", e);
                self.fault(e.to_string());
                Err(e.into())
            }
        }
    }

    /// Start recording. A no-op while already recording.
    pub async fn start(&mut self) -> RecorderResult<()> {
        let capture_ready = self.capture.is_ready();
        let transition = self.machine.step(Input::Start { capture_ready })?;
        if transition.changed() {
            tracing::info!("Starting recording (session {})", self.session_id);
        }
        self.apply(transition).await
    }

    /// Stop recording and finalize the clip. A no-op unless recording.
    pub async fn stop(&mut self) -> RecorderResult<()> {
        let transition = self.machine.step(Input::Stop)?;
        if transition.changed() {
            tracing::info!("Stopping recording at {}s", self.machine.elapsed_secs());
        }
        self.apply(transition).await
    }

    /// Feed one timer tick. Ticks from an older generation are ignored.
    pub async fn on_tick(&mut self, generation: u64) -> RecorderResult<()> {
        if self.timer.is_none() || generation != self.generation {
            tracing::debug!(
                "Ignoring stale tick (generation {}, current {})",
                generation,
                self.generation
            );
            return Ok(());
        }

        let transition = self.machine.step(Input::Tick)?;
        let _ = self.event_tx.send(RecordingEvent::Tick {
            elapsed_secs: self.machine.elapsed_secs(),
        });
        if transition.effects.contains(&Effect::NotifyComplete) {
            tracing::info!("Maximum duration of {}s reached", self.machine.max_secs());
        }
        self.apply(transition).await
    }

    /// External disable signal. Detaches the timer and zeroes elapsed time
    /// but leaves a running encoder capturing.
    pub async fn set_disabled(&mut self, disabled: bool) -> RecorderResult<()> {
        let input = if disabled { Input::Disable } else { Input::Enable };
        let transition = self.machine.step(input)?;
        if disabled && self.capture.is_encoding() {
            tracing::warn!("Recorder disabled while encoding; capture keeps running until stopped");
        }
        self.apply(transition).await
    }

    /// Move to `uploading` and hand out the clip. The caller performs the
    /// upload and reports back through [`finish_upload`](Self::finish_upload).
    pub fn begin_upload(&mut self) -> RecorderResult<Clip> {
        let transition = self.machine.step(Input::Upload)?;
        self.emit_transition(&transition);

        match self.clip.take() {
            Some(clip) => {
                tracing::info!("Uploading clip ({} bytes)", clip.len());
                Ok(clip)
            }
            None => {
                let err = RecorderError::NoClip;
                self.complete_upload(Err(err.to_string()));
                Err(err)
            }
        }
    }

    /// Record the outcome of an upload started with `begin_upload`.
    /// Refused unless an upload is in flight.
    pub fn finish_upload(
        &mut self,
        result: Result<UploadAck, UploadError>,
    ) -> RecorderResult<UploadAck> {
        let state = self.machine.state();
        if state != RecordingState::Uploading {
            tracing::warn!("Discarding upload outcome in state {:?}", state);
            return Err(TransitionError::InvalidTransition {
                state,
                action: "complete an upload",
            }
            .into());
        }
        match result {
            Ok(ack) => {
                tracing::info!("Upload acknowledged: {:?}", ack.video_url);
                self.complete_upload(Ok(()));
                Ok(ack)
            }
            Err(e) => {
                tracing::error!("Upload failed: {}", e);
                self.complete_upload(Err(e.to_string()));
                Err(e.into())
            }
        }
    }

    /// Upload the held clip for `invite_id`. Failures are not retried.
    pub async fn upload(
        &mut self,
        client: &UploadClient,
        invite_id: &str,
    ) -> RecorderResult<UploadAck> {
        let clip = self.begin_upload()?;
        let result = client.upload(clip, invite_id).await;
        self.finish_upload(result)
    }

    /// Retry / record again: back to `idle` with no clip and zero elapsed
    pub async fn reset(&mut self) -> RecorderResult<()> {
        let transition = self.machine.step(Input::Reset)?;
        if transition.changed() {
            self.capture.abandon_encoder();
            self.session_id = Uuid::new_v4();
        }
        self.apply(transition).await
    }

    /// Cancel the timer and release all devices
    pub fn teardown(&mut self) {
        self.cancel_timer();
        self.capture.release();
        tracing::info!("Recording session {} torn down", self.session_id);
    }

    fn complete_upload(&mut self, outcome: Result<(), String>) {
        let input = match &outcome {
            Ok(()) => Input::UploadSucceeded,
            Err(message) => Input::UploadFailed(message.clone()),
        };
        match self.machine.step(input) {
            Ok(transition) => self.emit_transition(&transition),
            Err(e) => tracing::warn!("Upload outcome ignored: {}", e),
        }
        if let Err(message) = outcome {
            let _ = self.event_tx.send(RecordingEvent::Error(message));
        }
    }

    async fn apply(&mut self, transition: Transition) -> RecorderResult<()> {
        self.emit_transition(&transition);

        for effect in &transition.effects {
            match effect {
                Effect::BeginEncoding => {
                    if let Err(e) = self.capture.begin_encoding(&self.config.mime_type).await {
                        tracing::error!("Failed to start encoder: {}", e);
                        self.fault(e.to_string());
                        return Err(e.into());
                    }
                }
                Effect::StartTimer => {
                    self.cancel_timer();
                    self.generation = NEXT_GENERATION.fetch_add(1, Ordering::Relaxed);
                    self.timer = Some(
                        self.scheduler
                            .schedule_ticks(self.generation, self.config.tick_period),
                    );
                }
                Effect::CancelTimer => self.cancel_timer(),
                Effect::FinalizeClip => match self.capture.stop().await {
                    Ok(clip) => self.clip = Some(clip),
                    Err(e) => {
                        tracing::error!("Failed to finalize clip: {}", e);
                        self.fault(e.to_string());
                        return Err(e.into());
                    }
                },
                Effect::NotifyComplete => {
                    let _ = self.event_tx.send(RecordingEvent::Completed);
                }
                Effect::DiscardClip => self.clip = None,
            }
        }
        Ok(())
    }

    /// Record a device/encoder failure and surface it
    fn fault(&mut self, message: String) {
        self.capture.abandon_encoder();
        match self.machine.step(Input::Fault(message.clone())) {
            Ok(transition) => {
                if transition.effects.contains(&Effect::CancelTimer) {
                    self.cancel_timer();
                }
                self.emit_transition(&transition);
            }
            Err(e) => tracing::warn!("Fault not recorded: {}", e),
        }
        let _ = self.event_tx.send(RecordingEvent::Error(message));
    }

    fn cancel_timer(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.cancel();
        }
    }

    fn emit_transition(&self, transition: &Transition) {
        if transition.changed() {
            let _ = self.event_tx.send(RecordingEvent::StateChanged {
                from: transition.from,
                to: transition.to,
            });
        }
    }
}

impl Drop for RecordingController {
    fn drop(&mut self) {
        self.cancel_timer();
    }
}
