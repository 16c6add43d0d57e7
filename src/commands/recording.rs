//! Recording-related Tauri commands
//!
//! The candidate page lives in a shared [`InviteRecordView`]. Timer ticks
//! from the [`TokioScheduler`] are pumped into it by a background task, and
//! every state change is pushed to the webview as a `recording-state` event.

use crate::api::upload::{UploadAck, UploadClient};
use crate::capture::native::{list_cameras, list_microphones, NativeDevices};
use crate::capture::{AudioDeviceInfo, CameraInfo, MediaDevices, StreamInfo};
use crate::config::AppConfig;
use crate::recorder::{RecorderConfig, RecordingController, RecordingEvent, TimerTick, TokioScheduler};
use crate::utils::error::{AppError, ErrorResponse};
use crate::views::{InviteRecordModel, InviteRecordView};
use std::sync::Arc;
use tauri::{AppHandle, Emitter, State};
use tokio::sync::{broadcast, mpsc, Mutex};

type SharedPage = Arc<Mutex<Option<InviteRecordView>>>;

/// Application state for recording
pub struct RecorderState {
    page: SharedPage,
    devices: Arc<dyn MediaDevices>,
    scheduler: Arc<TokioScheduler>,
    config: RecorderConfig,
    uploader: UploadClient,
}

impl RecorderState {
    /// Build the state and the receiver the tick pump should drain
    pub fn new(config: &AppConfig, uploader: UploadClient) -> (Self, mpsc::UnboundedReceiver<TimerTick>) {
        let (scheduler, ticks) = TokioScheduler::new();
        let state = Self {
            page: Arc::new(Mutex::new(None)),
            devices: Arc::new(NativeDevices::new()),
            scheduler: Arc::new(scheduler),
            config: RecorderConfig::from(config),
            uploader,
        };
        (state, ticks)
    }

    /// Feed timer ticks into whichever page is open
    pub fn spawn_tick_pump(&self, app: AppHandle, mut ticks: mpsc::UnboundedReceiver<TimerTick>) {
        let page = self.page.clone();
        tauri::async_runtime::spawn(async move {
            while let Some(tick) = ticks.recv().await {
                let mut guard = page.lock().await;
                let Some(view) = guard.as_mut() else {
                    continue;
                };
                if let Err(e) = view.on_tick(tick.generation).await {
                    tracing::warn!("Tick {} failed: {}", tick.generation, e);
                }
                emit_state(&app, &view.render());
            }
            tracing::debug!("Tick pump stopped");
        });
    }
}

fn emit_state(app: &AppHandle, model: &InviteRecordModel) {
    if let Err(e) = app.emit("recording-state", model) {
        tracing::warn!("Failed to emit recording-state: {}", e);
    }
}

/// Forward completion and error events for one page
fn spawn_event_forwarder(app: AppHandle, invite_id: Option<String>, mut events: broadcast::Receiver<RecordingEvent>) {
    tauri::async_runtime::spawn(async move {
        loop {
            match events.recv().await {
                Ok(RecordingEvent::Completed) => {
                    if let Err(e) = app.emit("recording-complete", &invite_id) {
                        tracing::warn!("Failed to emit recording-complete: {}", e);
                    }
                }
                Ok(RecordingEvent::Error(message)) => {
                    if let Err(e) = app.emit("recording-error", message) {
                        tracing::warn!("Failed to emit recording-error: {}", e);
                    }
                }
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::debug!("Event forwarder skipped {} events", n);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });
}

/// Run `f` against the open page, then push the rendered state
async fn with_page<T, F>(app: &AppHandle, state: &RecorderState, f: F) -> Result<T, ErrorResponse>
where
    F: for<'a> FnOnce(
        &'a mut InviteRecordView,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<T, AppError>> + Send + 'a>>,
{
    let mut guard = state.page.lock().await;
    let view = guard.as_mut().ok_or(AppError::InvalidInvite)?;
    let result = f(view).await;
    emit_state(app, &view.render());
    result.map_err(ErrorResponse::from)
}

/// Get list of available cameras/webcams
#[tauri::command]
pub async fn get_cameras() -> Result<Vec<CameraInfo>, String> {
    tokio::task::spawn_blocking(list_cameras)
        .await
        .map_err(|e| e.to_string())
}

/// Get list of available audio input devices (microphones)
#[tauri::command]
pub async fn get_audio_devices() -> Result<Vec<AudioDeviceInfo>, String> {
    tokio::task::spawn_blocking(list_microphones)
        .await
        .map_err(|e| e.to_string())
}

/// Open the recording page for an invite, replacing any previous one
#[tauri::command]
pub async fn open_invite_page(
    app: AppHandle,
    state: State<'_, RecorderState>,
    invite_id: Option<String>,
) -> Result<InviteRecordModel, ErrorResponse> {
    let controller = RecordingController::new(
        state.config.clone(),
        state.devices.clone(),
        state.scheduler.clone(),
    );
    let view = InviteRecordView::new(invite_id.as_deref(), controller, state.uploader.clone());
    spawn_event_forwarder(app.clone(), invite_id, view.subscribe());

    let mut guard = state.page.lock().await;
    if let Some(mut previous) = guard.replace(view) {
        previous.teardown();
    }
    let model = guard
        .as_ref()
        .map(InviteRecordView::render)
        .ok_or(AppError::InvalidInvite)?;
    emit_state(&app, &model);
    Ok(model)
}

/// Leave the recording page, releasing devices
#[tauri::command]
pub async fn close_invite_page(state: State<'_, RecorderState>) -> Result<(), ErrorResponse> {
    if let Some(mut view) = state.page.lock().await.take() {
        view.teardown();
    }
    Ok(())
}

/// Get the rendered recording page
#[tauri::command]
pub async fn get_recording_page(state: State<'_, RecorderState>) -> Result<InviteRecordModel, ErrorResponse> {
    let guard = state.page.lock().await;
    guard
        .as_ref()
        .map(InviteRecordView::render)
        .ok_or_else(|| AppError::InvalidInvite.into())
}

/// Acquire camera and microphone for the preview
#[tauri::command]
pub async fn prepare_recorder(
    app: AppHandle,
    state: State<'_, RecorderState>,
) -> Result<StreamInfo, ErrorResponse> {
    with_page(&app, &state, |view| Box::pin(view.prepare())).await
}

/// Start recording
#[tauri::command]
pub async fn start_recording(app: AppHandle, state: State<'_, RecorderState>) -> Result<(), ErrorResponse> {
    with_page(&app, &state, |view| Box::pin(view.start())).await
}

/// Stop recording
#[tauri::command]
pub async fn stop_recording(app: AppHandle, state: State<'_, RecorderState>) -> Result<(), ErrorResponse> {
    with_page(&app, &state, |view| Box::pin(view.stop())).await
}

/// Record again / try again
#[tauri::command]
pub async fn reset_recording(app: AppHandle, state: State<'_, RecorderState>) -> Result<(), ErrorResponse> {
    with_page(&app, &state, |view| Box::pin(view.record_again())).await
}

/// External disable signal
#[tauri::command]
pub async fn set_recorder_disabled(
    app: AppHandle,
    state: State<'_, RecorderState>,
    disabled: bool,
) -> Result<(), ErrorResponse> {
    with_page(&app, &state, move |view| Box::pin(view.set_disabled(disabled))).await
}

/// Upload the finished clip. The page is not locked while the request is
/// in flight, so snapshots keep rendering `uploading`. If the page was
/// replaced meanwhile the outcome is refused as stale.
#[tauri::command]
pub async fn upload_recording(app: AppHandle, state: State<'_, RecorderState>) -> Result<UploadAck, ErrorResponse> {
    let pending = with_page(&app, &state, |view| Box::pin(view.begin_upload())).await?;
    let outcome = pending.send().await;
    with_page(&app, &state, move |view| Box::pin(view.finish_upload(outcome))).await
}
