//! Recruiter dashboard commands

use crate::api::invites::QuickTag;
use crate::api::upload::UploadAck;
use crate::utils::error::ErrorResponse;
use crate::views::{DashboardModel, DashboardView};
use std::path::PathBuf;
use tauri::State;
use tauri_plugin_shell::ShellExt;
use tokio::sync::Mutex;

/// Application state for the dashboard
pub struct DashboardState {
    pub view: Mutex<DashboardView>,
}

impl DashboardState {
    pub fn new(view: DashboardView) -> Self {
        Self {
            view: Mutex::new(view),
        }
    }
}

/// Get the rendered dashboard
#[tauri::command]
pub async fn get_dashboard(state: State<'_, DashboardState>) -> Result<DashboardModel, ErrorResponse> {
    Ok(state.view.lock().await.render())
}

/// Select an invite and load it
#[tauri::command]
pub async fn load_invite(
    state: State<'_, DashboardState>,
    invite_id: String,
) -> Result<DashboardModel, ErrorResponse> {
    let mut view = state.view.lock().await;
    view.set_invite_id(&invite_id);
    view.load().await?;
    Ok(view.render())
}

#[tauri::command]
pub async fn create_invite(state: State<'_, DashboardState>) -> Result<DashboardModel, ErrorResponse> {
    let mut view = state.view.lock().await;
    view.create().await?;
    Ok(view.render())
}

/// Add a typed tag
#[tauri::command]
pub async fn add_tag(state: State<'_, DashboardState>, tag: String) -> Result<DashboardModel, ErrorResponse> {
    let mut view = state.view.lock().await;
    view.set_tag_draft(&tag);
    view.add_tag().await?;
    Ok(view.render())
}

#[tauri::command]
pub async fn quick_tag(state: State<'_, DashboardState>, tag: QuickTag) -> Result<DashboardModel, ErrorResponse> {
    let mut view = state.view.lock().await;
    view.quick_tag(tag).await?;
    Ok(view.render())
}

#[tauri::command]
pub async fn remove_tag(state: State<'_, DashboardState>, tag: String) -> Result<DashboardModel, ErrorResponse> {
    let mut view = state.view.lock().await;
    view.remove_tag(&tag).await?;
    Ok(view.render())
}

/// Upload a file picked with the dialog plugin
#[tauri::command]
pub async fn upload_video_file(
    state: State<'_, DashboardState>,
    path: PathBuf,
) -> Result<UploadAck, ErrorResponse> {
    let mut view = state.view.lock().await;
    Ok(view.upload_file(&path).await?)
}

/// Open the candidate link in the system browser
#[tauri::command]
pub async fn open_invite_link(app: tauri::AppHandle, state: State<'_, DashboardState>) -> Result<(), String> {
    let link = state.view.lock().await.invite_link();
    tracing::info!("Opening invite link {}", link);
    #[allow(deprecated)]
    app.shell().open(link, None).map_err(|e| e.to_string())
}
