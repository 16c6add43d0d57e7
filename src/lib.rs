//! Video Screening - record, upload and review candidate video responses.
//!
//! The library core (capture, recorder, api, views) runs anywhere tokio does.
//! The `desktop` feature adds the Tauri shell and its commands.

pub mod api;
pub mod capture;
#[cfg(feature = "desktop")]
pub mod commands;
pub mod config;
pub mod recorder;
pub mod utils;
pub mod views;

#[cfg(test)]
pub(crate) mod testing;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize tracing/logging. Safe to call more than once.
pub fn init_logging() {
    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "video_screening=debug,tauri=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}

#[cfg(feature = "desktop")]
fn load_config() -> anyhow::Result<config::AppConfig> {
    use anyhow::Context;
    config::AppConfig::load().context("failed to load configuration")
}

/// Initialize the application
#[cfg(feature = "desktop")]
#[cfg_attr(mobile, tauri::mobile_entry_point)]
pub fn run() {
    use api::{GraphqlClient, InviteDataClient, ReqwestTransport, UploadClient};
    use commands::dashboard::DashboardState;
    use commands::recording::RecorderState;
    use std::sync::Arc;
    use tauri::Manager;
    use views::DashboardView;

    init_logging();
    tracing::info!("Starting Video Screening v{}", env!("CARGO_PKG_VERSION"));

    let config = load_config().unwrap_or_else(|e| {
        tracing::error!("{:#}; using defaults", e);
        config::AppConfig::default()
    });
    tracing::info!(
        "API base {}, GraphQL {}, max recording {}s",
        config.api_base,
        config.graphql_endpoint(),
        config.max_recording_secs
    );

    let transport = Arc::new(ReqwestTransport::new());
    let uploader = UploadClient::new(transport.clone(), &config.api_base, config.request_timeout());
    let invites = InviteDataClient::new(GraphqlClient::new(
        transport,
        config.graphql_endpoint(),
        config.request_timeout(),
    ));
    let dashboard = DashboardState::new(DashboardView::new(invites, uploader.clone(), &config));
    let (recorder, ticks) = RecorderState::new(&config, uploader);

    tauri::Builder::default()
        .plugin(tauri_plugin_shell::init())
        .plugin(tauri_plugin_dialog::init())
        .manage(dashboard)
        .setup(move |app| {
            recorder.spawn_tick_pump(app.handle().clone(), ticks);
            app.manage(recorder);
            Ok(())
        })
        .invoke_handler(tauri::generate_handler![
            // Device commands
            commands::recording::get_cameras,
            commands::recording::get_audio_devices,
            // Recording commands
            commands::recording::open_invite_page,
            commands::recording::close_invite_page,
            commands::recording::get_recording_page,
            commands::recording::prepare_recorder,
            commands::recording::start_recording,
            commands::recording::stop_recording,
            commands::recording::reset_recording,
            commands::recording::set_recorder_disabled,
            commands::recording::upload_recording,
            // Dashboard commands
            commands::dashboard::get_dashboard,
            commands::dashboard::load_invite,
            commands::dashboard::create_invite,
            commands::dashboard::add_tag,
            commands::dashboard::quick_tag,
            commands::dashboard::remove_tag,
            commands::dashboard::upload_video_file,
            commands::dashboard::open_invite_link,
        ])
        .run(tauri::generate_context!())
        .expect("error while running tauri application");
}
