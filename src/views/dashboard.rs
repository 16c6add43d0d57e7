//! Recruiter dashboard
//!
//! Works on one invite at a time. Every action goes through the data
//! client, which re-fetches after each write; the rendered invite is only
//! replaced by such a re-fetch. A failing action sets a banner and leaves the
//! rendered invite as it was.

use crate::api::invites::{Invite, InviteDataClient, QuickTag};
use crate::api::upload::{UploadAck, UploadClient};
use crate::config::AppConfig;
use crate::utils::error::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Dashboard actions, used to attribute errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DashboardAction {
    Load,
    Create,
    AddTag,
    QuickTag,
    RemoveTag,
    UploadFile,
}

/// Error banner for the last failed action
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Banner {
    pub action: DashboardAction,
    pub code: String,
    pub message: String,
}

/// Rendered dashboard state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardModel {
    pub invite_id: String,
    pub invite_link: String,
    pub tag_draft: String,
    pub invite: Option<Invite>,
    pub playback_url: Option<String>,
    pub quick_tags: Vec<QuickTag>,
    pub banner: Option<Banner>,
}

pub struct DashboardView {
    invites: InviteDataClient,
    uploader: UploadClient,
    app_base: String,
    invite_id: String,
    tag_draft: String,
    invite: Option<Invite>,
    banner: Option<Banner>,
}

impl DashboardView {
    pub fn new(invites: InviteDataClient, uploader: UploadClient, config: &AppConfig) -> Self {
        Self {
            invites,
            uploader,
            app_base: config.app_base.trim_end_matches('/').to_string(),
            invite_id: config.default_invite_id.clone(),
            tag_draft: String::new(),
            invite: None,
            banner: None,
        }
    }

    pub fn invite_id(&self) -> &str {
        &self.invite_id
    }

    /// Switch to another invite. The rendered invite is cleared until the
    /// next load.
    pub fn set_invite_id(&mut self, invite_id: &str) {
        let invite_id = invite_id.trim();
        if invite_id != self.invite_id {
            self.invite_id = invite_id.to_string();
            self.invite = self.invites.cached(invite_id);
            self.banner = None;
        }
    }

    pub fn set_tag_draft(&mut self, tag: &str) {
        self.tag_draft = tag.to_string();
    }

    /// Candidate-facing link for the current invite
    pub fn invite_link(&self) -> String {
        format!("{}/invite/{}", self.app_base, urlencoding::encode(&self.invite_id))
    }

    pub async fn load(&mut self) -> AppResult<Option<Invite>> {
        let result = self.invites.get(&self.invite_id).await.map_err(AppError::from);
        let invite = self.record(DashboardAction::Load, result)?;
        self.invite = invite.clone();
        Ok(invite)
    }

    pub async fn create(&mut self) -> AppResult<()> {
        let result = self.invites.create(&self.invite_id).await.map_err(AppError::from);
        self.record(DashboardAction::Create, result)?;
        self.invite = self.invites.cached(&self.invite_id);
        Ok(())
    }

    /// Add the drafted tag; the draft is cleared on success
    pub async fn add_tag(&mut self) -> AppResult<Invite> {
        let tag = self.tag_draft.clone();
        let invite = self.tag_action(DashboardAction::AddTag, &tag, true).await?;
        self.tag_draft.clear();
        Ok(invite)
    }

    pub async fn quick_tag(&mut self, tag: QuickTag) -> AppResult<Invite> {
        self.tag_action(DashboardAction::QuickTag, tag.as_str(), true).await
    }

    pub async fn remove_tag(&mut self, tag: &str) -> AppResult<Invite> {
        self.tag_action(DashboardAction::RemoveTag, tag, false).await
    }

    /// Upload a video file for the current invite, then re-fetch it
    pub async fn upload_file(&mut self, path: &Path) -> AppResult<UploadAck> {
        let result = self
            .uploader
            .upload_file(path, &self.invite_id)
            .await
            .map_err(AppError::from);
        let ack = self.record(DashboardAction::UploadFile, result)?;

        let refreshed = self.invites.get(&self.invite_id).await.map_err(AppError::from);
        self.invite = self.record(DashboardAction::UploadFile, refreshed)?;
        Ok(ack)
    }

    pub fn render(&self) -> DashboardModel {
        DashboardModel {
            invite_id: self.invite_id.clone(),
            invite_link: self.invite_link(),
            tag_draft: self.tag_draft.clone(),
            playback_url: self
                .invite
                .as_ref()
                .and_then(|i| i.playback_url(self.uploader.api_base())),
            invite: self.invite.clone(),
            quick_tags: QuickTag::ALL.to_vec(),
            banner: self.banner.clone(),
        }
    }

    async fn tag_action(&mut self, action: DashboardAction, tag: &str, add: bool) -> AppResult<Invite> {
        let result = if add {
            self.invites.add_tag(&self.invite_id, tag).await
        } else {
            self.invites.remove_tag(&self.invite_id, tag).await
        };
        let invite = self.record(action, result.map_err(AppError::from))?;
        self.invite = Some(invite.clone());
        Ok(invite)
    }

    fn record<T>(&mut self, action: DashboardAction, result: AppResult<T>) -> AppResult<T> {
        match &result {
            Ok(_) => self.banner = None,
            Err(e) => {
                tracing::warn!("Dashboard {:?} failed for {}: {}", action, self.invite_id, e);
                self.banner = Some(Banner {
                    action,
                    code: e.code().to_string(),
                    message: e.to_string(),
                });
            }
        }
        result
    }
}
