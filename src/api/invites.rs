//! Invite records
//!
//! [`InviteDataClient`] wraps the four GraphQL operations on invites. Every
//! successful mutation is followed by a fresh `video` query, and only that
//! re-fetch updates the local cache. There is no optimistic update.

use super::graphql::{GraphqlClient, GraphqlError, ADD_TAG, CREATE_INVITE, GET_VIDEO, REMOVE_TAG};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::{BTreeSet, HashMap};
use thiserror::Error;

/// Invite data errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InviteError {
    #[error("Invalid invite ID")]
    InvalidInvite,

    #[error("Invite not found: {0}")]
    NotFound(String),

    #[error("Invite already exists: {0}")]
    AlreadyExists(String),

    #[error("Tag must not be empty")]
    EmptyTag,

    #[error(transparent)]
    Graphql(#[from] GraphqlError),
}

pub type InviteResult<T> = Result<T, InviteError>;

/// A recruiter-created invite as the server reports it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Invite {
    pub invite_id: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub tags: BTreeSet<String>,
}

impl Invite {
    pub fn has_video(&self) -> bool {
        self.url.as_deref().is_some_and(|u| !u.is_empty())
    }

    /// Playable URL for the uploaded video. Server-relative paths such as
    /// `app/uploads/x.webm` are joined onto `api_base`.
    pub fn playback_url(&self, api_base: &str) -> Option<String> {
        let url = self.url.as_deref().filter(|u| !u.is_empty())?;
        if url.starts_with("http://") || url.starts_with("https://") {
            Some(url.to_string())
        } else {
            Some(format!(
                "{}/{}",
                api_base.trim_end_matches('/'),
                url.trim_start_matches('/')
            ))
        }
    }
}

/// One-click tags offered on the dashboard
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QuickTag {
    Proceed,
    Revisit,
    Reject,
}

impl QuickTag {
    pub const ALL: [QuickTag; 3] = [QuickTag::Proceed, QuickTag::Revisit, QuickTag::Reject];

    pub fn as_str(&self) -> &'static str {
        match self {
            QuickTag::Proceed => "Proceed",
            QuickTag::Revisit => "Revisit",
            QuickTag::Reject => "Reject",
        }
    }
}

impl std::fmt::Display for QuickTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Deserialize)]
struct VideoData {
    video: Option<Invite>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateData {
    create_invite: CreateResult,
}

/// `createInvite` answers either a flag or the id of the stored invite
#[derive(Deserialize)]
#[serde(untagged)]
enum CreateResult {
    Flag(bool),
    Id(String),
}

impl CreateResult {
    fn created(&self) -> bool {
        match self {
            CreateResult::Flag(created) => *created,
            CreateResult::Id(_) => true,
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AddTagData {
    add_tag: Option<Invite>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RemoveTagData {
    remove_tag: Option<Invite>,
}

/// GraphQL-backed accessor for invites with a re-fetch cache
pub struct InviteDataClient {
    graphql: GraphqlClient,
    cache: RwLock<HashMap<String, Invite>>,
}

impl InviteDataClient {
    pub fn new(graphql: GraphqlClient) -> Self {
        Self {
            graphql,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Last fetched copy of an invite
    pub fn cached(&self, invite_id: &str) -> Option<Invite> {
        self.cache.read().get(invite_id.trim()).cloned()
    }

    /// Fetch an invite; `None` if it has not been created
    pub async fn get(&self, invite_id: &str) -> InviteResult<Option<Invite>> {
        let id = normalize_id(invite_id)?;
        tracing::debug!("Fetching invite {}", id);

        let data: VideoData = self.graphql.execute(GET_VIDEO, json!({ "id": id })).await?;
        let mut cache = self.cache.write();
        match &data.video {
            Some(invite) => {
                cache.insert(id.to_string(), invite.clone());
            }
            None => {
                cache.remove(id);
            }
        }
        Ok(data.video)
    }

    /// Create an invite. Fails with [`InviteError::AlreadyExists`] if the id
    /// is taken.
    pub async fn create(&self, invite_id: &str) -> InviteResult<()> {
        let id = normalize_id(invite_id)?;
        tracing::info!("Creating invite {}", id);

        let created = match self
            .graphql
            .execute::<_, CreateData>(CREATE_INVITE, json!({ "id": id }))
            .await
        {
            Ok(data) => data.create_invite.created(),
            Err(e) if e.has_code("ALREADY_EXISTS") => false,
            Err(e) => return Err(e.into()),
        };
        if !created {
            tracing::warn!("Invite {} already exists", id);
            return Err(InviteError::AlreadyExists(id.to_string()));
        }

        self.get(id).await?;
        Ok(())
    }

    /// Add a tag and return the re-fetched invite
    pub async fn add_tag(&self, invite_id: &str, tag: &str) -> InviteResult<Invite> {
        let id = normalize_id(invite_id)?;
        let tag = normalize_tag(tag)?;
        tracing::info!("Adding tag '{}' to invite {}", tag, id);

        let result = self
            .graphql
            .execute::<_, AddTagData>(ADD_TAG, json!({ "id": id, "tag": tag }))
            .await
            .map(|d| d.add_tag);
        self.refetch_after(id, result).await
    }

    /// Remove a tag and return the re-fetched invite
    pub async fn remove_tag(&self, invite_id: &str, tag: &str) -> InviteResult<Invite> {
        let id = normalize_id(invite_id)?;
        let tag = normalize_tag(tag)?;
        tracing::info!("Removing tag '{}' from invite {}", tag, id);

        let result = self
            .graphql
            .execute::<_, RemoveTagData>(REMOVE_TAG, json!({ "id": id, "tag": tag }))
            .await
            .map(|d| d.remove_tag);
        self.refetch_after(id, result).await
    }

    async fn refetch_after(
        &self,
        id: &str,
        mutation: Result<Option<Invite>, GraphqlError>,
    ) -> InviteResult<Invite> {
        match mutation {
            Ok(Some(_)) => {}
            Ok(None) => return Err(InviteError::NotFound(id.to_string())),
            Err(e) if e.has_code("NOT_FOUND") => return Err(InviteError::NotFound(id.to_string())),
            Err(e) => return Err(e.into()),
        }

        self.get(id)
            .await?
            .ok_or_else(|| InviteError::NotFound(id.to_string()))
    }
}

fn normalize_id(invite_id: &str) -> InviteResult<&str> {
    let id = invite_id.trim();
    if id.is_empty() {
        Err(InviteError::InvalidInvite)
    } else {
        Ok(id)
    }
}

fn normalize_tag(tag: &str) -> InviteResult<&str> {
    let tag = tag.trim();
    if tag.is_empty() {
        Err(InviteError::EmptyTag)
    } else {
        Ok(tag)
    }
}
