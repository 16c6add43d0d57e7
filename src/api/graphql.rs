//! Minimal GraphQL client over [`HttpTransport`]
//!
//! Only the four operations the screening API exposes are used, so this is
//! a thin envelope codec rather than a general client.

use super::transport::{HttpRequest, HttpTransport, TransportError};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

pub const GET_VIDEO: &str = r#"query GetVideo($id: String!) {
  video(inviteId: $id) {
    inviteId
    url
    tags
  }
}"#;

pub const CREATE_INVITE: &str = r#"mutation CreateInvite($id: String!) {
  createInvite(inviteId: $id)
}"#;

pub const ADD_TAG: &str = r#"mutation AddTag($id: String!, $tag: String!) {
  addTag(inviteId: $id, tag: $tag) {
    inviteId
    url
    tags
  }
}"#;

pub const REMOVE_TAG: &str = r#"mutation RemoveTag($id: String!, $tag: String!) {
  removeTag(inviteId: $id, tag: $tag) {
    inviteId
    url
    tags
  }
}"#;

/// One entry of the `errors` array
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphqlErrorMessage {
    pub message: String,
    #[serde(default)]
    pub extensions: Option<ErrorExtensions>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorExtensions {
    #[serde(default)]
    pub code: Option<String>,
}

impl GraphqlErrorMessage {
    pub fn code(&self) -> Option<&str> {
        self.extensions.as_ref().and_then(|e| e.code.as_deref())
    }
}

/// GraphQL errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphqlError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("GraphQL endpoint returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Malformed GraphQL response: {0}")]
    Decode(String),

    #[error("GraphQL error: {}", join_messages(.0))]
    Server(Vec<GraphqlErrorMessage>),
}

fn join_messages(errors: &[GraphqlErrorMessage]) -> String {
    errors
        .iter()
        .map(|e| e.message.as_str())
        .collect::<Vec<_>>()
        .join("; ")
}

impl GraphqlError {
    /// Whether any server error carries `code` (or mentions it in the text)
    pub fn has_code(&self, code: &str) -> bool {
        let needle = code.replace('_', " ").to_ascii_lowercase();
        match self {
            GraphqlError::Server(errors) => errors.iter().any(|e| {
                e.code() == Some(code) || e.message.to_ascii_lowercase().contains(&needle)
            }),
            _ => false,
        }
    }
}

#[derive(Debug, Serialize)]
struct RequestEnvelope<'a, V: Serialize> {
    query: &'a str,
    variables: V,
}

#[derive(Debug, Deserialize)]
struct ResponseEnvelope<T> {
    data: Option<T>,
    #[serde(default)]
    errors: Vec<GraphqlErrorMessage>,
}

/// Executes queries and mutations against one endpoint
pub struct GraphqlClient {
    transport: Arc<dyn HttpTransport>,
    endpoint: String,
    timeout: Duration,
}

impl GraphqlClient {
    pub fn new(transport: Arc<dyn HttpTransport>, endpoint: impl Into<String>, timeout: Duration) -> Self {
        Self {
            transport,
            endpoint: endpoint.into(),
            timeout,
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Run one operation and decode its `data`
    pub async fn execute<V, T>(&self, query: &str, variables: V) -> Result<T, GraphqlError>
    where
        V: Serialize + Send,
        T: DeserializeOwned,
    {
        let envelope = RequestEnvelope { query, variables };
        let body = serde_json::to_value(&envelope).map_err(|e| GraphqlError::Decode(e.to_string()))?;
        let request = HttpRequest::post_json(self.endpoint.clone(), body).with_timeout(self.timeout);

        let response = self.transport.send(request).await?;

        // GraphQL servers may report errors with a 4xx/5xx and a JSON body;
        // prefer the structured errors when present.
        let parsed: Result<ResponseEnvelope<T>, _> = serde_json::from_slice(&response.body);
        match parsed {
            Ok(envelope) if !envelope.errors.is_empty() => Err(GraphqlError::Server(envelope.errors)),
            _ if !response.is_success() => Err(GraphqlError::Status {
                status: response.status,
                body: response.text(),
            }),
            Ok(envelope) => envelope
                .data
                .ok_or_else(|| GraphqlError::Decode("response has neither data nor errors".to_string())),
            Err(e) => Err(GraphqlError::Decode(e.to_string())),
        }
    }
}
