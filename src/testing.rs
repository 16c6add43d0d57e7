//! Test doubles shared by the unit tests

use crate::api::transport::{HttpRequest, HttpResponse, HttpTransport, RequestBody, TransportError};
use crate::capture::{
    CaptureError, CaptureResult, ChunkSink, EncoderHandle, MediaConstraints, MediaDevices,
    MediaStream, StreamInfo,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Media devices whose encoder emits a fixed chunk sequence
pub(crate) struct FakeDevices {
    chunks: Vec<Vec<u8>>,
    acquire_error: Option<CaptureError>,
    encoder_error: Option<String>,
    acquisitions: AtomicUsize,
}

impl FakeDevices {
    pub fn with_chunks(chunks: Vec<Vec<u8>>) -> Arc<Self> {
        Arc::new(Self {
            chunks,
            acquire_error: None,
            encoder_error: None,
            acquisitions: AtomicUsize::new(0),
        })
    }

    pub fn failing(error: CaptureError) -> Arc<Self> {
        Arc::new(Self {
            chunks: Vec::new(),
            acquire_error: Some(error),
            encoder_error: None,
            acquisitions: AtomicUsize::new(0),
        })
    }

    pub fn with_encoder_failure(message: &str) -> Arc<Self> {
        Arc::new(Self {
            chunks: Vec::new(),
            acquire_error: None,
            encoder_error: Some(message.to_string()),
            acquisitions: AtomicUsize::new(0),
        })
    }

    pub fn acquisitions(&self) -> usize {
        self.acquisitions.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MediaDevices for FakeDevices {
    async fn acquire(&self, constraints: MediaConstraints) -> CaptureResult<Box<dyn MediaStream>> {
        let n = self.acquisitions.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = &self.acquire_error {
            return Err(error.clone());
        }
        Ok(Box::new(FakeStream {
            info: StreamInfo {
                id: format!("fake-stream-{n}"),
                video_label: constraints.video.then(|| "Fake Camera".to_string()),
                audio_label: constraints.audio.then(|| "Fake Microphone".to_string()),
            },
            live: true,
            chunks: self.chunks.clone(),
            encoder_error: self.encoder_error.clone(),
        }))
    }
}

struct FakeStream {
    info: StreamInfo,
    live: bool,
    chunks: Vec<Vec<u8>>,
    encoder_error: Option<String>,
}

#[async_trait]
impl MediaStream for FakeStream {
    fn info(&self) -> &StreamInfo {
        &self.info
    }

    fn is_live(&self) -> bool {
        self.live
    }

    async fn start_encoder(
        &mut self,
        _mime_type: &str,
        sink: ChunkSink,
    ) -> CaptureResult<Box<dyn EncoderHandle>> {
        if let Some(message) = &self.encoder_error {
            return Err(CaptureError::Encoder(message.clone()));
        }
        for chunk in &self.chunks {
            let _ = sink.send(chunk.clone());
        }
        Ok(Box::new(FakeEncoder { _sink: sink }))
    }

    fn release(&mut self) {
        self.live = false;
    }
}

/// Holds the sink open until finished
struct FakeEncoder {
    _sink: ChunkSink,
}

#[async_trait]
impl EncoderHandle for FakeEncoder {
    async fn finish(self: Box<Self>) -> CaptureResult<()> {
        Ok(())
    }

    fn abandon(self: Box<Self>) {}
}

/// Transport answering from a script, recording every request
pub(crate) struct FakeTransport {
    script: Mutex<VecDeque<Result<HttpResponse, TransportError>>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl FakeTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn respond(&self, status: u16, body: &str) {
        self.script.lock().push_back(Ok(HttpResponse {
            status,
            reason: None,
            body: body.as_bytes().to_vec(),
        }));
    }

    pub fn respond_with_reason(&self, status: u16, body: &str, reason: &str) {
        self.script.lock().push_back(Ok(HttpResponse {
            status,
            reason: Some(reason.to_string()),
            body: body.as_bytes().to_vec(),
        }));
    }

    pub fn fail(&self, error: TransportError) {
        self.script.lock().push_back(Err(error));
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl HttpTransport for FakeTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        self.requests.lock().push(request);
        self.script
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(TransportError::Other("no scripted response".to_string())))
    }
}

#[derive(Default)]
struct StoredInvite {
    url: Option<String>,
    tags: Vec<String>,
}

/// In-memory screening API: GraphQL invite operations plus the upload route
pub(crate) struct FakeGraphqlServer {
    invites: Mutex<BTreeMap<String, StoredInvite>>,
    operations: Mutex<Vec<String>>,
    error_codes: bool,
    dedup_tags: bool,
}

impl FakeGraphqlServer {
    fn build(error_codes: bool, dedup_tags: bool) -> Arc<Self> {
        Arc::new(Self {
            invites: Mutex::new(BTreeMap::new()),
            operations: Mutex::new(Vec::new()),
            error_codes,
            dedup_tags,
        })
    }

    /// `createInvite` answers `false` and tag mutations answer `null` when
    /// the invite state is wrong
    pub fn new() -> Arc<Self> {
        Self::build(false, true)
    }

    /// Wrong invite state is reported as GraphQL errors with codes
    pub fn with_error_codes() -> Arc<Self> {
        Self::build(true, true)
    }

    /// Server that stores a tag every time it is added
    pub fn allowing_duplicates() -> Arc<Self> {
        Self::build(false, false)
    }

    /// Operation names in the order they were received
    pub fn operations(&self) -> Vec<String> {
        self.operations.lock().clone()
    }

    pub fn video_url(&self, invite_id: &str) -> Option<String> {
        self.invites.lock().get(invite_id).and_then(|i| i.url.clone())
    }

    fn video_json(id: &str, invite: &StoredInvite) -> Value {
        json!({ "inviteId": id, "url": invite.url, "tags": invite.tags })
    }

    fn graphql(&self, query: &str, variables: &Value) -> Value {
        let id = variables["id"].as_str().unwrap_or_default().to_string();
        let tag = variables["tag"].as_str().unwrap_or_default().to_string();
        let mut invites = self.invites.lock();

        let op = if query.contains("createInvite") {
            "createInvite"
        } else if query.contains("addTag(") {
            "addTag"
        } else if query.contains("removeTag(") {
            "removeTag"
        } else if query.contains("video(") {
            "video"
        } else {
            "unknown"
        };
        self.operations.lock().push(op.to_string());

        match op {
            "createInvite" => {
                if invites.contains_key(&id) {
                    if self.error_codes {
                        return error_response("Invite already exists", "ALREADY_EXISTS");
                    }
                    return json!({ "data": { "createInvite": false } });
                }
                invites.insert(id, StoredInvite::default());
                json!({ "data": { "createInvite": true } })
            }
            "addTag" | "removeTag" => {
                let Some(invite) = invites.get_mut(&id) else {
                    if self.error_codes {
                        return error_response("Invite not found", "NOT_FOUND");
                    }
                    return json!({ "data": { op: null } });
                };
                if op == "addTag" {
                    if !self.dedup_tags || !invite.tags.contains(&tag) {
                        invite.tags.push(tag);
                    }
                } else {
                    invite.tags.retain(|t| *t != tag);
                }
                json!({ "data": { op: Self::video_json(&id, invite) } })
            }
            "video" => match invites.get(&id) {
                Some(invite) => json!({ "data": { "video": Self::video_json(&id, invite) } }),
                None => json!({ "data": { "video": null } }),
            },
            _ => error_response("Unknown operation", "BAD_REQUEST"),
        }
    }

    fn upload(&self, url: &str, file_name: Option<&str>) -> HttpResponse {
        self.operations.lock().push("upload".to_string());
        let segment = url.rsplit('/').next().unwrap_or_default();
        let id = urlencoding::decode(segment)
            .map(|s| s.into_owned())
            .unwrap_or_default();

        let mut invites = self.invites.lock();
        let Some(invite) = invites.get_mut(&id) else {
            return HttpResponse {
                status: 404,
                reason: Some("Not Found".to_string()),
                body: b"Invite not found".to_vec(),
            };
        };
        let video_url = format!("app/uploads/{}", file_name.unwrap_or("video.webm"));
        invite.url = Some(video_url.clone());
        ok_json(json!({ "status": "uploaded", "videoUrl": video_url }))
    }
}

fn error_response(message: &str, code: &str) -> Value {
    json!({
        "data": null,
        "errors": [{ "message": message, "extensions": { "code": code } }]
    })
}

fn ok_json(value: Value) -> HttpResponse {
    HttpResponse {
        status: 200,
        reason: Some("OK".to_string()),
        body: serde_json::to_vec(&value).unwrap(),
    }
}

#[async_trait]
impl HttpTransport for FakeGraphqlServer {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        match &request.body {
            RequestBody::Multipart(parts) if request.url.contains("/upload/") => {
                let file_name = parts
                    .iter()
                    .find(|p| p.name == "file")
                    .and_then(|p| p.file_name.as_deref());
                Ok(self.upload(&request.url, file_name))
            }
            RequestBody::Json(body) => {
                let query = body["query"].as_str().unwrap_or_default();
                Ok(ok_json(self.graphql(query, &body["variables"])))
            }
            _ => Ok(HttpResponse {
                status: 400,
                reason: Some("Bad Request".to_string()),
                body: b"unsupported request".to_vec(),
            }),
        }
    }
}
