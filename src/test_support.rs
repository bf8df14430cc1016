//! Shared fixtures for unit and router tests.

use axum::{
    extract::State,
    http::{
        header::{AUTHORIZATION, RETRY_AFTER},
        HeaderMap, StatusCode,
    },
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::app::{create_app, AppState};
use crate::config::{CompletionSettings, CorsOrigins, Environment, Settings};
use crate::middleware::request_id::X_REQUEST_ID;
use crate::services::{CompletionClient, ContractStore};

/// Completion settings pointed at `api_url` with retries disabled.
pub fn completion_settings(api_url: &str) -> CompletionSettings {
    CompletionSettings {
        api_url: api_url.to_string(),
        api_key: Some("sk-test".to_string()),
        model: "deepseek-chat".to_string(),
        temperature: 0.3,
        max_tokens: 2000,
        timeout_seconds: 5,
        json_mode: true,
        retry_max_elapsed_seconds: 0,
    }
}

pub fn settings(upload_dir: &Path, api_url: &str) -> Settings {
    Settings {
        env: Environment::Dev,
        server_addr: "127.0.0.1:0".to_string(),
        cors_allow_origins: CorsOrigins::Any,
        upload_dir: upload_dir.to_path_buf(),
        upload_max_bytes: 1024 * 1024,
        completion: completion_settings(api_url),
    }
}

/// Fully layered application built from `settings`.
pub async fn app_with(settings: Settings) -> Router {
    let completion = CompletionClient::new(&settings.completion).unwrap();
    let store = ContractStore::open(&settings.upload_dir).await.unwrap();
    create_app(AppState::new(settings, completion, store))
}

/// Application backed by `upload_dir` and the completion API at `api_url`.
pub async fn app(upload_dir: &Path, api_url: &str) -> Router {
    app_with(settings(upload_dir, api_url)).await
}

/// Body of a successful chat completion carrying `content`.
pub fn completion_body(content: &str) -> Value {
    json!({
        "id": "chatcmpl-test",
        "object": "chat.completion",
        "model": "deepseek-chat",
        "choices": [{
            "index": 0,
            "message": {"role": "assistant", "content": content},
            "finish_reason": "stop"
        }]
    })
}

#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub authorization: Option<String>,
    pub request_id: Option<String>,
    pub body: Value,
}

/// One canned answer of the fake completion API.
#[derive(Debug, Clone)]
pub struct FakeReply {
    pub status: StatusCode,
    pub body: Value,
    pub retry_after: Option<u64>,
    pub delay: Option<Duration>,
}

impl FakeReply {
    pub fn new(status: StatusCode, body: Value) -> Self {
        Self {
            status,
            body,
            retry_after: None,
            delay: None,
        }
    }

    pub fn retry_after(mut self, seconds: u64) -> Self {
        self.retry_after = Some(seconds);
        self
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

#[derive(Clone)]
struct FakeState {
    scripted: Arc<Mutex<VecDeque<FakeReply>>>,
    fallback: FakeReply,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

/// A completion API stand-in listening on an ephemeral local port.
///
/// Scripted replies are served first, then the fallback for every call.
pub struct FakeCompletionApi {
    pub url: String,
    state: FakeState,
}

impl FakeCompletionApi {
    pub async fn replying_with(content: &str) -> Self {
        Self::raw(StatusCode::OK, completion_body(content)).await
    }

    pub async fn failing_with(status: StatusCode, body: Value) -> Self {
        Self::raw(status, body).await
    }

    pub async fn failing_then_replying(failures: usize, content: &str) -> Self {
        let scripted = (0..failures)
            .map(|_| {
                FakeReply::new(
                    StatusCode::SERVICE_UNAVAILABLE,
                    json!({"error": {"message": "Server overloaded"}}),
                )
            })
            .collect();
        Self::start(scripted, FakeReply::new(StatusCode::OK, completion_body(content))).await
    }

    pub async fn raw(status: StatusCode, body: Value) -> Self {
        Self::always(FakeReply::new(status, body)).await
    }

    /// Serve `reply` for every request.
    pub async fn always(reply: FakeReply) -> Self {
        Self::start(VecDeque::new(), reply).await
    }

    async fn start(scripted: VecDeque<FakeReply>, fallback: FakeReply) -> Self {
        let state = FakeState {
            scripted: Arc::new(Mutex::new(scripted)),
            fallback,
            requests: Arc::new(Mutex::new(Vec::new())),
        };

        let app = Router::new()
            .route("/v1/chat/completions", post(handle_completion))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            url: format!("http://{addr}/v1/chat/completions"),
            state,
        }
    }

    pub fn last_request(&self) -> Option<RecordedRequest> {
        self.state.requests.lock().unwrap().last().cloned()
    }

    pub fn request_count(&self) -> usize {
        self.state.requests.lock().unwrap().len()
    }
}

async fn handle_completion(
    State(state): State<FakeState>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };

    state.requests.lock().unwrap().push(RecordedRequest {
        authorization: header(AUTHORIZATION.as_str()),
        request_id: header(X_REQUEST_ID),
        body,
    });

    let reply = state
        .scripted
        .lock()
        .unwrap()
        .pop_front()
        .unwrap_or_else(|| state.fallback.clone());

    if let Some(delay) = reply.delay {
        tokio::time::sleep(delay).await;
    }

    let mut response = (reply.status, Json(reply.body)).into_response();
    if let Some(seconds) = reply.retry_after {
        response
            .headers_mut()
            .insert(RETRY_AFTER, seconds.to_string().parse().unwrap());
    }
    response
}
