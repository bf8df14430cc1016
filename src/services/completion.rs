//! Client for the OpenAI-compatible chat-completion API (DeepSeek by default).
//!
//! One shared `reqwest::Client` with a request timeout. Connect errors,
//! timeouts, 429 and 5xx responses are retried with exponential backoff;
//! everything else fails on the first attempt.

use anyhow::{Context, Result};
use backoff::ExponentialBackoff;
use reqwest::{header::RETRY_AFTER, Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, error, instrument, warn};

use crate::config::CompletionSettings;
use crate::error::ApiError;
use crate::middleware::request_id::X_REQUEST_ID;

/// One message of the conversation sent to the model.
#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    pub role: &'static str,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system",
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user",
            content: content.into(),
        }
    }
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Serialize)]
struct ResponseFormat {
    r#type: &'static str,
}

#[derive(Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Error body returned by the completion API.
#[derive(Debug, Deserialize)]
struct CompletionErrorResponse {
    error: CompletionErrorDetail,
}

#[derive(Debug, Deserialize)]
struct CompletionErrorDetail {
    message: String,
}

/// Client for the completion API.
#[derive(Clone)]
pub struct CompletionClient {
    client: Client,
    api_url: String,
    api_key: Option<String>,
    model: String,
    temperature: f32,
    max_tokens: u32,
    json_mode: bool,
    retry_max_elapsed: Duration,
}

impl CompletionClient {
    /// Create a new completion API client.
    pub fn new(settings: &CompletionSettings) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_seconds))
            .build()
            .context("Failed to create HTTP client")?;

        tracing::info!(
            api_url = %settings.api_url,
            model = %settings.model,
            json_mode = settings.json_mode,
            "Completion client initialized"
        );

        Ok(Self {
            client,
            api_url: settings.api_url.clone(),
            api_key: settings.api_key.clone(),
            model: settings.model.clone(),
            temperature: settings.temperature,
            max_tokens: settings.max_tokens,
            json_mode: settings.json_mode,
            retry_max_elapsed: Duration::from_secs(settings.retry_max_elapsed_seconds),
        })
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    /// Send the conversation and return the first choice's text content.
    #[instrument(skip(self, messages), fields(model = %self.model))]
    pub async fn complete(
        &self,
        messages: &[ChatMessage],
        request_id: Option<&str>,
    ) -> Result<String, ApiError> {
        let api_key = self.api_key.as_deref().ok_or(ApiError::NotConfigured)?;

        let body = CompletionRequest {
            model: &self.model,
            messages,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            response_format: self.json_mode.then_some(ResponseFormat {
                r#type: "json_object",
            }),
        };

        if self.retry_max_elapsed.is_zero() {
            return self
                .send(api_key, &body, request_id)
                .await
                .map_err(into_inner);
        }

        let policy = ExponentialBackoff {
            max_elapsed_time: Some(self.retry_max_elapsed),
            ..ExponentialBackoff::default()
        };

        // backoff honours Retry-After without consulting max_elapsed_time
        let body = &body;
        let budget = self.retry_max_elapsed;
        let started = Instant::now();

        backoff::future::retry_notify(
            policy,
            move || async move {
                self.send(api_key, body, request_id)
                    .await
                    .map_err(|err| bound_retry_after(err, started.elapsed(), budget))
            },
            |err: ApiError, wait: Duration| {
                warn!(error = %err, retry_in_ms = wait.as_millis() as u64, "Retrying completion request");
            },
        )
        .await
    }

    async fn send(
        &self,
        api_key: &str,
        body: &CompletionRequest<'_>,
        request_id: Option<&str>,
    ) -> Result<String, backoff::Error<ApiError>> {
        let mut req = self.client.post(&self.api_url).bearer_auth(api_key);

        if let Some(rid) = request_id {
            req = req.header(X_REQUEST_ID, rid);
        }

        debug!(url = %self.api_url, "Completion API request");

        let response = req.json(body).send().await.map_err(|e| {
            error!(error = %e, "Completion API request failed");
            if e.is_timeout() {
                backoff::Error::transient(ApiError::UpstreamTimeout)
            } else if e.is_connect() {
                backoff::Error::transient(ApiError::Upstream(format!(
                    "completion API unavailable: {e}"
                )))
            } else {
                backoff::Error::permanent(ApiError::Upstream(format!(
                    "completion API request failed: {e}"
                )))
            }
        })?;

        let status = response.status();

        if !status.is_success() {
            let retry_after = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok())
                .map(Duration::from_secs);

            let detail = response
                .json::<CompletionErrorResponse>()
                .await
                .ok()
                .map(|e| e.error.message);

            let message = match detail {
                Some(detail) => format!("completion API returned {status}: {detail}"),
                None => format!("completion API returned {status}"),
            };

            if status == StatusCode::UNAUTHORIZED {
                error!("Completion API authentication failed");
            } else {
                error!(status = %status, message = %message, "Completion API error");
            }

            let err = ApiError::Upstream(message);
            return Err(match (status, retry_after) {
                (StatusCode::TOO_MANY_REQUESTS, Some(wait)) => backoff::Error::retry_after(err, wait),
                (s, _) if s == StatusCode::TOO_MANY_REQUESTS || s.is_server_error() => {
                    backoff::Error::transient(err)
                }
                _ => backoff::Error::permanent(err),
            });
        }

        let completion = response.json::<CompletionResponse>().await.map_err(|e| {
            error!(error = %e, "Failed to parse completion API response");
            backoff::Error::permanent(ApiError::Upstream(format!(
                "invalid completion API response: {e}"
            )))
        })?;

        completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| {
                backoff::Error::permanent(ApiError::Upstream(
                    "completion API returned no message content".to_string(),
                ))
            })
    }
}

/// Turn a server-requested wait that would overrun `budget` into a permanent failure.
fn bound_retry_after(
    err: backoff::Error<ApiError>,
    elapsed: Duration,
    budget: Duration,
) -> backoff::Error<ApiError> {
    match err {
        backoff::Error::Transient {
            err,
            retry_after: Some(wait),
        } if elapsed + wait > budget => {
            warn!(
                retry_after_secs = wait.as_secs(),
                elapsed_ms = elapsed.as_millis() as u64,
                "Retry-After exceeds the retry budget, giving up"
            );
            backoff::Error::permanent(err)
        }
        other => other,
    }
}

fn into_inner(err: backoff::Error<ApiError>) -> ApiError {
    match err {
        backoff::Error::Permanent(err) => err,
        backoff::Error::Transient { err, .. } => err,
    }
}
