//! Unified API error handling
//!
//! Every failure leaves the service as `{error, code}` with a non-2xx status,
//! so callers can branch on the status code alone.

use axum::{
    extract::{
        multipart::{MultipartError, MultipartRejection},
        rejection::JsonRejection,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::services::extract::ExtractError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unsupported document: {0}")]
    UnsupportedDocument(String),

    #[error("Invalid upload: {0}")]
    Upload(#[from] MultipartError),

    /// Body the extractor refused before the handler ran; keeps axum's status.
    #[error("{message}")]
    Rejected {
        status: StatusCode,
        code: &'static str,
        message: String,
    },

    #[error("Completion API credential is not configured")]
    NotConfigured,

    #[error("Completion API error: {0}")]
    Upstream(String),

    #[error("Completion API timed out")]
    UpstreamTimeout,

    #[error("Invalid model output: {0}")]
    ModelOutput(#[from] ExtractError),

    #[error("Internal server error")]
    Internal(#[from] anyhow::Error),
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        let status = rejection.status();
        let code = match status {
            StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => {
                return Self::BadRequest(rejection.body_text())
            }
            StatusCode::PAYLOAD_TOO_LARGE => "PAYLOAD_TOO_LARGE",
            StatusCode::UNSUPPORTED_MEDIA_TYPE => "UNSUPPORTED_MEDIA_TYPE",
            _ => "BAD_REQUEST",
        };
        Self::Rejected {
            status,
            code,
            message: rejection.body_text(),
        }
    }
}

impl From<MultipartRejection> for ApiError {
    fn from(rejection: MultipartRejection) -> Self {
        Self::Rejected {
            status: rejection.status(),
            code: "INVALID_UPLOAD",
            message: rejection.body_text(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

impl ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::UnsupportedDocument(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Upload(e) => e.status(),
            Self::Rejected { status, .. } => *status,
            Self::NotConfigured => StatusCode::SERVICE_UNAVAILABLE,
            Self::Upstream(_) | Self::ModelOutput(_) => StatusCode::BAD_GATEWAY,
            Self::UpstreamTimeout => StatusCode::GATEWAY_TIMEOUT,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            Self::BadRequest(_) => "BAD_REQUEST",
            Self::NotFound(_) => "NOT_FOUND",
            Self::UnsupportedDocument(_) => "UNSUPPORTED_DOCUMENT",
            Self::Upload(_) => "INVALID_UPLOAD",
            Self::Rejected { code, .. } => *code,
            Self::NotConfigured => "COMPLETION_NOT_CONFIGURED",
            Self::Upstream(_) => "UPSTREAM_ERROR",
            Self::UpstreamTimeout => "UPSTREAM_TIMEOUT",
            Self::ModelOutput(_) => "INVALID_MODEL_OUTPUT",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    fn public_message(&self) -> String {
        match self {
            Self::BadRequest(msg) | Self::NotFound(msg) | Self::UnsupportedDocument(msg) => {
                msg.clone()
            }
            Self::Upload(e) => e.body_text(),
            Self::Rejected { message, .. } => message.clone(),
            // Don't leak internal error details
            Self::Internal(_) => "An internal error occurred".to_string(),
            _ => self.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match &self {
            Self::Internal(e) => {
                tracing::error!(error = ?e, "Internal server error");
            }
            Self::Upstream(_) | Self::UpstreamTimeout | Self::ModelOutput(_) => {
                tracing::error!(error = %self, "Contract analysis failed");
            }
            _ => {
                tracing::warn!(error = %self, "API error");
            }
        }

        let status = self.status_code();
        let body = ErrorResponse {
            error: self.public_message(),
            code: self.error_code().to_string(),
        };

        (status, Json(body)).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn render(err: ApiError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn upstream_failure_is_bad_gateway() {
        let (status, body) = render(ApiError::Upstream("503 Service Unavailable".into())).await;

        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["code"], "UPSTREAM_ERROR");
        assert!(body["error"].as_str().unwrap().contains("503"));
        assert!(body.get("contract_type").is_none());
    }

    #[tokio::test]
    async fn internal_errors_are_not_leaked() {
        let (status, body) =
            render(ApiError::Internal(anyhow::anyhow!("disk /var/secret is full"))).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "An internal error occurred");
    }

    #[tokio::test]
    async fn model_output_errors_carry_their_reason() {
        let (status, body) = render(ApiError::ModelOutput(ExtractError::NoJsonObject)).await;

        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["code"], "INVALID_MODEL_OUTPUT");
        assert!(body["error"].as_str().unwrap().contains("no JSON object"));
    }

    #[tokio::test]
    async fn rejections_keep_their_status_and_code() {
        let (status, body) = render(ApiError::Rejected {
            status: StatusCode::PAYLOAD_TOO_LARGE,
            code: "PAYLOAD_TOO_LARGE",
            message: "Failed to buffer the request body: length limit exceeded".into(),
        })
        .await;

        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(body["code"], "PAYLOAD_TOO_LARGE");
        assert!(body["error"].as_str().unwrap().contains("length limit"));
    }
}
