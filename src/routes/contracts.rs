//! Contract upload and role-specific analysis endpoints.

use axum::{
    extract::{multipart::MultipartRejection, rejection::JsonRejection, Multipart, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use std::sync::Arc;

use crate::app::AppState;
use crate::domain::{AnalysisRequest, AnalysisResult, ContractSource, UploadedContract};
use crate::error::{ApiError, ApiResult};
use crate::middleware::request_id::RequestIdExt;
use crate::services::{extract, prompt};

/// Name of the multipart field carrying the contract file.
const FILE_FIELD: &str = "file";

/// Store an uploaded contract file.
///
/// POST /upload-contract
pub async fn upload_contract(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<impl IntoResponse> {
    let mut multipart = multipart?;

    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }

        let filename = field.file_name().map(str::to_string);
        let bytes = field.bytes().await?;
        let file_id = state.store.save(&bytes).await?;

        tracing::info!(
            request_id = headers.log_request_id(),
            file_id = %file_id,
            filename = filename.as_deref().unwrap_or("-"),
            size = bytes.len(),
            "Contract uploaded"
        );

        return Ok((
            StatusCode::CREATED,
            Json(UploadedContract {
                file_id,
                filename,
                size_bytes: bytes.len() as u64,
            }),
        ));
    }

    Err(ApiError::BadRequest(format!(
        "multipart field `{FILE_FIELD}` is required"
    )))
}

/// Review a contract from the perspective of `role`.
///
/// POST /analyze-contract
pub async fn analyze_contract(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    payload: Result<Json<AnalysisRequest>, JsonRejection>,
) -> ApiResult<Json<AnalysisResult>> {
    let Json(req) = payload?;
    let (role, source) = req.validate()?;
    let request_id = headers.request_id();
    let log_id = headers.log_request_id();

    let contract_text = match source {
        ContractSource::Inline(text) => text,
        ContractSource::Uploaded(file_id) => {
            let text = state.store.load_text(file_id).await?;
            if text.trim().is_empty() {
                return Err(ApiError::BadRequest(format!(
                    "uploaded contract {file_id} is empty"
                )));
            }
            text
        }
    };

    tracing::info!(
        request_id = log_id,
        role = %role,
        chars = contract_text.chars().count(),
        "Analyzing contract"
    );

    let messages = prompt::build_review_messages(&role, &contract_text);
    let reply = state.completion.complete(&messages, request_id).await?;
    let result = extract::extract_analysis(&reply)?;

    tracing::info!(
        request_id = log_id,
        contract_type = %result.contract_type,
        risks = result.risks.len(),
        recommendations = result.recommendations.len(),
        "Contract analysis complete"
    );

    Ok(Json(result))
}
