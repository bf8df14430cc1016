use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;
use std::sync::Arc;

use crate::app::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub services: ServiceHealth,
}

#[derive(Serialize)]
pub struct ServiceHealth {
    pub completion_api: String,
    pub upload_dir: String,
}

/// Health check endpoint
pub async fn health_check(
    State(state): State<Arc<AppState>>,
) -> (StatusCode, Json<HealthResponse>) {
    let completion_ok = state.completion.is_configured();
    let upload_result = state.store.health_check().await;

    if let Err(e) = &upload_result {
        tracing::warn!(error = %e, "Upload directory unavailable");
    }

    let completion_status = if completion_ok { "ok" } else { "not_configured" };
    let upload_status = if upload_result.is_ok() { "ok" } else { "error" };

    // Uploads are local and critical; a missing credential only degrades analysis
    let status = match (upload_result.is_ok(), completion_ok) {
        (true, true) => "healthy",
        (true, false) => "degraded",
        (false, _) => "unhealthy",
    };

    let status_code = if status == "unhealthy" {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::OK
    };

    (
        status_code,
        Json(HealthResponse {
            status: status.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            services: ServiceHealth {
                completion_api: completion_status.to_string(),
                upload_dir: upload_status.to_string(),
            },
        }),
    )
}
