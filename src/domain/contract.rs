//! Contract review domain models.
//!
//! `AnalysisResult` is the schema the completion API is instructed to
//! produce; it is validated before anything is returned to the caller.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ApiError;

/// Structured contract review produced by the model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub contract_type: String,
    pub risks: Vec<String>,
    pub recommendations: Vec<String>,
    pub role_perspective: String,
}

// =============================================================================
// Request/Response DTOs for API endpoints
// =============================================================================

/// Request for contract analysis.
///
/// The contract is given either inline or as the id of an earlier upload.
#[derive(Debug, Clone, Deserialize)]
pub struct AnalysisRequest {
    pub role: String,
    #[serde(default)]
    pub contract_text: Option<String>,
    #[serde(default)]
    pub file_id: Option<Uuid>,
}

/// Where the contract text comes from once a request has been validated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContractSource {
    Inline(String),
    Uploaded(Uuid),
}

impl AnalysisRequest {
    /// Check the request and split it into the trimmed role and the text source.
    pub fn validate(self) -> Result<(String, ContractSource), ApiError> {
        let role = self.role.trim();
        if role.is_empty() {
            return Err(ApiError::BadRequest("role must not be empty".to_string()));
        }

        let source = match (self.contract_text, self.file_id) {
            (Some(_), Some(_)) => {
                return Err(ApiError::BadRequest(
                    "provide either contract_text or file_id, not both".to_string(),
                ))
            }
            (None, None) => {
                return Err(ApiError::BadRequest(
                    "one of contract_text or file_id is required".to_string(),
                ))
            }
            (Some(text), None) => {
                if text.trim().is_empty() {
                    return Err(ApiError::BadRequest(
                        "contract_text must not be empty".to_string(),
                    ));
                }
                ContractSource::Inline(text)
            }
            (None, Some(id)) => ContractSource::Uploaded(id),
        };

        Ok((role.to_string(), source))
    }
}

/// Response for a stored upload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadedContract {
    pub file_id: Uuid,
    pub filename: Option<String>,
    pub size_bytes: u64,
}
