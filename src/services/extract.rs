//! Recovery of the analysis JSON from free-form model output.
//!
//! Models wrap the requested object in prose, numbered lists or code fences
//! even when told not to. Rather than slicing from the first `{` to the last
//! `}`, every `{` is treated as a candidate start and followed to its
//! balancing `}` with string literals and escapes respected. The first
//! candidate that deserializes into [`AnalysisResult`] wins.

use serde_json::Value;
use thiserror::Error;

use crate::domain::AnalysisResult;

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("model response contained no JSON object")]
    NoJsonObject,

    #[error("model response JSON is malformed: {0}")]
    Malformed(serde_json::Error),

    #[error("model response does not match the analysis schema: {0}")]
    Schema(serde_json::Error),
}

/// Extract and validate the analysis object embedded in `text`.
pub fn extract_analysis(text: &str) -> Result<AnalysisResult, ExtractError> {
    let mut schema_err = None;
    let mut malformed_err = None;

    for candidate in object_candidates(text) {
        match serde_json::from_str::<Value>(candidate) {
            Ok(value) => match serde_json::from_value::<AnalysisResult>(value) {
                Ok(result) => return Ok(result),
                Err(e) => {
                    schema_err.get_or_insert(ExtractError::Schema(e));
                }
            },
            Err(e) => {
                malformed_err.get_or_insert(ExtractError::Malformed(e));
            }
        }
    }

    Err(schema_err
        .or(malformed_err)
        .unwrap_or(ExtractError::NoJsonObject))
}

/// Balanced `{...}` substrings of `text`, in order of their opening brace.
fn object_candidates(text: &str) -> impl Iterator<Item = &str> + '_ {
    text.match_indices('{')
        .filter_map(move |(start, _)| balanced_end(&text[start..]).map(|len| &text[start..start + len]))
}

/// Byte length of the balanced object at the start of `s`, if it closes.
fn balanced_end(s: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in s.char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }

        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(i + 1);
                }
            }
            _ => {}
        }
    }

    None
}
