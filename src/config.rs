use anyhow::{bail, Context, Result};
use std::env;
use std::path::PathBuf;
use std::str::FromStr;

pub const DEFAULT_COMPLETION_API_URL: &str = "https://api.deepseek.com/v1/chat/completions";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Dev,
    Staging,
    Prod,
}

impl Environment {
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "prod" | "production" => Self::Prod,
            "staging" => Self::Staging,
            _ => Self::Dev,
        }
    }

    pub fn is_dev(&self) -> bool {
        matches!(self, Self::Dev)
    }
}

/// Allowed CORS origins. `*` in the environment maps to `Any`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CorsOrigins {
    Any,
    List(Vec<String>),
}

/// Settings for the outbound chat-completion call.
#[derive(Debug, Clone)]
pub struct CompletionSettings {
    pub api_url: String,
    pub api_key: Option<String>,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout_seconds: u64,
    /// Ask the API for `response_format: json_object`.
    pub json_mode: bool,
    /// Upper bound on time spent retrying transient failures. Zero disables retry.
    pub retry_max_elapsed_seconds: u64,
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub env: Environment,
    pub server_addr: String,

    // CORS
    pub cors_allow_origins: CorsOrigins,

    // Uploads
    pub upload_dir: PathBuf,
    pub upload_max_bytes: usize,

    // Completion API
    pub completion: CompletionSettings,
}

impl Settings {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build settings from an arbitrary key lookup; `from_env` passes the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Environment::from_str(&lookup("ENV").unwrap_or_else(|| "dev".to_string()));
        let server_addr = lookup("SERVER_ADDR").unwrap_or_else(|| "0.0.0.0:8000".to_string());

        // CORS
        let cors_allow_origins =
            parse_cors_origins(&lookup("CORS_ALLOW_ORIGINS").unwrap_or_else(|| "*".to_string()));

        // Uploads
        let upload_dir = PathBuf::from(lookup("UPLOAD_DIR").unwrap_or_else(|| "uploads".to_string()));
        let upload_max_bytes = parse_or(&lookup, "UPLOAD_MAX_BYTES", 10 * 1024 * 1024)?;

        // Completion API
        let api_url = lookup("COMPLETION_API_URL")
            .unwrap_or_else(|| DEFAULT_COMPLETION_API_URL.to_string());
        let parsed = url::Url::parse(&api_url)
            .with_context(|| format!("COMPLETION_API_URL is not a valid URL: {api_url}"))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            bail!("COMPLETION_API_URL must use http or https, got {}", parsed.scheme());
        }

        let api_key = lookup("DEEPSEEK_API_KEY")
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        let completion = CompletionSettings {
            api_url,
            api_key,
            model: lookup("COMPLETION_MODEL").unwrap_or_else(|| "deepseek-chat".to_string()),
            temperature: parse_or(&lookup, "COMPLETION_TEMPERATURE", 0.3)?,
            max_tokens: parse_or(&lookup, "COMPLETION_MAX_TOKENS", 2000)?,
            timeout_seconds: parse_or(&lookup, "COMPLETION_TIMEOUT_SECONDS", 120)?, // LLM calls are slow
            json_mode: parse_or(&lookup, "COMPLETION_JSON_MODE", true)?,
            retry_max_elapsed_seconds: parse_or(&lookup, "COMPLETION_RETRY_MAX_ELAPSED_SECONDS", 30)?,
        };

        Ok(Settings {
            env,
            server_addr,
            cors_allow_origins,
            upload_dir,
            upload_max_bytes,
            completion,
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .with_context(|| format!("{key} has an invalid value: {raw}")),
        _ => Ok(default),
    }
}

fn parse_cors_origins(raw: &str) -> CorsOrigins {
    let origins: Vec<String> = raw
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();

    if origins.is_empty() || origins.iter().any(|o| o == "*") {
        CorsOrigins::Any
    } else {
        CorsOrigins::List(origins)
    }
}
