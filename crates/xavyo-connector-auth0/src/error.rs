//! Error types for the Auth0 connector.

use thiserror::Error;
use xavyo_sync_engine::error::SyncError;

/// Result type alias using `Auth0Error`.
pub type Auth0Result<T> = Result<T, Auth0Error>;

/// Errors that can occur when interacting with the Auth0 Management API.
#[derive(Debug, Error)]
pub enum Auth0Error {
    /// Configuration validation error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Management API returned a non-success status.
    #[error("Auth0 API error ({status}): {code} - {message}")]
    Api {
        status: u16,
        code: String,
        message: String,
    },

    /// HTTP request error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Rate limit exceeded.
    #[error("Rate limit exceeded, retry after {retry_after_secs} seconds")]
    RateLimited { retry_after_secs: u64 },

    /// JSON parsing error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// URL parsing error.
    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),

    /// A write the Management API cannot express, such as granting a role to a role.
    #[error("Unsupported request: {0}")]
    Unsupported(String),

    /// Sync engine error.
    #[error("Sync error: {0}")]
    Sync(#[from] SyncError),
}

impl Auth0Error {
    /// Whether retrying the same request later may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Auth0Error::RateLimited { .. } => true,
            Auth0Error::Api { status, .. } => *status >= 500,
            Auth0Error::Http(e) => e.is_timeout() || e.is_connect(),
            Auth0Error::Sync(e) => e.is_retryable(),
            Auth0Error::Config(_)
            | Auth0Error::Unsupported(_)
            | Auth0Error::Json(_)
            | Auth0Error::Url(_) => false,
        }
    }

    /// Build an API error from a response body, falling back to the raw text.
    pub(crate) fn from_response(status: u16, body: &str) -> Self {
        #[derive(serde::Deserialize)]
        struct ApiErrorBody {
            #[serde(rename = "errorCode", default)]
            error_code: Option<String>,
            #[serde(default)]
            error: Option<String>,
            #[serde(default)]
            message: Option<String>,
        }

        match serde_json::from_str::<ApiErrorBody>(body) {
            Ok(parsed) => Auth0Error::Api {
                status,
                code: parsed
                    .error_code
                    .or(parsed.error)
                    .unwrap_or_else(|| status.to_string()),
                message: parsed.message.unwrap_or_default(),
            },
            Err(_) => Auth0Error::Api {
                status,
                code: status.to_string(),
                message: body.to_string(),
            },
        }
    }
}

impl From<Auth0Error> for SyncError {
    fn from(err: Auth0Error) -> Self {
        match err {
            Auth0Error::Sync(inner) => inner,
            other => {
                let transient = other.is_transient();
                SyncError::collaborator_with_source(other.to_string(), transient, other)
            }
        }
    }
}
