//! CLI error types and exit codes

use thiserror::Error;
use xavyo_connector_auth0::{Auth0Error, SyncError};

/// Exit codes for the CLI
/// - 0: Success
/// - 1: General error
/// - 3: Transient upstream failure (retries exhausted)
/// - 4: Invalid configuration or request
/// - 5: Upstream rejected the sync
/// - 6: Sync finished but some resources could not be walked
pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Connector error: {0}")]
    Connector(#[from] Auth0Error),

    #[error("Sync of {what} failed: {source}")]
    Sync {
        what: String,
        #[source]
        source: SyncError,
    },

    #[error("Sync incomplete: {failed} resource(s) skipped after errors")]
    Incomplete { failed: usize },

    #[error("Output error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CliError {
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Config(_) => 4,
            CliError::Connector(Auth0Error::Config(_)) => 4,
            CliError::Connector(e) if e.is_transient() => 3,
            CliError::Connector(_) => 5,
            CliError::Sync { source, .. } => match source {
                SyncError::MalformedCursor { .. } | SyncError::UnsupportedStrategy { .. } => 4,
                e if e.is_retryable() => 3,
                _ => 5,
            },
            CliError::Incomplete { .. } => 6,
            CliError::Io(_) | CliError::Json(_) => 1,
        }
    }

    /// Print the error to stderr with appropriate formatting
    pub fn print(&self) {
        let use_color = std::env::var("NO_COLOR").is_err();

        if use_color {
            eprintln!("\x1b[31mError:\x1b[0m {}", self);
        } else {
            eprintln!("Error: {}", self);
        }

        if let Some(suggestion) = self.suggestion() {
            if use_color {
                eprintln!("\n\x1b[33mSuggestion:\x1b[0m {}", suggestion);
            } else {
                eprintln!("\nSuggestion: {}", suggestion);
            }
        }
    }

    fn suggestion(&self) -> Option<&'static str> {
        match self {
            CliError::Connector(Auth0Error::Config(_)) => {
                Some("Check AUTH0_BASE_URL and AUTH0_API_TOKEN.")
            }
            CliError::Sync {
                source: SyncError::JobStalled { .. },
                ..
            } => Some("Raise --max-job-poll-attempts or --job-poll-interval-secs."),
            CliError::Sync { source, .. } if source.is_retryable() => {
                Some("The tenant may be rate limited. Try again later or raise --max-retries.")
            }
            _ => None,
        }
    }
}
