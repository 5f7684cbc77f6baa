//! Sync engine error types
//!
//! Errors carry a retryable/fatal classification so the calling syncer can
//! decide whether to re-invoke with the same token or abandon the sync.

use std::time::Duration;

use thiserror::Error;

use crate::annotations::Annotations;

/// Result type alias using `SyncError`.
pub type SyncResult<T> = Result<T, SyncError>;

/// Error returned by a single engine invocation.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The resumption token does not decode to a cursor or phase stack.
    #[error("malformed cursor: {message}")]
    MalformedCursor { message: String },

    /// A page fetch, job submit, poll or download failed in a collaborator.
    #[error("collaborator error: {message}")]
    Collaborator {
        message: String,
        /// Whether the collaborator considers the failure temporary.
        transient: bool,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The export job is still running. Re-invoke with `next_token` after
    /// `retry_after`.
    #[error("export job {job_id} not ready (attempt {attempt}), retry after {retry_after:?}")]
    JobNotReady {
        job_id: String,
        attempt: u32,
        retry_after: Duration,
        next_token: String,
        annotations: Annotations,
    },

    /// The export job finished in a failed state.
    #[error("export job {job_id} failed")]
    JobFailed { job_id: String },

    /// The export job stayed pending past the configured attempt ceiling.
    #[error("export job {job_id} still pending after {attempts} polls")]
    JobStalled { job_id: String, attempts: u32 },

    /// The export job completed but reported no result location.
    #[error("export job {job_id} completed without a result location")]
    JobResultMissing { job_id: String },

    /// The export result could not be decompressed or read as text.
    #[error("export result stream unreadable: {0}")]
    ExportStream(#[source] std::io::Error),

    /// A line of the export result is not a valid record.
    #[error("export record on line {line} could not be decoded: {message}")]
    RecordDecode { line: usize, message: String },

    /// The listing asked for an export job but no export client is configured.
    #[error("phase '{phase}' requires an export job client")]
    UnsupportedStrategy { phase: String },
}

impl SyncError {
    /// Check whether re-invoking with the same (or returned) token can succeed.
    ///
    /// `JobNotReady` is the expected waiting state and is always retryable;
    /// collaborator errors are retryable when the collaborator marked them
    /// transient.
    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::JobNotReady { .. } => true,
            SyncError::Collaborator { transient, .. } => *transient,
            _ => false,
        }
    }

    /// Check whether the sync of the parent resource must be abandoned.
    pub fn is_fatal(&self) -> bool {
        !self.is_retryable()
    }

    /// Retry-after hint attached to a not-ready export job.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            SyncError::JobNotReady { retry_after, .. } => Some(*retry_after),
            _ => None,
        }
    }

    /// Token to re-invoke with, when the error carries one.
    pub fn next_token(&self) -> Option<&str> {
        match self {
            SyncError::JobNotReady { next_token, .. } => Some(next_token),
            _ => None,
        }
    }

    /// Get an error code for classification.
    pub fn error_code(&self) -> &'static str {
        match self {
            SyncError::MalformedCursor { .. } => "MALFORMED_CURSOR",
            SyncError::Collaborator { .. } => "COLLABORATOR_ERROR",
            SyncError::JobNotReady { .. } => "JOB_NOT_READY",
            SyncError::JobFailed { .. } => "JOB_FAILED",
            SyncError::JobStalled { .. } => "JOB_STALLED",
            SyncError::JobResultMissing { .. } => "JOB_RESULT_MISSING",
            SyncError::ExportStream(_) => "EXPORT_STREAM",
            SyncError::RecordDecode { .. } => "RECORD_DECODE",
            SyncError::UnsupportedStrategy { .. } => "UNSUPPORTED_STRATEGY",
        }
    }

    /// Create a malformed cursor error.
    pub fn malformed(message: impl Into<String>) -> Self {
        SyncError::MalformedCursor {
            message: message.into(),
        }
    }

    /// Create a collaborator error without an underlying source.
    pub fn collaborator(message: impl Into<String>, transient: bool) -> Self {
        SyncError::Collaborator {
            message: message.into(),
            transient,
            source: None,
        }
    }

    /// Create a collaborator error wrapping the transport's own error.
    pub fn collaborator_with_source(
        message: impl Into<String>,
        transient: bool,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        SyncError::Collaborator {
            message: message.into(),
            transient,
            source: Some(Box::new(source)),
        }
    }
}
