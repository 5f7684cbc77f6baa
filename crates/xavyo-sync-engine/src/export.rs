//! Bulk export job driver.
//!
//! Used for collections that page-based listing cannot fully reach. The job
//! is submitted on the first visit to the phase, polled on every later visit
//! and, once completed, its gzip-compressed NDJSON result is fetched and
//! decoded in one go. The driver never waits: a pending job returns control
//! to the caller immediately.

use std::io::{BufRead, BufReader};
use std::time::Duration;

use async_trait::async_trait;
use flate2::read::GzDecoder;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::cursor::Cursor;
use crate::error::{SyncError, SyncResult};

/// Default wait between polls of a pending job.
pub const DEFAULT_JOB_RETRY_AFTER: Duration = Duration::from_secs(10);

/// Default number of pending polls tolerated before giving up.
pub const DEFAULT_MAX_JOB_POLL_ATTEMPTS: u32 = 60;

/// Parameters of an export job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportRequest {
    /// Fields to include in every exported record.
    pub fields: Vec<String>,
    /// Maximum number of records the job may export.
    pub record_cap: u32,
}

impl ExportRequest {
    pub fn new<I, S>(fields: I, record_cap: u32) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            fields: fields.into_iter().map(Into::into).collect(),
            record_cap,
        }
    }
}

/// Server-side job state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportJobStatus {
    Pending,
    Completed,
    Failed,
}

/// An export job as reported by the collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportJob {
    pub id: String,
    pub status: ExportJobStatus,
    /// Where the result can be downloaded once completed.
    pub result_location: Option<String>,
}

/// Collaborator that runs export jobs.
#[async_trait]
pub trait ExportJobClient: Send + Sync {
    /// Start a new export job.
    async fn submit_export_job(&self, request: &ExportRequest) -> SyncResult<ExportJob>;

    /// Fetch the current state of a job.
    async fn poll_export_job(&self, job_id: &str) -> SyncResult<ExportJob>;

    /// Download a completed job's result, still compressed.
    async fn fetch_export_result(&self, location: &str) -> SyncResult<Vec<u8>>;
}

/// Polling policy for pending jobs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobPollConfig {
    /// Hint returned to the caller with every not-ready response.
    pub retry_after: Duration,
    /// Pending polls tolerated before the phase fails with `JobStalled`.
    pub max_attempts: u32,
}

impl Default for JobPollConfig {
    fn default() -> Self {
        Self {
            retry_after: DEFAULT_JOB_RETRY_AFTER,
            max_attempts: DEFAULT_MAX_JOB_POLL_ATTEMPTS,
        }
    }
}

/// Result of one driver step.
#[derive(Debug)]
pub enum JobProgress {
    /// A job was submitted; its id is stored in the cursor.
    Submitted(Cursor),
    /// The job is still running; the cursor carries the bumped attempt.
    Pending(Cursor),
    /// Decoded rows, tagged with their 1-based line numbers.
    Completed(Vec<(usize, serde_json::Value)>),
}

/// Drives one export job through `NotStarted → Submitted → Pending* →
/// Completed | Failed`, one transition per call.
pub struct ExportJobDriver<'a> {
    client: &'a dyn ExportJobClient,
    config: &'a JobPollConfig,
}

impl<'a> ExportJobDriver<'a> {
    pub fn new(client: &'a dyn ExportJobClient, config: &'a JobPollConfig) -> Self {
        Self { client, config }
    }

    /// Advance the job referenced by `cursor`, or submit one if there is none.
    pub async fn step(&self, cursor: &Cursor, request: &ExportRequest) -> SyncResult<JobProgress> {
        let Some(job_id) = cursor.job_id.as_deref() else {
            let job = self.client.submit_export_job(request).await?;
            info!(job_id = %job.id, record_cap = request.record_cap, "Submitted export job");
            return Ok(JobProgress::Submitted(cursor.awaiting_job(job.id)));
        };

        // Tokens past the ceiling are never issued; refuse them before polling.
        if cursor.attempt > self.config.max_attempts {
            return Err(SyncError::malformed(format!(
                "attempt {} exceeds the poll ceiling of {}",
                cursor.attempt, self.config.max_attempts
            )));
        }

        let job = self.client.poll_export_job(job_id).await?;
        debug!(job_id = %job_id, status = ?job.status, attempt = cursor.attempt, "Polled export job");

        match job.status {
            ExportJobStatus::Pending => {
                let next = cursor.next_attempt()?;
                if next.attempt > self.config.max_attempts {
                    warn!(job_id = %job_id, attempts = next.attempt, "Export job stalled");
                    return Err(SyncError::JobStalled {
                        job_id: job_id.to_string(),
                        attempts: next.attempt,
                    });
                }
                Ok(JobProgress::Pending(next))
            }
            ExportJobStatus::Failed => {
                warn!(job_id = %job_id, "Export job failed");
                Err(SyncError::JobFailed {
                    job_id: job_id.to_string(),
                })
            }
            ExportJobStatus::Completed => {
                let location = job
                    .result_location
                    .as_deref()
                    .filter(|l| !l.is_empty())
                    .ok_or_else(|| SyncError::JobResultMissing {
                        job_id: job_id.to_string(),
                    })?;
                let payload = self.client.fetch_export_result(location).await?;
                let rows = decode_export_stream(&payload)?;
                info!(job_id = %job_id, rows = rows.len(), "Export job completed");
                Ok(JobProgress::Completed(rows))
            }
        }
    }
}

/// Decompress a gzip NDJSON payload into JSON rows.
///
/// Blank lines are skipped. Any line that is not valid JSON fails the whole
/// payload; no rows are returned in that case.
pub fn decode_export_stream(payload: &[u8]) -> SyncResult<Vec<(usize, serde_json::Value)>> {
    if payload.is_empty() {
        return Ok(Vec::new());
    }

    let reader = BufReader::new(GzDecoder::new(payload));
    let mut rows = Vec::new();

    for (idx, line) in reader.lines().enumerate() {
        let line = line.map_err(SyncError::ExportStream)?;
        if line.trim().is_empty() {
            continue;
        }
        let value = serde_json::from_str(&line).map_err(|e| SyncError::RecordDecode {
            line: idx + 1,
            message: e.to_string(),
        })?;
        rows.push((idx + 1, value));
    }

    Ok(rows)
}
