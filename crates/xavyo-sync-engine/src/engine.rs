//! The sync entry point.
//!
//! Every call decodes the caller's token into a phase stack, runs exactly one
//! step of the active phase and re-encodes the stack. Callers hold no state
//! between calls besides the returned token.

use tracing::{debug, instrument, warn};

use crate::annotations::{Annotations, RateLimitDescription};
use crate::cursor::Cursor;
use crate::error::{SyncError, SyncResult};
use crate::export::{ExportJobClient, ExportJobDriver, JobPollConfig, JobProgress};
use crate::page;
use crate::phase::{Phase, PhaseStack};
use crate::plan::{ListingPlan, Strategy};

/// Records and continuation returned by one [`SyncEngine::sync`] call.
#[derive(Debug, Clone)]
pub struct SyncPage<R> {
    pub records: Vec<R>,
    /// Token for the next call; empty when the listing is complete.
    pub next_token: String,
    pub annotations: Annotations,
}

impl<R> SyncPage<R> {
    /// Whether the listing is fully synced.
    pub fn done(&self) -> bool {
        self.next_token.is_empty()
    }
}

/// Runs resumable listings for one [`ListingPlan`].
pub struct SyncEngine<'a, P: ListingPlan> {
    plan: &'a P,
    export_client: Option<&'a dyn ExportJobClient>,
    poll_config: JobPollConfig,
}

impl<'a, P: ListingPlan> SyncEngine<'a, P> {
    /// Create an engine for paged-only plans.
    pub fn new(plan: &'a P) -> Self {
        Self {
            plan,
            export_client: None,
            poll_config: JobPollConfig::default(),
        }
    }

    /// Enable export-job phases.
    pub fn with_export_client(mut self, client: &'a dyn ExportJobClient) -> Self {
        self.export_client = Some(client);
        self
    }

    /// Override the polling policy for export jobs.
    pub fn with_poll_config(mut self, config: JobPollConfig) -> Self {
        self.poll_config = config;
        self
    }

    /// Run one step of the listing.
    ///
    /// `token` is the value returned by the previous call, or empty to start.
    /// `page_size_hint` only affects a fresh start.
    ///
    /// # Errors
    ///
    /// `JobNotReady` is the expected waiting state of an export phase: it
    /// carries the token to re-invoke with and a retry-after hint. Every
    /// other error aborts the listing.
    #[instrument(skip(self, token), fields(fresh = token.is_empty()))]
    pub async fn sync(
        &self,
        token: &str,
        page_size_hint: Option<u32>,
    ) -> SyncResult<SyncPage<P::Record>> {
        let mut stack = PhaseStack::<P::Kind>::from_token(token)?;
        if token.is_empty() {
            let start = Cursor::start(page_size_hint);
            stack.push_all(
                self.plan
                    .initial_phases()
                    .into_iter()
                    .map(|kind| Phase::new(kind, start.clone())),
            );
        }

        let Some(phase) = stack.pop() else {
            return Ok(SyncPage {
                records: Vec::new(),
                next_token: String::new(),
                annotations: Annotations::new(),
            });
        };

        let mut annotations = Annotations::new();
        let records = match self.plan.strategy(&phase.kind) {
            Strategy::Paged => {
                if let Some(job_id) = &phase.cursor.job_id {
                    return Err(SyncError::malformed(format!(
                        "paged phase {:?} carries export job {job_id}",
                        phase.kind
                    )));
                }
                let step = page::step(self.plan, &phase.kind, &phase.cursor).await?;
                annotations.with_rate_limit(step.rate_limit);
                match step.next {
                    Some(next) => stack.push(Phase::new(phase.kind.clone(), next)),
                    None => self.complete(&mut stack, &phase),
                }
                let page_size = phase.cursor.page_size;
                stack.push_all(
                    step.sub_phases
                        .into_iter()
                        .map(|kind| Phase::new(kind, Cursor::start(Some(page_size)))),
                );
                step.records
            }
            Strategy::Export(request) => {
                let client = self.export_client.ok_or_else(|| SyncError::UnsupportedStrategy {
                    phase: format!("{:?}", phase.kind),
                })?;
                let driver = ExportJobDriver::new(client, &self.poll_config);

                match driver.step(&phase.cursor, &request).await? {
                    JobProgress::Submitted(cursor) => {
                        stack.push(Phase::new(phase.kind.clone(), cursor));
                        Vec::new()
                    }
                    JobProgress::Pending(cursor) => {
                        let job_id = cursor.job_id.clone().unwrap_or_default();
                        let attempt = cursor.attempt;
                        stack.push(Phase::new(phase.kind.clone(), cursor));

                        let mut annotations = Annotations::new();
                        annotations.with_rate_limit(Some(RateLimitDescription::retry_after(
                            self.poll_config.retry_after,
                        )));
                        warn!(job_id = %job_id, attempt, "Export job not ready");
                        return Err(SyncError::JobNotReady {
                            job_id,
                            attempt,
                            retry_after: self.poll_config.retry_after,
                            next_token: stack.to_token(),
                            annotations,
                        });
                    }
                    JobProgress::Completed(rows) => {
                        let records = rows
                            .into_iter()
                            .map(|(line, row)| {
                                self.plan
                                    .from_export_row(&phase.kind, row)
                                    .map_err(|message| SyncError::RecordDecode { line, message })
                            })
                            .collect::<SyncResult<Vec<_>>>()?;
                        self.complete(&mut stack, &phase);
                        records
                    }
                }
            }
        };

        let next_token = stack.to_token();
        debug!(
            phase = ?phase.kind,
            records = records.len(),
            remaining_phases = stack.len(),
            done = next_token.is_empty(),
            "Sync step finished"
        );

        Ok(SyncPage {
            records,
            next_token,
            annotations,
        })
    }

    /// Replace a finished phase with its successors, if any.
    fn complete(&self, stack: &mut PhaseStack<P::Kind>, finished: &Phase<P::Kind>) {
        let start = Cursor::start(Some(finished.cursor.page_size));
        stack.push_all(
            self.plan
                .successors(&finished.kind)
                .into_iter()
                .map(|kind| Phase::new(kind, start.clone())),
        );
    }
}
