//! Shared mock collaborators for sync engine integration tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::io::Write;
use std::sync::Mutex;

use flate2::write::GzEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};
use xavyo_sync_engine::prelude::*;
use xavyo_sync_engine::async_trait;

/// Paged listing over `0..total`, recording every page request.
pub struct CountingPlan {
    pub total: u64,
    pub calls: Mutex<Vec<(u32, u32)>>,
}

impl CountingPlan {
    pub fn new(total: u64) -> Self {
        Self {
            total,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<(u32, u32)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ListingPlan for CountingPlan {
    type Kind = SinglePhase;
    type Record = u64;

    async fn fetch_page(
        &self,
        _kind: &SinglePhase,
        page: u32,
        page_size: u32,
    ) -> SyncResult<PageResult<u64, SinglePhase>> {
        self.calls.lock().unwrap().push((page, page_size));
        let start = u64::from(page) * u64::from(page_size);
        let end = (start + u64::from(page_size)).min(self.total);
        let records = (start..end.max(start)).collect();
        Ok(PageResult::new(records, self.total))
    }
}

/// Row shape produced by the mock export.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportedUser {
    pub user_id: String,
    pub email: String,
}

/// Listing whose only phase is an export job.
pub struct ExportPlan;

#[async_trait]
impl ListingPlan for ExportPlan {
    type Kind = SinglePhase;
    type Record = ExportedUser;

    fn strategy(&self, _kind: &SinglePhase) -> Strategy {
        Strategy::Export(ExportRequest::new(["user_id", "email"], 1000))
    }

    async fn fetch_page(
        &self,
        _kind: &SinglePhase,
        _page: u32,
        _page_size: u32,
    ) -> SyncResult<PageResult<ExportedUser, SinglePhase>> {
        Err(SyncError::collaborator("export listings are not paged", false))
    }

    fn from_export_row(
        &self,
        _kind: &SinglePhase,
        row: serde_json::Value,
    ) -> Result<ExportedUser, String> {
        serde_json::from_value(row).map_err(|e| e.to_string())
    }
}

/// Export client that replays a scripted sequence of poll statuses.
pub struct ScriptedExportClient {
    pub job_id: String,
    pub polls: Mutex<VecDeque<ExportJobStatus>>,
    pub payload: Vec<u8>,
    pub submissions: Mutex<Vec<ExportRequest>>,
    pub polled_ids: Mutex<Vec<String>>,
    pub location: Option<String>,
}

impl ScriptedExportClient {
    pub fn new(polls: impl IntoIterator<Item = ExportJobStatus>, payload: Vec<u8>) -> Self {
        Self {
            job_id: "job_T4nTYtEBkAlBJWJq".to_string(),
            polls: Mutex::new(polls.into_iter().collect()),
            payload,
            submissions: Mutex::new(Vec::new()),
            polled_ids: Mutex::new(Vec::new()),
            location: Some("https://exports.example.com/job_T4nTYtEBkAlBJWJq.json.gz".into()),
        }
    }

    pub fn without_location(mut self) -> Self {
        self.location = None;
        self
    }

    pub fn submissions(&self) -> usize {
        self.submissions.lock().unwrap().len()
    }
}

#[async_trait]
impl ExportJobClient for ScriptedExportClient {
    async fn submit_export_job(&self, request: &ExportRequest) -> SyncResult<ExportJob> {
        self.submissions.lock().unwrap().push(request.clone());
        Ok(ExportJob {
            id: self.job_id.clone(),
            status: ExportJobStatus::Pending,
            result_location: None,
        })
    }

    async fn poll_export_job(&self, job_id: &str) -> SyncResult<ExportJob> {
        self.polled_ids.lock().unwrap().push(job_id.to_string());
        let status = self
            .polls
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(ExportJobStatus::Pending);
        Ok(ExportJob {
            id: job_id.to_string(),
            status,
            result_location: match status {
                ExportJobStatus::Completed => self.location.clone(),
                _ => None,
            },
        })
    }

    async fn fetch_export_result(&self, _location: &str) -> SyncResult<Vec<u8>> {
        Ok(self.payload.clone())
    }
}

/// Gzip `text` the way the export endpoint serves it.
pub fn gzip(text: &str) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(text.as_bytes()).unwrap();
    encoder.finish().unwrap()
}
