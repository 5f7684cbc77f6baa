//! Listing plans: the collaborator seam between the engine and a resource
//! syncer.
//!
//! A plan is bound to one resource kind (and parent, if any). It names the
//! phases of its listing, says how each phase is enumerated, and fetches
//! pages. It never sees tokens.

use async_trait::async_trait;

use crate::annotations::RateLimitDescription;
use crate::error::SyncResult;
use crate::export::ExportRequest;
use crate::phase::PhaseKind;

/// How a phase enumerates its records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Strategy {
    /// Page/size listing with a reported total.
    Paged,
    /// Server-side bulk export, polled to completion and fetched in one go.
    Export(ExportRequest),
}

/// One page returned by [`ListingPlan::fetch_page`].
#[derive(Debug, Clone)]
pub struct PageResult<R, K> {
    pub records: Vec<R>,
    /// Size of the whole collection as reported by the source.
    pub total_available: u64,
    /// Source items on this page. Differs from `records.len()` when one item
    /// expands into several records, or into none.
    pub fetched: usize,
    /// Nested phases to drain before this phase resumes.
    pub sub_phases: Vec<K>,
    /// Rate-limit state observed while fetching.
    pub rate_limit: Option<RateLimitDescription>,
}

impl<R, K> PageResult<R, K> {
    pub fn new(records: Vec<R>, total_available: u64) -> Self {
        Self {
            fetched: records.len(),
            records,
            total_available,
            sub_phases: Vec::new(),
            rate_limit: None,
        }
    }

    pub fn with_fetched(mut self, fetched: usize) -> Self {
        self.fetched = fetched;
        self
    }

    pub fn with_sub_phases(mut self, sub_phases: Vec<K>) -> Self {
        self.sub_phases = sub_phases;
        self
    }

    pub fn with_rate_limit(mut self, rate_limit: Option<RateLimitDescription>) -> Self {
        self.rate_limit = rate_limit;
        self
    }
}

/// A resumable listing.
#[async_trait]
pub trait ListingPlan: Send + Sync {
    /// Phase key for this listing.
    type Kind: PhaseKind;

    /// Record type yielded to the caller.
    type Record: Send;

    /// Phases to run on a fresh sync, first one active.
    fn initial_phases(&self) -> Vec<Self::Kind> {
        vec![Self::Kind::default()]
    }

    /// Enumeration strategy for a phase.
    fn strategy(&self, _kind: &Self::Kind) -> Strategy {
        Strategy::Paged
    }

    /// Fetch one page of a paged phase.
    async fn fetch_page(
        &self,
        kind: &Self::Kind,
        page: u32,
        page_size: u32,
    ) -> SyncResult<PageResult<Self::Record, Self::Kind>>;

    /// Phases that replace `completed` once it has no further pages.
    fn successors(&self, _completed: &Self::Kind) -> Vec<Self::Kind> {
        Vec::new()
    }

    /// Map one decoded export row into a record.
    fn from_export_row(
        &self,
        kind: &Self::Kind,
        _row: serde_json::Value,
    ) -> Result<Self::Record, String> {
        Err(format!("phase {kind:?} does not accept export rows"))
    }
}
