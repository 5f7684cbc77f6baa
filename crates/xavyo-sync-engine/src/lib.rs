//! # Sync Engine
//!
//! Resumable, multi-phase listing engine for identity connectors.
//!
//! A resource syncer hands the engine the last opaque token it received (or
//! an empty string to start). The engine runs one bounded step and returns
//! records plus the next token; an empty token means the listing is done.
//! All progress lives in the token, so syncers are stateless between calls
//! and a sync can resume after a process restart.
//!
//! ## Architecture
//!
//! - [`cursor`] - `{page, page_size, job_id, attempt}` and its token codec
//! - [`phase`] - typed phase stack for listings made of several
//!   sub-collections
//! - [`page`] - one bounded page fetch and next-cursor computation
//! - [`export`] - async export job driver (submit, poll, gunzip NDJSON)
//! - [`engine`] - the `sync` entry point tying the above together
//!
//! ## Example
//!
//! ```ignore
//! use xavyo_sync_engine::prelude::*;
//!
//! let engine = SyncEngine::new(&plan).with_export_client(&client);
//! let mut token = String::new();
//! loop {
//!     match engine.sync(&token, Some(100)).await {
//!         Ok(page) => {
//!             emit(page.records);
//!             if page.done() { break; }
//!             token = page.next_token;
//!         }
//!         Err(SyncError::JobNotReady { next_token, retry_after, .. }) => {
//!             tokio::time::sleep(retry_after).await;
//!             token = next_token;
//!         }
//!         Err(e) => return Err(e),
//!     }
//! }
//! ```

pub mod annotations;
pub mod cursor;
pub mod engine;
pub mod error;
pub mod export;
pub mod page;
pub mod phase;
pub mod plan;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::annotations::{Annotation, Annotations, RateLimitDescription};
    pub use crate::cursor::{Cursor, DEFAULT_PAGE_SIZE};
    pub use crate::engine::{SyncEngine, SyncPage};
    pub use crate::error::{SyncError, SyncResult};
    pub use crate::export::{
        ExportJob, ExportJobClient, ExportJobStatus, ExportRequest, JobPollConfig,
    };
    pub use crate::phase::{Phase, PhaseKind, PhaseStack, SinglePhase};
    pub use crate::plan::{ListingPlan, PageResult, Strategy};
}

// Re-export async_trait for plan and export client implementors
pub use async_trait::async_trait;
