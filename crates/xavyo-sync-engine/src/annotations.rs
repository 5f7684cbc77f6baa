//! Out-of-band metadata returned alongside records.
//!
//! The engine never sleeps; rate-limit observations and retry-after hints
//! travel back to the caller here and the caller enforces any delay.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Rate-limit state observed on (or imposed by) a collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitDescription {
    /// Requests allowed in the current window.
    pub limit: u64,
    /// Requests remaining in the current window.
    pub remaining: u64,
    /// When the window resets.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reset_at: Option<DateTime<Utc>>,
}

impl RateLimitDescription {
    /// A "wait until" hint: no remaining budget until `now + delay`.
    pub fn retry_after(delay: Duration) -> Self {
        let delay = chrono::Duration::from_std(delay).unwrap_or_else(|_| chrono::Duration::zero());
        Self {
            limit: 1,
            remaining: 0,
            reset_at: Some(Utc::now() + delay),
        }
    }

    /// Whether the caller should hold off until `reset_at`.
    pub fn is_exhausted(&self) -> bool {
        self.remaining == 0
    }
}

/// A single annotation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Annotation {
    RateLimit(RateLimitDescription),
}

/// Ordered set of annotations attached to one engine response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Annotations(Vec<Annotation>);

impl Annotations {
    /// Create an empty annotation set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach rate-limit data if the collaborator reported any.
    pub fn with_rate_limit(&mut self, rate_limit: Option<RateLimitDescription>) -> &mut Self {
        if let Some(rl) = rate_limit {
            self.0.push(Annotation::RateLimit(rl));
        }
        self
    }

    /// Most recent rate-limit annotation.
    pub fn rate_limit(&self) -> Option<&RateLimitDescription> {
        self.0.iter().rev().find_map(|a| match a {
            Annotation::RateLimit(rl) => Some(rl),
        })
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Annotation> {
        self.0.iter()
    }
}
