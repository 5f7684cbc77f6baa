//! Rate-limit header parsing.
//!
//! Auth0 reports its token bucket on every Management API response through
//! `x-ratelimit-limit`, `x-ratelimit-remaining` and `x-ratelimit-reset`
//! (unix seconds). A throttled request additionally carries `Retry-After`.

use chrono::{DateTime, Utc};
use reqwest::header::HeaderMap;
use xavyo_sync_engine::annotations::RateLimitDescription;

const HEADER_LIMIT: &str = "x-ratelimit-limit";
const HEADER_REMAINING: &str = "x-ratelimit-remaining";
const HEADER_RESET: &str = "x-ratelimit-reset";
const HEADER_RETRY_AFTER: &str = "retry-after";

/// Fallback wait when a 429 carries no usable hint.
pub const DEFAULT_RETRY_AFTER_SECS: u64 = 1;

fn header_u64(headers: &HeaderMap, name: &str) -> Option<u64> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
}

/// Rate-limit description from response headers, if the server sent one.
pub fn parse_rate_limit(headers: &HeaderMap) -> Option<RateLimitDescription> {
    let limit = header_u64(headers, HEADER_LIMIT)?;
    let remaining = header_u64(headers, HEADER_REMAINING)?;
    let reset_at = header_u64(headers, HEADER_RESET)
        .and_then(|secs| i64::try_from(secs).ok())
        .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0));

    Some(RateLimitDescription {
        limit,
        remaining,
        reset_at,
    })
}

/// Seconds to wait after a 429.
///
/// Prefers `Retry-After`, then the bucket reset time, then a small default.
pub fn retry_after_secs(headers: &HeaderMap, now: DateTime<Utc>) -> u64 {
    if let Some(secs) = header_u64(headers, HEADER_RETRY_AFTER) {
        return secs;
    }
    parse_rate_limit(headers)
        .and_then(|rl| rl.reset_at)
        .map(|reset| (reset - now).num_seconds())
        .and_then(|secs| u64::try_from(secs).ok())
        .filter(|secs| *secs > 0)
        .unwrap_or(DEFAULT_RETRY_AFTER_SECS)
}
