//! Cursor codec.
//!
//! A cursor is the resumption position of one bounded listing. It travels to
//! callers as an opaque token: URL-safe unpadded base64 over compact JSON.
//! Field order is fixed by the struct definition, so encoding is
//! deterministic.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{SyncError, SyncResult};

/// Page size used when the caller gives no hint on the first call.
pub const DEFAULT_PAGE_SIZE: u32 = 100;

/// Resumption position within one phase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Cursor {
    /// Zero-based page index.
    pub page: u32,
    /// Records per page; never zero.
    pub page_size: u32,
    /// Export job backing this phase, once submitted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_id: Option<String>,
    /// Number of polls that found the export job still pending.
    #[serde(default, skip_serializing_if = "is_zero")]
    pub attempt: u32,
}

fn is_zero(n: &u32) -> bool {
    *n == 0
}

impl Default for Cursor {
    fn default() -> Self {
        Self::start(None)
    }
}

impl Cursor {
    /// First page, using `page_size_hint` when it is non-zero.
    pub fn start(page_size_hint: Option<u32>) -> Self {
        Self {
            page: 0,
            page_size: page_size_hint
                .filter(|size| *size > 0)
                .unwrap_or(DEFAULT_PAGE_SIZE),
            job_id: None,
            attempt: 0,
        }
    }

    /// Decode a token. An empty token is the start cursor.
    ///
    /// The page-size hint only applies to an empty token; later tokens keep
    /// the size they were issued with.
    pub fn decode(token: &str, page_size_hint: Option<u32>) -> SyncResult<Self> {
        if token.is_empty() {
            return Ok(Self::start(page_size_hint));
        }
        let cursor: Cursor = decode_token(token)?;
        cursor.validate()?;
        Ok(cursor)
    }

    /// Encode to an opaque token.
    pub fn encode(&self) -> String {
        encode_token(self)
    }

    /// Cursor for the page after this one, same size, no job state.
    pub fn next_page(&self) -> Self {
        Self {
            page: self.page.saturating_add(1),
            page_size: self.page_size,
            job_id: None,
            attempt: 0,
        }
    }

    /// Cursor waiting on `job_id` with a fresh attempt counter.
    pub fn awaiting_job(&self, job_id: impl Into<String>) -> Self {
        Self {
            page: self.page,
            page_size: self.page_size,
            job_id: Some(job_id.into()),
            attempt: 0,
        }
    }

    /// Same job, one more pending poll recorded.
    ///
    /// Fails with `MalformedCursor` if the counter cannot grow, which only a
    /// forged token can reach.
    pub fn next_attempt(&self) -> SyncResult<Self> {
        let attempt = self
            .attempt
            .checked_add(1)
            .ok_or_else(|| SyncError::malformed("attempt counter overflow"))?;
        Ok(Self {
            attempt,
            ..self.clone()
        })
    }

    pub(crate) fn validate(&self) -> SyncResult<()> {
        if self.page_size == 0 {
            return Err(SyncError::malformed("page_size must be greater than zero"));
        }
        if self.attempt > 0 && self.job_id.is_none() {
            return Err(SyncError::malformed("attempt counter without an export job"));
        }
        Ok(())
    }
}

/// Serialize any token payload. These plain structs always serialize, so the
/// empty fallback is unreachable.
pub(crate) fn encode_token<T: Serialize>(value: &T) -> String {
    let json = serde_json::to_vec(value).unwrap_or_default();
    URL_SAFE_NO_PAD.encode(json)
}

pub(crate) fn decode_token<T: DeserializeOwned>(token: &str) -> SyncResult<T> {
    let bytes = URL_SAFE_NO_PAD
        .decode(token.trim())
        .map_err(|e| SyncError::malformed(format!("token is not base64: {e}")))?;
    serde_json::from_slice(&bytes)
        .map_err(|e| SyncError::malformed(format!("token payload is invalid: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_empty_is_default() {
        let cursor = Cursor::decode("", None).unwrap();
        assert_eq!(cursor.page, 0);
        assert_eq!(cursor.page_size, DEFAULT_PAGE_SIZE);
        assert!(cursor.job_id.is_none());
        assert_eq!(cursor.attempt, 0);
    }

    #[test]
    fn test_page_size_hint_only_on_first_call() {
        let first = Cursor::decode("", Some(25)).unwrap();
        assert_eq!(first.page_size, 25);

        let token = first.next_page().encode();
        let second = Cursor::decode(&token, Some(500)).unwrap();
        assert_eq!(second.page, 1);
        assert_eq!(second.page_size, 25);
    }

    #[test]
    fn test_zero_hint_falls_back_to_default() {
        assert_eq!(Cursor::start(Some(0)).page_size, DEFAULT_PAGE_SIZE);
    }

    #[test]
    fn test_encode_is_deterministic() {
        let cursor = Cursor::start(Some(10))
            .awaiting_job("job_abc")
            .next_attempt()
            .unwrap();
        assert_eq!(cursor.encode(), cursor.encode());
        assert_eq!(Cursor::decode(&cursor.encode(), None).unwrap(), cursor);
    }

    #[test]
    fn test_decode_rejects_garbage() {
        let err = Cursor::decode("%%%not-base64%%%", None).unwrap_err();
        assert!(matches!(err, SyncError::MalformedCursor { .. }));

        let not_a_cursor = URL_SAFE_NO_PAD.encode(br#"{"hello":"world"}"#);
        assert!(matches!(
            Cursor::decode(&not_a_cursor, None),
            Err(SyncError::MalformedCursor { .. })
        ));
    }

    #[test]
    fn test_decode_rejects_zero_page_size() {
        let token = URL_SAFE_NO_PAD.encode(br#"{"page":1,"page_size":0}"#);
        assert!(matches!(
            Cursor::decode(&token, None),
            Err(SyncError::MalformedCursor { .. })
        ));
    }

    #[test]
    fn test_decode_rejects_attempt_without_job() {
        let token = URL_SAFE_NO_PAD.encode(br#"{"page":0,"page_size":10,"attempt":3}"#);
        assert!(Cursor::decode(&token, None).is_err());
    }

    #[test]
    fn test_next_page_clears_job_state() {
        let cursor = Cursor::start(None).awaiting_job("j").next_attempt().unwrap();
        let next = cursor.next_page();
        assert_eq!(next.page, 1);
        assert!(next.job_id.is_none());
        assert_eq!(next.attempt, 0);
    }

    #[test]
    fn test_next_attempt_overflow_is_malformed() {
        let cursor = Cursor {
            attempt: u32::MAX,
            ..Cursor::start(None).awaiting_job("job_abc")
        };
        assert!(matches!(
            cursor.next_attempt(),
            Err(SyncError::MalformedCursor { .. })
        ));
    }
}
