//! Page sync step.

use tracing::debug;

use crate::annotations::RateLimitDescription;
use crate::cursor::Cursor;
use crate::error::SyncResult;
use crate::plan::ListingPlan;

/// Outcome of fetching one page of a phase.
#[derive(Debug)]
pub struct PageStep<R, K> {
    pub records: Vec<R>,
    /// Cursor for the next page, `None` when the phase is complete.
    pub next: Option<Cursor>,
    pub sub_phases: Vec<K>,
    pub rate_limit: Option<RateLimitDescription>,
}

/// Cursor following `cursor` given the collection total.
///
/// The phase is complete once the next page would start at or beyond
/// `total_available`, or when the page came back empty.
pub fn next_cursor(cursor: &Cursor, total_available: u64, fetched: usize) -> Option<Cursor> {
    if fetched == 0 {
        return None;
    }
    let next_offset = (u64::from(cursor.page) + 1) * u64::from(cursor.page_size);
    if next_offset >= total_available {
        return None;
    }
    Some(cursor.next_page())
}

/// Fetch exactly one page of `kind` at `cursor`.
pub async fn step<P: ListingPlan>(
    plan: &P,
    kind: &P::Kind,
    cursor: &Cursor,
) -> SyncResult<PageStep<P::Record, P::Kind>> {
    let result = plan.fetch_page(kind, cursor.page, cursor.page_size).await?;
    let next = next_cursor(cursor, result.total_available, result.fetched);

    debug!(
        phase = ?kind,
        page = cursor.page,
        page_size = cursor.page_size,
        fetched = result.fetched,
        records = result.records.len(),
        total = result.total_available,
        complete = next.is_none(),
        "Fetched page"
    );

    Ok(PageStep {
        records: result.records,
        next,
        sub_phases: result.sub_phases,
        rate_limit: result.rate_limit,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(page: u32, page_size: u32) -> Cursor {
        Cursor {
            page,
            page_size,
            job_id: None,
            attempt: 0,
        }
    }

    #[test]
    fn test_next_cursor_mid_collection() {
        let next = next_cursor(&at(0, 100), 250, 100).unwrap();
        assert_eq!(next.page, 1);
        assert_eq!(next.page_size, 100);
    }

    #[test]
    fn test_next_cursor_last_partial_page() {
        assert!(next_cursor(&at(2, 100), 250, 50).is_none());
    }

    #[test]
    fn test_next_cursor_exact_boundary() {
        assert!(next_cursor(&at(1, 100), 200, 100).is_none());
    }

    #[test]
    fn test_next_cursor_empty_collection() {
        assert!(next_cursor(&at(0, 100), 0, 0).is_none());
    }

    #[test]
    fn test_next_cursor_empty_page_stops() {
        assert!(next_cursor(&at(0, 10), 1000, 0).is_none());
    }

    #[test]
    fn test_next_cursor_no_overflow() {
        assert!(next_cursor(&at(u32::MAX - 1, u32::MAX), u64::MAX, 1).is_some());
    }
}
