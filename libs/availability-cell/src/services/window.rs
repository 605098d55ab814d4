// libs/availability-cell/src/services/window.rs
use chrono::{Days, NaiveDate};
use tracing::debug;

use crate::models::AvailabilityRecord;

pub const WIDE_VIEWPORT_MIN_WIDTH: u32 = 1536;
pub const WIDE_PAGE_SIZE: usize = 10;
pub const NARROW_PAGE_SIZE: usize = 6;

/// Ceiling on paging, far beyond any schedule a provider can publish.
/// Request input reaches the offset directly, so it must stay bounded.
pub const MAX_PAGE_OFFSET: u32 = 1_000;

pub fn page_size_for_viewport(width: u32) -> usize {
    if width >= WIDE_VIEWPORT_MIN_WIDTH {
        WIDE_PAGE_SIZE
    } else {
        NARROW_PAGE_SIZE
    }
}

/// Paginated calendar strip for one browsing session. Dates are not filtered
/// by availability; empty days render as "no slots" so the strip stays stable.
///
/// The anchor is memoized per session and owned here rather than in any
/// process-wide state, so concurrent sessions cannot interfere. Callers reset
/// it explicitly when availability is re-fetched.
#[derive(Debug, Clone)]
pub struct CalendarWindow {
    anchor: Option<NaiveDate>,
    page_offset: u32,
    page_size: usize,
}

impl CalendarWindow {
    pub fn new(viewport_width: u32) -> Self {
        Self {
            anchor: None,
            page_offset: 0,
            page_size: page_size_for_viewport(viewport_width),
        }
    }

    /// Viewport resize mid-session: the page size changes but the anchor and
    /// page offset are kept, so the window start stays consistent.
    pub fn set_viewport_width(&mut self, width: u32) {
        self.page_size = page_size_for_viewport(width);
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn page_offset(&self) -> u32 {
        self.page_offset
    }

    pub fn anchor(&self) -> Option<NaiveDate> {
        self.anchor
    }

    /// First call wins for the session: the earliest sanitized date, or today
    /// when the record is empty. Later calls return the memoized value.
    pub fn ensure_anchor(&mut self, record: &AvailabilityRecord, today: NaiveDate) -> NaiveDate {
        if let Some(anchor) = self.anchor {
            return anchor;
        }

        let anchor = record.earliest_date().map(|d| d.0).unwrap_or(today);
        debug!("Anchoring calendar window at {}", anchor);
        self.anchor = Some(anchor);
        anchor
    }

    /// Clears the memoized anchor (and rewinds paging) after availability
    /// changes shape, e.g. on re-fetch.
    pub fn reset(&mut self) {
        self.anchor = None;
        self.page_offset = 0;
    }

    pub fn next_page(&mut self) {
        self.page_offset = (self.page_offset + 1).min(MAX_PAGE_OFFSET);
    }

    /// No-op at the first page.
    pub fn prev_page(&mut self) {
        self.page_offset = self.page_offset.saturating_sub(1);
    }

    /// Jumps straight to a page, clamped to [`MAX_PAGE_OFFSET`].
    pub fn jump_to_page(&mut self, offset: u32) {
        self.page_offset = offset.min(MAX_PAGE_OFFSET);
    }

    /// The `page_size` consecutive dates starting at
    /// `anchor + page_offset * page_size` days. Empty until an anchor is set;
    /// dates past the calendar's representable end are omitted.
    pub fn dates(&self) -> Vec<NaiveDate> {
        let Some(anchor) = self.anchor else {
            return Vec::new();
        };

        let days = self.page_offset as u64 * self.page_size as u64;
        let Some(start) = anchor.checked_add_days(Days::new(days)) else {
            return Vec::new();
        };
        (0..self.page_size)
            .filter_map(|i| start.checked_add_days(Days::new(i as u64)))
            .collect()
    }
}
