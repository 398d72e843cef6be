//! Query window and retention horizon.
//!
//! # Invariants
//!
//! - Dates are calendar dates rendered as `YYYY-MM-DD`. The format is
//!   fixed-width and zero-padded, so comparing the text is the same as
//!   comparing the dates.
//! - `start <= end`.
//! - The retention cutoff is `start - 1 day`, computed on the calendar (not
//!   as 24 hours), so month and year boundaries behave.

use std::fmt;

use chrono::{Days, NaiveDate};

/// Text format of every date the engine compares.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Days between the window start and the retention cutoff.
pub const RETENTION_GRACE_DAYS: u64 = 1;

/// Render a date in [`DATE_FORMAT`].
pub fn date_key(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

/// Records dated strictly before this are pruned from the snapshot.
pub fn retention_cutoff(window_start: NaiveDate) -> NaiveDate {
    window_start
        .checked_sub_days(Days::new(RETENTION_GRACE_DAYS))
        .unwrap_or(NaiveDate::MIN)
}

/// Returned by [`Window::new`] when `start > end`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InvalidWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl fmt::Display for InvalidWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "invalid window: start {} is after end {}",
            date_key(self.start),
            date_key(self.end)
        )
    }
}

impl std::error::Error for InvalidWindow {}

/// The `(start, end)` range a pass queries and reasons about.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Window {
    start: NaiveDate,
    end: NaiveDate,
}

impl Window {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, InvalidWindow> {
        if start > end {
            return Err(InvalidWindow { start, end });
        }
        Ok(Self { start, end })
    }

    /// Window ending `today` and starting `days_back` calendar days earlier.
    pub fn lookback(today: NaiveDate, days_back: u32) -> Self {
        let start = today
            .checked_sub_days(Days::new(u64::from(days_back)))
            .unwrap_or(NaiveDate::MIN);
        Self { start, end: today }
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    pub fn start_key(&self) -> String {
        date_key(self.start)
    }

    pub fn end_key(&self) -> String {
        date_key(self.end)
    }

    pub fn retention_cutoff(&self) -> NaiveDate {
        retention_cutoff(self.start)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn date_key_is_zero_padded() {
        assert_eq!(date_key(d(2024, 1, 5)), "2024-01-05");
    }

    #[test]
    fn cutoff_crosses_year_boundary() {
        assert_eq!(retention_cutoff(d(2024, 1, 1)), d(2023, 12, 31));
    }

    #[test]
    fn cutoff_handles_leap_day() {
        assert_eq!(retention_cutoff(d(2024, 3, 1)), d(2024, 2, 29));
    }

    #[test]
    fn lookback_counts_calendar_days() {
        let w = Window::lookback(d(2024, 3, 31), 90);
        assert_eq!(w.start(), d(2024, 1, 1));
        assert_eq!(w.end(), d(2024, 3, 31));
        assert_eq!(w.start_key(), "2024-01-01");
        assert_eq!(w.end_key(), "2024-03-31");
    }

    #[test]
    fn zero_lookback_is_single_day() {
        let w = Window::lookback(d(2024, 6, 1), 0);
        assert_eq!(w.start(), w.end());
    }

    #[test]
    fn inverted_window_rejected() {
        let err = Window::new(d(2024, 2, 1), d(2024, 1, 1)).unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid window: start 2024-02-01 is after end 2024-01-01"
        );
    }

    #[test]
    fn text_order_matches_date_order() {
        let a = date_key(d(2023, 12, 31));
        let b = date_key(d(2024, 1, 1));
        assert!(a < b);
    }
}
