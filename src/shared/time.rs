//! Calendar-day helpers
//!
//! Slot bookkeeping works on whole UTC days. Timestamps are stripped to
//! their date before they reach a planning.

use chrono::{DateTime, NaiveDate, Utc};

use super::errors::DomainError;

/// UTC calendar day of a timestamp.
pub fn calendar_day(ts: DateTime<Utc>) -> NaiveDate {
    ts.date_naive()
}

/// Every calendar day in `[start, end]`, in order.
///
/// Empty when `start > end`.
pub fn days_inclusive(start: NaiveDate, end: NaiveDate) -> impl Iterator<Item = NaiveDate> {
    start.iter_days().take_while(move |d| *d <= end)
}

/// Number of nights/days covered by an inclusive range.
pub fn day_count(start: NaiveDate, end: NaiveDate) -> u32 {
    if start > end {
        return 0;
    }
    (end - start).num_days() as u32 + 1
}

/// Reject ranges whose start is after their end.
pub fn ensure_ordered(start: NaiveDate, end: NaiveDate) -> Result<(), DomainError> {
    if start > end {
        return Err(DomainError::Validation(format!(
            "date range start {start} is after end {end}"
        )));
    }
    Ok(())
}
