//! Shared calendar and timestamp helpers.
//!
//! Scheduling code never reads the wall clock on its own: every function
//! takes an explicit date, and [`today`] is the single fallback used when a
//! caller supplied none. Tests pin dates and never race midnight.

use chrono::{Datelike, Months, NaiveDate, Utc};
use ulid::Ulid;

/// Inclusive year bounds for calendar dates accepted on the wire.
pub const MIN_DATE_YEAR: i32 = 1900;
pub const MAX_DATE_YEAR: i32 = 2100;

/// The one wall-clock date read in the crate.
pub fn today() -> NaiveDate {
    Utc::now().date_naive()
}

/// RFC 3339 UTC timestamp (second precision) for persisted records.
pub fn now_utc() -> String {
    Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true)
}

pub fn new_dispatch_id() -> String {
    Ulid::new().to_string()
}

pub fn new_entry_id() -> String {
    Ulid::new().to_string()
}

/// Strict wire-date parse: `YYYY-MM-DD` exactly (zero-padded, no time
/// component), year within 1900..=2100. Returns `None` for anything else.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok()?;
    if format_date(date) != raw {
        return None;
    }
    if !(MIN_DATE_YEAR..=MAX_DATE_YEAR).contains(&date.year()) {
        return None;
    }
    Some(date)
}

pub fn format_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// Signed day count from `from` to `to` (positive when `to` is later).
pub fn days_between(from: NaiveDate, to: NaiveDate) -> i64 {
    (to - from).num_days()
}

/// Calendar-month addition with month-end clamping: Feb 29 + 12 months
/// lands on Feb 28, Aug 31 + 6 months on Feb 28.
pub fn add_months(date: NaiveDate, months: u32) -> NaiveDate {
    date.checked_add_months(Months::new(months)).unwrap_or(date)
}

pub fn add_days(date: NaiveDate, days: u64) -> NaiveDate {
    date.checked_add_days(chrono::Days::new(days)).unwrap_or(date)
}
