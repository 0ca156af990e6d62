//! Compliance scheduling engine.
//!
//! Pure calendar logic: next-due computation, lifecycle bucket
//! classification, and notification generation. Nothing here touches the
//! store or the wall clock; callers thread an explicit `today` through
//! every function, which is what makes the whole engine testable on pinned
//! dates.

use crate::core::time;
use chrono::NaiveDate;
use serde::Serialize;

/// Upper edge (inclusive, in days from today) of the `due-soon` bucket.
pub const DUE_SOON_WINDOW_DAYS: i64 = 30;
/// Upper edge (inclusive) of the `upcoming` bucket.
pub const UPCOMING_WINDOW_DAYS: i64 = 90;
/// Escalation edge inside the due-soon window: at or under this many days
/// out, a notification is a warning instead of an info.
pub const WARNING_WINDOW_DAYS: i64 = 7;
/// Default lookahead for due-window queries when the caller supplied no
/// threshold date.
pub const DEFAULT_DUE_LOOKAHEAD_DAYS: u64 = 30;

// DUE_SOON_WINDOW_DAYS, WARNING_WINDOW_DAYS, and DEFAULT_DUE_LOOKAHEAD_DAYS
// are three different dials (status bucket, notification urgency, query
// default) that currently happen to share numbers. Keep them separate;
// operators tune them independently.

/// Recurrence interval for a compliance event. Everything except
/// `periodic` renews on a one-year clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntervalType {
    Annual,
    Periodic,
    Initial,
    AfterRepair,
}

impl IntervalType {
    pub const WIRE_NAMES: &'static [&'static str] =
        &["annual", "periodic", "initial", "after_repair"];

    pub fn from_wire(raw: &str) -> Option<Self> {
        match raw {
            "annual" => Some(Self::Annual),
            "periodic" => Some(Self::Periodic),
            "initial" => Some(Self::Initial),
            "after_repair" => Some(Self::AfterRepair),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Annual => "annual",
            Self::Periodic => "periodic",
            Self::Initial => "initial",
            Self::AfterRepair => "after_repair",
        }
    }

    pub fn months(&self) -> u32 {
        match self {
            Self::Periodic => 6,
            Self::Annual | Self::Initial | Self::AfterRepair => 12,
        }
    }
}

/// Lifecycle bucket of a dated compliance item relative to `today`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum DueStatus {
    Overdue,
    DueSoon,
    Upcoming,
    Current,
    NoDate,
}

impl DueStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Overdue => "overdue",
            Self::DueSoon => "due-soon",
            Self::Upcoming => "upcoming",
            Self::Current => "current",
            Self::NoDate => "no-date",
        }
    }
}

/// Computes the next due date from an event date and its interval.
/// Calendar arithmetic clamps at month end: a leap-day annual event lands
/// on Feb 28 the following year.
pub fn next_due(event_date: NaiveDate, interval: IntervalType) -> NaiveDate {
    time::add_months(event_date, interval.months())
}

/// Bucket classification. Total over its inputs: a missing date is
/// `no-date`, never an error.
pub fn classify(today: NaiveDate, due: Option<NaiveDate>) -> DueStatus {
    let Some(due) = due else {
        return DueStatus::NoDate;
    };
    let diff = time::days_between(today, due);
    if diff < 0 {
        DueStatus::Overdue
    } else if diff <= DUE_SOON_WINDOW_DAYS {
        DueStatus::DueSoon
    } else if diff <= UPCOMING_WINDOW_DAYS {
        DueStatus::Upcoming
    } else {
        DueStatus::Current
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    Warning,
    Info,
}

/// One actionable compliance notification. Derived on demand, never
/// persisted.
#[derive(Debug, Clone, Serialize)]
pub struct Notification {
    #[serde(rename = "type")]
    pub severity: Severity,
    pub message: String,
    #[serde(rename = "equipmentId")]
    pub equipment_id: Option<i64>,
    #[serde(rename = "eventId")]
    pub event_id: i64,
    #[serde(rename = "dueDate")]
    pub due_date: String,
}

/// A dated item feeding notification generation. `equipment_id` is `None`
/// for operator credentials; a malformed stored date arrives here as
/// `due_date: None` and is skipped without disturbing the batch.
#[derive(Debug, Clone)]
pub struct DueItem {
    pub event_id: i64,
    pub equipment_id: Option<i64>,
    pub label: String,
    pub due_date: Option<NaiveDate>,
}

/// At most one notification per item: `critical` once overdue, `warning`
/// inside the escalation window, `info` for the rest of the due-soon
/// bucket, silence beyond it.
pub fn notification_for(today: NaiveDate, item: &DueItem) -> Option<Notification> {
    let due = item.due_date?;
    let diff = time::days_between(today, due);
    let due_str = time::format_date(due);
    let (severity, message) = if diff < 0 {
        (
            Severity::Critical,
            format!("{} was due {} ({} days overdue)", item.label, due_str, -diff),
        )
    } else if diff == 0 {
        (Severity::Warning, format!("{} is due today ({})", item.label, due_str))
    } else if diff <= WARNING_WINDOW_DAYS {
        (
            Severity::Warning,
            format!("{} is due in {} days ({})", item.label, diff, due_str),
        )
    } else if diff <= DUE_SOON_WINDOW_DAYS {
        (
            Severity::Info,
            format!("{} is due in {} days ({})", item.label, diff, due_str),
        )
    } else {
        return None;
    };
    Some(Notification {
        severity,
        message,
        equipment_id: item.equipment_id,
        event_id: item.event_id,
        due_date: due_str,
    })
}

pub fn notifications_for(today: NaiveDate, items: &[DueItem]) -> Vec<Notification> {
    items
        .iter()
        .filter_map(|item| notification_for(today, item))
        .collect()
}
