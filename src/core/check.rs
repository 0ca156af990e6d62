//! Best-effort compliance sweep.
//!
//! One pass over every asset class: bucket counts, notifications, and
//! coverage findings, computed against an explicit `as_of` date. A class
//! that fails to read is recorded as a gap and the sweep keeps going; only
//! a store that cannot be opened at all is an error. The sweep runs on its
//! own read connection and never touches the gateway write lock, so it
//! cannot block dispatch. The crate is daemonless: the presentation layer
//! owns whatever timer or focus trigger re-invokes this.

use crate::core::config::GantryConfig;
use crate::core::db;
use crate::core::error::GantryError;
use crate::core::scheduler::{self, DueItem, DueStatus, Notification, Severity};
use crate::core::store::Store;
use crate::domains::equipment;
use crate::domains::events::{self, AssetClass};
use crate::domains::{credentials, pm};
use chrono::NaiveDate;
use rusqlite::Connection;
use rustc_hash::FxHashSet;
use serde::Serialize;

#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
pub struct BucketCounts {
    pub overdue: usize,
    #[serde(rename = "dueSoon")]
    pub due_soon: usize,
    pub upcoming: usize,
    pub current: usize,
    #[serde(rename = "noDate")]
    pub no_date: usize,
}

impl BucketCounts {
    fn add(&mut self, status: DueStatus) {
        match status {
            DueStatus::Overdue => self.overdue += 1,
            DueStatus::DueSoon => self.due_soon += 1,
            DueStatus::Upcoming => self.upcoming += 1,
            DueStatus::Current => self.current += 1,
            DueStatus::NoDate => self.no_date += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.overdue + self.due_soon + self.upcoming + self.current + self.no_date
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ClassSummary {
    pub class: String,
    pub counts: BucketCounts,
}

#[derive(Debug, Clone, Serialize)]
pub struct ComplianceReport {
    #[serde(rename = "asOf")]
    pub as_of: String,
    pub classes: Vec<ClassSummary>,
    pub notifications: Vec<Notification>,
    /// Active equipment whose category demands a compliance class it has
    /// no history for.
    pub uncovered: Vec<String>,
    /// Sources that failed to read this pass. The rest of the report
    /// still stands.
    pub gaps: Vec<String>,
}

fn severity_rank(severity: Severity) -> u8 {
    match severity {
        Severity::Critical => 0,
        Severity::Warning => 1,
        Severity::Info => 2,
    }
}

fn sweep_source(
    name: &str,
    items: Result<Vec<DueItem>, GantryError>,
    today: NaiveDate,
    classes: &mut Vec<ClassSummary>,
    notifications: &mut Vec<Notification>,
    gaps: &mut Vec<String>,
) {
    match items {
        Ok(items) => {
            let mut counts = BucketCounts::default();
            for item in &items {
                counts.add(scheduler::classify(today, item.due_date));
            }
            notifications.extend(scheduler::notifications_for(today, &items));
            classes.push(ClassSummary {
                class: name.to_string(),
                counts,
            });
        }
        Err(e) => gaps.push(format!("{}: {}", name, e)),
    }
}

fn coverage_findings(conn: &Connection, gaps: &mut Vec<String>) -> Vec<String> {
    let mut uncovered = Vec::new();
    let equipment_rows = match equipment::list_equipment(conn, true) {
        Ok(rows) => rows,
        Err(e) => {
            gaps.push(format!("equipment: {}", e));
            return uncovered;
        }
    };
    let covered = |class: AssetClass, gaps: &mut Vec<String>| -> FxHashSet<i64> {
        match events::class_items(conn, class) {
            Ok(items) => items.iter().filter_map(|i| i.equipment_id).collect(),
            Err(e) => {
                gaps.push(format!("{} coverage: {}", class.as_str(), e));
                FxHashSet::default()
            }
        }
    };
    let load_tested = covered(AssetClass::LoadTest, gaps);
    let calibrated = covered(AssetClass::Calibration, gaps);
    for eq in &equipment_rows {
        if equipment::requires_load_test(&eq.category) && !load_tested.contains(&eq.id) {
            uncovered.push(format!("{} ({}) has no load test on record", eq.name, eq.code));
        }
        if equipment::requires_calibration(&eq.category) && !calibrated.contains(&eq.id) {
            uncovered.push(format!("{} ({}) has no calibration on record", eq.name, eq.code));
        }
    }
    uncovered
}

pub fn run_compliance_check(
    store: &Store,
    config: &GantryConfig,
    today: NaiveDate,
) -> Result<ComplianceReport, GantryError> {
    let db_path = config.db_path(store);
    if !db_path.exists() {
        return Err(GantryError::NotFound(
            "compliance store is not initialized".to_string(),
        ));
    }
    let conn = db::db_connect(&db_path)?;

    let mut classes = Vec::new();
    let mut notifications = Vec::new();
    let mut gaps = Vec::new();

    for class in [AssetClass::LoadTest, AssetClass::Calibration, AssetClass::Inspection] {
        sweep_source(
            class.as_str(),
            events::class_items(&conn, class),
            today,
            &mut classes,
            &mut notifications,
            &mut gaps,
        );
    }
    sweep_source(
        "pm_schedule",
        pm::pm_items(&conn),
        today,
        &mut classes,
        &mut notifications,
        &mut gaps,
    );
    sweep_source(
        "credential",
        credentials::credential_items(&conn),
        today,
        &mut classes,
        &mut notifications,
        &mut gaps,
    );

    let uncovered = coverage_findings(&conn, &mut gaps);

    notifications.sort_by(|a, b| {
        severity_rank(a.severity)
            .cmp(&severity_rank(b.severity))
            .then_with(|| a.due_date.cmp(&b.due_date))
            .then_with(|| a.event_id.cmp(&b.event_id))
    });

    Ok(ComplianceReport {
        as_of: crate::core::time::format_date(today),
        classes,
        notifications,
        uncovered,
        gaps,
    })
}
