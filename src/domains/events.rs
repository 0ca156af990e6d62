//! Compliance events: one table behind three wire domains.
//!
//! Load tests, calibrations, and inspections share storage, parameter
//! tables, and handler logic; the `asset_class` column keeps them apart.
//! The wire keeps three separate domains (`loadTests`, `calibrations`,
//! `inspections`) because the presentation layer treats them as separate
//! registers. Every handler here is a thin per-class wrapper over the
//! shared implementation.

use crate::core::audit::AuditDraft;
use crate::core::error::GantryError;
use crate::core::registry::{Handled, HandlerCtx, ParamRule, ParamSpec, ValidatedParams};
use crate::core::scheduler::{self, DueItem, IntervalType};
use crate::core::time;
use crate::domains::equipment;
use rusqlite::{Connection, OptionalExtension, params};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetClass {
    LoadTest,
    Calibration,
    Inspection,
}

impl AssetClass {
    /// Stored discriminator value.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LoadTest => "load_test",
            Self::Calibration => "calibration",
            Self::Inspection => "inspection",
        }
    }

    /// Wire domain this class answers under.
    pub fn wire_domain(&self) -> &'static str {
        match self {
            Self::LoadTest => "loadTests",
            Self::Calibration => "calibrations",
            Self::Inspection => "inspections",
        }
    }

    /// Notification label prefix.
    pub fn label(&self) -> &'static str {
        match self {
            Self::LoadTest => "Load test",
            Self::Calibration => "Calibration",
            Self::Inspection => "Inspection",
        }
    }
}

pub const OUTCOMES: &[&str] = &["pass", "fail"];

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComplianceEvent {
    pub id: i64,
    pub asset_class: String,
    pub equipment_id: i64,
    pub event_date: String,
    pub interval_type: String,
    pub next_due: Option<String>,
    pub outcome: Option<String>,
    pub inspector: Option<String>,
    pub notes: Option<String>,
    pub deficiencies: Option<String>,
    pub corrective_action: Option<String>,
    pub certificate_id: Option<i64>,
    pub created_at: String,
}

pub const CREATE_PARAMS: &[ParamSpec] = &[
    ParamSpec { name: "equipmentId", rule: ParamRule::Id, required: true },
    ParamSpec { name: "eventDate", rule: ParamRule::Date, required: true },
    ParamSpec { name: "intervalType", rule: ParamRule::OneOf(IntervalType::WIRE_NAMES), required: false },
    ParamSpec { name: "nextDue", rule: ParamRule::Date, required: false },
    ParamSpec { name: "outcome", rule: ParamRule::OneOf(OUTCOMES), required: false },
    ParamSpec { name: "inspector", rule: ParamRule::Text { max: 200 }, required: false },
    ParamSpec { name: "notes", rule: ParamRule::Text { max: 2000 }, required: false },
    ParamSpec { name: "deficiencies", rule: ParamRule::Text { max: 2000 }, required: false },
    ParamSpec { name: "correctiveAction", rule: ParamRule::Text { max: 2000 }, required: false },
    ParamSpec { name: "certificateId", rule: ParamRule::Id, required: false },
];

pub const GET_ALL_PARAMS: &[ParamSpec] = &[];

pub const GET_BY_EQUIPMENT_PARAMS: &[ParamSpec] = &[ParamSpec {
    name: "equipmentId",
    rule: ParamRule::Id,
    required: true,
}];

pub const GET_DUE_PARAMS: &[ParamSpec] = &[
    ParamSpec { name: "asOf", rule: ParamRule::Date, required: false },
    ParamSpec { name: "threshold", rule: ParamRule::Date, required: false },
];

pub const GET_OVERDUE_PARAMS: &[ParamSpec] = &[ParamSpec {
    name: "asOf",
    rule: ParamRule::Date,
    required: false,
}];

const SELECT_COLS: &str = "id, asset_class, equipment_id, event_date, interval_type, next_due, outcome, inspector, notes, deficiencies, corrective_action, certificate_id, created_at";

fn row_to_event(row: &rusqlite::Row) -> rusqlite::Result<ComplianceEvent> {
    Ok(ComplianceEvent {
        id: row.get(0)?,
        asset_class: row.get(1)?,
        equipment_id: row.get(2)?,
        event_date: row.get(3)?,
        interval_type: row.get(4)?,
        next_due: row.get(5)?,
        outcome: row.get(6)?,
        inspector: row.get(7)?,
        notes: row.get(8)?,
        deficiencies: row.get(9)?,
        corrective_action: row.get(10)?,
        certificate_id: row.get(11)?,
        created_at: row.get(12)?,
    })
}

pub fn fetch_event(conn: &Connection, id: i64) -> Result<Option<ComplianceEvent>, GantryError> {
    let row = conn
        .query_row(
            &format!("SELECT {} FROM compliance_events WHERE id = ?1", SELECT_COLS),
            params![id],
            |row| row_to_event(row),
        )
        .optional()?;
    Ok(row)
}

fn collect_events(
    conn: &Connection,
    where_clause: &str,
    bind: &[&dyn rusqlite::ToSql],
) -> Result<Vec<ComplianceEvent>, GantryError> {
    let query = format!(
        "SELECT {} FROM compliance_events WHERE {} ORDER BY event_date DESC, id DESC",
        SELECT_COLS, where_clause
    );
    let mut stmt = conn.prepare(&query)?;
    let rows = stmt.query_map(bind, |row| row_to_event(row))?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

fn create_event(
    conn: &Connection,
    p: &ValidatedParams,
    class: AssetClass,
) -> Result<Handled, GantryError> {
    let equipment_id = p.id("equipmentId").unwrap_or_default();
    equipment::require_equipment(conn, equipment_id)?;

    let event_date = p.date("eventDate").ok_or_else(|| {
        GantryError::ValidationError("eventDate is required".to_string())
    })?;
    let interval = p
        .choice("intervalType")
        .and_then(IntervalType::from_wire)
        .unwrap_or(IntervalType::Annual);

    // Caller-supplied nextDue overrides the computed one but may not
    // precede the event itself.
    let next_due = match p.date("nextDue") {
        Some(supplied) => {
            if supplied < event_date {
                return Err(GantryError::ValidationError(
                    "nextDue must be on or after eventDate".to_string(),
                ));
            }
            supplied
        }
        None => scheduler::next_due(event_date, interval),
    };

    if let Some(certificate_id) = p.id("certificateId") {
        let exists: Option<i64> = conn
            .query_row(
                "SELECT id FROM certificates WHERE id = ?1",
                params![certificate_id],
                |row| row.get(0),
            )
            .optional()?;
        if exists.is_none() {
            return Err(GantryError::MissingRelation {
                relation: "certificates".to_string(),
                detail: format!("certificate {} does not exist", certificate_id),
            });
        }
    }

    conn.execute(
        "INSERT INTO compliance_events (asset_class, equipment_id, event_date, interval_type, next_due, outcome, inspector, notes, deficiencies, corrective_action, certificate_id, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
        params![
            class.as_str(),
            equipment_id,
            time::format_date(event_date),
            interval.as_str(),
            time::format_date(next_due),
            p.choice("outcome"),
            p.text("inspector"),
            p.text("notes"),
            p.text("deficiencies"),
            p.text("correctiveAction"),
            p.id("certificateId"),
            time::now_utc(),
        ],
    )?;
    let id = conn.last_insert_rowid();
    let row = fetch_event(conn, id)?.ok_or_else(|| {
        GantryError::NotFound(format!("{} {} vanished after insert", class.as_str(), id))
    })?;
    let value = serde_json::to_value(&row)?;
    Ok(Handled::mutated(
        value.clone(),
        AuditDraft {
            action: format!("{}.create", class.wire_domain()),
            entity_type: class.as_str().to_string(),
            entity_id: id,
            old_values: None,
            new_values: Some(value),
        },
    ))
}

fn get_all(conn: &Connection, class: AssetClass) -> Result<Handled, GantryError> {
    let rows = collect_events(conn, "asset_class = ?1", &[&class.as_str()])?;
    Ok(Handled::read(serde_json::to_value(rows)?))
}

fn get_by_equipment(
    conn: &Connection,
    p: &ValidatedParams,
    class: AssetClass,
) -> Result<Handled, GantryError> {
    let equipment_id = p.id("equipmentId").unwrap_or_default();
    let rows = collect_events(
        conn,
        "asset_class = ?1 AND equipment_id = ?2",
        &[&class.as_str(), &equipment_id],
    )?;
    Ok(Handled::read(serde_json::to_value(rows)?))
}

/// Due-window query: rows whose next due date falls in `[asOf, threshold]`.
/// The threshold defaults to the standard lookahead. Stored dates are
/// written through validation, but rows are re-parsed here so a
/// hand-edited value drops out instead of corrupting the window.
fn get_due(conn: &Connection, p: &ValidatedParams, class: AssetClass) -> Result<Handled, GantryError> {
    let today = p.date("asOf").unwrap_or_else(time::today);
    let threshold = p
        .date("threshold")
        .unwrap_or_else(|| time::add_days(today, scheduler::DEFAULT_DUE_LOOKAHEAD_DAYS));
    let rows = collect_events(
        conn,
        "asset_class = ?1 AND next_due IS NOT NULL AND next_due >= ?2 AND next_due <= ?3",
        &[
            &class.as_str(),
            &time::format_date(today),
            &time::format_date(threshold),
        ],
    )?;
    let rows: Vec<ComplianceEvent> = rows
        .into_iter()
        .filter(|e| e.next_due.as_deref().and_then(time::parse_date).is_some())
        .collect();
    Ok(Handled::read(serde_json::to_value(rows)?))
}

fn get_overdue(
    conn: &Connection,
    p: &ValidatedParams,
    class: AssetClass,
) -> Result<Handled, GantryError> {
    let today = p.date("asOf").unwrap_or_else(time::today);
    let rows = collect_events(
        conn,
        "asset_class = ?1 AND next_due IS NOT NULL AND next_due < ?2",
        &[&class.as_str(), &time::format_date(today)],
    )?;
    let rows: Vec<ComplianceEvent> = rows
        .into_iter()
        .filter(|e| e.next_due.as_deref().and_then(time::parse_date).is_some())
        .collect();
    Ok(Handled::read(serde_json::to_value(rows)?))
}

/// Every event of a class joined with its equipment name, as scheduler
/// input. Malformed stored dates surface as `due_date: None` and classify
/// `no-date` downstream; one bad row never sinks the batch.
pub fn class_items(conn: &Connection, class: AssetClass) -> Result<Vec<DueItem>, GantryError> {
    let mut stmt = conn.prepare(
        "SELECT ev.id, ev.equipment_id, ev.next_due, e.name
         FROM compliance_events ev JOIN equipment e ON e.id = ev.equipment_id
         WHERE ev.asset_class = ?1
         ORDER BY ev.id ASC",
    )?;
    let rows = stmt.query_map(params![class.as_str()], |row| {
        Ok((
            row.get::<_, i64>(0)?,
            row.get::<_, i64>(1)?,
            row.get::<_, Option<String>>(2)?,
            row.get::<_, String>(3)?,
        ))
    })?;
    let mut items = Vec::new();
    for row in rows {
        let (id, equipment_id, next_due, equipment_name) = row?;
        items.push(DueItem {
            event_id: id,
            equipment_id: Some(equipment_id),
            label: format!("{} for {}", class.label(), equipment_name),
            due_date: next_due.as_deref().and_then(time::parse_date),
        });
    }
    Ok(items)
}

// Per-class wrappers wired into the registry. Handlers are plain fn
// pointers, so the class is baked in here rather than captured.

pub fn load_tests_create(c: &Connection, p: &ValidatedParams, _x: &HandlerCtx) -> Result<Handled, GantryError> {
    create_event(c, p, AssetClass::LoadTest)
}
pub fn load_tests_get_all(c: &Connection, _p: &ValidatedParams, _x: &HandlerCtx) -> Result<Handled, GantryError> {
    get_all(c, AssetClass::LoadTest)
}
pub fn load_tests_get_by_equipment(c: &Connection, p: &ValidatedParams, _x: &HandlerCtx) -> Result<Handled, GantryError> {
    get_by_equipment(c, p, AssetClass::LoadTest)
}
pub fn load_tests_get_due(c: &Connection, p: &ValidatedParams, _x: &HandlerCtx) -> Result<Handled, GantryError> {
    get_due(c, p, AssetClass::LoadTest)
}
pub fn load_tests_get_overdue(c: &Connection, p: &ValidatedParams, _x: &HandlerCtx) -> Result<Handled, GantryError> {
    get_overdue(c, p, AssetClass::LoadTest)
}

pub fn calibrations_create(c: &Connection, p: &ValidatedParams, _x: &HandlerCtx) -> Result<Handled, GantryError> {
    create_event(c, p, AssetClass::Calibration)
}
pub fn calibrations_get_all(c: &Connection, _p: &ValidatedParams, _x: &HandlerCtx) -> Result<Handled, GantryError> {
    get_all(c, AssetClass::Calibration)
}
pub fn calibrations_get_by_equipment(c: &Connection, p: &ValidatedParams, _x: &HandlerCtx) -> Result<Handled, GantryError> {
    get_by_equipment(c, p, AssetClass::Calibration)
}
pub fn calibrations_get_due(c: &Connection, p: &ValidatedParams, _x: &HandlerCtx) -> Result<Handled, GantryError> {
    get_due(c, p, AssetClass::Calibration)
}
pub fn calibrations_get_overdue(c: &Connection, p: &ValidatedParams, _x: &HandlerCtx) -> Result<Handled, GantryError> {
    get_overdue(c, p, AssetClass::Calibration)
}

pub fn inspections_create(c: &Connection, p: &ValidatedParams, _x: &HandlerCtx) -> Result<Handled, GantryError> {
    create_event(c, p, AssetClass::Inspection)
}
pub fn inspections_get_all(c: &Connection, _p: &ValidatedParams, _x: &HandlerCtx) -> Result<Handled, GantryError> {
    get_all(c, AssetClass::Inspection)
}
pub fn inspections_get_by_equipment(c: &Connection, p: &ValidatedParams, _x: &HandlerCtx) -> Result<Handled, GantryError> {
    get_by_equipment(c, p, AssetClass::Inspection)
}
pub fn inspections_get_due(c: &Connection, p: &ValidatedParams, _x: &HandlerCtx) -> Result<Handled, GantryError> {
    get_due(c, p, AssetClass::Inspection)
}
pub fn inspections_get_overdue(c: &Connection, p: &ValidatedParams, _x: &HandlerCtx) -> Result<Handled, GantryError> {
    get_overdue(c, p, AssetClass::Inspection)
}
