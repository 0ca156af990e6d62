//! Preventive-maintenance schedules. One row per recurring task on a
//! piece of equipment; `next_due` is computed from `last_done` plus the
//! interval when the caller does not supply it outright.

use crate::core::audit::AuditDraft;
use crate::core::error::GantryError;
use crate::core::registry::{Handled, HandlerCtx, ParamRule, ParamSpec, ValidatedParams};
use crate::core::scheduler::{self, DueItem, IntervalType};
use crate::core::time;
use crate::domains::equipment;
use rusqlite::{Connection, OptionalExtension, params};
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PmSchedule {
    pub id: i64,
    pub equipment_id: i64,
    pub task: String,
    pub interval_type: String,
    pub last_done: Option<String>,
    pub next_due: Option<String>,
    pub created_at: String,
}

pub const CREATE_PARAMS: &[ParamSpec] = &[
    ParamSpec { name: "equipmentId", rule: ParamRule::Id, required: true },
    ParamSpec { name: "task", rule: ParamRule::Text { max: 500 }, required: true },
    ParamSpec { name: "intervalType", rule: ParamRule::OneOf(IntervalType::WIRE_NAMES), required: false },
    ParamSpec { name: "lastDone", rule: ParamRule::Date, required: false },
    ParamSpec { name: "nextDue", rule: ParamRule::Date, required: false },
];

pub const GET_ALL_PARAMS: &[ParamSpec] = &[];
pub const GET_TOTAL_PARAMS: &[ParamSpec] = &[];

pub const GET_OVERDUE_PARAMS: &[ParamSpec] = &[ParamSpec {
    name: "asOf",
    rule: ParamRule::Date,
    required: false,
}];

const SELECT_COLS: &str = "id, equipment_id, task, interval_type, last_done, next_due, created_at";

fn row_to_schedule(row: &rusqlite::Row) -> rusqlite::Result<PmSchedule> {
    Ok(PmSchedule {
        id: row.get(0)?,
        equipment_id: row.get(1)?,
        task: row.get(2)?,
        interval_type: row.get(3)?,
        last_done: row.get(4)?,
        next_due: row.get(5)?,
        created_at: row.get(6)?,
    })
}

pub fn fetch_schedule(conn: &Connection, id: i64) -> Result<Option<PmSchedule>, GantryError> {
    let row = conn
        .query_row(
            &format!("SELECT {} FROM pm_schedules WHERE id = ?1", SELECT_COLS),
            params![id],
            |row| row_to_schedule(row),
        )
        .optional()?;
    Ok(row)
}

pub fn create_op(
    conn: &Connection,
    p: &ValidatedParams,
    _ctx: &HandlerCtx,
) -> Result<Handled, GantryError> {
    let equipment_id = p.id("equipmentId").unwrap_or_default();
    equipment::require_equipment(conn, equipment_id)?;

    let interval = p
        .choice("intervalType")
        .and_then(IntervalType::from_wire)
        .unwrap_or(IntervalType::Annual);
    let last_done = p.date("lastDone");
    let next_due = match p.date("nextDue") {
        Some(supplied) => {
            if let Some(done) = last_done {
                if supplied < done {
                    return Err(GantryError::ValidationError(
                        "nextDue must be on or after lastDone".to_string(),
                    ));
                }
            }
            Some(supplied)
        }
        None => last_done.map(|done| scheduler::next_due(done, interval)),
    };

    conn.execute(
        "INSERT INTO pm_schedules (equipment_id, task, interval_type, last_done, next_due, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            equipment_id,
            p.text("task").unwrap_or_default(),
            interval.as_str(),
            last_done.map(time::format_date),
            next_due.map(time::format_date),
            time::now_utc(),
        ],
    )?;
    let id = conn.last_insert_rowid();
    let row = fetch_schedule(conn, id)?
        .ok_or_else(|| GantryError::NotFound(format!("pm schedule {} vanished after insert", id)))?;
    let value = serde_json::to_value(&row)?;
    Ok(Handled::mutated(
        value.clone(),
        AuditDraft {
            action: "pmSchedules.create".to_string(),
            entity_type: "pm_schedule".to_string(),
            entity_id: id,
            old_values: None,
            new_values: Some(value),
        },
    ))
}

pub fn get_all_op(
    conn: &Connection,
    _p: &ValidatedParams,
    _ctx: &HandlerCtx,
) -> Result<Handled, GantryError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM pm_schedules ORDER BY next_due IS NULL, next_due ASC, id ASC",
        SELECT_COLS
    ))?;
    let rows = stmt.query_map([], |row| row_to_schedule(row))?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(Handled::read(serde_json::to_value(out)?))
}

pub fn get_total_op(
    conn: &Connection,
    _p: &ValidatedParams,
    _ctx: &HandlerCtx,
) -> Result<Handled, GantryError> {
    let total: i64 = conn.query_row("SELECT COUNT(*) FROM pm_schedules", [], |row| row.get(0))?;
    Ok(Handled::read(serde_json::json!({ "total": total })))
}

pub fn get_overdue_op(
    conn: &Connection,
    p: &ValidatedParams,
    _ctx: &HandlerCtx,
) -> Result<Handled, GantryError> {
    let today = p.date("asOf").unwrap_or_else(time::today);
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM pm_schedules WHERE next_due IS NOT NULL AND next_due < ?1 ORDER BY next_due ASC, id ASC",
        SELECT_COLS
    ))?;
    let rows = stmt.query_map(params![time::format_date(today)], |row| row_to_schedule(row))?;
    let mut out = Vec::new();
    for row in rows {
        let schedule = row?;
        if schedule
            .next_due
            .as_deref()
            .and_then(time::parse_date)
            .is_some()
        {
            out.push(schedule);
        }
    }
    Ok(Handled::read(serde_json::to_value(out)?))
}

/// Every schedule joined with its equipment name, as scheduler input.
pub fn pm_items(conn: &Connection) -> Result<Vec<DueItem>, GantryError> {
    let mut stmt = conn.prepare(
        "SELECT pm.id, pm.equipment_id, pm.task, pm.next_due, e.name
         FROM pm_schedules pm JOIN equipment e ON e.id = pm.equipment_id
         ORDER BY pm.id ASC",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok((
            row.get::<_, i64>(0)?,
            row.get::<_, i64>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, Option<String>>(3)?,
            row.get::<_, String>(4)?,
        ))
    })?;
    let mut items = Vec::new();
    for row in rows {
        let (id, equipment_id, task, next_due, equipment_name) = row?;
        items.push(DueItem {
            event_id: id,
            equipment_id: Some(equipment_id),
            label: format!("PM task '{}' for {}", task, equipment_name),
            due_date: next_due.as_deref().and_then(time::parse_date),
        });
    }
    Ok(items)
}
