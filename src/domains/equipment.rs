//! Equipment registry: the assets every other domain hangs off.
//!
//! Deleting equipment is a hard delete and cascades through events,
//! certificates, and PM schedules (`ON DELETE CASCADE`); the soft path is
//! `update {active: false}`. The audit entry keeps the last row image
//! either way.

use crate::core::audit::AuditDraft;
use crate::core::error::GantryError;
use crate::core::registry::{Handled, HandlerCtx, ParamRule, ParamSpec, ValidatedParams};
use crate::core::time;
use rusqlite::{Connection, OptionalExtension, ToSql, params};
use serde::Serialize;

/// Category keywords marking equipment that takes periodic load tests.
pub const LIFTING_KEYWORDS: &[&str] = &["crane", "hoist", "lift", "davit", "winch"];
/// Category keywords marking instruments that take calibrations.
pub const INSTRUMENT_KEYWORDS: &[&str] = &["scale", "gauge", "meter", "indicator", "transducer"];

/// Free-form categories are matched by keyword, so "Overhead bridge crane"
/// and "crane, gantry" both count as lifting equipment.
pub fn requires_load_test(category: &str) -> bool {
    let text = category.to_lowercase();
    LIFTING_KEYWORDS.iter().any(|k| text.contains(k))
}

pub fn requires_calibration(category: &str) -> bool {
    let text = category.to_lowercase();
    INSTRUMENT_KEYWORDS.iter().any(|k| text.contains(k))
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Equipment {
    pub id: i64,
    pub code: String,
    pub name: String,
    pub category: String,
    pub capacity: Option<f64>,
    pub location: String,
    pub active: bool,
    pub created_at: String,
    pub updated_at: String,
}

pub const GET_ALL_PARAMS: &[ParamSpec] = &[ParamSpec {
    name: "activeOnly",
    rule: ParamRule::Flag,
    required: false,
}];

pub const GET_BY_ID_PARAMS: &[ParamSpec] = &[ParamSpec {
    name: "id",
    rule: ParamRule::Id,
    required: true,
}];

pub const CREATE_PARAMS: &[ParamSpec] = &[
    ParamSpec { name: "code", rule: ParamRule::Text { max: 100 }, required: true },
    ParamSpec { name: "name", rule: ParamRule::Text { max: 200 }, required: true },
    ParamSpec { name: "category", rule: ParamRule::Text { max: 200 }, required: false },
    ParamSpec { name: "capacity", rule: ParamRule::Number, required: false },
    ParamSpec { name: "location", rule: ParamRule::Text { max: 200 }, required: false },
    ParamSpec { name: "active", rule: ParamRule::Flag, required: false },
];

pub const UPDATE_PARAMS: &[ParamSpec] = &[
    ParamSpec { name: "id", rule: ParamRule::Id, required: true },
    ParamSpec { name: "code", rule: ParamRule::Text { max: 100 }, required: false },
    ParamSpec { name: "name", rule: ParamRule::Text { max: 200 }, required: false },
    ParamSpec { name: "category", rule: ParamRule::Text { max: 200 }, required: false },
    ParamSpec { name: "capacity", rule: ParamRule::Number, required: false },
    ParamSpec { name: "location", rule: ParamRule::Text { max: 200 }, required: false },
    ParamSpec { name: "active", rule: ParamRule::Flag, required: false },
];

pub const DELETE_PARAMS: &[ParamSpec] = &[ParamSpec {
    name: "id",
    rule: ParamRule::Id,
    required: true,
}];

const SELECT_COLS: &str = "id, code, name, category, capacity, location, active, created_at, updated_at";

fn row_to_equipment(row: &rusqlite::Row) -> rusqlite::Result<Equipment> {
    Ok(Equipment {
        id: row.get(0)?,
        code: row.get(1)?,
        name: row.get(2)?,
        category: row.get(3)?,
        capacity: row.get(4)?,
        location: row.get(5)?,
        active: row.get::<_, i64>(6)? != 0,
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
    })
}

pub fn fetch_equipment(conn: &Connection, id: i64) -> Result<Option<Equipment>, GantryError> {
    let row = conn
        .query_row(
            &format!("SELECT {} FROM equipment WHERE id = ?1", SELECT_COLS),
            params![id],
            |row| row_to_equipment(row),
        )
        .optional()?;
    Ok(row)
}

/// Asserts that an equipment row exists, for handlers about to reference
/// it. The error names the relation so the gateway can surface a
/// constraint violation the presentation layer can show.
pub fn require_equipment(conn: &Connection, id: i64) -> Result<Equipment, GantryError> {
    fetch_equipment(conn, id)?.ok_or_else(|| GantryError::MissingRelation {
        relation: "equipment".to_string(),
        detail: format!("equipment {} does not exist", id),
    })
}

pub fn list_equipment(conn: &Connection, active_only: bool) -> Result<Vec<Equipment>, GantryError> {
    let mut query = format!("SELECT {} FROM equipment", SELECT_COLS);
    if active_only {
        query.push_str(" WHERE active = 1");
    }
    query.push_str(" ORDER BY code ASC");
    let mut stmt = conn.prepare(&query)?;
    let rows = stmt.query_map([], |row| row_to_equipment(row))?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

pub fn get_all_op(
    conn: &Connection,
    p: &ValidatedParams,
    _ctx: &HandlerCtx,
) -> Result<Handled, GantryError> {
    let active_only = p.flag("activeOnly").unwrap_or(false);
    let rows = list_equipment(conn, active_only)?;
    Ok(Handled::read(serde_json::to_value(rows)?))
}

pub fn get_by_id_op(
    conn: &Connection,
    p: &ValidatedParams,
    _ctx: &HandlerCtx,
) -> Result<Handled, GantryError> {
    let id = p.id("id").unwrap_or_default();
    let row = require_equipment(conn, id)?;
    Ok(Handled::read(serde_json::to_value(row)?))
}

pub fn create_op(
    conn: &Connection,
    p: &ValidatedParams,
    _ctx: &HandlerCtx,
) -> Result<Handled, GantryError> {
    let now = time::now_utc();
    conn.execute(
        "INSERT INTO equipment (code, name, category, capacity, location, active, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)",
        params![
            p.text("code").unwrap_or_default(),
            p.text("name").unwrap_or_default(),
            p.text("category").unwrap_or(""),
            p.number("capacity"),
            p.text("location").unwrap_or(""),
            p.flag("active").unwrap_or(true) as i64,
            now,
        ],
    )?;
    let id = conn.last_insert_rowid();
    let row = require_equipment(conn, id)?;
    let value = serde_json::to_value(&row)?;
    Ok(Handled::mutated(
        value.clone(),
        AuditDraft {
            action: "equipment.create".to_string(),
            entity_type: "equipment".to_string(),
            entity_id: id,
            old_values: None,
            new_values: Some(value),
        },
    ))
}

pub fn update_op(
    conn: &Connection,
    p: &ValidatedParams,
    _ctx: &HandlerCtx,
) -> Result<Handled, GantryError> {
    let id = p.id("id").unwrap_or_default();
    let old = require_equipment(conn, id)?;

    let mut set_clauses: Vec<&str> = Vec::new();
    let mut sql_params: Vec<Box<dyn ToSql>> = Vec::new();
    if let Some(code) = p.text("code") {
        set_clauses.push("code = ?");
        sql_params.push(Box::new(code.to_string()));
    }
    if let Some(name) = p.text("name") {
        set_clauses.push("name = ?");
        sql_params.push(Box::new(name.to_string()));
    }
    if let Some(category) = p.text("category") {
        set_clauses.push("category = ?");
        sql_params.push(Box::new(category.to_string()));
    }
    if let Some(capacity) = p.number("capacity") {
        set_clauses.push("capacity = ?");
        sql_params.push(Box::new(capacity));
    }
    if let Some(location) = p.text("location") {
        set_clauses.push("location = ?");
        sql_params.push(Box::new(location.to_string()));
    }
    if let Some(active) = p.flag("active") {
        set_clauses.push("active = ?");
        sql_params.push(Box::new(active as i64));
    }

    if set_clauses.is_empty() {
        // Nothing to change; no mutation, no audit entry.
        return Ok(Handled::read(serde_json::to_value(old)?));
    }

    set_clauses.push("updated_at = ?");
    sql_params.push(Box::new(time::now_utc()));
    sql_params.push(Box::new(id));

    let update_sql = format!(
        "UPDATE equipment SET {} WHERE id = ?",
        set_clauses.join(", ")
    );
    let params_as_dyn: Vec<&dyn ToSql> = sql_params.iter().map(|p| p.as_ref()).collect();
    conn.execute(&update_sql, &params_as_dyn[..])?;

    let new = require_equipment(conn, id)?;
    let new_value = serde_json::to_value(&new)?;
    Ok(Handled::mutated(
        new_value.clone(),
        AuditDraft {
            action: "equipment.update".to_string(),
            entity_type: "equipment".to_string(),
            entity_id: id,
            old_values: Some(serde_json::to_value(old)?),
            new_values: Some(new_value),
        },
    ))
}

pub fn delete_op(
    conn: &Connection,
    p: &ValidatedParams,
    _ctx: &HandlerCtx,
) -> Result<Handled, GantryError> {
    let id = p.id("id").unwrap_or_default();
    let old = require_equipment(conn, id)?;
    conn.execute("DELETE FROM equipment WHERE id = ?1", params![id])?;
    Ok(Handled::mutated(
        serde_json::json!({"id": id, "deleted": true}),
        AuditDraft {
            action: "equipment.delete".to_string(),
            entity_type: "equipment".to_string(),
            entity_id: id,
            old_values: Some(serde_json::to_value(old)?),
            new_values: None,
        },
    ))
}
