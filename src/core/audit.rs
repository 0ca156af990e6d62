//! Append-only audit trail.
//!
//! The dispatcher is the only writer: for every successful mutating
//! dispatch it turns exactly one [`AuditDraft`] into one `audit_log` row,
//! inside the same transaction as the mutation itself. There is no update
//! or delete path anywhere in the crate.

use crate::core::error::GantryError;
use crate::core::time;
use rusqlite::{Connection, params};
use serde::Serialize;
use serde_json::Value as JsonValue;

/// Actor attribution. `user_id` stays `None` for system-triggered
/// actions, with `username` recording `"system"`.
#[derive(Debug, Clone)]
pub struct Actor {
    pub user_id: Option<i64>,
    pub username: String,
}

impl Actor {
    pub fn system() -> Self {
        Self {
            user_id: None,
            username: "system".to_string(),
        }
    }

    pub fn named(user_id: Option<i64>, username: &str) -> Self {
        Self {
            user_id,
            username: username.to_string(),
        }
    }
}

/// What a mutating handler wants recorded. `old_values` is `None` for
/// creations, `new_values` is `None` for deletions; both carry the full
/// row image otherwise.
#[derive(Debug, Clone)]
pub struct AuditDraft {
    pub action: String,
    pub entity_type: String,
    pub entity_id: i64,
    pub old_values: Option<JsonValue>,
    pub new_values: Option<JsonValue>,
}

/// Appends one entry using the caller's connection, so an open transaction
/// covers data row and trail row together. Failures are reported as
/// [`GantryError::AuditWrite`]; the dispatcher reacts by rolling the whole
/// transaction back.
pub fn append_entry(
    conn: &Connection,
    dispatch_id: &str,
    actor: &Actor,
    client_meta: Option<&JsonValue>,
    draft: &AuditDraft,
) -> Result<String, GantryError> {
    let entry_id = time::new_entry_id();
    conn.execute(
        "INSERT INTO audit_log (entry_id, dispatch_id, user_id, username, action, entity_type, entity_id, old_values, new_values, client_meta, ts)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        params![
            entry_id,
            dispatch_id,
            actor.user_id,
            actor.username,
            draft.action,
            draft.entity_type,
            draft.entity_id,
            draft.old_values.as_ref().map(|v| v.to_string()),
            draft.new_values.as_ref().map(|v| v.to_string()),
            client_meta.map(|v| v.to_string()),
            time::now_utc(),
        ],
    )
    .map_err(|e| GantryError::AuditWrite(e.to_string()))?;
    Ok(entry_id)
}

/// One persisted trail entry, in wire shape.
#[derive(Debug, Clone, Serialize)]
pub struct AuditEntry {
    pub id: i64,
    #[serde(rename = "entryId")]
    pub entry_id: String,
    #[serde(rename = "dispatchId")]
    pub dispatch_id: String,
    #[serde(rename = "userId")]
    pub user_id: Option<i64>,
    pub username: String,
    pub action: String,
    #[serde(rename = "entityType")]
    pub entity_type: String,
    #[serde(rename = "entityId")]
    pub entity_id: i64,
    #[serde(rename = "oldValues")]
    pub old_values: Option<JsonValue>,
    #[serde(rename = "newValues")]
    pub new_values: Option<JsonValue>,
    #[serde(rename = "clientMeta")]
    pub client_meta: Option<JsonValue>,
    #[serde(rename = "timestamp")]
    pub ts: String,
}

fn parse_json_col(raw: Option<String>) -> Option<JsonValue> {
    raw.map(|s| match serde_json::from_str(&s) {
        Ok(v) => v,
        Err(_) => JsonValue::String(s),
    })
}

/// Most recent entries first.
pub fn recent_entries(conn: &Connection, limit: i64) -> Result<Vec<AuditEntry>, GantryError> {
    let mut stmt = conn.prepare(
        "SELECT id, entry_id, dispatch_id, user_id, username, action, entity_type, entity_id, old_values, new_values, client_meta, ts
         FROM audit_log ORDER BY id DESC LIMIT ?1",
    )?;
    let rows = stmt.query_map(params![limit], |row| {
        Ok(AuditEntry {
            id: row.get(0)?,
            entry_id: row.get(1)?,
            dispatch_id: row.get(2)?,
            user_id: row.get(3)?,
            username: row.get(4)?,
            action: row.get(5)?,
            entity_type: row.get(6)?,
            entity_id: row.get(7)?,
            old_values: parse_json_col(row.get(8)?),
            new_values: parse_json_col(row.get(9)?),
            client_meta: parse_json_col(row.get(10)?),
            ts: row.get(11)?,
        })
    })?;
    let mut entries = Vec::new();
    for entry in rows {
        entries.push(entry?);
    }
    Ok(entries)
}

pub fn entry_count(conn: &Connection) -> Result<i64, GantryError> {
    let count = conn.query_row("SELECT COUNT(*) FROM audit_log", [], |row| row.get(0))?;
    Ok(count)
}
