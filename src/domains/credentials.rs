//! Operator credentials. These hang off people rather than equipment but
//! ride the same due-date machinery, keyed on `expiration_date`;
//! `getExpiring` is the due-window query under a different name.

use crate::core::audit::AuditDraft;
use crate::core::error::GantryError;
use crate::core::registry::{Handled, HandlerCtx, ParamRule, ParamSpec, ValidatedParams};
use crate::core::scheduler::{self, DueItem};
use crate::core::time;
use rusqlite::{Connection, OptionalExtension, params};
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Credential {
    pub id: i64,
    pub holder: String,
    pub credential_type: String,
    pub issued_date: Option<String>,
    pub expiration_date: Option<String>,
    pub created_at: String,
}

pub const CREATE_PARAMS: &[ParamSpec] = &[
    ParamSpec { name: "holder", rule: ParamRule::Text { max: 200 }, required: true },
    ParamSpec { name: "credentialType", rule: ParamRule::Text { max: 200 }, required: true },
    ParamSpec { name: "issuedDate", rule: ParamRule::Date, required: false },
    ParamSpec { name: "expirationDate", rule: ParamRule::Date, required: false },
];

pub const GET_ALL_PARAMS: &[ParamSpec] = &[];

pub const GET_EXPIRING_PARAMS: &[ParamSpec] = &[
    ParamSpec { name: "asOf", rule: ParamRule::Date, required: false },
    ParamSpec { name: "threshold", rule: ParamRule::Date, required: false },
];

const SELECT_COLS: &str = "id, holder, credential_type, issued_date, expiration_date, created_at";

fn row_to_credential(row: &rusqlite::Row) -> rusqlite::Result<Credential> {
    Ok(Credential {
        id: row.get(0)?,
        holder: row.get(1)?,
        credential_type: row.get(2)?,
        issued_date: row.get(3)?,
        expiration_date: row.get(4)?,
        created_at: row.get(5)?,
    })
}

pub fn fetch_credential(conn: &Connection, id: i64) -> Result<Option<Credential>, GantryError> {
    let row = conn
        .query_row(
            &format!("SELECT {} FROM credentials WHERE id = ?1", SELECT_COLS),
            params![id],
            |row| row_to_credential(row),
        )
        .optional()?;
    Ok(row)
}

pub fn create_op(
    conn: &Connection,
    p: &ValidatedParams,
    _ctx: &HandlerCtx,
) -> Result<Handled, GantryError> {
    conn.execute(
        "INSERT INTO credentials (holder, credential_type, issued_date, expiration_date, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            p.text("holder").unwrap_or_default(),
            p.text("credentialType").unwrap_or_default(),
            p.date("issuedDate").map(time::format_date),
            p.date("expirationDate").map(time::format_date),
            time::now_utc(),
        ],
    )?;
    let id = conn.last_insert_rowid();
    let row = fetch_credential(conn, id)?
        .ok_or_else(|| GantryError::NotFound(format!("credential {} vanished after insert", id)))?;
    let value = serde_json::to_value(&row)?;
    Ok(Handled::mutated(
        value.clone(),
        AuditDraft {
            action: "credentials.create".to_string(),
            entity_type: "credential".to_string(),
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
        "SELECT {} FROM credentials ORDER BY holder ASC, id ASC",
        SELECT_COLS
    ))?;
    let rows = stmt.query_map([], |row| row_to_credential(row))?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(Handled::read(serde_json::to_value(out)?))
}

/// Credentials whose expiration lands in `[asOf, threshold]`. Undated
/// credentials never expire as far as this query is concerned.
pub fn get_expiring_op(
    conn: &Connection,
    p: &ValidatedParams,
    _ctx: &HandlerCtx,
) -> Result<Handled, GantryError> {
    let today = p.date("asOf").unwrap_or_else(time::today);
    let threshold = p
        .date("threshold")
        .unwrap_or_else(|| time::add_days(today, scheduler::DEFAULT_DUE_LOOKAHEAD_DAYS));
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM credentials
         WHERE expiration_date IS NOT NULL AND expiration_date >= ?1 AND expiration_date <= ?2
         ORDER BY expiration_date ASC, id ASC",
        SELECT_COLS
    ))?;
    let rows = stmt.query_map(
        params![time::format_date(today), time::format_date(threshold)],
        |row| row_to_credential(row),
    )?;
    let mut out = Vec::new();
    for row in rows {
        let credential = row?;
        if credential
            .expiration_date
            .as_deref()
            .and_then(time::parse_date)
            .is_some()
        {
            out.push(credential);
        }
    }
    Ok(Handled::read(serde_json::to_value(out)?))
}

/// All credentials as scheduler input for the compliance sweep.
pub fn credential_items(conn: &Connection) -> Result<Vec<DueItem>, GantryError> {
    let mut stmt = conn.prepare(
        "SELECT id, holder, credential_type, expiration_date FROM credentials ORDER BY id ASC",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok((
            row.get::<_, i64>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, Option<String>>(3)?,
        ))
    })?;
    let mut items = Vec::new();
    for row in rows {
        let (id, holder, credential_type, expiration) = row?;
        items.push(DueItem {
            event_id: id,
            equipment_id: None,
            label: format!("{} credential for {}", credential_type, holder),
            due_date: expiration.as_deref().and_then(time::parse_date),
        });
    }
    Ok(items)
}
