//! Certificate registrations: pointers to test/calibration paperwork on
//! disk. The crate never generates or serves document content; it records
//! where a file lives (relative to the attachments root) and fingerprints
//! it when it is already present, so later tampering is detectable.

use crate::core::audit::AuditDraft;
use crate::core::error::GantryError;
use crate::core::registry::{Handled, HandlerCtx, ParamRule, ParamSpec, ValidatedParams};
use crate::core::time;
use crate::domains::equipment;
use rusqlite::{Connection, OptionalExtension, params};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Certificate {
    pub id: i64,
    pub equipment_id: Option<i64>,
    pub kind: String,
    pub file_path: String,
    pub content_sha256: Option<String>,
    pub issued_date: Option<String>,
    pub created_at: String,
}

pub const CREATE_PARAMS: &[ParamSpec] = &[
    ParamSpec { name: "equipmentId", rule: ParamRule::Id, required: false },
    ParamSpec { name: "kind", rule: ParamRule::Text { max: 100 }, required: false },
    ParamSpec { name: "filePath", rule: ParamRule::RelPath, required: true },
    ParamSpec { name: "issuedDate", rule: ParamRule::Date, required: false },
];

pub const GET_BY_EQUIPMENT_PARAMS: &[ParamSpec] = &[ParamSpec {
    name: "equipmentId",
    rule: ParamRule::Id,
    required: true,
}];

pub fn hash_bytes(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// Fingerprints the referenced file when it is readable. Registration does
/// not require the paperwork to be on disk yet, so an absent file yields
/// `None` rather than an error.
fn fingerprint_file(attachments_dir: &Path, rel_path: &str) -> Option<String> {
    let full = attachments_dir.join(rel_path);
    fs::read(&full).ok().map(|bytes| hash_bytes(&bytes))
}

const SELECT_COLS: &str =
    "id, equipment_id, kind, file_path, content_sha256, issued_date, created_at";

fn row_to_certificate(row: &rusqlite::Row) -> rusqlite::Result<Certificate> {
    Ok(Certificate {
        id: row.get(0)?,
        equipment_id: row.get(1)?,
        kind: row.get(2)?,
        file_path: row.get(3)?,
        content_sha256: row.get(4)?,
        issued_date: row.get(5)?,
        created_at: row.get(6)?,
    })
}

pub fn fetch_certificate(conn: &Connection, id: i64) -> Result<Option<Certificate>, GantryError> {
    let row = conn
        .query_row(
            &format!("SELECT {} FROM certificates WHERE id = ?1", SELECT_COLS),
            params![id],
            |row| row_to_certificate(row),
        )
        .optional()?;
    Ok(row)
}

pub fn create_op(
    conn: &Connection,
    p: &ValidatedParams,
    ctx: &HandlerCtx,
) -> Result<Handled, GantryError> {
    let equipment_id = p.id("equipmentId");
    if let Some(eq_id) = equipment_id {
        equipment::require_equipment(conn, eq_id)?;
    }
    let file_path = p.rel_path("filePath").unwrap_or_default().to_string();
    let content_sha256 = fingerprint_file(&ctx.attachments_dir, &file_path);

    conn.execute(
        "INSERT INTO certificates (equipment_id, kind, file_path, content_sha256, issued_date, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            equipment_id,
            p.text("kind").unwrap_or(""),
            file_path,
            content_sha256,
            p.date("issuedDate").map(time::format_date),
            time::now_utc(),
        ],
    )?;
    let id = conn.last_insert_rowid();
    let row = fetch_certificate(conn, id)?
        .ok_or_else(|| GantryError::NotFound(format!("certificate {} vanished after insert", id)))?;
    let value = serde_json::to_value(&row)?;
    Ok(Handled::mutated(
        value.clone(),
        AuditDraft {
            action: "certificates.create".to_string(),
            entity_type: "certificate".to_string(),
            entity_id: id,
            old_values: None,
            new_values: Some(value),
        },
    ))
}

pub fn get_by_equipment_op(
    conn: &Connection,
    p: &ValidatedParams,
    _ctx: &HandlerCtx,
) -> Result<Handled, GantryError> {
    let equipment_id = p.id("equipmentId").unwrap_or_default();
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM certificates WHERE equipment_id = ?1 ORDER BY id DESC",
        SELECT_COLS
    ))?;
    let rows = stmt.query_map(params![equipment_id], |row| row_to_certificate(row))?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(Handled::read(serde_json::to_value(out)?))
}
