//! Centralized database schema for the compliance store.
//!
//! Gantry keeps everything in a single SQLite database, `compliance.db`:
//! equipment, the generalized compliance-event table shared by load tests,
//! calibrations, and inspections, certificates, operator credentials,
//! preventive-maintenance schedules, and the append-only audit trail.
//!
//! Entity ids are `INTEGER PRIMARY KEY AUTOINCREMENT` because the wire
//! contract for identifiers is "positive integer". Calendar dates are ISO
//! `YYYY-MM-DD` TEXT; timestamps are RFC 3339 UTC TEXT.

use crate::core::error::GantryError;
use rusqlite::Connection;

pub const COMPLIANCE_DB_NAME: &str = "compliance.db";
pub const SCHEMA_VERSION: u32 = 1;

pub const SCHEMA_META: &str = "
    CREATE TABLE IF NOT EXISTS meta (
        key TEXT PRIMARY KEY,
        value TEXT NOT NULL
    )
";

pub const SCHEMA_EQUIPMENT: &str = "
    CREATE TABLE IF NOT EXISTS equipment (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        code TEXT NOT NULL UNIQUE,
        name TEXT NOT NULL,
        category TEXT NOT NULL DEFAULT '',
        capacity REAL,
        location TEXT NOT NULL DEFAULT '',
        active INTEGER NOT NULL DEFAULT 1,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )
";

pub const SCHEMA_COMPLIANCE_EVENTS: &str = "
    CREATE TABLE IF NOT EXISTS compliance_events (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        asset_class TEXT NOT NULL, -- load_test, calibration, inspection
        equipment_id INTEGER NOT NULL,
        event_date TEXT NOT NULL,
        interval_type TEXT NOT NULL DEFAULT 'annual',
        next_due TEXT,
        outcome TEXT, -- pass, fail
        inspector TEXT,
        notes TEXT,
        deficiencies TEXT,
        corrective_action TEXT,
        certificate_id INTEGER,
        created_at TEXT NOT NULL,
        FOREIGN KEY(equipment_id) REFERENCES equipment(id) ON DELETE CASCADE,
        FOREIGN KEY(certificate_id) REFERENCES certificates(id)
    )
";
pub const SCHEMA_COMPLIANCE_EVENTS_IDX_EQUIPMENT: &str =
    "CREATE INDEX IF NOT EXISTS idx_events_equipment ON compliance_events(asset_class, equipment_id)";
pub const SCHEMA_COMPLIANCE_EVENTS_IDX_DUE: &str =
    "CREATE INDEX IF NOT EXISTS idx_events_next_due ON compliance_events(asset_class, next_due)";

pub const SCHEMA_CERTIFICATES: &str = "
    CREATE TABLE IF NOT EXISTS certificates (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        equipment_id INTEGER, -- NULL for credential certificates
        kind TEXT NOT NULL DEFAULT '',
        file_path TEXT NOT NULL,
        content_sha256 TEXT,
        issued_date TEXT,
        created_at TEXT NOT NULL,
        FOREIGN KEY(equipment_id) REFERENCES equipment(id) ON DELETE CASCADE
    )
";

pub const SCHEMA_CREDENTIALS: &str = "
    CREATE TABLE IF NOT EXISTS credentials (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        holder TEXT NOT NULL,
        credential_type TEXT NOT NULL,
        issued_date TEXT,
        expiration_date TEXT,
        created_at TEXT NOT NULL
    )
";
pub const SCHEMA_CREDENTIALS_IDX_EXPIRY: &str =
    "CREATE INDEX IF NOT EXISTS idx_credentials_expiry ON credentials(expiration_date)";

pub const SCHEMA_PM_SCHEDULES: &str = "
    CREATE TABLE IF NOT EXISTS pm_schedules (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        equipment_id INTEGER NOT NULL,
        task TEXT NOT NULL,
        interval_type TEXT NOT NULL DEFAULT 'annual',
        last_done TEXT,
        next_due TEXT,
        created_at TEXT NOT NULL,
        FOREIGN KEY(equipment_id) REFERENCES equipment(id) ON DELETE CASCADE
    )
";
pub const SCHEMA_PM_SCHEDULES_IDX_DUE: &str =
    "CREATE INDEX IF NOT EXISTS idx_pm_next_due ON pm_schedules(next_due)";

pub const SCHEMA_AUDIT_LOG: &str = "
    CREATE TABLE IF NOT EXISTS audit_log (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        entry_id TEXT NOT NULL UNIQUE,
        dispatch_id TEXT NOT NULL,
        user_id INTEGER,
        username TEXT NOT NULL,
        action TEXT NOT NULL,
        entity_type TEXT NOT NULL,
        entity_id INTEGER NOT NULL,
        old_values TEXT, -- JSON image before the mutation
        new_values TEXT, -- JSON image after the mutation, NULL for deletes
        client_meta TEXT, -- JSON blob supplied by the presentation layer
        ts TEXT NOT NULL
    )
";
pub const SCHEMA_AUDIT_LOG_IDX_ENTITY: &str =
    "CREATE INDEX IF NOT EXISTS idx_audit_entity ON audit_log(entity_type, entity_id)";

const ALL_DDL: &[&str] = &[
    SCHEMA_META,
    SCHEMA_EQUIPMENT,
    SCHEMA_CERTIFICATES,
    SCHEMA_COMPLIANCE_EVENTS,
    SCHEMA_COMPLIANCE_EVENTS_IDX_EQUIPMENT,
    SCHEMA_COMPLIANCE_EVENTS_IDX_DUE,
    SCHEMA_CREDENTIALS,
    SCHEMA_CREDENTIALS_IDX_EXPIRY,
    SCHEMA_PM_SCHEDULES,
    SCHEMA_PM_SCHEDULES_IDX_DUE,
    SCHEMA_AUDIT_LOG,
    SCHEMA_AUDIT_LOG_IDX_ENTITY,
];

/// Creates every table and index for a fresh store and records the schema
/// version in `meta`. Safe to call on an existing store: DDL is
/// `IF NOT EXISTS` and a version mismatch is reported, not migrated
/// (versioned migration tooling is out of scope).
pub fn ensure_schema(conn: &Connection) -> Result<(), GantryError> {
    for ddl in ALL_DDL {
        conn.execute(ddl, [])?;
    }
    let recorded: Option<String> = conn
        .query_row(
            "SELECT value FROM meta WHERE key = 'schema_version'",
            [],
            |row| row.get(0),
        )
        .map(Some)
        .or_else(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => Ok(None),
            other => Err(other),
        })?;
    match recorded {
        None => {
            conn.execute(
                "INSERT INTO meta (key, value) VALUES ('schema_version', ?1)",
                [SCHEMA_VERSION.to_string()],
            )?;
            Ok(())
        }
        Some(v) if v == SCHEMA_VERSION.to_string() => Ok(()),
        Some(v) => Err(GantryError::DatabaseInitializationError(format!(
            "store schema version {} does not match supported version {}",
            v, SCHEMA_VERSION
        ))),
    }
}
