use crate::core::error;
use crate::core::schemas;
use rusqlite::Connection;
use std::fs;
use std::path::{Path, PathBuf};

/// Opens a connection with the store's standing discipline: WAL journal,
/// 5s busy timeout, and `foreign_keys=ON` so equipment deletes cascade and
/// dangling certificate links are refused by SQLite itself.
pub fn db_connect(db_path: &Path) -> Result<Connection, error::GantryError> {
    let conn = Connection::open(db_path)?;
    conn.busy_timeout(std::time::Duration::from_secs(5))
        .map_err(error::GantryError::RusqliteError)?;
    conn.query_row("PRAGMA journal_mode=WAL;", [], |_| Ok(()))
        .map_err(error::GantryError::RusqliteError)?;
    conn.execute("PRAGMA foreign_keys=ON;", [])
        .map_err(error::GantryError::RusqliteError)?;
    Ok(conn)
}

pub fn compliance_db_path(data_root: &Path, db_name: &str) -> PathBuf {
    data_root.join(db_name)
}

/// Creates the data directory and a fresh compliance database with the
/// full schema applied. Idempotent on an already-initialized store.
pub fn initialize_compliance_db(
    data_root: &Path,
    db_name: &str,
) -> Result<PathBuf, error::GantryError> {
    let db_path = compliance_db_path(data_root, db_name);
    fs::create_dir_all(data_root).map_err(error::GantryError::IoError)?;

    let conn = db_connect(&db_path)?;
    schemas::ensure_schema(&conn)?;
    Ok(db_path)
}
