use rusqlite;
use std::io;
use thiserror::Error;

/// Internal error taxonomy. Nothing here crosses the trust boundary:
/// the gateway normalizes every variant into its public error kinds
/// before a response envelope is built.
#[derive(Error, Debug)]
pub enum GantryError {
    #[error("SQLite error: {0}")]
    RusqliteError(#[from] rusqlite::Error),
    #[error("I/O error: {0}")]
    IoError(#[from] io::Error),
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
    #[error("Failed to initialize database: {0}")]
    DatabaseInitializationError(String),
    #[error("Validation error: {0}")]
    ValidationError(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Missing relation {relation}: {detail}")]
    MissingRelation { relation: String, detail: String },
    #[error("Config error: {0}")]
    ConfigError(String),
    #[error("Audit write failed: {0}")]
    AuditWrite(String),
}
