//! Optional workspace configuration from `.gantry/gantry.toml`.

use crate::core::error::GantryError;
use crate::core::schemas;
use crate::core::store::Store;
use serde::Deserialize;
use std::fs;
use std::path::PathBuf;

/// Workspace configuration. Every field has a default; the file itself is
/// optional.
#[derive(Debug, Clone, Deserialize)]
pub struct GantryConfig {
    /// Directory (relative to the project root) that certificate file
    /// paths must resolve under.
    #[serde(default = "default_attachments_root")]
    pub attachments_root: String,
    /// Database file name inside `.gantry/data/`.
    #[serde(default = "default_database")]
    pub database: String,
}

fn default_attachments_root() -> String {
    "attachments".to_string()
}

fn default_database() -> String {
    schemas::COMPLIANCE_DB_NAME.to_string()
}

impl Default for GantryConfig {
    fn default() -> Self {
        Self {
            attachments_root: default_attachments_root(),
            database: default_database(),
        }
    }
}

impl GantryConfig {
    pub fn attachments_dir(&self, store: &Store) -> PathBuf {
        store.project_root.join(&self.attachments_root)
    }

    pub fn db_path(&self, store: &Store) -> PathBuf {
        store.data_root().join(&self.database)
    }
}

/// Loads `.gantry/gantry.toml`. A missing file is not an error: defaults
/// apply. A present-but-malformed file is a config error, loudly.
pub fn load_config(store: &Store) -> Result<GantryConfig, GantryError> {
    let config_path = store.config_path();
    if !config_path.exists() {
        return Ok(GantryConfig::default());
    }
    let content = fs::read_to_string(&config_path).map_err(GantryError::IoError)?;
    let config: GantryConfig =
        toml::from_str(&content).map_err(|e| GantryError::ConfigError(e.to_string()))?;
    Ok(config)
}
