//! Store abstraction for the compliance workspace.
//!
//! A project keeps its compliance state under `<project>/.gantry/`:
//! `data/` holds the SQLite database, `gantry.toml` (optional) holds
//! configuration. The handle here is just the resolved project root;
//! connections are opened per dispatch, never cached on the store.

use crate::core::error::GantryError;
use std::fs;
use std::path::{Path, PathBuf};

pub const CONTROL_DIR: &str = ".gantry";
pub const DATA_DIR: &str = "data";
pub const CONFIG_FILE: &str = "gantry.toml";

/// Handle to an initialized compliance workspace.
#[derive(Debug, Clone)]
pub struct Store {
    /// Absolute path of the directory containing `.gantry/`.
    pub project_root: PathBuf,
}

impl Store {
    /// Walks up from `start_dir` looking for a `.gantry/` directory.
    pub fn discover(start_dir: &Path) -> Result<Self, GantryError> {
        let mut current = PathBuf::from(start_dir);
        loop {
            if current.join(CONTROL_DIR).exists() {
                return Ok(Self {
                    project_root: current,
                });
            }
            if !current.pop() {
                return Err(GantryError::NotFound(
                    "'.gantry' directory not found in current or parent directories. Run `gantry init` first.".to_string(),
                ));
            }
        }
    }

    /// Creates `.gantry/data/` under `dir`. Idempotent.
    pub fn init(dir: &Path) -> Result<Self, GantryError> {
        let store = Self {
            project_root: dir.to_path_buf(),
        };
        fs::create_dir_all(store.data_root()).map_err(GantryError::IoError)?;
        Ok(store)
    }

    pub fn control_dir(&self) -> PathBuf {
        self.project_root.join(CONTROL_DIR)
    }

    pub fn data_root(&self) -> PathBuf {
        self.control_dir().join(DATA_DIR)
    }

    pub fn config_path(&self) -> PathBuf {
        self.control_dir().join(CONFIG_FILE)
    }
}
