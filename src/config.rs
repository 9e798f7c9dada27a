//! Workspace configuration.
//!
//! Settings that the scheduling code needs are passed around explicitly as a
//! `Config` value, loaded from a JSON file next to the task database.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::fields::{Priority, Status};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Organisation-level scheduling settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Status given to freshly generated occurrences.
    pub default_open_status: Status,
    /// Days until due for new tasks that were given a priority but no due date.
    pub priority_due_days: BTreeMap<Priority, u32>,
    /// How far ahead `generate` materialises occurrences.
    pub generate_horizon_days: u32,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            default_open_status: Status::Open,
            priority_due_days: BTreeMap::from([
                (Priority::Urgent, 1),
                (Priority::High, 3),
                (Priority::Medium, 7),
                (Priority::Low, 14),
            ]),
            generate_horizon_days: 14,
        }
    }
}

impl Config {
    /// Load configuration, falling back to defaults when the file doesn't exist.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Config::default());
        }
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    pub fn due_days_for(&self, priority: Priority) -> Option<u32> {
        self.priority_due_days.get(&priority).copied()
    }
}
