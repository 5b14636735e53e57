//! Local storage locations.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

fn default_db_path() -> String {
    ".verdict/verdict.db".to_string()
}

fn default_event_log_dir() -> String {
    ".verdict/events".to_string()
}

fn default_artifact_dir() -> String {
    ".verdict/artifacts".to_string()
}

const fn default_event_log_max_bytes() -> u64 {
    5 * 1024 * 1024
}

const fn default_event_log_max_files() -> usize {
    10
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct StorageConfig {
    /// libSQL database file.
    #[serde(default = "default_db_path")]
    pub db_path: String,

    /// Directory holding the validation event log and its rotations.
    #[serde(default = "default_event_log_dir")]
    pub event_log_dir: String,

    /// Root directory for stored report artifacts.
    #[serde(default = "default_artifact_dir")]
    pub artifact_dir: String,

    /// Rotate the active event log once it grows past this size.
    #[serde(default = "default_event_log_max_bytes")]
    pub event_log_max_bytes: u64,

    /// Rotated event log files kept on disk.
    #[serde(default = "default_event_log_max_files")]
    pub event_log_max_files: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            event_log_dir: default_event_log_dir(),
            artifact_dir: default_artifact_dir(),
            event_log_max_bytes: default_event_log_max_bytes(),
            event_log_max_files: default_event_log_max_files(),
        }
    }
}

impl StorageConfig {
    #[must_use]
    pub fn db_path(&self) -> PathBuf {
        PathBuf::from(&self.db_path)
    }

    #[must_use]
    pub fn event_log_dir(&self) -> PathBuf {
        PathBuf::from(&self.event_log_dir)
    }

    #[must_use]
    pub fn artifact_dir(&self) -> PathBuf {
        PathBuf::from(&self.artifact_dir)
    }
}
