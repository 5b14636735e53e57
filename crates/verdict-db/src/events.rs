//! Append-only JSONL validation event log with size-based rotation.
//!
//! Appends `ValidationEvent` records to `{dir}/validation.jsonl` using
//! `serde_jsonlines::append_json_lines`. When the active file grows past
//! `max_bytes` it is renamed to `validation.1.jsonl`, older rotations shift up
//! by one, and anything beyond `max_files` rotations is removed.
//!
//! Report texts referenced by events (`raw_report_path`,
//! `corrected_report_path`) are written under `{dir}/reports/`.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use verdict_config::StorageConfig;
use verdict_core::events::ValidationEvent;

use crate::error::DatabaseError;

const ACTIVE_FILE: &str = "validation.jsonl";
const REPORTS_DIR: &str = "reports";

#[derive(Debug, Clone)]
pub struct EventLog {
    dir: PathBuf,
    max_bytes: u64,
    max_files: usize,
    enabled: bool,
}

impl EventLog {
    /// Create a log in `dir`, creating the directory if needed.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError::Io` if the directory cannot be created.
    pub fn new(dir: PathBuf, max_bytes: u64, max_files: usize) -> Result<Self, DatabaseError> {
        std::fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            max_bytes,
            max_files,
            enabled: true,
        })
    }

    /// Create a log from the `[storage]` config section.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError::Io` if the directory cannot be created.
    pub fn from_config(storage: &StorageConfig) -> Result<Self, DatabaseError> {
        Self::new(
            storage.event_log_dir(),
            storage.event_log_max_bytes,
            storage.event_log_max_files,
        )
    }

    /// Create a disabled log (for tests or offline CLI commands).
    #[must_use]
    pub const fn disabled() -> Self {
        Self {
            dir: PathBuf::new(),
            max_bytes: 0,
            max_files: 0,
            enabled: false,
        }
    }

    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.enabled
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    #[must_use]
    pub fn active_path(&self) -> PathBuf {
        self.dir.join(ACTIVE_FILE)
    }

    /// Path of the `n`-th rotation (1 is the most recent).
    #[must_use]
    pub fn rotated_path(&self, n: usize) -> PathBuf {
        self.dir.join(format!("validation.{n}.jsonl"))
    }

    /// Append one event, rotating first if the active file is full.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if rotation or the write fails.
    pub fn append(&self, event: &ValidationEvent) -> Result<(), DatabaseError> {
        if !self.enabled {
            return Ok(());
        }
        self.rotate_if_needed()?;
        serde_jsonlines::append_json_lines(self.active_path(), [event])?;
        Ok(())
    }

    /// Write a report text referenced by an event. Returns `None` when the
    /// log is disabled.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError::Io` if the file cannot be written.
    pub async fn write_report(&self, name: &str, text: &str) -> Result<Option<PathBuf>, DatabaseError> {
        if !self.enabled {
            return Ok(None);
        }
        let dir = self.dir.join(REPORTS_DIR);
        tokio::fs::create_dir_all(&dir).await?;
        let path = dir.join(format!("{}.md", sanitize_file_stem(name)));
        tokio::fs::write(&path, text).await?;
        Ok(Some(path))
    }

    /// Read every event from the active file.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError::Io` if the file cannot be read or a line fails
    /// to parse.
    pub fn read_active(&self) -> Result<Vec<ValidationEvent>, DatabaseError> {
        let path = self.active_path();
        if !path.exists() {
            return Ok(Vec::new());
        }
        let events = serde_jsonlines::json_lines(path)?.collect::<std::io::Result<Vec<_>>>()?;
        Ok(events)
    }

    fn rotate_if_needed(&self) -> Result<(), DatabaseError> {
        let active = self.active_path();
        let len = match std::fs::metadata(&active) {
            Ok(meta) => meta.len(),
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e.into()),
        };
        if len < self.max_bytes {
            return Ok(());
        }

        if self.max_files == 0 {
            std::fs::remove_file(&active)?;
            return Ok(());
        }

        remove_if_exists(&self.rotated_path(self.max_files))?;
        for n in (1..self.max_files).rev() {
            let from = self.rotated_path(n);
            if from.exists() {
                std::fs::rename(&from, self.rotated_path(n + 1))?;
            }
        }
        std::fs::rename(&active, self.rotated_path(1))?;
        tracing::debug!(dir = %self.dir.display(), "rotated validation event log");
        Ok(())
    }
}

fn remove_if_exists(path: &Path) -> Result<(), DatabaseError> {
    match std::fs::remove_file(path) {
        Err(e) if e.kind() != ErrorKind::NotFound => Err(e.into()),
        _ => Ok(()),
    }
}

fn sanitize_file_stem(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use verdict_core::enums::{ModuleKind, ValidatorKind};

    fn event(attempt: u32) -> ValidationEvent {
        ValidationEvent::new(
            ValidatorKind::Module,
            attempt,
            serde_json::json!({"quality_score": 50, "padding": "x".repeat(64)}),
            Utc::now(),
        )
        .with_module(ModuleKind::Themes)
    }

    #[tokio::test]
    async fn disabled_log_writes_nothing() {
        let log = EventLog::disabled();
        log.append(&event(1)).unwrap();
        assert!(log.write_report("raw", "text").await.unwrap().is_none());
        assert!(!log.is_enabled());
    }

    #[test]
    fn append_and_read_back() {
        let dir = tempfile::TempDir::new().unwrap();
        let log = EventLog::new(dir.path().join("events"), 1024 * 1024, 3).unwrap();
        log.append(&event(1)).unwrap();
        log.append(&event(2)).unwrap();

        let events = log.read_active().unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[1].attempt, 2);
    }

    #[test]
    fn rotation_keeps_at_most_max_files() {
        let dir = tempfile::TempDir::new().unwrap();
        // Every append after the first triggers a rotation.
        let log = EventLog::new(dir.path().to_path_buf(), 1, 2).unwrap();
        for attempt in 1..=5 {
            log.append(&event(attempt)).unwrap();
        }

        assert!(log.rotated_path(1).exists());
        assert!(log.rotated_path(2).exists());
        assert!(!log.rotated_path(3).exists());

        let active = log.read_active().unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].attempt, 5);

        let newest_rotation: Vec<ValidationEvent> = serde_jsonlines::json_lines(log.rotated_path(1))
            .unwrap()
            .collect::<std::io::Result<_>>()
            .unwrap();
        assert_eq!(newest_rotation[0].attempt, 4);
    }

    #[tokio::test]
    async fn write_report_sanitizes_name() {
        let dir = tempfile::TempDir::new().unwrap();
        let log = EventLog::new(dir.path().to_path_buf(), 1024, 1).unwrap();
        let path = log
            .write_report("final/attempt 1", "VIDEO_ANALYSIS_REPORT_START")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(path.file_name().unwrap(), "final_attempt_1.md");
        assert_eq!(
            std::fs::read_to_string(path).unwrap(),
            "VIDEO_ANALYSIS_REPORT_START"
        );
    }
}
