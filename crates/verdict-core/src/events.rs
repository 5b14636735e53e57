//! JSONL validation event envelope.
//!
//! Every validator pass in the pipeline is recorded as a `ValidationEvent` in
//! the append-only event log (`{event_log_dir}/validation.jsonl`). Decisions
//! never depend on whether the append succeeded.
//!
//! The `v` field supports schema versioning: records without a `v` field
//! deserialize with `v == 1` via `#[serde(default)]`.

use chrono::{DateTime, SecondsFormat, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::enums::{ModuleKind, ValidatorKind};

const fn default_event_version() -> u32 {
    1
}

/// A single validator pass recorded in the event log.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct ValidationEvent {
    /// Schema version. Defaults to 1 when absent.
    #[serde(default = "default_event_version")]
    pub v: u32,

    /// ISO 8601 timestamp of the validation.
    #[serde(rename = "timestamp")]
    pub ts: String,

    pub validator: ValidatorKind,

    pub subject_id: Option<String>,

    /// Set for module validations only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub module: Option<ModuleKind>,

    /// 1-based attempt number.
    pub attempt: u32,

    /// Serialized `ModuleValidationResult` or `FinalValidationResult`.
    pub result: serde_json::Value,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_report_path: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub corrected_report_path: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra: Option<serde_json::Value>,
}

impl ValidationEvent {
    /// Build an event stamped with `at`.
    #[must_use]
    pub fn new(
        validator: ValidatorKind,
        attempt: u32,
        result: serde_json::Value,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            v: default_event_version(),
            ts: at.to_rfc3339_opts(SecondsFormat::Millis, true),
            validator,
            subject_id: None,
            module: None,
            attempt,
            result,
            raw_report_path: None,
            corrected_report_path: None,
            extra: None,
        }
    }

    #[must_use]
    pub fn with_subject(mut self, subject_id: impl Into<String>) -> Self {
        self.subject_id = Some(subject_id.into());
        self
    }

    #[must_use]
    pub const fn with_module(mut self, module: ModuleKind) -> Self {
        self.module = Some(module);
        self
    }

    #[must_use]
    pub fn with_extra(mut self, extra: serde_json::Value) -> Self {
        self.extra = Some(extra);
        self
    }
}
