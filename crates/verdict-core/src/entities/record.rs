use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::enums::RecordOutcome;

/// A completed, persisted analysis for a subject.
///
/// The text is never deleted. The best-of-N selector only ever sets
/// `evaluation_rank`, `evaluation_score`, `evaluated`, and `deleted_flag`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct AnalysisRecord {
    pub id: String,
    pub set_id: String,
    pub subject_id: String,
    pub created_at: DateTime<Utc>,
    pub raw_text: String,
    pub outcome: RecordOutcome,
    /// Final validator score, clamped to `[0, 100]`.
    pub quality_score: u8,
    /// Path of the external artifact, if one was stored.
    pub artifact_ref: Option<String>,
    pub evaluation_rank: Option<u32>,
    pub evaluation_score: Option<f64>,
    pub evaluated: bool,
    /// Set once the artifact has been removed by the selector.
    pub deleted_flag: bool,
}

impl AnalysisRecord {
    /// Whether this record may take part in the next best-of-N evaluation.
    #[must_use]
    pub const fn is_candidate(&self) -> bool {
        !self.evaluated && !self.deleted_flag
    }
}
