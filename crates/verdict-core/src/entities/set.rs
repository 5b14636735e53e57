use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::enums::SetStatus;

/// All analyses for one subject awaiting or having undergone best-of-N
/// evaluation. One set per subject.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct AnalysisSet {
    pub id: String,
    pub subject_id: String,
    pub status: SetStatus,
    pub next_evaluation_due_at: DateTime<Utc>,
    pub best_record_id: Option<String>,
    /// Full evaluator result, or `{"error": "..."}` after a failed evaluation.
    pub evaluation_result: Option<serde_json::Value>,
    pub evaluated_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Score and rank assigned to one candidate by the evaluator.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct CandidateEvaluation {
    pub analysis_id: String,
    #[serde(default)]
    pub scores: BTreeMap<String, f64>,
    pub total_score: f64,
    pub quality_rank: Option<u32>,
}

/// Normalized evaluator output persisted against a set.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct EvaluationResult {
    pub evaluations: Vec<CandidateEvaluation>,
    /// The id the evaluator declared best, which may not be a valid candidate.
    pub declared_best_id: Option<String>,
}
