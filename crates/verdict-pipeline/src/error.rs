//! Pipeline error types.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;
use verdict_config::ConfigError;
use verdict_db::error::DatabaseError;
use verdict_llm::GenerationError;

/// Terminal failures of an analysis run or a selector pass.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Generation kept failing for one stage.
    #[error("generation failed for {stage} after {attempts} attempt(s): {source}")]
    Generation {
        stage: String,
        attempts: u32,
        #[source]
        source: GenerationError,
    },

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Database(#[from] DatabaseError),

    #[error(transparent)]
    Evaluator(#[from] EvaluatorError),

    /// A prompt file could not be read.
    #[error("cannot read prompt {path}: {source}")]
    Prompt {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A required prompt is missing or empty.
    #[error("prompt '{name}' is missing")]
    MissingPrompt { name: String },

    /// Another analysis for the same subject is in flight.
    #[error("an analysis for '{subject_id}' is already running")]
    AlreadyRunning { subject_id: String },

    /// Every synthesis attempt ended without a report.
    #[error("synthesis produced no report")]
    NoSynthesis,
}

/// Errors from a best-of-N evaluator call.
#[derive(Debug, Error)]
pub enum EvaluatorError {
    #[error("evaluator generation failed: {0}")]
    Generation(#[from] GenerationError),

    #[error("need at least {required} candidates, got {count}")]
    TooFewCandidates { count: usize, required: usize },

    #[error("no JSON object found in evaluator response")]
    NoJson,

    #[error("invalid evaluator JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("evaluator JSON missing 'evaluations' list")]
    MissingEvaluations,

    #[error("evaluator JSON has no valid evaluation entries")]
    NoValidEntries,

    #[error("cannot read evaluator prompt {path}: {source}")]
    Prompt {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// The run was stopped through its cancellation token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cancelled;

impl fmt::Display for Cancelled {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("analysis cancelled")
    }
}

impl std::error::Error for Cancelled {}
