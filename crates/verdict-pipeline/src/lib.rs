//! # verdict-pipeline
//!
//! Generation-side orchestration for verdict.
//!
//! This crate provides:
//! - [`RetryOrchestrator`]: bounded re-generation of the four module outputs
//!   and the final synthesis, validated with `verdict-report`
//! - [`AnalysisRunner`]: one in-flight analysis per subject, cooperative
//!   cancellation, persistence of the result and rollback on cancel
//! - [`LlmEvaluator`] and [`BestOfNSelector`]: periodic ranking of accumulated
//!   analyses and pruning of every artifact but the best one

pub mod error;
pub mod evaluator;
pub mod orchestrator;
pub mod prompts;
pub mod runner;
pub mod selector;

pub use error::{Cancelled, EvaluatorError, PipelineError};
pub use evaluator::{Evaluator, LlmEvaluator};
pub use orchestrator::{
    AnalysisReport, AnalysisRequest, ModuleOutput, Outcome, RetryOrchestrator, RetryPolicy,
};
pub use prompts::PromptSet;
pub use runner::{AnalysisRunner, RunContext, RunReport};
pub use selector::{BestOfNSelector, TickSummary};
