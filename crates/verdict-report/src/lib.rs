//! # verdict-report
//!
//! Everything that reads an analysis report without talking to a model.
//!
//! - [`parser`]: markers, sections, key/value blocks and insights of a final report
//! - [`extract`]: typed entities from module sub-reports and referenced IDs
//! - [`formula`]: Content Health and Strategic Stability index recomputation
//! - [`module`]: rubric scoring of single module outputs
//! - [`final_report`]: the final report validator
//! - [`corrector`]: deterministic repair of envelope and aggregation defects
//! - [`retry_prompt`]: corrective instructions for regeneration

pub mod corrector;
pub mod extract;
pub mod final_report;
pub mod formula;
pub mod module;
pub mod parser;
pub mod retry_prompt;

pub use corrector::{AggregationData, AutoCorrector, Correction, Fix};
pub use extract::{EntityUniverse, ModulesData, Partials, TypedEntity};
pub use final_report::{FinalReportValidator, FinalValidationResult, SubjectMeta, ValidationIssue};
pub use formula::CalculatedIndices;
pub use module::{ModuleValidationResult, ModuleValidator};
pub use parser::ParsedReport;
