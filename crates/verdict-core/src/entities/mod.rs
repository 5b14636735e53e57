//! Persisted entity structs.
//!
//! Each entity maps to a table in the libSQL database (see `verdict-db`
//! migrations). All structs derive `Serialize`, `Deserialize`, and
//! `JsonSchema` for JSON roundtrip and schema validation.

mod record;
mod set;

pub use record::AnalysisRecord;
pub use set::{AnalysisSet, CandidateEvaluation, EvaluationResult};
