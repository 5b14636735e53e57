//! # verdict-llm
//!
//! The text generation seam used by the retry pipeline and the best-of-N
//! evaluator, plus an OpenAI-compatible HTTP implementation.
//!
//! Generation is a black box: `generate(system_prompt, user_context) -> text`.
//! Callers decide whether and how often to retry failures.

mod chat;
mod error;

pub use chat::HttpGenerator;
pub use error::GenerationError;

use std::future::Future;
use std::sync::Arc;

/// A text generation backend.
pub trait Generator: Send + Sync {
    /// Produce text for `user_context` under `system_prompt`.
    fn generate(
        &self,
        system_prompt: &str,
        user_context: &str,
    ) -> impl Future<Output = Result<String, GenerationError>> + Send;
}

impl<G: Generator> Generator for Arc<G> {
    fn generate(
        &self,
        system_prompt: &str,
        user_context: &str,
    ) -> impl Future<Output = Result<String, GenerationError>> + Send {
        self.as_ref().generate(system_prompt, user_context)
    }
}
