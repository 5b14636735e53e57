//! Generation error types.

use std::time::Duration;

use thiserror::Error;

/// Errors from a text generation call.
#[derive(Debug, Error)]
pub enum GenerationError {
    /// HTTP transport error (connect, timeout, body decode).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The endpoint is overloaded or failing (429, 408, 5xx).
    #[error("generator unavailable ({status}): {body}")]
    Unavailable {
        status: u16,
        /// Delay the endpoint asked for via `Retry-After`.
        retry_after: Option<Duration>,
        body: String,
    },

    /// The endpoint refused the request; sending it again will not help.
    #[error("generation rejected ({status}): {body}")]
    Rejected { status: u16, body: String },

    /// The response did not contain any generated text.
    #[error("empty completion")]
    EmptyCompletion,

    /// Failed to parse the API response.
    #[error("parse error: {0}")]
    Parse(String),

    /// The generator is missing required configuration.
    #[error("generator not configured: {0}")]
    NotConfigured(String),

    /// Error raised by a non-HTTP generator.
    #[error("{0}")]
    Upstream(String),
}

impl GenerationError {
    /// Whether a later attempt could plausibly succeed.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Http(_) | Self::Unavailable { .. } | Self::EmptyCompletion | Self::Upstream(_) => {
                true
            }
            Self::Rejected { .. } | Self::Parse(_) | Self::NotConfigured(_) => false,
        }
    }

    /// How long the endpoint asked callers to wait, if it said.
    #[must_use]
    pub const fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::Unavailable { retry_after, .. } => *retry_after,
            _ => None,
        }
    }
}
