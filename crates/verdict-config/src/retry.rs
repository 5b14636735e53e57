//! Retry bounds for module generation and final synthesis.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::ConfigError;

const fn default_synthesis_max_attempts() -> u32 {
    3
}

const fn default_retry_delay_ms() -> u64 {
    1000
}

const fn default_generation_error_delay_ms() -> u64 {
    2000
}

const fn default_validation_enabled() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct RetryConfig {
    /// Maximum number of retries per module after the first attempt.
    ///
    /// Has no default: it must be set explicitly, e.g. via
    /// `VERDICT_RETRY__MODULE_MAX_RETRIES`.
    #[serde(default)]
    pub module_max_retries: Option<u32>,

    /// Total synthesis attempts, including the first.
    #[serde(default = "default_synthesis_max_attempts")]
    pub synthesis_max_attempts: u32,

    /// Pause between a failed validation and the next attempt.
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    /// Pause after a generation error before trying again.
    #[serde(default = "default_generation_error_delay_ms")]
    pub generation_error_delay_ms: u64,

    /// When false, modules are generated once and concurrently with no retries.
    #[serde(default = "default_validation_enabled")]
    pub validation_enabled: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            module_max_retries: None,
            synthesis_max_attempts: default_synthesis_max_attempts(),
            retry_delay_ms: default_retry_delay_ms(),
            generation_error_delay_ms: default_generation_error_delay_ms(),
            validation_enabled: default_validation_enabled(),
        }
    }
}

impl RetryConfig {
    /// Check if the module retry bound has been set.
    #[must_use]
    pub const fn is_configured(&self) -> bool {
        self.module_max_retries.is_some()
    }

    /// The configured module retry bound.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::NotConfigured` when `module_max_retries` is unset.
    pub fn module_max_retries(&self) -> Result<u32, ConfigError> {
        self.module_max_retries
            .ok_or_else(|| ConfigError::NotConfigured {
                section: "retry.module_max_retries".to_string(),
            })
    }

    /// The synthesis attempt bound, which must be at least 1.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` for zero.
    pub fn synthesis_max_attempts(&self) -> Result<u32, ConfigError> {
        if self.synthesis_max_attempts == 0 {
            return Err(ConfigError::InvalidValue {
                field: "retry.synthesis_max_attempts".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(self.synthesis_max_attempts)
    }

    #[must_use]
    pub const fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    #[must_use]
    pub const fn generation_error_delay(&self) -> Duration {
        Duration::from_millis(self.generation_error_delay_ms)
    }
}
