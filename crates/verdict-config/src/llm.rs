//! OpenAI-compatible text generation endpoint.

use serde::{Deserialize, Serialize};

const fn default_timeout_secs() -> u64 {
    120
}

const fn default_temperature() -> f32 {
    0.3
}

const fn default_max_tokens() -> u32 {
    4096
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct LlmConfig {
    /// Base URL of the chat completions API (e.g., `https://api.openai.com/v1`).
    #[serde(default)]
    pub base_url: String,

    #[serde(default)]
    pub api_key: String,

    #[serde(default)]
    pub model: String,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            api_key: String::new(),
            model: String::new(),
            timeout_secs: default_timeout_secs(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
        }
    }
}

impl LlmConfig {
    /// Check if the endpoint, key, and model are all set.
    #[must_use]
    pub fn is_configured(&self) -> bool {
        !self.base_url.is_empty() && !self.api_key.is_empty() && !self.model.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_not_configured() {
        let config = LlmConfig::default();
        assert!(!config.is_configured());
        assert_eq!(config.timeout_secs, 120);
        assert_eq!(config.max_tokens, 4096);
    }

    #[test]
    fn configured_requires_all_three_fields() {
        let mut config = LlmConfig {
            base_url: "https://api.example.com/v1".into(),
            api_key: "sk-test".into(),
            ..LlmConfig::default()
        };
        assert!(!config.is_configured());
        config.model = "gpt-4o-mini".into();
        assert!(config.is_configured());
    }
}
