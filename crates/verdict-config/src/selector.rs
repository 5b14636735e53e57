//! Best-of-N selector scheduling.

use std::time::Duration;

use serde::{Deserialize, Serialize};

const fn default_interval_secs() -> u64 {
    1800
}

const fn default_batch_limit() -> u32 {
    25
}

const fn default_min_candidates() -> usize {
    3
}

const fn default_max_concurrent_sets() -> usize {
    4
}

const fn default_evaluation_delay_secs() -> i64 {
    3600
}

const fn default_snippet_chars() -> usize {
    2000
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct SelectorConfig {
    /// Seconds between selector ticks.
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,

    /// Maximum number of due sets fetched per tick.
    #[serde(default = "default_batch_limit")]
    pub batch_limit: u32,

    /// Minimum un-evaluated records before a set is evaluated.
    #[serde(default = "default_min_candidates")]
    pub min_candidates: usize,

    /// Sets evaluated in parallel within one tick.
    #[serde(default = "default_max_concurrent_sets")]
    pub max_concurrent_sets: usize,

    /// Delay between arming a set and its evaluation becoming due.
    #[serde(default = "default_evaluation_delay_secs")]
    pub evaluation_delay_secs: i64,

    /// Characters of each candidate embedded in the ranking request.
    #[serde(default = "default_snippet_chars")]
    pub snippet_chars: usize,

    /// Optional file overriding the built-in evaluator prompt template.
    #[serde(default)]
    pub prompt_path: Option<String>,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            batch_limit: default_batch_limit(),
            min_candidates: default_min_candidates(),
            max_concurrent_sets: default_max_concurrent_sets(),
            evaluation_delay_secs: default_evaluation_delay_secs(),
            snippet_chars: default_snippet_chars(),
            prompt_path: None,
        }
    }
}

impl SelectorConfig {
    #[must_use]
    pub const fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = SelectorConfig::default();
        assert_eq!(config.interval(), Duration::from_secs(1800));
        assert_eq!(config.min_candidates, 3);
        assert_eq!(config.batch_limit, 25);
        assert!(config.prompt_path.is_none());
    }
}
