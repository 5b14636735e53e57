//! Validator thresholds and penalties.

use serde::{Deserialize, Serialize};

const fn default_chi_tolerance() -> f64 {
    10.0
}

const fn default_ssi_tolerance() -> f64 {
    0.5
}

const fn default_tone_sum_tolerance() -> f64 {
    5.0
}

const fn default_comment_count_tolerance() -> f64 {
    0.10
}

const fn default_pass_threshold() -> u8 {
    70
}

const fn default_penalty_low() -> u8 {
    5
}

const fn default_penalty_medium() -> u8 {
    15
}

const fn default_penalty_high() -> u8 {
    30
}

const fn default_module_min_quality_score() -> u8 {
    35
}

const fn default_max_referenced_ids_per_kind() -> usize {
    50
}

/// Numeric thresholds used by the module and final report validators.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct ValidationConfig {
    /// Allowed deviation between reported and recomputed CHI (0-100 scale).
    #[serde(default = "default_chi_tolerance")]
    pub chi_tolerance: f64,

    /// Allowed deviation between reported and recomputed SSI.
    #[serde(default = "default_ssi_tolerance")]
    pub ssi_tolerance: f64,

    /// Allowed deviation of the tone percentages from 100.
    #[serde(default = "default_tone_sum_tolerance")]
    pub tone_sum_tolerance: f64,

    /// Relative tolerance on the reported comment count.
    #[serde(default = "default_comment_count_tolerance")]
    pub comment_count_tolerance: f64,

    /// Minimum final score for `PASS`.
    #[serde(default = "default_pass_threshold")]
    pub pass_threshold: u8,

    #[serde(default = "default_penalty_low")]
    pub penalty_low: u8,

    #[serde(default = "default_penalty_medium")]
    pub penalty_medium: u8,

    #[serde(default = "default_penalty_high")]
    pub penalty_high: u8,

    /// Minimum module score for a module attempt to be accepted.
    #[serde(default = "default_module_min_quality_score")]
    pub module_min_quality_score: u8,

    /// Cap on IDs per kind written into a synthesized aggregation block.
    #[serde(default = "default_max_referenced_ids_per_kind")]
    pub max_referenced_ids_per_kind: usize,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            chi_tolerance: default_chi_tolerance(),
            ssi_tolerance: default_ssi_tolerance(),
            tone_sum_tolerance: default_tone_sum_tolerance(),
            comment_count_tolerance: default_comment_count_tolerance(),
            pass_threshold: default_pass_threshold(),
            penalty_low: default_penalty_low(),
            penalty_medium: default_penalty_medium(),
            penalty_high: default_penalty_high(),
            module_min_quality_score: default_module_min_quality_score(),
            max_referenced_ids_per_kind: default_max_referenced_ids_per_kind(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_thresholds() {
        let config = ValidationConfig::default();
        assert!((config.chi_tolerance - 10.0).abs() < f64::EPSILON);
        assert!((config.ssi_tolerance - 0.5).abs() < f64::EPSILON);
        assert_eq!(config.pass_threshold, 70);
        assert_eq!(
            (config.penalty_low, config.penalty_medium, config.penalty_high),
            (5, 15, 30)
        );
        assert_eq!(config.module_min_quality_score, 35);
        assert_eq!(config.max_referenced_ids_per_kind, 50);
    }
}
