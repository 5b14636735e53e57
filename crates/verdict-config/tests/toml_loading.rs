//! Integration tests for TOML configuration loading.
//!
//! Uses `figment::Jail` for sandboxed files and env vars.

use figment::{
    Figment, Jail,
    providers::{Env, Format, Serialized, Toml},
};
use pretty_assertions::assert_eq;
use verdict_config::{ConfigError, VerdictConfig};

#[test]
fn loads_validation_thresholds_from_toml() {
    Jail::expect_with(|jail| {
        jail.create_file(
            "config.toml",
            r#"
[validation]
chi_tolerance = 7.5
pass_threshold = 80
penalty_medium = 10
"#,
        )?;

        let config: VerdictConfig = Figment::from(Serialized::defaults(VerdictConfig::default()))
            .merge(Toml::file("config.toml"))
            .extract()?;

        assert!((config.validation.chi_tolerance - 7.5).abs() < f64::EPSILON);
        assert_eq!(config.validation.pass_threshold, 80);
        assert_eq!(config.validation.penalty_medium, 10);
        // untouched fields keep their defaults
        assert_eq!(config.validation.penalty_high, 30);
        Ok(())
    });
}

#[test]
fn loads_retry_and_selector_from_toml() {
    Jail::expect_with(|jail| {
        jail.create_file(
            "config.toml",
            r#"
[retry]
module_max_retries = 2
synthesis_max_attempts = 4
validation_enabled = false

[selector]
interval_secs = 60
prompt_path = "prompts/evaluator.txt"
"#,
        )?;

        let config: VerdictConfig = Figment::from(Serialized::defaults(VerdictConfig::default()))
            .merge(Toml::file("config.toml"))
            .extract()?;

        assert_eq!(config.retry.module_max_retries().unwrap(), 2);
        assert_eq!(config.retry.synthesis_max_attempts, 4);
        assert!(!config.retry.validation_enabled);
        assert_eq!(config.selector.interval_secs, 60);
        assert_eq!(
            config.selector.prompt_path.as_deref(),
            Some("prompts/evaluator.txt")
        );
        Ok(())
    });
}

#[test]
fn project_config_is_picked_up_by_figment() {
    Jail::expect_with(|jail| {
        jail.create_dir(".verdict")?;
        jail.create_file(
            ".verdict/config.toml",
            r#"
[llm]
base_url = "https://api.example.com/v1"
api_key = "sk-toml"
model = "gpt-4o-mini"

[storage]
db_path = "data/verdict.db"
"#,
        )?;

        let config: VerdictConfig = VerdictConfig::figment().extract()?;
        assert!(config.llm.is_configured());
        assert_eq!(config.storage.db_path, "data/verdict.db");
        assert_eq!(config.storage.event_log_dir, ".verdict/events");
        Ok(())
    });
}

#[test]
fn env_overrides_toml() {
    Jail::expect_with(|jail| {
        jail.create_file(
            "config.toml",
            r#"
[retry]
module_max_retries = 1
"#,
        )?;
        jail.set_env("VERDICT_RETRY__MODULE_MAX_RETRIES", "3");

        let config: VerdictConfig = Figment::from(Serialized::defaults(VerdictConfig::default()))
            .merge(Toml::file("config.toml"))
            .merge(Env::prefixed("VERDICT_").split("__"))
            .extract()?;

        assert_eq!(config.retry.module_max_retries, Some(3));
        Ok(())
    });
}

#[test]
fn missing_module_bound_is_reported() {
    Jail::expect_with(|_jail| {
        let config = VerdictConfig::load().expect("defaults load");
        let err = config.retry.module_max_retries().unwrap_err();
        assert!(matches!(err, ConfigError::NotConfigured { ref section } if section == "retry.module_max_retries"));
        Ok(())
    });
}

#[test]
fn wrong_type_is_a_figment_error() {
    Jail::expect_with(|jail| {
        jail.set_env("VERDICT_VALIDATION__PASS_THRESHOLD", "not-a-number");
        let err = VerdictConfig::load().unwrap_err();
        assert!(matches!(err, ConfigError::Figment(_)));
        Ok(())
    });
}
