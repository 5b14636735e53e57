use figment::Jail;
use verdict_config::VerdictConfig;

#[test]
fn env_sets_module_retry_bound() {
    Jail::expect_with(|jail| {
        jail.set_env("VERDICT_RETRY__MODULE_MAX_RETRIES", "2");
        let config = VerdictConfig::load().expect("config loads");
        assert_eq!(config.retry.module_max_retries().unwrap(), 2);
        Ok(())
    });
}

#[test]
fn env_sets_llm_section() {
    Jail::expect_with(|jail| {
        jail.set_env("VERDICT_LLM__BASE_URL", "http://localhost:8080/v1");
        jail.set_env("VERDICT_LLM__API_KEY", "sk-env");
        jail.set_env("VERDICT_LLM__MODEL", "local-model");
        jail.set_env("VERDICT_LLM__TEMPERATURE", "0.7");
        let config = VerdictConfig::load().expect("config loads");
        assert!(config.llm.is_configured());
        assert!((config.llm.temperature - 0.7).abs() < f32::EPSILON);
        Ok(())
    });
}

#[test]
fn env_disables_validation() {
    Jail::expect_with(|jail| {
        jail.set_env("VERDICT_RETRY__VALIDATION_ENABLED", "false");
        let config = VerdictConfig::load().expect("config loads");
        assert!(!config.retry.validation_enabled);
        Ok(())
    });
}
