use verdict_config::VerdictConfig;

/// Load `.env`, then the layered TOML and `VERDICT_*` configuration.
pub fn load_config() -> anyhow::Result<VerdictConfig> {
    let config = VerdictConfig::load_with_dotenv()?;
    if !config.llm.is_configured() {
        tracing::debug!("llm section is incomplete; only offline commands will work");
    }
    Ok(config)
}
