use std::sync::Arc;

use anyhow::Context;
use verdict_config::VerdictConfig;
use verdict_db::artifacts::ArtifactStore;
use verdict_db::events::EventLog;
use verdict_db::service::VerdictService;

/// Shared application resources initialized once at startup.
pub struct AppContext {
    pub config: VerdictConfig,
    pub service: Arc<VerdictService>,
    pub artifacts: ArtifactStore,
    pub events: EventLog,
}

impl AppContext {
    /// Open the analysis store, artifact directory and event log named by
    /// `[storage]`.
    pub async fn init(config: VerdictConfig) -> anyhow::Result<Self> {
        let db_path = config.storage.db_path();
        let service = VerdictService::new_local(&db_path.to_string_lossy())
            .await
            .with_context(|| format!("failed to open analysis store at {}", db_path.display()))?;

        let events = EventLog::from_config(&config.storage).unwrap_or_else(|error| {
            tracing::warn!(%error, "validation event log unavailable; continuing without it");
            EventLog::disabled()
        });

        Ok(Self {
            artifacts: ArtifactStore::new(config.storage.artifact_dir()),
            service: Arc::new(service),
            events,
            config,
        })
    }

    /// Delay from a new record to its set's first evaluation.
    pub fn evaluation_delay(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.config.selector.evaluation_delay_secs)
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;
    use verdict_config::VerdictConfig;

    use super::AppContext;

    #[tokio::test]
    async fn init_creates_store_under_configured_paths() {
        let temp = TempDir::new().expect("tempdir should create");
        let mut config = VerdictConfig::default();
        config.storage.db_path = temp.path().join("data/verdict.db").display().to_string();
        config.storage.event_log_dir = temp.path().join("events").display().to_string();
        config.storage.artifact_dir = temp.path().join("artifacts").display().to_string();
        config.selector.evaluation_delay_secs = 90;

        let ctx = AppContext::init(config).await.expect("context should init");

        assert!(temp.path().join("data/verdict.db").exists());
        assert!(temp.path().join("events").is_dir());
        assert_eq!(ctx.evaluation_delay(), chrono::Duration::seconds(90));
    }
}
