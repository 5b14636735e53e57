//! In-flight analysis registry with cooperative cancellation.
//!
//! The runner owns a map from subject to the cancellation token of the
//! analysis currently running for it. An entry lives exactly as long as its
//! run: an [`ActiveGuard`] removes it on drop, whichever way the run ends.
//! Rows and files created by a run, report copies in the event log included,
//! are tracked in a [`RunContext`] so that a cancelled run can be rolled back.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use verdict_core::entities::AnalysisRecord;
use verdict_db::artifacts::ArtifactStore;
use verdict_db::repos::NewRecord;
use verdict_db::service::VerdictService;
use verdict_llm::Generator;

use crate::error::{Cancelled, PipelineError};
use crate::orchestrator::{AnalysisRequest, Outcome, RetryOrchestrator, check};

type Registry = Mutex<HashMap<String, CancellationToken>>;

fn lock(registry: &Registry) -> MutexGuard<'_, HashMap<String, CancellationToken>> {
    registry.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Removes a subject from the registry when dropped.
struct ActiveGuard<'a> {
    registry: &'a Registry,
    subject_id: String,
}

impl Drop for ActiveGuard<'_> {
    fn drop(&mut self) {
        lock(self.registry).remove(&self.subject_id);
        debug!(subject_id = %self.subject_id, "analysis unregistered");
    }
}

static RUN_SEQ: AtomicU64 = AtomicU64::new(0);

/// Rows and files created by one run.
#[derive(Debug)]
pub struct RunContext {
    subject_id: String,
    run_id: String,
    record_id: Option<String>,
    files: Vec<PathBuf>,
}

impl RunContext {
    #[must_use]
    pub fn new(subject_id: impl Into<String>) -> Self {
        let seq = RUN_SEQ.fetch_add(1, Ordering::Relaxed);
        Self {
            subject_id: subject_id.into(),
            run_id: format!("{}-{seq}", Utc::now().format("%Y%m%dT%H%M%S%6f")),
            record_id: None,
            files: Vec::new(),
        }
    }

    /// Unique per context; names files that several runs of one subject
    /// would otherwise share.
    #[must_use]
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn track_record(&mut self, record_id: impl Into<String>) {
        self.record_id = Some(record_id.into());
    }

    pub fn track_file(&mut self, path: PathBuf) {
        if !self.files.contains(&path) {
            self.files.push(path);
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.record_id.is_none() && self.files.is_empty()
    }

    /// Remove every tracked file. Files already gone are skipped.
    pub async fn discard_files(&mut self) {
        for path in self.files.drain(..) {
            match tokio::fs::remove_file(&path).await {
                Ok(()) => debug!(subject_id = %self.subject_id, path = %path.display(), "removed file"),
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => warn!(subject_id = %self.subject_id, path = %path.display(), error = %e, "failed to remove file"),
            }
        }
    }

    /// Remove everything tracked so far. Never fails; running it twice is a
    /// no-op the second time.
    pub async fn cleanup(&mut self, store: &VerdictService) {
        if let Some(record_id) = self.record_id.take() {
            match store.delete_record(&record_id).await {
                Ok(deleted) => debug!(subject_id = %self.subject_id, %record_id, deleted, "rolled back record"),
                Err(e) => warn!(subject_id = %self.subject_id, %record_id, error = %e, "failed to roll back record"),
            }
        }
        self.discard_files().await;
    }
}

/// What a finished run produced.
#[derive(Debug)]
pub struct RunReport {
    pub outcome: Outcome,
    /// The persisted record, when persistence succeeded.
    pub record: Option<AnalysisRecord>,
}

pub struct AnalysisRunner<G> {
    orchestrator: RetryOrchestrator<G>,
    store: Arc<VerdictService>,
    artifacts: ArtifactStore,
    /// Delay from a new record to its set's next evaluation.
    evaluation_delay: chrono::Duration,
    shutdown: CancellationToken,
    active: Registry,
}

impl<G: Generator> AnalysisRunner<G> {
    #[must_use]
    pub fn new(
        orchestrator: RetryOrchestrator<G>,
        store: Arc<VerdictService>,
        artifacts: ArtifactStore,
        evaluation_delay: chrono::Duration,
    ) -> Self {
        Self {
            orchestrator,
            store,
            artifacts,
            evaluation_delay,
            shutdown: CancellationToken::new(),
            active: Mutex::new(HashMap::new()),
        }
    }

    #[must_use]
    pub fn is_running(&self, subject_id: &str) -> bool {
        lock(&self.active).contains_key(subject_id)
    }

    /// Signal the analysis for `subject_id` to stop. Returns `false` when
    /// nothing is running for it.
    pub fn cancel(&self, subject_id: &str) -> bool {
        match lock(&self.active).get(subject_id) {
            Some(token) => {
                token.cancel();
                info!(subject_id, "analysis cancellation requested");
                true
            }
            None => false,
        }
    }

    /// Cancel every running analysis.
    pub fn cancel_all(&self) {
        self.shutdown.cancel();
    }

    fn register(&self, subject_id: &str) -> Option<(ActiveGuard<'_>, CancellationToken)> {
        let mut active = lock(&self.active);
        if active.contains_key(subject_id) {
            return None;
        }
        let token = self.shutdown.child_token();
        active.insert(subject_id.to_string(), token.clone());
        Some((
            ActiveGuard {
                registry: &self.active,
                subject_id: subject_id.to_string(),
            },
            token,
        ))
    }

    /// Run and persist one analysis.
    ///
    /// A second run for a subject that is already in flight fails with
    /// `PipelineError::AlreadyRunning` without touching the first.
    /// Persistence problems are logged and leave `record` empty; they never
    /// change the outcome.
    ///
    /// # Errors
    ///
    /// Returns `Cancelled` if the run was cancelled. Anything created before
    /// the cancellation is removed first.
    pub async fn run(&self, request: &AnalysisRequest) -> Result<RunReport, Cancelled> {
        let Some((_guard, token)) = self.register(&request.subject_id) else {
            return Ok(RunReport {
                outcome: Outcome::Failed(PipelineError::AlreadyRunning {
                    subject_id: request.subject_id.clone(),
                }),
                record: None,
            });
        };

        let mut ctx = RunContext::new(&request.subject_id);
        let result = match self.orchestrator.run_in(request, &token, &mut ctx).await {
            Ok(outcome) => {
                let persisted = self.persist(&outcome, &mut ctx, &token).await;
                persisted.map(|record| RunReport { outcome, record })
            }
            Err(Cancelled) => Err(Cancelled),
        };
        if result.is_err() {
            ctx.cleanup(&self.store).await;
        }
        result
    }

    async fn persist(
        &self,
        outcome: &Outcome,
        ctx: &mut RunContext,
        cancel: &CancellationToken,
    ) -> Result<Option<AnalysisRecord>, Cancelled> {
        let (Some(report), Some(record_outcome)) = (outcome.report(), outcome.record_outcome()) else {
            return Ok(None);
        };
        check(cancel)?;

        let new = NewRecord {
            subject_id: &report.subject_id,
            raw_text: &report.text,
            outcome: record_outcome,
            quality_score: report.validation.score,
        };
        let mut record = match self.store.create_record(&new, Utc::now() + self.evaluation_delay).await {
            Ok(record) => record,
            Err(e) => {
                warn!(subject_id = %report.subject_id, error = %e, "failed to persist analysis record");
                return Ok(None);
            }
        };
        ctx.track_record(&record.id);
        check(cancel)?;

        match self.artifacts.store(&record.subject_id, &record.id, &report.text).await {
            Ok(path) => {
                ctx.track_file(path.clone());
                let artifact_ref = path.display().to_string();
                match self.store.set_artifact_ref(&record.id, &artifact_ref).await {
                    Ok(()) => record.artifact_ref = Some(artifact_ref),
                    Err(e) => warn!(record_id = %record.id, error = %e, "failed to save artifact reference"),
                }
            }
            Err(e) => warn!(record_id = %record.id, error = %e, "failed to store artifact"),
        }
        check(cancel)?;

        info!(
            subject_id = %record.subject_id,
            record_id = %record.id,
            outcome = %record.outcome,
            score = record.quality_score,
            "analysis persisted"
        );
        Ok(Some(record))
    }
}
