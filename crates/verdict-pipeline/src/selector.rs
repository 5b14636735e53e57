//! Best-of-N selection over accumulated analyses.
//!
//! Every tick pulls the sets that are due, ranks each set's candidates with
//! an [`Evaluator`], records the ranking and the retained record, and prunes
//! the artifacts of every other candidate. Text rows are never deleted.
//!
//! Ticks never overlap. Sets inside one tick are processed concurrently up to
//! `max_concurrent_sets`; a set appears at most once per tick.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures_util::StreamExt;
use futures_util::stream;
use serde::Serialize;
use tokio::sync::Mutex;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use verdict_config::SelectorConfig;
use verdict_core::entities::{AnalysisRecord, AnalysisSet, EvaluationResult};
use verdict_db::artifacts::ArtifactStore;
use verdict_db::service::VerdictService;

use crate::error::PipelineError;
use crate::evaluator::Evaluator;

/// Counters for one selector pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TickSummary {
    /// Sets that were due at the start of the tick.
    pub due: usize,
    pub evaluated: usize,
    /// Sets whose evaluation failed and were moved to `error`.
    pub failed: usize,
    /// Sets that no longer had enough candidates when processed.
    pub skipped: usize,
    /// Non-best records flagged as pruned.
    pub pruned: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SetOutcome {
    Evaluated { pruned: usize },
    Failed,
    Skipped,
}

/// Choose the record to keep.
///
/// The evaluator's declared best wins if it names a candidate. Otherwise the
/// candidate ranked 1, then the highest total score, then the first
/// candidate. Returns `None` only for an empty candidate list.
#[must_use]
pub fn pick_best(result: &EvaluationResult, candidates: &[AnalysisRecord]) -> Option<String> {
    let is_candidate = |id: &str| candidates.iter().any(|c| c.id == id);

    if let Some(declared) = result.declared_best_id.as_deref() {
        if is_candidate(declared) {
            return Some(declared.to_string());
        }
    }

    let valid = || result.evaluations.iter().filter(|e| is_candidate(&e.analysis_id));

    if let Some(first) = valid().find(|e| e.quality_rank == Some(1)) {
        return Some(first.analysis_id.clone());
    }

    valid()
        .max_by(|a, b| a.total_score.total_cmp(&b.total_score))
        .map(|e| e.analysis_id.clone())
        .or_else(|| candidates.first().map(|c| c.id.clone()))
}

pub struct BestOfNSelector<E> {
    store: Arc<VerdictService>,
    artifacts: ArtifactStore,
    evaluator: E,
    config: SelectorConfig,
    tick_lock: Mutex<()>,
}

impl<E: Evaluator> BestOfNSelector<E> {
    #[must_use]
    pub fn new(
        store: Arc<VerdictService>,
        artifacts: ArtifactStore,
        evaluator: E,
        config: SelectorConfig,
    ) -> Self {
        Self {
            store,
            artifacts,
            evaluator,
            config,
            tick_lock: Mutex::new(()),
        }
    }

    /// Run one pass over the due sets.
    ///
    /// An evaluator failure moves that set to `error` and the pass goes on
    /// with the remaining sets.
    ///
    /// # Errors
    ///
    /// Returns `PipelineError::Database` if the due sets cannot be listed.
    pub async fn tick(&self) -> Result<TickSummary, PipelineError> {
        let _serialized = self.tick_lock.lock().await;

        let due = self
            .store
            .due_sets(Utc::now(), self.config.min_candidates, self.config.batch_limit)
            .await?;
        let mut summary = TickSummary {
            due: due.len(),
            ..TickSummary::default()
        };
        if due.is_empty() {
            debug!("no analysis sets due");
            return Ok(summary);
        }

        let outcomes: Vec<SetOutcome> = stream::iter(due.iter())
            .map(|set| self.evaluate_set(set))
            .buffer_unordered(self.config.max_concurrent_sets.max(1))
            .collect()
            .await;

        for outcome in outcomes {
            match outcome {
                SetOutcome::Evaluated { pruned } => {
                    summary.evaluated += 1;
                    summary.pruned += pruned;
                }
                SetOutcome::Failed => summary.failed += 1,
                SetOutcome::Skipped => summary.skipped += 1,
            }
        }
        info!(
            due = summary.due,
            evaluated = summary.evaluated,
            failed = summary.failed,
            pruned = summary.pruned,
            "selector tick finished"
        );
        Ok(summary)
    }

    /// Tick every `interval_secs` until `shutdown` fires.
    pub async fn run(&self, shutdown: CancellationToken) {
        let mut ticker = tokio::time::interval(self.config.interval().max(Duration::from_secs(1)));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(interval_secs = self.config.interval_secs, "selector started");

        loop {
            tokio::select! {
                () = shutdown.cancelled() => {
                    info!("selector stopped");
                    break;
                }
                _ = ticker.tick() => {
                    if let Err(e) = self.tick().await {
                        warn!(error = %e, "selector tick failed");
                    }
                }
            }
        }
    }

    async fn evaluate_set(&self, set: &AnalysisSet) -> SetOutcome {
        let candidates = match self.store.candidate_records(&set.id).await {
            Ok(candidates) => candidates,
            Err(e) => {
                warn!(set_id = %set.id, error = %e, "failed to load candidates");
                return SetOutcome::Failed;
            }
        };
        if candidates.len() < self.config.min_candidates {
            debug!(set_id = %set.id, count = candidates.len(), "not enough candidates");
            return SetOutcome::Skipped;
        }

        let result = match self.evaluator.evaluate(&set.subject_id, &candidates).await {
            Ok(result) => result,
            Err(e) => {
                warn!(set_id = %set.id, subject_id = %set.subject_id, error = %e, "evaluation failed");
                if let Err(db) = self.store.mark_set_error(&set.id, &e.to_string()).await {
                    warn!(set_id = %set.id, error = %db, "failed to mark set as errored");
                }
                return SetOutcome::Failed;
            }
        };

        let Some(best) = pick_best(&result, &candidates) else {
            return SetOutcome::Skipped;
        };
        let ids: Vec<String> = candidates.iter().map(|c| c.id.clone()).collect();
        if let Err(e) = self.store.save_evaluation(&set.id, &ids, &result, &best).await {
            warn!(set_id = %set.id, error = %e, "failed to save evaluation");
            return SetOutcome::Failed;
        }

        let mut pruned = 0;
        for record in candidates.iter().filter(|c| c.id != best) {
            if self.prune(record).await {
                pruned += 1;
            }
        }
        info!(
            set_id = %set.id,
            subject_id = %set.subject_id,
            best_record_id = %best,
            candidates = candidates.len(),
            pruned,
            "analysis set evaluated"
        );
        SetOutcome::Evaluated { pruned }
    }

    /// Remove a losing record's artifact and flag the record. A failed file
    /// removal leaves the record unflagged.
    async fn prune(&self, record: &AnalysisRecord) -> bool {
        if let Some(artifact) = record.artifact_ref.as_deref() {
            if let Err(e) = self.artifacts.delete(Path::new(artifact)).await {
                warn!(record_id = %record.id, artifact, error = %e, "failed to delete artifact");
                return false;
            }
        }
        match self.store.mark_artifact_deleted(&record.id).await {
            Ok(()) => true,
            Err(e) => {
                warn!(record_id = %record.id, error = %e, "failed to flag pruned record");
                false
            }
        }
    }
}
