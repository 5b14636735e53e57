//! Selector passes over an in-memory store.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use chrono::{Duration, Utc};
use pretty_assertions::assert_eq;
use tempfile::TempDir;
use verdict_config::SelectorConfig;
use verdict_core::entities::{AnalysisRecord, CandidateEvaluation, EvaluationResult};
use verdict_core::enums::{RecordOutcome, SetStatus};
use verdict_db::artifacts::ArtifactStore;
use verdict_db::repos::NewRecord;
use verdict_db::service::VerdictService;
use verdict_pipeline::{BestOfNSelector, Evaluator, EvaluatorError, TickSummary};

/// Returns a fixed reply and records which subjects it saw.
struct FakeEvaluator {
    reply: fn(&[AnalysisRecord]) -> Result<EvaluationResult, EvaluatorError>,
    seen: Mutex<Vec<String>>,
}

impl FakeEvaluator {
    fn new(reply: fn(&[AnalysisRecord]) -> Result<EvaluationResult, EvaluatorError>) -> Self {
        Self {
            reply,
            seen: Mutex::new(Vec::new()),
        }
    }
}

impl Evaluator for FakeEvaluator {
    async fn evaluate(
        &self,
        subject_id: &str,
        candidates: &[AnalysisRecord],
    ) -> Result<EvaluationResult, EvaluatorError> {
        self.seen.lock().unwrap().push(subject_id.to_string());
        (self.reply)(candidates)
    }
}

/// Ranks candidates in reverse creation order and declares the middle one best.
fn prefer_middle(candidates: &[AnalysisRecord]) -> Result<EvaluationResult, EvaluatorError> {
    Ok(EvaluationResult {
        evaluations: candidates
            .iter()
            .rev()
            .enumerate()
            .map(|(i, c)| CandidateEvaluation {
                analysis_id: c.id.clone(),
                scores: BTreeMap::new(),
                total_score: 9.0 - f64::from(u32::try_from(i).unwrap()),
                quality_rank: Some(u32::try_from(i + 1).unwrap()),
            })
            .collect(),
        declared_best_id: Some(candidates[1].id.clone()),
    })
}

fn always_fails(_: &[AnalysisRecord]) -> Result<EvaluationResult, EvaluatorError> {
    Err(EvaluatorError::NoJson)
}

struct Fixture {
    store: Arc<VerdictService>,
    artifacts: ArtifactStore,
    _dir: TempDir,
}

impl Fixture {
    async fn new() -> Self {
        let dir = TempDir::new().unwrap();
        Self {
            store: Arc::new(VerdictService::new_local(":memory:").await.unwrap()),
            artifacts: ArtifactStore::new(dir.path().to_path_buf()),
            _dir: dir,
        }
    }

    /// Persist `n` records with artifacts for `subject`, due in the past.
    async fn seed(&self, subject: &str, n: usize) -> Vec<AnalysisRecord> {
        let mut records = Vec::new();
        for i in 0..n {
            let text = format!("report {i} for {subject}");
            let mut record = self
                .store
                .create_record(
                    &NewRecord {
                        subject_id: subject,
                        raw_text: &text,
                        outcome: RecordOutcome::Accepted,
                        quality_score: 80,
                    },
                    Utc::now() - Duration::minutes(5),
                )
                .await
                .unwrap();
            let path = self.artifacts.store(subject, &record.id, &text).await.unwrap();
            let artifact = path.display().to_string();
            self.store.set_artifact_ref(&record.id, &artifact).await.unwrap();
            record.artifact_ref = Some(artifact);
            records.push(record);
        }
        records
    }

    fn selector(&self, evaluator: FakeEvaluator) -> BestOfNSelector<FakeEvaluator> {
        BestOfNSelector::new(
            Arc::clone(&self.store),
            self.artifacts.clone(),
            evaluator,
            SelectorConfig::default(),
        )
    }
}

#[tokio::test]
async fn tick_keeps_exactly_one_artifact_per_set() {
    let fx = Fixture::new().await;
    let seeded = fx.seed("vid-1", 3).await;
    let selector = fx.selector(FakeEvaluator::new(prefer_middle));

    let summary = selector.tick().await.unwrap();

    assert_eq!(
        summary,
        TickSummary {
            due: 1,
            evaluated: 1,
            failed: 0,
            skipped: 0,
            pruned: 2,
        }
    );

    let records = fx.store.records_for_set(&seeded[0].set_id).await.unwrap();
    assert_eq!(records.len(), 3);
    assert!(records.iter().all(|r| r.evaluated));
    let kept: Vec<&AnalysisRecord> = records.iter().filter(|r| !r.deleted_flag).collect();
    assert_eq!(kept.len(), 1);
    assert_eq!(kept[0].id, seeded[1].id);

    for record in &records {
        let path = record.artifact_ref.as_deref().unwrap();
        assert_eq!(std::path::Path::new(path).exists(), !record.deleted_flag, "{}", record.id);
        assert!(!record.raw_text.is_empty());
    }

    let set = fx.store.get_set(&seeded[0].set_id).await.unwrap();
    assert_eq!(set.status, SetStatus::Evaluated);
    assert_eq!(set.best_record_id.as_deref(), Some(seeded[1].id.as_str()));
    assert!(set.evaluation_result.is_some());

    let again = selector.tick().await.unwrap();
    assert_eq!(again.due, 0);
}

#[tokio::test]
async fn evaluator_failure_marks_set_error_and_continues() {
    let fx = Fixture::new().await;
    let seeded = fx.seed("vid-1", 3).await;
    let selector = fx.selector(FakeEvaluator::new(always_fails));

    let summary = selector.tick().await.unwrap();

    assert_eq!(summary.failed, 1);
    assert_eq!(summary.evaluated, 0);
    let set = fx.store.get_set(&seeded[0].set_id).await.unwrap();
    assert_eq!(set.status, SetStatus::Error);
    assert!(
        set.evaluation_result.unwrap()["error"]
            .as_str()
            .unwrap()
            .contains("no JSON object")
    );

    let records = fx.store.records_for_set(&seeded[0].set_id).await.unwrap();
    assert!(records.iter().all(|r| !r.deleted_flag && !r.evaluated));
    assert!(records
        .iter()
        .all(|r| std::path::Path::new(r.artifact_ref.as_deref().unwrap()).exists()));
}

#[tokio::test]
async fn sets_below_minimum_or_not_due_are_ignored() {
    let fx = Fixture::new().await;
    fx.seed("vid-small", 2).await;
    fx.store
        .create_record(
            &NewRecord {
                subject_id: "vid-future",
                raw_text: "r",
                outcome: RecordOutcome::Accepted,
                quality_score: 80,
            },
            Utc::now() + Duration::hours(1),
        )
        .await
        .unwrap();
    let evaluator = FakeEvaluator::new(prefer_middle);
    let selector = fx.selector(evaluator);

    let summary = selector.tick().await.unwrap();

    assert_eq!(summary, TickSummary::default());
}

#[tokio::test]
async fn several_sets_are_processed_in_one_tick() {
    let fx = Fixture::new().await;
    fx.seed("vid-a", 3).await;
    fx.seed("vid-b", 4).await;
    let selector = fx.selector(FakeEvaluator::new(prefer_middle));

    let summary = selector.tick().await.unwrap();

    assert_eq!(summary.due, 2);
    assert_eq!(summary.evaluated, 2);
    assert_eq!(summary.pruned, 2 + 3);
}

#[tokio::test]
async fn run_loop_stops_on_shutdown() {
    let fx = Fixture::new().await;
    fx.seed("vid-1", 3).await;
    let selector = fx.selector(FakeEvaluator::new(prefer_middle));
    let shutdown = tokio_util::sync::CancellationToken::new();

    let stopper = async {
        while fx.store.find_set_for_subject("vid-1").await.unwrap().unwrap().status != SetStatus::Evaluated {
            tokio::task::yield_now().await;
        }
        shutdown.cancel();
    };
    tokio::join!(selector.run(shutdown.clone()), stopper);

    assert_eq!(
        fx.store.find_set_for_subject("vid-1").await.unwrap().unwrap().status,
        SetStatus::Evaluated
    );
}
