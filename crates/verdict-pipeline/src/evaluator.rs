//! Best-of-N ranking request.
//!
//! The evaluator embeds every candidate report into a template, asks the
//! generator for a JSON ranking and normalizes the reply into an
//! [`EvaluationResult`]. Replies are messy: the JSON object may be wrapped
//! in prose, ids may be numbers or strings, and `total_score` may be absent.

use std::collections::BTreeMap;
use std::future::Future;
use std::path::PathBuf;

use serde_json::Value;
use tracing::debug;
use verdict_config::SelectorConfig;
use verdict_core::entities::{AnalysisRecord, CandidateEvaluation, EvaluationResult};
use verdict_llm::Generator;

use crate::error::EvaluatorError;

const SYSTEM_PROMPT: &str = "Сформируй ответ строго в JSON по заданному формату.";

/// Ranking template used when no `selector.prompt_path` is configured.
pub const DEFAULT_TEMPLATE: &str = r#"Ты эксперт-аналитик контента. Перед тобой несколько анализов одного и того же объекта, выполненных в разное время.

ИНФОРМАЦИЯ:
- ID: {subject_id}
- Всего анализов: {total_analyses}
- Период анализа: {analysis_period}

КРИТЕРИИ ОЦЕНКИ (0-10 за каждый):
1. ПОЛНОТА АНАЛИЗА
2. СТРУКТУРИРОВАННОСТЬ
3. ГЛУБИНА ИНСАЙТОВ
4. ПРАКТИЧЕСКАЯ ЦЕННОСТЬ
5. ЧЕТКОСТЬ ИЗЛОЖЕНИЯ

АНАЛИЗЫ ДЛЯ ОЦЕНКИ:
{analyses_content}

ЗАДАЧА:
1. Оцени каждый анализ по 5 критериям.
2. Рассчитай общий балл (среднее по критериям).
3. Проранжируй анализы (1 - лучший).
4. Выбери лучший анализ.

ФОРМАТ ОТВЕТА (строго JSON, без дополнительного текста):
{
  "evaluations": [
    {
      "analysis_id": "ana-00000001",
      "scores": {"completeness": 8, "structure": 8, "insights_depth": 7, "practical_value": 8, "clarity": 9},
      "total_score": 8.0,
      "quality_rank": 1
    }
  ],
  "best_analysis_id": "ana-00000001"
}
"#;

/// Ranks the candidate records of one set.
pub trait Evaluator: Send + Sync {
    fn evaluate(
        &self,
        subject_id: &str,
        candidates: &[AnalysisRecord],
    ) -> impl Future<Output = Result<EvaluationResult, EvaluatorError>> + Send;
}

/// Evaluator backed by a text [`Generator`].
pub struct LlmEvaluator<G> {
    generator: G,
    template: String,
    snippet_chars: usize,
    min_candidates: usize,
}

impl<G: Generator> LlmEvaluator<G> {
    #[must_use]
    pub fn new(generator: G, template: impl Into<String>, snippet_chars: usize, min_candidates: usize) -> Self {
        Self {
            generator,
            template: template.into(),
            snippet_chars,
            min_candidates,
        }
    }

    /// Build from the selector section, reading `prompt_path` when set.
    ///
    /// # Errors
    ///
    /// Returns `EvaluatorError::Prompt` if the configured template cannot be
    /// read.
    pub fn from_config(generator: G, config: &SelectorConfig) -> Result<Self, EvaluatorError> {
        let template = match &config.prompt_path {
            Some(path) => {
                let path = PathBuf::from(path);
                std::fs::read_to_string(&path).map_err(|source| EvaluatorError::Prompt { path, source })?
            }
            None => DEFAULT_TEMPLATE.to_string(),
        };
        Ok(Self::new(generator, template, config.snippet_chars, config.min_candidates))
    }

    /// The filled ranking prompt for a set of candidates.
    #[must_use]
    pub fn render(&self, subject_id: &str, candidates: &[AnalysisRecord]) -> String {
        let period = match (
            candidates.iter().map(|c| c.created_at).min(),
            candidates.iter().map(|c| c.created_at).max(),
        ) {
            (Some(start), Some(end)) => format!("{} .. {}", start.to_rfc3339(), end.to_rfc3339()),
            _ => "unknown".to_string(),
        };
        let content = candidates
            .iter()
            .map(|c| candidate_block(c, self.snippet_chars))
            .collect::<Vec<_>>()
            .join("\n");

        [
            ("subject_id", subject_id.to_string()),
            ("total_analyses", candidates.len().to_string()),
            ("analysis_period", period),
            ("analyses_content", content.trim().to_string()),
        ]
        .iter()
        .fold(self.template.clone(), |out, (key, value)| {
            out.replace(&format!("{{{key}}}"), value)
        })
    }
}

impl<G: Generator> Evaluator for LlmEvaluator<G> {
    async fn evaluate(
        &self,
        subject_id: &str,
        candidates: &[AnalysisRecord],
    ) -> Result<EvaluationResult, EvaluatorError> {
        if candidates.len() < self.min_candidates {
            return Err(EvaluatorError::TooFewCandidates {
                count: candidates.len(),
                required: self.min_candidates,
            });
        }
        let prompt = self.render(subject_id, candidates);
        let reply = self.generator.generate(SYSTEM_PROMPT, &prompt).await?;
        let result = parse_evaluation(&reply)?;
        debug!(
            subject_id,
            candidates = candidates.len(),
            evaluations = result.evaluations.len(),
            declared_best = result.declared_best_id.as_deref().unwrap_or(""),
            "evaluator replied"
        );
        Ok(result)
    }
}

fn candidate_block(record: &AnalysisRecord, snippet_chars: usize) -> String {
    let snippet: String = record.raw_text.trim().chars().take(snippet_chars).collect();
    format!(
        "АНАЛИЗ #{} (от {}):\n### VIDEO_ANALYSIS_REPORT_START ###\n{snippet}\n### VIDEO_ANALYSIS_REPORT_END ###\n",
        record.id,
        record.created_at.to_rfc3339(),
    )
}

// ---------------------------------------------------------------------------
// Reply parsing
// ---------------------------------------------------------------------------

/// Normalize an evaluator reply.
///
/// # Errors
///
/// Fails when no JSON object is present, the object has no non-empty
/// `evaluations` array, or no entry carries a usable id.
pub fn parse_evaluation(reply: &str) -> Result<EvaluationResult, EvaluatorError> {
    let value: Value = serde_json::from_str(json_slice(reply).ok_or(EvaluatorError::NoJson)?)?;

    let entries = value
        .get("evaluations")
        .and_then(Value::as_array)
        .filter(|list| !list.is_empty())
        .ok_or(EvaluatorError::MissingEvaluations)?;

    let evaluations: Vec<CandidateEvaluation> = entries.iter().filter_map(normalize_entry).collect();
    if evaluations.is_empty() {
        return Err(EvaluatorError::NoValidEntries);
    }

    Ok(EvaluationResult {
        evaluations,
        declared_best_id: value.get("best_analysis_id").and_then(id_string),
    })
}

/// The outermost `{ ... }` span.
fn json_slice(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (start < end).then(|| &text[start..=end])
}

fn id_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => {
            let s = s.trim().trim_start_matches('#');
            (!s.is_empty()).then(|| s.to_string())
        }
        Value::Number(n) => n.as_i64().map(|i| i.to_string()).or_else(|| {
            n.as_f64()
                .filter(|f| f.fract() == 0.0)
                .map(|f| format!("{f:.0}"))
        }),
        _ => None,
    }
}

fn number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn normalize_entry(entry: &Value) -> Option<CandidateEvaluation> {
    let object = entry.as_object()?;
    let analysis_id = object.get("analysis_id").and_then(id_string)?;

    let scores: BTreeMap<String, f64> = object
        .get("scores")
        .and_then(Value::as_object)
        .map(|map| {
            map.iter()
                .filter_map(|(k, v)| number(v).map(|n| (k.clone(), n)))
                .collect()
        })
        .unwrap_or_default();

    let total_score = object
        .get("total_score")
        .and_then(number)
        .or_else(|| mean(&scores))
        .unwrap_or(0.0);

    let quality_rank = object
        .get("quality_rank")
        .and_then(number)
        .filter(|r| *r >= 1.0 && r.fract() == 0.0)
        .and_then(|r| format!("{r:.0}").parse().ok());

    Some(CandidateEvaluation {
        analysis_id,
        scores,
        total_score,
        quality_rank,
    })
}

#[allow(clippy::cast_precision_loss)]
fn mean(scores: &BTreeMap<String, f64>) -> Option<f64> {
    if scores.is_empty() {
        return None;
    }
    let avg = scores.values().sum::<f64>() / scores.len() as f64;
    Some((avg * 1000.0).round() / 1000.0)
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use chrono::{TimeZone, Utc};
    use pretty_assertions::assert_eq;
    use verdict_core::enums::RecordOutcome;
    use verdict_llm::GenerationError;

    use super::*;

    struct Canned {
        reply: String,
        prompts: Mutex<Vec<String>>,
    }

    impl Generator for Canned {
        async fn generate(&self, _system: &str, user: &str) -> Result<String, GenerationError> {
            self.prompts.lock().unwrap().push(user.to_string());
            Ok(self.reply.clone())
        }
    }

    fn record(id: &str, hour: u32, text: &str) -> AnalysisRecord {
        AnalysisRecord {
            id: id.to_string(),
            set_id: "set-1".to_string(),
            subject_id: "vid-1".to_string(),
            created_at: Utc.with_ymd_and_hms(2026, 3, 1, hour, 0, 0).unwrap(),
            raw_text: text.to_string(),
            outcome: RecordOutcome::Accepted,
            quality_score: 90,
            artifact_ref: None,
            evaluation_rank: None,
            evaluation_score: None,
            evaluated: false,
            deleted_flag: false,
        }
    }

    #[test]
    fn reply_wrapped_in_prose_is_parsed() {
        let reply = r#"Вот результат:
```json
{"evaluations": [
  {"analysis_id": 7, "scores": {"a": 8, "b": 6}, "quality_rank": 2},
  {"analysis_id": "ana-2", "total_score": 9.5, "quality_rank": 1}
], "best_analysis_id": "ana-2"}
```
Спасибо."#;
        let result = parse_evaluation(reply).unwrap();
        assert_eq!(result.declared_best_id.as_deref(), Some("ana-2"));
        assert_eq!(result.evaluations.len(), 2);
        assert_eq!(result.evaluations[0].analysis_id, "7");
        assert!((result.evaluations[0].total_score - 7.0).abs() < f64::EPSILON);
        assert_eq!(result.evaluations[0].quality_rank, Some(2));
        assert!((result.evaluations[1].total_score - 9.5).abs() < f64::EPSILON);
    }

    #[test]
    fn entries_without_id_are_dropped() {
        let reply = r#"{"evaluations": [{"total_score": 3}, "junk", {"analysis_id": "x"}]}"#;
        let result = parse_evaluation(reply).unwrap();
        assert_eq!(result.evaluations.len(), 1);
        assert_eq!(result.evaluations[0].analysis_id, "x");
        assert!(result.evaluations[0].total_score.abs() < f64::EPSILON);
        assert_eq!(result.declared_best_id, None);
    }

    #[test]
    fn malformed_replies_are_errors() {
        assert!(matches!(parse_evaluation("no json here"), Err(EvaluatorError::NoJson)));
        assert!(matches!(
            parse_evaluation(r#"{"evaluations": []}"#),
            Err(EvaluatorError::MissingEvaluations)
        ));
        assert!(matches!(
            parse_evaluation(r#"{"evaluations": [{"score": 1}]}"#),
            Err(EvaluatorError::NoValidEntries)
        ));
        assert!(matches!(parse_evaluation("{not json}"), Err(EvaluatorError::Json(_))));
    }

    #[tokio::test]
    async fn prompt_embeds_every_candidate() {
        let generator = Canned {
            reply: r#"{"evaluations": [{"analysis_id": "a1", "total_score": 5}]}"#.to_string(),
            prompts: Mutex::new(Vec::new()),
        };
        let evaluator = LlmEvaluator::new(
            generator,
            "{subject_id}|{total_analyses}|{analysis_period}\n{analyses_content}",
            4,
            3,
        );
        let candidates = [
            record("a1", 9, "  первый отчёт"),
            record("a2", 10, "второй"),
            record("a3", 11, "третий"),
        ];

        evaluator.evaluate("vid-1", &candidates).await.unwrap();

        let prompts = evaluator.generator.prompts.lock().unwrap();
        let prompt = &prompts[0];
        assert!(prompt.starts_with(
            "vid-1|3|2026-03-01T09:00:00+00:00 .. 2026-03-01T11:00:00+00:00\n"
        ));
        assert!(prompt.contains("АНАЛИЗ #a2 (от 2026-03-01T10:00:00+00:00):"));
        assert!(prompt.contains("### VIDEO_ANALYSIS_REPORT_START ###\nперв\n### VIDEO_ANALYSIS_REPORT_END ###"));
        assert!(!prompt.contains("первый"));
    }

    #[tokio::test]
    async fn too_few_candidates_skip_generation() {
        let generator = Canned {
            reply: String::new(),
            prompts: Mutex::new(Vec::new()),
        };
        let evaluator = LlmEvaluator::new(generator, DEFAULT_TEMPLATE, 100, 3);
        let err = evaluator
            .evaluate("vid-1", &[record("a1", 9, "x")])
            .await
            .unwrap_err();
        assert!(matches!(err, EvaluatorError::TooFewCandidates { count: 1, required: 3 }));
        assert!(evaluator.generator.prompts.lock().unwrap().is_empty());
    }
}
