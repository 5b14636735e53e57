//! Shared fixtures for pipeline integration tests.

#![allow(dead_code)]

use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Mutex};

use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use verdict_config::ValidationConfig;
use verdict_core::enums::ModuleKind;
use verdict_db::events::EventLog;
use verdict_llm::{GenerationError, Generator};
use verdict_pipeline::{PromptSet, RetryOrchestrator, RetryPolicy};
use verdict_report::{FinalReportValidator, ModuleValidator};

/// Passes the module rubric for every module kind.
pub const GOOD_MODULE: &str = "\
## МЕТА-ИНФОРМАЦИЯ ДЛЯ АГРЕГАЦИИ
Видео ID: vid-42
## СВОДНАЯ ТАБЛИЦА
| ThemeID | Тема | Mentions |
|---|---|---|
| theme_001 | Уроки | 10 |
";

/// Scores 10 for every module kind.
pub const BAD_MODULE: &str = "нет данных";

pub const REPORT: &str = "\
### VIDEO_ANALYSIS_REPORT_START ###
VIDEO_ANALYSIS_METRICS_START
### СТРАТЕГИЧЕСКИЕ МЕТА-ДАННЫЕ ###
CONTENT_HEALTH_INDEX: 90
AUDIENCE_EVOLUTION_VECTOR: новички → энтузиасты
STRATEGIC_STABILITY_INDEX: 1.2
DATA_QUALITY: высокое
ANALYSIS_MODE: C
### МЕТАДАННЫЕ ВИДЕО ###
ID: vid-42
Комментарии: 1000
### АНАЛИЗ КОММЕНТАРИЕВ ###
Положительные: 62%
Нейтральные: 28%
Негативные: 10%
### КРОСС-МОДУЛЬНЫЕ СТРАТЕГИЧЕСКИЕ ИНСАЙТЫ ###
[ИНСАЙТ 1]: Обучающие ролики удерживают новичков. ThemeID: theme_001, EmotionID: emotion_001, PersonaID: persona_001, RiskID: risk_001
### ДАННЫЕ ДЛЯ АГРЕГАЦИИ ###
```json
{\"subject_id\": \"vid-42\"}
```
VIDEO_ANALYSIS_METRICS_END
### VIDEO_ANALYSIS_REPORT_END ###
";

/// `REPORT` without its subject section and closing marker; forces a
/// regeneration.
pub fn broken_report() -> String {
    REPORT
        .lines()
        .filter(|line| {
            !line.contains("МЕТАДАННЫЕ ВИДЕО") && !line.contains("VIDEO_ANALYSIS_REPORT_END")
        })
        .map(|line| format!("{line}\n"))
        .collect()
}

pub const SYNTHESIS_PROMPT: &str = "synthesis prompt";

pub fn prompts() -> PromptSet {
    let modules: BTreeMap<ModuleKind, String> = ModuleKind::ALL
        .into_iter()
        .map(|m| (m, format!("prompt {m}")))
        .collect();
    PromptSet::new(modules, SYNTHESIS_PROMPT).unwrap()
}

/// One recorded `generate` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    pub system: String,
    pub user: String,
}

/// Replays scripted replies in order and records every call.
#[derive(Default)]
pub struct ScriptedGenerator {
    replies: Mutex<VecDeque<Result<String, GenerationError>>>,
    calls: Mutex<Vec<Call>>,
    cancel_on_call: Option<(usize, CancellationToken)>,
    gate: Option<(usize, Arc<Notify>)>,
}

impl ScriptedGenerator {
    pub fn new(replies: impl IntoIterator<Item = Result<String, GenerationError>>) -> Self {
        Self {
            replies: Mutex::new(replies.into_iter().collect()),
            ..Self::default()
        }
    }

    pub fn texts<'a>(replies: impl IntoIterator<Item = &'a str>) -> Self {
        Self::new(replies.into_iter().map(|r| Ok(r.to_string())))
    }

    /// Cancel `token` while serving the `n`th call (1-based).
    pub fn cancel_on_call(mut self, n: usize, token: CancellationToken) -> Self {
        self.cancel_on_call = Some((n, token));
        self
    }

    /// Block the first call until `gate` is notified.
    pub fn gated(self, gate: Arc<Notify>) -> Self {
        self.gated_on_call(1, gate)
    }

    /// Block the `n`th call (1-based) until `gate` is notified.
    pub fn gated_on_call(mut self, n: usize, gate: Arc<Notify>) -> Self {
        self.gate = Some((n, gate));
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }
}

impl Generator for ScriptedGenerator {
    async fn generate(&self, system_prompt: &str, user_context: &str) -> Result<String, GenerationError> {
        let (n, reply) = {
            let mut calls = self.calls.lock().unwrap();
            calls.push(Call {
                system: system_prompt.to_string(),
                user: user_context.to_string(),
            });
            let reply = self
                .replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(GenerationError::Upstream("script exhausted".to_string())));
            (calls.len(), reply)
        };
        if let Some((at, token)) = &self.cancel_on_call {
            if *at == n {
                token.cancel();
            }
        }
        if let Some((at, gate)) = &self.gate {
            if *at == n {
                gate.notified().await;
            }
        }
        reply
    }
}

pub fn orchestrator(
    generator: Arc<ScriptedGenerator>,
    max_retries: u32,
    policy: RetryPolicy,
    events: EventLog,
) -> RetryOrchestrator<Arc<ScriptedGenerator>> {
    RetryOrchestrator::new(
        generator,
        prompts(),
        ModuleValidator::new(35, max_retries),
        FinalReportValidator::new(ValidationConfig::default()),
        policy,
        events,
    )
}
