//! Rubric scoring for a single module's raw output.
//!
//! | Check | Points |
//! |---|---|
//! | Critical sections present (pro-rated) | 30 |
//! | Table shape matches the module template | 25 (15 for any pipe table or numbered list) |
//! | Entity IDs found | `min(25, 10 + 3n)`, 5 below the minimum |
//! | Required header tokens (pro-rated) | 10 |
//! | Metadata marker | 10 (5 otherwise) |

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use verdict_config::{ConfigError, RetryConfig, ValidationConfig};
use verdict_core::enums::ModuleKind;

const CRITICAL_SECTIONS: [&str; 2] = ["МЕТА-ИНФОРМАЦИЯ", "ТАБЛИЦА"];
const METADATA_MARKERS: [&str; 3] = ["МЕТА-ИНФОРМАЦИЯ ДЛЯ АГРЕГАЦИИ", "Видео ID", "hash("];
const MIN_ENTITIES: usize = 1;

const SECTION_POINTS: f64 = 30.0;
const TABLE_POINTS: f64 = 25.0;
const TABLE_FALLBACK_POINTS: f64 = 15.0;
const ENTITY_MAX_POINTS: usize = 25;
const ENTITY_FLOOR_POINTS: f64 = 5.0;
const HEADER_POINTS: f64 = 10.0;
const META_POINTS: f64 = 10.0;
const META_PARTIAL_POINTS: f64 = 5.0;

macro_rules! lazy_regex {
    ($name:ident, $pattern:expr) => {
        static $name: LazyLock<Regex> =
            LazyLock::new(|| Regex::new($pattern).expect(concat!("valid regex ", stringify!($name))));
    };
}

lazy_regex!(THEMES_TABLE, r"(?is)(ThemeID|ID).*?(Тема|Название).*?(Mentions|Упоминания)");
lazy_regex!(EMOTIONS_TABLE, r"(?is)(EmotionID|ID).*?(триггер|Эмоция).*?(Mentions|Упоминания)");
lazy_regex!(PERSONAS_TABLE, r"(?is)(PersonaID|ID).*?(Персон|Имя).*?(Size|Размер)");
lazy_regex!(RISKS_TABLE, r"(?is)ID.*?(Кластер|Название).*?(Приоритет|Priority)");
lazy_regex!(ANY_PIPE_TABLE, r"\|\s*\w+\s*\|");
lazy_regex!(NUMBERED_LIST, r"(?m)^\s*\d+\.?\s+");
lazy_regex!(BRACKETED_ID, r"\[([^\]]+→[^\]]+→[^\]]+|[A-Za-z0-9_\-]+)\]");
lazy_regex!(ALTERNATIVE_ID, r"(?i)(?:theme|emotion|persona|cluster)_?\d+");

/// Per-module rubric inputs.
struct Rubric {
    table: &'static LazyLock<Regex>,
    headers: [&'static str; 3],
}

fn rubric(module: ModuleKind) -> Rubric {
    match module {
        ModuleKind::Themes => Rubric {
            table: &THEMES_TABLE,
            headers: ["ThemeID", "Тема", "Mentions"],
        },
        ModuleKind::Emotions => Rubric {
            table: &EMOTIONS_TABLE,
            headers: ["EmotionID", "триггер", "Mentions"],
        },
        ModuleKind::Personas => Rubric {
            table: &PERSONAS_TABLE,
            headers: ["PersonaID", "Персон", "Size"],
        },
        ModuleKind::RisksOpportunities => Rubric {
            table: &RISKS_TABLE,
            headers: ["ID", "Кластер", "Приоритет"],
        },
    }
}

/// Counters collected while scoring.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ModuleMetrics {
    pub entities_count: usize,
    pub sections_found: usize,
    pub headers_found: usize,
    pub table_matched: bool,
}

/// Outcome of one module attempt.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModuleValidationResult {
    pub module: ModuleKind,
    pub attempt: u32,
    pub is_valid: bool,
    /// Rubric points in `[0, 100]`.
    pub quality_score: f64,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub metrics: ModuleMetrics,
    pub retry_needed: bool,
}

impl ModuleValidationResult {
    /// Score rounded for persistence.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn rounded_score(&self) -> u8 {
        self.quality_score.round().clamp(0.0, 100.0) as u8
    }
}

/// Stateless module scorer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModuleValidator {
    min_quality_score: f64,
    max_retries: u32,
}

impl ModuleValidator {
    #[must_use]
    pub fn new(min_quality_score: u8, max_retries: u32) -> Self {
        Self {
            min_quality_score: f64::from(min_quality_score),
            max_retries,
        }
    }

    /// Build from configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::NotConfigured` when `retry.module_max_retries`
    /// is not set.
    pub fn from_config(validation: &ValidationConfig, retry: &RetryConfig) -> Result<Self, ConfigError> {
        Ok(Self::new(
            validation.module_min_quality_score,
            retry.module_max_retries()?,
        ))
    }

    #[must_use]
    pub const fn max_retries(&self) -> u32 {
        self.max_retries
    }

    #[must_use]
    pub const fn min_quality_score(&self) -> f64 {
        self.min_quality_score
    }

    /// Score `content` for `module`. `attempt` is 1-based.
    ///
    /// A retry is requested while the attempt is within the retry budget, so
    /// at most `max_retries + 1` attempts are made.
    #[must_use]
    pub fn validate(&self, module: ModuleKind, content: &str, attempt: u32) -> ModuleValidationResult {
        let rubric = rubric(module);
        let lowered = content.to_lowercase();
        let mut errors = Vec::new();
        let mut warnings = Vec::new();
        let mut metrics = ModuleMetrics::default();
        let mut score = 0.0;

        metrics.sections_found = CRITICAL_SECTIONS
            .iter()
            .filter(|s| lowered.contains(&s.to_lowercase()))
            .count();
        score += pro_rated(SECTION_POINTS, metrics.sections_found, CRITICAL_SECTIONS.len());
        if metrics.sections_found == 0 {
            errors.push("Отсутствуют критические секции".to_string());
        }

        if rubric.table.is_match(content) {
            metrics.table_matched = true;
            score += TABLE_POINTS;
        } else if ANY_PIPE_TABLE.is_match(content) || NUMBERED_LIST.is_match(content) {
            score += TABLE_FALLBACK_POINTS;
            warnings.push("Структура таблицы не полностью соответствует шаблону".to_string());
        } else {
            warnings.push("Таблица не обнаружена".to_string());
        }

        metrics.entities_count =
            BRACKETED_ID.find_iter(content).count() + ALTERNATIVE_ID.find_iter(content).count();
        if metrics.entities_count >= MIN_ENTITIES {
            #[allow(clippy::cast_precision_loss)]
            let points = (10 + 3 * metrics.entities_count).min(ENTITY_MAX_POINTS) as f64;
            score += points;
        } else {
            score += ENTITY_FLOOR_POINTS;
            warnings.push(format!(
                "Найдено {} сущностей (рекомендуется больше)",
                metrics.entities_count
            ));
        }

        metrics.headers_found = rubric
            .headers
            .iter()
            .filter(|h| lowered.contains(&h.to_lowercase()))
            .count();
        score += pro_rated(HEADER_POINTS, metrics.headers_found, rubric.headers.len());

        if METADATA_MARKERS.iter().any(|m| content.contains(m)) {
            score += META_POINTS;
        } else {
            score += META_PARTIAL_POINTS;
            warnings.push("Мета-информация неполная".to_string());
        }

        let quality_score = f64::clamp(score, 0.0, 100.0);
        let is_valid = quality_score >= self.min_quality_score;
        let retry_needed = !is_valid && attempt <= self.max_retries;

        tracing::debug!(
            module = %module,
            attempt,
            score = quality_score,
            is_valid,
            retry_needed,
            "module validated"
        );

        ModuleValidationResult {
            module,
            attempt,
            is_valid,
            quality_score,
            errors,
            warnings,
            metrics,
            retry_needed,
        }
    }
}

#[allow(clippy::cast_precision_loss)]
fn pro_rated(points: f64, found: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    points * found as f64 / total as f64
}
