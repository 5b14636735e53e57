//! Corrective instructions fed back to the generator on retry.
//!
//! These texts are the only channel for steering the upstream model, so they
//! name the concrete defects and restate the expected shape.

use std::fmt::Write as _;

use verdict_core::enums::{AnalysisMode, IssueType, ModuleKind, Severity};

use crate::final_report::ValidationIssue;
use crate::module::ModuleValidationResult;
use crate::parser::{MARKER_METRICS_END, MARKER_METRICS_START, SECTION_PATTERNS};

const MAX_FIX_BULLETS: usize = 15;

fn table_example(module: ModuleKind) -> &'static str {
    match module {
        ModuleKind::Themes => {
            "   ThemeID | Тема/Вопрос | Категория | Mentions | Norm_Mentions | Topic_Score | Приоритет\n   \
             [ID]    | Название    | Категория | Число    | 0.0-1.0       | Число       | Высокий/Средний/Низкий\n"
        }
        ModuleKind::Emotions => {
            "   EmotionID | Эмоциональный триггер | Эмоция | Mentions | Norm_Mentions | Интенсивность | Приоритет\n   \
             [ID]      | Описание              | Тип    | Число    | 0.0-1.0       | Число         | Высокий/Средний/Низкий\n"
        }
        ModuleKind::Personas => {
            "   PersonaID | Имя Персоны | Тип | Segment_Size | Норм.Размер | ИВС   | Приоритет\n   \
             [ID]      | Название    | Тип | Число        | 0.0-1.0     | Число | Высокий/Средний/Низкий\n"
        }
        ModuleKind::RisksOpportunities => {
            "   ID   | Тип               | Название Кластера | Категория | ИУВ   | Приоритет\n   \
             [ID] | Риск/Возможность  | Описание          | Категория | Число | Высокий/Средний/Низкий\n"
        }
    }
}

/// Instructions prepended to the original module prompt on retry.
#[must_use]
pub fn module_retry_instructions(result: &ModuleValidationResult, min_quality_score: f64) -> String {
    let module = result.module;
    let mut out = String::new();

    let _ = writeln!(out, "ТРЕБУЕТСЯ УЛУЧШЕНИЕ КАЧЕСТВА АНАЛИЗА\n");
    let _ = writeln!(out, "Модуль: {} (ID: {module})", module.title());
    let _ = writeln!(out, "Текущее качество: {:.0}/100", result.quality_score);
    let _ = writeln!(out, "Требуется: минимум {min_quality_score:.0}\n");

    if !result.errors.is_empty() {
        out.push_str("КРИТИЧЕСКИЕ ПРОБЛЕМЫ:\n");
        for error in &result.errors {
            let _ = writeln!(out, "  - {error}");
        }
        out.push('\n');
    }
    if !result.warnings.is_empty() {
        out.push_str("РЕКОМЕНДАЦИИ ПО УЛУЧШЕНИЮ:\n");
        for warning in &result.warnings {
            let _ = writeln!(out, "  - {warning}");
        }
        out.push('\n');
    }

    out.push_str(
        "ОБЯЗАТЕЛЬНЫЕ ТРЕБОВАНИЯ:\n\n\
         1. СТРУКТУРА ОТВЕТА:\n   \
         - Начать с секции \"МЕТА-ИНФОРМАЦИЯ ДЛЯ АГРЕГАЦИИ\"\n   \
         - Включить \"СВОДНУЮ ТАБЛИЦУ\" с данными\n   \
         - Завершить выводами и статусом\n\n\
         2. ФОРМАТ ТАБЛИЦЫ:\n",
    );
    out.push_str(table_example(module));
    out.push_str(
        "\n3. ФОРМАТ ID:\n   \
         Правильно: [Контент→Образование→theme_001]\n   \
         Допустимо: [theme_001] или theme_001\n   \
         Неправильно: без квадратных скобок или идентификатора\n\n\
         4. КОЛИЧЕСТВО СУЩНОСТЕЙ:\n   \
         Минимум: 1\n   \
         Рекомендуется: 5-10 для полноценного анализа\n\n\
         ПОВТОРИТЕ АНАЛИЗ С УЧЁТОМ ЭТИХ ТРЕБОВАНИЙ!\n",
    );
    out
}

/// Canonical layout restated in every synthesis retry prompt.
const REQUIRED_LAYOUT: [&str; 9] = [
    "### VIDEO_ANALYSIS_REPORT_START ###",
    MARKER_METRICS_START,
    "### СТРАТЕГИЧЕСКИЕ МЕТА-ДАННЫЕ ###",
    "### МЕТАДАННЫЕ ВИДЕО ###",
    "### АНАЛИЗ КОММЕНТАРИЕВ ###",
    "### КРОСС-МОДУЛЬНЫЕ СТРАТЕГИЧЕСКИЕ ИНСАЙТЫ ###",
    "### ДАННЫЕ ДЛЯ АГРЕГАЦИИ ### (внутри ```json ...```)",
    MARKER_METRICS_END,
    "### VIDEO_ANALYSIS_REPORT_END ###",
];

fn detail<'a>(issue: &'a ValidationIssue, key: &str) -> Option<&'a str> {
    issue.details.get(key).and_then(serde_json::Value::as_str)
}

/// Prompt appended to the synthesis prompt when the final report must be
/// regenerated. Missing markers and sections are listed in canonical order,
/// followed by the other MEDIUM/HIGH defects.
#[must_use]
pub fn synthesis_retry_prompt(issues: &[ValidationIssue], mode: AnalysisMode) -> String {
    let missing_markers: Vec<&str> = issues
        .iter()
        .filter(|i| i.issue_type == IssueType::MissingMarker)
        .filter_map(|i| detail(i, "marker"))
        .collect();
    let missing_sections: Vec<&str> = issues
        .iter()
        .filter(|i| i.issue_type == IssueType::MissingSection)
        .filter_map(|i| detail(i, "section"))
        .collect();

    let mut bullets = Vec::new();
    if !missing_markers.is_empty() {
        bullets.push(format!(
            "- Добавь отсутствующие маркеры: {}",
            missing_markers.join(", ")
        ));
    }
    if !missing_sections.is_empty() {
        bullets.push(format!(
            "- Добавь отсутствующие разделы: {}",
            missing_sections.join(", ")
        ));
    }
    for issue in issues {
        let structural = matches!(
            issue.issue_type,
            IssueType::MissingMarker | IssueType::MissingSection
        );
        if issue.severity >= Severity::Medium && !structural {
            bullets.push(format!("- Исправь: {}", issue.message));
        }
    }
    if mode == AnalysisMode::A {
        bullets.push(format!(
            "- Для режима А обязательно добавь раздел '### {SECTION_PATTERNS} ###' с рабочими/проблемными элементами."
        ));
    }
    bullets.truncate(MAX_FIX_BULLETS);

    format!(
        "Пересобери итоговый отчёт СТРОГО в формате VIDEO_ANALYSIS_REPORT. Режим анализа: {mode}.\n\n\
         Обязательная структура (в таком порядке):\n{}\n\n\
         Требуемые исправления:\n{}\n\n\
         Важно: '### АНАЛИЗ КОММЕНТАРИЕВ ###' пишется с кириллической буквой 'В'. \
         Если данных нет, используй 'Не указано' или 'Нет данных'.",
        REQUIRED_LAYOUT.join("\n"),
        bullets.join("\n"),
    )
}
