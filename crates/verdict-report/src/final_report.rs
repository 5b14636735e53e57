//! Validation of the synthesized final report.
//!
//! One pass parses the report, runs structure, completeness, consistency,
//! index and insight checks, scores the issues, and decides between
//! regeneration and automatic correction.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use verdict_config::ValidationConfig;
use verdict_core::enums::{AnalysisMode, EntityKind, IssueType, Severity, ValidationStatus};

use crate::corrector::{AggregationData, AutoCorrector, Correction};
use crate::extract::{EntityUniverse, ModulesData, Partials, scan_typed_ids};
use crate::formula::{self, CalculatedIndices, IndexComparison};
use crate::parser::{
    self, ParsedReport, REQUIRED_MARKERS, REQUIRED_SECTIONS, SECTION_AGGREGATION,
    SECTION_PATTERNS,
};
use crate::retry_prompt::synthesis_retry_prompt;

const REQUIRED_STRATEGIC_FIELDS: [&str; 4] = [
    "CONTENT_HEALTH_INDEX",
    "AUDIENCE_EVOLUTION_VECTOR",
    "STRATEGIC_STABILITY_INDEX",
    "DATA_QUALITY",
];

const TONE_LABELS: [&str; 3] = ["Положительные", "Нейтральные", "Негативные"];

static TONE_RES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    TONE_LABELS
        .iter()
        .map(|label| {
            Regex::new(&format!(r"(?i){label}\s*:\s*(\d+(?:[.,]\d+)?)\s*%")).expect("valid tone regex")
        })
        .collect()
});

static COMMENT_COUNT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)Комментар(?:ии|иев)\s*:\s*(\d{1,9})").expect("valid comment count regex")
});

static CRITICAL_SIGNALS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)Критические\s+сигналы\s*:\s*(\d+(?:[.,]\d+)?)\s*%")
        .expect("valid critical signals regex")
});

static EMPTY_PLACEHOLDER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[\s*\]").expect("valid placeholder regex"));

static NUMBER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"-?\d+(?:\.\d+)?").expect("valid number regex"));

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// One detected defect.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationIssue {
    #[serde(rename = "type")]
    pub issue_type: IssueType,
    pub severity: Severity,
    pub message: String,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub details: Map<String, Value>,
}

impl ValidationIssue {
    fn new(issue_type: IssueType, severity: Severity, message: impl Into<String>) -> Self {
        Self {
            issue_type,
            severity,
            message: message.into(),
            details: Map::new(),
        }
    }

    fn with_details(mut self, details: Value) -> Self {
        if let Value::Object(map) = details {
            self.details = map;
        }
        self
    }

    /// HIGH issues the corrector can repair: a missing envelope marker or a
    /// missing aggregation section.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        match self.issue_type {
            IssueType::MissingMarker => true,
            IssueType::MissingSection => {
                self.details.get("section").and_then(Value::as_str) == Some(SECTION_AGGREGATION)
            }
            _ => false,
        }
    }
}

/// What the caller knows about the analysed subject.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubjectMeta {
    pub subject_id: Option<String>,
    pub comment_count: Option<u64>,
}

impl SubjectMeta {
    #[must_use]
    pub fn new(subject_id: impl Into<String>) -> Self {
        Self {
            subject_id: Some(subject_id.into()),
            comment_count: None,
        }
    }

    #[must_use]
    pub const fn with_comment_count(mut self, count: u64) -> Self {
        self.comment_count = Some(count);
        self
    }
}

/// Outcome of one validation pass over a final report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalValidationResult {
    pub status: ValidationStatus,
    pub score: u8,
    pub issues: Vec<ValidationIssue>,
    pub mode: AnalysisMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub corrected_report: Option<String>,
    pub retry_needed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_prompt: Option<String>,
    #[serde(rename = "indices_calculated")]
    pub indices: CalculatedIndices,
}

impl FinalValidationResult {
    #[must_use]
    pub fn is_pass(&self) -> bool {
        self.status == ValidationStatus::Pass
    }

    #[must_use]
    pub fn has_high(&self) -> bool {
        self.issues.iter().any(|i| i.severity == Severity::High)
    }

    /// Issues of one type.
    pub fn issues_of(&self, issue_type: IssueType) -> impl Iterator<Item = &ValidationIssue> {
        self.issues.iter().filter(move |i| i.issue_type == issue_type)
    }
}

// ---------------------------------------------------------------------------
// Validator
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FinalReportValidator {
    config: ValidationConfig,
}

impl FinalReportValidator {
    #[must_use]
    pub const fn new(config: ValidationConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub const fn config(&self) -> &ValidationConfig {
        &self.config
    }

    /// Validate `raw` against the report grammar.
    ///
    /// `partials` are the module outputs the report was synthesized from.
    /// Without them no referential check is made and the index formulas see
    /// no module data.
    #[must_use]
    pub fn validate(
        &self,
        raw: &str,
        subject: &SubjectMeta,
        partials: Option<&Partials>,
    ) -> FinalValidationResult {
        let parsed = ParsedReport::parse(raw);
        let mode = parsed.mode();
        let data = partials.map(ModulesData::extract).unwrap_or_default();
        let referenced = scan_typed_ids(&parsed.raw);

        let mut issues = Vec::new();
        check_structure(raw, &parsed, &mut issues);
        check_completeness(&parsed, subject, &mut issues);
        let tone = extract_tone(&parsed.raw);
        self.check_consistency(&parsed, subject, &tone, &mut issues);
        if partials.is_some_and(|p| !p.is_empty()) {
            check_references(&referenced, &data, &mut issues);
        }
        let indices = self.check_indices(&parsed, mode, &data, &tone, &mut issues);
        check_insights(&parsed, mode, &mut issues);

        let score = self.score(&issues);
        let has_high = issues.iter().any(|i| i.severity == Severity::High);
        let retry_needed = issues
            .iter()
            .any(|i| i.severity == Severity::High && !i.is_recoverable());

        let correctable = issues.iter().any(|i| {
            i.is_recoverable() || i.issue_type == IssueType::CyrillicVeTypo
        });
        let corrected_report = (!retry_needed && correctable)
            .then(|| {
                let subject_id = subject.subject_id.as_deref().unwrap_or("unknown");
                AutoCorrector::new(self.config.max_referenced_ids_per_kind).correct(
                    raw,
                    &AggregationData {
                        subject_id,
                        mode,
                        chi: indices.chi.best(),
                        ssi: indices.ssi.best(),
                        ids: &referenced,
                    },
                )
            })
            .filter(Correction::applied)
            .map(|c| c.text);

        let retry_prompt = retry_needed.then(|| synthesis_retry_prompt(&issues, mode));

        let status = if !has_high && !retry_needed && score >= self.config.pass_threshold {
            ValidationStatus::Pass
        } else {
            ValidationStatus::Fail
        };

        tracing::debug!(
            subject_id = subject.subject_id.as_deref().unwrap_or_default(),
            %mode,
            score,
            %status,
            issues = issues.len(),
            retry_needed,
            corrected = corrected_report.is_some(),
            "final report validated"
        );

        FinalValidationResult {
            status,
            score,
            issues,
            mode,
            corrected_report,
            retry_needed,
            retry_prompt,
            indices,
        }
    }

    fn penalty(&self, severity: Severity) -> i32 {
        i32::from(match severity {
            Severity::Low => self.config.penalty_low,
            Severity::Medium => self.config.penalty_medium,
            Severity::High => self.config.penalty_high,
        })
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn score(&self, issues: &[ValidationIssue]) -> u8 {
        let penalties: i32 = issues.iter().map(|i| self.penalty(i.severity)).sum();
        (100 - penalties).clamp(0, 100) as u8
    }

    fn check_consistency(
        &self,
        parsed: &ParsedReport,
        subject: &SubjectMeta,
        tone: &BTreeMap<&'static str, f64>,
        issues: &mut Vec<ValidationIssue>,
    ) {
        if tone.len() == TONE_LABELS.len() {
            let sum: f64 = tone.values().sum();
            if (sum - 100.0).abs() > self.config.tone_sum_tolerance {
                issues.push(
                    ValidationIssue::new(
                        IssueType::ToneSumError,
                        Severity::Medium,
                        format!("Сумма тональностей должна быть около 100% (сейчас: {sum:.1}%)"),
                    )
                    .with_details(json!({ "tone": tone, "sum": sum })),
                );
            }
        }

        let reported = COMMENT_COUNT_RE
            .captures(&parsed.raw)
            .and_then(|c| c.get(1))
            .and_then(|m| m.as_str().parse::<u64>().ok());
        if let (Some(expected), Some(reported)) = (subject.comment_count.filter(|c| *c > 0), reported) {
            #[allow(clippy::cast_precision_loss)]
            let deviation = reported.abs_diff(expected) as f64 / expected as f64;
            if deviation > self.config.comment_count_tolerance {
                issues.push(
                    ValidationIssue::new(
                        IssueType::CommentCountMismatch,
                        Severity::Low,
                        "Количество комментариев в отчёте существенно отличается от метаданных",
                    )
                    .with_details(json!({
                        "reported": reported,
                        "expected": expected,
                        "deviation": deviation,
                    })),
                );
            }
        }
    }

    fn check_indices(
        &self,
        parsed: &ParsedReport,
        mode: AnalysisMode,
        data: &ModulesData,
        tone: &BTreeMap<&'static str, f64>,
        issues: &mut Vec<ValidationIssue>,
    ) -> CalculatedIndices {
        let critical = CRITICAL_SIGNALS_RE
            .captures(&parsed.raw)
            .and_then(|c| c.get(1))
            .and_then(|m| parse_decimal(m.as_str()));
        let negative = tone.get("Негативные").copied();

        let indices = CalculatedIndices {
            chi: IndexComparison {
                reported: meta_number(parsed, "CONTENT_HEALTH_INDEX"),
                calculated: formula::expected_chi(mode, data, critical, negative),
            },
            ssi: IndexComparison {
                reported: meta_number(parsed, "STRATEGIC_STABILITY_INDEX"),
                calculated: formula::expected_ssi(data),
            },
        };

        let checks = [
            (
                indices.chi,
                self.config.chi_tolerance,
                IssueType::ContentHealthMismatch,
                "CONTENT_HEALTH_INDEX",
            ),
            (
                indices.ssi,
                self.config.ssi_tolerance,
                IssueType::StrategicStabilityMismatch,
                "STRATEGIC_STABILITY_INDEX",
            ),
        ];
        for (cmp, tolerance, issue_type, field) in checks {
            let (Some(deviation), Some(reported), Some(calculated)) =
                (cmp.deviation(), cmp.reported, cmp.calculated)
            else {
                continue;
            };
            if deviation > tolerance {
                issues.push(
                    ValidationIssue::new(
                        issue_type,
                        Severity::Medium,
                        format!(
                            "{field} не соответствует формуле (указано: {reported:.2}, расчёт: {calculated:.2}, \
                             отклонение: {deviation:.2}, допустимо: ±{tolerance})"
                        ),
                    )
                    .with_details(json!({
                        "reported": reported,
                        "calculated": calculated,
                        "deviation": deviation,
                    })),
                );
            }
        }

        if let Some(vector) = parsed
            .strategic_meta
            .get("AUDIENCE_EVOLUTION_VECTOR")
            .filter(|v| !v.is_empty())
        {
            if !vector.contains('→') && !vector.contains("->") {
                issues.push(
                    ValidationIssue::new(
                        IssueType::AudienceVectorFormatError,
                        Severity::Medium,
                        "AUDIENCE_EVOLUTION_VECTOR должен содержать символ '→'",
                    )
                    .with_details(json!({ "value": vector })),
                );
            }
        }

        indices
    }
}

// ---------------------------------------------------------------------------
// Checks
// ---------------------------------------------------------------------------

fn check_structure(raw: &str, parsed: &ParsedReport, issues: &mut Vec<ValidationIssue>) {
    for marker in REQUIRED_MARKERS {
        if !parsed.has_marker(marker) {
            issues.push(
                ValidationIssue::new(
                    IssueType::MissingMarker,
                    Severity::High,
                    format!("Отсутствует обязательный маркер: {marker}"),
                )
                .with_details(json!({ "marker": marker })),
            );
        }
    }

    for section in REQUIRED_SECTIONS {
        if !parsed.has_section(section) {
            issues.push(
                ValidationIssue::new(
                    IssueType::MissingSection,
                    Severity::High,
                    format!("Отсутствует обязательный раздел: {section}"),
                )
                .with_details(json!({ "section": section })),
            );
        }
    }

    if parser::has_cyrillic_ve_typo(raw) {
        issues.push(ValidationIssue::new(
            IssueType::CyrillicVeTypo,
            Severity::Low,
            "В заголовке 'АНАЛИЗ КОММЕНТАРИЕВ' использована латинская 'B' вместо 'В'",
        ));
    }

    let offsets: Vec<usize> = REQUIRED_SECTIONS
        .iter()
        .filter_map(|s| parsed.section(s).map(|sec| sec.offset))
        .collect();
    if offsets.windows(2).any(|w| w[0] > w[1]) {
        issues.push(
            ValidationIssue::new(
                IssueType::SectionOrderError,
                Severity::Medium,
                "Нарушен порядок обязательных разделов",
            )
            .with_details(json!({ "expected": REQUIRED_SECTIONS })),
        );
    }
}

fn check_completeness(parsed: &ParsedReport, subject: &SubjectMeta, issues: &mut Vec<ValidationIssue>) {
    for field in REQUIRED_STRATEGIC_FIELDS {
        let populated = parsed
            .strategic_meta
            .get(field)
            .is_some_and(|v| !v.trim().is_empty());
        if !populated {
            issues.push(
                ValidationIssue::new(
                    IssueType::MissingField,
                    Severity::Medium,
                    format!("В 'СТРАТЕГИЧЕСКИЕ МЕТА-ДАННЫЕ' отсутствует поле: {field}"),
                )
                .with_details(json!({ "field": field, "section": "strategic_meta" })),
            );
        }
    }

    if let Some(expected) = subject.subject_id.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        let reported = ["ID", "VIDEO_ID", "SUBJECT_ID"]
            .iter()
            .find_map(|k| parsed.subject_meta.get(*k))
            .map(|v| v.trim())
            .filter(|v| !v.is_empty());
        if let Some(reported) = reported {
            if reported != expected {
                issues.push(
                    ValidationIssue::new(
                        IssueType::SubjectIdMismatch,
                        Severity::Medium,
                        "Идентификатор в отчёте не совпадает с исходным",
                    )
                    .with_details(json!({ "expected": expected, "reported": reported })),
                );
            }
        }
    }

    if EMPTY_PLACEHOLDER_RE.is_match(&parsed.raw) {
        issues.push(ValidationIssue::new(
            IssueType::EmptyPlaceholder,
            Severity::Low,
            "В отчёте есть пустые плейсхолдеры '[]', требуется 'Не указано'/'Нет данных'",
        ));
    }
}

fn check_references(
    referenced: &EntityUniverse,
    data: &ModulesData,
    issues: &mut Vec<ValidationIssue>,
) {
    let missing = referenced.missing_from(&data.universe);
    if missing.is_empty() {
        return;
    }
    let details: Map<String, Value> = missing
        .into_iter()
        .map(|(kind, ids)| (kind.id_label().to_string(), json!(ids)))
        .collect();
    issues.push(
        ValidationIssue::new(
            IssueType::InvalidReferences,
            Severity::Medium,
            "В отчёте есть ссылки на ID, отсутствующие во входных данных модулей",
        )
        .with_details(json!({ "missing": details })),
    );
}

fn check_insights(parsed: &ParsedReport, mode: AnalysisMode, issues: &mut Vec<ValidationIssue>) {
    let (min, max) = mode.insight_range();
    let count = parsed.insights.len();
    if count < min {
        issues.push(
            ValidationIssue::new(
                IssueType::InsightsTooFew,
                Severity::Medium,
                format!("Недостаточно инсайтов для режима {mode}: нужно минимум {min}"),
            )
            .with_details(json!({ "count": count, "required_min": min })),
        );
    }
    if count > max {
        issues.push(
            ValidationIssue::new(
                IssueType::InsightsTooMany,
                Severity::Low,
                format!("Слишком много инсайтов для режима {mode}: рекомендуется не более {max}"),
            )
            .with_details(json!({ "count": count, "recommended_max": max })),
        );
    }

    for (idx, insight) in parsed.insights.iter().enumerate() {
        let ids = scan_typed_ids(insight);
        let mut missing = Vec::new();
        for kind in [EntityKind::Theme, EntityKind::Emotion, EntityKind::Persona] {
            if ids.count(kind) == 0 {
                missing.push(kind.id_label());
            }
        }
        if ids.count(EntityKind::Risk) == 0 && ids.count(EntityKind::Opportunity) == 0 {
            missing.push("RiskID/OpportunityID");
        }
        if missing.is_empty() {
            continue;
        }
        let severity = if missing.len() <= 1 {
            Severity::Low
        } else {
            Severity::Medium
        };
        let number = idx + 1;
        issues.push(
            ValidationIssue::new(
                IssueType::InsightStructureError,
                severity,
                format!(
                    "ИНСАЙТ {number} не содержит обязательные связи: {}",
                    missing.join(", ")
                ),
            )
            .with_details(json!({ "insight": number, "missing": missing })),
        );
    }

    if mode == AnalysisMode::A && !parsed.has_section(SECTION_PATTERNS) {
        issues.push(ValidationIssue::new(
            IssueType::MissingPatternSection,
            Severity::Medium,
            format!("Для режима А обязателен раздел '{SECTION_PATTERNS}'"),
        ));
    }
}

// ---------------------------------------------------------------------------
// Value extraction
// ---------------------------------------------------------------------------

fn parse_decimal(raw: &str) -> Option<f64> {
    raw.replace(',', ".").parse().ok()
}

/// First number in a strategic metadata value (`72`, `72,5 / 100`, `~0.8`).
fn meta_number(parsed: &ParsedReport, key: &str) -> Option<f64> {
    let value = parsed.strategic_meta.get(key)?.replace('%', "").replace(',', ".");
    NUMBER_RE.find(&value)?.as_str().parse().ok()
}

fn extract_tone(raw: &str) -> BTreeMap<&'static str, f64> {
    TONE_LABELS
        .iter()
        .zip(TONE_RES.iter())
        .filter_map(|(label, re)| {
            let value = re.captures(raw)?.get(1)?.as_str();
            Some((*label, parse_decimal(value)?))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn meta_number_takes_first_numeric_token() {
        let parsed = ParsedReport::parse(
            "### СТРАТЕГИЧЕСКИЕ МЕТА-ДАННЫЕ ###\nCONTENT_HEALTH_INDEX: ~72,5 / 100\nSTRATEGIC_STABILITY_INDEX: нет\n",
        );
        assert_eq!(meta_number(&parsed, "CONTENT_HEALTH_INDEX"), Some(72.5));
        assert_eq!(meta_number(&parsed, "STRATEGIC_STABILITY_INDEX"), None);
        assert_eq!(meta_number(&parsed, "DATA_QUALITY"), None);
    }

    #[test]
    fn tone_accepts_decimal_comma() {
        let tone = extract_tone("Положительные: 60,5%\nнейтральные: 20 %\nНегативные:19.5%");
        assert_eq!(tone.len(), 3);
        assert_eq!(tone.get("Положительные"), Some(&60.5));
        assert_eq!(tone.get("Нейтральные"), Some(&20.0));
    }

    #[test]
    fn missing_aggregation_section_is_recoverable() {
        let issue = ValidationIssue::new(IssueType::MissingSection, Severity::High, "x")
            .with_details(json!({ "section": SECTION_AGGREGATION }));
        assert!(issue.is_recoverable());
        let issue = ValidationIssue::new(IssueType::MissingSection, Severity::High, "x")
            .with_details(json!({ "section": "МЕТАДАННЫЕ ВИДЕО" }));
        assert!(!issue.is_recoverable());
    }

    #[test]
    fn issue_serializes_type_and_omits_empty_details() {
        let issue = ValidationIssue::new(IssueType::EmptyPlaceholder, Severity::Low, "msg");
        let value = serde_json::to_value(&issue).expect("serialize");
        assert_eq!(
            value,
            json!({ "type": "EMPTY_PLACEHOLDER", "severity": "LOW", "message": "msg" })
        );
    }
}
