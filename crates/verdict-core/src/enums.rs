//! Module kinds, entity kinds, severities, issue types, modes, and statuses.
//!
//! Status enums use `snake_case` serialization. Report-facing enums
//! (severities, issue types, modes, validation status) serialize the way they
//! appear in validation logs: `SCREAMING_SNAKE_CASE` or single letters.
//! `SetStatus` provides `allowed_next_states()` to enforce valid transitions at
//! the application layer.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::errors::CoreError;

// ---------------------------------------------------------------------------
// ModuleKind
// ---------------------------------------------------------------------------

/// One of the four analysis modules whose sub-reports feed the final synthesis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
pub enum ModuleKind {
    #[serde(rename = "10-1")]
    Themes,
    #[serde(rename = "10-2")]
    Emotions,
    #[serde(rename = "10-3")]
    Personas,
    #[serde(rename = "10-4")]
    RisksOpportunities,
}

impl ModuleKind {
    /// All modules in generation order.
    pub const ALL: [Self; 4] = [
        Self::Themes,
        Self::Emotions,
        Self::Personas,
        Self::RisksOpportunities,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Themes => "10-1",
            Self::Emotions => "10-2",
            Self::Personas => "10-3",
            Self::RisksOpportunities => "10-4",
        }
    }

    /// Human-facing module title as used in generation prompts.
    #[must_use]
    pub const fn title(self) -> &'static str {
        match self {
            Self::Themes => "Контент-Детектив",
            Self::Emotions => "Эмоциональный Кардиограф",
            Self::Personas => "Архитектор Персон",
            Self::RisksOpportunities => "Системный Диагност",
        }
    }
}

impl fmt::Display for ModuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModuleKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "10-1" | "themes" => Ok(Self::Themes),
            "10-2" | "emotions" => Ok(Self::Emotions),
            "10-3" | "personas" => Ok(Self::Personas),
            "10-4" | "risks" | "risks_opportunities" => Ok(Self::RisksOpportunities),
            other => Err(CoreError::UnknownValue {
                kind: "module",
                value: other.to_string(),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// EntityKind
// ---------------------------------------------------------------------------

/// Kind of a typed entity extracted from module tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Theme,
    Emotion,
    Persona,
    Risk,
    Opportunity,
}

impl EntityKind {
    pub const ALL: [Self; 5] = [
        Self::Theme,
        Self::Emotion,
        Self::Persona,
        Self::Risk,
        Self::Opportunity,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Theme => "theme",
            Self::Emotion => "emotion",
            Self::Persona => "persona",
            Self::Risk => "risk",
            Self::Opportunity => "opportunity",
        }
    }

    /// The `KindID` label used for typed references in report text.
    #[must_use]
    pub const fn id_label(self) -> &'static str {
        match self {
            Self::Theme => "ThemeID",
            Self::Emotion => "EmotionID",
            Self::Persona => "PersonaID",
            Self::Risk => "RiskID",
            Self::Opportunity => "OpportunityID",
        }
    }

    /// Resolve a `KindID` label (case-insensitive).
    #[must_use]
    pub fn from_id_label(label: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|k| k.id_label().eq_ignore_ascii_case(label))
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Severity
// ---------------------------------------------------------------------------

/// Severity of a validation issue. Ordered `Low < Medium < High`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl Severity {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Low => "LOW",
            Self::Medium => "MEDIUM",
            Self::High => "HIGH",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// IssueType
// ---------------------------------------------------------------------------

/// Enumerated defect kinds raised by the final report validator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IssueType {
    MissingMarker,
    MissingSection,
    SectionOrderError,
    CyrillicVeTypo,
    MissingField,
    SubjectIdMismatch,
    EmptyPlaceholder,
    ToneSumError,
    CommentCountMismatch,
    InvalidReferences,
    ContentHealthMismatch,
    StrategicStabilityMismatch,
    AudienceVectorFormatError,
    InsightsTooFew,
    InsightsTooMany,
    InsightStructureError,
    MissingPatternSection,
}

impl IssueType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::MissingMarker => "MISSING_MARKER",
            Self::MissingSection => "MISSING_SECTION",
            Self::SectionOrderError => "SECTION_ORDER_ERROR",
            Self::CyrillicVeTypo => "CYRILLIC_VE_TYPO",
            Self::MissingField => "MISSING_FIELD",
            Self::SubjectIdMismatch => "SUBJECT_ID_MISMATCH",
            Self::EmptyPlaceholder => "EMPTY_PLACEHOLDER",
            Self::ToneSumError => "TONE_SUM_ERROR",
            Self::CommentCountMismatch => "COMMENT_COUNT_MISMATCH",
            Self::InvalidReferences => "INVALID_REFERENCES",
            Self::ContentHealthMismatch => "CONTENT_HEALTH_MISMATCH",
            Self::StrategicStabilityMismatch => "STRATEGIC_STABILITY_MISMATCH",
            Self::AudienceVectorFormatError => "AUDIENCE_VECTOR_FORMAT_ERROR",
            Self::InsightsTooFew => "INSIGHTS_TOO_FEW",
            Self::InsightsTooMany => "INSIGHTS_TOO_MANY",
            Self::InsightStructureError => "INSIGHT_STRUCTURE_ERROR",
            Self::MissingPatternSection => "MISSING_PATTERN_SECTION",
        }
    }
}

impl fmt::Display for IssueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// AnalysisMode
// ---------------------------------------------------------------------------

/// Adaptive strictness mode declared by the synthesized report.
///
/// Controls the top-N width of the index formulas and the required number of
/// insights. Reports that do not declare a mode are treated as `C`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, JsonSchema)]
pub enum AnalysisMode {
    A,
    B,
    #[default]
    C,
}

impl AnalysisMode {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::A => "A",
            Self::B => "B",
            Self::C => "C",
        }
    }

    /// Number of top entities averaged by the CHI formula. `None` for mode C,
    /// which uses the simplified formula.
    #[must_use]
    pub const fn top_n(self) -> Option<usize> {
        match self {
            Self::A => Some(3),
            Self::B => Some(2),
            Self::C => None,
        }
    }

    /// Inclusive range of insight blocks a report in this mode must carry.
    #[must_use]
    pub const fn insight_range(self) -> (usize, usize) {
        match self {
            Self::A => (3, 5),
            Self::B => (2, 3),
            Self::C => (1, 2),
        }
    }

    /// Parse a declared mode letter. Accepts Latin and Cyrillic look-alikes
    /// (`А`, `Б`, `В`); anything unrecognised falls back to `C`.
    #[must_use]
    pub fn from_letter(raw: &str) -> Self {
        match raw.trim().trim_matches(['[', ']', '*', '"']).to_uppercase().as_str() {
            "A" | "А" => Self::A,
            "B" | "Б" => Self::B,
            _ => Self::C,
        }
    }
}

impl fmt::Display for AnalysisMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// ValidationStatus
// ---------------------------------------------------------------------------

/// Verdict of the final report validator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ValidationStatus {
    Pass,
    Fail,
}

impl ValidationStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pass => "PASS",
            Self::Fail => "FAIL",
        }
    }
}

impl fmt::Display for ValidationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// ValidatorKind
// ---------------------------------------------------------------------------

/// Which validator produced an event log record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ValidatorKind {
    Module,
    FinalSynthesis,
}

impl ValidatorKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Module => "module",
            Self::FinalSynthesis => "final_synthesis",
        }
    }
}

impl fmt::Display for ValidatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// RecordOutcome
// ---------------------------------------------------------------------------

/// How a persisted analysis was accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum RecordOutcome {
    /// Final validation passed.
    Accepted,
    /// Retry budget exhausted without reaching the passing score.
    Degraded,
}

impl RecordOutcome {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Accepted => "accepted",
            Self::Degraded => "degraded",
        }
    }
}

impl fmt::Display for RecordOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// SetStatus
// ---------------------------------------------------------------------------

/// Status of an analysis set in the best-of-N lifecycle.
///
/// ```text
/// pending → evaluated → pending (new record arrives)
///         → error     → pending (new record arrives)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum SetStatus {
    Pending,
    Evaluated,
    Error,
}

impl SetStatus {
    /// Valid next states from the current state.
    #[must_use]
    pub const fn allowed_next_states(self) -> &'static [Self] {
        match self {
            Self::Pending => &[Self::Evaluated, Self::Error],
            Self::Evaluated | Self::Error => &[Self::Pending],
        }
    }

    /// Check whether transitioning to `next` is allowed.
    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        self.allowed_next_states().contains(&next)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Evaluated => "evaluated",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for SetStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // --- Serde roundtrip tests ---

    macro_rules! test_serde_roundtrip {
        ($name:ident, $ty:ty, $variant:expr, $expected_str:expr) => {
            #[test]
            fn $name() {
                let val = $variant;
                let json = serde_json::to_string(&val).unwrap();
                assert_eq!(json, format!("\"{}\"", $expected_str));
                let recovered: $ty = serde_json::from_str(&json).unwrap();
                assert_eq!(recovered, val);
            }
        };
    }

    test_serde_roundtrip!(module_themes, ModuleKind, ModuleKind::Themes, "10-1");
    test_serde_roundtrip!(
        module_risks,
        ModuleKind,
        ModuleKind::RisksOpportunities,
        "10-4"
    );
    test_serde_roundtrip!(entity_opportunity, EntityKind, EntityKind::Opportunity, "opportunity");
    test_serde_roundtrip!(severity_high, Severity, Severity::High, "HIGH");
    test_serde_roundtrip!(
        issue_tone_sum,
        IssueType,
        IssueType::ToneSumError,
        "TONE_SUM_ERROR"
    );
    test_serde_roundtrip!(
        issue_typo,
        IssueType,
        IssueType::CyrillicVeTypo,
        "CYRILLIC_VE_TYPO"
    );
    test_serde_roundtrip!(mode_a, AnalysisMode, AnalysisMode::A, "A");
    test_serde_roundtrip!(status_pass, ValidationStatus, ValidationStatus::Pass, "PASS");
    test_serde_roundtrip!(
        validator_final,
        ValidatorKind,
        ValidatorKind::FinalSynthesis,
        "final_synthesis"
    );
    test_serde_roundtrip!(outcome_degraded, RecordOutcome, RecordOutcome::Degraded, "degraded");
    test_serde_roundtrip!(set_evaluated, SetStatus, SetStatus::Evaluated, "evaluated");

    // --- as_str agrees with serde ---

    #[test]
    fn issue_type_as_str_matches_serde() {
        let all = [
            IssueType::MissingMarker,
            IssueType::MissingSection,
            IssueType::SectionOrderError,
            IssueType::InvalidReferences,
            IssueType::StrategicStabilityMismatch,
            IssueType::AudienceVectorFormatError,
            IssueType::MissingPatternSection,
        ];
        for issue in all {
            let json = serde_json::to_string(&issue).unwrap();
            assert_eq!(json, format!("\"{}\"", issue.as_str()));
        }
    }

    // --- Parsing ---

    #[test]
    fn module_kind_from_str() {
        assert_eq!("10-3".parse::<ModuleKind>().unwrap(), ModuleKind::Personas);
        assert_eq!("Themes".parse::<ModuleKind>().unwrap(), ModuleKind::Themes);
        assert!("10-5".parse::<ModuleKind>().is_err());
    }

    #[test]
    fn entity_kind_from_id_label() {
        assert_eq!(EntityKind::from_id_label("RiskID"), Some(EntityKind::Risk));
        assert_eq!(EntityKind::from_id_label("themeid"), Some(EntityKind::Theme));
        assert_eq!(EntityKind::from_id_label("ClusterID"), None);
    }

    #[test]
    fn mode_from_letter_accepts_cyrillic() {
        assert_eq!(AnalysisMode::from_letter("A"), AnalysisMode::A);
        assert_eq!(AnalysisMode::from_letter("А"), AnalysisMode::A);
        assert_eq!(AnalysisMode::from_letter(" Б "), AnalysisMode::B);
        assert_eq!(AnalysisMode::from_letter("[b]"), AnalysisMode::B);
        assert_eq!(AnalysisMode::from_letter("В"), AnalysisMode::C);
        assert_eq!(AnalysisMode::from_letter("?"), AnalysisMode::C);
    }

    #[test]
    fn mode_limits() {
        assert_eq!(AnalysisMode::A.top_n(), Some(3));
        assert_eq!(AnalysisMode::B.top_n(), Some(2));
        assert_eq!(AnalysisMode::C.top_n(), None);
        assert_eq!(AnalysisMode::B.insight_range(), (2, 3));
    }

    #[test]
    fn severity_ordering() {
        assert!(Severity::Low < Severity::Medium);
        assert!(Severity::Medium < Severity::High);
    }

    // --- State machine tests ---

    #[test]
    fn set_status_transitions() {
        assert!(SetStatus::Pending.can_transition_to(SetStatus::Evaluated));
        assert!(SetStatus::Pending.can_transition_to(SetStatus::Error));
        assert!(SetStatus::Evaluated.can_transition_to(SetStatus::Pending));
        assert!(SetStatus::Error.can_transition_to(SetStatus::Pending));
        assert!(!SetStatus::Evaluated.can_transition_to(SetStatus::Error));
        assert!(!SetStatus::Pending.can_transition_to(SetStatus::Pending));
    }
}
