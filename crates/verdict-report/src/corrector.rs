//! Deterministic repair of safe, non-semantic report defects.
//!
//! Handles exactly three defect kinds: missing envelope markers, a missing
//! aggregation section, and the Latin `B` typo in the comments heading.
//! Analytical content is never rewritten. Running the corrector on its own
//! output changes nothing.

use serde::Serialize;
use serde_json::json;
use verdict_core::enums::{AnalysisMode, EntityKind};

use crate::extract::EntityUniverse;
use crate::parser::{
    self, MARKER_METRICS_END, MARKER_METRICS_START, MARKER_REPORT_END, MARKER_REPORT_START,
    SECTION_AGGREGATION,
};

/// A repair applied by the corrector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Fix {
    CyrillicVeTypo,
    ReportStart,
    MetricsStart,
    AggregationSection,
    MetricsEnd,
    ReportEnd,
}

/// Result of a correction pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Correction {
    pub text: String,
    pub fixes: Vec<Fix>,
}

impl Correction {
    #[must_use]
    pub fn applied(&self) -> bool {
        !self.fixes.is_empty()
    }
}

/// Data written into a synthesized aggregation block.
#[derive(Debug, Clone, Copy)]
pub struct AggregationData<'a> {
    pub subject_id: &'a str,
    pub mode: AnalysisMode,
    pub chi: Option<f64>,
    pub ssi: Option<f64>,
    pub ids: &'a EntityUniverse,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AutoCorrector {
    max_ids_per_kind: usize,
}

impl Default for AutoCorrector {
    fn default() -> Self {
        Self::new(50)
    }
}

impl AutoCorrector {
    #[must_use]
    pub const fn new(max_ids_per_kind: usize) -> Self {
        Self { max_ids_per_kind }
    }

    #[must_use]
    pub fn correct(&self, raw: &str, data: &AggregationData<'_>) -> Correction {
        let mut fixes = Vec::new();

        let mut text = parser::normalize_typo(raw);
        if text != raw {
            fixes.push(Fix::CyrillicVeTypo);
        }

        if !parser::extract_markers(&text).contains_key(MARKER_REPORT_START) {
            text.insert_str(0, &format!("### {MARKER_REPORT_START} ###\n"));
            fixes.push(Fix::ReportStart);
        }

        let markers = parser::extract_markers(&text);
        if !markers.contains_key(MARKER_METRICS_START) {
            let anchor = markers.get(MARKER_REPORT_START).copied().unwrap_or(0);
            insert_after_line(&mut text, anchor, MARKER_METRICS_START);
            fixes.push(Fix::MetricsStart);
        }

        if !parser::ParsedReport::parse(&text).has_section(SECTION_AGGREGATION) {
            let markers = parser::extract_markers(&text);
            let block = self.aggregation_block(data);
            match markers
                .get(MARKER_METRICS_END)
                .or_else(|| markers.get(MARKER_REPORT_END))
            {
                Some(&anchor) => insert_before_line(&mut text, anchor, &block),
                None => append_line(&mut text, &block),
            }
            fixes.push(Fix::AggregationSection);
        }

        let markers = parser::extract_markers(&text);
        if !markers.contains_key(MARKER_METRICS_END) {
            match markers.get(MARKER_REPORT_END) {
                Some(&anchor) => insert_before_line(&mut text, anchor, MARKER_METRICS_END),
                None => append_line(&mut text, MARKER_METRICS_END),
            }
            fixes.push(Fix::MetricsEnd);
        }

        if !parser::extract_markers(&text).contains_key(MARKER_REPORT_END) {
            append_line(&mut text, &format!("### {MARKER_REPORT_END} ###"));
            fixes.push(Fix::ReportEnd);
        }

        if !fixes.is_empty() {
            tracing::debug!(subject_id = data.subject_id, ?fixes, "report auto-corrected");
        }

        Correction { text, fixes }
    }

    /// Fixed-schema aggregation section. Kinds with no IDs are omitted so the
    /// block never contains an empty `[]`.
    fn aggregation_block(&self, data: &AggregationData<'_>) -> String {
        let mut ids = serde_json::Map::new();
        for kind in EntityKind::ALL {
            let values: Vec<&str> = data.ids.ids(kind).take(self.max_ids_per_kind).collect();
            if !values.is_empty() {
                ids.insert(plural(kind).to_string(), json!(values));
            }
        }
        let payload = json!({
            "subject_id": data.subject_id,
            "mode": data.mode.as_str(),
            "indices": {
                "content_health_index": data.chi,
                "strategic_stability_index": data.ssi,
            },
            "ids": ids,
        });
        let body = serde_json::to_string_pretty(&payload).unwrap_or_else(|_| payload.to_string());
        format!("### {SECTION_AGGREGATION} ###\n```json\n{body}\n```")
    }
}

const fn plural(kind: EntityKind) -> &'static str {
    match kind {
        EntityKind::Theme => "themes",
        EntityKind::Emotion => "emotions",
        EntityKind::Persona => "personas",
        EntityKind::Risk => "risks",
        EntityKind::Opportunity => "opportunities",
    }
}

fn line_start(text: &str, pos: usize) -> usize {
    text[..pos].rfind('\n').map_or(0, |i| i + 1)
}

fn insert_before_line(text: &mut String, pos: usize, line: &str) {
    let at = line_start(text, pos);
    text.insert_str(at, &format!("{line}\n"));
}

fn insert_after_line(text: &mut String, pos: usize, line: &str) {
    match text[pos..].find('\n') {
        Some(i) => text.insert_str(pos + i + 1, &format!("{line}\n")),
        None => {
            text.push('\n');
            text.push_str(line);
            text.push('\n');
        }
    }
}

fn append_line(text: &mut String, line: &str) {
    if !text.is_empty() && !text.ends_with('\n') {
        text.push('\n');
    }
    text.push_str(line);
    text.push('\n');
}
