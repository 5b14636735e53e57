//! Tolerant line-scanning parser for synthesized reports.
//!
//! Recovery rules:
//! - Markers are collected from `### NAME ###` lines and from bare
//!   `VIDEO_ANALYSIS_{REPORT,METRICS}_{START,END}` tokens. The last occurrence
//!   of a marker wins.
//! - A section starts at a `### NAME ###` line or at a markdown heading
//!   (`##`..`######`) whose upper-cased text is one of the recognized
//!   headings. It runs until the next section start. A repeated heading keeps
//!   its first offset and accumulates body lines.
//! - Absence of any construct yields an empty map or list, never an error.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use verdict_core::enums::AnalysisMode;

// ---------------------------------------------------------------------------
// Grammar constants
// ---------------------------------------------------------------------------

pub const MARKER_REPORT_START: &str = "VIDEO_ANALYSIS_REPORT_START";
pub const MARKER_REPORT_END: &str = "VIDEO_ANALYSIS_REPORT_END";
pub const MARKER_METRICS_START: &str = "VIDEO_ANALYSIS_METRICS_START";
pub const MARKER_METRICS_END: &str = "VIDEO_ANALYSIS_METRICS_END";

/// Envelope markers every final report must carry.
pub const REQUIRED_MARKERS: [&str; 4] = [
    MARKER_REPORT_START,
    MARKER_REPORT_END,
    MARKER_METRICS_START,
    MARKER_METRICS_END,
];

pub const SECTION_STRATEGIC_META: &str = "СТРАТЕГИЧЕСКИЕ МЕТА-ДАННЫЕ";
pub const SECTION_SUBJECT_META: &str = "МЕТАДАННЫЕ ВИДЕО";
pub const SECTION_COMMENTS: &str = "АНАЛИЗ КОММЕНТАРИЕВ";
pub const SECTION_INSIGHTS: &str = "КРОСС-МОДУЛЬНЫЕ СТРАТЕГИЧЕСКИЕ ИНСАЙТЫ";
pub const SECTION_AGGREGATION: &str = "ДАННЫЕ ДЛЯ АГРЕГАЦИИ";
pub const SECTION_PATTERNS: &str = "ВЫВОДЫ ДЛЯ ПАТТЕРНОГО АНАЛИЗА";

/// Required sections in canonical order.
pub const REQUIRED_SECTIONS: [&str; 5] = [
    SECTION_STRATEGIC_META,
    SECTION_SUBJECT_META,
    SECTION_COMMENTS,
    SECTION_INSIGHTS,
    SECTION_AGGREGATION,
];

/// Headings accepted in markdown form (`## HEADING`).
const RECOGNIZED_HEADINGS: [&str; 9] = [
    SECTION_STRATEGIC_META,
    SECTION_SUBJECT_META,
    SECTION_COMMENTS,
    SECTION_INSIGHTS,
    SECTION_AGGREGATION,
    SECTION_PATTERNS,
    "АЛГОРИТМИЧЕСКИЕ ДАННЫЕ",
    "ПРОИЗВОДСТВЕННЫЕ ДАННЫЕ",
    "КОМПАРАТИВНЫЙ АНАЛИЗ",
];

/// Heading with a Latin `B` in place of the Cyrillic `В`.
const TYPO_HEADING: &str = "АНАЛИЗ КОММЕНТАРИЕB";
const TYPO_WORD: &str = "КОММЕНТАРИЕB";
const TYPO_FIXED: &str = "КОММЕНТАРИЕВ";

static MARKER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"###\s*([A-ZА-Я_\-]+)\s*###").expect("valid marker regex"));

static BARE_MARKER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(VIDEO_ANALYSIS_(?:REPORT|METRICS)_(?:START|END))\b")
        .expect("valid bare marker regex")
});

static SECTION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"###\s*([A-ZА-Я_\- ]{6,}?)\s*###").expect("valid section regex"));

static HEADING_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*#{2,6}\s*(.+?)\s*#*\s*$").expect("valid heading regex"));

static INSIGHT_SPLIT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?im)^\s*(?:\*\*)?\[ИНСАЙТ[\s_\-]*\d+\](?:\*\*)?\s*:?[ \t]*")
        .expect("valid insight regex")
});

static MODE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)Режим\s*([АAБBВV])").expect("valid mode regex"));

// ---------------------------------------------------------------------------
// Typo normalisation
// ---------------------------------------------------------------------------

/// Whether the comments heading was written with a Latin `B`.
#[must_use]
pub fn has_cyrillic_ve_typo(raw: &str) -> bool {
    raw.contains(TYPO_HEADING)
}

/// Replace the Latin `B` in `КОММЕНТАРИЕB` with the Cyrillic letter.
#[must_use]
pub fn normalize_typo(raw: &str) -> String {
    raw.replace(TYPO_WORD, TYPO_FIXED)
}

// ---------------------------------------------------------------------------
// ParsedReport
// ---------------------------------------------------------------------------

/// A section of the report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Section {
    /// Canonical (trimmed, upper-cased for markdown headings) name.
    pub name: String,
    /// Byte offset of the heading line in the normalized text.
    pub offset: usize,
    /// Trimmed body text up to the next section start.
    pub body: String,
}

/// Best-effort structured view of a synthesized report.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ParsedReport {
    /// Input after typo normalisation.
    pub raw: String,
    /// Marker name to byte offset.
    pub markers: BTreeMap<String, usize>,
    /// Sections in order of first appearance.
    pub sections: Vec<Section>,
    pub strategic_meta: BTreeMap<String, String>,
    pub subject_meta: BTreeMap<String, String>,
    pub comments_analysis: BTreeMap<String, String>,
    /// Insight bodies with their index markers stripped.
    pub insights: Vec<String>,
}

impl ParsedReport {
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        let raw = normalize_typo(raw);
        let markers = extract_markers(&raw);
        let sections = split_sections(&raw);

        let block = |name: &str| {
            sections
                .iter()
                .find(|s| s.name == name)
                .map(|s| parse_kv_block(&s.body))
                .unwrap_or_default()
        };
        let strategic_meta = block(SECTION_STRATEGIC_META);
        let subject_meta = block(SECTION_SUBJECT_META);
        let comments_analysis = block(SECTION_COMMENTS);

        let insights = sections
            .iter()
            .find(|s| s.name == SECTION_INSIGHTS)
            .map(|s| split_insights(&s.body))
            .unwrap_or_default();

        Self {
            raw,
            markers,
            sections,
            strategic_meta,
            subject_meta,
            comments_analysis,
            insights,
        }
    }

    #[must_use]
    pub fn section(&self, name: &str) -> Option<&Section> {
        self.sections.iter().find(|s| s.name == name)
    }

    #[must_use]
    pub fn has_section(&self, name: &str) -> bool {
        self.section(name).is_some()
    }

    #[must_use]
    pub fn has_marker(&self, name: &str) -> bool {
        self.markers.contains_key(name)
    }

    /// Detect the declared analysis mode.
    ///
    /// Looks at `ANALYSIS_MODE`, `РЕЖИМ` and `MODE` in the strategic metadata
    /// first, then for `Режим X` anywhere in the text. Defaults to `C`.
    /// A metadata value may be a bare letter or spelled out as `Режим X`.
    #[must_use]
    pub fn mode(&self) -> AnalysisMode {
        for key in ["ANALYSIS_MODE", "РЕЖИМ", "MODE"] {
            if let Some(value) = self.strategic_meta.get(key) {
                let letter = mode_letter(value)
                    .unwrap_or_else(|| value.split_whitespace().next().unwrap_or_default());
                return AnalysisMode::from_letter(letter);
            }
        }
        mode_letter(&self.raw).map_or(AnalysisMode::C, AnalysisMode::from_letter)
    }
}

/// Collect envelope and `### NAME ###` markers with their byte offsets.
#[must_use]
pub fn extract_markers(text: &str) -> BTreeMap<String, usize> {
    let mut markers = BTreeMap::new();
    for caps in MARKER_RE.captures_iter(text) {
        if let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) {
            markers.insert(name.as_str().trim().to_string(), whole.start());
        }
    }
    for m in BARE_MARKER_RE.find_iter(text) {
        markers.insert(m.as_str().to_string(), m.start());
    }
    markers
}

fn section_heading(line: &str) -> Option<String> {
    if let Some(name) = SECTION_RE.captures(line).and_then(|c| c.get(1)) {
        return Some(name.as_str().trim().to_string());
    }
    let heading = HEADING_RE.captures(line)?.get(1)?.as_str().trim().to_uppercase();
    RECOGNIZED_HEADINGS
        .contains(&heading.as_str())
        .then_some(heading)
}

fn split_sections(text: &str) -> Vec<Section> {
    let mut sections: Vec<(String, usize, Vec<&str>)> = Vec::new();
    let mut current: Option<usize> = None;
    let mut offset = 0;

    for chunk in text.split_inclusive('\n') {
        let line_start = offset;
        offset += chunk.len();
        let line = chunk.trim_end_matches(['\n', '\r']);

        if let Some(name) = section_heading(line) {
            let idx = if let Some(idx) = sections.iter().position(|(n, _, _)| *n == name) {
                idx
            } else {
                sections.push((name, line_start, Vec::new()));
                sections.len() - 1
            };
            current = Some(idx);
            continue;
        }

        if let Some(idx) = current {
            sections[idx].2.push(line);
        }
    }

    sections
        .into_iter()
        .map(|(name, offset, lines)| Section {
            name,
            offset,
            body: lines.join("\n").trim().to_string(),
        })
        .collect()
}

/// Parse `KEY: value` lines. Keys are upper-cased and stripped of list
/// bullets and emphasis; lines without a colon are skipped.
#[must_use]
pub fn parse_kv_block(block: &str) -> BTreeMap<String, String> {
    let mut out = BTreeMap::new();
    for line in block.lines() {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let key = key
            .trim()
            .trim_matches(|c: char| c == '-' || c == '*' || c == '•' || c.is_whitespace())
            .to_uppercase();
        if key.is_empty() {
            continue;
        }
        let value = value.trim().trim_matches('*').trim().to_string();
        out.insert(key, value);
    }
    out
}

fn mode_letter(text: &str) -> Option<&str> {
    MODE_RE
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
}

fn split_insights(body: &str) -> Vec<String> {
    INSIGHT_SPLIT_RE
        .split(body)
        .skip(1)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
