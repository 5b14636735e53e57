//! Typed entities from module sub-reports.
//!
//! Two sources feed the [`EntityUniverse`]:
//! - the first plausible pipe table of each module text, mapped by
//!   lower-cased header name;
//! - a typed-ID scan (`ThemeID: token`, `[EmotionID: a→b→token]`, ...) over
//!   the whole text, for entities mentioned outside tables.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use verdict_core::enums::{EntityKind, ModuleKind};

/// Raw module outputs keyed by module.
pub type Partials = BTreeMap<ModuleKind, String>;

static TYPED_ID_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(ThemeID|EmotionID|PersonaID|RiskID|OpportunityID)\b\s*:?\s*(?:\[([^\]\r\n]+)\]|([^\s,;|)\]]+))",
    )
    .expect("valid typed id regex")
});

static SEPARATOR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*\|?\s*[-: ]+\|").expect("valid separator regex"));

// ---------------------------------------------------------------------------
// TypedEntity
// ---------------------------------------------------------------------------

/// One row of a module table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TypedEntity {
    pub kind: EntityKind,
    /// Canonical token (last `→` segment, brackets and quotes removed).
    pub id: String,
    /// Raw ID cell text.
    pub label: String,
    pub module: ModuleKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mentions: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub norm_mentions: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub topic_score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub intensity: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub segment_size: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub influence: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub urgency: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<String>,
}

impl TypedEntity {
    fn new(kind: EntityKind, module: ModuleKind, id: String, label: &str) -> Self {
        Self {
            kind,
            id,
            label: label.to_string(),
            module,
            mentions: None,
            norm_mentions: None,
            topic_score: None,
            intensity: None,
            segment_size: None,
            influence: None,
            urgency: None,
            priority: None,
        }
    }
}

/// Reduce an ID cell or reference to its canonical token.
///
/// `[Контент→Образование→theme_001]` and `"theme_001"` both become
/// `theme_001`. Returns `None` for empty tokens.
#[must_use]
pub fn canonical_id(raw: &str) -> Option<String> {
    let strip = |s: &str| {
        s.trim()
            .trim_matches(|c: char| matches!(c, '[' | ']' | '"' | '\'' | '*' | '`') || c.is_whitespace())
            .to_string()
    };
    let token = strip(raw);
    let token = match token.rsplit_once('→') {
        Some((_, last)) => strip(last),
        None => token,
    };
    (!token.is_empty()).then_some(token)
}

// ---------------------------------------------------------------------------
// Tables
// ---------------------------------------------------------------------------

/// A pipe-delimited table: lower-cased header plus data rows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Table {
    pub header: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    /// Index of the column whose lower-cased header equals `name`.
    #[must_use]
    pub fn column(&self, name: &str) -> Option<usize> {
        self.header.iter().position(|h| h == name)
    }

    fn cell<'a>(row: &'a [String], column: Option<usize>) -> Option<&'a str> {
        column.and_then(|i| row.get(i)).map(String::as_str)
    }

    fn number(row: &[String], column: Option<usize>) -> Option<f64> {
        Self::cell(row, column).and_then(parse_number)
    }
}

fn is_separator(line: &str) -> bool {
    SEPARATOR_RE.is_match(line)
}

fn split_cells(line: &str) -> Vec<String> {
    line.trim()
        .trim_matches('|')
        .split('|')
        .map(|c| c.trim().to_string())
        .collect()
}

/// Find the first plausible table in `text`.
///
/// A header is a piped line with letters that is not a separator and is
/// immediately followed by a separator line. Data rows run until the first
/// line without a pipe; separator rows are skipped and rows shorter than
/// `header.len() - 1` are dropped.
#[must_use]
pub fn parse_table(text: &str) -> Option<Table> {
    let lines: Vec<&str> = text.lines().collect();

    let header_idx = (0..lines.len().saturating_sub(1)).find(|&i| {
        let line = lines[i];
        line.contains('|')
            && line.chars().any(char::is_alphabetic)
            && !is_separator(line)
            && is_separator(lines[i + 1])
    })?;

    let header: Vec<String> = split_cells(lines[header_idx])
        .into_iter()
        .map(|h| h.to_lowercase())
        .collect();
    let min_cells = header.len().saturating_sub(1);

    let rows = lines[header_idx + 2..]
        .iter()
        .take_while(|line| line.contains('|'))
        .filter(|line| !is_separator(line))
        .map(|line| split_cells(line))
        .filter(|cells| cells.len() >= min_cells)
        .collect();

    Some(Table { header, rows })
}

/// Parse a numeric cell: `%` dropped, decimal comma accepted.
#[must_use]
pub fn parse_number(cell: &str) -> Option<f64> {
    cell.replace('%', "")
        .replace(',', ".")
        .trim()
        .trim_matches('*')
        .trim()
        .parse()
        .ok()
}

// ---------------------------------------------------------------------------
// Per-module extraction
// ---------------------------------------------------------------------------

/// Extract typed entities from one module's raw output.
#[must_use]
pub fn extract_module(module: ModuleKind, text: &str) -> Vec<TypedEntity> {
    let Some(table) = parse_table(text) else {
        return Vec::new();
    };

    let id_column = |name: &str| table.column(name).unwrap_or(0);

    let mut entities = Vec::new();
    for row in &table.rows {
        match module {
            ModuleKind::Themes => {
                let Some((id, label)) = id_cell(row, id_column("themeid")) else {
                    continue;
                };
                let mut e = TypedEntity::new(EntityKind::Theme, module, id, label);
                e.mentions = Table::number(row, table.column("mentions"));
                e.norm_mentions = Table::number(row, table.column("norm_mentions"));
                e.topic_score = Table::number(row, table.column("topic_score"));
                entities.push(e);
            }
            ModuleKind::Emotions => {
                let Some((id, label)) = id_cell(row, id_column("emotionid")) else {
                    continue;
                };
                let mut e = TypedEntity::new(EntityKind::Emotion, module, id, label);
                e.mentions = Table::number(row, table.column("mentions"));
                e.norm_mentions = Table::number(row, table.column("norm_mentions"));
                e.intensity = Table::number(row, table.column("интенсивность"));
                entities.push(e);
            }
            ModuleKind::Personas => {
                let Some((id, label)) = id_cell(row, id_column("personaid")) else {
                    continue;
                };
                let mut e = TypedEntity::new(EntityKind::Persona, module, id, label);
                e.segment_size = Table::number(row, table.column("норм.размер"));
                e.influence = Table::number(row, table.column("ивс"));
                entities.push(e);
            }
            ModuleKind::RisksOpportunities => {
                let Some((id, label)) = id_cell(row, id_column("id")) else {
                    continue;
                };
                let type_column = table.column("тип").or(Some(1));
                let kind_text = Table::cell(row, type_column)
                    .unwrap_or_default()
                    .trim()
                    .to_lowercase();
                let kind = if kind_text.starts_with("риск") {
                    EntityKind::Risk
                } else if kind_text.starts_with("возмож") {
                    EntityKind::Opportunity
                } else {
                    continue;
                };
                let mut e = TypedEntity::new(kind, module, id, label);
                e.urgency = Table::number(row, table.column("иув"));
                e.priority = Table::cell(row, table.column("приоритет"))
                    .filter(|p| !p.is_empty())
                    .map(str::to_string);
                entities.push(e);
            }
        }
    }
    entities
}

fn id_cell(row: &[String], column: usize) -> Option<(String, &str)> {
    let label = row.get(column)?;
    canonical_id(label).map(|id| (id, label.as_str()))
}

// ---------------------------------------------------------------------------
// EntityUniverse
// ---------------------------------------------------------------------------

/// Entity IDs grouped by kind.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EntityUniverse {
    ids: BTreeMap<EntityKind, BTreeSet<String>>,
}

impl EntityUniverse {
    pub fn insert(&mut self, kind: EntityKind, id: impl Into<String>) {
        self.ids.entry(kind).or_default().insert(id.into());
    }

    pub fn extend(&mut self, other: Self) {
        for (kind, ids) in other.ids {
            self.ids.entry(kind).or_default().extend(ids);
        }
    }

    #[must_use]
    pub fn contains(&self, kind: EntityKind, id: &str) -> bool {
        self.ids.get(&kind).is_some_and(|set| set.contains(id))
    }

    /// IDs of `kind` in sorted order.
    pub fn ids(&self, kind: EntityKind) -> impl Iterator<Item = &str> {
        self.ids.get(&kind).into_iter().flatten().map(String::as_str)
    }

    #[must_use]
    pub fn count(&self, kind: EntityKind) -> usize {
        self.ids.get(&kind).map_or(0, BTreeSet::len)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids.values().all(BTreeSet::is_empty)
    }

    /// IDs of `self` that are absent from `universe`, per kind, sorted.
    #[must_use]
    pub fn missing_from(&self, universe: &Self) -> BTreeMap<EntityKind, Vec<String>> {
        self.ids
            .iter()
            .filter_map(|(kind, ids)| {
                let missing: Vec<String> = ids
                    .iter()
                    .filter(|id| !universe.contains(*kind, id))
                    .cloned()
                    .collect();
                (!missing.is_empty()).then_some((*kind, missing))
            })
            .collect()
    }
}

/// Scan arbitrary text for typed ID references.
#[must_use]
pub fn scan_typed_ids(text: &str) -> EntityUniverse {
    let mut universe = EntityUniverse::default();
    for caps in TYPED_ID_RE.captures_iter(text) {
        let Some(kind) = caps
            .get(1)
            .and_then(|m| EntityKind::from_id_label(m.as_str()))
        else {
            continue;
        };
        let token = caps.get(2).or_else(|| caps.get(3)).map(|m| m.as_str());
        if let Some(id) = token.and_then(canonical_id) {
            universe.insert(kind, id);
        }
    }
    universe
}

// ---------------------------------------------------------------------------
// ModulesData
// ---------------------------------------------------------------------------

/// Entities extracted from all module partials of one analysis.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ModulesData {
    pub themes: Vec<TypedEntity>,
    pub emotions: Vec<TypedEntity>,
    pub personas: Vec<TypedEntity>,
    pub risks: Vec<TypedEntity>,
    pub opportunities: Vec<TypedEntity>,
    pub universe: EntityUniverse,
}

impl ModulesData {
    #[must_use]
    pub fn extract(partials: &Partials) -> Self {
        let mut data = Self::default();

        for (module, text) in partials {
            for entity in extract_module(*module, text) {
                data.universe.insert(entity.kind, entity.id.clone());
                match entity.kind {
                    EntityKind::Theme => data.themes.push(entity),
                    EntityKind::Emotion => data.emotions.push(entity),
                    EntityKind::Persona => data.personas.push(entity),
                    EntityKind::Risk => data.risks.push(entity),
                    EntityKind::Opportunity => data.opportunities.push(entity),
                }
            }
            data.universe.extend(scan_typed_ids(text));
        }

        data
    }
}
