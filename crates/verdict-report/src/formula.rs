//! Index recomputation: Content Health Index and Strategic Stability Index.

use serde::{Deserialize, Serialize};
use verdict_core::enums::AnalysisMode;

use crate::extract::{ModulesData, TypedEntity};

/// Per-term CHI weights for the top-N modes.
#[derive(Debug, Clone, Copy, PartialEq)]
struct ChiWeights {
    topic: f64,
    positive: f64,
    influence: f64,
    risk: f64,
}

impl ChiWeights {
    const fn for_mode(mode: AnalysisMode) -> Option<Self> {
        match mode {
            AnalysisMode::A => Some(Self {
                topic: 0.25,
                positive: 0.20,
                influence: 0.25,
                risk: 0.30,
            }),
            AnalysisMode::B => Some(Self {
                topic: 0.30,
                positive: 0.30,
                influence: 0.20,
                risk: 0.20,
            }),
            AnalysisMode::C => None,
        }
    }
}

/// Scale a score to `[0, 1]`. Values above 1.5 are read as percentages.
fn unit_scale(raw: f64) -> f64 {
    if raw > 1.5 { raw.min(100.0) / 100.0 } else { raw }
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    #[allow(clippy::cast_precision_loss)]
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Mean of the top `n` values (by raw value), each unit-scaled.
fn top_n_mean(entities: &[TypedEntity], n: usize, value: fn(&TypedEntity) -> Option<f64>) -> Option<f64> {
    let mut raw: Vec<f64> = entities.iter().map(|e| value(e).unwrap_or(0.0)).collect();
    raw.sort_by(|a, b| b.total_cmp(a));
    let scaled: Vec<f64> = raw.into_iter().take(n).map(unit_scale).collect();
    mean(&scaled)
}

fn is_positive_emotion(entity: &TypedEntity) -> bool {
    let id = entity.id.to_lowercase();
    let label = entity.label.to_lowercase();
    ["позит", "positive"]
        .iter()
        .any(|needle| id.contains(needle) || label.contains(needle))
}

/// Share of positive emotions weighted by mentions, in percent.
///
/// `None` when there are no emotions or no mentions at all.
#[must_use]
pub fn positive_share(emotions: &[TypedEntity]) -> Option<f64> {
    let total: f64 = emotions.iter().map(|e| e.mentions.unwrap_or(0.0)).sum();
    if total <= 0.0 {
        return None;
    }
    let positive: f64 = emotions
        .iter()
        .filter(|e| is_positive_emotion(e))
        .map(|e| e.mentions.unwrap_or(0.0))
        .sum();
    Some(positive / total * 100.0)
}

/// Simplified CHI: `(positive * 0.5 + (1 - problem_density) * 0.5) * 100`.
///
/// `positive_pct` is in percent, `problem_density` in `[0, 1]`. The result is
/// clamped to `[0, 100]`.
#[must_use]
pub fn simplified_chi(positive_pct: f64, problem_density: f64) -> f64 {
    let density = problem_density.clamp(0.0, 1.0);
    let chi = (positive_pct / 100.0).mul_add(0.5, (1.0 - density) * 0.5) * 100.0;
    chi.clamp(0.0, 100.0)
}

/// Recompute the Content Health Index for `mode`.
///
/// Mode C prefers the positive share from module emotions and falls back to
/// `100 - negative_pct`. Problem density prefers `critical_pct`, then
/// `negative_pct`, then 0.5. Modes A and B need both themes and personas;
/// a missing positive share or risk average counts as zero.
#[must_use]
pub fn expected_chi(
    mode: AnalysisMode,
    data: &ModulesData,
    critical_pct: Option<f64>,
    negative_pct: Option<f64>,
) -> Option<f64> {
    let Some(weights) = ChiWeights::for_mode(mode) else {
        let positive = positive_share(&data.emotions).or_else(|| negative_pct.map(|n| 100.0 - n))?;
        let density = critical_pct
            .or(negative_pct)
            .map_or(0.5, |pct| (pct / 100.0).clamp(0.0, 1.0));
        return Some(simplified_chi(positive, density));
    };
    let n = mode.top_n().unwrap_or(1);

    let topic = top_n_mean(&data.themes, n, |e| e.topic_score)?;
    let influence = top_n_mean(&data.personas, n, |e| e.influence)?;
    let risk = top_n_mean(&data.risks, n, |e| e.urgency).unwrap_or(0.0);
    let positive = (positive_share(&data.emotions).unwrap_or(0.0) / 100.0).clamp(0.0, 1.0);

    let chi = topic * weights.topic
        + positive * weights.positive
        + influence * weights.influence
        + (1.0 - risk) * weights.risk;
    Some((chi * 100.0).clamp(0.0, 100.0))
}

/// Recompute the Strategic Stability Index:
/// `(opportunities / (risks + 1)) * (avg_opportunity / (avg_risk + 0.1))`.
///
/// `None` when there are neither risks nor opportunities.
#[must_use]
pub fn expected_ssi(data: &ModulesData) -> Option<f64> {
    if data.risks.is_empty() && data.opportunities.is_empty() {
        return None;
    }
    let urgencies = |entities: &[TypedEntity]| -> Vec<f64> {
        entities
            .iter()
            .map(|e| unit_scale(e.urgency.unwrap_or(0.0)))
            .collect()
    };
    let avg_opportunity = mean(&urgencies(&data.opportunities)).unwrap_or(0.0);
    let avg_risk = mean(&urgencies(&data.risks)).unwrap_or(0.0);

    #[allow(clippy::cast_precision_loss)]
    let ratio = data.opportunities.len() as f64 / (data.risks.len() as f64 + 1.0);
    Some(ratio * (avg_opportunity / (avg_risk + 0.1)))
}

// ---------------------------------------------------------------------------
// CalculatedIndices
// ---------------------------------------------------------------------------

/// Reported vs recomputed value of one index.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct IndexComparison {
    pub reported: Option<f64>,
    pub calculated: Option<f64>,
}

impl IndexComparison {
    /// Absolute deviation when both sides are known.
    #[must_use]
    pub fn deviation(&self) -> Option<f64> {
        Some((self.reported? - self.calculated?).abs())
    }

    /// The value to publish: recomputed if available, else reported.
    #[must_use]
    pub fn best(&self) -> Option<f64> {
        self.calculated.or(self.reported)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CalculatedIndices {
    #[serde(rename = "CONTENT_HEALTH_INDEX")]
    pub chi: IndexComparison,
    #[serde(rename = "STRATEGIC_STABILITY_INDEX")]
    pub ssi: IndexComparison,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use verdict_core::enums::{EntityKind, ModuleKind};

    fn entity(kind: EntityKind, id: &str) -> TypedEntity {
        let module = match kind {
            EntityKind::Theme => ModuleKind::Themes,
            EntityKind::Emotion => ModuleKind::Emotions,
            EntityKind::Persona => ModuleKind::Personas,
            EntityKind::Risk | EntityKind::Opportunity => ModuleKind::RisksOpportunities,
        };
        let mut e = extract_stub(kind, module, id);
        e.label = id.to_string();
        e
    }

    fn extract_stub(kind: EntityKind, module: ModuleKind, id: &str) -> TypedEntity {
        TypedEntity {
            kind,
            id: id.to_string(),
            label: String::new(),
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

    fn emotion(id: &str, mentions: f64) -> TypedEntity {
        let mut e = entity(EntityKind::Emotion, id);
        e.mentions = Some(mentions);
        e
    }

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn positive_share_weights_by_mentions() {
        let emotions = vec![emotion("joy_positive", 30.0), emotion("anger", 70.0)];
        assert!(approx(positive_share(&emotions).unwrap_or_default(), 30.0));
        assert_eq!(positive_share(&[emotion("anger", 0.0)]), None);
    }

    #[test]
    fn mode_c_falls_back_to_negative_tone() {
        let data = ModulesData::default();
        let chi = expected_chi(AnalysisMode::C, &data, None, Some(10.0)).unwrap_or_default();
        assert!(approx(chi, 90.0));
        assert_eq!(expected_chi(AnalysisMode::C, &data, None, None), None);
    }

    #[test]
    fn mode_c_prefers_critical_signals_for_density() {
        let data = ModulesData {
            emotions: vec![emotion("позитив", 50.0), emotion("грусть", 50.0)],
            ..ModulesData::default()
        };
        let chi = expected_chi(AnalysisMode::C, &data, Some(20.0), Some(40.0)).unwrap_or_default();
        assert!(approx(chi, 65.0));
    }

    #[rstest]
    #[case(0.0, 0.0)]
    #[case(100.0, 0.0)]
    #[case(0.0, 1.0)]
    #[case(100.0, 1.0)]
    #[case(37.5, 0.42)]
    #[case(250.0, -3.0)]
    fn simplified_chi_stays_in_range(#[case] positive: f64, #[case] density: f64) {
        let chi = simplified_chi(positive, density);
        assert!((0.0..=100.0).contains(&chi), "chi {chi} out of range");
    }

    #[test]
    fn mode_a_uses_top_three_and_weights() {
        let mut themes = Vec::new();
        for (id, score) in [("t1", 90.0), ("t2", 80.0), ("t3", 70.0), ("t4", 10.0)] {
            let mut t = entity(EntityKind::Theme, id);
            t.topic_score = Some(score);
            themes.push(t);
        }
        let mut personas = Vec::new();
        for (id, influence) in [("p1", 0.6), ("p2", 0.6), ("p3", 0.6)] {
            let mut p = entity(EntityKind::Persona, id);
            p.influence = Some(influence);
            personas.push(p);
        }
        let mut risk = entity(EntityKind::Risk, "r1");
        risk.urgency = Some(0.5);
        let data = ModulesData {
            themes,
            emotions: vec![emotion("positive", 50.0), emotion("neg", 50.0)],
            personas,
            risks: vec![risk],
            ..ModulesData::default()
        };

        // topic 0.8, positive 0.5, influence 0.6, risk 0.5
        let expected = (0.8 * 0.25 + 0.5 * 0.20 + 0.6 * 0.25 + 0.5 * 0.30) * 100.0;
        let chi = expected_chi(AnalysisMode::A, &data, None, None).unwrap_or_default();
        assert!(approx(chi, expected), "{chi} != {expected}");
    }

    #[test]
    fn top_n_modes_need_themes_and_personas() {
        let mut theme = entity(EntityKind::Theme, "t1");
        theme.topic_score = Some(0.9);
        let data = ModulesData {
            themes: vec![theme],
            ..ModulesData::default()
        };
        assert_eq!(expected_chi(AnalysisMode::B, &data, None, None), None);
    }

    #[test]
    fn ssi_undefined_without_risks_and_opportunities() {
        assert_eq!(expected_ssi(&ModulesData::default()), None);
    }

    #[test]
    fn ssi_ratio_of_counts_and_urgency() {
        let mut r = entity(EntityKind::Risk, "r1");
        r.urgency = Some(40.0);
        let mut o1 = entity(EntityKind::Opportunity, "o1");
        o1.urgency = Some(0.6);
        let mut o2 = entity(EntityKind::Opportunity, "o2");
        o2.urgency = Some(0.8);
        let data = ModulesData {
            risks: vec![r],
            opportunities: vec![o1, o2],
            ..ModulesData::default()
        };
        // (2 / 2) * (0.7 / (0.4 + 0.1))
        let ssi = expected_ssi(&data).unwrap_or_default();
        assert!(approx(ssi, 1.4), "{ssi}");
    }

    #[test]
    fn comparison_prefers_calculated_value() {
        let cmp = IndexComparison {
            reported: Some(80.0),
            calculated: Some(55.0),
        };
        assert_eq!(cmp.best(), Some(55.0));
        assert_eq!(cmp.deviation(), Some(25.0));
    }
}
