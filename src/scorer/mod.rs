//! Scorer: cognitive-load model, shadow flag, fragility, and aggregates (spec §4.5).

pub mod features;

use crate::core::config::ScoringConfig;
use crate::evidence::Evidence;
use crate::extractor::Unit;
use serde::{Deserialize, Serialize};

/// Per-Unit scores (spec §3 `UnitScores`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnitScores {
    pub unit_id: String,
    pub cognitive_load: u8,
    pub review_evidence: u8,
    pub shadow: bool,
    pub fragility: u8,
    pub redundancy_cluster_id: Option<String>,
}

/// Compute the weighted cognitive-load sum, apply adjustments, and clamp.
pub fn cognitive_load(unit: &Unit, config: &ScoringConfig) -> u8 {
    let raw = (config.weight_nesting / 100.0) * features::nesting_depth_feature(unit)
        + (config.weight_branches / 100.0) * features::branch_count_feature(unit)
        + (config.weight_boolean / 100.0) * features::boolean_complexity_feature(unit)
        + (config.weight_callback_depth / 100.0) * features::callback_depth_feature(unit)
        + (config.weight_identifier_ambiguity / 100.0) * features::identifier_ambiguity_feature(unit)
        + (config.weight_context_switches / 100.0) * features::context_switches_feature(unit)
        + (config.weight_exception_irregularity / 100.0)
            * features::exception_irregularity_feature(unit)
        + (config.weight_side_effects / 100.0) * features::side_effect_feature(unit);

    let mut adjusted = raw;
    if unit.has_incomplete_deps() {
        adjusted += 15.0;
    }
    if unit.has_stable_cleanup() {
        adjusted -= 5.0;
    }
    if unit.render_side_effects > 0 {
        adjusted += 20.0;
    }

    adjusted.clamp(0.0, 100.0).round() as u8
}

/// `shadow ⇔ review_evidence < evidence_threshold ∧ cognitive_load > load_threshold`.
pub fn is_shadow(cognitive_load: u8, review_evidence: u8, config: &ScoringConfig) -> bool {
    review_evidence < config.evidence_threshold && cognitive_load > config.load_threshold
}

/// Open Question (a): fragility equals cognitive_load unless Evidence is
/// absent (history unavailable), in which case it is `min(100, load + 10)`.
pub fn fragility(cognitive_load: u8, evidence: &Evidence) -> u8 {
    let evidence_absent = evidence.distinct_authors == 0 && evidence.review_evidence == 0;
    if evidence_absent {
        (cognitive_load as u16 + 10).min(100) as u8
    } else {
        cognitive_load
    }
}

/// Scan-level aggregates (spec §4.5).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Aggregates {
    pub shadow_logic_density: f64,
    pub average_cognitive_load: f64,
    pub redundancy_score: f64,
    pub refactoring_runway_months: Option<u32>,
    pub total_units: usize,
    pub shadow_units: usize,
}

impl Aggregates {
    pub fn compute(
        scores: &[UnitScores],
        unique_cluster_count: usize,
        shadow_created_last_30d: Option<usize>,
        shadow_resolved_since_last_scan: Option<usize>,
    ) -> Self {
        let total_units = scores.len();
        let shadow_units = scores.iter().filter(|s| s.shadow).count();

        let shadow_logic_density = if total_units == 0 {
            0.0
        } else {
            shadow_units as f64 / total_units as f64
        };

        let average_cognitive_load = if total_units == 0 {
            0.0
        } else {
            scores.iter().map(|s| s.cognitive_load as f64).sum::<f64>() / total_units as f64
        };

        let redundancy_score = if total_units == 0 {
            0.0
        } else {
            1.0 - (unique_cluster_count as f64 / total_units as f64)
        };

        let refactoring_runway_months = match (shadow_created_last_30d, shadow_resolved_since_last_scan) {
            (Some(k), Some(h)) => {
                let denom = k.saturating_sub(h).max(1);
                Some((shadow_units as f64 / denom as f64).ceil() as u32)
            }
            _ => None,
        };

        Self {
            shadow_logic_density,
            average_cognitive_load,
            redundancy_score,
            refactoring_runway_months,
            total_units,
            shadow_units,
        }
    }
}
