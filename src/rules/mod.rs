//! Rules: declarative matcher vocabulary evaluated against Units (spec §4.4).
//!
//! Matchers are a closed tagged enum, never dynamically interpreted code, so
//! rule sets stay inspectable and cache-key-stable (spec §9 Design Notes).

use crate::extractor::Unit;
use crate::scorer::features;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

const DEFAULT_RULESET_TOML: &str = include_str!("../../assets/rules/default.toml");

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

/// The closed vocabulary of matcher expressions (spec §4.4, §6.3).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Matcher {
    RenderSideEffectsAtLeast { threshold: usize },
    ReactiveEffectDepsIncomplete,
    ReactiveEffectMissingCleanup,
    IdentifierAmbiguityAtLeast { threshold: f64 },
    TypeEscapeHatchAtLeast { threshold: usize },
    NetworkCallWithoutHandlerAtLeast { threshold: usize },
    EmptyCatchAtLeast { threshold: usize },
    UnguardedPropertyChainAtLeast { threshold: usize },
    BooleanComplexityAtLeast { threshold: usize },
    NestingDepthAtLeast { threshold: usize },
    UnstableInlineHandlerAtLeast { threshold: usize },
    ClusterMember,
    MagicStringRepeatedInFile { threshold: usize },
    CommentRatioBelowWithAmbiguity {
        comment_ratio_threshold: f64,
        ambiguity_threshold: f64,
    },
    CallbackDepthAtLeast { threshold: usize },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rule {
    pub id: String,
    pub name: String,
    pub language: String,
    pub severity: Severity,
    pub suggested_action: String,
    pub matcher: Matcher,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleFile {
    pub version: String,
    pub rules: Vec<Rule>,
}

impl RuleFile {
    pub fn load(path: &Path) -> Result<Self, String> {
        let content = std::fs::read_to_string(path).map_err(|e| e.to_string())?;
        toml::from_str(&content).map_err(|e| e.to_string())
    }
}

static DEFAULT_RULESET: Lazy<RuleFile> =
    Lazy::new(|| toml::from_str(DEFAULT_RULESET_TOML).expect("embedded ruleset must parse"));

pub fn default_ruleset() -> &'static RuleFile {
    &DEFAULT_RULESET
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Finding {
    pub unit_id: String,
    pub rule_id: String,
    pub severity: Severity,
    pub explanation: String,
    pub suggested_action: String,
}

/// Context available to matchers that span more than a single Unit.
pub struct EvalContext<'a> {
    pub cluster_members: &'a std::collections::HashSet<String>,
    pub file_string_literal_counts: &'a HashMap<String, usize>,
}

/// Evaluate every rule against a Unit, returning findings sorted by
/// (severity desc, identifier asc) as spec §4.4 requires for presentation.
pub fn evaluate(unit: &Unit, ruleset: &RuleFile, ctx: &EvalContext) -> Vec<Finding> {
    let mut findings: Vec<Finding> = ruleset
        .rules
        .iter()
        .filter(|rule| matches(unit, rule, ctx))
        .map(|rule| Finding {
            unit_id: unit.id.clone(),
            rule_id: rule.id.clone(),
            severity: rule.severity,
            explanation: explanation(unit, rule),
            suggested_action: rule.suggested_action.clone(),
        })
        .collect();

    findings.sort_by(|a, b| b.severity.cmp(&a.severity).then_with(|| a.rule_id.cmp(&b.rule_id)));
    findings
}

fn matches(unit: &Unit, rule: &Rule, ctx: &EvalContext) -> bool {
    match &rule.matcher {
        Matcher::RenderSideEffectsAtLeast { threshold } => unit.render_side_effects >= *threshold,
        Matcher::ReactiveEffectDepsIncomplete => unit.has_incomplete_deps(),
        Matcher::ReactiveEffectMissingCleanup => {
            !unit.reactive_effects.is_empty() && !unit.has_stable_cleanup()
        }
        Matcher::IdentifierAmbiguityAtLeast { threshold } => {
            features::identifier_ambiguity_ratio(unit) >= *threshold
        }
        Matcher::TypeEscapeHatchAtLeast { threshold } => unit.type_escape_hatch_count >= *threshold,
        Matcher::NetworkCallWithoutHandlerAtLeast { threshold } => {
            unit.network_call_without_handler_count >= *threshold
        }
        Matcher::EmptyCatchAtLeast { threshold } => unit.empty_catch_count >= *threshold,
        Matcher::UnguardedPropertyChainAtLeast { threshold } => {
            unit.unguarded_property_chain_count >= *threshold
        }
        Matcher::BooleanComplexityAtLeast { threshold } => {
            unit.boolean_operator_count >= *threshold
        }
        Matcher::NestingDepthAtLeast { threshold } => unit.nesting_depth >= *threshold,
        Matcher::UnstableInlineHandlerAtLeast { threshold } => {
            unit.unstable_inline_handler_count >= *threshold
        }
        Matcher::ClusterMember => ctx.cluster_members.contains(&unit.id),
        Matcher::MagicStringRepeatedInFile { threshold } => unit
            .string_literals
            .iter()
            .any(|s| ctx.file_string_literal_counts.get(s).copied().unwrap_or(0) >= *threshold),
        Matcher::CommentRatioBelowWithAmbiguity {
            comment_ratio_threshold,
            ambiguity_threshold,
        } => {
            let ratio = if unit.loc == 0 {
                0.0
            } else {
                unit.comment_lines as f64 / unit.loc as f64
            };
            ratio < *comment_ratio_threshold
                && features::identifier_ambiguity_ratio(unit) >= *ambiguity_threshold
        }
        Matcher::CallbackDepthAtLeast { threshold } => unit.callback_depth >= *threshold,
    }
}

fn explanation(unit: &Unit, rule: &Rule) -> String {
    format!("{} flags `{}` ({})", rule.name, unit.name, rule.id)
}

/// Count string literal occurrences across every Unit in a file, for the
/// magic-string-repetition matcher.
pub fn file_string_literal_counts(units: &[Unit]) -> HashMap<String, usize> {
    let mut counts = HashMap::new();
    for unit in units {
        for literal in &unit.string_literals {
            *counts.entry(literal.clone()).or_insert(0) += 1;
        }
    }
    counts
}
