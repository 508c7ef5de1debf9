//! Individual cognitive-load features (spec §4.5 table), each scaled to 0..100.

use crate::extractor::Unit;

const AMBIGUOUS_IDENTIFIERS: &[&str] = &["data", "tmp", "result", "foo", "x", "y"];

fn scale(value: usize, cap: usize) -> f64 {
    if cap == 0 {
        return 0.0;
    }
    (value.min(cap) as f64 / cap as f64) * 100.0
}

pub fn nesting_depth_feature(unit: &Unit) -> f64 {
    scale(unit.nesting_depth, 8)
}

pub fn branch_count_feature(unit: &Unit) -> f64 {
    scale(unit.branch_count, 20)
}

pub fn boolean_complexity_feature(unit: &Unit) -> f64 {
    scale(unit.boolean_operator_count, 12)
}

pub fn callback_depth_feature(unit: &Unit) -> f64 {
    scale(unit.callback_depth, 6)
}

/// Percentage of identifier occurrences drawn from a fixed ambiguous vocabulary.
pub fn identifier_ambiguity_ratio(unit: &Unit) -> f64 {
    if unit.identifiers.is_empty() {
        return 0.0;
    }
    let ambiguous = unit
        .identifiers
        .iter()
        .filter(|id| AMBIGUOUS_IDENTIFIERS.contains(&id.as_str()))
        .count();
    ambiguous as f64 / unit.identifiers.len() as f64
}

pub fn identifier_ambiguity_feature(unit: &Unit) -> f64 {
    identifier_ambiguity_ratio(unit) * 100.0
}

/// Open Question (b): distinct identifier prefixes (split at the first
/// uppercase-lowercase boundary) among identifiers occurring >= 2 times.
pub fn context_switch_count(unit: &Unit) -> usize {
    let mut counts: std::collections::HashMap<&str, usize> = std::collections::HashMap::new();
    for id in &unit.identifiers {
        *counts.entry(id.as_str()).or_insert(0) += 1;
    }

    let mut prefixes = std::collections::HashSet::new();
    for (id, count) in counts {
        if count >= 2 {
            prefixes.insert(domain_prefix(id));
        }
    }
    prefixes.len()
}

fn domain_prefix(identifier: &str) -> &str {
    let bytes = identifier.as_bytes();
    for i in 1..bytes.len() {
        if bytes[i - 1].is_ascii_lowercase() && bytes[i].is_ascii_uppercase() {
            return &identifier[..i];
        }
    }
    identifier
}

pub fn context_switches_feature(unit: &Unit) -> f64 {
    scale(context_switch_count(unit), 6)
}

/// 1 if any catch block on the unit is empty, else 0; scaled ×100.
pub fn exception_irregularity_feature(unit: &Unit) -> f64 {
    if unit.try_without_catch_count > 0 || unit.empty_catch_count > 0 {
        100.0
    } else {
        0.0
    }
}

pub fn side_effect_feature(unit: &Unit) -> f64 {
    scale(unit.render_side_effects, 6)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractor::UnitKind;
    use std::path::PathBuf;

    fn unit_with_identifiers(ids: Vec<&str>) -> Unit {
        Unit {
            id: "u".to_string(),
            file: PathBuf::from("a.ts"),
            name: "f".to_string(),
            kind: UnitKind::Function,
            start_line: 1,
            end_line: 2,
            loc: 3,
            nesting_depth: 0,
            branch_count: 0,
            boolean_operator_count: 0,
            callback_depth: 0,
            early_return_count: 0,
            try_catch_count: 0,
            reactive_effects: vec![],
            render_side_effects: 0,
            identifiers: ids.into_iter().map(String::from).collect(),
            empty_catch_count: 0,
            try_without_catch_count: 0,
            unguarded_property_chain_count: 0,
            type_escape_hatch_count: 0,
            unstable_inline_handler_count: 0,
            network_call_without_handler_count: 0,
            string_literals: vec![],
            comment_lines: 0,
            source: String::new(),
        }
    }

    #[test]
    fn identifier_ambiguity_counts_fixed_vocabulary() {
        let unit = unit_with_identifiers(vec!["data", "userId", "tmp", "userId"]);
        assert_eq!(identifier_ambiguity_ratio(&unit), 0.5);
    }

    #[test]
    fn context_switches_counts_repeated_prefixes() {
        let unit = unit_with_identifiers(vec!["userName", "userName", "userId", "userId", "orderTotal"]);
        assert_eq!(context_switch_count(&unit), 1);
    }

    #[test]
    fn scale_caps_at_max() {
        assert_eq!(scale(100, 8), 100.0);
        assert_eq!(scale(4, 8), 50.0);
    }
}
