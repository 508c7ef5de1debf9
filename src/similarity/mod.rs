//! Similarity: token-normalized MinHash/Jaccard clustering of near-duplicate Units.

pub mod minhash;
pub mod normalize;

use crate::core::config::SimilarityConfig;
use crate::extractor::{Unit, UnitKind};
use minhash::MinHashSignature;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// A connected component of Units whose pairwise normalized-token Jaccard
/// meets the threshold for their kind combination (spec §4.6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cluster {
    pub members: Vec<String>,
    pub suggested_name: String,
}

struct UnionFind {
    parent: Vec<usize>,
}

impl UnionFind {
    fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
        }
    }

    fn find(&mut self, x: usize) -> usize {
        if self.parent[x] != x {
            self.parent[x] = self.find(self.parent[x]);
        }
        self.parent[x]
    }

    fn union(&mut self, a: usize, b: usize) {
        let ra = self.find(a);
        let rb = self.find(b);
        if ra != rb {
            self.parent[ra] = rb;
        }
    }
}

fn threshold_for(a: UnitKind, b: UnitKind, config: &SimilarityConfig) -> f64 {
    if a == UnitKind::Component && b == UnitKind::Component {
        config.tau_component
    } else {
        config.tau_default
    }
}

/// Cluster Units by normalized-token shingle similarity. Candidates with
/// estimated Jaccard >= threshold are confirmed with an exact Jaccard over the
/// shingle sets before the edge is kept, per spec §4.6.
pub fn cluster(units: &[Unit], config: &SimilarityConfig) -> Vec<Cluster> {
    if units.is_empty() {
        return Vec::new();
    }

    let shingle_sets: Vec<HashSet<String>> = units
        .iter()
        .map(|u| normalize::shingles(&u.source, config.shingle_size))
        .collect();

    let signatures: Vec<MinHashSignature> = shingle_sets
        .iter()
        .map(|s| MinHashSignature::compute(s, config.minhash_permutations))
        .collect();

    cluster_with_signatures(units, &shingle_sets, &signatures, config)
}

/// Like [`cluster`] but takes precomputed shingle sets and MinHash signatures,
/// so a caller that persists them (spec §6.2's cache) can skip recomputing
/// the normalized token stream for a Unit whose source hasn't changed.
pub fn cluster_with_signatures(
    units: &[Unit],
    shingle_sets: &[HashSet<String>],
    signatures: &[MinHashSignature],
    config: &SimilarityConfig,
) -> Vec<Cluster> {
    if units.is_empty() {
        return Vec::new();
    }

    let mut uf = UnionFind::new(units.len());

    for i in 0..units.len() {
        for j in (i + 1)..units.len() {
            let tau = threshold_for(units[i].kind, units[j].kind, config);
            let estimated = signatures[i].estimate_jaccard(&signatures[j]);
            if estimated < tau {
                continue;
            }
            let exact = exact_jaccard(&shingle_sets[i], &shingle_sets[j]);
            if exact >= tau {
                uf.union(i, j);
            }
        }
    }

    let mut groups: HashMap<usize, Vec<usize>> = HashMap::new();
    for i in 0..units.len() {
        let root = uf.find(i);
        groups.entry(root).or_default().push(i);
    }

    let mut clusters: Vec<Cluster> = groups
        .into_values()
        .filter(|members| members.len() > 1)
        .map(|mut members| {
            members.sort_by(|&a, &b| units[a].id.cmp(&units[b].id));
            let names: Vec<&str> = members.iter().map(|&i| units[i].name.as_str()).collect();
            Cluster {
                members: members.iter().map(|&i| units[i].id.clone()).collect(),
                suggested_name: suggest_name(&names),
            }
        })
        .collect();

    clusters.sort_by(|a, b| a.members[0].cmp(&b.members[0]));
    clusters
}

fn exact_jaccard(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    let intersection = a.intersection(b).count();
    let union = a.union(b).count();
    if union == 0 {
        0.0
    } else {
        intersection as f64 / union as f64
    }
}

/// Longest common prefix of member names, normalized to lowerCamel and
/// prefixed with `shared` (spec §4.6).
fn suggest_name(names: &[&str]) -> String {
    let prefix = longest_common_prefix(names);
    let cleaned: String = prefix.chars().filter(|c| c.is_alphanumeric()).collect();
    let camel = if cleaned.is_empty() {
        "Logic".to_string()
    } else {
        let mut chars = cleaned.chars();
        let first = chars.next().unwrap().to_ascii_uppercase();
        format!("{first}{}", chars.as_str())
    };
    format!("shared{camel}")
}

fn longest_common_prefix(names: &[&str]) -> String {
    if names.is_empty() {
        return String::new();
    }
    let mut prefix = names[0].to_string();
    for name in &names[1..] {
        let common: String = prefix
            .chars()
            .zip(name.chars())
            .take_while(|(a, b)| a == b)
            .map(|(a, _)| a)
            .collect();
        prefix = common;
    }
    prefix
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn unit(id: &str, name: &str, source: &str) -> Unit {
        Unit {
            id: id.to_string(),
            file: PathBuf::from(format!("{name}.ts")),
            name: name.to_string(),
            kind: UnitKind::Function,
            start_line: 1,
            end_line: 5,
            loc: 5,
            nesting_depth: 0,
            branch_count: 0,
            boolean_operator_count: 0,
            callback_depth: 0,
            early_return_count: 0,
            try_catch_count: 0,
            reactive_effects: vec![],
            render_side_effects: 0,
            identifiers: vec![],
            empty_catch_count: 0,
            try_without_catch_count: 0,
            unguarded_property_chain_count: 0,
            type_escape_hatch_count: 0,
            unstable_inline_handler_count: 0,
            network_call_without_handler_count: 0,
            string_literals: vec![],
            comment_lines: 0,
            source: source.to_string(),
        }
    }

    #[test]
    fn near_duplicate_functions_cluster_together() {
        let a = unit(
            "a",
            "formatResponse",
            "function formatResponse(response) { const value = response.value; return value.trim().toLowerCase(); }",
        );
        let b = unit(
            "b",
            "transformPayload",
            "function transformPayload(payload) { const value = payload.value; return value.trim().toLowerCase(); }",
        );
        let config = SimilarityConfig::default();
        let clusters = cluster(&[a, b], &config);
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].members.len(), 2);
        assert!(clusters[0].suggested_name.starts_with("shared"));
    }

    #[test]
    fn dissimilar_functions_do_not_cluster() {
        let a = unit("a", "sum", "function sum(a, b) { return a + b; }");
        let b = unit(
            "b",
            "renderHeader",
            "function renderHeader(title) { console.log(title); document.title = title; return title.length; }",
        );
        let config = SimilarityConfig::default();
        let clusters = cluster(&[a, b], &config);
        assert!(clusters.is_empty());
    }

    #[test]
    fn cluster_symmetry() {
        let a = unit(
            "a",
            "formatResponse",
            "function formatResponse(response) { const value = response.value; return value.trim().toLowerCase(); }",
        );
        let b = unit(
            "b",
            "transformPayload",
            "function transformPayload(payload) { const value = payload.value; return value.trim().toLowerCase(); }",
        );
        let config = SimilarityConfig::default();
        let forward = cluster(&[a.clone(), b.clone()], &config);
        let backward = cluster(&[b, a], &config);
        assert_eq!(forward.len(), backward.len());
    }
}
