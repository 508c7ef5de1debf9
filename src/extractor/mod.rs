//! Extractor: parse FEL source into Units with structural features.
//!
//! Grounded in the tree-sitter query extraction pipeline, generalized here to a
//! recursive AST walk because per-Unit feature extraction (nesting depth, branch
//! count, reactive-effect bookkeeping) needs a running traversal state that a
//! flat query match stream cannot carry.

mod treesitter;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

/// The three kinds of promoted analysis units (spec §4.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitKind {
    Component,
    Hook,
    Function,
}

/// A single reactive effect call (`useEffect`, etc.) found inside a Unit.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReactiveEffect {
    pub deps: Vec<String>,
    pub has_cleanup: bool,
}

/// An analyzable code region: a component, hook, or function (spec §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Unit {
    pub id: String,
    pub file: PathBuf,
    pub name: String,
    pub kind: UnitKind,
    pub start_line: u32,
    pub end_line: u32,
    pub loc: usize,
    pub nesting_depth: usize,
    pub branch_count: usize,
    pub boolean_operator_count: usize,
    pub callback_depth: usize,
    pub early_return_count: usize,
    pub try_catch_count: usize,
    pub reactive_effects: Vec<ReactiveEffect>,
    pub render_side_effects: usize,
    pub identifiers: Vec<String>,
    pub empty_catch_count: usize,
    pub try_without_catch_count: usize,
    pub unguarded_property_chain_count: usize,
    pub type_escape_hatch_count: usize,
    pub unstable_inline_handler_count: usize,
    pub network_call_without_handler_count: usize,
    pub string_literals: Vec<String>,
    pub comment_lines: usize,
    /// Raw source text of the unit's body, used by Similarity for shingling.
    pub source: String,
}

impl Unit {
    /// Whether any reactive effect on this Unit has a cleanup function and a
    /// non-empty, stable dependency list.
    pub fn has_stable_cleanup(&self) -> bool {
        !self.reactive_effects.is_empty()
            && self
                .reactive_effects
                .iter()
                .all(|e| e.has_cleanup && !e.deps.is_empty())
    }

    /// True if any reactive effect is missing a dependency list.
    pub fn has_incomplete_deps(&self) -> bool {
        self.reactive_effects.iter().any(|e| e.deps.is_empty())
    }
}

/// A recoverable per-file extraction problem (spec §4.2, §7 "parse" kind).
#[derive(Debug, Clone)]
pub struct ExtractWarning {
    pub file: PathBuf,
    pub message: String,
}

/// The dialect a file is parsed with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    TypeScript,
    Tsx,
    JavaScript,
    Jsx,
}

impl Dialect {
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension().and_then(|e| e.to_str()) {
            Some("ts") => Some(Dialect::TypeScript),
            Some("tsx") => Some(Dialect::Tsx),
            Some("js") | Some("mjs") | Some("cjs") => Some(Dialect::JavaScript),
            Some("jsx") => Some(Dialect::Jsx),
            _ => None,
        }
    }

    pub fn has_markup(&self) -> bool {
        matches!(self, Dialect::Tsx | Dialect::Jsx)
    }
}

/// Hash (file path, symbol name, byte span) into a globally unique Unit id.
pub fn unit_id(file: &Path, name: &str, start_byte: usize, end_byte: usize) -> String {
    let mut hasher = Sha256::new();
    hasher.update(file.to_string_lossy().as_bytes());
    hasher.update(b"\0");
    hasher.update(name.as_bytes());
    hasher.update(b"\0");
    hasher.update(start_byte.to_le_bytes());
    hasher.update(end_byte.to_le_bytes());
    format!("{:x}", hasher.finalize())
}

/// Parse a single file and extract its Units, never failing the scan:
/// unsupported dialects and parse errors surface as a warning with an empty
/// Unit list instead of propagating.
pub fn extract_file(
    path: &Path,
    content: &str,
    reactive_effect_hooks: &[&str],
    side_effect_callees: &[&str],
) -> (Vec<Unit>, Option<ExtractWarning>) {
    let Some(dialect) = Dialect::from_path(path) else {
        return (
            Vec::new(),
            Some(ExtractWarning {
                file: path.to_path_buf(),
                message: "unsupported file extension".to_string(),
            }),
        );
    };

    match treesitter::extract(path, content, dialect, reactive_effect_hooks, side_effect_callees) {
        Ok(units) => (units, None),
        Err(message) => (
            Vec::new(),
            Some(ExtractWarning {
                file: path.to_path_buf(),
                message,
            }),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unit_id_is_stable_and_span_sensitive() {
        let a = unit_id(Path::new("a.ts"), "foo", 0, 10);
        let b = unit_id(Path::new("a.ts"), "foo", 0, 10);
        let c = unit_id(Path::new("a.ts"), "foo", 0, 11);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
