//! Token normalization for near-duplicate detection (spec §4.6).
//!
//! Comments and whitespace are stripped; identifiers, string literals, and
//! numeric literals are replaced with placeholder tokens so that two Units
//! differing only in naming or literal values still shingle identically.
//! Keywords and symbols are preserved verbatim to keep control-flow shape
//! visible to the shingle comparison.

use crate::core::config::{REACTIVE_EFFECT_HOOKS, SIDE_EFFECT_CALLEES};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

const KEYWORDS: &[&str] = &[
    "function", "return", "if", "else", "for", "while", "do", "switch", "case", "default",
    "break", "continue", "try", "catch", "finally", "throw", "new", "delete", "typeof",
    "instanceof", "in", "of", "const", "let", "var", "class", "extends", "super", "this",
    "import", "export", "from", "as", "async", "await", "yield", "static", "get", "set",
    "null", "undefined", "true", "false", "void", "interface", "type", "enum", "namespace",
    "public", "private", "protected", "readonly", "abstract", "implements", "is", "keyof",
];

/// Common built-ins whose shape carries API signal a shingle comparison
/// should keep distinguishable rather than collapsing to `_VAR`.
const COMMON_BUILTINS: &[&str] = &[
    "useState", "useRef", "useMemo", "useCallback", "useContext", "useReducer", "console",
    "Object", "Array", "Math", "JSON", "Promise", "Map", "Set", "Error", "window", "document",
];

/// Reserved words, common built-ins, and the reactive-effect vocabulary preserved
/// verbatim in shingles (spec §4.6).
static ALLOWLIST: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    KEYWORDS
        .iter()
        .chain(COMMON_BUILTINS.iter())
        .chain(REACTIVE_EFFECT_HOOKS.iter())
        .chain(SIDE_EFFECT_CALLEES.iter())
        .copied()
        .collect()
});

static COMMENT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"//[^\n]*|/\*[\s\S]*?\*/").expect("valid regex"));

static TOKEN_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"(?x)
        [A-Za-z_$][A-Za-z0-9_$]*      # identifier / keyword
        | \d+(\.\d+)?                  # number
        | "(?:[^"\\]|\\.)*"            # double-quoted string
        | '(?:[^'\\]|\\.)*'            # single-quoted string
        | `(?:[^`\\]|\\.)*`            # template string
        | =>|===|!==|==|!=|<=|>=|&&|\|\||\+\+|--|\?\.|\.\.\.
        | \S                           # any other symbol
        "#,
    )
    .expect("valid regex")
});

fn normalize_token(token: &str) -> String {
    let bytes = token.as_bytes();
    let first = bytes[0] as char;

    if first == '"' || first == '\'' || first == '`' {
        return "_STR".to_string();
    }
    if first.is_ascii_digit() {
        return "_NUM".to_string();
    }
    if first.is_alphabetic() || first == '_' || first == '$' {
        if ALLOWLIST.contains(token) {
            return token.to_string();
        }
        return "_VAR".to_string();
    }
    token.to_string()
}

/// Normalized token stream for a Unit's source text.
fn tokenize(source: &str) -> Vec<String> {
    let stripped = COMMENT_RE.replace_all(source, " ");
    TOKEN_RE
        .find_iter(&stripped)
        .map(|m| normalize_token(m.as_str()))
        .collect()
}

/// k-gram shingles over the normalized token stream.
pub fn shingles(source: &str, k: usize) -> HashSet<String> {
    let tokens = tokenize(source);
    if tokens.len() < k || k == 0 {
        return tokens.into_iter().collect::<HashSet<_>>();
    }
    tokens
        .windows(k)
        .map(|w| w.join(" "))
        .collect::<HashSet<_>>()
}
