//! Tree-sitter backed unit extraction for the four FEL dialects.

use super::{unit_id, Dialect, ReactiveEffect, Unit, UnitKind};
use std::path::Path;
use tree_sitter::{Language, Node, Parser};

fn language_for(dialect: Dialect) -> Language {
    match dialect {
        Dialect::TypeScript => tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into(),
        Dialect::Tsx => tree_sitter_typescript::LANGUAGE_TSX.into(),
        Dialect::JavaScript | Dialect::Jsx => tree_sitter_javascript::LANGUAGE.into(),
    }
}

const CONTROL_FLOW_KINDS: &[&str] = &[
    "if_statement",
    "for_statement",
    "for_in_statement",
    "while_statement",
    "do_statement",
    "switch_statement",
    "try_statement",
    "catch_clause",
];

const CALLBACK_KINDS: &[&str] = &["arrow_function", "function_expression"];

const JSX_KINDS: &[&str] = &["jsx_element", "jsx_self_closing_element", "jsx_fragment"];

pub fn extract(
    path: &Path,
    content: &str,
    dialect: Dialect,
    reactive_effect_hooks: &[&str],
    side_effect_callees: &[&str],
) -> Result<Vec<Unit>, String> {
    let mut parser = Parser::new();
    parser
        .set_language(&language_for(dialect))
        .map_err(|e| format!("failed to set language: {e}"))?;

    let tree = parser
        .parse(content, None)
        .ok_or_else(|| "parser returned no tree".to_string())?;

    let source = content.as_bytes();
    let mut units = Vec::new();
    collect_units(
        tree.root_node(),
        source,
        path,
        dialect,
        reactive_effect_hooks,
        side_effect_callees,
        &mut units,
    );
    Ok(units)
}

/// Walk looking for unit-promotable declarations, recursing into class bodies
/// and export wrappers but never into a promoted unit's own body.
fn collect_units(
    node: Node,
    source: &[u8],
    path: &Path,
    dialect: Dialect,
    reactive_effect_hooks: &[&str],
    side_effect_callees: &[&str],
    units: &mut Vec<Unit>,
) {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        match child.kind() {
            "export_statement" => {
                collect_units(
                    child,
                    source,
                    path,
                    dialect,
                    reactive_effect_hooks,
                    side_effect_callees,
                    units,
                );
            }
            "function_declaration" | "generator_function_declaration" => {
                if let Some(name_node) = child.child_by_field_name("name") {
                    let name = text(name_node, source);
                    try_promote(
                        &child,
                        &child,
                        &name,
                        source,
                        path,
                        dialect,
                        reactive_effect_hooks,
                        side_effect_callees,
                        units,
                    );
                }
            }
            "lexical_declaration" | "variable_declaration" => {
                let mut decl_cursor = child.walk();
                for declarator in child.children(&mut decl_cursor) {
                    if declarator.kind() != "variable_declarator" {
                        continue;
                    }
                    let Some(name_node) = declarator.child_by_field_name("name") else {
                        continue;
                    };
                    let Some(value_node) = declarator.child_by_field_name("value") else {
                        continue;
                    };
                    if matches!(value_node.kind(), "arrow_function" | "function_expression") {
                        let name = text(name_node, source);
                        try_promote(
                            &declarator,
                            &value_node,
                            &name,
                            source,
                            path,
                            dialect,
                            reactive_effect_hooks,
                            side_effect_callees,
                            units,
                        );
                    }
                }
            }
            "class_declaration" => {
                if let Some(body) = child.child_by_field_name("body") {
                    let mut body_cursor = body.walk();
                    for member in body.children(&mut body_cursor) {
                        if member.kind() == "method_definition" {
                            if let Some(name_node) = member.child_by_field_name("name") {
                                let name = text(name_node, source);
                                try_promote(
                                    &member,
                                    &member,
                                    &name,
                                    source,
                                    path,
                                    dialect,
                                    reactive_effect_hooks,
                                    side_effect_callees,
                                    units,
                                );
                            }
                        }
                    }
                }
            }
            _ => {
                collect_units(
                    child,
                    source,
                    path,
                    dialect,
                    reactive_effect_hooks,
                    side_effect_callees,
                    units,
                );
            }
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn try_promote(
    span_node: &Node,
    body_owner: &Node,
    name: &str,
    source: &[u8],
    path: &Path,
    dialect: Dialect,
    reactive_effect_hooks: &[&str],
    side_effect_callees: &[&str],
    units: &mut Vec<Unit>,
) {
    let Some(body) = find_body(body_owner) else {
        return;
    };

    let loc = count_loc(*span_node, source);
    let is_hook = name.len() > 3 && name.starts_with("use") && name.as_bytes()[3].is_ascii_uppercase();
    let is_component_name = name.chars().next().is_some_and(|c| c.is_ascii_uppercase());
    let markup_candidate = is_component_name && (dialect.has_markup() || contains_jsx(body, source));

    let kind = if is_hook {
        UnitKind::Hook
    } else if markup_candidate && returns_markup(body) {
        UnitKind::Component
    } else {
        UnitKind::Function
    };

    if kind == UnitKind::Function && loc < 3 {
        return;
    }

    let mut acc = FeatureAccumulator::new(kind, reactive_effect_hooks, side_effect_callees);
    acc.walk(body, source, 0, false);

    let id = unit_id(path, name, span_node.start_byte(), span_node.end_byte());

    units.push(Unit {
        id,
        file: path.to_path_buf(),
        name: name.to_string(),
        kind,
        start_line: span_node.start_position().row as u32 + 1,
        end_line: span_node.end_position().row as u32 + 1,
        loc,
        nesting_depth: acc.max_nesting_depth,
        branch_count: acc.branch_count,
        boolean_operator_count: acc.boolean_operator_count,
        callback_depth: acc.max_callback_depth,
        early_return_count: acc.early_return_count,
        try_catch_count: acc.try_catch_count,
        reactive_effects: acc.reactive_effects,
        render_side_effects: acc.render_side_effects,
        identifiers: acc.identifiers,
        empty_catch_count: acc.empty_catch_count,
        try_without_catch_count: acc.try_without_catch_count,
        unguarded_property_chain_count: acc.unguarded_property_chain_count,
        type_escape_hatch_count: acc.type_escape_hatch_count,
        unstable_inline_handler_count: acc.unstable_inline_handler_count,
        network_call_without_handler_count: acc.network_call_without_handler_count,
        string_literals: acc.string_literals,
        comment_lines: count_comment_lines(*span_node, source),
        source: text(*span_node, source),
    });
}

fn find_body<'a>(owner: &Node<'a>) -> Option<Node<'a>> {
    owner
        .child_by_field_name("body")
        .or_else(|| owner.child_by_field_name("value"))
}

fn text(node: Node, source: &[u8]) -> String {
    node.utf8_text(source).unwrap_or_default().to_string()
}

fn count_loc(node: Node, source: &[u8]) -> usize {
    let text = node.utf8_text(source).unwrap_or_default();
    text.lines()
        .filter(|l| {
            let t = l.trim();
            !t.is_empty() && !t.starts_with("//") && !t.starts_with('*') && !t.starts_with("/*")
        })
        .count()
}

fn contains_jsx(node: Node, _source: &[u8]) -> bool {
    if JSX_KINDS.contains(&node.kind()) {
        return true;
    }
    let mut cursor = node.walk();
    let found = node.children(&mut cursor).any(|c| contains_jsx(c, _source));
    found
}

/// A return statement (or implicit arrow body) whose value is markup anywhere
/// in the unit body, not nested inside another function.
fn returns_markup(node: Node) -> bool {
    if JSX_KINDS.contains(&node.kind()) {
        return true;
    }
    if matches!(node.kind(), "arrow_function" | "function_expression") {
        return false;
    }
    if node.kind() == "return_statement" {
        if let Some(value) = node.named_child(0) {
            return unwrap_parens(value).map(|n| JSX_KINDS.contains(&n.kind())).unwrap_or(false);
        }
        return false;
    }
    let mut cursor = node.walk();
    let found = node.children(&mut cursor).any(returns_markup);
    found
}

fn unwrap_parens(mut node: Node) -> Option<Node> {
    while node.kind() == "parenthesized_expression" {
        node = node.named_child(0)?;
    }
    Some(node)
}

fn member_chain_depth(node: Node) -> usize {
    let mut depth = 0;
    let mut cur = Some(node);
    while let Some(n) = cur {
        if n.kind() != "member_expression" {
            break;
        }
        depth += 1;
        cur = n.child_by_field_name("object");
    }
    depth
}

fn count_comment_lines(node: Node, source: &[u8]) -> usize {
    if matches!(node.kind(), "comment") {
        return text(node, source).lines().count();
    }
    let mut cursor = node.walk();
    node.children(&mut cursor)
        .map(|c| count_comment_lines(c, source))
        .sum()
}

struct FeatureAccumulator<'a> {
    kind: UnitKind,
    reactive_effect_hooks: &'a [&'a str],
    side_effect_callees: &'a [&'a str],
    nesting_depth: usize,
    max_nesting_depth: usize,
    branch_count: usize,
    boolean_operator_count: usize,
    callback_depth: usize,
    max_callback_depth: usize,
    early_return_count: usize,
    try_catch_count: usize,
    reactive_effects: Vec<ReactiveEffect>,
    render_side_effects: usize,
    identifiers: Vec<String>,
    empty_catch_count: usize,
    try_without_catch_count: usize,
    unguarded_property_chain_count: usize,
    type_escape_hatch_count: usize,
    unstable_inline_handler_count: usize,
    network_call_without_handler_count: usize,
    string_literals: Vec<String>,
    try_depth: usize,
}

impl<'a> FeatureAccumulator<'a> {
    fn new(
        kind: UnitKind,
        reactive_effect_hooks: &'a [&'a str],
        side_effect_callees: &'a [&'a str],
    ) -> Self {
        Self {
            kind,
            reactive_effect_hooks,
            side_effect_callees,
            nesting_depth: 0,
            max_nesting_depth: 0,
            branch_count: 0,
            boolean_operator_count: 0,
            callback_depth: 0,
            max_callback_depth: 0,
            early_return_count: 0,
            try_catch_count: 0,
            reactive_effects: Vec::new(),
            render_side_effects: 0,
            identifiers: Vec::new(),
            empty_catch_count: 0,
            try_without_catch_count: 0,
            unguarded_property_chain_count: 0,
            type_escape_hatch_count: 0,
            unstable_inline_handler_count: 0,
            network_call_without_handler_count: 0,
            string_literals: Vec::new(),
            try_depth: 0,
        }
    }

    fn walk(&mut self, node: Node, source: &[u8], tail_depth: usize, inside_effect: bool) {
        let is_control = CONTROL_FLOW_KINDS.contains(&node.kind());
        if is_control {
            self.nesting_depth += 1;
            self.max_nesting_depth = self.max_nesting_depth.max(self.nesting_depth);
        }

        let is_callback = CALLBACK_KINDS.contains(&node.kind());
        if is_callback {
            self.callback_depth += 1;
            self.max_callback_depth = self.max_callback_depth.max(self.callback_depth);
        }

        let is_try = node.kind() == "try_statement";
        if is_try {
            self.try_depth += 1;
        }

        match node.kind() {
            "if_statement" | "switch_case" | "switch_default" | "ternary_expression"
            | "conditional_expression" | "for_statement" | "for_in_statement"
            | "while_statement" | "do_statement" => {
                self.branch_count += 1;
            }
            "try_statement" => {
                self.try_catch_count += 1;
                let mut cursor = node.walk();
                if !node.children(&mut cursor).any(|c| c.kind() == "catch_clause") {
                    self.try_without_catch_count += 1;
                }
            }
            "catch_clause" => {
                if let Some(body) = node.child_by_field_name("body") {
                    let mut cursor = body.walk();
                    if body.named_children(&mut cursor).count() == 0 {
                        self.empty_catch_count += 1;
                    }
                }
            }
            "return_statement" => {
                let is_tail = is_tail_return(node, tail_depth);
                if !is_tail {
                    self.early_return_count += 1;
                }
            }
            "binary_expression" => {
                if let Some(op) = node.child_by_field_name("operator") {
                    let op_text = op.utf8_text(source).unwrap_or_default();
                    if op_text == "&&" || op_text == "||" {
                        self.boolean_operator_count += 1;
                    }
                }
            }
            "identifier" | "shorthand_property_identifier" => {
                self.identifiers.push(text(node, source));
            }
            "string" => {
                self.string_literals.push(text(node, source));
            }
            "predefined_type" => {
                let t = text(node, source);
                if t == "any" || t == "unknown" {
                    self.type_escape_hatch_count += 1;
                }
            }
            "as_expression" => {
                let t = text(node, source);
                if t.ends_with("as any") || t.ends_with("as unknown") {
                    self.type_escape_hatch_count += 1;
                }
            }
            "member_expression" => {
                let is_root = node
                    .parent()
                    .map(|p| p.kind() != "member_expression")
                    .unwrap_or(true);
                if is_root {
                    let depth = member_chain_depth(node);
                    let chain_text = text(node, source);
                    if depth >= 3 && !chain_text.contains("?.") {
                        self.unguarded_property_chain_count += 1;
                    }
                }
            }
            "jsx_attribute" => {
                if let Some(value) = node.child_by_field_name("value") {
                    if value.kind() == "jsx_expression" {
                        if let Some(inner) = value.named_child(0) {
                            if matches!(inner.kind(), "arrow_function" | "function_expression") {
                                self.unstable_inline_handler_count += 1;
                            }
                        }
                    }
                }
            }
            "call_expression" => {
                self.handle_call(node, source, inside_effect);
            }
            _ => {}
        }

        let effect_callback = self.effect_callback_child(node, source);

        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            let child_tail_depth = if is_tail_context(node, child) {
                tail_depth
            } else {
                tail_depth + 1
            };
            let child_inside_effect = inside_effect
                || effect_callback
                    .map(|cb| {
                        child.start_byte() <= cb.start_byte() && cb.end_byte() <= child.end_byte()
                    })
                    .unwrap_or(false);
            self.walk(child, source, child_tail_depth, child_inside_effect);
        }

        if is_control {
            self.nesting_depth -= 1;
        }
        if is_callback {
            self.callback_depth -= 1;
        }
        if is_try {
            self.try_depth -= 1;
        }
    }

    /// If `node` is a call to a reactive-effect hook, returns its callback
    /// argument (the node everything "inside the effect" is nested under).
    fn effect_callback_child<'t>(&self, node: Node<'t>, source: &[u8]) -> Option<Node<'t>> {
        if node.kind() != "call_expression" {
            return None;
        }
        let func = node.child_by_field_name("function")?;
        let callee_name = match func.kind() {
            "identifier" => text(func, source),
            "member_expression" => func
                .child_by_field_name("object")
                .map(|o| text(o, source))
                .unwrap_or_default(),
            _ => return None,
        };
        if !self.reactive_effect_hooks.contains(&callee_name.as_str()) {
            return None;
        }
        let args = node.child_by_field_name("arguments")?;
        let mut cursor = args.walk();
        let found = args
            .named_children(&mut cursor)
            .find(|n| matches!(n.kind(), "arrow_function" | "function_expression"));
        found
    }

    fn handle_call(&mut self, node: Node, source: &[u8], inside_effect: bool) {
        let Some(func) = node.child_by_field_name("function") else {
            return;
        };
        let callee_name = match func.kind() {
            "identifier" => text(func, source),
            "member_expression" => func
                .child_by_field_name("object")
                .map(|o| text(o, source))
                .unwrap_or_default(),
            _ => return,
        };

        if self.reactive_effect_hooks.contains(&callee_name.as_str()) {
            self.reactive_effects.push(self.parse_effect(node, source));
            return;
        }

        if self.side_effect_callees.contains(&callee_name.as_str()) {
            if !inside_effect && self.kind == UnitKind::Component {
                self.render_side_effects += 1;
            }
            if self.try_depth == 0 {
                self.network_call_without_handler_count += 1;
            }
        }
    }

    fn parse_effect(&self, call: Node, source: &[u8]) -> ReactiveEffect {
        let mut deps = Vec::new();
        let mut has_cleanup = false;

        if let Some(args) = call.child_by_field_name("arguments") {
            let named: Vec<Node> = {
                let mut c = args.walk();
                args.named_children(&mut c).collect()
            };

            if let Some(callback) = named.first() {
                has_cleanup = callback_has_cleanup(*callback);
            }

            if let Some(dep_array) = named.get(1) {
                if dep_array.kind() == "array" {
                    let mut c = dep_array.walk();
                    for item in dep_array.named_children(&mut c) {
                        if item.kind() == "identifier" || item.kind() == "member_expression" {
                            deps.push(text(item, source));
                        }
                    }
                }
            }
        }

        ReactiveEffect { deps, has_cleanup }
    }
}

fn callback_has_cleanup(callback: Node) -> bool {
    let Some(body) = callback.child_by_field_name("body") else {
        return false;
    };
    if matches!(body.kind(), "arrow_function" | "function_expression") {
        return true;
    }
    if body.kind() != "statement_block" {
        return false;
    }
    let mut cursor = body.walk();
    let found = body.named_children(&mut cursor).any(|stmt| {
        stmt.kind() == "return_statement"
            && stmt
                .named_child(0)
                .map(|v| matches!(v.kind(), "arrow_function" | "function_expression"))
                .unwrap_or(false)
    });
    found
}

/// A return is in tail position only when it is a direct, unnested statement
/// of the unit's own body block (tail_depth == 0).
fn is_tail_return(_node: Node, tail_depth: usize) -> bool {
    tail_depth == 0
}

/// A child is still in "tail context" of its parent only when the parent is a
/// transparent wrapper around a single trailing statement.
fn is_tail_context(parent: Node, child: Node) -> bool {
    match parent.kind() {
        "statement_block" | "program" => {
            let mut cursor = parent.walk();
            let last = parent.named_children(&mut cursor).last();
            last.map(|n| n.id() == child.id()).unwrap_or(false)
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::{REACTIVE_EFFECT_HOOKS, SIDE_EFFECT_CALLEES};
    use std::path::PathBuf;

    fn run(src: &str, path: &str) -> Vec<Unit> {
        let dialect = Dialect::from_path(Path::new(path)).unwrap();
        extract(
            &PathBuf::from(path),
            src,
            dialect,
            REACTIVE_EFFECT_HOOKS,
            SIDE_EFFECT_CALLEES,
        )
        .unwrap()
    }

    #[test]
    fn promotes_plain_function() {
        let src = r#"
function refreshTokenIfExpired(token) {
    if (token.expired) {
        if (token.refreshable) {
            return refresh(token);
        }
    }
    return token;
}
"#;
        let units = run(src, "a.ts");
        assert_eq!(units.len(), 1);
        assert_eq!(units[0].kind, UnitKind::Function);
        assert_eq!(units[0].name, "refreshTokenIfExpired");
        assert!(units[0].nesting_depth >= 2);
    }

    #[test]
    fn promotes_hook_over_component_name() {
        let src = r#"
function useDataFetch(url) {
    useEffect(() => {
        fetch(url);
        return () => {};
    }, [url]);
    return null;
}
"#;
        let units = run(src, "a.ts");
        assert_eq!(units.len(), 1);
        assert_eq!(units[0].kind, UnitKind::Hook);
        assert_eq!(units[0].reactive_effects.len(), 1);
        assert!(units[0].reactive_effects[0].has_cleanup);
        assert_eq!(units[0].reactive_effects[0].deps, vec!["url".to_string()]);
    }

    #[test]
    fn detects_component_with_markup_and_render_side_effect() {
        let src = r#"
function Widget(props) {
    fetch("/api/widget");
    return <div>{props.name}</div>;
}
"#;
        let units = run(src, "a.tsx");
        assert_eq!(units.len(), 1);
        assert_eq!(units[0].kind, UnitKind::Component);
        assert_eq!(units[0].render_side_effects, 1);
    }

    #[test]
    fn skips_short_functions() {
        let src = "function tiny() { return 1; }";
        let units = run(src, "a.ts");
        assert!(units.is_empty());
    }

    #[test]
    fn arrow_assignment_is_promoted() {
        let src = r#"
const formatResponse = (response) => {
    const value = response.value;
    return value.trim();
};
"#;
        let units = run(src, "a.ts");
        assert_eq!(units.len(), 1);
        assert_eq!(units[0].name, "formatResponse");
    }

    #[test]
    fn fetch_wrapped_in_use_effect_is_not_a_render_side_effect() {
        let src = r#"
function Widget(props) {
    useEffect(() => {
        fetch("/api/widget");
    }, []);
    return <div>{props.name}</div>;
}
"#;
        let units = run(src, "a.tsx");
        assert_eq!(units.len(), 1);
        assert_eq!(units[0].render_side_effects, 0);
    }

    #[test]
    fn loop_statements_count_as_branches() {
        let src = r#"
function sumAll(items) {
    let total = 0;
    for (const item of items) {
        total += item;
    }
    while (total > 1000) {
        total -= 1;
    }
    return total;
}
"#;
        let units = run(src, "a.ts");
        assert_eq!(units.len(), 1);
        assert!(units[0].branch_count >= 2);
    }

    #[test]
    fn try_without_catch_is_tracked() {
        let src = r#"
function cleanupResource(resource) {
    try {
        resource.release();
    } finally {
        resource.dispose();
    }
    return resource;
}
"#;
        let units = run(src, "a.ts");
        assert_eq!(units.len(), 1);
        assert_eq!(units[0].try_without_catch_count, 1);
        assert_eq!(units[0].empty_catch_count, 0);
    }
}
