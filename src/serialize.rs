//! Declaration trees and their flattening into compiled rules.
//!
//! Rule generators produce a [`StyleObject`]: an ordered tree of
//! declarations, nested selector scopes, and at-rule scopes. [`serialize`]
//! walks the tree depth-first and emits one [`CompiledRule`] per scope,
//! accumulating wrapping conditions and folding condition weights into the
//! precedence as it descends. [`css_text`] then realizes a compiled rule as
//! a physical CSS string.

use std::sync::OnceLock;

use regex::Regex;

use crate::context::Context;
use crate::precedence::{
    order_score, property_weight, CompiledRule, Layer, Precedence,
};
use crate::rules;
use crate::theme::{media_query, substitute_theme_refs};
use crate::value::{class_hash, escape_css, kebab};

/// A declaration value: single, or repeated for fallback chains.
#[derive(Debug, Clone, PartialEq)]
pub enum StyleNode {
    Value(String),
    /// Repeated declarations of the same property, in order.
    Values(Vec<String>),
    Nested(StyleObject),
}

/// An ordered declaration tree. Keys are CSS properties (camelCase or
/// kebab-case), nested selectors containing `&`, or at-rules.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StyleObject {
    entries: Vec<(String, StyleNode)>,
}

impl StyleObject {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from flat property/value pairs.
    pub fn from_decls(decls: &[(&str, &str)]) -> Self {
        let mut obj = Self::new();
        for (prop, value) in decls {
            obj.push(prop, StyleNode::Value((*value).to_owned()));
        }
        obj
    }

    pub fn decl(mut self, prop: &str, value: impl Into<String>) -> Self {
        self.push(prop, StyleNode::Value(value.into()));
        self
    }

    pub fn values(mut self, prop: &str, values: &[&str]) -> Self {
        self.push(
            prop,
            StyleNode::Values(values.iter().map(|v| (*v).to_owned()).collect()),
        );
        self
    }

    pub fn nested(mut self, key: &str, inner: StyleObject) -> Self {
        self.push(key, StyleNode::Nested(inner));
        self
    }

    pub fn push_import(mut self, value: &str) -> Self {
        self.push("@import", StyleNode::Value(value.to_owned()));
        self
    }

    pub fn push(&mut self, key: &str, node: StyleNode) {
        self.entries.push((key.to_owned(), node));
    }

    pub fn iter(&self) -> impl Iterator<Item = &(String, StyleNode)> {
        self.entries.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Metadata carried down a serialization walk.
#[derive(Debug, Clone)]
pub struct RuleMeta {
    pub name: Option<String>,
    pub prec: Precedence,
    /// Wrapping conditions accumulated so far, outermost first.
    pub conds: Vec<String>,
    pub important: bool,
}

impl RuleMeta {
    pub fn anonymous(layer: Layer) -> Self {
        Self {
            name: None,
            prec: Precedence::of(layer),
            conds: Vec::new(),
            important: false,
        }
    }
}

fn screen_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\bscreen\(([^)]+)\)").expect("screen pattern"))
}

/// Flatten a declaration tree into compiled rules, sorted by precedence.
///
/// The rule for the current scope comes first in source terms (it is built
/// from the scalar entries), then nested scopes; a final stable sort puts
/// every emitted rule in cascade order.
pub fn serialize(obj: &StyleObject, meta: RuleMeta, ctx: &Context) -> Vec<CompiledRule> {
    let mut out: Vec<CompiledRule> = Vec::new();
    let mut decls = String::new();
    let mut decl_count = 0u32;
    let mut max_weight = 0u32;
    let mut name = meta.name.clone();

    for (key, node) in obj.iter() {
        if let Some(rest) = key.strip_prefix('@') {
            serialize_at_rule(key, rest, node, &meta, &name, ctx, &mut out);
            continue;
        }

        if let StyleNode::Nested(inner) = node {
            let mut conds = meta.conds.clone();
            conds.push(key.clone());
            let child = if key.contains('&') {
                let mut prec = meta.prec;
                prec.add_selector(key);
                RuleMeta {
                    name: name.clone(),
                    prec,
                    conds,
                    important: meta.important,
                }
            } else {
                // A plain-key scope (e.g. preflight's `body`) is unnamed and
                // never inherits importance.
                RuleMeta {
                    name: None,
                    prec: meta.prec,
                    conds,
                    important: false,
                }
            };
            out.extend(serialize(inner, child, ctx));
            continue;
        }

        // Scalar entries build the current scope's declaration list.
        if key == "label" {
            if let StyleNode::Value(label) = node {
                let seed = format!(
                    "{}|{:?}|{}",
                    meta.prec.rank(),
                    meta.conds,
                    meta.important
                );
                name = Some(format!("{label}{}", class_hash(&seed)));
            }
            continue;
        }
        let prop = kebab(key);
        let values: Vec<&String> = match node {
            StyleNode::Value(v) => vec![v],
            StyleNode::Values(vs) => vs.iter().collect(),
            StyleNode::Nested(_) => unreachable!("nested handled above"),
        };
        let mut emitted = false;
        for value in values {
            if value.is_empty() {
                continue;
            }
            let value = substitute_theme_refs(value, ctx.theme());
            if !decls.is_empty() {
                decls.push(';');
            }
            decls.push_str(&prop);
            decls.push(':');
            decls.push_str(&value);
            if meta.important {
                decls.push_str(" !important");
            }
            emitted = true;
        }
        if emitted {
            decl_count += 1;
            max_weight = max_weight.max(property_weight(&prop));
        }
    }

    out.insert(
        0,
        CompiledRule {
            name,
            class_token: None,
            prec: meta.prec,
            order: order_score(decl_count, max_weight),
            conds: meta.conds.clone(),
            decls,
        },
    );
    out.sort_by(crate::precedence::cmp_rules);
    out
}

fn serialize_at_rule(
    key: &str,
    rest: &str,
    node: &StyleNode,
    meta: &RuleMeta,
    current_name: &Option<String>,
    ctx: &Context,
    out: &mut Vec<CompiledRule>,
) {
    if key.starts_with("@apply") {
        if let StyleNode::Value(classes) = node {
            out.extend(rules::apply_classes(
                current_name.clone(),
                meta.prec,
                classes,
                ctx,
                &meta.conds,
                meta.important,
            ));
        }
        return;
    }

    if let Some(layer_name) = rest.strip_prefix("layer ") {
        if let (Some(layer), StyleNode::Nested(inner)) =
            (Layer::from_name(layer_name.trim()), node)
        {
            // The defaults layer escapes whatever scope declared it.
            let conds = if layer == Layer::Defaults {
                Vec::new()
            } else {
                meta.conds.clone()
            };
            let child = RuleMeta {
                name: current_name.clone(),
                prec: meta.prec.with_layer(layer),
                conds,
                important: meta.important,
            };
            out.extend(serialize(inner, child, ctx));
        }
        return;
    }

    if key.starts_with("@import") {
        let values: Vec<String> = match node {
            StyleNode::Value(v) => vec![v.clone()],
            StyleNode::Values(vs) => vs.clone(),
            StyleNode::Nested(_) => Vec::new(),
        };
        for value in values {
            out.push(CompiledRule {
                name: None,
                class_token: None,
                prec: Precedence::of(Layer::Imports),
                order: 0.0,
                conds: Vec::new(),
                decls: format!("@import {value}"),
            });
        }
        return;
    }

    if key.starts_with("@keyframes") || key.starts_with("@font-face") {
        if let StyleNode::Nested(inner) = node {
            let body: String = serialize(inner, RuleMeta::anonymous(Layer::Defaults), ctx)
                .iter()
                .filter_map(css_text)
                .collect();
            let decls = if key.starts_with("@font-face") {
                // Font faces carry bare declarations, not keyed blocks.
                serialize(inner, RuleMeta::anonymous(Layer::Defaults), ctx)
                    .first()
                    .map(|r| r.decls.clone())
                    .unwrap_or_default()
            } else {
                body
            };
            out.push(CompiledRule {
                name: None,
                class_token: None,
                prec: Precedence::of(Layer::Defaults),
                order: 0.0,
                conds: vec![key.to_owned()],
                decls,
            });
        }
        return;
    }

    // Conditional at-rule: @media, @supports, and friends.
    if let StyleNode::Nested(inner) = node {
        let mut prec = meta.prec;
        let cond = screen_re()
            .replace_all(key, |caps: &regex::Captures<'_>| {
                prec.screen = true;
                match ctx.theme().lookup("screens", &caps[1]) {
                    Some(v) => media_query(&v, ""),
                    None => String::new(),
                }
            })
            .into_owned();
        prec.add_condition(&cond);
        let mut conds = meta.conds.clone();
        conds.push(cond);
        let child = RuleMeta {
            name: current_name.clone(),
            prec,
            conds,
            important: meta.important,
        };
        out.extend(serialize(inner, child, ctx));
    }
}

// ── physical CSS realization ─────────────────────────────────────────

fn merge_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(:merge\(.+?\))(:[a-z-]+|\\.)").expect("merge pattern"))
}

fn merge_strip_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r":merge\((.+?)\)").expect("merge strip pattern"))
}

/// Realize a compiled rule as CSS text, or `None` when it has no body.
///
/// Selector conditions fold into each other by substituting the accumulated
/// selector for `&`; `:merge(...)` markers collapse so that e.g. stacked
/// `group-*` variants share one marker class. At-rules wrap outermost-first.
pub fn css_text(rule: &CompiledRule) -> Option<String> {
    if rule.decls.is_empty() {
        return None;
    }

    let mut at_rules: Vec<&str> = Vec::new();
    let mut selector = String::from("&");
    for cond in &rule.conds {
        if cond.starts_with('@') {
            at_rules.push(cond);
        } else {
            selector = merge_selector(&selector, cond);
        }
    }

    let class_selector = match &rule.name {
        Some(name) => format!(".{}", escape_css(name)),
        None => String::new(),
    };
    let selector = map_comma_parts(&selector, |part| part.replace('&', &class_selector));
    let selector = merge_strip_re().replace_all(&selector, "$1").into_owned();

    let mut body = rule.decls.clone();
    if !selector.is_empty() {
        body = format!("{selector}{{{body}}}");
    }
    for at in at_rules.iter().rev() {
        body = format!("{at}{{{body}}}");
    }
    Some(body)
}

/// Fold a new selector condition into the accumulated one, cross-producing
/// comma alternatives.
fn merge_selector(acc: &str, cond: &str) -> String {
    map_comma_parts(acc, |acc_part| {
        map_comma_parts(cond, |cond_part| combine(acc_part, cond_part))
    })
}

fn combine(acc: &str, cond: &str) -> String {
    if let Some(caps) = merge_re().captures(cond) {
        let marker = &caps[1];
        if let Some(at) = acc.find(marker) {
            // Same marker already present: splice the new suffix onto it.
            let insert = &caps[0];
            return format!("{}{}{}", &acc[..at], insert, &acc[at + marker.len()..]);
        }
        return acc.replace('&', cond);
    }
    cond.replace('&', acc)
}

/// Apply `f` to each top-level comma-separated part, respecting `()` and
/// `[]` nesting, and re-join.
fn map_comma_parts(s: &str, mut f: impl FnMut(&str) -> String) -> String {
    let mut parts: Vec<String> = Vec::new();
    let mut depth = 0usize;
    let mut start = 0usize;
    for (i, b) in s.bytes().enumerate() {
        match b {
            b'(' | b'[' => depth += 1,
            b')' | b']' => depth = depth.saturating_sub(1),
            b',' if depth == 0 => {
                parts.push(f(s[start..i].trim()));
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(f(s[start..].trim()));
    parts.join(",")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::context::Context;

    fn ctx() -> Context {
        Context::new(crate::config::resolve(Config::default()))
    }

    fn named(name: &str) -> RuleMeta {
        RuleMeta {
            name: Some(name.to_owned()),
            prec: Precedence::of(Layer::Utilities),
            conds: Vec::new(),
            important: false,
        }
    }

    // ── flat declarations ────────────────────────────────────────────

    #[test]
    fn flat_decls_serialize_in_order() {
        let obj = StyleObject::from_decls(&[("padding", "1rem"), ("margin", "0")]);
        let rules = serialize(&obj, named("p-4"), &ctx());
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].decls, "padding:1rem;margin:0");
        assert_eq!(css_text(&rules[0]).as_deref(), Some(".p-4{padding:1rem;margin:0}"));
    }

    #[test]
    fn camel_case_props_kebab() {
        let obj = StyleObject::new().decl("backgroundColor", "red");
        let rules = serialize(&obj, named("x"), &ctx());
        assert_eq!(rules[0].decls, "background-color:red");
    }

    #[test]
    fn value_lists_repeat_the_property() {
        let obj = StyleObject::new().values("display", &["flex", "grid"]);
        let rules = serialize(&obj, named("x"), &ctx());
        assert_eq!(rules[0].decls, "display:flex;display:grid");
    }

    #[test]
    fn important_suffixes_every_declaration() {
        let mut meta = named("x");
        meta.important = true;
        let obj = StyleObject::from_decls(&[("color", "red"), ("margin", "0")]);
        let rules = serialize(&obj, meta, &ctx());
        assert_eq!(rules[0].decls, "color:red !important;margin:0 !important");
    }

    #[test]
    fn empty_values_are_skipped() {
        let obj = StyleObject::new().decl("color", "").decl("margin", "0");
        let rules = serialize(&obj, named("x"), &ctx());
        assert_eq!(rules[0].decls, "margin:0");
    }

    // ── nesting ──────────────────────────────────────────────────────

    #[test]
    fn nested_selector_scope_keeps_name() {
        let obj = StyleObject::new()
            .decl("color", "red")
            .nested("&:hover", StyleObject::new().decl("color", "blue"));
        let rules = serialize(&obj, named("x"), &ctx());
        assert_eq!(rules.len(), 2);
        assert_eq!(css_text(&rules[0]).as_deref(), Some(".x{color:red}"));
        assert_eq!(css_text(&rules[1]).as_deref(), Some(".x:hover{color:blue}"));
    }

    #[test]
    fn plain_key_scope_is_unnamed() {
        let obj = StyleObject::new().nested("body", StyleObject::new().decl("margin", "0"));
        let rules = serialize(&obj, named("x"), &ctx());
        let body = rules.iter().find(|r| !r.decls.is_empty()).expect("body rule");
        assert_eq!(body.name, None);
        assert_eq!(css_text(body).as_deref(), Some("body{margin:0}"));
    }

    #[test]
    fn media_scope_wraps_and_weighs() {
        let obj = StyleObject::new().nested(
            "@media (min-width:640px)",
            StyleObject::new().decl("color", "red"),
        );
        let rules = serialize(&obj, named("x"), &ctx());
        let media = rules.iter().find(|r| !r.decls.is_empty()).expect("media rule");
        assert!(media.prec.responsive > 0);
        assert_eq!(
            css_text(media).as_deref(),
            Some("@media (min-width:640px){.x{color:red}}")
        );
    }

    #[test]
    fn screen_reference_substitutes_breakpoint() {
        let obj = StyleObject::new().nested(
            "@media screen(sm)",
            StyleObject::new().decl("color", "red"),
        );
        let rules = serialize(&obj, named("x"), &ctx());
        let media = rules.iter().find(|r| !r.decls.is_empty()).expect("media rule");
        assert!(media.prec.screen);
        assert_eq!(media.conds, vec!["@media (min-width:640px)".to_owned()]);
    }

    // ── at-rule leaves ───────────────────────────────────────────────

    #[test]
    fn import_lifts_to_import_layer() {
        let obj = StyleObject::new().push_import("url(theme.css)");
        let rules = serialize(&obj, named("x"), &ctx());
        let import = rules.first().expect("import first");
        assert_eq!(import.prec.layer, Layer::Imports);
        assert_eq!(css_text(import).as_deref(), Some("@import url(theme.css)"));
    }

    #[test]
    fn keyframes_serialize_as_one_rule() {
        let frames = StyleObject::new()
            .nested("from", StyleObject::new().decl("opacity", "0"))
            .nested("to", StyleObject::new().decl("opacity", "1"));
        let obj = StyleObject::new().nested("@keyframes fade", frames);
        let rules = serialize(&obj, named("x"), &ctx());
        let kf = rules.iter().find(|r| !r.decls.is_empty()).expect("keyframes rule");
        assert_eq!(
            css_text(kf).as_deref(),
            Some("@keyframes fade{from{opacity:0}to{opacity:1}}")
        );
        assert_eq!(kf.prec.layer, Layer::Defaults);
    }

    #[test]
    fn font_face_serializes_bare_declarations() {
        let obj = StyleObject::new().nested(
            "@font-face",
            StyleObject::new()
                .decl("font-family", "Inter")
                .decl("src", "url(inter.woff2)"),
        );
        let rules = serialize(&obj, named("x"), &ctx());
        let ff = rules.iter().find(|r| !r.decls.is_empty()).expect("font-face rule");
        assert_eq!(
            css_text(ff).as_deref(),
            Some("@font-face{font-family:Inter;src:url(inter.woff2)}")
        );
    }

    #[test]
    fn layer_key_moves_scope() {
        let obj = StyleObject::new().nested(
            "@layer components",
            StyleObject::new().decl("color", "red"),
        );
        let rules = serialize(&obj, named("btn"), &ctx());
        let comp = rules.iter().find(|r| !r.decls.is_empty()).expect("component rule");
        assert_eq!(comp.prec.layer, Layer::Components);
        assert_eq!(comp.name.as_deref(), Some("btn"));
    }

    // ── label ────────────────────────────────────────────────────────

    #[test]
    fn label_overrides_name_with_hash() {
        let obj = StyleObject::new().decl("label", "card").decl("color", "red");
        let rules = serialize(&obj, named("x"), &ctx());
        let name = rules[0].name.as_deref().expect("labelled");
        assert!(name.starts_with("card#"));
    }

    // ── selector realization ─────────────────────────────────────────

    #[test]
    fn comma_parts_cross_product() {
        let rule = CompiledRule {
            name: Some("x".to_owned()),
            class_token: None,
            prec: Precedence::of(Layer::Utilities),
            order: 0.0,
            conds: vec!["&:hover,&:focus".to_owned()],
            decls: "color:red".to_owned(),
        };
        assert_eq!(
            css_text(&rule).as_deref(),
            Some(".x:hover,.x:focus{color:red}")
        );
    }

    #[test]
    fn merge_markers_collapse_into_one_class() {
        let rule = CompiledRule {
            name: Some("x".to_owned()),
            class_token: None,
            prec: Precedence::of(Layer::Utilities),
            order: 0.0,
            conds: vec![
                ":merge(.group):hover &".to_owned(),
                ":merge(.group):focus &".to_owned(),
            ],
            decls: "color:red".to_owned(),
        };
        assert_eq!(
            css_text(&rule).as_deref(),
            Some(".group:focus:hover .x{color:red}")
        );
    }

    #[test]
    fn distinct_merge_markers_stack() {
        let rule = CompiledRule {
            name: Some("x".to_owned()),
            class_token: None,
            prec: Precedence::of(Layer::Utilities),
            order: 0.0,
            conds: vec![
                ":merge(.peer):focus~&".to_owned(),
                ":merge(.group):hover &".to_owned(),
            ],
            decls: "color:red".to_owned(),
        };
        assert_eq!(
            css_text(&rule).as_deref(),
            Some(".peer:focus~.group:hover .x{color:red}")
        );
    }

    #[test]
    fn empty_decls_yield_no_css() {
        let rule = CompiledRule::passthrough("whatever".to_owned());
        assert_eq!(css_text(&rule), None);
    }

    #[test]
    fn at_rules_wrap_outermost_first() {
        let rule = CompiledRule {
            name: Some("x".to_owned()),
            class_token: None,
            prec: Precedence::of(Layer::Utilities),
            order: 0.0,
            conds: vec![
                "@media (min-width:640px)".to_owned(),
                "&:hover".to_owned(),
                "@supports (display:grid)".to_owned(),
            ],
            decls: "color:red".to_owned(),
        };
        assert_eq!(
            css_text(&rule).as_deref(),
            Some("@media (min-width:640px){@supports (display:grid){.x:hover{color:red}}}")
        );
    }
}
