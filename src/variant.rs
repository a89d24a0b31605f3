//! Variant resolution: tokens before the last `:` become conditions.
//!
//! A variant token resolves, in order, to: a configured screen (media
//! query), a registered [`Variant`] from the active presets, or the literal
//! pseudo-class `&:<token>` as a fallback. [`resolve_spec`] runs the chain
//! for every variant of a parsed spec and folds the resulting weights into
//! the rule's precedence.

use std::rc::Rc;

use regex::Regex;

use crate::context::Context;
use crate::parse::UtilitySpec;
use crate::precedence::Precedence;
use crate::rules::anchor_pattern;
use crate::serialize::RuleMeta;
use crate::theme::media_query;
use crate::value::{escape_css, normalize_arbitrary};

type VariantFn = Rc<dyn Fn(&VariantMatch, &Context) -> Option<String>>;

/// A captured variant-pattern match.
pub struct VariantMatch {
    pub input: String,
    groups: Vec<Option<String>>,
}

impl VariantMatch {
    /// Capture group by 1-based index.
    pub fn group(&self, i: usize) -> Option<&str> {
        self.groups.get(i.checked_sub(1)?)?.as_deref()
    }
}

/// A variant definition: patterns plus a resolver producing a condition
/// (a selector containing `&`, or an at-rule).
#[derive(Clone)]
pub struct Variant {
    patterns: Vec<Regex>,
    resolve: VariantFn,
}

impl Variant {
    /// Patterns are anchored like rule patterns: always at the start, and at
    /// the end unless the pattern ends with `-` or contains `$`.
    pub fn new(
        patterns: &[&str],
        resolve: impl Fn(&VariantMatch, &Context) -> Option<String> + 'static,
    ) -> Self {
        let patterns = patterns
            .iter()
            .filter_map(|p| Regex::new(&anchor_pattern(p)).ok())
            .collect();
        Self {
            patterns,
            resolve: Rc::new(resolve),
        }
    }

    /// A fixed-condition variant.
    pub fn stat(pattern: &str, condition: &str) -> Self {
        let condition = condition.to_owned();
        Self::new(&[pattern], move |_, _| Some(condition.clone()))
    }

    pub fn try_resolve(&self, token: &str, ctx: &Context) -> Option<String> {
        for re in &self.patterns {
            if let Some(caps) = re.captures(token) {
                let m = VariantMatch {
                    input: token.to_owned(),
                    groups: (1..caps.len())
                        .map(|i| caps.get(i).map(|g| g.as_str().to_owned()))
                        .collect(),
                };
                if let Some(cond) = (self.resolve)(&m, ctx) {
                    return Some(cond);
                }
            }
        }
        None
    }
}

impl std::fmt::Debug for Variant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Variant")
            .field("patterns", &self.patterns)
            .finish_non_exhaustive()
    }
}

/// The built-in variants every configuration starts from.
///
/// Ordering matters: earlier variants win, and user variants are appended
/// after these.
pub fn builtin_variants() -> Vec<Variant> {
    vec![
        // Arbitrary variant: `[&>b]:`, `[.sidebar_&]:`, `[@media(...)]:`.
        Variant::new(&[r"\[(.+)]$"], |m, _| {
            let inner = normalize_arbitrary(m.group(1)?);
            Some(if inner.starts_with('@') || inner.contains('&') {
                inner
            } else {
                format!("&{inner}")
            })
        }),
        // group-hover, peer-checked/scope, with an optional `~` forcing the
        // sibling combinator (peers always use it).
        Variant::new(&[r"(group|peer)-([a-z-]+?)(?:/([\w-]+))?(~)?$"], |m, ctx| {
            let kind = m.group(1)?;
            let state = m.group(2)?;
            let sibling = kind == "peer" || m.group(4).is_some();
            let mut marker = kind.to_owned();
            if let Some(scope) = m.group(3) {
                marker.push('/');
                marker.push_str(scope);
            }
            let marker = ctx.marker_class(&marker);
            Some(format!(
                ":merge(.{}):{state}{}&",
                escape_css(&marker),
                if sibling { "~" } else { " " }
            ))
        }),
        Variant::stat("first-letter", "&::first-letter"),
        Variant::stat("first-line", "&::first-line"),
        Variant::stat("marker", "&::marker"),
        Variant::stat("selection", "&::selection"),
        Variant::stat("before", "&::before"),
        Variant::stat("after", "&::after"),
        Variant::stat("placeholder", "&::placeholder"),
        Variant::stat("first", "&:first-child"),
        Variant::stat("last", "&:last-child"),
        Variant::stat("even", "&:nth-child(2n)"),
        Variant::stat("odd", "&:nth-child(odd)"),
        Variant::stat("open", "&[open]"),
        Variant::stat("motion-safe", "@media (prefers-reduced-motion:no-preference)"),
        Variant::stat("motion-reduce", "@media (prefers-reduced-motion:reduce)"),
        Variant::stat("print", "@media print"),
        Variant::stat("portrait", "@media (orientation:portrait)"),
        Variant::stat("landscape", "@media (orientation:landscape)"),
    ]
}

/// Resolve every variant of `spec` into conditions and build the rule
/// metadata for serialization.
pub fn resolve_spec(
    spec: &UtilitySpec,
    base: Precedence,
    extra_conds: &[String],
    ctx: &Context,
) -> RuleMeta {
    let name = if spec.name.is_empty() {
        None
    } else {
        Some(spec.class_name())
    };
    let mut prec = base;
    let mut conds = extra_conds.to_vec();

    for token in &spec.variants {
        // Screens shadow same-named variants.
        let screen = ctx.theme().lookup("screens", token);
        let cond = match &screen {
            Some(value) => media_query(value, "@media "),
            None => ctx.variant(token),
        };
        if screen.is_some() {
            prec.screen = true;
            prec.add_condition(&cond);
        } else if token == "dark" {
            // The dark bit alone places these; the query adds no weight.
            prec.dark = true;
        } else if cond.starts_with('@') {
            prec.add_condition(&cond);
        } else {
            prec.add_selector(&cond);
        }
        conds.push(cond);
    }

    RuleMeta {
        name,
        prec,
        conds,
        important: spec.important,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::parse::parse_class;
    use crate::precedence::Layer;

    fn ctx() -> Context {
        Context::new(crate::config::resolve(Config::default()))
    }

    fn meta_for(class: &str, ctx: &Context) -> RuleMeta {
        let specs = parse_class(class);
        resolve_spec(&specs[0], Precedence::of(Layer::Utilities), &[], ctx)
    }

    // ── resolution chain ─────────────────────────────────────────────

    #[test]
    fn screen_resolves_to_media_query() {
        let ctx = ctx();
        let meta = meta_for("sm:p-4", &ctx);
        assert_eq!(meta.conds, vec!["@media (min-width:640px)".to_owned()]);
        assert!(meta.prec.screen);
        assert!(meta.prec.responsive > 0);
    }

    #[test]
    fn known_pseudo_resolves_to_selector() {
        let ctx = ctx();
        let meta = meta_for("hover:underline", &ctx);
        assert_eq!(meta.conds, vec!["&:hover".to_owned()]);
        assert!(meta.prec.pseudo > 0);
    }

    #[test]
    fn unknown_variant_falls_back_to_literal_pseudo() {
        let ctx = ctx();
        let meta = meta_for("aria-busy:underline", &ctx);
        assert_eq!(meta.conds, vec!["&:aria-busy".to_owned()]);
    }

    #[test]
    fn dark_sets_the_dark_bit() {
        let ctx = ctx();
        let meta = meta_for("dark:underline", &ctx);
        assert!(meta.prec.dark);
        assert_eq!(
            meta.conds,
            vec!["@media (prefers-color-scheme:dark)".to_owned()]
        );
    }

    #[test]
    fn name_carries_variants() {
        let ctx = ctx();
        let meta = meta_for("sm:hover:underline", &ctx);
        assert_eq!(meta.name.as_deref(), Some("sm:hover:underline"));
    }

    // ── built-ins ────────────────────────────────────────────────────

    #[test]
    fn arbitrary_selector_variant() {
        let ctx = ctx();
        let meta = meta_for("[&>b]:underline", &ctx);
        assert_eq!(meta.conds, vec!["&>b".to_owned()]);
    }

    #[test]
    fn arbitrary_at_rule_variant() {
        let ctx = ctx();
        let meta = meta_for("[@media_(hover:hover)]:underline", &ctx);
        assert_eq!(meta.conds, vec!["@media (hover:hover)".to_owned()]);
    }

    #[test]
    fn group_variant_synthesizes_marker() {
        let ctx = ctx();
        let meta = meta_for("group-hover:underline", &ctx);
        assert_eq!(meta.conds, vec![":merge(.group):hover &".to_owned()]);
    }

    #[test]
    fn peer_variant_uses_sibling_combinator() {
        let ctx = ctx();
        let meta = meta_for("peer-focus:underline", &ctx);
        assert_eq!(meta.conds, vec![":merge(.peer):focus~&".to_owned()]);
    }

    #[test]
    fn scoped_group_variant_escapes_marker() {
        let ctx = ctx();
        let meta = meta_for("group-hover/sidebar:underline", &ctx);
        assert_eq!(
            meta.conds,
            vec![":merge(.group\\/sidebar):hover &".to_owned()]
        );
    }

    #[test]
    fn before_resolves_to_pseudo_element() {
        let ctx = ctx();
        let meta = meta_for("before:underline", &ctx);
        assert_eq!(meta.conds, vec!["&::before".to_owned()]);
    }

    #[test]
    fn print_is_an_at_rule_variant() {
        let ctx = ctx();
        let meta = meta_for("print:underline", &ctx);
        assert_eq!(meta.conds, vec!["@media print".to_owned()]);
    }
}
