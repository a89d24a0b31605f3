//! Utility rules: the ordered pattern table and the built-in preset.
//!
//! A [`Rule`] pairs anchored patterns with a generator. Generators may
//! decline (return `None`), in which case matching continues down the table;
//! the table order is therefore part of the semantics (`text-red-500` must
//! try the color rule before the font-size rule gives up on it).
//!
//! [`translate`] is the bridge from parsed specs to compiled rules, and
//! [`apply_classes`] is the `@apply` splice used by component-style
//! declaration trees.

use std::rc::Rc;
use std::sync::OnceLock;

use regex::Regex;

use crate::config::{Config, PreflightItem};
use crate::context::Context;
use crate::parse::UtilitySpec;
use crate::precedence::{insertion_index, CompiledRule, Layer, Precedence};
use crate::serialize::{serialize, StyleNode, StyleObject};
use crate::theme::{
    substitute_theme_refs, token_map, SectionSource, ThemeApi, ThemeConfig, ThemeMap,
    ThemeValue,
};
use crate::value::{format_color, normalize_arbitrary};
use crate::variant::builtin_variants;

/// Anchor a match pattern: always at the start; at the end too unless the
/// pattern ends with `-` (prefix match) or manages `$` itself.
pub(crate) fn anchor_pattern(pattern: &str) -> String {
    let suffix = if pattern.contains('$') || pattern.ends_with('-') {
        ""
    } else {
        "$"
    };
    format!("^{pattern}{suffix}")
}

/// A matched utility name, as seen by a rule generator.
pub struct MatchInput {
    /// The utility name that matched (never carries a `-` negation prefix).
    pub input: String,
    /// Text after the matched prefix; the theme key for most rules.
    pub rest: String,
    groups: Vec<Option<String>>,
    pub negated: bool,
    /// True when the utility is already dark-varianted, so color rules skip
    /// their automatic dark override.
    pub dark: bool,
}

impl MatchInput {
    /// Capture group by index; 0 is the whole match.
    pub fn group(&self, i: usize) -> Option<&str> {
        self.groups.get(i)?.as_deref()
    }

    /// Apply negation to a resolved value.
    pub fn value_of(&self, raw: &str) -> String {
        if self.negated {
            format!("calc({raw} * -1)")
        } else {
            raw.to_owned()
        }
    }
}

type RuleFn = Rc<dyn Fn(&MatchInput, &Context) -> Option<StyleObject>>;

/// One entry of the rule table.
#[derive(Clone)]
pub struct Rule {
    patterns: Vec<Regex>,
    run: RuleFn,
}

impl Rule {
    pub fn new(
        patterns: &[&str],
        run: impl Fn(&MatchInput, &Context) -> Option<StyleObject> + 'static,
    ) -> Self {
        let patterns = patterns
            .iter()
            .filter_map(|p| Regex::new(&anchor_pattern(p)).ok())
            .collect();
        Self {
            patterns,
            run: Rc::new(run),
        }
    }

    /// Fixed declarations for an exact utility.
    pub fn stat(pattern: &str, obj: StyleObject) -> Self {
        Self::new(&[pattern], move |_, _| Some(obj.clone()))
    }

    /// `prop: <first capture | rest | input>`, with negation applied.
    pub fn prop(pattern: &str, prop: &str) -> Self {
        let prop = prop.to_owned();
        Self::new(&[pattern], move |m, _| {
            let value = m
                .groups
                .iter()
                .skip(1)
                .flatten()
                .find(|g| !g.is_empty())
                .cloned()
                .or_else(|| (!m.rest.is_empty()).then(|| m.rest.clone()))
                .unwrap_or_else(|| m.input.clone());
            Some(StyleObject::new().decl(&prop, m.value_of(&value)))
        })
    }

    /// `prop: theme(section, rest)`, falling back to a bracketed arbitrary
    /// value. Composite theme values repeat the property.
    pub fn themed(pattern: &str, section: &str, prop: &str) -> Self {
        let (section, prop) = (section.to_owned(), prop.to_owned());
        Self::new(&[pattern], move |m, ctx| {
            match lookup_or_arbitrary(&m.rest, &section, ctx)? {
                ThemeValue::Str(s) => Some(StyleObject::new().decl(&prop, m.value_of(&s))),
                ThemeValue::List(vs) => {
                    let refs: Vec<&str> = vs.iter().map(String::as_str).collect();
                    Some(StyleObject::new().values(&prop, &refs))
                }
                ThemeValue::Map(_) => None,
            }
        })
    }

    /// A color utility: resolves the palette, composes the opacity custom
    /// property, and adds an automatic dark override when configured.
    pub fn colored(pattern: &str, section: &str, prop: &str) -> Self {
        let (section, prop) = (section.to_owned(), prop.to_owned());
        Self::new(&[pattern], move |m, ctx| {
            let (color_key, alpha) = split_alpha(&m.rest);
            let color = match ctx.theme().lookup(&section, color_key) {
                Some(ThemeValue::Str(s)) => s,
                Some(_) => return None,
                None => arbitrary_value(color_key, &section, ctx)?,
            };
            let prefix = m.group(0)?.trim_end_matches('-');
            let var = format!("--w-{prefix}-opacity");
            let opacity = alpha.and_then(|a| match ctx.theme().lookup("opacity", a) {
                Some(ThemeValue::Str(s)) => Some(s),
                Some(_) => None,
                None => arbitrary_value(a, "opacity", ctx),
            });

            let decls = |value: &str| {
                let mut obj = StyleObject::new();
                if value.contains("var(") {
                    obj.push(
                        &var,
                        StyleNode::Value(opacity.clone().unwrap_or_else(|| "1".to_owned())),
                    );
                }
                obj.push(&prop, StyleNode::Value(value.to_owned()));
                obj
            };

            let value = format_color(&color, opacity.as_deref(), Some(&var));
            if !m.dark {
                if let Some(darker) = ctx.dark_color(&section, color_key, &color) {
                    if darker != color {
                        let dark_value = format_color(&darker, opacity.as_deref(), Some(&var));
                        return Some(
                            StyleObject::new()
                                .nested("&", decls(&value))
                                .nested(&ctx.variant("dark"), decls(&dark_value)),
                        );
                    }
                }
            }
            Some(decls(&value))
        })
    }

    /// Run the generator if any pattern matches.
    pub fn try_match(
        &self,
        name: &str,
        negated: bool,
        dark: bool,
        ctx: &Context,
    ) -> Option<StyleObject> {
        for re in &self.patterns {
            if let Some(caps) = re.captures(name) {
                let end = caps.get(0).map(|g| g.end()).unwrap_or(0);
                let m = MatchInput {
                    input: name.to_owned(),
                    rest: name[end..].to_owned(),
                    groups: (0..caps.len())
                        .map(|i| caps.get(i).map(|g| g.as_str().to_owned()))
                        .collect(),
                    negated,
                    dark,
                };
                if let Some(obj) = (self.run)(&m, ctx) {
                    return Some(obj);
                }
            }
        }
        None
    }
}

impl std::fmt::Debug for Rule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Rule")
            .field("patterns", &self.patterns)
            .finish_non_exhaustive()
    }
}

fn lookup_or_arbitrary(key: &str, section: &str, ctx: &Context) -> Option<ThemeValue> {
    ctx.theme()
        .lookup(section, key)
        .or_else(|| arbitrary_value(key, section, ctx).map(ThemeValue::Str))
}

fn split_alpha(rest: &str) -> (&str, Option<&str>) {
    // A bracketed color keeps embedded slashes; otherwise the first slash
    // starts the alpha modifier.
    if rest.starts_with('[') {
        if let Some(close) = rest.find(']') {
            let alpha = rest[close + 1..].strip_prefix('/');
            return (&rest[..close + 1], alpha);
        }
    }
    match rest.split_once('/') {
        Some((color, alpha)) => (color, Some(alpha)),
        None => (rest, None),
    }
}

// ── arbitrary values ─────────────────────────────────────────────────

fn color_value_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(#|((hsl|rgb)a?|hwb|lab|lch|color)\(|[a-z]+$)").expect("color pattern")
    })
}

fn hint_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[a-z-]+:").expect("hint pattern"))
}

/// Accept and normalize a `[...]` value for the given theme section.
///
/// Sections with a recognizable value kind (colors, images, weights,
/// positions) reject values of the wrong shape, so `text-[2rem]` can fall
/// through the color rule to the font-size rule. An explicit `kind:` hint
/// overrides the shape check and is stripped from the output.
pub fn arbitrary_value(raw: &str, section: &str, ctx: &Context) -> Option<String> {
    let inner = raw.strip_prefix('[')?.strip_suffix(']')?;
    if inner.is_empty() {
        return None;
    }
    let value = normalize_arbitrary(&substitute_theme_refs(inner, ctx.theme()));
    let lower = section.to_ascii_lowercase();

    let accepted = if lower.contains("color") || lower.contains("fill") || lower.contains("stroke")
    {
        value.starts_with("color:") || color_value_re().is_match(&value)
    } else if lower.contains("image") {
        value.starts_with("image:")
            || Regex::new(r"^[a-z-]+\(").map(|re| re.is_match(&value)).unwrap_or(false)
    } else if lower.contains("weight") {
        value.starts_with("number:")
            || value.starts_with("any:")
            || value.chars().all(|c| c.is_ascii_digit())
    } else if lower.contains("position") {
        !(value.starts_with("length:") || value.starts_with("size:"))
    } else {
        true
    };
    if !accepted {
        return None;
    }
    Some(hint_re().replace(&value, "").into_owned())
}

// ── translation ──────────────────────────────────────────────────────

/// Translate parsed specs into compiled rules at utility level.
pub fn translate(specs: &[UtilitySpec], ctx: &Context) -> Vec<CompiledRule> {
    translate_with(specs, ctx, Precedence::of(Layer::Utilities), &[], false)
}

/// [`translate`] with an explicit base precedence, wrapping conditions, and
/// inherited importance. The output is kept sorted by binary insertion.
pub fn translate_with(
    specs: &[UtilitySpec],
    ctx: &Context,
    base: Precedence,
    conds: &[String],
    important: bool,
) -> Vec<CompiledRule> {
    let mut out: Vec<CompiledRule> = Vec::new();
    for spec in specs {
        let mut spec = spec.clone();
        spec.important |= important;
        for rule in translate_spec(&spec, ctx, base, conds) {
            let at = insertion_index(&out, &rule);
            out.insert(at, rule);
        }
    }
    out
}

fn translate_spec(
    spec: &UtilitySpec,
    ctx: &Context,
    base: Precedence,
    conds: &[String],
) -> Vec<CompiledRule> {
    let dark = spec.variants.first().is_some_and(|v| v == "dark");
    match ctx.rule_css(&spec.name, spec.negated, dark) {
        Some(obj) => {
            let meta = crate::variant::resolve_spec(spec, base, conds, ctx);
            serialize(&obj, meta, ctx)
        }
        // Unknown utilities pass through to the class list untouched.
        None => vec![CompiledRule::passthrough(spec.class_name())],
    }
}

/// Splice a class string into the current scope (`@apply` and string
/// preflight).
///
/// Translated rules are pulled into the target layer (defaults stay where
/// they are), renamed to the enclosing rule's name, and adjacent rules with
/// identical precedence and conditions are merged into one body.
pub fn apply_classes(
    rename: Option<String>,
    target: Precedence,
    classes: &str,
    ctx: &Context,
    conds: &[String],
    important: bool,
) -> Vec<CompiledRule> {
    let specs = ctx.parse(classes);
    let mut rules = translate_with(&specs, ctx, target, conds, important);
    for rule in &mut rules {
        let movable = rule.prec.layer != Layer::Defaults
            && (rule.name.is_some() || target.layer == Layer::Base);
        if movable {
            let mut prec = target;
            prec.absorb(&rule.prec);
            rule.prec = prec;
            rule.order = 0.0;
        }
        if rule.name.is_some() {
            rule.name = rename.clone();
        }
    }
    merge_adjacent(rules)
}

fn merge_adjacent(rules: Vec<CompiledRule>) -> Vec<CompiledRule> {
    let mut out: Vec<CompiledRule> = Vec::new();
    for rule in rules {
        match out.last_mut() {
            Some(prev)
                if !rule.decls.is_empty()
                    && !prev.decls.is_empty()
                    && prev.name == rule.name
                    && prev.prec == rule.prec
                    && prev.conds == rule.conds =>
            {
                prev.decls.push(';');
                prev.decls.push_str(&rule.decls);
            }
            _ => out.push(rule),
        }
    }
    out
}

// ── the built-in preset ──────────────────────────────────────────────

/// The preset every engine starts from: default theme, built-in variants,
/// the utility rule table, and the preflight reset.
pub fn base_preset() -> Config {
    Config {
        theme: default_theme(),
        variants: builtin_variants(),
        rules: builtin_rules(),
        preflight: vec![PreflightItem::Styles(preflight_styles())],
        ..Config::default()
    }
}

fn preflight_styles() -> StyleObject {
    StyleObject::new()
        .nested(
            "*,::before,::after",
            StyleObject::new()
                .decl("box-sizing", "border-box")
                .decl("border", "0 solid"),
        )
        .nested(
            "html",
            StyleObject::new()
                .decl("line-height", "1.5")
                .decl("-webkit-text-size-adjust", "100%"),
        )
        .nested(
            "body",
            StyleObject::new()
                .decl("margin", "0")
                .decl("font-family", "inherit")
                .decl("line-height", "inherit"),
        )
        .nested(
            "h1,h2,h3,h4,h5,h6",
            StyleObject::new()
                .decl("font-size", "inherit")
                .decl("font-weight", "inherit")
                .decl("margin", "0"),
        )
        .nested(
            "img,video",
            StyleObject::new()
                .decl("display", "block")
                .decl("max-width", "100%"),
        )
}

fn fmt_rem(quarter_steps: f64) -> String {
    let rem = quarter_steps / 4.0;
    if rem == 0.0 {
        return "0px".to_owned();
    }
    let mut s = format!("{rem}");
    if s.contains('.') {
        while s.ends_with('0') {
            s.pop();
        }
        if s.ends_with('.') {
            s.pop();
        }
    }
    format!("{s}rem")
}

fn spacing_map() -> ThemeMap {
    let mut map = ThemeMap::new();
    map.insert("px".to_owned(), ThemeValue::from("1px"));
    map.insert("0".to_owned(), ThemeValue::from("0px"));
    let steps: &[f64] = &[
        0.5, 1.0, 1.5, 2.0, 2.5, 3.0, 3.5, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 10.0, 11.0, 12.0,
        14.0, 16.0, 20.0, 24.0, 28.0, 32.0, 36.0, 40.0, 44.0, 48.0, 52.0, 56.0, 60.0, 64.0,
        72.0, 80.0, 96.0,
    ];
    for &step in steps {
        let key = if step.fract() == 0.0 {
            format!("{}", step as u64)
        } else {
            format!("{step}")
        };
        map.insert(key, ThemeValue::from(fmt_rem(step)));
    }
    map
}

fn fractions() -> Vec<(&'static str, &'static str)> {
    vec![
        ("1/2", "50%"),
        ("1/3", "33.333333%"),
        ("2/3", "66.666667%"),
        ("1/4", "25%"),
        ("3/4", "75%"),
        ("full", "100%"),
    ]
}

fn shade(entries: &[(&str, &str)]) -> ThemeValue {
    ThemeValue::Map(token_map(entries))
}

fn default_colors() -> ThemeMap {
    let mut map = ThemeMap::new();
    map.insert("inherit".to_owned(), ThemeValue::from("inherit"));
    map.insert("current".to_owned(), ThemeValue::from("currentColor"));
    map.insert("transparent".to_owned(), ThemeValue::from("transparent"));
    map.insert("black".to_owned(), ThemeValue::from("#000"));
    map.insert("white".to_owned(), ThemeValue::from("#fff"));
    map.insert(
        "gray".to_owned(),
        shade(&[
            ("50", "#f9fafb"),
            ("100", "#f3f4f6"),
            ("200", "#e5e7eb"),
            ("300", "#d1d5db"),
            ("400", "#9ca3af"),
            ("500", "#6b7280"),
            ("600", "#4b5563"),
            ("700", "#374151"),
            ("800", "#1f2937"),
            ("900", "#111827"),
        ]),
    );
    map.insert(
        "red".to_owned(),
        shade(&[
            ("50", "#fef2f2"),
            ("100", "#fee2e2"),
            ("200", "#fecaca"),
            ("300", "#fca5a5"),
            ("400", "#f87171"),
            ("500", "#ef4444"),
            ("600", "#dc2626"),
            ("700", "#b91c1c"),
            ("800", "#991b1b"),
            ("900", "#7f1d1d"),
        ]),
    );
    map.insert(
        "blue".to_owned(),
        shade(&[
            ("50", "#eff6ff"),
            ("100", "#dbeafe"),
            ("200", "#bfdbfe"),
            ("300", "#93c5fd"),
            ("400", "#60a5fa"),
            ("500", "#3b82f6"),
            ("600", "#2563eb"),
            ("700", "#1d4ed8"),
            ("800", "#1e40af"),
            ("900", "#1e3a8a"),
        ]),
    );
    map.insert(
        "green".to_owned(),
        shade(&[("400", "#4ade80"), ("500", "#22c55e"), ("600", "#16a34a")]),
    );
    map.insert(
        "yellow".to_owned(),
        shade(&[("400", "#facc15"), ("500", "#eab308"), ("600", "#ca8a04")]),
    );
    map.insert(
        "indigo".to_owned(),
        shade(&[("400", "#818cf8"), ("500", "#6366f1"), ("600", "#4f46e5")]),
    );
    map
}

fn lazy(f: impl Fn(&ThemeApi<'_>) -> ThemeMap + 'static) -> SectionSource {
    SectionSource::Lazy(Rc::new(f))
}

fn default_theme() -> ThemeConfig {
    let mut sections: std::collections::BTreeMap<String, SectionSource> =
        std::collections::BTreeMap::new();

    sections.insert(
        "screens".to_owned(),
        SectionSource::Map(token_map(&[
            ("sm", "640px"),
            ("md", "768px"),
            ("lg", "1024px"),
            ("xl", "1280px"),
            ("2xl", "1536px"),
        ])),
    );
    sections.insert("colors".to_owned(), SectionSource::Map(default_colors()));
    sections.insert("spacing".to_owned(), SectionSource::Map(spacing_map()));
    sections.insert(
        "fontSize".to_owned(),
        SectionSource::Map(
            [
                ("xs", ["0.75rem", "1rem"]),
                ("sm", ["0.875rem", "1.25rem"]),
                ("base", ["1rem", "1.5rem"]),
                ("lg", ["1.125rem", "1.75rem"]),
                ("xl", ["1.25rem", "1.75rem"]),
                ("2xl", ["1.5rem", "2rem"]),
                ("3xl", ["1.875rem", "2.25rem"]),
                ("4xl", ["2.25rem", "2.5rem"]),
            ]
            .into_iter()
            .map(|(k, [size, lh])| {
                (
                    k.to_owned(),
                    ThemeValue::List(vec![size.to_owned(), lh.to_owned()]),
                )
            })
            .collect(),
        ),
    );
    sections.insert(
        "fontWeight".to_owned(),
        SectionSource::Map(token_map(&[
            ("thin", "100"),
            ("light", "300"),
            ("normal", "400"),
            ("medium", "500"),
            ("semibold", "600"),
            ("bold", "700"),
            ("extrabold", "800"),
            ("black", "900"),
        ])),
    );
    sections.insert(
        "lineHeight".to_owned(),
        SectionSource::Map(token_map(&[
            ("none", "1"),
            ("tight", "1.25"),
            ("snug", "1.375"),
            ("normal", "1.5"),
            ("relaxed", "1.625"),
            ("loose", "2"),
        ])),
    );
    sections.insert(
        "borderRadius".to_owned(),
        SectionSource::Map(token_map(&[
            ("none", "0px"),
            ("sm", "0.125rem"),
            ("DEFAULT", "0.25rem"),
            ("md", "0.375rem"),
            ("lg", "0.5rem"),
            ("xl", "0.75rem"),
            ("2xl", "1rem"),
            ("3xl", "1.5rem"),
            ("full", "9999px"),
        ])),
    );
    sections.insert(
        "borderWidth".to_owned(),
        SectionSource::Map(token_map(&[
            ("DEFAULT", "1px"),
            ("0", "0px"),
            ("2", "2px"),
            ("4", "4px"),
            ("8", "8px"),
        ])),
    );
    sections.insert(
        "boxShadow".to_owned(),
        SectionSource::Map(token_map(&[
            ("sm", "0 1px 2px 0 rgba(0,0,0,0.05)"),
            (
                "DEFAULT",
                "0 1px 3px 0 rgba(0,0,0,0.1),0 1px 2px -1px rgba(0,0,0,0.1)",
            ),
            (
                "md",
                "0 4px 6px -1px rgba(0,0,0,0.1),0 2px 4px -2px rgba(0,0,0,0.1)",
            ),
            (
                "lg",
                "0 10px 15px -3px rgba(0,0,0,0.1),0 4px 6px -4px rgba(0,0,0,0.1)",
            ),
            ("none", "0 0 #0000"),
        ])),
    );
    sections.insert(
        "opacity".to_owned(),
        SectionSource::Map(
            [0, 5, 10, 20, 25, 30, 40, 50, 60, 70, 75, 80, 90, 95, 100]
                .into_iter()
                .map(|n| {
                    let value = if n == 0 {
                        "0".to_owned()
                    } else if n == 100 {
                        "1".to_owned()
                    } else {
                        let mut s = format!("{}", f64::from(n) / 100.0);
                        if s.starts_with("0.") {
                            s.remove(0);
                        }
                        s
                    };
                    (format!("{n}"), ThemeValue::Str(value))
                })
                .collect(),
        ),
    );
    sections.insert(
        "zIndex".to_owned(),
        SectionSource::Map(token_map(&[
            ("0", "0"),
            ("10", "10"),
            ("20", "20"),
            ("30", "30"),
            ("40", "40"),
            ("50", "50"),
            ("auto", "auto"),
        ])),
    );
    sections.insert(
        "flex".to_owned(),
        SectionSource::Map(token_map(&[
            ("1", "1 1 0%"),
            ("auto", "1 1 auto"),
            ("initial", "0 1 auto"),
            ("none", "none"),
        ])),
    );
    sections.insert(
        "inset".to_owned(),
        lazy(|api| {
            let mut map = (*api.section("spacing")).clone();
            map.insert("auto".to_owned(), ThemeValue::from("auto"));
            for (k, v) in fractions() {
                map.insert(k.to_owned(), ThemeValue::from(v));
            }
            map
        }),
    );
    sections.insert(
        "width".to_owned(),
        lazy(|api| {
            let mut map = (*api.section("spacing")).clone();
            map.insert("auto".to_owned(), ThemeValue::from("auto"));
            map.insert("screen".to_owned(), ThemeValue::from("100vw"));
            map.insert("min".to_owned(), ThemeValue::from("min-content"));
            map.insert("max".to_owned(), ThemeValue::from("max-content"));
            map.insert("fit".to_owned(), ThemeValue::from("fit-content"));
            for (k, v) in fractions() {
                map.insert(k.to_owned(), ThemeValue::from(v));
            }
            map
        }),
    );
    sections.insert(
        "height".to_owned(),
        lazy(|api| {
            let mut map = (*api.section("spacing")).clone();
            map.insert("auto".to_owned(), ThemeValue::from("auto"));
            map.insert("screen".to_owned(), ThemeValue::from("100vh"));
            for (k, v) in fractions() {
                map.insert(k.to_owned(), ThemeValue::from(v));
            }
            map
        }),
    );
    sections.insert("textColor".to_owned(), lazy(|api| (*api.colors()).clone()));
    sections.insert(
        "backgroundColor".to_owned(),
        lazy(|api| (*api.colors()).clone()),
    );
    sections.insert(
        "borderColor".to_owned(),
        lazy(|api| {
            let mut map = (*api.colors()).clone();
            if let Some(ThemeValue::Str(gray)) = api.theme("colors.gray.200") {
                map.insert("DEFAULT".to_owned(), ThemeValue::Str(gray));
            }
            map
        }),
    );

    ThemeConfig {
        sections,
        extend: std::collections::BTreeMap::new(),
    }
}

fn edge_suffixes(tag: Option<&str>) -> &'static [&'static str] {
    match tag {
        Some("x") => &["-left", "-right"],
        Some("y") => &["-top", "-bottom"],
        Some("t") => &["-top"],
        Some("r") => &["-right"],
        Some("b") => &["-bottom"],
        Some("l") => &["-left"],
        _ => &[""],
    }
}

fn builtin_rules() -> Vec<Rule> {
    vec![
        // [prop:value] arbitrary property.
        Rule::new(&[r"\[([-\w]+):(.+)]$"], |m, ctx| {
            let prop = m.group(1)?.to_owned();
            let value = arbitrary_value(&format!("[{}]", m.group(2)?), "", ctx)?;
            Some(StyleObject::new().decl(&prop, value))
        }),
        // Display, position, visibility.
        Rule::new(
            &[r"(block|inline-block|inline-flex|inline-grid|inline|flex|grid|table|contents|flow-root|list-item)"],
            |m, _| Some(StyleObject::new().decl("display", m.input.clone())),
        ),
        Rule::stat("hidden", StyleObject::new().decl("display", "none")),
        Rule::prop(r"(static|fixed|absolute|relative|sticky)", "position"),
        Rule::stat("visible", StyleObject::new().decl("visibility", "visible")),
        Rule::stat("invisible", StyleObject::new().decl("visibility", "hidden")),
        // Inset and edges.
        Rule::new(&[r"inset(-[xy])?-"], |m, ctx| {
            let value = themed_value(m, ctx, "inset")?;
            let mut obj = StyleObject::new();
            let edges: &[&str] = match m.group(1) {
                Some("-x") => &["left", "right"],
                Some("-y") => &["top", "bottom"],
                _ => &["top", "right", "bottom", "left"],
            };
            for edge in edges {
                obj.push(edge, StyleNode::Value(value.clone()));
            }
            Some(obj)
        }),
        Rule::new(&[r"(top|right|bottom|left)-"], |m, ctx| {
            let value = themed_value(m, ctx, "inset")?;
            Some(StyleObject::new().decl(m.group(1)?, value))
        }),
        Rule::themed("z-", "zIndex", "z-index"),
        // Flexbox.
        Rule::new(&[r"flex-((row|col)(-reverse)?)"], |m, _| {
            let dir = m.group(1)?.replace("col", "column");
            Some(StyleObject::new().decl("flex-direction", dir))
        }),
        Rule::prop(r"flex-(wrap-reverse|wrap|nowrap)", "flex-wrap"),
        Rule::themed("flex-", "flex", "flex"),
        Rule::new(&[r"(grow|shrink)(-0)?"], |m, _| {
            let prop = format!("flex-{}", m.group(1)?);
            let value = if m.group(2).is_some() { "0" } else { "1" };
            Some(StyleObject::new().decl(&prop, value))
        }),
        Rule::new(&[r"items-(start|end|center|baseline|stretch)"], |m, _| {
            let value = match m.group(1)? {
                "start" => "flex-start".to_owned(),
                "end" => "flex-end".to_owned(),
                other => other.to_owned(),
            };
            Some(StyleObject::new().decl("align-items", value))
        }),
        Rule::new(
            &[r"justify-(start|end|center|between|around|evenly)"],
            |m, _| {
                let value = match m.group(1)? {
                    "start" => "flex-start".to_owned(),
                    "end" => "flex-end".to_owned(),
                    "between" => "space-between".to_owned(),
                    "around" => "space-around".to_owned(),
                    "evenly" => "space-evenly".to_owned(),
                    other => other.to_owned(),
                };
                Some(StyleObject::new().decl("justify-content", value))
            },
        ),
        Rule::new(&[r"gap(-[xy])?-"], |m, ctx| {
            let value = themed_value(m, ctx, "spacing")?;
            let prop = match m.group(1) {
                Some("-x") => "column-gap",
                Some("-y") => "row-gap",
                _ => "gap",
            };
            Some(StyleObject::new().decl(prop, value))
        }),
        // Padding and margin with edge expansion.
        Rule::new(&[r"(p|m)([xytrbl])?-"], |m, ctx| {
            let base = if m.group(1)? == "p" { "padding" } else { "margin" };
            let value = themed_value(m, ctx, "spacing")?;
            let mut obj = StyleObject::new();
            for suffix in edge_suffixes(m.group(2)) {
                obj.push(&format!("{base}{suffix}"), StyleNode::Value(value.clone()));
            }
            Some(obj)
        }),
        // Sizing.
        Rule::themed("w-", "width", "width"),
        Rule::themed("h-", "height", "height"),
        // Typography.
        Rule::prop(r"text-(left|center|right|justify)", "text-align"),
        Rule::colored("text-", "textColor", "color"),
        Rule::new(&[r"text-"], |m, ctx| {
            match lookup_or_arbitrary(&m.rest, "fontSize", ctx)? {
                ThemeValue::Str(size) => Some(StyleObject::new().decl("font-size", size)),
                ThemeValue::List(parts) => {
                    let mut obj = StyleObject::new();
                    let mut it = parts.into_iter();
                    obj.push("font-size", StyleNode::Value(it.next()?));
                    if let Some(lh) = it.next() {
                        obj.push("line-height", StyleNode::Value(lh));
                    }
                    Some(obj)
                }
                ThemeValue::Map(_) => None,
            }
        }),
        Rule::themed("font-", "fontWeight", "font-weight"),
        Rule::themed("leading-", "lineHeight", "line-height"),
        Rule::prop(r"(uppercase|lowercase|capitalize)", "text-transform"),
        Rule::stat("normal-case", StyleObject::new().decl("text-transform", "none")),
        Rule::stat("italic", StyleObject::new().decl("font-style", "italic")),
        Rule::stat("not-italic", StyleObject::new().decl("font-style", "normal")),
        Rule::prop(r"(underline|overline|line-through)", "text-decoration-line"),
        Rule::stat(
            "no-underline",
            StyleObject::new().decl("text-decoration-line", "none"),
        ),
        // Backgrounds and borders.
        Rule::colored("bg-", "backgroundColor", "background-color"),
        Rule::new(&[r"border(-[xytrbl])?(?:-(.+))?$"], |m, ctx| {
            let key = m.group(2).unwrap_or("");
            let value = match ctx.theme().lookup("borderWidth", key) {
                Some(ThemeValue::Str(s)) => s,
                Some(_) => return None,
                None => arbitrary_value(key, "borderWidth", ctx)?,
            };
            let mut obj = StyleObject::new();
            let tag = m.group(1).map(|t| t.trim_start_matches('-'));
            for suffix in edge_suffixes(tag) {
                obj.push(
                    &format!("border{suffix}-width"),
                    StyleNode::Value(value.clone()),
                );
            }
            Some(obj)
        }),
        Rule::colored("border-", "borderColor", "border-color"),
        Rule::new(&[r"rounded(-(?:tl|tr|br|bl|t|r|b|l))?(?:-(.+))?$"], |m, ctx| {
            let key = m.group(2).unwrap_or("");
            let value = match ctx.theme().lookup("borderRadius", key) {
                Some(ThemeValue::Str(s)) => s,
                Some(_) => return None,
                None => arbitrary_value(key, "borderRadius", ctx)?,
            };
            let corners: &[&str] = match m.group(1) {
                Some("-t") => &["top-left", "top-right"],
                Some("-r") => &["top-right", "bottom-right"],
                Some("-b") => &["bottom-right", "bottom-left"],
                Some("-l") => &["top-left", "bottom-left"],
                Some("-tl") => &["top-left"],
                Some("-tr") => &["top-right"],
                Some("-br") => &["bottom-right"],
                Some("-bl") => &["bottom-left"],
                _ => &[""],
            };
            let mut obj = StyleObject::new();
            for corner in corners {
                let prop = if corner.is_empty() {
                    "border-radius".to_owned()
                } else {
                    format!("border-{corner}-radius")
                };
                obj.push(&prop, StyleNode::Value(value.clone()));
            }
            Some(obj)
        }),
        Rule::themed("opacity-", "opacity", "opacity"),
        // Effects: the shadow composes through custom properties so ring
        // utilities can stack onto it later.
        Rule::new(&[r"shadow(?:-(.+))?$"], |m, ctx| {
            let key = m.group(1).unwrap_or("");
            let value = match ctx.theme().lookup("boxShadow", key) {
                Some(ThemeValue::Str(s)) => s,
                Some(ThemeValue::List(l)) => l.join(","),
                Some(ThemeValue::Map(_)) => return None,
                None => arbitrary_value(key, "boxShadow", ctx)?,
            };
            Some(
                StyleObject::new()
                    .decl("--w-shadow", value)
                    .decl(
                        "box-shadow",
                        "var(--w-ring-shadow,0 0 #0000),var(--w-shadow)",
                    ),
            )
        }),
        Rule::new(&[r"translate-([xy])-"], |m, ctx| {
            let value = themed_value(m, ctx, "spacing")?;
            let var = format!("--w-translate-{}", m.group(1)?);
            Some(
                StyleObject::new()
                    .decl(&var, value)
                    .decl(
                        "transform",
                        "translate(var(--w-translate-x,0),var(--w-translate-y,0))",
                    ),
            )
        }),
        // Interaction.
        Rule::prop("cursor-", "cursor"),
        Rule::prop(r"select-(none|text|all|auto)", "user-select"),
        Rule::new(&[r"overflow(-[xy])?-(auto|hidden|visible|scroll)"], |m, _| {
            let prop = match m.group(1) {
                Some("-x") => "overflow-x",
                Some("-y") => "overflow-y",
                _ => "overflow",
            };
            Some(StyleObject::new().decl(prop, m.group(2)?))
        }),
    ]
}

fn themed_value(m: &MatchInput, ctx: &Context, section: &str) -> Option<String> {
    match lookup_or_arbitrary(&m.rest, section, ctx)? {
        ThemeValue::Str(s) => Some(m.value_of(&s)),
        _ => None,
    }
}
