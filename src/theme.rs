//! Design-token store: sections, lazy values, path lookup, substitution.
//!
//! A [`Theme`] is assembled from base sections plus `extend` overlays merged
//! in preset order. Sections resolve lazily and are memoized per theme
//! instance; a placeholder is seeded into the memo before evaluation so lazy
//! sections that reference each other cannot recurse forever.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::collections::HashMap;
use std::rc::Rc;
use std::sync::OnceLock;

use regex::Regex;

use crate::value::format_color;

/// A single design-token value.
#[derive(Debug, Clone, PartialEq)]
pub enum ThemeValue {
    Str(String),
    /// Composite token, e.g. a font size paired with its line height.
    List(Vec<String>),
    /// Nested scale (color shades, screen descriptors).
    Map(ThemeMap),
}

impl ThemeValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ThemeValue::Str(s) => Some(s),
            _ => None,
        }
    }
}

impl From<&str> for ThemeValue {
    fn from(s: &str) -> Self {
        ThemeValue::Str(s.to_owned())
    }
}

impl From<String> for ThemeValue {
    fn from(s: String) -> Self {
        ThemeValue::Str(s)
    }
}

/// Ordered token map; ordering keeps flattening and iteration deterministic.
pub type ThemeMap = BTreeMap<String, ThemeValue>;

/// Build a flat token map from string pairs.
pub fn token_map(entries: &[(&str, &str)]) -> ThemeMap {
    entries
        .iter()
        .map(|(k, v)| ((*k).to_owned(), ThemeValue::from(*v)))
        .collect()
}

/// A theme section before resolution: either literal tokens or a function of
/// the resolving theme (for sections derived from others, like `width` from
/// `spacing`).
#[derive(Clone)]
pub enum SectionSource {
    Map(ThemeMap),
    Lazy(Rc<dyn Fn(&ThemeApi<'_>) -> ThemeMap>),
}

impl std::fmt::Debug for SectionSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SectionSource::Map(m) => f.debug_tuple("Map").field(m).finish(),
            SectionSource::Lazy(_) => f.write_str("Lazy(..)"),
        }
    }
}

/// Theme half of a configuration: full-section overrides plus extensions
/// merged into whatever the overridden section resolves to.
#[derive(Clone, Debug, Default)]
pub struct ThemeConfig {
    pub sections: BTreeMap<String, SectionSource>,
    pub extend: BTreeMap<String, SectionSource>,
}

impl ThemeConfig {
    /// Overlay `other` on top of `self`, later-wins per section.
    pub fn merge(&mut self, other: ThemeConfig) {
        self.sections.extend(other.sections);
        self.extend.extend(other.extend);
    }
}

/// The resolved token store used during compilation.
pub struct Theme {
    config: ThemeConfig,
    resolved: RefCell<HashMap<String, Rc<ThemeMap>>>,
}

impl Theme {
    pub fn new(config: ThemeConfig) -> Self {
        Self {
            config,
            resolved: RefCell::new(HashMap::new()),
        }
    }

    /// Resolve a section, memoized.
    ///
    /// Color-family sections (`colors`, `*Color`, `fill`, `stroke`) are
    /// flattened: nested shade maps become `family-shade` keys and `DEFAULT`
    /// collapses onto its parent key.
    pub fn section(&self, name: &str) -> Rc<ThemeMap> {
        if let Some(hit) = self.resolved.borrow().get(name) {
            return Rc::clone(hit);
        }
        // Seed an empty entry first: lazy sections may reference each other.
        self.resolved
            .borrow_mut()
            .insert(name.to_owned(), Rc::new(ThemeMap::new()));

        let mut map = match self.config.sections.get(name) {
            Some(source) => self.eval(source),
            None => ThemeMap::new(),
        };
        if let Some(extend) = self.config.extend.get(name) {
            for (k, v) in self.eval(extend) {
                map.insert(k, v);
            }
        }
        if is_color_section(name) {
            map = flatten_colors(&map);
        }

        let rc = Rc::new(map);
        self.resolved
            .borrow_mut()
            .insert(name.to_owned(), Rc::clone(&rc));
        rc
    }

    fn eval(&self, source: &SectionSource) -> ThemeMap {
        match source {
            SectionSource::Map(m) => m.clone(),
            SectionSource::Lazy(f) => f(&ThemeApi { theme: self }),
        }
    }

    /// Look a key up in a section: flat key first, then nested maps walked
    /// by `-` segments. An empty key means `DEFAULT`.
    pub fn lookup(&self, section: &str, key: &str) -> Option<ThemeValue> {
        let sec = self.section(section);
        let key = if key.is_empty() { "DEFAULT" } else { key };
        if let Some(v) = sec.get(key) {
            return Some(v.clone());
        }
        let mut parts = key.split('-');
        let mut current = sec.get(parts.next()?)?.clone();
        for part in parts {
            match current {
                ThemeValue::Map(m) => current = m.get(part)?.clone(),
                _ => return None,
            }
        }
        Some(current)
    }

    /// Resolve a dotted/bracketed access path, e.g. `colors.red.500/50%` or
    /// `spacing[2.5]`. The first segment names the section; the rest joins
    /// into the key. A `/alpha` suffix composes the alpha channel into color
    /// values.
    pub fn resolve(&self, path: &str) -> Option<ThemeValue> {
        self.resolve_or(path, None)
    }

    /// [`Theme::resolve`] with a fallback used when the path is absent.
    pub fn resolve_or(&self, path: &str, default: Option<&str>) -> Option<ThemeValue> {
        let (head, alpha) = match path.split_once('/') {
            Some((h, a)) => (h.trim(), Some(a.trim())),
            None => (path.trim(), None),
        };
        let segments = parse_path(head);
        let (section, key_parts) = segments.split_first()?;
        if key_parts.is_empty() {
            return Some(ThemeValue::Map((*self.section(section)).clone()));
        }
        let key = key_parts.join("-");
        let value = self
            .lookup(section, &key)
            .or_else(|| default.map(|d| ThemeValue::Str(d.to_owned())))?;
        match (value, alpha) {
            (ThemeValue::Str(color), Some(alpha)) => {
                let alpha = substitute_theme_refs(alpha, self);
                Some(ThemeValue::Str(format_color(&color, Some(&alpha), None)))
            }
            (value, _) => Some(value),
        }
    }
}

impl std::fmt::Debug for Theme {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Theme").finish_non_exhaustive()
    }
}

/// Accessor handed to lazy sections while the theme is resolving.
pub struct ThemeApi<'a> {
    theme: &'a Theme,
}

impl ThemeApi<'_> {
    /// Resolve an access path against the theme under construction.
    pub fn theme(&self, path: &str) -> Option<ThemeValue> {
        self.theme.resolve(path)
    }

    /// A resolved section by name.
    pub fn section(&self, name: &str) -> Rc<ThemeMap> {
        self.theme.section(name)
    }

    /// The flattened color palette.
    pub fn colors(&self) -> Rc<ThemeMap> {
        self.theme.section("colors")
    }

    /// Negated counterparts are derived at match time, so this contributes
    /// no extra tokens.
    pub fn negative(&self) -> ThemeMap {
        ThemeMap::new()
    }

    /// `screen-<name>` tokens for each configured breakpoint.
    pub fn breakpoints(&self) -> ThemeMap {
        self.theme
            .section("screens")
            .iter()
            .filter_map(|(k, v)| {
                let s = v.as_str()?;
                Some((format!("screen-{k}"), ThemeValue::from(s)))
            })
            .collect()
    }
}

fn is_color_section(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    lower.contains("color") || lower.contains("fill") || lower.contains("stroke")
}

fn flatten_colors(map: &ThemeMap) -> ThemeMap {
    let mut out = ThemeMap::new();
    flatten_into(map, "", &mut out);
    out
}

fn flatten_into(map: &ThemeMap, prefix: &str, out: &mut ThemeMap) {
    for (key, value) in map {
        let flat = if key == "DEFAULT" {
            prefix.to_owned()
        } else if prefix.is_empty() {
            key.clone()
        } else {
            format!("{prefix}-{key}")
        };
        match value {
            ThemeValue::Map(nested) => flatten_into(nested, &flat, out),
            other => {
                let flat = if flat.is_empty() { "DEFAULT".to_owned() } else { flat };
                out.insert(flat, other.clone());
            }
        }
    }
}

fn parse_path(path: &str) -> Vec<String> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(r"\[([^\]]+)\]|([^.\[]+)").expect("path pattern"));
    re.captures_iter(path)
        .filter_map(|c| c.get(1).or_else(|| c.get(2)).map(|m| m.as_str().to_owned()))
        .collect()
}

fn theme_ref_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r#"theme\(\s*(?:'([^']*)'|"([^"]*)"|([^'"),][^),]*))\s*(?:,\s*(?:'([^']*)'|"([^"]*)"|([^)]*?))\s*)?\)"#,
        )
        .expect("theme ref pattern")
    })
}

/// Replace `theme(path, fallback?)` references inside a CSS value.
///
/// Lists render comma-joined; map-valued or missing paths render empty.
pub fn substitute_theme_refs(value: &str, theme: &Theme) -> String {
    if !value.contains("theme(") {
        return value.to_owned();
    }
    theme_ref_re()
        .replace_all(value, |caps: &regex::Captures<'_>| {
            let path = caps
                .get(1)
                .or_else(|| caps.get(2))
                .or_else(|| caps.get(3))
                .map(|m| m.as_str().trim())
                .unwrap_or("");
            let default = caps
                .get(4)
                .or_else(|| caps.get(5))
                .or_else(|| caps.get(6))
                .map(|m| m.as_str().trim())
                .filter(|s| !s.is_empty());
            match theme.resolve_or(path, default) {
                Some(ThemeValue::Str(s)) => s,
                Some(ThemeValue::List(l)) => l.join(","),
                Some(ThemeValue::Map(_)) | None => String::new(),
            }
        })
        .into_owned()
}

/// Render a screen descriptor as a media query with the given prefix
/// (`"@media "` for variants, empty for `screen()` substitution).
pub fn media_query(value: &ThemeValue, prefix: &str) -> String {
    let body = match value {
        ThemeValue::Str(s) => format!("(min-width:{s})"),
        ThemeValue::Map(m) => m
            .iter()
            .filter_map(|(k, v)| {
                let s = v.as_str()?;
                Some(if k == "raw" {
                    s.to_owned()
                } else {
                    format!("({k}-width:{s})")
                })
            })
            .collect::<Vec<_>>()
            .join(" and "),
        // Lists hold pre-built raw queries, matched as alternatives.
        ThemeValue::List(l) => l.join(","),
    };
    format!("{prefix}{body}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn theme_with(sections: &[(&str, ThemeMap)], extend: &[(&str, ThemeMap)]) -> Theme {
        let config = ThemeConfig {
            sections: sections
                .iter()
                .map(|(k, v)| ((*k).to_owned(), SectionSource::Map(v.clone())))
                .collect(),
            extend: extend
                .iter()
                .map(|(k, v)| ((*k).to_owned(), SectionSource::Map(v.clone())))
                .collect(),
        };
        Theme::new(config)
    }

    fn nested_colors() -> ThemeMap {
        let mut red = ThemeMap::new();
        red.insert("500".to_owned(), ThemeValue::from("#ef4444"));
        red.insert("DEFAULT".to_owned(), ThemeValue::from("#f00"));
        let mut map = ThemeMap::new();
        map.insert("red".to_owned(), ThemeValue::Map(red));
        map.insert("white".to_owned(), ThemeValue::from("#fff"));
        map
    }

    // ── sections and merging ─────────────────────────────────────────

    #[test]
    fn extend_overlays_base_section() {
        let theme = theme_with(
            &[("spacing", token_map(&[("4", "1rem"), ("8", "2rem")]))],
            &[("spacing", token_map(&[("8", "3rem"), ("96", "24rem")]))],
        );
        let sec = theme.section("spacing");
        assert_eq!(sec.get("4"), Some(&ThemeValue::from("1rem")));
        assert_eq!(sec.get("8"), Some(&ThemeValue::from("3rem")));
        assert_eq!(sec.get("96"), Some(&ThemeValue::from("24rem")));
    }

    #[test]
    fn missing_section_is_empty() {
        let theme = theme_with(&[], &[]);
        assert!(theme.section("nope").is_empty());
    }

    #[test]
    fn lazy_section_sees_other_sections() {
        let mut sections: BTreeMap<String, SectionSource> = BTreeMap::new();
        sections.insert(
            "spacing".to_owned(),
            SectionSource::Map(token_map(&[("4", "1rem")])),
        );
        sections.insert(
            "width".to_owned(),
            SectionSource::Lazy(Rc::new(|api: &ThemeApi<'_>| {
                let mut map = (*api.section("spacing")).clone();
                map.insert("full".to_owned(), ThemeValue::from("100%"));
                map
            })),
        );
        let theme = Theme::new(ThemeConfig {
            sections,
            extend: BTreeMap::new(),
        });
        let width = theme.section("width");
        assert_eq!(width.get("4"), Some(&ThemeValue::from("1rem")));
        assert_eq!(width.get("full"), Some(&ThemeValue::from("100%")));
    }

    #[test]
    fn self_referential_lazy_section_terminates() {
        let mut sections: BTreeMap<String, SectionSource> = BTreeMap::new();
        sections.insert(
            "loop".to_owned(),
            SectionSource::Lazy(Rc::new(|api: &ThemeApi<'_>| (*api.section("loop")).clone())),
        );
        let theme = Theme::new(ThemeConfig {
            sections,
            extend: BTreeMap::new(),
        });
        // The pre-seeded placeholder breaks the cycle.
        assert!(theme.section("loop").is_empty());
    }

    // ── color flattening ─────────────────────────────────────────────

    #[test]
    fn colors_flatten_with_default_collapse() {
        let mut sections = BTreeMap::new();
        sections.insert("colors".to_owned(), SectionSource::Map(nested_colors()));
        let theme = Theme::new(ThemeConfig {
            sections,
            extend: BTreeMap::new(),
        });
        let colors = theme.section("colors");
        assert_eq!(colors.get("red-500"), Some(&ThemeValue::from("#ef4444")));
        assert_eq!(colors.get("red"), Some(&ThemeValue::from("#f00")));
        assert_eq!(colors.get("white"), Some(&ThemeValue::from("#fff")));
    }

    // ── lookup and paths ─────────────────────────────────────────────

    #[test]
    fn lookup_empty_key_means_default() {
        let theme = theme_with(&[("borderWidth", token_map(&[("DEFAULT", "1px")]))], &[]);
        assert_eq!(
            theme.lookup("borderWidth", ""),
            Some(ThemeValue::from("1px"))
        );
    }

    #[test]
    fn lookup_walks_nested_maps() {
        let mut fine = ThemeMap::new();
        fine.insert("tight".to_owned(), ThemeValue::from("-0.05em"));
        let mut map = ThemeMap::new();
        map.insert("letter".to_owned(), ThemeValue::Map(fine));
        let theme = theme_with(&[("tracking", map)], &[]);
        assert_eq!(
            theme.lookup("tracking", "letter-tight"),
            Some(ThemeValue::from("-0.05em"))
        );
    }

    #[test]
    fn resolve_dotted_path_with_alpha() {
        let mut sections = BTreeMap::new();
        sections.insert("colors".to_owned(), SectionSource::Map(nested_colors()));
        let theme = Theme::new(ThemeConfig {
            sections,
            extend: BTreeMap::new(),
        });
        assert_eq!(
            theme.resolve("colors.red.500/50%"),
            Some(ThemeValue::from("rgba(239,68,68,50%)"))
        );
    }

    #[test]
    fn resolve_bracket_segment() {
        let theme = theme_with(&[("spacing", token_map(&[("2.5", "0.625rem")]))], &[]);
        assert_eq!(
            theme.resolve("spacing[2.5]"),
            Some(ThemeValue::from("0.625rem"))
        );
    }

    #[test]
    fn resolve_missing_path_is_none() {
        let theme = theme_with(&[], &[]);
        assert_eq!(theme.resolve("colors.missing.500"), None);
    }

    #[test]
    fn resolve_section_only_yields_map() {
        let theme = theme_with(&[("spacing", token_map(&[("4", "1rem")]))], &[]);
        match theme.resolve("spacing") {
            Some(ThemeValue::Map(m)) => assert_eq!(m.len(), 1),
            other => panic!("expected map, got {other:?}"),
        }
    }

    // ── substitution ─────────────────────────────────────────────────

    #[test]
    fn substitute_quoted_and_bare_refs() {
        let theme = theme_with(&[("spacing", token_map(&[("4", "1rem")]))], &[]);
        assert_eq!(
            substitute_theme_refs("calc(theme('spacing.4') * 2)", &theme),
            "calc(1rem * 2)"
        );
        assert_eq!(
            substitute_theme_refs("theme(spacing.4)", &theme),
            "1rem"
        );
    }

    #[test]
    fn substitute_uses_fallback() {
        let theme = theme_with(&[], &[]);
        assert_eq!(
            substitute_theme_refs("theme(spacing.7, 1.75rem)", &theme),
            "1.75rem"
        );
    }

    #[test]
    fn substitute_missing_renders_empty() {
        let theme = theme_with(&[], &[]);
        assert_eq!(substitute_theme_refs("theme(nope.x)", &theme), "");
    }

    // ── screens ──────────────────────────────────────────────────────

    #[test]
    fn media_query_from_string_screen() {
        assert_eq!(
            media_query(&ThemeValue::from("640px"), "@media "),
            "@media (min-width:640px)"
        );
    }

    #[test]
    fn media_query_from_descriptor_map() {
        let mut m = ThemeMap::new();
        m.insert("max".to_owned(), ThemeValue::from("767px"));
        m.insert("min".to_owned(), ThemeValue::from("640px"));
        assert_eq!(
            media_query(&ThemeValue::Map(m), "@media "),
            "@media (max-width:767px) and (min-width:640px)"
        );
    }

    #[test]
    fn breakpoints_accessor() {
        let theme = theme_with(&[("screens", token_map(&[("sm", "640px")]))], &[]);
        let api = ThemeApi { theme: &theme };
        assert_eq!(
            api.breakpoints().get("screen-sm"),
            Some(&ThemeValue::from("640px"))
        );
    }
}
