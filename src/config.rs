//! Engine configuration: presets, merge order, and resolution.
//!
//! A [`Config`] is a partial description; [`resolve`] stacks the built-in
//! preset, every listed preset in order, and the user config last, producing
//! the [`ResolvedConfig`] a [`crate::context::Context`] is built from.
//! Later entries win for scalar settings and theme sections; rule and
//! variant tables concatenate, earlier entries matching first.

use std::rc::Rc;

use regex::Regex;

use crate::precedence::CompiledRule;
use crate::rules::{anchor_pattern, base_preset, Rule};
use crate::serialize::StyleObject;
use crate::theme::{Theme, ThemeConfig};
use crate::variant::Variant;

/// How `dark:` variants are placed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DarkMode {
    /// `@media (prefers-color-scheme:dark)`.
    Media,
    /// `.dark &` class toggling.
    Class,
    /// A custom condition (selector containing `&`, or an at-rule).
    Selector(String),
    /// No dark variant; `dark:` falls back like any unknown token.
    Off,
}

/// Class-name hashing.
#[derive(Clone, Default)]
pub enum HashMode {
    #[default]
    Off,
    /// Hash with the built-in class hash.
    Enabled,
    Custom(Rc<dyn Fn(&str) -> String>),
}

impl std::fmt::Debug for HashMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HashMode::Off => f.write_str("Off"),
            HashMode::Enabled => f.write_str("Enabled"),
            HashMode::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// One preflight entry: literal styles, or a class string spliced into the
/// base layer through the rule table.
#[derive(Debug, Clone)]
pub enum PreflightItem {
    Styles(StyleObject),
    Classes(String),
}

/// Hook mapping a resolved color to its dark-scheme counterpart,
/// `(section, key, light_color, theme)`.
pub type DarkColorFn = Rc<dyn Fn(&str, &str, &str, &Theme) -> Option<String>>;

/// Hook run over every compiled rule before insertion.
pub type FinalizeFn = Rc<dyn Fn(CompiledRule) -> CompiledRule>;

/// A partial configuration; also the shape of a preset.
#[derive(Default, Clone)]
pub struct Config {
    /// Presets merged before this config, in order.
    pub presets: Vec<Config>,
    pub theme: ThemeConfig,
    pub rules: Vec<Rule>,
    pub variants: Vec<Variant>,
    /// `None` inherits from earlier presets; the overall default is
    /// [`DarkMode::Media`].
    pub dark_mode: Option<DarkMode>,
    pub dark_color: Option<DarkColorFn>,
    /// `None` inherits; the overall default is [`HashMode::Off`].
    pub hash: Option<HashMode>,
    /// Patterns for utilities the engine must leave alone.
    pub ignorelist: Vec<String>,
    pub preflight: Vec<PreflightItem>,
    pub finalize: Vec<FinalizeFn>,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("presets", &self.presets.len())
            .field("rules", &self.rules.len())
            .field("variants", &self.variants.len())
            .field("dark_mode", &self.dark_mode)
            .field("hash", &self.hash)
            .finish_non_exhaustive()
    }
}

/// The merged, ready-to-use configuration.
pub struct ResolvedConfig {
    pub theme: ThemeConfig,
    pub rules: Vec<Rule>,
    pub variants: Vec<Variant>,
    /// The condition registered for the `dark` token, if any.
    pub dark_condition: Option<String>,
    pub dark_color: Option<DarkColorFn>,
    pub hash: HashMode,
    pub ignorelist: Vec<Regex>,
    pub preflight: Vec<PreflightItem>,
    pub finalize: Vec<FinalizeFn>,
}

impl std::fmt::Debug for ResolvedConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedConfig")
            .field("rules", &self.rules.len())
            .field("variants", &self.variants.len())
            .field("dark_condition", &self.dark_condition)
            .field("hash", &self.hash)
            .finish_non_exhaustive()
    }
}

/// Stack the built-in preset, `user.presets` in order, and `user` itself
/// last.
pub fn resolve(user: Config) -> ResolvedConfig {
    let mut acc = base_preset();
    merge_into(&mut acc, user);

    let dark_condition = match acc.dark_mode.unwrap_or(DarkMode::Media) {
        DarkMode::Media => Some("@media (prefers-color-scheme:dark)".to_owned()),
        DarkMode::Class => Some(".dark &".to_owned()),
        DarkMode::Selector(s) => Some(s),
        DarkMode::Off => None,
    };

    let ignorelist = acc
        .ignorelist
        .iter()
        .filter_map(|p| Regex::new(&anchor_pattern(p)).ok())
        .collect();

    ResolvedConfig {
        theme: acc.theme,
        rules: acc.rules,
        variants: acc.variants,
        dark_condition,
        dark_color: acc.dark_color,
        hash: acc.hash.unwrap_or_default(),
        ignorelist,
        preflight: acc.preflight,
        finalize: acc.finalize,
    }
}

fn merge_into(acc: &mut Config, layer: Config) {
    // Depth-first: a preset's own presets apply before it does.
    for preset in layer.presets {
        merge_into(acc, preset);
    }
    acc.theme.merge(layer.theme);
    acc.rules.extend(layer.rules);
    acc.variants.extend(layer.variants);
    if layer.dark_mode.is_some() {
        acc.dark_mode = layer.dark_mode;
    }
    if layer.dark_color.is_some() {
        acc.dark_color = layer.dark_color;
    }
    if layer.hash.is_some() {
        acc.hash = layer.hash;
    }
    acc.ignorelist.extend(layer.ignorelist);
    acc.preflight.extend(layer.preflight);
    acc.finalize.extend(layer.finalize);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::theme::{token_map, SectionSource, ThemeValue};

    fn theme_section(name: &str, entries: &[(&str, &str)]) -> ThemeConfig {
        let mut sections = std::collections::BTreeMap::new();
        sections.insert(name.to_owned(), SectionSource::Map(token_map(entries)));
        ThemeConfig {
            sections,
            extend: std::collections::BTreeMap::new(),
        }
    }

    // ── merge order ──────────────────────────────────────────────────

    #[test]
    fn default_config_carries_builtins() {
        let resolved = resolve(Config::default());
        assert!(!resolved.rules.is_empty());
        assert!(!resolved.variants.is_empty());
        assert!(!resolved.preflight.is_empty());
        assert_eq!(
            resolved.dark_condition.as_deref(),
            Some("@media (prefers-color-scheme:dark)")
        );
    }

    #[test]
    fn user_theme_section_replaces_builtin() {
        let resolved = resolve(Config {
            theme: theme_section("screens", &[("tablet", "900px")]),
            ..Config::default()
        });
        let theme = Theme::new(resolved.theme);
        let screens = theme.section("screens");
        assert_eq!(screens.get("tablet"), Some(&ThemeValue::from("900px")));
        assert_eq!(screens.get("sm"), None);
    }

    #[test]
    fn extend_keeps_builtin_tokens() {
        let mut extend = std::collections::BTreeMap::new();
        extend.insert(
            "screens".to_owned(),
            SectionSource::Map(token_map(&[("3xl", "1920px")])),
        );
        let resolved = resolve(Config {
            theme: ThemeConfig {
                sections: std::collections::BTreeMap::new(),
                extend,
            },
            ..Config::default()
        });
        let theme = Theme::new(resolved.theme);
        let screens = theme.section("screens");
        assert_eq!(screens.get("sm"), Some(&ThemeValue::from("640px")));
        assert_eq!(screens.get("3xl"), Some(&ThemeValue::from("1920px")));
    }

    #[test]
    fn presets_apply_before_the_user_config() {
        let preset = Config {
            theme: theme_section("spacing", &[("gutter", "2rem")]),
            dark_mode: Some(DarkMode::Class),
            ..Config::default()
        };
        let resolved = resolve(Config {
            presets: vec![preset],
            theme: theme_section("spacing", &[("gutter", "3rem")]),
            ..Config::default()
        });
        let theme = Theme::new(resolved.theme);
        assert_eq!(
            theme.lookup("spacing", "gutter"),
            Some(ThemeValue::from("3rem"))
        );
        // The preset's dark mode survives because the user left it unset.
        assert_eq!(resolved.dark_condition.as_deref(), Some(".dark &"));
    }

    // ── dark mode ────────────────────────────────────────────────────

    #[test]
    fn dark_mode_selector_is_verbatim() {
        let resolved = resolve(Config {
            dark_mode: Some(DarkMode::Selector("[data-theme=dark] &".to_owned())),
            ..Config::default()
        });
        assert_eq!(
            resolved.dark_condition.as_deref(),
            Some("[data-theme=dark] &")
        );
    }

    #[test]
    fn dark_mode_off_drops_the_condition() {
        let resolved = resolve(Config {
            dark_mode: Some(DarkMode::Off),
            ..Config::default()
        });
        assert_eq!(resolved.dark_condition, None);
    }

    // ── ignorelist ───────────────────────────────────────────────────

    #[test]
    fn ignorelist_patterns_are_anchored() {
        let resolved = resolve(Config {
            ignorelist: vec!["legacy-".to_owned()],
            ..Config::default()
        });
        assert!(resolved.ignorelist[0].is_match("legacy-button"));
        assert!(!resolved.ignorelist[0].is_match("not-legacy-button"));
    }
}
