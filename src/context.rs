//! The compile context: resolved configuration plus per-engine memo caches.
//!
//! Parsing, variant resolution, and rule matching are all pure functions of
//! the configuration, so their results are cached here for the lifetime of
//! the owning engine.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::sync::OnceLock;

use regex::Regex;

use crate::config::{HashMode, PreflightItem, ResolvedConfig};
use crate::parse::{parse_class, UtilitySpec};
use crate::precedence::CompiledRule;
use crate::serialize::StyleObject;
use crate::theme::Theme;
use crate::value::class_hash;

pub struct Context {
    config: ResolvedConfig,
    theme: Theme,
    parse_cache: RefCell<HashMap<String, Rc<Vec<UtilitySpec>>>>,
    variant_cache: RefCell<HashMap<String, String>>,
    rule_cache: RefCell<HashMap<(String, bool, bool), Option<StyleObject>>>,
}

impl Context {
    pub fn new(config: ResolvedConfig) -> Self {
        let theme = Theme::new(config.theme.clone());
        Self {
            config,
            theme,
            parse_cache: RefCell::new(HashMap::new()),
            variant_cache: RefCell::new(HashMap::new()),
            rule_cache: RefCell::new(HashMap::new()),
        }
    }

    pub fn theme(&self) -> &Theme {
        &self.theme
    }

    pub fn preflight(&self) -> &[PreflightItem] {
        &self.config.preflight
    }

    /// Parse a class string, memoized.
    pub fn parse(&self, input: &str) -> Rc<Vec<UtilitySpec>> {
        if let Some(hit) = self.parse_cache.borrow().get(input) {
            return Rc::clone(hit);
        }
        let specs = Rc::new(parse_class(input));
        self.parse_cache
            .borrow_mut()
            .insert(input.to_owned(), Rc::clone(&specs));
        specs
    }

    /// Resolve a variant token to its condition, memoized.
    ///
    /// `dark` resolves to the configured dark condition; everything else
    /// runs the registered variant chain and falls back to the literal
    /// pseudo-class.
    pub fn variant(&self, token: &str) -> String {
        if let Some(hit) = self.variant_cache.borrow().get(token) {
            return hit.clone();
        }
        let cond = self.resolve_variant(token);
        self.variant_cache
            .borrow_mut()
            .insert(token.to_owned(), cond.clone());
        cond
    }

    fn resolve_variant(&self, token: &str) -> String {
        if token == "dark" {
            if let Some(cond) = &self.config.dark_condition {
                return cond.clone();
            }
        }
        for variant in &self.config.variants {
            if let Some(cond) = variant.try_resolve(token, self) {
                return cond;
            }
        }
        format!("&:{token}")
    }

    /// Match a utility name against the rule table, memoized. Ignorelisted
    /// names never match and pass through to the class list untouched.
    pub fn rule_css(&self, name: &str, negated: bool, dark: bool) -> Option<StyleObject> {
        if self.config.ignorelist.iter().any(|re| re.is_match(name)) {
            return None;
        }
        let key = (name.to_owned(), negated, dark);
        if let Some(hit) = self.rule_cache.borrow().get(&key) {
            return hit.clone();
        }
        let result = self
            .config
            .rules
            .iter()
            .find_map(|rule| rule.try_match(name, negated, dark, self));
        self.rule_cache.borrow_mut().insert(key, result.clone());
        result
    }

    /// The dark-scheme counterpart of a resolved color, when a hook is
    /// configured.
    pub fn dark_color(&self, section: &str, key: &str, light: &str) -> Option<String> {
        (self.config.dark_color.as_ref()?)(section, key, light, &self.theme)
    }

    pub fn hash_enabled(&self) -> bool {
        !matches!(self.config.hash, HashMode::Off)
    }

    /// Hash a class name per the configured mode; identity when hashing is
    /// off.
    pub fn hash_name(&self, name: &str) -> String {
        match &self.config.hash {
            HashMode::Off => name.to_owned(),
            HashMode::Enabled => class_hash(name),
            HashMode::Custom(f) => f(name),
        }
    }

    /// The marker class a `group-*`/`peer-*` variant targets.
    pub fn marker_class(&self, marker: &str) -> String {
        self.hash_name(marker)
    }

    /// Run configured finalize hooks, then apply hashing: the rule name and
    /// every engine-owned custom property are renamed consistently.
    pub fn finalize(&self, mut rule: CompiledRule) -> CompiledRule {
        for f in &self.config.finalize {
            rule = f(rule);
        }
        if self.hash_enabled() {
            if let Some(name) = &rule.name {
                rule.name = Some(self.hash_name(name));
            }
            if rule.decls.contains("--w") {
                rule.decls = custom_prop_re()
                    .replace_all(&rule.decls, |caps: &regex::Captures<'_>| {
                        let hashed = self.hash_name(&caps[0]);
                        format!("--{}", hashed.trim_start_matches('#'))
                    })
                    .into_owned();
            }
        }
        rule
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context").finish_non_exhaustive()
    }
}

fn custom_prop_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"--(w(?:-[\w-]+)?)\b").expect("custom prop pattern"))
}
