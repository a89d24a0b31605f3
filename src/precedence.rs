//! Cascade precedence: layers, weights, and the rule comparator.
//!
//! Every compiled rule carries a [`Precedence`] record describing where it
//! belongs in the cascade. The record projects to a single numeric rank for
//! coarse ordering; ties are broken by declaration-derived order scores and
//! finally by name, so insertion position is deterministic regardless of the
//! order utilities were compiled in.

use std::cmp::Ordering;
use std::sync::OnceLock;

use regex::Regex;

use crate::value::natural_cmp;

/// Cascade layer of a rule, lowest first.
///
/// `Imports` sorts before everything; `Overrides` after everything.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Layer {
    Imports,
    Defaults,
    Base,
    Components,
    Aliases,
    Utilities,
    Overrides,
}

impl Layer {
    /// Numeric class of the layer within the packed rank.
    ///
    /// `Imports` shares a class with `Overrides`: its rank is pinned below
    /// zero, and the shared class keeps the equal-class comparison working
    /// for both ends of the cascade.
    pub fn class(self) -> u8 {
        match self {
            Layer::Imports | Layer::Overrides => 7,
            Layer::Defaults => 0,
            Layer::Base => 1,
            Layer::Components => 2,
            Layer::Aliases => 5,
            Layer::Utilities => 6,
        }
    }

    /// Parse an `@layer` name. Unknown names keep the current layer.
    pub fn from_name(name: &str) -> Option<Layer> {
        match name {
            "defaults" => Some(Layer::Defaults),
            "base" => Some(Layer::Base),
            "components" => Some(Layer::Components),
            "aliases" | "shortcuts" => Some(Layer::Aliases),
            "utilities" => Some(Layer::Utilities),
            "overrides" => Some(Layer::Overrides),
            _ => None,
        }
    }
}

/// Where a rule sits in the cascade, as named fields.
///
/// `responsive` and `selector_weight` are 4-bit saturating weights;
/// `pseudo` is an 18-bit priority bitset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Precedence {
    pub layer: Layer,
    pub dark: bool,
    pub screen: bool,
    pub responsive: u8,
    pub selector_weight: u8,
    pub pseudo: u32,
}

impl Precedence {
    /// A bare precedence in the given layer.
    pub fn of(layer: Layer) -> Self {
        Self {
            layer,
            dark: false,
            screen: false,
            responsive: 0,
            selector_weight: 0,
            pseudo: 0,
        }
    }

    /// Same weights, different layer.
    pub fn with_layer(self, layer: Layer) -> Self {
        Self { layer, ..self }
    }

    /// Project to the packed numeric rank used for coarse ordering.
    ///
    /// Bit layout, high to low: dark (30), layer class (27..29), screen (26),
    /// responsive weight (22..25), selector weight (18..21), pseudo bitset
    /// (0..17). Imports rank below everything at -1.
    pub fn rank(&self) -> i64 {
        if self.layer == Layer::Imports {
            return -1;
        }
        (i64::from(self.dark) << 30)
            | (i64::from(self.layer.class()) << 27)
            | (i64::from(self.screen) << 26)
            | (i64::from(self.responsive.min(15)) << 22)
            | (i64::from(self.selector_weight.min(15)) << 18)
            | i64::from(self.pseudo)
    }

    /// Fold in the weights of a media/at-rule condition.
    pub fn add_condition(&mut self, cond: &str) {
        let (responsive, selector) = media_weight(cond);
        self.responsive |= responsive;
        self.selector_weight |= selector;
    }

    /// Fold in the pseudo-class priority of a selector condition.
    pub fn add_selector(&mut self, selector: &str) {
        self.pseudo |= pseudo_bit(selector);
    }

    /// OR all weight fields of `other` into `self`, keeping `self`'s layer.
    pub fn absorb(&mut self, other: &Precedence) {
        self.dark |= other.dark;
        self.screen |= other.screen;
        self.responsive |= other.responsive;
        self.selector_weight |= other.selector_weight;
        self.pseudo |= other.pseudo;
    }
}

/// A fully serialized rule, ready for physical insertion.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledRule {
    /// Class name this rule is addressed by (`None` for keyframes, imports
    /// and other unnamed rules).
    pub name: Option<String>,
    /// Passthrough token for input that matched no rule; emitted into the
    /// class list verbatim, never into the sheet.
    pub class_token: Option<String>,
    pub prec: Precedence,
    /// Declaration-derived tie-break score; lower inserts earlier.
    pub order: f32,
    /// Wrapping conditions, outermost first: at-rules and `&` selectors.
    pub conds: Vec<String>,
    /// Flat `prop:value` declarations joined by `;`.
    pub decls: String,
}

impl CompiledRule {
    /// An empty passthrough rule carrying only a class token.
    pub fn passthrough(token: String) -> Self {
        Self {
            name: None,
            class_token: Some(token),
            prec: Precedence::of(Layer::Defaults),
            order: 0.0,
            conds: Vec::new(),
            decls: String::new(),
        }
    }
}

// ── pseudo-class priority ────────────────────────────────────────────

/// Pseudo-classes in cascade-priority order. Later entries must win over
/// earlier ones when both apply to the same element (`:active` over
/// `:hover`, `:visited` over `:link`).
const PSEUDO_PRIORITY: [&str; 17] = [
    "first-child",
    "last-child",
    "nth-child",
    "any-link",
    "link",
    "visited",
    "checked",
    "empty",
    "read-only",
    "focus-within",
    "hover",
    "focus",
    "focus-visible",
    "active",
    "disabled",
    "optional",
    "required",
];

fn pseudo_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r":([a-z-]+)").expect("pseudo pattern"))
}

/// Priority bit for the first pseudo-class in a selector.
///
/// Entries are keyed by characters 2..7 of the pseudo name, which is enough
/// to tell the table entries apart while tolerating vendor spellings.
/// Selectors without a (known) pseudo-class get the top bit, so plain
/// selector variants sort after every tabled pseudo state.
pub fn pseudo_bit(selector: &str) -> u32 {
    if let Some(caps) = pseudo_re().captures(selector) {
        let key = mid_key(&caps[1]);
        for (i, entry) in PSEUDO_PRIORITY.iter().enumerate() {
            if mid_key(entry) == key {
                return 1 << i;
            }
        }
    }
    1 << 17
}

fn mid_key(name: &str) -> &str {
    let end = name.len().min(7);
    let start = 2.min(end);
    &name[start..end]
}

// ── condition weights ────────────────────────────────────────────────

fn width_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?:^|width[^\d]+)(\d+(?:\.\d+)?)(p)?").expect("width pattern")
    })
}

/// Count of structural characters (`-=:;`) in a condition, capped at 15.
pub fn symbol_weight(s: &str) -> u8 {
    let n = s.chars().filter(|c| matches!(c, '-' | '=' | ':' | ';')).count();
    n.min(15) as u8
}

/// Weights of an at-rule condition: (responsive, selector).
///
/// The responsive weight grows logarithmically with the first width found in
/// the query, so breakpoints keep their relative order no matter which are
/// used; pixel widths (followed by `p`) are scaled down to em-like numbers
/// first.
pub fn media_weight(cond: &str) -> (u8, u8) {
    let responsive = width_re()
        .captures(cond)
        .and_then(|caps| {
            let number: f64 = caps.get(1)?.as_str().parse().ok()?;
            let width = if caps.get(2).is_some() { number / 15.0 } else { number };
            let score = 29.63 * width.powf(0.137) - 43.0;
            Some(score.clamp(0.0, 15.0) as u8)
        })
        .unwrap_or(0);
    (responsive, symbol_weight(cond))
}

// ── declaration order score ──────────────────────────────────────────

fn property_adjust_re() -> &'static (Regex, Regex) {
    static RE: OnceLock<(Regex, Regex)> = OnceLock::new();
    RE.get_or_init(|| {
        (
            // Shorthand-leaning property shapes: weigh up.
            Regex::new(r"^(?:[tlbr].{2,4}m?$|c.{7,8}$)").expect("plus pattern"),
            // Longhand-leaning property shapes: weigh down.
            Regex::new(r"^(?:[fl].{5}l|g.{8}$|pl)").expect("minus pattern"),
        )
    })
}

/// Cascade weight of a single declared property.
///
/// Custom properties weigh nothing. Shorthands that other utilities commonly
/// override (`border`, margins, `color`) get a bump so the overriding
/// longhands sort after them.
pub fn property_weight(prop: &str) -> u32 {
    if prop.starts_with('-') {
        return 0;
    }
    let (plus, minus) = property_adjust_re();
    let adjust: i32 = if is_bare_border(prop) || plus.is_match(prop) {
        1
    } else if minus.is_match(prop) {
        -1
    } else {
        0
    };
    (i32::from(symbol_weight(prop)) + adjust + 1).max(0) as u32
}

fn is_bare_border(prop: &str) -> bool {
    match prop.strip_prefix("border-") {
        Some(rest) => {
            !(rest.starts_with('w') || rest.starts_with('c') || rest.starts_with("sty"))
        }
        None => false,
    }
}

/// Tie-break order score for a rule body.
///
/// Fewer declarations and heavier properties push a rule later, so
/// shorthand-style utilities yield to targeted ones at equal rank.
pub fn order_score(decl_count: u32, max_property_weight: u32) -> f32 {
    let weight = if max_property_weight == 0 { 15 } else { max_property_weight };
    (15u32.saturating_sub(decl_count)) as f32 + 1.5 * weight.min(15) as f32
}

// ── comparator and insertion ─────────────────────────────────────────

/// Strict-weak ordering over compiled rules.
///
/// Rules in the `Base` and `Overrides` layer classes compare equal to each
/// other, preserving authored insertion order. Everywhere else: packed rank,
/// then order score, then natural compare of the name's final segment, then
/// the mangled full name.
pub fn cmp_rules(a: &CompiledRule, b: &CompiledRule) -> Ordering {
    let class = b.prec.layer.class();
    if a.prec.layer.class() == class && (class == Layer::Base.class() || class == Layer::Overrides.class()) {
        return Ordering::Equal;
    }
    a.prec
        .rank()
        .cmp(&b.prec.rank())
        .then_with(|| a.order.partial_cmp(&b.order).unwrap_or(Ordering::Equal))
        .then_with(|| natural_cmp(&moniker(a), &moniker(b)))
        .then_with(|| natural_cmp(&mangle(a), &mangle(b)))
}

/// Insertion position for `rule` in an already-sorted slice.
///
/// Equal rules insert after their peers, so insertion order is preserved
/// within a tie.
pub fn insertion_index(rules: &[CompiledRule], rule: &CompiledRule) -> usize {
    let mut lo = 0usize;
    let mut hi = rules.len();
    while lo < hi {
        let mid = (lo + hi) >> 1;
        if cmp_rules(&rules[mid], rule) != Ordering::Greater {
            lo = mid + 1;
        } else {
            hi = mid;
        }
    }
    hi
}

/// The name's final segment: after the last variant colon and the last
/// slash. Sorting by it groups `sm:p-2` with `p-2`.
fn moniker(rule: &CompiledRule) -> String {
    match &rule.name {
        Some(name) => {
            let last = name.rsplit(':').next().unwrap_or(name);
            let last = last.rsplit('/').next().unwrap_or(last);
            if last.is_empty() {
                "\0".to_owned()
            } else {
                last.to_owned()
            }
        }
        None => "\0".to_owned(),
    }
}

/// Full name with non-word characters shifted past the alphabet, plus a
/// terminator, so `p-2` sorts before `p-2.5` but after bare `p`.
fn mangle(rule: &CompiledRule) -> String {
    match &rule.name {
        Some(name) => {
            let mut out: String = name
                .chars()
                .map(|c| {
                    if c.is_alphanumeric() || c == '_' {
                        c
                    } else {
                        char::from_u32(c as u32 + 127).unwrap_or(c)
                    }
                })
                .collect();
            out.push('\0');
            out
        }
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(layer: Layer, name: &str) -> CompiledRule {
        CompiledRule {
            name: Some(name.to_owned()),
            class_token: None,
            prec: Precedence::of(layer),
            order: 0.0,
            conds: Vec::new(),
            decls: "color:red".to_owned(),
        }
    }

    // ── layer ordering ───────────────────────────────────────────────

    #[test]
    fn layers_rank_in_order() {
        let ranks: Vec<i64> = [
            Layer::Imports,
            Layer::Defaults,
            Layer::Base,
            Layer::Components,
            Layer::Aliases,
            Layer::Utilities,
            Layer::Overrides,
        ]
        .iter()
        .map(|&l| Precedence::of(l).rank())
        .collect();
        for pair in ranks.windows(2) {
            assert!(pair[0] < pair[1], "{pair:?} out of order");
        }
    }

    #[test]
    fn imports_rank_below_zero() {
        assert_eq!(Precedence::of(Layer::Imports).rank(), -1);
    }

    #[test]
    fn dark_outranks_every_layer() {
        let mut dark = Precedence::of(Layer::Base);
        dark.dark = true;
        assert!(dark.rank() > Precedence::of(Layer::Overrides).rank());
    }

    // ── pseudo priorities ────────────────────────────────────────────

    #[test]
    fn pseudo_bits_follow_table_order() {
        let hover = pseudo_bit("&:hover");
        let focus = pseudo_bit("&:focus");
        let active = pseudo_bit("&:active");
        assert!(hover < focus);
        assert!(focus < active);
    }

    #[test]
    fn visited_wins_over_link() {
        assert!(pseudo_bit("&:link") < pseudo_bit("&:visited"));
    }

    #[test]
    fn unknown_pseudo_gets_top_bit() {
        assert_eq!(pseudo_bit("&:warble"), 1 << 17);
        assert_eq!(pseudo_bit(".sidebar &"), 1 << 17);
    }

    #[test]
    fn focus_within_is_not_focus() {
        assert!(pseudo_bit("&:focus-within") < pseudo_bit("&:focus"));
    }

    // ── media weights ────────────────────────────────────────────────

    #[test]
    fn breakpoints_monotonic() {
        let widths = ["640px", "768px", "1024px", "1280px", "1536px"];
        let scores: Vec<u8> = widths
            .iter()
            .map(|w| media_weight(&format!("@media (min-width:{w})")).0)
            .collect();
        for pair in scores.windows(2) {
            assert!(pair[0] < pair[1], "{scores:?} not monotonic");
        }
    }

    #[test]
    fn media_weight_without_width() {
        let (responsive, selector) = media_weight("@media print");
        assert_eq!(responsive, 0);
        assert_eq!(selector, 0);
    }

    #[test]
    fn symbol_weight_counts_and_caps() {
        assert_eq!(symbol_weight("min-width:640px"), 2);
        assert_eq!(symbol_weight(&"-".repeat(40)), 15);
    }

    // ── order score ──────────────────────────────────────────────────

    #[test]
    fn custom_properties_weigh_nothing() {
        assert_eq!(property_weight("--w-shadow"), 0);
    }

    #[test]
    fn border_shorthand_outweighs_border_width() {
        assert!(property_weight("border-top") > property_weight("border-width"));
    }

    #[test]
    fn fewer_declarations_score_later() {
        assert!(order_score(1, 2) > order_score(4, 2));
    }

    #[test]
    fn custom_prop_only_scores_latest() {
        assert_eq!(order_score(1, 0), order_score(1, 15));
    }

    // ── comparator ───────────────────────────────────────────────────

    #[test]
    fn base_rules_preserve_insertion_order() {
        let a = rule(Layer::Base, "a");
        let b = rule(Layer::Base, "b");
        assert_eq!(cmp_rules(&b, &a), Ordering::Equal);
    }

    #[test]
    fn utilities_tie_break_by_name_naturally() {
        let a = rule(Layer::Utilities, "p-2");
        let b = rule(Layer::Utilities, "p-10");
        assert_eq!(cmp_rules(&a, &b), Ordering::Less);
    }

    #[test]
    fn dashes_sort_after_letters_in_full_names() {
        // Equal monikers force the full-name tie-break, where every
        // non-alphanumeric character maps past the alphabet.
        let dashed = rule(Layer::Utilities, "group-hover:underline");
        let plain = rule(Layer::Utilities, "grouped:underline");
        assert_eq!(cmp_rules(&dashed, &plain), Ordering::Greater);
    }

    #[test]
    fn variant_shares_moniker_with_base_utility() {
        let plain = rule(Layer::Utilities, "p-2");
        let mut varianted = rule(Layer::Utilities, "sm:p-2");
        varianted.prec.screen = true;
        varianted.prec.responsive = 6;
        assert_eq!(cmp_rules(&plain, &varianted), Ordering::Less);
    }

    #[test]
    fn insertion_index_is_stable_for_ties() {
        let a = rule(Layer::Base, "a");
        let b = rule(Layer::Base, "b");
        let list = vec![a.clone()];
        // Equal compares insert after the existing run.
        assert_eq!(insertion_index(&list, &b), 1);
    }

    #[test]
    fn insertion_index_orders_layers() {
        let base = rule(Layer::Base, "base");
        let util = rule(Layer::Utilities, "p-4");
        let list = vec![base, util];
        let comp = rule(Layer::Components, "btn");
        assert_eq!(insertion_index(&list, &comp), 1);
    }

    #[test]
    fn hover_sorts_before_active_at_equal_rank() {
        let mut hover = rule(Layer::Utilities, "hover:underline");
        hover.prec.add_selector("&:hover");
        let mut active = rule(Layer::Utilities, "active:underline");
        active.prec.add_selector("&:active");
        assert_eq!(cmp_rules(&hover, &active), Ordering::Less);
    }
}
