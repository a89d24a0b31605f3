//! CSS value primitives: escaping, hashing, color composition, and
//! arbitrary-value normalization.
//!
//! These are the leaf helpers everything else builds on. They are all pure
//! functions over strings; nothing here touches the theme or the sheet.

use std::cmp::Ordering;

/// Characters that must be backslash-escaped inside a CSS class selector.
const ESCAPE_SET: &str = "!\"'`*+.,;:\\/<=>?@#$%&^|~()[]{}";

/// Escape a class name for use in a selector.
///
/// Special characters get a leading backslash; a leading ASCII digit becomes
/// a CSS unicode escape (`\3<digit> `), since selectors cannot start with a
/// digit.
pub fn escape_css(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    for (i, ch) in name.chars().enumerate() {
        if i == 0 && ch.is_ascii_digit() {
            out.push_str("\\3");
            out.push(ch);
            out.push(' ');
        } else if ESCAPE_SET.contains(ch) {
            out.push('\\');
            out.push(ch);
        } else {
            out.push(ch);
        }
    }
    out
}

/// Deterministic content hash for class names and group markers.
///
/// A 32-bit multiplicative hash folded right-to-left over UTF-16 code units,
/// rendered as `#` followed by base-36 digits. Stable across processes, so
/// hashed output is reproducible in tests and across replicas.
pub fn class_hash(value: &str) -> String {
    let units: Vec<u16> = value.encode_utf16().collect();
    let mut h: u32 = 9;
    for &unit in units.iter().rev() {
        h = (h ^ u32::from(unit)).wrapping_mul(1_597_334_677);
    }
    let folded = h ^ (h >> 9);
    format!("#{}", to_base36(folded))
}

fn to_base36(mut n: u32) -> String {
    const DIGITS: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if n == 0 {
        return "0".to_owned();
    }
    let mut buf = [0u8; 7];
    let mut i = buf.len();
    while n > 0 {
        i -= 1;
        buf[i] = DIGITS[(n % 36) as usize];
        n /= 36;
    }
    String::from_utf8_lossy(&buf[i..]).into_owned()
}

/// Numeric-aware string compare: digit runs are compared by value, everything
/// else byte-wise. `"item2" < "item10"`.
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let (a, b) = (a.as_bytes(), b.as_bytes());
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        if a[i].is_ascii_digit() && b[j].is_ascii_digit() {
            let ai = i;
            while i < a.len() && a[i].is_ascii_digit() {
                i += 1;
            }
            let bj = j;
            while j < b.len() && b[j].is_ascii_digit() {
                j += 1;
            }
            // Compare digit runs numerically: longer run of significant
            // digits wins, then lexicographic on equal length.
            let da = trim_leading_zeros(&a[ai..i]);
            let db = trim_leading_zeros(&b[bj..j]);
            let ord = da
                .len()
                .cmp(&db.len())
                .then_with(|| da.cmp(db));
            if ord != Ordering::Equal {
                return ord;
            }
        } else {
            let ord = a[i].cmp(&b[j]);
            if ord != Ordering::Equal {
                return ord;
            }
            i += 1;
            j += 1;
        }
    }
    (a.len() - i).cmp(&(b.len() - j))
}

fn trim_leading_zeros(digits: &[u8]) -> &[u8] {
    let start = digits
        .iter()
        .position(|&d| d != b'0')
        .unwrap_or(digits.len().saturating_sub(1));
    &digits[start..]
}

/// Compose a color value with an alpha channel.
///
/// `opacity_variable` wins over `opacity_value` when both are given; the
/// variable is wrapped in `var(...)`. Hex colors expand to `rgba(...)`,
/// `rgb(`/`hsl(` functions gain an alpha argument, and `<alpha-value>`
/// placeholders are substituted in place. An alpha of `"1"` leaves the color
/// untouched; `"0"` collapses to transparent.
pub fn format_color(
    color: &str,
    opacity_value: Option<&str>,
    opacity_variable: Option<&str>,
) -> String {
    let alpha = match opacity_variable {
        Some(v) => format!("var({v})"),
        None => opacity_value.unwrap_or("1").to_owned(),
    };

    if color.contains("<alpha-value>") {
        return color.replace("<alpha-value>", &alpha);
    }

    if color.starts_with('#') && (color.len() == 4 || color.len() == 7) {
        if let Some(rgba) = hex_to_rgba(color, &alpha) {
            return rgba;
        }
    }

    if alpha == "1" {
        return color.to_owned();
    }
    if alpha == "0" {
        return "#0000".to_owned();
    }
    if let Some(rest) = color.strip_prefix("rgb(") {
        return format!("rgba({},{})", rest.trim_end_matches(')'), alpha);
    }
    if let Some(rest) = color.strip_prefix("hsl(") {
        return format!("hsla({},{})", rest.trim_end_matches(')'), alpha);
    }
    color.to_owned()
}

fn hex_to_rgba(hex: &str, alpha: &str) -> Option<String> {
    let digits = &hex[1..];
    let width = digits.len() / 3;
    let mut channels = [0u32; 3];
    for (i, channel) in channels.iter_mut().enumerate() {
        let part = digits.get(i * width..(i + 1) * width)?;
        let value = u32::from_str_radix(part, 16).ok()?;
        // A single hex digit covers the full channel range (0xf -> 255).
        *channel = if width == 1 { value * 17 } else { value };
    }
    Some(format!(
        "rgba({},{},{},{alpha})",
        channels[0], channels[1], channels[2]
    ))
}

/// Normalize a bracketed arbitrary value into CSS.
///
/// Underscores become spaces (`\_` stays a literal underscore), except inside
/// `url(...)`. Arithmetic operators inside `calc`/`min`/`max`/`clamp` get
/// surrounding whitespace so the output is valid CSS math.
pub fn normalize_arbitrary(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    // url() payloads are preserved verbatim.
    while let Some(at) = rest.find("url(") {
        let (head, tail) = rest.split_at(at);
        out.push_str(&space_math(&unescape_underscores(head)));
        let end = tail.find(')').map(|p| p + 1).unwrap_or(tail.len());
        out.push_str(&tail[..end]);
        rest = &tail[end..];
    }
    out.push_str(&space_math(&unescape_underscores(rest)));
    out
}

fn unescape_underscores(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();
    while let Some(ch) = chars.next() {
        match ch {
            '\\' if chars.peek() == Some(&'_') => {
                chars.next();
                out.push('_');
            }
            '_' => out.push(' '),
            other => out.push(other),
        }
    }
    out
}

/// Insert spaces around operators inside math function calls.
fn space_math(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let bytes = s.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if let Some(fn_len) = math_fn_at(s, i) {
            let span_start = i + fn_len;
            let span_end = matching_paren(bytes, span_start);
            out.push_str(&s[i..=span_start]);
            out.push_str(&space_operators(&s[span_start + 1..span_end]));
            i = span_end;
            continue;
        }
        out.push(bytes[i] as char);
        i += 1;
    }
    out
}

fn math_fn_at(s: &str, i: usize) -> Option<usize> {
    for name in ["calc(", "min(", "max(", "clamp("] {
        if s[i..].starts_with(name) {
            // Reject when we're in the middle of a longer identifier.
            let boundary = i == 0 || !s.as_bytes()[i - 1].is_ascii_alphanumeric();
            if boundary {
                return Some(name.len() - 1);
            }
        }
    }
    None
}

/// Index of the `)` closing the paren at `open`, or end of input.
fn matching_paren(bytes: &[u8], open: usize) -> usize {
    let mut depth = 0usize;
    for (i, &b) in bytes.iter().enumerate().skip(open) {
        match b {
            b'(' => depth += 1,
            b')' => {
                depth -= 1;
                if depth == 0 {
                    return i;
                }
            }
            _ => {}
        }
    }
    bytes.len().saturating_sub(1)
}

fn space_operators(span: &str) -> String {
    let mut out = String::with_capacity(span.len() + 8);
    for ch in span.chars() {
        if matches!(ch, '+' | '-' | '*' | '/') {
            // Only space the operator when it follows a value, so negative
            // arguments like `min(0px,-4px)` keep their sign.
            let prev = out.chars().rev().find(|c| !c.is_whitespace());
            let value_like = prev.is_some_and(|c| c.is_ascii_alphanumeric() || c == '%' || c == ')');
            if value_like {
                if !out.ends_with(' ') {
                    out.push(' ');
                }
                out.push(ch);
                out.push(' ');
                continue;
            }
        }
        out.push(ch);
    }
    out
}

/// camelCase property name to kebab-case.
pub fn kebab(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 2);
    for ch in name.chars() {
        if ch.is_ascii_uppercase() {
            out.push('-');
            out.push(ch.to_ascii_lowercase());
        } else {
            out.push(ch);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    // ── escaping ─────────────────────────────────────────────────────

    #[test]
    fn escape_plain_name_unchanged() {
        assert_eq!(escape_css("p-4"), "p-4");
    }

    #[test]
    fn escape_variant_colon_and_brackets() {
        assert_eq!(escape_css("sm:p-4"), "sm\\:p-4");
        assert_eq!(escape_css("w-[10px]"), "w-\\[10px\\]");
        assert_eq!(escape_css("group/name"), "group\\/name");
    }

    #[test]
    fn escape_leading_digit() {
        assert_eq!(escape_css("2xl:flex"), "\\32 xl\\:flex");
    }

    // ── hashing ──────────────────────────────────────────────────────

    #[test]
    fn hash_is_stable_and_prefixed() {
        let a = class_hash("text-red-500");
        let b = class_hash("text-red-500");
        assert_eq!(a, b);
        assert!(a.starts_with('#'));
        assert!(a.len() > 1);
    }

    #[test]
    fn hash_differs_for_different_input() {
        assert_ne!(class_hash("p-4"), class_hash("p-8"));
    }

    // ── natural compare ──────────────────────────────────────────────

    #[test]
    fn natural_cmp_numeric_runs() {
        assert_eq!(natural_cmp("item2", "item10"), Ordering::Less);
        assert_eq!(natural_cmp("p-8", "p-12"), Ordering::Less);
        assert_eq!(natural_cmp("a", "a"), Ordering::Equal);
        assert_eq!(natural_cmp("b", "a"), Ordering::Greater);
    }

    #[test]
    fn natural_cmp_prefix() {
        assert_eq!(natural_cmp("p", "p-4"), Ordering::Less);
    }

    // ── colors ───────────────────────────────────────────────────────

    #[test]
    fn color_plain_alpha_one_is_identity() {
        assert_eq!(format_color("red", None, None), "red");
    }

    #[test]
    fn color_hex_expands_with_alpha() {
        assert_eq!(
            format_color("#ef4444", Some("50%"), None),
            "rgba(239,68,68,50%)"
        );
        assert_eq!(format_color("#fff", Some("0.5"), None), "rgba(255,255,255,0.5)");
    }

    #[test]
    fn color_variable_wins() {
        assert_eq!(
            format_color("#000", None, Some("--w-text-opacity")),
            "rgba(0,0,0,var(--w-text-opacity))"
        );
    }

    #[test]
    fn color_alpha_zero_is_transparent() {
        assert_eq!(format_color("blue", Some("0"), None), "#0000");
    }

    #[test]
    fn color_functions_gain_alpha() {
        assert_eq!(
            format_color("rgb(1,2,3)", Some("0.4"), None),
            "rgba(1,2,3,0.4)"
        );
        assert_eq!(
            format_color("hsl(120,50%,50%)", Some("0.4"), None),
            "hsla(120,50%,50%,0.4)"
        );
    }

    #[test]
    fn color_alpha_placeholder() {
        assert_eq!(
            format_color("rgb(1 2 3 / <alpha-value>)", Some("0.25"), None),
            "rgb(1 2 3 / 0.25)"
        );
    }

    // ── arbitrary values ─────────────────────────────────────────────

    #[test]
    fn normalize_underscores() {
        assert_eq!(normalize_arbitrary("1fr_auto"), "1fr auto");
        assert_eq!(normalize_arbitrary("foo\\_bar"), "foo_bar");
    }

    #[test]
    fn normalize_preserves_url() {
        assert_eq!(
            normalize_arbitrary("url(a_b.png)_no-repeat"),
            "url(a_b.png) no-repeat"
        );
    }

    #[test]
    fn normalize_spaces_calc_operators() {
        assert_eq!(normalize_arbitrary("calc(100%-2rem)"), "calc(100% - 2rem)");
        assert_eq!(
            normalize_arbitrary("calc(var(--x)*2)"),
            "calc(var(--x) * 2)"
        );
    }

    #[test]
    fn normalize_keeps_negative_arguments() {
        assert_eq!(normalize_arbitrary("min(0px,-4px)"), "min(0px,-4px)");
    }

    // ── kebab ────────────────────────────────────────────────────────

    #[test]
    fn kebab_case() {
        assert_eq!(kebab("backgroundColor"), "background-color");
        assert_eq!(kebab("color"), "color");
        assert_eq!(kebab("--w-shadow"), "--w-shadow");
    }
}
