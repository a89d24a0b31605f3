//! logos-based class-string parser.
//!
//! A class string like `hover:(bg-red-500 !underline) sm:p-4` parses into
//! flat [`UtilitySpec`]s. Grouping never survives parsing: variant groups
//! distribute their variants over every member, prefix groups (`text-(sm
//! red-500)`) glue the prefix onto every member, and comments vanish.
//!
//! Token priority in logos is determined by:
//! 1. Longest match wins
//! 2. For equal length matches, earlier-defined variants win
//!
//! Bracketed arbitrary values (`[...]`) are consumed by a callback that
//! tracks nesting depth and backslash escapes, so `w-[calc(100%-2rem)]`
//! stays one token.

use logos::{Lexer, Logos, Skip};

/// One utility occurrence, fully distributed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UtilitySpec {
    /// Rule name without negation or importance markers, e.g. `bg-red-500`.
    pub name: String,
    pub negated: bool,
    pub important: bool,
    /// Variant tokens outermost-first; `dark` always sorts to the front.
    pub variants: Vec<String>,
}

impl UtilitySpec {
    /// The canonical class name this spec compiles to:
    /// `variant:…:[!][-]name`.
    pub fn class_name(&self) -> String {
        let mut out = String::new();
        for v in &self.variants {
            out.push_str(v);
            out.push(':');
        }
        if self.important {
            out.push('!');
        }
        if self.negated {
            out.push('-');
        }
        out.push_str(&self.name);
        out
    }
}

#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"//[^\n]*")]
enum Token {
    #[token("(")]
    GroupOpen,

    #[token(")")]
    GroupClose,

    /// Whitespace and commas both separate utilities.
    #[regex(r"[ \t\r\n,]+")]
    Sep,

    #[token(":")]
    Colon,

    /// Balanced bracket value, consumed greedily by the callback.
    #[token("[", lex_bracket)]
    Bracket,

    #[token("/*", skip_block_comment)]
    BlockComment,

    /// A name fragment: anything that is not a separator, group delimiter,
    /// colon, or bracket. A `/` is allowed mid-fragment (`w-1/2`) as long as
    /// it does not open a comment.
    #[regex(r"(?:[^ \t\r\n,:()\[\]/]|/[^ \t\r\n,:()\[\]/*])+")]
    Frag,

    /// Trailing or doubled slash that the fragment rule cannot absorb.
    #[token("/")]
    Slash,
}

/// Consume the remainder of a `[...]` value, honoring nesting and `\`
/// escapes. Returns false on unbalanced input, which surfaces as a lexer
/// error and triggers the literal fallback.
fn lex_bracket(lex: &mut Lexer<'_, Token>) -> bool {
    let bytes = lex.remainder().as_bytes();
    let mut depth = 1usize;
    let mut i = 0usize;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 1,
            b'[' => depth += 1,
            b']' => {
                depth -= 1;
                if depth == 0 {
                    lex.bump(i + 1);
                    return true;
                }
            }
            _ => {}
        }
        i += 1;
    }
    false
}

/// Skip to the closing `*/`; an unterminated comment swallows the rest.
fn skip_block_comment(lex: &mut Lexer<'_, Token>) -> Skip {
    let rest = lex.remainder();
    match rest.find("*/") {
        Some(end) => lex.bump(end + 2),
        None => lex.bump(rest.len()),
    }
    Skip
}

/// Pending parse state: variants and glued prefixes waiting for a name.
#[derive(Debug, Clone, PartialEq)]
enum Entry {
    /// An open variant/prefix group.
    Open,
    /// A raw part: `hover:` (variant, keeps its colon) or `text-` (prefix).
    Part(String),
}

struct Builder {
    stack: Vec<Entry>,
    specs: Vec<UtilitySpec>,
}

impl Builder {
    fn new() -> Self {
        Self {
            stack: Vec::new(),
            specs: Vec::new(),
        }
    }

    fn push_variant(&mut self, word: &str) {
        if !word.is_empty() {
            self.stack.push(Entry::Part(format!("{word}:")));
        }
    }

    fn open_group(&mut self, word: &str) {
        if !word.is_empty() {
            self.stack.push(Entry::Part(word.to_owned()));
        }
        self.stack.push(Entry::Open);
    }

    /// Emit a spec from the pending stack plus the current word.
    fn emit(&mut self, word: &str) {
        if word.is_empty() && matches!(self.stack.last(), None | Some(Entry::Open)) {
            return;
        }

        let mut variants: Vec<String> = Vec::new();
        let mut name_parts: Vec<&str> = Vec::new();
        let mut negated = false;
        let mut important = false;

        let parts = self
            .stack
            .iter()
            .filter_map(|e| match e {
                Entry::Part(s) => Some(s.as_str()),
                Entry::Open => None,
            })
            .chain(if word.is_empty() { None } else { Some(word) });

        for raw in parts {
            let mut part = raw;
            if let Some(rest) = part.strip_prefix('!') {
                part = rest;
                important = !important;
            }
            if let Some(variant) = part.strip_suffix(':') {
                if variant.is_empty() {
                    continue;
                }
                // dark composes outermost regardless of where it appears.
                if variant == "dark" {
                    variants.insert(0, variant.to_owned());
                } else {
                    variants.push(variant.to_owned());
                }
                continue;
            }
            if let Some(rest) = part.strip_prefix('-') {
                part = rest;
                negated = !negated;
            }
            // A trailing dash is prefix glue; the join below restores it.
            let part = part.strip_suffix('-').unwrap_or(part);
            if !part.is_empty() && part != "&" {
                name_parts.push(part);
            }
        }

        let name = name_parts.join("-");
        if name.is_empty() {
            return;
        }
        dedup_keep_first(&mut variants);
        self.specs.push(UtilitySpec {
            name,
            negated,
            important,
            variants,
        });
    }

    /// After a separator: drop pending parts back to the enclosing group.
    fn reset_to_group(&mut self) {
        let keep = self
            .stack
            .iter()
            .rposition(|e| matches!(e, Entry::Open))
            .map(|i| i + 1)
            .unwrap_or(0);
        self.stack.truncate(keep);
    }

    /// After `)`: drop the group and whatever prefixed it.
    fn close_group(&mut self) {
        if let Some(open) = self.stack.iter().rposition(|e| matches!(e, Entry::Open)) {
            self.stack.truncate(open);
        }
        self.reset_to_group();
    }
}

fn dedup_keep_first(variants: &mut Vec<String>) {
    let mut seen = Vec::with_capacity(variants.len());
    variants.retain(|v| {
        if seen.contains(v) {
            false
        } else {
            seen.push(v.clone());
            true
        }
    });
}

/// Parse a class string into utility specs, in source order.
///
/// Malformed input (an unbalanced bracket) degrades gracefully: the
/// offending tail is emitted as a single literal spec instead of erroring.
pub fn parse_class(input: &str) -> Vec<UtilitySpec> {
    let mut builder = Builder::new();
    let mut word = String::new();
    let mut lexer = Token::lexer(input);

    while let Some(result) = lexer.next() {
        let token = match result {
            Ok(t) => t,
            Err(()) => {
                // Literal fallback: keep the unlexable tail as one name.
                word.push_str(lexer.slice());
                word.push_str(lexer.remainder());
                break;
            }
        };
        match token {
            Token::Frag | Token::Bracket | Token::Slash => word.push_str(lexer.slice()),
            Token::Colon => {
                builder.push_variant(&word);
                word.clear();
            }
            Token::GroupOpen => {
                builder.open_group(&word);
                word.clear();
            }
            Token::Sep => {
                builder.emit(&word);
                word.clear();
                builder.reset_to_group();
            }
            Token::GroupClose => {
                builder.emit(&word);
                word.clear();
                builder.close_group();
            }
            Token::BlockComment => {}
        }
    }
    builder.emit(&word);
    builder.specs
}
