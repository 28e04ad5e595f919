//! Word extraction and heuristic lemmatization.
//!
//! Two pieces, both pure and allocation-light:
//! - [`tokenize`] walks text and yields maximal runs of ASCII letters with
//!   their byte offsets, so callers can rebuild the surrounding text.
//! - [`lemmatize`] lowercases a token and strips one inflectional suffix.
//!
//! # How it works
//! Suffix rules are checked in a fixed order and the first one that matches
//! (suffix and minimum length) wins:
//! 1. `ies` -> `y`
//! 2. `ing`, undoing a doubled final consonant (`runn` -> `run`)
//! 3. `ed`, same undo
//! 4. `es` stripped
//! 5. trailing `s` stripped
//!
//! This is a heuristic, not a dictionary-backed lemmatizer: `boss` becomes
//! `bos` and `ran` stays `ran`. Stored reports depend on these exact outputs.
//!
//! # Example
//! ```rust
//! use wordminer_morph::{lemmatize, tokenize};
//!
//! let lemmas: Vec<String> = tokenize("The cats are running.")
//!     .map(|tok| lemmatize(tok.text))
//!     .collect();
//! assert_eq!(lemmas, ["the", "cat", "are", "run"]);
//! ```
//!
//! For a runnable demo, see `cargo run -p wordminer-morph --example lemmas -- <text>`.

/// A run of ASCII letters and its byte span in the source text.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Token<'a> {
    pub text: &'a str,
    pub start: usize,
    pub end: usize,
}

/// Lazy iterator over the [`Token`]s of a text. Clone it to restart.
#[derive(Clone, Debug)]
pub struct Tokens<'a> {
    text: &'a str,
    pos: usize,
}

/// Split `text` into maximal runs of `A-Z`/`a-z`.
pub fn tokenize(text: &str) -> Tokens<'_> {
    Tokens { text, pos: 0 }
}

impl<'a> Iterator for Tokens<'a> {
    type Item = Token<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let bytes = self.text.as_bytes();
        let start = self.pos + bytes[self.pos..].iter().position(u8::is_ascii_alphabetic)?;
        let end = bytes[start..]
            .iter()
            .position(|b| !b.is_ascii_alphabetic())
            .map_or(bytes.len(), |len| start + len);
        self.pos = end;
        // ASCII letters never occur inside a multi-byte sequence, so both ends are char boundaries.
        Some(Token {
            text: &self.text[start..end],
            start,
            end,
        })
    }
}

/// Which suffix rule produced a lemma.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Rule {
    Unchanged,
    Suffix {
        suffix: &'static str,
        replacement: &'static str,
    },
    /// Suffix stripped and a doubled final letter dropped (`running` -> `runn` -> `run`).
    Undoubled { suffix: &'static str },
}

struct SuffixRule {
    suffix: &'static str,
    replacement: &'static str,
    /// The token must be strictly longer than this many characters.
    longer_than: usize,
    undouble: bool,
}

const RULES: &[SuffixRule] = &[
    SuffixRule {
        suffix: "ies",
        replacement: "y",
        longer_than: 3,
        undouble: false,
    },
    SuffixRule {
        suffix: "ing",
        replacement: "",
        longer_than: 5,
        undouble: true,
    },
    SuffixRule {
        suffix: "ed",
        replacement: "",
        longer_than: 4,
        undouble: true,
    },
    SuffixRule {
        suffix: "es",
        replacement: "",
        longer_than: 4,
        undouble: false,
    },
    SuffixRule {
        suffix: "s",
        replacement: "",
        longer_than: 3,
        undouble: false,
    },
];

/// Reduce a surface token to its dictionary key. Never fails; unknown forms
/// come back lowercased.
pub fn lemmatize(token: &str) -> String {
    lemmatize_with_rule(token).0
}

/// Like [`lemmatize`], also reporting the rule that fired.
pub fn lemmatize_with_rule(token: &str) -> (String, Rule) {
    let lower = token.to_lowercase();
    let len = lower.chars().count();

    for rule in RULES {
        if len <= rule.longer_than {
            continue;
        }
        let Some(stem) = lower.strip_suffix(rule.suffix) else {
            continue;
        };
        let mut lemma = format!("{stem}{}", rule.replacement);
        if rule.undouble && undouble(&mut lemma) {
            return (
                lemma,
                Rule::Undoubled {
                    suffix: rule.suffix,
                },
            );
        }
        return (
            lemma,
            Rule::Suffix {
                suffix: rule.suffix,
                replacement: rule.replacement,
            },
        );
    }

    (lower, Rule::Unchanged)
}

/// Drop the last character when it repeats the one before it.
fn undouble(base: &mut String) -> bool {
    let mut chars = base.chars();
    let (Some(last), Some(prev)) = (chars.next_back(), chars.next_back()) else {
        return false;
    };
    if last == prev {
        base.pop();
        true
    } else {
        false
    }
}
