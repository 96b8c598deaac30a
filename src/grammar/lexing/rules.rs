//! Token rules: an anchored pattern, the kind it produces and an optional metadata transform.
//!
//!     Rules are stateless and cheap to clone (the compiled regex is reference counted).
//!     Every pattern is compiled as `\A(?:pattern)` and run against the remainder of the
//!     source starting at the scan cursor, so a rule can only ever match *at* the cursor.
//!     Zero-length matches are treated as no match; otherwise the scanner could stall.
//!
//! Generated Rules
//!
//!     Keyword and operator rules are generated from plain tables:
//!         - keywords become one alternation bounded by word boundaries on both sides, so
//!           `fn` never matches the start of `fnord` and `in` never matches inside `main`.
//!         - operators become one alternation sorted longest-first, so `>>=` wins over `>`,
//!           `>`, `=`. The produced kind is looked up per lexeme (`=` may be `Equals` while
//!           `==` is a plain `Operator`).

use crate::grammar::error::{GrammarError, Result};
use crate::grammar::token::{Metadata, TokenKind};
use once_cell::sync::Lazy;
use regex::{Captures, Regex, RegexBuilder};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Turns a rule's captures into token metadata. Runs once, when the token is created.
pub type Transform = Arc<dyn Fn(&Captures<'_>) -> Metadata + Send + Sync>;

/// Compile and match modifiers for a rule.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RuleFlags {
    pub case_insensitive: bool,
    pub dot_matches_newline: bool,
    /// Only match when the character before the cursor is not a word character.
    pub word_start: bool,
    /// Only match when the cursor is at the start of a line.
    pub line_start: bool,
}

impl RuleFlags {
    pub const NONE: RuleFlags = RuleFlags {
        case_insensitive: false,
        dot_matches_newline: false,
        word_start: false,
        line_start: false,
    };

    pub fn dot_all() -> Self {
        Self {
            dot_matches_newline: true,
            ..Self::NONE
        }
    }

    pub fn word() -> Self {
        Self {
            word_start: true,
            ..Self::NONE
        }
    }

    pub fn line_start() -> Self {
        Self {
            line_start: true,
            ..Self::NONE
        }
    }
}

/// Result of a successful rule match at the cursor.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleMatch {
    pub len: usize,
    pub kind: TokenKind,
    pub metadata: Metadata,
}

#[derive(Clone)]
pub struct TokenRule {
    pattern: String,
    regex: Regex,
    kind: TokenKind,
    flags: RuleFlags,
    transform: Option<Transform>,
    lexeme_kinds: Option<Arc<HashMap<String, TokenKind>>>,
}

impl TokenRule {
    pub fn new(pattern: &str, kind: TokenKind) -> Result<Self> {
        Self::with_flags(pattern, kind, RuleFlags::NONE)
    }

    pub fn with_flags(pattern: &str, kind: TokenKind, flags: RuleFlags) -> Result<Self> {
        let regex = anchored(pattern, flags).map_err(|source| GrammarError::InvalidPattern {
            pattern: pattern.to_string(),
            source,
        })?;
        Ok(Self::compiled(pattern, regex, kind, flags))
    }

    fn compiled(pattern: &str, regex: Regex, kind: TokenKind, flags: RuleFlags) -> Self {
        Self {
            pattern: pattern.to_string(),
            regex,
            kind,
            flags,
            transform: None,
            lexeme_kinds: None,
        }
    }

    /// Attach a metadata transform.
    pub fn transform<F>(mut self, transform: F) -> Self
    where
        F: Fn(&Captures<'_>) -> Metadata + Send + Sync + 'static,
    {
        self.transform = Some(Arc::new(transform));
        self
    }

    /// One rule matching any of `keywords` as a whole word. Returns `None` for an empty set.
    pub fn keywords<I, S>(keywords: I) -> Result<Option<Self>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut words: Vec<String> = keywords
            .into_iter()
            .map(|k| k.as_ref().to_string())
            .filter(|k| !k.is_empty())
            .collect();
        if words.is_empty() {
            return Ok(None);
        }
        sort_longest_first(&mut words);
        words.dedup();
        let alternation = words
            .iter()
            .map(|w| regex::escape(w))
            .collect::<Vec<_>>()
            .join("|");
        let pattern = format!(r"(?:{})\b", alternation);
        Self::with_flags(&pattern, TokenKind::Keyword, RuleFlags::word()).map(Some)
    }

    /// One rule matching any operator in `table`, longest first, with the kind taken from
    /// the table entry of the matched lexeme. Returns `None` for an empty table.
    pub fn operators<I, S>(table: I) -> Result<Option<Self>>
    where
        I: IntoIterator<Item = (S, TokenKind)>,
        S: AsRef<str>,
    {
        let mut kinds = HashMap::new();
        for (op, kind) in table {
            if !op.as_ref().is_empty() {
                kinds.insert(op.as_ref().to_string(), kind);
            }
        }
        if kinds.is_empty() {
            return Ok(None);
        }
        let mut ops: Vec<String> = kinds.keys().cloned().collect();
        sort_longest_first(&mut ops);
        let pattern = ops
            .iter()
            .map(|op| regex::escape(op))
            .collect::<Vec<_>>()
            .join("|");
        let mut rule = Self::new(&pattern, TokenKind::Operator)?;
        rule.lexeme_kinds = Some(Arc::new(kinds));
        Ok(Some(rule))
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn kind(&self) -> TokenKind {
        self.kind
    }

    pub fn flags(&self) -> RuleFlags {
        self.flags
    }

    /// Try this rule at byte offset `at` of `source`.
    pub fn match_at(&self, source: &str, at: usize) -> Option<RuleMatch> {
        let rest = source.get(at..)?;
        if self.flags.line_start && at > 0 && !source[..at].ends_with('\n') {
            return None;
        }
        if self.flags.word_start && source[..at].chars().next_back().is_some_and(is_word_char) {
            return None;
        }

        let (len, metadata) = match &self.transform {
            Some(transform) => {
                let caps = self.regex.captures(rest)?;
                let whole = caps.get(0)?;
                (whole.end(), transform(&caps))
            }
            None => (self.regex.find(rest)?.end(), Metadata::new()),
        };
        if len == 0 {
            return None;
        }

        let kind = self
            .lexeme_kinds
            .as_ref()
            .and_then(|kinds| kinds.get(&rest[..len]).copied())
            .unwrap_or(self.kind);
        Some(RuleMatch {
            len,
            kind,
            metadata,
        })
    }
}

impl fmt::Debug for TokenRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenRule")
            .field("pattern", &self.pattern)
            .field("kind", &self.kind)
            .field("flags", &self.flags)
            .field("transform", &self.transform.is_some())
            .finish()
    }
}

pub(crate) fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

fn sort_longest_first(items: &mut [String]) {
    items.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
}

/// Patterns appended after every language's own rules: identifiers, numbers, whitespace,
/// newlines and single-character punctuation.
pub const DEFAULT_PATTERNS: &[(&str, TokenKind)] = &[
    (r"[\p{L}_][\p{L}\p{N}_]*", TokenKind::Identifier),
    (
        r"0[xX][0-9a-fA-F_]+|0[bB][01_]+|0[oO][0-7_]+|[0-9][0-9_]*(?:\.[0-9][0-9_]*)?(?:[eE][+-]?[0-9]+)?",
        TokenKind::Number,
    ),
    (r"[^\S\r\n]+", TokenKind::Whitespace),
    (r"\r\n|\n|\r", TokenKind::Newline),
    (r"\{", TokenKind::OpenBrace),
    (r"\}", TokenKind::CloseBrace),
    (r"\(", TokenKind::OpenParen),
    (r"\)", TokenKind::CloseParen),
    (r"\[", TokenKind::OpenBracket),
    (r"\]", TokenKind::CloseBracket),
    (r";", TokenKind::Semicolon),
    (r",", TokenKind::Comma),
    (r"\.", TokenKind::Dot),
];

fn anchored(pattern: &str, flags: RuleFlags) -> std::result::Result<Regex, regex::Error> {
    RegexBuilder::new(&format!(r"\A(?:{})", pattern))
        .case_insensitive(flags.case_insensitive)
        .dot_matches_new_line(flags.dot_matches_newline)
        .build()
}

static DEFAULT_RULES: Lazy<std::result::Result<Vec<TokenRule>, (&str, regex::Error)>> =
    Lazy::new(|| {
        DEFAULT_PATTERNS
            .iter()
            .map(|&(pattern, kind)| {
                anchored(pattern, RuleFlags::NONE)
                    .map(|regex| TokenRule::compiled(pattern, regex, kind, RuleFlags::NONE))
                    .map_err(|source| (pattern, source))
            })
            .collect()
    });

/// `DEFAULT_PATTERNS`, compiled once and shared by every tokenizer.
pub fn default_rules() -> Result<Vec<TokenRule>> {
    DEFAULT_RULES
        .as_ref()
        .map(|rules| rules.clone())
        .map_err(|(pattern, source)| GrammarError::InvalidPattern {
            pattern: pattern.to_string(),
            source: source.clone(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    #[test]
    fn test_rule_matches_only_at_cursor() {
        let rule = TokenRule::new(r"[0-9]+", TokenKind::Number).unwrap();
        assert!(rule.match_at("abc 123", 0).is_none());
        let m = rule.match_at("abc 123", 4).unwrap();
        assert_eq!(m.len, 3);
        assert_eq!(m.kind, TokenKind::Number);
    }

    #[test]
    fn test_invalid_pattern_is_config_error() {
        let err = TokenRule::new(r"(unclosed", TokenKind::String).unwrap_err();
        assert!(matches!(err, GrammarError::InvalidPattern { .. }));
    }

    #[test]
    fn test_zero_length_match_is_rejected() {
        let rule = TokenRule::new(r"x*", TokenKind::Identifier).unwrap();
        assert!(rule.match_at("abc", 0).is_none());
    }

    #[test]
    fn test_keywords_respect_word_boundaries() {
        let rule = TokenRule::keywords(["in", "int", "fn"]).unwrap().unwrap();
        assert_eq!(rule.match_at("int x", 0).map(|m| m.len), Some(3));
        assert_eq!(rule.match_at("in x", 0).map(|m| m.len), Some(2));
        assert!(rule.match_at("fnord", 0).is_none());
        // "in" inside "main" must not be a keyword
        assert!(rule.match_at("main", 2).is_none());
    }

    #[test]
    fn test_empty_tables_produce_no_rule() {
        assert!(TokenRule::keywords(Vec::<&str>::new()).unwrap().is_none());
        assert!(TokenRule::operators(Vec::<(&str, TokenKind)>::new())
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_operators_longest_first_with_lexeme_kinds() {
        let rule = TokenRule::operators([
            (">", TokenKind::Operator),
            (">>", TokenKind::Operator),
            (">>=", TokenKind::Operator),
            ("=", TokenKind::Equals),
            ("=>", TokenKind::FatArrow),
        ])
        .unwrap()
        .unwrap();
        let m = rule.match_at(">>= 1", 0).unwrap();
        assert_eq!(m.len, 3);
        assert_eq!(m.kind, TokenKind::Operator);
        assert_eq!(rule.match_at("=> x", 0).unwrap().kind, TokenKind::FatArrow);
        assert_eq!(rule.match_at("= x", 0).unwrap().kind, TokenKind::Equals);
    }

    #[test]
    fn test_line_start_flag() {
        let rule =
            TokenRule::with_flags(r"[ \t]+", TokenKind::Whitespace, RuleFlags::line_start())
                .unwrap();
        assert!(rule.match_at("  x", 0).is_some());
        assert!(rule.match_at("a\n  x", 2).is_some());
        assert!(rule.match_at("a  x", 1).is_none());
    }

    #[test]
    fn test_transform_populates_metadata() {
        fn width(caps: &Captures<'_>) -> Metadata {
            let mut metadata = Metadata::new();
            metadata.insert("width".into(), Value::from(caps[0].len()));
            metadata
        }
        let rule = TokenRule::new(r" +", TokenKind::Whitespace)
            .unwrap()
            .transform(width);
        let m = rule.match_at("    x", 0).unwrap();
        assert_eq!(m.metadata.get("width"), Some(&Value::from(4)));
    }

    #[test]
    fn test_default_rules_cover_punctuation() {
        let rules = default_rules().unwrap();
        assert_eq!(rules.len(), DEFAULT_PATTERNS.len());
        let kinds: Vec<TokenKind> = rules.iter().map(|r| r.kind()).collect();
        for kind in [
            TokenKind::Identifier,
            TokenKind::Number,
            TokenKind::Whitespace,
            TokenKind::Newline,
            TokenKind::OpenBrace,
            TokenKind::CloseBrace,
            TokenKind::OpenParen,
            TokenKind::CloseParen,
            TokenKind::OpenBracket,
            TokenKind::CloseBracket,
            TokenKind::Semicolon,
            TokenKind::Comma,
            TokenKind::Dot,
        ] {
            assert!(kinds.contains(&kind), "missing default rule for {kind}");
        }
    }
}
