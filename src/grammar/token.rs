//! Token model shared by the tokenizer, the block matchers and the language grammars.
//!
//!     A token is the atomic unit of lexing: a kind tag, the literal text it was produced
//!     from, and where that text sits in the source. Tokens are created once by the
//!     tokenizer and never mutated afterwards. The only extensible part is `metadata`,
//!     which a rule's transform fills in at creation time (e.g. `indent_size` on leading
//!     whitespace).
//!
//! Positions
//!
//!     `offset` is a byte offset into the source, so `&source[token.span()]` is always the
//!     token text. `line` and `column` are 1-based; columns count chars, not bytes.
//!
//! Kinds
//!
//!     The kind set is closed. Delimiters have dedicated kinds so block matchers can work on
//!     kinds alone: a `{` inside a string literal is part of a `String` token and can never be
//!     mistaken for an `OpenBrace`. Language-extension kinds (attribute, preprocessor, at-rule,
//!     tag, jsx-expression) are available to grammars that need them.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::ops::Range;

/// Open metadata bag carried by tokens, contexts, symbols and elements.
pub type Metadata = BTreeMap<String, Value>;

/// Kind tag of a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    Keyword,
    Identifier,
    String,
    Number,
    Operator,
    Delimiter,
    Comment,
    Whitespace,
    Newline,

    OpenBrace,
    CloseBrace,
    OpenParen,
    CloseParen,
    OpenBracket,
    CloseBracket,

    Equals,
    Arrow,
    FatArrow,
    Colon,
    Semicolon,
    Comma,
    Dot,

    Attribute,
    Preprocessor,
    AtRule,
    Tag,
    JsxExpression,

    Unknown,
}

impl TokenKind {
    /// Stable lowercase name, matching the serialized form.
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenKind::Keyword => "keyword",
            TokenKind::Identifier => "identifier",
            TokenKind::String => "string",
            TokenKind::Number => "number",
            TokenKind::Operator => "operator",
            TokenKind::Delimiter => "delimiter",
            TokenKind::Comment => "comment",
            TokenKind::Whitespace => "whitespace",
            TokenKind::Newline => "newline",
            TokenKind::OpenBrace => "open_brace",
            TokenKind::CloseBrace => "close_brace",
            TokenKind::OpenParen => "open_paren",
            TokenKind::CloseParen => "close_paren",
            TokenKind::OpenBracket => "open_bracket",
            TokenKind::CloseBracket => "close_bracket",
            TokenKind::Equals => "equals",
            TokenKind::Arrow => "arrow",
            TokenKind::FatArrow => "fat_arrow",
            TokenKind::Colon => "colon",
            TokenKind::Semicolon => "semicolon",
            TokenKind::Comma => "comma",
            TokenKind::Dot => "dot",
            TokenKind::Attribute => "attribute",
            TokenKind::Preprocessor => "preprocessor",
            TokenKind::AtRule => "at_rule",
            TokenKind::Tag => "tag",
            TokenKind::JsxExpression => "jsx_expression",
            TokenKind::Unknown => "unknown",
        }
    }

    /// Tokens that carry no structure: whitespace and comments. Newlines are *not* trivia
    /// because line-oriented grammars depend on them.
    pub fn is_trivia(&self) -> bool {
        matches!(self, TokenKind::Whitespace | TokenKind::Comment)
    }

    /// True for the six bracket/paren/brace kinds.
    pub fn is_delimiter(&self) -> bool {
        matches!(
            self,
            TokenKind::OpenBrace
                | TokenKind::CloseBrace
                | TokenKind::OpenParen
                | TokenKind::CloseParen
                | TokenKind::OpenBracket
                | TokenKind::CloseBracket
                | TokenKind::Delimiter
        )
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single lexical unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub offset: usize,
    pub line: usize,
    pub column: usize,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: Metadata,
}

impl Token {
    pub fn new(
        kind: TokenKind,
        text: impl Into<String>,
        offset: usize,
        line: usize,
        column: usize,
    ) -> Self {
        Self {
            kind,
            text: text.into(),
            offset,
            line,
            column,
            metadata: Metadata::new(),
        }
    }

    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// Byte range of this token in the source it was produced from.
    pub fn span(&self) -> Range<usize> {
        self.offset..self.offset + self.text.len()
    }

    /// Line holding the token's last character. A trailing line break stays on its own line,
    /// so a newline token ends on the line it terminates.
    pub fn end_line(&self) -> usize {
        let text = self.text.strip_suffix('\n').unwrap_or(&self.text);
        let text = text.strip_suffix('\r').unwrap_or(text);
        self.line + line_breaks(text)
    }

    pub fn is_kind(&self, kinds: &[TokenKind]) -> bool {
        kinds.contains(&self.kind)
    }

    pub fn is_keyword(&self, keywords: &[&str]) -> bool {
        self.kind == TokenKind::Keyword && keywords.contains(&self.text.as_str())
    }

    /// An identifier token. With an empty `names` list any identifier matches.
    pub fn is_identifier(&self, names: &[&str]) -> bool {
        self.kind == TokenKind::Identifier
            && (names.is_empty() || names.contains(&self.text.as_str()))
    }

    pub fn is_trivia(&self) -> bool {
        self.kind.is_trivia()
    }

    /// Integer metadata lookup, used for `indent_size` and similar counters.
    pub fn metadata_usize(&self, key: &str) -> Option<usize> {
        self.metadata
            .get(key)
            .and_then(Value::as_u64)
            .map(|v| v as usize)
    }
}

/// Number of line breaks in `text`. `\r\n`, `\n` and a lone `\r` each count once.
pub fn line_breaks(text: &str) -> usize {
    let bytes = text.as_bytes();
    let mut count = 0;
    for (i, b) in bytes.iter().enumerate() {
        match b {
            b'\n' => count += 1,
            b'\r' if bytes.get(i + 1) != Some(&b'\n') => count += 1,
            _ => {}
        }
    }
    count
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({:?})", self.kind, self.text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_span_and_end_line() {
        let token = Token::new(TokenKind::Comment, "/* a\nb */", 10, 3, 5);
        assert_eq!(token.span(), 10..19);
        assert_eq!(token.end_line(), 4);

        let newline = Token::new(TokenKind::Newline, "\r\n", 4, 1, 5);
        assert_eq!(newline.end_line(), 1);
    }

    #[test]
    fn test_kind_predicates() {
        let kw = Token::new(TokenKind::Keyword, "fn", 0, 1, 1);
        assert!(kw.is_keyword(&["fn", "struct"]));
        assert!(!kw.is_identifier(&[]));

        let ident = Token::new(TokenKind::Identifier, "main", 3, 1, 4);
        assert!(ident.is_identifier(&[]));
        assert!(ident.is_identifier(&["main"]));
        assert!(!ident.is_identifier(&["other"]));
        assert!(ident.is_kind(&[TokenKind::Keyword, TokenKind::Identifier]));
    }

    #[test]
    fn test_line_breaks() {
        assert_eq!(line_breaks("a\r\nb\nc\rd"), 3);
        assert_eq!(line_breaks(""), 0);
    }

    #[test]
    fn test_display() {
        let token = Token::new(TokenKind::OpenBrace, "{", 0, 1, 1);
        assert_eq!(token.to_string(), "open_brace(\"{\")");
    }

    #[test]
    fn test_metadata_usize() {
        let mut metadata = Metadata::new();
        metadata.insert("indent_size".into(), Value::from(8));
        let token = Token::new(TokenKind::Whitespace, "\t", 0, 1, 1).with_metadata(metadata);
        assert_eq!(token.metadata_usize("indent_size"), Some(8));
        assert_eq!(token.metadata_usize("missing"), None);
    }
}
