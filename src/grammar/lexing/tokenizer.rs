//! The rule-driven tokenizer.
//!
//!     A `Tokenizer` is an ordered list of rules and nothing else: it holds no per-call state,
//!     so one instance can be shared freely (it is `Send + Sync`). `tokenize` keeps a byte
//!     cursor, tries every rule at the cursor in list order and takes the first match. When
//!     nothing matches, a single-character `Unknown` token is emitted and the cursor moves
//!     past that character. Tokenization therefore never fails and never stalls.
//!
//!     Tokenizers are assembled with `TokenizerBuilder`. The final rule order is:
//!         1. the language's extra rules (literals, comments, punctuation), in insertion order
//!         2. the keyword rule generated from the keyword set
//!         3. the operator rule generated from the operator table
//!         4. the default rules (identifier, number, whitespace, newline, punctuation)

use super::rules::{default_rules, TokenRule};
use crate::grammar::error::Result;
use crate::grammar::token::{Token, TokenKind};
use tracing::{debug, trace};

#[derive(Debug, Clone)]
pub struct Tokenizer {
    language: String,
    rules: Vec<TokenRule>,
}

impl Tokenizer {
    pub fn builder(language: impl Into<String>) -> TokenizerBuilder {
        TokenizerBuilder::new(language)
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    pub fn rules(&self) -> &[TokenRule] {
        &self.rules
    }

    /// Convert `source` into tokens. Concatenating the token texts reproduces `source`.
    pub fn tokenize(&self, source: &str) -> Vec<Token> {
        let mut tokens = Vec::new();
        let mut at = 0;
        let mut line = 1;
        let mut column = 1;
        let mut unknown = 0usize;

        while at < source.len() {
            let token = match self.rules.iter().find_map(|rule| rule.match_at(source, at)) {
                Some(m) => Token::new(m.kind, &source[at..at + m.len], at, line, column)
                    .with_metadata(m.metadata),
                None => {
                    let ch = source[at..].chars().next().unwrap_or('\u{FFFD}');
                    trace!(offset = at, line, column, ch = ?ch, "no rule matched, emitting unknown token");
                    unknown += 1;
                    Token::new(
                        TokenKind::Unknown,
                        &source[at..at + ch.len_utf8()],
                        at,
                        line,
                        column,
                    )
                }
            };
            at += token.text.len();
            advance(&token.text, &mut line, &mut column);
            tokens.push(token);
        }

        debug!(
            language = %self.language,
            tokens = tokens.len(),
            unknown,
            "tokenized source"
        );
        tokens
    }
}

/// Move a (line, column) pair past `text`.
fn advance(text: &str, line: &mut usize, column: &mut usize) {
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\n' => {
                *line += 1;
                *column = 1;
            }
            '\r' if chars.peek() == Some(&'\n') => {}
            '\r' => {
                *line += 1;
                *column = 1;
            }
            _ => *column += 1,
        }
    }
}

/// Assembles a [`Tokenizer`] from a language's keyword set, operator table and extra rules.
#[derive(Debug, Clone)]
pub struct TokenizerBuilder {
    language: String,
    keywords: Vec<String>,
    operators: Vec<(String, TokenKind)>,
    rules: Vec<TokenRule>,
    defaults: bool,
}

impl TokenizerBuilder {
    pub fn new(language: impl Into<String>) -> Self {
        Self {
            language: language.into(),
            keywords: Vec::new(),
            operators: Vec::new(),
            rules: Vec::new(),
            defaults: true,
        }
    }

    pub fn keywords<I, S>(mut self, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.keywords.extend(keywords.into_iter().map(Into::into));
        self
    }

    pub fn operators<I, S>(mut self, operators: I) -> Self
    where
        I: IntoIterator<Item = (S, TokenKind)>,
        S: Into<String>,
    {
        self.operators
            .extend(operators.into_iter().map(|(op, kind)| (op.into(), kind)));
        self
    }

    pub fn rule(mut self, rule: TokenRule) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn rules(mut self, rules: impl IntoIterator<Item = TokenRule>) -> Self {
        self.rules.extend(rules);
        self
    }

    /// Leave out the default identifier/number/whitespace/punctuation rules.
    pub fn without_defaults(mut self) -> Self {
        self.defaults = false;
        self
    }

    pub fn build(self) -> Result<Tokenizer> {
        let mut rules = self.rules;
        if let Some(keyword_rule) = TokenRule::keywords(&self.keywords)? {
            rules.push(keyword_rule);
        }
        if let Some(operator_rule) = TokenRule::operators(self.operators)? {
            rules.push(operator_rule);
        }
        if self.defaults {
            rules.extend(default_rules()?);
        }
        Ok(Tokenizer {
            language: self.language,
            rules,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::lexing::detokenize;
    use crate::grammar::lexing::rules::RuleFlags;

    fn simple() -> Tokenizer {
        Tokenizer::builder("test")
            .rule(TokenRule::new(r"//[^\r\n]*", TokenKind::Comment).unwrap())
            .rule(TokenRule::new(r#""(?:[^"\\]|\\.)*""#, TokenKind::String).unwrap())
            .keywords(["fn", "let"])
            .operators([("=", TokenKind::Equals), ("==", TokenKind::Operator)])
            .build()
            .unwrap()
    }

    fn kinds(tokens: &[Token]) -> Vec<TokenKind> {
        tokens
            .iter()
            .filter(|t| t.kind != TokenKind::Whitespace)
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn test_empty_input() {
        assert!(simple().tokenize("").is_empty());
    }

    #[test]
    fn test_basic_kinds() {
        let tokens = simple().tokenize("fn f() { let x = 1; }");
        assert_eq!(
            kinds(&tokens),
            vec![
                TokenKind::Keyword,
                TokenKind::Identifier,
                TokenKind::OpenParen,
                TokenKind::CloseParen,
                TokenKind::OpenBrace,
                TokenKind::Keyword,
                TokenKind::Identifier,
                TokenKind::Equals,
                TokenKind::Number,
                TokenKind::Semicolon,
                TokenKind::CloseBrace,
            ]
        );
    }

    #[test]
    fn test_braces_inside_strings_are_not_delimiters() {
        let tokens = simple().tokenize(r#"x = "{ \" }""#);
        assert!(!tokens.iter().any(|t| t.kind == TokenKind::OpenBrace));
        assert_eq!(tokens.last().unwrap().kind, TokenKind::String);
    }

    #[test]
    fn test_longest_operator_wins() {
        let tokens = simple().tokenize("a == b");
        assert_eq!(tokens[2].kind, TokenKind::Operator);
        assert_eq!(tokens[2].text, "==");
    }

    #[test]
    fn test_positions() {
        let tokens = simple().tokenize("fn a\n  let b");
        let b = tokens.iter().find(|t| t.text == "b").unwrap();
        assert_eq!((b.line, b.column, b.offset), (2, 7, 11));
        let newline = tokens.iter().find(|t| t.kind == TokenKind::Newline).unwrap();
        assert_eq!((newline.line, newline.column), (1, 5));
    }

    #[test]
    fn test_columns_count_chars() {
        let tokens = simple().tokenize("é = x");
        let x = tokens.last().unwrap();
        assert_eq!(x.column, 5);
        assert_eq!(x.offset, 5);
    }

    #[test]
    fn test_crlf_is_one_newline() {
        let tokens = simple().tokenize("a\r\nb");
        assert_eq!(tokens[1].kind, TokenKind::Newline);
        assert_eq!(tokens[1].text, "\r\n");
        assert_eq!(tokens[2].line, 2);
    }

    #[test]
    fn test_unknown_fallback_never_stalls() {
        let source = "a $ ☃ b";
        let tokens = simple().tokenize(source);
        let unknown: Vec<&str> = tokens
            .iter()
            .filter(|t| t.kind == TokenKind::Unknown)
            .map(|t| t.text.as_str())
            .collect();
        assert_eq!(unknown, vec!["$", "☃"]);
        assert_eq!(detokenize(&tokens), source);
    }

    #[test]
    fn test_language_rules_take_precedence() {
        let tokenizer = Tokenizer::builder("test")
            .rule(
                TokenRule::with_flags(r"let", TokenKind::Attribute, RuleFlags::word()).unwrap(),
            )
            .keywords(["let"])
            .build()
            .unwrap();
        assert_eq!(tokenizer.tokenize("let")[0].kind, TokenKind::Attribute);
    }

    #[test]
    fn test_without_defaults() {
        let tokenizer = Tokenizer::builder("bare")
            .keywords(["x"])
            .without_defaults()
            .build()
            .unwrap();
        let tokens = tokenizer.tokenize("x y");
        assert_eq!(tokens[0].kind, TokenKind::Keyword);
        assert_eq!(tokens[1].kind, TokenKind::Unknown);
    }
}
