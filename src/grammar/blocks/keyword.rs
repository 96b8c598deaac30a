//! Keyword-delimited blocks (`def ... end`, `begin ... end`, `if ... endif`).

use super::Block;
use crate::grammar::token::{Token, TokenKind};
use tracing::debug;

/// Whether the opener at `index` is a complete one-line form that has no closer.
pub type SingleLine = fn(&[Token], usize) -> bool;

/// Which keywords open and close a keyword-delimited block.
#[derive(Clone, Copy)]
pub struct KeywordBlock<'a> {
    /// Keywords that open a block. The token at `start` must be one of them.
    pub openers: &'a [&'a str],
    /// Keyword that closes a block.
    pub close: &'a str,
    /// Whether openers inside the block increase the nesting depth.
    pub nested: bool,
    /// Openers that only open a block where an expression can start, so that statement
    /// modifiers (`return x if y`) are not mistaken for blocks.
    pub expression_start_only: &'a [&'a str],
    /// Openers that join a block already opened earlier on the same line instead of
    /// opening their own (`while x do`).
    pub same_line_joins: &'a [&'a str],
    /// Openers this accepts open nothing (Ruby's `def name = value`).
    pub single_line: Option<SingleLine>,
}

impl std::fmt::Debug for KeywordBlock<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeywordBlock")
            .field("openers", &self.openers)
            .field("close", &self.close)
            .field("nested", &self.nested)
            .field("expression_start_only", &self.expression_start_only)
            .field("same_line_joins", &self.same_line_joins)
            .field("single_line", &self.single_line.is_some())
            .finish()
    }
}

impl<'a> KeywordBlock<'a> {
    pub fn new(openers: &'a [&'a str], close: &'a str) -> Self {
        Self {
            openers,
            close,
            nested: true,
            expression_start_only: &[],
            same_line_joins: &[],
            single_line: None,
        }
    }

    pub fn flat(mut self) -> Self {
        self.nested = false;
        self
    }

    pub fn expression_start_only(mut self, keywords: &'a [&'a str]) -> Self {
        self.expression_start_only = keywords;
        self
    }

    pub fn same_line_joins(mut self, keywords: &'a [&'a str]) -> Self {
        self.same_line_joins = keywords;
        self
    }

    pub fn single_line_when(mut self, test: SingleLine) -> Self {
        self.single_line = Some(test);
        self
    }

    /// Whether `tokens[index]` opens a block under these rules.
    pub fn opens_at(&self, tokens: &[Token], index: usize) -> bool {
        let token = &tokens[index];
        if token.kind != TokenKind::Keyword || !self.openers.contains(&token.text.as_str()) {
            return false;
        }
        if is_member_access(tokens, index) {
            return false;
        }
        if self.single_line.is_some_and(|test| test(tokens, index)) {
            return false;
        }
        if self.expression_start_only.contains(&token.text.as_str()) {
            return starts_expression(tokens, index);
        }
        if self.same_line_joins.contains(&token.text.as_str()) {
            return !self.opened_earlier_on_line(tokens, index);
        }
        true
    }

    fn opened_earlier_on_line(&self, tokens: &[Token], index: usize) -> bool {
        let line_start = tokens[..index]
            .iter()
            .rposition(|t| matches!(t.kind, TokenKind::Newline | TokenKind::Semicolon))
            .map_or(0, |i| i + 1);
        (line_start..index).any(|i| {
            !self.same_line_joins.contains(&tokens[i].text.as_str()) && self.opens_at(tokens, i)
        })
    }

    fn closes_at(&self, tokens: &[Token], index: usize) -> bool {
        let token = &tokens[index];
        token.kind == TokenKind::Keyword
            && token.text == self.close
            && !is_member_access(tokens, index)
    }
}

fn previous_significant(tokens: &[Token], index: usize) -> Option<&Token> {
    tokens[..index]
        .iter()
        .rev()
        .find(|t| !matches!(t.kind, TokenKind::Whitespace | TokenKind::Comment))
}

/// `obj.end` is a method call, not a terminator.
fn is_member_access(tokens: &[Token], index: usize) -> bool {
    previous_significant(tokens, index).is_some_and(|t| t.kind == TokenKind::Dot)
}

/// First token of a statement: at the start of input, after a newline or a semicolon.
pub fn starts_statement(tokens: &[Token], index: usize) -> bool {
    match previous_significant(tokens, index) {
        None => true,
        Some(t) => matches!(t.kind, TokenKind::Newline | TokenKind::Semicolon),
    }
}

/// A statement start, or a position after an assignment, operator, opening paren or
/// comma. After a value (identifier, literal, closing delimiter, keyword) it is not.
pub fn starts_expression(tokens: &[Token], index: usize) -> bool {
    match previous_significant(tokens, index) {
        None => true,
        Some(t) => matches!(
            t.kind,
            TokenKind::Newline
                | TokenKind::Semicolon
                | TokenKind::Equals
                | TokenKind::Operator
                | TokenKind::OpenParen
                | TokenKind::OpenBracket
                | TokenKind::Comma
                | TokenKind::FatArrow
        ),
    }
}

/// Match the keyword block opening at `start`.
///
/// Returns an empty block with `after == start` when `tokens[start]` is not an opener.
pub fn match_keyword(tokens: &[Token], start: usize, rules: &KeywordBlock<'_>) -> Block {
    if start >= tokens.len() || !rules.opens_at(tokens, start) {
        return Block::empty(start);
    }

    let mut depth = 1usize;
    let mut members = Vec::new();
    let mut index = start + 1;
    while index < tokens.len() {
        if rules.nested && rules.opens_at(tokens, index) {
            depth += 1;
        } else if rules.closes_at(tokens, index) {
            depth -= 1;
            if depth == 0 {
                return Block {
                    members,
                    after: index + 1,
                    closed: true,
                };
            }
        }
        members.push(index);
        index += 1;
    }

    debug!(
        line = tokens[start].line,
        opener = %tokens[start].text,
        depth,
        "unterminated keyword block, running to end of input"
    );
    Block {
        members,
        after: tokens.len(),
        closed: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Words become keywords when listed, identifiers otherwise; `;` and `\n` are kept.
    fn toks(source: &str, keywords: &[&str]) -> Vec<Token> {
        let mut tokens = Vec::new();
        let mut line = 1;
        for word in source.split(' ').filter(|w| !w.is_empty()) {
            let kind = match word {
                "\n" => TokenKind::Newline,
                ";" => TokenKind::Semicolon,
                "." => TokenKind::Dot,
                w if keywords.contains(&w) => TokenKind::Keyword,
                _ => TokenKind::Identifier,
            };
            tokens.push(Token::new(kind, word, tokens.len(), line, 1));
            if kind == TokenKind::Newline {
                line += 1;
            }
        }
        tokens
    }

    const RUBY: &[&str] = &["def", "class", "if", "end", "do"];

    fn ruby() -> KeywordBlock<'static> {
        KeywordBlock::new(&["def", "class", "if", "do"], "end").expression_start_only(&["if"])
    }

    #[test]
    fn test_simple_block() {
        let tokens = toks("def f \n x \n end \n y", RUBY);
        let block = match_keyword(&tokens, 0, &ruby());
        assert!(block.closed);
        assert_eq!(tokens[block.after - 1].text, "end");
        assert_eq!(block.end_line(&tokens), Some(3));
    }

    #[test]
    fn test_nested_blocks() {
        let tokens = toks("class c \n def m \n end \n end \n z", RUBY);
        let block = match_keyword(&tokens, 0, &ruby());
        assert_eq!(block.end_line(&tokens), Some(4));
    }

    #[test]
    fn test_modifier_if_does_not_open() {
        let tokens = toks("def f \n return if x \n if y \n z \n end \n end", RUBY);
        let block = match_keyword(&tokens, 0, &ruby());
        assert!(block.closed);
        assert_eq!(block.after, tokens.len());
    }

    #[test]
    fn test_if_after_assignment_opens() {
        let mut tokens = toks("def f \n x = if y \n 1 \n end \n end \n z", RUBY);
        tokens[4].kind = TokenKind::Equals;
        let block = match_keyword(&tokens, 0, &ruby());
        assert!(block.closed);
        assert_eq!(block.end_line(&tokens), Some(5));
    }

    #[test]
    fn test_member_access_end_is_ignored() {
        let tokens = toks("def f \n r . end \n end", RUBY);
        let block = match_keyword(&tokens, 0, &ruby());
        assert!(block.closed);
        assert_eq!(block.end_line(&tokens), Some(3));
    }

    #[test]
    fn test_flat_blocks_do_not_nest() {
        let tokens = toks("def a def b end end", RUBY);
        let block = match_keyword(&tokens, 0, &ruby().flat());
        assert_eq!(block.after, 5);
    }

    #[test]
    fn test_loop_do_joins_the_loop_block() {
        let words = &["def", "while", "do", "end"];
        let rules = KeywordBlock::new(&["def", "while", "do"], "end")
            .expression_start_only(&["while"])
            .same_line_joins(&["do"]);

        let tokens = toks("def f \n while x do \n y \n end \n end \n z", words);
        let block = match_keyword(&tokens, 0, &rules);
        assert!(block.closed);
        assert_eq!(block.end_line(&tokens), Some(5));

        let tokens = toks("def f \n xs . each do \n y \n end \n end", words);
        let block = match_keyword(&tokens, 0, &rules);
        assert!(block.closed);
        assert_eq!(block.after, tokens.len());
    }

    #[test]
    fn test_single_line_openers_do_not_nest() {
        // `def y = 1` has no `end` of its own
        fn endless(tokens: &[Token], index: usize) -> bool {
            tokens.get(index + 2).is_some_and(|t| t.text == "=")
        }
        let tokens = toks("class a \n def y = 1 \n def z \n end \n end", RUBY);
        let rules = ruby().single_line_when(endless);
        assert!(!rules.opens_at(&tokens, 3));
        assert!(rules.opens_at(&tokens, 8));
        let block = match_keyword(&tokens, 0, &rules);
        assert!(block.closed);
        assert_eq!(block.after, tokens.len());
        assert_eq!(block.end_line(&tokens), Some(5));
    }

    #[test]
    fn test_unterminated() {
        let tokens = toks("def f \n x", RUBY);
        let block = match_keyword(&tokens, 0, &ruby());
        assert!(!block.closed);
        assert_eq!(block.after, tokens.len());
        assert_eq!(block.end_line(&tokens), Some(2));
    }

    #[test]
    fn test_not_an_opener() {
        let tokens = toks("x def", RUBY);
        assert_eq!(match_keyword(&tokens, 0, &ruby()), Block::empty(0));
    }
}
