//! Token navigation helpers shared by the element builders.

use crate::grammar::token::{Token, TokenKind};
use std::ops::Range;

/// A position in a token slice with helpers for skipping trivia and reading headers.
#[derive(Debug, Clone, Copy)]
pub struct TokenCursor<'t> {
    tokens: &'t [Token],
    pos: usize,
}

fn is_inline_trivia(token: &Token) -> bool {
    matches!(token.kind, TokenKind::Whitespace | TokenKind::Comment)
}

/// Trivia or a newline.
pub fn is_blank(token: &Token) -> bool {
    token.is_trivia() || token.kind == TokenKind::Newline
}

impl<'t> TokenCursor<'t> {
    pub fn new(tokens: &'t [Token]) -> Self {
        Self { tokens, pos: 0 }
    }

    pub fn at(tokens: &'t [Token], pos: usize) -> Self {
        Self { tokens, pos }
    }

    pub fn pos(&self) -> usize {
        self.pos
    }

    pub fn seek(&mut self, pos: usize) {
        self.pos = pos;
    }

    pub fn is_eof(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    pub fn current(&self) -> Option<&'t Token> {
        self.tokens.get(self.pos)
    }

    /// Return the current token and move past it.
    pub fn advance(&mut self) -> Option<&'t Token> {
        let token = self.tokens.get(self.pos)?;
        self.pos += 1;
        Some(token)
    }

    /// Skip whitespace and comments, staying on the current line.
    pub fn skip_inline_trivia(&mut self) -> &mut Self {
        while self.current().is_some_and(is_inline_trivia) {
            self.pos += 1;
        }
        self
    }

    /// Skip whitespace, comments and newlines.
    pub fn skip_trivia(&mut self) -> &mut Self {
        while self.current().is_some_and(is_blank) {
            self.pos += 1;
        }
        self
    }

    /// Next token that is not whitespace or a comment, without moving.
    pub fn peek_significant(&self) -> Option<(usize, &'t Token)> {
        let mut ahead = *self;
        ahead.skip_inline_trivia();
        ahead.current().map(|t| (ahead.pos, t))
    }

    /// Like `peek_significant`, also skipping newlines.
    pub fn peek_past_newlines(&self) -> Option<(usize, &'t Token)> {
        let mut ahead = *self;
        ahead.skip_trivia();
        ahead.current().map(|t| (ahead.pos, t))
    }

    /// Consume the next significant token if it has `kind`.
    pub fn eat_kind(&mut self, kind: TokenKind) -> Option<&'t Token> {
        match self.peek_significant() {
            Some((index, token)) if token.kind == kind => {
                self.pos = index + 1;
                Some(token)
            }
            _ => None,
        }
    }

    /// Consume the next significant token if it is the keyword `keyword`.
    pub fn eat_keyword(&mut self, keyword: &str) -> bool {
        match self.peek_significant() {
            Some((index, token)) if token.is_keyword(&[keyword]) => {
                self.pos = index + 1;
                true
            }
            _ => false,
        }
    }

    /// Consume the next significant token if it is an identifier.
    pub fn eat_identifier(&mut self) -> Option<&'t Token> {
        self.eat_kind(TokenKind::Identifier)
    }

    /// Find the first token of one of `kinds` at delimiter depth zero, starting at the
    /// cursor. The search gives up at a token of one of the `stop` kinds at depth zero, or
    /// when a closing delimiter would take the depth below zero.
    pub fn find_at_depth(&self, kinds: &[TokenKind], stop: &[TokenKind]) -> Option<usize> {
        let mut depth = 0usize;
        for (index, token) in self.tokens.iter().enumerate().skip(self.pos) {
            if depth == 0 && kinds.contains(&token.kind) {
                return Some(index);
            }
            if depth == 0 && stop.contains(&token.kind) {
                return None;
            }
            match token.kind {
                TokenKind::OpenParen | TokenKind::OpenBracket | TokenKind::OpenBrace => depth += 1,
                TokenKind::CloseParen | TokenKind::CloseBracket | TokenKind::CloseBrace => {
                    if depth == 0 {
                        return None;
                    }
                    depth -= 1;
                }
                _ => {}
            }
        }
        None
    }
}

/// Texts of `tokens` joined, comments dropped and whitespace runs (newlines included)
/// collapsed to one space.
pub fn compact_text(tokens: &[Token]) -> String {
    let mut out = String::new();
    let mut pending_space = false;
    for token in tokens {
        match token.kind {
            TokenKind::Whitespace | TokenKind::Newline | TokenKind::Comment => {
                pending_space = !out.is_empty();
            }
            _ => {
                if pending_space {
                    out.push(' ');
                    pending_space = false;
                }
                out.push_str(&token.text);
            }
        }
    }
    out
}

/// Split `tokens[range]` on `separator` tokens at delimiter depth zero. Empty pieces
/// (only trivia) are dropped.
pub fn split_top_level(
    tokens: &[Token],
    range: Range<usize>,
    separator: TokenKind,
) -> Vec<Range<usize>> {
    let mut pieces = Vec::new();
    let mut depth = 0usize;
    let mut piece_start = range.start;
    let end = range.end.min(tokens.len());
    for index in range.start..end {
        match tokens[index].kind {
            TokenKind::OpenParen | TokenKind::OpenBracket | TokenKind::OpenBrace => depth += 1,
            TokenKind::CloseParen | TokenKind::CloseBracket | TokenKind::CloseBrace => {
                depth = depth.saturating_sub(1)
            }
            kind if kind == separator && depth == 0 => {
                pieces.push(piece_start..index);
                piece_start = index + 1;
            }
            _ => {}
        }
    }
    pieces.push(piece_start..end);
    pieces
        .into_iter()
        .filter(|piece| !tokens[piece.clone()].iter().all(is_blank))
        .collect()
}

/// Index of the previous token that is not whitespace, a comment or a newline.
pub fn previous_significant(tokens: &[Token], index: usize) -> Option<usize> {
    tokens[..index.min(tokens.len())]
        .iter()
        .rposition(|t| !is_blank(t))
}

/// Index just past a `<...>` group starting at `start`, counting `>>` as two closers.
/// Returns `start` when `tokens[start]` is not `<`.
pub fn skip_angle_group(tokens: &[Token], start: usize) -> usize {
    if tokens.get(start).map(|t| t.text.as_str()) != Some("<") {
        return start;
    }
    let mut depth = 0isize;
    for (index, token) in tokens.iter().enumerate().skip(start) {
        match token.text.as_str() {
            "<" => depth += 1,
            ">" => depth -= 1,
            ">>" => depth -= 2,
            "->" | "=>" => {}
            _ if matches!(
                token.kind,
                TokenKind::OpenBrace | TokenKind::Semicolon | TokenKind::CloseBrace
            ) =>
            {
                return index;
            }
            _ => {}
        }
        if depth <= 0 {
            return index + 1;
        }
    }
    tokens.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn toks(parts: &[(TokenKind, &str)]) -> Vec<Token> {
        let mut offset = 0;
        parts.iter()
            .map(|&(kind, text)| {
                let token = Token::new(kind, text, offset, 1, offset + 1);
                offset += text.len();
                token
            })
            .collect()
    }

    #[test]
    fn test_skips_trivia_and_eats() {
        let tokens = toks(&[
            (TokenKind::Keyword, "fn"),
            (TokenKind::Whitespace, " "),
            (TokenKind::Comment, "/* x */"),
            (TokenKind::Identifier, "main"),
            (TokenKind::Newline, "\n"),
            (TokenKind::OpenParen, "("),
        ]);
        let mut cursor = TokenCursor::new(&tokens);
        assert!(cursor.eat_keyword("fn"));
        assert_eq!(cursor.eat_identifier().map(|t| t.text.as_str()), Some("main"));
        assert_eq!(cursor.peek_significant().map(|(i, _)| i), Some(4));
        assert_eq!(cursor.peek_past_newlines().map(|(i, _)| i), Some(5));
        assert!(cursor.eat_kind(TokenKind::OpenParen).is_none());
    }

    #[test]
    fn test_find_at_depth_ignores_nested() {
        let tokens = toks(&[
            (TokenKind::OpenParen, "("),
            (TokenKind::Semicolon, ";"),
            (TokenKind::CloseParen, ")"),
            (TokenKind::OpenBrace, "{"),
        ]);
        let cursor = TokenCursor::new(&tokens);
        assert_eq!(
            cursor.find_at_depth(&[TokenKind::OpenBrace, TokenKind::Semicolon], &[]),
            Some(3)
        );
        assert_eq!(
            cursor.find_at_depth(&[TokenKind::OpenBrace], &[TokenKind::CloseParen]),
            Some(3)
        );
        let inside = TokenCursor::at(&tokens, 1);
        assert_eq!(inside.find_at_depth(&[TokenKind::OpenBrace], &[]), None);
    }

    #[test]
    fn test_compact_text() {
        let tokens = toks(&[
            (TokenKind::Identifier, "a"),
            (TokenKind::Colon, ":"),
            (TokenKind::Newline, "\n"),
            (TokenKind::Whitespace, "    "),
            (TokenKind::Comment, "// note"),
            (TokenKind::Identifier, "u8"),
        ]);
        assert_eq!(compact_text(&tokens), "a: u8");
        assert_eq!(compact_text(&tokens[2..4]), "");
    }

    #[test]
    fn test_split_top_level() {
        let tokens = toks(&[
            (TokenKind::Identifier, "a"),
            (TokenKind::Comma, ","),
            (TokenKind::OpenParen, "("),
            (TokenKind::Identifier, "b"),
            (TokenKind::Comma, ","),
            (TokenKind::Identifier, "c"),
            (TokenKind::CloseParen, ")"),
            (TokenKind::Comma, ","),
            (TokenKind::Whitespace, " "),
        ]);
        let pieces = split_top_level(&tokens, 0..tokens.len(), TokenKind::Comma);
        assert_eq!(pieces, vec![0..1, 2..7]);
    }

    #[test]
    fn test_skip_angle_group() {
        let tokens = toks(&[
            (TokenKind::Operator, "<"),
            (TokenKind::Identifier, "Vec"),
            (TokenKind::Operator, "<"),
            (TokenKind::Identifier, "u8"),
            (TokenKind::Operator, ">>"),
            (TokenKind::OpenParen, "("),
        ]);
        assert_eq!(skip_angle_group(&tokens, 0), 5);
        assert_eq!(skip_angle_group(&tokens, 1), 1);
    }
}
