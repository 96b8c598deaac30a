//! Block matchers
//!
//!     Three reusable algorithms that find the token range of a structural block given only
//!     where it starts:
//!         - `brace`: `{ ... }` (and, generically, any open/close delimiter pair)
//!         - `indentation`: Python-style blocks delimited by indentation
//!         - `keyword`: `def ... end` style blocks delimited by keywords
//!
//!     All matchers work on token kinds, so delimiters inside string and comment tokens are
//!     never counted. They all return a `Block`: the member token indices (the delimiters that
//!     open and close the block are excluded) and the index just past the block. Running off
//!     the end of the token stream is not an error: the remaining tokens become members, the
//!     returned `after` is the token count and `closed` is false.
//!
//!     `raw` holds the line-oriented fallback that scans raw text instead of tokens.

pub mod brace;
pub mod indentation;
pub mod keyword;
pub mod raw;

pub use brace::{match_braces, match_delimited};
pub use indentation::{indent_width, logical_line_end, match_indentation, token_indent};
pub use keyword::{match_keyword, starts_expression, starts_statement, KeywordBlock};

use crate::grammar::token::{Token, TokenKind};
use std::ops::Range;

/// Token range of a matched block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    /// Indices of the tokens inside the block, in order.
    pub members: Vec<usize>,
    /// Index of the first token after the block (after its closing delimiter, if any).
    pub after: usize,
    /// Whether an explicit terminator was found before the end of input.
    pub closed: bool,
}

impl Block {
    /// A block that consumed nothing; `after` stays at `start`.
    pub fn empty(start: usize) -> Self {
        Self {
            members: Vec::new(),
            after: start,
            closed: false,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Members as an index range. Every matcher produces contiguous members.
    pub fn range(&self) -> Range<usize> {
        match (self.members.first(), self.members.last()) {
            (Some(&first), Some(&last)) => first..last + 1,
            _ => self.after..self.after,
        }
    }

    /// Last line covered by the block: the closing delimiter when there is one, otherwise
    /// the last significant member. `None` for an empty block.
    pub fn end_line(&self, tokens: &[Token]) -> Option<usize> {
        if self.closed && self.after > 0 {
            return tokens.get(self.after - 1).map(Token::end_line);
        }
        self.members
            .iter()
            .rev()
            .map(|&i| &tokens[i])
            .find(|t| !matches!(t.kind, TokenKind::Whitespace | TokenKind::Newline))
            .map(Token::end_line)
    }
}

/// End line of the last token in `tokens[from..to]` that is not whitespace or a newline.
pub fn last_significant_line(tokens: &[Token], from: usize, to: usize) -> Option<usize> {
    let to = to.min(tokens.len());
    if from >= to {
        return None;
    }
    tokens[from..to]
        .iter()
        .rev()
        .find(|t| !matches!(t.kind, TokenKind::Whitespace | TokenKind::Newline))
        .map(Token::end_line)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tok(kind: TokenKind, text: &str, line: usize) -> Token {
        Token::new(kind, text, 0, line, 1)
    }

    #[test]
    fn test_empty_block() {
        let block = Block::empty(3);
        assert!(block.is_empty());
        assert_eq!(block.after, 3);
        assert_eq!(block.end_line(&[]), None);
    }

    #[test]
    fn test_end_line_prefers_closing_token() {
        let tokens = vec![
            tok(TokenKind::OpenBrace, "{", 1),
            tok(TokenKind::Identifier, "x", 2),
            tok(TokenKind::Newline, "\n", 2),
            tok(TokenKind::CloseBrace, "}", 3),
        ];
        let block = Block {
            members: vec![1, 2],
            after: 4,
            closed: true,
        };
        assert_eq!(block.end_line(&tokens), Some(3));
        assert_eq!(block.range(), 1..3);

        let open = Block {
            members: vec![1, 2],
            after: 3,
            closed: false,
        };
        assert_eq!(open.end_line(&tokens), Some(2));
    }

    #[test]
    fn test_last_significant_line() {
        let tokens = vec![
            tok(TokenKind::Identifier, "a", 1),
            tok(TokenKind::Newline, "\n", 1),
            tok(TokenKind::Whitespace, "  ", 2),
        ];
        assert_eq!(last_significant_line(&tokens, 0, 3), Some(1));
        assert_eq!(last_significant_line(&tokens, 1, 3), None);
        assert_eq!(last_significant_line(&tokens, 2, 1), None);
    }
}
