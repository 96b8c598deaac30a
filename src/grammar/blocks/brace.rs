//! Brace-delimited blocks.

use super::Block;
use crate::grammar::token::{Token, TokenKind};
use tracing::debug;

/// Match the `{ ... }` block opening at `start`.
///
/// Returns an empty block with `after == start` when `tokens[start]` is not an open brace.
pub fn match_braces(tokens: &[Token], start: usize) -> Block {
    match_delimited(tokens, start, TokenKind::OpenBrace, TokenKind::CloseBrace)
}

/// Match a block delimited by `open`/`close` tokens (parens and brackets work the same way
/// as braces). Depth goes up on every `open` and down on every `close`; the block ends when
/// depth returns to zero. The closing token is not a member, `after` points past it.
pub fn match_delimited(tokens: &[Token], start: usize, open: TokenKind, close: TokenKind) -> Block {
    if tokens.get(start).map(|t| t.kind) != Some(open) {
        return Block::empty(start);
    }

    let mut depth = 1usize;
    let mut members = Vec::new();
    let mut index = start + 1;
    while index < tokens.len() {
        let kind = tokens[index].kind;
        if kind == open {
            depth += 1;
        } else if kind == close {
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
        depth,
        "unterminated {} block, running to end of input",
        open
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

    fn toks(kinds: &[TokenKind]) -> Vec<Token> {
        kinds
            .iter()
            .enumerate()
            .map(|(i, &k)| Token::new(k, "x", i, 1, i + 1))
            .collect()
    }

    use TokenKind::{CloseBrace as C, Identifier as I, OpenBrace as O, OpenParen, CloseParen};

    #[test]
    fn test_simple_block() {
        let tokens = toks(&[I, O, I, I, C, I]);
        let block = match_braces(&tokens, 1);
        assert_eq!(block.members, vec![2, 3]);
        assert_eq!(block.after, 5);
        assert!(block.closed);
    }

    #[test]
    fn test_nested_block() {
        let tokens = toks(&[O, O, I, C, O, C, C]);
        let block = match_braces(&tokens, 0);
        assert_eq!(block.members, vec![1, 2, 3, 4, 5]);
        assert_eq!(block.after, 7);
    }

    #[test]
    fn test_unterminated_block_runs_to_end() {
        let tokens = toks(&[O, I, O, I]);
        let block = match_braces(&tokens, 0);
        assert_eq!(block.members, vec![1, 2, 3]);
        assert_eq!(block.after, tokens.len());
        assert!(!block.closed);
    }

    #[test]
    fn test_not_at_open_brace() {
        let tokens = toks(&[I, O, C]);
        assert_eq!(match_braces(&tokens, 0), Block::empty(0));
        assert_eq!(match_braces(&tokens, 10), Block::empty(10));
    }

    #[test]
    fn test_parens() {
        let tokens = toks(&[OpenParen, I, OpenParen, CloseParen, CloseParen, I]);
        let block = match_delimited(&tokens, 0, OpenParen, CloseParen);
        assert_eq!(block.after, 5);
        assert_eq!(block.members, vec![1, 2, 3]);
    }
}
