//! Indentation-delimited blocks.
//!
//!     The block introduced by the logical line containing `start` begins on the next line.
//!     Its level is the indentation of its first significant line, which must be deeper than
//!     `base`; otherwise the block is empty and nothing is consumed. Every following line
//!     indented deeper than `base` belongs to the block; the first significant line at or
//!     below `base` ends it.
//!
//!     Blank and comment-only lines are provisional: they are committed to the block only
//!     when another block line follows them. Trailing ones are left for the caller, and
//!     `after` points at the first of them.
//!
//!     Lines are logical lines: a newline inside open parens, brackets or braces continues
//!     the current line.

use super::Block;
use crate::grammar::token::{Token, TokenKind};

/// Width of a run of indentation. A tab counts as `tab_width` columns.
pub fn indent_width(text: &str, tab_width: usize) -> usize {
    text.chars()
        .map(|c| if c == '\t' { tab_width } else { 1 })
        .sum()
}

/// Indentation a line-leading token stands for: its `indent_size` metadata, or the width
/// of its text. Zero for anything but whitespace.
pub fn token_indent(token: &Token, tab_width: usize) -> usize {
    match token.kind {
        TokenKind::Whitespace => token
            .metadata_usize("indent_size")
            .unwrap_or_else(|| indent_width(&token.text, tab_width)),
        _ => 0,
    }
}

/// Index just past the logical line starting at `from` (past its newline, if any).
pub fn logical_line_end(tokens: &[Token], from: usize) -> usize {
    let mut depth = 0usize;
    let mut index = from;
    while index < tokens.len() {
        match tokens[index].kind {
            TokenKind::OpenParen | TokenKind::OpenBracket | TokenKind::OpenBrace => depth += 1,
            TokenKind::CloseParen | TokenKind::CloseBracket | TokenKind::CloseBrace => {
                depth = depth.saturating_sub(1)
            }
            TokenKind::Newline if depth == 0 => return index + 1,
            _ => {}
        }
        index += 1;
    }
    tokens.len()
}

fn is_significant(token: &Token) -> bool {
    !matches!(
        token.kind,
        TokenKind::Whitespace | TokenKind::Newline | TokenKind::Comment
    )
}

/// Match the indented block introduced by the line containing `start`.
pub fn match_indentation(tokens: &[Token], start: usize, base: usize, tab_width: usize) -> Block {
    if start >= tokens.len() {
        return Block::empty(start);
    }

    let mut index = logical_line_end(tokens, start);
    let mut members = Vec::new();
    let mut pending: Vec<usize> = Vec::new();
    let mut pending_from: Option<usize> = None;

    while index < tokens.len() {
        let end = logical_line_end(tokens, index);
        let line = &tokens[index..end];

        if !line.iter().any(is_significant) {
            pending.extend(index..end);
            pending_from.get_or_insert(index);
            index = end;
            continue;
        }

        if token_indent(&line[0], tab_width) <= base {
            break;
        }

        members.append(&mut pending);
        pending_from = None;
        members.extend(index..end);
        index = end;
    }

    if members.is_empty() {
        return Block::empty(start);
    }
    Block {
        members,
        after: pending_from.unwrap_or(index),
        closed: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Minimal line-oriented tokenizer for tests: leading whitespace, `#` comments,
    /// words, parens and newlines.
    fn lines(source: &str) -> Vec<Token> {
        let mut tokens = Vec::new();
        let mut offset = 0;
        for (n, raw) in source.split_inclusive('\n').enumerate() {
            let line = n + 1;
            let body = raw.trim_end_matches('\n');
            let trimmed = body.trim_start();
            let indent = &body[..body.len() - trimmed.len()];
            let mut col = 1;
            if !indent.is_empty() {
                tokens.push(Token::new(TokenKind::Whitespace, indent, offset, line, col));
                col += indent.len();
            }
            let mut rest_offset = offset + indent.len();
            if trimmed.starts_with('#') {
                tokens.push(Token::new(TokenKind::Comment, trimmed, rest_offset, line, col));
            } else {
                for word in trimmed.split(' ').filter(|w| !w.is_empty()) {
                    let kind = match word {
                        "(" => TokenKind::OpenParen,
                        ")" => TokenKind::CloseParen,
                        _ => TokenKind::Identifier,
                    };
                    tokens.push(Token::new(kind, word, rest_offset, line, col));
                    rest_offset += word.len() + 1;
                    col += word.len() + 1;
                }
            }
            if raw.ends_with('\n') {
                tokens.push(Token::new(TokenKind::Newline, "\n", offset + body.len(), line, col));
            }
            offset += raw.len();
        }
        tokens
    }

    fn lines_of(tokens: &[Token], block: &Block) -> Vec<usize> {
        let mut lines: Vec<usize> = block.members.iter().map(|&i| tokens[i].line).collect();
        lines.dedup();
        lines
    }

    #[test]
    fn test_simple_block() {
        let tokens = lines("def f :\n    x\n    y\nz\n");
        let block = match_indentation(&tokens, 0, 0, 4);
        assert_eq!(lines_of(&tokens, &block), vec![2, 3]);
        assert_eq!(tokens[block.after].text, "z");
        assert_eq!(block.end_line(&tokens), Some(3));
    }

    #[test]
    fn test_empty_when_not_indented() {
        let tokens = lines("def f :\nx\n");
        let block = match_indentation(&tokens, 0, 0, 4);
        assert!(block.is_empty());
        assert_eq!(block.after, 0);
    }

    #[test]
    fn test_blank_lines_are_provisional() {
        let tokens = lines("def f :\n    x\n\n    # note\n    y\n\nz\n");
        let block = match_indentation(&tokens, 0, 0, 4);
        assert_eq!(lines_of(&tokens, &block), vec![2, 3, 4, 5]);
        // the trailing blank line is handed back
        assert_eq!(tokens[block.after].line, 6);
    }

    #[test]
    fn test_nested_base() {
        let tokens = lines("class c :\n    def m :\n        x\n    def n :\n        y\n");
        let m = tokens.iter().position(|t| t.text == "m").unwrap();
        let block = match_indentation(&tokens, m, 4, 4);
        assert_eq!(lines_of(&tokens, &block), vec![3]);
        assert_eq!(tokens[block.after].line, 4);
    }

    #[test]
    fn test_runs_to_end_of_input() {
        let tokens = lines("def f :\n    x\n    y");
        let block = match_indentation(&tokens, 0, 0, 4);
        assert_eq!(block.after, tokens.len());
        assert_eq!(block.end_line(&tokens), Some(3));
    }

    #[test]
    fn test_continuation_lines_inside_parens() {
        let tokens = lines("def f :\n    x ( a\nb )\n    y\nz\n");
        let block = match_indentation(&tokens, 0, 0, 4);
        assert_eq!(lines_of(&tokens, &block), vec![2, 3, 4]);
    }

    #[test]
    fn test_indent_width_tabs() {
        assert_eq!(indent_width("\t  ", 4), 6);
        assert_eq!(indent_width("", 4), 0);
    }
}
