//! Line-oriented brace scanning over raw text.
//!
//!     Some callers only have a line number and the raw source: "where does the block that
//!     starts on line 12 end?". Running a full language tokenizer for that is overkill, so
//!     this module uses a small logos lexer that knows just enough to stay out of string
//!     literals, character literals, line comments and block comments. Braces inside those
//!     are never counted. Block comments do not nest: the first `*/` closes the comment.

use crate::grammar::token::line_breaks;
use logos::Logos;

fn block_comment(lex: &mut logos::Lexer<RawToken>) -> bool {
    let rest = lex.remainder();
    let len = rest.find("*/").map(|i| i + 2).unwrap_or(rest.len());
    lex.bump(len);
    true
}

#[derive(Logos, Debug, PartialEq, Clone, Copy)]
enum RawToken {
    #[token("{")]
    Open,

    #[token("}")]
    Close,

    #[regex(r"\r\n|\n|\r")]
    Newline,

    #[regex(r#""([^"\\\r\n]|\\.)*""#)]
    #[regex(r"`[^`]*`")]
    Str,

    #[regex(r"'([^'\\\r\n]|\\[^\r\n][^'\r\n]{0,8})'")]
    Char,

    #[regex(r"//[^\r\n]*")]
    LineComment,

    #[token("/*", block_comment)]
    BlockComment,

    #[token("/")]
    Slash,

    #[regex(r#"[^{}"'`/\r\n]+"#)]
    Code,
}

/// 1-based line on which the brace block opening on or after `start_line` closes.
///
/// Returns `None` when no `{` appears at or after `start_line`. An unterminated block
/// ends on the last line of the source.
pub fn find_block_end(source: &str, start_line: usize) -> Option<usize> {
    let mut lexer = RawToken::lexer(source);
    let mut line = 1;
    let mut depth = 0usize;
    let mut opened = false;

    while let Some(result) = lexer.next() {
        let slice = lexer.slice();
        match result {
            Ok(RawToken::Open) if line >= start_line => {
                depth += 1;
                opened = true;
            }
            Ok(RawToken::Close) if opened => {
                depth -= 1;
                if depth == 0 {
                    return Some(line);
                }
            }
            Ok(RawToken::Newline) => line += 1,
            Ok(RawToken::Str | RawToken::BlockComment) => line += line_breaks(slice),
            _ => {}
        }
    }

    opened.then(|| last_line(source))
}

fn last_line(source: &str) -> usize {
    let trimmed = source.strip_suffix('\n').unwrap_or(source);
    let trimmed = trimmed.strip_suffix('\r').unwrap_or(trimmed);
    1 + line_breaks(trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_block() {
        let source = "fn main() {\n    let x = 1;\n}\n";
        assert_eq!(find_block_end(source, 1), Some(3));
    }

    #[test]
    fn test_starts_at_requested_line() {
        let source = "struct A {}\nfn b() {\n    c();\n}\n";
        assert_eq!(find_block_end(source, 1), Some(1));
        assert_eq!(find_block_end(source, 2), Some(4));
    }

    #[test]
    fn test_ignores_braces_in_strings_and_comments() {
        let source = r#"fn f() {
    let s = "}";
    let c = '{';
    // }
    /* } { */
    let t = `
}`;
}
"#;
        assert_eq!(find_block_end(source, 1), Some(8));
    }

    #[test]
    fn test_escaped_quotes() {
        let source = "fn f() {\n    let s = \"\\\"}\";\n}\n";
        assert_eq!(find_block_end(source, 1), Some(3));
    }

    #[test]
    fn test_block_comments_do_not_nest() {
        let source = "fn f() {\n/* /* */ }\n";
        assert_eq!(find_block_end(source, 1), Some(2));
    }

    #[test]
    fn test_lifetimes_are_not_char_literals() {
        let source = "fn f<'a>(x: &'a str) {\n    x\n}\n";
        assert_eq!(find_block_end(source, 1), Some(3));
    }

    #[test]
    fn test_unterminated_returns_last_line() {
        let source = "class C {\n  void f() {\n";
        assert_eq!(find_block_end(source, 1), Some(2));
    }

    #[test]
    fn test_no_block() {
        assert_eq!(find_block_end("let x = 1;\n", 1), None);
        assert_eq!(find_block_end("{}\nx\n", 2), None);
    }
}
