//! Ruby: blocks closed by `end`
//!
//!     Every `def`, `class` and `module` that opens a keyword block becomes an element whose
//!     body runs to the matching `end`. The keyword matcher counts every opener between, so
//!     `if` / `unless` / `while` / `until` only count where an expression can start (a
//!     trailing `return x if y` opens nothing) and `do` only counts when nothing else opened
//!     a block earlier on the same line (`while x do`).
//!
//!     An endless method (`def name = value`, `def name(x) = value`) is complete on its own
//!     line and opens nothing.
//!
//!     A block without its `end` runs to the last line of input.

use crate::grammar::ast::{CodeElement, ElementType};
use crate::grammar::blocks::{
    last_significant_line, match_delimited, match_keyword, starts_statement, KeywordBlock,
};
use crate::grammar::config::ParseOptions;
use crate::grammar::error::Result;
use crate::grammar::lexing::{RuleFlags, TokenRule};
use crate::grammar::parsing::cursor::{compact_text, previous_significant, split_top_level};
use crate::grammar::parsing::{LanguageGrammar, ParseSession, TokenCursor};
use crate::grammar::token::{Metadata, Token, TokenKind};
use serde_json::Value;

const OPENERS: &[&str] = &[
    "def", "class", "module", "if", "unless", "while", "until", "case", "begin", "do", "for",
];

const MODIFIER_OPENERS: &[&str] = &["if", "unless", "while", "until"];

const KEYWORDS: &[&str] = &[
    "def", "class", "module", "if", "unless", "while", "until", "case", "begin", "do", "for",
    "end", "else", "elsif", "when", "then", "rescue", "ensure", "return", "yield", "self", "nil",
    "true", "false", "and", "or", "not", "in", "super", "require", "require_relative", "alias",
    "undef", "next", "break", "redo", "retry", "private", "protected", "public",
];

const OPERATORS: &[(&str, TokenKind)] = &[
    ("=>", TokenKind::FatArrow),
    ("->", TokenKind::Arrow),
    ("=", TokenKind::Equals),
    (":", TokenKind::Colon),
    ("::", TokenKind::Operator),
    ("==", TokenKind::Operator),
    ("===", TokenKind::Operator),
    ("!=", TokenKind::Operator),
    ("=~", TokenKind::Operator),
    ("!~", TokenKind::Operator),
    ("<=>", TokenKind::Operator),
    ("<=", TokenKind::Operator),
    (">=", TokenKind::Operator),
    ("&&", TokenKind::Operator),
    ("||", TokenKind::Operator),
    ("||=", TokenKind::Operator),
    ("&&=", TokenKind::Operator),
    ("+=", TokenKind::Operator),
    ("-=", TokenKind::Operator),
    ("*=", TokenKind::Operator),
    ("/=", TokenKind::Operator),
    ("<<", TokenKind::Operator),
    (">>", TokenKind::Operator),
    ("**", TokenKind::Operator),
    ("...", TokenKind::Operator),
    ("..", TokenKind::Operator),
    ("&.", TokenKind::Operator),
    ("+", TokenKind::Operator),
    ("-", TokenKind::Operator),
    ("*", TokenKind::Operator),
    ("/", TokenKind::Operator),
    ("%", TokenKind::Operator),
    ("<", TokenKind::Operator),
    (">", TokenKind::Operator),
    ("!", TokenKind::Operator),
    ("&", TokenKind::Operator),
    ("|", TokenKind::Operator),
    ("^", TokenKind::Operator),
    ("~", TokenKind::Operator),
    ("?", TokenKind::Operator),
];

#[derive(Debug, Default)]
pub struct RubyGrammar;

impl RubyGrammar {
    pub fn new() -> Self {
        Self
    }

    fn blocks(&self) -> KeywordBlock<'static> {
        KeywordBlock::new(OPENERS, "end")
            .expression_start_only(MODIFIER_OPENERS)
            .same_line_joins(&["do"])
            .single_line_when(endless_def)
    }
}

fn adjacent(tokens: &[Token], a: usize, b: usize) -> bool {
    tokens[a].span().end == tokens[b].offset
}

/// `def name = value` or `def name(args) = value`. A setter (`def name=(v)`) is not one.
fn endless_def(tokens: &[Token], index: usize) -> bool {
    if !tokens[index].is_keyword(&["def"])
        || previous_significant(tokens, index).is_some_and(|i| tokens[i].kind == TokenKind::Dot)
    {
        return false;
    }
    let Some((mut last, _)) = TokenCursor::at(tokens, index + 1).peek_significant() else {
        return false;
    };
    if tokens[last].is_keyword(&["self"])
        && tokens.get(last + 1).is_some_and(|t| t.kind == TokenKind::Dot)
    {
        last += 2;
    }
    if tokens.get(last).is_some_and(|t| t.kind == TokenKind::OpenBracket) {
        last += 1;
    }
    match tokens.get(last + 1) {
        Some(t) if matches!(t.text.as_str(), "?" | "!") && adjacent(tokens, last, last + 1) => {
            last += 1
        }
        Some(t) if t.kind == TokenKind::Equals && adjacent(tokens, last, last + 1) => return false,
        _ => {}
    }
    let mut cursor = TokenCursor::at(tokens, last + 1);
    if let Some((open, _)) = cursor
        .peek_significant()
        .filter(|(_, t)| t.kind == TokenKind::OpenParen)
    {
        cursor.seek(match_delimited(tokens, open, TokenKind::OpenParen, TokenKind::CloseParen).after);
    }
    cursor
        .peek_significant()
        .is_some_and(|(_, t)| t.kind == TokenKind::Equals)
}

/// Last line of the one-line statement at `index`: up to the first line break outside
/// brackets.
fn statement_last_line(tokens: &[Token], index: usize) -> usize {
    let mut depth = 0usize;
    let mut end = tokens.len();
    for (i, token) in tokens.iter().enumerate().skip(index) {
        match token.kind {
            TokenKind::OpenParen | TokenKind::OpenBracket | TokenKind::OpenBrace => depth += 1,
            TokenKind::CloseParen | TokenKind::CloseBracket | TokenKind::CloseBrace => {
                depth = depth.saturating_sub(1)
            }
            TokenKind::Newline | TokenKind::Semicolon if depth == 0 => {
                end = i;
                break;
            }
            _ => {}
        }
    }
    last_significant_line(tokens, index, end).unwrap_or(tokens[index].line)
}

impl LanguageGrammar for RubyGrammar {
    fn name(&self) -> &str {
        "ruby"
    }

    fn aliases(&self) -> &[&str] {
        &["rb"]
    }

    fn extensions(&self) -> &[&str] {
        &["rb", "rake", "gemspec"]
    }

    fn keywords(&self) -> &[&str] {
        KEYWORDS
    }

    fn operators(&self) -> &[(&str, TokenKind)] {
        OPERATORS
    }

    fn token_rules(&self, _options: &ParseOptions) -> Result<Vec<TokenRule>> {
        Ok(vec![
            TokenRule::with_flags(
                r"=begin(?s:.*?)(?:\n=end[^\r\n]*|\z)",
                TokenKind::Comment,
                RuleFlags::line_start(),
            )?,
            TokenRule::new(r"#[^\r\n]*", TokenKind::Comment)?,
            TokenRule::new(r#""(?:[^"\\]|\\(?s:.))*""#, TokenKind::String)?,
            TokenRule::new(r"'(?:[^'\\]|\\(?s:.))*'", TokenKind::String)?,
            TokenRule::new(r"`(?:[^`\\]|\\(?s:.))*`", TokenKind::String)?,
            TokenRule::with_flags(r":[A-Za-z_]\w*[?!]?", TokenKind::String, RuleFlags::word())?
                .transform(|_| {
                    let mut metadata = Metadata::new();
                    metadata.insert("symbol".to_string(), Value::Bool(true));
                    metadata
                }),
            TokenRule::new(r"@@?[A-Za-z_]\w*", TokenKind::Identifier)?,
            TokenRule::new(r"\$(?:[A-Za-z_]\w*|[0-9!@&~?$])", TokenKind::Identifier)?,
        ])
    }

    fn build(&self, session: &mut ParseSession<'_>) {
        let tokens = session.tokens();
        let blocks = self.blocks();
        for index in 0..tokens.len() {
            session.close_bodies(index);
            let token = &tokens[index];
            session.state.observe(token);
            match token.kind {
                TokenKind::Keyword if endless_def(tokens, index) => {
                    self.method(session, index, &blocks)
                }
                TokenKind::Keyword if blocks.opens_at(tokens, index) => match token.text.as_str() {
                    "def" => self.method(session, index, &blocks),
                    "class" => self.class(session, index, &blocks),
                    "module" => self.module(session, index, &blocks),
                    _ => {}
                },
                TokenKind::Keyword if matches!(token.text.as_str(), "require" | "require_relative") => {
                    self.require(session, index)
                }
                TokenKind::Identifier if starts_statement(tokens, index) => {
                    self.assignment(session, index)
                }
                _ => {}
            }
        }
    }
}

impl RubyGrammar {
    /// Add `element`, match its body from `index` and keep it open until the `end`.
    fn open_block(
        &self,
        session: &mut ParseSession<'_>,
        mut element: CodeElement,
        name_token: Option<&Token>,
        index: usize,
        blocks: &KeywordBlock<'_>,
    ) {
        let tokens = session.tokens();
        let block = match_keyword(tokens, index, blocks);
        element.end_line = if block.closed {
            block.end_line(tokens).unwrap_or(element.start_line)
        } else {
            session.last_line()
        };
        let name = element.name.clone();
        let symbol_type = element.element_type.as_str();
        let id = session.add_element(element);
        if let Some(token) = name_token {
            session.declare(&name, symbol_type, token, Metadata::new());
        }
        session.open_body(id, index, block.after);
    }

    fn method(&self, session: &mut ParseSession<'_>, index: usize, blocks: &KeywordBlock<'_>) {
        let tokens = session.tokens();
        let mut metadata = Metadata::new();
        let mut cursor = TokenCursor::at(tokens, index + 1);

        if let Some((at, _)) = cursor.peek_significant().filter(|(_, t)| t.is_keyword(&["self"])) {
            if tokens.get(at + 1).is_some_and(|t| t.kind == TokenKind::Dot) {
                metadata.insert("singleton".to_string(), Value::Bool(true));
                cursor.seek(at + 2);
            }
        }

        let Some((name_at, name_token)) = cursor.peek_significant() else {
            return;
        };
        let mut name = match name_token.kind {
            TokenKind::Identifier | TokenKind::Keyword | TokenKind::Operator => {
                name_token.text.clone()
            }
            TokenKind::OpenBracket
                if tokens
                    .get(name_at + 1)
                    .is_some_and(|t| t.kind == TokenKind::CloseBracket) =>
            {
                "[]".to_string()
            }
            _ => return,
        };
        let mut last = if name == "[]" { name_at + 1 } else { name_at };
        // `empty?`, `save!`, `name=`
        if let Some(suffix) = tokens.get(last + 1) {
            if adjacent(tokens, last, last + 1) && matches!(suffix.text.as_str(), "?" | "!" | "=") {
                name.push_str(&suffix.text);
                last += 1;
            }
        }

        let rest = TokenCursor::at(tokens, last + 1);
        let parameters = match rest.peek_significant() {
            Some((open, t)) if t.kind == TokenKind::OpenParen => {
                let params = match_delimited(tokens, open, TokenKind::OpenParen, TokenKind::CloseParen);
                Some(params.range())
            }
            Some((from, t))
                if !matches!(
                    t.kind,
                    TokenKind::Newline | TokenKind::Semicolon | TokenKind::Equals
                ) =>
            {
                let to = (from..tokens.len())
                    .find(|&i| matches!(tokens[i].kind, TokenKind::Newline | TokenKind::Semicolon))
                    .unwrap_or(tokens.len());
                Some(from..to)
            }
            _ => None,
        };
        if let Some(range) = &parameters {
            metadata.insert(
                "parameters".to_string(),
                Value::from(compact_text(&tokens[range.clone()])),
            );
        }

        let mut element = CodeElement::new(ElementType::Function, name, tokens[index].line, tokens[index].line);
        element.metadata = metadata;
        if endless_def(tokens, index) {
            element.end_line = statement_last_line(tokens, index);
            let name = element.name.clone();
            let symbol_type = element.element_type.as_str();
            session.add_element(element);
            session.declare(&name, symbol_type, name_token, Metadata::new());
            return;
        }
        self.open_block(session, element, Some(name_token), index, blocks);

        if let Some(range) = parameters {
            for piece in split_top_level(tokens, range, TokenKind::Comma) {
                if let Some(param) = tokens[piece].iter().find(|t| t.kind == TokenKind::Identifier) {
                    session.declare(&param.text, "parameter", param, Metadata::new());
                }
            }
        }
    }

    /// Constant path after `class` / `module`: `A`, `A::B`.
    /// Returns the path's first token index, the index just past it, and its text.
    fn constant_path(&self, tokens: &[Token], from: usize) -> Option<(usize, usize, String)> {
        let mut cursor = TokenCursor::at(tokens, from);
        let (start, _) = cursor
            .peek_significant()
            .filter(|(_, t)| t.kind == TokenKind::Identifier)?;
        cursor.seek(start);
        while let Some(token) = cursor.current() {
            let part = token.kind == TokenKind::Identifier
                || (token.kind == TokenKind::Operator && token.text == "::");
            if !part {
                break;
            }
            cursor.advance();
        }
        Some((start, cursor.pos(), compact_text(&tokens[start..cursor.pos()])))
    }

    fn class(&self, session: &mut ParseSession<'_>, index: usize, blocks: &KeywordBlock<'_>) {
        let tokens = session.tokens();
        // `class << self` opens a block but declares nothing.
        let Some((start, end, name)) = self.constant_path(tokens, index + 1) else {
            return;
        };
        let mut element = CodeElement::new(ElementType::Class, name, tokens[index].line, tokens[index].line);
        let superclass = TokenCursor::at(tokens, end)
            .find_at_depth(&[TokenKind::Operator], &[TokenKind::Newline, TokenKind::Semicolon])
            .filter(|&i| tokens[i].text == "<");
        if let Some(lt) = superclass {
            let end = (lt..tokens.len())
                .find(|&i| matches!(tokens[i].kind, TokenKind::Newline | TokenKind::Semicolon))
                .unwrap_or(tokens.len());
            let superclass = compact_text(&tokens[lt + 1..end]);
            if !superclass.is_empty() {
                element
                    .metadata
                    .insert("superclass".to_string(), Value::from(superclass));
            }
        }
        self.open_block(session, element, Some(&tokens[start]), index, blocks);
    }

    fn module(&self, session: &mut ParseSession<'_>, index: usize, blocks: &KeywordBlock<'_>) {
        let tokens = session.tokens();
        let Some((start, _, name)) = self.constant_path(tokens, index + 1) else {
            return;
        };
        let element = CodeElement::new(ElementType::Module, name, tokens[index].line, tokens[index].line);
        self.open_block(session, element, Some(&tokens[start]), index, blocks);
    }

    /// `require 'x'` / `require_relative 'x'` outside method bodies.
    fn require(&self, session: &mut ParseSession<'_>, index: usize) {
        let tokens = session.tokens();
        if !starts_statement(tokens, index) || session.in_callable() {
            return;
        }
        let mut cursor = TokenCursor::at(tokens, index + 1);
        cursor.eat_kind(TokenKind::OpenParen);
        let Some(path) = cursor.eat_kind(TokenKind::String) else {
            return;
        };
        let target = path.text.trim_matches(|c| matches!(c, '"' | '\'' | '`'));
        let mut element = CodeElement::new(ElementType::Import, target, path.line, path.end_line());
        if tokens[index].text == "require_relative" {
            element
                .metadata
                .insert("relative".to_string(), Value::Bool(true));
        }
        session.add_element(element);
        session.declare(target, "import", path, Metadata::new());
    }

    /// `CONSTANT = ...` outside methods, `name = ...` at file level.
    fn assignment(&self, session: &mut ParseSession<'_>, index: usize) {
        let tokens = session.tokens();
        let name_token = &tokens[index];
        let is_constant = name_token.text.starts_with(|c: char| c.is_ascii_uppercase());
        let allowed = if is_constant {
            !session.in_callable()
        } else {
            session.enclosing().is_none() && !name_token.text.starts_with('@')
        };
        if !allowed {
            return;
        }
        let Some((equals, _)) = TokenCursor::at(tokens, index + 1)
            .peek_significant()
            .filter(|(_, t)| t.kind == TokenKind::Equals)
        else {
            return;
        };
        let end = (equals..tokens.len())
            .find(|&i| matches!(tokens[i].kind, TokenKind::Newline | TokenKind::Semicolon))
            .unwrap_or(tokens.len());
        let end_line = previous_significant(tokens, end)
            .filter(|&i| i > equals)
            .map_or(name_token.line, |i| tokens[i].end_line());
        let element_type = if is_constant {
            ElementType::Constant
        } else {
            ElementType::Variable
        };
        let element = CodeElement::new(element_type, name_token.text.clone(), name_token.line, end_line);
        session.add_element(element);
        session.declare(&name_token.text, element_type.as_str(), name_token, Metadata::new());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::ast::Outline;
    use crate::grammar::parsing::TokenParser;
    use std::sync::Arc;

    fn parse(source: &str) -> Outline {
        TokenParser::new(Arc::new(RubyGrammar::new()))
            .unwrap()
            .parse(source)
    }

    const SAMPLE: &str = "\
require 'json'
require_relative \"lib/util\"

VERSION = \"1.0\"

module Shapes
  class Circle < Shape
    def initialize(r)
      @r = r
    end

    def self.unit
      new(1)
    end

    def area?
      return 0 if @r.nil?
      @r * @r
    end
  end
end

def helper(x)
  [1, 2].each do |i|
    puts i
  end
end
";

    #[test]
    fn test_sample_structure() {
        let outline = parse(SAMPLE);
        let found: Vec<(String, ElementType, usize, usize, usize)> = outline
            .walk()
            .into_iter()
            .map(|id| {
                let e = &outline[id];
                (e.name.clone(), e.element_type, e.start_line, e.end_line, outline.depth(id))
            })
            .collect();
        assert_eq!(
            found,
            vec![
                ("json".to_string(), ElementType::Import, 1, 1, 0),
                ("lib/util".to_string(), ElementType::Import, 2, 2, 0),
                ("VERSION".to_string(), ElementType::Constant, 4, 4, 0),
                ("Shapes".to_string(), ElementType::Module, 6, 21, 0),
                ("Circle".to_string(), ElementType::Class, 7, 20, 1),
                ("initialize".to_string(), ElementType::Method, 8, 10, 2),
                ("unit".to_string(), ElementType::Method, 12, 14, 2),
                ("area?".to_string(), ElementType::Method, 16, 19, 2),
                ("helper".to_string(), ElementType::Function, 23, 27, 0),
            ]
        );
    }

    #[test]
    fn test_sample_metadata() {
        let outline = parse(SAMPLE);
        let circle = &outline[outline.find_by_name("Circle").unwrap()];
        assert_eq!(circle.meta_str("superclass"), Some("Shape"));
        let unit = &outline[outline.find_function("unit").unwrap()];
        assert_eq!(unit.metadata.get("singleton"), Some(&Value::Bool(true)));
        let util = &outline[outline.find_by_name("lib/util").unwrap()];
        assert_eq!(util.metadata.get("relative"), Some(&Value::Bool(true)));
        let init = &outline[outline.find_function("initialize").unwrap()];
        assert_eq!(init.meta_str("parameters"), Some("r"));
    }

    #[test]
    fn test_while_do_is_one_block() {
        let outline = parse("def run\n  while busy do\n    step\n  end\nend\nputs 1\n");
        let run = &outline[outline.find_function("run").unwrap()];
        assert_eq!((run.start_line, run.end_line), (1, 5));
    }

    #[test]
    fn test_missing_end_runs_to_last_line() {
        let outline = parse("class Broken\n  def go\n    1\n  end\n");
        let broken = &outline[outline.find_by_name("Broken").unwrap()];
        assert_eq!(broken.end_line, 4);
        let go = &outline[outline.find_function("go").unwrap()];
        assert_eq!(go.end_line, 4);
    }

    #[test]
    fn test_endless_methods_do_not_open_blocks() {
        let source = "\
class A
  def y = 1
  def area(r) = 3.14 * r * r
  def self.build = new
  def name=(v)
    @name = v
  end
  def z
  end
end
";
        let outline = parse(source);
        let found: Vec<(&str, ElementType, usize, usize)> = outline
            .walk()
            .into_iter()
            .map(|id| {
                let e = &outline[id];
                (e.name.as_str(), e.element_type, e.start_line, e.end_line)
            })
            .collect();
        assert_eq!(
            found,
            vec![
                ("A", ElementType::Class, 1, 10),
                ("y", ElementType::Method, 2, 2),
                ("area", ElementType::Method, 3, 3),
                ("build", ElementType::Method, 4, 4),
                ("name=", ElementType::Method, 5, 7),
                ("z", ElementType::Method, 8, 9),
            ]
        );
        let a = outline.find_by_name("A").unwrap();
        assert_eq!(outline.children(a).len(), 5);
        let y = &outline[outline.find_function("y").unwrap()];
        assert!(y.metadata.get("parameters").is_none());
        let area = &outline[outline.find_function("area").unwrap()];
        assert_eq!(area.meta_str("parameters"), Some("r"));
        let build = &outline[outline.find_function("build").unwrap()];
        assert_eq!(build.metadata.get("singleton"), Some(&Value::Bool(true)));
    }

    #[test]
    fn test_singleton_class_block_declares_nothing() {
        let outline = parse("class A\n  class << self\n    def build\n    end\n  end\nend\n");
        let names: Vec<&str> = outline.walk().into_iter().map(|id| outline[id].name.as_str()).collect();
        assert_eq!(names, vec!["A", "build"]);
        let build = outline.find_function("build").unwrap();
        assert_eq!(outline.parent(build), outline.find_by_name("A"));
    }

    #[test]
    fn test_symbols_and_comments_do_not_open_blocks() {
        let outline = parse("=begin\ndef nope\n=end\nx = { :if => 1 } # def no\n");
        let names: Vec<&str> = outline.walk().into_iter().map(|id| outline[id].name.as_str()).collect();
        assert_eq!(names, vec!["x"]);
    }
}
