//! Python: blocks delimited by indentation
//!
//!     The builder walks logical lines (a line break inside brackets continues the line).
//!     A `def` or `class` header gets its body from the indentation matcher, measured against
//!     the header line's own indentation, and the body stays open while the walk moves
//!     through its lines. A header whose next line is not indented deeper has a one-line
//!     body (`def f(): pass`).
//!
//!     Decorators are collected until the definition they decorate. Each one becomes a
//!     `decorator` element next to the definition (with `target` metadata), and the
//!     definition lists them in its `decorators` metadata. Its own `start_line` stays the
//!     `def` / `class` line.
//!
//!     File-level assignments become constants when the name is UPPER_CASE and variables
//!     otherwise. A string as the first statement of the file is the module docstring; as
//!     the first statement of a body it becomes the `docstring` metadata of the definition.

use crate::grammar::ast::{CodeElement, ElementType};
use crate::grammar::blocks::{
    indent_width, last_significant_line, logical_line_end, match_delimited, match_indentation,
    token_indent,
};
use crate::grammar::config::ParseOptions;
use crate::grammar::error::Result;
use crate::grammar::lexing::{RuleFlags, TokenRule};
use crate::grammar::parsing::cursor::{compact_text, split_top_level};
use crate::grammar::parsing::{LanguageGrammar, ParseSession, TokenCursor};
use crate::grammar::token::{Metadata, Token, TokenKind};
use serde_json::Value;
use std::ops::Range;

const KEYWORDS: &[&str] = &[
    "def", "class", "async", "await", "import", "from", "as", "return", "if", "elif", "else",
    "for", "while", "try", "except", "finally", "with", "lambda", "pass", "yield", "global",
    "nonlocal", "del", "raise", "assert", "in", "is", "not", "and", "or", "break", "continue",
    "None", "True", "False",
];

const OPERATORS: &[(&str, TokenKind)] = &[
    ("->", TokenKind::Arrow),
    ("=", TokenKind::Equals),
    (":", TokenKind::Colon),
    (":=", TokenKind::Operator),
    ("==", TokenKind::Operator),
    ("!=", TokenKind::Operator),
    ("<=", TokenKind::Operator),
    (">=", TokenKind::Operator),
    ("+=", TokenKind::Operator),
    ("-=", TokenKind::Operator),
    ("*=", TokenKind::Operator),
    ("/=", TokenKind::Operator),
    ("//=", TokenKind::Operator),
    ("%=", TokenKind::Operator),
    ("**=", TokenKind::Operator),
    ("&=", TokenKind::Operator),
    ("|=", TokenKind::Operator),
    ("^=", TokenKind::Operator),
    (">>=", TokenKind::Operator),
    ("<<=", TokenKind::Operator),
    ("**", TokenKind::Operator),
    ("//", TokenKind::Operator),
    ("<<", TokenKind::Operator),
    (">>", TokenKind::Operator),
    ("...", TokenKind::Operator),
    ("+", TokenKind::Operator),
    ("-", TokenKind::Operator),
    ("*", TokenKind::Operator),
    ("/", TokenKind::Operator),
    ("%", TokenKind::Operator),
    ("<", TokenKind::Operator),
    (">", TokenKind::Operator),
    ("&", TokenKind::Operator),
    ("|", TokenKind::Operator),
    ("^", TokenKind::Operator),
    ("~", TokenKind::Operator),
];

#[derive(Debug, Default)]
pub struct PythonGrammar;

impl PythonGrammar {
    pub fn new() -> Self {
        Self
    }
}

/// Contents of a string literal without prefix letters and quotes.
fn string_value(literal: &str) -> &str {
    let body = literal.trim_start_matches(|c: char| c.is_ascii_alphabetic());
    for quote in ["\"\"\"", "'''", "\"", "'"] {
        if let Some(inner) = body.strip_prefix(quote) {
            return inner.strip_suffix(quote).unwrap_or(inner).trim();
        }
    }
    body.trim()
}

fn is_constant_name(name: &str) -> bool {
    name.chars().any(|c| c.is_alphabetic())
        && name
            .chars()
            .all(|c| c.is_uppercase() || c.is_ascii_digit() || c == '_')
}

fn first_significant(tokens: &[Token], line: Range<usize>) -> Option<usize> {
    line.into_iter()
        .find(|&i| !matches!(tokens[i].kind, TokenKind::Whitespace | TokenKind::Newline | TokenKind::Comment))
}

/// A decorator line waiting for the definition below it.
#[derive(Debug)]
struct PendingDecorator {
    text: String,
    name: String,
    arguments: String,
    start_line: usize,
    end_line: usize,
}

impl LanguageGrammar for PythonGrammar {
    fn name(&self) -> &str {
        "python"
    }

    fn aliases(&self) -> &[&str] {
        &["py"]
    }

    fn extensions(&self) -> &[&str] {
        &["py", "pyi", "pyw"]
    }

    fn keywords(&self) -> &[&str] {
        KEYWORDS
    }

    fn operators(&self) -> &[(&str, TokenKind)] {
        OPERATORS
    }

    fn token_rules(&self, options: &ParseOptions) -> Result<Vec<TokenRule>> {
        let tab_width = options.tab_width;
        Ok(vec![
            TokenRule::with_flags(r"[ \t]+", TokenKind::Whitespace, RuleFlags::line_start())?
                .transform(move |caps| {
                    let mut metadata = Metadata::new();
                    let width = indent_width(caps.get(0).map_or("", |m| m.as_str()), tab_width);
                    metadata.insert("indent_size".to_string(), Value::from(width));
                    metadata
                }),
            TokenRule::new(r"#[^\r\n]*", TokenKind::Comment)?,
            TokenRule::new(r#"(?i:[rbuf]{0,2})"""(?s:.*?)(?:"""|\z)"#, TokenKind::String)?,
            TokenRule::new(r"(?i:[rbuf]{0,2})'''(?s:.*?)(?:'''|\z)", TokenKind::String)?,
            TokenRule::new(r#"(?i:[rbuf]{0,2})"(?:[^"\\\r\n]|\\(?s:.))*""#, TokenKind::String)?,
            TokenRule::new(r"(?i:[rbuf]{0,2})'(?:[^'\\\r\n]|\\(?s:.))*'", TokenKind::String)?,
            TokenRule::new(r"@[A-Za-z_][\w.]*", TokenKind::Attribute)?,
            TokenRule::new(r"\\\r?\n", TokenKind::Whitespace)?,
        ])
    }

    fn build(&self, session: &mut ParseSession<'_>) {
        let tokens = session.tokens();
        let mut decorators: Vec<PendingDecorator> = Vec::new();
        let mut seen_statement = false;
        let mut index = 0;
        while index < tokens.len() {
            session.close_bodies(index);
            let end = logical_line_end(tokens, index);
            for token in &tokens[index..end] {
                session.state.observe(token);
            }
            if let Some(first) = first_significant(tokens, index..end) {
                let indent = token_indent(&tokens[index], session.options().tab_width);
                self.statement(session, first, index..end, indent, &mut decorators, seen_statement);
                seen_statement = true;
            }
            index = end;
        }
        self.flush_decorators(session, &mut decorators, None);
    }
}

impl PythonGrammar {
    fn statement(
        &self,
        session: &mut ParseSession<'_>,
        first: usize,
        line: Range<usize>,
        indent: usize,
        decorators: &mut Vec<PendingDecorator>,
        seen_statement: bool,
    ) {
        let tokens = session.tokens();
        let token = &tokens[first];
        match token.kind {
            TokenKind::Attribute => {
                let arguments = compact_text(&tokens[first + 1..line.end]);
                decorators.push(PendingDecorator {
                    text: compact_text(&tokens[first..line.end]),
                    name: token.text.trim_start_matches('@').to_string(),
                    arguments,
                    start_line: token.line,
                    end_line: last_significant_line(tokens, first, line.end).unwrap_or(token.line),
                });
            }
            TokenKind::Keyword if matches!(token.text.as_str(), "def" | "class" | "async") => {
                let mut cursor = TokenCursor::at(tokens, first);
                let is_async = cursor.eat_keyword("async");
                let keyword = cursor.peek_significant();
                match keyword {
                    Some((at, k)) if k.is_keyword(&["def"]) => {
                        self.definition(session, first, at, line, indent, is_async, decorators)
                    }
                    Some((at, k)) if k.is_keyword(&["class"]) && !is_async => {
                        self.class(session, at, line, indent, decorators)
                    }
                    _ => self.flush_decorators(session, decorators, None),
                }
            }
            TokenKind::Keyword if token.text == "import" => {
                self.flush_decorators(session, decorators, None);
                if !session.in_callable() {
                    self.import(session, first, line);
                }
            }
            TokenKind::Keyword if token.text == "from" => {
                self.flush_decorators(session, decorators, None);
                if !session.in_callable() {
                    self.from_import(session, first, line);
                }
            }
            TokenKind::String if !seen_statement && session.enclosing().is_none() => {
                self.flush_decorators(session, decorators, None);
                let mut element = CodeElement::new(
                    ElementType::Docstring,
                    "__doc__",
                    token.line,
                    token.end_line(),
                );
                element
                    .metadata
                    .insert("text".to_string(), Value::from(string_value(&token.text)));
                session.add_element(element);
            }
            TokenKind::Identifier if session.enclosing().is_none() => {
                self.flush_decorators(session, decorators, None);
                self.assignment(session, first, line);
            }
            _ => self.flush_decorators(session, decorators, None),
        }
    }

    /// Emit the pending decorators as elements, pointing at `target` when one follows.
    fn flush_decorators(
        &self,
        session: &mut ParseSession<'_>,
        decorators: &mut Vec<PendingDecorator>,
        target: Option<&str>,
    ) {
        for decorator in decorators.drain(..) {
            let mut element = CodeElement::new(
                ElementType::Decorator,
                decorator.name,
                decorator.start_line,
                decorator.end_line,
            );
            if !decorator.arguments.is_empty() {
                element
                    .metadata
                    .insert("arguments".to_string(), Value::from(decorator.arguments));
            }
            if let Some(target) = target {
                element
                    .metadata
                    .insert("target".to_string(), Value::from(target));
            }
            session.add_element(element);
        }
    }

    /// Docstring of a body whose first statement is a string.
    fn body_docstring(&self, tokens: &[Token], members: &[usize]) -> Option<String> {
        let first = members.iter().copied().find(|&i| {
            !matches!(
                tokens[i].kind,
                TokenKind::Whitespace | TokenKind::Newline | TokenKind::Comment
            )
        })?;
        (tokens[first].kind == TokenKind::String).then(|| string_value(&tokens[first].text).to_string())
    }

    /// Add a definition element with its header metadata, then open its body.
    fn open_definition(
        &self,
        session: &mut ParseSession<'_>,
        mut element: CodeElement,
        name_token: &Token,
        header: usize,
        line: Range<usize>,
        indent: usize,
        decorators: &mut Vec<PendingDecorator>,
    ) -> Option<usize> {
        let tokens = session.tokens();
        let block = match_indentation(tokens, header, indent, session.options().tab_width);
        element.end_line = if block.is_empty() {
            last_significant_line(tokens, header, line.end).unwrap_or(element.start_line)
        } else {
            block.end_line(tokens).unwrap_or(element.start_line)
        };
        if let Some(docstring) = self.body_docstring(tokens, &block.members) {
            element
                .metadata
                .insert("docstring".to_string(), Value::from(docstring));
        }
        if !decorators.is_empty() {
            let texts: Vec<String> = decorators.iter().map(|d| d.text.clone()).collect();
            element
                .metadata
                .insert("decorators".to_string(), Value::from(texts));
        }
        let name = element.name.clone();
        let symbol_type = element.element_type.as_str();
        self.flush_decorators(session, decorators, Some(&name));
        let id = session.add_element(element);
        session.declare(&name, symbol_type, name_token, Metadata::new());
        if block.is_empty() {
            return None;
        }
        let colon = TokenCursor::at(tokens, header)
            .find_at_depth(&[TokenKind::Colon], &[TokenKind::Newline])
            .unwrap_or(header);
        session.open_body(id, colon, block.after);
        Some(colon)
    }

    #[allow(clippy::too_many_arguments)]
    fn definition(
        &self,
        session: &mut ParseSession<'_>,
        first: usize,
        def: usize,
        line: Range<usize>,
        indent: usize,
        is_async: bool,
        decorators: &mut Vec<PendingDecorator>,
    ) {
        let tokens = session.tokens();
        let mut cursor = TokenCursor::at(tokens, def + 1);
        let Some(name_token) = cursor.eat_identifier() else {
            self.flush_decorators(session, decorators, None);
            return;
        };
        let mut element = CodeElement::new(
            ElementType::Function,
            name_token.text.clone(),
            tokens[first].line,
            tokens[first].line,
        );
        if is_async {
            element
                .metadata
                .insert("is_async".to_string(), Value::Bool(true));
        }

        let params = cursor
            .peek_significant()
            .filter(|(_, t)| t.kind == TokenKind::OpenParen)
            .map(|(open, _)| match_delimited(tokens, open, TokenKind::OpenParen, TokenKind::CloseParen));
        if let Some(params) = &params {
            element.metadata.insert(
                "parameters".to_string(),
                Value::from(compact_text(&tokens[params.range()])),
            );
            let colon = TokenCursor::at(tokens, params.after)
                .find_at_depth(&[TokenKind::Colon], &[TokenKind::Newline]);
            if let Some(arrow) = (params.after..colon.unwrap_or(params.after))
                .find(|&i| tokens[i].kind == TokenKind::Arrow)
            {
                let return_type = compact_text(&tokens[arrow + 1..colon.unwrap_or(arrow + 1)]);
                if !return_type.is_empty() {
                    element
                        .metadata
                        .insert("return_type".to_string(), Value::from(return_type));
                }
            }
        }

        let opened = self.open_definition(session, element, name_token, def, line, indent, decorators);
        if let (Some(_), Some(params)) = (opened, params) {
            for piece in split_top_level(tokens, params.range(), TokenKind::Comma) {
                let name = tokens[piece]
                    .iter()
                    .take_while(|t| !matches!(t.kind, TokenKind::Colon | TokenKind::Equals))
                    .find(|t| t.kind == TokenKind::Identifier);
                if let Some(name) = name {
                    session.declare(&name.text, "parameter", name, Metadata::new());
                }
            }
        }
    }

    fn class(
        &self,
        session: &mut ParseSession<'_>,
        class: usize,
        line: Range<usize>,
        indent: usize,
        decorators: &mut Vec<PendingDecorator>,
    ) {
        let tokens = session.tokens();
        let mut cursor = TokenCursor::at(tokens, class + 1);
        let Some(name_token) = cursor.eat_identifier() else {
            self.flush_decorators(session, decorators, None);
            return;
        };
        let mut element = CodeElement::new(
            ElementType::Class,
            name_token.text.clone(),
            tokens[class].line,
            tokens[class].line,
        );
        if let Some((open, _)) = cursor
            .peek_significant()
            .filter(|(_, t)| t.kind == TokenKind::OpenParen)
        {
            let bases = match_delimited(tokens, open, TokenKind::OpenParen, TokenKind::CloseParen);
            let bases = compact_text(&tokens[bases.range()]);
            if !bases.is_empty() {
                element
                    .metadata
                    .insert("bases".to_string(), Value::from(bases));
            }
        }
        self.open_definition(session, element, name_token, class, line, indent, decorators);
    }

    /// `import a.b as c, d`: one element per module.
    fn import(&self, session: &mut ParseSession<'_>, first: usize, line: Range<usize>) {
        let tokens = session.tokens();
        let start_line = tokens[first].line;
        let end_line = last_significant_line(tokens, first, line.end).unwrap_or(start_line);
        for piece in split_top_level(tokens, first + 1..line.end, TokenKind::Comma) {
            let piece = &tokens[piece];
            let alias_at = piece.iter().position(|t| t.is_keyword(&["as"]));
            let module = compact_text(&piece[..alias_at.unwrap_or(piece.len())]);
            if module.is_empty() {
                continue;
            }
            let mut element = CodeElement::new(ElementType::Import, module.clone(), start_line, end_line);
            if let Some(alias_at) = alias_at {
                let alias = compact_text(&piece[alias_at + 1..]);
                element.metadata.insert("alias".to_string(), Value::from(alias));
            }
            let name_token = piece.iter().find(|t| t.kind == TokenKind::Identifier);
            session.add_element(element);
            if let Some(token) = name_token {
                session.declare(&module, "import", token, Metadata::new());
            }
        }
    }

    /// `from x import a, b as c`: one element named after the module, listing the names.
    fn from_import(&self, session: &mut ParseSession<'_>, first: usize, line: Range<usize>) {
        let tokens = session.tokens();
        let Some(import_at) = (first + 1..line.end).find(|&i| tokens[i].is_keyword(&["import"]))
        else {
            return;
        };
        let module = compact_text(&tokens[first + 1..import_at]);
        if module.is_empty() {
            return;
        }
        let imported: Vec<Token> = tokens[import_at + 1..line.end]
            .iter()
            .filter(|t| !matches!(t.kind, TokenKind::OpenParen | TokenKind::CloseParen))
            .cloned()
            .collect();
        let names: Vec<String> = split_top_level(&imported, 0..imported.len(), TokenKind::Comma)
            .into_iter()
            .map(|piece| compact_text(&imported[piece]))
            .filter(|name| !name.is_empty())
            .collect();

        let start_line = tokens[first].line;
        let end_line = last_significant_line(tokens, first, line.end).unwrap_or(start_line);
        let mut element = CodeElement::new(ElementType::Import, module.clone(), start_line, end_line);
        element
            .metadata
            .insert("names".to_string(), Value::from(names));
        session.add_element(element);
        if let Some(token) = tokens[first + 1..import_at]
            .iter()
            .find(|t| !matches!(t.kind, TokenKind::Whitespace | TokenKind::Comment))
        {
            session.declare(&module, "import", token, Metadata::new());
        }
    }

    /// `NAME = ...` or `name: T = ...` at file level.
    fn assignment(&self, session: &mut ParseSession<'_>, first: usize, line: Range<usize>) {
        let tokens = session.tokens();
        let name_token = &tokens[first];
        let Some((next, next_token)) = TokenCursor::at(tokens, first + 1).peek_significant() else {
            return;
        };
        let mut metadata = Metadata::new();
        match next_token.kind {
            TokenKind::Equals => {}
            TokenKind::Colon => {
                let equals = (next + 1..line.end).find(|&i| tokens[i].kind == TokenKind::Equals);
                let annotation = compact_text(&tokens[next + 1..equals.unwrap_or(line.end)]);
                if !annotation.is_empty() {
                    metadata.insert("type".to_string(), Value::from(annotation));
                }
            }
            _ => return,
        }
        let element_type = if is_constant_name(&name_token.text) {
            ElementType::Constant
        } else {
            ElementType::Variable
        };
        let end_line = last_significant_line(tokens, first, line.end).unwrap_or(name_token.line);
        let mut element =
            CodeElement::new(element_type, name_token.text.clone(), name_token.line, end_line);
        element.metadata = metadata;
        session.add_element(element);
        session.declare(
            &name_token.text,
            element_type.as_str(),
            name_token,
            Metadata::new(),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::ast::Outline;
    use crate::grammar::parsing::TokenParser;
    use std::sync::Arc;

    fn parse(source: &str) -> Outline {
        TokenParser::new(Arc::new(PythonGrammar::new()))
            .unwrap()
            .parse(source)
    }

    const SAMPLE: &str = "\
\"\"\"Tools.\"\"\"
import os
from typing import (List,
    Optional)

MAX_SIZE = 10
name: str = \"x\"

@dataclass
class Point(Base):
    \"\"\"A point.\"\"\"

    def norm(self, scale: float = 1.0) -> float:
        return 0.0

    async def load(self): ...


def helper(*args, **kwargs):
    def inner():
        pass
    return inner
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
                ("__doc__".to_string(), ElementType::Docstring, 1, 1, 0),
                ("os".to_string(), ElementType::Import, 2, 2, 0),
                ("typing".to_string(), ElementType::Import, 3, 4, 0),
                ("MAX_SIZE".to_string(), ElementType::Constant, 6, 6, 0),
                ("name".to_string(), ElementType::Variable, 7, 7, 0),
                ("dataclass".to_string(), ElementType::Decorator, 9, 9, 0),
                ("Point".to_string(), ElementType::Class, 10, 16, 0),
                ("norm".to_string(), ElementType::Method, 13, 14, 1),
                ("load".to_string(), ElementType::Method, 16, 16, 1),
                ("helper".to_string(), ElementType::Function, 19, 22, 0),
                ("inner".to_string(), ElementType::Function, 20, 21, 1),
            ]
        );
    }

    #[test]
    fn test_sample_metadata() {
        let outline = parse(SAMPLE);
        let point = &outline[outline.find_by_name("Point").unwrap()];
        assert_eq!(point.meta_str("bases"), Some("Base"));
        assert_eq!(point.meta_str("docstring"), Some("A point."));
        assert_eq!(point.metadata["decorators"], Value::from(vec!["@dataclass"]));

        let decorator = &outline[outline.find_by_name("dataclass").unwrap()];
        assert_eq!(decorator.meta_str("target"), Some("Point"));

        let norm = &outline[outline.find_function("norm").unwrap()];
        assert_eq!(norm.meta_str("parameters"), Some("self, scale: float = 1.0"));
        assert_eq!(norm.meta_str("return_type"), Some("float"));

        let load = &outline[outline.find_function("load").unwrap()];
        assert_eq!(load.metadata.get("is_async"), Some(&Value::Bool(true)));

        let typing = &outline[outline.find_by_name("typing").unwrap()];
        assert_eq!(typing.metadata["names"], Value::from(vec!["List", "Optional"]));

        let name = &outline[outline.find_by_name("name").unwrap()];
        assert_eq!(name.meta_str("type"), Some("str"));
    }

    #[test]
    fn test_def_end_line_skips_trailing_blank_lines() {
        let outline = parse("def f():\n    x = 1\n    return x\n\n\n");
        let f = &outline[outline.find_function("f").unwrap()];
        assert_eq!((f.start_line, f.end_line), (1, 3));
    }

    #[test]
    fn test_import_aliases() {
        let outline = parse("import numpy as np, sys\n");
        let names: Vec<&str> = outline.roots().iter().map(|&id| outline[id].name.as_str()).collect();
        assert_eq!(names, vec!["numpy", "sys"]);
        let numpy = &outline[outline.roots()[0]];
        assert_eq!(numpy.meta_str("alias"), Some("np"));
    }

    #[test]
    fn test_tabs_count_as_tab_width() {
        let outline = parse("class A:\n\tdef f(self):\n\t\treturn 1\n\tdef g(self):\n\t\tpass\n");
        let class = outline.roots()[0];
        assert_eq!(outline[class].end_line, 5);
        assert_eq!(outline.children(class).len(), 2);
    }

    #[test]
    fn test_parameters_become_symbols() {
        let parser = TokenParser::new(Arc::new(PythonGrammar::new())).unwrap();
        let result = parser.parse_detailed("def f(a, b: int = 2, *rest):\n    return a\n");
        let names: Vec<&str> = result
            .symbols
            .get_all_symbols()
            .iter()
            .filter(|s| s.symbol_type == "parameter")
            .map(|s| s.name.as_str())
            .collect();
        assert_eq!(names, vec!["a", "b", "rest"]);
    }
}
