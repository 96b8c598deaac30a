//! Per-parse workspace handed to a grammar's element builder.
//!
//!     A `ParseSession` bundles the read-only inputs of one parse (source, tokens, options)
//!     with the mutable state the builder fills in: the outline, the `ParserState` and the
//!     `SymbolTable`. It is created by `TokenParser` for every call and consumed at the end,
//!     so nothing carries over between parses.
//!
//!     Bodies opened with `open_body` keep the element, its context and its symbol scope
//!     current until the token index passes the body's end. Elements added meanwhile become
//!     children of that element. Anything still open when `finish` runs is closed at the
//!     end offset of the last token.

use crate::grammar::ast::{CodeElement, ElementId, Outline};
use crate::grammar::config::ParseOptions;
use crate::grammar::context::ContextTracker;
use crate::grammar::state::ParserState;
use crate::grammar::symbols::SymbolTable;
use crate::grammar::token::{Metadata, Token};

#[derive(Debug, Clone, Copy)]
struct OpenBody {
    element: ElementId,
    after: usize,
}

pub struct ParseSession<'a> {
    source: &'a str,
    tokens: &'a [Token],
    options: ParseOptions,
    line_starts: Vec<usize>,
    bodies: Vec<OpenBody>,
    pub outline: Outline,
    pub state: ParserState,
    pub symbols: SymbolTable,
}

/// What a session leaves behind.
#[derive(Debug, Clone)]
pub struct SessionOutput {
    pub outline: Outline,
    pub symbols: SymbolTable,
    pub contexts: ContextTracker,
}

fn line_starts(source: &str) -> Vec<usize> {
    let bytes = source.as_bytes();
    let mut starts = vec![0];
    for (i, b) in bytes.iter().enumerate() {
        match b {
            b'\n' => starts.push(i + 1),
            b'\r' if bytes.get(i + 1) != Some(&b'\n') => starts.push(i + 1),
            _ => {}
        }
    }
    starts
}

impl<'a> ParseSession<'a> {
    pub fn new(source: &'a str, tokens: &'a [Token], options: ParseOptions) -> Self {
        Self {
            source,
            tokens,
            options,
            line_starts: line_starts(source),
            bodies: Vec::new(),
            outline: Outline::new(),
            state: ParserState::new(),
            symbols: SymbolTable::new(),
        }
    }

    pub fn source(&self) -> &'a str {
        self.source
    }

    pub fn tokens(&self) -> &'a [Token] {
        self.tokens
    }

    pub fn options(&self) -> &ParseOptions {
        &self.options
    }

    /// Last line holding any token; 1 for empty input.
    pub fn last_line(&self) -> usize {
        self.tokens.last().map(Token::end_line).unwrap_or(1)
    }

    /// Byte offset just past the last token.
    pub fn end_offset(&self) -> usize {
        self.tokens.last().map(|t| t.span().end).unwrap_or(0)
    }

    /// Source text of lines `start..=end` (1-based), without the final line break.
    pub fn line_text(&self, start: usize, end: usize) -> &'a str {
        let Some(&from) = start.checked_sub(1).and_then(|i| self.line_starts.get(i)) else {
            return "";
        };
        let to = self
            .line_starts
            .get(end)
            .copied()
            .unwrap_or(self.source.len())
            .max(from);
        self.source[from..to].trim_end_matches(['\r', '\n'])
    }

    /// The element whose body is currently open, if any.
    pub fn enclosing(&self) -> Option<ElementId> {
        self.state.current_scope()
    }

    /// Whether the innermost open body belongs to a function or method.
    pub fn in_callable(&self) -> bool {
        self.enclosing()
            .is_some_and(|id| self.outline[id].element_type.is_callable())
    }

    /// Add `element` under the enclosing element. Fills in `code_text` from the source when
    /// code capture is on and the builder left it empty.
    pub fn add_element(&mut self, mut element: CodeElement) -> ElementId {
        if self.options.capture_code && element.code_text.is_empty() {
            element.code_text = self
                .line_text(element.start_line, element.end_line)
                .to_string();
        }
        match self.enclosing() {
            Some(parent) => self.outline.add_child(parent, element),
            None => self.outline.add(element),
        }
    }

    /// Record a declaration in the current symbol scope.
    pub fn declare(&mut self, name: &str, symbol_type: &str, token: &Token, metadata: Metadata) {
        if name.is_empty() {
            return;
        }
        self.symbols
            .add_symbol(name, symbol_type, token.offset, token.line, token.column, metadata);
    }

    /// Make `element` the enclosing element until the token index reaches `after`. `opener`
    /// is the token that starts the body.
    pub fn open_body(&mut self, element: ElementId, opener: usize, after: usize) {
        let kind = self.outline[element].element_type.as_str();
        let name = self.outline[element].name.clone();
        let start = self.tokens.get(opener).map(|t| t.offset).unwrap_or(0);
        self.state.enter_scope(element);
        self.state
            .enter_context(kind, Some(&name), Metadata::new(), start);
        self.symbols.enter_scope(kind);
        self.bodies.push(OpenBody { element, after });
    }

    /// Close every open body that ends at or before token index `index`.
    pub fn close_bodies(&mut self, index: usize) {
        while let Some(&body) = self.bodies.last() {
            if body.after > index {
                break;
            }
            let end = body
                .after
                .checked_sub(1)
                .and_then(|i| self.tokens.get(i))
                .map(|t| t.span().end)
                .unwrap_or_else(|| self.end_offset());
            self.close_top(end);
        }
    }

    fn close_top(&mut self, end: usize) {
        if self.bodies.pop().is_some() {
            self.state.exit_scope();
            self.state.exit_context(end);
            self.symbols.exit_scope();
        }
    }

    /// Number of bodies still open.
    pub fn open_bodies(&self) -> usize {
        self.bodies.len()
    }

    /// Element of the innermost open body.
    pub fn current_body(&self) -> Option<ElementId> {
        self.bodies.last().map(|b| b.element)
    }

    /// Force-close everything and hand back the results.
    pub fn finish(mut self) -> SessionOutput {
        let end = self.end_offset();
        while !self.bodies.is_empty() {
            self.close_top(end);
        }
        self.state.finish(end);
        self.symbols.close_all();
        SessionOutput {
            outline: self.outline,
            symbols: self.symbols,
            contexts: self.state.into_contexts(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::ast::ElementType;
    use crate::grammar::token::TokenKind;

    fn tokens() -> Vec<Token> {
        vec![
            Token::new(TokenKind::Keyword, "class", 0, 1, 1),
            Token::new(TokenKind::OpenBrace, "{", 6, 1, 7),
            Token::new(TokenKind::Newline, "\n", 7, 1, 8),
            Token::new(TokenKind::Identifier, "x", 8, 2, 1),
            Token::new(TokenKind::Newline, "\n", 9, 2, 2),
            Token::new(TokenKind::CloseBrace, "}", 10, 3, 1),
        ]
    }

    #[test]
    fn test_line_text() {
        let source = "class {\nx\n}";
        let toks = tokens();
        let session = ParseSession::new(source, &toks, ParseOptions::default());
        assert_eq!(session.line_text(1, 1), "class {");
        assert_eq!(session.line_text(2, 3), "x\n}");
        assert_eq!(session.line_text(3, 9), "}");
        assert_eq!(session.line_text(0, 1), "");
        assert_eq!(session.last_line(), 3);
    }

    #[test]
    fn test_bodies_scope_new_elements() {
        let source = "class {\nx\n}";
        let toks = tokens();
        let mut session = ParseSession::new(source, &toks, ParseOptions::default());
        let class = session.add_element(CodeElement::new(ElementType::Class, "C", 1, 3));
        session.open_body(class, 1, 6);
        assert_eq!(session.state.context_type(), "class");
        assert_eq!(session.symbols.current_scope().scope_type, "class");

        session.close_bodies(3);
        let field = session.add_element(CodeElement::new(ElementType::Variable, "x", 2, 2));
        assert_eq!(session.outline.parent(field), Some(class));
        assert_eq!(session.outline[field].code_text, "x");

        session.close_bodies(6);
        assert_eq!(session.open_bodies(), 0);
        assert_eq!(session.enclosing(), None);
        let contexts = session.finish().contexts;
        let closed = contexts.iter().find(|(_, c)| c.kind == "class").unwrap().1;
        assert_eq!(closed.end, Some(11));
    }

    #[test]
    fn test_finish_force_closes() {
        let source = "class {\nx\n}";
        let toks = tokens();
        let mut session = ParseSession::new(source, &toks, ParseOptions::default());
        let class = session.add_element(CodeElement::new(ElementType::Class, "C", 1, 3));
        session.open_body(class, 1, 99);
        let output = session.finish();
        assert!(output.contexts.iter().all(|(_, c)| !c.is_open()));
        assert_eq!(output.symbols.depth(), 0);
    }
}
