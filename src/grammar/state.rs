//! Per-parse mutable state
//!
//!     `ParserState` is created fresh for every parse and dropped at the end of it. It holds
//!     what a grammar needs while walking tokens:
//!         - the context tree (`ContextTracker`); "am I inside X" walks the open contexts
//!         - delimiter depth counters, updated by `observe`
//!         - string/comment flags for grammars that interleave lexing decisions
//!         - the stack of enclosing elements (`enter_scope` / `exit_scope`)
//!         - the last significant token and a free-form `language_context` bag

use crate::grammar::ast::ElementId;
use crate::grammar::context::{Context, ContextId, ContextTracker};
use crate::grammar::token::{Metadata, Token, TokenKind};

#[derive(Debug, Clone, Default)]
pub struct ParserState {
    pub brace_depth: usize,
    pub paren_depth: usize,
    pub bracket_depth: usize,
    pub in_string: bool,
    pub string_delimiter: Option<char>,
    pub in_comment: bool,
    /// Language-specific scratch data.
    pub language_context: Metadata,
    contexts: ContextTracker,
    scopes: Vec<ElementId>,
    last_token: Option<Token>,
}

impl ParserState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enter_context(
        &mut self,
        kind: &str,
        name: Option<&str>,
        metadata: Metadata,
        start: usize,
    ) -> ContextId {
        self.contexts.enter_context(kind, name, metadata, start)
    }

    /// Close the innermost context. Returns the closed context, `None` when nothing is open.
    pub fn exit_context(&mut self, end: usize) -> Option<ContextId> {
        let exited = self.contexts.current_id();
        self.contexts.exit_context(end).map(|_| exited)
    }

    /// Whether any open context has one of the given kinds.
    pub fn is_in_context(&self, kinds: &[&str]) -> bool {
        self.contexts.is_in_context(kinds)
    }

    /// Kind of the innermost open context, `"code"` when none is open.
    pub fn context_type(&self) -> &str {
        self.contexts.get_current_context_type()
    }

    pub fn current_context(&self) -> Option<&Context> {
        (self.contexts.depth() > 0).then(|| self.contexts.current())
    }

    pub fn contexts(&self) -> &ContextTracker {
        &self.contexts
    }

    pub fn contexts_mut(&mut self) -> &mut ContextTracker {
        &mut self.contexts
    }

    /// Give up the state, keeping the context tree.
    pub fn into_contexts(self) -> ContextTracker {
        self.contexts
    }

    /// Make `element` the enclosing element for whatever is built next.
    pub fn enter_scope(&mut self, element: ElementId) {
        self.scopes.push(element);
    }

    pub fn exit_scope(&mut self) -> Option<ElementId> {
        self.scopes.pop()
    }

    pub fn current_scope(&self) -> Option<ElementId> {
        self.scopes.last().copied()
    }

    pub fn scope_depth(&self) -> usize {
        self.scopes.len()
    }

    pub fn last_token(&self) -> Option<&Token> {
        self.last_token.as_ref()
    }

    /// Update depth counters and the last significant token.
    pub fn observe(&mut self, token: &Token) {
        match token.kind {
            TokenKind::OpenBrace => self.brace_depth += 1,
            TokenKind::CloseBrace => self.brace_depth = self.brace_depth.saturating_sub(1),
            TokenKind::OpenParen => self.paren_depth += 1,
            TokenKind::CloseParen => self.paren_depth = self.paren_depth.saturating_sub(1),
            TokenKind::OpenBracket => self.bracket_depth += 1,
            TokenKind::CloseBracket => {
                self.bracket_depth = self.bracket_depth.saturating_sub(1)
            }
            _ => {}
        }
        if !matches!(
            token.kind,
            TokenKind::Whitespace | TokenKind::Newline | TokenKind::Comment
        ) {
            self.last_token = Some(token.clone());
        }
    }

    /// True when no brace, paren or bracket is open.
    pub fn at_top_level(&self) -> bool {
        self.brace_depth == 0 && self.paren_depth == 0 && self.bracket_depth == 0
    }

    /// Force-close everything still open at end of input.
    pub fn finish(&mut self, end: usize) {
        self.contexts.close_all(end);
        self.scopes.clear();
        self.in_string = false;
        self.string_delimiter = None;
        self.in_comment = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_stack_view() {
        let mut state = ParserState::new();
        assert_eq!(state.context_type(), "code");
        assert!(state.current_context().is_none());

        let class = state.enter_context("class", Some("A"), Metadata::new(), 0);
        state.enter_context("function", Some("f"), Metadata::new(), 4);
        assert!(state.is_in_context(&["class"]));
        assert!(state.is_in_context(&["loop", "function"]));
        assert_eq!(state.context_type(), "function");

        state.exit_context(10);
        assert_eq!(state.current_context().map(|c| c.kind.as_str()), Some("class"));
        assert_eq!(state.exit_context(12), Some(class));
        assert_eq!(state.exit_context(13), None);
        assert!(!state.is_in_context(&["class"]));
    }

    #[test]
    fn test_scope_stack() {
        let mut state = ParserState::new();
        assert_eq!(state.current_scope(), None);
        state.enter_scope(ElementId(3));
        state.enter_scope(ElementId(7));
        assert_eq!(state.current_scope(), Some(ElementId(7)));
        assert_eq!(state.exit_scope(), Some(ElementId(7)));
        assert_eq!(state.current_scope(), Some(ElementId(3)));
        assert_eq!(state.scope_depth(), 1);
    }

    #[test]
    fn test_observe_depths_and_last_token() {
        let mut state = ParserState::new();
        for (kind, text) in [
            (TokenKind::OpenBrace, "{"),
            (TokenKind::OpenParen, "("),
            (TokenKind::Identifier, "x"),
            (TokenKind::Whitespace, " "),
            (TokenKind::CloseParen, ")"),
        ] {
            state.observe(&Token::new(kind, text, 0, 1, 1));
        }
        assert_eq!(state.brace_depth, 1);
        assert_eq!(state.paren_depth, 0);
        assert!(!state.at_top_level());
        assert_eq!(state.last_token().map(|t| t.text.as_str()), Some(")"));

        state.observe(&Token::new(TokenKind::CloseBrace, "}", 0, 1, 1));
        state.observe(&Token::new(TokenKind::CloseBrace, "}", 0, 1, 1));
        assert!(state.at_top_level());
    }

    #[test]
    fn test_finish_closes_everything() {
        let mut state = ParserState::new();
        let id = state.enter_context("class", None, Metadata::new(), 0);
        state.enter_scope(ElementId(0));
        state.in_string = true;
        state.finish(99);
        assert_eq!(state.contexts().get(id).unwrap().end, Some(99));
        assert_eq!(state.current_scope(), None);
        assert!(!state.in_string);
    }
}
