//! The token parser: tokenize, build, repair.

use super::grammar::LanguageGrammar;
use super::repair::{repair, RepairReport};
use super::session::ParseSession;
use crate::grammar::ast::Outline;
use crate::grammar::config::ParseOptions;
use crate::grammar::context::ContextTracker;
use crate::grammar::error::Result;
use crate::grammar::lexing::Tokenizer;
use crate::grammar::symbols::SymbolTable;
use crate::grammar::token::Token;
use std::sync::Arc;
use tracing::debug;

/// Everything one parse produced.
#[derive(Debug, Clone)]
pub struct ParseResult {
    pub tokens: Vec<Token>,
    pub outline: Outline,
    pub symbols: SymbolTable,
    pub contexts: ContextTracker,
    pub repair: RepairReport,
}

/// A grammar paired with its compiled tokenizer.
///
/// Holds configuration only. Every `parse` call builds its own session, so a parser can be
/// shared between threads.
#[derive(Clone)]
pub struct TokenParser {
    grammar: Arc<dyn LanguageGrammar>,
    tokenizer: Tokenizer,
    options: ParseOptions,
}

impl TokenParser {
    /// Compile `grammar`'s tokenizer with default options. Fails when one of the grammar's
    /// token rules is not a valid pattern.
    pub fn new(grammar: Arc<dyn LanguageGrammar>) -> Result<Self> {
        Self::with_options(grammar, ParseOptions::default())
    }

    pub fn with_options(grammar: Arc<dyn LanguageGrammar>, options: ParseOptions) -> Result<Self> {
        let tokenizer = grammar.tokenizer(&options)?;
        Ok(Self {
            grammar,
            tokenizer,
            options,
        })
    }

    pub fn language(&self) -> &str {
        self.grammar.name()
    }

    pub fn grammar(&self) -> &dyn LanguageGrammar {
        self.grammar.as_ref()
    }

    pub fn tokenizer(&self) -> &Tokenizer {
        &self.tokenizer
    }

    pub fn options(&self) -> &ParseOptions {
        &self.options
    }

    pub fn tokenize(&self, source: &str) -> Vec<Token> {
        self.tokenizer.tokenize(source)
    }

    /// Parse `source` into an outline. Never fails: broken input yields a partial outline.
    pub fn parse(&self, source: &str) -> Outline {
        self.parse_detailed(source).outline
    }

    /// Parse and keep the intermediate products.
    pub fn parse_detailed(&self, source: &str) -> ParseResult {
        debug!(language = self.language(), bytes = source.len(), "parse started");
        let tokens = self.tokenize(source);

        let output = {
            let mut session = ParseSession::new(source, &tokens, self.options);
            if !source.trim().is_empty() {
                self.grammar.build(&mut session);
            }
            session.finish()
        };

        let mut outline = output.outline;
        let report = repair(&mut outline);
        debug!(
            language = self.language(),
            elements = outline.len(),
            linked = report.linked,
            severed = report.severed,
            adopted = report.adopted,
            coerced = report.coerced,
            "parse finished"
        );

        ParseResult {
            tokens,
            outline,
            symbols: output.symbols,
            contexts: output.contexts,
            repair: report,
        }
    }
}

impl std::fmt::Debug for TokenParser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenParser")
            .field("language", &self.language())
            .field("rules", &self.tokenizer.rules().len())
            .field("options", &self.options)
            .finish()
    }
}
