//! The capability interface a language implements to plug into the parser.

use super::session::ParseSession;
use crate::grammar::config::ParseOptions;
use crate::grammar::error::Result;
use crate::grammar::lexing::{TokenRule, Tokenizer};
use crate::grammar::token::TokenKind;

/// Everything the generic parser needs to know about one language.
///
/// A grammar is immutable configuration: keyword set, operator table, extra token rules and
/// an element builder. Per-parse state lives in the `ParseSession` handed to `build`.
pub trait LanguageGrammar: Send + Sync {
    /// Canonical language name, used as the registry key.
    fn name(&self) -> &str;

    /// Other names the registry accepts for this grammar.
    fn aliases(&self) -> &[&str] {
        &[]
    }

    /// File extensions, without the leading dot.
    fn extensions(&self) -> &[&str] {
        &[]
    }

    fn keywords(&self) -> &[&str];

    /// Operator lexemes and the token kind each one produces.
    fn operators(&self) -> &[(&str, TokenKind)] {
        &[]
    }

    /// Literal, comment and punctuation rules tried before keywords and operators.
    fn token_rules(&self, _options: &ParseOptions) -> Result<Vec<TokenRule>> {
        Ok(Vec::new())
    }

    /// Walk `session.tokens()` and add elements to `session.outline`.
    fn build(&self, session: &mut ParseSession<'_>);

    fn tokenizer(&self, options: &ParseOptions) -> Result<Tokenizer> {
        Tokenizer::builder(self.name())
            .rules(self.token_rules(options)?)
            .keywords(self.keywords().iter().copied())
            .operators(self.operators().iter().copied())
            .build()
    }
}
