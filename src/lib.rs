//! # codeshape
//!
//! Error-tolerant tokenization and structural outlining of source code.
//!
//! A language is described as data (keywords, operators, token rules) plus a small builder
//! that recognizes declarations. The shared machinery tokenizes, matches blocks, tracks
//! scopes and repairs the resulting tree, so any input yields a well-nested outline.
//!
//! ```rust-example
//! use codeshape::LanguageRegistry;
//!
//! let registry = LanguageRegistry::with_defaults();
//! let parser = registry.parser("python")?;
//! let outline = parser.parse("def main():\n    pass\n");
//! ```
//!
//! ## Testing
//!
//! For outline assertions in tests, see the [testing module](grammar::testing).

pub mod grammar;

pub use grammar::{
    CodeElement, ElementId, ElementType, GrammarError, LanguageGrammar, LanguageRegistry, Outline,
    ParseResult, Result, Token, TokenKind, TokenParser,
};
