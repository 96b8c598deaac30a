//! Main module for codeshape library functionality
//!
//!     Source text goes through three stages:
//!         1. `lexing`: a rule-driven tokenizer turns text into `Token`s
//!         2. `parsing`: a `LanguageGrammar` walks the tokens, using the `blocks` matchers to
//!            find where declarations end, and fills an `ast::Outline`
//!         3. repair: the outline is normalized so every parent range contains its children
//!
//!     `state`, `context` and `symbols` are the bookkeeping a grammar has available while it
//!     builds. `languages` holds the built-in grammars and the registry that resolves them
//!     by name or file extension. `formats` renders an outline for callers.

pub mod ast;
pub mod blocks;
pub mod config;
pub mod context;
pub mod error;
pub mod formats;
pub mod languages;
pub mod lexing;
pub mod parsing;
pub mod state;
pub mod symbols;
pub mod testing;
pub mod token;

pub use ast::{CodeElement, ElementId, ElementType, Outline};
pub use error::{GrammarError, Result};
pub use languages::LanguageRegistry;
pub use parsing::{LanguageGrammar, ParseResult, TokenParser};
pub use token::{Token, TokenKind};
