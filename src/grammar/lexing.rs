//! Lexing
//!
//!     Rule-driven tokenization shared by every language grammar.
//!
//!     A language describes its lexical surface as data: a keyword set, an operator table
//!     (lexeme -> kind) and extra rules for literals and comments. `TokenizerBuilder` turns
//!     that description into a `Tokenizer`; see `tokenizer` for the rule order and the
//!     unknown-character fallback, and `rules` for how patterns are anchored.
//!
//!     Strings and comments are recognized by rules, so delimiters inside them never surface
//!     as delimiter tokens. The block matchers rely on this.

pub mod detokenizer;
pub mod rules;
pub mod tokenizer;

pub use detokenizer::detokenize;
pub use rules::{default_rules, RuleFlags, RuleMatch, TokenRule, Transform, DEFAULT_PATTERNS};
pub use tokenizer::{Tokenizer, TokenizerBuilder};
