//! Parsing
//!
//!     The pipeline every language goes through:
//!         1. tokenize with the grammar's compiled `Tokenizer`
//!         2. build: the grammar walks the tokens inside a `ParseSession` and adds elements
//!         3. repair: `repair::repair` normalizes the element tree
//!
//!     Only step 2 is language specific. Grammars implement `LanguageGrammar` and are driven
//!     by `TokenParser`. `cursor` has the small token-walking helpers the built-in grammars
//!     share.

pub mod cursor;
pub mod grammar;
pub mod parser;
pub mod repair;
pub mod session;

pub use cursor::{compact_text, split_top_level, TokenCursor};
pub use grammar::LanguageGrammar;
pub use parser::{ParseResult, TokenParser};
pub use repair::{repair, RepairReport};
pub use session::{ParseSession, SessionOutput};
