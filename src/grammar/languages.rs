//! Built-in language grammars
//!
//!     One grammar per block style:
//!         - `brace`: `{ ... }` languages, in three dialects (C family, Rust, JavaScript)
//!         - `indentation`: Python
//!         - `keyword`: Ruby
//!
//!     `LanguageRegistry` maps names, aliases and file extensions to grammars. Adding a
//!     language means implementing `LanguageGrammar` and registering it; the parser itself
//!     does not change.

pub mod brace;
pub mod indentation;
pub mod keyword;
pub mod registry;

pub use brace::{BraceDialect, BraceGrammar};
pub use indentation::PythonGrammar;
pub use keyword::RubyGrammar;
pub use registry::LanguageRegistry;
