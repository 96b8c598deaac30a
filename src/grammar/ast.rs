//! Structural output
//!
//!     `CodeElement` is the node type: a kind (function, class, ...), a name and a 1-based
//!     inclusive line range, plus the source text of those lines and open metadata
//!     (`parameters`, `return_type`, `visibility`, ...). Elements are stored in an `Outline`
//!     arena, which owns the parent/child links and answers lookups such as "which function
//!     contains line N".
//!
//!     After a parse has gone through repair, every parent range contains its children's
//!     ranges.

pub mod element;
pub mod outline;

pub use element::{CodeElement, ElementId, ElementType};
pub use outline::Outline;
