//! Testing utilities
//!
//!     `assert_outline` checks a whole element tree in one fluent expression, with failure
//!     messages that name the path to the element that differed:
//!
//!         assert_outline(&outline)
//!             .root_count(1)
//!             .root(0, |class| {
//!                 class
//!                     .element_type(ElementType::Class)
//!                     .name("Greeter")
//!                     .lines(1, 6)
//!                     .child(0, |m| {
//!                         m.element_type(ElementType::Method).name("greet");
//!                     });
//!             });
//!
//!     Roots and children are visited in outline order (start line, then end line).

pub mod assertions;

pub use assertions::{assert_outline, ElementAssertion, OutlineAssertion};
