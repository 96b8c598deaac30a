//! Code elements: the named, line-ranged nodes of an outline.

use crate::grammar::token::Metadata;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Handle to an element inside its `Outline`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ElementId(pub(crate) usize);

impl ElementId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElementType {
    Function,
    Method,
    Class,
    Interface,
    Enum,
    Variable,
    Constant,
    Import,
    Module,
    Struct,
    Trait,
    Impl,
    TypeDefinition,
    Decorator,
    Docstring,
    Namespace,
    Unknown,
}

impl ElementType {
    pub const ALL: [ElementType; 17] = [
        ElementType::Function,
        ElementType::Method,
        ElementType::Class,
        ElementType::Interface,
        ElementType::Enum,
        ElementType::Variable,
        ElementType::Constant,
        ElementType::Import,
        ElementType::Module,
        ElementType::Struct,
        ElementType::Trait,
        ElementType::Impl,
        ElementType::TypeDefinition,
        ElementType::Decorator,
        ElementType::Docstring,
        ElementType::Namespace,
        ElementType::Unknown,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ElementType::Function => "function",
            ElementType::Method => "method",
            ElementType::Class => "class",
            ElementType::Interface => "interface",
            ElementType::Enum => "enum",
            ElementType::Variable => "variable",
            ElementType::Constant => "constant",
            ElementType::Import => "import",
            ElementType::Module => "module",
            ElementType::Struct => "struct",
            ElementType::Trait => "trait",
            ElementType::Impl => "impl",
            ElementType::TypeDefinition => "type_definition",
            ElementType::Decorator => "decorator",
            ElementType::Docstring => "docstring",
            ElementType::Namespace => "namespace",
            ElementType::Unknown => "unknown",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|t| t.as_str() == name)
    }

    /// Functions and methods.
    pub fn is_callable(&self) -> bool {
        matches!(self, ElementType::Function | ElementType::Method)
    }

    /// Types whose nested functions are methods.
    pub fn has_methods(&self) -> bool {
        matches!(
            self,
            ElementType::Class
                | ElementType::Struct
                | ElementType::Interface
                | ElementType::Impl
                | ElementType::Trait
        )
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A structural node. Links are ids into the owning `Outline`: a parent owns its
/// `children` list, `parent` is a back-reference.
#[derive(Debug, Clone, PartialEq)]
pub struct CodeElement {
    pub element_type: ElementType,
    pub name: String,
    pub start_line: usize,
    pub end_line: usize,
    pub code_text: String,
    pub metadata: Metadata,
    pub(crate) parent: Option<ElementId>,
    pub(crate) children: Vec<ElementId>,
}

impl CodeElement {
    pub fn new(
        element_type: ElementType,
        name: impl Into<String>,
        start_line: usize,
        end_line: usize,
    ) -> Self {
        Self {
            element_type,
            name: name.into(),
            start_line,
            end_line: end_line.max(start_line),
            code_text: String::new(),
            metadata: Metadata::new(),
            parent: None,
            children: Vec::new(),
        }
    }

    pub fn with_code(mut self, code_text: impl Into<String>) -> Self {
        self.code_text = code_text.into();
        self
    }

    pub fn with_meta(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }

    pub fn parent(&self) -> Option<ElementId> {
        self.parent
    }

    pub fn children(&self) -> &[ElementId] {
        &self.children
    }

    pub fn contains_line(&self, line: usize) -> bool {
        self.start_line <= line && line <= self.end_line
    }

    /// Whether this element's line range contains `other`'s.
    pub fn contains(&self, other: &CodeElement) -> bool {
        self.start_line <= other.start_line && other.end_line <= self.end_line
    }

    /// Number of lines spanned, minus one. Used to rank candidate parents.
    pub fn span(&self) -> usize {
        self.end_line.saturating_sub(self.start_line)
    }

    pub fn meta_str(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).and_then(serde_json::Value::as_str)
    }
}

impl fmt::Display for CodeElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}('{}', lines {}-{})",
            self.element_type, self.name, self.start_line, self.end_line
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_element_type_names_round_trip() {
        for t in ElementType::ALL {
            assert_eq!(ElementType::parse(t.as_str()), Some(t));
        }
        assert_eq!(ElementType::parse("contract"), None);
        assert_eq!(ElementType::TypeDefinition.to_string(), "type_definition");
    }

    #[test]
    fn test_contains() {
        let class = CodeElement::new(ElementType::Class, "A", 1, 10);
        let method = CodeElement::new(ElementType::Method, "m", 2, 4);
        assert!(class.contains(&method));
        assert!(!method.contains(&class));
        assert!(class.contains_line(10));
        assert!(!class.contains_line(11));
    }

    #[test]
    fn test_end_line_never_before_start() {
        let e = CodeElement::new(ElementType::Function, "f", 5, 3);
        assert_eq!(e.end_line, 5);
        assert_eq!(e.span(), 0);
    }

    #[test]
    fn test_display_and_metadata() {
        let e = CodeElement::new(ElementType::Function, "f", 1, 3).with_meta("parameters", "(a, b)");
        assert_eq!(e.to_string(), "function('f', lines 1-3)");
        assert_eq!(e.meta_str("parameters"), Some("(a, b)"));
    }
}
