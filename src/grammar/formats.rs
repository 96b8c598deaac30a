//! Outline serialization
//!
//!     An `Outline` can be rendered as:
//!         - `json`: a nested tree, pretty printed
//!         - `yaml`: the same tree as YAML
//!         - `treeviz`: one line per element with box-drawing connectors
//!
//!     The structured formats go through `ElementView`, a nested owned copy of the tree that
//!     has no parent back-references, so there is nothing circular to serialize.
//!
//!     Each format implements `Formatter` and is looked up through `FormatRegistry`, the same
//!     way callers resolve a language through the language registry.

pub mod json;
pub mod registry;
pub mod treeviz;
pub mod yaml;

pub use json::JsonFormatter;
pub use registry::{FormatRegistry, Formatter};
pub use treeviz::{to_treeviz_str, TreevizFormatter};
pub use yaml::YamlFormatter;

use crate::grammar::ast::{ElementId, Outline};
use crate::grammar::error::{GrammarError, Result};
use crate::grammar::token::Metadata;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    Json,
    Yaml,
    Treeviz,
}

impl Format {
    pub const ALL: [Format; 3] = [Format::Json, Format::Yaml, Format::Treeviz];

    pub fn as_str(&self) -> &'static str {
        match self {
            Format::Json => "json",
            Format::Yaml => "yaml",
            Format::Treeviz => "treeviz",
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Format {
    type Err = GrammarError;

    fn from_str(s: &str) -> Result<Self> {
        let lowered = s.trim().to_ascii_lowercase();
        Format::ALL
            .iter()
            .copied()
            .find(|f| f.as_str() == lowered)
            .ok_or_else(|| GrammarError::UnknownFormat(s.to_string()))
    }
}

/// What to include in rendered output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderOptions {
    pub show_line_numbers: bool,
    /// Emit `code_text` in the structured formats.
    pub include_code: bool,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            show_line_numbers: true,
            include_code: false,
        }
    }
}

/// Render `outline` with the built-in formatter for `format`.
pub fn render(outline: &Outline, format: Format, options: &RenderOptions) -> Result<String> {
    FormatRegistry::with_defaults().render(outline, format.as_str(), options)
}

/// Owned, parent-free view of one element and its subtree.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ElementView {
    #[serde(rename = "type")]
    pub element_type: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_line: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_line: Option<usize>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: Metadata,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<ElementView>,
}

impl ElementView {
    pub fn build(outline: &Outline, id: ElementId, options: &RenderOptions) -> Self {
        let element = &outline[id];
        let lines = options.show_line_numbers;
        Self {
            element_type: element.element_type.as_str().to_string(),
            name: element.name.clone(),
            start_line: lines.then_some(element.start_line),
            end_line: lines.then_some(element.end_line),
            metadata: element.metadata.clone(),
            code: (options.include_code && !element.code_text.is_empty())
                .then(|| element.code_text.clone()),
            children: outline
                .children(id)
                .iter()
                .map(|&child| Self::build(outline, child, options))
                .collect(),
        }
    }

    /// One view per root, in root order.
    pub fn forest(outline: &Outline, options: &RenderOptions) -> Vec<Self> {
        outline
            .roots()
            .into_iter()
            .map(|root| Self::build(outline, root, options))
            .collect()
    }
}
