//! Format registry for outline serialization
//!
//! Each format implements the `Formatter` trait and is registered by name with
//! `FormatRegistry`.

use super::RenderOptions;
use crate::grammar::ast::Outline;
use crate::grammar::error::{GrammarError, Result};
use std::collections::HashMap;

/// Serializes an outline to a string representation.
pub trait Formatter: Send + Sync {
    /// The name of this format (e.g., "treeviz", "json")
    fn name(&self) -> &str;

    fn serialize(&self, outline: &Outline, options: &RenderOptions) -> Result<String>;

    fn description(&self) -> &str {
        ""
    }
}

/// Registry of outline formatters, keyed by name.
pub struct FormatRegistry {
    formatters: HashMap<String, Box<dyn Formatter>>,
}

impl FormatRegistry {
    pub fn new() -> Self {
        FormatRegistry {
            formatters: HashMap::new(),
        }
    }

    /// Register a formatter, replacing one with the same name.
    pub fn register<F: Formatter + 'static>(&mut self, formatter: F) {
        self.formatters
            .insert(formatter.name().to_string(), Box::new(formatter));
    }

    pub fn get(&self, name: &str) -> Option<&dyn Formatter> {
        self.formatters.get(name).map(|f| f.as_ref())
    }

    pub fn has(&self, name: &str) -> bool {
        self.formatters.contains_key(name)
    }

    /// Serialize `outline` with the formatter registered as `format`.
    pub fn render(&self, outline: &Outline, format: &str, options: &RenderOptions) -> Result<String> {
        let formatter = self
            .get(format)
            .ok_or_else(|| GrammarError::UnknownFormat(format.to_string()))?;
        formatter.serialize(outline, options)
    }

    /// Registered format names, sorted.
    pub fn list_formats(&self) -> Vec<String> {
        let mut names: Vec<_> = self.formatters.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(super::JsonFormatter);
        registry.register(super::YamlFormatter);
        registry.register(super::TreevizFormatter);
        registry
    }
}

impl Default for FormatRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}
