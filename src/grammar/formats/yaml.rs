//! YAML rendering of the same tree the JSON formatter emits.

use super::{ElementView, Formatter, RenderOptions};
use crate::grammar::ast::Outline;
use crate::grammar::error::{GrammarError, Result};

pub struct YamlFormatter;

impl Formatter for YamlFormatter {
    fn name(&self) -> &str {
        "yaml"
    }

    fn serialize(&self, outline: &Outline, options: &RenderOptions) -> Result<String> {
        let forest = ElementView::forest(outline, options);
        serde_yaml::to_string(&forest).map_err(|e| GrammarError::Render {
            format: self.name().to_string(),
            message: e.to_string(),
        })
    }

    fn description(&self) -> &str {
        "Nested element tree as YAML"
    }
}
