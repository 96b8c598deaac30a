//! JSON rendering: a top-level array of nested element objects.

use super::{ElementView, Formatter, RenderOptions};
use crate::grammar::ast::Outline;
use crate::grammar::error::{GrammarError, Result};

pub struct JsonFormatter;

impl Formatter for JsonFormatter {
    fn name(&self) -> &str {
        "json"
    }

    fn serialize(&self, outline: &Outline, options: &RenderOptions) -> Result<String> {
        let forest = ElementView::forest(outline, options);
        serde_json::to_string_pretty(&forest).map_err(|e| GrammarError::Render {
            format: self.name().to_string(),
            message: e.to_string(),
        })
    }

    fn description(&self) -> &str {
        "Nested element tree as JSON"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::ast::{CodeElement, ElementType};
    use serde_json::{json, Value};

    #[test]
    fn test_nested_json() {
        let mut outline = Outline::new();
        let class = outline.add(CodeElement::new(ElementType::Class, "Point", 1, 5));
        outline.add_child(
            class,
            CodeElement::new(ElementType::Method, "norm", 2, 4)
                .with_meta("parameters", json!("self")),
        );

        let out = JsonFormatter
            .serialize(&outline, &RenderOptions::default())
            .unwrap();
        let value: Value = serde_json::from_str(&out).unwrap();
        assert_eq!(
            value,
            json!([{
                "type": "class",
                "name": "Point",
                "start_line": 1,
                "end_line": 5,
                "children": [{
                    "type": "method",
                    "name": "norm",
                    "start_line": 2,
                    "end_line": 4,
                    "metadata": {"parameters": "self"}
                }]
            }])
        );
    }

    #[test]
    fn test_empty_outline() {
        let out = JsonFormatter
            .serialize(&Outline::new(), &RenderOptions::default())
            .unwrap();
        assert_eq!(out, "[]");
    }
}
