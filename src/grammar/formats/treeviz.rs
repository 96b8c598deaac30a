//! Treeviz formatter for outlines
//!
//! One line per element, nesting drawn with box connectors:
//!
//!     ├─ import os [1]
//!     ├─ class Shape [3-20]
//!     │ ├─ method area [5-9]
//!     │ └─ method scale [11-20]
//!     └─ function main [22-30]
//!
//! The label is `<type> <name>`, names are truncated to 40 characters and unnamed elements
//! show `<anonymous>`. Single-line elements print one line number.

use super::{Formatter, RenderOptions};
use crate::grammar::ast::{ElementId, Outline};
use crate::grammar::error::Result;

fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() > max_chars {
        let mut truncated = s.chars().take(max_chars).collect::<String>();
        truncated.push_str("...");
        truncated
    } else {
        s.to_string()
    }
}

pub fn to_treeviz_str(outline: &Outline, options: &RenderOptions) -> String {
    let mut result = String::new();
    append_children(&mut result, outline, &outline.roots(), "", options);
    result
}

fn append_element(
    result: &mut String,
    outline: &Outline,
    id: ElementId,
    prefix: &str,
    is_last: bool,
    options: &RenderOptions,
) {
    let element = &outline[id];
    let connector = if is_last { "└─" } else { "├─" };
    let name = if element.name.is_empty() {
        "<anonymous>".to_string()
    } else {
        truncate(&element.name, 40)
    };

    result.push_str(&format!("{}{} {} {}", prefix, connector, element.element_type, name));
    if options.show_line_numbers {
        if element.start_line == element.end_line {
            result.push_str(&format!(" [{}]", element.start_line));
        } else {
            result.push_str(&format!(" [{}-{}]", element.start_line, element.end_line));
        }
    }
    result.push('\n');

    let new_prefix = format!("{}{}", prefix, if is_last { "  " } else { "│ " });
    append_children(result, outline, outline.children(id), &new_prefix, options);
}

fn append_children(
    result: &mut String,
    outline: &Outline,
    children: &[ElementId],
    prefix: &str,
    options: &RenderOptions,
) {
    for (i, &child) in children.iter().enumerate() {
        let is_last = i == children.len() - 1;
        append_element(result, outline, child, prefix, is_last, options);
    }
}

pub struct TreevizFormatter;

impl Formatter for TreevizFormatter {
    fn name(&self) -> &str {
        "treeviz"
    }

    fn serialize(&self, outline: &Outline, options: &RenderOptions) -> Result<String> {
        Ok(to_treeviz_str(outline, options))
    }

    fn description(&self) -> &str {
        "One line per element with tree connectors"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::ast::{CodeElement, ElementType};

    fn sample() -> Outline {
        let mut outline = Outline::new();
        outline.add(CodeElement::new(ElementType::Import, "os", 1, 1));
        let class = outline.add(CodeElement::new(ElementType::Class, "Shape", 3, 20));
        outline.add_child(class, CodeElement::new(ElementType::Method, "area", 5, 9));
        outline.add_child(class, CodeElement::new(ElementType::Method, "scale", 11, 20));
        outline.add(CodeElement::new(ElementType::Function, "main", 22, 30));
        outline
    }

    #[test]
    fn test_treeviz_connectors() {
        let out = to_treeviz_str(&sample(), &RenderOptions::default());
        assert_eq!(
            out,
            "├─ import os [1]\n\
             ├─ class Shape [3-20]\n\
             │ ├─ method area [5-9]\n\
             │ └─ method scale [11-20]\n\
             └─ function main [22-30]\n"
        );
    }

    #[test]
    fn test_treeviz_without_line_numbers() {
        let mut outline = Outline::new();
        let f = outline.add(CodeElement::new(ElementType::Function, "", 1, 4));
        outline.add_child(f, CodeElement::new(ElementType::Function, "inner", 2, 3));
        let options = RenderOptions {
            show_line_numbers: false,
            include_code: false,
        };
        assert_eq!(
            to_treeviz_str(&outline, &options),
            "└─ function <anonymous>\n  └─ function inner\n"
        );
    }

    #[test]
    fn test_truncate_long_names() {
        assert_eq!(truncate("abcdef", 3), "abc...");
        assert_eq!(truncate("abc", 3), "abc");
    }
}
