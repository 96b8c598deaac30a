//! Fluent assertion API for outlines

use crate::grammar::ast::{CodeElement, ElementId, ElementType, Outline};
use serde_json::Value;

// ============================================================================
// Entry Point
// ============================================================================

/// Create an assertion builder for an outline
pub fn assert_outline(outline: &Outline) -> OutlineAssertion<'_> {
    OutlineAssertion { outline }
}

fn summarize(outline: &Outline, ids: &[ElementId]) -> String {
    ids.iter()
        .map(|&id| outline[id].to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

// ============================================================================
// Outline Assertions
// ============================================================================

pub struct OutlineAssertion<'a> {
    outline: &'a Outline,
}

impl<'a> OutlineAssertion<'a> {
    /// Assert the number of top-level elements
    pub fn root_count(self, expected: usize) -> Self {
        let roots = self.outline.roots();
        assert_eq!(
            roots.len(),
            expected,
            "Expected {} roots, found {}: [{}]",
            expected,
            roots.len(),
            summarize(self.outline, &roots)
        );
        self
    }

    /// Assert the total number of elements
    pub fn element_count(self, expected: usize) -> Self {
        assert_eq!(
            self.outline.len(),
            expected,
            "Expected {} elements, found {}: [{}]",
            expected,
            self.outline.len(),
            summarize(self.outline, &self.outline.walk())
        );
        self
    }

    /// Assert on a top-level element by index
    pub fn root<F>(self, index: usize, assertion: F) -> Self
    where
        F: FnOnce(ElementAssertion<'a>),
    {
        let roots = self.outline.roots();
        assert!(
            index < roots.len(),
            "Root index {} out of bounds (outline has {} roots: [{}])",
            index,
            roots.len(),
            summarize(self.outline, &roots)
        );
        assertion(ElementAssertion {
            outline: self.outline,
            id: roots[index],
            context: format!("roots[{}]", index),
        });
        self
    }

    /// Assert on the first element with the given name, anywhere in the tree
    pub fn named<F>(self, name: &str, assertion: F) -> Self
    where
        F: FnOnce(ElementAssertion<'a>),
    {
        let id = self.outline.find_by_name(name).unwrap_or_else(|| {
            panic!(
                "No element named '{}' in [{}]",
                name,
                summarize(self.outline, &self.outline.walk())
            )
        });
        assertion(ElementAssertion {
            outline: self.outline,
            id,
            context: format!("'{}'", name),
        });
        self
    }

    /// Assert every parent range contains its children's ranges
    pub fn well_nested(self) -> Self {
        for (id, element) in self.outline.iter() {
            if let Some(parent) = element.parent() {
                let parent = &self.outline[parent];
                assert!(
                    parent.contains(element),
                    "{} ({}) escapes its parent {}",
                    element,
                    id,
                    parent
                );
            }
        }
        self
    }
}

// ============================================================================
// Element Assertions
// ============================================================================

pub struct ElementAssertion<'a> {
    outline: &'a Outline,
    id: ElementId,
    context: String,
}

impl<'a> ElementAssertion<'a> {
    fn element(&self) -> &'a CodeElement {
        &self.outline[self.id]
    }

    pub fn element_type(self, expected: ElementType) -> Self {
        let actual = self.element().element_type;
        assert_eq!(
            actual, expected,
            "{}: expected type {}, found {}",
            self.context, expected, actual
        );
        self
    }

    pub fn name(self, expected: &str) -> Self {
        let actual = &self.element().name;
        assert_eq!(
            actual, expected,
            "{}: expected name '{}', found '{}'",
            self.context, expected, actual
        );
        self
    }

    /// Assert the 1-based inclusive line range
    pub fn lines(self, start: usize, end: usize) -> Self {
        let element = self.element();
        assert_eq!(
            (element.start_line, element.end_line),
            (start, end),
            "{}: expected lines {}-{}, found {}-{}",
            self.context,
            start,
            end,
            element.start_line,
            element.end_line
        );
        self
    }

    pub fn child_count(self, expected: usize) -> Self {
        let children = self.outline.children(self.id);
        assert_eq!(
            children.len(),
            expected,
            "{}: expected {} children, found {}: [{}]",
            self.context,
            expected,
            children.len(),
            summarize(self.outline, children)
        );
        self
    }

    pub fn child<F>(self, index: usize, assertion: F) -> Self
    where
        F: FnOnce(ElementAssertion<'a>),
    {
        let children = self.outline.children(self.id);
        assert!(
            index < children.len(),
            "{}: child index {} out of bounds ({} children: [{}])",
            self.context,
            index,
            children.len(),
            summarize(self.outline, children)
        );
        assertion(ElementAssertion {
            outline: self.outline,
            id: children[index],
            context: format!("{}.children[{}]", self.context, index),
        });
        self
    }

    /// Assert a metadata value; strings compare against `Value::String`
    pub fn meta(self, key: &str, expected: impl Into<Value>) -> Self {
        let expected = expected.into();
        let actual = self.element().metadata.get(key);
        assert_eq!(
            actual,
            Some(&expected),
            "{}: expected metadata {} = {}, found {:?}",
            self.context,
            key,
            expected,
            actual
        );
        self
    }

    pub fn no_meta(self, key: &str) -> Self {
        let actual = self.element().metadata.get(key);
        assert!(
            actual.is_none(),
            "{}: expected no metadata {}, found {:?}",
            self.context,
            key,
            actual
        );
        self
    }

    pub fn code_contains(self, fragment: &str) -> Self {
        let code = &self.element().code_text;
        assert!(
            code.contains(fragment),
            "{}: expected code to contain {:?}, found {:?}",
            self.context,
            fragment,
            code
        );
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Outline {
        let mut outline = Outline::new();
        let class = outline.add(
            CodeElement::new(ElementType::Class, "Greeter", 1, 6).with_meta("bases", vec!["Base"]),
        );
        outline.add_child(class, CodeElement::new(ElementType::Method, "greet", 2, 3));
        outline.add_child(class, CodeElement::new(ElementType::Method, "wave", 5, 6));
        outline.add(CodeElement::new(ElementType::Function, "main", 8, 9));
        outline
    }

    #[test]
    fn test_fluent_tree() {
        let outline = sample();
        assert_outline(&outline)
            .root_count(2)
            .element_count(4)
            .well_nested()
            .root(0, |class| {
                class
                    .element_type(ElementType::Class)
                    .name("Greeter")
                    .lines(1, 6)
                    .meta("bases", vec!["Base"])
                    .child_count(2)
                    .child(1, |m| {
                        m.name("wave").lines(5, 6).no_meta("bases");
                    });
            })
            .named("main", |f| {
                f.element_type(ElementType::Function);
            });
    }

    #[test]
    #[should_panic(expected = "roots[0].children[0]: expected name 'wave'")]
    fn test_failure_names_the_path() {
        let outline = sample();
        assert_outline(&outline).root(0, |class| {
            class.child(0, |m| {
                m.name("wave");
            });
        });
    }
}
