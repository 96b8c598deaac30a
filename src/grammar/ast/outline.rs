//! The outline: an arena of code elements plus the queries callers run against it.
//!
//!     Every element produced by a parse lives in one `Outline` and is addressed by
//!     `ElementId`. Parent/child links are ids, so re-parenting during repair is a matter
//!     of moving ids between lists. `attach` refuses links that would make an element its
//!     own ancestor, which keeps every traversal below finite.
//!
//! Queries
//!
//!     Traversals start at the roots (elements without a parent), ordered by
//!     `(start_line, end_line)`, and visit children in list order. "Innermost" lookups pick
//!     the smallest containing range, and the deepest element on ties.

use super::element::{CodeElement, ElementId, ElementType};
use std::cmp::Reverse;
use std::collections::BTreeMap;
use std::ops::Index;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Outline {
    elements: Vec<CodeElement>,
}

impl Outline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an unlinked element.
    pub fn add(&mut self, mut element: CodeElement) -> ElementId {
        element.parent = None;
        element.children.clear();
        let id = ElementId(self.elements.len());
        self.elements.push(element);
        id
    }

    /// Add an element as the last child of `parent`.
    pub fn add_child(&mut self, parent: ElementId, element: CodeElement) -> ElementId {
        let id = self.add(element);
        self.attach(id, parent);
        id
    }

    /// Link `child` under `parent`, detaching it from any previous parent.
    ///
    /// Returns false (and changes nothing) when the link would create a cycle or either
    /// id is unknown.
    pub fn attach(&mut self, child: ElementId, parent: ElementId) -> bool {
        if child == parent
            || child.0 >= self.elements.len()
            || parent.0 >= self.elements.len()
            || self.is_descendant(parent, child)
        {
            return false;
        }
        self.detach(child);
        self.elements[child.0].parent = Some(parent);
        self.elements[parent.0].children.push(child);
        true
    }

    /// Remove the link between `child` and its parent, on both sides.
    pub fn detach(&mut self, child: ElementId) -> Option<ElementId> {
        let parent = self.elements.get_mut(child.0)?.parent.take()?;
        self.elements[parent.0].children.retain(|&c| c != child);
        Some(parent)
    }

    pub fn get(&self, id: ElementId) -> Option<&CodeElement> {
        self.elements.get(id.0)
    }

    pub fn get_mut(&mut self, id: ElementId) -> Option<&mut CodeElement> {
        self.elements.get_mut(id.0)
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// All elements in creation order.
    pub fn iter(&self) -> impl Iterator<Item = (ElementId, &CodeElement)> + '_ {
        self.elements
            .iter()
            .enumerate()
            .map(|(i, e)| (ElementId(i), e))
    }

    pub fn ids(&self) -> impl Iterator<Item = ElementId> {
        (0..self.elements.len()).map(ElementId)
    }

    /// Elements without a parent, ordered by `(start_line, end_line)`.
    pub fn roots(&self) -> Vec<ElementId> {
        let mut roots: Vec<ElementId> = self
            .iter()
            .filter(|(_, e)| e.parent.is_none())
            .map(|(id, _)| id)
            .collect();
        roots.sort_by_key(|&id| self.sort_key(id));
        roots
    }

    pub fn children(&self, id: ElementId) -> &[ElementId] {
        self.get(id).map(|e| e.children.as_slice()).unwrap_or(&[])
    }

    pub fn parent(&self, id: ElementId) -> Option<ElementId> {
        self.get(id).and_then(|e| e.parent)
    }

    /// Ancestors of `id`, nearest first.
    pub fn ancestors(&self, id: ElementId) -> Vec<ElementId> {
        let mut out = Vec::new();
        let mut next = self.parent(id);
        while let Some(p) = next {
            // attach() prevents cycles; the bound guards against hand-built ones
            if out.len() > self.elements.len() {
                break;
            }
            out.push(p);
            next = self.parent(p);
        }
        out
    }

    pub fn depth(&self, id: ElementId) -> usize {
        self.ancestors(id).len()
    }

    /// Whether `candidate` sits somewhere below `ancestor`.
    pub fn is_descendant(&self, candidate: ElementId, ancestor: ElementId) -> bool {
        self.ancestors(candidate).contains(&ancestor)
    }

    /// Every element below `id`, pre-order.
    pub fn descendants(&self, id: ElementId) -> Vec<ElementId> {
        let mut out = Vec::new();
        let mut stack: Vec<ElementId> = self.children(id).iter().rev().copied().collect();
        while let Some(next) = stack.pop() {
            out.push(next);
            stack.extend(self.children(next).iter().rev());
        }
        out
    }

    /// Every element, pre-order from the roots.
    pub fn walk(&self) -> Vec<ElementId> {
        let mut out = Vec::with_capacity(self.len());
        for root in self.roots() {
            out.push(root);
            out.extend(self.descendants(root));
        }
        out
    }

    /// Dot-joined names from the outermost ancestor down to `id`. Unnamed ancestors are
    /// skipped.
    pub fn full_name(&self, id: ElementId) -> String {
        let mut names: Vec<&str> = self
            .ancestors(id)
            .iter()
            .rev()
            .filter_map(|&a| self.get(a).map(|e| e.name.as_str()))
            .filter(|n| !n.is_empty())
            .collect();
        if let Some(element) = self.get(id) {
            names.push(&element.name);
        }
        names.join(".")
    }

    /// First function or method called `name`.
    pub fn find_function(&self, name: &str) -> Option<ElementId> {
        self.walk().into_iter().find(|&id| {
            let e = &self[id];
            e.element_type.is_callable() && e.name == name
        })
    }

    /// Innermost function or method containing `line`.
    pub fn find_function_at_line(&self, line: usize) -> Option<ElementId> {
        self.innermost(line, |e| e.element_type.is_callable())
    }

    /// Innermost element of any type containing `line`.
    pub fn element_at_line(&self, line: usize) -> Option<ElementId> {
        self.innermost(line, |_| true)
    }

    /// Top-level elements keyed by name. A later declaration replaces an earlier one.
    pub fn globals(&self) -> BTreeMap<&str, ElementId> {
        self.roots()
            .into_iter()
            .map(|id| (self[id].name.as_str(), id))
            .collect()
    }

    /// Functions and methods, pre-order.
    pub fn functions(&self) -> Vec<ElementId> {
        self.of_type(&[ElementType::Function, ElementType::Method])
    }

    /// Elements whose type is one of `types`, pre-order.
    pub fn of_type(&self, types: &[ElementType]) -> Vec<ElementId> {
        self.walk()
            .into_iter()
            .filter(|&id| types.contains(&self[id].element_type))
            .collect()
    }

    /// First element called `name`, pre-order.
    pub fn find_by_name(&self, name: &str) -> Option<ElementId> {
        self.walk().into_iter().find(|&id| self[id].name == name)
    }

    fn innermost<F>(&self, line: usize, accept: F) -> Option<ElementId>
    where
        F: Fn(&CodeElement) -> bool,
    {
        self.iter()
            .filter(|(_, e)| e.contains_line(line) && accept(e))
            .min_by_key(|&(id, e)| (e.span(), Reverse(self.depth(id)), id))
            .map(|(id, _)| id)
    }

    fn sort_key(&self, id: ElementId) -> (usize, usize, ElementId) {
        let e = &self[id];
        (e.start_line, e.end_line, id)
    }

    /// Order every children list by `(start_line, end_line)`.
    pub(crate) fn sort_children(&mut self) {
        for i in 0..self.elements.len() {
            let mut children = std::mem::take(&mut self.elements[i].children);
            children.sort_by_key(|&c| self.sort_key(c));
            self.elements[i].children = children;
        }
    }
}

impl Index<ElementId> for Outline {
    type Output = CodeElement;

    fn index(&self, id: ElementId) -> &CodeElement {
        &self.elements[id.0]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn el(t: ElementType, name: &str, start: usize, end: usize) -> CodeElement {
        CodeElement::new(t, name, start, end)
    }

    fn sample() -> (Outline, ElementId, ElementId, ElementId) {
        let mut outline = Outline::new();
        let class = outline.add(el(ElementType::Class, "Shape", 3, 20));
        let method = outline.add_child(class, el(ElementType::Method, "area", 5, 9));
        outline.add(el(ElementType::Import, "os", 1, 1));
        let func = outline.add(el(ElementType::Function, "main", 22, 30));
        (outline, class, method, func)
    }

    #[test]
    fn test_roots_sorted_by_position() {
        let (outline, class, _, func) = sample();
        let roots = outline.roots();
        assert_eq!(roots.len(), 3);
        assert_eq!(outline[roots[0]].name, "os");
        assert_eq!(&roots[1..], &[class, func]);
    }

    #[test]
    fn test_full_name() {
        let (outline, class, method, _) = sample();
        assert_eq!(outline.full_name(method), "Shape.area");
        assert_eq!(outline.full_name(class), "Shape");
    }

    #[test]
    fn test_find_function() {
        let (outline, _, method, func) = sample();
        assert_eq!(outline.find_function("area"), Some(method));
        assert_eq!(outline.find_function("main"), Some(func));
        assert_eq!(outline.find_function("Shape"), None);
    }

    #[test]
    fn test_line_queries() {
        let (outline, class, method, _) = sample();
        assert_eq!(outline.find_function_at_line(6), Some(method));
        assert_eq!(outline.find_function_at_line(15), None);
        assert_eq!(outline.element_at_line(15), Some(class));
        assert_eq!(outline.element_at_line(6), Some(method));
        assert_eq!(outline.element_at_line(21), None);
    }

    #[test]
    fn test_globals_and_functions() {
        let (outline, class, method, func) = sample();
        let globals = outline.globals();
        assert_eq!(globals.keys().copied().collect::<Vec<_>>(), vec!["Shape", "main", "os"]);
        assert_eq!(globals["Shape"], class);
        assert_eq!(outline.functions(), vec![method, func]);
    }

    #[test]
    fn test_attach_moves_and_refuses_cycles() {
        let (mut outline, class, method, func) = sample();
        assert!(outline.attach(method, func));
        assert!(outline.children(class).is_empty());
        assert_eq!(outline.parent(method), Some(func));

        assert!(!outline.attach(func, method));
        assert!(!outline.attach(func, func));
        assert_eq!(outline.parent(func), None);
    }

    #[test]
    fn test_descendants_pre_order() {
        let mut outline = Outline::new();
        let a = outline.add(el(ElementType::Module, "a", 1, 10));
        let b = outline.add_child(a, el(ElementType::Class, "b", 2, 6));
        let c = outline.add_child(b, el(ElementType::Method, "c", 3, 4));
        let d = outline.add_child(a, el(ElementType::Function, "d", 7, 9));
        assert_eq!(outline.descendants(a), vec![b, c, d]);
        assert_eq!(outline.walk(), vec![a, b, c, d]);
        assert!(outline.is_descendant(c, a));
        assert!(!outline.is_descendant(a, c));
        assert_eq!(outline.depth(c), 2);
    }

    #[test]
    fn test_detach() {
        let (mut outline, class, method, _) = sample();
        assert_eq!(outline.detach(method), Some(class));
        assert_eq!(outline.detach(method), None);
        assert!(outline.children(class).is_empty());
    }
}
