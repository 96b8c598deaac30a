//! Context tracking
//!
//!     A single tree of parsing contexts ("inside a class body", "inside a function", "inside
//!     a loop"). Entering a context appends a child under the current node and descends into
//!     it; exiting stamps the end offset and moves back up. The path from the root to the
//!     current node is the stack of open contexts, so "am I inside X" is an ancestor walk
//!     from the current node, and the full tree stays navigable once parsing is done.
//!
//!     Contexts live in an arena owned by the tracker and are addressed by `ContextId`.
//!     The root is a synthetic context of kind `root` that is never exited.

use crate::grammar::token::Metadata;
use tracing::trace;

/// Handle to a context inside its `ContextTracker`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContextId(usize);

impl ContextId {
    pub const ROOT: ContextId = ContextId(0);

    pub fn index(self) -> usize {
        self.0
    }
}

/// Kind of the synthetic root context.
pub const ROOT_KIND: &str = "root";

/// A region of source the parser is (or was) inside.
#[derive(Debug, Clone, PartialEq)]
pub struct Context {
    pub kind: String,
    pub name: Option<String>,
    pub metadata: Metadata,
    pub parent: Option<ContextId>,
    pub children: Vec<ContextId>,
    /// Byte offset where the context was entered.
    pub start: usize,
    /// Byte offset where the context was exited; `None` while open.
    pub end: Option<usize>,
}

impl Context {
    fn new(kind: &str, name: Option<&str>, metadata: Metadata, start: usize) -> Self {
        Self {
            kind: kind.to_string(),
            name: name.map(str::to_string),
            metadata,
            parent: None,
            children: Vec::new(),
            start,
            end: None,
        }
    }

    pub fn is_open(&self) -> bool {
        self.end.is_none()
    }
}

#[derive(Debug, Clone)]
pub struct ContextTracker {
    contexts: Vec<Context>,
    current: ContextId,
}

impl Default for ContextTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl ContextTracker {
    pub fn new() -> Self {
        Self {
            contexts: vec![Context::new(ROOT_KIND, None, Metadata::new(), 0)],
            current: ContextId::ROOT,
        }
    }

    /// Drop every context and start again from an empty root.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Open a child of the current context and make it current.
    pub fn enter_context(
        &mut self,
        kind: &str,
        name: Option<&str>,
        metadata: Metadata,
        start: usize,
    ) -> ContextId {
        let id = ContextId(self.contexts.len());
        let mut context = Context::new(kind, name, metadata, start);
        context.parent = Some(self.current);
        self.contexts.push(context);
        self.contexts[self.current.0].children.push(id);
        self.current = id;
        trace!(kind, ?name, start, depth = self.depth(), "entered context");
        id
    }

    /// Close the current context at `end` and move to its parent.
    ///
    /// Returns the new current context, or `None` (and does nothing) at the root.
    pub fn exit_context(&mut self, end: usize) -> Option<ContextId> {
        let parent = self.contexts[self.current.0].parent?;
        self.contexts[self.current.0].end = Some(end);
        self.current = parent;
        Some(parent)
    }

    /// Force-close every open context at `end`.
    pub fn close_all(&mut self, end: usize) {
        while self.exit_context(end).is_some() {}
    }

    pub fn current_id(&self) -> ContextId {
        self.current
    }

    pub fn current(&self) -> &Context {
        &self.contexts[self.current.0]
    }

    pub fn current_mut(&mut self) -> &mut Context {
        &mut self.contexts[self.current.0]
    }

    pub fn root(&self) -> &Context {
        &self.contexts[0]
    }

    pub fn get(&self, id: ContextId) -> Option<&Context> {
        self.contexts.get(id.0)
    }

    pub fn get_mut(&mut self, id: ContextId) -> Option<&mut Context> {
        self.contexts.get_mut(id.0)
    }

    pub fn children(&self, id: ContextId) -> &[ContextId] {
        self.contexts
            .get(id.0)
            .map(|c| c.children.as_slice())
            .unwrap_or(&[])
    }

    /// Number of contexts ever entered, root excluded.
    pub fn len(&self) -> usize {
        self.contexts.len() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of open contexts above the root.
    pub fn depth(&self) -> usize {
        self.ancestors().count()
    }

    /// Open contexts from the current one up to (not including) the root.
    fn ancestors(&self) -> impl Iterator<Item = &Context> + '_ {
        let mut next = Some(self.current);
        std::iter::from_fn(move || {
            let id = next?;
            let context = &self.contexts[id.0];
            context.parent?;
            next = context.parent;
            Some(context)
        })
    }

    /// Open contexts in root-to-current order, root excluded.
    pub fn get_context_stack(&self) -> Vec<&Context> {
        let mut stack: Vec<&Context> = self.ancestors().collect();
        stack.reverse();
        stack
    }

    /// Nearest open context of the given kind.
    pub fn get_context_of_type(&self, kind: &str) -> Option<&Context> {
        self.ancestors().find(|c| c.kind == kind)
    }

    /// Whether any open context matches one of `kinds`.
    pub fn is_in_context(&self, kinds: &[&str]) -> bool {
        self.ancestors().any(|c| kinds.contains(&c.kind.as_str()))
    }

    /// Kind of the current context, `"code"` at the root.
    pub fn get_current_context_type(&self) -> &str {
        if self.current == ContextId::ROOT {
            "code"
        } else {
            &self.current().kind
        }
    }

    /// Every context entered so far, in entry order, root excluded.
    pub fn iter(&self) -> impl Iterator<Item = (ContextId, &Context)> + '_ {
        self.contexts
            .iter()
            .enumerate()
            .skip(1)
            .map(|(i, c)| (ContextId(i), c))
    }
}
