//! Symbol table
//!
//!     A tree of lexical scopes, each holding uniquely named symbols. `enter_scope` creates
//!     a child of the current scope and makes it current; `exit_scope` returns to the
//!     scope that was current before. Adding a symbol whose name already exists in the
//!     current scope replaces it (last declaration wins). Lookup walks from the current
//!     scope outwards unless asked to stay local.
//!
//!     Scopes are never removed while the table lives, so the whole tree can be reported
//!     after parsing (`get_all_symbols`, `get_symbols_by_scope`).

use crate::grammar::token::Metadata;
use serde::Serialize;
use std::collections::BTreeMap;

/// Handle to a scope inside its `SymbolTable`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScopeId(usize);

impl ScopeId {
    pub const GLOBAL: ScopeId = ScopeId(0);
}

/// A named declaration.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Symbol {
    pub name: String,
    pub symbol_type: String,
    /// Byte offset of the declaration.
    pub position: usize,
    pub line: usize,
    pub column: usize,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: Metadata,
}

#[derive(Debug, Clone)]
pub struct Scope {
    pub scope_type: String,
    pub metadata: Metadata,
    parent: Option<ScopeId>,
    children: Vec<ScopeId>,
    symbols: BTreeMap<String, Symbol>,
}

impl Scope {
    fn new(scope_type: &str, parent: Option<ScopeId>) -> Self {
        Self {
            scope_type: scope_type.to_string(),
            metadata: Metadata::new(),
            parent,
            children: Vec::new(),
            symbols: BTreeMap::new(),
        }
    }

    pub fn get_symbol(&self, name: &str) -> Option<&Symbol> {
        self.symbols.get(name)
    }

    /// Symbols of this scope, ordered by name.
    pub fn symbols(&self) -> impl Iterator<Item = &Symbol> {
        self.symbols.values()
    }

    pub fn parent(&self) -> Option<ScopeId> {
        self.parent
    }

    pub fn children(&self) -> &[ScopeId] {
        &self.children
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }
}

/// One scope's entry in `SymbolTable::get_symbols_by_scope`.
#[derive(Debug, Clone, PartialEq)]
pub struct ScopeSymbols<'a> {
    pub scope: ScopeId,
    pub scope_type: &'a str,
    pub depth: usize,
    pub symbols: Vec<&'a Symbol>,
}

#[derive(Debug, Clone)]
pub struct SymbolTable {
    scopes: Vec<Scope>,
    current: ScopeId,
    stack: Vec<ScopeId>,
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}

impl SymbolTable {
    pub fn new() -> Self {
        Self {
            scopes: vec![Scope::new("global", None)],
            current: ScopeId::GLOBAL,
            stack: Vec::new(),
        }
    }

    /// Open a child scope of the current scope and make it current.
    pub fn enter_scope(&mut self, scope_type: &str) -> ScopeId {
        let id = ScopeId(self.scopes.len());
        self.scopes.push(Scope::new(scope_type, Some(self.current)));
        self.scopes[self.current.0].children.push(id);
        self.stack.push(self.current);
        self.current = id;
        id
    }

    /// Return to the previous scope. Returns the scope that was exited; at the global
    /// scope this is a no-op that returns the global scope.
    pub fn exit_scope(&mut self) -> ScopeId {
        let exited = self.current;
        self.current = self.stack.pop().unwrap_or(ScopeId::GLOBAL);
        exited
    }

    /// Exit every open scope.
    pub fn close_all(&mut self) {
        self.stack.clear();
        self.current = ScopeId::GLOBAL;
    }

    /// Declare `name` in the current scope, replacing a same-named symbol there.
    pub fn add_symbol(
        &mut self,
        name: &str,
        symbol_type: &str,
        position: usize,
        line: usize,
        column: usize,
        metadata: Metadata,
    ) -> &Symbol {
        let symbol = Symbol {
            name: name.to_string(),
            symbol_type: symbol_type.to_string(),
            position,
            line,
            column,
            metadata,
        };
        let symbols = &mut self.scopes[self.current.0].symbols;
        symbols.insert(name.to_string(), symbol);
        &symbols[name]
    }

    /// Find `name` in the current scope, then (unless `local_only`) in enclosing scopes.
    pub fn lookup_symbol(&self, name: &str, local_only: bool) -> Option<&Symbol> {
        let mut scope = Some(self.current);
        while let Some(id) = scope {
            let current = &self.scopes[id.0];
            if let Some(symbol) = current.get_symbol(name) {
                return Some(symbol);
            }
            if local_only {
                return None;
            }
            scope = current.parent;
        }
        None
    }

    pub fn current_scope_id(&self) -> ScopeId {
        self.current
    }

    pub fn current_scope(&self) -> &Scope {
        &self.scopes[self.current.0]
    }

    pub fn current_scope_mut(&mut self) -> &mut Scope {
        &mut self.scopes[self.current.0]
    }

    pub fn global_scope(&self) -> &Scope {
        &self.scopes[0]
    }

    pub fn scope(&self, id: ScopeId) -> Option<&Scope> {
        self.scopes.get(id.0)
    }

    /// Number of open scopes above the global scope.
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// Every symbol in the table: scopes in pre-order, names sorted within a scope.
    pub fn get_all_symbols(&self) -> Vec<&Symbol> {
        self.get_symbols_by_scope()
            .into_iter()
            .flat_map(|entry| entry.symbols)
            .collect()
    }

    /// One entry per scope, pre-order, with the scope's nesting depth.
    pub fn get_symbols_by_scope(&self) -> Vec<ScopeSymbols<'_>> {
        let mut out = Vec::with_capacity(self.scopes.len());
        let mut stack = vec![(ScopeId::GLOBAL, 0usize)];
        while let Some((id, depth)) = stack.pop() {
            let scope = &self.scopes[id.0];
            out.push(ScopeSymbols {
                scope: id,
                scope_type: &scope.scope_type,
                depth,
                symbols: scope.symbols().collect(),
            });
            stack.extend(scope.children.iter().rev().map(|&c| (c, depth + 1)));
        }
        out
    }
}
