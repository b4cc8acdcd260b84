//! Name resolution for the bytecode compiler.
//!
//! The table is an explicit owned stack of scope frames, pushed and
//! popped as the compiler enters and leaves function literals. Resolving
//! a name defined in an enclosing (non-global) frame captures it as a
//! free variable in every frame between definition and use, which is how
//! closures learn what to carry.

use std::collections::HashMap;

use crate::object::builtins::BUILTINS;

/// Where a resolved name lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolScope {
    /// A slot in the VM's globals vector.
    Global,
    /// A slot on the operand stack, relative to the frame base pointer.
    Local,
    /// An index into the fixed builtin registry.
    Builtin,
    /// An index into the running closure's captured free values.
    Free,
    /// The enclosing function's own name; loads the current closure.
    Function,
}

/// A resolved name binding: scope kind plus slot index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Symbol {
    pub name: String,
    pub scope: SymbolScope,
    pub index: usize,
}

/// One lexical scope frame.
#[derive(Debug, Default)]
struct Scope {
    store: HashMap<String, Symbol>,
    num_definitions: usize,
    free_symbols: Vec<Symbol>,
}

/// The scope-frame stack. Index 0 is the global frame and lives for the
/// whole compilation; one frame per function literal above it.
#[derive(Debug)]
pub struct SymbolTable {
    scopes: Vec<Scope>,
}

impl SymbolTable {
    /// A fresh table with only the global frame.
    pub fn new() -> Self {
        Self {
            scopes: vec![Scope::default()],
        }
    }

    /// A fresh table with every builtin pre-registered, the state the
    /// compiler starts from.
    pub fn with_builtins() -> Self {
        let mut table = Self::new();
        for (index, builtin) in BUILTINS.iter().enumerate() {
            table.define_builtin(index, builtin.name);
        }
        table
    }

    /// Push a frame for a function literal.
    pub fn enter_scope(&mut self) {
        self.scopes.push(Scope::default());
    }

    /// Pop the innermost frame, returning its local count and captured
    /// free symbols in capture order.
    pub fn leave_scope(&mut self) -> (usize, Vec<Symbol>) {
        let scope = self.scopes.pop().expect("cannot leave the global scope");
        (scope.num_definitions, scope.free_symbols)
    }

    /// True when only the global frame is active.
    pub fn is_global(&self) -> bool {
        self.scopes.len() == 1
    }

    /// Drop any frames left behind by an aborted compilation. Global
    /// definitions survive; a REPL calls this before reusing the table.
    pub fn truncate_to_global(&mut self) {
        self.scopes.truncate(1);
    }

    /// The number of definitions in the innermost frame.
    pub fn num_definitions(&self) -> usize {
        self.scopes.last().map(|s| s.num_definitions).unwrap_or(0)
    }

    /// Bind a name to the next free slot of the innermost frame.
    /// Redefinition shadows the old symbol but burns a new slot.
    pub fn define(&mut self, name: &str) -> Symbol {
        let scope_kind = if self.is_global() {
            SymbolScope::Global
        } else {
            SymbolScope::Local
        };
        let scope = self.scopes.last_mut().expect("scope stack is never empty");
        let symbol = Symbol {
            name: name.to_string(),
            scope: scope_kind,
            index: scope.num_definitions,
        };
        scope.num_definitions += 1;
        scope.store.insert(name.to_string(), symbol.clone());
        symbol
    }

    /// Register a builtin at a fixed registry index. Idempotent: an
    /// existing binding for the name is returned unchanged.
    pub fn define_builtin(&mut self, index: usize, name: &str) -> Symbol {
        let scope = self.scopes.last_mut().expect("scope stack is never empty");
        if let Some(existing) = scope.store.get(name) {
            return existing.clone();
        }
        let symbol = Symbol {
            name: name.to_string(),
            scope: SymbolScope::Builtin,
            index,
        };
        scope.store.insert(name.to_string(), symbol.clone());
        symbol
    }

    /// Register the enclosing function's own name for self-reference.
    /// A later `define` of the same name (e.g. a parameter) shadows it.
    pub fn define_function_name(&mut self, name: &str) -> Symbol {
        let scope = self.scopes.last_mut().expect("scope stack is never empty");
        let symbol = Symbol {
            name: name.to_string(),
            scope: SymbolScope::Function,
            index: 0,
        };
        scope.store.insert(name.to_string(), symbol.clone());
        symbol
    }

    /// Resolve a name, innermost frame outward. Globals and builtins are
    /// visible everywhere without capture; anything else found in an
    /// outer frame is captured as a free variable of every frame in
    /// between.
    pub fn resolve(&mut self, name: &str) -> Option<Symbol> {
        self.resolve_at(self.scopes.len() - 1, name)
    }

    fn resolve_at(&mut self, depth: usize, name: &str) -> Option<Symbol> {
        if let Some(symbol) = self.scopes[depth].store.get(name) {
            return Some(symbol.clone());
        }
        if depth == 0 {
            return None;
        }

        let outer = self.resolve_at(depth - 1, name)?;
        match outer.scope {
            SymbolScope::Global | SymbolScope::Builtin => Some(outer),
            _ => Some(self.define_free(depth, outer)),
        }
    }

    fn define_free(&mut self, depth: usize, original: Symbol) -> Symbol {
        let scope = &mut self.scopes[depth];
        scope.free_symbols.push(original.clone());

        let symbol = Symbol {
            name: original.name,
            scope: SymbolScope::Free,
            index: scope.free_symbols.len() - 1,
        };
        scope.store.insert(symbol.name.clone(), symbol.clone());
        symbol
    }
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}
