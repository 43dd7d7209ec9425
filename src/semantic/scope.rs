use fnv::FnvHashMap;

use super::Symbol;

/// One lexical scope: its bindings in declaration order, its parent, and the
/// named child scopes created under it (cached so that re-entering a scope by
/// name lands on the scope originally built for it).
#[derive(Debug, Clone, Default)]
struct Scope {
    parent: Option<usize>,
    symbols: Vec<Symbol>,
    children: FnvHashMap<String, usize>,
}

/// The scope tree, stored as an arena of scopes addressed by index. The
/// global scope sits at index 0 and is always present. "Re-entering" a saved
/// scope is just a jump to a stored index, so the table the type checker
/// builds can be walked again by the bytecode generator with parameter and
/// local bindings intact.
#[derive(Debug, Clone)]
pub struct SymbolTable {
    scopes: Vec<Scope>,
    current: usize,
    saved: FnvHashMap<String, usize>,
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self {
            scopes: vec![Scope::default()],
            current: 0,
            saved: FnvHashMap::default(),
        }
    }
}

impl SymbolTable {
    /// Declares a symbol in the current scope. Returns false if the name is
    /// already taken in this scope; shadowing an outer scope's name is legal.
    pub fn declare(&mut self, symbol: Symbol) -> bool {
        let scope = &mut self.scopes[self.current];
        if scope.symbols.iter().any(|s| s.name() == symbol.name()) {
            return false;
        }

        scope.symbols.push(symbol);
        true
    }

    /// Resolves a name, searching the current scope and then each enclosing
    /// scope, returning the innermost match.
    pub fn resolve(&self, name: &str) -> Option<&Symbol> {
        let mut scope = Some(self.current);
        while let Some(index) = scope {
            if let Some(symbol) = self.scopes[index].symbols.iter().find(|s| s.name() == name) {
                return Some(symbol);
            }

            scope = self.scopes[index].parent;
        }

        None
    }

    pub fn resolve_mut(&mut self, name: &str) -> Option<&mut Symbol> {
        let mut scope = Some(self.current);
        while let Some(index) = scope {
            if self.scopes[index].symbols.iter().any(|s| s.name() == name) {
                return self.scopes[index].symbols.iter_mut().find(|s| s.name() == name);
            }

            scope = self.scopes[index].parent;
        }

        None
    }

    /// Pushes a fresh anonymous child scope.
    pub fn enter(&mut self) {
        let child = self.new_child();
        self.current = child;
    }

    /// Pushes the child scope cached under `name`, creating it on first use.
    pub fn enter_named(&mut self, name: &str) {
        if let Some(&child) = self.scopes[self.current].children.get(name) {
            self.current = child;
            return;
        }

        let child = self.new_child();
        self.scopes[self.current].children.insert(name.to_string(), child);
        self.current = child;
    }

    /// Pops back to the enclosing scope; a no-op at the global scope.
    pub fn exit(&mut self) {
        if let Some(parent) = self.scopes[self.current].parent {
            self.current = parent;
        }
    }

    /// Associates the current scope with a function name so the generator
    /// can later re-enter exactly the scope the checker built for it.
    pub fn save(&mut self, name: &str) {
        self.saved.insert(name.to_string(), self.current);
    }

    /// Jumps to the scope previously saved under `name`. Returns false if no
    /// scope was saved for that name.
    pub fn restore(&mut self, name: &str) -> bool {
        if let Some(&index) = self.saved.get(name) {
            self.current = index;
            return true;
        }

        false
    }

    fn new_child(&mut self) -> usize {
        self.scopes.push(Scope {
            parent: Some(self.current),
            symbols: Vec::new(),
            children: FnvHashMap::default(),
        });
        self.scopes.len() - 1
    }
}
