use super::Symbol;
use indexmap::IndexMap;

/// A single name → symbol table. Iteration follows insertion order so
/// downstream passes see symbols in declaration order.
#[derive(Debug, Clone, Default)]
pub struct Table<T> {
    syms: IndexMap<String, Symbol<T>>,
}

impl<T> Table<T> {
    pub fn new() -> Self {
        Table {
            syms: IndexMap::new(),
        }
    }

    /// Declares a symbol. Redeclaration is a compiler bug: the front end
    /// checks names before anything reaches a table.
    pub fn declare(&mut self, sym: Symbol<T>) {
        if let Err(sym) = self.try_declare(sym) {
            panic!("redeclared symbol {}", sym.name());
        }
    }

    /// Declares a symbol, handing it back if the name is taken. Front ends
    /// that diagnose redeclarations use this and `query` for the original.
    pub fn try_declare(&mut self, sym: Symbol<T>) -> Result<(), Symbol<T>> {
        if self.syms.contains_key(sym.name()) {
            return Err(sym);
        }
        self.syms.insert(sym.name().to_string(), sym);
        Ok(())
    }

    pub fn query(&self, name: &str) -> Option<&Symbol<T>> {
        self.syms.get(name)
    }

    /// Symbols in insertion order.
    pub fn list(&self) -> impl Iterator<Item = &Symbol<T>> {
        self.syms.values()
    }

    pub fn len(&self) -> usize {
        self.syms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.syms.is_empty()
    }
}

/// A lexical scope: one table plus an optional parent chain. Scopes are
/// created at package/function/block entry and dropped at exit; `push`
/// and `pop` move the chain by value.
#[derive(Debug, Clone, Default)]
pub struct Scope<T> {
    table: Table<T>,
    parent: Option<Box<Scope<T>>>,
}

impl<T> Scope<T> {
    pub fn new() -> Self {
        Scope {
            table: Table::new(),
            parent: None,
        }
    }

    /// A new child scope with the current one as parent.
    pub fn push(self) -> Scope<T> {
        Scope {
            table: Table::new(),
            parent: Some(Box::new(self)),
        }
    }

    /// Drops the current scope and returns to the parent, or `None` at the
    /// root.
    pub fn pop(self) -> Option<Scope<T>> {
        self.parent.map(|parent| *parent)
    }

    /// See [`Table::declare`]: redeclaration within one scope is a bug.
    pub fn declare(&mut self, sym: Symbol<T>) {
        self.table.declare(sym);
    }

    pub fn try_declare(&mut self, sym: Symbol<T>) -> Result<(), Symbol<T>> {
        self.table.try_declare(sym)
    }

    /// Looks the name up here and then up the ancestor chain.
    pub fn query(&self, name: &str) -> Option<&Symbol<T>> {
        if let Some(sym) = self.table.query(name) {
            Some(sym)
        } else if let Some(parent) = &self.parent {
            parent.query(name)
        } else {
            None
        }
    }

    /// Looks the name up in this scope's table only.
    pub fn query_local(&self, name: &str) -> Option<&Symbol<T>> {
        self.table.query(name)
    }

    pub fn table(&self) -> &Table<T> {
        &self.table
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sym::SymbolKind;

    fn sym(name: &str, item: u32) -> Symbol<u32> {
        Symbol::new("p", name, SymbolKind::Var, item, None)
    }

    #[test]
    fn list_preserves_insertion_order() {
        let mut table = Table::new();
        for (i, name) in ["z", "a", "m"].iter().enumerate() {
            table.declare(sym(name, i as u32));
        }
        let names: Vec<_> = table.list().map(|s| s.name()).collect();
        assert_eq!(names, ["z", "a", "m"]);
    }

    #[test]
    fn try_declare_rejects_duplicates() {
        let mut table = Table::new();
        table.declare(sym("x", 0));
        assert!(table.try_declare(sym("x", 1)).is_err());
        assert_eq!(table.query("x").unwrap().item, 0);
    }

    #[test]
    #[should_panic(expected = "redeclared symbol x")]
    fn declare_panics_on_redeclaration() {
        let mut table = Table::new();
        table.declare(sym("x", 0));
        table.declare(sym("x", 1));
    }

    #[test]
    fn query_walks_ancestors_and_query_local_does_not() {
        let mut scope = Scope::new();
        scope.declare(sym("outer", 1));

        let mut scope = scope.push();
        scope.declare(sym("inner", 2));

        assert_eq!(scope.query("inner").unwrap().item, 2);
        assert_eq!(scope.query("outer").unwrap().item, 1);
        assert!(scope.query_local("outer").is_none());

        // shadowing resolves to the nearest declaration
        scope.declare(sym("outer", 3));
        assert_eq!(scope.query("outer").unwrap().item, 3);

        let scope = scope.pop().unwrap();
        assert_eq!(scope.query("outer").unwrap().item, 1);
        assert!(scope.query("inner").is_none());
        assert!(scope.pop().is_none());
    }
}
