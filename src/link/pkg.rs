use super::func::Func;
use super::var::Var;
use indexmap::IndexMap;
use std::cell::RefCell;
use std::rc::Rc;
use strum::Display;

/// Shared handle to a link-level package. The build system owns the
/// packages; imports hold handles, and path conflicts are detected by
/// handle identity when the closure is computed.
pub type PkgRef = Rc<RefCell<Pkg>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum SymKind {
    Func,
    Var,
}

/// A package on the linker side: declared symbols in declaration order,
/// their definitions, and handles to the imported packages.
#[derive(Debug, Default)]
pub struct Pkg {
    path: String,
    symbols: IndexMap<String, SymKind>,
    funcs: IndexMap<String, Func>,
    vars: IndexMap<String, Var>,
    imported: Vec<PkgRef>,
}

impl Pkg {
    pub fn new(path: impl Into<String>) -> Self {
        Pkg {
            path: path.into(),
            ..Pkg::default()
        }
    }

    pub fn new_ref(path: impl Into<String>) -> PkgRef {
        Rc::new(RefCell::new(Pkg::new(path)))
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Records an import handle. Importing the same instance twice is a
    /// no-op; two instances under one path surface as a path conflict when
    /// the linker computes the closure.
    pub fn import(&mut self, pkg: &PkgRef) {
        if self.imported.iter().any(|p| Rc::ptr_eq(p, pkg)) {
            return;
        }
        self.imported.push(pkg.clone());
    }

    pub fn imported(&self) -> &[PkgRef] {
        &self.imported
    }

    pub fn declare_func(&mut self, name: &str) {
        self.declare(name, SymKind::Func);
        self.funcs.insert(name.to_string(), Func::new());
    }

    pub fn declare_var(&mut self, name: &str) {
        self.declare(name, SymKind::Var);
        self.vars.insert(name.to_string(), Var::default());
    }

    fn declare(&mut self, name: &str, kind: SymKind) {
        if self.symbols.contains_key(name) {
            panic!("redeclared symbol {}.{}", self.path, name);
        }
        self.symbols.insert(name.to_string(), kind);
    }

    pub fn define_func(&mut self, name: &str, f: Func) {
        match self.symbols.get(name) {
            Some(SymKind::Func) => {
                self.funcs.insert(name.to_string(), f);
            }
            _ => panic!("defining undeclared function {}.{}", self.path, name),
        }
    }

    pub fn define_var(&mut self, name: &str, v: Var) {
        match self.symbols.get(name) {
            Some(SymKind::Var) => {
                self.vars.insert(name.to_string(), v);
            }
            _ => panic!("defining undeclared var {}.{}", self.path, name),
        }
    }

    pub fn symbol_by_name(&self, name: &str) -> Option<SymKind> {
        self.symbols.get(name).copied()
    }

    pub fn func(&self, name: &str) -> Option<&Func> {
        self.funcs.get(name)
    }

    pub fn var(&self, name: &str) -> Option<&Var> {
        self.vars.get(name)
    }

    pub(crate) fn func_mut(&mut self, name: &str) -> Option<&mut Func> {
        self.funcs.get_mut(name)
    }

    pub(crate) fn var_mut(&mut self, name: &str) -> Option<&mut Var> {
        self.vars.get_mut(name)
    }

    /// Declared symbol names and kinds in declaration order.
    pub fn symbols(&self) -> impl Iterator<Item = (&str, SymKind)> {
        self.symbols.iter().map(|(name, kind)| (name.as_str(), *kind))
    }
}
