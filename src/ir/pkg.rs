use super::func::Func;
use super::names::NameGen;
use super::op::FuncSig;
use super::refs::Ref;
use super::str_pool::StrPool;
use crate::arch::REG_SIZE;
use crate::link;
use indexmap::IndexMap;
use log::trace;

#[derive(Debug, Clone, Copy)]
struct GlobalSlot {
    size: i32,
    reg_aligned: bool,
}

/// A package under construction: functions, global variables and string
/// constants, all in declaration order.
#[derive(Debug)]
pub struct Pkg {
    path: String,
    funcs: IndexMap<String, Func>,
    globals: IndexMap<String, GlobalSlot>,
    strs: StrPool,
    names: NameGen,
}

impl Pkg {
    pub fn new(path: impl Into<String>) -> Self {
        let path = path.into();
        Pkg {
            strs: StrPool::new(path.clone()),
            funcs: IndexMap::new(),
            globals: IndexMap::new(),
            names: NameGen::new(),
            path,
        }
    }

    /// Like [`Pkg::new`], with a seeded anonymous-name generator so test
    /// builds produce stable names.
    pub fn with_name_seed(path: impl Into<String>, seed: u64) -> Self {
        Pkg {
            names: NameGen::with_seed(seed),
            ..Pkg::new(path)
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Declares a global variable and returns a ref to it. The blank name
    /// `_` receives a fresh anonymous name.
    pub fn new_global_var(
        &mut self,
        size: i32,
        name: &str,
        is_byte: bool,
        reg_aligned: bool,
    ) -> Ref {
        assert!(size > 0, "global var must have a size");
        let name = if name == "_" {
            self.names.fresh()
        } else {
            name.to_string()
        };
        if self.globals.contains_key(&name) {
            panic!("redeclared global {}.{}", self.path, name);
        }

        trace!("global var {}.{} ({size} bytes)", self.path, name);
        self.globals.insert(
            name.clone(),
            GlobalSlot { size, reg_aligned },
        );
        Ref::Global {
            pkg: self.path.clone(),
            name,
            size,
            is_byte,
            reg_aligned,
        }
    }

    /// Declares a function and returns it for building.
    pub fn new_func(&mut self, name: &str, sig: FuncSig) -> &mut Func {
        if self.funcs.contains_key(name) {
            panic!("redeclared function {}.{}", self.path, name);
        }
        trace!("func {}.{}", self.path, name);
        self.funcs
            .entry(name.to_string())
            .or_insert_with(|| Func::new(sig))
    }

    pub fn func(&self, name: &str) -> Option<&Func> {
        self.funcs.get(name)
    }

    pub fn func_mut(&mut self, name: &str) -> Option<&mut Func> {
        self.funcs.get_mut(name)
    }

    /// A ref to one of this package's functions, for call sites.
    pub fn func_ref(&self, name: &str) -> Ref {
        assert!(
            self.funcs.contains_key(name),
            "unknown function {}.{}",
            self.path,
            name
        );
        Ref::Func {
            pkg: self.path.clone(),
            name: name.to_string(),
        }
    }

    /// Interns a string literal. Equal literals share one handle; the ref
    /// is a pointer-plus-length pair.
    pub fn new_string(&mut self, lit: &str) -> Ref {
        Ref::Str(self.strs.add(lit))
    }

    pub fn str_pool(&self) -> &StrPool {
        &self.strs
    }

    /// Declares everything into a link package: functions by name, global
    /// vars as zero-filled vars of their size, and string constants as
    /// byte vars under their padded pool names. Function bodies are
    /// emitted separately.
    pub fn declare_to(&mut self, lib: &mut link::Pkg) {
        assert_eq!(lib.path(), self.path, "package name mismatch");

        for name in self.funcs.keys() {
            lib.declare_func(name);
        }
        for (name, slot) in &self.globals {
            let align = if slot.reg_aligned { REG_SIZE as u32 } else { 1 };
            let mut v = link::Var::new(align);
            v.zeros(slot.size as u32);
            lib.declare_var(name);
            lib.define_var(name, v);
        }
        self.strs.declare(lib);
    }

    pub(crate) fn emit_parts(
        &mut self,
    ) -> (&str, &StrPool, &mut IndexMap<String, Func>) {
        (&self.path, &self.strs, &mut self.funcs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_globals_get_anonymous_names() {
        let mut pkg = Pkg::with_name_seed("p", 1);
        let a = pkg.new_global_var(4, "_", false, true);
        let b = pkg.new_global_var(4, "_", false, true);

        let (Ref::Global { name: na, .. }, Ref::Global { name: nb, .. }) =
            (&a, &b)
        else {
            panic!("globals must be global refs");
        };
        assert_ne!(na, nb);
        assert!(na.starts_with("_:"));
    }

    #[test]
    fn declare_to_populates_the_link_package() {
        let mut pkg = Pkg::new("p");
        pkg.new_func("main", FuncSig::void());
        pkg.new_global_var(8, "buf", false, true);
        pkg.new_string("hi");
        pkg.new_string("hi");

        let mut lib = link::Pkg::new("p");
        pkg.declare_to(&mut lib);

        assert_eq!(lib.symbol_by_name("main"), Some(link::SymKind::Func));
        assert_eq!(lib.symbol_by_name("buf"), Some(link::SymKind::Var));
        assert!(lib.var("buf").unwrap().is_zeros());
        assert_eq!(lib.var("buf").unwrap().size(), 8);

        // the pool deduplicated, so exactly one string var exists
        assert_eq!(lib.var(":str_0").unwrap().bytes(), b"hi");
        assert!(lib.var(":str_1").is_none());
    }

    #[test]
    #[should_panic(expected = "redeclared global p.g")]
    fn redeclared_global_is_a_bug() {
        let mut pkg = Pkg::new("p");
        pkg.new_global_var(4, "g", false, true);
        pkg.new_global_var(4, "g", false, true);
    }
}
