use super::pkg::{PkgRef, SymKind};
use super::LinkError;
use indexmap::{IndexMap, IndexSet};
use log::debug;
use std::collections::VecDeque;
use std::rc::Rc;

/// A (package path, symbol name) reference pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) struct PkgSym {
    pub pkg: String,
    pub sym: String,
}

impl PkgSym {
    pub(crate) fn new(pkg: &str, sym: &str) -> Self {
        PkgSym {
            pkg: pkg.to_string(),
            sym: sym.to_string(),
        }
    }
}

/// Adds a package and, recursively, everything it imports. The map's
/// insertion order is the package order used by layout.
pub(crate) fn add_pkgs(
    pkgs: &mut IndexMap<String, PkgRef>,
    p: &PkgRef,
) -> Result<(), LinkError> {
    let path = p.borrow().path().to_string();
    if let Some(exists) = pkgs.get(&path) {
        if !Rc::ptr_eq(exists, p) {
            return Err(LinkError::PackagePathConflict(path));
        }
        return Ok(());
    }

    pkgs.insert(path, p.clone());
    let imported = p.borrow().imported().to_vec();
    for req in &imported {
        add_pkgs(pkgs, req)?;
    }
    Ok(())
}

/// Walks link sites from the roots and returns every symbol transitively
/// referenced. References into packages outside the closure, or to names a
/// package never declared, stay in the set; they fail later, at fixup.
pub(crate) fn trace_used(
    pkgs: &IndexMap<String, PkgRef>,
    root_path: &str,
    roots: &[String],
) -> IndexSet<PkgSym> {
    let mut used = IndexSet::new();
    let mut queue: VecDeque<PkgSym> = roots
        .iter()
        .map(|sym| PkgSym::new(root_path, sym))
        .collect();

    while let Some(ps) = queue.pop_front() {
        if !used.insert(ps.clone()) {
            continue;
        }

        let Some(pkg) = pkgs.get(&ps.pkg) else {
            continue;
        };
        let pkg = pkg.borrow();
        if pkg.symbol_by_name(&ps.sym) != Some(SymKind::Func) {
            continue;
        }
        if let Some(f) = pkg.func(&ps.sym) {
            for link in f.links() {
                queue.push_back(PkgSym::new(link.pkg(), link.sym()));
            }
        }
    }

    debug!("traced {} used symbols", used.len());
    used
}
