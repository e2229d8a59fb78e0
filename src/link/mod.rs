//! The relocatable linker: computes the package closure, traces the
//! symbols reachable from a start function, lays out code and data, and
//! writes a sectioned binary image with every link site patched.

pub mod func;
pub mod pkg;
pub mod var;

mod layout;
mod trace;
mod writer;

pub use func::{Fill, Func, LinkSite};
pub use pkg::{Pkg, PkgRef, SymKind};
pub use var::Var;

use crate::arch;
use crate::image::{self, ImageError, Section};
use indexmap::IndexMap;
use log::debug;
use std::io::Write;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LinkError {
    #[error("start function missing")]
    StartFuncMissing,
    #[error("package path conflict: {0}")]
    PackagePathConflict(String),
    #[error("undefined symbol {pkg}.{sym}")]
    UndefinedSymbol { pkg: String, sym: String },
    #[error("relative displacement out of range for {pkg}.{sym}")]
    RelativeOutOfRange { pkg: String, sym: String },
    #[error("code section too large")]
    CodeTooLarge,
    #[error("data section too large")]
    DataTooLarge,
    #[error(transparent)]
    Image(#[from] ImageError),
}

/// A linking job: a root package, a start symbol and the address the code
/// section is loaded at.
pub struct Job {
    pub pkg: PkgRef,
    pub start_sym: String,
    pub init_pc: u32,
}

impl Job {
    /// A job with the architecture-default initial PC.
    pub fn new(pkg: PkgRef, start_sym: &str) -> Self {
        Job {
            pkg,
            start_sym: start_sym.to_string(),
            init_pc: arch::INIT_PC,
        }
    }

    /// Runs the pipeline and writes the image to `out`.
    pub fn link<W: Write>(&self, out: &mut W) -> Result<(), LinkError> {
        let mut pkgs = IndexMap::new();
        trace::add_pkgs(&mut pkgs, &self.pkg)?;

        let root_path = self.pkg.borrow().path().to_string();
        if self.pkg.borrow().symbol_by_name(&self.start_sym)
            != Some(SymKind::Func)
        {
            return Err(LinkError::StartFuncMissing);
        }

        let roots = vec![self.start_sym.clone()];
        let used = trace::trace_used(&pkgs, &root_path, &roots);
        let (funcs, vars, zeros) =
            layout::layout(&pkgs, &used, self.init_pc)?;

        let mut secs: Vec<Section> = Vec::new();

        if !funcs.is_empty() {
            let mut w = writer::Writer::new(&pkgs);
            for ps in &funcs {
                let pkg = pkgs[&ps.pkg].borrow();
                let f = pkg.func(&ps.sym).expect("laid-out func missing");
                w.write_func(f)?;
            }
            let bytes = w.into_bytes();
            if !bytes.is_empty() {
                secs.push(Section::code(self.init_pc, bytes));
            }
        }

        if !vars.is_empty() {
            let first = {
                let pkg = pkgs[&vars[0].pkg].borrow();
                pkg.var(&vars[0].sym).expect("laid-out var missing").addr()
            };
            let mut w = writer::Writer::new(&pkgs);
            for ps in &vars {
                let pkg = pkgs[&ps.pkg].borrow();
                let v = pkg.var(&ps.sym).expect("laid-out var missing");
                w.write_var(v);
            }
            let bytes = w.into_bytes();
            if !bytes.is_empty() {
                secs.push(Section::data(first, bytes));
            }
        }

        if !zeros.is_empty() {
            let start = {
                let pkg = pkgs[&zeros[0].pkg].borrow();
                pkg.var(&zeros[0].sym).expect("laid-out var missing").addr()
            };
            let end = {
                let last = &zeros[zeros.len() - 1];
                let pkg = pkgs[&last.pkg].borrow();
                let v = pkg.var(&last.sym).expect("laid-out var missing");
                v.addr() + v.size()
            };
            secs.push(Section::zeros(start, end - start));
        }

        debug!(
            "linked {} with {} sections",
            root_path,
            secs.len()
        );
        image::write(out, &secs)?;
        Ok(())
    }
}

/// Shorthand for `Job::new(pkg, start).link(out)`.
pub fn link_main<W: Write>(
    pkg: &PkgRef,
    out: &mut W,
    start_sym: &str,
) -> Result<(), LinkError> {
    Job::new(pkg.clone(), start_sym).link(out)
}

/// Produces an image of a single function that has no link sites.
pub fn link_bare_func(f: &Func) -> Result<Vec<u8>, LinkError> {
    if f.too_large() {
        return Err(LinkError::CodeTooLarge);
    }
    if !f.links().is_empty() {
        let site = &f.links()[0];
        return Err(LinkError::UndefinedSymbol {
            pkg: site.pkg().to_string(),
            sym: site.sym().to_string(),
        });
    }

    let mut bytes = Vec::with_capacity(f.size() as usize);
    for inst in f.insts() {
        bytes.extend_from_slice(&inst.to_le_bytes());
    }

    let mut out = Vec::new();
    image::write(&mut out, &[Section::code(arch::INIT_PC, bytes)])?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arch::Opcode;
    use crate::image::SectionKind;

    #[test]
    fn bare_func_images_one_code_section() {
        let mut f = Func::new();
        f.add_inst(arch::jump(Opcode::J, -1));
        f.add_inst(0); // halt

        let bytes = link_bare_func(&f).unwrap();
        let secs = image::read(&bytes).unwrap();
        assert_eq!(secs.len(), 1);
        assert_eq!(secs[0].header.kind, SectionKind::Code);
        assert_eq!(secs[0].header.addr, arch::INIT_PC);
        assert_eq!(secs[0].header.size, 8);
    }

    #[test]
    fn missing_start_function_fails() {
        let p = Pkg::new_ref("app");
        p.borrow_mut().declare_var("main"); // a var, not a func
        let mut out = Vec::new();
        let err = link_main(&p, &mut out, "nope").unwrap_err();
        assert!(matches!(err, LinkError::StartFuncMissing));
        assert!(out.is_empty());

        let err = link_main(&p, &mut out, "main").unwrap_err();
        assert!(matches!(err, LinkError::StartFuncMissing));
    }
}
