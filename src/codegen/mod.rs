//! The code emitter: lowers IR functions into E8 instruction words plus
//! the link sites the linker patches once addresses are known.

mod frame;
mod lower;

use crate::ir;
use crate::link::{self, SymKind};
use log::debug;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EmitError {
    #[error("code section too large")]
    CodeTooLarge,
    #[error("stack frame too large")]
    FrameTooLarge,
    #[error("branch target out of range")]
    BranchTooFar,
    #[error("undefined symbol {pkg}.{sym}")]
    UndefinedSymbol { pkg: String, sym: String },
}

/// Per-package emission context. The string pool must already carry its
/// assigned link names, i.e. the package was declared first.
pub struct EmitCtx<'a> {
    pub pkg: &'a str,
    pub strs: &'a ir::StrPool,
}

/// Lowers one function. `resolve` maps a (package path, symbol name)
/// reference to the kind of the link-level symbol, or `None` when the
/// universe has no such symbol.
pub fn emit_func(
    f: &mut ir::Func,
    ctx: &EmitCtx<'_>,
    resolve: &mut dyn FnMut(&str, &str) -> Option<SymKind>,
) -> Result<link::Func, EmitError> {
    let frame = frame::Frame::build(f)?;
    f.set_frame_size(frame.size);
    lower::Emitter::new(f, ctx, resolve, frame).run()
}

/// Declares an IR package into its link package and emits every function
/// into it. `universe` holds the link packages of the imports; referenced
/// symbols must already be declared there.
pub fn compile_pkg(
    pkg: &mut ir::Pkg,
    lib: &link::PkgRef,
    universe: &[link::PkgRef],
) -> Result<(), EmitError> {
    {
        let mut lib = lib.borrow_mut();
        pkg.declare_to(&mut lib);
    }

    let (path, strs, funcs) = pkg.emit_parts();
    let ctx = EmitCtx { pkg: path, strs };
    let mut resolve = |p: &str, s: &str| -> Option<SymKind> {
        if p == path {
            return lib.borrow().symbol_by_name(s);
        }
        universe
            .iter()
            .find(|u| u.borrow().path() == p)
            .and_then(|u| u.borrow().symbol_by_name(s))
    };

    for (name, f) in funcs.iter_mut() {
        let emitted = emit_func(f, &ctx, &mut resolve)?;
        debug!(
            "emitted {path}.{name}: {} insts, {} link sites",
            emitted.insts().len(),
            emitted.links().len()
        );
        lib.borrow_mut().define_func(name, emitted);
    }
    Ok(())
}
