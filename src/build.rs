//! One-call pipeline helpers: compile a finished IR package into its link
//! package and link an image, for callers that do not drive the stages
//! themselves.

use crate::codegen::{self, EmitError};
use crate::ir;
use crate::link::{self, LinkError, PkgRef};
use log::debug;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BuildError {
    #[error(transparent)]
    Emit(#[from] EmitError),
    #[error(transparent)]
    Link(#[from] LinkError),
}

/// Compiles `pkg` against its already-compiled imports and returns the
/// link package, with imports wired for closure computation.
pub fn compile(
    pkg: &mut ir::Pkg,
    imports: &[PkgRef],
) -> Result<PkgRef, EmitError> {
    let lib = link::Pkg::new_ref(pkg.path());
    for imp in imports {
        lib.borrow_mut().import(imp);
    }
    codegen::compile_pkg(pkg, &lib, imports)?;
    Ok(lib)
}

/// Compiles `pkg` and links it with the given start symbol at the default
/// initial PC, returning the image bytes.
pub fn build_image(
    pkg: &mut ir::Pkg,
    imports: &[PkgRef],
    start_sym: &str,
) -> Result<Vec<u8>, BuildError> {
    let lib = compile(pkg, imports)?;
    let mut out = Vec::new();
    link::link_main(&lib, &mut out, start_sym)?;
    debug!("built image for {}: {} bytes", pkg.path(), out.len());
    Ok(out)
}

/// `build_image` with the conventional start symbol.
pub fn build_main(
    pkg: &mut ir::Pkg,
    imports: &[PkgRef],
) -> Result<Vec<u8>, BuildError> {
    build_image(pkg, imports, "main")
}
