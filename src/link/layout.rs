use super::pkg::{PkgRef, SymKind};
use super::trace::PkgSym;
use super::LinkError;
use crate::arch::REG_SIZE;
use indexmap::{IndexMap, IndexSet};
use log::debug;

fn align_up(addr: u32, align: u32) -> Option<u32> {
    let align = align.max(1);
    let rem = addr % align;
    if rem == 0 {
        Some(addr)
    } else {
        addr.checked_add(align - rem)
    }
}

/// Partitions the used symbols into functions, initialized vars and zero
/// vars, assigns addresses, and writes the addresses back into the
/// packages. Ordering is by closure package order, then declaration order
/// within the package; nothing else.
pub(crate) fn layout(
    pkgs: &IndexMap<String, PkgRef>,
    used: &IndexSet<PkgSym>,
    init_pc: u32,
) -> Result<(Vec<PkgSym>, Vec<PkgSym>, Vec<PkgSym>), LinkError> {
    let mut funcs = Vec::new();
    let mut vars = Vec::new();
    let mut zeros = Vec::new();

    for (path, pkg) in pkgs {
        let pkg = pkg.borrow();
        for (name, kind) in pkg.symbols() {
            let ps = PkgSym::new(path, name);
            if !used.contains(&ps) {
                continue;
            }
            match kind {
                SymKind::Func => funcs.push(ps),
                SymKind::Var => {
                    let v = pkg.var(name).expect("declared var missing");
                    if v.is_zeros() {
                        zeros.push(ps);
                    } else {
                        vars.push(ps);
                    }
                }
            }
        }
    }

    let mut addr = init_pc;
    for ps in &funcs {
        let pkg = &pkgs[&ps.pkg];
        let mut pkg = pkg.borrow_mut();
        let f = pkg.func_mut(&ps.sym).expect("declared func missing");
        if f.too_large() {
            return Err(LinkError::CodeTooLarge);
        }
        addr = align_up(addr, REG_SIZE as u32)
            .ok_or(LinkError::CodeTooLarge)?;
        f.set_addr(addr);
        addr = addr.checked_add(f.size()).ok_or(LinkError::CodeTooLarge)?;
    }

    let mut prev_end = addr;
    for (i, ps) in vars.iter().enumerate() {
        let pkg = &pkgs[&ps.pkg];
        let mut pkg = pkg.borrow_mut();
        let v = pkg.var_mut(&ps.sym).expect("declared var missing");
        let aligned =
            align_up(addr, v.align()).ok_or(LinkError::DataTooLarge)?;
        v.set_addr(aligned);
        v.set_prepad(if i == 0 { 0 } else { aligned - prev_end });
        addr = aligned.checked_add(v.size()).ok_or(LinkError::DataTooLarge)?;
        prev_end = addr;
    }

    for ps in &zeros {
        let pkg = &pkgs[&ps.pkg];
        let mut pkg = pkg.borrow_mut();
        let v = pkg.var_mut(&ps.sym).expect("declared var missing");
        let aligned =
            align_up(addr, v.align()).ok_or(LinkError::DataTooLarge)?;
        v.set_addr(aligned);
        addr = aligned.checked_add(v.size()).ok_or(LinkError::DataTooLarge)?;
    }

    debug!(
        "layout: {} funcs, {} vars, {} zero vars, end=0x{:x}",
        funcs.len(),
        vars.len(),
        zeros.len(),
        addr
    );
    Ok((funcs, vars, zeros))
}
