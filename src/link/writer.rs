use super::func::{Fill, Func};
use super::pkg::{PkgRef, SymKind};
use super::var::Var;
use super::LinkError;
use crate::arch::{JUMP_DISP_MAX, JUMP_DISP_MIN};
use indexmap::IndexMap;

/// Serializes laid-out functions and vars, applying link-site fixups
/// against the assigned addresses.
pub(crate) struct Writer<'a> {
    pkgs: &'a IndexMap<String, PkgRef>,
    buf: Vec<u8>,
}

impl<'a> Writer<'a> {
    pub(crate) fn new(pkgs: &'a IndexMap<String, PkgRef>) -> Self {
        Writer {
            pkgs,
            buf: Vec::new(),
        }
    }

    pub(crate) fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    fn sym_addr(&self, pkg: &str, sym: &str) -> Option<u32> {
        let pkg = self.pkgs.get(pkg)?.borrow();
        match pkg.symbol_by_name(sym)? {
            SymKind::Func => pkg.func(sym).map(Func::addr),
            SymKind::Var => pkg.var(sym).map(Var::addr),
        }
    }

    /// Writes one function, patching every link site into its word.
    pub(crate) fn write_func(&mut self, f: &Func) -> Result<(), LinkError> {
        let mut insts = f.insts().to_vec();

        for site in f.links() {
            let target = self.sym_addr(site.pkg(), site.sym()).ok_or_else(
                || LinkError::UndefinedSymbol {
                    pkg: site.pkg().to_string(),
                    sym: site.sym().to_string(),
                },
            )?;

            let index = (site.inst_offset() / 4) as usize;
            let site_addr = f.addr() + site.inst_offset();
            match site.fill() {
                Fill::Link => {
                    let diff = target as i64 - (site_addr as i64 + 4);
                    let disp = diff >> 2;
                    if !(JUMP_DISP_MIN..=JUMP_DISP_MAX).contains(&disp) {
                        return Err(LinkError::RelativeOutOfRange {
                            pkg: site.pkg().to_string(),
                            sym: site.sym().to_string(),
                        });
                    }
                    insts[index] |= disp as u32 & 0x00ff_ffff;
                }
                Fill::Low => {
                    insts[index] |= target & 0xffff;
                }
                Fill::High => {
                    insts[index] |= target >> 16;
                }
                Fill::None => unreachable!("link site with no fill"),
            }
        }

        for inst in insts {
            self.buf.extend_from_slice(&inst.to_le_bytes());
        }
        Ok(())
    }

    /// Writes one var: its alignment padding, then its bytes.
    pub(crate) fn write_var(&mut self, v: &Var) {
        self.buf.extend(std::iter::repeat_n(0u8, v.prepad() as usize));
        self.buf.extend_from_slice(v.bytes());
    }
}
