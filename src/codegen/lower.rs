use super::frame::{self, Frame};
use super::{EmitCtx, EmitError};
use crate::arch::{self, Opcode, Reg};
use crate::ir::{ArithOp, Func, FuncSig, Jump, Op, Ref};
use crate::link::{self, Fill, SymKind};
use log::trace;

/// Unrolled copies and zero fills switch to a counted loop past this many
/// words.
const UNROLL_WORDS: i32 = 16;

enum Pending {
    Branch { index: usize, target: u32 },
    Jump { index: usize, target: u32 },
}

pub(crate) struct Emitter<'a> {
    f: &'a Func,
    ctx: &'a EmitCtx<'a>,
    resolve: &'a mut dyn FnMut(&str, &str) -> Option<SymKind>,
    frame: Frame,
    out: link::Func,
    /// extra stack movement while a call window is open
    sp_bias: i32,
    block_starts: Vec<i64>,
    pending: Vec<Pending>,
}

fn imm_i16(v: i32) -> u16 {
    assert!(
        (i16::MIN as i32..=i16::MAX as i32).contains(&v),
        "immediate out of range"
    );
    v as i16 as u16
}

impl<'a> Emitter<'a> {
    pub(crate) fn new(
        f: &'a Func,
        ctx: &'a EmitCtx<'a>,
        resolve: &'a mut dyn FnMut(&str, &str) -> Option<SymKind>,
        frame: Frame,
    ) -> Self {
        Emitter {
            f,
            ctx,
            resolve,
            frame,
            out: link::Func::new(),
            sp_bias: 0,
            block_starts: Vec::new(),
            pending: Vec::new(),
        }
    }

    pub(crate) fn run(mut self) -> Result<link::Func, EmitError> {
        // frame reservation; the displacement is patched in below
        let prologue = self.push(arch::imm(Opcode::ADDI, Reg::SP, Reg::SP, 0));
        self.st_off(Reg::RA, Reg::SP, 0, false);

        let f = self.f;
        for block in f.blocks() {
            self.block_starts.push(self.out.insts().len() as i64);
            for op in block.ops() {
                self.lower_op(op)?;
            }
            debug_assert_eq!(self.sp_bias, 0, "call window left open");
            self.terminator(block.jump_desc())?;
        }

        // single return site: control falls off the end of the chain
        self.block_starts.push(self.out.insts().len() as i64);
        self.ld_off(Reg::RA, Reg::SP, 0, false);
        self.push(arch::imm(
            Opcode::ADDI,
            Reg::SP,
            Reg::SP,
            imm_i16(self.frame.size),
        ));
        self.push(arch::reg3(Opcode::JR, Reg::R0, Reg::RA, Reg::R0));

        self.out
            .patch_inst(prologue, imm_i16(-self.frame.size) as u32);
        self.patch_pending()?;

        if self.out.too_large() {
            return Err(EmitError::CodeTooLarge);
        }
        Ok(self.out)
    }

    fn patch_pending(&mut self) -> Result<(), EmitError> {
        for pend in std::mem::take(&mut self.pending) {
            match pend {
                Pending::Branch { index, target } => {
                    let disp = self.block_starts[target as usize]
                        - (index as i64 + 1);
                    if !(arch::BRANCH_DISP_MIN..=arch::BRANCH_DISP_MAX)
                        .contains(&disp)
                    {
                        return Err(EmitError::BranchTooFar);
                    }
                    self.out
                        .patch_inst(index, (disp as i16 as u16) as u32);
                }
                Pending::Jump { index, target } => {
                    let disp = self.block_starts[target as usize]
                        - (index as i64 + 1);
                    if !(arch::JUMP_DISP_MIN..=arch::JUMP_DISP_MAX)
                        .contains(&disp)
                    {
                        return Err(EmitError::BranchTooFar);
                    }
                    self.out
                        .patch_inst(index, disp as i32 as u32 & 0x00ff_ffff);
                }
            }
        }
        Ok(())
    }

    fn push(&mut self, inst: u32) -> usize {
        self.out.add_inst(inst);
        self.out.insts().len() - 1
    }

    /// Load from memory: `rd = [rs + off]`, byte or word.
    fn ld_off(&mut self, rd: Reg, rs: Reg, off: i32, byte: bool) {
        let op = if byte { Opcode::LB } else { Opcode::LW };
        self.push(arch::imm(op, rd, rs, imm_i16(off)));
    }

    /// Store to memory: `[rs + off] = rv`, byte or word.
    fn st_off(&mut self, rv: Reg, rs: Reg, off: i32, byte: bool) {
        let op = if byte { Opcode::SB } else { Opcode::SW };
        self.push(arch::imm(op, rv, rs, imm_i16(off)));
    }

    fn check_sym(
        &mut self,
        pkg: &str,
        sym: &str,
        want: SymKind,
    ) -> Result<(), EmitError> {
        match (self.resolve)(pkg, sym) {
            None => Err(EmitError::UndefinedSymbol {
                pkg: pkg.to_string(),
                sym: sym.to_string(),
            }),
            Some(kind) => {
                if kind != want {
                    panic!("{pkg}.{sym} is a {kind}, expected a {want}");
                }
                Ok(())
            }
        }
    }

    /// Loads the absolute address of `pkg.sym` into `rd` and records the
    /// high/low link sites.
    fn load_sym_addr(
        &mut self,
        rd: Reg,
        pkg: &str,
        sym: &str,
        want: SymKind,
    ) -> Result<(), EmitError> {
        self.check_sym(pkg, sym, want)?;
        self.push(arch::imm(Opcode::LUI, rd, Reg::R0, 0));
        self.out.add_link(Fill::High, pkg, sym);
        self.push(arch::imm(Opcode::ORI, rd, rd, 0));
        self.out.add_link(Fill::Low, pkg, sym);
        Ok(())
    }

    fn load_imm(&mut self, rd: Reg, v: u32) {
        if v <= 0xffff {
            self.push(arch::imm(Opcode::ORI, rd, Reg::R0, v as u16));
        } else {
            self.push(arch::imm(Opcode::LUI, rd, Reg::R0, (v >> 16) as u16));
            self.push(arch::imm(Opcode::ORI, rd, rd, v as u16));
        }
    }

    fn var_off(&self, id: crate::ir::VarId) -> i32 {
        self.frame.offset(id) + self.sp_bias
    }

    /// Loads the value of a sized-for-a-register ref into `rd`. May use
    /// `rd` as an address scratch on the way.
    fn load_ref(&mut self, rd: Reg, r: &Ref) -> Result<(), EmitError> {
        match r {
            Ref::Var { id, is_byte, .. } => {
                self.ld_off(rd, Reg::SP, self.var_off(*id), *is_byte);
            }
            Ref::Global {
                pkg,
                name,
                is_byte,
                ..
            } => {
                self.load_sym_addr(rd, pkg, name, SymKind::Var)?;
                self.ld_off(rd, rd, 0, *is_byte);
            }
            Ref::Func { pkg, name } => {
                self.load_sym_addr(rd, pkg, name, SymKind::Func)?;
            }
            Ref::Byt(b) => {
                self.push(arch::imm(Opcode::ORI, rd, Reg::R0, *b as u16));
            }
            Ref::Num(n) => self.load_imm(rd, *n),
            Ref::Addr {
                base,
                offset,
                is_byte,
                ..
            } => {
                self.load_ref(rd, base)?;
                self.ld_off(rd, rd, *offset, *is_byte);
            }
            Ref::Str(_) => panic!("string constant has no register value"),
            Ref::Null => panic!("null ref has no value"),
        }
        Ok(())
    }

    /// Loads the address of a memory-backed ref into `rd`.
    fn addr_of(&mut self, rd: Reg, r: &Ref) -> Result<(), EmitError> {
        match r {
            Ref::Var { id, .. } => {
                self.push(arch::imm(
                    Opcode::ADDI,
                    rd,
                    Reg::SP,
                    imm_i16(self.var_off(*id)),
                ));
            }
            Ref::Global { pkg, name, .. } => {
                self.load_sym_addr(rd, pkg, name, SymKind::Var)?;
            }
            Ref::Str(id) => {
                let ctx = self.ctx;
                let sc = ctx.strs.get(*id);
                assert!(
                    !sc.name().is_empty(),
                    "string constant not declared"
                );
                self.load_sym_addr(rd, ctx.pkg, sc.name(), SymKind::Var)?;
            }
            Ref::Addr { base, offset, .. } => {
                self.load_ref(rd, base)?;
                if *offset != 0 {
                    self.push(arch::imm(
                        Opcode::ADDI,
                        rd,
                        rd,
                        imm_i16(*offset),
                    ));
                }
            }
            Ref::Func { pkg, name } => {
                self.load_sym_addr(rd, pkg, name, SymKind::Func)?;
            }
            Ref::Byt(_) | Ref::Num(_) | Ref::Null => {
                panic!("ref has no address")
            }
        }
        Ok(())
    }

    /// Stores `rv` into a memory-backed ref. Clobbers R3 for computed
    /// destinations.
    fn store_reg(&mut self, rv: Reg, dest: &Ref) -> Result<(), EmitError> {
        match dest {
            Ref::Var { id, is_byte, .. } => {
                self.st_off(rv, Reg::SP, self.var_off(*id), *is_byte);
            }
            Ref::Global {
                pkg,
                name,
                is_byte,
                ..
            } => {
                self.load_sym_addr(Reg::R3, pkg, name, SymKind::Var)?;
                self.st_off(rv, Reg::R3, 0, *is_byte);
            }
            Ref::Addr {
                base,
                offset,
                is_byte,
                ..
            } => {
                self.load_ref(Reg::R3, base)?;
                self.st_off(rv, Reg::R3, *offset, *is_byte);
            }
            _ => panic!("ref is not assignable"),
        }
        Ok(())
    }

    /// Whether a ref moves through a single register load/store.
    fn is_simple(r: &Ref) -> bool {
        r.size() == 1 || r.size() == crate::arch::REG_SIZE
    }

    /// Copies `size` bytes from the address in R3 to the address in R4.
    fn copy_block(&mut self, size: i32) {
        let words = size / 4;
        let tail = size % 4;

        if words > UNROLL_WORDS {
            self.load_imm(Reg::R2, words as u32);
            self.ld_off(Reg::R1, Reg::R3, 0, false);
            self.st_off(Reg::R1, Reg::R4, 0, false);
            self.push(arch::imm(Opcode::ADDI, Reg::R3, Reg::R3, 4));
            self.push(arch::imm(Opcode::ADDI, Reg::R4, Reg::R4, 4));
            self.push(arch::imm(
                Opcode::ADDI,
                Reg::R2,
                Reg::R2,
                imm_i16(-1),
            ));
            self.push(arch::branch(Opcode::BNE, Reg::R2, Reg::R0, -6));
            for i in 0..tail {
                self.ld_off(Reg::R1, Reg::R3, i, true);
                self.st_off(Reg::R1, Reg::R4, i, true);
            }
        } else {
            for i in 0..words {
                self.ld_off(Reg::R1, Reg::R3, i * 4, false);
                self.st_off(Reg::R1, Reg::R4, i * 4, false);
            }
            for i in 0..tail {
                self.ld_off(Reg::R1, Reg::R3, words * 4 + i, true);
                self.st_off(Reg::R1, Reg::R4, words * 4 + i, true);
            }
        }
    }

    /// Memory-to-memory copy of equal-sized refs.
    fn copy_mem(&mut self, dest: &Ref, src: &Ref) -> Result<(), EmitError> {
        assert!(
            !matches!(src, Ref::Str(_)),
            "string constant must be materialized with make_str"
        );
        self.addr_of(Reg::R3, src)?;
        self.addr_of(Reg::R4, dest)?;
        self.copy_block(dest.size());
        Ok(())
    }

    fn lower_op(&mut self, op: &Op) -> Result<(), EmitError> {
        match op {
            Op::Comment(text) => {
                trace!("ir comment: {text}");
            }
            Op::Arith { dest, x, op, y } => {
                self.lower_arith(dest, x.as_ref(), *op, y.as_ref())?;
            }
            Op::Call {
                dests,
                f,
                sig,
                args,
            } => {
                self.lower_call(dests, f, sig, args)?;
            }
            Op::Zero(dest) => self.lower_zero(dest)?,
        }
        Ok(())
    }

    fn lower_arith(
        &mut self,
        dest: &Ref,
        x: Option<&Ref>,
        op: ArithOp,
        y: Option<&Ref>,
    ) -> Result<(), EmitError> {
        let y = y.expect("arith operand missing");
        match op {
            ArithOp::Assign => {
                if Self::is_simple(dest) {
                    self.load_ref(Reg::R1, y)?;
                    self.store_reg(Reg::R1, dest)?;
                } else {
                    self.copy_mem(dest, y)?;
                }
            }
            ArithOp::MakeStr => self.lower_make_str(dest, y)?,
            ArithOp::Neg => {
                self.load_ref(Reg::R2, y)?;
                self.push(arch::reg3(
                    Opcode::SUB,
                    Reg::R1,
                    Reg::R0,
                    Reg::R2,
                ));
                self.store_reg(Reg::R1, dest)?;
            }
            ArithOp::Not => {
                self.load_ref(Reg::R1, y)?;
                self.push(arch::imm(Opcode::XORI, Reg::R1, Reg::R1, 1));
                self.store_reg(Reg::R1, dest)?;
            }
            ArithOp::BitNot => {
                self.load_ref(Reg::R2, y)?;
                self.push(arch::reg3(
                    Opcode::SUB,
                    Reg::R1,
                    Reg::R0,
                    Reg::R2,
                ));
                self.push(arch::imm(
                    Opcode::ADDI,
                    Reg::R1,
                    Reg::R1,
                    imm_i16(-1),
                ));
                self.store_reg(Reg::R1, dest)?;
            }
            _ => {
                let x = x.expect("binary operator takes two operands");
                self.load_ref(Reg::R1, x)?;
                self.load_ref(Reg::R2, y)?;
                self.binary_alu(op);
                self.store_reg(Reg::R1, dest)?;
            }
        }
        Ok(())
    }

    /// Binary ALU step: operands in R1/R2, result into R1.
    fn binary_alu(&mut self, op: ArithOp) {
        use Reg::{R1, R2};
        let direct = |o| arch::reg3(o, R1, R1, R2);
        match op {
            ArithOp::Add => {
                self.push(direct(Opcode::ADD));
            }
            ArithOp::Sub => {
                self.push(direct(Opcode::SUB));
            }
            ArithOp::Mul => {
                self.push(direct(Opcode::MUL));
            }
            ArithOp::Div => {
                self.push(direct(Opcode::DIV));
            }
            ArithOp::Mod => {
                self.push(direct(Opcode::MOD));
            }
            ArithOp::And => {
                self.push(direct(Opcode::AND));
            }
            ArithOp::Or => {
                self.push(direct(Opcode::OR));
            }
            ArithOp::Xor => {
                self.push(direct(Opcode::XOR));
            }
            ArithOp::Shl => {
                self.push(direct(Opcode::SLL));
            }
            ArithOp::Shr => {
                self.push(direct(Opcode::SRL));
            }
            ArithOp::Eq => {
                self.push(direct(Opcode::SEQ));
            }
            ArithOp::Ne => {
                self.push(direct(Opcode::SEQ));
                self.push(arch::imm(Opcode::XORI, R1, R1, 1));
            }
            ArithOp::Lt => {
                self.push(direct(Opcode::SLT));
            }
            ArithOp::Ge => {
                self.push(direct(Opcode::SLT));
                self.push(arch::imm(Opcode::XORI, R1, R1, 1));
            }
            ArithOp::Gt => {
                self.push(arch::reg3(Opcode::SLT, R1, R2, R1));
            }
            ArithOp::Le => {
                self.push(arch::reg3(Opcode::SLT, R1, R2, R1));
                self.push(arch::imm(Opcode::XORI, R1, R1, 1));
            }
            _ => unreachable!("not a binary operator"),
        }
    }

    fn lower_make_str(
        &mut self,
        dest: &Ref,
        y: &Ref,
    ) -> Result<(), EmitError> {
        let Ref::Str(id) = y else {
            panic!("make_str takes a string constant")
        };
        assert_eq!(
            dest.size(),
            crate::arch::REG_SIZE * 2,
            "make_str writes a pointer and a length"
        );

        let len = self.ctx.strs.get(*id).lit().len() as u32;
        self.addr_of(Reg::R1, y)?;
        self.addr_of(Reg::R3, dest)?;
        self.st_off(Reg::R1, Reg::R3, 0, false);
        self.load_imm(Reg::R2, len);
        self.st_off(Reg::R2, Reg::R3, 4, false);
        Ok(())
    }

    fn lower_zero(&mut self, dest: &Ref) -> Result<(), EmitError> {
        if Self::is_simple(dest) {
            self.store_reg(Reg::R0, dest)?;
            return Ok(());
        }

        self.addr_of(Reg::R3, dest)?;
        let size = dest.size();
        let words = size / 4;
        let tail = size % 4;

        if words > UNROLL_WORDS {
            self.load_imm(Reg::R2, words as u32);
            self.st_off(Reg::R0, Reg::R3, 0, false);
            self.push(arch::imm(Opcode::ADDI, Reg::R3, Reg::R3, 4));
            self.push(arch::imm(
                Opcode::ADDI,
                Reg::R2,
                Reg::R2,
                imm_i16(-1),
            ));
            self.push(arch::branch(Opcode::BNE, Reg::R2, Reg::R0, -4));
            for i in 0..tail {
                self.st_off(Reg::R0, Reg::R3, i, true);
            }
        } else {
            for i in 0..words {
                self.st_off(Reg::R0, Reg::R3, i * 4, false);
            }
            for i in 0..tail {
                self.st_off(Reg::R0, Reg::R3, words * 4 + i, true);
            }
        }
        Ok(())
    }

    /// Copies an argument value into its call-window cell at `sp + off`.
    fn copy_into_window(
        &mut self,
        off: i32,
        src: &Ref,
    ) -> Result<(), EmitError> {
        assert!(
            !matches!(src, Ref::Str(_)),
            "string constant must be materialized with make_str"
        );
        if Self::is_simple(src) {
            self.load_ref(Reg::R1, src)?;
            self.st_off(Reg::R1, Reg::SP, off, src.is_byte());
        } else {
            self.addr_of(Reg::R3, src)?;
            self.push(arch::imm(Opcode::ADDI, Reg::R4, Reg::SP, imm_i16(off)));
            self.copy_block(src.size());
        }
        Ok(())
    }

    /// Copies a result cell at `sp + off` into its destination ref.
    fn copy_from_window(
        &mut self,
        off: i32,
        dest: &Ref,
    ) -> Result<(), EmitError> {
        if Self::is_simple(dest) {
            self.ld_off(Reg::R1, Reg::SP, off, dest.is_byte());
            self.store_reg(Reg::R1, dest)?;
        } else {
            self.push(arch::imm(Opcode::ADDI, Reg::R3, Reg::SP, imm_i16(off)));
            self.addr_of(Reg::R4, dest)?;
            self.copy_block(dest.size());
        }
        Ok(())
    }

    fn lower_call(
        &mut self,
        dests: &[Ref],
        f: &Ref,
        sig: &FuncSig,
        args: &[Ref],
    ) -> Result<(), EmitError> {
        let win = frame::window(sig)?;

        if win.size > 0 {
            self.push(arch::imm(
                Opcode::ADDI,
                Reg::SP,
                Reg::SP,
                imm_i16(-win.size),
            ));
            self.sp_bias += win.size;
        }

        for (i, arg) in args.iter().enumerate() {
            self.copy_into_window(win.param_offsets[i], arg)?;
        }

        match f {
            Ref::Func { pkg, name } => {
                self.check_sym(pkg, name, SymKind::Func)?;
                self.push(arch::jump(Opcode::JAL, 0));
                self.out.add_link(Fill::Link, pkg, name);
            }
            other => {
                self.load_ref(Reg::R1, other)?;
                self.push(arch::reg3(
                    Opcode::JALR,
                    Reg::R0,
                    Reg::R1,
                    Reg::R0,
                ));
            }
        }

        for (i, dest) in dests.iter().enumerate() {
            self.copy_from_window(win.result_offsets[i], dest)?;
        }

        if win.size > 0 {
            self.push(arch::imm(
                Opcode::ADDI,
                Reg::SP,
                Reg::SP,
                imm_i16(win.size),
            ));
            self.sp_bias -= win.size;
        }
        Ok(())
    }

    fn terminator(&mut self, jump: &Jump) -> Result<(), EmitError> {
        match jump {
            Jump::None => {}
            Jump::Always(target) => {
                self.check_target(target.0);
                let index = self.push(arch::jump(Opcode::J, 0));
                self.pending.push(Pending::Jump {
                    index,
                    target: target.0,
                });
            }
            Jump::If(cond, target) => {
                self.check_target(target.0);
                self.load_ref(Reg::R1, cond)?;
                let index =
                    self.push(arch::branch(Opcode::BNE, Reg::R1, Reg::R0, 0));
                self.pending.push(Pending::Branch {
                    index,
                    target: target.0,
                });
            }
            Jump::IfNot(cond, target) => {
                self.check_target(target.0);
                self.load_ref(Reg::R1, cond)?;
                let index =
                    self.push(arch::branch(Opcode::BEQ, Reg::R1, Reg::R0, 0));
                self.pending.push(Pending::Branch {
                    index,
                    target: target.0,
                });
            }
        }
        Ok(())
    }

    fn check_target(&self, target: u32) {
        assert!(
            (target as usize) < self.f.blocks().len(),
            "jump target outside the function"
        );
    }
}
