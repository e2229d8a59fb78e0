use super::EmitError;
use crate::arch::REG_SIZE;
use crate::ir::{Func, FuncSig, SlotKind, VarId};

/// Frame and call-window sizes must leave room in a signed 16-bit
/// immediate even when a call window sits on top of a frame that itself
/// addresses an incoming window.
const MAX_AREA: i32 = 0x2000;

pub(crate) fn align_up(off: i32, align: i32) -> i32 {
    let align = align.max(1);
    (off + align - 1) / align * align
}

fn slot_align(reg_aligned: bool) -> i32 {
    if reg_aligned { REG_SIZE } else { 1 }
}

/// Layout of a call window: parameter cells first, result cells after,
/// both areas rounded up to the register size. The caller opens the
/// window below its stack pointer; the callee addresses it above its
/// frame.
#[derive(Debug, Clone)]
pub(crate) struct Window {
    pub param_offsets: Vec<i32>,
    pub result_offsets: Vec<i32>,
    pub params_size: i32,
    pub size: i32,
}

pub(crate) fn window(sig: &FuncSig) -> Result<Window, EmitError> {
    let mut param_offsets = Vec::with_capacity(sig.params.len());
    let mut off = 0;
    for p in &sig.params {
        off = align_up(off, slot_align(p.reg_aligned));
        param_offsets.push(off);
        off += p.size;
    }
    let params_size = align_up(off, REG_SIZE);

    let mut result_offsets = Vec::with_capacity(sig.results.len());
    let mut off = params_size;
    for r in &sig.results {
        off = align_up(off, slot_align(r.reg_aligned));
        result_offsets.push(off);
        off += r.size;
    }
    let size = align_up(off, REG_SIZE);

    if size > MAX_AREA {
        return Err(EmitError::FrameTooLarge);
    }
    Ok(Window {
        param_offsets,
        result_offsets,
        params_size,
        size,
    })
}

/// Offsets of every pool slot relative to the stack pointer once the
/// prologue has run. Slot 0 of the frame itself saves RA.
#[derive(Debug, Clone)]
pub(crate) struct Frame {
    offsets: Vec<i32>,
    pub size: i32,
}

impl Frame {
    pub(crate) fn build(f: &Func) -> Result<Frame, EmitError> {
        let win = window(f.sig())?;

        let mut offsets = vec![0i32; f.vars().len()];
        let mut off = REG_SIZE; // saved RA
        for (i, slot) in f.vars().iter().enumerate() {
            if slot.kind == SlotKind::Auto {
                off = align_up(off, slot_align(slot.reg_aligned));
                offsets[i] = off;
                off += slot.size;
            }
        }
        let size = align_up(off, REG_SIZE);
        if size > MAX_AREA {
            return Err(EmitError::FrameTooLarge);
        }

        for (i, slot) in f.vars().iter().enumerate() {
            match slot.kind {
                SlotKind::Auto => {}
                SlotKind::Param(p) => {
                    offsets[i] = size + win.param_offsets[p as usize];
                }
                SlotKind::Result(r) => {
                    offsets[i] = size + win.result_offsets[r as usize];
                }
            }
        }

        Ok(Frame { offsets, size })
    }

    pub(crate) fn offset(&self, id: VarId) -> i32 {
        self.offsets[id.0 as usize]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{FuncSig, SlotSpec};

    #[test]
    fn byte_slots_pack_and_words_realign() {
        let mut f = Func::new(FuncSig::void());
        let b1 = f.new_temp(1, true, false);
        let b2 = f.new_temp(1, true, false);
        let w = f.new_temp(4, false, true);

        let frame = Frame::build(&f).unwrap();
        let id = |r: &crate::ir::Ref| match r {
            crate::ir::Ref::Var { id, .. } => *id,
            _ => unreachable!(),
        };
        assert_eq!(frame.offset(id(&b1)), 4);
        assert_eq!(frame.offset(id(&b2)), 5);
        assert_eq!(frame.offset(id(&w)), 8);
        assert_eq!(frame.size, 12);
    }

    #[test]
    fn params_and_results_sit_above_the_frame() {
        let sig = FuncSig::new(
            vec![SlotSpec::word(), SlotSpec::byte()],
            vec![SlotSpec::word()],
        );
        let f = Func::new(sig);
        let frame = Frame::build(&f).unwrap();

        // empty frame: only the RA slot, rounded to a word
        assert_eq!(frame.size, 4);
        // params at window base: word at 0, byte at 4; params area = 8
        assert_eq!(frame.offset(VarId(0)), 4);
        assert_eq!(frame.offset(VarId(1)), 8);
        // result follows the params area
        assert_eq!(frame.offset(VarId(2)), 12);
    }

    #[test]
    fn window_rounds_both_areas() {
        let sig = FuncSig::new(vec![SlotSpec::byte()], vec![SlotSpec::byte()]);
        let win = window(&sig).unwrap();
        assert_eq!(win.params_size, 4);
        assert_eq!(win.result_offsets, [4]);
        assert_eq!(win.size, 8);
    }

    #[test]
    fn oversized_frame_is_rejected() {
        let mut f = Func::new(FuncSig::void());
        f.new_temp(0x4000, false, true);
        assert!(matches!(
            Frame::build(&f),
            Err(EmitError::FrameTooLarge)
        ));
    }
}
