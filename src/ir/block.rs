use super::op::{ArithOp, FuncSig, Op};
use super::refs::Ref;

/// Stable id of a basic block within its function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockId(pub(crate) u32);

/// How control leaves a block. `None` falls through to the natural
/// successor in the chain.
#[derive(Debug, Clone, PartialEq)]
pub enum Jump {
    None,
    Always(BlockId),
    If(Ref, BlockId),
    IfNot(Ref, BlockId),
}

/// A basic block: operations in order plus one jump descriptor. Blocks
/// live in their function's arena and name each other by id.
#[derive(Debug, Clone)]
pub struct Block {
    id: BlockId,
    ops: Vec<Op>,
    jump: Jump,
    next: Option<BlockId>,
}

impl Block {
    pub(crate) fn new(id: BlockId) -> Self {
        Block {
            id,
            ops: Vec::new(),
            jump: Jump::None,
            next: None,
        }
    }

    pub fn id(&self) -> BlockId {
        self.id
    }

    /// The natural successor in the block chain.
    pub fn next(&self) -> Option<BlockId> {
        self.next
    }

    pub(crate) fn set_next(&mut self, next: BlockId) {
        self.next = Some(next);
    }

    pub fn ops(&self) -> &[Op] {
        &self.ops
    }

    pub fn jump_desc(&self) -> &Jump {
        &self.jump
    }

    /// Adds an IR comment.
    pub fn comment(&mut self, text: impl Into<String>) {
        self.ops.push(Op::Comment(text.into()));
    }

    /// Appends an arithmetic operation. Operand shape must match the
    /// operator's arity; a mismatch is a bug in the caller.
    pub fn arith(
        &mut self,
        dest: Ref,
        x: Option<Ref>,
        op: ArithOp,
        y: Option<Ref>,
    ) {
        if op.is_binary() {
            assert!(
                x.is_some() && y.is_some(),
                "binary operator {op} takes two operands"
            );
        } else {
            assert!(x.is_none(), "operator {op} takes no first operand");
            assert!(y.is_some(), "operator {op} takes an operand");
        }
        self.ops.push(Op::Arith { dest, x, op, y });
    }

    /// Appends an assignment: arith with the empty operator.
    pub fn assign(&mut self, dest: Ref, src: Ref) {
        assert_eq!(
            dest.size(),
            src.size(),
            "assignment size mismatch"
        );
        self.arith(dest, None, ArithOp::Assign, Some(src));
    }

    /// Appends a zeroing operation.
    pub fn zero(&mut self, dest: Ref) {
        self.ops.push(Op::Zero(dest));
    }

    /// Appends a function call. Arities must match the signature.
    pub fn call(
        &mut self,
        dests: Vec<Ref>,
        f: Ref,
        sig: FuncSig,
        args: Vec<Ref>,
    ) {
        assert_eq!(
            dests.len(),
            sig.results.len(),
            "call dest count disagrees with signature"
        );
        assert_eq!(
            args.len(),
            sig.params.len(),
            "call arg count disagrees with signature"
        );
        self.ops.push(Op::Call {
            dests,
            f,
            sig,
            args,
        });
    }

    /// Sets the block to always jump to `dest`. A jump to the natural
    /// successor is stored as "none".
    pub fn jump(&mut self, dest: BlockId) {
        if self.next == Some(dest) {
            self.jump = Jump::None;
        } else {
            self.jump = Jump::Always(dest);
        }
    }

    /// Jump to `dest` when the condition holds, otherwise fall through.
    pub fn jump_if(&mut self, cond: Ref, dest: BlockId) {
        self.jump = Jump::If(cond, dest);
    }

    /// Jump to `dest` when the condition does not hold.
    pub fn jump_if_not(&mut self, cond: Ref, dest: BlockId) {
        self.jump = Jump::IfNot(cond, dest);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jump_to_natural_successor_canonicalizes_to_none() {
        let mut b = Block::new(BlockId(0));
        b.set_next(BlockId(1));

        b.jump(BlockId(2));
        assert_eq!(*b.jump_desc(), Jump::Always(BlockId(2)));

        b.jump(BlockId(1));
        assert_eq!(*b.jump_desc(), Jump::None);
    }

    #[test]
    fn last_jump_wins() {
        let mut b = Block::new(BlockId(0));
        b.jump(BlockId(3));
        b.jump_if(Ref::Byt(1), BlockId(4));
        assert_eq!(*b.jump_desc(), Jump::If(Ref::Byt(1), BlockId(4)));
    }

    #[test]
    #[should_panic(expected = "call dest count disagrees with signature")]
    fn call_arity_mismatch_is_a_bug() {
        let mut b = Block::new(BlockId(0));
        b.call(
            vec![Ref::Num(0)],
            Ref::Func {
                pkg: "p".to_string(),
                name: "f".to_string(),
            },
            FuncSig::void(),
            vec![],
        );
    }

    #[test]
    #[should_panic(expected = "assignment size mismatch")]
    fn assign_size_mismatch_is_a_bug() {
        use crate::ir::refs::VarId;
        let mut b = Block::new(BlockId(0));
        let dest = Ref::Var {
            id: VarId(0),
            size: 1,
            is_byte: true,
            reg_aligned: false,
        };
        b.assign(dest, Ref::Num(1));
    }
}
