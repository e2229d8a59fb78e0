//! The intermediate representation: packages of functions, global
//! variables and interned strings. Functions are chains of basic blocks;
//! the emitter lowers them to E8 instruction words.

pub mod block;
pub mod func;
pub mod names;
pub mod op;
pub mod pkg;
pub mod refs;
pub mod str_pool;

pub use block::{Block, BlockId, Jump};
pub use func::{Func, SlotKind, VarSlot};
pub use names::NameGen;
pub use op::{ArithOp, FuncSig, Op, SlotSpec};
pub use pkg::Pkg;
pub use refs::{Ref, StrId, VarId};
pub use str_pool::{StrConst, StrPool};
