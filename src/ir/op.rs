use super::refs::Ref;
use strum::Display;

/// Arithmetic and logic operators carried by `Op::Arith`. `Assign` is the
/// empty operator: dest takes the value of `y`.
#[allow(non_camel_case_types)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum ArithOp {
    #[strum(serialize = "=")]
    Assign,
    #[strum(serialize = "+")]
    Add,
    #[strum(serialize = "-")]
    Sub,
    #[strum(serialize = "*")]
    Mul,
    #[strum(serialize = "/")]
    Div,
    #[strum(serialize = "%")]
    Mod,
    #[strum(serialize = "&")]
    And,
    #[strum(serialize = "|")]
    Or,
    #[strum(serialize = "^")]
    Xor,
    #[strum(serialize = "<<")]
    Shl,
    #[strum(serialize = ">>")]
    Shr,
    #[strum(serialize = "==")]
    Eq,
    #[strum(serialize = "!=")]
    Ne,
    #[strum(serialize = "<")]
    Lt,
    #[strum(serialize = "<=")]
    Le,
    #[strum(serialize = ">")]
    Gt,
    #[strum(serialize = ">=")]
    Ge,
    #[strum(serialize = "neg")]
    Neg,
    #[strum(serialize = "not")]
    Not,
    #[strum(serialize = "bnot")]
    BitNot,
    #[strum(serialize = "make_str")]
    MakeStr,
}

impl ArithOp {
    /// Operators taking two operands; the rest take only `y`.
    pub fn is_binary(self) -> bool {
        !matches!(
            self,
            ArithOp::Assign
                | ArithOp::Neg
                | ArithOp::Not
                | ArithOp::BitNot
                | ArithOp::MakeStr
        )
    }
}

/// Size and placement of one parameter or result slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotSpec {
    pub size: i32,
    pub is_byte: bool,
    pub reg_aligned: bool,
}

impl SlotSpec {
    pub fn word() -> Self {
        SlotSpec {
            size: 4,
            is_byte: false,
            reg_aligned: true,
        }
    }

    pub fn byte() -> Self {
        SlotSpec {
            size: 1,
            is_byte: true,
            reg_aligned: false,
        }
    }
}

/// A function signature at the IR level: sized parameter and result slots.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FuncSig {
    pub params: Vec<SlotSpec>,
    pub results: Vec<SlotSpec>,
}

impl FuncSig {
    pub fn new(params: Vec<SlotSpec>, results: Vec<SlotSpec>) -> Self {
        FuncSig { params, results }
    }

    /// `() → ()`
    pub fn void() -> Self {
        FuncSig::default()
    }
}

/// One operation in a basic block.
#[derive(Debug, Clone, PartialEq)]
pub enum Op {
    /// Annotation only; emits nothing.
    Comment(String),
    /// `dest = x op y`; `x` is absent for assignment and unary operators.
    Arith {
        dest: Ref,
        x: Option<Ref>,
        op: ArithOp,
        y: Option<Ref>,
    },
    /// `dests... = f(args...)`
    Call {
        dests: Vec<Ref>,
        f: Ref,
        sig: FuncSig,
        args: Vec<Ref>,
    },
    /// Clears every byte of `dest`.
    Zero(Ref),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operators_print_their_source_form() {
        assert_eq!(ArithOp::Add.to_string(), "+");
        assert_eq!(ArithOp::Shr.to_string(), ">>");
        assert_eq!(ArithOp::MakeStr.to_string(), "make_str");
    }

    #[test]
    fn arity_classification() {
        assert!(ArithOp::Add.is_binary());
        assert!(ArithOp::Le.is_binary());
        assert!(!ArithOp::Assign.is_binary());
        assert!(!ArithOp::Neg.is_binary());
    }
}
