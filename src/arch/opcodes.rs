use num_enum::{IntoPrimitive, TryFromPrimitive};
use strum::Display;

/// E8 opcodes. The opcode byte lives in bits [31:24] of the instruction
/// word; the remaining bits are form-specific (see `encode`).
#[allow(non_camel_case_types)]
#[derive(
    Debug,
    Eq,
    PartialEq,
    TryFromPrimitive,
    Copy,
    Clone,
    Display,
    IntoPrimitive,
)]
#[repr(u8)]
pub enum Opcode {
    // the all-zero word stops the machine
    HALT = 0x00,

    // register form: rd, rs1, rs2
    ADD = 0x10,
    SUB = 0x11,
    MUL = 0x12,
    DIV = 0x13,
    MOD = 0x14,
    AND = 0x15,
    OR = 0x16,
    XOR = 0x17,
    SLL = 0x18,
    SRL = 0x19,
    SLT = 0x1a, // rd = (rs1 < rs2) as signed compare
    SEQ = 0x1b, // rd = (rs1 == rs2)
    JR = 0x1e,  // jump to rs1
    JALR = 0x1f, // jump to rs1, return address into RA

    // immediate form: rd, rs1, imm16
    ADDI = 0x20, // imm is sign-extended
    ORI = 0x21,  // imm is zero-extended
    XORI = 0x22, // imm is zero-extended
    LUI = 0x23,  // rd = imm << 16
    LW = 0x28,   // rd = word at rs1 + signed imm
    LB = 0x29,   // rd = byte at rs1 + signed imm, zero-extended
    SW = 0x2a,   // word at rs1 + signed imm = rd
    SB = 0x2b,   // byte at rs1 + signed imm = low byte of rd

    // branch form: rs1, rs2, signed 16-bit word displacement
    BEQ = 0x30,
    BNE = 0x31,

    // jump form: signed 24-bit word displacement in bits [23:0]
    J = 0x38,
    JAL = 0x39,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opcode_round_trips_through_byte() {
        for op in [Opcode::HALT, Opcode::ADD, Opcode::LUI, Opcode::JAL] {
            let byte: u8 = op.into();
            assert_eq!(Opcode::try_from(byte).unwrap(), op);
        }
        assert!(Opcode::try_from(0xffu8).is_err());
    }
}
