//! The E8 virtual architecture: a 32-bit little-endian machine with
//! fixed-width instruction words.

pub mod encode;
pub mod opcodes;

pub use encode::*;
pub use opcodes::Opcode;

use num_enum::{IntoPrimitive, TryFromPrimitive};

/// Machine word size in bytes. "Register-aligned" means aligned to this.
pub const REG_SIZE: i32 = 4;

/// Default initial program counter; the loader maps the code section here
/// unless a job overrides it.
pub const INIT_PC: u32 = 0x8000;

/// The register file. R0 is hardwired to zero. SP and RA have fixed roles
/// in the calling convention: SP is the stack pointer, RA receives the
/// return address written by `jal`/`jalr`.
#[allow(non_camel_case_types)]
#[derive(
    Debug, Eq, PartialEq, Copy, Clone, IntoPrimitive, TryFromPrimitive,
)]
#[repr(u8)]
pub enum Reg {
    R0 = 0,
    R1 = 1,
    R2 = 2,
    R3 = 3,
    R4 = 4,
    SP = 14,
    RA = 15,
}
