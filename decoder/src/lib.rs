//! Alpha AXP instruction decoder
//!
//! Every Alpha instruction is a fixed 32-bit little-endian word. The primary
//! opcode in bits [31:26] selects one of four formats:
//!     - Operate: register/literal arithmetic, logic, shifts and FP operations
//!     - Memory: loads, stores, address arithmetic, barriers and jumps
//!     - Branch: PC-relative branches with a 21-bit displacement
//!     - PAL: calls into privileged library code
//!
//! **Example**
//!
//! [010000 | 00001 | 00010 | 000 | 0 | 0100000 | 00011]
//! [opcode | Ra    | Rb    | SBZ | L | function| Rc   ]
//!
//! - The opcode `0x10` tells us it is an integer arithmetic operate instruction.
//! - Bit 12 (`L`) is clear, so the second operand is register Rb rather than a literal.
//! - The function `0x20` selects ADDQ, so this word is `addq r1, r2, r3`.
//!
//! Decoding never fails: unknown opcodes and functions still produce a well-formed
//! [`DecodedInstruction`]; whether it can be executed is decided at dispatch.

pub mod function;
pub mod instruction;
pub mod opcode;
pub mod utils;

pub use instruction::{decode, DecodedInstruction, OperandB};
pub use opcode::{InstructionFormat, Opcode};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("code length = {0} which is not a multiple of 4")]
    UnalignedLength(usize),
}

/// Decodes little-endian Alpha instruction streams
#[derive(Debug, Default, Clone, Copy)]
pub struct InstructionDecoder;

impl InstructionDecoder {
    pub fn new() -> Self {
        Self
    }

    /// Decode consecutive instruction words starting at address `base`
    ///
    /// Returns each instruction together with its address.
    pub fn decode_bytes(
        &self,
        bytes: &[u8],
        base: u64,
    ) -> Result<Vec<(u64, DecodedInstruction)>, Error> {
        if bytes.len() % DecodedInstruction::size() != 0 {
            return Err(Error::UnalignedLength(bytes.len()));
        }

        Ok(bytes
            .chunks_exact(DecodedInstruction::size())
            .enumerate()
            .map(|(i, chunk)| {
                let word = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
                (base.wrapping_add(4 * i as u64), decode(word))
            })
            .collect())
    }
}
