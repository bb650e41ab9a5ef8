//! Instruction word builders
//!
//! Words are packed field by field, MSB-first, with [`BitWriter`], so the field layout reads in
//! the same order as the architecture manual. Used by tests, the disassembler round trip and
//! anyone hand-assembling guest code.
//!
//! Every field is range-checked before it is packed: a register above 31, a function code wider
//! than its field or a displacement outside its signed range is an [`AsmError`], never a
//! truncated word.

use axp_decoder::{
    function::{inta, intl, pal},
    Opcode,
};
use x64_emitter::BitWriter;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AsmError {
    #[error("register {0} is out of range")]
    Register(u8),
    #[error("{field} {value:#x} does not fit in {width} bits")]
    Unsigned { field: &'static str, value: u32, width: u32 },
    #[error("{field} {value} does not fit in {width} signed bits")]
    Signed { field: &'static str, value: i32, width: u32 },
    #[error("fields add up to {0} bits instead of 32")]
    Layout(u32),
}

pub type Result<T> = std::result::Result<T, AsmError>;

fn reg(index: u8) -> Result<u64> {
    if index < 32 {
        Ok(index as u64)
    } else {
        Err(AsmError::Register(index))
    }
}

fn unsigned(field: &'static str, value: u32, width: u32) -> Result<u64> {
    if (value as u64) >> width == 0 {
        Ok(value as u64)
    } else {
        Err(AsmError::Unsigned { field, value, width })
    }
}

/// Two's-complement image of `value` in `width` bits
fn signed(field: &'static str, value: i32, width: u32) -> Result<u64> {
    let half = 1i64 << (width - 1);
    if (-half..half).contains(&(value as i64)) {
        Ok(value as u32 as u64 & ((1 << width) - 1))
    } else {
        Err(AsmError::Signed { field, value, width })
    }
}

/// Pack `(value, width)` fields into one instruction word
fn pack(fields: &[(u64, u32)]) -> Result<u32> {
    let total: u32 = fields.iter().map(|&(_, width)| width).sum();
    if total != 32 {
        return Err(AsmError::Layout(total));
    }
    let mut writer = BitWriter::new();
    for &(value, width) in fields {
        writer.write_bits(value, width);
    }
    let buf = writer.finish();
    <[u8; 4]>::try_from(buf.as_bytes())
        .map(u32::from_be_bytes)
        .map_err(|_| AsmError::Layout(total))
}

fn opcode(opcode: Opcode) -> (u64, u32) {
    (opcode.bits() as u64, 6)
}

/// Operate format with a register second operand
pub fn operate(op: Opcode, ra: u8, rb: u8, function: u32, rc: u8) -> Result<u32> {
    pack(&[
        opcode(op),
        (reg(ra)?, 5),
        (reg(rb)?, 5),
        (0, 3),
        (0, 1),
        (unsigned("function", function, 7)?, 7),
        (reg(rc)?, 5),
    ])
}

/// Operate format with an 8-bit literal second operand
pub fn operate_literal(op: Opcode, ra: u8, literal: u8, function: u32, rc: u8) -> Result<u32> {
    pack(&[
        opcode(op),
        (reg(ra)?, 5),
        (literal as u64, 8),
        (1, 1),
        (unsigned("function", function, 7)?, 7),
        (reg(rc)?, 5),
    ])
}

/// Floating operate format with its 11-bit function
pub fn fp_operate(op: Opcode, fa: u8, fb: u8, function: u32, fc: u8) -> Result<u32> {
    pack(&[
        opcode(op),
        (reg(fa)?, 5),
        (reg(fb)?, 5),
        (unsigned("function", function, 11)?, 11),
        (reg(fc)?, 5),
    ])
}

pub fn memory(op: Opcode, ra: u8, rb: u8, displacement: i16) -> Result<u32> {
    pack(&[opcode(op), (reg(ra)?, 5), (reg(rb)?, 5), (displacement as u16 as u64, 16)])
}

/// MISC (0x18) with its function in displacement bits [15:10]
pub fn misc(function: u32, ra: u8, rb: u8) -> Result<u32> {
    pack(&[
        opcode(Opcode::Misc),
        (reg(ra)?, 5),
        (reg(rb)?, 5),
        (unsigned("function", function, 6)?, 6),
        (0, 10),
    ])
}

/// Jump group (0x1A) with a zero hint
pub fn jump(function: u32, ra: u8, rb: u8) -> Result<u32> {
    pack(&[
        opcode(Opcode::Jsr),
        (reg(ra)?, 5),
        (reg(rb)?, 5),
        (unsigned("function", function, 2)?, 2),
        (0, 14),
    ])
}

/// Branch format; `displacement` counts instructions from the following one
pub fn branch(op: Opcode, ra: u8, displacement: i32) -> Result<u32> {
    pack(&[opcode(op), (reg(ra)?, 5), (signed("displacement", displacement, 21)?, 21)])
}

pub fn call_pal(function: u32) -> Result<u32> {
    pack(&[opcode(Opcode::CallPal), (unsigned("function", function, 26)?, 26)])
}

// Shorthands for the instructions hand-written programs use most

pub fn addq(ra: u8, rb: u8, rc: u8) -> Result<u32> {
    operate(Opcode::IntA, ra, rb, inta::ADDQ, rc)
}

pub fn addq_lit(ra: u8, literal: u8, rc: u8) -> Result<u32> {
    operate_literal(Opcode::IntA, ra, literal, inta::ADDQ, rc)
}

pub fn subq_lit(ra: u8, literal: u8, rc: u8) -> Result<u32> {
    operate_literal(Opcode::IntA, ra, literal, inta::SUBQ, rc)
}

/// `BIS ra, rb, rc`, the canonical register move and no-op
pub fn bis(ra: u8, rb: u8, rc: u8) -> Result<u32> {
    operate(Opcode::IntL, ra, rb, intl::BIS, rc)
}

pub fn nop() -> u32 {
    0x47FF_041F
}

pub fn lda(ra: u8, rb: u8, displacement: i16) -> Result<u32> {
    memory(Opcode::Lda, ra, rb, displacement)
}

pub fn ldq(ra: u8, rb: u8, displacement: i16) -> Result<u32> {
    memory(Opcode::Ldq, ra, rb, displacement)
}

pub fn stq(ra: u8, rb: u8, displacement: i16) -> Result<u32> {
    memory(Opcode::Stq, ra, rb, displacement)
}

pub fn br(ra: u8, displacement: i32) -> Result<u32> {
    branch(Opcode::Br, ra, displacement)
}

pub fn bne(ra: u8, displacement: i32) -> Result<u32> {
    branch(Opcode::Bne, ra, displacement)
}

pub fn halt() -> u32 {
    pal::HALT
}

/// A straight run of instruction words
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Program {
    words: Vec<u32>,
}

impl Program {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, word: u32) -> &mut Self {
        self.words.push(word);
        self
    }

    /// Append the result of a builder, keeping the program unchanged on error
    pub fn emit(&mut self, word: Result<u32>) -> Result<&mut Self> {
        self.words.push(word?);
        Ok(self)
    }

    pub fn extend(&mut self, words: &[u32]) -> &mut Self {
        self.words.extend_from_slice(words);
        self
    }

    /// Byte offset of the next instruction
    pub fn offset(&self) -> u64 {
        4 * self.words.len() as u64
    }

    pub fn words(&self) -> &[u32] {
        &self.words
    }

    /// Little-endian image
    pub fn to_bytes(&self) -> Vec<u8> {
        self.words.iter().flat_map(|w| w.to_le_bytes()).collect()
    }
}
