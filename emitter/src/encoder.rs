//! Prefix, REX and ModRM encoding
//!
//! Every instruction the emitter produces goes through one of the functions in
//! this module, so operand-role to bit-field mapping lives in one place.
//!
//! Layout of an encoded instruction:
/*
    ------------------------------------------------------------------
    | legacy prefix | REX      | opcode   | ModRM | SIB | disp | imm |
    | 66/F2/F3      | 0100WRXB | 1-3 bytes|       |     |      |     |
    ------------------------------------------------------------------
*/
//! The legacy prefix (mandatory for SSE) always precedes REX. REX is omitted
//! when none of W/R/X/B is set, unless a byte operand names SPL/BPL/SIL/DIL.

use crate::{
    buffer::CodeBuffer,
    reg::{Gpr, Width},
};

/// ModRM addressing modes
const MOD_DISP32: u8 = 0b10;
const MOD_REG: u8 = 0b11;

/// rm value announcing a SIB byte
const RM_SIB: u8 = 0b100;

/// Two-operand integer operations with a `r/m, reg` form
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum AluOp {
    Add,
    Or,
    And,
    Sub,
    Xor,
    Cmp,
    Mov,
    Test,
}

impl AluOp {
    /// Opcode of the `op r/m, reg` form
    pub const fn rm_reg_opcode(self) -> u8 {
        match self {
            AluOp::Add => 0x01,
            AluOp::Or => 0x09,
            AluOp::And => 0x21,
            AluOp::Sub => 0x29,
            AluOp::Xor => 0x31,
            AluOp::Cmp => 0x39,
            AluOp::Mov => 0x89,
            AluOp::Test => 0x85,
        }
    }

    /// Opcode and ModRM.reg extension of the `op r/m, imm32` form
    pub const fn imm32_opcode(self) -> (u8, u8) {
        match self {
            AluOp::Add => (0x81, 0),
            AluOp::Or => (0x81, 1),
            AluOp::And => (0x81, 4),
            AluOp::Sub => (0x81, 5),
            AluOp::Xor => (0x81, 6),
            AluOp::Cmp => (0x81, 7),
            AluOp::Mov => (0xC7, 0),
            AluOp::Test => (0xF7, 0),
        }
    }
}

/// Compute the REX byte, or `None` when it can be omitted
pub const fn rex(w: bool, reg: u8, index: u8, rm: u8, force: bool) -> Option<u8> {
    let rex = 0x40
        | ((w as u8) << 3)
        | (((reg >> 3) & 1) << 2)
        | (((index >> 3) & 1) << 1)
        | ((rm >> 3) & 1);
    if rex != 0x40 || force {
        Some(rex)
    } else {
        None
    }
}

#[inline]
pub const fn modrm(mode: u8, reg: u8, rm: u8) -> u8 {
    ((mode & 0x3) << 6) | ((reg & 0x7) << 3) | (rm & 0x7)
}

#[inline]
const fn sib(scale: u8, index: u8, base: u8) -> u8 {
    ((scale & 0x3) << 6) | ((index & 0x7) << 3) | (base & 0x7)
}

fn emit_prefix_rex(buf: &mut CodeBuffer, prefix: Option<u8>, rex_byte: Option<u8>) {
    if let Some(p) = prefix {
        buf.push_u8(p);
    }
    if let Some(r) = rex_byte {
        buf.push_u8(r);
    }
}

/// Register-direct form: `[prefix] [REX] opcode ModRM(11, reg, rm)`
///
/// `reg` is either a register index or an opcode extension (`/digit`).
pub fn encode_rr(
    buf: &mut CodeBuffer,
    prefix: Option<u8>,
    w: bool,
    opcode: &[u8],
    reg: u8,
    rm: u8,
    force_rex: bool,
) {
    emit_prefix_rex(buf, prefix, rex(w, reg, 0, rm, force_rex));
    buf.extend(opcode);
    buf.push_u8(modrm(MOD_REG, reg, rm));
}

/// Memory form with a 32-bit displacement: `[prefix] [REX] opcode ModRM [SIB] disp32`
#[allow(clippy::too_many_arguments)]
pub fn encode_mem(
    buf: &mut CodeBuffer,
    prefix: Option<u8>,
    w: bool,
    opcode: &[u8],
    reg: u8,
    base: Gpr,
    disp: i32,
    force_rex: bool,
) {
    let base = base.index();
    emit_prefix_rex(buf, prefix, rex(w, reg, 0, base, force_rex));
    buf.extend(opcode);
    // rsp and r12 as base need a SIB byte with no index
    if base & 0x7 == RM_SIB {
        buf.push_u8(modrm(MOD_DISP32, reg, RM_SIB));
        buf.push_u8(sib(0, RM_SIB, base));
    } else {
        buf.push_u8(modrm(MOD_DISP32, reg, base));
    }
    buf.push_u32(disp as u32);
}

/// `op dst, src` for the integer ALU operations
pub fn encode_alu(buf: &mut CodeBuffer, op: AluOp, dst: Gpr, src: Gpr, width: Width) {
    encode_rr(buf, None, width.rex_w(), &[op.rm_reg_opcode()], src.index(), dst.index(), false);
}

/// `op dst, imm32` for the integer ALU operations
pub fn encode_alu_imm(buf: &mut CodeBuffer, op: AluOp, dst: Gpr, imm: i32, width: Width) {
    let (opcode, ext) = op.imm32_opcode();
    encode_rr(buf, None, width.rex_w(), &[opcode], ext, dst.index(), false);
    buf.push_u32(imm as u32);
}

/// Opcode byte with the register folded into its low three bits (push, pop, mov imm)
pub fn encode_plus_reg(buf: &mut CodeBuffer, w: bool, base_opcode: u8, reg: Gpr) {
    emit_prefix_rex(buf, None, rex(w, 0, 0, reg.index(), false));
    buf.push_u8(base_opcode + (reg.index() & 0x7));
}
