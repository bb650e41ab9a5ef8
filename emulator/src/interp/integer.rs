//! Integer operate instructions: arithmetic, logical, shifts, byte manipulation, multiply and
//! the count/extension group

use axp_core::{update_condition_codes, update_condition_codes_32, Trap};
use axp_decoder::{
    function::{fpti, inta, intl, intm, ints},
    DecodedInstruction, Opcode,
};

use super::{sext32, ExecContext, Flow, InterpHandler};
use crate::dispatch::TableBuilder;

/// IMPLVER value reported for an EV6-class implementation
pub const IMPLVER: u64 = 2;
/// AMASK feature bits present: BWX, FIX and CIX
pub const AMASK_FEATURES: u64 = 0x7;

pub(super) fn register(b: &mut TableBuilder<InterpHandler>) {
    b.function(Opcode::IntA, inta::ADDL, addl)
        .function(Opcode::IntA, inta::S4ADDL, s4addl)
        .function(Opcode::IntA, inta::S8ADDL, s8addl)
        .function(Opcode::IntA, inta::SUBL, subl)
        .function(Opcode::IntA, inta::S4SUBL, s4subl)
        .function(Opcode::IntA, inta::S8SUBL, s8subl)
        .function(Opcode::IntA, inta::ADDQ, addq)
        .function(Opcode::IntA, inta::S4ADDQ, s4addq)
        .function(Opcode::IntA, inta::S8ADDQ, s8addq)
        .function(Opcode::IntA, inta::SUBQ, subq)
        .function(Opcode::IntA, inta::S4SUBQ, s4subq)
        .function(Opcode::IntA, inta::S8SUBQ, s8subq)
        .function(Opcode::IntA, inta::ADDL_V, addl_v)
        .function(Opcode::IntA, inta::SUBL_V, subl_v)
        .function(Opcode::IntA, inta::ADDQ_V, addq_v)
        .function(Opcode::IntA, inta::SUBQ_V, subq_v)
        .function(Opcode::IntA, inta::CMPEQ, cmpeq)
        .function(Opcode::IntA, inta::CMPLT, cmplt)
        .function(Opcode::IntA, inta::CMPLE, cmple)
        .function(Opcode::IntA, inta::CMPULT, cmpult)
        .function(Opcode::IntA, inta::CMPULE, cmpule)
        .function(Opcode::IntA, inta::CMPBGE, cmpbge_op);

    b.function(Opcode::IntL, intl::AND, and)
        .function(Opcode::IntL, intl::BIC, bic)
        .function(Opcode::IntL, intl::BIS, bis)
        .function(Opcode::IntL, intl::ORNOT, ornot)
        .function(Opcode::IntL, intl::XOR, xor)
        .function(Opcode::IntL, intl::EQV, eqv)
        .functions(
            Opcode::IntL,
            &[
                intl::CMOVEQ,
                intl::CMOVNE,
                intl::CMOVLT,
                intl::CMOVGE,
                intl::CMOVLE,
                intl::CMOVGT,
                intl::CMOVLBS,
                intl::CMOVLBC,
            ],
            cmov,
        )
        .function(Opcode::IntL, intl::AMASK, amask)
        .function(Opcode::IntL, intl::IMPLVER, implver);

    b.function(Opcode::IntS, ints::SLL, sll)
        .function(Opcode::IntS, ints::SRL, srl)
        .function(Opcode::IntS, ints::SRA, sra)
        .function(Opcode::IntS, ints::ZAP, zap_op)
        .function(Opcode::IntS, ints::ZAPNOT, zapnot_op)
        .functions(
            Opcode::IntS,
            &[
                ints::EXTBL,
                ints::EXTWL,
                ints::EXTLL,
                ints::EXTQL,
                ints::EXTWH,
                ints::EXTLH,
                ints::EXTQH,
                ints::INSBL,
                ints::INSWL,
                ints::INSLL,
                ints::INSQL,
                ints::INSWH,
                ints::INSLH,
                ints::INSQH,
                ints::MSKBL,
                ints::MSKWL,
                ints::MSKLL,
                ints::MSKQL,
                ints::MSKWH,
                ints::MSKLH,
                ints::MSKQH,
            ],
            byte_manipulation,
        );

    b.function(Opcode::IntM, intm::MULL, mull)
        .function(Opcode::IntM, intm::MULQ, mulq)
        .function(Opcode::IntM, intm::UMULH, umulh)
        .function(Opcode::IntM, intm::MULL_V, mull_v)
        .function(Opcode::IntM, intm::MULQ_V, mulq_v);

    b.function(Opcode::Fpti, fpti::SEXTB, sextb)
        .function(Opcode::Fpti, fpti::SEXTW, sextw)
        .function(Opcode::Fpti, fpti::CTPOP, ctpop)
        .function(Opcode::Fpti, fpti::CTLZ, ctlz)
        .function(Opcode::Fpti, fpti::CTTZ, cttz);
}

type Result = std::result::Result<Flow, Trap>;

// Arithmetic

fn addl(ctx: &mut ExecContext<'_>, insn: &DecodedInstruction) -> Result {
    ctx.int_op(insn, |a, b| sext32(a.wrapping_add(b)))
}

fn s4addl(ctx: &mut ExecContext<'_>, insn: &DecodedInstruction) -> Result {
    ctx.int_op(insn, |a, b| sext32((a << 2).wrapping_add(b)))
}

fn s8addl(ctx: &mut ExecContext<'_>, insn: &DecodedInstruction) -> Result {
    ctx.int_op(insn, |a, b| sext32((a << 3).wrapping_add(b)))
}

fn subl(ctx: &mut ExecContext<'_>, insn: &DecodedInstruction) -> Result {
    ctx.int_op(insn, |a, b| sext32(a.wrapping_sub(b)))
}

fn s4subl(ctx: &mut ExecContext<'_>, insn: &DecodedInstruction) -> Result {
    ctx.int_op(insn, |a, b| sext32((a << 2).wrapping_sub(b)))
}

fn s8subl(ctx: &mut ExecContext<'_>, insn: &DecodedInstruction) -> Result {
    ctx.int_op(insn, |a, b| sext32((a << 3).wrapping_sub(b)))
}

fn addq(ctx: &mut ExecContext<'_>, insn: &DecodedInstruction) -> Result {
    ctx.int_op(insn, |a, b| a.wrapping_add(b))
}

fn s4addq(ctx: &mut ExecContext<'_>, insn: &DecodedInstruction) -> Result {
    ctx.int_op(insn, |a, b| (a << 2).wrapping_add(b))
}

fn s8addq(ctx: &mut ExecContext<'_>, insn: &DecodedInstruction) -> Result {
    ctx.int_op(insn, |a, b| (a << 3).wrapping_add(b))
}

fn subq(ctx: &mut ExecContext<'_>, insn: &DecodedInstruction) -> Result {
    ctx.int_op(insn, |a, b| a.wrapping_sub(b))
}

fn s4subq(ctx: &mut ExecContext<'_>, insn: &DecodedInstruction) -> Result {
    ctx.int_op(insn, |a, b| (a << 2).wrapping_sub(b))
}

fn s8subq(ctx: &mut ExecContext<'_>, insn: &DecodedInstruction) -> Result {
    ctx.int_op(insn, |a, b| (a << 3).wrapping_sub(b))
}

fn addl_v(ctx: &mut ExecContext<'_>, insn: &DecodedInstruction) -> Result {
    ctx.int_op_checked(insn, |a, b| {
        let r = a.wrapping_add(b);
        (!update_condition_codes_32(r, a, b, false).overflow).then(|| sext32(r))
    })
}

fn subl_v(ctx: &mut ExecContext<'_>, insn: &DecodedInstruction) -> Result {
    ctx.int_op_checked(insn, |a, b| {
        let r = a.wrapping_sub(b);
        (!update_condition_codes_32(r, a, b, true).overflow).then(|| sext32(r))
    })
}

fn addq_v(ctx: &mut ExecContext<'_>, insn: &DecodedInstruction) -> Result {
    ctx.int_op_checked(insn, |a, b| {
        let r = a.wrapping_add(b);
        (!update_condition_codes(r, a, b, false).overflow).then_some(r)
    })
}

fn subq_v(ctx: &mut ExecContext<'_>, insn: &DecodedInstruction) -> Result {
    ctx.int_op_checked(insn, |a, b| {
        let r = a.wrapping_sub(b);
        (!update_condition_codes(r, a, b, true).overflow).then_some(r)
    })
}

// Compares

fn compare(a: u64, b: u64) -> axp_core::ConditionCodes {
    update_condition_codes(a.wrapping_sub(b), a, b, true)
}

fn cmpeq(ctx: &mut ExecContext<'_>, insn: &DecodedInstruction) -> Result {
    ctx.int_op(insn, |a, b| (a == b) as u64)
}

fn cmplt(ctx: &mut ExecContext<'_>, insn: &DecodedInstruction) -> Result {
    ctx.int_op(insn, |a, b| compare(a, b).less() as u64)
}

fn cmple(ctx: &mut ExecContext<'_>, insn: &DecodedInstruction) -> Result {
    ctx.int_op(insn, |a, b| {
        let cc = compare(a, b);
        (cc.less() || cc.zero) as u64
    })
}

fn cmpult(ctx: &mut ExecContext<'_>, insn: &DecodedInstruction) -> Result {
    ctx.int_op(insn, |a, b| compare(a, b).below() as u64)
}

fn cmpule(ctx: &mut ExecContext<'_>, insn: &DecodedInstruction) -> Result {
    ctx.int_op(insn, |a, b| {
        let cc = compare(a, b);
        (cc.below() || cc.zero) as u64
    })
}

/// Bit i set when byte i of `a` is unsigned greater or equal to byte i of `b`
pub fn cmpbge(a: u64, b: u64) -> u64 {
    let (a, b) = (a.to_le_bytes(), b.to_le_bytes());
    (0..8).filter(|&i| a[i] >= b[i]).fold(0, |mask, i| mask | (1 << i))
}

fn cmpbge_op(ctx: &mut ExecContext<'_>, insn: &DecodedInstruction) -> Result {
    ctx.int_op(insn, cmpbge)
}

// Logical

fn and(ctx: &mut ExecContext<'_>, insn: &DecodedInstruction) -> Result {
    ctx.int_op(insn, |a, b| a & b)
}

fn bic(ctx: &mut ExecContext<'_>, insn: &DecodedInstruction) -> Result {
    ctx.int_op(insn, |a, b| a & !b)
}

fn bis(ctx: &mut ExecContext<'_>, insn: &DecodedInstruction) -> Result {
    ctx.int_op(insn, |a, b| a | b)
}

fn ornot(ctx: &mut ExecContext<'_>, insn: &DecodedInstruction) -> Result {
    ctx.int_op(insn, |a, b| a | !b)
}

fn xor(ctx: &mut ExecContext<'_>, insn: &DecodedInstruction) -> Result {
    ctx.int_op(insn, |a, b| a ^ b)
}

fn eqv(ctx: &mut ExecContext<'_>, insn: &DecodedInstruction) -> Result {
    ctx.int_op(insn, |a, b| a ^ !b)
}

/// Condition tested by a CMOVxx function code against Ra
pub fn cmov_condition(function: u32, a: u64) -> bool {
    let signed = a as i64;
    match function {
        intl::CMOVEQ => a == 0,
        intl::CMOVNE => a != 0,
        intl::CMOVLT => signed < 0,
        intl::CMOVGE => signed >= 0,
        intl::CMOVLE => signed <= 0,
        intl::CMOVGT => signed > 0,
        intl::CMOVLBS => a & 1 == 1,
        _ => a & 1 == 0,
    }
}

fn cmov(ctx: &mut ExecContext<'_>, insn: &DecodedInstruction) -> Result {
    let op = ctx.operate(insn)?;
    if cmov_condition(op.function, ctx.read(op.ra)) {
        let value = ctx.operand_b(op.rb);
        ctx.write(op.rc, value);
    }
    Ok(Flow::Next)
}

fn amask(ctx: &mut ExecContext<'_>, insn: &DecodedInstruction) -> Result {
    ctx.int_op(insn, |_, b| b & !AMASK_FEATURES)
}

fn implver(ctx: &mut ExecContext<'_>, insn: &DecodedInstruction) -> Result {
    ctx.int_op(insn, |_, _| IMPLVER)
}

// Shifts and byte manipulation

fn sll(ctx: &mut ExecContext<'_>, insn: &DecodedInstruction) -> Result {
    ctx.int_op(insn, |a, b| a << (b & 63))
}

fn srl(ctx: &mut ExecContext<'_>, insn: &DecodedInstruction) -> Result {
    ctx.int_op(insn, |a, b| a >> (b & 63))
}

fn sra(ctx: &mut ExecContext<'_>, insn: &DecodedInstruction) -> Result {
    ctx.int_op(insn, |a, b| ((a as i64) >> (b & 63)) as u64)
}

/// Keep the bytes of `value` whose bit is set in `mask`
pub fn zapnot(value: u64, mask: u64) -> u64 {
    (0..8)
        .filter(|i| mask & (1 << i) != 0)
        .fold(0, |out, i| out | (value & (0xFF << (8 * i))))
}

/// Clear the bytes of `value` whose bit is set in `mask`
pub fn zap(value: u64, mask: u64) -> u64 {
    zapnot(value, !mask)
}

fn zap_op(ctx: &mut ExecContext<'_>, insn: &DecodedInstruction) -> Result {
    ctx.int_op(insn, zap)
}

fn zapnot_op(ctx: &mut ExecContext<'_>, insn: &DecodedInstruction) -> Result {
    ctx.int_op(insn, zapnot)
}

/// Byte mask of the operand size selected by an EXT/INS/MSK function code
fn size_mask(function: u32) -> u64 {
    match function & 0x30 {
        0x00 => 0x01,
        0x10 => 0x03,
        0x20 => 0x0F,
        _ => 0xFF,
    }
}

/// EXTxL/EXTxH/INSxL/INSxH/MSKxL/MSKxH selected by `function`
///
/// `b` supplies the byte offset in its low three bits.
pub fn byte_op(function: u32, a: u64, b: u64) -> u64 {
    let offset = b & 7;
    let mask = size_mask(function);
    let high = function & 0x40 != 0;
    match (function & 0x0F, high) {
        // EXT
        (0x6, false) | (0xA, true) => {
            if high {
                zapnot(a << ((64 - 8 * offset) & 63), mask)
            } else {
                zapnot(a >> (8 * offset), mask)
            }
        }
        // INS
        (0xB, false) | (0x7, true) => {
            if high {
                let bytes = (mask << offset) >> 8;
                if offset == 0 {
                    0
                } else {
                    zapnot(a >> (64 - 8 * offset), bytes)
                }
            } else {
                zapnot(a << (8 * offset), (mask << offset) & 0xFF)
            }
        }
        // MSK
        _ => {
            let bytes = if high { (mask << offset) >> 8 } else { (mask << offset) & 0xFF };
            zap(a, bytes)
        }
    }
}

fn byte_manipulation(ctx: &mut ExecContext<'_>, insn: &DecodedInstruction) -> Result {
    let function = ctx.operate(insn)?.function;
    ctx.int_op(insn, |a, b| byte_op(function, a, b))
}

// Multiply

fn mull(ctx: &mut ExecContext<'_>, insn: &DecodedInstruction) -> Result {
    ctx.int_op(insn, |a, b| sext32(a.wrapping_mul(b)))
}

fn mulq(ctx: &mut ExecContext<'_>, insn: &DecodedInstruction) -> Result {
    ctx.int_op(insn, |a, b| a.wrapping_mul(b))
}

fn umulh(ctx: &mut ExecContext<'_>, insn: &DecodedInstruction) -> Result {
    ctx.int_op(insn, |a, b| ((a as u128 * b as u128) >> 64) as u64)
}

fn mull_v(ctx: &mut ExecContext<'_>, insn: &DecodedInstruction) -> Result {
    ctx.int_op_checked(insn, |a, b| {
        (a as i32).checked_mul(b as i32).map(|r| r as i64 as u64)
    })
}

fn mulq_v(ctx: &mut ExecContext<'_>, insn: &DecodedInstruction) -> Result {
    ctx.int_op_checked(insn, |a, b| (a as i64).checked_mul(b as i64).map(|r| r as u64))
}

// Count and sign extension, operating on Rb only

fn sextb(ctx: &mut ExecContext<'_>, insn: &DecodedInstruction) -> Result {
    ctx.int_op(insn, |_, b| b as i8 as i64 as u64)
}

fn sextw(ctx: &mut ExecContext<'_>, insn: &DecodedInstruction) -> Result {
    ctx.int_op(insn, |_, b| b as i16 as i64 as u64)
}

fn ctpop(ctx: &mut ExecContext<'_>, insn: &DecodedInstruction) -> Result {
    ctx.int_op(insn, |_, b| b.count_ones() as u64)
}

fn ctlz(ctx: &mut ExecContext<'_>, insn: &DecodedInstruction) -> Result {
    ctx.int_op(insn, |_, b| b.leading_zeros() as u64)
}

fn cttz(ctx: &mut ExecContext<'_>, insn: &DecodedInstruction) -> Result {
    ctx.int_op(insn, |_, b| b.trailing_zeros() as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cmpbge() {
        assert_eq!(cmpbge(0, 0), 0xFF);
        assert_eq!(cmpbge(0x01, 0x02), 0xFE);
        assert_eq!(cmpbge(0xFF00_0000_0000_0000, 0x0100_0000_0000_0000), 0xFF);
        assert_eq!(cmpbge(0x0100_0000_0000_0000, 0xFF00_0000_0000_0000), 0x7F);
    }

    #[test]
    fn test_zap() {
        assert_eq!(zapnot(0x1122_3344_5566_7788, 0x0F), 0x5566_7788);
        assert_eq!(zap(0x1122_3344_5566_7788, 0x0F), 0x1122_3344_0000_0000);
    }

    #[test]
    fn test_extract() {
        let a = 0x1122_3344_5566_7788;
        assert_eq!(byte_op(ints::EXTBL, a, 1), 0x77);
        assert_eq!(byte_op(ints::EXTWL, a, 2), 0x5566);
        assert_eq!(byte_op(ints::EXTLL, a, 4), 0x1122_3344);
        assert_eq!(byte_op(ints::EXTQL, a, 0), a);
        // unaligned quadword from two halves
        assert_eq!(byte_op(ints::EXTQH, a, 3), 0x6677_8800_0000_0000);
        assert_eq!(byte_op(ints::EXTWH, a, 7), 0x8800);
        assert_eq!(byte_op(ints::EXTQH, a, 0), a);
    }

    #[test]
    fn test_insert_and_mask() {
        assert_eq!(byte_op(ints::INSBL, 0xAB, 3), 0xAB00_0000);
        assert_eq!(byte_op(ints::INSWL, 0x1234, 7), 0x3400_0000_0000_0000);
        assert_eq!(byte_op(ints::INSWH, 0x1234, 7), 0x12);
        assert_eq!(byte_op(ints::INSQH, 0x1122_3344_5566_7788, 0), 0);
        assert_eq!(byte_op(ints::MSKBL, u64::MAX, 2), 0xFFFF_FFFF_FF00_FFFF);
        assert_eq!(byte_op(ints::MSKWH, u64::MAX, 7), 0xFFFF_FFFF_FFFF_FF00);
        assert_eq!(byte_op(ints::MSKQL, u64::MAX, 0), 0);
    }

    #[test]
    fn test_cmov_conditions() {
        assert!(cmov_condition(intl::CMOVEQ, 0));
        assert!(cmov_condition(intl::CMOVLT, u64::MAX));
        assert!(!cmov_condition(intl::CMOVGT, 0));
        assert!(cmov_condition(intl::CMOVLBS, 3));
        assert!(cmov_condition(intl::CMOVLBC, 2));
    }
}
