//! IEEE floating point: arithmetic, compares, conversions, sign copies, FPCR moves, FCMOV and
//! the integer/floating register transfers
//!
//! Registers hold S-format values widened to T format; single-precision results are rounded to
//! single and widened back. Only round-to-nearest is modelled, except for CVTTQ/C.

use axp_core::{fpcr, ProcessorContext, Trap, TrapKind};
use axp_decoder::{
    function::{fltl, flti, fpti, itfp},
    DecodedInstruction, Opcode, OperandB,
};

use super::{control::fp_condition, sext32, ExecContext, Flow, InterpHandler, OperateFields};
use crate::dispatch::TableBuilder;

/// Value written by a true floating compare (2.0)
pub const FP_TRUE: u64 = 0x4000_0000_0000_0000;

const SIGN: u64 = 1 << 63;
/// Sign and exponent bits copied by CPYSE
const SIGN_EXPONENT: u64 = 0xFFF0_0000_0000_0000;

pub(super) fn register(b: &mut TableBuilder<InterpHandler>) {
    b.function(Opcode::Itfp, itfp::ITOFS, itofs)
        .function(Opcode::Itfp, itfp::ITOFT, itoft)
        .function(Opcode::Itfp, itfp::SQRTS, sqrts)
        .function(Opcode::Itfp, itfp::SQRTT, sqrtt);

    b.function(Opcode::FltI, flti::ADDS, adds)
        .function(Opcode::FltI, flti::SUBS, subs)
        .function(Opcode::FltI, flti::MULS, muls)
        .function(Opcode::FltI, flti::DIVS, divs)
        .function(Opcode::FltI, flti::ADDT, addt)
        .function(Opcode::FltI, flti::SUBT, subt)
        .function(Opcode::FltI, flti::MULT, mult)
        .function(Opcode::FltI, flti::DIVT, divt)
        .functions(
            Opcode::FltI,
            &[flti::CMPTUN, flti::CMPTEQ, flti::CMPTLT, flti::CMPTLE],
            cmpt,
        )
        .function(Opcode::FltI, flti::CVTTS, cvtts)
        .function(Opcode::FltI, flti::CVTTQ, cvttq_op)
        .function(Opcode::FltI, flti::CVTQS, cvtqs)
        .function(Opcode::FltI, flti::CVTQT, cvtqt);

    b.function(Opcode::FltL, fltl::CVTLQ, cvtlq)
        .function(Opcode::FltL, fltl::CPYS, cpys)
        .function(Opcode::FltL, fltl::CPYSN, cpysn)
        .function(Opcode::FltL, fltl::CPYSE, cpyse)
        .function(Opcode::FltL, fltl::MT_FPCR, mt_fpcr)
        .function(Opcode::FltL, fltl::MF_FPCR, mf_fpcr)
        .functions(
            Opcode::FltL,
            &[
                fltl::FCMOVEQ,
                fltl::FCMOVNE,
                fltl::FCMOVLT,
                fltl::FCMOVGE,
                fltl::FCMOVLE,
                fltl::FCMOVGT,
            ],
            fcmov,
        )
        .function(Opcode::FltL, fltl::CVTQL, cvtql);

    b.function(Opcode::Fpti, fpti::FTOIT, ftoit).function(Opcode::Fpti, fpti::FTOIS, ftois);
}

type Result = std::result::Result<Flow, Trap>;

/// Widen an S-format memory image to its T-format register image
pub fn s_to_t(s: u32) -> u64 {
    let s = s as u64;
    let exponent = match (s >> 23) & 0xFF {
        0 => 0,
        0xFF => 0x7FF,
        e => e + 0x380,
    };
    ((s >> 31) << 63) | (exponent << 52) | ((s & 0x7F_FFFF) << 29)
}

/// Narrow a T-format register image to the S-format memory image
pub fn t_to_s(t: u64) -> u32 {
    (((t >> 32) & 0xC000_0000) | ((t >> 29) & 0x3FFF_FFFF)) as u32
}

/// Round a double to single precision and widen it back
pub fn round_single(value: f64) -> f64 {
    value as f32 as f64
}

/// Operate fields of an FP instruction; FP operate words never carry a literal
fn fp_operate(
    ctx: &ExecContext<'_>,
    insn: &DecodedInstruction,
) -> std::result::Result<(OperateFields, u8), Trap> {
    ctx.require_fp()?;
    let op = ctx.operate(insn)?;
    match op.rb {
        OperandB::Register(fb) => Ok((op, fb)),
        OperandB::Literal(_) => Err(ctx.trap(TrapKind::IllegalInstruction)),
    }
}

/// `Fc = f(Fa, Fb)` on doubles
fn fp_binary(
    ctx: &mut ExecContext<'_>,
    insn: &DecodedInstruction,
    f: impl FnOnce(f64, f64) -> f64,
) -> Result {
    let (op, fb) = fp_operate(ctx, insn)?;
    let a = f64::from_bits(ctx.read_fp(op.ra));
    let b = f64::from_bits(ctx.read_fp(fb));
    ctx.write_fp(op.rc, f(a, b).to_bits());
    Ok(Flow::Next)
}

/// `Fc = f(Fb)` on raw register images
fn fp_unary_bits(
    ctx: &mut ExecContext<'_>,
    insn: &DecodedInstruction,
    f: impl FnOnce(u64) -> u64,
) -> Result {
    let (op, fb) = fp_operate(ctx, insn)?;
    let value = f(ctx.read_fp(fb));
    ctx.write_fp(op.rc, value);
    Ok(Flow::Next)
}

/// Divide, trapping on a zero divisor of either sign
///
/// A zero dividend does not change that: 0/0 raises divide by zero, not invalid operation.
fn fp_divide(ctx: &mut ExecContext<'_>, insn: &DecodedInstruction, single: bool) -> Result {
    let (op, fb) = fp_operate(ctx, insn)?;
    let b = f64::from_bits(ctx.read_fp(fb));
    if b == 0.0 {
        return Err(ctx.trap(TrapKind::FpDivideByZero));
    }
    let q = f64::from_bits(ctx.read_fp(op.ra)) / b;
    let q = if single { round_single(q) } else { q };
    ctx.write_fp(op.rc, q.to_bits());
    Ok(Flow::Next)
}

// Integer <-> floating transfers and square root (opcode 0x14)

fn itofs(ctx: &mut ExecContext<'_>, insn: &DecodedInstruction) -> Result {
    ctx.require_fp()?;
    let op = ctx.operate(insn)?;
    let value = s_to_t(ctx.read(op.ra) as u32);
    ctx.write_fp(op.rc, value);
    Ok(Flow::Next)
}

fn itoft(ctx: &mut ExecContext<'_>, insn: &DecodedInstruction) -> Result {
    ctx.require_fp()?;
    let op = ctx.operate(insn)?;
    let value = ctx.read(op.ra);
    ctx.write_fp(op.rc, value);
    Ok(Flow::Next)
}

fn sqrts(ctx: &mut ExecContext<'_>, insn: &DecodedInstruction) -> Result {
    fp_unary_bits(ctx, insn, |b| round_single(f64::from_bits(b).sqrt()).to_bits())
}

fn sqrtt(ctx: &mut ExecContext<'_>, insn: &DecodedInstruction) -> Result {
    fp_unary_bits(ctx, insn, |b| f64::from_bits(b).sqrt().to_bits())
}

// Arithmetic (opcode 0x16)

fn adds(ctx: &mut ExecContext<'_>, insn: &DecodedInstruction) -> Result {
    fp_binary(ctx, insn, |a, b| round_single(a + b))
}

fn subs(ctx: &mut ExecContext<'_>, insn: &DecodedInstruction) -> Result {
    fp_binary(ctx, insn, |a, b| round_single(a - b))
}

fn muls(ctx: &mut ExecContext<'_>, insn: &DecodedInstruction) -> Result {
    fp_binary(ctx, insn, |a, b| round_single(a * b))
}

fn divs(ctx: &mut ExecContext<'_>, insn: &DecodedInstruction) -> Result {
    fp_divide(ctx, insn, true)
}

fn addt(ctx: &mut ExecContext<'_>, insn: &DecodedInstruction) -> Result {
    fp_binary(ctx, insn, |a, b| a + b)
}

fn subt(ctx: &mut ExecContext<'_>, insn: &DecodedInstruction) -> Result {
    fp_binary(ctx, insn, |a, b| a - b)
}

fn mult(ctx: &mut ExecContext<'_>, insn: &DecodedInstruction) -> Result {
    fp_binary(ctx, insn, |a, b| a * b)
}

fn divt(ctx: &mut ExecContext<'_>, insn: &DecodedInstruction) -> Result {
    fp_divide(ctx, insn, false)
}

/// CMPTUN/EQ/LT/LE, writing 2.0 when true and +0.0 otherwise
fn cmpt(ctx: &mut ExecContext<'_>, insn: &DecodedInstruction) -> Result {
    let (op, fb) = fp_operate(ctx, insn)?;
    let a = f64::from_bits(ctx.read_fp(op.ra));
    let b = f64::from_bits(ctx.read_fp(fb));
    let result = match op.function & 0x3F {
        0x24 => a.is_nan() || b.is_nan(),
        0x25 => a == b,
        0x26 => a < b,
        _ => a <= b,
    };
    ctx.write_fp(op.rc, if result { FP_TRUE } else { 0 });
    Ok(Flow::Next)
}

/// CVTTS and CVTST share a dispatch slot; CVTST is told apart by its qualifier bits
fn cvtts(ctx: &mut ExecContext<'_>, insn: &DecodedInstruction) -> Result {
    let (op, _) = fp_operate(ctx, insn)?;
    if op.function & 0x3FF == flti::CVTST {
        // S values already live in registers in T format
        fp_unary_bits(ctx, insn, |b| b)
    } else {
        fp_unary_bits(ctx, insn, |b| round_single(f64::from_bits(b)).to_bits())
    }
}

/// Convert to a saturating quadword: chopped for the /C rounding qualifier, otherwise nearest
/// with ties to even
pub fn cvttq(function: u32, value: f64) -> u64 {
    let chopped = (function >> 6) & 3 == 0;
    let rounded = if chopped { value.trunc() } else { value.round_ties_even() };
    rounded as i64 as u64
}

fn cvttq_op(ctx: &mut ExecContext<'_>, insn: &DecodedInstruction) -> Result {
    let (op, _) = fp_operate(ctx, insn)?;
    fp_unary_bits(ctx, insn, |b| cvttq(op.function, f64::from_bits(b)))
}

fn cvtqs(ctx: &mut ExecContext<'_>, insn: &DecodedInstruction) -> Result {
    fp_unary_bits(ctx, insn, |b| (b as i64 as f32 as f64).to_bits())
}

fn cvtqt(ctx: &mut ExecContext<'_>, insn: &DecodedInstruction) -> Result {
    fp_unary_bits(ctx, insn, |b| (b as i64 as f64).to_bits())
}

// Sign copies, FPCR, FCMOV and longword conversions (opcode 0x17)

fn cpys(ctx: &mut ExecContext<'_>, insn: &DecodedInstruction) -> Result {
    fp_bits_binary(ctx, insn, |a, b| (a & SIGN) | (b & !SIGN))
}

fn cpysn(ctx: &mut ExecContext<'_>, insn: &DecodedInstruction) -> Result {
    fp_bits_binary(ctx, insn, |a, b| (!a & SIGN) | (b & !SIGN))
}

fn cpyse(ctx: &mut ExecContext<'_>, insn: &DecodedInstruction) -> Result {
    fp_bits_binary(ctx, insn, |a, b| (a & SIGN_EXPONENT) | (b & !SIGN_EXPONENT))
}

/// `Fc = f(Fa, Fb)` on raw register images
fn fp_bits_binary(
    ctx: &mut ExecContext<'_>,
    insn: &DecodedInstruction,
    f: impl FnOnce(u64, u64) -> u64,
) -> Result {
    let (op, fb) = fp_operate(ctx, insn)?;
    let value = f(ctx.read_fp(op.ra), ctx.read_fp(fb));
    ctx.write_fp(op.rc, value);
    Ok(Flow::Next)
}

fn mt_fpcr(ctx: &mut ExecContext<'_>, insn: &DecodedInstruction) -> Result {
    let (op, _) = fp_operate(ctx, insn)?;
    let flags = ctx.read_fp(op.ra);
    ctx.cpu.set_fp_condition_flags(flags);
    Ok(Flow::Next)
}

fn mf_fpcr(ctx: &mut ExecContext<'_>, insn: &DecodedInstruction) -> Result {
    let (op, _) = fp_operate(ctx, insn)?;
    ctx.write_fp(op.ra, ctx.cpu.fp_condition_flags());
    Ok(Flow::Next)
}

/// Branch opcode testing the same condition as an FCMOV function code
fn fcmov_condition(function: u32) -> Opcode {
    match function & 0x3F {
        0x2A => Opcode::Fbeq,
        0x2B => Opcode::Fbne,
        0x2C => Opcode::Fblt,
        0x2D => Opcode::Fbge,
        0x2E => Opcode::Fble,
        _ => Opcode::Fbgt,
    }
}

fn fcmov(ctx: &mut ExecContext<'_>, insn: &DecodedInstruction) -> Result {
    let (op, fb) = fp_operate(ctx, insn)?;
    if fp_condition(fcmov_condition(op.function), ctx.read_fp(op.ra)) {
        let value = ctx.read_fp(fb);
        ctx.write_fp(op.rc, value);
    }
    Ok(Flow::Next)
}

/// Longword held in register format: bits 63:62 and 58:29
fn register_longword(bits: u64) -> u32 {
    (((bits >> 32) & 0xC000_0000) | ((bits >> 29) & 0x3FFF_FFFF)) as u32
}

fn cvtlq(ctx: &mut ExecContext<'_>, insn: &DecodedInstruction) -> Result {
    fp_unary_bits(ctx, insn, |b| register_longword(b) as i32 as i64 as u64)
}

/// CVTQL and its /V forms; the overflow check applies only with /V
fn cvtql(ctx: &mut ExecContext<'_>, insn: &DecodedInstruction) -> Result {
    let (op, fb) = fp_operate(ctx, insn)?;
    let q = ctx.read_fp(fb);
    if op.function & 0x100 != 0 && sext32(q) != q {
        ctx.cpu.fpcr |= fpcr::IOV | fpcr::SUM;
        return Err(ctx.trap(TrapKind::IntegerOverflow));
    }
    let value = ((q & 0xC000_0000) << 32) | ((q & 0x3FFF_FFFF) << 29);
    ctx.write_fp(op.rc, value);
    Ok(Flow::Next)
}

// Floating -> integer transfers (opcode 0x1C)

fn ftoit(ctx: &mut ExecContext<'_>, insn: &DecodedInstruction) -> Result {
    ctx.require_fp()?;
    let op = ctx.operate(insn)?;
    let value = ctx.read_fp(op.ra);
    ctx.write(op.rc, value);
    Ok(Flow::Next)
}

fn ftois(ctx: &mut ExecContext<'_>, insn: &DecodedInstruction) -> Result {
    ctx.require_fp()?;
    let op = ctx.operate(insn)?;
    let value = sext32(t_to_s(ctx.read_fp(op.ra)) as u64);
    ctx.write(op.rc, value);
    Ok(Flow::Next)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_s_t_mapping() {
        for value in [1.0f32, -2.5, 3.0e-20, 1.0e30, 0.0, -0.0] {
            let t = s_to_t(value.to_bits());
            assert_eq!(f64::from_bits(t), value as f64);
            assert_eq!(t_to_s(t), value.to_bits());
        }
        assert!(f64::from_bits(s_to_t(f32::INFINITY.to_bits())).is_infinite());
    }

    #[test]
    fn test_cvttq_rounding() {
        let chopped = flti::CVTTQ & !0xC0;
        assert_eq!(cvttq(chopped, 2.7), 2);
        assert_eq!(cvttq(chopped, -2.7), (-2i64) as u64);
        assert_eq!(cvttq(flti::CVTTQ, 2.5), 2);
        assert_eq!(cvttq(flti::CVTTQ, 3.5), 4);
        assert_eq!(cvttq(flti::CVTTQ, 1.0e30), i64::MAX as u64);
        assert_eq!(cvttq(flti::CVTTQ, f64::NAN), 0);
    }

    #[test]
    fn test_register_longword() {
        let q = 0xFFFF_FFFF_8000_0001u64;
        let reg = ((q & 0xC000_0000) << 32) | ((q & 0x3FFF_FFFF) << 29);
        assert_eq!(register_longword(reg), 0x8000_0001);
    }
}
