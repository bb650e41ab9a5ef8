//! Floating-point translation
//!
//! Add, subtract, multiply, divide and square root run on SSE scalar doubles; single-precision
//! forms round through `cvtsd2ss`/`cvtss2sd`. Sign copies and the register transfers are bit
//! operations on general registers. Compares, conversions, FCMOV and FPCR moves go through the
//! interpreter.

use axp_core::TrapKind;
use axp_decoder::{
    function::{fltl, flti, fpti, itfp},
    DecodedInstruction, Opcode, OperandB,
};
use x64_emitter::{AluOp, Cond, Gpr, Precision, ShiftOp, SseOp, Width, Xmm};

use super::{fallback, BlockCompiler, BlockFlow, CompileError, JitHandler};
use crate::dispatch::TableBuilder;

const SIGN: u64 = 1 << 63;
const SIGN_EXPONENT: u64 = 0xFFF0_0000_0000_0000;

pub(super) fn register(b: &mut TableBuilder<JitHandler>) {
    b.function(Opcode::Itfp, itfp::ITOFS, fallback)
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
            &[
                flti::CMPTUN,
                flti::CMPTEQ,
                flti::CMPTLT,
                flti::CMPTLE,
                flti::CVTTS,
                flti::CVTTQ,
                flti::CVTQS,
                flti::CVTQT,
            ],
            fallback,
        );

    b.function(Opcode::FltL, fltl::CPYS, cpys)
        .function(Opcode::FltL, fltl::CPYSN, cpysn)
        .function(Opcode::FltL, fltl::CPYSE, cpyse)
        .functions(
            Opcode::FltL,
            &[
                fltl::CVTLQ,
                fltl::MT_FPCR,
                fltl::MF_FPCR,
                fltl::FCMOVEQ,
                fltl::FCMOVNE,
                fltl::FCMOVLT,
                fltl::FCMOVGE,
                fltl::FCMOVLE,
                fltl::FCMOVGT,
                fltl::CVTQL,
            ],
            fallback,
        );

    b.function(Opcode::Fpti, fpti::FTOIT, ftoit).function(Opcode::Fpti, fpti::FTOIS, fallback);
}

type Result = std::result::Result<BlockFlow, CompileError>;

/// Fa, Fb and Fc of an FP operate word, or `None` when Fb is not a register
fn fp_fields(
    bc: &BlockCompiler,
    insn: &DecodedInstruction,
) -> std::result::Result<Option<(u8, u8, u8)>, CompileError> {
    let op = bc.operate(insn)?;
    Ok(match op.rb {
        OperandB::Register(fb) => Some((op.ra, fb, op.rc)),
        OperandB::Literal(_) => None,
    })
}

/// `Fc = Fa op Fb` in xmm0, optionally rounded to single
fn arith(bc: &mut BlockCompiler, insn: &DecodedInstruction, op: SseOp, single: bool) -> Result {
    let Some((fa, fb, fc)) = fp_fields(bc, insn)? else {
        return bc.interpret(insn);
    };
    bc.check_fp_enabled();
    bc.load_fp(Gpr::Rax, fa);
    bc.load_fp(Gpr::Rcx, fb);
    if op == SseOp::Div {
        // +0.0 and -0.0 divisors both trap
        let divide_by_zero = bc.trap_label(TrapKind::FpDivideByZero);
        let em = bc.em();
        em.mov(Width::W64, Gpr::Rdx, Gpr::Rcx);
        em.shift_imm(ShiftOp::Shl, Width::W64, Gpr::Rdx, 1);
        em.jcc(Cond::E, divide_by_zero);
    }
    let em = bc.em();
    em.movq_to_xmm(Xmm::Xmm0, Gpr::Rax);
    em.movq_to_xmm(Xmm::Xmm1, Gpr::Rcx);
    em.sse_op(op, Precision::Double, Xmm::Xmm0, Xmm::Xmm1);
    store_result(bc, fc, single)
}

/// Fc = xmm0, rounded to single first when `single`
fn store_result(bc: &mut BlockCompiler, fc: u8, single: bool) -> Result {
    let em = bc.em();
    if single {
        em.cvtsd2ss(Xmm::Xmm0, Xmm::Xmm0);
        em.cvtss2sd(Xmm::Xmm0, Xmm::Xmm0);
    }
    em.movq_from_xmm(Gpr::Rax, Xmm::Xmm0);
    bc.store_fp(fc, Gpr::Rax);
    Ok(BlockFlow::Continue)
}

fn adds(bc: &mut BlockCompiler, insn: &DecodedInstruction) -> Result {
    arith(bc, insn, SseOp::Add, true)
}

fn subs(bc: &mut BlockCompiler, insn: &DecodedInstruction) -> Result {
    arith(bc, insn, SseOp::Sub, true)
}

fn muls(bc: &mut BlockCompiler, insn: &DecodedInstruction) -> Result {
    arith(bc, insn, SseOp::Mul, true)
}

fn divs(bc: &mut BlockCompiler, insn: &DecodedInstruction) -> Result {
    arith(bc, insn, SseOp::Div, true)
}

fn addt(bc: &mut BlockCompiler, insn: &DecodedInstruction) -> Result {
    arith(bc, insn, SseOp::Add, false)
}

fn subt(bc: &mut BlockCompiler, insn: &DecodedInstruction) -> Result {
    arith(bc, insn, SseOp::Sub, false)
}

fn mult(bc: &mut BlockCompiler, insn: &DecodedInstruction) -> Result {
    arith(bc, insn, SseOp::Mul, false)
}

fn divt(bc: &mut BlockCompiler, insn: &DecodedInstruction) -> Result {
    arith(bc, insn, SseOp::Div, false)
}

fn sqrt(bc: &mut BlockCompiler, insn: &DecodedInstruction, single: bool) -> Result {
    let Some((_, fb, fc)) = fp_fields(bc, insn)? else {
        return bc.interpret(insn);
    };
    bc.check_fp_enabled();
    bc.load_fp(Gpr::Rcx, fb);
    let em = bc.em();
    em.movq_to_xmm(Xmm::Xmm1, Gpr::Rcx);
    em.sse_op(SseOp::Sqrt, Precision::Double, Xmm::Xmm0, Xmm::Xmm1);
    store_result(bc, fc, single)
}

fn sqrts(bc: &mut BlockCompiler, insn: &DecodedInstruction) -> Result {
    sqrt(bc, insn, true)
}

fn sqrtt(bc: &mut BlockCompiler, insn: &DecodedInstruction) -> Result {
    sqrt(bc, insn, false)
}

/// `Fc = (Fa & mask) | (Fb & !mask)`, complementing Fa first for CPYSN
fn copy_sign(
    bc: &mut BlockCompiler,
    insn: &DecodedInstruction,
    mask: u64,
    negate: bool,
) -> Result {
    let Some((fa, fb, fc)) = fp_fields(bc, insn)? else {
        return bc.interpret(insn);
    };
    bc.check_fp_enabled();
    bc.load_fp(Gpr::Rax, fa);
    bc.load_fp(Gpr::Rcx, fb);
    let em = bc.em();
    if negate {
        em.not(Width::W64, Gpr::Rax);
    }
    em.mov_imm64(Gpr::Rdx, mask);
    em.alu(AluOp::And, Width::W64, Gpr::Rax, Gpr::Rdx);
    em.not(Width::W64, Gpr::Rdx);
    em.alu(AluOp::And, Width::W64, Gpr::Rcx, Gpr::Rdx);
    em.alu(AluOp::Or, Width::W64, Gpr::Rax, Gpr::Rcx);
    bc.store_fp(fc, Gpr::Rax);
    Ok(BlockFlow::Continue)
}

fn cpys(bc: &mut BlockCompiler, insn: &DecodedInstruction) -> Result {
    copy_sign(bc, insn, SIGN, false)
}

fn cpysn(bc: &mut BlockCompiler, insn: &DecodedInstruction) -> Result {
    copy_sign(bc, insn, SIGN, true)
}

fn cpyse(bc: &mut BlockCompiler, insn: &DecodedInstruction) -> Result {
    copy_sign(bc, insn, SIGN_EXPONENT, false)
}

/// ITOFT: integer Ra to floating Fc, bit for bit
fn itoft(bc: &mut BlockCompiler, insn: &DecodedInstruction) -> Result {
    let op = bc.operate(insn)?;
    bc.check_fp_enabled();
    bc.load_int(Gpr::Rax, op.ra);
    bc.store_fp(op.rc, Gpr::Rax);
    Ok(BlockFlow::Continue)
}

/// FTOIT: floating Fa to integer Rc, bit for bit
fn ftoit(bc: &mut BlockCompiler, insn: &DecodedInstruction) -> Result {
    let op = bc.operate(insn)?;
    bc.check_fp_enabled();
    bc.load_fp(Gpr::Rax, op.ra);
    bc.store_int(op.rc, Gpr::Rax);
    Ok(BlockFlow::Continue)
}
