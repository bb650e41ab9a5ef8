//! Integer operate translation
//!
//! Arithmetic, compares, logical operations, conditional moves, shifts, multiplies and sign
//! extension are emitted natively with Ra in rax and operand B in rcx. Byte manipulation and the
//! count instructions run through the interpreter.

use axp_core::{TrapKind, REG_ZERO};
use axp_decoder::{
    function::{fpti, inta, intl, intm, ints},
    DecodedInstruction, Opcode,
};
use x64_emitter::{AluOp, Cond, Gpr, ShiftOp, Width, Xmm};

use super::{fallback, helpers, BlockCompiler, BlockFlow, CompileError, JitHandler};
use crate::{
    dispatch::TableBuilder,
    interp::{OperateFields, AMASK_FEATURES, IMPLVER},
};

pub(super) fn register(b: &mut TableBuilder<JitHandler>) {
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
        .function(Opcode::IntA, inta::CMPBGE, cmpbge);

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
        .functions(
            Opcode::IntS,
            &[
                ints::ZAP,
                ints::ZAPNOT,
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
            fallback,
        );

    b.function(Opcode::IntM, intm::MULL, mull)
        .function(Opcode::IntM, intm::MULQ, mulq)
        .function(Opcode::IntM, intm::UMULH, umulh)
        .function(Opcode::IntM, intm::MULL_V, mull_v)
        .function(Opcode::IntM, intm::MULQ_V, mulq_v);

    b.function(Opcode::Fpti, fpti::SEXTB, sextb)
        .function(Opcode::Fpti, fpti::SEXTW, sextw)
        .functions(Opcode::Fpti, &[fpti::CTPOP, fpti::CTLZ, fpti::CTTZ], fallback);
}

type Result = std::result::Result<BlockFlow, CompileError>;

/// Decode the operate fields and load rax = Ra, rcx = B
fn load_operands(
    bc: &mut BlockCompiler,
    insn: &DecodedInstruction,
) -> std::result::Result<OperateFields, CompileError> {
    let op = bc.operate(insn)?;
    bc.load_int(Gpr::Rax, op.ra);
    bc.load_operand_b(Gpr::Rcx, op.rb);
    Ok(op)
}

/// Rc = rax, sign-extending the low longword first for 32-bit results
fn write_result(bc: &mut BlockCompiler, rc: u8, width: Width) -> Result {
    if width == Width::W32 {
        bc.em().movsx(32, Gpr::Rax, Gpr::Rax);
    }
    bc.store_int(rc, Gpr::Rax);
    Ok(BlockFlow::Continue)
}

/// `Rc = (Ra << scale) op B`
fn arith(
    bc: &mut BlockCompiler,
    insn: &DecodedInstruction,
    scale: u8,
    op: AluOp,
    width: Width,
) -> Result {
    let fields = load_operands(bc, insn)?;
    if scale != 0 {
        bc.em().shift_imm(ShiftOp::Shl, Width::W64, Gpr::Rax, scale);
    }
    bc.em().alu(op, width, Gpr::Rax, Gpr::Rcx);
    write_result(bc, fields.rc, width)
}

/// `Rc = Ra op B`, trapping before the write when the signed result overflows `width`
///
/// Overflow is decided by [`helpers::jit_overflows`]. The call clobbers the operands, which are
/// reloaded for the write.
fn arith_checked(
    bc: &mut BlockCompiler,
    insn: &DecodedInstruction,
    op: AluOp,
    width: Width,
) -> Result {
    load_operands(bc, insn)?;
    let overflow = bc.trap_label(TrapKind::IntegerOverflow);
    let mut mode = if op == AluOp::Sub { helpers::OVERFLOW_SUB } else { 0 };
    if width == Width::W32 {
        mode |= helpers::OVERFLOW_LONG;
    }
    let em = bc.em();
    em.mov(Width::W64, Gpr::Rdi, Gpr::Rax);
    em.alu(op, Width::W64, Gpr::Rdi, Gpr::Rcx);
    em.mov(Width::W64, Gpr::Rsi, Gpr::Rax);
    em.mov(Width::W64, Gpr::Rdx, Gpr::Rcx);
    em.mov_imm64(Gpr::Rcx, mode);
    bc.call_helper(helpers::jit_overflows as *const () as usize);
    bc.em().alu(AluOp::Test, Width::W64, Gpr::Rax, Gpr::Rax);
    bc.em().jcc(Cond::NE, overflow);

    let fields = load_operands(bc, insn)?;
    bc.em().alu(op, width, Gpr::Rax, Gpr::Rcx);
    write_result(bc, fields.rc, width)
}

fn addl(bc: &mut BlockCompiler, insn: &DecodedInstruction) -> Result {
    arith(bc, insn, 0, AluOp::Add, Width::W32)
}

fn s4addl(bc: &mut BlockCompiler, insn: &DecodedInstruction) -> Result {
    arith(bc, insn, 2, AluOp::Add, Width::W32)
}

fn s8addl(bc: &mut BlockCompiler, insn: &DecodedInstruction) -> Result {
    arith(bc, insn, 3, AluOp::Add, Width::W32)
}

fn subl(bc: &mut BlockCompiler, insn: &DecodedInstruction) -> Result {
    arith(bc, insn, 0, AluOp::Sub, Width::W32)
}

fn s4subl(bc: &mut BlockCompiler, insn: &DecodedInstruction) -> Result {
    arith(bc, insn, 2, AluOp::Sub, Width::W32)
}

fn s8subl(bc: &mut BlockCompiler, insn: &DecodedInstruction) -> Result {
    arith(bc, insn, 3, AluOp::Sub, Width::W32)
}

fn addq(bc: &mut BlockCompiler, insn: &DecodedInstruction) -> Result {
    arith(bc, insn, 0, AluOp::Add, Width::W64)
}

fn s4addq(bc: &mut BlockCompiler, insn: &DecodedInstruction) -> Result {
    arith(bc, insn, 2, AluOp::Add, Width::W64)
}

fn s8addq(bc: &mut BlockCompiler, insn: &DecodedInstruction) -> Result {
    arith(bc, insn, 3, AluOp::Add, Width::W64)
}

fn subq(bc: &mut BlockCompiler, insn: &DecodedInstruction) -> Result {
    arith(bc, insn, 0, AluOp::Sub, Width::W64)
}

fn s4subq(bc: &mut BlockCompiler, insn: &DecodedInstruction) -> Result {
    arith(bc, insn, 2, AluOp::Sub, Width::W64)
}

fn s8subq(bc: &mut BlockCompiler, insn: &DecodedInstruction) -> Result {
    arith(bc, insn, 3, AluOp::Sub, Width::W64)
}

fn addl_v(bc: &mut BlockCompiler, insn: &DecodedInstruction) -> Result {
    arith_checked(bc, insn, AluOp::Add, Width::W32)
}

fn subl_v(bc: &mut BlockCompiler, insn: &DecodedInstruction) -> Result {
    arith_checked(bc, insn, AluOp::Sub, Width::W32)
}

fn addq_v(bc: &mut BlockCompiler, insn: &DecodedInstruction) -> Result {
    arith_checked(bc, insn, AluOp::Add, Width::W64)
}

fn subq_v(bc: &mut BlockCompiler, insn: &DecodedInstruction) -> Result {
    arith_checked(bc, insn, AluOp::Sub, Width::W64)
}

// Compares

/// `Rc = (Ra cond B) ? 1 : 0`
fn compare(bc: &mut BlockCompiler, insn: &DecodedInstruction, cond: Cond) -> Result {
    let fields = load_operands(bc, insn)?;
    let em = bc.em();
    em.alu(AluOp::Cmp, Width::W64, Gpr::Rax, Gpr::Rcx);
    em.setcc(cond, Gpr::Rax);
    em.movzx(8, Gpr::Rax, Gpr::Rax);
    write_result(bc, fields.rc, Width::W64)
}

fn cmpeq(bc: &mut BlockCompiler, insn: &DecodedInstruction) -> Result {
    compare(bc, insn, Cond::E)
}

fn cmplt(bc: &mut BlockCompiler, insn: &DecodedInstruction) -> Result {
    compare(bc, insn, Cond::L)
}

fn cmple(bc: &mut BlockCompiler, insn: &DecodedInstruction) -> Result {
    compare(bc, insn, Cond::LE)
}

fn cmpult(bc: &mut BlockCompiler, insn: &DecodedInstruction) -> Result {
    compare(bc, insn, Cond::B)
}

fn cmpule(bc: &mut BlockCompiler, insn: &DecodedInstruction) -> Result {
    compare(bc, insn, Cond::BE)
}

/// Byte-wise unsigned `Ra >= B`: a lane passes when `max(a, b) == a`
fn cmpbge(bc: &mut BlockCompiler, insn: &DecodedInstruction) -> Result {
    let fields = load_operands(bc, insn)?;
    let em = bc.em();
    em.movq_to_xmm(Xmm::Xmm0, Gpr::Rax);
    em.movq_to_xmm(Xmm::Xmm1, Gpr::Rcx);
    em.pmaxub(Xmm::Xmm1, Xmm::Xmm0);
    em.pcmpeqb(Xmm::Xmm1, Xmm::Xmm0);
    em.pmovmskb(Gpr::Rax, Xmm::Xmm1);
    em.alu_imm(AluOp::And, Width::W32, Gpr::Rax, 0xFF);
    write_result(bc, fields.rc, Width::W64)
}

// Logical

/// `Rc = Ra op B`, complementing B first for BIC, ORNOT and EQV
fn logical(
    bc: &mut BlockCompiler,
    insn: &DecodedInstruction,
    op: AluOp,
    invert_b: bool,
) -> Result {
    let fields = load_operands(bc, insn)?;
    if invert_b {
        bc.em().not(Width::W64, Gpr::Rcx);
    }
    bc.em().alu(op, Width::W64, Gpr::Rax, Gpr::Rcx);
    write_result(bc, fields.rc, Width::W64)
}

fn and(bc: &mut BlockCompiler, insn: &DecodedInstruction) -> Result {
    logical(bc, insn, AluOp::And, false)
}

fn bic(bc: &mut BlockCompiler, insn: &DecodedInstruction) -> Result {
    logical(bc, insn, AluOp::And, true)
}

fn bis(bc: &mut BlockCompiler, insn: &DecodedInstruction) -> Result {
    logical(bc, insn, AluOp::Or, false)
}

fn ornot(bc: &mut BlockCompiler, insn: &DecodedInstruction) -> Result {
    logical(bc, insn, AluOp::Or, true)
}

fn xor(bc: &mut BlockCompiler, insn: &DecodedInstruction) -> Result {
    logical(bc, insn, AluOp::Xor, false)
}

fn eqv(bc: &mut BlockCompiler, insn: &DecodedInstruction) -> Result {
    logical(bc, insn, AluOp::Xor, true)
}

/// CMOVxx: rdx holds the old Rc and takes B when the condition on Ra holds
fn cmov(bc: &mut BlockCompiler, insn: &DecodedInstruction) -> Result {
    let op = bc.operate(insn)?;
    if op.rc == REG_ZERO {
        return Ok(BlockFlow::Continue);
    }
    bc.load_int(Gpr::Rax, op.ra);
    bc.load_int(Gpr::Rdx, op.rc);
    bc.load_operand_b(Gpr::Rcx, op.rb);

    let em = bc.em();
    let cond = match op.function {
        intl::CMOVLBS | intl::CMOVLBC => {
            em.alu_imm(AluOp::Test, Width::W32, Gpr::Rax, 1);
            if op.function == intl::CMOVLBS {
                Cond::NE
            } else {
                Cond::E
            }
        }
        function => {
            em.alu(AluOp::Test, Width::W64, Gpr::Rax, Gpr::Rax);
            match function {
                intl::CMOVEQ => Cond::E,
                intl::CMOVNE => Cond::NE,
                intl::CMOVLT => Cond::L,
                intl::CMOVGE => Cond::GE,
                intl::CMOVLE => Cond::LE,
                _ => Cond::G,
            }
        }
    };
    em.cmovcc(cond, Gpr::Rdx, Gpr::Rcx);
    bc.store_int(op.rc, Gpr::Rdx);
    Ok(BlockFlow::Continue)
}

fn amask(bc: &mut BlockCompiler, insn: &DecodedInstruction) -> Result {
    let op = bc.operate(insn)?;
    bc.load_operand_b(Gpr::Rax, op.rb);
    bc.em().alu_imm(AluOp::And, Width::W64, Gpr::Rax, !(AMASK_FEATURES as i32));
    write_result(bc, op.rc, Width::W64)
}

fn implver(bc: &mut BlockCompiler, insn: &DecodedInstruction) -> Result {
    let op = bc.operate(insn)?;
    bc.em().mov_imm64(Gpr::Rax, IMPLVER);
    write_result(bc, op.rc, Width::W64)
}

// Shifts; a 64-bit shift by cl uses the low six bits of the count

fn shift(bc: &mut BlockCompiler, insn: &DecodedInstruction, op: ShiftOp) -> Result {
    let fields = load_operands(bc, insn)?;
    bc.em().shift_cl(op, Width::W64, Gpr::Rax);
    write_result(bc, fields.rc, Width::W64)
}

fn sll(bc: &mut BlockCompiler, insn: &DecodedInstruction) -> Result {
    shift(bc, insn, ShiftOp::Shl)
}

fn srl(bc: &mut BlockCompiler, insn: &DecodedInstruction) -> Result {
    shift(bc, insn, ShiftOp::Shr)
}

fn sra(bc: &mut BlockCompiler, insn: &DecodedInstruction) -> Result {
    shift(bc, insn, ShiftOp::Sar)
}

// Multiply

fn mull(bc: &mut BlockCompiler, insn: &DecodedInstruction) -> Result {
    let fields = load_operands(bc, insn)?;
    bc.em().imul(Width::W32, Gpr::Rax, Gpr::Rcx);
    write_result(bc, fields.rc, Width::W32)
}

fn mulq(bc: &mut BlockCompiler, insn: &DecodedInstruction) -> Result {
    let fields = load_operands(bc, insn)?;
    bc.em().imul(Width::W64, Gpr::Rax, Gpr::Rcx);
    write_result(bc, fields.rc, Width::W64)
}

fn umulh(bc: &mut BlockCompiler, insn: &DecodedInstruction) -> Result {
    let fields = load_operands(bc, insn)?;
    let em = bc.em();
    em.mul_wide(Gpr::Rcx);
    em.mov(Width::W64, Gpr::Rax, Gpr::Rdx);
    write_result(bc, fields.rc, Width::W64)
}

/// Checked multiply; imul sets OF when the product does not fit `width`
fn mul_checked(bc: &mut BlockCompiler, insn: &DecodedInstruction, width: Width) -> Result {
    let fields = load_operands(bc, insn)?;
    let overflow = bc.trap_label(TrapKind::IntegerOverflow);
    bc.em().imul(width, Gpr::Rax, Gpr::Rcx);
    bc.em().jcc(Cond::O, overflow);
    write_result(bc, fields.rc, width)
}

fn mull_v(bc: &mut BlockCompiler, insn: &DecodedInstruction) -> Result {
    mul_checked(bc, insn, Width::W32)
}

fn mulq_v(bc: &mut BlockCompiler, insn: &DecodedInstruction) -> Result {
    mul_checked(bc, insn, Width::W64)
}

// Sign extension of operand B

fn sign_extend(bc: &mut BlockCompiler, insn: &DecodedInstruction, bits: u8) -> Result {
    let op = bc.operate(insn)?;
    bc.load_operand_b(Gpr::Rcx, op.rb);
    bc.em().movsx(bits, Gpr::Rax, Gpr::Rcx);
    write_result(bc, op.rc, Width::W64)
}

fn sextb(bc: &mut BlockCompiler, insn: &DecodedInstruction) -> Result {
    sign_extend(bc, insn, 8)
}

fn sextw(bc: &mut BlockCompiler, insn: &DecodedInstruction) -> Result {
    sign_extend(bc, insn, 16)
}
