//! Memory-format translation
//!
//! Address arithmetic is native. Plain loads and stores call the memory helpers with the
//! effective address in rsi; locked accesses and the S-format moves run through the interpreter.

use axp_core::{AccessSize, REG_ZERO};
use axp_decoder::{DecodedInstruction, Opcode};
use x64_emitter::{AluOp, Gpr, Width};

use super::{fallback, helpers, BlockCompiler, BlockFlow, CompileError, JitHandler};
use crate::dispatch::TableBuilder;

pub(super) fn register(b: &mut TableBuilder<JitHandler>) {
    b.primary(Opcode::Lda, lda)
        .primary(Opcode::Ldah, ldah)
        .primary(Opcode::Ldbu, ldbu)
        .primary(Opcode::Ldwu, ldwu)
        .primary(Opcode::Ldl, ldl)
        .primary(Opcode::Ldq, ldq)
        .primary(Opcode::LdqU, ldq_u)
        .primary(Opcode::LdlL, fallback)
        .primary(Opcode::LdqL, fallback)
        .primary(Opcode::Stb, stb)
        .primary(Opcode::Stw, stw)
        .primary(Opcode::Stl, stl)
        .primary(Opcode::Stq, stq)
        .primary(Opcode::StqU, stq_u)
        .primary(Opcode::StlC, fallback)
        .primary(Opcode::StqC, fallback)
        .primary(Opcode::Lds, fallback)
        .primary(Opcode::Ldt, ldt)
        .primary(Opcode::Sts, fallback)
        .primary(Opcode::Stt, stt);
}

type Result = std::result::Result<BlockFlow, CompileError>;

/// `dst = Rb + offset`
fn address(bc: &mut BlockCompiler, dst: Gpr, rb: u8, offset: i32) {
    bc.load_int(dst, rb);
    if offset != 0 {
        bc.em().alu_imm(AluOp::Add, Width::W64, dst, offset);
    }
}

fn lda(bc: &mut BlockCompiler, insn: &DecodedInstruction) -> Result {
    let (ra, rb, disp) = bc.memory(insn)?;
    address(bc, Gpr::Rax, rb, disp as i32);
    bc.store_int(ra, Gpr::Rax);
    Ok(BlockFlow::Continue)
}

fn ldah(bc: &mut BlockCompiler, insn: &DecodedInstruction) -> Result {
    let (ra, rb, disp) = bc.memory(insn)?;
    address(bc, Gpr::Rax, rb, (disp as i32) << 16);
    bc.store_int(ra, Gpr::Rax);
    Ok(BlockFlow::Continue)
}

/// rax = zero-extended load of `size` bytes at `Rb + disp`; leaves the block on a fault
fn emit_load(bc: &mut BlockCompiler, rb: u8, disp: i16, size: AccessSize, align_down: bool) {
    address(bc, Gpr::Rsi, rb, disp as i32);
    if align_down {
        bc.em().alu_imm(AluOp::And, Width::W64, Gpr::Rsi, !7);
    }
    let em = bc.em();
    em.mov(Width::W64, Gpr::Rdi, Gpr::R12);
    em.mov_imm64(Gpr::Rdx, size.bytes());
    bc.call_helper(helpers::jit_load as *const () as usize);
    bc.check_pending();
}

/// Store of the low `size` bytes of rdx at `Rb + disp`; leaves the block on a fault
fn emit_store(bc: &mut BlockCompiler, rb: u8, disp: i16, size: AccessSize, align_down: bool) {
    address(bc, Gpr::Rsi, rb, disp as i32);
    if align_down {
        bc.em().alu_imm(AluOp::And, Width::W64, Gpr::Rsi, !7);
    }
    let em = bc.em();
    em.mov(Width::W64, Gpr::Rdi, Gpr::R12);
    em.mov_imm64(Gpr::Rcx, size.bytes());
    bc.call_helper(helpers::jit_store as *const () as usize);
    bc.check_pending();
}

fn load_int(
    bc: &mut BlockCompiler,
    insn: &DecodedInstruction,
    size: AccessSize,
    align_down: bool,
) -> Result {
    let (ra, rb, disp) = bc.memory(insn)?;
    // Loads into R31 are prefetch hints
    if ra == REG_ZERO {
        return Ok(BlockFlow::Continue);
    }
    emit_load(bc, rb, disp, size, align_down);
    if size == AccessSize::Long {
        bc.em().movsx(32, Gpr::Rax, Gpr::Rax);
    }
    bc.store_int(ra, Gpr::Rax);
    Ok(BlockFlow::Continue)
}

fn ldbu(bc: &mut BlockCompiler, insn: &DecodedInstruction) -> Result {
    load_int(bc, insn, AccessSize::Byte, false)
}

fn ldwu(bc: &mut BlockCompiler, insn: &DecodedInstruction) -> Result {
    load_int(bc, insn, AccessSize::Word, false)
}

fn ldl(bc: &mut BlockCompiler, insn: &DecodedInstruction) -> Result {
    load_int(bc, insn, AccessSize::Long, false)
}

fn ldq(bc: &mut BlockCompiler, insn: &DecodedInstruction) -> Result {
    load_int(bc, insn, AccessSize::Quad, false)
}

fn ldq_u(bc: &mut BlockCompiler, insn: &DecodedInstruction) -> Result {
    load_int(bc, insn, AccessSize::Quad, true)
}

fn store_int(
    bc: &mut BlockCompiler,
    insn: &DecodedInstruction,
    size: AccessSize,
    align_down: bool,
) -> Result {
    let (ra, rb, disp) = bc.memory(insn)?;
    bc.load_int(Gpr::Rdx, ra);
    emit_store(bc, rb, disp, size, align_down);
    Ok(BlockFlow::Continue)
}

fn stb(bc: &mut BlockCompiler, insn: &DecodedInstruction) -> Result {
    store_int(bc, insn, AccessSize::Byte, false)
}

fn stw(bc: &mut BlockCompiler, insn: &DecodedInstruction) -> Result {
    store_int(bc, insn, AccessSize::Word, false)
}

fn stl(bc: &mut BlockCompiler, insn: &DecodedInstruction) -> Result {
    store_int(bc, insn, AccessSize::Long, false)
}

fn stq(bc: &mut BlockCompiler, insn: &DecodedInstruction) -> Result {
    store_int(bc, insn, AccessSize::Quad, false)
}

fn stq_u(bc: &mut BlockCompiler, insn: &DecodedInstruction) -> Result {
    store_int(bc, insn, AccessSize::Quad, true)
}

fn ldt(bc: &mut BlockCompiler, insn: &DecodedInstruction) -> Result {
    let (fa, rb, disp) = bc.memory(insn)?;
    bc.check_fp_enabled();
    if fa == REG_ZERO {
        return Ok(BlockFlow::Continue);
    }
    emit_load(bc, rb, disp, AccessSize::Quad, false);
    bc.store_fp(fa, Gpr::Rax);
    Ok(BlockFlow::Continue)
}

fn stt(bc: &mut BlockCompiler, insn: &DecodedInstruction) -> Result {
    let (fa, rb, disp) = bc.memory(insn)?;
    bc.check_fp_enabled();
    bc.load_fp(Gpr::Rdx, fa);
    emit_store(bc, rb, disp, AccessSize::Quad, false);
    Ok(BlockFlow::Continue)
}
