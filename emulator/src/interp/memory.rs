//! Memory-format loads, stores and address arithmetic

use axp_core::{AccessSize, Trap, REG_ZERO};
use axp_decoder::{DecodedInstruction, Opcode};

use super::{float::{s_to_t, t_to_s}, sext32, ExecContext, Flow, InterpHandler};
use crate::dispatch::TableBuilder;

pub(super) fn register(b: &mut TableBuilder<InterpHandler>) {
    b.primary(Opcode::Lda, lda)
        .primary(Opcode::Ldah, ldah)
        .primary(Opcode::Ldbu, ldbu)
        .primary(Opcode::Ldwu, ldwu)
        .primary(Opcode::Ldl, ldl)
        .primary(Opcode::Ldq, ldq)
        .primary(Opcode::LdqU, ldq_u)
        .primary(Opcode::LdlL, ldl_l)
        .primary(Opcode::LdqL, ldq_l)
        .primary(Opcode::Stb, stb)
        .primary(Opcode::Stw, stw)
        .primary(Opcode::Stl, stl)
        .primary(Opcode::Stq, stq)
        .primary(Opcode::StqU, stq_u)
        .primary(Opcode::StlC, stl_c)
        .primary(Opcode::StqC, stq_c)
        .primary(Opcode::Lds, lds)
        .primary(Opcode::Ldt, ldt)
        .primary(Opcode::Sts, sts)
        .primary(Opcode::Stt, stt);
}

type Result = std::result::Result<Flow, Trap>;

/// Effective address `Rb + sext(disp)`
fn effective_address(ctx: &ExecContext<'_>, rb: u8, displacement: i16) -> u64 {
    ctx.read(rb).wrapping_add(displacement as i64 as u64)
}

fn lda(ctx: &mut ExecContext<'_>, insn: &DecodedInstruction) -> Result {
    let (ra, rb, disp) = ctx.memory(insn)?;
    let value = effective_address(ctx, rb, disp);
    ctx.write(ra, value);
    Ok(Flow::Next)
}

fn ldah(ctx: &mut ExecContext<'_>, insn: &DecodedInstruction) -> Result {
    let (ra, rb, disp) = ctx.memory(insn)?;
    let value = ctx.read(rb).wrapping_add(((disp as i64) << 16) as u64);
    ctx.write(ra, value);
    Ok(Flow::Next)
}

/// Integer load; loads into R31 are prefetch hints and touch nothing
fn load_int(
    ctx: &mut ExecContext<'_>,
    insn: &DecodedInstruction,
    size: AccessSize,
    align_down: bool,
    extend: fn(u64) -> u64,
) -> Result {
    let (ra, rb, disp) = ctx.memory(insn)?;
    if ra == REG_ZERO {
        return Ok(Flow::Next);
    }
    let mut address = effective_address(ctx, rb, disp);
    if align_down {
        address &= !7;
    }
    let value = ctx.load(address, size)?;
    ctx.write(ra, extend(value));
    Ok(Flow::Next)
}

fn ldbu(ctx: &mut ExecContext<'_>, insn: &DecodedInstruction) -> Result {
    load_int(ctx, insn, AccessSize::Byte, false, |v| v)
}

fn ldwu(ctx: &mut ExecContext<'_>, insn: &DecodedInstruction) -> Result {
    load_int(ctx, insn, AccessSize::Word, false, |v| v)
}

fn ldl(ctx: &mut ExecContext<'_>, insn: &DecodedInstruction) -> Result {
    load_int(ctx, insn, AccessSize::Long, false, sext32)
}

fn ldq(ctx: &mut ExecContext<'_>, insn: &DecodedInstruction) -> Result {
    load_int(ctx, insn, AccessSize::Quad, false, |v| v)
}

fn ldq_u(ctx: &mut ExecContext<'_>, insn: &DecodedInstruction) -> Result {
    load_int(ctx, insn, AccessSize::Quad, true, |v| v)
}

/// Load-locked: always performs the access and records the reservation
fn load_locked(ctx: &mut ExecContext<'_>, insn: &DecodedInstruction, size: AccessSize) -> Result {
    let (ra, rb, disp) = ctx.memory(insn)?;
    let address = effective_address(ctx, rb, disp);
    let value = ctx.load(address, size)?;
    ctx.cpu.set_lock(address);
    let value = if size == AccessSize::Long { sext32(value) } else { value };
    ctx.write(ra, value);
    Ok(Flow::Next)
}

fn ldl_l(ctx: &mut ExecContext<'_>, insn: &DecodedInstruction) -> Result {
    load_locked(ctx, insn, AccessSize::Long)
}

fn ldq_l(ctx: &mut ExecContext<'_>, insn: &DecodedInstruction) -> Result {
    load_locked(ctx, insn, AccessSize::Quad)
}

fn store_int(
    ctx: &mut ExecContext<'_>,
    insn: &DecodedInstruction,
    size: AccessSize,
    align_down: bool,
) -> Result {
    let (ra, rb, disp) = ctx.memory(insn)?;
    let mut address = effective_address(ctx, rb, disp);
    if align_down {
        address &= !7;
    }
    let value = ctx.read(ra);
    ctx.store(address, size, value)?;
    Ok(Flow::Next)
}

fn stb(ctx: &mut ExecContext<'_>, insn: &DecodedInstruction) -> Result {
    store_int(ctx, insn, AccessSize::Byte, false)
}

fn stw(ctx: &mut ExecContext<'_>, insn: &DecodedInstruction) -> Result {
    store_int(ctx, insn, AccessSize::Word, false)
}

fn stl(ctx: &mut ExecContext<'_>, insn: &DecodedInstruction) -> Result {
    store_int(ctx, insn, AccessSize::Long, false)
}

fn stq(ctx: &mut ExecContext<'_>, insn: &DecodedInstruction) -> Result {
    store_int(ctx, insn, AccessSize::Quad, false)
}

fn stq_u(ctx: &mut ExecContext<'_>, insn: &DecodedInstruction) -> Result {
    store_int(ctx, insn, AccessSize::Quad, true)
}

/// Store-conditional: stores only while the reservation on the granule holds, reports the
/// outcome in Ra and always clears the lock flag
fn store_conditional(
    ctx: &mut ExecContext<'_>,
    insn: &DecodedInstruction,
    size: AccessSize,
) -> Result {
    let (ra, rb, disp) = ctx.memory(insn)?;
    let address = effective_address(ctx, rb, disp);
    let granule = address & !(axp_core::LOCK_GRANULE - 1);
    let success = ctx.cpu.lock_flag && ctx.cpu.lock_addr == granule;
    if success {
        let value = ctx.read(ra);
        ctx.store(address, size, value)?;
    }
    ctx.cpu.lock_flag = false;
    ctx.write(ra, success as u64);
    Ok(Flow::Next)
}

fn stl_c(ctx: &mut ExecContext<'_>, insn: &DecodedInstruction) -> Result {
    store_conditional(ctx, insn, AccessSize::Long)
}

fn stq_c(ctx: &mut ExecContext<'_>, insn: &DecodedInstruction) -> Result {
    store_conditional(ctx, insn, AccessSize::Quad)
}

// Floating-point memory

fn lds(ctx: &mut ExecContext<'_>, insn: &DecodedInstruction) -> Result {
    ctx.require_fp()?;
    let (fa, rb, disp) = ctx.memory(insn)?;
    if fa == REG_ZERO {
        return Ok(Flow::Next);
    }
    let address = effective_address(ctx, rb, disp);
    let value = ctx.load(address, AccessSize::Long)?;
    ctx.write_fp(fa, s_to_t(value as u32));
    Ok(Flow::Next)
}

fn ldt(ctx: &mut ExecContext<'_>, insn: &DecodedInstruction) -> Result {
    ctx.require_fp()?;
    let (fa, rb, disp) = ctx.memory(insn)?;
    if fa == REG_ZERO {
        return Ok(Flow::Next);
    }
    let address = effective_address(ctx, rb, disp);
    let value = ctx.load(address, AccessSize::Quad)?;
    ctx.write_fp(fa, value);
    Ok(Flow::Next)
}

fn sts(ctx: &mut ExecContext<'_>, insn: &DecodedInstruction) -> Result {
    ctx.require_fp()?;
    let (fa, rb, disp) = ctx.memory(insn)?;
    let address = effective_address(ctx, rb, disp);
    let value = t_to_s(ctx.read_fp(fa));
    ctx.store(address, AccessSize::Long, value as u64)?;
    Ok(Flow::Next)
}

fn stt(ctx: &mut ExecContext<'_>, insn: &DecodedInstruction) -> Result {
    ctx.require_fp()?;
    let (fa, rb, disp) = ctx.memory(insn)?;
    let address = effective_address(ctx, rb, disp);
    let value = ctx.read_fp(fa);
    ctx.store(address, AccessSize::Quad, value)?;
    Ok(Flow::Next)
}
