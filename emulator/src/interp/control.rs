//! Branches, the jump group and the MISC (0x18) barrier/counter group

use axp_core::{Trap, TrapKind};
use axp_decoder::{
    function::{jump, misc},
    DecodedInstruction, Opcode,
};

use super::{ExecContext, Flow, InterpHandler};
use crate::dispatch::TableBuilder;

pub(super) fn register(b: &mut TableBuilder<InterpHandler>) {
    b.primary(Opcode::Br, br)
        .primary(Opcode::Bsr, br)
        .primary(Opcode::Beq, int_branch)
        .primary(Opcode::Bne, int_branch)
        .primary(Opcode::Blt, int_branch)
        .primary(Opcode::Ble, int_branch)
        .primary(Opcode::Bgt, int_branch)
        .primary(Opcode::Bge, int_branch)
        .primary(Opcode::Blbc, int_branch)
        .primary(Opcode::Blbs, int_branch)
        .primary(Opcode::Fbeq, fp_branch)
        .primary(Opcode::Fbne, fp_branch)
        .primary(Opcode::Fblt, fp_branch)
        .primary(Opcode::Fble, fp_branch)
        .primary(Opcode::Fbgt, fp_branch)
        .primary(Opcode::Fbge, fp_branch);

    b.functions(
        Opcode::Jsr,
        &[jump::JMP, jump::JSR, jump::RET, jump::JSR_COROUTINE],
        jump_group,
    );

    b.functions(
        Opcode::Misc,
        &[
            misc::TRAPB,
            misc::EXCB,
            misc::MB,
            misc::WMB,
            misc::FETCH,
            misc::FETCH_M,
            misc::ECB,
            misc::WH64,
        ],
        barrier,
    )
    .function(Opcode::Misc, misc::RPCC, rpcc)
    .function(Opcode::Misc, misc::RC, rc)
    .function(Opcode::Misc, misc::RS, rs);
}

type Result = std::result::Result<Flow, Trap>;

fn branch_fields(
    ctx: &ExecContext<'_>,
    insn: &DecodedInstruction,
) -> std::result::Result<(u8, u64), Trap> {
    match (insn, insn.branch_target(ctx.pc)) {
        (DecodedInstruction::Branch { ra, .. }, Some(target)) => Ok((*ra, target)),
        _ => Err(ctx.trap(TrapKind::IllegalInstruction)),
    }
}

/// BR and BSR: link Ra to the next instruction and jump
fn br(ctx: &mut ExecContext<'_>, insn: &DecodedInstruction) -> Result {
    let (ra, target) = branch_fields(ctx, insn)?;
    ctx.write(ra, ctx.pc.wrapping_add(4));
    Ok(Flow::Jump(target))
}

/// Condition of an integer conditional branch against Ra
pub fn int_condition(opcode: Opcode, a: u64) -> bool {
    let signed = a as i64;
    match opcode {
        Opcode::Beq => a == 0,
        Opcode::Bne => a != 0,
        Opcode::Blt => signed < 0,
        Opcode::Ble => signed <= 0,
        Opcode::Bgt => signed > 0,
        Opcode::Bge => signed >= 0,
        Opcode::Blbc => a & 1 == 0,
        Opcode::Blbs => a & 1 == 1,
        _ => false,
    }
}

/// Condition of a floating conditional branch or FCMOV against the bits of Fa
///
/// Tests are on the sign-magnitude encoding, so -0.0 compares equal to zero.
pub fn fp_condition(opcode: Opcode, bits: u64) -> bool {
    let zero = bits << 1 == 0;
    let negative = bits >> 63 == 1;
    match opcode {
        Opcode::Fbeq => zero,
        Opcode::Fbne => !zero,
        Opcode::Fblt => negative && !zero,
        Opcode::Fbge => !negative || zero,
        Opcode::Fble => negative || zero,
        Opcode::Fbgt => !negative && !zero,
        _ => false,
    }
}

fn int_branch(ctx: &mut ExecContext<'_>, insn: &DecodedInstruction) -> Result {
    let (ra, target) = branch_fields(ctx, insn)?;
    if int_condition(insn.opcode(), ctx.read(ra)) {
        Ok(Flow::Jump(target))
    } else {
        Ok(Flow::Next)
    }
}

fn fp_branch(ctx: &mut ExecContext<'_>, insn: &DecodedInstruction) -> Result {
    ctx.require_fp()?;
    let (fa, target) = branch_fields(ctx, insn)?;
    if fp_condition(insn.opcode(), ctx.read_fp(fa)) {
        Ok(Flow::Jump(target))
    } else {
        Ok(Flow::Next)
    }
}

/// JMP, JSR, RET and JSR_COROUTINE differ only in their prediction hint
fn jump_group(ctx: &mut ExecContext<'_>, insn: &DecodedInstruction) -> Result {
    let (ra, rb, _) = ctx.memory(insn)?;
    let target = ctx.read(rb) & !3;
    ctx.write(ra, ctx.pc.wrapping_add(4));
    Ok(Flow::Jump(target))
}

fn barrier(_ctx: &mut ExecContext<'_>, _insn: &DecodedInstruction) -> Result {
    Ok(Flow::Next)
}

fn rpcc(ctx: &mut ExecContext<'_>, insn: &DecodedInstruction) -> Result {
    let (ra, _, _) = ctx.memory(insn)?;
    ctx.write(ra, ctx.cpu.cycles);
    Ok(Flow::Next)
}

fn rc(ctx: &mut ExecContext<'_>, insn: &DecodedInstruction) -> Result {
    let (ra, _, _) = ctx.memory(insn)?;
    ctx.write(ra, ctx.cpu.intr_flag as u64);
    ctx.cpu.intr_flag = false;
    Ok(Flow::Next)
}

fn rs(ctx: &mut ExecContext<'_>, insn: &DecodedInstruction) -> Result {
    let (ra, _, _) = ctx.memory(insn)?;
    ctx.write(ra, ctx.cpu.intr_flag as u64);
    ctx.cpu.intr_flag = true;
    Ok(Flow::Next)
}
