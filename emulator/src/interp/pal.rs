//! CALL_PAL functions and the PAL-reserved hardware opcodes

use axp_core::{ProcessorMode, Trap, TrapKind, REG_A0, REG_V0};
use axp_decoder::{function::pal, DecodedInstruction, Opcode};
use tracing::debug;

use super::{ExecContext, Flow, InterpHandler};
use crate::dispatch::TableBuilder;

pub(super) fn register(b: &mut TableBuilder<InterpHandler>) {
    b.function(Opcode::CallPal, pal::HALT, halt)
        .functions(Opcode::CallPal, &[pal::BPT, pal::BUGCHK], breakpoint)
        .function(Opcode::CallPal, pal::CALLSYS, callsys)
        .function(Opcode::CallPal, pal::IMB, imb)
        .function(Opcode::CallPal, pal::RDUNIQUE, rdunique)
        .function(Opcode::CallPal, pal::WRUNIQUE, wrunique)
        .function(Opcode::CallPal, pal::GENTRAP, gentrap);

    for opcode in [Opcode::HwMfpr, Opcode::HwLd, Opcode::HwMtpr, Opcode::HwRei, Opcode::HwSt] {
        b.primary(opcode, privileged);
    }
}

type Result = std::result::Result<Flow, Trap>;

fn halt(ctx: &mut ExecContext<'_>, _insn: &DecodedInstruction) -> Result {
    if ctx.cpu.mode != ProcessorMode::Kernel {
        return Err(ctx.trap(TrapKind::PrivilegeViolation));
    }
    debug!("halt at {:#x}", ctx.pc);
    ctx.cpu.halted = true;
    Ok(Flow::Next)
}

fn breakpoint(ctx: &mut ExecContext<'_>, _insn: &DecodedInstruction) -> Result {
    Err(ctx.trap(TrapKind::Breakpoint))
}

fn callsys(ctx: &mut ExecContext<'_>, _insn: &DecodedInstruction) -> Result {
    Err(ctx.trap(TrapKind::SoftwareInterrupt))
}

fn imb(_ctx: &mut ExecContext<'_>, _insn: &DecodedInstruction) -> Result {
    Ok(Flow::FlushCode)
}

fn rdunique(ctx: &mut ExecContext<'_>, _insn: &DecodedInstruction) -> Result {
    ctx.write(REG_V0, ctx.cpu.unique);
    Ok(Flow::Next)
}

fn wrunique(ctx: &mut ExecContext<'_>, _insn: &DecodedInstruction) -> Result {
    ctx.cpu.unique = ctx.read(REG_A0);
    Ok(Flow::Next)
}

fn gentrap(ctx: &mut ExecContext<'_>, _insn: &DecodedInstruction) -> Result {
    Err(ctx.trap(TrapKind::GenTrap))
}

/// HW_MFPR, HW_LD, HW_MTPR, HW_REI and HW_ST are only valid inside PALcode
fn privileged(ctx: &mut ExecContext<'_>, _insn: &DecodedInstruction) -> Result {
    Err(ctx.trap(TrapKind::PrivilegeViolation))
}
