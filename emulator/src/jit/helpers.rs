//! Runtime helpers called from translated code
//!
//! Helpers use the C calling convention and receive the [`JitFrame`] of the running block as
//! their first argument. They never unwind: failures are recorded in the pending-trap slot of
//! the processor state and the generated code tests that slot after every call.

use axp_core::{
    update_condition_codes, update_condition_codes_32, AccessSize, CpuState, Memory,
};
use axp_decoder::decode;

use crate::{
    dispatch::DispatchTable,
    interp::{self, ExecContext, Flow, InterpHandler},
};

/// Host-side context of one compiled block execution
pub struct JitFrame<'a> {
    pub cpu: *mut CpuState,
    pub mem: &'a mut dyn Memory,
    pub interp: &'a DispatchTable<InterpHandler>,
    /// Guest address of the first instruction of the block
    pub start: u64,
    /// Cycle counter at block entry
    pub base_cycles: u64,
    /// Set when an interpreted instruction asked for translated code to be discarded
    pub flush_requested: bool,
}

fn access_size(size: u64) -> AccessSize {
    AccessSize::from_bytes(size).unwrap_or(AccessSize::Quad)
}

/// Load `size` bytes from `address`, zero-extended
///
/// # Safety
///
/// `frame` must point to the live frame of the block that is calling, and its `cpu` pointer must
/// be the state the block was entered with.
pub unsafe extern "C" fn jit_load(frame: *mut JitFrame<'_>, address: u64, size: u64) -> u64 {
    let frame = &mut *frame;
    let mut ctx = ExecContext { cpu: &mut *frame.cpu, mem: &mut *frame.mem, pc: 0 };
    match ctx.load(address, access_size(size)) {
        Ok(value) => value,
        Err(trap) => {
            ctx.cpu.set_pending_trap(&trap);
            0
        }
    }
}

/// Store the low `size` bytes of `value` at `address`
///
/// # Safety
///
/// Same contract as [`jit_load`].
pub unsafe extern "C" fn jit_store(frame: *mut JitFrame<'_>, address: u64, value: u64, size: u64) {
    let frame = &mut *frame;
    let mut ctx = ExecContext { cpu: &mut *frame.cpu, mem: &mut *frame.mem, pc: 0 };
    if let Err(trap) = ctx.store(address, access_size(size), value) {
        ctx.cpu.set_pending_trap(&trap);
    }
}

/// Execute the instruction `word` at `pc` with its interpreter handler
///
/// Returns the address of the next instruction, or `pc` itself with the pending-trap slot set
/// when the instruction trapped.
///
/// # Safety
///
/// Same contract as [`jit_load`].
pub unsafe extern "C" fn jit_interpret(frame: *mut JitFrame<'_>, word: u64, pc: u64) -> u64 {
    let frame = &mut *frame;
    let insn = decode(word as u32);
    let cpu = &mut *frame.cpu;

    // Instructions before this one have retired but the block has not reported them yet
    let entry_cycles = cpu.cycles;
    cpu.cycles = frame.base_cycles.wrapping_add(pc.wrapping_sub(frame.start) / 4);

    let mut ctx = ExecContext { cpu, mem: &mut *frame.mem, pc };
    let result = interp::execute(frame.interp, &mut ctx, &insn);
    ctx.cpu.cycles = entry_cycles;

    match result {
        Ok(flow) => {
            if flow == Flow::FlushCode {
                frame.flush_requested = true;
            }
            flow.next_pc(pc)
        }
        Err(trap) => {
            ctx.cpu.set_pending_trap(&trap);
            trap.pc
        }
    }
}

/// `mode` bit selecting subtraction in [`jit_overflows`]
pub const OVERFLOW_SUB: u64 = 1;
/// `mode` bit selecting the longword check in [`jit_overflows`]
pub const OVERFLOW_LONG: u64 = 2;

/// Returns 1 when `result = a ± b` overflows, 0 otherwise
///
/// Decided by the same condition-code function the interpreter uses for `/V` arithmetic.
pub extern "C" fn jit_overflows(result: u64, a: u64, b: u64, mode: u64) -> u64 {
    let is_subtraction = mode & OVERFLOW_SUB != 0;
    let codes = if mode & OVERFLOW_LONG != 0 {
        update_condition_codes_32(result, a, b, is_subtraction)
    } else {
        update_condition_codes(result, a, b, is_subtraction)
    };
    codes.overflow as u64
}
