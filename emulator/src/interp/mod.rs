//! Interpreter handlers
//!
//! Each handler executes one decoded instruction against the processor state and memory held by
//! an [`ExecContext`]. Handlers never move the program counter themselves: they report the
//! outcome as a [`Flow`] and the caller applies it. A handler that returns a [`Trap`] has not
//! modified any register or memory location.

mod control;
mod float;
mod integer;
mod memory;
mod pal;

use axp_core::{AccessKind, AccessSize, CpuState, Memory, Trap, TrapKind};
use axp_decoder::{DecodedInstruction, OperandB};
use tracing::trace;

use crate::dispatch::{DispatchTable, Lookup, TableBuilder};

pub use float::{s_to_t, t_to_s};
pub use integer::{AMASK_FEATURES, IMPLVER};

/// What happens after an instruction completes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Continue with the next sequential instruction
    Next,
    /// Continue at the given address
    Jump(u64),
    /// Continue with the next instruction after discarding all translated code
    FlushCode,
}

impl Flow {
    /// Address of the next instruction for an instruction at `pc`
    pub fn next_pc(self, pc: u64) -> u64 {
        match self {
            Flow::Next | Flow::FlushCode => pc.wrapping_add(4),
            Flow::Jump(target) => target,
        }
    }
}

pub type InterpHandler = fn(&mut ExecContext<'_>, &DecodedInstruction) -> Result<Flow, Trap>;

/// Mutable state an interpreter handler runs against
pub struct ExecContext<'a> {
    pub cpu: &'a mut CpuState,
    pub mem: &'a mut dyn Memory,
    /// Address of the instruction being executed
    pub pc: u64,
}

/// Operate-format fields
#[derive(Debug, Clone, Copy)]
pub(crate) struct OperateFields {
    pub ra: u8,
    pub rb: OperandB,
    pub function: u32,
    pub rc: u8,
}

impl<'a> ExecContext<'a> {
    pub fn new(cpu: &'a mut CpuState, mem: &'a mut dyn Memory) -> Self {
        let pc = cpu.pc;
        Self { cpu, mem, pc }
    }

    #[inline]
    pub fn trap(&self, kind: TrapKind) -> Trap {
        Trap::new(kind, self.pc)
    }

    #[inline]
    pub fn read(&self, reg: u8) -> u64 {
        self.cpu.regs.read_int(reg)
    }

    #[inline]
    pub fn write(&mut self, reg: u8, value: u64) {
        self.cpu.regs.write_int(reg, value);
    }

    #[inline]
    pub fn read_fp(&self, reg: u8) -> u64 {
        self.cpu.regs.read_fp(reg)
    }

    #[inline]
    pub fn write_fp(&mut self, reg: u8, value: u64) {
        self.cpu.regs.write_fp(reg, value);
    }

    /// Value of the second operate operand
    #[inline]
    pub fn operand_b(&self, rb: OperandB) -> u64 {
        match rb {
            OperandB::Register(reg) => self.read(reg),
            OperandB::Literal(lit) => lit as u64,
        }
    }

    pub(crate) fn operate(&self, insn: &DecodedInstruction) -> Result<OperateFields, Trap> {
        match *insn {
            DecodedInstruction::Operate { ra, rb, function, rc, .. } => {
                Ok(OperateFields { ra, rb, function, rc })
            }
            _ => Err(self.trap(TrapKind::IllegalInstruction)),
        }
    }

    /// Ra, Rb and displacement of a memory-format instruction
    pub(crate) fn memory(&self, insn: &DecodedInstruction) -> Result<(u8, u8, i16), Trap> {
        match *insn {
            DecodedInstruction::Memory { ra, rb, displacement, .. } => Ok((ra, rb, displacement)),
            _ => Err(self.trap(TrapKind::IllegalInstruction)),
        }
    }

    /// `rc = f(ra, b)`
    pub(crate) fn int_op(
        &mut self,
        insn: &DecodedInstruction,
        f: impl FnOnce(u64, u64) -> u64,
    ) -> Result<Flow, Trap> {
        let op = self.operate(insn)?;
        let value = f(self.read(op.ra), self.operand_b(op.rb));
        self.write(op.rc, value);
        Ok(Flow::Next)
    }

    /// `rc = f(ra, b)`, trapping with integer overflow when `f` yields `None`
    pub(crate) fn int_op_checked(
        &mut self,
        insn: &DecodedInstruction,
        f: impl FnOnce(u64, u64) -> Option<u64>,
    ) -> Result<Flow, Trap> {
        let op = self.operate(insn)?;
        let value = f(self.read(op.ra), self.operand_b(op.rb))
            .ok_or_else(|| self.trap(TrapKind::IntegerOverflow))?;
        self.write(op.rc, value);
        Ok(Flow::Next)
    }

    pub fn require_fp(&self) -> Result<(), Trap> {
        if self.cpu.fp_enabled {
            Ok(())
        } else {
            Err(self.trap(TrapKind::FpDisabled))
        }
    }

    pub fn load(&mut self, address: u64, size: AccessSize) -> Result<u64, Trap> {
        let ctx = self.cpu.access(AccessKind::Read);
        self.mem.load(ctx, address, size).map_err(|fault| Trap::from_fault(fault, self.pc))
    }

    /// Store and drop any load-lock reservation on the stored granule
    pub fn store(&mut self, address: u64, size: AccessSize, value: u64) -> Result<(), Trap> {
        let ctx = self.cpu.access(AccessKind::Write);
        self.mem
            .store(ctx, address, size, value & size.mask())
            .map_err(|fault| Trap::from_fault(fault, self.pc))?;
        self.cpu.clear_lock_on_store(address);
        Ok(())
    }
}

/// Register every interpreter handler
pub fn register(builder: &mut TableBuilder<InterpHandler>) {
    integer::register(builder);
    memory::register(builder);
    control::register(builder);
    float::register(builder);
    pal::register(builder);
}

/// Execute one instruction, raising illegal instruction when no handler exists
pub fn execute(
    table: &DispatchTable<InterpHandler>,
    ctx: &mut ExecContext<'_>,
    insn: &DecodedInstruction,
) -> Result<Flow, Trap> {
    trace!("{:#x}: {}", ctx.pc, insn);
    match table.lookup(insn) {
        Lookup::Handler(handler) => handler(ctx, insn),
        Lookup::Unimplemented => Err(ctx.trap(TrapKind::IllegalInstruction)),
    }
}

#[inline]
pub(crate) const fn sext32(value: u64) -> u64 {
    value as u32 as i32 as i64 as u64
}
