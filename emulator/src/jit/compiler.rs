//! Per-block code generation state
//!
//! Register conventions inside a compiled block:
//!
//! | Host | Use                                        |
//! |------|--------------------------------------------|
//! | rbx  | `*mut CpuState`, callee-saved               |
//! | r12  | `*mut JitFrame`, callee-saved               |
//! | rax  | scratch, and the next pc at the exit label |
//! | rcx, rdx, rsi, rdi, xmm0, xmm1 | scratch          |
//!
//! The prologue saves rbx/r12 and keeps the stack 16-byte aligned so helpers can be called from
//! any point of the body.

use std::mem::offset_of;

use axp_core::{CpuState, RegisterFile, TrapKind, REG_ZERO};
use axp_decoder::{DecodedInstruction, OperandB};
use tracing::trace;
use x64_emitter::{AluOp, CodeBuffer, Cond, Gpr, Label, Width, X64Emitter};

use super::{helpers, BlockFlow, CompileError};
use crate::interp::OperateFields;

/// Out-of-line trap exit
#[derive(Debug, Clone, Copy)]
struct TrapStub {
    label: Label,
    pc: u64,
    /// Kind to record, or `None` when a helper already filled the pending slot
    kind: Option<TrapKind>,
}

/// Code generation state for one block
#[derive(Debug)]
pub struct BlockCompiler {
    em: X64Emitter,
    exit: Label,
    stubs: Vec<TrapStub>,
    /// Address of the instruction being translated
    pc: u64,
}

/// Displacement of integer register `reg` from the state pointer
fn int_disp(reg: u8) -> i32 {
    (offset_of!(CpuState, regs) + RegisterFile::int_offset(reg)) as i32
}

/// Displacement of floating register `reg` from the state pointer
fn fp_disp(reg: u8) -> i32 {
    (offset_of!(CpuState, regs) + RegisterFile::fp_offset(reg)) as i32
}

const PENDING_TRAP: i32 = offset_of!(CpuState, pending_trap) as i32;
const PENDING_TRAP_ADDR: i32 = offset_of!(CpuState, pending_trap_addr) as i32;
const FP_ENABLED: i32 = offset_of!(CpuState, fp_enabled) as i32;

impl BlockCompiler {
    /// Start a block at `start` and emit the prologue
    pub fn new(start: u64) -> Self {
        let mut em = X64Emitter::new();
        let exit = em.new_label();
        em.push(Gpr::Rbx);
        em.push(Gpr::R12);
        em.alu_imm(AluOp::Sub, Width::W64, Gpr::Rsp, 8);
        em.mov(Width::W64, Gpr::Rbx, Gpr::Rdi);
        em.mov(Width::W64, Gpr::R12, Gpr::Rsi);
        Self { em, exit, stubs: Vec::new(), pc: start }
    }

    pub fn pc(&self) -> u64 {
        self.pc
    }

    pub(crate) fn set_pc(&mut self, pc: u64) {
        self.pc = pc;
    }

    /// Direct access to the emitter for instruction-specific sequences
    pub fn em(&mut self) -> &mut X64Emitter {
        &mut self.em
    }

    pub fn new_label(&mut self) -> Label {
        self.em.new_label()
    }

    pub fn bind(&mut self, label: Label) -> Result<(), CompileError> {
        Ok(self.em.bind(label)?)
    }

    fn unsupported(&self, insn: &DecodedInstruction) -> CompileError {
        CompileError::Unsupported { pc: self.pc, word: insn.raw() }
    }

    pub(crate) fn operate(&self, insn: &DecodedInstruction) -> Result<OperateFields, CompileError> {
        match *insn {
            DecodedInstruction::Operate { ra, rb, function, rc, .. } => {
                Ok(OperateFields { ra, rb, function, rc })
            }
            _ => Err(self.unsupported(insn)),
        }
    }

    /// Ra, Rb and displacement of a memory-format instruction
    pub(crate) fn memory(&self, insn: &DecodedInstruction) -> Result<(u8, u8, i16), CompileError> {
        match *insn {
            DecodedInstruction::Memory { ra, rb, displacement, .. } => Ok((ra, rb, displacement)),
            _ => Err(self.unsupported(insn)),
        }
    }

    /// Ra and target of a branch-format instruction
    pub(crate) fn branch(&self, insn: &DecodedInstruction) -> Result<(u8, u64), CompileError> {
        match (insn, insn.branch_target(self.pc)) {
            (DecodedInstruction::Branch { ra, .. }, Some(target)) => Ok((*ra, target)),
            _ => Err(self.unsupported(insn)),
        }
    }

    // Alpha register access through [rbx + offset]

    pub fn load_int(&mut self, dst: Gpr, reg: u8) {
        if reg == REG_ZERO {
            self.em.zero(dst);
        } else {
            self.em.load64(dst, Gpr::Rbx, int_disp(reg));
        }
    }

    pub fn store_int(&mut self, reg: u8, src: Gpr) {
        if reg != REG_ZERO {
            self.em.store64(Gpr::Rbx, int_disp(reg), src);
        }
    }

    pub fn load_fp(&mut self, dst: Gpr, reg: u8) {
        if reg == REG_ZERO {
            self.em.zero(dst);
        } else {
            self.em.load64(dst, Gpr::Rbx, fp_disp(reg));
        }
    }

    pub fn store_fp(&mut self, reg: u8, src: Gpr) {
        if reg != REG_ZERO {
            self.em.store64(Gpr::Rbx, fp_disp(reg), src);
        }
    }

    pub fn load_operand_b(&mut self, dst: Gpr, rb: OperandB) {
        match rb {
            OperandB::Register(reg) => self.load_int(dst, reg),
            OperandB::Literal(lit) => self.em.mov_imm64(dst, lit as u64),
        }
    }

    // Traps

    fn stub(&mut self, kind: Option<TrapKind>) -> Label {
        let pc = self.pc;
        if let Some(stub) = self.stubs.iter().find(|s| s.pc == pc && s.kind == kind) {
            return stub.label;
        }
        let label = self.em.new_label();
        self.stubs.push(TrapStub { label, pc, kind });
        label
    }

    /// Label of a stub raising `kind` at the current instruction
    pub fn trap_label(&mut self, kind: TrapKind) -> Label {
        self.stub(Some(kind))
    }

    /// Leave the block if a helper recorded a trap
    pub fn check_pending(&mut self) {
        let label = self.stub(None);
        self.em.cmp64_mem_imm8(Gpr::Rbx, PENDING_TRAP, 0);
        self.em.jcc(Cond::NE, label);
    }

    /// Raise FP disabled unless floating point is enabled
    pub fn check_fp_enabled(&mut self) {
        let label = self.trap_label(TrapKind::FpDisabled);
        self.em.cmp8_mem_imm8(Gpr::Rbx, FP_ENABLED, 0);
        self.em.jcc(Cond::E, label);
    }

    // Calls and exits

    /// Call an absolute helper address through rax
    pub fn call_helper(&mut self, address: usize) {
        self.em.mov_imm64(Gpr::Rax, address as u64);
        self.em.call_reg(Gpr::Rax);
    }

    /// Leave the block continuing at `target`
    pub fn exit_to(&mut self, target: u64) {
        self.em.mov_imm64(Gpr::Rax, target);
        self.em.jmp(self.exit);
    }

    /// Leave the block with the next pc already in rax
    pub fn exit_with_rax(&mut self) {
        self.em.jmp(self.exit);
    }

    /// Run `insn` through its interpreter handler at run time
    pub fn interpret(&mut self, insn: &DecodedInstruction) -> Result<BlockFlow, CompileError> {
        trace!("{:#x}: {} via interpreter", self.pc, insn);
        self.em.mov(Width::W64, Gpr::Rdi, Gpr::R12);
        self.em.mov_imm64(Gpr::Rsi, insn.raw() as u64);
        self.em.mov_imm64(Gpr::Rdx, self.pc);
        self.call_helper(helpers::jit_interpret as *const () as usize);
        if insn.ends_block() {
            self.exit_with_rax();
            return Ok(BlockFlow::End);
        }
        // rax holds the trapping pc when the slot is set
        self.em.cmp64_mem_imm8(Gpr::Rbx, PENDING_TRAP, 0);
        self.em.jcc(Cond::NE, self.exit);
        Ok(BlockFlow::Continue)
    }

    /// Emit the exit path and trap stubs, and resolve every fixup
    ///
    /// `fallthrough` is the address to continue at when the last instruction did not end the
    /// block.
    pub(crate) fn finish(mut self, fallthrough: Option<u64>) -> Result<CodeBuffer, CompileError> {
        if let Some(next) = fallthrough {
            self.exit_to(next);
        }

        self.em.bind(self.exit)?;
        self.em.alu_imm(AluOp::Add, Width::W64, Gpr::Rsp, 8);
        self.em.pop(Gpr::R12);
        self.em.pop(Gpr::Rbx);
        self.em.ret();

        for stub in std::mem::take(&mut self.stubs) {
            self.em.bind(stub.label)?;
            if let Some(kind) = stub.kind {
                self.em.store64_imm(Gpr::Rbx, PENDING_TRAP, kind.code() as i32);
                self.em.store64_imm(Gpr::Rbx, PENDING_TRAP_ADDR, 0);
            }
            self.exit_to(stub.pc);
        }

        Ok(self.em.finish()?)
    }
}
