//! * Holds the architectural state of one Alpha processor.
//! * The state is modified by every interpreted instruction and, when running compiled code, by
//!   the emitted host instructions through fixed field offsets.
//! * Compiled code reports traps through the pending-trap slot instead of returning a `Result`.

use serde::Serialize;

use crate::{
    flags::fpcr,
    memory::{AccessContext, AccessKind},
    registers::RegisterFile,
    trap::{Trap, TrapKind},
};

/// Processor mode, deciding privileged-instruction access
#[repr(u8)]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ProcessorMode {
    #[default]
    Kernel = 0,
    User = 1,
}

/// Accessors the interpreter and helpers use without depending on the layout of the state
pub trait ProcessorContext {
    fn program_counter(&self) -> u64;
    fn set_program_counter(&mut self, pc: u64);
    /// Move the program counter past the current instruction
    fn advance_pc(&mut self);
    /// FPCR exception and rounding bits
    fn fp_condition_flags(&self) -> u64;
    fn set_fp_condition_flags(&mut self, flags: u64);
}

#[repr(C)]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
/// Alpha processor state container
///
/// `#[repr(C)]` so that compiled blocks can address fields with `offset_of!`.
pub struct CpuState {
    /// Integer and floating register files
    pub regs: RegisterFile,

    /// Address of the next instruction to execute
    pub pc: u64,

    /// Floating-point control register
    pub fpcr: u64,

    /// Per-process value read and written by RDUNIQUE/WRUNIQUE
    pub unique: u64,

    /// Lock address recorded by LDx_L, aligned to the lock granule
    pub lock_addr: u64,

    /// Exception address recorded on trap delivery
    pub exc_addr: u64,

    /// Retired-instruction counter, read by RPCC
    pub cycles: u64,

    /// Trap code written by compiled code, zero when no trap is pending
    pub pending_trap: u64,

    /// Faulting data address accompanying `pending_trap`
    pub pending_trap_addr: u64,

    /// Set by LDx_L, cleared by STx_C and by intervening stores to the granule
    pub lock_flag: bool,

    /// FP instructions trap when clear
    pub fp_enabled: bool,

    /// Interrupt flag read and updated by RC/RS
    pub intr_flag: bool,

    /// Set by HALT
    pub halted: bool,

    pub mode: ProcessorMode,
}

impl Default for CpuState {
    fn default() -> Self {
        Self {
            regs: RegisterFile::default(),
            pc: 0,
            fpcr: fpcr::DYN_NORMAL,
            unique: 0,
            lock_addr: 0,
            exc_addr: 0,
            cycles: 0,
            pending_trap: 0,
            pending_trap_addr: 0,
            lock_flag: false,
            fp_enabled: true,
            intr_flag: false,
            halted: false,
            mode: ProcessorMode::Kernel,
        }
    }
}

/// Bytes covered by one load-lock reservation
pub const LOCK_GRANULE: u64 = 16;

impl CpuState {
    pub fn new(pc: u64) -> Self {
        Self { pc, ..Default::default() }
    }

    /// Access context for the current mode
    pub fn access(&self, kind: AccessKind) -> AccessContext {
        AccessContext::new(self.mode, kind)
    }

    /// Record a load-lock reservation covering `address`
    pub fn set_lock(&mut self, address: u64) {
        self.lock_flag = true;
        self.lock_addr = address & !(LOCK_GRANULE - 1);
    }

    /// Drop the reservation if a store touches its granule
    pub fn clear_lock_on_store(&mut self, address: u64) {
        if self.lock_flag && address & !(LOCK_GRANULE - 1) == self.lock_addr {
            self.lock_flag = false;
        }
    }

    /// Take the trap left in the pending slot by compiled code
    pub fn take_pending_trap(&mut self, pc: u64) -> Option<Trap> {
        if self.pending_trap == 0 {
            return None;
        }
        let code = std::mem::take(&mut self.pending_trap);
        let address = std::mem::take(&mut self.pending_trap_addr);
        let kind = TrapKind::from_code(code).unwrap_or(TrapKind::IllegalInstruction);
        Some(match kind {
            TrapKind::AccessViolation | TrapKind::UnalignedAccess => {
                Trap::with_address(kind, pc, address)
            }
            _ => Trap::new(kind, pc),
        })
    }

    /// Store `trap` into the pending slot
    pub fn set_pending_trap(&mut self, trap: &Trap) {
        self.pending_trap = trap.kind.code();
        self.pending_trap_addr = trap.address.unwrap_or(0);
    }

    /// Redirect execution to the vector for `trap`
    ///
    /// Records the exception address, enters kernel mode and, for FP divide by zero, sets the
    /// matching FPCR status bits.
    pub fn deliver_trap(&mut self, trap: &Trap, vector: u64) {
        self.exc_addr = trap.exception_address();
        self.mode = ProcessorMode::Kernel;
        self.lock_flag = false;
        if trap.kind == TrapKind::FpDivideByZero {
            self.fpcr |= fpcr::DZE | fpcr::SUM;
        }
        self.pc = vector;
    }
}

impl ProcessorContext for CpuState {
    #[inline]
    fn program_counter(&self) -> u64 {
        self.pc
    }

    #[inline]
    fn set_program_counter(&mut self, pc: u64) {
        self.pc = pc;
    }

    #[inline]
    fn advance_pc(&mut self) {
        self.pc = self.pc.wrapping_add(4);
    }

    fn fp_condition_flags(&self) -> u64 {
        self.fpcr
    }

    fn set_fp_condition_flags(&mut self, flags: u64) {
        self.fpcr = flags;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lock_granule() {
        let mut cpu = CpuState::default();
        cpu.set_lock(0x1238);
        assert_eq!(cpu.lock_addr, 0x1230);
        cpu.clear_lock_on_store(0x1240);
        assert!(cpu.lock_flag);
        cpu.clear_lock_on_store(0x123F);
        assert!(!cpu.lock_flag);
    }

    #[test]
    fn test_pending_trap_round_trip() {
        let mut cpu = CpuState::default();
        assert_eq!(cpu.take_pending_trap(0x10), None);

        cpu.set_pending_trap(&Trap::with_address(TrapKind::AccessViolation, 0x10, 0xBAD0));
        let trap = cpu.take_pending_trap(0x10).unwrap();
        assert_eq!(trap, Trap::with_address(TrapKind::AccessViolation, 0x10, 0xBAD0));
        assert_eq!(cpu.pending_trap, 0);
        assert_eq!(cpu.pending_trap_addr, 0);
    }

    #[test]
    fn test_deliver_divide_by_zero() {
        let mut cpu = CpuState::new(0x200);
        cpu.mode = ProcessorMode::User;
        cpu.deliver_trap(&Trap::new(TrapKind::FpDivideByZero, 0x200), 0x8300);
        assert_eq!(cpu.pc, 0x8300);
        assert_eq!(cpu.exc_addr, 0x200);
        assert_eq!(cpu.mode, ProcessorMode::Kernel);
        assert_ne!(cpu.fpcr & fpcr::DZE, 0);
        assert_ne!(cpu.fpcr & fpcr::SUM, 0);
    }

    #[test]
    fn test_context_accessors() {
        let mut cpu = CpuState::new(0xFFFF_FFFF_FFFF_FFFC);
        cpu.advance_pc();
        assert_eq!(cpu.program_counter(), 0);
        cpu.set_fp_condition_flags(fpcr::INV);
        assert_eq!(cpu.fp_condition_flags(), fpcr::INV);
    }
}
