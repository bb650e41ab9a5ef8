//! Synchronous traps
//!
//! A handler that detects an exceptional condition returns a [`Trap`] instead
//! of completing the instruction. Nothing is written for that instruction and
//! the driver redirects execution to the architected vector for the trap kind.

use serde::{Deserialize, Serialize};

use crate::memory::MemFault;

/// Kinds of trap, each with a stable non-zero code used by compiled code
#[repr(u64)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, thiserror::Error)]
pub enum TrapKind {
    #[error("privilege violation")]
    PrivilegeViolation = 1,
    #[error("access violation")]
    AccessViolation = 2,
    #[error("unaligned access")]
    UnalignedAccess = 3,
    #[error("illegal instruction")]
    IllegalInstruction = 4,
    #[error("integer overflow")]
    IntegerOverflow = 5,
    #[error("floating-point divide by zero")]
    FpDivideByZero = 6,
    #[error("floating-point disabled")]
    FpDisabled = 7,
    #[error("system call")]
    SoftwareInterrupt = 8,
    #[error("breakpoint")]
    Breakpoint = 9,
    #[error("generated trap")]
    GenTrap = 10,
}

impl TrapKind {
    /// Code stored in the pending-trap slot; never zero
    pub const fn code(self) -> u64 {
        self as u64
    }

    pub const fn from_code(code: u64) -> Option<Self> {
        let kind = match code {
            1 => Self::PrivilegeViolation,
            2 => Self::AccessViolation,
            3 => Self::UnalignedAccess,
            4 => Self::IllegalInstruction,
            5 => Self::IntegerOverflow,
            6 => Self::FpDivideByZero,
            7 => Self::FpDisabled,
            8 => Self::SoftwareInterrupt,
            9 => Self::Breakpoint,
            10 => Self::GenTrap,
            _ => return None,
        };
        Some(kind)
    }

    /// Traps raised by CALL_PAL report the following instruction as the
    /// exception address; faults report the faulting instruction.
    pub const fn resumes_after(self) -> bool {
        matches!(self, Self::SoftwareInterrupt | Self::Breakpoint | Self::GenTrap)
    }

    /// Offset of this kind's entry from the vector base
    pub const fn vector_offset(self) -> u64 {
        match self {
            Self::PrivilegeViolation => 0x080,
            Self::AccessViolation => 0x100,
            Self::UnalignedAccess => 0x180,
            Self::IllegalInstruction => 0x200,
            Self::IntegerOverflow => 0x280,
            Self::FpDivideByZero => 0x300,
            Self::FpDisabled => 0x380,
            Self::SoftwareInterrupt => 0x400,
            Self::Breakpoint => 0x480,
            Self::GenTrap => 0x500,
        }
    }
}

/// A raised trap
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, thiserror::Error)]
#[error("{kind} at pc={pc:#x}")]
pub struct Trap {
    pub kind: TrapKind,
    /// Address of the instruction that raised the trap
    pub pc: u64,
    /// Faulting data address for memory traps
    pub address: Option<u64>,
}

impl Trap {
    pub const fn new(kind: TrapKind, pc: u64) -> Self {
        Self { kind, pc, address: None }
    }

    pub const fn with_address(kind: TrapKind, pc: u64, address: u64) -> Self {
        Self { kind, pc, address: Some(address) }
    }

    /// Trap raised by a failed memory access
    pub const fn from_fault(fault: MemFault, pc: u64) -> Self {
        let (kind, address) = match fault {
            MemFault::Unmapped(addr) | MemFault::Protection(addr) => {
                (TrapKind::AccessViolation, addr)
            }
            MemFault::Unaligned(addr) => (TrapKind::UnalignedAccess, addr),
        };
        Self::with_address(kind, pc, address)
    }

    /// Value to record as the exception address on delivery
    pub const fn exception_address(&self) -> u64 {
        if self.kind.resumes_after() {
            self.pc.wrapping_add(4)
        } else {
            self.pc
        }
    }
}

/// Architected trap vector table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrapVectors {
    pub base: u64,
}

impl TrapVectors {
    pub const fn new(base: u64) -> Self {
        Self { base }
    }

    pub const fn vector(&self, kind: TrapKind) -> u64 {
        self.base.wrapping_add(kind.vector_offset())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_round_trip() {
        for code in 1..=10 {
            let kind = TrapKind::from_code(code).unwrap();
            assert_eq!(kind.code(), code);
        }
        assert_eq!(TrapKind::from_code(0), None);
        assert_eq!(TrapKind::from_code(11), None);
    }

    #[test]
    fn test_exception_address() {
        assert_eq!(Trap::new(TrapKind::SoftwareInterrupt, 0x100).exception_address(), 0x104);
        assert_eq!(Trap::new(TrapKind::IntegerOverflow, 0x100).exception_address(), 0x100);
    }

    #[test]
    fn test_fault_conversion() {
        let trap = Trap::from_fault(MemFault::Unaligned(0x1003), 0x40);
        assert_eq!(trap.kind, TrapKind::UnalignedAccess);
        assert_eq!(trap.address, Some(0x1003));
        assert_eq!(trap.to_string(), "unaligned access at pc=0x40");
    }

    #[test]
    fn test_vectors() {
        let vectors = TrapVectors::new(0x8000);
        assert_eq!(vectors.vector(TrapKind::Breakpoint), 0x8480);
    }
}
