//! Alpha registers
//!
//! # Integer registers
//!
//! The 32 64-bit integer registers follow the OSF/1 calling standard:
//!
//! | ABI name | R name  | Usage                                     |
//! |----------|---------|-------------------------------------------|
//! | REG_V0   | REG_R0  | Function return value                     |
//! | REG_T0   | REG_R1  | Temporary register 0                      |
//! | REG_T1   | REG_R2  | Temporary register 1                      |
//! | REG_T2   | REG_R3  | Temporary register 2                      |
//! | REG_T3   | REG_R4  | Temporary register 3                      |
//! | REG_T4   | REG_R5  | Temporary register 4                      |
//! | REG_T5   | REG_R6  | Temporary register 5                      |
//! | REG_T6   | REG_R7  | Temporary register 6                      |
//! | REG_T7   | REG_R8  | Temporary register 7                      |
//! | REG_S0   | REG_R9  | Saved register 0                          |
//! | REG_S1   | REG_R10 | Saved register 1                          |
//! | REG_S2   | REG_R11 | Saved register 2                          |
//! | REG_S3   | REG_R12 | Saved register 3                          |
//! | REG_S4   | REG_R13 | Saved register 4                          |
//! | REG_S5   | REG_R14 | Saved register 5                          |
//! | REG_FP   | REG_R15 | Frame pointer / saved register 6          |
//! | REG_A0   | REG_R16 | Argument 0                                |
//! | REG_A1   | REG_R17 | Argument 1                                |
//! | REG_A2   | REG_R18 | Argument 2                                |
//! | REG_A3   | REG_R19 | Argument 3                                |
//! | REG_A4   | REG_R20 | Argument 4                                |
//! | REG_A5   | REG_R21 | Argument 5                                |
//! | REG_T8   | REG_R22 | Temporary register 8                      |
//! | REG_T9   | REG_R23 | Temporary register 9                      |
//! | REG_T10  | REG_R24 | Temporary register 10                     |
//! | REG_T11  | REG_R25 | Temporary register 11                     |
//! | REG_RA   | REG_R26 | Return address                            |
//! | REG_PV   | REG_R27 | Procedure value / temporary register 12   |
//! | REG_AT   | REG_R28 | Assembler temporary                       |
//! | REG_GP   | REG_R29 | Global pointer                            |
//! | REG_SP   | REG_R30 | Stack pointer                             |
//! | REG_ZERO | REG_R31 | Read always as zero, writes discarded     |
//!
//! # Floating point registers
//!
//! 32 64-bit registers holding IEEE values in T (double) format. F31 reads as
//! +0.0 and discards writes. The FP control register is held beside the file.

use serde::Serialize;

pub const REG_R0: u8 = 0;
pub const REG_R1: u8 = 1;
pub const REG_R16: u8 = 16;
pub const REG_R26: u8 = 26;
pub const REG_R30: u8 = 30;
pub const REG_R31: u8 = 31;

pub const REG_V0: u8 = REG_R0;
pub const REG_A0: u8 = REG_R16;
pub const REG_RA: u8 = REG_R26;
pub const REG_SP: u8 = REG_R30;
pub const REG_ZERO: u8 = REG_R31;

pub const FREG_ZERO: u8 = 31;

/// Number of registers in each file
pub const REGS_NUMBER: usize = 32;

/// Integer and floating-point register files
///
/// `#[repr(C)]` so that host code can address individual registers at fixed
/// offsets; slot 31 of each file is never written and so always holds zero.
#[repr(C)]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegisterFile {
    int: [u64; REGS_NUMBER],
    fp: [u64; REGS_NUMBER],
}

impl Default for RegisterFile {
    fn default() -> Self {
        Self { int: [0; REGS_NUMBER], fp: [0; REGS_NUMBER] }
    }
}

impl RegisterFile {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn read_int(&self, index: u8) -> u64 {
        let index = index as usize & 0x1F;
        if index == REG_ZERO as usize {
            0
        } else {
            self.int[index]
        }
    }

    #[inline]
    pub fn write_int(&mut self, index: u8, value: u64) {
        let index = index as usize & 0x1F;
        if index != REG_ZERO as usize {
            self.int[index] = value;
        }
    }

    #[inline]
    pub fn read_fp(&self, index: u8) -> u64 {
        let index = index as usize & 0x1F;
        if index == FREG_ZERO as usize {
            0
        } else {
            self.fp[index]
        }
    }

    #[inline]
    pub fn write_fp(&mut self, index: u8, value: u64) {
        let index = index as usize & 0x1F;
        if index != FREG_ZERO as usize {
            self.fp[index] = value;
        }
    }

    /// Read a floating register as an f64
    #[inline]
    pub fn read_f64(&self, index: u8) -> f64 {
        f64::from_bits(self.read_fp(index))
    }

    #[inline]
    pub fn write_f64(&mut self, index: u8, value: f64) {
        self.write_fp(index, value.to_bits());
    }

    /// Byte offset of integer register `index` from the start of the file
    pub const fn int_offset(index: u8) -> usize {
        (index as usize & 0x1F) * 8
    }

    /// Byte offset of floating register `index` from the start of the file
    pub const fn fp_offset(index: u8) -> usize {
        (REGS_NUMBER + (index as usize & 0x1F)) * 8
    }

    pub fn int_regs(&self) -> &[u64; REGS_NUMBER] {
        &self.int
    }

    pub fn fp_regs(&self) -> &[u64; REGS_NUMBER] {
        &self.fp
    }
}

static_assertions::const_assert_eq!(std::mem::size_of::<RegisterFile>(), 2 * REGS_NUMBER * 8);
