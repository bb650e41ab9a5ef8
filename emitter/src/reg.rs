//! Host register and operand-size definitions

use std::fmt;

/// x86-64 general purpose registers, numbered as in ModRM/REX encodings
#[repr(u8)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Gpr {
    Rax = 0,
    Rcx = 1,
    Rdx = 2,
    Rbx = 3,
    Rsp = 4,
    Rbp = 5,
    Rsi = 6,
    Rdi = 7,
    R8 = 8,
    R9 = 9,
    R10 = 10,
    R11 = 11,
    R12 = 12,
    R13 = 13,
    R14 = 14,
    R15 = 15,
}

impl Gpr {
    /// 4-bit encoding index
    #[inline]
    pub const fn index(self) -> u8 {
        self as u8
    }

    /// Registers whose low byte is only addressable with a REX prefix
    /// (SPL, BPL, SIL, DIL)
    #[inline]
    pub const fn byte_needs_rex(self) -> bool {
        matches!(self, Gpr::Rsp | Gpr::Rbp | Gpr::Rsi | Gpr::Rdi)
    }
}

impl fmt::Display for Gpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const NAMES: [&str; 16] = [
            "rax", "rcx", "rdx", "rbx", "rsp", "rbp", "rsi", "rdi", "r8", "r9", "r10", "r11",
            "r12", "r13", "r14", "r15",
        ];
        f.write_str(NAMES[self.index() as usize])
    }
}

/// SSE registers
#[repr(u8)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Xmm {
    Xmm0 = 0,
    Xmm1 = 1,
    Xmm2 = 2,
    Xmm3 = 3,
    Xmm4 = 4,
    Xmm5 = 5,
    Xmm6 = 6,
    Xmm7 = 7,
    Xmm8 = 8,
    Xmm9 = 9,
    Xmm10 = 10,
    Xmm11 = 11,
    Xmm12 = 12,
    Xmm13 = 13,
    Xmm14 = 14,
    Xmm15 = 15,
}

impl Xmm {
    #[inline]
    pub const fn index(self) -> u8 {
        self as u8
    }
}

/// Operand width of an integer operation
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Width {
    /// 32-bit; results zero-extend into the full register
    W32,
    /// 64-bit; requires REX.W
    W64,
}

impl Width {
    #[inline]
    pub const fn rex_w(self) -> bool {
        matches!(self, Width::W64)
    }
}

/// Condition codes used by `jcc`, `setcc` and `cmovcc`
#[repr(u8)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Cond {
    /// Overflow
    O = 0x0,
    NoOverflow = 0x1,
    /// Unsigned below (carry)
    B = 0x2,
    /// Unsigned above or equal
    AE = 0x3,
    E = 0x4,
    NE = 0x5,
    /// Unsigned below or equal
    BE = 0x6,
    /// Unsigned above
    A = 0x7,
    /// Sign
    S = 0x8,
    NS = 0x9,
    /// Parity (unordered after `ucomisd`)
    P = 0xA,
    NP = 0xB,
    /// Signed less
    L = 0xC,
    GE = 0xD,
    LE = 0xE,
    G = 0xF,
}

impl Cond {
    #[inline]
    pub const fn code(self) -> u8 {
        self as u8
    }
}
