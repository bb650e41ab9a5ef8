//! Decoded instruction representation and the format-specific decoders

use std::fmt;

use crate::{
    function::{function_mnemonic, primary_mnemonic},
    opcode::{InstructionFormat, Opcode},
    utils::{bits, branch_target, sign_extend},
};

/// Bit masks for field extraction
const MASK5: u32 = 0b1_1111; // 5-bit mask
const MASK7: u32 = 0b111_1111; // 7-bit mask
const MASK8: u32 = 0b1111_1111; // 8-bit mask
const MASK11: u32 = 0b111_1111_1111; // 11-bit mask
const MASK16: u32 = 0xFFFF; // 16-bit mask
const MASK21: u32 = 0x1F_FFFF; // 21-bit mask
const MASK26: u32 = 0x3FF_FFFF; // 26-bit mask

/// Second source operand of an operate-format instruction
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum OperandB {
    /// Register Rb (bits [20:16])
    Register(u8),
    /// Zero-extended 8-bit literal (bits [20:13]), selected by bit 12
    Literal(u8),
}

/// A decoded Alpha instruction word
///
/// Exactly one variant exists per format. Fields are raw architectural values;
/// whether the operation is implemented is decided later, at dispatch.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum DecodedInstruction {
    Operate {
        /// Original 32-bit word
        raw: u32,
        opcode: Opcode,
        /// First source register (bits [25:21])
        ra: u8,
        /// Second source operand
        rb: OperandB,
        /// Function code: 7 bits for integer operate, 11 bits for FP operate
        function: u32,
        /// Destination register (bits [4:0])
        rc: u8,
    },
    Memory {
        raw: u32,
        opcode: Opcode,
        /// Data register (bits [25:21])
        ra: u8,
        /// Base register (bits [20:16])
        rb: u8,
        /// Signed byte displacement (bits [15:0])
        displacement: i16,
    },
    Branch {
        raw: u32,
        opcode: Opcode,
        /// Tested or link register (bits [25:21])
        ra: u8,
        /// Signed instruction displacement (bits [20:0], sign-extended)
        displacement: i32,
    },
    Pal {
        raw: u32,
        /// PAL function (bits [25:0])
        function: u32,
    },
}

/// Decode a 32-bit Alpha instruction word
///
/// Total and side-effect free: every word yields exactly one variant.
pub fn decode(word: u32) -> DecodedInstruction {
    let opcode = Opcode::from_bits(bits(word, 26, 6) as u8);
    match opcode.format() {
        InstructionFormat::Operate => decode_operate(word, opcode),
        InstructionFormat::Memory => decode_memory(word, opcode),
        InstructionFormat::Branch => decode_branch(word, opcode),
        InstructionFormat::Pal => DecodedInstruction::Pal { raw: word, function: word & MASK26 },
    }
}

fn decode_operate(word: u32, opcode: Opcode) -> DecodedInstruction {
    let ra = ((word >> 21) & MASK5) as u8;
    let rc = (word & MASK5) as u8;

    // FP operate reuses bits 15-12 as part of the function field
    let (rb, function) = if opcode.is_fp_operate() {
        (OperandB::Register(((word >> 16) & MASK5) as u8), (word >> 5) & MASK11)
    } else if (word >> 12) & 1 == 1 {
        (OperandB::Literal(((word >> 13) & MASK8) as u8), (word >> 5) & MASK7)
    } else {
        (OperandB::Register(((word >> 16) & MASK5) as u8), (word >> 5) & MASK7)
    };

    DecodedInstruction::Operate { raw: word, opcode, ra, rb, function, rc }
}

fn decode_memory(word: u32, opcode: Opcode) -> DecodedInstruction {
    DecodedInstruction::Memory {
        raw: word,
        opcode,
        ra: ((word >> 21) & MASK5) as u8,
        rb: ((word >> 16) & MASK5) as u8,
        displacement: (word & MASK16) as u16 as i16,
    }
}

fn decode_branch(word: u32, opcode: Opcode) -> DecodedInstruction {
    DecodedInstruction::Branch {
        raw: word,
        opcode,
        ra: ((word >> 21) & MASK5) as u8,
        displacement: sign_extend(word & MASK21, 21),
    }
}

impl DecodedInstruction {
    /// Size of an instruction in bytes
    pub const fn size() -> usize {
        4
    }

    /// Original instruction word
    pub const fn raw(&self) -> u32 {
        match *self {
            Self::Operate { raw, .. }
            | Self::Memory { raw, .. }
            | Self::Branch { raw, .. }
            | Self::Pal { raw, .. } => raw,
        }
    }

    pub const fn opcode(&self) -> Opcode {
        match *self {
            Self::Operate { opcode, .. }
            | Self::Memory { opcode, .. }
            | Self::Branch { opcode, .. } => opcode,
            Self::Pal { .. } => Opcode::CallPal,
        }
    }

    pub const fn format(&self) -> InstructionFormat {
        self.opcode().format()
    }

    /// Secondary field used as the dispatch key, if the opcode has one
    ///
    /// - Operate: the function field
    /// - MISC: displacement bits [15:10]
    /// - Jump group: displacement bits [15:14]
    /// - PAL: the 26-bit function
    pub const fn function_code(&self) -> Option<u32> {
        match *self {
            Self::Operate { function, .. } => Some(function),
            Self::Memory { opcode: Opcode::Misc, displacement, .. } => {
                Some(((displacement as u16) >> 10) as u32)
            }
            Self::Memory { opcode: Opcode::Jsr, displacement, .. } => {
                Some(((displacement as u16) >> 14) as u32)
            }
            Self::Memory { .. } | Self::Branch { .. } => None,
            Self::Pal { function, .. } => Some(function),
        }
    }

    /// True if execution does not fall through to the next word
    pub const fn ends_block(&self) -> bool {
        self.opcode().ends_block()
    }

    /// Branch target for a branch-format instruction located at `pc`
    pub const fn branch_target(&self, pc: u64) -> Option<u64> {
        match *self {
            Self::Branch { displacement, .. } => Some(branch_target(pc, displacement)),
            _ => None,
        }
    }

    /// Assembler mnemonic, if the encoding names a known operation
    pub fn mnemonic(&self) -> Option<&'static str> {
        match self.function_code() {
            Some(function) => function_mnemonic(self.opcode(), function),
            None => primary_mnemonic(self.opcode()),
        }
    }

    /// Disassemble with branch targets resolved against `pc`
    pub fn disassemble(&self, pc: u64) -> String {
        match *self {
            Self::Branch { ra, .. } => match (self.mnemonic(), self.branch_target(pc)) {
                (Some(name), Some(target)) => {
                    format!("{name} {}{ra}, {target:#x}", reg_prefix(self.opcode()))
                }
                _ => self.to_string(),
            },
            _ => self.to_string(),
        }
    }
}

/// Register file named by the Ra field of memory and branch instructions
const fn reg_prefix(opcode: Opcode) -> char {
    match opcode {
        Opcode::Ldf
        | Opcode::Ldg
        | Opcode::Lds
        | Opcode::Ldt
        | Opcode::Stf
        | Opcode::Stg
        | Opcode::Sts
        | Opcode::Stt
        | Opcode::Fbeq
        | Opcode::Fblt
        | Opcode::Fble
        | Opcode::Fbne
        | Opcode::Fbge
        | Opcode::Fbgt => 'f',
        _ => 'r',
    }
}

impl fmt::Display for DecodedInstruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Some(name) = self.mnemonic() else {
            return write!(f, ".long {:#010x}", self.raw());
        };

        match *self {
            Self::Operate { opcode, ra, rb: OperandB::Register(rb), rc, .. }
                if opcode.is_fp_operate() =>
            {
                write!(f, "{name} f{ra}, f{rb}, f{rc}")
            }
            Self::Operate { ra, rb: OperandB::Register(rb), rc, .. } => {
                write!(f, "{name} r{ra}, r{rb}, r{rc}")
            }
            Self::Operate { ra, rb: OperandB::Literal(lit), rc, .. } => {
                write!(f, "{name} r{ra}, #{lit}, r{rc}")
            }
            Self::Memory { opcode: Opcode::Misc, ra, .. } => write!(f, "{name} r{ra}"),
            Self::Memory { opcode: Opcode::Jsr, ra, rb, .. } => write!(f, "{name} r{ra}, (r{rb})"),
            Self::Memory { opcode, ra, rb, displacement, .. } => {
                write!(f, "{name} {}{ra}, {displacement}(r{rb})", reg_prefix(opcode))
            }
            Self::Branch { opcode, ra, displacement, .. } => {
                let offset = 4 + 4 * displacement as i64;
                write!(f, "{name} {}{ra}, .{offset:+}", reg_prefix(opcode))
            }
            Self::Pal { .. } => write!(f, "call_pal {name}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::function::{inta, jump, misc};

    fn operate(opcode: u32, ra: u32, rb: u32, function: u32, rc: u32) -> u32 {
        (opcode << 26) | (ra << 21) | (rb << 16) | (function << 5) | rc
    }

    #[test]
    fn test_decode_addq() {
        // addq r1, r2, r3
        let result = decode(operate(0x10, 1, 2, inta::ADDQ, 3));
        match result {
            DecodedInstruction::Operate { opcode, ra, rb, function, rc, .. } => {
                assert_eq!(opcode, Opcode::IntA);
                assert_eq!(ra, 1);
                assert_eq!(rb, OperandB::Register(2));
                assert_eq!(function, inta::ADDQ);
                assert_eq!(rc, 3);
            }
            _ => panic!("Expected Operate instruction"),
        }
        assert_eq!(result.mnemonic(), Some("addq"));
        assert_eq!(result.to_string(), "addq r1, r2, r3");
    }

    #[test]
    fn test_decode_literal_operand() {
        // addq r1, #255, r3
        let word = (0x10 << 26) | (1 << 21) | (0xFF << 13) | (1 << 12) | (inta::ADDQ << 5) | 3;
        match decode(word) {
            DecodedInstruction::Operate { rb, .. } => assert_eq!(rb, OperandB::Literal(255)),
            _ => panic!("Expected Operate instruction"),
        }
    }

    #[test]
    fn test_decode_fp_operate_keeps_bit_12() {
        // addt/su f1, f2, f3 -> function 0x5A0 sets bit 12 of the word
        let word = operate(0x16, 1, 2, 0x5A0, 3);
        match decode(word) {
            DecodedInstruction::Operate { rb, function, .. } => {
                assert_eq!(rb, OperandB::Register(2));
                assert_eq!(function, 0x5A0);
            }
            _ => panic!("Expected Operate instruction"),
        }
    }

    #[test]
    fn test_decode_memory_negative_displacement() {
        // ldq r4, -8(r30)
        let word = (0x29 << 26) | (4 << 21) | (30 << 16) | 0xFFF8;
        match decode(word) {
            DecodedInstruction::Memory { opcode, ra, rb, displacement, .. } => {
                assert_eq!(opcode, Opcode::Ldq);
                assert_eq!((ra, rb, displacement), (4, 30, -8));
            }
            _ => panic!("Expected Memory instruction"),
        }
        assert_eq!(decode(word).to_string(), "ldq r4, -8(r30)");
    }

    #[test]
    fn test_decode_misc_and_jump_functions() {
        let rpcc = (0x18 << 26) | (5 << 21) | 0xC000;
        assert_eq!(decode(rpcc).function_code(), Some(misc::RPCC));
        assert_eq!(decode(rpcc).mnemonic(), Some("rpcc"));

        // ret r31, (r26), hint 1
        let ret = (0x1A << 26) | (31 << 21) | (26 << 16) | (2 << 14) | 1;
        assert_eq!(decode(ret).function_code(), Some(jump::RET));
        assert!(decode(ret).ends_block());
    }

    #[test]
    fn test_decode_branch_backwards() {
        // bne r1, -1 (branch to itself)
        let word = (0x3D << 26) | (1 << 21) | 0x1F_FFFF;
        let insn = decode(word);
        assert_eq!(insn.branch_target(0x2000), Some(0x2000));
        assert_eq!(insn.disassemble(0x2000), "bne r1, 0x2000");
        assert_eq!(insn.to_string(), "bne r1, .+0");
    }

    #[test]
    fn test_decode_pal() {
        let insn = decode(0x0000_0083);
        assert_eq!(insn, DecodedInstruction::Pal { raw: 0x83, function: 0x83 });
        assert_eq!(insn.to_string(), "call_pal callsys");
    }

    #[test]
    fn test_unknown_encoding_displays_raw_word() {
        let word = 0x0400_0000; // opcode 0x01, reserved
        assert_eq!(decode(word).mnemonic(), None);
        assert_eq!(decode(word).to_string(), ".long 0x04000000");
    }
}
