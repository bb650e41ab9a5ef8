//! Primary opcodes and instruction formats

/// Alpha instruction formats
///
/// Every 32-bit instruction word belongs to exactly one of these four formats,
/// selected by the primary opcode in bits [31:26].
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum InstructionFormat {
    /// Operate: register-register and register-literal operations
    ///
    /// Instructions of this type are encoded as follows:
    /*
    -------------------------------------------------------------
    Operate | opcode |  Ra  |  Rb  | SBZ |0| function |  Rc  |
            | 31-26  |25-21 |20-16 |15-13|12|  11-5   | 4-0  |
    -------------------------------------------------------------
            | opcode |  Ra  |   literal  |1| function |  Rc  |  (literal form)
            | opcode |  Fa  |  Fb  |      function    |  Fc  |  (FP operate)
            | 31-26  |25-21 |20-16 |        15-5      | 4-0  |
    -------------------------------------------------------------
    */
    Operate,
    /// Memory: loads, stores, address arithmetic and the jump group
    ///
    /// Instructions of this type are encoded as follows:
    /*
    ------------------------------------------------
    Memory | opcode |  Ra  |  Rb  |  displacement  |
           | 31-26  |25-21 |20-16 |      15-0      |
    ------------------------------------------------
           | opcode |  Ra  |  Rb  | function | -  |  (MISC, bits 15-10)
           | opcode |  Ra  |  Rb  |fn| hint       |  (jump group, bits 15-14)
    ------------------------------------------------
    */
    Memory,
    /// Branch: PC-relative conditional and unconditional branches
    ///
    /// Instructions of this type are encoded as follows:
    /*
    ------------------------------------------
    Branch | opcode |  Ra  |   displacement  |
           | 31-26  |25-21 |      20-0       |
    ------------------------------------------
    */
    Branch,
    /// PAL: calls into privileged architecture library code
    ///
    /// Instructions of this type are encoded as follows:
    /*
    ------------------------------------------
    PAL    | opcode |        function         |
           | 31-26  |          25-0           |
    ------------------------------------------
    */
    Pal,
}

/// Alpha primary opcodes
///
/// All 64 values of the 6-bit field are named, so converting from bits is total.
/// Reserved and PAL-reserved encodings keep their architectural names.
#[repr(u8)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Opcode {
    CallPal = 0x00,
    Opc01 = 0x01,
    Opc02 = 0x02,
    Opc03 = 0x03,
    Opc04 = 0x04,
    Opc05 = 0x05,
    Opc06 = 0x06,
    Opc07 = 0x07,
    /// Load address
    Lda = 0x08,
    /// Load address high
    Ldah = 0x09,
    Ldbu = 0x0A,
    LdqU = 0x0B,
    Ldwu = 0x0C,
    Stw = 0x0D,
    Stb = 0x0E,
    StqU = 0x0F,
    /// Integer arithmetic
    IntA = 0x10,
    /// Integer logical and conditional move
    IntL = 0x11,
    /// Integer shift and byte manipulation
    IntS = 0x12,
    /// Integer multiply
    IntM = 0x13,
    /// Integer to floating move and square root
    Itfp = 0x14,
    /// VAX floating point
    FltV = 0x15,
    /// IEEE floating point
    FltI = 0x16,
    /// Floating point sign copy, moves and conversions
    FltL = 0x17,
    /// Miscellaneous (barriers, cycle counter)
    Misc = 0x18,
    HwMfpr = 0x19,
    /// Jump group (JMP, JSR, RET, JSR_COROUTINE)
    Jsr = 0x1A,
    HwLd = 0x1B,
    /// Floating to integer move and extension instructions
    Fpti = 0x1C,
    HwMtpr = 0x1D,
    HwRei = 0x1E,
    HwSt = 0x1F,
    Ldf = 0x20,
    Ldg = 0x21,
    Lds = 0x22,
    Ldt = 0x23,
    Stf = 0x24,
    Stg = 0x25,
    Sts = 0x26,
    Stt = 0x27,
    Ldl = 0x28,
    Ldq = 0x29,
    LdlL = 0x2A,
    LdqL = 0x2B,
    Stl = 0x2C,
    Stq = 0x2D,
    StlC = 0x2E,
    StqC = 0x2F,
    Br = 0x30,
    Fbeq = 0x31,
    Fblt = 0x32,
    Fble = 0x33,
    Bsr = 0x34,
    Fbne = 0x35,
    Fbge = 0x36,
    Fbgt = 0x37,
    Blbc = 0x38,
    Beq = 0x39,
    Blt = 0x3A,
    Ble = 0x3B,
    Blbs = 0x3C,
    Bne = 0x3D,
    Bge = 0x3E,
    Bgt = 0x3F,
}

/// Opcode lookup indexed by the 6-bit field
const OPCODES: [Opcode; 64] = [
    Opcode::CallPal,
    Opcode::Opc01,
    Opcode::Opc02,
    Opcode::Opc03,
    Opcode::Opc04,
    Opcode::Opc05,
    Opcode::Opc06,
    Opcode::Opc07,
    Opcode::Lda,
    Opcode::Ldah,
    Opcode::Ldbu,
    Opcode::LdqU,
    Opcode::Ldwu,
    Opcode::Stw,
    Opcode::Stb,
    Opcode::StqU,
    Opcode::IntA,
    Opcode::IntL,
    Opcode::IntS,
    Opcode::IntM,
    Opcode::Itfp,
    Opcode::FltV,
    Opcode::FltI,
    Opcode::FltL,
    Opcode::Misc,
    Opcode::HwMfpr,
    Opcode::Jsr,
    Opcode::HwLd,
    Opcode::Fpti,
    Opcode::HwMtpr,
    Opcode::HwRei,
    Opcode::HwSt,
    Opcode::Ldf,
    Opcode::Ldg,
    Opcode::Lds,
    Opcode::Ldt,
    Opcode::Stf,
    Opcode::Stg,
    Opcode::Sts,
    Opcode::Stt,
    Opcode::Ldl,
    Opcode::Ldq,
    Opcode::LdlL,
    Opcode::LdqL,
    Opcode::Stl,
    Opcode::Stq,
    Opcode::StlC,
    Opcode::StqC,
    Opcode::Br,
    Opcode::Fbeq,
    Opcode::Fblt,
    Opcode::Fble,
    Opcode::Bsr,
    Opcode::Fbne,
    Opcode::Fbge,
    Opcode::Fbgt,
    Opcode::Blbc,
    Opcode::Beq,
    Opcode::Blt,
    Opcode::Ble,
    Opcode::Blbs,
    Opcode::Bne,
    Opcode::Bge,
    Opcode::Bgt,
];

impl Opcode {
    /// Convert the low 6 bits of `bits` into an opcode. Never fails.
    pub const fn from_bits(bits: u8) -> Self {
        OPCODES[(bits & 0x3F) as usize]
    }

    /// Raw 6-bit value
    pub const fn bits(self) -> u8 {
        self as u8
    }

    /// Instruction format this opcode is encoded in
    pub const fn format(self) -> InstructionFormat {
        match self as u8 {
            0x00 => InstructionFormat::Pal,
            0x10..=0x17 | 0x1C => InstructionFormat::Operate,
            0x30..=0x3F => InstructionFormat::Branch,
            _ => InstructionFormat::Memory,
        }
    }

    /// Floating-point operate opcodes carry an 11-bit function and no literal form
    pub const fn is_fp_operate(self) -> bool {
        matches!(self, Opcode::Itfp | Opcode::FltV | Opcode::FltI | Opcode::FltL)
    }

    /// Opcodes reserved for PALcode (privileged hardware access)
    pub const fn is_pal_reserved(self) -> bool {
        matches!(
            self,
            Opcode::HwMfpr | Opcode::HwLd | Opcode::HwMtpr | Opcode::HwRei | Opcode::HwSt
        )
    }

    /// Opcodes that leave straight-line execution
    pub const fn ends_block(self) -> bool {
        matches!(self.format(), InstructionFormat::Branch | InstructionFormat::Pal)
            || matches!(self, Opcode::Jsr)
            || self.is_pal_reserved()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_bits_is_identity() {
        for bits in 0u8..64 {
            assert_eq!(Opcode::from_bits(bits).bits(), bits);
        }
    }

    #[test]
    fn test_format_partition() {
        assert_eq!(Opcode::CallPal.format(), InstructionFormat::Pal);
        assert_eq!(Opcode::IntA.format(), InstructionFormat::Operate);
        assert_eq!(Opcode::FltL.format(), InstructionFormat::Operate);
        assert_eq!(Opcode::Fpti.format(), InstructionFormat::Operate);
        assert_eq!(Opcode::Misc.format(), InstructionFormat::Memory);
        assert_eq!(Opcode::Jsr.format(), InstructionFormat::Memory);
        assert_eq!(Opcode::Opc03.format(), InstructionFormat::Memory);
        assert_eq!(Opcode::Br.format(), InstructionFormat::Branch);
        assert_eq!(Opcode::Bgt.format(), InstructionFormat::Branch);
    }

    #[test]
    fn test_block_enders() {
        assert!(Opcode::Br.ends_block());
        assert!(Opcode::Jsr.ends_block());
        assert!(Opcode::CallPal.ends_block());
        assert!(Opcode::HwRei.ends_block());
        assert!(!Opcode::IntA.ends_block());
        assert!(!Opcode::Ldq.ends_block());
    }
}
