//! Function codes for opcode families with a secondary field
//!
//! Integer operate families use the 7-bit function field. Floating-point operate
//! families use an 11-bit field whose upper bits carry trap and rounding
//! qualifiers; the canonical (unqualified) code is listed here. MISC codes are
//! the displacement bits [15:10], jump group codes are bits [15:14] and PAL
//! codes are the 26-bit function.

use crate::opcode::Opcode;

/// Integer arithmetic (opcode 0x10)
pub mod inta {
    pub const ADDL: u32 = 0x00;
    pub const S4ADDL: u32 = 0x02;
    pub const SUBL: u32 = 0x09;
    pub const S4SUBL: u32 = 0x0B;
    pub const CMPBGE: u32 = 0x0F;
    pub const S8ADDL: u32 = 0x12;
    pub const S8SUBL: u32 = 0x1B;
    pub const CMPULT: u32 = 0x1D;
    pub const ADDQ: u32 = 0x20;
    pub const S4ADDQ: u32 = 0x22;
    pub const SUBQ: u32 = 0x29;
    pub const S4SUBQ: u32 = 0x2B;
    pub const CMPEQ: u32 = 0x2D;
    pub const S8ADDQ: u32 = 0x32;
    pub const S8SUBQ: u32 = 0x3B;
    pub const CMPULE: u32 = 0x3D;
    pub const ADDL_V: u32 = 0x40;
    pub const SUBL_V: u32 = 0x49;
    pub const CMPLT: u32 = 0x4D;
    pub const ADDQ_V: u32 = 0x60;
    pub const SUBQ_V: u32 = 0x69;
    pub const CMPLE: u32 = 0x6D;
}

/// Integer logical (opcode 0x11)
pub mod intl {
    pub const AND: u32 = 0x00;
    pub const BIC: u32 = 0x08;
    pub const CMOVLBS: u32 = 0x14;
    pub const CMOVLBC: u32 = 0x16;
    pub const BIS: u32 = 0x20;
    pub const CMOVEQ: u32 = 0x24;
    pub const CMOVNE: u32 = 0x26;
    pub const ORNOT: u32 = 0x28;
    pub const XOR: u32 = 0x40;
    pub const CMOVLT: u32 = 0x44;
    pub const CMOVGE: u32 = 0x46;
    pub const EQV: u32 = 0x48;
    pub const AMASK: u32 = 0x61;
    pub const CMOVLE: u32 = 0x64;
    pub const CMOVGT: u32 = 0x66;
    pub const IMPLVER: u32 = 0x6C;
}

/// Integer shift and byte manipulation (opcode 0x12)
pub mod ints {
    pub const MSKBL: u32 = 0x02;
    pub const EXTBL: u32 = 0x06;
    pub const INSBL: u32 = 0x0B;
    pub const MSKWL: u32 = 0x12;
    pub const EXTWL: u32 = 0x16;
    pub const INSWL: u32 = 0x1B;
    pub const MSKLL: u32 = 0x22;
    pub const EXTLL: u32 = 0x26;
    pub const INSLL: u32 = 0x2B;
    pub const ZAP: u32 = 0x30;
    pub const ZAPNOT: u32 = 0x31;
    pub const MSKQL: u32 = 0x32;
    pub const SRL: u32 = 0x34;
    pub const EXTQL: u32 = 0x36;
    pub const SLL: u32 = 0x39;
    pub const INSQL: u32 = 0x3B;
    pub const SRA: u32 = 0x3C;
    pub const MSKWH: u32 = 0x52;
    pub const INSWH: u32 = 0x57;
    pub const EXTWH: u32 = 0x5A;
    pub const MSKLH: u32 = 0x62;
    pub const INSLH: u32 = 0x67;
    pub const EXTLH: u32 = 0x6A;
    pub const MSKQH: u32 = 0x72;
    pub const INSQH: u32 = 0x77;
    pub const EXTQH: u32 = 0x7A;
}

/// Integer multiply (opcode 0x13)
pub mod intm {
    pub const MULL: u32 = 0x00;
    pub const MULQ: u32 = 0x20;
    pub const UMULH: u32 = 0x30;
    pub const MULL_V: u32 = 0x40;
    pub const MULQ_V: u32 = 0x60;
}

/// Integer to floating (opcode 0x14)
pub mod itfp {
    pub const ITOFS: u32 = 0x004;
    pub const SQRTS: u32 = 0x08B;
    pub const ITOFT: u32 = 0x024;
    pub const SQRTT: u32 = 0x0AB;
}

/// IEEE floating point (opcode 0x16)
pub mod flti {
    pub const ADDS: u32 = 0x080;
    pub const SUBS: u32 = 0x081;
    pub const MULS: u32 = 0x082;
    pub const DIVS: u32 = 0x083;
    pub const ADDT: u32 = 0x0A0;
    pub const SUBT: u32 = 0x0A1;
    pub const MULT: u32 = 0x0A2;
    pub const DIVT: u32 = 0x0A3;
    pub const CMPTUN: u32 = 0x0A4;
    pub const CMPTEQ: u32 = 0x0A5;
    pub const CMPTLT: u32 = 0x0A6;
    pub const CMPTLE: u32 = 0x0A7;
    pub const CVTTS: u32 = 0x0AC;
    pub const CVTTQ: u32 = 0x0AF;
    pub const CVTQS: u32 = 0x0BC;
    pub const CVTQT: u32 = 0x0BE;
    /// Shares the low six bits with CVTTS; only valid with the /S qualifier
    pub const CVTST: u32 = 0x2AC;
}

/// Floating point sign copy and conversions (opcode 0x17)
pub mod fltl {
    pub const CVTLQ: u32 = 0x010;
    pub const CPYS: u32 = 0x020;
    pub const CPYSN: u32 = 0x021;
    pub const CPYSE: u32 = 0x022;
    pub const MT_FPCR: u32 = 0x024;
    pub const MF_FPCR: u32 = 0x025;
    pub const FCMOVEQ: u32 = 0x02A;
    pub const FCMOVNE: u32 = 0x02B;
    pub const FCMOVLT: u32 = 0x02C;
    pub const FCMOVGE: u32 = 0x02D;
    pub const FCMOVLE: u32 = 0x02E;
    pub const FCMOVGT: u32 = 0x02F;
    pub const CVTQL: u32 = 0x030;
    pub const CVTQL_V: u32 = 0x130;
    pub const CVTQL_SV: u32 = 0x530;
}

/// Floating to integer and extensions (opcode 0x1C)
pub mod fpti {
    pub const SEXTB: u32 = 0x00;
    pub const SEXTW: u32 = 0x01;
    pub const CTPOP: u32 = 0x30;
    pub const CTLZ: u32 = 0x32;
    pub const CTTZ: u32 = 0x33;
    pub const FTOIT: u32 = 0x70;
    pub const FTOIS: u32 = 0x78;
}

/// Miscellaneous (opcode 0x18), displacement bits [15:10]
pub mod misc {
    pub const TRAPB: u32 = 0x00;
    pub const EXCB: u32 = 0x01;
    pub const MB: u32 = 0x10;
    pub const WMB: u32 = 0x11;
    pub const FETCH: u32 = 0x20;
    pub const FETCH_M: u32 = 0x28;
    pub const RPCC: u32 = 0x30;
    pub const RC: u32 = 0x38;
    pub const ECB: u32 = 0x3A;
    pub const RS: u32 = 0x3C;
    pub const WH64: u32 = 0x3E;
}

/// Jump group (opcode 0x1A), displacement bits [15:14]
pub mod jump {
    pub const JMP: u32 = 0;
    pub const JSR: u32 = 1;
    pub const RET: u32 = 2;
    pub const JSR_COROUTINE: u32 = 3;
}

/// Unprivileged and kernel PAL calls (opcode 0x00)
pub mod pal {
    pub const HALT: u32 = 0x00;
    pub const BPT: u32 = 0x80;
    pub const BUGCHK: u32 = 0x81;
    pub const CALLSYS: u32 = 0x83;
    pub const IMB: u32 = 0x86;
    pub const RDUNIQUE: u32 = 0x9E;
    pub const WRUNIQUE: u32 = 0x9F;
    pub const GENTRAP: u32 = 0xAA;
}

/// Width in bits of the dispatch key for an opcode's function sub-space,
/// or `None` when the opcode has no function field.
pub const fn function_key_bits(opcode: Opcode) -> Option<u8> {
    match opcode {
        Opcode::IntA | Opcode::IntL | Opcode::IntS | Opcode::IntM | Opcode::Fpti => Some(7),
        Opcode::Itfp | Opcode::FltV | Opcode::FltI | Opcode::FltL => Some(6),
        Opcode::Misc => Some(6),
        Opcode::Jsr => Some(2),
        Opcode::CallPal => Some(8),
        _ => None,
    }
}

/// True when the qualifier bits [10:6] of an FP operate `function` are an encoding the
/// architecture defines for its operation
///
/// Trap qualifiers live in bits [10:8] and the rounding mode in bits [7:6]. Opcodes other than
/// 0x14, 0x16 and 0x17 carry no qualifiers and always pass.
pub const fn fp_qualifiers_defined(opcode: Opcode, function: u32) -> bool {
    let low = function & 0x3F;
    let trap = (function >> 8) & 0x7;
    let round = (function >> 6) & 0x3;
    // none, /U, /SU, /SUI (read /V, /SV, /SVI for CVTTQ)
    let ieee_trap = matches!(trap, 0b000 | 0b001 | 0b101 | 0b111);
    match opcode {
        Opcode::Itfp => match low {
            0x04 | 0x24 => function == low,
            0x0B | 0x2B => ieee_trap,
            _ => true,
        },
        Opcode::FltI => match low {
            0x00..=0x03 | 0x20..=0x23 | 0x2F => ieee_trap,
            0x24..=0x27 => round == 0b10 && matches!(trap, 0b000 | 0b101),
            // CVTTS, or CVTST with /S
            0x2C => ieee_trap || (round == 0b10 && matches!(trap, 0b010 | 0b110)),
            0x3C | 0x3E => matches!(trap, 0b000 | 0b111),
            _ => true,
        },
        Opcode::FltL => match low {
            0x30 => round == 0 && matches!(trap, 0b000 | 0b001 | 0b101),
            _ => function == low,
        },
        _ => true,
    }
}

/// Name of a primary opcode that carries no function sub-space
pub const fn primary_mnemonic(opcode: Opcode) -> Option<&'static str> {
    let name = match opcode {
        Opcode::Lda => "lda",
        Opcode::Ldah => "ldah",
        Opcode::Ldbu => "ldbu",
        Opcode::LdqU => "ldq_u",
        Opcode::Ldwu => "ldwu",
        Opcode::Stw => "stw",
        Opcode::Stb => "stb",
        Opcode::StqU => "stq_u",
        Opcode::HwMfpr => "hw_mfpr",
        Opcode::HwLd => "hw_ld",
        Opcode::HwMtpr => "hw_mtpr",
        Opcode::HwRei => "hw_rei",
        Opcode::HwSt => "hw_st",
        Opcode::Ldf => "ldf",
        Opcode::Ldg => "ldg",
        Opcode::Lds => "lds",
        Opcode::Ldt => "ldt",
        Opcode::Stf => "stf",
        Opcode::Stg => "stg",
        Opcode::Sts => "sts",
        Opcode::Stt => "stt",
        Opcode::Ldl => "ldl",
        Opcode::Ldq => "ldq",
        Opcode::LdlL => "ldl_l",
        Opcode::LdqL => "ldq_l",
        Opcode::Stl => "stl",
        Opcode::Stq => "stq",
        Opcode::StlC => "stl_c",
        Opcode::StqC => "stq_c",
        Opcode::Br => "br",
        Opcode::Fbeq => "fbeq",
        Opcode::Fblt => "fblt",
        Opcode::Fble => "fble",
        Opcode::Bsr => "bsr",
        Opcode::Fbne => "fbne",
        Opcode::Fbge => "fbge",
        Opcode::Fbgt => "fbgt",
        Opcode::Blbc => "blbc",
        Opcode::Beq => "beq",
        Opcode::Blt => "blt",
        Opcode::Ble => "ble",
        Opcode::Blbs => "blbs",
        Opcode::Bne => "bne",
        Opcode::Bge => "bge",
        Opcode::Bgt => "bgt",
        _ => return None,
    };
    Some(name)
}

/// Name of an operation selected by opcode and function code
///
/// For the floating-point operate families the qualifier bits are ignored,
/// except where they distinguish two operations (CVTST).
pub fn function_mnemonic(opcode: Opcode, function: u32) -> Option<&'static str> {
    let name = match opcode {
        Opcode::IntA => match function {
            inta::ADDL => "addl",
            inta::S4ADDL => "s4addl",
            inta::SUBL => "subl",
            inta::S4SUBL => "s4subl",
            inta::CMPBGE => "cmpbge",
            inta::S8ADDL => "s8addl",
            inta::S8SUBL => "s8subl",
            inta::CMPULT => "cmpult",
            inta::ADDQ => "addq",
            inta::S4ADDQ => "s4addq",
            inta::SUBQ => "subq",
            inta::S4SUBQ => "s4subq",
            inta::CMPEQ => "cmpeq",
            inta::S8ADDQ => "s8addq",
            inta::S8SUBQ => "s8subq",
            inta::CMPULE => "cmpule",
            inta::ADDL_V => "addl/v",
            inta::SUBL_V => "subl/v",
            inta::CMPLT => "cmplt",
            inta::ADDQ_V => "addq/v",
            inta::SUBQ_V => "subq/v",
            inta::CMPLE => "cmple",
            _ => return None,
        },
        Opcode::IntL => match function {
            intl::AND => "and",
            intl::BIC => "bic",
            intl::CMOVLBS => "cmovlbs",
            intl::CMOVLBC => "cmovlbc",
            intl::BIS => "bis",
            intl::CMOVEQ => "cmoveq",
            intl::CMOVNE => "cmovne",
            intl::ORNOT => "ornot",
            intl::XOR => "xor",
            intl::CMOVLT => "cmovlt",
            intl::CMOVGE => "cmovge",
            intl::EQV => "eqv",
            intl::AMASK => "amask",
            intl::CMOVLE => "cmovle",
            intl::CMOVGT => "cmovgt",
            intl::IMPLVER => "implver",
            _ => return None,
        },
        Opcode::IntS => match function {
            ints::MSKBL => "mskbl",
            ints::EXTBL => "extbl",
            ints::INSBL => "insbl",
            ints::MSKWL => "mskwl",
            ints::EXTWL => "extwl",
            ints::INSWL => "inswl",
            ints::MSKLL => "mskll",
            ints::EXTLL => "extll",
            ints::INSLL => "insll",
            ints::ZAP => "zap",
            ints::ZAPNOT => "zapnot",
            ints::MSKQL => "mskql",
            ints::SRL => "srl",
            ints::EXTQL => "extql",
            ints::SLL => "sll",
            ints::INSQL => "insql",
            ints::SRA => "sra",
            ints::MSKWH => "mskwh",
            ints::INSWH => "inswh",
            ints::EXTWH => "extwh",
            ints::MSKLH => "msklh",
            ints::INSLH => "inslh",
            ints::EXTLH => "extlh",
            ints::MSKQH => "mskqh",
            ints::INSQH => "insqh",
            ints::EXTQH => "extqh",
            _ => return None,
        },
        Opcode::IntM => match function {
            intm::MULL => "mull",
            intm::MULQ => "mulq",
            intm::UMULH => "umulh",
            intm::MULL_V => "mull/v",
            intm::MULQ_V => "mulq/v",
            _ => return None,
        },
        Opcode::Itfp => match function & 0x3F {
            0x04 => "itofs",
            0x0B => "sqrts",
            0x24 => "itoft",
            0x2B => "sqrtt",
            _ => return None,
        },
        Opcode::FltI => match function & 0x3F {
            0x00 => "adds",
            0x01 => "subs",
            0x02 => "muls",
            0x03 => "divs",
            0x20 => "addt",
            0x21 => "subt",
            0x22 => "mult",
            0x23 => "divt",
            0x24 => "cmptun",
            0x25 => "cmpteq",
            0x26 => "cmptlt",
            0x27 => "cmptle",
            0x2C if function == flti::CVTST => "cvtst",
            0x2C => "cvtts",
            0x2F => "cvttq",
            0x3C => "cvtqs",
            0x3E => "cvtqt",
            _ => return None,
        },
        Opcode::FltL => match function & 0x3F {
            0x10 => "cvtlq",
            0x20 => "cpys",
            0x21 => "cpysn",
            0x22 => "cpyse",
            0x24 => "mt_fpcr",
            0x25 => "mf_fpcr",
            0x2A => "fcmoveq",
            0x2B => "fcmovne",
            0x2C => "fcmovlt",
            0x2D => "fcmovge",
            0x2E => "fcmovle",
            0x2F => "fcmovgt",
            0x30 => "cvtql",
            _ => return None,
        },
        Opcode::Fpti => match function {
            fpti::SEXTB => "sextb",
            fpti::SEXTW => "sextw",
            fpti::CTPOP => "ctpop",
            fpti::CTLZ => "ctlz",
            fpti::CTTZ => "cttz",
            fpti::FTOIT => "ftoit",
            fpti::FTOIS => "ftois",
            _ => return None,
        },
        Opcode::Misc => match function {
            misc::TRAPB => "trapb",
            misc::EXCB => "excb",
            misc::MB => "mb",
            misc::WMB => "wmb",
            misc::FETCH => "fetch",
            misc::FETCH_M => "fetch_m",
            misc::RPCC => "rpcc",
            misc::RC => "rc",
            misc::ECB => "ecb",
            misc::RS => "rs",
            misc::WH64 => "wh64",
            _ => return None,
        },
        Opcode::Jsr => match function {
            jump::JMP => "jmp",
            jump::JSR => "jsr",
            jump::RET => "ret",
            jump::JSR_COROUTINE => "jsr_coroutine",
            _ => return None,
        },
        Opcode::CallPal => match function {
            pal::HALT => "halt",
            pal::BPT => "bpt",
            pal::BUGCHK => "bugchk",
            pal::CALLSYS => "callsys",
            pal::IMB => "imb",
            pal::RDUNIQUE => "rduniq",
            pal::WRUNIQUE => "wruniq",
            pal::GENTRAP => "gentrap",
            _ => return None,
        },
        _ => return None,
    };
    Some(name)
}
