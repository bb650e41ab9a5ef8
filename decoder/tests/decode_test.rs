use axp_decoder::{
    decode, function::inta, utils::sign_extend, DecodedInstruction, InstructionDecoder,
    InstructionFormat, OperandB,
};
use proptest::prelude::*;

#[test]
fn test_decode_bytes_little_endian() {
    let decoder = InstructionDecoder::new();

    // addq r31, r31, r1 followed by call_pal halt
    let addq: u32 = (0x10 << 26) |  // opcode = INTA
        (31 << 21) |                // ra = r31
        (31 << 16) |                // rb = r31
        (inta::ADDQ << 5) |         // function = ADDQ
        1; // rc = r1
    let mut bytes = addq.to_le_bytes().to_vec();
    bytes.extend_from_slice(&0u32.to_le_bytes());

    let result = decoder.decode_bytes(&bytes, 0x1_0000).unwrap();
    assert_eq!(result.len(), 2);
    assert_eq!(result[0].0, 0x1_0000);
    assert_eq!(result[1].0, 0x1_0004);
    assert_eq!(result[0].1.mnemonic(), Some("addq"));
    assert_eq!(result[1].1.mnemonic(), Some("halt"));
}

#[test]
fn test_decode_bytes_rejects_partial_word() {
    let decoder = InstructionDecoder::new();
    assert!(decoder.decode_bytes(&[0, 0, 0, 0, 0x10], 0).is_err());
}

#[test]
fn test_zero_register_operate_scenario() {
    // Operate word with opcode 0x10 and Ra = Rb = 31
    let word: u32 = (0x10 << 26) | (31 << 21) | (31 << 16) | (inta::ADDL << 5) | 7;
    match decode(word) {
        DecodedInstruction::Operate { ra, rb, rc, .. } => {
            assert_eq!(ra, 31);
            assert_eq!(rb, OperandB::Register(31));
            assert_eq!(rc, 7);
        }
        other => panic!("Expected Operate instruction, got {other:?}"),
    }
}

proptest! {
    #[test]
    fn decode_is_total_and_idempotent(word in any::<u32>()) {
        let first = decode(word);
        let second = decode(word);
        prop_assert_eq!(first, second);
        prop_assert_eq!(first.raw(), word);
        prop_assert_eq!(first.opcode().bits() as u32, word >> 26);
    }

    #[test]
    fn variant_matches_opcode_format(word in any::<u32>()) {
        let insn = decode(word);
        let variant_format = match insn {
            DecodedInstruction::Operate { .. } => InstructionFormat::Operate,
            DecodedInstruction::Memory { .. } => InstructionFormat::Memory,
            DecodedInstruction::Branch { .. } => InstructionFormat::Branch,
            DecodedInstruction::Pal { .. } => InstructionFormat::Pal,
        };
        prop_assert_eq!(variant_format, insn.format());
    }

    #[test]
    fn branch_target_law(pc in any::<u64>(), disp in 0u32..(1 << 21), ra in 0u32..32) {
        // beq ra, disp
        let word = (0x39 << 26) | (ra << 21) | disp;
        let expected = pc
            .wrapping_add(4)
            .wrapping_add((4 * sign_extend(disp, 21) as i64) as u64);
        prop_assert_eq!(decode(word).branch_target(pc), Some(expected));
    }

    #[test]
    fn display_never_panics(word in any::<u32>(), pc in any::<u64>()) {
        let insn = decode(word);
        prop_assert!(!insn.to_string().is_empty());
        prop_assert!(!insn.disassemble(pc).is_empty());
    }
}
