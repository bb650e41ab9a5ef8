use std::{collections::BTreeSet, sync::OnceLock};

use axp_core::{CpuState, FlatMemory, Trap};
use axp_decoder::{
    decode,
    function::{fltl, flti, fp_qualifiers_defined, inta, intm, ints},
    Opcode,
};
use axpemu::{
    asm::{addq, addq_lit, br, fp_operate, halt, lda, ldq, operate, operate_literal, stq},
    compile_block, interp, ExecContext, Key, Tables,
};
use proptest::prelude::*;

fn tables() -> &'static Tables {
    static TABLES: OnceLock<Tables> = OnceLock::new();
    TABLES.get_or_init(|| Tables::build().unwrap())
}

#[test]
fn test_tables_have_the_same_keys() {
    let interp: BTreeSet<Key> = tables().interp.keys().into_iter().collect();
    let jit: BTreeSet<Key> = tables().jit.keys().into_iter().collect();
    assert_eq!(interp, jit);
    for key in &interp {
        assert!(key.mnemonic().is_some(), "{key} has no mnemonic");
    }
}

#[test]
fn test_straight_line_block_resolves_all_fixups() {
    let words = [
        addq_lit(1, 4, 1).unwrap(),
        addq(1, 2, 3).unwrap(),
        addq(3, 3, 4).unwrap(),
        br(31, -4).unwrap(),
    ];
    let block = compile_block(tables(), 0x4000, &words).unwrap();
    assert_eq!(block.len(), 4);
    assert_eq!(block.end(), 0x4010);
    assert!(block.code_size() > 0);
}

#[test]
fn test_every_word_kind_compiles() {
    let words = [
        lda(1, 31, -8).unwrap(),
        operate_literal(Opcode::IntS, 1, 3, ints::ZAPNOT, 2).unwrap(),
        fp_operate(Opcode::FltI, 1, 2, flti::CMPTLT, 3).unwrap(),
        fp_operate(Opcode::FltL, 1, 2, fltl::FCMOVEQ, 3).unwrap(),
        halt(),
    ];
    let block = compile_block(tables(), 0x1000, &words).unwrap();
    assert_eq!(block.len(), 5);
}

const INT_OPCODES: [Opcode; 5] =
    [Opcode::IntA, Opcode::IntL, Opcode::IntS, Opcode::IntM, Opcode::Fpti];
const FP_OPCODES: [Opcode; 3] = [Opcode::Itfp, Opcode::FltI, Opcode::FltL];

/// Keys with a handler in both tables
fn shared_keys() -> BTreeSet<Key> {
    let jit: BTreeSet<Key> = tables().jit.keys().into_iter().collect();
    tables().interp.keys().into_iter().filter(|key| jit.contains(key)).collect()
}

/// `(opcode, function)` for every integer operate key
fn int_ops() -> Vec<(Opcode, u32)> {
    shared_keys()
        .into_iter()
        .filter(|key| INT_OPCODES.contains(&key.opcode))
        .filter_map(|key| Some((key.opcode, key.function?)))
        .collect()
}

/// Every FP operate key, expanded over each trap and rounding qualifier it defines
fn fp_ops() -> Vec<(Opcode, u32)> {
    shared_keys()
        .into_iter()
        .filter(|key| FP_OPCODES.contains(&key.opcode))
        .filter_map(|key| Some((key.opcode, key.function?)))
        .flat_map(|(opcode, low)| {
            (0..32u32)
                .map(move |qualifier| (opcode, low | qualifier << 6))
                .filter(|&(opcode, function)| fp_qualifiers_defined(opcode, function))
        })
        .collect()
}

#[test]
fn test_every_operate_key_is_sampled() {
    let sampled: BTreeSet<Key> = int_ops()
        .into_iter()
        .map(|(opcode, function)| Key { opcode, function: Some(function & 0x7F) })
        .chain(
            fp_ops()
                .into_iter()
                .map(|(opcode, function)| Key { opcode, function: Some(function & 0x3F) }),
        )
        .collect();
    let operate: BTreeSet<Key> = shared_keys()
        .into_iter()
        .filter(|key| INT_OPCODES.contains(&key.opcode) || FP_OPCODES.contains(&key.opcode))
        .collect();
    assert!(!operate.is_empty());
    assert_eq!(sampled, operate);
}

/// Registers 0 to 7, with 8 standing for r31
fn reg(index: u8) -> u8 {
    if index == 8 {
        31
    } else {
        index
    }
}

fn int_word() -> impl Strategy<Value = u32> {
    (
        prop::sample::select(int_ops()),
        0u8..9,
        0u8..9,
        prop::option::of(any::<u8>()),
        0u8..9,
    )
        .prop_map(|((opcode, function), ra, rb, literal, rc)| match literal {
            Some(lit) => operate_literal(opcode, reg(ra), lit, function, reg(rc)).unwrap(),
            None => operate(opcode, reg(ra), reg(rb), function, reg(rc)).unwrap(),
        })
}

fn fp_word() -> impl Strategy<Value = u32> {
    (prop::sample::select(fp_ops()), 0u8..9, 0u8..9, 0u8..9).prop_map(
        |((opcode, function), fa, fb, fc)| {
            fp_operate(opcode, reg(fa), reg(fb), function, reg(fc)).unwrap()
        },
    )
}

/// Small integers, powers of two and extremes, so that overflow and sign cases come up
fn int_value() -> impl Strategy<Value = u64> {
    prop_oneof![
        any::<u64>(),
        (0u64..16),
        (0u32..64).prop_map(|s| 1u64 << s),
        Just(i64::MAX as u64),
        Just(i64::MIN as u64),
        Just(u64::MAX),
    ]
}

fn fp_value() -> impl Strategy<Value = u64> {
    prop_oneof![
        (-1.0e6f64..1.0e6).prop_map(f64::to_bits),
        Just(0.0f64.to_bits()),
        Just((-0.0f64).to_bits()),
        Just(1.5f64.to_bits()),
    ]
}

/// Integer images that stay finite when moved into an FP register as either format
fn int_image() -> impl Strategy<Value = u64> {
    prop_oneof![fp_value(), 0u64..16, 0u64..(1 << 30)]
}

const START: u64 = 0x1000;

fn initial_state(ints: &[u64], fps: &[u64]) -> CpuState {
    let mut cpu = CpuState::new(START);
    for (i, (&int, &fp)) in ints.iter().zip(fps).enumerate() {
        cpu.regs.write_int(i as u8, int);
        cpu.regs.write_fp(i as u8, fp);
    }
    cpu
}

/// Run `words` through the interpreter, stopping at the first trap
fn interpret(cpu: &mut CpuState, mem: &mut FlatMemory, words: &[u32]) -> Option<Trap> {
    for &word in words {
        let pc = cpu.pc;
        let mut ctx = ExecContext::new(cpu, mem);
        match interp::execute(&tables().interp, &mut ctx, &decode(word)) {
            Ok(flow) => cpu.pc = flow.next_pc(pc),
            Err(trap) => return Some(trap),
        }
    }
    None
}

/// FP register images with every NaN folded into one, since host NaN payloads depend on operand
/// order
fn fp_images(cpu: &CpuState) -> Vec<u64> {
    cpu.regs
        .fp_regs()
        .iter()
        .map(|&bits| if f64::from_bits(bits).is_nan() { f64::NAN.to_bits() } else { bits })
        .collect()
}

fn check_parity(words: &[u32], ints: &[u64], fps: &[u64]) -> Result<(), TestCaseError> {
    let mut mem = FlatMemory::new(0, 0x2000);

    let mut expected = initial_state(ints, fps);
    let expected_trap = interpret(&mut expected, &mut mem.clone(), words);

    let block = compile_block(tables(), START, words).unwrap();
    let mut actual = initial_state(ints, fps);
    let exit = block.execute(&mut actual, &mut mem, &tables().interp);

    prop_assert_eq!(exit.trap, expected_trap);
    prop_assert_eq!(exit.next_pc, expected.pc);
    prop_assert_eq!(actual.regs.int_regs(), expected.regs.int_regs());
    prop_assert_eq!(fp_images(&actual), fp_images(&expected));
    prop_assert_eq!(exit.retired, (expected.pc - START) / 4);
    Ok(())
}

#[cfg(all(target_arch = "x86_64", unix))]
proptest! {
    #![proptest_config(ProptestConfig::with_cases(512))]

    #[test]
    fn prop_integer_blocks_match_interpreter(
        words in prop::collection::vec(int_word(), 1..16),
        ints in prop::collection::vec(int_value(), 8),
        fps in prop::collection::vec(fp_value(), 8),
    ) {
        check_parity(&words, &ints, &fps)?;
    }

    #[test]
    fn prop_float_blocks_match_interpreter(
        words in prop::collection::vec(fp_word(), 1..12),
        ints in prop::collection::vec(int_image(), 8),
        fps in prop::collection::vec(fp_value(), 8),
    ) {
        check_parity(&words, &ints, &fps)?;
    }
}

#[cfg(all(target_arch = "x86_64", unix))]
#[test]
fn test_overflow_checks_match_interpreter() {
    let ops = [
        (Opcode::IntA, inta::ADDL_V),
        (Opcode::IntA, inta::SUBL_V),
        (Opcode::IntA, inta::ADDQ_V),
        (Opcode::IntA, inta::SUBQ_V),
        (Opcode::IntM, intm::MULL_V),
        (Opcode::IntM, intm::MULQ_V),
    ];
    let operands = [
        (0x8000_0000, 1),
        (0xFFFF_FFFF_8000_0000, 1),
        (0, 0x8000_0000),
        (0x7FFF_FFFF, 1),
        (5, 7),
        (i64::MAX as u64, 1),
        (i64::MIN as u64, 1),
        (i64::MIN as u64, u64::MAX),
        (u64::MAX, u64::MAX),
    ];
    for (opcode, function) in ops {
        let words = [operate(opcode, 1, 2, function, 3).unwrap(), halt()];
        for (a, b) in operands {
            let mut ints = [0; 8];
            ints[1] = a;
            ints[2] = b;
            check_parity(&words, &ints, &[0; 8]).unwrap();
        }
    }
}

#[cfg(all(target_arch = "x86_64", unix))]
#[test]
fn test_memory_blocks_match_interpreter() {
    let words = [
        stq(2, 1, 8).unwrap(),
        ldq(3, 1, 8).unwrap(),
        operate_literal(Opcode::IntS, 3, 2, ints::EXTBL, 4).unwrap(),
        ldq(5, 1, 3).unwrap(),
        halt(),
    ];
    let mut ints = [0; 8];
    ints[1] = 0x800;
    ints[2] = 0x0123_4567_89AB_CDEF;
    check_parity(&words, &ints, &[0; 8]).unwrap();
}
