use std::sync::OnceLock;

use axp_core::{AccessKind, AccessSize, CpuState, FlatMemory, Memory, Trap, TrapKind};
use axp_decoder::{
    decode,
    function::{flti, inta, pal},
    DecodedInstruction, Opcode,
};
use axpemu::{
    asm::{self, addq_lit, bis, br, call_pal, fp_operate, lda, ldq, operate, stq},
    interp, ExecContext, Flow, Lookup, Tables,
};
use proptest::prelude::*;

fn tables() -> &'static Tables {
    static TABLES: OnceLock<Tables> = OnceLock::new();
    TABLES.get_or_init(|| Tables::build().unwrap())
}

fn exec(cpu: &mut CpuState, mem: &mut FlatMemory, word: u32) -> Result<Flow, Trap> {
    let insn = decode(word);
    let mut ctx = ExecContext::new(cpu, mem);
    interp::execute(&tables().interp, &mut ctx, &insn)
}

fn setup() -> (CpuState, FlatMemory) {
    (CpuState::new(0x1000), FlatMemory::new(0, 0x4000))
}

#[test]
fn test_operate_from_zero_registers_writes_zero() {
    let (mut cpu, mut mem) = setup();
    cpu.regs.write_int(5, 0xDEAD);
    let word = operate(Opcode::IntA, 31, 31, inta::ADDQ, 5).unwrap();

    let insn = decode(word);
    assert!(matches!(insn, DecodedInstruction::Operate { opcode: Opcode::IntA, .. }));
    assert!(matches!(tables().interp.lookup(&insn), Lookup::Handler(_)));

    assert_eq!(exec(&mut cpu, &mut mem, word), Ok(Flow::Next));
    assert_eq!(cpu.regs.read_int(5), 0);
}

#[test]
fn test_unimplemented_word_is_illegal() {
    let (mut cpu, mut mem) = setup();
    let trap = exec(&mut cpu, &mut mem, 0x0400_0000).unwrap_err();
    assert_eq!(trap, Trap::new(TrapKind::IllegalInstruction, 0x1000));
}

#[test]
fn test_undefined_fp_qualifier_is_illegal() {
    let (mut cpu, mut mem) = setup();
    cpu.regs.write_f64(1, 1.0);
    cpu.regs.write_f64(2, 2.0);
    // ADDT with trap qualifier 0b100, which has no architectural meaning
    let word = fp_operate(Opcode::FltI, 1, 2, flti::ADDT | 0x400, 3).unwrap();
    let trap = exec(&mut cpu, &mut mem, word).unwrap_err();
    assert_eq!(trap, Trap::new(TrapKind::IllegalInstruction, 0x1000));
    assert_eq!(cpu.regs.read_fp(3), 0);

    let word = fp_operate(Opcode::FltI, 1, 2, flti::ADDT | 0x500, 3).unwrap();
    assert_eq!(exec(&mut cpu, &mut mem, word), Ok(Flow::Next));
    assert_eq!(cpu.regs.read_f64(3), 3.0);
}

#[test]
fn test_store_then_load() {
    let (mut cpu, mut mem) = setup();
    cpu.regs.write_int(1, 0x2000);
    cpu.regs.write_int(2, 0x0123_4567_89AB_CDEF);
    exec(&mut cpu, &mut mem, stq(2, 1, 8).unwrap()).unwrap();
    exec(&mut cpu, &mut mem, ldq(3, 1, 8).unwrap()).unwrap();
    assert_eq!(cpu.regs.read_int(3), 0x0123_4567_89AB_CDEF);

    let ctx = cpu.access(AccessKind::Read);
    assert_eq!(mem.load(ctx, 0x2008, AccessSize::Byte).unwrap(), 0xEF);
}

#[test]
fn test_faulting_load_leaves_registers() {
    let (mut cpu, mut mem) = setup();
    cpu.regs.write_int(3, 77);
    let trap = exec(&mut cpu, &mut mem, ldq(3, 31, 1).unwrap()).unwrap_err();
    assert_eq!(trap, Trap::with_address(TrapKind::UnalignedAccess, 0x1000, 1));
    assert_eq!(cpu.regs.read_int(3), 77);

    let trap = exec(&mut cpu, &mut mem, ldq(3, 31, 0x7FF8).unwrap()).unwrap_err();
    assert_eq!(trap.kind, TrapKind::AccessViolation);
    assert_eq!(cpu.regs.read_int(3), 77);
}

#[test]
fn test_pal_calls() {
    let (mut cpu, mut mem) = setup();
    let trap = exec(&mut cpu, &mut mem, call_pal(pal::CALLSYS).unwrap()).unwrap_err();
    assert_eq!(trap.kind, TrapKind::SoftwareInterrupt);
    assert_eq!(trap.exception_address(), 0x1004);

    assert_eq!(exec(&mut cpu, &mut mem, call_pal(pal::IMB).unwrap()), Ok(Flow::FlushCode));

    cpu.regs.write_int(16, 0x55);
    exec(&mut cpu, &mut mem, call_pal(pal::WRUNIQUE).unwrap()).unwrap();
    exec(&mut cpu, &mut mem, call_pal(pal::RDUNIQUE).unwrap()).unwrap();
    assert_eq!(cpu.regs.read_int(0), 0x55);

    exec(&mut cpu, &mut mem, asm::halt()).unwrap();
    assert!(cpu.halted);
}

#[test]
fn test_fp_disabled_and_divide_by_zero() {
    let (mut cpu, mut mem) = setup();
    cpu.regs.write_f64(1, 3.0);
    cpu.regs.write_f64(2, -0.0);
    let divt = fp_operate(Opcode::FltI, 1, 2, flti::DIVT, 3).unwrap();
    let trap = exec(&mut cpu, &mut mem, divt).unwrap_err();
    assert_eq!(trap.kind, TrapKind::FpDivideByZero);
    assert_eq!(cpu.regs.read_fp(3), 0);

    let zero_by_zero = fp_operate(Opcode::FltI, 31, 2, flti::DIVT, 3).unwrap();
    let trap = exec(&mut cpu, &mut mem, zero_by_zero).unwrap_err();
    assert_eq!(trap.kind, TrapKind::FpDivideByZero);
    assert_eq!(cpu.regs.read_fp(3), 0);

    cpu.fp_enabled = false;
    let addt = fp_operate(Opcode::FltI, 1, 1, flti::ADDT, 3).unwrap();
    assert_eq!(exec(&mut cpu, &mut mem, addt).unwrap_err().kind, TrapKind::FpDisabled);

    cpu.fp_enabled = true;
    exec(&mut cpu, &mut mem, addt).unwrap();
    assert_eq!(cpu.regs.read_f64(3), 6.0);
}

proptest! {
    #[test]
    fn prop_register_31_reads_zero(value in any::<u64>(), lit in any::<u8>()) {
        let (mut cpu, mut mem) = setup();
        cpu.regs.write_int(31, value);
        cpu.regs.write_fp(31, value);
        prop_assert_eq!(cpu.regs.read_int(31), 0);
        prop_assert_eq!(cpu.regs.read_fp(31), 0);

        cpu.regs.write_int(1, value);
        exec(&mut cpu, &mut mem, addq_lit(1, lit, 31).unwrap()).unwrap();
        exec(&mut cpu, &mut mem, bis(1, 1, 31).unwrap()).unwrap();
        prop_assert_eq!(cpu.regs.read_int(31), 0);
    }

    #[test]
    fn prop_add_sub_overflow(a in any::<u64>(), b in any::<u64>()) {
        let (mut cpu, mut mem) = setup();
        cpu.regs.write_int(1, a);
        cpu.regs.write_int(2, b);
        cpu.regs.write_int(3, 0x3333);

        let addq_v = operate(Opcode::IntA, 1, 2, inta::ADDQ_V, 3).unwrap();
        match (a as i64).checked_add(b as i64) {
            Some(sum) => {
                prop_assert_eq!(exec(&mut cpu, &mut mem, addq_v), Ok(Flow::Next));
                prop_assert_eq!(cpu.regs.read_int(3), sum as u64);
            }
            None => {
                let trap = exec(&mut cpu, &mut mem, addq_v).unwrap_err();
                prop_assert_eq!(trap.kind, TrapKind::IntegerOverflow);
                prop_assert_eq!(cpu.regs.read_int(3), 0x3333);
            }
        }

        cpu.regs.write_int(3, 0x3333);
        let subl_v = operate(Opcode::IntA, 1, 2, inta::SUBL_V, 3).unwrap();
        match (a as i32).checked_sub(b as i32) {
            Some(diff) => {
                prop_assert_eq!(exec(&mut cpu, &mut mem, subl_v), Ok(Flow::Next));
                prop_assert_eq!(cpu.regs.read_int(3), diff as i64 as u64);
            }
            None => {
                prop_assert!(exec(&mut cpu, &mut mem, subl_v).is_err());
                prop_assert_eq!(cpu.regs.read_int(3), 0x3333);
            }
        }
    }

    #[test]
    fn prop_branch_target(pc in (0u64..0x1000_0000).prop_map(|p| p * 4), disp in -(1i32 << 20)..(1 << 20)) {
        let mut cpu = CpuState::new(pc);
        let mut mem = FlatMemory::new(0, 0);
        let target = pc.wrapping_add(4).wrapping_add((4 * disp as i64) as u64);
        prop_assert_eq!(exec(&mut cpu, &mut mem, br(26, disp).unwrap()), Ok(Flow::Jump(target)));
        prop_assert_eq!(cpu.regs.read_int(26), pc + 4);
    }

    #[test]
    fn prop_lda_adds_displacement(base in any::<u64>(), disp in any::<i16>()) {
        let (mut cpu, mut mem) = setup();
        cpu.regs.write_int(2, base);
        exec(&mut cpu, &mut mem, lda(1, 2, disp).unwrap()).unwrap();
        prop_assert_eq!(cpu.regs.read_int(1), base.wrapping_add(disp as i64 as u64));
    }
}
