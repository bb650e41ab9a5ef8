use axp_core::{
    fpcr, AccessKind, AccessSize, CpuState, FlatMemory, MemFault, Memory, ProcessorContext,
    ProcessorMode, Trap, TrapKind, TrapVectors, REG_A0, REG_V0,
};

#[test]
fn test_fault_becomes_trap_and_delivers() {
    let mut cpu = CpuState::new(0x1000);
    cpu.mode = ProcessorMode::User;
    let mut mem = FlatMemory::new(0x1000, 0x100);

    let fault = mem.load(cpu.access(AccessKind::Read), 0x2000, AccessSize::Quad).unwrap_err();
    assert_eq!(fault, MemFault::Unmapped(0x2000));

    let trap = Trap::from_fault(fault, cpu.pc);
    let vectors = TrapVectors::new(0x8000);
    cpu.deliver_trap(&trap, vectors.vector(trap.kind));

    assert_eq!(trap.kind, TrapKind::AccessViolation);
    assert_eq!(cpu.pc, 0x8100);
    assert_eq!(cpu.exc_addr, 0x1000);
    assert_eq!(cpu.mode, ProcessorMode::Kernel);
}

#[test]
fn test_system_call_resumes_after() {
    let mut cpu = CpuState::new(0x1000);
    cpu.regs.write_int(REG_A0, 7);
    let trap = Trap::new(TrapKind::SoftwareInterrupt, 0x1000);
    cpu.deliver_trap(&trap, TrapVectors::new(0).vector(trap.kind));
    assert_eq!(cpu.exc_addr, 0x1004);
    assert_eq!(cpu.pc, 0x400);
    assert_eq!(cpu.regs.read_int(REG_A0), 7);
    assert_eq!(cpu.regs.read_int(REG_V0), 0);
}

#[test]
fn test_image_words_are_little_endian() {
    let mut mem = FlatMemory::new(0, 16);
    mem.write_words(4, &[0x4022_0403]).unwrap();
    assert_eq!(mem.read_bytes(4, 4).unwrap(), &[0x03, 0x04, 0x22, 0x40]);
    let ctx = CpuState::default().access(AccessKind::Fetch);
    assert_eq!(mem.load(ctx, 4, AccessSize::Long).unwrap(), 0x4022_0403);
}

#[test]
fn test_context_accessors() {
    let mut cpu = CpuState::new(0x1000);
    cpu.advance_pc();
    assert_eq!(cpu.program_counter(), 0x1004);
    cpu.set_program_counter(u64::MAX - 3);
    cpu.advance_pc();
    assert_eq!(cpu.program_counter(), 0);

    cpu.set_fp_condition_flags(fpcr::DZE);
    let trap = Trap::new(TrapKind::FpDivideByZero, 0x2000);
    cpu.deliver_trap(&trap, TrapVectors::new(0).vector(trap.kind));
    assert_eq!(cpu.fp_condition_flags(), fpcr::DZE | fpcr::SUM);
    assert_eq!(cpu.program_counter(), 0x300);
}
