//! Known-answer encodings for each primitive. Expected bytes were taken from
//! the Intel SDM opcode tables and cross-checked with an external assembler.

use x64_emitter::{AluOp, Cond, Gpr, Precision, ShiftOp, SseOp, Width, X64Emitter, Xmm};

fn emit(f: impl FnOnce(&mut X64Emitter)) -> Vec<u8> {
    let mut em = X64Emitter::new();
    f(&mut em);
    em.finish().unwrap().into_bytes()
}

#[test]
fn test_alu_register_forms() {
    assert_eq!(emit(|em| em.alu(AluOp::Add, Width::W64, Gpr::Rax, Gpr::Rcx)), [0x48, 0x01, 0xC8]);
    assert_eq!(emit(|em| em.alu(AluOp::Add, Width::W64, Gpr::R8, Gpr::Rax)), [0x49, 0x01, 0xC0]);
    assert_eq!(emit(|em| em.alu(AluOp::Cmp, Width::W64, Gpr::Rax, Gpr::Rcx)), [0x48, 0x39, 0xC8]);
    assert_eq!(emit(|em| em.alu(AluOp::And, Width::W32, Gpr::Rdx, Gpr::Rbx)), [0x21, 0xDA]);
    assert_eq!(emit(|em| em.alu(AluOp::Or, Width::W64, Gpr::Rcx, Gpr::R9)), [0x4C, 0x09, 0xC9]);
    assert_eq!(emit(|em| em.alu(AluOp::Test, Width::W64, Gpr::Rax, Gpr::Rax)), [0x48, 0x85, 0xC0]);
    assert_eq!(emit(|em| em.mov(Width::W64, Gpr::Rdi, Gpr::R12)), [0x4C, 0x89, 0xE7]);
    assert_eq!(emit(|em| em.zero(Gpr::Rax)), [0x31, 0xC0]);
}

#[test]
fn test_alu_immediate_forms() {
    assert_eq!(
        emit(|em| em.alu_imm(AluOp::And, Width::W32, Gpr::Rax, 0xFF)),
        [0x81, 0xE0, 0xFF, 0x00, 0x00, 0x00]
    );
    assert_eq!(
        emit(|em| em.alu_imm(AluOp::Add, Width::W64, Gpr::Rsi, -8)),
        [0x48, 0x81, 0xC6, 0xF8, 0xFF, 0xFF, 0xFF]
    );
    assert_eq!(
        emit(|em| em.alu_imm(AluOp::Test, Width::W64, Gpr::Rax, 1)),
        [0x48, 0xF7, 0xC0, 0x01, 0x00, 0x00, 0x00]
    );
}

#[test]
fn test_unary_and_shifts() {
    assert_eq!(emit(|em| em.not(Width::W64, Gpr::Rcx)), [0x48, 0xF7, 0xD1]);
    assert_eq!(emit(|em| em.neg(Width::W32, Gpr::Rax)), [0xF7, 0xD8]);
    assert_eq!(emit(|em| em.shift_imm(ShiftOp::Shl, Width::W64, Gpr::Rax, 3)), [0x48, 0xC1, 0xE0, 0x03]);
    assert_eq!(emit(|em| em.shift_imm(ShiftOp::Sar, Width::W64, Gpr::R9, 5)), [0x49, 0xC1, 0xF9, 0x05]);
    assert_eq!(emit(|em| em.shift_cl(ShiftOp::Shr, Width::W64, Gpr::Rax)), [0x48, 0xD3, 0xE8]);
}

#[test]
fn test_multiply() {
    assert_eq!(emit(|em| em.imul(Width::W64, Gpr::Rax, Gpr::Rcx)), [0x48, 0x0F, 0xAF, 0xC1]);
    assert_eq!(emit(|em| em.imul(Width::W32, Gpr::Rax, Gpr::Rcx)), [0x0F, 0xAF, 0xC1]);
    assert_eq!(emit(|em| em.mul_wide(Gpr::Rcx)), [0x48, 0xF7, 0xE1]);
}

#[test]
fn test_extensions() {
    assert_eq!(emit(|em| em.movsx(32, Gpr::Rax, Gpr::Rax)), [0x48, 0x63, 0xC0]);
    assert_eq!(emit(|em| em.movsx(8, Gpr::Rax, Gpr::Rcx)), [0x48, 0x0F, 0xBE, 0xC1]);
    assert_eq!(emit(|em| em.movsx(16, Gpr::Rax, Gpr::Rcx)), [0x48, 0x0F, 0xBF, 0xC1]);
    assert_eq!(emit(|em| em.movzx(8, Gpr::Rax, Gpr::Rax)), [0x0F, 0xB6, 0xC0]);
    assert_eq!(emit(|em| em.movzx(8, Gpr::Rax, Gpr::Rsi)), [0x40, 0x0F, 0xB6, 0xC6]);
    assert_eq!(emit(|em| em.movzx(16, Gpr::Rax, Gpr::Rcx)), [0x0F, 0xB7, 0xC1]);
}

#[test]
fn test_setcc_and_cmov() {
    assert_eq!(emit(|em| em.setcc(Cond::E, Gpr::Rax)), [0x0F, 0x94, 0xC0]);
    // sil needs an empty REX prefix, otherwise it would encode dh
    assert_eq!(emit(|em| em.setcc(Cond::E, Gpr::Rsi)), [0x40, 0x0F, 0x94, 0xC6]);
    assert_eq!(emit(|em| em.setcc(Cond::B, Gpr::R8)), [0x41, 0x0F, 0x92, 0xC0]);
    assert_eq!(emit(|em| em.cmovcc(Cond::NE, Gpr::Rdx, Gpr::Rcx)), [0x48, 0x0F, 0x45, 0xD1]);
}

#[test]
fn test_memory_operands() {
    assert_eq!(
        emit(|em| em.load64(Gpr::Rax, Gpr::Rbx, 0x10)),
        [0x48, 0x8B, 0x83, 0x10, 0x00, 0x00, 0x00]
    );
    assert_eq!(
        emit(|em| em.store64(Gpr::Rbx, 8, Gpr::Rax)),
        [0x48, 0x89, 0x83, 0x08, 0x00, 0x00, 0x00]
    );
    assert_eq!(
        emit(|em| em.store64_imm(Gpr::Rbx, 0, 3)),
        [0x48, 0xC7, 0x83, 0x00, 0x00, 0x00, 0x00, 0x03, 0x00, 0x00, 0x00]
    );
    assert_eq!(
        emit(|em| em.cmp64_mem_imm8(Gpr::Rbx, 0x20, 0)),
        [0x48, 0x83, 0xBB, 0x20, 0x00, 0x00, 0x00, 0x00]
    );
    assert_eq!(
        emit(|em| em.cmp8_mem_imm8(Gpr::Rbx, 0x20, 0)),
        [0x80, 0xBB, 0x20, 0x00, 0x00, 0x00, 0x00]
    );
}

#[test]
fn test_stack_and_calls() {
    assert_eq!(emit(|em| em.push(Gpr::Rbx)), [0x53]);
    assert_eq!(emit(|em| em.push(Gpr::R12)), [0x41, 0x54]);
    assert_eq!(emit(|em| em.pop(Gpr::R12)), [0x41, 0x5C]);
    assert_eq!(emit(|em| em.call_reg(Gpr::Rax)), [0xFF, 0xD0]);
    assert_eq!(emit(|em| em.call_reg(Gpr::R11)), [0x41, 0xFF, 0xD3]);
    assert_eq!(emit(|em| em.ret()), [0xC3]);
}

#[test]
fn test_scalar_float() {
    assert_eq!(emit(|em| em.movq_to_xmm(Xmm::Xmm0, Gpr::Rax)), [0x66, 0x48, 0x0F, 0x6E, 0xC0]);
    assert_eq!(emit(|em| em.movq_from_xmm(Gpr::Rax, Xmm::Xmm0)), [0x66, 0x48, 0x0F, 0x7E, 0xC0]);
    assert_eq!(
        emit(|em| em.sse_op(SseOp::Add, Precision::Double, Xmm::Xmm0, Xmm::Xmm1)),
        [0xF2, 0x0F, 0x58, 0xC1]
    );
    assert_eq!(
        emit(|em| em.sse_op(SseOp::Div, Precision::Single, Xmm::Xmm0, Xmm::Xmm1)),
        [0xF3, 0x0F, 0x5E, 0xC1]
    );
    assert_eq!(
        emit(|em| em.sse_op(SseOp::Sqrt, Precision::Double, Xmm::Xmm0, Xmm::Xmm9)),
        [0xF2, 0x41, 0x0F, 0x51, 0xC1]
    );
    assert_eq!(emit(|em| em.cvtsd2ss(Xmm::Xmm0, Xmm::Xmm0)), [0xF2, 0x0F, 0x5A, 0xC0]);
    assert_eq!(emit(|em| em.cvtss2sd(Xmm::Xmm0, Xmm::Xmm0)), [0xF3, 0x0F, 0x5A, 0xC0]);
    assert_eq!(emit(|em| em.ucomisd(Xmm::Xmm0, Xmm::Xmm1)), [0x66, 0x0F, 0x2E, 0xC1]);
    assert_eq!(emit(|em| em.movsd(Xmm::Xmm1, Xmm::Xmm0)), [0xF2, 0x0F, 0x10, 0xC8]);
}

#[test]
fn test_packed_byte_compare() {
    assert_eq!(emit(|em| em.pmaxub(Xmm::Xmm1, Xmm::Xmm0)), [0x66, 0x0F, 0xDE, 0xC8]);
    assert_eq!(emit(|em| em.pcmpeqb(Xmm::Xmm1, Xmm::Xmm0)), [0x66, 0x0F, 0x74, 0xC8]);
    assert_eq!(emit(|em| em.pmovmskb(Gpr::Rax, Xmm::Xmm1)), [0x66, 0x0F, 0xD7, 0xC1]);
}

#[test]
fn test_sequence_with_fixups_has_no_stray_bytes() {
    let mut em = X64Emitter::new();
    let done = em.new_label();
    em.alu(AluOp::Add, Width::W32, Gpr::Rax, Gpr::Rcx);
    em.jcc(Cond::O, done);
    em.movsx(32, Gpr::Rax, Gpr::Rax);
    em.bind(done).unwrap();
    em.ret();
    assert_eq!(em.pending_fixups(), 1);

    let code = em.finish().unwrap();
    assert_eq!(
        code.as_bytes(),
        &[
            0x01, 0xC8, // add eax, ecx
            0x0F, 0x80, 0x03, 0x00, 0x00, 0x00, // jo +3
            0x48, 0x63, 0xC0, // movsxd rax, eax
            0xC3, // ret
        ]
    );
}

#[cfg(all(target_arch = "x86_64", unix))]
#[test]
fn test_cmpbge_sequence_executes() {
    use x64_emitter::ExecutableCode;

    // rax = byte-wise (rdi >= rsi) mask
    let mut em = X64Emitter::new();
    em.movq_to_xmm(Xmm::Xmm0, Gpr::Rdi);
    em.movq_to_xmm(Xmm::Xmm1, Gpr::Rsi);
    em.pmaxub(Xmm::Xmm1, Xmm::Xmm0);
    em.pcmpeqb(Xmm::Xmm1, Xmm::Xmm0);
    em.pmovmskb(Gpr::Rax, Xmm::Xmm1);
    em.alu_imm(AluOp::And, Width::W32, Gpr::Rax, 0xFF);
    em.ret();

    let code = ExecutableCode::new(&em.finish().unwrap()).unwrap();
    let func: extern "sysv64" fn(u64, u64) -> u64 = unsafe { std::mem::transmute(code.as_ptr()) };
    assert_eq!(func(0, 0), 0xFF);
    assert_eq!(func(0x0000_0000_0000_0001, 0x0000_0000_0000_0002), 0xFE);
    assert_eq!(func(0xFF00_0000_0000_0000, 0x0100_0000_0000_0000), 0xFF);
    assert_eq!(func(0x0100_0000_0000_0000, 0xFF00_0000_0000_0000), 0x7F);
}
