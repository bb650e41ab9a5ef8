//! x86-64 instruction emitter

use tracing::trace;

use crate::{
    buffer::CodeBuffer,
    encoder::{encode_alu, encode_alu_imm, encode_mem, encode_plus_reg, encode_rr, AluOp},
    error::EmitError,
    label::{Fixup, Label},
    reg::{Cond, Gpr, Width, Xmm},
};

/// Shift operations (`/digit` of the C1/D3 group)
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ShiftOp {
    Shl = 4,
    Shr = 5,
    Sar = 7,
}

/// Scalar SSE arithmetic (second opcode byte)
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SseOp {
    Sqrt = 0x51,
    Add = 0x58,
    Mul = 0x59,
    Sub = 0x5C,
    Div = 0x5E,
}

/// Scalar float precision, selecting the F3 (single) or F2 (double) prefix
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Precision {
    Single,
    Double,
}

impl Precision {
    const fn prefix(self) -> u8 {
        match self {
            Precision::Single => 0xF3,
            Precision::Double => 0xF2,
        }
    }
}

/// Emits x86-64 machine code into a [`CodeBuffer`]
///
/// Jumps to labels are emitted with rel32 placeholders and patched by
/// [`X64Emitter::resolve_fixups`]. A buffer is only handed out through
/// [`X64Emitter::finish`], which refuses to return code with unresolved jumps.
#[derive(Debug, Default)]
pub struct X64Emitter {
    buf: CodeBuffer,
    /// Bound offset per label id
    labels: Vec<Option<usize>>,
    fixups: Vec<Fixup>,
}

impl X64Emitter {
    pub fn new() -> Self {
        Self::from_buffer(CodeBuffer::new())
    }

    /// Continue emitting after the contents of an existing buffer
    pub fn from_buffer(buf: CodeBuffer) -> Self {
        Self { buf, labels: Vec::new(), fixups: Vec::new() }
    }

    /// Current offset
    #[inline]
    pub fn offset(&self) -> usize {
        self.buf.len()
    }

    /// Bytes emitted so far, with placeholders possibly unpatched
    pub fn bytes(&self) -> &[u8] {
        self.buf.as_bytes()
    }

    /// Fixups still waiting for resolution
    pub fn pending_fixups(&self) -> usize {
        self.fixups.len()
    }

    // Labels and fixups

    pub fn new_label(&mut self) -> Label {
        self.labels.push(None);
        Label((self.labels.len() - 1) as u32)
    }

    /// Bind `label` to the current offset
    pub fn bind(&mut self, label: Label) -> Result<(), EmitError> {
        let offset = self.buf.len();
        match self.labels.get_mut(label.0 as usize) {
            None => Err(EmitError::UnknownLabel(label)),
            Some(Some(bound)) => Err(EmitError::LabelRebound(label, *bound)),
            Some(slot) => {
                *slot = Some(offset);
                Ok(())
            }
        }
    }

    pub fn label_offset(&self, label: Label) -> Option<usize> {
        self.labels.get(label.0 as usize).copied().flatten()
    }

    fn emit_rel32(&mut self, label: Label) {
        self.fixups.push(Fixup { offset: self.buf.len(), label });
        self.buf.push_u32(0);
    }

    /// Patch every recorded placeholder with `target - (offset + 4)`
    ///
    /// Fails on the first fixup whose label is unbound; successfully patched
    /// fixups are removed either way.
    pub fn resolve_fixups(&mut self) -> Result<(), EmitError> {
        let fixups = std::mem::take(&mut self.fixups);
        for (i, fixup) in fixups.iter().enumerate() {
            let Some(target) = self.label_offset(fixup.label) else {
                self.fixups = fixups[i..].to_vec();
                return Err(EmitError::UnboundLabel(fixup.label));
            };
            let disp = fixup.displacement(target);
            trace!("patch {} at {:#x} -> {:#x} (rel {})", fixup.label, fixup.offset, target, disp);
            self.buf.patch_u32(fixup.offset, disp as u32);
        }
        Ok(())
    }

    /// Resolve all fixups and return the finished buffer
    pub fn finish(mut self) -> Result<CodeBuffer, EmitError> {
        self.resolve_fixups()?;
        Ok(self.buf)
    }

    // Control flow

    pub fn jmp(&mut self, label: Label) {
        self.buf.push_u8(0xE9);
        self.emit_rel32(label);
    }

    pub fn jcc(&mut self, cond: Cond, label: Label) {
        self.buf.push_u8(0x0F);
        self.buf.push_u8(0x80 + cond.code());
        self.emit_rel32(label);
    }

    /// `call reg`
    pub fn call_reg(&mut self, reg: Gpr) {
        encode_rr(&mut self.buf, None, false, &[0xFF], 2, reg.index(), false);
    }

    pub fn ret(&mut self) {
        self.buf.push_u8(0xC3);
    }

    pub fn push(&mut self, reg: Gpr) {
        encode_plus_reg(&mut self.buf, false, 0x50, reg);
    }

    pub fn pop(&mut self, reg: Gpr) {
        encode_plus_reg(&mut self.buf, false, 0x58, reg);
    }

    // Integer ALU

    /// `op dst, src` for add, sub, and, or, xor, cmp, mov and test
    pub fn alu(&mut self, op: AluOp, width: Width, dst: Gpr, src: Gpr) {
        encode_alu(&mut self.buf, op, dst, src, width);
    }

    /// `op dst, imm32`; the immediate is sign-extended for 64-bit operations
    pub fn alu_imm(&mut self, op: AluOp, width: Width, dst: Gpr, imm: i32) {
        encode_alu_imm(&mut self.buf, op, dst, imm, width);
    }

    pub fn mov(&mut self, width: Width, dst: Gpr, src: Gpr) {
        self.alu(AluOp::Mov, width, dst, src);
    }

    /// Load a 64-bit constant using the shortest exact form
    pub fn mov_imm64(&mut self, dst: Gpr, imm: u64) {
        if imm <= u32::MAX as u64 {
            // mov r32, imm32 zero-extends
            encode_plus_reg(&mut self.buf, false, 0xB8, dst);
            self.buf.push_u32(imm as u32);
        } else if imm as i64 >= i32::MIN as i64 && imm as i64 <= i32::MAX as i64 {
            self.alu_imm(AluOp::Mov, Width::W64, dst, imm as i32);
        } else {
            encode_plus_reg(&mut self.buf, true, 0xB8, dst);
            self.buf.push_u64(imm);
        }
    }

    /// `xor reg32, reg32`
    pub fn zero(&mut self, reg: Gpr) {
        self.alu(AluOp::Xor, Width::W32, reg, reg);
    }

    pub fn not(&mut self, width: Width, reg: Gpr) {
        encode_rr(&mut self.buf, None, width.rex_w(), &[0xF7], 2, reg.index(), false);
    }

    pub fn neg(&mut self, width: Width, reg: Gpr) {
        encode_rr(&mut self.buf, None, width.rex_w(), &[0xF7], 3, reg.index(), false);
    }

    /// `op reg, imm8`
    pub fn shift_imm(&mut self, op: ShiftOp, width: Width, reg: Gpr, imm: u8) {
        encode_rr(&mut self.buf, None, width.rex_w(), &[0xC1], op as u8, reg.index(), false);
        self.buf.push_u8(imm);
    }

    /// `op reg, cl`
    pub fn shift_cl(&mut self, op: ShiftOp, width: Width, reg: Gpr) {
        encode_rr(&mut self.buf, None, width.rex_w(), &[0xD3], op as u8, reg.index(), false);
    }

    /// Signed multiply `dst = dst * src`; OF/CF report truncation
    pub fn imul(&mut self, width: Width, dst: Gpr, src: Gpr) {
        encode_rr(&mut self.buf, None, width.rex_w(), &[0x0F, 0xAF], dst.index(), src.index(), false);
    }

    /// Unsigned widening multiply `rdx:rax = rax * src`
    pub fn mul_wide(&mut self, src: Gpr) {
        encode_rr(&mut self.buf, None, true, &[0xF7], 4, src.index(), false);
    }

    // Extension

    /// Sign-extend the low `from_bits` (8, 16 or 32) of `src` into 64-bit `dst`
    pub fn movsx(&mut self, from_bits: u8, dst: Gpr, src: Gpr) {
        let (dst, src) = (dst.index(), src.index());
        match from_bits {
            8 => encode_rr(&mut self.buf, None, true, &[0x0F, 0xBE], dst, src, false),
            16 => encode_rr(&mut self.buf, None, true, &[0x0F, 0xBF], dst, src, false),
            _ => encode_rr(&mut self.buf, None, true, &[0x63], dst, src, false),
        }
    }

    /// Zero-extend the low `from_bits` (8 or 16) of `src` into `dst`
    pub fn movzx(&mut self, from_bits: u8, dst: Gpr, src: Gpr) {
        if from_bits == 8 {
            let force = src.byte_needs_rex();
            encode_rr(&mut self.buf, None, false, &[0x0F, 0xB6], dst.index(), src.index(), force);
        } else {
            encode_rr(&mut self.buf, None, false, &[0x0F, 0xB7], dst.index(), src.index(), false);
        }
    }

    // Conditionals

    /// `setcc reg8`
    pub fn setcc(&mut self, cond: Cond, reg: Gpr) {
        let force = reg.byte_needs_rex();
        encode_rr(&mut self.buf, None, false, &[0x0F, 0x90 + cond.code()], 0, reg.index(), force);
    }

    /// `cmovcc dst, src` (64-bit)
    pub fn cmovcc(&mut self, cond: Cond, dst: Gpr, src: Gpr) {
        let opcode = [0x0F, 0x40 + cond.code()];
        encode_rr(&mut self.buf, None, true, &opcode, dst.index(), src.index(), false);
    }

    // Memory operands [base + disp32]

    pub fn load64(&mut self, dst: Gpr, base: Gpr, disp: i32) {
        encode_mem(&mut self.buf, None, true, &[0x8B], dst.index(), base, disp, false);
    }

    pub fn store64(&mut self, base: Gpr, disp: i32, src: Gpr) {
        encode_mem(&mut self.buf, None, true, &[0x89], src.index(), base, disp, false);
    }

    /// `mov qword [base + disp], imm32` (sign-extended)
    pub fn store64_imm(&mut self, base: Gpr, disp: i32, imm: i32) {
        encode_mem(&mut self.buf, None, true, &[0xC7], 0, base, disp, false);
        self.buf.push_u32(imm as u32);
    }

    /// `cmp qword [base + disp], imm8` (sign-extended)
    pub fn cmp64_mem_imm8(&mut self, base: Gpr, disp: i32, imm: i8) {
        encode_mem(&mut self.buf, None, true, &[0x83], 7, base, disp, false);
        self.buf.push_u8(imm as u8);
    }

    /// `cmp byte [base + disp], imm8`
    pub fn cmp8_mem_imm8(&mut self, base: Gpr, disp: i32, imm: u8) {
        encode_mem(&mut self.buf, None, false, &[0x80], 7, base, disp, false);
        self.buf.push_u8(imm);
    }

    // SSE

    /// `movq xmm, r64`
    pub fn movq_to_xmm(&mut self, dst: Xmm, src: Gpr) {
        encode_rr(&mut self.buf, Some(0x66), true, &[0x0F, 0x6E], dst.index(), src.index(), false);
    }

    /// `movq r64, xmm`
    pub fn movq_from_xmm(&mut self, dst: Gpr, src: Xmm) {
        encode_rr(&mut self.buf, Some(0x66), true, &[0x0F, 0x7E], src.index(), dst.index(), false);
    }

    /// `movsd dst, src` (register form moves the low 64 bits)
    pub fn movsd(&mut self, dst: Xmm, src: Xmm) {
        encode_rr(&mut self.buf, Some(0xF2), false, &[0x0F, 0x10], dst.index(), src.index(), false);
    }

    /// Scalar `dst = dst op src` (`sqrt` reads only `src`)
    pub fn sse_op(&mut self, op: SseOp, precision: Precision, dst: Xmm, src: Xmm) {
        let opcode = [0x0F, op as u8];
        encode_rr(&mut self.buf, Some(precision.prefix()), false, &opcode, dst.index(), src.index(), false);
    }

    /// `cvtsd2ss dst, src`
    pub fn cvtsd2ss(&mut self, dst: Xmm, src: Xmm) {
        encode_rr(&mut self.buf, Some(0xF2), false, &[0x0F, 0x5A], dst.index(), src.index(), false);
    }

    /// `cvtss2sd dst, src`
    pub fn cvtss2sd(&mut self, dst: Xmm, src: Xmm) {
        encode_rr(&mut self.buf, Some(0xF3), false, &[0x0F, 0x5A], dst.index(), src.index(), false);
    }

    /// `ucomisd a, b`: ZF/PF/CF as unsigned compare, PF set when unordered
    pub fn ucomisd(&mut self, a: Xmm, b: Xmm) {
        encode_rr(&mut self.buf, Some(0x66), false, &[0x0F, 0x2E], a.index(), b.index(), false);
    }

    /// `pmaxub dst, src`: byte-wise unsigned maximum
    pub fn pmaxub(&mut self, dst: Xmm, src: Xmm) {
        encode_rr(&mut self.buf, Some(0x66), false, &[0x0F, 0xDE], dst.index(), src.index(), false);
    }

    /// `pcmpeqb dst, src`: 0xFF in each byte lane that compares equal
    pub fn pcmpeqb(&mut self, dst: Xmm, src: Xmm) {
        encode_rr(&mut self.buf, Some(0x66), false, &[0x0F, 0x74], dst.index(), src.index(), false);
    }

    /// `pmovmskb r32, xmm`: gather the top bit of each byte lane
    pub fn pmovmskb(&mut self, dst: Gpr, src: Xmm) {
        encode_rr(&mut self.buf, Some(0x66), false, &[0x0F, 0xD7], dst.index(), src.index(), false);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forward_and_backward_jumps() {
        let mut em = X64Emitter::new();
        let top = em.new_label();
        let exit = em.new_label();
        em.bind(top).unwrap();
        em.jcc(Cond::E, exit); // 0..6
        em.jmp(top); // 6..11
        em.bind(exit).unwrap();
        em.ret();

        let code = em.finish().unwrap();
        assert_eq!(
            code.as_bytes(),
            &[
                0x0F, 0x84, 0x05, 0x00, 0x00, 0x00, // je +5
                0xE9, 0xF5, 0xFF, 0xFF, 0xFF, // jmp -11
                0xC3,
            ]
        );
    }

    #[test]
    fn test_unbound_label_is_an_error() {
        let mut em = X64Emitter::new();
        let nowhere = em.new_label();
        em.jmp(nowhere);
        match em.resolve_fixups() {
            Err(EmitError::UnboundLabel(label)) => assert_eq!(label, nowhere),
            other => panic!("Expected UnboundLabel, got {other:?}"),
        }
        assert_eq!(em.pending_fixups(), 1);
    }

    #[test]
    fn test_rebinding_is_an_error() {
        let mut em = X64Emitter::new();
        let label = em.new_label();
        em.bind(label).unwrap();
        em.ret();
        assert!(matches!(em.bind(label), Err(EmitError::LabelRebound(_, 0))));
    }

    #[test]
    fn test_mov_imm64_picks_shortest_form() {
        let mut em = X64Emitter::new();
        em.mov_imm64(Gpr::Rcx, 5);
        assert_eq!(em.bytes(), &[0xB9, 0x05, 0x00, 0x00, 0x00]);

        let mut em = X64Emitter::new();
        em.mov_imm64(Gpr::Rax, u64::MAX);
        assert_eq!(em.bytes(), &[0x48, 0xC7, 0xC0, 0xFF, 0xFF, 0xFF, 0xFF]);

        let mut em = X64Emitter::new();
        em.mov_imm64(Gpr::Rax, 0x1122_3344_5566_7788);
        assert_eq!(em.bytes(), &[0x48, 0xB8, 0x88, 0x77, 0x66, 0x55, 0x44, 0x33, 0x22, 0x11]);
    }
}
