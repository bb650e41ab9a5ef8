//! Branch, jump and MISC translation
//!
//! Branches end the block with both successors materialised as exits. Barriers compile to
//! nothing. CALL_PAL and the hardware opcodes always go through the interpreter.

use axp_decoder::{
    function::{jump, misc, pal},
    DecodedInstruction, Opcode,
};
use x64_emitter::{AluOp, Cond, Gpr, ShiftOp, Width};

use super::{fallback, BlockCompiler, BlockFlow, CompileError, JitHandler};
use crate::dispatch::TableBuilder;

pub(super) fn register(b: &mut TableBuilder<JitHandler>) {
    b.primary(Opcode::Br, br)
        .primary(Opcode::Bsr, br)
        .primary(Opcode::Beq, int_branch)
        .primary(Opcode::Bne, int_branch)
        .primary(Opcode::Blt, int_branch)
        .primary(Opcode::Ble, int_branch)
        .primary(Opcode::Bgt, int_branch)
        .primary(Opcode::Bge, int_branch)
        .primary(Opcode::Blbc, int_branch)
        .primary(Opcode::Blbs, int_branch)
        .primary(Opcode::Fbeq, fp_branch)
        .primary(Opcode::Fbne, fp_branch)
        .primary(Opcode::Fblt, fp_branch)
        .primary(Opcode::Fble, fp_branch)
        .primary(Opcode::Fbgt, fp_branch)
        .primary(Opcode::Fbge, fp_branch);

    b.functions(
        Opcode::Jsr,
        &[jump::JMP, jump::JSR, jump::RET, jump::JSR_COROUTINE],
        jump_group,
    );

    b.functions(
        Opcode::Misc,
        &[
            misc::TRAPB,
            misc::EXCB,
            misc::MB,
            misc::WMB,
            misc::FETCH,
            misc::FETCH_M,
            misc::ECB,
            misc::WH64,
        ],
        barrier,
    )
    .functions(Opcode::Misc, &[misc::RPCC, misc::RC, misc::RS], fallback);

    b.functions(
        Opcode::CallPal,
        &[
            pal::HALT,
            pal::BPT,
            pal::BUGCHK,
            pal::CALLSYS,
            pal::IMB,
            pal::RDUNIQUE,
            pal::WRUNIQUE,
            pal::GENTRAP,
        ],
        fallback,
    );
    for opcode in [Opcode::HwMfpr, Opcode::HwLd, Opcode::HwMtpr, Opcode::HwRei, Opcode::HwSt] {
        b.primary(opcode, fallback);
    }
}

type Result = std::result::Result<BlockFlow, CompileError>;

/// BR and BSR
fn br(bc: &mut BlockCompiler, insn: &DecodedInstruction) -> Result {
    let (ra, target) = bc.branch(insn)?;
    let link = bc.pc().wrapping_add(4);
    bc.em().mov_imm64(Gpr::Rax, link);
    bc.store_int(ra, Gpr::Rax);
    bc.exit_to(target);
    Ok(BlockFlow::End)
}

/// Exit to `target` when the flags satisfy `cond`, otherwise to the next instruction
fn branch_on(bc: &mut BlockCompiler, cond: Cond, target: u64) -> Result {
    let taken = bc.new_label();
    bc.em().jcc(cond, taken);
    bc.exit_to(bc.pc().wrapping_add(4));
    bc.bind(taken)?;
    bc.exit_to(target);
    Ok(BlockFlow::End)
}

fn int_branch(bc: &mut BlockCompiler, insn: &DecodedInstruction) -> Result {
    let (ra, target) = bc.branch(insn)?;
    bc.load_int(Gpr::Rax, ra);
    let em = bc.em();
    let cond = match insn.opcode() {
        Opcode::Blbc | Opcode::Blbs => {
            em.alu_imm(AluOp::Test, Width::W32, Gpr::Rax, 1);
            if insn.opcode() == Opcode::Blbs {
                Cond::NE
            } else {
                Cond::E
            }
        }
        opcode => {
            em.alu(AluOp::Test, Width::W64, Gpr::Rax, Gpr::Rax);
            match opcode {
                Opcode::Beq => Cond::E,
                Opcode::Bne => Cond::NE,
                Opcode::Blt => Cond::L,
                Opcode::Ble => Cond::LE,
                Opcode::Bgt => Cond::G,
                _ => Cond::GE,
            }
        }
    };
    branch_on(bc, cond, target)
}

/// Floating branches test the register image: `bits << 1 == 0` is zero of either sign, and the
/// strict sign tests compare against the -0.0 image
fn fp_branch(bc: &mut BlockCompiler, insn: &DecodedInstruction) -> Result {
    let (fa, target) = bc.branch(insn)?;
    bc.check_fp_enabled();
    bc.load_fp(Gpr::Rax, fa);
    let em = bc.em();
    let cond = match insn.opcode() {
        Opcode::Fbeq | Opcode::Fbne => {
            em.shift_imm(ShiftOp::Shl, Width::W64, Gpr::Rax, 1);
            if insn.opcode() == Opcode::Fbeq {
                Cond::E
            } else {
                Cond::NE
            }
        }
        Opcode::Fbgt | Opcode::Fble => {
            em.alu(AluOp::Test, Width::W64, Gpr::Rax, Gpr::Rax);
            if insn.opcode() == Opcode::Fbgt {
                Cond::G
            } else {
                Cond::LE
            }
        }
        opcode => {
            em.mov_imm64(Gpr::Rcx, 1 << 63);
            em.alu(AluOp::Cmp, Width::W64, Gpr::Rax, Gpr::Rcx);
            if opcode == Opcode::Fblt {
                Cond::A
            } else {
                Cond::BE
            }
        }
    };
    branch_on(bc, cond, target)
}

/// JMP, JSR, RET and JSR_COROUTINE: read Rb before linking Ra
fn jump_group(bc: &mut BlockCompiler, insn: &DecodedInstruction) -> Result {
    let (ra, rb, _) = bc.memory(insn)?;
    bc.load_int(Gpr::Rax, rb);
    bc.em().alu_imm(AluOp::And, Width::W64, Gpr::Rax, !3);
    let link = bc.pc().wrapping_add(4);
    bc.em().mov_imm64(Gpr::Rcx, link);
    bc.store_int(ra, Gpr::Rcx);
    bc.exit_with_rax();
    Ok(BlockFlow::End)
}

fn barrier(_bc: &mut BlockCompiler, _insn: &DecodedInstruction) -> Result {
    Ok(BlockFlow::Continue)
}
