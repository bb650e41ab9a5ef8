//! Block translation to host code
//!
//! A block is a run of guest instructions starting at some address and ending at the first
//! control-flow or PAL instruction (or after a length limit). Every instruction is translated by
//! the handler registered for its dispatch key, either into native x86-64 code or into a call of
//! its interpreter handler. Both routes leave the processor state exactly as the interpreter
//! would.
//!
//! Compiled code is entered as `extern "C" fn(cpu, frame) -> next_pc`. A trap inside the block
//! stores its kind in `CpuState::pending_trap` and leaves with the pc of the trapping
//! instruction.

mod compiler;
mod control;
mod float;
mod helpers;
mod integer;
mod memory;

use std::ffi::c_void;

use axp_core::{CpuState, Memory, Trap, TrapKind};
use axp_decoder::{decode, DecodedInstruction};
use tracing::debug;
use x64_emitter::{EmitError, ExecutableCode};

pub use compiler::BlockCompiler;
pub use helpers::JitFrame;

use crate::{
    dispatch::{DispatchTable, Lookup, TableBuilder, Tables},
    interp::InterpHandler,
};

/// Whether translated code can run on this host
pub const JIT_SUPPORTED: bool = cfg!(all(target_arch = "x86_64", unix));

/// Translation failures; the driver keeps interpreting the block
#[derive(Debug, thiserror::Error)]
pub enum CompileError {
    #[error("cannot compile an empty block at {0:#x}")]
    EmptyBlock(u64),
    #[error("no translation for {word:#010x} at {pc:#x}")]
    Unsupported { pc: u64, word: u32 },
    #[error(transparent)]
    Emit(#[from] EmitError),
}

/// Whether translation continues after an instruction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockFlow {
    Continue,
    /// The instruction left the block; no further code is reachable
    End,
}

pub type JitHandler =
    fn(&mut BlockCompiler, &DecodedInstruction) -> Result<BlockFlow, CompileError>;

type BlockFn = unsafe extern "C" fn(*mut CpuState, *mut c_void) -> u64;

/// Register every translation handler
pub fn register(builder: &mut TableBuilder<JitHandler>) {
    integer::register(builder);
    memory::register(builder);
    control::register(builder);
    float::register(builder);
}

/// Translation handler running an instruction through the interpreter
pub(crate) fn fallback(
    bc: &mut BlockCompiler,
    insn: &DecodedInstruction,
) -> Result<BlockFlow, CompileError> {
    bc.interpret(insn)
}

/// Outcome of one execution of a compiled block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockExit {
    /// Address execution continues at; the trapping pc when `trap` is set
    pub next_pc: u64,
    /// Instructions that completed
    pub retired: u64,
    pub trap: Option<Trap>,
    /// An instruction requested that translated code be discarded
    pub flush: bool,
}

/// Host code for one guest block
#[derive(Debug)]
pub struct CompiledBlock {
    start: u64,
    len: usize,
    code: ExecutableCode,
}

impl CompiledBlock {
    pub fn start(&self) -> u64 {
        self.start
    }

    /// Number of guest instructions
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Guest address one past the last instruction
    pub fn end(&self) -> u64 {
        self.start.wrapping_add(4 * self.len as u64)
    }

    /// Whether the guest range of the block contains `address`
    pub fn covers(&self, address: u64) -> bool {
        address >= self.start && address < self.end()
    }

    pub fn code_size(&self) -> usize {
        self.code.len()
    }

    /// Run the block once against `cpu` and `mem`
    ///
    /// `interp` serves instructions the block executes through the interpreter.
    pub fn execute(
        &self,
        cpu: &mut CpuState,
        mem: &mut dyn Memory,
        interp: &DispatchTable<InterpHandler>,
    ) -> BlockExit {
        if !JIT_SUPPORTED {
            let trap = Trap::new(TrapKind::IllegalInstruction, self.start);
            return BlockExit { next_pc: self.start, retired: 0, trap: Some(trap), flush: false };
        }

        let base_cycles = cpu.cycles;
        let cpu_ptr: *mut CpuState = cpu;
        let mut frame = JitFrame {
            cpu: cpu_ptr,
            mem,
            interp,
            start: self.start,
            base_cycles,
            flush_requested: false,
        };
        let frame_ptr = &mut frame as *mut JitFrame<'_> as *mut c_void;

        // SAFETY: the buffer holds a complete function emitted by `compile_block` for this host,
        // and both pointers stay valid for the duration of the call.
        let next_pc = unsafe {
            let entry: BlockFn = std::mem::transmute(self.code.as_ptr());
            entry(cpu_ptr, frame_ptr)
        };
        let flush = frame.flush_requested;

        match cpu.take_pending_trap(next_pc) {
            Some(trap) => BlockExit {
                next_pc: trap.pc,
                retired: trap.pc.wrapping_sub(self.start) / 4,
                trap: Some(trap),
                flush,
            },
            None => BlockExit { next_pc, retired: self.len as u64, trap: None, flush },
        }
    }
}

/// Translate the instructions `words`, starting at guest address `start`
///
/// Translation stops after the first block-ending instruction. A block that runs out of words
/// without one continues at the following address.
pub fn compile_block(
    tables: &Tables,
    start: u64,
    words: &[u32],
) -> Result<CompiledBlock, CompileError> {
    if words.is_empty() {
        return Err(CompileError::EmptyBlock(start));
    }

    let mut bc = BlockCompiler::new(start);
    let mut len = 0;
    let mut ended = false;
    for (i, &word) in words.iter().enumerate() {
        let pc = start.wrapping_add(4 * i as u64);
        bc.set_pc(pc);
        let insn = decode(word);
        let handler = match tables.jit.lookup(&insn) {
            Lookup::Handler(handler) => handler,
            Lookup::Unimplemented => return Err(CompileError::Unsupported { pc, word }),
        };
        len += 1;
        if handler(&mut bc, &insn)? == BlockFlow::End {
            ended = true;
            break;
        }
    }

    let fallthrough = (!ended).then(|| start.wrapping_add(4 * len as u64));
    let buffer = bc.finish(fallthrough)?;
    let code = ExecutableCode::new(&buffer)?;
    debug!("compiled block {:#x}: {} instructions, {} bytes", start, len, code.len());
    Ok(CompiledBlock { start, len, code })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_block_is_rejected() {
        let tables = Tables::build().unwrap();
        let result = compile_block(&tables, 0x1000, &[]);
        assert!(matches!(result, Err(CompileError::EmptyBlock(0x1000))));
    }

    #[test]
    fn test_unimplemented_instruction_is_unsupported() {
        let tables = Tables::build().unwrap();
        // opcode 0x01 is reserved
        let word = 0x0400_0000;
        let err = compile_block(&tables, 0x2000, &[0x47FF_041F, word]).unwrap_err();
        assert!(matches!(err, CompileError::Unsupported { pc: 0x2004, word: 0x0400_0000 }));
    }

    #[test]
    fn test_block_stops_at_branch() {
        let tables = Tables::build().unwrap();
        // BIS r31,r31,r31 ; BR r31,+0 ; BIS r31,r31,r31
        let words = [0x47FF_041F, 0xC3E0_0000, 0x47FF_041F];
        let block = compile_block(&tables, 0x1000, &words).unwrap();
        assert_eq!(block.len(), 2);
        assert_eq!(block.end(), 0x1008);
        assert!(block.covers(0x1004));
        assert!(!block.covers(0x1008));
    }
}
