//! Alpha AXP emulator
//!
//! Guest code starts out interpreted one instruction at a time. The [`driver`] counts visits to
//! each block entry and hands hot blocks to the [`jit`], which translates them to x86-64 and runs
//! them natively from then on. Interpreter and translator both find their handler for a word in
//! a [`dispatch`] table keyed by opcode and function code.

pub mod asm;
pub mod dispatch;
pub mod driver;
pub mod interp;
pub mod jit;
pub mod options;

pub use dispatch::{DispatchTable, Key, Lookup, TableBuilder, TableError, Tables};
pub use driver::{BlockState, Driver, DriverStats, RunExit};
pub use interp::{ExecContext, Flow, InterpHandler};
pub use jit::{compile_block, BlockExit, CompileError, CompiledBlock, JitHandler, JIT_SUPPORTED};
pub use options::{EmuOptions, OptionsError};
