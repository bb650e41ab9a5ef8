//! Architectural state of an Alpha AXP processor: register files, processor context, condition
//! codes and FPCR bits, the trap model and the memory collaborator interface.

pub mod cpu;
pub mod flags;
pub mod memory;
pub mod registers;
pub mod trap;

pub use cpu::*;
pub use flags::*;
pub use memory::*;
pub use registers::*;
pub use trap::*;
