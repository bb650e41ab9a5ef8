//! x86-64 host code emission
//!
//! Two writers share one [`CodeBuffer`] type:
//! - [`X64Emitter`] appends host instructions and manages labels and rel32 fixups.
//! - [`BitWriter`] packs fixed-layout words field by field, MSB-first.
//!
//! A finished buffer becomes runnable through [`ExecutableCode`].

mod bits;
mod buffer;
pub mod encoder;
mod emitter;
mod error;
mod exec;
mod label;
mod reg;

pub use bits::BitWriter;
pub use buffer::CodeBuffer;
pub use encoder::AluOp;
pub use emitter::{Precision, ShiftOp, SseOp, X64Emitter};
pub use error::EmitError;
pub use exec::ExecutableCode;
pub use label::{Fixup, Label};
pub use reg::{Cond, Gpr, Width, Xmm};
