//! Dispatch tables keyed by primary opcode and function code
//!
//! A table is assembled once with a [`TableBuilder`] and is immutable afterwards. Lookup goes
//! primary opcode -> slot -> function sub-table, with the function code masked to the width of
//! the opcode's sub-space, so every lookup is two array indexes.

use std::fmt;

use axp_decoder::{
    function::{function_key_bits, function_mnemonic, fp_qualifiers_defined, primary_mnemonic},
    DecodedInstruction, Opcode,
};

use crate::{
    interp::{self, InterpHandler},
    jit::{self, JitHandler},
};

/// Highest PAL function with a dispatch slot
const PAL_FUNCTION_LIMIT: u32 = 0xFF;

/// Errors found while assembling a table
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TableError {
    #[error("duplicate handler for {0}")]
    Duplicate(Key),
    #[error("opcode {0:?} has no function sub-space")]
    NoFunctionField(Opcode),
    #[error("opcode {0:?} is dispatched by function code")]
    FunctionRequired(Opcode),
    #[error("function {1:#x} is outside the sub-space of {0:?}")]
    FunctionOutOfRange(Opcode, u32),
}

/// A registered (opcode, function) pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Key {
    pub opcode: Opcode,
    /// Masked function code, `None` for primary-only opcodes
    pub function: Option<u32>,
}

impl Key {
    /// Assembler name of the operation behind this key
    pub fn mnemonic(&self) -> Option<&'static str> {
        match self.function {
            Some(function) => function_mnemonic(self.opcode, function),
            None => primary_mnemonic(self.opcode),
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.function {
            Some(function) => write!(f, "{:#04x}.{:#x}", self.opcode.bits(), function)?,
            None => write!(f, "{:#04x}", self.opcode.bits())?,
        }
        if let Some(name) = self.mnemonic() {
            write!(f, " ({name})")?;
        }
        Ok(())
    }
}

/// Result of a table lookup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookup<H> {
    Handler(H),
    Unimplemented,
}

#[derive(Debug, Clone, Copy)]
enum Slot<H> {
    Empty,
    Primary(H),
    /// Index into the sub-table list
    Functions(usize),
}

/// Immutable (opcode, function) -> handler mapping
#[derive(Debug, Clone)]
pub struct DispatchTable<H> {
    slots: [Slot<H>; 64],
    subs: Vec<Vec<Option<H>>>,
}

/// Mask applied to the function code of `opcode`, or `None` without a sub-space
fn function_mask(opcode: Opcode) -> Option<u32> {
    function_key_bits(opcode).map(|bits| (1u32 << bits) - 1)
}

/// Function slot of `function` in the sub-table of `opcode`
fn function_slot(opcode: Opcode, function: u32) -> Option<usize> {
    let mask = function_mask(opcode)?;
    if opcode == Opcode::CallPal && function > PAL_FUNCTION_LIMIT {
        return None;
    }
    if !fp_qualifiers_defined(opcode, function) {
        return None;
    }
    Some((function & mask) as usize)
}

impl<H: Copy> DispatchTable<H> {
    /// Find the handler for a decoded instruction
    #[inline]
    pub fn lookup(&self, insn: &DecodedInstruction) -> Lookup<H> {
        let opcode = insn.opcode();
        match self.slots[opcode.bits() as usize] {
            Slot::Empty => Lookup::Unimplemented,
            Slot::Primary(handler) => Lookup::Handler(handler),
            Slot::Functions(sub) => {
                let entry = insn
                    .function_code()
                    .and_then(|function| function_slot(opcode, function))
                    .and_then(|slot| self.subs[sub][slot]);
                match entry {
                    Some(handler) => Lookup::Handler(handler),
                    None => Lookup::Unimplemented,
                }
            }
        }
    }

    /// Every registered key in opcode order
    pub fn keys(&self) -> Vec<Key> {
        let mut keys = Vec::new();
        for (bits, slot) in self.slots.iter().enumerate() {
            let opcode = Opcode::from_bits(bits as u8);
            match *slot {
                Slot::Empty => {}
                Slot::Primary(_) => keys.push(Key { opcode, function: None }),
                Slot::Functions(sub) => keys.extend(
                    self.subs[sub]
                        .iter()
                        .enumerate()
                        .filter(|(_, entry)| entry.is_some())
                        .map(|(function, _)| Key { opcode, function: Some(function as u32) }),
                ),
            }
        }
        keys
    }

    pub fn len(&self) -> usize {
        self.keys().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Collects handler registrations and validates them in [`TableBuilder::build`]
#[derive(Debug)]
pub struct TableBuilder<H> {
    entries: Vec<(Key, H)>,
    error: Option<TableError>,
}

impl<H: Copy> Default for TableBuilder<H> {
    fn default() -> Self {
        Self { entries: Vec::new(), error: None }
    }
}

impl<H: Copy> TableBuilder<H> {
    pub fn new() -> Self {
        Self::default()
    }

    fn fail(&mut self, error: TableError) {
        self.error.get_or_insert(error);
    }

    /// Register a handler for an opcode without a function sub-space
    pub fn primary(&mut self, opcode: Opcode, handler: H) -> &mut Self {
        if function_mask(opcode).is_some() {
            self.fail(TableError::FunctionRequired(opcode));
        } else {
            self.entries.push((Key { opcode, function: None }, handler));
        }
        self
    }

    /// Register a handler for `(opcode, function)`; the function is masked to the key width
    pub fn function(&mut self, opcode: Opcode, function: u32, handler: H) -> &mut Self {
        match function_slot(opcode, function) {
            None if function_mask(opcode).is_none() => {
                self.fail(TableError::NoFunctionField(opcode))
            }
            None => self.fail(TableError::FunctionOutOfRange(opcode, function)),
            Some(slot) => {
                self.entries.push((Key { opcode, function: Some(slot as u32) }, handler))
            }
        }
        self
    }

    /// Register the same handler for several function codes
    pub fn functions(&mut self, opcode: Opcode, functions: &[u32], handler: H) -> &mut Self {
        for &function in functions {
            self.function(opcode, function, handler);
        }
        self
    }

    /// Validate the registrations and freeze them into a table
    pub fn build(self) -> Result<DispatchTable<H>, TableError> {
        if let Some(error) = self.error {
            return Err(error);
        }

        let mut slots = [Slot::Empty; 64];
        let mut subs: Vec<Vec<Option<H>>> = Vec::new();

        for (key, handler) in self.entries {
            let index = key.opcode.bits() as usize;
            match key.function {
                None => match slots[index] {
                    Slot::Empty => slots[index] = Slot::Primary(handler),
                    _ => return Err(TableError::Duplicate(key)),
                },
                Some(function) => {
                    let sub = match slots[index] {
                        Slot::Functions(sub) => sub,
                        _ => {
                            let size = function_mask(key.opcode).map_or(0, |mask| mask + 1);
                            subs.push(vec![None; size as usize]);
                            slots[index] = Slot::Functions(subs.len() - 1);
                            subs.len() - 1
                        }
                    };
                    let entry = &mut subs[sub][function as usize];
                    if entry.is_some() {
                        return Err(TableError::Duplicate(key));
                    }
                    *entry = Some(handler);
                }
            }
        }

        Ok(DispatchTable { slots, subs })
    }
}

/// Interpreter and JIT tables built side by side
#[derive(Debug, Clone)]
pub struct Tables {
    pub interp: DispatchTable<InterpHandler>,
    pub jit: DispatchTable<JitHandler>,
}

impl Tables {
    pub fn build() -> Result<Self, TableError> {
        let mut interp = TableBuilder::new();
        interp::register(&mut interp);
        let mut jit = TableBuilder::new();
        jit::register(&mut jit);
        Ok(Self { interp: interp.build()?, jit: jit.build()? })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axp_decoder::{decode, function::{flti, inta, pal}};

    fn operate(opcode: u32, function: u32) -> DecodedInstruction {
        decode((opcode << 26) | (function << 5))
    }

    #[test]
    fn test_lookup_and_unimplemented() {
        let mut builder = TableBuilder::<u8>::new();
        builder.function(Opcode::IntA, inta::ADDQ, 1).primary(Opcode::Ldq, 2);
        let table = builder.build().unwrap();

        assert_eq!(table.lookup(&operate(0x10, inta::ADDQ)), Lookup::Handler(1));
        assert_eq!(table.lookup(&operate(0x10, inta::SUBQ)), Lookup::Unimplemented);
        assert_eq!(table.lookup(&decode(0xA400_0000)), Lookup::Handler(2));
        assert_eq!(table.lookup(&decode(0x0400_0000)), Lookup::Unimplemented);
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_duplicate_is_rejected() {
        let mut builder = TableBuilder::<u8>::new();
        builder.function(Opcode::FltI, flti::CVTTS, 1).function(Opcode::FltI, flti::CVTST, 2);
        match builder.build() {
            Err(TableError::Duplicate(key)) => {
                assert_eq!(key, Key { opcode: Opcode::FltI, function: Some(0x2C) })
            }
            other => panic!("Expected duplicate, got {other:?}"),
        }
    }

    #[test]
    fn test_wrong_key_shape() {
        let mut builder = TableBuilder::<u8>::new();
        builder.primary(Opcode::IntA, 1);
        assert_eq!(builder.build().unwrap_err(), TableError::FunctionRequired(Opcode::IntA));

        let mut builder = TableBuilder::<u8>::new();
        builder.function(Opcode::Ldq, 0, 1);
        assert_eq!(builder.build().unwrap_err(), TableError::NoFunctionField(Opcode::Ldq));
    }

    #[test]
    fn test_fp_qualifiers_share_a_slot() {
        let mut builder = TableBuilder::<u8>::new();
        builder.function(Opcode::FltI, flti::ADDT, 7);
        let table = builder.build().unwrap();
        // ADDT/C and ADDT/SUI differ only in qualifier bits
        assert_eq!(table.lookup(&operate(0x16, 0x020)), Lookup::Handler(7));
        assert_eq!(table.lookup(&operate(0x16, 0x7A0)), Lookup::Handler(7));
    }

    #[test]
    fn test_undefined_fp_qualifiers_are_unimplemented() {
        let mut builder = TableBuilder::<u8>::new();
        builder.function(Opcode::FltI, flti::ADDT, 7).function(Opcode::FltI, flti::CMPTEQ, 8);
        let table = builder.build().unwrap();
        // Trap field 0b100 is not an IEEE qualifier; compares only round normally
        assert_eq!(table.lookup(&operate(0x16, 0x4A0)), Lookup::Unimplemented);
        assert_eq!(table.lookup(&operate(0x16, 0x025)), Lookup::Unimplemented);
        assert_eq!(table.lookup(&operate(0x16, 0x5A5)), Lookup::Handler(8));
    }

    #[test]
    fn test_pal_functions_above_limit() {
        let mut builder = TableBuilder::<u8>::new();
        builder.function(Opcode::CallPal, pal::CALLSYS, 1);
        let table = builder.build().unwrap();
        assert_eq!(table.lookup(&decode(pal::CALLSYS)), Lookup::Handler(1));
        assert_eq!(table.lookup(&decode(0x100 | pal::CALLSYS)), Lookup::Unimplemented);
    }

    #[test]
    fn test_tables_build() {
        let tables = Tables::build().unwrap();
        assert!(!tables.interp.is_empty());
        assert_eq!(tables.interp.keys(), tables.jit.keys());
    }
}
