//! Memory collaborator interface
//!
//! Address translation, protection and MMIO live behind [`Memory`]. The core
//! only issues sized, synchronous loads and stores and converts failures into
//! traps.

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::cpu::ProcessorMode;

/// Size of a memory access in bytes
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccessSize {
    Byte = 1,
    Word = 2,
    Long = 4,
    Quad = 8,
}

impl AccessSize {
    pub const fn bytes(self) -> u64 {
        self as u64
    }

    pub const fn from_bytes(bytes: u64) -> Option<Self> {
        match bytes {
            1 => Some(Self::Byte),
            2 => Some(Self::Word),
            4 => Some(Self::Long),
            8 => Some(Self::Quad),
            _ => None,
        }
    }

    /// Mask of the value bits covered by an access of this size
    pub const fn mask(self) -> u64 {
        match self {
            Self::Quad => u64::MAX,
            _ => (1u64 << (8 * self as u64)) - 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessKind {
    Fetch,
    Read,
    Write,
}

/// Who is accessing memory and why
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccessContext {
    pub mode: ProcessorMode,
    pub kind: AccessKind,
}

impl AccessContext {
    pub const fn new(mode: ProcessorMode, kind: AccessKind) -> Self {
        Self { mode, kind }
    }
}

/// Memory access failures reported by the collaborator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
pub enum MemFault {
    #[error("address {0:#x} is not mapped")]
    Unmapped(u64),
    #[error("access to {0:#x} violates protection")]
    Protection(u64),
    #[error("address {0:#x} is not naturally aligned")]
    Unaligned(u64),
}

/// Address translation and physical access
pub trait Memory {
    /// Load `size` bytes at `address`, zero-extended to 64 bits
    fn load(&mut self, ctx: AccessContext, address: u64, size: AccessSize) -> Result<u64, MemFault>;

    /// Store the low `size` bytes of `value` at `address`
    fn store(
        &mut self,
        ctx: AccessContext,
        address: u64,
        size: AccessSize,
        value: u64,
    ) -> Result<(), MemFault>;
}

/// Contiguous little-endian memory with natural-alignment checks
///
/// Addresses in `[base, base + len)` are mapped. An optional read-only range
/// rejects stores with a protection fault.
#[derive(Debug, Clone)]
pub struct FlatMemory {
    base: u64,
    bytes: Vec<u8>,
    read_only: Option<(u64, u64)>,
}

impl FlatMemory {
    pub fn new(base: u64, size: usize) -> Self {
        Self { base, bytes: vec![0; size], read_only: None }
    }

    pub fn base(&self) -> u64 {
        self.base
    }

    pub fn size(&self) -> usize {
        self.bytes.len()
    }

    /// Reject stores into `[start, end)`
    pub fn protect(&mut self, start: u64, end: u64) {
        self.read_only = Some((start, end));
    }

    /// Copy `data` into memory at `address`, bypassing protection
    pub fn load_image(&mut self, address: u64, data: &[u8]) -> Result<(), MemFault> {
        let offset = self.offset(address, data.len() as u64)?;
        self.bytes[offset..offset + data.len()].copy_from_slice(data);
        Ok(())
    }

    /// Write instruction words consecutively from `address`
    pub fn write_words(&mut self, address: u64, words: &[u32]) -> Result<(), MemFault> {
        let data: Vec<u8> = words.iter().flat_map(|w| w.to_le_bytes()).collect();
        self.load_image(address, &data)
    }

    pub fn read_bytes(&self, address: u64, len: usize) -> Result<&[u8], MemFault> {
        let offset = self.offset(address, len as u64)?;
        Ok(&self.bytes[offset..offset + len])
    }

    fn offset(&self, address: u64, len: u64) -> Result<usize, MemFault> {
        let offset = address.checked_sub(self.base).ok_or(MemFault::Unmapped(address))?;
        match offset.checked_add(len) {
            Some(end) if end <= self.bytes.len() as u64 => Ok(offset as usize),
            _ => Err(MemFault::Unmapped(address)),
        }
    }

    fn check_aligned(address: u64, size: AccessSize) -> Result<(), MemFault> {
        if address % size.bytes() != 0 {
            return Err(MemFault::Unaligned(address));
        }
        Ok(())
    }
}

impl Memory for FlatMemory {
    fn load(&mut self, ctx: AccessContext, address: u64, size: AccessSize) -> Result<u64, MemFault> {
        Self::check_aligned(address, size)?;
        let offset = self.offset(address, size.bytes())?;
        let mut raw = [0u8; 8];
        raw[..size.bytes() as usize].copy_from_slice(&self.bytes[offset..offset + size.bytes() as usize]);
        let value = u64::from_le_bytes(raw);
        trace!("{:?} load {:#x} [{}] = {:#x}", ctx.kind, address, size.bytes(), value);
        Ok(value)
    }

    fn store(
        &mut self,
        ctx: AccessContext,
        address: u64,
        size: AccessSize,
        value: u64,
    ) -> Result<(), MemFault> {
        Self::check_aligned(address, size)?;
        if let Some((start, end)) = self.read_only {
            if address < end && address + size.bytes() > start {
                return Err(MemFault::Protection(address));
            }
        }
        let offset = self.offset(address, size.bytes())?;
        let n = size.bytes() as usize;
        self.bytes[offset..offset + n].copy_from_slice(&value.to_le_bytes()[..n]);
        trace!("{:?} store {:#x} [{}] = {:#x}", ctx.kind, address, n, value);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const READ: AccessContext = AccessContext::new(ProcessorMode::Kernel, AccessKind::Read);
    const WRITE: AccessContext = AccessContext::new(ProcessorMode::Kernel, AccessKind::Write);

    #[test]
    fn test_store_load_little_endian() {
        let mut mem = FlatMemory::new(0x1000, 64);
        mem.store(WRITE, 0x1008, AccessSize::Quad, 0x1122_3344_5566_7788).unwrap();
        assert_eq!(mem.load(READ, 0x1008, AccessSize::Byte).unwrap(), 0x88);
        assert_eq!(mem.load(READ, 0x100C, AccessSize::Long).unwrap(), 0x1122_3344);
        assert_eq!(mem.load(READ, 0x100A, AccessSize::Word).unwrap(), 0x5566);
    }

    #[test]
    fn test_faults() {
        let mut mem = FlatMemory::new(0x1000, 64);
        assert_eq!(mem.load(READ, 0x0FF8, AccessSize::Quad), Err(MemFault::Unmapped(0x0FF8)));
        assert_eq!(mem.load(READ, 0x1040, AccessSize::Quad), Err(MemFault::Unmapped(0x1040)));
        assert_eq!(mem.load(READ, 0x1002, AccessSize::Long), Err(MemFault::Unaligned(0x1002)));

        mem.protect(0x1000, 0x1010);
        assert_eq!(
            mem.store(WRITE, 0x1008, AccessSize::Quad, 1),
            Err(MemFault::Protection(0x1008))
        );
        assert!(mem.store(WRITE, 0x1010, AccessSize::Quad, 1).is_ok());
    }

    #[test]
    fn test_size_masks() {
        assert_eq!(AccessSize::Byte.mask(), 0xFF);
        assert_eq!(AccessSize::Long.mask(), 0xFFFF_FFFF);
        assert_eq!(AccessSize::Quad.mask(), u64::MAX);
    }
}
