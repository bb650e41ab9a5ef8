use memmap2::{Mmap, MmapMut};
use tracing::debug;

use crate::{buffer::CodeBuffer, error::EmitError};

/// A finished code buffer mapped read+execute
///
/// The mapping is released on drop; function pointers derived from
/// [`ExecutableCode::as_ptr`] must not outlive it.
#[derive(Debug)]
pub struct ExecutableCode {
    map: Mmap,
}

impl ExecutableCode {
    /// Copy `buf` into a fresh anonymous mapping and make it executable
    pub fn new(buf: &CodeBuffer) -> Result<Self, EmitError> {
        if buf.is_empty() {
            return Err(EmitError::EmptyBuffer);
        }
        let mut map = MmapMut::map_anon(buf.len())?;
        map.copy_from_slice(buf.as_bytes());
        let map = map.make_exec()?;
        debug!("mapped {} bytes of host code at {:p}", buf.len(), map.as_ptr());
        Ok(Self { map })
    }

    pub fn as_ptr(&self) -> *const u8 {
        self.map.as_ptr()
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.map
    }
}
