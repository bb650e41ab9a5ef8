use std::fmt;

/// Opaque handle to a position in a code buffer
///
/// Created unbound by [`crate::X64Emitter::new_label`] and bound once with
/// [`crate::X64Emitter::bind`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct Label(pub(crate) u32);

impl Label {
    pub const fn id(self) -> u32 {
        self.0
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "L{}", self.0)
    }
}

/// A 4-byte rel32 placeholder waiting for its label to be bound
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Fixup {
    /// Offset of the first placeholder byte
    pub offset: usize,
    pub label: Label,
}

impl Fixup {
    /// Displacement from the end of the placeholder to `target`
    pub const fn displacement(&self, target: usize) -> i32 {
        (target as i64 - (self.offset as i64 + 4)) as i32
    }
}
