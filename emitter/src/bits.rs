use crate::buffer::CodeBuffer;

/// Packs arbitrary-width fields MSB-first into a [`CodeBuffer`]
///
/// Used to build fixed-layout instruction words field by field. Completed
/// bytes are appended as soon as eight bits accumulate; a partial byte stays
/// pending until [`BitWriter::flush`] pads it with zeros. The writer owns its
/// buffer, so it can only be handed back (flushed) through
/// [`BitWriter::finish`].
#[derive(Debug, Default)]
pub struct BitWriter {
    buf: CodeBuffer,
    acc: u8,
    pending: u32,
}

impl BitWriter {
    pub fn new() -> Self {
        Self::from_buffer(CodeBuffer::new())
    }

    pub fn from_buffer(buf: CodeBuffer) -> Self {
        Self { buf, acc: 0, pending: 0 }
    }

    /// Append the low `count` bits of `value`, most significant first
    pub fn write_bits(&mut self, value: u64, count: u32) {
        debug_assert!(count <= 64, "cannot write {count} bits at once");
        for i in (0..count).rev() {
            let bit = ((value >> i) & 1) as u8;
            self.acc = (self.acc << 1) | bit;
            self.pending += 1;
            if self.pending == 8 {
                self.buf.push_u8(self.acc);
                self.acc = 0;
                self.pending = 0;
            }
        }
    }

    /// Number of bits waiting for a full byte
    pub fn pending_bits(&self) -> u32 {
        self.pending
    }

    /// Pad the pending partial byte with zero bits and append it
    pub fn flush(&mut self) {
        if self.pending > 0 {
            self.buf.push_u8(self.acc << (8 - self.pending));
            self.acc = 0;
            self.pending = 0;
        }
    }

    /// Flush and return the buffer
    pub fn finish(mut self) -> CodeBuffer {
        self.flush();
        self.buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_msb_first_packing() {
        let mut writer = BitWriter::new();
        writer.write_bits(0b101, 3);
        writer.write_bits(0b11111, 5);
        writer.write_bits(0xA, 4);
        assert_eq!(writer.pending_bits(), 4);
        let buf = writer.finish();
        assert_eq!(buf.as_bytes(), &[0b1011_1111, 0b1010_0000]);
    }

    #[test]
    fn test_flush_without_pending_is_noop() {
        let mut writer = BitWriter::new();
        writer.write_bits(0xAB, 8);
        writer.flush();
        assert_eq!(writer.finish().as_bytes(), &[0xAB]);
    }
}
