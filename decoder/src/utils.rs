//! Utility functions for instruction decoding

/// Sign-extend the low `width` bits of `value` to i32
pub const fn sign_extend(value: u32, width: u32) -> i32 {
    let shift = 32 - width;
    ((value << shift) as i32) >> shift
}

/// Extract `width` bits of `word` starting at bit `lsb`
pub const fn bits(word: u32, lsb: u32, width: u32) -> u32 {
    (word >> lsb) & ((1u32 << width) - 1)
}

/// Target of a branch-format instruction located at `pc`
///
/// The displacement counts instructions relative to the updated PC.
pub const fn branch_target(pc: u64, displacement: i32) -> u64 {
    pc.wrapping_add(4).wrapping_add(((displacement as i64) << 2) as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_extend() {
        // Positive number
        assert_eq!(sign_extend(0x0_0005, 21), 5);
        // Most negative 21-bit value
        assert_eq!(sign_extend(0x10_0000, 21), -(1 << 20));
        // All ones
        assert_eq!(sign_extend(0x1F_FFFF, 21), -1);
        assert_eq!(sign_extend(0xFFFF, 16), -1);
        assert_eq!(sign_extend(0x7FFF, 16), 0x7FFF);
    }

    #[test]
    fn test_bits() {
        assert_eq!(bits(0xFC00_0000, 26, 6), 0x3F);
        assert_eq!(bits(0x0000_1000, 12, 1), 1);
        assert_eq!(bits(0x001F_E000, 13, 8), 0xFF);
    }

    #[test]
    fn test_branch_target() {
        assert_eq!(branch_target(0x1000, 0), 0x1004);
        assert_eq!(branch_target(0x1000, -1), 0x1000);
        assert_eq!(branch_target(0x1000, 3), 0x1010);
        assert_eq!(branch_target(0, -2), 0xFFFF_FFFF_FFFF_FFFC);
    }
}
