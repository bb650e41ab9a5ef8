//! Integer condition codes and the floating-point control register

/// Flags derived from an integer addition or subtraction
///
/// Alpha keeps no flags register; these are computed on demand by the
/// arithmetic handlers that need overflow detection or unsigned comparison.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ConditionCodes {
    /// Result is zero
    pub zero: bool,
    /// Result sign bit is set
    pub negative: bool,
    /// Signed two's-complement overflow
    pub overflow: bool,
    /// Unsigned carry out of an addition, or borrow of a subtraction
    pub carry: bool,
}

impl ConditionCodes {
    /// Signed `a < b` after computing `a - b`
    #[inline]
    pub const fn less(&self) -> bool {
        self.negative != self.overflow
    }

    /// Unsigned `a < b` after computing `a - b`
    #[inline]
    pub const fn below(&self) -> bool {
        self.carry
    }
}

/// Compute condition codes of `result = op_a ± op_b` on 64-bit operands
///
/// Addition overflows when both operands share a sign that differs from the
/// result's; subtraction overflows when the operand signs differ and the
/// result's sign differs from `op_a`.
pub const fn update_condition_codes(
    result: u64,
    op_a: u64,
    op_b: u64,
    is_subtraction: bool,
) -> ConditionCodes {
    let (sa, sb, sr) = ((op_a >> 63) & 1, (op_b >> 63) & 1, (result >> 63) & 1);
    let overflow = if is_subtraction { sa != sb && sr != sa } else { sa == sb && sr != sa };
    let carry = if is_subtraction { op_a < op_b } else { result < op_a };
    ConditionCodes { zero: result == 0, negative: sr == 1, overflow, carry }
}

/// 32-bit variant used by the longword forms; only the low 32 bits of each
/// argument are considered.
pub const fn update_condition_codes_32(
    result: u64,
    op_a: u64,
    op_b: u64,
    is_subtraction: bool,
) -> ConditionCodes {
    let (r, a, b) = (result as u32, op_a as u32, op_b as u32);
    let (sa, sb, sr) = (a >> 31, b >> 31, r >> 31);
    let overflow = if is_subtraction { sa != sb && sr != sa } else { sa == sb && sr != sa };
    let carry = if is_subtraction { a < b } else { r < a };
    ConditionCodes { zero: r == 0, negative: sr == 1, overflow, carry }
}

/// FPCR bit assignments
pub mod fpcr {
    /// Summary: OR of the exception bits
    pub const SUM: u64 = 1 << 63;
    /// Integer overflow in CVTQL
    pub const IOV: u64 = 1 << 57;
    /// Inexact result
    pub const INE: u64 = 1 << 56;
    /// Underflow
    pub const UNF: u64 = 1 << 55;
    /// Overflow
    pub const OVF: u64 = 1 << 54;
    /// Division by zero
    pub const DZE: u64 = 1 << 53;
    /// Invalid operation
    pub const INV: u64 = 1 << 52;
    /// Dynamic rounding mode field (bits 59-58)
    pub const DYN_SHIFT: u32 = 58;
    pub const DYN_MASK: u64 = 0b11 << DYN_SHIFT;
    /// Rounding mode encoding for round-to-nearest
    pub const DYN_NORMAL: u64 = 0b10 << DYN_SHIFT;
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_add_overflow_boundaries() {
        let cc = update_condition_codes(i64::MIN as u64, i64::MAX as u64, 1, false);
        assert!(cc.overflow);
        assert!(cc.negative);
        assert!(!cc.carry);

        let cc = update_condition_codes(0, u64::MAX, 1, false);
        assert!(!cc.overflow);
        assert!(cc.carry);
        assert!(cc.zero);
    }

    #[test]
    fn test_sub_overflow_boundaries() {
        let cc = update_condition_codes(i64::MAX as u64, i64::MIN as u64, 1, true);
        assert!(cc.overflow);
        assert!(cc.less());

        let cc = update_condition_codes(u64::MAX, 0, 1, true);
        assert!(cc.below());
        assert!(!cc.overflow);
    }

    #[test]
    fn test_longword_overflow() {
        let a = 0x7FFF_FFFFu64;
        let r = a.wrapping_add(1);
        assert!(update_condition_codes_32(r, a, 1, false).overflow);
        // upper halves are ignored
        assert!(!update_condition_codes_32(0xFFFF_FFFF_0000_0002, 0xAAAA_0000_0000_0001, 1, false).overflow);
    }

    proptest! {
        #[test]
        fn add_overflow_matches_checked_add(a in any::<i64>(), b in any::<i64>()) {
            let r = a.wrapping_add(b);
            let cc = update_condition_codes(r as u64, a as u64, b as u64, false);
            prop_assert_eq!(cc.overflow, a.checked_add(b).is_none());
            prop_assert_eq!(cc.carry, (a as u64).checked_add(b as u64).is_none());
        }

        #[test]
        fn sub_overflow_matches_checked_sub(a in any::<i64>(), b in any::<i64>()) {
            let r = a.wrapping_sub(b);
            let cc = update_condition_codes(r as u64, a as u64, b as u64, true);
            prop_assert_eq!(cc.overflow, a.checked_sub(b).is_none());
            prop_assert_eq!(cc.less(), a < b);
            prop_assert_eq!(cc.below(), (a as u64) < (b as u64));
        }
    }
}
