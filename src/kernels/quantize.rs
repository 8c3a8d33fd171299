/// Per-channel requantization table: one (multiplier, shift) pair per output
/// channel, rescaling the 32-bit accumulator back into the i8 output range.
#[derive(Debug, Clone, Copy)]
pub struct PerChannelQuant<'a> {
    pub multiplier: &'a [i32],
    pub shift: &'a [i32],
}

impl<'a> PerChannelQuant<'a> {
    pub fn new(multiplier: &'a [i32], shift: &'a [i32]) -> Self {
        assert!(
            multiplier.len() == shift.len(),
            "PerChannelQuant: multiplier/shift length mismatch ({} vs {})",
            multiplier.len(),
            shift.len()
        );
        Self { multiplier, shift }
    }

    pub fn channels(&self) -> usize {
        self.multiplier.len()
    }
}

/// Fixed-point multiply of a 32-bit accumulator by `multiplier / 2^31 * 2^shift`.
///
/// Positive `shift` is applied as a left shift before the high multiply,
/// negative as a rounding right shift after it. The left shift wraps on
/// overflow; callers guarantee accumulators small enough that it cannot
/// occur in well-formed invocations.
pub fn multiply_by_quantized_multiplier(x: i32, multiplier: i32, shift: i32) -> i32 {
    let left_shift = shift.max(0) as u32;
    let right_shift = (-shift).max(0) as u32;
    let v = saturating_rounding_doubling_high_mul(x.wrapping_shl(left_shift), multiplier);
    rounding_divide_by_pot(v, right_shift)
}

/// Returns (a * b) / 2^31, rounded, saturating the single overflow case
/// (both operands i32::MIN).
fn saturating_rounding_doubling_high_mul(a: i32, b: i32) -> i32 {
    if a == i32::MIN && b == i32::MIN {
        return i32::MAX;
    }
    let ab = i64::from(a) * i64::from(b);
    let nudge = if ab >= 0 { 1i64 << 30 } else { 1 - (1i64 << 30) };
    ((ab + nudge) / (1i64 << 31)) as i32
}

/// Arithmetic right shift with round-to-nearest.
fn rounding_divide_by_pot(x: i32, exponent: u32) -> i32 {
    if exponent == 0 {
        return x;
    }
    let mask = ((1i64 << exponent) - 1) as i32;
    let remainder = x & mask;
    let threshold = (mask >> 1) + i32::from(x < 0);
    (x >> exponent) + i32::from(remainder > threshold)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_multiplier() {
        // multiplier 2^30 with shift 1 represents a real factor of exactly 1.0
        for x in [-1000, -9, -1, 0, 1, 9, 4096, 123456] {
            assert_eq!(multiply_by_quantized_multiplier(x, 1 << 30, 1), x);
        }
    }

    #[test]
    fn halving_multiplier_rounds_to_nearest() {
        // multiplier 2^30 with shift 0 represents 0.5
        assert_eq!(multiply_by_quantized_multiplier(8, 1 << 30, 0), 4);
        assert_eq!(multiply_by_quantized_multiplier(9, 1 << 30, 0), 5);
        assert_eq!(multiply_by_quantized_multiplier(-8, 1 << 30, 0), -4);
    }

    #[test]
    fn negative_shift_divides() {
        // multiplier 2^30, shift -1 represents 0.25
        assert_eq!(multiply_by_quantized_multiplier(16, 1 << 30, -1), 4);
        assert_eq!(multiply_by_quantized_multiplier(100, 1 << 30, -1), 25);
    }
}
