//! Q28 fixed-point arithmetic.
//!
//! Samples are 32-bit signed values with 28 fractional bits. Products are summed
//! in a 64-bit signed accumulator kept as a high/low word pair so it can ride
//! inside a frame between pipeline stages. Accumulated values are saturated to
//! the range whose Q28 extraction fits into 32 bits, so overflow never wraps.

/// A Q28 sample.
pub type Sample = i32;

/// Number of fractional bits.
pub const Q: u32 = 28;

/// Largest positive value the format maps to 1.0.
pub const ONE: Sample = (1 << Q) - 1;

/// The value mapped to -1.0.
pub const MINUS_ONE: Sample = -(1 << Q);

/// 0.5 in Q28.
pub const HALF: Sample = 1 << (Q - 1);

/// Rounding bias seeded into the low word before a rounded product.
const ROUNDING: u32 = 1 << (Q - 1);

const SAT_MAX: i64 = ((i32::MAX as i64) << Q) | ((1 << Q) - 1);
const SAT_MIN: i64 = (i32::MIN as i64) << Q;

/// Converts a float to Q28.
///
/// Negative values are scaled by 2^28 and rounded down, non-negative values by
/// 2^28 - 1 and rounded up, so +1.0 and -1.0 are both representable.
#[inline]
pub fn to_fixed(value: f64) -> Sample {
    if value < 0.0 {
        ((1u64 << Q) as f64 * value - 0.5) as i32
    } else {
        (((1u64 << Q) - 1) as f64 * value + 0.5) as i32
    }
}

/// Converts a Q28 value back to a float, using the same asymmetric scaling as
/// [`to_fixed`].
#[inline]
pub fn to_float(value: Sample) -> f64 {
    if value < 0 {
        value as f64 / (1u64 << Q) as f64
    } else {
        value as f64 / ((1u64 << Q) - 1) as f64
    }
}

/// 64-bit signed multiply-accumulate register.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Accumulator {
    pub hi: i32,
    pub lo: u32,
}

impl Accumulator {
    pub const ZERO: Self = Self { hi: 0, lo: 0 };

    /// Accumulator preloaded with the rounding bias of half an LSB at Q28.
    #[inline]
    pub const fn rounded() -> Self {
        Self {
            hi: 0,
            lo: ROUNDING,
        }
    }

    #[inline]
    pub const fn from_i64(value: i64) -> Self {
        Self {
            hi: (value >> 32) as i32,
            lo: value as u32,
        }
    }

    #[inline]
    pub const fn value(self) -> i64 {
        ((self.hi as i64) << 32) | self.lo as i64
    }

    /// Rebuilds an accumulator from two frame slots.
    #[inline]
    pub const fn from_slots(hi: i32, lo: i32) -> Self {
        Self { hi, lo: lo as u32 }
    }

    /// Splits the accumulator into two frame slots (high, low).
    #[inline]
    pub const fn to_slots(self) -> (i32, i32) {
        (self.hi, self.lo as i32)
    }

    /// Adds `x * y` without rounding. The 64-bit sum sticks at the `i64`
    /// limits rather than wrapping.
    #[inline]
    pub fn mac(&mut self, x: Sample, y: Sample) {
        *self = Self::from_i64(self.value().saturating_add(x as i64 * y as i64));
    }

    /// Clamps the accumulator to the range representable after extraction.
    #[inline]
    pub fn saturate(&mut self) {
        *self = Self::from_i64(self.value().clamp(SAT_MIN, SAT_MAX));
    }

    /// Takes the 32 bits starting at bit [`Q`].
    #[inline]
    pub const fn extract(self) -> Sample {
        (self.value() >> Q) as i32
    }

    /// Saturates and extracts in one step.
    #[inline]
    pub fn result(mut self) -> Sample {
        self.saturate();
        self.extract()
    }
}

/// Accumulates `x * y` into `acc`.
#[inline]
pub fn mac(acc: Accumulator, x: Sample, y: Sample) -> Accumulator {
    let mut acc = acc;
    acc.mac(x, y);
    acc
}

/// Clamps `acc` to the Q28-representable range.
#[inline]
pub fn saturate(acc: Accumulator) -> Accumulator {
    let mut acc = acc;
    acc.saturate();
    acc
}

/// Extracts the Q28 result held by `acc`.
#[inline]
pub const fn extract(acc: Accumulator) -> Sample {
    acc.extract()
}

/// Rounded Q28 product `x * y`.
#[inline]
pub fn mul(x: Sample, y: Sample) -> Sample {
    let mut acc = Accumulator::rounded();
    acc.mac(x, y);
    acc.result()
}

/// Rounded Q28 `x * y + z`.
#[inline]
pub fn mul_add(x: Sample, y: Sample, z: Sample) -> Sample {
    let mut acc = Accumulator::from_i64(((z as i64) << Q) | ROUNDING as i64);
    acc.mac(x, y);
    acc.result()
}

/// Device (Q31) to pipeline (Q28) conversion, an arithmetic shift.
#[inline]
pub const fn q31_to_q28(x: i32) -> Sample {
    x >> 3
}

/// Pipeline (Q28) to device (Q31) conversion, saturating.
#[inline]
pub const fn q28_to_q31(x: Sample) -> i32 {
    x.saturating_mul(8)
}
