//! Fixed-point filter primitives.
//!
//! All evaluation runs through a single rounded [`Accumulator`] per output
//! sample and saturates before the result is stored. Coefficients come out of
//! [`design`] already normalized by `a0` with the feedback terms negated, so the
//! difference equations below only ever add.

pub mod delay_line;
pub mod design;
pub mod tables;

use crate::fixed::{mul, Accumulator, Sample, ONE, Q};

/// Coefficients of one biquad section: `[b0, b1, b2, -a1, -a2]`.
pub type BiquadCoefficients = [Sample; 5];

/// Delay history of one biquad section: `[x1, x2, y1, y2]`.
pub type BiquadState = [Sample; 4];

/// Unity-gain pass-through section.
pub const BIQUAD_IDENTITY: BiquadCoefficients = [ONE, 0, 0, 0, 0];

/// First-order IIR. `coeffs = [b0, b1, -a1]`, `state = [x1, y1]`.
#[inline]
pub fn iir1(x: Sample, coeffs: &[Sample; 3], state: &mut [Sample; 2]) -> Sample {
    let mut acc = Accumulator::rounded();
    acc.mac(coeffs[0], x);
    acc.mac(coeffs[1], state[0]);
    acc.mac(coeffs[2], state[1]);
    let y = acc.result();
    *state = [x, y];

    y
}

/// Second-order IIR. `coeffs = [b0, b1, b2, -a1, -a2]`, `state = [x1, x2, y1, y2]`.
#[inline]
pub fn iir2(x: Sample, coeffs: &BiquadCoefficients, state: &mut BiquadState) -> Sample {
    let mut acc = Accumulator::rounded();
    acc.mac(coeffs[0], x);
    acc.mac(coeffs[1], state[0]);
    acc.mac(coeffs[2], state[1]);
    acc.mac(coeffs[3], state[2]);
    acc.mac(coeffs[4], state[3]);
    let y = acc.result();
    *state = [x, state[0], y, state[2]];

    y
}

/// Third-order IIR. `coeffs = [b0, b1, b2, b3, -a1, -a2, -a3]`,
/// `state = [x1, x2, x3, y1, y2, y3]`.
#[inline]
pub fn iir3(x: Sample, coeffs: &[Sample; 7], state: &mut [Sample; 6]) -> Sample {
    let mut acc = Accumulator::rounded();
    acc.mac(coeffs[0], x);
    for (c, s) in coeffs[1..4].iter().zip(state[0..3].iter()) {
        acc.mac(*c, *s);
    }
    for (c, s) in coeffs[4..7].iter().zip(state[3..6].iter()) {
        acc.mac(*c, *s);
    }
    let y = acc.result();
    *state = [x, state[0], state[1], y, state[3], state[4]];

    y
}

/// Runs `x` through every biquad section in order.
///
/// The section count is the length of `coeffs`; `state` must be at least as long.
#[inline]
pub fn biquad_cascade(
    x: Sample,
    coeffs: &[BiquadCoefficients],
    state: &mut [BiquadState],
) -> Sample {
    coeffs
        .iter()
        .zip(state.iter_mut())
        .fold(x, |x, (c, s)| iir2(x, c, s))
}

/// Shift-register FIR over `coeffs.len()` taps.
///
/// `state` holds the previous inputs, newest first, and must be as long as `coeffs`.
#[inline]
pub fn fir(x: Sample, coeffs: &[Sample], state: &mut [Sample]) -> Sample {
    let taps = coeffs.len().min(state.len());
    if taps == 0 {
        return 0;
    }
    state.copy_within(0..taps - 1, 1);
    state[0] = x;

    let mut acc = Accumulator::rounded();
    for (c, s) in coeffs.iter().zip(state.iter()) {
        acc.mac(*c, *s);
    }

    acc.result()
}

/// FIR with its own delay history.
#[derive(Debug, Clone)]
pub struct Fir<const N: usize> {
    state: [Sample; N],
}

impl<const N: usize> Default for Fir<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> Fir<N> {
    pub fn new() -> Self {
        Self { state: [0; N] }
    }

    pub fn reset(&mut self) {
        self.state.fill(0);
    }

    #[inline]
    pub fn process(&mut self, x: Sample, coeffs: &[Sample; N]) -> Sample {
        fir(x, coeffs, &mut self.state)
    }
}

/// Linear interpolation between `y0` and `y1` at `frac` (Q28, `0 <= frac < 1`).
#[inline]
pub fn interp(frac: Sample, y0: Sample, y1: Sample) -> Sample {
    let mut acc = Accumulator::rounded();
    acc.mac(ONE - frac, y0);
    acc.mac(frac, y1);

    acc.result()
}

/// Second-order Lagrange interpolation through `y0`, `y1`, `y2` at distance
/// `frac` (Q28, `0 <= frac < 1`) past `y0`.
#[inline]
pub fn lagrange(frac: Sample, y0: Sample, y1: Sample, y2: Sample) -> Sample {
    let d = frac;
    let d1 = d - ONE;
    let d2 = d - 2 * ONE;

    // Basis weights at nodes 0, 1 and 2.
    let l0 = mul(d1, d2) / 2;
    let l1 = -mul(d, d2);
    let l2 = mul(d, d1) / 2;

    let mut acc = Accumulator::rounded();
    acc.mac(l0, y0);
    acc.mac(l1, y1);
    acc.mac(l2, y2);

    acc.result()
}

/// Crossfade: `dry * (1 - mix) + wet * mix`.
#[inline]
pub fn blend(dry: Sample, wet: Sample, mix: Sample) -> Sample {
    interp(mix, dry, wet)
}

/// One-pole DC blocker, `y = x - x1 + pole * y1`.
#[derive(Debug, Default, Clone)]
pub struct DcBlocker {
    pole: Sample,
    x: Sample,
    y: Sample,
}

impl DcBlocker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn init(&mut self, pole: Sample) {
        self.x = 0;
        self.y = 0;
        self.pole = pole;
    }

    #[inline]
    pub fn set_pole(&mut self, pole: Sample) {
        self.pole = pole;
    }

    #[inline]
    pub fn process(&mut self, x: Sample) -> Sample {
        let diff = (x as i64 - self.x as i64).clamp(i32::MIN as i64, i32::MAX as i64);
        let mut acc = Accumulator::from_i64((diff << Q) | (1 << (Q - 1)));
        acc.mac(self.pole, self.y);
        self.x = x;
        self.y = acc.result();

        self.y
    }
}
