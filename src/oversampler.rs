//! FIR interpolation and decimation around nonlinear stages.
//!
//! There is no faster tick to run on, so an oversampled signal is carried as
//! `R` consecutive frame slots: after [`upsample`] slot `R - 1` holds the oldest
//! sub-sample and slot `0` the newest. Nonlinear stages process the slots
//! oldest first, then [`downsample`] folds them back into slot `0`.
//!
//! Both directions use the same low-pass prototype. The interpolator's
//! polyphase table is pre-scaled by `R` ([`mix_fir_coeffs`]) to make up for the
//! zero-stuffing loss, and that is the only place the ratio gain is applied.

#[allow(unused_imports)]
use num_traits::float::Float;

use core::f64::consts::PI;

use crate::fixed::{to_fixed, Accumulator, Sample};

/// 72-tap anti-alias low-pass for 4x oversampling (pass 0.1, stop 0.21,
/// 120 dB, Kaiser window).
pub const ANTIALIAS_4X: [f64; 72] = [
    -0.000000006, 0.000001381, 0.000004326, 0.000002405, -0.000013689,
    -0.000036610, -0.000027816, 0.000051040, 0.000160857, 0.000152874,
    -0.000105892, -0.000494599, -0.000567774, 0.000078702, 0.001180593,
    0.001627896, 0.000335831, -0.002288016, -0.003858406, -0.001780131,
    0.003640321, 0.007890688, 0.005361270, -0.004595658, -0.014391661,
    -0.012873566, 0.003753649, 0.024252322, 0.027758163, 0.001891265,
    -0.040159287, -0.060869171, -0.022662597, 0.080312227, 0.208722649,
    0.297546418, 0.297546418, 0.208722649, 0.080312227, -0.022662597,
    -0.060869171, -0.040159287, 0.001891265, 0.027758163, 0.024252322,
    0.003753649, -0.012873566, -0.014391661, -0.004595658, 0.005361270,
    0.007890688, 0.003640321, -0.001780131, -0.003858406, -0.002288016,
    0.000335831, 0.001627896, 0.001180593, 0.000078702, -0.000567774,
    -0.000494599, -0.000105892, 0.000152874, 0.000160857, 0.000051040,
    -0.000027816, -0.000036610, -0.000013689, 0.000002405, 0.000004326,
    0.000001381, -0.000000006,
];

/// 48-tap anti-alias low-pass for 3x oversampling (pass 0.0, stop 0.165,
/// 118 dB, Kaiser window).
pub const ANTIALIAS_3X: [f64; 48] = [
    -0.000000257, -0.000004062, -0.000017834, -0.000044475, -0.000067942,
    -0.000035800, 0.000141136, 0.000548053, 0.001174548, 0.001799398,
    0.001924536, 0.000854644, -0.002012794, -0.006719312, -0.012264136,
    -0.016373514, -0.015772830, -0.007053819, 0.012039884, 0.041349045,
    0.077612027, 0.114780889, 0.145409249, 0.162733367, 0.162733367,
    0.145409249, 0.114780889, 0.077612027, 0.041349045, 0.012039884,
    -0.007053819, -0.015772830, -0.016373514, -0.012264136, -0.006719312,
    -0.002012794, 0.000854644, 0.001924536, 0.001799398, 0.001174548,
    0.000548053, 0.000141136, -0.000035800, -0.000067942, -0.000044475,
    -0.000017834, -0.000004062, -0.000000257,
];

/// Blackman-windowed sinc low-pass with unity DC gain. `cutoff` is in cycles
/// per sample at the high rate.
pub fn windowed_sinc<const N: usize>(cutoff: f64) -> [f64; N] {
    let span = N as f64 - 1.0;
    let center = span / 2.0;
    let mut taps = [0.0; N];
    for (i, tap) in taps.iter_mut().enumerate() {
        let t = i as f64 - center;
        let sinc = if t == 0.0 {
            2.0 * cutoff
        } else {
            (2.0 * PI * cutoff * t).sin() / (PI * t)
        };
        let w = 2.0 * PI * i as f64 / span;
        *tap = sinc * (0.42 - 0.5 * w.cos() + 0.08 * (2.0 * w).cos());
    }

    let sum: f64 = taps.iter().sum();
    if sum != 0.0 {
        taps.iter_mut().for_each(|tap| *tap /= sum);
    }
    taps
}

/// Quantizes a float prototype to Q28.
pub fn quantize<const N: usize>(taps: &[f64; N]) -> [Sample; N] {
    core::array::from_fn(|i| to_fixed(taps[i]))
}

/// Rearranges `fir` into `ratio` polyphase branches scaled by `ratio`.
///
/// Branch `j` occupies `out[j * m..(j + 1) * m]` with `m = fir.len() / ratio`
/// and holds `ratio * fir[j + k * ratio]` for `k` in `0..m`.
pub fn mix_fir_coeffs(fir: &[Sample], ratio: usize, out: &mut [Sample]) {
    if ratio == 0 {
        return;
    }
    let m = fir.len() / ratio;
    for j in 0..ratio {
        for k in 0..m {
            if let Some(o) = out.get_mut(j * m + k) {
                *o = fir[j + k * ratio].saturating_mul(ratio as i32);
            }
        }
    }
}

/// Interpolates `slots[0]` into `ratio` sub-samples written to `slots[0..ratio]`.
///
/// `coeffs` is a polyphase table from [`mix_fir_coeffs`]; `state` holds the last
/// `coeffs.len() / ratio` input samples, newest first.
#[inline]
pub fn upsample(slots: &mut [Sample], coeffs: &[Sample], state: &mut [Sample], ratio: usize) {
    let m = state.len();
    if m == 0 || ratio == 0 {
        return;
    }
    state.copy_within(0..m - 1, 1);
    state[0] = slots[0];

    for (j, phase) in coeffs.chunks_exact(m).take(ratio).enumerate() {
        let mut acc = Accumulator::rounded();
        for (c, s) in phase.iter().zip(state.iter()) {
            acc.mac(*c, *s);
        }
        slots[ratio - 1 - j] = acc.result();
    }
}

/// Filters the `ratio` sub-samples in `slots[0..ratio]` and keeps one output in
/// `slots[0]`.
///
/// `state` holds the last `coeffs.len()` high-rate samples, newest first.
#[inline]
pub fn downsample(slots: &mut [Sample], coeffs: &[Sample], state: &mut [Sample], ratio: usize) {
    let n = state.len();
    if ratio == 0 || ratio > n {
        return;
    }
    state.copy_within(0..n - ratio, ratio);
    state[..ratio].copy_from_slice(&slots[..ratio]);

    let mut acc = Accumulator::rounded();
    for (c, s) in coeffs.iter().zip(state.iter()) {
        acc.mac(*c, *s);
    }
    slots[0] = acc.result();
}

/// Interpolator with `R` branches of `M` taps each.
#[derive(Debug, Clone)]
pub struct Upsampler<const M: usize, const R: usize> {
    coeffs: [[Sample; M]; R],
    state: [Sample; M],
}

impl<const M: usize, const R: usize> Upsampler<M, R> {
    pub fn new(fir: &[Sample]) -> Self {
        let mut coeffs = [[0; M]; R];
        mix_fir_coeffs(fir, R, coeffs.as_flattened_mut());
        Self {
            coeffs,
            state: [0; M],
        }
    }

    pub fn reset(&mut self) {
        self.state.fill(0);
    }

    #[inline]
    pub fn process(&mut self, slots: &mut [Sample]) {
        upsample(slots, self.coeffs.as_flattened(), &mut self.state, R);
    }
}

/// Decimator over an `N`-tap prototype.
#[derive(Debug, Clone)]
pub struct Downsampler<const N: usize, const R: usize> {
    coeffs: [Sample; N],
    state: [Sample; N],
}

impl<const N: usize, const R: usize> Downsampler<N, R> {
    pub fn new(fir: &[Sample; N]) -> Self {
        Self {
            coeffs: *fir,
            state: [0; N],
        }
    }

    pub fn reset(&mut self) {
        self.state.fill(0);
    }

    #[inline]
    pub fn process(&mut self, slots: &mut [Sample]) {
        downsample(slots, &self.coeffs, &mut self.state, R);
    }
}

/// Matched interpolator/decimator pair built from one `N`-tap prototype,
/// `N = M * R`.
#[derive(Debug, Clone)]
pub struct Oversampler<const M: usize, const N: usize, const R: usize> {
    up: Upsampler<M, R>,
    down: Downsampler<N, R>,
}

/// 4x with the 72-tap prototype.
pub type Oversampler4x = Oversampler<18, 72, 4>;

/// 3x with the 48-tap prototype.
pub type Oversampler3x = Oversampler<16, 48, 3>;

impl<const M: usize, const N: usize, const R: usize> Oversampler<M, N, R> {
    const MATCHED: () = assert!(M * R == N);

    pub fn new(fir: &[Sample; N]) -> Self {
        let () = Self::MATCHED;
        Self {
            up: Upsampler::new(fir),
            down: Downsampler::new(fir),
        }
    }

    pub fn reset(&mut self) {
        self.up.reset();
        self.down.reset();
    }

    pub const fn ratio(&self) -> usize {
        R
    }

    /// Expands `slots[0]` into `slots[0..R]`.
    #[inline]
    pub fn upsample(&mut self, slots: &mut [Sample]) {
        self.up.process(slots);
    }

    /// Folds `slots[0..R]` back into `slots[0]`.
    #[inline]
    pub fn downsample(&mut self, slots: &mut [Sample]) {
        self.down.process(slots);
    }
}

impl Oversampler4x {
    pub fn antialias_4x() -> Self {
        Self::new(&quantize(&ANTIALIAS_4X))
    }
}

impl Oversampler3x {
    pub fn antialias_3x() -> Self {
        Self::new(&quantize(&ANTIALIAS_3X))
    }
}
