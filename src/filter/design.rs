//! Filter coefficient design.
//!
//! Control plane only: everything here uses floating point. Frequencies are
//! normalized to the sample rate (`0 <= ff < 0.5`). Biquads follow the RBJ audio
//! EQ cookbook and are returned in the stored order `[b0, b1, b2, -a1, -a2]`,
//! normalized by `a0`.
//!
//! For [`lowpass`] and [`highpass`] a `qq` of zero yields a single-pole
//! 6 dB/octave response in biquad form.

#[allow(unused_imports)]
use num_traits::float::Float;

use crate::fixed::{to_fixed, Sample};

use super::BiquadCoefficients;

const PI: f64 = core::f64::consts::PI;

fn normalize(b: [f64; 3], a: [f64; 3]) -> BiquadCoefficients {
    let a0 = a[0];
    [
        to_fixed(b[0] / a0),
        to_fixed(b[1] / a0),
        to_fixed(b[2] / a0),
        to_fixed(-a[1] / a0),
        to_fixed(-a[2] / a0),
    ]
}

fn omega(ff: f64) -> (f64, f64) {
    let w0 = 2.0 * PI * ff;
    (w0.sin(), w0.cos())
}

pub fn notch(ff: f64, qq: f64) -> BiquadCoefficients {
    let (sin, cos) = omega(ff);
    let alpha = sin / (2.0 * qq);

    normalize([1.0, -2.0 * cos, 1.0], [1.0 + alpha, -2.0 * cos, 1.0 - alpha])
}

pub fn lowpass(ff: f64, qq: f64) -> BiquadCoefficients {
    if qq == 0.0 {
        let [b0, b1, a1] = lowpass1(ff);
        return [b0, b1, 0, a1, 0];
    }
    let (sin, cos) = omega(ff);
    let alpha = sin / (2.0 * qq);

    normalize(
        [(1.0 - cos) / 2.0, 1.0 - cos, (1.0 - cos) / 2.0],
        [1.0 + alpha, -2.0 * cos, 1.0 - alpha],
    )
}

pub fn highpass(ff: f64, qq: f64) -> BiquadCoefficients {
    if qq == 0.0 {
        let [b0, b1, a1] = highpass1(ff);
        return [b0, b1, 0, a1, 0];
    }
    let (sin, cos) = omega(ff);
    let alpha = sin / (2.0 * qq);

    normalize(
        [(1.0 + cos) / 2.0, -(1.0 + cos), (1.0 + cos) / 2.0],
        [1.0 + alpha, -2.0 * cos, 1.0 - alpha],
    )
}

pub fn allpass(ff: f64, qq: f64) -> BiquadCoefficients {
    let (sin, cos) = omega(ff);
    let alpha = sin / (2.0 * qq);

    normalize(
        [1.0 - alpha, -2.0 * cos, 1.0 + alpha],
        [1.0 + alpha, -2.0 * cos, 1.0 - alpha],
    )
}

/// Band-pass with constant 0 dB peak gain, bandwidth given by Q.
pub fn bandpass_q(ff: f64, qq: f64) -> BiquadCoefficients {
    let (sin, cos) = omega(ff);
    let alpha = sin / (2.0 * qq);

    normalize([alpha, 0.0, -alpha], [1.0 + alpha, -2.0 * cos, 1.0 - alpha])
}

/// Band-pass with constant 0 dB peak gain between two corner frequencies.
pub fn bandpass_f(ff1: f64, ff2: f64) -> BiquadCoefficients {
    let (lo, hi) = if ff1 <= ff2 { (ff1, ff2) } else { (ff2, ff1) };
    let center = (lo * hi).sqrt();
    let octaves = (hi / lo).log2();
    let w0 = 2.0 * PI * center;
    let (sin, cos) = (w0.sin(), w0.cos());
    let alpha = sin * (core::f64::consts::LN_2 / 2.0 * octaves * w0 / sin).sinh();

    normalize([alpha, 0.0, -alpha], [1.0 + alpha, -2.0 * cos, 1.0 - alpha])
}

/// Peaking EQ, `gg` in dB (positive or negative).
pub fn peaking(ff: f64, qq: f64, gg: f64) -> BiquadCoefficients {
    let a = 10.0_f64.powf(gg / 40.0);
    let (sin, cos) = omega(ff);
    let alpha = sin / (2.0 * qq);

    normalize(
        [1.0 + alpha * a, -2.0 * cos, 1.0 - alpha * a],
        [1.0 + alpha / a, -2.0 * cos, 1.0 - alpha / a],
    )
}

fn shelf_terms(ff: f64, slope: f64, gg: f64) -> (f64, f64, f64) {
    let a = 10.0_f64.powf(gg / 40.0);
    let (sin, cos) = omega(ff);
    let alpha = sin / 2.0 * ((a + 1.0 / a) * (1.0 / slope - 1.0) + 2.0).sqrt();

    (a, cos, 2.0 * a.sqrt() * alpha)
}

/// Low shelf, `qq` is the shelf slope `S`, `gg` in dB.
pub fn lowshelf(ff: f64, qq: f64, gg: f64) -> BiquadCoefficients {
    let (a, cos, k) = shelf_terms(ff, qq, gg);

    normalize(
        [
            a * ((a + 1.0) - (a - 1.0) * cos + k),
            2.0 * a * ((a - 1.0) - (a + 1.0) * cos),
            a * ((a + 1.0) - (a - 1.0) * cos - k),
        ],
        [
            (a + 1.0) + (a - 1.0) * cos + k,
            -2.0 * ((a - 1.0) + (a + 1.0) * cos),
            (a + 1.0) + (a - 1.0) * cos - k,
        ],
    )
}

/// High shelf, `qq` is the shelf slope `S`, `gg` in dB.
pub fn highshelf(ff: f64, qq: f64, gg: f64) -> BiquadCoefficients {
    let (a, cos, k) = shelf_terms(ff, qq, gg);

    normalize(
        [
            a * ((a + 1.0) + (a - 1.0) * cos + k),
            -2.0 * a * ((a - 1.0) + (a + 1.0) * cos),
            a * ((a + 1.0) + (a - 1.0) * cos - k),
        ],
        [
            (a + 1.0) - (a - 1.0) * cos + k,
            2.0 * ((a - 1.0) - (a + 1.0) * cos),
            (a + 1.0) - (a - 1.0) * cos - k,
        ],
    )
}

/// Single-pole low-pass for [`super::iir1`]: `[b0, b1, -a1]`.
pub fn lowpass1(ff: f64) -> [Sample; 3] {
    let k = (PI * ff).tan();
    let norm = 1.0 / (1.0 + k);

    [
        to_fixed(k * norm),
        to_fixed(k * norm),
        to_fixed((1.0 - k) * norm),
    ]
}

/// Single-pole high-pass for [`super::iir1`]: `[b0, b1, -a1]`.
pub fn highpass1(ff: f64) -> [Sample; 3] {
    let k = (PI * ff).tan();
    let norm = 1.0 / (1.0 + k);

    [to_fixed(norm), to_fixed(-norm), to_fixed((1.0 - k) * norm)]
}

/// Passive bass/mid/treble tone stack (the classic 250k/1M/25k/56k network)
/// discretized with the bilinear transform, for [`super::iir3`].
///
/// `gb`, `gm`, `gt` are the bass, mid and treble pot positions in `[0, 1]`.
/// `vb`, `vm`, `vt` shift the corresponding corner frequencies by a ratio
/// (1.0 keeps the stock network). `fs` is the sample rate in Hz.
#[allow(clippy::too_many_arguments)]
pub fn tonestack(gb: f64, gm: f64, gt: f64, vb: f64, vm: f64, vt: f64, fs: f64) -> [Sample; 7] {
    let c1 = 0.25e-9 / vt.max(0.01);
    let c2 = 20.0e-9 / vb.max(0.01);
    let c3 = 20.0e-9 / vm.max(0.01);
    let (r1, r2, r3, r4) = (250e3, 1e6, 25e3, 56e3);

    let l = gb.clamp(0.0, 1.0);
    let m = gm.clamp(0.0, 1.0);
    let t = gt.clamp(0.0, 1.0);
    let m2 = m * m;

    let b1 = t * c1 * r1 + m * c3 * r3 + l * (c1 * r2 + c2 * r2) + (c1 * r3 + c2 * r3);
    let b2 = t * (c1 * c2 * r1 * r4 + c1 * c3 * r1 * r4)
        - m2 * (c1 * c3 * r3 * r3 + c2 * c3 * r3 * r3)
        + m * (c1 * c3 * r1 * r3 + c1 * c3 * r3 * r3 + c2 * c3 * r3 * r3)
        + l * (c1 * c2 * r1 * r2 + c1 * c2 * r2 * r4 + c1 * c3 * r2 * r4)
        + l * m * (c1 * c3 * r2 * r3 + c2 * c3 * r2 * r3)
        + (c1 * c2 * r1 * r3 + c1 * c2 * r3 * r4 + c1 * c3 * r3 * r4);
    let b3 = l * m * (c1 * c2 * c3 * r1 * r2 * r3 + c1 * c2 * c3 * r2 * r3 * r4)
        - m2 * (c1 * c2 * c3 * r1 * r3 * r3 + c1 * c2 * c3 * r3 * r3 * r4)
        + m * (c1 * c2 * c3 * r1 * r3 * r3 + c1 * c2 * c3 * r3 * r3 * r4)
        + t * c1 * c2 * c3 * r1 * r3 * r4
        - t * m * c1 * c2 * c3 * r3 * r3 * r4
        + t * l * c1 * c2 * c3 * r1 * r2 * r4;
    let a0 = 1.0;
    let a1 = (c1 * r1 + c1 * r3 + c2 * r3 + c2 * r4 + c3 * r4)
        + m * c3 * r3
        + l * (c1 * r2 + c2 * r2);
    let a2 = m * (c1 * c3 * r1 * r3 - c2 * c3 * r3 * r4 + c1 * c3 * r3 * r3 + c2 * c3 * r3 * r3)
        + l * m * (c1 * c3 * r2 * r3 + c2 * c3 * r2 * r3)
        - m2 * (c1 * c3 * r3 * r3 + c2 * c3 * r3 * r3)
        + l * (c1 * c2 * r2 * r4 + c1 * c2 * r1 * r2 + c1 * c3 * r2 * r4 + c2 * c3 * r2 * r4)
        + (c1 * c2 * r1 * r4
            + c1 * c3 * r1 * r4
            + c1 * c2 * r3 * r4
            + c1 * c2 * r1 * r3
            + c1 * c3 * r3 * r4
            + c2 * c3 * r3 * r4);
    let a3 = l * m * (c1 * c2 * c3 * r1 * r2 * r3 + c1 * c2 * c3 * r2 * r3 * r4)
        - m2 * (c1 * c2 * c3 * r1 * r3 * r3 + c1 * c2 * c3 * r3 * r3 * r4)
        + m * (c1 * c2 * c3 * r3 * r3 * r4 + c1 * c2 * c3 * r1 * r3 * r3
            - c1 * c2 * c3 * r1 * r3 * r4)
        + l * c1 * c2 * c3 * r1 * r2 * r4
        + c1 * c2 * c3 * r1 * r3 * r4;

    let k = 2.0 * fs;
    let (k2, k3) = (k * k, k * k * k);

    let bz = [
        -b1 * k - b2 * k2 - b3 * k3,
        -b1 * k + b2 * k2 + 3.0 * b3 * k3,
        b1 * k + b2 * k2 - 3.0 * b3 * k3,
        b1 * k - b2 * k2 + b3 * k3,
    ];
    let az = [
        -a0 - a1 * k - a2 * k2 - a3 * k3,
        -3.0 * a0 - a1 * k + a2 * k2 + 3.0 * a3 * k3,
        -3.0 * a0 + a1 * k + a2 * k2 - 3.0 * a3 * k3,
        -a0 + a1 * k - a2 * k2 + a3 * k3,
    ];

    [
        to_fixed(bz[0] / az[0]),
        to_fixed(bz[1] / az[0]),
        to_fixed(bz[2] / az[0]),
        to_fixed(bz[3] / az[0]),
        to_fixed(-az[1] / az[0]),
        to_fixed(-az[2] / az[0]),
        to_fixed(-az[3] / az[0]),
    ]
}
