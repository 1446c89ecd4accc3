//! Q28 lookup tables for the audio path.
//!
//! Tables are computed once on first access. Effects fetch them while they are
//! constructed so the audio path only ever sees the finished tables.

#[allow(unused_imports)]
use num_traits::float::Float;
use spin::Once;

use crate::fixed::{to_fixed, Accumulator, Sample, Q};

use super::interp;

/// Entries per table period, plus two guard points for 3-point interpolation.
pub const TABLE_BITS: u32 = 10;
pub const TABLE_SIZE: usize = 1 << TABLE_BITS;

/// Input span of the tanh table is `[-TANH_RANGE, TANH_RANGE)`.
pub const TANH_RANGE: f64 = 4.0;

const TANH_SPAN: i64 = 1 << (Q + 3);

pub type Table = [Sample; TABLE_SIZE + 2];

#[derive(Debug)]
pub struct Tables {
    pub sine: Table,
    pub tanh: Table,
}

static TABLES: Once<Tables> = Once::new();

pub fn tables() -> &'static Tables {
    TABLES.call_once(|| {
        let mut sine = [0; TABLE_SIZE + 2];
        let mut tanh = [0; TABLE_SIZE + 2];
        let n = TABLE_SIZE as f64;
        for (i, (s, t)) in sine.iter_mut().zip(tanh.iter_mut()).enumerate() {
            let phase = i as f64 / n;
            *s = to_fixed((2.0 * core::f64::consts::PI * phase).sin());
            *t = to_fixed((TANH_RANGE * (2.0 * phase - 1.0)).tanh());
        }
        Tables { sine, tanh }
    })
}

/// One period of `sin(2 pi i / TABLE_SIZE)`.
pub fn sine() -> &'static Table {
    &tables().sine
}

/// `tanh(x)` for `x` in `[-TANH_RANGE, TANH_RANGE)`.
pub fn tanh() -> &'static Table {
    &tables().tanh
}

/// Splits a Q28 phase in `[0, 1)` into a table index and a Q28 fraction.
#[inline]
pub fn phase_index(phase: Sample) -> (usize, Sample) {
    let index = ((phase & 0x0FFF_FFFF) >> (Q - TABLE_BITS)) as usize;
    let frac = (phase & ((1 << (Q - TABLE_BITS)) - 1)) << TABLE_BITS;

    (index, frac)
}

/// Interpolated tanh lookup. Inputs outside the table span clamp to its ends.
#[inline]
pub fn lookup_tanh(table: &Table, x: Sample) -> Sample {
    let shifted = (x as i64 + TANH_SPAN / 2).clamp(0, TANH_SPAN - 1);
    // 2^21 input steps per table entry.
    let index = (shifted >> (Q + 3 - TABLE_BITS)) as usize;
    let frac = ((shifted & ((1 << (Q + 3 - TABLE_BITS)) - 1)) << (TABLE_BITS - 3)) as Sample;

    interp(frac, table[index], table[index + 1])
}

/// Scales `x` by `gain` and looks up tanh of the product.
#[inline]
pub fn lookup_tanh_scaled(table: &Table, x: Sample, gain: Sample) -> Sample {
    let mut acc = Accumulator::rounded();
    acc.mac(x, gain);

    lookup_tanh(table, acc.result())
}
