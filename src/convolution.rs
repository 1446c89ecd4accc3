//! Long impulse-response convolution split across pipeline stages.
//!
//! The tap vector is cut into parts, one per pipeline stage, and every part into
//! [`CHUNK`]-tap chunks. Each chunk owns the matching segment of the sample
//! history. A sample entering a chunk is shifted in two taps at a time; the
//! oldest sample of the segment falls out the far end exactly once and becomes
//! the input of the next chunk, so the chained segments behave like one long
//! delay line. Partial sums stay in a 64-bit [`Accumulator`] that is handed from
//! stage to stage through two frame slots and only saturated and extracted by
//! the last stage.

use crate::fixed::{Accumulator, Sample, ONE};

/// Taps per chunk.
pub const CHUNK: usize = 24;

/// Shifts `x` into `state`, accumulates `coeffs . state` into `acc` and returns
/// the evicted oldest sample.
///
/// `coeffs` and `state` must have the same even length.
#[inline]
pub fn convolve_chunk(
    x: Sample,
    coeffs: &[Sample],
    state: &mut [Sample],
    acc: &mut Accumulator,
) -> Sample {
    let mut carry = x;
    for (c, s) in coeffs.chunks_exact(2).zip(state.chunks_exact_mut(2)) {
        let evicted = s[1];
        s[1] = s[0];
        s[0] = carry;
        acc.mac(c[0], s[0]);
        acc.mac(c[1], s[1]);
        carry = evicted;
    }

    carry
}

/// One channel of `TAPS`-tap convolution spread over `PARTS` pipeline stages.
#[derive(Debug, Clone)]
pub struct Convolver<const TAPS: usize, const PARTS: usize> {
    coeffs: [Sample; TAPS],
    state: [Sample; TAPS],
}

impl<const TAPS: usize, const PARTS: usize> Default for Convolver<TAPS, PARTS> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const TAPS: usize, const PARTS: usize> Convolver<TAPS, PARTS> {
    /// Taps evaluated per stage.
    pub const PART_TAPS: usize = {
        assert!(PARTS > 0 && TAPS % (PARTS * CHUNK) == 0);
        TAPS / PARTS
    };

    /// Creates a convolver with an all-zero impulse response.
    pub fn new() -> Self {
        Self {
            coeffs: [0; TAPS],
            state: [0; TAPS],
        }
    }

    /// Loads a unit impulse so the convolver passes audio unchanged.
    pub fn init(&mut self) {
        self.coeffs.fill(0);
        self.coeffs[0] = ONE;
        self.reset();
    }

    /// Clears the sample history.
    pub fn reset(&mut self) {
        self.state.fill(0);
    }

    pub fn coefficients(&self) -> &[Sample; TAPS] {
        &self.coeffs
    }

    /// Writes `words` starting at tap `offset`. Words past the end are dropped.
    /// Returns how many were written.
    pub fn load(&mut self, offset: usize, words: &[Sample]) -> usize {
        let Some(dest) = self.coeffs.get_mut(offset..) else {
            return 0;
        };
        let n = dest.len().min(words.len());
        dest[..n].copy_from_slice(&words[..n]);

        n
    }

    /// Replaces the whole impulse response; missing taps are zero-padded.
    pub fn set_coefficients(&mut self, taps: &[Sample]) {
        self.coeffs.fill(0);
        self.load(0, taps);
    }

    /// Runs the chunks of part `part` on `x`, adding into `acc`.
    /// Returns the sample evicted from the part, which feeds the next part.
    #[inline]
    pub fn process_part(&mut self, part: usize, x: Sample, acc: &mut Accumulator) -> Sample {
        let part = part % PARTS;
        let start = part * Self::PART_TAPS;
        let end = start + Self::PART_TAPS;
        let coeffs = self.coeffs[start..end].chunks_exact(CHUNK);
        let state = self.state[start..end].chunks_exact_mut(CHUNK);

        coeffs
            .zip(state)
            .fold(x, |x, (c, s)| convolve_chunk(x, c, s, acc))
    }

    /// Processes part `part` with the frame conventions used by the pipeline:
    /// the running sample lives in `frame[sample_slot]` and the accumulator in
    /// `frame[acc_slot]` (high) and `frame[acc_slot + 1]` (low).
    #[inline]
    pub fn process_frame(
        &mut self,
        part: usize,
        frame: &mut [Sample],
        sample_slot: usize,
        acc_slot: usize,
    ) {
        let mut acc = Accumulator::from_slots(frame[acc_slot], frame[acc_slot + 1]);
        frame[sample_slot] = self.process_part(part, frame[sample_slot], &mut acc);
        store(frame, acc_slot, acc);
    }

    /// Whole convolution in one call, for callers that do not split the work.
    #[inline]
    pub fn process(&mut self, x: Sample) -> Sample {
        let mut acc = Accumulator::rounded();
        let mut x = x;
        for part in 0..PARTS {
            x = self.process_part(part, x, &mut acc);
        }

        acc.result()
    }
}

/// Seeds the accumulator slots with the rounding bias.
#[inline]
pub fn begin(frame: &mut [Sample], acc_slot: usize) {
    store(frame, acc_slot, Accumulator::rounded());
}

/// Saturates and extracts the accumulator held in the frame.
#[inline]
pub fn finish(frame: &[Sample], acc_slot: usize) -> Sample {
    Accumulator::from_slots(frame[acc_slot], frame[acc_slot + 1]).result()
}

#[inline]
fn store(frame: &mut [Sample], acc_slot: usize, acc: Accumulator) {
    let (hi, lo) = acc.to_slots();
    frame[acc_slot] = hi;
    frame[acc_slot + 1] = lo;
}
