//! Fixed-point delay line with fractional reads.

use crate::fixed::Sample;

use super::lagrange;

/// Circular sample history. `MAX_DELAY` must be a power of two.
#[derive(Debug, Clone)]
pub struct DelayLine<const MAX_DELAY: usize> {
    write_ptr: usize,
    line: [Sample; MAX_DELAY],
}

impl<const MAX_DELAY: usize> Default for DelayLine<MAX_DELAY> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const MAX_DELAY: usize> DelayLine<MAX_DELAY> {
    const MASK: usize = {
        assert!(MAX_DELAY.is_power_of_two());
        MAX_DELAY - 1
    };

    pub fn new() -> Self {
        Self {
            write_ptr: 0,
            line: [0; MAX_DELAY],
        }
    }

    pub fn init(&mut self) {
        self.reset();
    }

    pub fn reset(&mut self) {
        self.line.fill(0);
        self.write_ptr = 0;
    }

    pub fn max_delay(&self) -> usize {
        MAX_DELAY
    }

    #[inline]
    pub fn write(&mut self, sample: Sample) {
        self.line[self.write_ptr] = sample;
        self.write_ptr = self.write_ptr.wrapping_sub(1) & Self::MASK;
    }

    /// Sample written `delay` writes ago (`delay = 1` is the newest).
    #[inline]
    pub fn read(&self, delay: usize) -> Sample {
        self.line[(self.write_ptr + delay) & Self::MASK]
    }

    /// Lagrange read between `delay`, `delay + 1` and `delay + 2` at `frac` (Q28).
    #[inline]
    pub fn read_lagrange(&self, delay: usize, frac: Sample) -> Sample {
        lagrange(
            frac,
            self.read(delay),
            self.read(delay + 1),
            self.read(delay + 2),
        )
    }
}
