//! Pot quantizer.
//!
//! Maps a pot position in [0, 1] to one of `steps` 1-based zones. A dead band
//! around every zone boundary keeps the previous zone, so a pot resting on a
//! boundary does not flip between presets.

#[allow(unused_imports)]
use num_traits::float::Float;

#[derive(Debug, Clone)]
pub struct PotQuantizer {
    steps: u8,
    dead_band: f64,
    value: u8,
}

impl PotQuantizer {
    /// `dead_band` is the distance from a boundary, in pot units, inside which
    /// the zone does not change.
    pub fn new(steps: u8, dead_band: f64) -> Self {
        Self {
            steps: steps.max(1),
            dead_band,
            value: 0,
        }
    }

    pub fn init(&mut self) {
        self.value = 0;
    }

    #[inline]
    pub fn steps(&self) -> u8 {
        self.steps
    }

    /// Zone of the last call, 0 before the first one.
    #[inline]
    pub fn value(&self) -> u8 {
        self.value
    }

    /// Boundaries sit halfway between the zone centers, which are spread
    /// evenly with the first at 0 and the last at 1.
    #[inline]
    pub fn process(&mut self, pot: f64) -> u8 {
        let scale = (self.steps - 1) as f64;
        let position = pot.clamp(0.0, 1.0) * scale;
        let nearest = (position + 0.5).min(scale) as u8;

        if self.value == 0 {
            self.value = nearest + 1;
            return self.value;
        }

        let current = (self.value - 1) as f64;
        let hysteresis = self.dead_band * scale;
        if (position - current).abs() > 0.5 + hysteresis {
            self.value = nearest + 1;
        }

        self.value
    }
}
