//! Effect programs.
//!
//! Each program pairs an [`Effect`] running in the audio pipeline with a
//! [`Control`] running at the control rate. [`create`] builds both halves for
//! host-side use, backed by [`MemoryFlash`] and fixed pot positions.

pub mod ampsim;
pub mod cabsim;
pub mod chorus;
pub mod delay;
pub mod grapheq;
pub mod preamp;

use alloc::boxed::Box;

use crate::filter::{design, iir1};
use crate::fixed::{mul, to_fixed, Sample, ONE};
use crate::pipeline::{Control, Device, Effect, Frame};
use crate::preset::{Flash, MemoryFlash, PresetProtocol};
use crate::property::Property;
use crate::utils::PotQuantizer;

/// Number of control pots.
pub const POT_COUNT: usize = 8;

/// Pipeline property carrying `[volume, b0, b1, -a1, 0]` for [`MasterOutput`].
pub const MASTER_ID: u32 = 0x8001;

/// Pot positions as seen by the control domain, in `[0, 1]`.
pub trait Pots: Send {
    fn read(&self, index: usize) -> f64;
}

/// Pots that stay where they are put.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FixedPots([f64; POT_COUNT]);

impl Default for FixedPots {
    fn default() -> Self {
        Self([0.5; POT_COUNT])
    }
}

impl FixedPots {
    pub fn new(positions: [f64; POT_COUNT]) -> Self {
        Self(positions)
    }

    pub fn set(&mut self, index: usize, position: f64) {
        if let Some(pot) = self.0.get_mut(index) {
            *pot = position.clamp(0.0, 1.0);
        }
    }
}

impl Pots for FixedPots {
    fn read(&self, index: usize) -> f64 {
        self.0.get(index).copied().unwrap_or(0.0)
    }
}

/// Instrument input taken as the difference of the two ADC channels (Q31),
/// saturating at full scale.
#[inline]
pub fn pseudo_differential(adc: &Frame) -> i32 {
    adc[0].saturating_sub(adc[1])
}

/// Activates the preset zone under `position`, if it moved to a new zone.
pub(crate) fn select_preset<F: Flash>(
    quantizer: &mut PotQuantizer,
    position: f64,
    protocol: &mut PresetProtocol<F>,
) {
    let previous = quantizer.value();
    let selected = quantizer.process(position);
    if selected != previous {
        if let Err(err) = protocol.store_mut().activate(selected) {
            log::warn!("selecting preset {selected} failed: {err}");
        }
    }
}

/// Master volume and tone applied by the mixer, one filter state per channel.
#[derive(Debug, Clone)]
pub struct MasterOutput {
    volume: Sample,
    tone: [Sample; 3],
    state: [[Sample; 2]; 2],
}

impl Default for MasterOutput {
    fn default() -> Self {
        Self {
            volume: ONE,
            tone: [ONE, 0, 0],
            state: [[0; 2]; 2],
        }
    }
}

impl MasterOutput {
    pub fn new() -> Self {
        Self::default()
    }

    /// `sample_rate` in Hz; `volume` and `tone` are pot positions.
    pub fn property(sample_rate: u32, volume: f64, tone: f64) -> Property {
        let cutoff = (2000.0 + tone.clamp(0.0, 1.0) * 10000.0) / sample_rate as f64;
        let [b0, b1, a1] = design::lowpass1(cutoff);

        Property::new(MASTER_ID, [to_fixed(volume), b0, b1, a1, 0])
    }

    pub fn volume(&self) -> Sample {
        self.volume
    }

    /// Picks up a [`MASTER_ID`] property; others are ignored.
    pub fn apply(&mut self, property: &Property) {
        if property.id == MASTER_ID {
            self.volume = property.data[0];
            self.tone = [property.data[1], property.data[2], property.data[3]];
        }
    }

    #[inline]
    pub fn process(&mut self, channel: usize, x: Sample) -> Sample {
        let state = &mut self.state[channel & 1];
        iir1(mul(x, self.volume), &self.tone, state)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EffectKind {
    CabSim,
    AmpSim,
    Preamp,
    Chorus,
    Delay,
    GraphEq,
}

impl EffectKind {
    pub const ALL: [Self; 6] = [
        Self::CabSim,
        Self::AmpSim,
        Self::Preamp,
        Self::Chorus,
        Self::Delay,
        Self::GraphEq,
    ];

    /// Audio sample rate the program is written for, in Hz.
    pub fn sample_rate(self) -> u32 {
        match self {
            Self::CabSim => cabsim::SAMPLE_RATE,
            Self::AmpSim => ampsim::SAMPLE_RATE,
            Self::Preamp => preamp::SAMPLE_RATE,
            Self::Chorus => chorus::SAMPLE_RATE,
            Self::Delay => delay::SAMPLE_RATE,
            Self::GraphEq => grapheq::SAMPLE_RATE,
        }
    }
}

/// Both halves of the program `kind`.
pub fn create(kind: EffectKind) -> (Box<dyn Control>, Box<dyn Effect>) {
    let pots = FixedPots::default();
    match kind {
        EffectKind::CabSim => (
            Box::new(cabsim::CabSimControl::new()),
            Box::new(cabsim::CabSim::new()),
        ),
        EffectKind::AmpSim => (
            Box::new(ampsim::AmpSimControl::new(MemoryFlash::new())),
            Box::new(ampsim::AmpSim::new()),
        ),
        EffectKind::Preamp => (
            Box::new(preamp::PreampControl::new(MemoryFlash::new(), pots)),
            Box::new(preamp::Preamp::new()),
        ),
        EffectKind::Chorus => (
            Box::new(chorus::ChorusControl::new(MemoryFlash::new(), pots)),
            Box::new(chorus::Chorus::new()),
        ),
        EffectKind::Delay => (
            Box::new(delay::DelayControl::new(MemoryFlash::new())),
            Box::new(delay::Delay::new()),
        ),
        EffectKind::GraphEq => (
            Box::new(grapheq::GraphEqControl::new(MemoryFlash::new())),
            Box::new(grapheq::GraphEq::new()),
        ),
    }
}

/// A [`Device`] running the program `kind` at its own sample rate.
pub fn device(kind: EffectKind) -> Device<dyn Control, dyn Effect> {
    let (control, effect) = create(kind);

    Device::new(control, effect, kind.sample_rate())
}
