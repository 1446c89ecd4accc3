//! Dual-path tube preamp.
//!
//! The instrument input is oversampled 3x and run through an input stage in
//! pipeline stage 1, then copied into two paths of two tube stages each. Path A
//! occupies slots `0..3` and runs in stages 2 and 3, path B occupies slots
//! `3..6` and runs in stages 4 and 5; within a path slot 2 holds the oldest
//! sub-sample. Stage 3 scales path A by its volume and leaves path A's balance
//! in slot 6, stage 5 scales path B, blends the paths and decimates back to one
//! sample. Every tube stage and both halves of the oversampler belong to
//! exactly one pipeline stage, which also applies that stage's coefficients.
//!
//! Pipeline properties use the coefficient class as id:
//!
//! | Id  | Target                               |
//! |-----|--------------------------------------|
//! | 1-3 | class 1-3 of both path A stages      |
//! | 4-6 | class 1-3 of both path B stages      |
//! | 7   | class 1 of the second path A stage   |
//! | 8   | class 1 of the second path B stage   |
//! | [`MASTER_ID`](super::MASTER_ID) | master volume and tone |

#[allow(unused_imports)]
use num_traits::float::Float;

use core::f64::consts::PI;

use crate::filter::blend;
use crate::fixed::{mul, q28_to_q31, q31_to_q28, to_fixed, Sample};
use crate::nonlinear::{self, TubeStage};
use crate::oversampler::{quantize, Downsampler, Upsampler, ANTIALIAS_3X};
use crate::pipeline::{Control, Effect, Frame, MixerIo};
use crate::preset::{Flash, Preset, PresetProtocol, PresetTable, PRESET_COUNT};
use crate::property::Property;
use crate::utils::PotQuantizer;

use super::{select_preset, MasterOutput, Pots};

pub const SAMPLE_RATE: u32 = 192_000;

/// Oversampling ratio.
pub const RATIO: usize = 3;

/// Rate the tube stages run at.
pub const OVERSAMPLED_RATE: f64 = SAMPLE_RATE as f64 * RATIO as f64;

const PATH_A: usize = 0;
const PATH_B: usize = RATIO;
const BALANCE: usize = 2 * RATIO;

/// Sub-sample slots of a path, oldest first.
const fn oldest_first(base: usize) -> [usize; RATIO] {
    [base + 2, base + 1, base]
}

/// Preset byte offsets within one path; path A starts at byte 0, path B at 8.
pub mod params {
    pub const DRIVE: usize = 0;
    pub const EMPHASIS: usize = 1;
    pub const LOCUT: usize = 2;
    pub const SLEW: usize = 3;
    pub const VOICE_2: usize = 4;
    pub const VOICE_3: usize = 5;
    pub const VOLUME: usize = 6;
    pub const BALANCE: usize = 7;

    pub const PATH_SIZE: usize = 8;
}

/// Pot assignments.
pub mod pots {
    pub const VOLUME: usize = 0;
    pub const TONE: usize = 1;
    pub const PRESET: usize = 2;
}

/// One tube stage of a path together with the property ids it listens to.
#[derive(Debug, Clone)]
struct PathStage {
    tube: TubeStage,
    /// Id of class 1 for the whole path; classes 2 and 3 follow.
    path_id: u32,
    /// Id addressing class 1 of this stage alone.
    own_id: Option<u32>,
}

impl PathStage {
    fn new(path_id: u32, own_id: Option<u32>) -> Self {
        Self {
            tube: TubeStage::new(),
            path_id,
            own_id,
        }
    }

    fn apply(&mut self, property: &Property) {
        let id = property.id;
        if (self.path_id..self.path_id + 3).contains(&id) {
            let class = (id - self.path_id + 1) as u8;
            self.tube.set_coefficients(class, &property.data);
        } else if self.own_id == Some(id) {
            self.tube.set_coefficients(1, &property.data);
        }
    }

    #[inline]
    fn run(&mut self, frame: &mut Frame, base: usize) {
        for slot in oldest_first(base) {
            frame[slot] = self.tube.process(frame[slot]);
        }
    }

    /// Scales the path by this stage's output volume.
    #[inline]
    fn level(&self, frame: &mut Frame, base: usize) {
        let volume = self.tube.volume();
        for slot in &mut frame[base..base + RATIO] {
            *slot = mul(*slot, volume);
        }
    }
}

#[derive(Debug, Clone)]
pub struct Preamp {
    upsampler: Upsampler<16, RATIO>,
    input: TubeStage,
    a1: PathStage,
    a2: PathStage,
    b1: PathStage,
    b2: PathStage,
    downsampler: Downsampler<48, RATIO>,
    master: MasterOutput,
}

impl Default for Preamp {
    fn default() -> Self {
        Self::new()
    }
}

impl Preamp {
    pub fn new() -> Self {
        let fir = quantize(&ANTIALIAS_3X);
        Self {
            upsampler: Upsampler::new(&fir),
            input: TubeStage::new(),
            a1: PathStage::new(1, None),
            a2: PathStage::new(1, Some(7)),
            b1: PathStage::new(4, None),
            b2: PathStage::new(4, Some(8)),
            downsampler: Downsampler::new(&fir),
            master: MasterOutput::new(),
        }
    }

    /// Tube stages in path order: `[A first, A second, B first, B second]`.
    pub fn stage(&self, index: usize) -> Option<&TubeStage> {
        match index {
            0 => Some(&self.a1.tube),
            1 => Some(&self.a2.tube),
            2 => Some(&self.b1.tube),
            3 => Some(&self.b2.tube),
            _ => None,
        }
    }
}

impl Effect for Preamp {
    fn initialize(&mut self) {
        self.upsampler.reset();
        self.downsampler.reset();
        for tube in [
            &mut self.input,
            &mut self.a1.tube,
            &mut self.a2.tube,
            &mut self.b1.tube,
            &mut self.b2.tube,
        ] {
            tube.reset();
        }
    }

    fn mixer(&mut self, io: MixerIo<'_>, property: &Property) {
        self.master.apply(property);

        let guitar = io.adc_output[0] / 2 - io.adc_output[1] / 2;
        io.dsp_input[0] = q31_to_q28(guitar);
        io.usb_input[0] = guitar;

        for ch in 0..2 {
            let y = self.master.process(ch, io.dsp_output[0]);
            // Instrument level rather than line level.
            io.dac_input[ch] = q28_to_q31(y) / 8;
        }
        io.usb_input[1] = q28_to_q31(io.dsp_output[0]);
    }

    fn stage1(&mut self, frame: &mut Frame, _property: &Property) {
        self.upsampler.process(&mut frame[PATH_A..PATH_A + RATIO]);
        for slot in oldest_first(PATH_A) {
            frame[slot] = self.input.process(frame[slot]);
        }
        frame.copy_within(PATH_A..PATH_A + RATIO, PATH_B);
    }

    fn stage2(&mut self, frame: &mut Frame, property: &Property) {
        self.a1.run(frame, PATH_A);
        self.a1.apply(property);
    }

    fn stage3(&mut self, frame: &mut Frame, property: &Property) {
        self.a2.run(frame, PATH_A);
        self.a2.level(frame, PATH_A);
        frame[BALANCE] = self.a2.tube.coefficients().balance;
        self.a2.apply(property);
    }

    fn stage4(&mut self, frame: &mut Frame, property: &Property) {
        self.b1.run(frame, PATH_B);
        self.b1.apply(property);
    }

    fn stage5(&mut self, frame: &mut Frame, property: &Property) {
        self.b2.run(frame, PATH_B);
        self.b2.level(frame, PATH_B);

        let balance = frame[BALANCE];
        for k in 0..RATIO {
            frame[PATH_A + k] = blend(frame[PATH_A + k], frame[PATH_B + k], balance);
        }
        self.downsampler.process(&mut frame[PATH_A..PATH_A + RATIO]);
        self.b2.apply(property);
    }
}

pub const DEFAULT_PRESETS: PresetTable =
    [[8, 8, 8, 8, 8, 8, 50, 50, 8, 8, 8, 8, 8, 8, 50, 50, 0, 0, 0, 0]; PRESET_COUNT];

const LABELS: &[&str] = &[
    "FlexFX Preamp",
    "Drive",
    "Midrange Boost",
    "Bass Cut",
    "Slew Rate",
    "Stage 2 Voice",
    "Stage 3 Voice",
    "Output Volume",
    "Output Balance",
];

/// Properties sent per control cycle: classes 1 to 8 and the master output.
const CYCLE: usize = 9;

/// DC blocker pole for a bass cut position.
fn locut_pole(pos: u8) -> Sample {
    let hz = 5.0 * (pos as f64 + 1.0);
    to_fixed((-2.0 * PI * hz / OVERSAMPLED_RATE).exp())
}

/// Pipeline property number `index` (0-based class) for `preset`.
fn preset_property(preset: &Preset, index: usize) -> Property {
    let class = index as u32 + 1;
    let path = if matches!(class, 4..=6 | 8) {
        &preset[params::PATH_SIZE..2 * params::PATH_SIZE]
    } else {
        &preset[..params::PATH_SIZE]
    };

    let data = match class {
        1 | 4 | 7 | 8 => {
            let voice = if class >= 7 {
                path[params::VOICE_3]
            } else {
                path[params::VOICE_2]
            };
            let mut data =
                nonlinear::voice_parameters(voice, path[params::SLEW], path[params::DRIVE]);
            data[0] = locut_pole(path[params::LOCUT]);
            data
        }
        2 | 5 => nonlinear::emphasis_parameters(path[params::EMPHASIS]),
        _ => {
            let mut data = nonlinear::output_parameters(path[params::VOLUME]);
            data[1] = to_fixed(path[params::BALANCE].min(100) as f64 / 100.0);
            data
        }
    };

    Property::new(class, data)
}

/// Preset protocol, pot-selected presets and coefficient streaming for
/// [`Preamp`].
pub struct PreampControl<F: Flash, P: Pots> {
    protocol: PresetProtocol<F>,
    pots: P,
    quantizer: PotQuantizer,
    next: usize,
}

impl<F: Flash, P: Pots> PreampControl<F, P> {
    pub fn new(flash: F, pots: P) -> Self {
        Self {
            protocol: PresetProtocol::new(flash, DEFAULT_PRESETS, LABELS),
            pots,
            quantizer: PotQuantizer::new(9, 0.03),
            next: 0,
        }
    }

    pub fn protocol(&self) -> &PresetProtocol<F> {
        &self.protocol
    }

    pub fn pots_mut(&mut self) -> &mut P {
        &mut self.pots
    }
}

impl<F: Flash + Send, P: Pots> Control for PreampControl<F, P> {
    fn initialize(&mut self) {
        self.protocol.initialize();
        self.quantizer.init();
    }

    fn control(&mut self, rcv: &Property, snd: &mut Property, dsp: &mut Property) {
        *snd = self.protocol.handle(rcv);
        select_preset(
            &mut self.quantizer,
            self.pots.read(pots::PRESET),
            &mut self.protocol,
        );

        *dsp = if self.next + 1 == CYCLE {
            MasterOutput::property(
                SAMPLE_RATE,
                self.pots.read(pots::VOLUME),
                self.pots.read(pots::TONE),
            )
        } else {
            preset_property(self.protocol.store().active_preset(), self.next)
        };
        self.next = (self.next + 1) % CYCLE;
    }
}
