//! Modulated delay/flanger.
//!
//! ```text
//!        +-------------------------------------------------------+
//!        |                                                       v
//! in ----+--> long delay --> drive/diffusion --> modulation --+--> blend --> out
//!              ^                                             |
//!              +------------ band-pass <---------------------+
//! ```
//!
//! Stage 1 mixes the feedback return into the input and runs the long delay,
//! which decimates by five so a short line covers most of a second. Stage 2
//! drives and diffuses the repeats, stages 3 and 4 each run a modulated short
//! delay with its own LFO, and stage 5 band-passes the wet signal into the
//! feedback return and blends it into the dry signal. The mixer hands the
//! feedback return from one frame to the next.
//!
//! | Id | Payload                                   |
//! |----|-------------------------------------------|
//! | 1  | `[volume, 0, 0, 0, 0]`                    |
//! | 2  | `[drive, delay time, lfo delta, depth, blend]` |
//! | 3  | `[diffusion, feedback, 0, 0, 0]`          |
//! | 4  | band-pass biquad coefficients             |

use alloc::boxed::Box;

use crate::filter::delay_line::DelayLine;
use crate::filter::tables::{self, Table};
use crate::filter::{blend, design, iir1, iir2, lagrange, BiquadCoefficients, BiquadState, BIQUAD_IDENTITY};
use crate::fixed::{mul, q28_to_q31, q31_to_q28, to_fixed, Sample, HALF, ONE};
use crate::oversampler::{quantize, windowed_sinc, Downsampler, Upsampler};
use crate::pipeline::{Control, Effect, Frame, MixerIo};
use crate::preset::{Flash, Preset, PresetProtocol, PresetTable, PRESET_COUNT};
use crate::property::Property;

pub const SAMPLE_RATE: u32 = 192_000;

/// Rate reduction of the long delay line.
pub const DECIMATION: usize = 5;

/// Long delay length in decimated samples (about 0.85 s).
pub const LONG_DELAY: usize = 32768;

/// Length of each modulated delay line.
pub const MOD_DELAY: usize = 1024;

const FIR_TAPS: usize = 80;
const FIR_PHASE_TAPS: usize = FIR_TAPS / DECIMATION;

/// Anti-alias cutoff around the decimation, in cycles per sample.
const FIR_CUTOFF: f64 = 0.08;

pub const VOLUME_ID: u32 = 1;
pub const TIME_ID: u32 = 2;
pub const REGEN_ID: u32 = 3;
pub const FILTER_ID: u32 = 4;

const DRY: usize = 0;
const DELAYED: usize = 1;
const WET_1: usize = 2;
const WET_2: usize = 3;

/// Share of the feedback setting that is actually fed back.
const FEEDBACK_LIMIT: f64 = 0.8;

/// The second modulator runs at the first one's rate divided by e.
const ONE_OVER_E: f64 = 0.367_879_441_171_442_3;

/// Delay line running at a fifth of the sample rate.
///
/// Samples are collected in blocks of [`DECIMATION`]. Each full block is
/// decimated into the line, and the tap read back is interpolated into the
/// next block of output.
#[derive(Debug, Clone)]
pub struct LongDelay {
    down: Downsampler<FIR_TAPS, DECIMATION>,
    up: Upsampler<FIR_PHASE_TAPS, DECIMATION>,
    /// Input block, slot `DECIMATION - 1` oldest.
    block: [Sample; DECIMATION],
    /// Output block, slot `DECIMATION - 1` oldest.
    output: [Sample; DECIMATION],
    phase: usize,
    count: usize,
    line: Box<DelayLine<LONG_DELAY>>,
}

impl Default for LongDelay {
    fn default() -> Self {
        Self::new()
    }
}

impl LongDelay {
    pub fn new() -> Self {
        let fir = quantize(&windowed_sinc::<FIR_TAPS>(FIR_CUTOFF));

        Self {
            down: Downsampler::new(&fir),
            up: Upsampler::new(&fir),
            block: [0; DECIMATION],
            output: [0; DECIMATION],
            phase: 0,
            count: LONG_DELAY / 4,
            line: Box::new(DelayLine::new()),
        }
    }

    pub fn reset(&mut self) {
        self.down.reset();
        self.up.reset();
        self.block = [0; DECIMATION];
        self.output = [0; DECIMATION];
        self.phase = 0;
        self.line.reset();
    }

    /// Delay in decimated samples.
    pub fn count(&self) -> usize {
        self.count
    }

    /// `time` is a Q28 fraction of [`LONG_DELAY`].
    pub fn set_time(&mut self, time: Sample) {
        self.count = ((time.max(0) >> 13) as usize).clamp(1, LONG_DELAY - 1);
    }

    #[inline]
    pub fn process(&mut self, x: Sample) -> Sample {
        let slot = DECIMATION - 1 - self.phase;
        let y = self.output[slot];
        self.block[slot] = x;

        self.phase += 1;
        if self.phase == DECIMATION {
            self.phase = 0;

            let mut block = self.block;
            self.down.process(&mut block);
            self.line.write(block[0]);

            let mut output = [0; DECIMATION];
            output[0] = self.line.read(self.count);
            self.up.process(&mut output);
            self.output = output;
        }

        y
    }
}

/// Soft-clipping drive followed by a first-order allpass.
#[derive(Debug, Clone)]
struct Color {
    drive: Sample,
    diffusion: Sample,
    allpass: [Sample; 2],
    table: &'static Table,
}

impl Color {
    fn new() -> Self {
        Self {
            drive: 0,
            diffusion: 0,
            allpass: [0; 2],
            table: tables::tanh(),
        }
    }

    #[inline]
    fn process(&mut self, x: Sample) -> Sample {
        let driven = if self.drive == 0 {
            x
        } else {
            tables::lookup_tanh_scaled(self.table, x, ONE + 3 * self.drive.clamp(0, ONE))
        };
        if self.diffusion == 0 {
            return driven;
        }

        let a = mul(self.diffusion, to_fixed(0.7));
        iir1(driven, &[-a, ONE, a], &mut self.allpass)
    }
}

/// Short delay whose tap follows a sine LFO.
#[derive(Debug, Clone)]
pub struct Modulator {
    phase: Sample,
    delta: Sample,
    depth: Sample,
    divisor: i32,
    sine: &'static Table,
    line: DelayLine<MOD_DELAY>,
}

impl Modulator {
    /// The tap swings around `depth / divisor` of the line.
    pub fn new(divisor: i32) -> Self {
        Self {
            phase: 0,
            delta: 0,
            depth: 0,
            divisor: divisor.max(1),
            sine: tables::sine(),
            line: DelayLine::new(),
        }
    }

    pub fn reset(&mut self) {
        self.phase = 0;
        self.line.reset();
    }

    pub fn set(&mut self, delta: Sample, depth: Sample) {
        self.delta = delta;
        self.depth = depth;
    }

    #[inline]
    pub fn process(&mut self, x: Sample) -> Sample {
        self.phase += self.delta;
        if self.phase > ONE {
            self.phase -= ONE;
        }
        let (i, f) = tables::phase_index(self.phase);
        let lfo = lagrange(f, self.sine[i], self.sine[i + 1], self.sine[i + 2]);
        let lfo = mul(lfo, to_fixed(0.999));

        self.line.write(x);
        let center = self.depth / self.divisor;
        let (delay, frac) = tables::phase_index(mul(lfo, center) / 2 + center);

        self.line.read_lagrange(delay + 1, frac)
    }
}

#[derive(Debug, Clone)]
pub struct Delay {
    feedback: Sample,
    long: LongDelay,
    color: Color,
    first: Modulator,
    second: Modulator,
    filter: BiquadCoefficients,
    filter_state: BiquadState,
    blend: Sample,
    volume: Sample,
}

impl Default for Delay {
    fn default() -> Self {
        Self::new()
    }
}

impl Delay {
    pub fn new() -> Self {
        let mut delay = Self {
            feedback: 0,
            long: LongDelay::new(),
            color: Color::new(),
            first: Modulator::new(2),
            second: Modulator::new(6),
            filter: BIQUAD_IDENTITY,
            filter_state: [0; 4],
            blend: HALF,
            volume: ONE,
        };
        let rate = to_fixed(0.000_006_5);
        let depth = to_fixed(0.3);
        delay.first.set(rate, depth);
        delay.second.set(mul(rate, to_fixed(ONE_OVER_E)), depth);

        delay
    }

    pub fn long_delay(&self) -> &LongDelay {
        &self.long
    }

    pub fn feedback(&self) -> Sample {
        self.feedback
    }

    pub fn volume(&self) -> Sample {
        self.volume
    }
}

impl Effect for Delay {
    fn initialize(&mut self) {
        self.long.reset();
        self.first.reset();
        self.second.reset();
        self.color.allpass = [0; 2];
        self.filter_state = [0; 4];
    }

    fn mixer(&mut self, io: MixerIo<'_>, _property: &Property) {
        io.dsp_input[DRY] = q31_to_q28(io.adc_output[0]);
        io.dsp_input[DELAYED] = io.dsp_output[DELAYED];
        io.usb_input[0] = io.adc_output[0];

        let y = q28_to_q31(io.dsp_output[DRY]);
        io.usb_input[1] = y;
        for ch in 0..2 {
            io.dac_input[ch] = y / 2 + io.usb_output[ch] / 2;
        }
    }

    fn stage1(&mut self, frame: &mut Frame, property: &Property) {
        let regenerated = mul(frame[DELAYED], mul(self.feedback, to_fixed(FEEDBACK_LIMIT)));
        frame[DELAYED] = self.long.process(frame[DRY].saturating_add(regenerated));

        match property.id {
            TIME_ID => self.long.set_time(property.data[1]),
            REGEN_ID => self.feedback = property.data[1],
            _ => {}
        }
    }

    fn stage2(&mut self, frame: &mut Frame, property: &Property) {
        frame[DELAYED] = self.color.process(frame[DELAYED]);

        match property.id {
            TIME_ID => self.color.drive = property.data[0],
            REGEN_ID => self.color.diffusion = property.data[0],
            _ => {}
        }
    }

    fn stage3(&mut self, frame: &mut Frame, property: &Property) {
        frame[WET_1] = self.first.process(frame[DELAYED]);

        if property.id == TIME_ID {
            self.first.set(property.data[2], property.data[3]);
        }
    }

    fn stage4(&mut self, frame: &mut Frame, property: &Property) {
        frame[WET_2] = self.second.process(frame[DELAYED]);

        if property.id == TIME_ID {
            let rate = mul(property.data[2], to_fixed(ONE_OVER_E));
            self.second.set(rate, property.data[3]);
        }
    }

    fn stage5(&mut self, frame: &mut Frame, property: &Property) {
        let wet = mul(frame[WET_1], to_fixed(0.75)).saturating_add(mul(frame[WET_2], to_fixed(0.25)));
        frame[DELAYED] = iir2(wet, &self.filter, &mut self.filter_state);
        frame[DRY] = mul(blend(frame[DRY], wet, self.blend / 2), self.volume);

        let d = &property.data;
        match property.id {
            VOLUME_ID => self.volume = d[0],
            TIME_ID => self.blend = d[4],
            FILTER_ID => self.filter = *d,
            _ => {}
        }
    }
}

/// Preset byte offsets; every parameter is a percentage `0..=100`.
pub mod params {
    pub const DRIVE: usize = 0;
    pub const RANGE: usize = 1;
    pub const TIME: usize = 2;
    pub const RATE: usize = 3;
    pub const DEPTH: usize = 4;
    pub const FILTER_FREQ: usize = 5;
    pub const FILTER_Q: usize = 6;
    pub const DIFFUSION: usize = 7;
    pub const FEEDBACK: usize = 8;
    pub const MIX: usize = 9;
    pub const VOLUME: usize = 10;
}

pub const DEFAULT_PRESETS: PresetTable = [[
    0, 50, 50, 30, 30, 50, 50, 20, 40, 40, 80, 0, 0, 0, 0, 0, 0, 0, 0, 0,
]; PRESET_COUNT];

const LABELS: &[&str] = &[
    "FlexFX Delay",
    "Input Drive",
    "Delay (Range)",
    "Delay (Time)",
    "LFO Rate",
    "LFO Depth",
    "Filter Freq",
    "Filter Q",
    "Diffusion",
    "Feedback",
    "Dry/Wet Mix",
    "Output Volume",
];

/// Pipeline property `id` (1..=4) for `preset`.
pub fn preset_property(preset: &Preset, id: u32) -> Property {
    let p = |index: usize| preset[index].min(100) as f64 / 100.0;

    let data = match id {
        VOLUME_ID => [to_fixed(0.25 + 0.75 * p(params::VOLUME)), 0, 0, 0, 0],
        TIME_ID => [
            to_fixed(p(params::DRIVE)),
            to_fixed(p(params::RANGE) * p(params::TIME)),
            to_fixed(0.000_000_5 + p(params::RATE) * 0.000_02),
            to_fixed(p(params::DEPTH)),
            to_fixed(p(params::MIX)),
        ],
        REGEN_ID => [to_fixed(p(params::DIFFUSION)), to_fixed(p(params::FEEDBACK)), 0, 0, 0],
        FILTER_ID => design::bandpass_q(
            0.001 + p(params::FILTER_FREQ) * 0.01,
            0.1 + p(params::FILTER_Q) * 0.9,
        ),
        _ => return Property::EMPTY,
    };

    Property::new(id, data)
}

/// Preset protocol and property streaming for [`Delay`].
pub struct DelayControl<F: Flash> {
    protocol: PresetProtocol<F>,
    next: u32,
}

impl<F: Flash> DelayControl<F> {
    pub fn new(flash: F) -> Self {
        Self {
            protocol: PresetProtocol::new(flash, DEFAULT_PRESETS, LABELS),
            next: VOLUME_ID,
        }
    }

    pub fn protocol(&self) -> &PresetProtocol<F> {
        &self.protocol
    }
}

impl<F: Flash + Send> Control for DelayControl<F> {
    fn initialize(&mut self) {
        self.protocol.initialize();
    }

    fn control(&mut self, rcv: &Property, snd: &mut Property, dsp: &mut Property) {
        *snd = self.protocol.handle(rcv);

        *dsp = preset_property(self.protocol.store().active_preset(), self.next);
        self.next = if self.next == FILTER_ID {
            VOLUME_ID
        } else {
            self.next + 1
        };
    }
}
