//! Stereo chorus/flanger.
//!
//! Each channel reads a modulated tap from its own delay line. The tap
//! position follows a sine LFO: the LFO value is scaled by the depth, shifted
//! into `[0, 1)` and split into a whole-sample delay (the upper ten bits) and a
//! fractional part used for Lagrange interpolation. Part of the wet signal is
//! fed back into the delay line through a treble cut and a bass cut, which
//! turns the chorus into a flanger as the feedback rises. The left voice runs
//! in stage 1, the right voice in stage 3, and stage 5 blends wet into dry and
//! applies the channel volume.
//!
//! | Id            | Payload                                      | Stage  |
//! |---------------|----------------------------------------------|--------|
//! | `0x10 + ch`   | `[lfo delta, depth, feedback, locut pole, 0]`| 1 or 3 |
//! | `0x20 + ch`   | `[b0, b1, -a1, 0, 0]` treble cut             | 1 or 3 |
//! | `0x30 + ch`   | `[mix, volume, 0, 0, 0]`                     | 5      |
//! | [`MASTER_ID`](super::MASTER_ID) | master volume and tone     | mixer  |

#[allow(unused_imports)]
use num_traits::float::Float;

use core::f64::consts::PI;

use crate::filter::delay_line::DelayLine;
use crate::filter::tables::{self, Table};
use crate::filter::{blend, design, iir1, lagrange, DcBlocker};
use crate::fixed::{mul, q28_to_q31, q31_to_q28, to_fixed, Sample, ONE};
use crate::pipeline::{Control, Effect, Frame, MixerIo};
use crate::preset::{Flash, Preset, PresetProtocol, PresetTable, PRESET_COUNT};
use crate::property::Property;
use crate::utils::PotQuantizer;

use super::{select_preset, MasterOutput, Pots};

pub const SAMPLE_RATE: u32 = 192_000;

/// Delay line length per channel.
pub const MAX_DELAY: usize = 8192;

/// LFO rates in Hz until a preset arrives.
pub const RATE_LEFT: f64 = 3.3;
pub const RATE_RIGHT: f64 = 1.5;

pub const DEFAULT_DEPTH: f64 = 0.1;
pub const DEFAULT_MIX: f64 = 0.3;

/// Pole of the feedback bass cut until a preset arrives.
pub const DEFAULT_LOCUT_POLE: f64 = 0.999;

pub const VOICE_ID: u32 = 0x10;
pub const DAMPING_ID: u32 = 0x20;
pub const OUTPUT_ID: u32 = 0x30;

const LEFT: usize = 0;
const RIGHT: usize = 1;
const WET_LEFT: usize = 2;
const WET_RIGHT: usize = 3;

/// Sine LFO, modulated delay and feedback path for one channel.
#[derive(Debug, Clone)]
pub struct ChorusVoice {
    phase: Sample,
    delta: Sample,
    depth: Sample,
    feedback: Sample,
    hicut: [Sample; 3],
    hicut_state: [Sample; 2],
    locut: DcBlocker,
    last: Sample,
    sine: &'static Table,
    delay: DelayLine<MAX_DELAY>,
}

impl ChorusVoice {
    /// `rate` in Hz, `depth` in `[0, 1]`. Starts without feedback.
    pub fn new(rate: f64, depth: f64) -> Self {
        let mut locut = DcBlocker::new();
        locut.init(to_fixed(DEFAULT_LOCUT_POLE));

        Self {
            phase: 0,
            delta: to_fixed(rate / SAMPLE_RATE as f64),
            depth: to_fixed(depth),
            feedback: 0,
            hicut: [ONE, 0, 0],
            hicut_state: [0; 2],
            locut,
            last: 0,
            sine: tables::sine(),
            delay: DelayLine::new(),
        }
    }

    pub fn reset(&mut self) {
        self.phase = 0;
        self.last = 0;
        self.hicut_state = [0; 2];
        self.locut.init(to_fixed(DEFAULT_LOCUT_POLE));
        self.delay.reset();
    }

    /// LFO phase increment per sample.
    pub fn delta(&self) -> Sample {
        self.delta
    }

    pub fn feedback(&self) -> Sample {
        self.feedback
    }

    pub fn depth(&self) -> Sample {
        self.depth
    }

    /// Takes a `VOICE_ID` payload.
    pub fn set_modulation(&mut self, data: &[Sample; 5]) {
        self.delta = data[0];
        self.depth = data[1];
        self.feedback = data[2];
        self.locut.set_pole(data[3]);
    }

    /// Takes a `DAMPING_ID` payload.
    pub fn set_damping(&mut self, data: &[Sample; 5]) {
        self.hicut = [data[0], data[1], data[2]];
    }

    #[inline]
    fn lfo(&mut self) -> Sample {
        self.phase += self.delta;
        if self.phase > ONE {
            self.phase -= ONE;
        }
        let (i, f) = tables::phase_index(self.phase);

        lagrange(f, self.sine[i], self.sine[i + 1], self.sine[i + 2])
    }

    #[inline]
    pub fn process(&mut self, x: Sample) -> Sample {
        let sine = self.lfo();
        let position = mul(sine, self.depth) / 2 + to_fixed(0.4999);
        let (delay, frac) = tables::phase_index(position);

        let damped = iir1(self.last, &self.hicut, &mut self.hicut_state);
        let regenerated = mul(self.locut.process(damped), self.feedback);

        self.delay.write(x.saturating_add(regenerated));
        self.last = self.delay.read_lagrange(delay + 1, frac);
        self.last
    }
}

#[derive(Debug, Clone)]
pub struct Chorus {
    left: ChorusVoice,
    right: ChorusVoice,
    mix: [Sample; 2],
    volume: [Sample; 2],
    master: MasterOutput,
}

impl Default for Chorus {
    fn default() -> Self {
        Self::new()
    }
}

impl Chorus {
    pub fn new() -> Self {
        Self {
            left: ChorusVoice::new(RATE_LEFT, DEFAULT_DEPTH),
            right: ChorusVoice::new(RATE_RIGHT, DEFAULT_DEPTH),
            mix: [to_fixed(DEFAULT_MIX); 2],
            volume: [ONE; 2],
            master: MasterOutput::new(),
        }
    }

    pub fn voice(&self, channel: usize) -> Option<&ChorusVoice> {
        match channel {
            LEFT => Some(&self.left),
            RIGHT => Some(&self.right),
            _ => None,
        }
    }

    pub fn mix(&self, channel: usize) -> Option<Sample> {
        self.mix.get(channel).copied()
    }

    pub fn volume(&self, channel: usize) -> Option<Sample> {
        self.volume.get(channel).copied()
    }

    fn apply_voice(voice: &mut ChorusVoice, channel: usize, property: &Property) {
        let ch = channel as u32;
        if property.id == VOICE_ID + ch {
            voice.set_modulation(&property.data);
        } else if property.id == DAMPING_ID + ch {
            voice.set_damping(&property.data);
        }
    }
}

impl Effect for Chorus {
    fn initialize(&mut self) {
        self.left.reset();
        self.right.reset();
    }

    fn mixer(&mut self, io: MixerIo<'_>, property: &Property) {
        self.master.apply(property);

        for ch in [LEFT, RIGHT] {
            io.dsp_input[ch] = q31_to_q28(io.adc_output[ch]);
            io.usb_input[ch] = io.adc_output[ch];

            let y = q28_to_q31(self.master.process(ch, io.dsp_output[ch]));
            io.dac_input[ch] = y / 2 + io.usb_output[ch] / 2;
        }
    }

    fn stage1(&mut self, frame: &mut Frame, property: &Property) {
        frame[WET_LEFT] = self.left.process(frame[LEFT]);
        Self::apply_voice(&mut self.left, LEFT, property);
    }

    fn stage2(&mut self, _frame: &mut Frame, _property: &Property) {}

    fn stage3(&mut self, frame: &mut Frame, property: &Property) {
        frame[WET_RIGHT] = self.right.process(frame[RIGHT]);
        Self::apply_voice(&mut self.right, RIGHT, property);
    }

    fn stage4(&mut self, _frame: &mut Frame, _property: &Property) {}

    fn stage5(&mut self, frame: &mut Frame, property: &Property) {
        for (ch, wet) in [(LEFT, WET_LEFT), (RIGHT, WET_RIGHT)] {
            let y = blend(frame[ch], frame[wet], self.mix[ch]);
            frame[ch] = mul(y, self.volume[ch]);
        }

        let ch = property.id.wrapping_sub(OUTPUT_ID) as usize;
        if property.id & !0xF == OUTPUT_ID && ch < 2 {
            self.mix[ch] = property.data[0];
            self.volume[ch] = property.data[1];
        }
    }
}

/// Preset byte pairs `[left, right]`; parameter `p` of channel `ch` lives at
/// byte `2 * p + ch`. Positions run `0..=15`, volume and balance `0..=99`.
pub mod params {
    pub const MIX: usize = 0;
    pub const FEEDBACK: usize = 1;
    pub const RATE: usize = 2;
    pub const DEPTH: usize = 3;
    pub const VOLUME: usize = 4;
    pub const HICUT: usize = 5;
    pub const LOCUT: usize = 6;
    /// Reserved.
    pub const BALANCE: usize = 9;
}

/// Pot assignments.
pub mod pots {
    pub const VOLUME: usize = 0;
    pub const TONE: usize = 1;
    pub const PRESET: usize = 2;
}

pub const DEFAULT_PRESETS: PresetTable = [[
    8, 8, 8, 8, 8, 8, 8, 8, 50, 50, 8, 8, 8, 8, 8, 8, 8, 8, 50, 50,
]; PRESET_COUNT];

const LABELS: &[&str] = &[
    "FlexFX Chorus",
    "Wet/Dry Blend",
    "Feedback Ratio",
    "Modulation Rate",
    "Modulation Depth",
    "Output Volume",
    "Feedback Treble Cut",
    "Feedback Bass Cut",
];

/// Properties per control cycle: three per channel and the master output.
const CYCLE: usize = 7;

/// Pipeline properties of one channel of `preset`: voice, damping, output.
pub fn channel_properties(preset: &Preset, channel: usize) -> [Property; 3] {
    let ch = channel & 1;
    let byte = |p: usize| preset[2 * p + ch];
    let pos = |p: usize| byte(p).min(15) as f64 / 15.0;
    let fs = SAMPLE_RATE as f64;

    let rate = 0.1 + pos(params::RATE) * 4.9;
    let locut_hz = 20.0 + pos(params::LOCUT) * 480.0;
    let voice = [
        to_fixed(rate / fs),
        to_fixed(pos(params::DEPTH) * 0.2),
        to_fixed(pos(params::FEEDBACK) * 0.9),
        to_fixed((-2.0 * PI * locut_hz / fs).exp()),
        0,
    ];

    let [b0, b1, a1] = design::lowpass1((1000.0 + pos(params::HICUT) * 15000.0) / fs);
    let volume = byte(params::VOLUME).min(99) as f64 / 50.0;

    let ch = ch as u32;
    [
        Property::new(VOICE_ID + ch, voice),
        Property::new(DAMPING_ID + ch, [b0, b1, a1, 0, 0]),
        Property::new(
            OUTPUT_ID + ch,
            [to_fixed(pos(params::MIX)), to_fixed(volume), 0, 0, 0],
        ),
    ]
}

/// Preset protocol, pot-selected presets and property streaming for
/// [`Chorus`].
pub struct ChorusControl<F: Flash, P: Pots> {
    protocol: PresetProtocol<F>,
    pots: P,
    quantizer: PotQuantizer,
    next: usize,
}

impl<F: Flash, P: Pots> ChorusControl<F, P> {
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

impl<F: Flash + Send, P: Pots> Control for ChorusControl<F, P> {
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
            let preset = self.protocol.store().active_preset();
            channel_properties(preset, self.next / 3)[self.next % 3]
        };
        self.next = (self.next + 1) % CYCLE;
    }
}
