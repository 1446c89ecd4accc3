//! Dual power amp and cabinet simulator.
//!
//! Stage 1 runs a 4x oversampled power amp stage and a tone stack for each
//! channel. Stages 2 to 5 convolve both channels with a 1248-tap IR, 312 taps
//! per stage. An IR upload (`0x15n1`/`0x15n2`/`0x15n3`) replaces the IR of both
//! channels and is also kept in flash by the control side.
//!
//! Pipeline properties:
//!
//! | Id          | Payload                                              |
//! |-------------|------------------------------------------------------|
//! | `0x10 + ch` | power amp class-1 words (see [`crate::nonlinear`])   |
//! | `0x20 + ch` | tone stack `[b0, b1, b2, b3, -a1]`                   |
//! | `0x30 + ch` | tone stack `[-a2, -a3]`, then output volume          |
//!
//! A tone stack update takes effect when its second half arrives.

use alloc::boxed::Box;

use crate::convolution::{self, Convolver};
use crate::filter::{design, iir3};
use crate::fixed::{mul, q28_to_q31, q31_to_q28, to_fixed, Sample, ONE};
use crate::nonlinear::{self, TubeStage};
use crate::oversampler::Oversampler4x;
use crate::pipeline::{Control, Effect, Frame, MixerIo};
use crate::preset::{Flash, PresetProtocol, PresetTable, PRESET_COUNT};
use crate::property::bulk::{BulkAction, BulkLoader};
use crate::property::{Property, PropertyId, TABLE_BULK};

use super::pseudo_differential;

pub const SAMPLE_RATE: u32 = 48_000;

pub const IR_TAPS: usize = 1248;
pub const IR_PARTS: usize = 4;
pub const IR_UPLOAD_SHIFT: u32 = 5;

pub type AmpConvolver = Convolver<IR_TAPS, IR_PARTS>;

const CHANNELS: usize = 2;

/// Oversampled slots of channel `ch` start at `ch * 4`.
const OVERSAMPLED: [usize; CHANNELS] = [0, 4];

/// Per-channel sample and accumulator slots for the convolution stages.
const SAMPLE: [usize; CHANNELS] = [0, 3];
const ACC: [usize; CHANNELS] = [1, 4];

const AMP_ID: u32 = 0x10;
const STACK_ID: u32 = 0x20;
const STACK_TAIL_ID: u32 = 0x30;

/// Per-channel preset bytes, stored interleaved as `[left, right]` pairs.
pub mod params {
    pub const DRIVE: usize = 0;
    pub const CABINET: usize = 1;
    pub const STACK: usize = 2;
    pub const BASS: usize = 3;
    pub const VOLUME: usize = 4;
    pub const MIDDLE: usize = 5;
    pub const TREBLE: usize = 6;
    pub const SLEW: usize = 7;
    pub const VOICE: usize = 8;
    pub const BALANCE: usize = 9;
}

#[derive(Debug, Clone)]
struct Channel {
    oversampler: Oversampler4x,
    amp: TubeStage,
    stack: [Sample; 7],
    pending_stack: [Sample; 7],
    stack_state: [Sample; 6],
    volume: Sample,
    ir: AmpConvolver,
}

impl Channel {
    fn new() -> Self {
        let flat = design::tonestack(0.5, 0.5, 0.5, 1.0, 1.0, 1.0, SAMPLE_RATE as f64);
        let mut ir = AmpConvolver::new();
        ir.init();

        Self {
            oversampler: Oversampler4x::antialias_4x(),
            amp: TubeStage::new(),
            stack: flat,
            pending_stack: flat,
            stack_state: [0; 6],
            volume: ONE,
            ir,
        }
    }

    #[inline]
    fn power_amp(&mut self, slots: &mut [Sample]) -> Sample {
        self.oversampler.upsample(slots);
        for k in (0..4).rev() {
            slots[k] = self.amp.process(slots[k]);
        }
        self.oversampler.downsample(slots);
        let y = iir3(slots[0], &self.stack, &mut self.stack_state);

        mul(y, self.volume)
    }
}

#[derive(Debug, Clone)]
pub struct AmpSim {
    channels: Box<[Channel; CHANNELS]>,
    loader: BulkLoader<IR_TAPS>,
}

impl Default for AmpSim {
    fn default() -> Self {
        Self::new()
    }
}

impl AmpSim {
    pub fn new() -> Self {
        Self {
            channels: Box::new([Channel::new(), Channel::new()]),
            loader: BulkLoader::new(IR_UPLOAD_SHIFT),
        }
    }

    pub fn is_muted(&self) -> bool {
        self.loader.is_muted()
    }

    pub fn impulse_response(&self, channel: usize) -> Option<&[Sample; IR_TAPS]> {
        self.channels.get(channel).map(|c| c.ir.coefficients())
    }

    fn apply(&mut self, property: &Property) {
        if property.is_empty() {
            return;
        }
        if let BulkAction::Write(write) = self.loader.handle(property) {
            for channel in self.channels.iter_mut() {
                channel.ir.load(write.offset, write.words());
            }
            return;
        }

        let ch = (property.id & 0xF) as usize;
        let Some(channel) = self.channels.get_mut(ch) else {
            return;
        };
        let d = &property.data;
        match property.id & !0xF {
            AMP_ID => channel.amp.set_coefficients(1, d),
            STACK_ID => channel.pending_stack[..5].copy_from_slice(d),
            STACK_TAIL_ID => {
                channel.pending_stack[5] = d[0];
                channel.pending_stack[6] = d[1];
                channel.stack = channel.pending_stack;
                channel.volume = d[2];
            }
            _ => {}
        }
    }

    #[inline]
    fn convolve(&mut self, part: usize, frame: &mut Frame) {
        for (ch, channel) in self.channels.iter_mut().enumerate() {
            channel.ir.process_frame(part, frame, SAMPLE[ch], ACC[ch]);
        }
    }
}

impl Effect for AmpSim {
    fn mixer(&mut self, io: MixerIo<'_>, _property: &Property) {
        let guitar = pseudo_differential(io.adc_output);

        io.dsp_input[OVERSAMPLED[0]] = q31_to_q28(guitar);
        io.dsp_input[OVERSAMPLED[1]] = q31_to_q28(guitar);

        io.usb_input[0] = guitar;
        io.usb_input[1] = guitar;

        io.dac_input[0] = q28_to_q31(io.dsp_output[SAMPLE[0]]);
        io.dac_input[1] = q28_to_q31(io.dsp_output[SAMPLE[1]]);
    }

    fn stage1(&mut self, frame: &mut Frame, property: &Property) {
        self.apply(property);

        let mut outputs = [0; CHANNELS];
        for (ch, channel) in self.channels.iter_mut().enumerate() {
            let start = OVERSAMPLED[ch];
            outputs[ch] = channel.power_amp(&mut frame[start..start + 4]);
        }
        for ch in 0..CHANNELS {
            frame[SAMPLE[ch]] = outputs[ch];
            convolution::begin(frame, ACC[ch]);
        }
    }

    fn stage2(&mut self, frame: &mut Frame, _property: &Property) {
        self.convolve(0, frame);
    }

    fn stage3(&mut self, frame: &mut Frame, _property: &Property) {
        self.convolve(1, frame);
    }

    fn stage4(&mut self, frame: &mut Frame, _property: &Property) {
        self.convolve(2, frame);
    }

    fn stage5(&mut self, frame: &mut Frame, _property: &Property) {
        self.convolve(3, frame);
        let muted = self.loader.is_muted();
        for ch in 0..CHANNELS {
            frame[SAMPLE[ch]] = if muted { 0 } else { convolution::finish(frame, ACC[ch]) };
        }
    }
}

/// Default preset: mid drive, flat stack, half volume.
pub const DEFAULT_PRESETS: PresetTable =
    [[8, 8, 8, 8, 8, 8, 8, 8, 50, 50, 8, 8, 8, 8, 8, 8, 8, 8, 50, 50]; PRESET_COUNT];

const LABELS: &[&str] = &["Dual Ampsim", "Left", "Right"];

/// Properties of one preset, in the order they are sent.
fn preset_properties(preset: &[u8; 20]) -> [Property; 3 * CHANNELS] {
    let mut out = [Property::EMPTY; 3 * CHANNELS];
    for ch in 0..CHANNELS {
        let p = |index: usize| preset[2 * index + ch];
        let pos = |index: usize| p(index).min(15) as f64 / 15.0;

        let stack = design::tonestack(
            pos(params::BASS),
            pos(params::MIDDLE),
            pos(params::TREBLE),
            1.0,
            0.5 + pos(params::STACK),
            1.0,
            SAMPLE_RATE as f64,
        );
        let volume = to_fixed(p(params::VOLUME).min(99) as f64 / 99.0);
        let voice = p(params::VOICE).clamp(1, nonlinear::VOICE_COUNT);

        out[3 * ch] = Property::new(
            AMP_ID + ch as u32,
            nonlinear::voice_parameters(voice, p(params::SLEW), p(params::DRIVE)),
        );
        out[3 * ch + 1] = Property::new(
            STACK_ID + ch as u32,
            [stack[0], stack[1], stack[2], stack[3], stack[4]],
        );
        out[3 * ch + 2] = Property::new(
            STACK_TAIL_ID + ch as u32,
            [stack[5], stack[6], volume, 0, 0],
        );
    }

    out
}

/// Preset handling plus coefficient updates for [`AmpSim`].
pub struct AmpSimControl<F: Flash> {
    protocol: PresetProtocol<F>,
    queue: [Property; 3 * CHANNELS],
    next: usize,
    sent: Option<[u8; 20]>,
}

impl<F: Flash> AmpSimControl<F> {
    pub fn new(flash: F) -> Self {
        Self {
            protocol: PresetProtocol::new(flash, DEFAULT_PRESETS, LABELS),
            queue: [Property::EMPTY; 3 * CHANNELS],
            next: 3 * CHANNELS,
            sent: None,
        }
    }

    pub fn protocol(&self) -> &PresetProtocol<F> {
        &self.protocol
    }
}

impl<F: Flash + Send> Control for AmpSimControl<F> {
    fn initialize(&mut self) {
        self.protocol.initialize();
    }

    fn control(&mut self, rcv: &Property, snd: &mut Property, dsp: &mut Property) {
        *snd = self.protocol.handle(rcv);

        // IR uploads also go live in the pipeline.
        if !rcv.is_empty() && PropertyId(rcv.id).table() == TABLE_BULK {
            *dsp = *rcv;
            return;
        }

        let active = *self.protocol.store().active_preset();
        if self.sent != Some(active) {
            self.sent = Some(active);
            self.queue = preset_properties(&active);
            self.next = 0;
        }
        if let Some(property) = self.queue.get(self.next) {
            *dsp = *property;
            self.next += 1;
        }
    }
}
