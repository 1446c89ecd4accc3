//! Stereo cabinet simulator.
//!
//! Two 1200-tap impulse responses, one per output channel, both fed from the
//! pseudo-differential instrument input. Each stage evaluates 240 taps per
//! channel. The IR table is uploaded from the host with `0x1501` (begin),
//! `0x1502` (five words, scaled down by 32) and `0x1503` (end); the left IR
//! occupies words `0..1200` of the upload and the right IR words `1200..2400`.
//! Output is muted while an upload is in progress.

use crate::convolution::{self, Convolver};
use crate::fixed::{q28_to_q31, q31_to_q28, Sample};
use crate::pipeline::{Control, Effect, Frame, MixerIo};
use crate::property::bulk::{BulkAction, BulkLoader};
use crate::property::Property;

use super::pseudo_differential;

pub const SAMPLE_RATE: u32 = 48_000;

/// Taps per channel.
pub const IR_TAPS: usize = 1200;

/// Stages sharing the convolution.
pub const IR_PARTS: usize = 5;

/// Uploaded words are divided by `2^IR_UPLOAD_SHIFT`.
pub const IR_UPLOAD_SHIFT: u32 = 5;

pub type CabConvolver = Convolver<IR_TAPS, IR_PARTS>;

const LEFT: usize = 0;
const RIGHT: usize = 1;
const ACC_LEFT: usize = 2;
const ACC_RIGHT: usize = 4;

#[derive(Debug, Clone)]
pub struct CabSim {
    left: CabConvolver,
    right: CabConvolver,
    loader: BulkLoader<{ 2 * IR_TAPS }>,
}

impl Default for CabSim {
    fn default() -> Self {
        Self::new()
    }
}

impl CabSim {
    /// Starts with unit impulses, so audio passes unchanged.
    pub fn new() -> Self {
        let mut cabsim = Self {
            left: CabConvolver::new(),
            right: CabConvolver::new(),
            loader: BulkLoader::new(IR_UPLOAD_SHIFT),
        };
        cabsim.left.init();
        cabsim.right.init();

        cabsim
    }

    /// Loads the same IR into both channels without scaling.
    pub fn load_impulse_response(&mut self, taps: &[Sample]) {
        self.left.set_coefficients(taps);
        self.right.set_coefficients(taps);
    }

    pub fn left(&self) -> &CabConvolver {
        &self.left
    }

    pub fn right(&self) -> &CabConvolver {
        &self.right
    }

    pub fn is_muted(&self) -> bool {
        self.loader.is_muted()
    }

    fn apply(&mut self, property: &Property) {
        if let BulkAction::Write(write) = self.loader.handle(property) {
            for (i, word) in write.words().iter().enumerate() {
                let offset = write.offset + i;
                if offset < IR_TAPS {
                    self.left.load(offset, &[*word]);
                } else {
                    self.right.load(offset - IR_TAPS, &[*word]);
                }
            }
        }
    }

    #[inline]
    fn convolve(&mut self, part: usize, frame: &mut Frame) {
        self.left.process_frame(part, frame, LEFT, ACC_LEFT);
        self.right.process_frame(part, frame, RIGHT, ACC_RIGHT);
    }
}

impl Effect for CabSim {
    fn initialize(&mut self) {
        self.left.reset();
        self.right.reset();
    }

    fn mixer(&mut self, io: MixerIo<'_>, _property: &Property) {
        let guitar = pseudo_differential(io.adc_output);

        io.dsp_input[LEFT] = q31_to_q28(guitar);
        io.dsp_input[RIGHT] = q31_to_q28(guitar);

        io.usb_input[0] = guitar;
        io.usb_input[1] = q28_to_q31(io.dsp_output[LEFT]);

        io.dac_input[0] = q28_to_q31(io.dsp_output[LEFT]) / 2 + io.usb_output[0] / 2;
        io.dac_input[1] = q28_to_q31(io.dsp_output[RIGHT]) / 2 + io.usb_output[1] / 2;
    }

    fn stage1(&mut self, frame: &mut Frame, property: &Property) {
        self.apply(property);
        convolution::begin(frame, ACC_LEFT);
        convolution::begin(frame, ACC_RIGHT);
        self.convolve(0, frame);
    }

    fn stage2(&mut self, frame: &mut Frame, _property: &Property) {
        self.convolve(1, frame);
    }

    fn stage3(&mut self, frame: &mut Frame, _property: &Property) {
        self.convolve(2, frame);
    }

    fn stage4(&mut self, frame: &mut Frame, _property: &Property) {
        self.convolve(3, frame);
    }

    fn stage5(&mut self, frame: &mut Frame, _property: &Property) {
        self.convolve(4, frame);
        let muted = self.loader.is_muted();
        frame[LEFT] = if muted { 0 } else { convolution::finish(frame, ACC_LEFT) };
        frame[RIGHT] = if muted { 0 } else { convolution::finish(frame, ACC_RIGHT) };
    }
}

/// Passes host properties straight to the pipeline.
#[derive(Debug, Default)]
pub struct CabSimControl;

impl CabSimControl {
    pub fn new() -> Self {
        Self
    }
}

impl Control for CabSimControl {
    fn control(&mut self, rcv: &Property, _snd: &mut Property, dsp: &mut Property) {
        if !rcv.is_empty() {
            log::trace!("forwarding property {:#x}", rcv.id);
        }
        *dsp = *rcv;
    }
}
