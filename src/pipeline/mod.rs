//! Five-stage audio pipeline.
//!
//! Every audio tick the mixer exchanges samples with the device, then the five
//! stages each process one frame. A frame entering stage 1 on tick `t` reaches
//! stage 5 on tick `t + 4` and is handed to the mixer on tick `t + 5`, so the
//! pipeline delays every effect by exactly [`LATENCY`] samples.
//!
//! The property taken from the control mailbox on a tick is attached to the
//! frame that enters stage 1 and travels with it, so every stage observes a
//! given property exactly once.

pub mod device;

use alloc::boxed::Box;

use dyn_clone::DynClone;

use crate::fixed::Sample;
use crate::property::{Mailbox, Property};

pub use device::{Device, CONTROL_RATE};

/// Slots per frame.
pub const FRAME_SIZE: usize = 32;

/// Number of pipeline stages.
pub const STAGE_COUNT: usize = 5;

/// Pipeline delay in audio ticks.
pub const LATENCY: usize = STAGE_COUNT;

/// Sample routing scratchpad handed from stage to stage.
pub type Frame = [Sample; FRAME_SIZE];

/// Device-side frames seen by the mixer. USB and ADC/DAC frames are Q31, DSP
/// frames are Q28.
pub struct MixerIo<'a> {
    /// Audio from the host.
    pub usb_output: &'a Frame,
    /// Audio to the host.
    pub usb_input: &'a mut Frame,
    /// Samples from the ADC.
    pub adc_output: &'a Frame,
    /// Samples to the DAC.
    pub dac_input: &'a mut Frame,
    /// Output of stage 5.
    pub dsp_output: &'a Frame,
    /// Input of stage 1.
    pub dsp_input: &'a mut Frame,
}

/// Audio-domain half of an effect.
///
/// Stage and mixer methods must not block, allocate or fail.
pub trait Effect: Send + DynClone {
    /// Called once before the first tick.
    fn initialize(&mut self) {}

    fn mixer(&mut self, io: MixerIo<'_>, property: &Property);

    fn stage1(&mut self, frame: &mut Frame, property: &Property);
    fn stage2(&mut self, frame: &mut Frame, property: &Property);
    fn stage3(&mut self, frame: &mut Frame, property: &Property);
    fn stage4(&mut self, frame: &mut Frame, property: &Property);
    fn stage5(&mut self, frame: &mut Frame, property: &Property);
}

dyn_clone::clone_trait_object!(Effect);

/// Control-domain half of an effect, run at [`CONTROL_RATE`].
pub trait Control: Send {
    /// Called once before the first control tick.
    fn initialize(&mut self) {}

    /// Handles the host property `rcv`. A reply for the host goes into `snd`,
    /// a property for the pipeline into `dsp`; both start out empty.
    fn control(&mut self, rcv: &Property, snd: &mut Property, dsp: &mut Property);
}

/// Frames produced by the mixer on one tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceOutput {
    pub usb_input: Frame,
    pub dac_input: Frame,
}

impl Default for DeviceOutput {
    fn default() -> Self {
        Self {
            usb_input: [0; FRAME_SIZE],
            dac_input: [0; FRAME_SIZE],
        }
    }
}

#[derive(Debug, Clone)]
struct InFlight {
    frame: Frame,
    property: Property,
}

impl Default for InFlight {
    fn default() -> Self {
        Self {
            frame: [0; FRAME_SIZE],
            property: Property::EMPTY,
        }
    }
}

pub struct Pipeline<E: Effect + ?Sized> {
    effect: Box<E>,
    /// `in_flight[k]` holds the output of stage `k + 1` from the last tick.
    in_flight: [InFlight; STAGE_COUNT],
    ticks: u64,
}

impl<E: Effect + ?Sized> Clone for Pipeline<E>
where
    Box<E>: Clone,
{
    fn clone(&self) -> Self {
        Self {
            effect: self.effect.clone(),
            in_flight: self.in_flight.clone(),
            ticks: self.ticks,
        }
    }
}

impl<E: Effect + ?Sized> Pipeline<E> {
    pub fn new(effect: Box<E>) -> Self {
        Self {
            effect,
            in_flight: Default::default(),
            ticks: 0,
        }
    }

    pub fn initialize(&mut self) {
        self.effect.initialize();
    }

    /// Drops every in-flight frame.
    pub fn flush(&mut self) {
        self.in_flight = Default::default();
    }

    pub fn effect(&self) -> &E {
        &self.effect
    }

    pub fn effect_mut(&mut self) -> &mut E {
        &mut self.effect
    }

    /// Audio ticks run so far.
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Runs one audio tick.
    pub fn tick(
        &mut self,
        mailbox: &Mailbox,
        usb_output: &Frame,
        adc_output: &Frame,
    ) -> DeviceOutput {
        let property = mailbox.take();
        let mut output = DeviceOutput::default();
        let mut dsp_input = [0; FRAME_SIZE];
        let dsp_output = self.in_flight[STAGE_COUNT - 1].frame;

        self.effect.mixer(
            MixerIo {
                usb_output,
                usb_input: &mut output.usb_input,
                adc_output,
                dac_input: &mut output.dac_input,
                dsp_output: &dsp_output,
                dsp_input: &mut dsp_input,
            },
            &property,
        );

        // Later stages first, so each one consumes its predecessor's output
        // from the previous tick.
        for k in (1..STAGE_COUNT).rev() {
            self.in_flight[k] = self.in_flight[k - 1].clone();
            let InFlight { frame, property } = &mut self.in_flight[k];
            run_stage(&mut *self.effect, k, frame, property);
        }
        self.in_flight[0] = InFlight {
            frame: dsp_input,
            property,
        };
        let InFlight { frame, property } = &mut self.in_flight[0];
        run_stage(&mut *self.effect, 0, frame, property);

        self.ticks += 1;

        output
    }
}

#[inline]
fn run_stage<E: Effect + ?Sized>(
    effect: &mut E,
    index: usize,
    frame: &mut Frame,
    property: &Property,
) {
    match index {
        0 => effect.stage1(frame, property),
        1 => effect.stage2(frame, property),
        2 => effect.stage3(frame, property),
        3 => effect.stage4(frame, property),
        _ => effect.stage5(frame, property),
    }
}
