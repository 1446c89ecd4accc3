//! Host-side model of the two scheduling domains.
//!
//! The control domain runs every `sample_rate / CONTROL_RATE` audio ticks.
//! Host, control and pipeline only talk through [`Mailbox`]es.

use alloc::boxed::Box;

use crate::property::{Mailbox, Property};

use super::{Control, DeviceOutput, Effect, Frame, Pipeline};

/// Control domain tick rate in Hz.
pub const CONTROL_RATE: u32 = 1000;

pub struct Device<C: Control + ?Sized, E: Effect + ?Sized> {
    control: Box<C>,
    pipeline: Pipeline<E>,
    host_to_control: Mailbox,
    control_to_host: Mailbox,
    control_to_pipeline: Mailbox,
    ticks_per_control: u64,
}

impl<C: Control + ?Sized, E: Effect + ?Sized> Device<C, E> {
    pub fn new(control: Box<C>, effect: Box<E>, sample_rate: u32) -> Self {
        Self {
            control,
            pipeline: Pipeline::new(effect),
            host_to_control: Mailbox::new(),
            control_to_host: Mailbox::new(),
            control_to_pipeline: Mailbox::new(),
            ticks_per_control: (sample_rate / CONTROL_RATE).max(1) as u64,
        }
    }

    pub fn initialize(&mut self) {
        self.control.initialize();
        self.pipeline.initialize();
    }

    pub fn pipeline(&self) -> &Pipeline<E> {
        &self.pipeline
    }

    pub fn pipeline_mut(&mut self) -> &mut Pipeline<E> {
        &mut self.pipeline
    }

    /// Queues a property from the host for the next control tick.
    pub fn send(&self, property: &Property) {
        self.host_to_control.post(property);
    }

    /// Takes the latest reply for the host, if any.
    pub fn receive(&self) -> Property {
        self.control_to_host.take()
    }

    /// Runs the control domain once and returns its host reply.
    pub fn control_tick(&mut self, rcv: &Property) -> Property {
        let mut snd = Property::EMPTY;
        let mut dsp = Property::EMPTY;
        self.control.control(rcv, &mut snd, &mut dsp);
        self.control_to_pipeline.post(&dsp);

        snd
    }

    /// Runs one audio tick, preceded by a control tick when one is due.
    pub fn tick(&mut self, usb_output: &Frame, adc_output: &Frame) -> DeviceOutput {
        if self.pipeline.ticks() % self.ticks_per_control == 0 {
            let rcv = self.host_to_control.take();
            let snd = self.control_tick(&rcv);
            self.control_to_host.post(&snd);
        }

        self.pipeline
            .tick(&self.control_to_pipeline, usb_output, adc_output)
    }
}
