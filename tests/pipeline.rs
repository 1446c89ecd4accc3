//! Tests for the five-stage pipeline

use flexfx_dsp::pipeline::*;
use flexfx_dsp::property::{Mailbox, Property};

/// Passes slot 0 through, counts visited stages in slot 1 and records the
/// property id each stage saw in slots 2..7.
#[derive(Debug, Clone, Default)]
struct StageRecorder {
    mixer_properties: Vec<u32>,
}

impl StageRecorder {
    fn visit(frame: &mut Frame, stage: usize, property: &Property) {
        frame[1] += 1;
        frame[2 + stage] = property.id as i32;
    }
}

impl Effect for StageRecorder {
    fn mixer(&mut self, io: MixerIo<'_>, property: &Property) {
        if !property.is_empty() {
            self.mixer_properties.push(property.id);
        }
        io.dsp_input[0] = io.adc_output[0];
        io.usb_input.copy_from_slice(io.dsp_output);
        io.dac_input[0] = io.dsp_output[0].wrapping_add(io.usb_output[0]);
    }

    fn stage1(&mut self, frame: &mut Frame, property: &Property) {
        Self::visit(frame, 0, property);
    }

    fn stage2(&mut self, frame: &mut Frame, property: &Property) {
        Self::visit(frame, 1, property);
    }

    fn stage3(&mut self, frame: &mut Frame, property: &Property) {
        Self::visit(frame, 2, property);
    }

    fn stage4(&mut self, frame: &mut Frame, property: &Property) {
        Self::visit(frame, 3, property);
    }

    fn stage5(&mut self, frame: &mut Frame, property: &Property) {
        Self::visit(frame, 4, property);
    }
}

fn adc(value: i32) -> Frame {
    let mut frame = [0; FRAME_SIZE];
    frame[0] = value;
    frame
}

#[test]
fn latency_is_five_ticks() {
    let mailbox = Mailbox::new();
    let mut pipeline = Pipeline::new(Box::new(StageRecorder::default()));
    let silence = [0; FRAME_SIZE];

    let outputs: Vec<DeviceOutput> = (0..20)
        .map(|t| pipeline.tick(&mailbox, &silence, &adc(100 + t)))
        .collect();

    for (t, output) in outputs.iter().enumerate() {
        if t < LATENCY {
            assert_eq!(output.usb_input[0], 0, "tick {t}");
            assert_eq!(output.usb_input[1], 0, "tick {t}");
        } else {
            assert_eq!(output.usb_input[0], 100 + (t - LATENCY) as i32, "tick {t}");
            assert_eq!(output.usb_input[1], STAGE_COUNT as i32, "tick {t}");
        }
    }
    assert_eq!(pipeline.ticks(), 20);
}

#[test]
fn property_travels_with_its_frame() {
    let mailbox = Mailbox::new();
    let mut pipeline = Pipeline::new(Box::new(StageRecorder::default()));
    let silence = [0; FRAME_SIZE];

    pipeline.tick(&mailbox, &silence, &silence);
    mailbox.post(&Property::new(0x42, [0; 5]));
    let mut outputs = Vec::new();
    for _ in 0..10 {
        outputs.push(pipeline.tick(&mailbox, &silence, &silence));
    }

    // Posted before tick 1, so the frame carrying it reaches the mixer on tick 6.
    for (n, output) in outputs.iter().enumerate() {
        let seen = &output.usb_input[2..7];
        if n == LATENCY {
            assert_eq!(seen, &[0x42; 5]);
        } else {
            assert_eq!(seen, &[0; 5], "output {n}");
        }
    }
    assert_eq!(pipeline.effect().mixer_properties, vec![0x42]);
    assert!(!mailbox.is_pending());
}

#[test]
fn deterministic() {
    let run = || {
        let mailbox = Mailbox::new();
        let mut pipeline = Pipeline::new(Box::new(StageRecorder::default()));
        (0..50)
            .map(|t| {
                if t % 7 == 0 {
                    mailbox.post(&Property::new(t as u32 + 1, [t; 5]));
                }
                pipeline.tick(&mailbox, &adc(t * 3), &adc(t * 11))
            })
            .collect::<Vec<_>>()
    };

    assert_eq!(run(), run());
}

#[test]
fn flush_drops_frames_in_flight() {
    let mailbox = Mailbox::new();
    let mut pipeline = Pipeline::new(Box::new(StageRecorder::default()));
    let silence = [0; FRAME_SIZE];

    for t in 0..3 {
        pipeline.tick(&mailbox, &silence, &adc(7 + t));
    }
    pipeline.flush();

    for _ in 0..LATENCY {
        let output = pipeline.tick(&mailbox, &silence, &silence);
        assert_eq!(output.usb_input[0], 0);
    }
}

#[test]
fn cloned_pipeline_continues_identically() {
    let mailbox = Mailbox::new();
    let effect: Box<dyn Effect> = Box::new(StageRecorder::default());
    let mut pipeline = Pipeline::new(effect);
    let silence = [0; FRAME_SIZE];

    for t in 0..4 {
        pipeline.tick(&mailbox, &silence, &adc(t));
    }
    let mut copy = pipeline.clone();

    for t in 0..10 {
        let a = pipeline.tick(&mailbox, &silence, &adc(t));
        let b = copy.tick(&mailbox, &silence, &adc(t));
        assert_eq!(a, b);
    }
}

#[test]
fn usb_is_mixed_by_the_effect() {
    let mailbox = Mailbox::new();
    let mut pipeline = Pipeline::new(Box::new(StageRecorder::default()));
    let usb = adc(1234);

    let output = pipeline.tick(&mailbox, &usb, &[0; FRAME_SIZE]);
    assert_eq!(output.dac_input[0], 1234);
}

/// Counts control ticks and forwards host properties to the pipeline.
#[derive(Default)]
struct Relay {
    calls: u32,
}

impl Control for Relay {
    fn control(&mut self, rcv: &Property, snd: &mut Property, dsp: &mut Property) {
        self.calls += 1;
        *snd = Property::new(0x100, [self.calls as i32, 0, 0, 0, 0]);
        if !rcv.is_empty() {
            *dsp = *rcv;
        }
    }
}

#[test]
fn device_runs_control_at_one_khz() {
    let mut device = Device::new(Box::new(Relay::default()), Box::new(StageRecorder::default()), 48000);
    device.initialize();
    let silence = [0; FRAME_SIZE];

    device.tick(&silence, &silence);
    assert_eq!(device.receive().data[0], 1);
    assert!(device.receive().is_empty());

    for _ in 1..48 {
        device.tick(&silence, &silence);
    }
    assert!(device.receive().is_empty());

    device.send(&Property::new(0x77, [1, 2, 3, 4, 5]));
    device.tick(&silence, &silence);
    assert_eq!(device.receive().data[0], 2);

    // The forwarded property reaches the mixer on the same tick.
    assert_eq!(device.pipeline().effect().mixer_properties, vec![0x77]);
    assert_eq!(device.pipeline().ticks(), 49);
}

#[test]
fn control_tick_returns_reply() {
    let mut device = Device::new(Box::new(Relay::default()), Box::new(StageRecorder::default()), 192000);

    let reply = device.control_tick(&Property::EMPTY);
    assert_eq!(reply.id, 0x100);
    assert!(device.receive().is_empty());
}
