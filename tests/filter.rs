//! Tests for the filter primitives

use flexfx_dsp::filter::delay_line::DelayLine;
use flexfx_dsp::filter::*;
use flexfx_dsp::fixed::{to_fixed, Sample, HALF, ONE};

#[test]
fn identity_biquad_passes_through() {
    let mut state = [0; 4];
    for i in 0..100 {
        let x = to_fixed((i as f64 * 0.1).sin() * 0.8);
        let y = iir2(x, &BIQUAD_IDENTITY, &mut state);
        assert!((y - x).abs() <= 1);
    }
}

#[test]
fn flat_peaking_is_transparent() {
    let coeffs = design::peaking(1000.0 / 48000.0, 2.0, 0.0);
    let mut state = [0; 4];

    for i in 0..2000 {
        let x = to_fixed((i as f64 * 0.05).sin() * 0.5);
        let y = iir2(x, &coeffs, &mut state);
        assert!((y - x).abs() < to_fixed(1e-4), "sample {i}: {x} -> {y}");
    }
}

#[test]
fn lowpass_passes_dc() {
    let coeffs = design::lowpass(0.01, 0.707);
    let mut state = [0; 4];
    let mut y = 0;
    for _ in 0..5000 {
        y = iir2(HALF, &coeffs, &mut state);
    }

    assert!((y - HALF).abs() < HALF / 1000);
}

#[test]
fn first_order_lowpass_passes_dc() {
    let coeffs = design::lowpass1(0.05);
    let mut state = [0; 2];
    let mut y = 0;
    for _ in 0..2000 {
        y = iir1(HALF, &coeffs, &mut state);
    }

    assert!((y - HALF).abs() < HALF / 1000);
}

#[test]
fn dc_blocker_removes_offset() {
    let mut blocker = DcBlocker::new();
    blocker.init(to_fixed(0.999));

    let mut y = 0;
    for _ in 0..48000 {
        y = blocker.process(HALF);
    }

    assert!(y.abs() < HALF / 1000, "residual {y}");
}

#[test]
fn fir_moving_average() {
    let coeffs = [ONE / 4; 4];
    let mut fir = Fir::<4>::new();
    let outputs: Vec<Sample> = [ONE, 0, 0, 0, 0]
        .into_iter()
        .map(|x| fir.process(x, &coeffs))
        .collect();

    for y in &outputs[..4] {
        assert!((*y - ONE / 4).abs() <= 1);
    }
    assert_eq!(outputs[4], 0);
}

#[test]
fn delay_line_read() {
    let mut line = DelayLine::<16>::new();
    for i in 1..=10 {
        line.write(i * 100);
    }

    assert_eq!(line.read(1), 1000);
    assert_eq!(line.read(3), 800);
    assert_eq!(line.read_lagrange(1, 0), 1000);

    let between = line.read_lagrange(1, HALF);
    assert!((between - 950).abs() <= 1);
}

#[test]
fn blend_endpoints() {
    let dry = to_fixed(0.25);
    let wet = to_fixed(-0.5);

    assert!((blend(dry, wet, 0) - dry).abs() <= 1);
    assert!((blend(dry, wet, ONE) - wet).abs() <= 1);
    assert!((blend(dry, wet, HALF) - to_fixed(-0.125)).abs() <= 1);
}

#[test]
fn sine_table() {
    let sine = tables::sine();

    assert_eq!(sine[0], 0);
    assert!((sine[tables::TABLE_SIZE / 4] - ONE).abs() <= 1);
    assert!((sine[3 * tables::TABLE_SIZE / 4] + ONE).abs() <= 1);
}

#[test]
fn tanh_lookup() {
    let table = tables::tanh();

    for &x in &[-2.0, -0.5, 0.0, 0.25, 1.0, 3.0] {
        let y = tables::lookup_tanh(table, to_fixed(x));
        let expected = (x as f64).tanh();
        assert!(
            (flexfx_dsp::fixed::to_float(y) - expected).abs() < 1e-3,
            "tanh({x})"
        );
    }
}

#[test]
fn tonestack_is_stable() {
    let coeffs = design::tonestack(0.5, 0.5, 0.5, 1.0, 1.0, 1.0, 48000.0);
    let mut state = [0; 6];
    let mut peak = 0;

    for i in 0..48000 {
        let x = if i == 0 { HALF } else { 0 };
        let y = iir3(x, &coeffs, &mut state);
        if i > 24000 {
            peak = peak.max(y.abs());
        }
    }

    assert!(peak < HALF / 1000, "tail {peak}");
}

#[test]
fn tonestack_passes_midrange_at_sample_rate() {
    let fs = 48000.0;
    let coeffs = design::tonestack(0.5, 0.5, 0.5, 1.0, 1.0, 1.0, fs);
    let mut state = [0; 6];
    let mut peak = 0;

    for i in 0..9600 {
        let phase = 2.0 * std::f64::consts::PI * 1000.0 * i as f64 / fs;
        let y = iir3(to_fixed(0.5 * phase.sin()), &coeffs, &mut state);
        if i > 4800 {
            peak = peak.max(y.abs());
        }
    }

    let gain = peak as f64 / to_fixed(0.5) as f64;
    assert!(gain > 0.01 && gain < 1.0, "gain {gain}");
}
