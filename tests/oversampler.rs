//! Tests for the oversampler


use flexfx_dsp::fixed::{to_fixed, to_float, Sample, HALF};
use flexfx_dsp::oversampler::*;

#[test]
fn polyphase_layout() {
    let fir: Vec<Sample> = (1..=8).collect();
    let mut out = [0; 8];
    mix_fir_coeffs(&fir, 4, &mut out);

    // Branch j holds fir[j], fir[j + 4], scaled by 4.
    assert_eq!(out, [4, 20, 8, 24, 12, 28, 16, 32]);
}

#[test]
fn dc_gain_is_unity_4x() {
    let mut os = Oversampler4x::antialias_4x();
    let mut slots = [0; 4];

    for _ in 0..200 {
        slots[0] = HALF;
        os.upsample(&mut slots);
        for s in &slots {
            assert!(*s < HALF + HALF / 4);
        }
        os.downsample(&mut slots);
    }

    assert!((slots[0] - HALF).abs() < HALF / 10_000, "{}", slots[0]);
}

#[test]
fn dc_gain_is_unity_3x() {
    let mut os = Oversampler3x::antialias_3x();
    let mut slots = [0; 3];

    for _ in 0..200 {
        slots[0] = HALF;
        os.upsample(&mut slots);
        os.downsample(&mut slots);
    }

    assert!((slots[0] - HALF).abs() < HALF / 10_000, "{}", slots[0]);
}

#[test]
fn low_sine_passes() {
    let mut os = Oversampler4x::antialias_4x();
    let mut slots = [0; 4];
    let freq = 1000.0 / 48000.0;
    let mut peak: f64 = 0.0;
    let mut wav_data = Vec::new();

    for n in 0..4800 {
        slots[0] = to_fixed(0.5 * (2.0 * std::f64::consts::PI * freq * n as f64).sin());
        os.upsample(&mut slots);
        os.downsample(&mut slots);
        if n > 480 {
            peak = peak.max(to_float(slots[0]).abs());
        }
        wav_data.push([slots[0], slots[0]]);
    }

    assert!((peak - 0.5).abs() < 0.005, "peak {peak}");

    wav_writer::write("oversampler/sine_4x.wav", 48000, &wav_data).ok();
}

#[test]
fn ratio() {
    assert_eq!(Oversampler4x::antialias_4x().ratio(), 4);
    assert_eq!(Oversampler3x::antialias_3x().ratio(), 3);
}

#[test]
fn windowed_sinc_by_five() {
    let taps = windowed_sinc::<80>(0.08);
    let sum: f64 = taps.iter().sum();
    assert!((sum - 1.0).abs() < 1e-9, "{sum}");
    for k in 0..40 {
        assert!((taps[k] - taps[79 - k]).abs() < 1e-12, "tap {k}");
    }

    // DC through a decimate/interpolate round at ratio five.
    let fir = quantize(&taps);
    let mut down = Downsampler::<80, 5>::new(&fir);
    let mut up = Upsampler::<16, 5>::new(&fir);
    let mut slots = [0; 5];
    for _ in 0..100 {
        slots = [HALF; 5];
        down.process(&mut slots);
        up.process(&mut slots);
    }
    for s in slots {
        assert!((s - HALF).abs() < HALF / 100, "{}", to_float(s));
    }
}
