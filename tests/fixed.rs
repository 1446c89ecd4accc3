//! Tests for the Q28 arithmetic

use flexfx_dsp::filter::fir;
use flexfx_dsp::fixed::*;

#[test]
fn conversion_round_trip() {
    let lsb = 1.0 / (1u64 << Q) as f64;

    for i in -100..=100 {
        let value = i as f64 / 100.0;
        let back = to_float(to_fixed(value));
        assert!(
            (back - value).abs() <= lsb,
            "{value} came back as {back}"
        );
    }

    assert_eq!(to_fixed(1.0), ONE);
    assert_eq!(to_fixed(-1.0), MINUS_ONE);
    assert_eq!(to_fixed(0.5), HALF);
}

#[test]
fn multiply() {
    assert_eq!(mul(HALF, HALF), to_fixed(0.25));
    assert_eq!(mul(MINUS_ONE, HALF), -HALF);
    assert_eq!(mul(0, ONE), 0);

    let x = to_fixed(0.3);
    assert!((mul(x, ONE) - x).abs() <= 1);

    assert!((mul_add(HALF, HALF, HALF) - to_fixed(0.75)).abs() <= 1);
}

#[test]
fn saturation_does_not_wrap() {
    let big = i32::MAX;

    assert_eq!(mul(big, big), i32::MAX);
    assert_eq!(mul(big, -big), i32::MIN);
    assert_eq!(mul_add(big, big, big), i32::MAX);

    let mut acc = Accumulator::rounded();
    for _ in 0..64 {
        acc.mac(ONE, ONE);
    }
    assert_eq!(acc.result(), i32::MAX);

    let mut acc = Accumulator::rounded();
    for _ in 0..64 {
        acc.mac(ONE, MINUS_ONE);
    }
    assert_eq!(acc.result(), i32::MIN);
}

#[test]
fn long_accumulation_clamps_to_full_scale() {
    // 200 full-scale products overrun the 64-bit range several times over.
    let mut acc = Accumulator::rounded();
    for _ in 0..200 {
        acc.mac(ONE, ONE);
    }
    assert_eq!(acc.value(), i64::MAX);
    assert_eq!(acc.result(), i32::MAX);

    let mut acc = Accumulator::rounded();
    for _ in 0..200 {
        acc.mac(i32::MAX, i32::MIN);
    }
    assert_eq!(acc.value(), i64::MIN);
    assert_eq!(acc.result(), i32::MIN);

    let taps = [i32::MAX; 16];
    let mut state = [i32::MAX; 16];
    assert_eq!(fir(i32::MAX, &taps, &mut state), i32::MAX);
}

#[test]
fn accumulator_slots() {
    let mut acc = Accumulator::rounded();
    acc.mac(to_fixed(0.7), to_fixed(-0.9));
    acc.mac(to_fixed(-0.2), to_fixed(0.1));

    let (hi, lo) = acc.to_slots();
    let restored = Accumulator::from_slots(hi, lo);

    assert_eq!(restored, acc);
    assert_eq!(restored.value(), acc.value());

    let expected = to_fixed(0.7 * -0.9 + -0.2 * 0.1);
    assert!((restored.result() - expected).abs() <= 2);
}

#[test]
fn device_conversions() {
    let q31 = 0x4000_0000;

    assert_eq!(q31_to_q28(q31), 0x0800_0000);
    assert_eq!(q28_to_q31(q31_to_q28(q31)), q31);
    assert_eq!(q28_to_q31(i32::MAX), i32::MAX);
    assert_eq!(q28_to_q31(i32::MIN), i32::MIN);

    // Negative values round toward minus infinity.
    assert_eq!(q31_to_q28(-1), -1);
    assert_eq!(q31_to_q28(-9), -2);
    assert_eq!(q31_to_q28(9), 1);
}
