//! Fifteen-band stereo graphic equalizer.
//!
//! Bands are peaking sections (Q = 2) spaced a factor of 1.5 apart from 56 Hz,
//! each with up to 12 dB of boost or cut. When any band boosts, the input is
//! attenuated by the largest boost so the cascade keeps headroom.
//!
//! | Id            | Payload                          |
//! |---------------|----------------------------------|
//! | `0x01`        | `[volume, input gain, 0, 0, 0]`  |
//! | `0x11..=0x1F` | biquad coefficients of band 1-15 |

use crate::filter::{biquad_cascade, design, BiquadCoefficients, BiquadState, BIQUAD_IDENTITY};
use crate::fixed::{mul, q28_to_q31, q31_to_q28, to_fixed, Sample, ONE};
use crate::pipeline::{Control, Effect, Frame, MixerIo};
use crate::preset::{Flash, Preset, PresetProtocol, PresetTable, PRESET_COUNT};
use crate::property::Property;

pub const SAMPLE_RATE: u32 = 192_000;

pub const BAND_COUNT: usize = 15;

/// Band center frequencies in Hz.
pub const BAND_FREQUENCIES: [f64; BAND_COUNT] = [
    56.0, 84.0, 126.0, 190.0, 284.0, 427.0, 640.0, 960.0, 1440.0, 2160.0, 3240.0, 4860.0,
    7290.0, 10935.0, 16402.0,
];

pub const BAND_Q: f64 = 2.0;

/// Boost or cut at the ends of a band's range, in dB.
pub const BAND_RANGE_DB: f64 = 12.0;

pub const GAIN_ID: u32 = 0x01;
pub const BAND_ID: u32 = 0x11;

const VOLUME_MIN: f64 = 0.1;
const VOLUME_MAX: f64 = 0.9;

/// Preset byte holding the output volume; bytes `0..15` are the bands.
pub const VOLUME_PARAM: usize = BAND_COUNT;

#[derive(Debug, Clone)]
pub struct GraphEq {
    volume: Sample,
    gain: Sample,
    coeffs: [BiquadCoefficients; BAND_COUNT],
    state: [[BiquadState; BAND_COUNT]; 2],
}

impl Default for GraphEq {
    fn default() -> Self {
        Self::new()
    }
}

impl GraphEq {
    /// Flat response at unity gain.
    pub fn new() -> Self {
        Self {
            volume: ONE,
            gain: ONE,
            coeffs: [BIQUAD_IDENTITY; BAND_COUNT],
            state: [[[0; 4]; BAND_COUNT]; 2],
        }
    }

    pub fn band(&self, index: usize) -> Option<&BiquadCoefficients> {
        self.coeffs.get(index)
    }

    pub fn volume(&self) -> Sample {
        self.volume
    }

    pub fn gain(&self) -> Sample {
        self.gain
    }

    fn apply(&mut self, property: &Property) {
        match property.id {
            GAIN_ID => {
                self.volume = property.data[0];
                self.gain = property.data[1];
            }
            id if (BAND_ID..BAND_ID + BAND_COUNT as u32).contains(&id) => {
                self.coeffs[(id - BAND_ID) as usize] = property.data;
            }
            _ => {}
        }
    }
}

impl Effect for GraphEq {
    fn initialize(&mut self) {
        self.state = [[[0; 4]; BAND_COUNT]; 2];
    }

    fn mixer(&mut self, io: MixerIo<'_>, _property: &Property) {
        for ch in 0..2 {
            io.dsp_input[ch] = q31_to_q28(io.adc_output[ch]);
            io.usb_input[ch] = io.adc_output[ch];
            io.dac_input[ch] = q28_to_q31(io.dsp_output[ch]);
        }
    }

    fn stage1(&mut self, frame: &mut Frame, property: &Property) {
        self.apply(property);

        for (ch, state) in self.state.iter_mut().enumerate() {
            let x = mul(frame[ch], self.gain);
            let y = biquad_cascade(x, &self.coeffs, state);
            frame[ch] = mul(y, self.volume);
        }
    }

    fn stage2(&mut self, _frame: &mut Frame, _property: &Property) {}
    fn stage3(&mut self, _frame: &mut Frame, _property: &Property) {}
    fn stage4(&mut self, _frame: &mut Frame, _property: &Property) {}
    fn stage5(&mut self, _frame: &mut Frame, _property: &Property) {}
}

/// Every band at 50 % (flat), volume at 50 %.
pub const DEFAULT_PRESETS: PresetTable = [[50; 20]; PRESET_COUNT];

const LABELS: &[&str] = &[
    "C99 Equalizer",
    "Band 01",
    "Band 02",
    "Band 03",
    "Band 04",
    "Band 05",
    "Band 06",
    "Band 07",
    "Band 08",
    "Band 09",
    "Band 10",
    "Band 11",
    "Band 12",
    "Band 13",
    "Band 14",
    "Band 15",
    "Output Volume",
];

#[inline]
fn position(byte: u8) -> f64 {
    byte.min(100) as f64 / 100.0
}

/// Volume and input gain for a preset. The input drops by the largest band
/// boost as soon as any band is above center.
pub fn gain_property(preset: &Preset) -> Property {
    let max = preset[..BAND_COUNT]
        .iter()
        .map(|b| position(*b))
        .fold(0.0, f64::max);
    let volume = VOLUME_MIN + position(preset[VOLUME_PARAM]) * (VOLUME_MAX - VOLUME_MIN);
    let gain = if max <= 0.5 { 1.0 } else { 1.0 / (2.0 * max) };

    Property::new(GAIN_ID, [to_fixed(volume), to_fixed(gain), 0, 0, 0])
}

/// Coefficients of band `band` for a preset.
pub fn band_property(preset: &Preset, band: usize) -> Property {
    let gain_db = 2.0 * BAND_RANGE_DB * (position(preset[band]) - 0.5);
    let ff = BAND_FREQUENCIES[band] / SAMPLE_RATE as f64;

    Property::new(BAND_ID + band as u32, design::peaking(ff, BAND_Q, gain_db))
}

/// Walks the gain property and the band properties in turn.
pub struct GraphEqControl<F: Flash> {
    protocol: PresetProtocol<F>,
    state: u32,
}

impl<F: Flash> GraphEqControl<F> {
    pub fn new(flash: F) -> Self {
        Self {
            protocol: PresetProtocol::new(flash, DEFAULT_PRESETS, LABELS),
            state: GAIN_ID,
        }
    }

    pub fn protocol(&self) -> &PresetProtocol<F> {
        &self.protocol
    }
}

impl<F: Flash + Send> Control for GraphEqControl<F> {
    fn initialize(&mut self) {
        self.protocol.initialize();
    }

    fn control(&mut self, rcv: &Property, snd: &mut Property, dsp: &mut Property) {
        *snd = self.protocol.handle(rcv);

        let preset = self.protocol.store().active_preset();
        let last_band = BAND_ID + BAND_COUNT as u32 - 1;
        if self.state == GAIN_ID {
            *dsp = gain_property(preset);
            self.state = BAND_ID;
        } else {
            *dsp = band_property(preset, (self.state - BAND_ID) as usize);
            self.state = if self.state == last_band {
                GAIN_ID
            } else {
                self.state + 1
            };
        }
    }
}
