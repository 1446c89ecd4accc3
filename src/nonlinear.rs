//! Tube gain stage model.
//!
//! One stage runs a DC blocker, drive gain, bias offset, a voice-dependent
//! waveshaper, a slew-rate limiter and a mid-range emphasis biquad. Stages are
//! meant to be chained and oversampled; every instance owns its coefficients
//! and state.
//!
//! Coefficients arrive as three property payload classes:
//!
//! | Class | Payload words                                 |
//! |-------|-----------------------------------------------|
//! | 1     | `[dc_block, bias, voice, slew, drive]`        |
//! | 2     | emphasis biquad `[b0, b1, b2, -a1, -a2]`      |
//! | 3     | `[_, balance, volume, _, _]`                  |

#[allow(unused_imports)]
use num_traits::float::Float;

use crate::filter::tables::{self, Table};
use crate::filter::{design, iir2, BiquadCoefficients, BiquadState, DcBlocker, BIQUAD_IDENTITY};
use crate::fixed::{mul, to_fixed, Sample, HALF, ONE};

/// Headroom applied after the drive coefficient, so a drive of 1.0 is +24 dB.
pub const DRIVE_GAIN: i32 = 16;

/// Hard clipper threshold (0.8).
pub const HARD_LIMIT: Sample = ONE - ONE / 5;

/// Number of selectable voice indices (1-based).
pub const VOICE_COUNT: u8 = 15;

/// Pole of the input DC blocker the control plane sends by default.
pub const DC_BLOCK_POLE: f64 = 0.999;

const BIAS: [f64; 5] = [0.02, 0.01, 0.0, -0.01, -0.02];

/// Waveshaper family.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum Voice {
    /// Asymmetric curve, harder on the positive half-wave.
    #[default]
    Tube,
    /// Symmetric cubic soft clip.
    Soft,
    /// Symmetric hard clip.
    Hard,
}

impl Voice {
    /// Decodes the class-1 payload word. Unknown words select [`Voice::Tube`].
    pub fn from_word(word: i32) -> Self {
        match word {
            1 => Self::Soft,
            2 => Self::Hard,
            _ => Self::Tube,
        }
    }

    pub fn word(self) -> i32 {
        match self {
            Self::Tube => 0,
            Self::Soft => 1,
            Self::Hard => 2,
        }
    }

    /// Maps a 1-based voice index to its family. Indices 1-5 are soft, 6-10
    /// tube, 11-15 hard; out-of-range indices are clamped.
    pub fn from_index(index: u8) -> Self {
        match index.clamp(1, VOICE_COUNT) {
            1..=5 => Self::Soft,
            6..=10 => Self::Tube,
            _ => Self::Hard,
        }
    }

    #[inline]
    fn shape(self, table: &Table, x: Sample) -> Sample {
        match self {
            Self::Tube => {
                if x >= 0 {
                    tables::lookup_tanh(table, x)
                } else {
                    tables::lookup_tanh_scaled(table, x, HALF).saturating_mul(2)
                }
            }
            Self::Soft => {
                let x = x.clamp(-ONE, ONE);
                let x3 = mul(mul(x, x), x);
                x + x / 2 - x3 / 2
            }
            Self::Hard => x.clamp(-HARD_LIMIT, HARD_LIMIT),
        }
    }
}

/// Bias offset for a 1-based voice index, cold (+0.02) to hot (-0.02).
pub fn voice_bias(index: u8) -> f64 {
    BIAS[(index.clamp(1, VOICE_COUNT) as usize - 1) % BIAS.len()]
}

/// Class-1 payload for a voice index and 0..=15 slew and drive pot positions.
pub fn voice_parameters(voice_index: u8, slew_pos: u8, drive_pos: u8) -> [Sample; 5] {
    let slew = 0.02 + (slew_pos.min(15) as f64 / 15.001) * (0.08 - 0.02);
    let drive = drive_pos.min(15) as f64 / 15.001;

    [
        to_fixed(DC_BLOCK_POLE),
        to_fixed(voice_bias(voice_index)),
        Voice::from_index(voice_index).word(),
        to_fixed(slew),
        to_fixed(drive),
    ]
}

/// Class-2 payload: 6 dB emphasis peak whose frequency follows `pos` (0..=15).
pub fn emphasis_parameters(pos: u8) -> [Sample; 5] {
    design::peaking(0.00005 + pos.min(15) as f64 * 0.0001, 0.707, 6.0)
}

/// Class-3 payload from a volume position in `0..=200`.
pub fn output_parameters(volume_pos: u8) -> [Sample; 5] {
    [0, HALF, to_fixed((volume_pos.min(200) as f64) / 200.0), 0, 0]
}

/// Limits the per-sample change of a signal.
#[derive(Debug, Default, Clone)]
pub struct SlewLimiter {
    last: Sample,
}

impl SlewLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        self.last = 0;
    }

    #[inline]
    pub fn process(&mut self, x: Sample, max_step: Sample) -> Sample {
        let step = max_step.max(0) as i64;
        let delta = (x as i64 - self.last as i64).clamp(-step, step);
        self.last = (self.last as i64 + delta) as Sample;

        self.last
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TubeCoefficients {
    pub dc_block: Sample,
    pub bias: Sample,
    pub voice: Voice,
    pub slew: Sample,
    pub drive: Sample,
    pub emphasis: BiquadCoefficients,
    pub balance: Sample,
    pub volume: Sample,
}

impl Default for TubeCoefficients {
    fn default() -> Self {
        Self {
            dc_block: to_fixed(DC_BLOCK_POLE),
            bias: 0,
            voice: Voice::Tube,
            slew: ONE,
            drive: ONE / DRIVE_GAIN,
            emphasis: BIQUAD_IDENTITY,
            balance: HALF,
            volume: ONE,
        }
    }
}

impl TubeCoefficients {
    /// Applies a class 1..=3 payload; other classes are ignored.
    pub fn apply(&mut self, class: u8, payload: &[Sample; 5]) {
        match class {
            1 => {
                self.dc_block = payload[0];
                self.bias = payload[1];
                self.voice = Voice::from_word(payload[2]);
                self.slew = payload[3];
                self.drive = payload[4];
            }
            2 => self.emphasis = *payload,
            3 => {
                self.balance = payload[1];
                self.volume = payload[2];
            }
            _ => {}
        }
    }
}

#[derive(Debug, Clone)]
pub struct TubeStage {
    coeffs: TubeCoefficients,
    dc_blocker: DcBlocker,
    slew: SlewLimiter,
    emphasis: BiquadState,
    table: &'static Table,
}

impl Default for TubeStage {
    fn default() -> Self {
        Self::new()
    }
}

impl TubeStage {
    pub fn new() -> Self {
        let coeffs = TubeCoefficients::default();
        let mut dc_blocker = DcBlocker::new();
        dc_blocker.init(coeffs.dc_block);

        Self {
            coeffs,
            dc_blocker,
            slew: SlewLimiter::new(),
            emphasis: [0; 4],
            table: tables::tanh(),
        }
    }

    pub fn reset(&mut self) {
        self.dc_blocker.init(self.coeffs.dc_block);
        self.slew.reset();
        self.emphasis = [0; 4];
    }

    pub fn coefficients(&self) -> &TubeCoefficients {
        &self.coeffs
    }

    /// Applies a class 1..=3 payload. State is kept so updates do not click.
    pub fn set_coefficients(&mut self, class: u8, payload: &[Sample; 5]) {
        self.coeffs.apply(class, payload);
        self.dc_blocker.set_pole(self.coeffs.dc_block);
    }

    /// Output volume (class-3 word 2).
    #[inline]
    pub fn volume(&self) -> Sample {
        self.coeffs.volume
    }

    #[inline]
    pub fn process(&mut self, x: Sample) -> Sample {
        let c = &self.coeffs;

        let x = self.dc_blocker.process(x);
        let x = mul(x, c.drive).saturating_mul(DRIVE_GAIN);
        let x = x.saturating_add(c.bias);
        let y = c.voice.shape(self.table, x);
        let y = self.slew.process(y, c.slew);
        let y = y.saturating_sub(c.bias);

        iir2(y, &c.emphasis, &mut self.emphasis)
    }
}
