//! Control-side helpers.

pub mod hysteresis_quantizer;

pub use hysteresis_quantizer::PotQuantizer;
