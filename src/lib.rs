#![doc = include_str!("../README.md")]
#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub mod convolution;
pub mod effects;
pub mod error;
pub mod filter;
pub mod fixed;
pub mod nonlinear;
pub mod oversampler;
pub mod pipeline;
pub mod preset;
pub mod property;
pub mod utils;

pub use error::FlashError;
