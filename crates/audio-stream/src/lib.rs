//! # audio-stream
//!
//! Sample-level building blocks of the synthesis session.
//!
//! This crate provides:
//! - `SampleBus`: the fixed-capacity scratch buffer blocks are pulled into
//! - `ResampleStream`: the gain / speed / sample-rate transform stream
//! - Conversions between the engine's 8-bit PCM and 16-bit output

pub mod convert;
pub mod sample_bus;
pub mod transform;

pub use convert::{f32_to_i16, flip_sign_in_place, unsigned_to_f32, unsigned_to_i16};
pub use sample_bus::SampleBus;
pub use transform::{MAX_SPEED, MAX_VOLUME, MIN_SPEED, ResampleStream};
