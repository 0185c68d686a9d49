//! # tts-core
//!
//! Core types, traits, and error definitions for the streaming synthesis
//! session.
//!
//! This crate provides the foundational abstractions shared by the other
//! crates in the workspace, including:
//!
//! - Control-flow types exchanged through callbacks (`BurstControl`, `ConsumerAction`)
//! - Trait seams for the synthesis engine, the transform stream and the consumer
//! - Unified error handling via `TtsError`
//! - Configuration structures

pub mod config;
pub mod error;
pub mod traits;
pub mod types;

pub use config::{LoggingConfig, RuntimeConfig, StreamConfig, VoiceConfig, VoiceFlags};
pub use error::{TtsError, TtsResult};
pub use traits::{SynthesisEngine, TransformStream, WaveConsumer};
pub use types::{BurstControl, ConsumerAction, SpeakOutcome, SpeakReport, TransformState};
