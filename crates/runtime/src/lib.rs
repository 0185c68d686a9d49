//! # runtime
//!
//! Session orchestration for burst-oriented speech synthesizers.
//!
//! This crate provides:
//! - `SynthesisSession`: drives an engine, a transform stream and a wave
//!   consumer through one utterance at a time
//! - `MockEngine`: a deterministic engine for tests and benchmarks
//! - Structured logging setup and metrics

pub mod logging;
pub mod metrics;
pub mod mock_engine;
pub mod session;

pub use logging::{LogFormat, init_logging, init_logging_from_config, init_logging_from_env};
pub use metrics::SessionMetrics;
pub use mock_engine::MockEngine;
pub use session::{SessionBuilder, SynthesisSession};
