//! Core data types exchanged across the session boundary.

use crate::error::TtsError;

/// Verdict returned from a per-burst callback to the synthesis engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BurstControl {
    /// Keep producing bursts.
    #[default]
    Continue,
    /// Abort synthesis; the engine must not produce further bursts.
    Stop,
}

impl BurstControl {
    /// Check whether the engine should stop.
    pub fn is_stop(self) -> bool {
        matches!(self, Self::Stop)
    }
}

/// Verdict returned by a consumer after receiving a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConsumerAction {
    /// Keep delivering audio.
    #[default]
    Continue,
    /// Stop the current utterance.
    Cancel,
}

/// Lifecycle of a transform stream's hidden state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransformState {
    /// Nothing buffered; ready for a new utterance.
    #[default]
    Idle,
    /// Samples have been pushed and may be retained internally.
    Accumulating,
    /// Flushed; the remaining output is waiting to be pulled.
    Flushed,
}

impl std::fmt::Display for TransformState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransformState::Idle => write!(f, "idle"),
            TransformState::Accumulating => write!(f, "accumulating"),
            TransformState::Flushed => write!(f, "flushed"),
        }
    }
}

/// How a `speak` call ended.
#[derive(Debug, Default)]
pub enum SpeakOutcome {
    /// The engine finished and the tail was delivered.
    #[default]
    Completed,
    /// The consumer cancelled; the remainder of the utterance was discarded.
    Cancelled,
    /// The transform or the engine failed; delivery stopped early.
    Aborted(TtsError),
}

impl SpeakOutcome {
    /// Check whether the utterance ran to completion.
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed)
    }

    /// Check whether the consumer cancelled.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

/// Summary of a single `speak` call.
#[derive(Debug, Default)]
pub struct SpeakReport {
    /// How the call ended.
    pub outcome: SpeakOutcome,
    /// Number of bursts received from the engine.
    pub bursts: usize,
    /// Number of consumer invocations.
    pub blocks_delivered: usize,
    /// Total samples handed to the consumer.
    pub samples_delivered: usize,
}

impl SpeakReport {
    /// Duration of delivered audio in milliseconds at the given rate.
    pub fn delivered_ms(&self, sample_rate: u32) -> f32 {
        if sample_rate == 0 {
            return 0.0;
        }
        self.samples_delivered as f32 / sample_rate as f32 * 1000.0
    }
}
