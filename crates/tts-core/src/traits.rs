//! Trait seams between the session and its collaborators.

use crate::error::TtsResult;
use crate::types::{BurstControl, ConsumerAction, TransformState};

/// Speech synthesis engine producing audio in engine-sized bursts.
///
/// Implementations call `on_burst` zero or more times with signed 8-bit PCM
/// (two's complement, one byte per sample). Burst sizes are chosen by the
/// engine and carry no relation to the consumer's block size. The buffer is
/// handed over mutably so the caller may convert it in place.
pub trait SynthesisEngine {
    /// Engine-specific voice parameters.
    type Config;

    /// Synthesize `text` and stream the result through `on_burst`.
    ///
    /// # Arguments
    /// * `config` - Voice parameters for this utterance
    /// * `text` - Raw text bytes, in the engine's own encoding
    /// * `block_capacity` - Preferred upper bound for a single burst
    /// * `on_burst` - Callback receiving each burst
    ///
    /// The engine must stop producing bursts as soon as `on_burst` returns
    /// [`BurstControl::Stop`] and return `Ok(())`.
    fn synthesize(
        &mut self,
        config: &Self::Config,
        text: &[u8],
        block_capacity: usize,
        on_burst: &mut dyn FnMut(&mut [u8]) -> BurstControl,
    ) -> TtsResult<()>;
}

/// Stateful resampling / volume / speed stage.
///
/// Accepts unsigned 8-bit samples, retains whatever history it needs across
/// pushes, and yields signed 16-bit samples on demand. The stream must be
/// drained to empty before it is reused for an unrelated utterance.
pub trait TransformStream {
    /// Push unsigned 8-bit samples. Returns the number accepted; `0` for a
    /// non-empty input signals failure.
    fn push(&mut self, samples: &[u8]) -> usize;

    /// Pull up to `out.len()` transformed samples. Returns the count written.
    fn pull(&mut self, out: &mut [i16]) -> usize;

    /// Number of transformed samples ready to be pulled.
    fn available(&self) -> usize;

    /// Force out any samples retained for continuity.
    fn flush(&mut self);

    /// Set the output gain for samples pushed from now on.
    fn set_volume(&mut self, volume: f32);

    /// Set the time-scale factor for samples pushed from now on.
    fn set_speed(&mut self, speed: f32);

    /// Current gain.
    fn volume(&self) -> f32;

    /// Current time-scale factor.
    fn speed(&self) -> f32;

    /// Current lifecycle state.
    fn state(&self) -> TransformState;
}

/// Receiver of transformed audio blocks.
///
/// Invoked synchronously from inside `speak`, possibly many times.
pub trait WaveConsumer {
    /// Receive one block. Return [`ConsumerAction::Cancel`] to stop the
    /// current utterance.
    fn consume(&mut self, samples: &[i16]) -> ConsumerAction;
}

impl<F> WaveConsumer for F
where
    F: FnMut(&[i16]) -> ConsumerAction,
{
    fn consume(&mut self, samples: &[i16]) -> ConsumerAction {
        self(samples)
    }
}
