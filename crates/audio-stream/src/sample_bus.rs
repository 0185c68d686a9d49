//! Fixed-capacity scratch buffer shared by the pull side of the pipeline.

use tts_core::{TransformStream, TtsError, TtsResult};

/// Block-sized scratch buffer.
///
/// Allocated once and reused for every pull; the hot path never grows it.
#[derive(Debug)]
pub struct SampleBus {
    samples: Box<[i16]>,
}

impl SampleBus {
    /// Allocate a bus holding `capacity` samples.
    ///
    /// Fails with `InvalidArgument` for a zero capacity and with
    /// `ResourceExhausted` when the allocation cannot be satisfied.
    pub fn new(capacity: usize) -> TtsResult<Self> {
        if capacity == 0 {
            return Err(TtsError::invalid_argument("sample bus capacity must be non-zero"));
        }

        let mut samples = Vec::new();
        samples.try_reserve_exact(capacity)?;
        samples.resize(capacity, 0i16);

        Ok(Self {
            samples: samples.into_boxed_slice(),
        })
    }

    /// Capacity in samples (one block).
    pub fn capacity(&self) -> usize {
        self.samples.len()
    }

    /// Pull at most one block from `stream` into the bus.
    ///
    /// Returns the number of samples written; only that prefix is valid.
    pub fn fill_from<T: TransformStream + ?Sized>(&mut self, stream: &mut T) -> usize {
        stream.pull(&mut self.samples)
    }

    /// The first `len` samples, as produced by the last fill.
    pub fn filled(&self, len: usize) -> &[i16] {
        &self.samples[..len.min(self.samples.len())]
    }
}
