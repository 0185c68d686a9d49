//! Volume, speed and sample-rate transform stream.
//!
//! Unsigned 8-bit bursts go in; signed 16-bit samples come out. The stream
//! keeps three stages of state between pushes:
//!
//! 1. a gain applied as each byte is ingested,
//! 2. a linear-interpolation varispeed stage holding the last input sample,
//! 3. an optional FFT rate converter holding a partial input chunk.
//!
//! Gain and speed are read when a sample is pushed, so changing them never
//! alters audio that is already inside the stream.

use std::collections::VecDeque;

use rubato::{FftFixedIn, Resampler};
use tracing::{debug, trace, warn};
use tts_core::{StreamConfig, TransformState, TransformStream, TtsError, TtsResult};

use crate::convert::{f32_to_i16, unsigned_to_f32};

/// Slowest accepted time-scale factor.
pub const MIN_SPEED: f32 = 0.25;

/// Fastest accepted time-scale factor.
pub const MAX_SPEED: f32 = 4.0;

/// Largest accepted gain.
pub const MAX_VOLUME: f32 = 8.0;

/// Linear-interpolation time scaler.
///
/// Output positions advance by `speed` input samples each, so `n` input
/// samples become roughly `n / speed` output samples.
#[derive(Debug, Default)]
struct Varispeed {
    /// Most recent input sample; the read position sits between it and the next.
    last: Option<f32>,
    /// Fractional read position past `last`.
    phase: f64,
}

impl Varispeed {
    fn feed(&mut self, sample: f32, speed: f32, out: &mut Vec<f32>) {
        let Some(last) = self.last else {
            self.last = Some(sample);
            return;
        };

        let step = f64::from(speed);
        while self.phase < 1.0 {
            out.push(last + (sample - last) * self.phase as f32);
            self.phase += step;
        }
        self.phase -= 1.0;
        self.last = Some(sample);
    }

    /// Emit the held sample and return to the initial state.
    fn finish(&mut self, speed: f32, out: &mut Vec<f32>) {
        if let Some(last) = self.last.take() {
            let step = f64::from(speed);
            while self.phase < 1.0 {
                out.push(last);
                self.phase += step;
            }
        }
        self.phase = 0.0;
    }
}

/// Fixed-chunk FFT sample-rate converter.
struct RateConverter {
    resampler: FftFixedIn<f32>,
    chunk: usize,
    input_rate: u64,
    output_rate: u64,
    /// Input frames waiting for a full chunk.
    pending: Vec<f32>,
    /// Real (non-padding) input frames since the last reset.
    consumed: u64,
    /// Output frames emitted since the last reset.
    produced: u64,
    /// Leading output frames still to discard.
    delay_left: usize,
}

impl RateConverter {
    fn new(input_rate: u32, output_rate: u32, chunk: usize) -> TtsResult<Self> {
        let resampler =
            FftFixedIn::<f32>::new(input_rate as usize, output_rate as usize, chunk, 1, 1)
                .map_err(|e| TtsError::config(format!("failed to create resampler: {e}")))?;

        let mut pending = Vec::new();
        pending.try_reserve_exact(chunk)?;
        let delay_left = resampler.output_delay();

        Ok(Self {
            resampler,
            chunk,
            input_rate: u64::from(input_rate),
            output_rate: u64::from(output_rate),
            pending,
            consumed: 0,
            produced: 0,
            delay_left,
        })
    }

    fn process(&mut self, mut input: &[f32], output: &mut VecDeque<i16>) -> TtsResult<()> {
        while !input.is_empty() {
            let take = (self.chunk - self.pending.len()).min(input.len());
            self.pending.extend_from_slice(&input[..take]);
            self.consumed += take as u64;
            input = &input[take..];

            if self.pending.len() == self.chunk {
                self.run_chunk(output, None)?;
            }
        }
        Ok(())
    }

    /// Convert the full pending chunk, emitting at most up to `limit` total frames.
    fn run_chunk(&mut self, output: &mut VecDeque<i16>, limit: Option<u64>) -> TtsResult<()> {
        let frames = self
            .resampler
            .process(&[&self.pending[..]], None)
            .map_err(|e| TtsError::transform(e.to_string()))?;
        self.pending.clear();

        let mut data = frames.first().map(Vec::as_slice).unwrap_or(&[]);

        let skip = self.delay_left.min(data.len());
        self.delay_left -= skip;
        data = &data[skip..];

        if let Some(limit) = limit {
            let room = usize::try_from(limit.saturating_sub(self.produced)).unwrap_or(usize::MAX);
            data = &data[..room.min(data.len())];
        }

        output.try_reserve(data.len())?;
        output.extend(data.iter().map(|&s| f32_to_i16(s)));
        self.produced += data.len() as u64;
        Ok(())
    }

    /// Output length matching the real input seen since the last reset.
    fn expected_output(&self) -> u64 {
        (self.consumed * self.output_rate + self.input_rate / 2) / self.input_rate
    }

    /// Push zero padding through until the output catches up with the input,
    /// then reset for the next utterance.
    fn finish(&mut self, output: &mut VecDeque<i16>) -> TtsResult<()> {
        let expected = self.expected_output();
        let per_chunk = (self.chunk as u64 * self.output_rate / self.input_rate).max(1) as usize;
        let mut rounds = self.resampler.output_delay() / per_chunk + 3;

        while self.produced < expected && rounds > 0 {
            self.pending.resize(self.chunk, 0.0);
            self.run_chunk(output, Some(expected))?;
            rounds -= 1;
        }

        self.reset();
        Ok(())
    }

    fn reset(&mut self) {
        self.resampler.reset();
        self.pending.clear();
        self.consumed = 0;
        self.produced = 0;
        self.delay_left = self.resampler.output_delay();
    }
}

/// Transform stream applying gain, time scaling and rate conversion.
///
/// At speed 1.0 with equal input and output rates the stream is sample
/// exact: every pushed byte comes back as one sample once flushed.
pub struct ResampleStream {
    input_rate: u32,
    output_rate: u32,
    volume: f32,
    speed: f32,
    varispeed: Varispeed,
    converter: Option<RateConverter>,
    /// Scratch for varispeed output, reused across pushes.
    staged: Vec<f32>,
    output: VecDeque<i16>,
    state: TransformState,
}

impl ResampleStream {
    /// Create a mono stream for the rates and block size in `config`.
    pub fn new(config: &StreamConfig) -> TtsResult<Self> {
        config.validate()?;

        let converter = if config.needs_resampling() {
            Some(RateConverter::new(
                config.input_sample_rate,
                config.output_sample_rate,
                config.resampler_chunk,
            )?)
        } else {
            None
        };

        let mut staged = Vec::new();
        staged.try_reserve_exact(config.block_size)?;
        let mut output = VecDeque::new();
        output.try_reserve_exact(config.block_size.saturating_mul(2))?;

        debug!(
            input_rate = config.input_sample_rate,
            output_rate = config.output_sample_rate,
            resampling = converter.is_some(),
            "Created transform stream"
        );

        Ok(Self {
            input_rate: config.input_sample_rate,
            output_rate: config.output_sample_rate,
            volume: 1.0,
            speed: 1.0,
            varispeed: Varispeed::default(),
            converter,
            staged,
            output,
            state: TransformState::Idle,
        })
    }

    /// Sample rate of pushed audio in Hz.
    pub fn input_sample_rate(&self) -> u32 {
        self.input_rate
    }

    /// Sample rate of pulled audio in Hz.
    pub fn output_sample_rate(&self) -> u32 {
        self.output_rate
    }

    fn ingest(&mut self, samples: &[u8]) -> TtsResult<()> {
        let estimate = (samples.len() as f64 / f64::from(self.speed)).ceil() as usize + 2;
        self.staged.clear();
        self.staged.try_reserve(estimate)?;

        for &byte in samples {
            self.varispeed
                .feed(unsigned_to_f32(byte) * self.volume, self.speed, &mut self.staged);
        }

        self.forward_staged()
    }

    fn forward_staged(&mut self) -> TtsResult<()> {
        match self.converter.as_mut() {
            Some(converter) => converter.process(&self.staged, &mut self.output),
            None => {
                self.output.try_reserve(self.staged.len())?;
                self.output
                    .extend(self.staged.iter().map(|&s| f32_to_i16(s)));
                Ok(())
            }
        }
    }

    fn drain_stages(&mut self) -> TtsResult<()> {
        self.staged.clear();
        self.varispeed.finish(self.speed, &mut self.staged);
        self.forward_staged()?;

        if let Some(converter) = self.converter.as_mut() {
            converter.finish(&mut self.output)?;
        }
        Ok(())
    }
}

impl TransformStream for ResampleStream {
    fn push(&mut self, samples: &[u8]) -> usize {
        if samples.is_empty() {
            return 0;
        }

        if let Err(err) = self.ingest(samples) {
            warn!(error = %err, offered = samples.len(), "Transform push failed");
            return 0;
        }

        self.state = TransformState::Accumulating;
        samples.len()
    }

    fn pull(&mut self, out: &mut [i16]) -> usize {
        let n = out.len().min(self.output.len());
        for (slot, sample) in out.iter_mut().zip(self.output.drain(..n)) {
            *slot = sample;
        }

        if self.output.is_empty() && self.state == TransformState::Flushed {
            self.state = TransformState::Idle;
        }
        n
    }

    fn available(&self) -> usize {
        self.output.len()
    }

    fn flush(&mut self) {
        if let Err(err) = self.drain_stages() {
            warn!(error = %err, "Transform flush failed, dropping retained samples");
            if let Some(converter) = self.converter.as_mut() {
                converter.reset();
            }
        }

        self.state = if self.output.is_empty() {
            TransformState::Idle
        } else {
            TransformState::Flushed
        };
        trace!(available = self.output.len(), state = %self.state, "Flushed transform stream");
    }

    fn set_volume(&mut self, volume: f32) {
        if !volume.is_finite() {
            warn!(volume, "Ignoring non-finite volume");
            return;
        }
        self.volume = volume.clamp(0.0, MAX_VOLUME);
    }

    fn set_speed(&mut self, speed: f32) {
        if !speed.is_finite() {
            warn!(speed, "Ignoring non-finite speed");
            return;
        }
        self.speed = speed.clamp(MIN_SPEED, MAX_SPEED);
    }

    fn volume(&self) -> f32 {
        self.volume
    }

    fn speed(&self) -> f32 {
        self.speed
    }

    fn state(&self) -> TransformState {
        self.state
    }
}

impl std::fmt::Debug for ResampleStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResampleStream")
            .field("input_rate", &self.input_rate)
            .field("output_rate", &self.output_rate)
            .field("volume", &self.volume)
            .field("speed", &self.speed)
            .field("available", &self.output.len())
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convert::unsigned_to_i16;

    fn pull_all(stream: &mut ResampleStream) -> Vec<i16> {
        let mut out = vec![0i16; stream.available()];
        let n = stream.pull(&mut out);
        out.truncate(n);
        out
    }

    fn identity() -> ResampleStream {
        ResampleStream::new(&StreamConfig::default()).unwrap()
    }

    #[test]
    fn test_identity_is_sample_exact() {
        let mut stream = identity();
        let input: Vec<u8> = (0..=u8::MAX).collect();

        assert_eq!(stream.push(&input), input.len());
        // One sample is held back for interpolation until flush.
        assert_eq!(stream.available(), input.len() - 1);

        stream.flush();
        let output = pull_all(&mut stream);

        let expected: Vec<i16> = input.iter().map(|&b| unsigned_to_i16(b)).collect();
        assert_eq!(output, expected);
    }

    #[test]
    fn test_empty_push_is_rejected() {
        let mut stream = identity();
        assert_eq!(stream.push(&[]), 0);
        assert_eq!(stream.state(), TransformState::Idle);
    }

    #[test]
    fn test_state_transitions() {
        let mut stream = identity();
        assert_eq!(stream.state(), TransformState::Idle);

        stream.push(&[128; 10]);
        assert_eq!(stream.state(), TransformState::Accumulating);

        stream.flush();
        assert_eq!(stream.state(), TransformState::Flushed);

        let mut out = [0i16; 4];
        stream.pull(&mut out);
        assert_eq!(stream.state(), TransformState::Flushed);

        pull_all(&mut stream);
        assert_eq!(stream.available(), 0);
        assert_eq!(stream.state(), TransformState::Idle);
    }

    #[test]
    fn test_flush_with_nothing_buffered_is_idle() {
        let mut stream = identity();
        stream.flush();
        assert_eq!(stream.state(), TransformState::Idle);
        assert_eq!(stream.available(), 0);
    }

    #[test]
    fn test_pull_respects_output_len() {
        let mut stream = identity();
        stream.push(&[200; 100]);

        let mut out = [0i16; 16];
        assert_eq!(stream.pull(&mut out), 16);
        assert_eq!(stream.available(), 99 - 16);
        assert!(out.iter().all(|&s| s == unsigned_to_i16(200)));
    }

    #[test]
    fn test_volume_scales_output() {
        let mut stream = identity();
        stream.set_volume(0.5);
        stream.push(&[192; 10]);
        stream.flush();

        let output = pull_all(&mut stream);
        assert_eq!(output.len(), 10);
        assert!(output.iter().all(|&s| s == 8192));
    }

    #[test]
    fn test_volume_is_not_retroactive() {
        let mut stream = identity();
        stream.push(&[192; 4]);
        stream.set_volume(0.5);
        stream.push(&[192; 4]);
        stream.flush();

        let output = pull_all(&mut stream);
        assert_eq!(output, vec![16384, 16384, 16384, 16384, 8192, 8192, 8192, 8192]);
    }

    #[test]
    fn test_volume_saturates() {
        let mut stream = identity();
        stream.set_volume(MAX_VOLUME);
        stream.push(&[255, 0]);
        stream.flush();

        assert_eq!(pull_all(&mut stream), vec![i16::MAX, i16::MIN]);
    }

    #[test]
    fn test_speed_up_shortens_output() {
        let mut stream = identity();
        stream.set_speed(2.0);
        stream.push(&[160; 1000]);
        stream.flush();

        let len = stream.available();
        assert!((499..=501).contains(&len), "got {len}");
    }

    #[test]
    fn test_slow_down_lengthens_output() {
        let mut stream = identity();
        stream.set_speed(0.5);
        stream.push(&[160; 1000]);
        stream.flush();

        let len = stream.available();
        assert!((1998..=2002).contains(&len), "got {len}");
        assert!(pull_all(&mut stream).iter().all(|&s| s == unsigned_to_i16(160)));
    }

    #[test]
    fn test_speed_interpolates_between_samples() {
        let mut stream = identity();
        stream.set_speed(0.5);
        stream.push(&[128, 136]);
        stream.flush();

        // 0 then the midpoint towards 8 << 8, then the held last sample.
        let output = pull_all(&mut stream);
        assert_eq!(&output[..2], &[0, 1024]);
        assert!(output[2..].iter().all(|&s| s == 2048));
    }

    #[test]
    fn test_setters_clamp_and_ignore_non_finite() {
        let mut stream = identity();
        assert_eq!(stream.volume(), 1.0);
        assert_eq!(stream.speed(), 1.0);

        stream.set_volume(-1.0);
        assert_eq!(stream.volume(), 0.0);
        stream.set_volume(100.0);
        assert_eq!(stream.volume(), MAX_VOLUME);
        stream.set_volume(f32::NAN);
        assert_eq!(stream.volume(), MAX_VOLUME);

        stream.set_speed(0.0);
        assert_eq!(stream.speed(), MIN_SPEED);
        stream.set_speed(10.0);
        assert_eq!(stream.speed(), MAX_SPEED);
        stream.set_speed(f32::INFINITY);
        assert_eq!(stream.speed(), MAX_SPEED);
    }

    #[test]
    fn test_upsampling_length_is_exact_after_flush() {
        let config = StreamConfig::default().with_output_sample_rate(20000);
        let mut stream = ResampleStream::new(&config).unwrap();
        assert_eq!(stream.output_sample_rate(), 20000);

        stream.push(&[192; 1000]);
        stream.flush();
        assert_eq!(stream.available(), 2000);

        // A constant input stays constant away from the edges.
        let output = pull_all(&mut stream);
        let mid = output[1000];
        assert!((mid - 16384).abs() < 800, "got {mid}");
        assert_eq!(stream.state(), TransformState::Idle);
    }

    #[test]
    fn test_downsampling_length_is_exact_after_flush() {
        let config = StreamConfig::default().with_output_sample_rate(8000);
        let mut stream = ResampleStream::new(&config).unwrap();

        stream.push(&[100; 700]);
        stream.push(&[100; 300]);
        stream.flush();
        assert_eq!(stream.available(), 800);
    }

    #[test]
    fn test_resampler_resets_between_utterances() {
        let config = StreamConfig::default().with_output_sample_rate(16000);
        let mut stream = ResampleStream::new(&config).unwrap();
        let input: Vec<u8> = (0..600u32).map(|i| (i % 97) as u8 + 80).collect();

        stream.push(&input);
        stream.flush();
        let first = pull_all(&mut stream);

        stream.push(&input);
        stream.flush();
        let second = pull_all(&mut stream);

        assert_eq!(first.len(), 960);
        assert_eq!(first, second);
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let config = StreamConfig::default().with_block_size(0);
        assert!(matches!(ResampleStream::new(&config), Err(TtsError::Config(_))));
    }

    #[test]
    fn test_oversized_block_is_resource_exhausted() {
        let config = StreamConfig::default().with_block_size(usize::MAX / 4);
        assert!(matches!(
            ResampleStream::new(&config),
            Err(TtsError::ResourceExhausted(_))
        ));
    }
}
