//! Synthesis session: bursts in, fixed-size blocks out.
//!
//! A session owns one transform stream, one block-sized scratch bus and one
//! wave consumer. Each `speak` call feeds engine bursts through the
//! transform and hands the consumer full blocks as soon as they exist, then
//! flushes and delivers the short tail when the engine is done.

use std::time::Instant;

use audio_stream::{ResampleStream, SampleBus, flip_sign_in_place};
use tracing::{debug, instrument, trace, warn};
use tts_core::{
    BurstControl, ConsumerAction, SpeakOutcome, SpeakReport, StreamConfig, SynthesisEngine,
    TransformStream, TtsError, TtsResult, WaveConsumer,
};
use uuid::Uuid;

use crate::metrics::SessionMetrics;

type BoxedConsumer = Box<dyn WaveConsumer + Send>;
type TransformFactory<T> = Box<dyn FnOnce(&StreamConfig) -> TtsResult<T>>;

/// Builder for [`SynthesisSession`].
pub struct SessionBuilder<T = ResampleStream> {
    config: StreamConfig,
    consumer: Option<BoxedConsumer>,
    make_transform: TransformFactory<T>,
}

impl Default for SessionBuilder<ResampleStream> {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionBuilder<ResampleStream> {
    /// Create a builder using [`ResampleStream`] and the default configuration.
    pub fn new() -> Self {
        Self {
            config: StreamConfig::default(),
            consumer: None,
            make_transform: Box::new(ResampleStream::new),
        }
    }
}

impl<T: TransformStream> SessionBuilder<T> {
    /// Set the stream configuration.
    pub fn with_config(mut self, config: StreamConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the wave consumer. Required.
    pub fn with_consumer(mut self, consumer: impl WaveConsumer + Send + 'static) -> Self {
        self.consumer = Some(Box::new(consumer));
        self
    }

    /// Use a caller-supplied transform stream instead of [`ResampleStream`].
    ///
    /// The transform is used as-is. The configured sample rates are not
    /// applied to it; only `block_size` still sizes the bus and the blocks.
    pub fn with_transform<U: TransformStream + 'static>(self, transform: U) -> SessionBuilder<U> {
        SessionBuilder {
            config: self.config,
            consumer: self.consumer,
            make_transform: Box::new(move |_| Ok(transform)),
        }
    }

    /// Allocate the transform and the scratch bus and assemble the session.
    pub fn build(self) -> TtsResult<SynthesisSession<T>> {
        let consumer = self
            .consumer
            .ok_or_else(|| TtsError::invalid_argument("a wave consumer is required"))?;
        self.config.validate()?;

        let transform = (self.make_transform)(&self.config)?;
        let bus = SampleBus::new(self.config.block_size)?;

        let id = Uuid::new_v4();
        debug!(session = %id, block_size = self.config.block_size, "Created synthesis session");

        Ok(SynthesisSession {
            transform,
            bus,
            consumer,
            config: self.config,
            id,
            metrics: SessionMetrics,
        })
    }
}

/// Streaming synthesis session.
///
/// Sessions are reusable: any number of `speak` calls may run one after
/// another. The `&mut self` receivers rule out overlapping calls.
pub struct SynthesisSession<T = ResampleStream> {
    // Field order is drop order: transform, then bus, then consumer.
    transform: T,
    bus: SampleBus,
    consumer: BoxedConsumer,
    config: StreamConfig,
    id: Uuid,
    metrics: SessionMetrics,
}

impl SynthesisSession<ResampleStream> {
    /// Start building a session.
    pub fn builder() -> SessionBuilder<ResampleStream> {
        SessionBuilder::new()
    }

    /// Create a session with the default transform stream.
    pub fn new(consumer: impl WaveConsumer + Send + 'static, config: StreamConfig) -> TtsResult<Self> {
        Self::builder()
            .with_config(config)
            .with_consumer(consumer)
            .build()
    }
}

impl<T: TransformStream> SynthesisSession<T> {
    /// Unique id of this session, attached to its tracing spans.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Stream configuration the session was built with.
    pub fn config(&self) -> &StreamConfig {
        &self.config
    }

    /// The session's transform stream.
    pub fn transform(&self) -> &T {
        &self.transform
    }

    /// Set the output gain for audio synthesized from now on.
    pub fn set_volume(&mut self, volume: f32) {
        self.transform.set_volume(volume);
        debug!(session = %self.id, requested = volume, effective = self.transform.volume(), "Volume set");
    }

    /// Set the time-scale factor for audio synthesized from now on.
    pub fn set_speed(&mut self, speed: f32) {
        self.transform.set_speed(speed);
        debug!(session = %self.id, requested = speed, effective = self.transform.speed(), "Speed set");
    }

    /// Current gain.
    pub fn volume(&self) -> f32 {
        self.transform.volume()
    }

    /// Current time-scale factor.
    pub fn speed(&self) -> f32 {
        self.transform.speed()
    }

    /// Synthesize `text` and deliver it to the consumer in blocks.
    ///
    /// Every delivery except the last carries exactly one block. Failures
    /// never escape: consumer cancellation, a rejected push or an engine
    /// error are reported through [`SpeakReport::outcome`]. Whatever the
    /// outcome, the transform is flushed and empty when this returns.
    #[instrument(skip_all, fields(session = %self.id, text_len = text.len()))]
    pub fn speak<E>(&mut self, engine: &mut E, config: &E::Config, text: &[u8]) -> SpeakReport
    where
        E: SynthesisEngine + ?Sized,
    {
        let started = Instant::now();
        self.metrics.speak_started();

        let block_size = self.bus.capacity();
        let mut report = SpeakReport::default();
        let mut cancelled = false;
        let mut failure: Option<TtsError> = None;

        let Self {
            transform,
            bus,
            consumer,
            ..
        } = self;

        let mut on_burst = |burst: &mut [u8]| -> BurstControl {
            if cancelled || failure.is_some() {
                return BurstControl::Stop;
            }

            report.bursts += 1;
            if burst.is_empty() {
                return BurstControl::Continue;
            }

            flip_sign_in_place(burst);
            if transform.push(burst) == 0 {
                warn!(offered = burst.len(), "Transform stream rejected burst");
                failure = Some(TtsError::TransformRejected {
                    offered: burst.len(),
                });
                return BurstControl::Stop;
            }

            match deliver_blocks(&mut *transform, bus, &mut **consumer, block_size, &mut report) {
                ConsumerAction::Continue => BurstControl::Continue,
                ConsumerAction::Cancel => {
                    cancelled = true;
                    let discarded = drain_to_empty(&mut *transform, bus);
                    debug!(discarded, "Consumer cancelled utterance");
                    BurstControl::Stop
                }
            }
        };

        if let Err(err) = engine.synthesize(config, text, block_size, &mut on_burst) {
            warn!(error = %err, "Synthesis engine failed");
            if failure.is_none() && !cancelled {
                failure = Some(err);
            }
        }

        transform.flush();
        if cancelled {
            drain_to_empty(&mut *transform, bus);
        } else if deliver_blocks(&mut *transform, bus, &mut **consumer, 1, &mut report)
            == ConsumerAction::Cancel
        {
            cancelled = true;
            let discarded = drain_to_empty(&mut *transform, bus);
            debug!(discarded, "Consumer cancelled during final drain");
        }

        report.outcome = match failure {
            Some(err) => SpeakOutcome::Aborted(err),
            None if cancelled => SpeakOutcome::Cancelled,
            None => SpeakOutcome::Completed,
        };

        let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
        self.metrics.speak_finished(&report, elapsed_ms);
        debug!(
            bursts = report.bursts,
            blocks = report.blocks_delivered,
            samples = report.samples_delivered,
            cancelled = report.outcome.is_cancelled(),
            elapsed_ms,
            "Speak finished"
        );

        report
    }

    /// Release the session: transform first, then the bus, then the consumer.
    pub fn destroy(self) {
        debug!(session = %self.id, "Destroying synthesis session");
    }
}

impl<T: TransformStream> std::fmt::Debug for SynthesisSession<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SynthesisSession")
            .field("id", &self.id)
            .field("config", &self.config)
            .field("transform_state", &self.transform.state())
            .field("available", &self.transform.available())
            .finish_non_exhaustive()
    }
}

/// Hand the consumer blocks while at least `min_samples` are ready.
///
/// `min_samples` is the block size while the engine is running and `1` for
/// the final drain, so only the last block of an utterance can be short.
fn deliver_blocks<T: TransformStream + ?Sized>(
    transform: &mut T,
    bus: &mut SampleBus,
    consumer: &mut dyn WaveConsumer,
    min_samples: usize,
    report: &mut SpeakReport,
) -> ConsumerAction {
    while transform.available() >= min_samples.max(1) {
        let n = bus.fill_from(transform);
        if n == 0 {
            break;
        }

        report.blocks_delivered += 1;
        report.samples_delivered += n;
        trace!(samples = n, "Delivering block");

        if consumer.consume(bus.filled(n)) == ConsumerAction::Cancel {
            return ConsumerAction::Cancel;
        }
    }
    ConsumerAction::Continue
}

/// Pull and discard until the transform has nothing left.
fn drain_to_empty<T: TransformStream + ?Sized>(transform: &mut T, bus: &mut SampleBus) -> usize {
    let mut discarded = 0;
    loop {
        let n = bus.fill_from(transform);
        if n == 0 {
            return discarded;
        }
        discarded += n;
    }
}
