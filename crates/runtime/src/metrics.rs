//! Session metrics recorded through the `metrics` facade.
//!
//! Nothing is exported from here; a host that wants the numbers installs its
//! own recorder. Without one every call is a no-op.

use metrics::{counter, describe_counter, describe_histogram, histogram};
use tts_core::{SpeakOutcome, SpeakReport};

/// Metrics recorder for synthesis sessions.
#[derive(Debug, Clone, Copy, Default)]
pub struct SessionMetrics;

impl SessionMetrics {
    /// Register metric descriptions with the installed recorder.
    pub fn describe() {
        describe_counter!("tts_stream_speak_total", "Total number of speak calls");
        describe_counter!(
            "tts_stream_blocks_delivered",
            "Blocks handed to wave consumers"
        );
        describe_counter!(
            "tts_stream_samples_delivered",
            "Samples handed to wave consumers"
        );
        describe_counter!(
            "tts_stream_cancellations",
            "Utterances cancelled by the consumer"
        );
        describe_counter!(
            "tts_stream_aborts",
            "Utterances aborted by a transform or engine failure"
        );
        describe_histogram!("tts_stream_speak_ms", "Wall time of a speak call in milliseconds");
    }

    /// Record the start of a speak call.
    pub fn speak_started(&self) {
        counter!("tts_stream_speak_total").increment(1);
    }

    /// Record the totals of a finished speak call.
    pub fn speak_finished(&self, report: &SpeakReport, elapsed_ms: f64) {
        counter!("tts_stream_blocks_delivered").increment(report.blocks_delivered as u64);
        counter!("tts_stream_samples_delivered").increment(report.samples_delivered as u64);

        match report.outcome {
            SpeakOutcome::Completed => {}
            SpeakOutcome::Cancelled => counter!("tts_stream_cancellations").increment(1),
            SpeakOutcome::Aborted(_) => counter!("tts_stream_aborts").increment(1),
        }

        histogram!("tts_stream_speak_ms").record(elapsed_ms);
    }
}
