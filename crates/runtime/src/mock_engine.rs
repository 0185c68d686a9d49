//! Deterministic synthesis engine for tests and benchmarks.

use tracing::debug;
use tts_core::{BurstControl, SynthesisEngine, TtsError, TtsResult, VoiceConfig, VoiceFlags};

/// Burst sizes cycled through in text mode, chosen to be irregular.
const BURST_PATTERN: [usize; 6] = [347, 512, 129, 800, 61, 233];

/// Samples per input byte at 100% speech rate.
const BASE_TONE_SAMPLES: usize = 400;

/// Peak amplitude of the generated tone (signed 8-bit).
const TONE_AMPLITUDE: i8 = 64;

/// Mock engine producing signed 8-bit audio in irregular bursts.
///
/// Two modes:
/// - scripted: replays a fixed list of burst sizes, ignoring the text
/// - text: renders a square tone per input byte, shaped by [`VoiceConfig`]
///
/// Scripted sample `j` of an utterance is `(j % 200) - 100`, so callers can
/// predict exactly what reaches the consumer.
#[derive(Debug, Default)]
pub struct MockEngine {
    script: Option<Vec<usize>>,
    failure: Option<String>,
    bursts_emitted: usize,
}

impl MockEngine {
    /// Create a text-mode engine.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a scripted engine emitting bursts of the given sizes.
    pub fn with_bursts(sizes: Vec<usize>) -> Self {
        Self {
            script: Some(sizes),
            ..Self::default()
        }
    }

    /// Report `message` as an engine error after the bursts are emitted.
    pub fn with_failure(mut self, message: impl Into<String>) -> Self {
        self.failure = Some(message.into());
        self
    }

    /// Bursts emitted across all calls.
    pub fn bursts_emitted(&self) -> usize {
        self.bursts_emitted
    }

    /// Signed sample at position `index` of a scripted utterance.
    pub fn scripted_sample(index: usize) -> i8 {
        ((index % 200) as i16 - 100) as i8
    }

    /// Render `text` to signed 8-bit PCM, stored as raw bytes.
    pub fn render(config: &VoiceConfig, text: &[u8]) -> Vec<u8> {
        let rate = config.speech_rate.max(1) as usize;
        let pitch = config.voice_pitch.max(1) as usize;
        let tone_len = (BASE_TONE_SAMPLES * 100 / rate).max(1);
        let amplitude = if config.flags.contains(VoiceFlags::ALTERNATIVE_VOICE) {
            TONE_AMPLITUDE / 2
        } else {
            TONE_AMPLITUDE
        };

        let mut pcm = Vec::with_capacity(tone_len * text.len());
        for &byte in text {
            if byte.is_ascii_whitespace() {
                pcm.resize(pcm.len() + tone_len, 0);
                continue;
            }

            let period = ((20 + usize::from(byte % 16)) * 100 / pitch).max(2);
            pcm.extend((0..tone_len).map(|i| {
                let level = if i % period < period / 2 {
                    amplitude
                } else {
                    -amplitude
                };
                level as u8
            }));
        }
        pcm
    }

    fn scripted_pcm(sizes: &[usize]) -> Vec<u8> {
        let total: usize = sizes.iter().sum();
        (0..total).map(|j| Self::scripted_sample(j) as u8).collect()
    }
}

impl SynthesisEngine for MockEngine {
    type Config = VoiceConfig;

    fn synthesize(
        &mut self,
        config: &VoiceConfig,
        text: &[u8],
        block_capacity: usize,
        on_burst: &mut dyn FnMut(&mut [u8]) -> BurstControl,
    ) -> TtsResult<()> {
        let (mut pcm, sizes) = match &self.script {
            Some(sizes) => (Self::scripted_pcm(sizes), sizes.clone()),
            None => {
                let pcm = Self::render(config, text);
                let cap = block_capacity.max(1);
                let mut sizes = Vec::new();
                let mut left = pcm.len();
                for &size in BURST_PATTERN.iter().cycle() {
                    if left == 0 {
                        break;
                    }
                    let size = size.min(cap).min(left);
                    sizes.push(size);
                    left -= size;
                }
                (pcm, sizes)
            }
        };

        let mut offset = 0;
        for size in sizes {
            let burst = &mut pcm[offset..offset + size];
            offset += size;
            self.bursts_emitted += 1;

            if on_burst(burst).is_stop() {
                debug!(emitted = self.bursts_emitted, "Engine stopped by callback");
                return Ok(());
            }
        }

        match &self.failure {
            Some(message) => Err(TtsError::engine(message.clone())),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect(engine: &mut MockEngine, text: &[u8]) -> Vec<Vec<u8>> {
        let mut bursts = Vec::new();
        engine
            .synthesize(&VoiceConfig::default(), text, 4096, &mut |burst: &mut [u8]| {
                bursts.push(burst.to_vec());
                BurstControl::Continue
            })
            .unwrap();
        bursts
    }

    #[test]
    fn test_scripted_bursts() {
        let mut engine = MockEngine::with_bursts(vec![3, 0, 5]);
        let bursts = collect(&mut engine, b"ignored");

        assert_eq!(bursts.iter().map(Vec::len).collect::<Vec<_>>(), vec![3, 0, 5]);
        assert_eq!(bursts[2][0] as i8, MockEngine::scripted_sample(3));
        assert_eq!(engine.bursts_emitted(), 3);
    }

    #[test]
    fn test_scripted_sample_range() {
        assert_eq!(MockEngine::scripted_sample(0), -100);
        assert_eq!(MockEngine::scripted_sample(199), 99);
        assert_eq!(MockEngine::scripted_sample(200), -100);
    }

    #[test]
    fn test_text_mode_bursts_are_bounded() {
        let mut engine = MockEngine::new();
        let bursts = collect(&mut engine, b"privet mir");

        let total: usize = bursts.iter().map(Vec::len).sum();
        assert_eq!(total, 10 * BASE_TONE_SAMPLES);
        assert!(bursts.iter().all(|b| !b.is_empty() && b.len() <= 800));
        assert!(bursts.len() > 4);
    }

    #[test]
    fn test_burst_size_respects_capacity() {
        let mut engine = MockEngine::new();
        let mut max = 0;
        engine
            .synthesize(&VoiceConfig::default(), b"abc", 100, &mut |burst: &mut [u8]| {
                max = max.max(burst.len());
                BurstControl::Continue
            })
            .unwrap();
        assert_eq!(max, 100);
    }

    #[test]
    fn test_speech_rate_scales_length() {
        let normal = MockEngine::render(&VoiceConfig::default(), b"ab");
        let fast = MockEngine::render(&VoiceConfig::default().with_speech_rate(200), b"ab");
        assert_eq!(fast.len() * 2, normal.len());
    }

    #[test]
    fn test_whitespace_is_silent() {
        let pcm = MockEngine::render(&VoiceConfig::default(), b" ");
        assert!(pcm.iter().all(|&b| b == 0));
    }

    #[test]
    fn test_alternative_voice_is_quieter() {
        let voice = VoiceConfig::default().with_alternative_voice(true);
        let pcm = MockEngine::render(&voice, b"a");
        assert!(pcm.iter().all(|&b| (b as i8).abs() == TONE_AMPLITUDE / 2));
    }

    #[test]
    fn test_stop_halts_engine() {
        let mut engine = MockEngine::with_bursts(vec![10; 5]);
        let mut calls = 0;
        engine
            .synthesize(&VoiceConfig::default(), b"", 4096, &mut |_: &mut [u8]| {
                calls += 1;
                if calls == 2 {
                    BurstControl::Stop
                } else {
                    BurstControl::Continue
                }
            })
            .unwrap();

        assert_eq!(calls, 2);
        assert_eq!(engine.bursts_emitted(), 2);
    }

    #[test]
    fn test_failure_is_reported() {
        let mut engine = MockEngine::with_bursts(vec![4]).with_failure("voice data missing");
        let result = engine.synthesize(&VoiceConfig::default(), b"", 4096, &mut |_: &mut [u8]| {
            BurstControl::Continue
        });
        assert!(matches!(result, Err(TtsError::Engine(_))));
        assert_eq!(engine.bursts_emitted(), 1);
    }
}
