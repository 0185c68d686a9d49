//! Configuration structures for the synthesis session.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{TtsError, TtsResult};

/// Streaming pipeline configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamConfig {
    /// Samples per delivered block (also the scratch buffer capacity).
    #[serde(default = "default_block_size")]
    pub block_size: usize,
    /// Sample rate of the engine's output in Hz.
    #[serde(default = "default_sample_rate")]
    pub input_sample_rate: u32,
    /// Sample rate of delivered blocks in Hz.
    #[serde(default = "default_sample_rate")]
    pub output_sample_rate: u32,
    /// Input frames per resampler chunk (only used when rates differ).
    #[serde(default = "default_resampler_chunk")]
    pub resampler_chunk: usize,
}

fn default_block_size() -> usize {
    4096
}

fn default_sample_rate() -> u32 {
    10000
}

fn default_resampler_chunk() -> usize {
    256
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            block_size: default_block_size(),
            input_sample_rate: default_sample_rate(),
            output_sample_rate: default_sample_rate(),
            resampler_chunk: default_resampler_chunk(),
        }
    }
}

impl StreamConfig {
    /// Set the block size.
    pub fn with_block_size(mut self, block_size: usize) -> Self {
        self.block_size = block_size;
        self
    }

    /// Set the output sample rate.
    pub fn with_output_sample_rate(mut self, rate: u32) -> Self {
        self.output_sample_rate = rate;
        self
    }

    /// Check whether the stream needs a rate conversion stage.
    pub fn needs_resampling(&self) -> bool {
        self.input_sample_rate != self.output_sample_rate
    }

    /// Reject values the pipeline cannot run with.
    pub fn validate(&self) -> TtsResult<()> {
        if self.block_size == 0 {
            return Err(TtsError::config("block_size must be non-zero"));
        }
        if self.input_sample_rate == 0 || self.output_sample_rate == 0 {
            return Err(TtsError::config("sample rates must be non-zero"));
        }
        if self.needs_resampling() && self.resampler_chunk == 0 {
            return Err(TtsError::config("resampler_chunk must be non-zero"));
        }
        Ok(())
    }
}

bitflags::bitflags! {
    /// Engine behaviour switches.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
    pub struct VoiceFlags: u32 {
        /// Treat '.' as the decimal separator.
        const DEC_SEP_POINT = 1;
        /// Treat ',' as the decimal separator.
        const DEC_SEP_COMMA = 2;
        /// Use the alternative (female) voice.
        const ALTERNATIVE_VOICE = 4;
    }
}

/// Voice parameters passed to the synthesis engine on every utterance.
///
/// Gap factors are percentages of the engine's natural pause length.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoiceConfig {
    #[serde(default = "default_percent")]
    pub speech_rate: i32,
    #[serde(default = "default_percent")]
    pub voice_pitch: i32,
    #[serde(default = "default_percent")]
    pub intonation: i32,
    #[serde(default = "default_percent")]
    pub general_gap_factor: i32,
    #[serde(default = "default_percent")]
    pub comma_gap_factor: i32,
    #[serde(default = "default_percent")]
    pub dot_gap_factor: i32,
    #[serde(default = "default_percent")]
    pub semicolon_gap_factor: i32,
    #[serde(default = "default_percent")]
    pub colon_gap_factor: i32,
    #[serde(default = "default_percent")]
    pub question_gap_factor: i32,
    #[serde(default = "default_percent")]
    pub exclamation_gap_factor: i32,
    #[serde(default = "default_percent")]
    pub intonational_gap_factor: i32,
    #[serde(default = "VoiceFlags::empty")]
    pub flags: VoiceFlags,
}

fn default_percent() -> i32 {
    100
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            speech_rate: default_percent(),
            voice_pitch: default_percent(),
            intonation: default_percent(),
            general_gap_factor: default_percent(),
            comma_gap_factor: default_percent(),
            dot_gap_factor: default_percent(),
            semicolon_gap_factor: default_percent(),
            colon_gap_factor: default_percent(),
            question_gap_factor: default_percent(),
            exclamation_gap_factor: default_percent(),
            intonational_gap_factor: default_percent(),
            flags: VoiceFlags::empty(),
        }
    }
}

impl VoiceConfig {
    /// Set the speech rate.
    pub fn with_speech_rate(mut self, rate: i32) -> Self {
        self.speech_rate = rate;
        self
    }

    /// Set the voice pitch.
    pub fn with_voice_pitch(mut self, pitch: i32) -> Self {
        self.voice_pitch = pitch;
        self
    }

    /// Select the alternative voice.
    pub fn with_alternative_voice(mut self, enabled: bool) -> Self {
        self.flags.set(VoiceFlags::ALTERNATIVE_VOICE, enabled);
        self
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level.
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Output format (json or text).
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

/// Top-level configuration for a host embedding the session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuntimeConfig {
    #[serde(default)]
    pub stream: StreamConfig,
    #[serde(default)]
    pub voice: VoiceConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl RuntimeConfig {
    /// Parse configuration from a JSON string. Missing fields take defaults.
    pub fn from_json_str(text: &str) -> TtsResult<Self> {
        let config: Self =
            serde_json::from_str(text).map_err(|e| TtsError::serialization(e.to_string()))?;
        config.stream.validate()?;
        Ok(config)
    }

    /// Load configuration from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> TtsResult<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_config_default() {
        let config = StreamConfig::default();
        assert_eq!(config.block_size, 4096);
        assert_eq!(config.input_sample_rate, 10000);
        assert_eq!(config.output_sample_rate, 10000);
        assert!(!config.needs_resampling());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_stream_config_validation() {
        let config = StreamConfig::default().with_block_size(0);
        assert!(matches!(config.validate(), Err(TtsError::Config(_))));

        let config = StreamConfig::default().with_output_sample_rate(0);
        assert!(config.validate().is_err());

        let config = StreamConfig {
            resampler_chunk: 0,
            ..StreamConfig::default().with_output_sample_rate(22050)
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_voice_config_default() {
        let voice = VoiceConfig::default();
        assert_eq!(voice.speech_rate, 100);
        assert_eq!(voice.voice_pitch, 100);
        assert!(voice.flags.is_empty());

        let voice = voice.with_alternative_voice(true);
        assert!(voice.flags.contains(VoiceFlags::ALTERNATIVE_VOICE));
        let voice = voice.with_alternative_voice(false);
        assert!(voice.flags.is_empty());
    }

    #[test]
    fn test_runtime_config_partial_json() {
        let json = r#"{ "stream": { "block_size": 1024 }, "voice": { "speech_rate": 150 } }"#;
        let config = RuntimeConfig::from_json_str(json).unwrap();
        assert_eq!(config.stream.block_size, 1024);
        assert_eq!(config.stream.input_sample_rate, 10000);
        assert_eq!(config.voice.speech_rate, 150);
        assert_eq!(config.voice.voice_pitch, 100);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_runtime_config_rejects_invalid() {
        let err = RuntimeConfig::from_json_str("{ not json").unwrap_err();
        assert!(matches!(err, TtsError::Serialization(_)));

        let err = RuntimeConfig::from_json_str(r#"{ "stream": { "block_size": 0 } }"#).unwrap_err();
        assert!(matches!(err, TtsError::Config(_)));
    }

    #[test]
    fn test_runtime_config_from_file() {
        use std::io::Write;

        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{ "stream": {{ "output_sample_rate": 22050 }}, "logging": {{ "format": "json" }} }}"#
        )
        .unwrap();

        let config = RuntimeConfig::from_json_file(file.path()).unwrap();
        assert_eq!(config.stream.output_sample_rate, 22050);
        assert!(config.stream.needs_resampling());
        assert_eq!(config.logging.format, "json");

        let missing = RuntimeConfig::from_json_file("/nonexistent/session.json");
        assert!(matches!(missing, Err(TtsError::Io(_))));
    }
}
