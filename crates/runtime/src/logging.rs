//! Structured logging setup with tracing.
//!
//! The library crates only emit `tracing` events; hosts call one of the
//! `init_*` functions here to get them printed.

use tracing_subscriber::{
    EnvFilter,
    fmt::{self, format::FmtSpan},
    prelude::*,
};
use tts_core::LoggingConfig;

/// Logging format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable text format.
    #[default]
    Text,
    /// JSON format for structured logging.
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" | "pretty" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            _ => Err(format!("unknown log format: {s}")),
        }
    }
}

/// Install a global subscriber.
///
/// `RUST_LOG`, when set, overrides `level`. Returns `false` if a global
/// subscriber was already installed.
///
/// # Example
/// ```ignore
/// use runtime::logging::{LogFormat, init_logging};
/// init_logging("debug", LogFormat::Text);
/// ```
pub fn init_logging(level: &str, format: LogFormat) -> bool {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let registry = tracing_subscriber::registry().with(env_filter);

    let installed = match format {
        LogFormat::Text => registry
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_span_events(FmtSpan::CLOSE),
            )
            .try_init(),
        LogFormat::Json => registry
            .with(
                fmt::layer()
                    .json()
                    .with_target(true)
                    .with_current_span(true)
                    .with_span_events(FmtSpan::CLOSE),
            )
            .try_init(),
    };

    installed.is_ok()
}

/// Install a global subscriber from a [`LoggingConfig`].
///
/// An unrecognised format falls back to text.
pub fn init_logging_from_config(config: &LoggingConfig) -> bool {
    let format = config.format.parse().unwrap_or_default();
    init_logging(&config.level, format)
}

/// Initialize logging from environment variables.
///
/// Uses:
/// - `RUST_LOG` for log level (default: "info")
/// - `LOG_FORMAT` for format (default: "text")
pub fn init_logging_from_env() -> bool {
    let level = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    let format: LogFormat = std::env::var("LOG_FORMAT")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or_default();

    init_logging(&level, format)
}
