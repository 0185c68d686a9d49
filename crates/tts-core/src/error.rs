//! Unified error types for the synthesis session.

/// Main error type for session operations.
#[derive(Debug, thiserror::Error)]
pub enum TtsError {
    /// A required argument was missing or malformed.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A buffer or stream could not be allocated.
    #[error("resource exhausted: {0}")]
    ResourceExhausted(String),

    /// The transform stream accepted none of the offered bytes.
    #[error("transform stream rejected {offered} bytes")]
    TransformRejected { offered: usize },

    /// The transform stream failed internally (rate conversion).
    #[error("transform stream error: {0}")]
    Transform(String),

    /// The synthesis engine reported a failure.
    #[error("synthesis engine error: {0}")]
    Engine(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Convenience type alias for Results with TtsError.
pub type TtsResult<T> = Result<T, TtsError>;

impl TtsError {
    /// Create an invalid argument error with message.
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    /// Create a resource exhausted error with message.
    pub fn resource_exhausted(msg: impl Into<String>) -> Self {
        Self::ResourceExhausted(msg.into())
    }

    /// Create a transform error with message.
    pub fn transform(msg: impl Into<String>) -> Self {
        Self::Transform(msg.into())
    }

    /// Create an engine error with message.
    pub fn engine(msg: impl Into<String>) -> Self {
        Self::Engine(msg.into())
    }

    /// Create a config error with message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a serialization error with message.
    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::Serialization(msg.into())
    }
}

impl From<std::collections::TryReserveError> for TtsError {
    fn from(err: std::collections::TryReserveError) -> Self {
        Self::ResourceExhausted(err.to_string())
    }
}
