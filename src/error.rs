//! Error handling for Convoplay
//!
//! Load failures are reported to the caller and never reach the audio
//! thread. Channel-count mismatches and a missing impulse response are
//! handled by policy in the convolution engine and have no error value.

use thiserror::Error;

/// Result type alias for Convoplay operations
pub type Result<T> = std::result::Result<T, ConvoError>;

/// Failure to decode an audio file or impulse response
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("File not found: {path}")]
    FileNotFound { path: String },

    #[error("I/O error reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Unsupported audio format: {format}")]
    UnsupportedFormat { format: String },

    #[error("Invalid audio data: {reason}")]
    InvalidAudio {
        reason: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl LoadError {
    /// Get the error code for this error type
    pub fn error_code(&self) -> &'static str {
        match self {
            LoadError::FileNotFound { .. } => "FILE_NOT_FOUND",
            LoadError::Io { .. } => "IO_ERROR",
            LoadError::UnsupportedFormat { .. } => "UNSUPPORTED_FORMAT",
            LoadError::InvalidAudio { .. } => "INVALID_AUDIO",
        }
    }

    /// True for the I/O family (missing file, read failure)
    pub fn is_io(&self) -> bool {
        matches!(self, LoadError::FileNotFound { .. } | LoadError::Io { .. })
    }
}

/// Main error type for Convoplay operations
#[derive(Error, Debug)]
pub enum ConvoError {
    #[error(transparent)]
    Load(#[from] LoadError),

    #[error("Configuration error: {reason}")]
    Config { reason: String },

    #[error("Invalid parameter '{param}': {value} (expected {expected})")]
    InvalidParameter {
        param: String,
        value: String,
        expected: String,
    },

    #[error("Unknown impulse response: {name}")]
    UnknownImpulse { name: String },

    #[error("Background worker '{worker}' is no longer running")]
    WorkerUnavailable { worker: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ConvoError {
    /// Get the error code for this error type
    pub fn error_code(&self) -> &'static str {
        match self {
            ConvoError::Load(e) => e.error_code(),
            ConvoError::Config { .. } => "CONFIG_ERROR",
            ConvoError::InvalidParameter { .. } => "INVALID_PARAMETER",
            ConvoError::UnknownImpulse { .. } => "UNKNOWN_IMPULSE",
            ConvoError::WorkerUnavailable { .. } => "WORKER_UNAVAILABLE",
            ConvoError::Io(_) => "IO_ERROR",
            ConvoError::Serialization(_) => "SERIALIZATION_ERROR",
        }
    }

    /// Check if this error is recoverable
    ///
    /// Every load failure leaves the last-known-good state in place, so the
    /// user can simply pick another file.
    pub fn is_recoverable(&self) -> bool {
        match self {
            ConvoError::Load(_) => true,
            ConvoError::UnknownImpulse { .. } => true,
            ConvoError::InvalidParameter { .. } => true,
            _ => false,
        }
    }

    /// Get recovery suggestions for this error
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            ConvoError::Load(LoadError::FileNotFound { .. }) => vec![
                "Check the file path is correct",
                "Verify the file hasn't been moved or deleted",
            ],
            ConvoError::Load(LoadError::UnsupportedFormat { .. }) => vec![
                "Convert the file to WAV format",
                "Supported sample formats: 8/16/24/32-bit integer, 32-bit float",
            ],
            ConvoError::Load(LoadError::InvalidAudio { .. }) => vec![
                "The file may be truncated or corrupted",
                "Try re-exporting it from the source application",
            ],
            ConvoError::UnknownImpulse { .. } => vec![
                "Run 'convoplay-cli list-irs' to see available impulse responses",
                "Pass a path to a WAV file instead of a name",
            ],
            ConvoError::Config { .. } | ConvoError::InvalidParameter { .. } => vec![
                "Check the configuration file against the documented defaults",
            ],
            _ => vec![],
        }
    }
}
