//! Error handling for the EEG inference stack
//!
//! One error type covers the buffer, the processing pipeline and the runtime
//! boundaries (source, model, sinks), so failures keep their structure all the
//! way up to the orchestrator's logs.

use std::fmt;

/// Result type alias for EEG stack operations
pub type EegResult<T> = Result<T, EegError>;

/// Error type for all EEG stack operations
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum EegError {
    /// Requested window is longer than the buffer can hold
    OutOfRange {
        /// Requested window length in time steps
        requested: usize,
        /// Buffer capacity in time steps
        capacity: usize,
    },

    /// Window too short for the configured filter or segment length
    InsufficientSamples {
        /// Minimum number of time steps required
        required: usize,
        /// Number of time steps provided
        actual: usize,
    },

    /// Invalid configuration detected at construction or validation time
    ConfigurationError {
        /// Description of the configuration error
        message: String,
    },

    /// Channel count of the data does not match what the consumer expects
    ChannelMismatch {
        /// Expected channel count
        expected: usize,
        /// Actual channel count
        actual: usize,
    },

    /// Upstream sample source failed or disconnected
    SourceError {
        /// Name of the failing source
        source_name: String,
        /// Description of the failure
        message: String,
    },

    /// A result sink failed or timed out
    SinkError {
        /// Name of the failing sink
        sink: String,
        /// Description of the failure
        message: String,
    },

    /// The inference boundary rejected its input or returned a bad shape
    InferenceError {
        /// Description of the failure
        message: String,
    },

    /// Unexpected failure inside the processing pipeline
    ProcessingError {
        /// Description of the failure
        message: String,
    },
}

impl EegError {
    /// Whether this error should stop the process before the cycle loop starts
    pub fn is_setup_error(&self) -> bool {
        matches!(
            self,
            EegError::OutOfRange { .. }
                | EegError::InsufficientSamples { .. }
                | EegError::ConfigurationError { .. }
        )
    }
}

impl fmt::Display for EegError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EegError::OutOfRange { requested, capacity } => {
                write!(f, "Window out of range: requested {} samples, buffer capacity {}",
                       requested, capacity)
            }
            EegError::InsufficientSamples { required, actual } => {
                write!(f, "Insufficient samples: need at least {}, got {}",
                       required, actual)
            }
            EegError::ConfigurationError { message } => {
                write!(f, "Configuration error: {}", message)
            }
            EegError::ChannelMismatch { expected, actual } => {
                write!(f, "Channel mismatch: expected {} channels, got {}",
                       expected, actual)
            }
            EegError::SourceError { source_name, message } => {
                write!(f, "Source '{}' error: {}", source_name, message)
            }
            EegError::SinkError { sink, message } => {
                write!(f, "Sink '{}' error: {}", sink, message)
            }
            EegError::InferenceError { message } => {
                write!(f, "Inference error: {}", message)
            }
            EegError::ProcessingError { message } => {
                write!(f, "Processing error: {}", message)
            }
        }
    }
}

impl std::error::Error for EegError {}

/// Convenience macro for creating configuration errors
#[macro_export]
macro_rules! config_error {
    ($($arg:tt)*) => {
        $crate::error::EegError::ConfigurationError {
            message: format!($($arg)*),
        }
    };
}
