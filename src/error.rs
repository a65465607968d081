//! Custom error types for the bridge.
//!
//! Two error types cover the whole crate:
//!
//! - **`HardwareError`**: the status returned by every capability-layer call.
//!   Each variant classifies into a [`StatusClass`] so the capture controller
//!   can tell a transient "still capturing" status (retry with stop) from an
//!   expected enumeration gap (skip silently) and a hard failure (log with the
//!   numeric code and move on).
//! - **`BridgeError`**: the application error used by configuration loading
//!   and the TCP server. Hardware errors convert into it with `?`.
//!
//! Protocol and validation problems are not errors: a bad line
//! is logged and reported as not handled, an out-of-range value is clamped.

use thiserror::Error;

/// Convenience alias for results using the application error type.
pub type BridgeResult<T> = std::result::Result<T, BridgeError>;

/// Result type alias for capability-layer calls.
pub type HardwareResult<T> = std::result::Result<T, HardwareError>;

/// How the core reacts to a capability-layer status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusClass {
    /// Device still busy with a previous capture; stop and retry.
    Transient,
    /// Invalid timebase/channel combination met while enumerating.
    EnumerationGap,
    /// Anything else. Logged with the numeric code.
    Hard,
}

/// Status of a failed capability-layer call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HardwareError {
    /// A previous block capture is still running
    #[error("hardware still capturing, stop required")]
    StillCapturing,

    /// Timebase index not valid for the current configuration
    #[error("invalid timebase {index}")]
    InvalidTimebase { index: u32 },

    /// Channel not valid for the current configuration
    #[error("invalid channel")]
    InvalidChannel,

    /// Operation requires at least one enabled channel
    #[error("no channels enabled")]
    NoChannelsEnabled,

    /// Digital pod probe found nothing attached
    #[error("no digital pod connected on pod {pod}")]
    NoPodConnected { pod: u8 },

    /// Operation not supported by this instrument family
    #[error("operation not supported: {operation}")]
    NotSupported { operation: &'static str },

    /// Any other vendor status
    #[error("hardware call failed with code {code:#x}")]
    Failure { code: u32 },
}

impl HardwareError {
    const STILL_CAPTURING: u32 = 0x0000_0182;
    const INVALID_TIMEBASE: u32 = 0x0000_000E;
    const INVALID_CHANNEL: u32 = 0x0000_000A;
    const NO_CHANNELS_ENABLED: u32 = 0x0000_0046;
    const NO_POD_CONNECTED: u32 = 0x0000_0184;
    const NOT_SUPPORTED: u32 = 0x0000_0059;

    /// Numeric status code, as reported in logs.
    pub fn code(&self) -> u32 {
        match self {
            Self::StillCapturing => Self::STILL_CAPTURING,
            Self::InvalidTimebase { .. } => Self::INVALID_TIMEBASE,
            Self::InvalidChannel => Self::INVALID_CHANNEL,
            Self::NoChannelsEnabled => Self::NO_CHANNELS_ENABLED,
            Self::NoPodConnected { .. } => Self::NO_POD_CONNECTED,
            Self::NotSupported { .. } => Self::NOT_SUPPORTED,
            Self::Failure { code } => *code,
        }
    }

    /// Classify this status for retry and logging decisions.
    pub fn classify(&self) -> StatusClass {
        match self {
            Self::StillCapturing => StatusClass::Transient,
            Self::InvalidTimebase { .. } | Self::InvalidChannel | Self::NoChannelsEnabled => {
                StatusClass::EnumerationGap
            }
            Self::NoPodConnected { .. } | Self::NotSupported { .. } | Self::Failure { .. } => {
                StatusClass::Hard
            }
        }
    }

    /// True for the "stop and run again" status.
    pub fn is_transient(&self) -> bool {
        self.classify() == StatusClass::Transient
    }
}

/// Application-level error.
#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Configuration error: {0}")]
    Config(#[from] Box<figment::Error>),

    #[error("Configuration validation error: {0}")]
    Configuration(String),

    #[error("Failed to serialize configuration: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Hardware error: {0}")]
    Hardware(#[from] HardwareError),

    #[error("Unknown instrument family '{0}'")]
    UnknownFamily(String),
}

impl From<figment::Error> for BridgeError {
    fn from(err: figment::Error) -> Self {
        BridgeError::Config(Box::new(err))
    }
}
