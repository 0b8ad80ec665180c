//! Error types for smartzipper-core.
//!
//! Two layers of failure exist:
//!
//! - [`LinkError`] describes why a connection attempt ended in the `Error`
//!   state. Those failures are reported through the service's state and event
//!   channels, never returned from a call.
//! - [`Error`] is what fallible library calls return: transport operations,
//!   configuration handling and commands sent to a service that has already
//!   shut down.
//!
//! ## Recovery
//!
//! | Error Type | Strategy |
//! |------------|----------|
//! | [`Error::Link`] | Fix the cause, then issue a fresh `connect()` |
//! | [`Error::Bluetooth`] | Surface to the user; the attempt is not retried |
//! | [`Error::PeripheralNotFound`] | Check the address and that the device is advertising |
//! | [`Error::Transport`] | Surface to the user; the attempt is not retried |
//! | [`Error::InvalidConfig`] | Fix configuration and restart |
//! | [`Error::ServiceClosed`] | Spawn a new service |

use std::time::Duration;

use thiserror::Error;

pub use smartzipper_types::LinkError;

/// Errors returned by smartzipper-core operations.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new error variants
/// in future versions without breaking downstream code.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// A link-level failure.
    #[error(transparent)]
    Link(#[from] LinkError),

    /// Bluetooth Low Energy error.
    #[error("Bluetooth error: {0}")]
    Bluetooth(#[from] btleplug::Error),

    /// The configured peripheral could not be located.
    #[error("Peripheral {address} not found after {duration:?}")]
    PeripheralNotFound {
        /// The address that was searched for.
        address: String,
        /// How long the search ran.
        duration: Duration,
    },

    /// The transport could not carry out a request.
    #[error("Transport error: {0}")]
    Transport(String),

    /// An operation was issued for a session the transport does not know.
    #[error("Unknown session {0}")]
    UnknownSession(u64),

    /// Operation timed out.
    #[error("Operation '{operation}' timed out after {duration:?}")]
    Timeout {
        /// The operation that timed out.
        operation: String,
        /// The timeout duration.
        duration: Duration,
    },

    /// The monitor service has shut down and no longer accepts commands.
    #[error("Monitor service is closed")]
    ServiceClosed,

    /// I/O error.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Invalid configuration provided.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl Error {
    /// Create a timeout error with operation context.
    pub fn timeout(operation: impl Into<String>, duration: Duration) -> Self {
        Self::Timeout {
            operation: operation.into(),
            duration,
        }
    }

    /// Create a configuration error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig(message.into())
    }
}

impl From<smartzipper_types::ParseError> for Error {
    fn from(err: smartzipper_types::ParseError) -> Self {
        Error::InvalidConfig(err.to_string())
    }
}

/// Result type alias using smartzipper-core's Error type.
pub type Result<T> = std::result::Result<T, Error>;
