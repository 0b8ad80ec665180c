//! Error types shared by every SmartZipper crate.

use thiserror::Error;

/// Errors that can occur when parsing identifiers or sensor data.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new error variants
/// in future versions without breaking downstream code.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ParseError {
    /// The text is not a `XX:XX:XX:XX:XX:XX` Bluetooth address.
    #[error("Invalid device address '{0}': expected six hex octets separated by ':'")]
    InvalidAddress(String),

    /// Failed to parse data.
    #[error("Invalid data: {0}")]
    InvalidData(String),
}

/// Result type alias using smartzipper-types' ParseError type.
pub type ParseResult<T> = std::result::Result<T, ParseError>;

/// Reasons a link attempt ends in the `Error` state.
///
/// Every variant is terminal for the current attempt and is never retried
/// automatically; a fresh `connect()` is required.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "kind", content = "detail", rename_all = "snake_case"))]
#[non_exhaustive]
pub enum LinkError {
    /// No Bluetooth adapter is present.
    #[error("No Bluetooth adapter available")]
    TransportUnavailable,

    /// The adapter exists but its radio is off.
    #[error("Bluetooth is disabled, please enable Bluetooth")]
    RadioDisabled,

    /// The connect request itself failed.
    #[error("Connect request failed: {0}")]
    ConnectRequestFailed(String),

    /// Service discovery succeeded but the hall service or characteristic is absent.
    #[error("Hall sensor service not found on device")]
    ServiceNotFound,

    /// Service discovery reported a failure.
    #[error("Service discovery failed: {0}")]
    ServiceDiscoveryFailed(String),

    /// Enabling notifications failed.
    #[error("Notification subscription failed: {0}")]
    SubscriptionFailed(String),
}

impl LinkError {
    /// Short machine-friendly name of the failure kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::TransportUnavailable => "transport_unavailable",
            Self::RadioDisabled => "radio_disabled",
            Self::ConnectRequestFailed(_) => "connect_request_failed",
            Self::ServiceNotFound => "service_not_found",
            Self::ServiceDiscoveryFailed(_) => "service_discovery_failed",
            Self::SubscriptionFailed(_) => "subscription_failed",
        }
    }
}
