//! Core types for the SmartZipper link and its hall-sensor values.

use core::fmt;
use core::str::FromStr;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::ParseError;

/// Lifecycle of the wireless link.
///
/// The progression is linear:
///
/// ```text
/// Disconnected -> Connecting -> Connected -> DiscoveringServices -> Ready
/// ```
///
/// `Error` is reachable from any non-terminal state. Only `Disconnected` and
/// `Error` accept a fresh connect, and only `Ready` carries valid sensor
/// values.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum ConnectionState {
    /// No session exists.
    #[default]
    Disconnected,
    /// Connect request issued, waiting for the link.
    Connecting,
    /// Link established.
    Connected,
    /// Resolving the hall service and enabling notifications.
    DiscoveringServices,
    /// Subscribed; readings are valid.
    Ready,
    /// The attempt failed.
    Error,
}

impl ConnectionState {
    /// Whether `connect()` may be issued from this state.
    #[must_use]
    pub fn accepts_connect(self) -> bool {
        matches!(self, Self::Disconnected | Self::Error)
    }

    /// Whether a connection attempt is in flight.
    #[must_use]
    pub fn is_connecting(self) -> bool {
        matches!(
            self,
            Self::Connecting | Self::Connected | Self::DiscoveringServices
        )
    }

    /// Whether `from -> to` is an edge of the link state machine.
    ///
    /// `Disconnected` is reachable from everywhere (link lost or close) and
    /// `Error` from every state but itself. `Disconnected -> Error` is how a
    /// connect refused for lack of a usable adapter is reported. The remaining
    /// states only follow their predecessor; `Connecting` may also follow
    /// `Error`, which is how a failed attempt is retried by hand.
    #[must_use]
    pub fn can_transition_to(self, to: Self) -> bool {
        use ConnectionState::*;
        match (self, to) {
            (from, Disconnected) => from != Disconnected,
            (from, Error) => from != Error,
            (Disconnected | Error, Connecting) => true,
            (Connecting, Connected) => true,
            (Connected, DiscoveringServices) => true,
            (DiscoveringServices, Ready) => true,
            _ => false,
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => write!(f, "Disconnected"),
            Self::Connecting => write!(f, "Connecting..."),
            Self::Connected => write!(f, "Connected"),
            Self::DiscoveringServices => write!(f, "Discovering services..."),
            Self::Ready => write!(f, "Ready"),
            Self::Error => write!(f, "Error"),
        }
    }
}

/// Classification of a raw hall-sensor payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum SensorValue {
    /// No magnet detected.
    Open,
    /// Magnet detected.
    Closed,
    /// Anything else; passed through, never rejected.
    Other,
}

impl SensorValue {
    /// Whether the value is `Open`.
    #[must_use]
    pub fn is_open(self) -> bool {
        self == Self::Open
    }
}

/// How raw payload text maps onto [`SensorValue`] and display labels.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ValueEncoding {
    /// Raw text meaning "open".
    pub open_value: String,
    /// Raw text meaning "closed".
    pub closed_value: String,
    /// Label shown while open.
    pub open_label: String,
    /// Label shown while closed.
    pub closed_label: String,
}

impl Default for ValueEncoding {
    fn default() -> Self {
        Self {
            open_value: "0".to_string(),
            closed_value: "1".to_string(),
            open_label: "Zipper Open".to_string(),
            closed_label: "Zipper Closed".to_string(),
        }
    }
}

impl ValueEncoding {
    /// Classify a raw payload. Surrounding whitespace is ignored.
    ///
    /// ```
    /// use smartzipper_types::{SensorValue, ValueEncoding};
    ///
    /// let encoding = ValueEncoding::default();
    /// assert_eq!(encoding.classify("0"), SensorValue::Open);
    /// assert_eq!(encoding.classify(" 1\n"), SensorValue::Closed);
    /// assert_eq!(encoding.classify("?"), SensorValue::Other);
    /// ```
    #[must_use]
    pub fn classify(&self, raw: &str) -> SensorValue {
        let trimmed = raw.trim();
        if trimmed == self.open_value {
            SensorValue::Open
        } else if trimmed == self.closed_value {
            SensorValue::Closed
        } else {
            SensorValue::Other
        }
    }

    /// Human label for a raw payload; unknown payloads are shown verbatim.
    #[must_use]
    pub fn display(&self, raw: &str) -> String {
        match self.classify(raw) {
            SensorValue::Open => self.open_label.clone(),
            SensorValue::Closed => self.closed_label.clone(),
            SensorValue::Other => raw.to_string(),
        }
    }
}

/// Placeholder shown when no value is known.
pub const NO_VALUE: &str = "-";

/// Presentation projection of the link and the latest reading.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct StatusSnapshot {
    /// Human readable status line.
    pub status: String,
    /// The link is `Ready`.
    pub is_connected: bool,
    /// A connection attempt is in flight.
    pub is_connecting: bool,
    /// Label for the latest reading.
    pub display_value: String,
    /// Last failure, shown until explicitly cleared.
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub error_message: Option<String>,
}

impl Default for StatusSnapshot {
    fn default() -> Self {
        Self {
            status: ConnectionState::Disconnected.to_string(),
            is_connected: false,
            is_connecting: false,
            display_value: NO_VALUE.to_string(),
            error_message: None,
        }
    }
}

/// A 48-bit Bluetooth device address such as `E3:D4:1E:79:7C:16`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeviceAddress([u8; 6]);

impl DeviceAddress {
    /// Create an address from its octets, most significant first.
    pub const fn new(octets: [u8; 6]) -> Self {
        Self(octets)
    }

    /// The address octets, most significant first.
    pub fn octets(&self) -> [u8; 6] {
        self.0
    }
}

impl FromStr for DeviceAddress {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.trim().split(':').collect();
        if parts.len() != 6 {
            return Err(ParseError::InvalidAddress(s.to_string()));
        }
        let mut octets = [0u8; 6];
        for (octet, part) in octets.iter_mut().zip(&parts) {
            if part.len() != 2 || !part.chars().all(|c| c.is_ascii_hexdigit()) {
                return Err(ParseError::InvalidAddress(s.to_string()));
            }
            *octet = u8::from_str_radix(part, 16)
                .map_err(|_| ParseError::InvalidAddress(s.to_string()))?;
        }
        Ok(Self(octets))
    }
}

impl fmt::Display for DeviceAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02X}:{b:02X}:{c:02X}:{d:02X}:{e:02X}:{g:02X}")
    }
}

#[cfg(feature = "serde")]
impl Serialize for DeviceAddress {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[cfg(feature = "serde")]
impl<'de> Deserialize<'de> for DeviceAddress {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
