//! Platform-agnostic types for the SmartZipper hall-sensor link.
//!
//! This crate provides the types shared by the link/monitor core and the
//! command-line front end.
//!
//! # Features
//!
//! - Connection lifecycle states and their legal edges
//! - Hall-sensor value classification and display labels
//! - The presentation status snapshot
//! - UUID constants for the peripheral's GATT layout
//! - Error types for parsing and link failures
//!
//! # Example
//!
//! ```
//! use smartzipper_types::{ConnectionState, SensorValue, ValueEncoding};
//!
//! let encoding = ValueEncoding::default();
//! assert_eq!(encoding.classify("0"), SensorValue::Open);
//! assert_eq!(encoding.display("1"), "Zipper Closed");
//! assert!(ConnectionState::Error.accepts_connect());
//! ```

pub mod error;
pub mod types;
pub mod uuid;

pub use error::{LinkError, ParseError, ParseResult};
pub use types::{
    ConnectionState, DeviceAddress, NO_VALUE, SensorValue, StatusSnapshot, ValueEncoding,
};
pub use uuid as uuids;

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(feature = "serde")]
    #[test]
    fn test_connection_state_serializes_snake_case() {
        let json = serde_json::to_string(&ConnectionState::DiscoveringServices).unwrap();
        assert_eq!(json, "\"discovering_services\"");
        let back: ConnectionState = serde_json::from_str("\"ready\"").unwrap();
        assert_eq!(back, ConnectionState::Ready);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_status_snapshot_omits_empty_error() {
        let json = serde_json::to_string(&StatusSnapshot::default()).unwrap();
        assert!(!json.contains("error_message"));
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_link_error_serializes_with_kind_tag() {
        let json = serde_json::to_value(LinkError::SubscriptionFailed("gatt 133".into())).unwrap();
        assert_eq!(json["kind"], "subscription_failed");
        assert_eq!(json["detail"], "gatt 133");
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_device_address_serde() {
        let addr: DeviceAddress = serde_json::from_str("\"e3:d4:1e:79:7c:16\"").unwrap();
        assert_eq!(serde_json::to_string(&addr).unwrap(), "\"E3:D4:1E:79:7C:16\"");
        assert!(serde_json::from_str::<DeviceAddress>("\"bogus\"").is_err());
    }

    mod proptests {
        use crate::{DeviceAddress, SensorValue, ValueEncoding};
        use proptest::prelude::*;

        proptest! {
            /// Classifying arbitrary payloads never panics and only the two
            /// configured strings map to Open/Closed.
            #[test]
            fn classify_is_total(raw in ".*") {
                let encoding = ValueEncoding::default();
                let value = encoding.classify(&raw);
                match raw.trim() {
                    "0" => prop_assert_eq!(value, SensorValue::Open),
                    "1" => prop_assert_eq!(value, SensorValue::Closed),
                    _ => prop_assert_eq!(value, SensorValue::Other),
                }
            }

            /// Any six octets survive a Display/FromStr round trip.
            #[test]
            fn address_round_trips(octets in proptest::array::uniform6(any::<u8>())) {
                let addr = DeviceAddress::new(octets);
                let parsed: DeviceAddress = addr.to_string().parse().unwrap();
                prop_assert_eq!(parsed, addr);
            }
        }
    }
}
