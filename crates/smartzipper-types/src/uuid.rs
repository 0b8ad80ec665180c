//! Bluetooth identifiers for the SmartZipper peripheral.
//!
//! The peripheral exposes one custom 16-bit service (`0xFF03`) carrying a
//! single read/notify characteristic (`0xFF04`) whose value is the ASCII
//! hall-sensor state. These are the defaults; every identifier can be
//! overridden through configuration.

use uuid::{Uuid, uuid};

use crate::DeviceAddress;

/// Default peripheral address, `E3:D4:1E:79:7C:16`.
pub const DEFAULT_DEVICE_ADDRESS: DeviceAddress =
    DeviceAddress::new([0xE3, 0xD4, 0x1E, 0x79, 0x7C, 0x16]);

/// Hall sensor service (`0xFF03` on the Bluetooth base UUID).
pub const HALL_SERVICE: Uuid = uuid!("0000ff03-0000-1000-8000-00805f9b34fb");

/// Hall sensor value characteristic (`0xFF04`), read + notify.
pub const HALL_CHARACTERISTIC: Uuid = uuid!("0000ff04-0000-1000-8000-00805f9b34fb");

/// Client Characteristic Configuration Descriptor.
pub const CLIENT_CHARACTERISTIC_CONFIG: Uuid = uuid!("00002902-0000-1000-8000-00805f9b34fb");

/// Value written to the CCCD to enable notifications.
pub const ENABLE_NOTIFICATION_VALUE: [u8; 2] = [0x01, 0x00];

/// Expand a 16-bit SIG-style short UUID onto the Bluetooth base UUID.
pub const fn from_short(short: u16) -> Uuid {
    Uuid::from_u128(0x0000_0000_0000_1000_8000_0080_5f9b_34fb | ((short as u128) << 96))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_uuid_expansion() {
        assert_eq!(from_short(0xFF03), HALL_SERVICE);
        assert_eq!(from_short(0xFF04), HALL_CHARACTERISTIC);
        assert_eq!(from_short(0x2902), CLIENT_CHARACTERISTIC_CONFIG);
    }

    #[test]
    fn test_default_address() {
        assert_eq!(DEFAULT_DEVICE_ADDRESS.to_string(), "E3:D4:1E:79:7C:16");
    }

    #[test]
    fn test_identifiers_are_distinct() {
        assert_ne!(HALL_SERVICE, HALL_CHARACTERISTIC);
        assert_ne!(HALL_CHARACTERISTIC, CLIENT_CHARACTERISTIC_CONFIG);
    }
}
