//! Hall-sensor readings as they arrive off the link.

use time::OffsetDateTime;
use tokio::time::Instant;

/// One value received from the hall characteristic.
///
/// `raw` is the payload decoded as text and is kept verbatim; classification
/// happens against a [`ValueEncoding`](smartzipper_types::ValueEncoding)
/// when the value is consumed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SensorReading {
    /// Payload text, undecorated.
    pub raw: String,
    /// When the reading was received, on the monotonic clock.
    pub received_at: Instant,
    /// When the reading was received, on the wall clock.
    pub timestamp: OffsetDateTime,
}

impl SensorReading {
    /// Decode a characteristic payload received now.
    ///
    /// The firmware sends ASCII; anything that is not valid UTF-8 is replaced
    /// rather than rejected so it still shows up verbatim downstream.
    pub fn decode(payload: &[u8]) -> Self {
        Self {
            raw: String::from_utf8_lossy(payload).into_owned(),
            received_at: Instant::now(),
            timestamp: OffsetDateTime::now_utc(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_ascii() {
        let reading = SensorReading::decode(b"0");
        assert_eq!(reading.raw, "0");
    }

    #[test]
    fn test_decode_keeps_whitespace_and_garbage() {
        assert_eq!(SensorReading::decode(b"1\n").raw, "1\n");
        assert_eq!(SensorReading::decode(&[0x31, 0xFF]).raw, "1\u{FFFD}");
        assert_eq!(SensorReading::decode(&[]).raw, "");
    }
}
