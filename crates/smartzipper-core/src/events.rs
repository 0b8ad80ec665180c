//! Service event system for state changes, readings and alerts.
//!
//! Every event a [`MonitorService`](crate::MonitorService) publishes goes out
//! on a broadcast channel. Receivers that fall behind lose the oldest events;
//! the authoritative state is always available from the service's watch
//! channels.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tokio::sync::broadcast;

use smartzipper_types::{ConnectionState, LinkError, SensorValue};

/// Events published by the monitor service.
///
/// All events are serializable for logging and `--json` output.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new event types
/// in future versions without breaking downstream code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
#[non_exhaustive]
pub enum ServiceEvent {
    /// The link moved to a new state.
    StateChanged { state: ConnectionState },
    /// A value arrived from the sensor.
    Reading {
        raw: String,
        value: SensorValue,
        display: String,
        #[serde(with = "time::serde::rfc3339")]
        timestamp: OffsetDateTime,
    },
    /// The sensor has been open longer than the threshold.
    AlertRaised { open_for_secs: u64 },
    /// The open episode that alerted (or might have) ended.
    AlertCleared,
    /// A test alert was requested.
    TestAlert,
    /// The connection attempt failed.
    LinkFailed { kind: String, message: String },
}

impl ServiceEvent {
    /// Build a [`ServiceEvent::LinkFailed`] from a link error.
    pub fn link_failed(error: &LinkError) -> Self {
        Self::LinkFailed {
            kind: error.kind().to_string(),
            message: error.to_string(),
        }
    }

    /// Whether the event asks for the alert to be presented.
    pub fn is_alert(&self) -> bool {
        matches!(self, Self::AlertRaised { .. } | Self::TestAlert)
    }
}

/// Sender for service events.
pub type EventSender = broadcast::Sender<ServiceEvent>;

/// Receiver for service events.
pub type EventReceiver = broadcast::Receiver<ServiceEvent>;

/// Event dispatcher for sending events to multiple receivers.
#[derive(Debug, Clone)]
pub struct EventDispatcher {
    sender: EventSender,
}

impl EventDispatcher {
    /// Create a new event dispatcher.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Subscribe to events.
    pub fn subscribe(&self) -> EventReceiver {
        self.sender.subscribe()
    }

    /// Send an event.
    pub fn send(&self, event: ServiceEvent) {
        // Ignore error if no receivers
        let _ = self.sender.send(event);
    }

    /// Get the number of active receivers.
    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventDispatcher {
    fn default() -> Self {
        Self::new(100)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serialization() {
        let event = ServiceEvent::StateChanged {
            state: ConnectionState::DiscoveringServices,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert_eq!(
            json,
            r#"{"type":"state_changed","state":"discovering_services"}"#
        );

        let json = serde_json::to_string(&ServiceEvent::AlertRaised { open_for_secs: 361 }).unwrap();
        assert!(json.contains("\"type\":\"alert_raised\""));
        assert!(json.contains("361"));
    }

    #[test]
    fn test_reading_round_trip() {
        let event = ServiceEvent::Reading {
            raw: "0".into(),
            value: SensorValue::Open,
            display: "Zipper Open".into(),
            timestamp: OffsetDateTime::UNIX_EPOCH,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("1970-01-01T00:00:00Z"));
        let back: ServiceEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, event);
    }

    #[test]
    fn test_link_failed_carries_kind_and_message() {
        let event = ServiceEvent::link_failed(&LinkError::RadioDisabled);
        assert_eq!(
            event,
            ServiceEvent::LinkFailed {
                kind: "radio_disabled".into(),
                message: "Bluetooth is disabled, please enable Bluetooth".into(),
            }
        );
        assert!(!event.is_alert());
        assert!(ServiceEvent::TestAlert.is_alert());
    }

    #[tokio::test]
    async fn test_dispatcher() {
        let dispatcher = EventDispatcher::new(10);
        let mut rx = dispatcher.subscribe();
        assert_eq!(dispatcher.receiver_count(), 1);

        dispatcher.send(ServiceEvent::AlertCleared);
        assert_eq!(rx.recv().await.unwrap(), ServiceEvent::AlertCleared);
    }

    #[test]
    fn test_send_without_receivers() {
        EventDispatcher::default().send(ServiceEvent::TestAlert);
    }
}
