//! Presentation projection of the link and the latest reading.

use smartzipper_types::{ConnectionState, LinkError, NO_VALUE, StatusSnapshot};

/// Folds state changes, failures and display values into a
/// [`StatusSnapshot`].
#[derive(Debug, Clone, Default)]
pub struct StatusProjection {
    snapshot: StatusSnapshot,
}

impl StatusProjection {
    /// A projection showing `Disconnected`.
    pub fn new() -> Self {
        Self::default()
    }

    /// The current snapshot.
    pub fn snapshot(&self) -> &StatusSnapshot {
        &self.snapshot
    }

    /// Apply a connection state change.
    pub fn on_state(&mut self, state: ConnectionState) {
        let s = &mut self.snapshot;
        s.status = state.to_string();
        match state {
            ConnectionState::Disconnected => {
                s.is_connected = false;
                s.is_connecting = false;
                s.display_value = NO_VALUE.to_string();
                s.error_message = None;
            }
            ConnectionState::Connecting | ConnectionState::Connected => {
                s.is_connected = false;
                s.is_connecting = true;
            }
            ConnectionState::DiscoveringServices => {
                s.is_connecting = true;
            }
            ConnectionState::Ready => {
                s.is_connected = true;
                s.is_connecting = false;
            }
            ConnectionState::Error => {
                s.is_connected = false;
                s.is_connecting = false;
            }
        }
    }

    /// Record the failure that put the link into `Error`.
    pub fn on_failure(&mut self, error: &LinkError) {
        self.snapshot.error_message = Some(error.to_string());
    }

    /// Show a new display value.
    pub fn on_display(&mut self, display_value: String) {
        self.snapshot.display_value = display_value;
    }

    /// Dismiss the error message.
    pub fn clear_error(&mut self) {
        self.snapshot.error_message = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connect_sequence() {
        let mut projection = StatusProjection::new();

        projection.on_state(ConnectionState::Connecting);
        assert_eq!(projection.snapshot().status, "Connecting...");
        assert!(projection.snapshot().is_connecting);

        projection.on_state(ConnectionState::Connected);
        projection.on_state(ConnectionState::DiscoveringServices);
        let s = projection.snapshot();
        assert_eq!(s.status, "Discovering services...");
        assert!(s.is_connecting);
        assert!(!s.is_connected);

        projection.on_state(ConnectionState::Ready);
        let s = projection.snapshot();
        assert_eq!(s.status, "Ready");
        assert!(s.is_connected);
        assert!(!s.is_connecting);
    }

    #[test]
    fn test_error_message_sticks_until_cleared() {
        let mut projection = StatusProjection::new();
        projection.on_state(ConnectionState::Error);
        projection.on_failure(&LinkError::RadioDisabled);
        assert_eq!(
            projection.snapshot().error_message.as_deref(),
            Some("Bluetooth is disabled, please enable Bluetooth")
        );

        // A new attempt keeps the old message on screen.
        projection.on_state(ConnectionState::Connecting);
        assert!(projection.snapshot().error_message.is_some());

        projection.clear_error();
        assert!(projection.snapshot().error_message.is_none());
    }

    #[test]
    fn test_disconnect_resets_display_and_error() {
        let mut projection = StatusProjection::new();
        projection.on_state(ConnectionState::Ready);
        projection.on_display("Zipper Open".into());
        projection.on_failure(&LinkError::ServiceNotFound);

        projection.on_state(ConnectionState::Disconnected);
        assert_eq!(projection.snapshot(), &StatusSnapshot::default());
    }
}
