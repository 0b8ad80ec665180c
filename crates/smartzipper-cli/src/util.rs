//! Utility functions for CLI operations.

use std::io::{self, Write};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use smartzipper_core::{
    BleTransport, Config, ConnectionState, MockTransport, MonitorService, ServiceHandle, Transport,
};

/// A running service plus the simulated sensor behind it, if any.
pub struct Session {
    pub handle: ServiceHandle,
    pub mock: Option<Arc<MockTransport>>,
}

/// Spawn the monitor service on Bluetooth, or on a simulated sensor.
pub async fn start_service(config: Config, mock: bool) -> Result<Session> {
    let (transport, mock): (Arc<dyn Transport>, _) = if mock {
        let mock = Arc::new(MockTransport::new());
        (Arc::clone(&mock) as _, Some(mock))
    } else {
        let ble = BleTransport::new()
            .await
            .context("Failed to initialise Bluetooth")?;
        (Arc::new(ble), None)
    };

    let handle = MonitorService::spawn(config, transport).context("Failed to start monitor")?;
    Ok(Session { handle, mock })
}

/// Connect and wait until the link is ready.
///
/// Fails with the link's error message if the attempt ends in `Error`.
pub async fn connect_and_wait(handle: &ServiceHandle, timeout: Duration) -> Result<()> {
    handle.connect().await?;
    let state = handle
        .wait_for_state(timeout, |s| {
            matches!(s, ConnectionState::Ready | ConnectionState::Error)
        })
        .await
        .context("Sensor did not become ready")?;

    if state == ConnectionState::Error {
        let message = handle
            .snapshot()
            .error_message
            .unwrap_or_else(|| "unknown error".to_string());
        bail!("{message}");
    }
    Ok(())
}

/// Print a line to stdout and flush so piped consumers see it at once.
pub fn print_line(line: &str) -> Result<()> {
    let mut stdout = io::stdout().lock();
    writeln!(stdout, "{}", line)?;
    stdout.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_session_connects() {
        let session = start_service(Config::default(), true).await.unwrap();
        assert!(session.mock.is_some());

        connect_and_wait(&session.handle, Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(session.handle.current_state(), ConnectionState::Ready);
        session.handle.close().await;
    }
}
