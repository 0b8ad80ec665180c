//! Read command implementation.

use std::time::Duration;

use anyhow::{Context, Result, bail};
use smartzipper_core::{Config, ServiceEvent, ServiceHandle};
use tokio::sync::broadcast::error::RecvError;

use crate::format::format_event_json;
use crate::style;
use crate::util::{connect_and_wait, print_line, start_service};

/// Allowance for service discovery and subscription on top of the connect
/// timeout.
const SETUP_GRACE: Duration = Duration::from_secs(15);

/// How long to wait for the read reply.
const READ_TIMEOUT: Duration = Duration::from_secs(10);

pub async fn cmd_read(config: Config, mock: bool, json: bool, no_color: bool) -> Result<()> {
    let ready_timeout = config.link.connect_timeout() + SETUP_GRACE;
    let session = start_service(config, mock).await?;
    let handle = session.handle;

    let result = read_once(&handle, ready_timeout).await;
    handle.close().await;

    let reading = result?;

    if json {
        return print_line(&format_event_json(&reading)?);
    }
    if let ServiceEvent::Reading {
        raw,
        value,
        display,
        ..
    } = &reading
    {
        print_line(&format!(
            "{}  (raw {:?})",
            style::format_display(display, *value, no_color),
            raw
        ))?;
    }
    Ok(())
}

async fn read_once(handle: &ServiceHandle, ready_timeout: Duration) -> Result<ServiceEvent> {
    let mut events = handle.subscribe();
    connect_and_wait(handle, ready_timeout).await?;
    handle.read_value_once().await?;

    let wait = async {
        loop {
            match events.recv().await {
                Ok(event @ ServiceEvent::Reading { .. }) => return Ok(event),
                Ok(_) | Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => bail!("Monitor stopped before a reading arrived"),
            }
        }
    };
    tokio::time::timeout(READ_TIMEOUT, wait)
        .await
        .context("No reading received from the sensor")?
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_read_from_simulated_sensor() {
        let session = start_service(Config::default(), true).await.unwrap();
        let reading = read_once(&session.handle, Duration::from_secs(5))
            .await
            .unwrap();
        session.handle.close().await;

        let ServiceEvent::Reading { raw, display, .. } = reading else {
            panic!("expected a reading, got {reading:?}");
        };
        assert_eq!(raw, "1");
        assert_eq!(display, "Zipper Closed");
    }
}
