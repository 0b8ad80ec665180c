//! Test alert command implementation.
//!
//! Runs a service on a simulated sensor, triggers its test alert and renders
//! the event exactly as `monitor` would.

use std::time::Duration;

use anyhow::{Context, Result, bail};
use smartzipper_core::{Config, ServiceEvent};

use crate::format::{format_alert, format_event_json};
use crate::util::{print_line, start_service};

pub async fn cmd_test_alert(config: Config, json: bool, no_color: bool) -> Result<()> {
    let session = start_service(config, true).await?;
    let handle = session.handle;
    let mut events = handle.subscribe();

    handle.trigger_test_alert().await?;
    let event = tokio::time::timeout(Duration::from_secs(5), events.recv())
        .await
        .context("Test alert was not delivered")?
        .context("Monitor stopped")?;
    handle.close().await;

    if event != ServiceEvent::TestAlert {
        bail!("Unexpected event: {event:?}");
    }
    let rendered = if json {
        format_event_json(&event)?
    } else {
        format_alert(&event, no_color).context("Test alert has no presentation")?
    };
    print_line(&rendered)
}
