//! Example: Watching a Simulated Zipper
//!
//! Runs the monitor against the mock transport with a short alert threshold,
//! opens the simulated zipper and prints every event until the alert fires.
//!
//! Run with: `cargo run --example simulated_zipper`

use std::sync::Arc;

use smartzipper_core::{Config, ConnectionState, MockTransport, MonitorService, ServiceEvent};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let mut config = Config::default();
    config.monitor.check_interval_secs = 1;
    config.monitor.alert_threshold_secs = 3;

    let mock = Arc::new(MockTransport::new());
    let service = MonitorService::spawn(config, Arc::clone(&mock) as _)?;
    let mut events = service.subscribe();

    service.connect().await?;
    while let Ok(event) = events.recv().await {
        println!("{}", serde_json::to_string(&event)?);
        match event {
            ServiceEvent::StateChanged {
                state: ConnectionState::Ready,
            } => {
                mock.set_value("0").await;
            }
            ServiceEvent::AlertRaised { .. } => break,
            _ => {}
        }
    }

    service.close().await;
    Ok(())
}
