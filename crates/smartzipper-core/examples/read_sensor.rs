//! Example: Reading the Zipper State Once
//!
//! This example connects to a SmartZipper, waits for the link to become
//! ready, reads the hall characteristic once and prints what it means.
//!
//! Run with: `cargo run --example read_sensor -- [DEVICE_ADDRESS]`

use std::env;
use std::sync::Arc;
use std::time::Duration;

use smartzipper_core::{BleTransport, Config, ConnectionState, MonitorService, ServiceEvent};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt::init();

    let mut config = Config::load_default()?;
    if let Some(address) = env::args().nth(1) {
        config.link.address = address.parse()?;
    }

    println!("Connecting to {}...", config.link.address);
    let transport = Arc::new(BleTransport::new().await?);
    let service = MonitorService::spawn(config, transport)?;
    let mut events = service.subscribe();

    service.connect().await?;
    let state = service
        .wait_for_state(Duration::from_secs(30), |s| {
            matches!(s, ConnectionState::Ready | ConnectionState::Error)
        })
        .await?;
    if state == ConnectionState::Error {
        let message = service.snapshot().error_message.unwrap_or_default();
        eprintln!("Connection failed: {message}");
        service.close().await;
        std::process::exit(1);
    }
    println!("Connected!");

    service.read_value_once().await?;
    while let Ok(event) = events.recv().await {
        if let ServiceEvent::Reading { raw, display, .. } = event {
            println!();
            println!("  Raw value: {raw:?}");
            println!("  State:     {display}");
            break;
        }
    }

    service.close().await;
    Ok(())
}
