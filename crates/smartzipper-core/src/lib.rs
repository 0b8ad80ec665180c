//! Link controller and open-too-long monitor for the SmartZipper hall sensor.
//!
//! The SmartZipper is a BLE peripheral exposing a single characteristic whose
//! value reports whether a zipper is open or closed. This crate keeps one
//! link to it alive on request, turns notifications into readings, and raises
//! an alert when the zipper stays open longer than a configured threshold.
//!
//! # Features
//!
//! - **Link state machine**: `Disconnected → Connecting → Connected →
//!   DiscoveringServices → Ready`, with `Error` reachable from every live
//!   state and stale callbacks from earlier attempts ignored
//! - **Open-too-long monitor**: one alert per open episode, cleared when the
//!   zipper closes
//! - **Status projection**: a presentation snapshot for UIs
//! - **Pluggable transport**: [`BleTransport`] on btleplug, [`MockTransport`]
//!   for tests and demos
//!
//! # Architecture
//!
//! A [`MonitorService`] task owns the [`LinkController`], the
//! [`MonitorEngine`] and the [`StatusProjection`]. Commands arrive through a
//! cloneable [`ServiceHandle`]; transport callbacks arrive as
//! [`SessionEvent`]s; the periodic check ticks inside the same loop. State is
//! published on watch channels and everything else on a broadcast channel of
//! [`ServiceEvent`]s.
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use smartzipper_core::{BleTransport, Config, MonitorService, ServiceEvent};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::load_default()?;
//!     let transport = Arc::new(BleTransport::new().await?);
//!     let service = MonitorService::spawn(config, transport)?;
//!
//!     let mut events = service.subscribe();
//!     service.connect().await?;
//!
//!     while let Ok(event) = events.recv().await {
//!         if let ServiceEvent::AlertRaised { open_for_secs } = event {
//!             println!("Zipper open for {open_for_secs}s");
//!         }
//!     }
//!     Ok(())
//! }
//! ```

pub mod ble;
pub mod config;
pub mod error;
pub mod events;
pub mod link;
pub mod mock;
pub mod monitor;
pub mod reading;
pub mod service;
pub mod status;
pub mod transport;

// Core exports
pub use ble::BleTransport;
pub use config::{
    Config, ConfigError, LinkConfig, MonitorConfig, ValidationError, default_config_path,
};
pub use error::{Error, LinkError, Result};
pub use events::{EventDispatcher, EventReceiver, EventSender, ServiceEvent};
pub use link::{LinkController, LinkEffect, LinkMachine, LinkOutput, Transition};
pub use mock::{MockCall, MockTransport, MockTransportBuilder};
pub use monitor::{AlertReason, AlertSignal, MonitorEngine, MonitorState};
pub use reading::SensorReading;
pub use service::{MonitorService, ServiceHandle};
pub use status::StatusProjection;
pub use transport::{
    AdapterStatus, CharacteristicHandle, EventSink, EventSource, ServiceResolution,
    SessionEvent, SessionId, Transport, TransportEvent, event_channel,
};

// Re-export from smartzipper-types
pub use smartzipper_types::uuid as uuids;
pub use smartzipper_types::{
    ConnectionState, DeviceAddress, NO_VALUE, SensorValue, StatusSnapshot, ValueEncoding,
};
