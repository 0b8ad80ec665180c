//! The monitor service: one task that owns the link, the monitor and the
//! status projection.
//!
//! Everything that can change state (commands from handles, events from the
//! transport, the periodic check) is funnelled into a single `select!` loop,
//! so the components never need locks and never observe each other half-way
//! through a transition.

use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use smartzipper_types::{ConnectionState, StatusSnapshot};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::events::{EventDispatcher, EventReceiver, ServiceEvent};
use crate::link::{LinkController, LinkOutput};
use crate::monitor::{AlertReason, AlertSignal, MonitorEngine};
use crate::status::StatusProjection;
use crate::transport::{EventSource, Transport, event_channel};

/// Command channel depth.
const COMMAND_BUFFER: usize = 32;

#[derive(Debug)]
enum Command {
    Connect,
    Disconnect,
    ReadValueOnce,
    ClearError,
    TriggerTestAlert,
    Close(oneshot::Sender<()>),
}

/// Spawns the service task.
#[derive(Debug)]
pub struct MonitorService;

impl MonitorService {
    /// Validate `config` and start the service on the current tokio runtime.
    ///
    /// The service starts `Disconnected`; call
    /// [`ServiceHandle::connect`] to bring the link up.
    pub fn spawn(config: Config, transport: Arc<dyn Transport>) -> Result<ServiceHandle> {
        config
            .validate()
            .map_err(|e| Error::invalid_config(e.to_string()))?;

        let (command_tx, command_rx) = mpsc::channel(COMMAND_BUFFER);
        let (state_tx, state_rx) = watch::channel(ConnectionState::Disconnected);
        let (status_tx, status_rx) = watch::channel(StatusSnapshot::default());
        let (sink, source) = event_channel();
        let events = EventDispatcher::default();
        let cancel = CancellationToken::new();

        let actor = ServiceActor {
            link: LinkController::new(transport, config.link.clone(), sink),
            monitor: MonitorEngine::new(config.monitor.clone()),
            projection: StatusProjection::new(),
            state_tx,
            status_tx,
            events: events.clone(),
        };
        info!(address = %config.link.address, "Starting monitor service");
        tokio::spawn(actor.run(command_rx, source, cancel.clone()));

        Ok(ServiceHandle {
            commands: command_tx,
            state: state_rx,
            status: status_rx,
            events,
            cancel,
        })
    }
}

/// Cloneable command surface of a running [`MonitorService`].
///
/// Commands are queued and executed in order by the service task. They
/// return once queued; observe the outcome through [`state`](Self::state),
/// [`status`](Self::status) or [`subscribe`](Self::subscribe).
#[derive(Debug, Clone)]
pub struct ServiceHandle {
    commands: mpsc::Sender<Command>,
    state: watch::Receiver<ConnectionState>,
    status: watch::Receiver<StatusSnapshot>,
    events: EventDispatcher,
    cancel: CancellationToken,
}

impl ServiceHandle {
    /// Start a connection attempt. Ignored unless `Disconnected` or `Error`.
    pub async fn connect(&self) -> Result<()> {
        self.send(Command::Connect).await
    }

    /// Request a disconnect. Idempotent.
    pub async fn disconnect(&self) -> Result<()> {
        self.send(Command::Disconnect).await
    }

    /// Read the sensor once. Ignored unless `Ready`.
    pub async fn read_value_once(&self) -> Result<()> {
        self.send(Command::ReadValueOnce).await
    }

    /// Dismiss the error message shown in the status.
    pub async fn clear_error(&self) -> Result<()> {
        self.send(Command::ClearError).await
    }

    /// Publish a test alert without touching the open-episode state.
    pub async fn trigger_test_alert(&self) -> Result<()> {
        self.send(Command::TriggerTestAlert).await
    }

    /// Tear down the link and stop the service.
    ///
    /// Returns once the service has shut down. Safe to call repeatedly and
    /// from several handles.
    pub async fn close(&self) {
        let (ack_tx, ack_rx) = oneshot::channel();
        if self.commands.send(Command::Close(ack_tx)).await.is_ok() {
            let _ = ack_rx.await;
        }
        self.cancel.cancel();
    }

    /// Watch the connection state.
    pub fn state(&self) -> watch::Receiver<ConnectionState> {
        self.state.clone()
    }

    /// The connection state right now.
    pub fn current_state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Watch the presentation snapshot.
    pub fn status(&self) -> watch::Receiver<StatusSnapshot> {
        self.status.clone()
    }

    /// The presentation snapshot right now.
    pub fn snapshot(&self) -> StatusSnapshot {
        self.status.borrow().clone()
    }

    /// Subscribe to readings, alerts and state changes.
    pub fn subscribe(&self) -> EventReceiver {
        self.events.subscribe()
    }

    /// Wait until the connection state satisfies `predicate`.
    pub async fn wait_for_state<F>(
        &self,
        timeout: Duration,
        mut predicate: F,
    ) -> Result<ConnectionState>
    where
        F: FnMut(ConnectionState) -> bool,
    {
        let mut state = self.state.clone();
        let wait = state.wait_for(|s| predicate(*s));
        match tokio::time::timeout(timeout, wait).await {
            Ok(Ok(state)) => Ok(*state),
            Ok(Err(_)) => Err(Error::ServiceClosed),
            Err(_) => Err(Error::timeout("wait for link state", timeout)),
        }
    }

    /// Token cancelled when the service stops. Cancelling it stops the
    /// service too.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Wait for the service to stop.
    pub async fn closed(&self) {
        self.cancel.cancelled().await;
    }

    /// Whether the service has stopped (or been told to).
    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled()
    }

    async fn send(&self, command: Command) -> Result<()> {
        if self.is_closed() {
            return Err(Error::ServiceClosed);
        }
        self.commands
            .send(command)
            .await
            .map_err(|_| Error::ServiceClosed)
    }
}

struct ServiceActor {
    link: LinkController,
    monitor: MonitorEngine,
    projection: StatusProjection,
    state_tx: watch::Sender<ConnectionState>,
    status_tx: watch::Sender<StatusSnapshot>,
    events: EventDispatcher,
}

impl ServiceActor {
    async fn run(
        mut self,
        mut commands: mpsc::Receiver<Command>,
        mut transport_events: EventSource,
        cancel: CancellationToken,
    ) {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("Monitor service cancelled");
                    self.shutdown().await;
                    break;
                }
                command = commands.recv() => match command {
                    Some(command) => {
                        if self.handle_command(command).await.is_break() {
                            break;
                        }
                    }
                    None => {
                        debug!("All service handles dropped");
                        self.shutdown().await;
                        break;
                    }
                },
                Some(event) = transport_events.recv() => {
                    let outputs = self.link.handle_event(event).await;
                    self.route(outputs);
                }
                _ = self.monitor.tick() => {
                    if let Some(signal) = self.monitor.check() {
                        self.present(signal);
                    }
                }
            }
        }

        cancel.cancel();
        info!("Monitor service stopped");
    }

    async fn handle_command(&mut self, command: Command) -> ControlFlow<()> {
        debug!(?command, "Handling command");
        match command {
            Command::Connect => {
                let outputs = self.link.connect().await;
                self.route(outputs);
            }
            Command::Disconnect => {
                let outputs = self.link.disconnect().await;
                self.route(outputs);
            }
            Command::ReadValueOnce => {
                let outputs = self.link.read_value_once().await;
                self.route(outputs);
            }
            Command::ClearError => {
                self.projection.clear_error();
                self.publish_status();
            }
            Command::TriggerTestAlert => {
                info!("Test alert requested");
                self.present(AlertSignal::Show(AlertReason::Test));
            }
            Command::Close(ack) => {
                self.shutdown().await;
                let _ = ack.send(());
                return ControlFlow::Break(());
            }
        }
        ControlFlow::Continue(())
    }

    async fn shutdown(&mut self) {
        let outputs = self.link.close().await;
        self.route(outputs);
        self.monitor.stop_monitoring();
    }

    fn route(&mut self, outputs: Vec<LinkOutput>) {
        if outputs.is_empty() {
            return;
        }

        let mut latest = None;
        for output in outputs {
            match output {
                LinkOutput::StateChanged(state) => {
                    latest = Some(state);
                    self.projection.on_state(state);
                    if state == ConnectionState::Ready {
                        self.monitor.start_monitoring();
                    } else {
                        self.monitor.stop_monitoring();
                    }
                    self.events.send(ServiceEvent::StateChanged { state });
                }
                LinkOutput::Failed(error) => {
                    self.projection.on_failure(&error);
                    self.events.send(ServiceEvent::link_failed(&error));
                }
                LinkOutput::Reading(reading) => {
                    let signals = self
                        .monitor
                        .on_reading_at(&reading.raw, reading.received_at);
                    let label = self.monitor.display(&reading.raw);
                    let value = self.monitor.encoding().classify(&reading.raw);
                    debug!(raw = %reading.raw.escape_debug(), label = %label, "Sensor reading");

                    self.projection.on_display(label.clone());
                    self.events.send(ServiceEvent::Reading {
                        raw: reading.raw,
                        value,
                        display: label,
                        timestamp: reading.timestamp,
                    });
                    for signal in signals {
                        self.present(signal);
                    }
                }
            }
        }

        // Status first, so a state watcher always sees the matching snapshot.
        self.publish_status();
        if let Some(state) = latest {
            self.state_tx.send_replace(state);
        }
    }

    fn present(&self, signal: AlertSignal) {
        let event = match signal {
            AlertSignal::Show(AlertReason::OpenTooLong { open_for }) => ServiceEvent::AlertRaised {
                open_for_secs: open_for.as_secs(),
            },
            AlertSignal::Show(AlertReason::Test) => ServiceEvent::TestAlert,
            AlertSignal::Hide => ServiceEvent::AlertCleared,
        };
        self.events.send(event);
    }

    fn publish_status(&self) {
        let snapshot = self.projection.snapshot();
        self.status_tx.send_if_modified(|current| {
            if current == snapshot {
                false
            } else {
                *current = snapshot.clone();
                true
            }
        });
    }
}
