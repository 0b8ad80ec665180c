//! [`Transport`] implementation on top of btleplug.
//!
//! Every request is issued from its own task so the service loop never
//! blocks on the radio. Outcomes are reported on the session's event sink.
//! One session is held at a time; issuing `connect` for a new session
//! releases whatever the previous one left behind.

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use async_trait::async_trait;
use btleplug::api::{
    BDAddr, Central, CentralEvent, CentralState, Characteristic, Manager as _, Peripheral as _,
    ScanFilter,
};
use btleplug::platform::{Adapter, Manager, Peripheral};
use futures::StreamExt;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep, timeout};
use tracing::{debug, info, warn};

use smartzipper_types::DeviceAddress;

use crate::config::LinkConfig;
use crate::error::{Error, Result};
use crate::transport::{
    AdapterStatus, CharacteristicHandle, EventSink, ServiceResolution, SessionEvent, SessionId,
    Transport, TransportEvent,
};

/// How often known peripherals are re-checked while scanning for the target.
const SCAN_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Upper bound on service discovery.
const DISCOVERY_TIMEOUT: Duration = Duration::from_secs(10);

/// Upper bound on a disconnect request.
const DISCONNECT_TIMEOUT: Duration = Duration::from_secs(5);

struct BleSession {
    id: SessionId,
    target: LinkConfig,
    events: EventSink,
    /// Set by the connect task once the link is up.
    peripheral: Arc<OnceLock<Peripheral>>,
    tasks: Vec<JoinHandle<()>>,
}

impl BleSession {
    fn emit(&self, event: TransportEvent) {
        let _ = self.events.send(SessionEvent::new(self.id, event));
    }

    fn abort_tasks(&mut self) {
        for task in self.tasks.drain(..) {
            task.abort();
        }
    }
}

/// Bluetooth Low Energy transport using the first system adapter.
pub struct BleTransport {
    adapter: Option<Adapter>,
    session: Mutex<Option<BleSession>>,
}

impl std::fmt::Debug for BleTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BleTransport")
            .field("has_adapter", &self.adapter.is_some())
            .finish_non_exhaustive()
    }
}

impl BleTransport {
    /// Open the first Bluetooth adapter on the system.
    ///
    /// A system without any adapter is not an error here; the transport then
    /// reports [`AdapterStatus::Missing`] and every connection attempt fails
    /// with the matching link error.
    pub async fn new() -> Result<Self> {
        let manager = Manager::new().await?;
        let adapter = manager.adapters().await?.into_iter().next();
        match &adapter {
            Some(adapter) => {
                let info = adapter.adapter_info().await.unwrap_or_default();
                debug!(%info, "Using Bluetooth adapter");
            }
            None => warn!("No Bluetooth adapter found"),
        }
        Ok(Self {
            adapter,
            session: Mutex::new(None),
        })
    }

    fn adapter(&self) -> Result<&Adapter> {
        self.adapter
            .as_ref()
            .ok_or_else(|| Error::Transport("no Bluetooth adapter".into()))
    }

    /// Run `f` against the live session, or fail if `session` is not it.
    async fn with_session<T>(
        &self,
        session: SessionId,
        f: impl FnOnce(&mut BleSession) -> Result<T>,
    ) -> Result<T> {
        let mut guard = self.session.lock().await;
        match guard.as_mut() {
            Some(live) if live.id == session => f(live),
            _ => Err(Error::UnknownSession(session.get())),
        }
    }
}

fn connected_peripheral(live: &BleSession) -> Result<Peripheral> {
    live.peripheral
        .get()
        .cloned()
        .ok_or_else(|| Error::Transport("link is not established".into()))
}

fn matches_address(address: BDAddr, target: DeviceAddress) -> bool {
    address.into_inner() == target.octets()
}

fn find_characteristic(peripheral: &Peripheral, target: &LinkConfig) -> Option<Characteristic> {
    peripheral
        .services()
        .into_iter()
        .filter(|s| s.uuid == target.service_uuid)
        .flat_map(|s| s.characteristics)
        .find(|c| c.uuid == target.characteristic_uuid)
}

async fn known_peripheral(adapter: &Adapter, target: DeviceAddress) -> Result<Option<Peripheral>> {
    for peripheral in adapter.peripherals().await? {
        if let Ok(Some(props)) = peripheral.properties().await
            && matches_address(props.address, target)
        {
            return Ok(Some(peripheral));
        }
    }
    Ok(None)
}

/// Find the target among known peripherals, scanning for it if needed.
async fn locate(adapter: &Adapter, target: DeviceAddress, limit: Duration) -> Result<Peripheral> {
    if let Some(peripheral) = known_peripheral(adapter, target).await? {
        debug!(%target, "Peripheral already known, no scan needed");
        return Ok(peripheral);
    }

    info!(%target, "Scanning for peripheral");
    adapter.start_scan(ScanFilter::default()).await?;
    let deadline = Instant::now() + limit;
    let found = loop {
        if let Some(peripheral) = known_peripheral(adapter, target).await? {
            break Some(peripheral);
        }
        if Instant::now() >= deadline {
            break None;
        }
        sleep(SCAN_POLL_INTERVAL).await;
    };
    if let Err(e) = adapter.stop_scan().await {
        debug!("Failed to stop scan: {}", e);
    }

    found.ok_or_else(|| Error::PeripheralNotFound {
        address: target.to_string(),
        duration: limit,
    })
}

async fn disconnect_peripheral(peripheral: &Peripheral) -> Result<()> {
    match timeout(DISCONNECT_TIMEOUT, peripheral.disconnect()).await {
        Ok(result) => Ok(result?),
        Err(_) => Err(Error::timeout("disconnect", DISCONNECT_TIMEOUT)),
    }
}

/// Locate and connect to the target, then report link loss until aborted.
async fn drive_link(
    adapter: Adapter,
    target: LinkConfig,
    slot: Arc<OnceLock<Peripheral>>,
    emit: impl Fn(TransportEvent),
) {
    // Subscribe before connecting so a drop during setup is not missed.
    let mut central_events = match adapter.events().await {
        Ok(stream) => stream,
        Err(e) => {
            emit(TransportEvent::ConnectFailed(e.to_string()));
            return;
        }
    };

    let limit = target.connect_timeout();
    let connected = async {
        let peripheral = locate(&adapter, target.address, limit).await?;
        match timeout(limit, peripheral.connect()).await {
            Ok(result) => result?,
            Err(_) => return Err(Error::timeout("connect", limit)),
        }
        Ok::<_, Error>(peripheral)
    };

    let peripheral = match connected.await {
        Ok(peripheral) => peripheral,
        Err(e) => {
            warn!(address = %target.address, "Connection failed: {}", e);
            emit(TransportEvent::ConnectFailed(e.to_string()));
            return;
        }
    };

    info!(address = %target.address, "Link established");
    let id = peripheral.id();
    let _ = slot.set(peripheral);
    emit(TransportEvent::LinkEstablished);

    while let Some(event) = central_events.next().await {
        if let CentralEvent::DeviceDisconnected(gone) = event
            && gone == id
        {
            info!(address = %target.address, "Link lost");
            emit(TransportEvent::LinkLost);
            return;
        }
    }
}

#[async_trait]
impl Transport for BleTransport {
    async fn adapter_status(&self) -> AdapterStatus {
        let Some(adapter) = &self.adapter else {
            return AdapterStatus::Missing;
        };
        match adapter.adapter_state().await {
            Ok(CentralState::PoweredOn) => AdapterStatus::PoweredOn,
            Ok(CentralState::PoweredOff) => AdapterStatus::PoweredOff,
            // Some backends cannot tell; let the connect attempt decide.
            Ok(CentralState::Unknown) => AdapterStatus::PoweredOn,
            Err(e) => {
                warn!("Failed to query adapter state: {}", e);
                AdapterStatus::PoweredOn
            }
        }
    }

    #[tracing::instrument(level = "info", skip_all, fields(session = %session, address = %target.address))]
    async fn connect(
        &self,
        session: SessionId,
        target: &LinkConfig,
        events: EventSink,
    ) -> Result<()> {
        let adapter = self.adapter()?.clone();

        let mut guard = self.session.lock().await;
        if let Some(mut previous) = guard.take() {
            debug!(previous = %previous.id, "Dropping previous session");
            previous.abort_tasks();
        }

        let peripheral = Arc::new(OnceLock::new());
        let mut live = BleSession {
            id: session,
            target: target.clone(),
            events,
            peripheral: Arc::clone(&peripheral),
            tasks: Vec::new(),
        };

        let sink = live.events.clone();
        let emit = move |event| {
            let _ = sink.send(SessionEvent::new(session, event));
        };
        live.tasks.push(tokio::spawn(drive_link(
            adapter,
            target.clone(),
            peripheral,
            emit,
        )));
        *guard = Some(live);
        Ok(())
    }

    #[tracing::instrument(level = "debug", skip(self))]
    async fn resolve_services(&self, session: SessionId) -> Result<()> {
        self.with_session(session, |live| {
            let peripheral = connected_peripheral(live)?;
            let target = live.target.clone();
            let sink = live.events.clone();

            live.tasks.push(tokio::spawn(async move {
                let resolution = match timeout(DISCOVERY_TIMEOUT, peripheral.discover_services())
                    .await
                {
                    Err(_) => ServiceResolution::Failed(
                        Error::timeout("discover services", DISCOVERY_TIMEOUT).to_string(),
                    ),
                    Ok(Err(e)) => ServiceResolution::Failed(e.to_string()),
                    Ok(Ok(())) => match find_characteristic(&peripheral, &target) {
                        Some(c) => ServiceResolution::Found(CharacteristicHandle {
                            service: c.service_uuid,
                            characteristic: c.uuid,
                            has_notify_descriptor: c
                                .descriptors
                                .iter()
                                .any(|d| d.uuid == target.descriptor_uuid),
                        }),
                        None => ServiceResolution::NotFound,
                    },
                };
                debug!(?resolution, "Service discovery finished");
                let _ = sink.send(SessionEvent::new(
                    session,
                    TransportEvent::ServicesResolved(resolution),
                ));
            }));
            Ok(())
        })
        .await
    }

    #[tracing::instrument(level = "debug", skip(self, handle))]
    async fn enable_notifications(
        &self,
        session: SessionId,
        handle: &CharacteristicHandle,
    ) -> Result<()> {
        let has_descriptor = handle.has_notify_descriptor;
        self.with_session(session, |live| {
            let peripheral = connected_peripheral(live)?;
            let characteristic = find_characteristic(&peripheral, &live.target)
                .ok_or_else(|| Error::Transport("characteristic not resolved".into()))?;
            let sink = live.events.clone();
            let emit = move |event| {
                let _ = sink.send(SessionEvent::new(session, event));
            };

            live.tasks.push(tokio::spawn(async move {
                let mut stream = match peripheral.notifications().await {
                    Ok(stream) => stream,
                    Err(e) => {
                        warn!("Failed to open notification stream: {}", e);
                        if has_descriptor {
                            emit(TransportEvent::DescriptorWritten(Err(e.to_string())));
                        }
                        return;
                    }
                };

                // btleplug writes the config descriptor as part of subscribing.
                let subscribed = peripheral.subscribe(&characteristic).await;
                if has_descriptor {
                    let failed = subscribed.is_err();
                    emit(TransportEvent::DescriptorWritten(
                        subscribed.map_err(|e| e.to_string()),
                    ));
                    if failed {
                        return;
                    }
                } else if let Err(e) = subscribed {
                    debug!("Subscribe without descriptor failed: {}", e);
                }

                while let Some(notification) = stream.next().await {
                    if notification.uuid == characteristic.uuid {
                        emit(TransportEvent::ValueReceived(notification.value));
                    }
                }
                debug!("Notification stream ended");
            }));
            Ok(())
        })
        .await
    }

    #[tracing::instrument(level = "debug", skip(self))]
    async fn read_value(&self, session: SessionId) -> Result<()> {
        self.with_session(session, |live| {
            let peripheral = connected_peripheral(live)?;
            let characteristic = find_characteristic(&peripheral, &live.target)
                .ok_or_else(|| Error::Transport("characteristic not resolved".into()))?;
            let sink = live.events.clone();

            live.tasks.push(tokio::spawn(async move {
                match peripheral.read(&characteristic).await {
                    Ok(value) => {
                        let _ = sink.send(SessionEvent::new(
                            session,
                            TransportEvent::ValueReceived(value),
                        ));
                    }
                    Err(e) => warn!("Characteristic read failed: {}", e),
                }
            }));
            Ok(())
        })
        .await
    }

    #[tracing::instrument(level = "info", skip(self))]
    async fn disconnect(&self, session: SessionId) -> Result<()> {
        let mut guard = self.session.lock().await;
        let live = match guard.as_mut() {
            Some(live) if live.id == session => live,
            _ => return Err(Error::UnknownSession(session.get())),
        };

        let result = match live.peripheral.get().cloned() {
            Some(peripheral) => disconnect_peripheral(&peripheral).await,
            None => Ok(()),
        };
        if let Err(e) = &result {
            warn!(%session, "Peripheral disconnect failed, dropping link anyway: {}", e);
        }

        // The watcher would report the same loss; stop it so it is reported once.
        live.abort_tasks();
        live.emit(TransportEvent::LinkLost);
        result
    }

    async fn release(&self, session: SessionId) {
        let mut guard = self.session.lock().await;
        if guard.as_ref().is_some_and(|live| live.id == session)
            && let Some(mut live) = guard.take()
        {
            debug!(%session, "Releasing session");
            live.abort_tasks();
        }
    }
}
