//! Mock transport implementation for testing.
//!
//! [`MockTransport`] implements [`Transport`] entirely in process. By default
//! it behaves like a healthy SmartZipper peripheral: every request is answered
//! at once with the event a real device would eventually produce. Tests can
//! switch that off and script events by hand, inject failures at each step,
//! and inspect every call the link made.
//!
//! # Features
//!
//! - **Failure injection**: missing or disabled adapter, rejected or failed
//!   connect, missing service, failed descriptor write, unacknowledged
//!   disconnect
//! - **Manual mode**: emit any event, for the live session or a stale one
//! - **Sensor simulation**: change the hall value and notify subscribers
//! - **Call recording**: assert on the exact sequence of transport requests

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::{Mutex, RwLock};
use tracing::debug;

use crate::config::LinkConfig;
use crate::error::{Error, Result};
use crate::transport::{
    AdapterStatus, CharacteristicHandle, EventSink, ServiceResolution, SessionEvent, SessionId,
    Transport, TransportEvent,
};

/// A request the link issued to the mock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockCall {
    AdapterStatus,
    Connect(SessionId),
    ResolveServices(SessionId),
    EnableNotifications(SessionId),
    ReadValue(SessionId),
    Disconnect(SessionId),
    Release(SessionId),
}

#[derive(Debug, Default)]
struct MockLink {
    sink: Option<EventSink>,
    session: Option<SessionId>,
    target: Option<LinkConfig>,
    connected: bool,
    notifying: bool,
}

/// An in-process hall-sensor peripheral.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use smartzipper_core::{Config, MockTransport, MonitorService};
/// use smartzipper_types::ConnectionState;
///
/// #[tokio::main]
/// async fn main() {
///     let mock = Arc::new(MockTransport::new());
///     let service = MonitorService::spawn(Config::default(), mock.clone()).unwrap();
///     service.connect().await.unwrap();
///
///     let mut state = service.state();
///     state.wait_for(|s| *s == ConnectionState::Ready).await.unwrap();
///
///     mock.set_value("0").await;
///     service.close().await;
/// }
/// ```
pub struct MockTransport {
    adapter: RwLock<AdapterStatus>,
    auto_respond: AtomicBool,
    has_descriptor: AtomicBool,
    resolution: RwLock<Option<ServiceResolution>>,
    connect_error: RwLock<Option<String>>,
    connect_failure: RwLock<Option<String>>,
    descriptor_error: RwLock<Option<String>>,
    disconnect_error: RwLock<Option<String>>,
    value: RwLock<Vec<u8>>,
    link: Mutex<MockLink>,
    calls: Mutex<Vec<MockCall>>,
}

impl std::fmt::Debug for MockTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockTransport")
            .field("auto_respond", &self.auto_respond.load(Ordering::Relaxed))
            .field("has_descriptor", &self.has_descriptor.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl MockTransport {
    /// A powered-on adapter and a healthy peripheral reporting closed.
    pub fn new() -> Self {
        MockTransportBuilder::new().build()
    }

    /// Start building a customised mock.
    pub fn builder() -> MockTransportBuilder {
        MockTransportBuilder::new()
    }

    /// Change what [`Transport::adapter_status`] reports.
    pub async fn set_adapter(&self, status: AdapterStatus) {
        *self.adapter.write().await = status;
    }

    /// Answer requests automatically (the default) or leave them pending.
    pub fn set_auto_respond(&self, auto: bool) {
        self.auto_respond.store(auto, Ordering::Relaxed);
    }

    /// Make the next descriptor writes fail (or succeed again with `None`).
    pub async fn set_descriptor_error(&self, error: Option<&str>) {
        *self.descriptor_error.write().await = error.map(str::to_string);
    }

    /// Set the sensor value and notify if notifications are enabled.
    ///
    /// Returns whether a notification was sent.
    pub async fn set_value(&self, raw: impl Into<Vec<u8>>) -> bool {
        let raw = raw.into();
        *self.value.write().await = raw.clone();
        let link = self.link.lock().await;
        if link.notifying {
            Self::send(&link, TransportEvent::ValueReceived(raw))
        } else {
            false
        }
    }

    /// Drop the link as if the peripheral went out of range.
    pub async fn drop_link(&self) -> bool {
        let mut link = self.link.lock().await;
        link.connected = false;
        link.notifying = false;
        Self::send(&link, TransportEvent::LinkLost)
    }

    /// Emit `event` for the live session.
    ///
    /// Returns `false` if there is no session to emit for.
    pub async fn emit(&self, event: TransportEvent) -> bool {
        let link = self.link.lock().await;
        Self::send(&link, event)
    }

    /// Emit `event` tagged with an arbitrary session, stale or not.
    pub async fn emit_for(&self, session: SessionId, event: TransportEvent) -> bool {
        let link = self.link.lock().await;
        link.sink
            .as_ref()
            .is_some_and(|sink| sink.send(SessionEvent::new(session, event)).is_ok())
    }

    /// The session the mock is currently serving.
    pub async fn session(&self) -> Option<SessionId> {
        self.link.lock().await.session
    }

    /// Whether the physical link is up.
    pub async fn is_connected(&self) -> bool {
        self.link.lock().await.connected
    }

    /// Whether notifications are enabled on the live link.
    pub async fn is_notifying(&self) -> bool {
        self.link.lock().await.notifying
    }

    /// Every request received so far, in order.
    pub async fn calls(&self) -> Vec<MockCall> {
        self.calls.lock().await.clone()
    }

    /// Forget recorded calls.
    pub async fn clear_calls(&self) {
        self.calls.lock().await.clear();
    }

    fn send(link: &MockLink, event: TransportEvent) -> bool {
        match (&link.sink, link.session) {
            (Some(sink), Some(session)) => sink.send(SessionEvent::new(session, event)).is_ok(),
            _ => false,
        }
    }

    async fn record(&self, call: MockCall) {
        debug!(?call, "Mock transport call");
        self.calls.lock().await.push(call);
    }

    fn auto(&self) -> bool {
        self.auto_respond.load(Ordering::Relaxed)
    }

    async fn live_link(&self, session: SessionId) -> Result<tokio::sync::MutexGuard<'_, MockLink>> {
        let link = self.link.lock().await;
        if link.session == Some(session) {
            Ok(link)
        } else {
            Err(Error::UnknownSession(session.get()))
        }
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn adapter_status(&self) -> AdapterStatus {
        self.record(MockCall::AdapterStatus).await;
        *self.adapter.read().await
    }

    async fn connect(
        &self,
        session: SessionId,
        target: &LinkConfig,
        events: EventSink,
    ) -> Result<()> {
        self.record(MockCall::Connect(session)).await;
        if let Some(message) = self.connect_error.read().await.clone() {
            return Err(Error::Transport(message));
        }

        let mut link = self.link.lock().await;
        *link = MockLink {
            sink: Some(events),
            session: Some(session),
            target: Some(target.clone()),
            connected: false,
            notifying: false,
        };

        if self.auto() {
            match self.connect_failure.read().await.clone() {
                Some(message) => {
                    Self::send(&link, TransportEvent::ConnectFailed(message));
                }
                None => {
                    link.connected = true;
                    Self::send(&link, TransportEvent::LinkEstablished);
                }
            }
        }
        Ok(())
    }

    async fn resolve_services(&self, session: SessionId) -> Result<()> {
        self.record(MockCall::ResolveServices(session)).await;
        let link = self.live_link(session).await?;
        if self.auto() {
            let resolution = match self.resolution.read().await.clone() {
                Some(resolution) => resolution,
                None => {
                    let target = link.target.clone().unwrap_or_default();
                    ServiceResolution::Found(CharacteristicHandle {
                        service: target.service_uuid,
                        characteristic: target.characteristic_uuid,
                        has_notify_descriptor: self.has_descriptor.load(Ordering::Relaxed),
                    })
                }
            };
            Self::send(&link, TransportEvent::ServicesResolved(resolution));
        }
        Ok(())
    }

    async fn enable_notifications(
        &self,
        session: SessionId,
        handle: &CharacteristicHandle,
    ) -> Result<()> {
        self.record(MockCall::EnableNotifications(session)).await;
        let mut link = self.live_link(session).await?;
        if !handle.has_notify_descriptor {
            link.notifying = true;
            return Ok(());
        }
        if self.auto() {
            let result = match self.descriptor_error.read().await.clone() {
                Some(message) => Err(message),
                None => Ok(()),
            };
            link.notifying = result.is_ok();
            Self::send(&link, TransportEvent::DescriptorWritten(result));
        } else {
            link.notifying = true;
        }
        Ok(())
    }

    async fn read_value(&self, session: SessionId) -> Result<()> {
        self.record(MockCall::ReadValue(session)).await;
        let link = self.live_link(session).await?;
        if self.auto() {
            let value = self.value.read().await.clone();
            Self::send(&link, TransportEvent::ValueReceived(value));
        }
        Ok(())
    }

    async fn disconnect(&self, session: SessionId) -> Result<()> {
        self.record(MockCall::Disconnect(session)).await;
        let mut link = self.live_link(session).await?;
        link.connected = false;
        link.notifying = false;
        if self.auto() {
            Self::send(&link, TransportEvent::LinkLost);
        }
        match self.disconnect_error.read().await.clone() {
            Some(message) => Err(Error::Transport(message)),
            None => Ok(()),
        }
    }

    async fn release(&self, session: SessionId) {
        self.record(MockCall::Release(session)).await;
        let mut link = self.link.lock().await;
        if link.session == Some(session) {
            link.session = None;
            link.target = None;
            link.connected = false;
            link.notifying = false;
        }
    }
}

/// Builder for creating mock transports with custom behaviour.
#[derive(Debug, Clone)]
pub struct MockTransportBuilder {
    adapter: AdapterStatus,
    auto_respond: bool,
    has_descriptor: bool,
    resolution: Option<ServiceResolution>,
    connect_error: Option<String>,
    connect_failure: Option<String>,
    descriptor_error: Option<String>,
    disconnect_error: Option<String>,
    value: Vec<u8>,
}

impl Default for MockTransportBuilder {
    fn default() -> Self {
        Self {
            adapter: AdapterStatus::PoweredOn,
            auto_respond: true,
            has_descriptor: true,
            resolution: None,
            connect_error: None,
            connect_failure: None,
            descriptor_error: None,
            disconnect_error: None,
            value: b"1".to_vec(),
        }
    }
}

impl MockTransportBuilder {
    /// Create a new builder with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adapter availability.
    #[must_use]
    pub fn adapter(mut self, status: AdapterStatus) -> Self {
        self.adapter = status;
        self
    }

    /// Answer requests automatically.
    #[must_use]
    pub fn auto_respond(mut self, auto: bool) -> Self {
        self.auto_respond = auto;
        self
    }

    /// Whether the characteristic has a notification descriptor.
    #[must_use]
    pub fn notify_descriptor(mut self, present: bool) -> Self {
        self.has_descriptor = present;
        self
    }

    /// Service discovery answers with this instead of finding the target.
    #[must_use]
    pub fn resolution(mut self, resolution: ServiceResolution) -> Self {
        self.resolution = Some(resolution);
        self
    }

    /// `connect()` itself returns an error.
    #[must_use]
    pub fn reject_connect(mut self, message: &str) -> Self {
        self.connect_error = Some(message.to_string());
        self
    }

    /// The connect request is accepted but the link never comes up.
    #[must_use]
    pub fn fail_connect(mut self, message: &str) -> Self {
        self.connect_failure = Some(message.to_string());
        self
    }

    /// Descriptor writes fail.
    #[must_use]
    pub fn fail_descriptor_write(mut self, message: &str) -> Self {
        self.descriptor_error = Some(message.to_string());
        self
    }

    /// The peripheral never acknowledges a disconnect. The link is still
    /// dropped, as a real stack would after giving up.
    #[must_use]
    pub fn fail_disconnect(mut self, message: &str) -> Self {
        self.disconnect_error = Some(message.to_string());
        self
    }

    /// Initial sensor value.
    #[must_use]
    pub fn value(mut self, raw: &str) -> Self {
        self.value = raw.as_bytes().to_vec();
        self
    }

    /// Build the mock transport.
    #[must_use]
    pub fn build(self) -> MockTransport {
        MockTransport {
            adapter: RwLock::new(self.adapter),
            auto_respond: AtomicBool::new(self.auto_respond),
            has_descriptor: AtomicBool::new(self.has_descriptor),
            resolution: RwLock::new(self.resolution),
            connect_error: RwLock::new(self.connect_error),
            connect_failure: RwLock::new(self.connect_failure),
            descriptor_error: RwLock::new(self.descriptor_error),
            disconnect_error: RwLock::new(self.disconnect_error),
            value: RwLock::new(self.value),
            link: Mutex::new(MockLink::default()),
            calls: Mutex::new(Vec::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::event_channel;

    #[tokio::test]
    async fn test_auto_connect_sequence() {
        let mock = MockTransport::new();
        let (sink, mut source) = event_channel();
        let session = SessionId::new(1);

        mock.connect(session, &LinkConfig::default(), sink).await.unwrap();
        assert_eq!(source.recv().await.unwrap().event, TransportEvent::LinkEstablished);
        assert!(mock.is_connected().await);

        mock.resolve_services(session).await.unwrap();
        let TransportEvent::ServicesResolved(ServiceResolution::Found(handle)) =
            source.recv().await.unwrap().event
        else {
            panic!("expected resolved services");
        };
        assert!(handle.has_notify_descriptor);

        mock.enable_notifications(session, &handle).await.unwrap();
        assert_eq!(
            source.recv().await.unwrap().event,
            TransportEvent::DescriptorWritten(Ok(()))
        );
        assert!(mock.is_notifying().await);

        assert!(mock.set_value("0").await);
        assert_eq!(
            source.recv().await.unwrap(),
            SessionEvent::new(session, TransportEvent::ValueReceived(b"0".to_vec()))
        );
    }

    #[tokio::test]
    async fn test_reject_connect() {
        let mock = MockTransport::builder().reject_connect("radio busy").build();
        let (sink, _source) = event_channel();
        let err = mock
            .connect(SessionId::new(1), &LinkConfig::default(), sink)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("radio busy"));
        assert!(mock.session().await.is_none());
    }

    #[tokio::test]
    async fn test_unknown_session_rejected() {
        let mock = MockTransport::new();
        assert!(matches!(
            mock.read_value(SessionId::new(9)).await,
            Err(Error::UnknownSession(9))
        ));
    }

    #[tokio::test]
    async fn test_manual_mode_sends_nothing() {
        let mock = MockTransport::builder().auto_respond(false).build();
        let (sink, mut source) = event_channel();
        let session = SessionId::new(3);
        mock.connect(session, &LinkConfig::default(), sink).await.unwrap();
        assert!(source.try_recv().is_err());

        assert!(mock.emit(TransportEvent::LinkEstablished).await);
        assert_eq!(source.recv().await.unwrap().session, session);
    }

    #[tokio::test]
    async fn test_release_forgets_session_and_records_calls() {
        let mock = MockTransport::new();
        let (sink, _source) = event_channel();
        let session = SessionId::new(1);
        mock.connect(session, &LinkConfig::default(), sink).await.unwrap();
        mock.disconnect(session).await.unwrap();
        mock.release(session).await;
        mock.release(session).await;

        assert!(mock.session().await.is_none());
        assert!(!mock.emit(TransportEvent::LinkLost).await);
        assert_eq!(
            mock.calls().await,
            vec![
                MockCall::Connect(session),
                MockCall::Disconnect(session),
                MockCall::Release(session),
                MockCall::Release(session),
            ]
        );
        mock.clear_calls().await;
        assert!(mock.calls().await.is_empty());
    }
}
