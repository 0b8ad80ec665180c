//! The seam between the link state machine and a Bluetooth stack.
//!
//! A [`Transport`] issues requests (connect, resolve services, enable
//! notifications, read) and reports their asynchronous outcome as
//! [`SessionEvent`]s on the channel handed to [`Transport::connect`]. The
//! transport never mutates link state itself; it only tags what it observed
//! with the [`SessionId`] of the attempt that caused it.

use std::fmt;

use async_trait::async_trait;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::config::LinkConfig;
use crate::error::Result;

/// Generation number of one physical connection attempt.
///
/// Identifiers increase monotonically for the lifetime of a controller, so an
/// event tagged with anything other than the live session's id is stale.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SessionId(u64);

impl SessionId {
    /// Create a session id from its raw generation number.
    pub const fn new(generation: u64) -> Self {
        Self(generation)
    }

    /// The raw generation number.
    pub const fn get(self) -> u64 {
        self.0
    }

    /// The id following this one.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Availability of the local Bluetooth radio.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdapterStatus {
    /// No adapter is present.
    Missing,
    /// An adapter exists but is switched off.
    PoweredOff,
    /// Ready to connect.
    PoweredOn,
}

/// The resolved hall characteristic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CharacteristicHandle {
    /// Service the characteristic belongs to.
    pub service: Uuid,
    /// The characteristic itself.
    pub characteristic: Uuid,
    /// Whether the characteristic carries the notification config descriptor.
    ///
    /// Without it notifications are enabled locally and the link is ready at
    /// once; with it readiness waits for the descriptor write to complete.
    pub has_notify_descriptor: bool,
}

/// Outcome of service discovery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceResolution {
    /// The configured service and characteristic were found.
    Found(CharacteristicHandle),
    /// Discovery completed but the service or characteristic is absent.
    NotFound,
    /// Discovery itself failed.
    Failed(String),
}

/// Something the transport observed on a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// The physical link is up.
    LinkEstablished,
    /// The connect request could not be carried out.
    ConnectFailed(String),
    /// The physical link went away, whether requested or not.
    LinkLost,
    /// Service discovery finished.
    ServicesResolved(ServiceResolution),
    /// The notification descriptor write completed.
    DescriptorWritten(std::result::Result<(), String>),
    /// A notification or read reply for the hall characteristic.
    ValueReceived(Vec<u8>),
}

/// A [`TransportEvent`] tagged with the session that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionEvent {
    /// The attempt this event belongs to.
    pub session: SessionId,
    /// What happened.
    pub event: TransportEvent,
}

impl SessionEvent {
    /// Tag `event` with `session`.
    pub fn new(session: SessionId, event: TransportEvent) -> Self {
        Self { session, event }
    }
}

/// Sender half transports use to report [`SessionEvent`]s.
pub type EventSink = mpsc::UnboundedSender<SessionEvent>;

/// Receiver half drained by the link owner.
pub type EventSource = mpsc::UnboundedReceiver<SessionEvent>;

/// Create a transport event channel.
pub fn event_channel() -> (EventSink, EventSource) {
    mpsc::unbounded_channel()
}

/// A Bluetooth stack able to drive one hall-sensor link at a time.
///
/// Methods return once a request has been *issued*. Whatever the request
/// eventually produces arrives as a [`SessionEvent`] on the sink given to
/// [`connect`](Transport::connect). An `Err` means the request could not be
/// issued at all.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Report whether an adapter exists and its radio is on.
    async fn adapter_status(&self) -> AdapterStatus;

    /// Begin a direct connection to `target.address` for `session`.
    ///
    /// Emits [`TransportEvent::LinkEstablished`] once the link is up,
    /// [`TransportEvent::ConnectFailed`] if it never comes up, and
    /// [`TransportEvent::LinkLost`] whenever an established link drops.
    async fn connect(&self, session: SessionId, target: &LinkConfig, events: EventSink)
    -> Result<()>;

    /// Start service discovery; emits [`TransportEvent::ServicesResolved`].
    async fn resolve_services(&self, session: SessionId) -> Result<()>;

    /// Enable value notifications for `handle`.
    ///
    /// When the handle has a notification descriptor this also starts the
    /// descriptor write, reported as [`TransportEvent::DescriptorWritten`].
    async fn enable_notifications(
        &self,
        session: SessionId,
        handle: &CharacteristicHandle,
    ) -> Result<()>;

    /// Request one read of the characteristic; the reply arrives as
    /// [`TransportEvent::ValueReceived`].
    async fn read_value(&self, session: SessionId) -> Result<()>;

    /// Ask the peripheral to drop the link.
    ///
    /// The link is given up and [`TransportEvent::LinkLost`] emitted even
    /// when the peripheral does not acknowledge; the `Err` only reports that.
    async fn disconnect(&self, session: SessionId) -> Result<()>;

    /// Free everything held for `session`. Safe to call more than once.
    async fn release(&self, session: SessionId);
}
