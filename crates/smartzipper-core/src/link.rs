//! Connection lifecycle of the hall-sensor link.
//!
//! [`LinkMachine`] is the pure state machine: it consumes commands and
//! [`SessionEvent`]s and answers with a [`Transition`] listing what the
//! outside world should see ([`LinkOutput`]) and what the transport should do
//! next ([`LinkEffect`]). It never awaits and never calls the transport.
//!
//! [`LinkController`] pairs a machine with a [`Transport`] and carries the
//! effects out, feeding request failures back into the machine.

use std::collections::VecDeque;
use std::sync::Arc;

use tracing::{debug, info, warn};

use smartzipper_types::{ConnectionState, LinkError};

use crate::config::LinkConfig;
use crate::reading::SensorReading;
use crate::transport::{
    AdapterStatus, CharacteristicHandle, EventSink, ServiceResolution, SessionEvent, SessionId,
    Transport, TransportEvent,
};

/// Something the link reports to its owner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkOutput {
    /// The connection state moved.
    StateChanged(ConnectionState),
    /// The attempt failed; always accompanies (or follows) a move to `Error`.
    Failed(LinkError),
    /// A value arrived from the hall characteristic.
    Reading(SensorReading),
}

/// A transport request the machine wants issued.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEffect {
    Connect(SessionId),
    ResolveServices(SessionId),
    EnableNotifications(SessionId, CharacteristicHandle),
    ReadValue(SessionId),
    Disconnect(SessionId),
    Release(SessionId),
}

/// Result of feeding one input to a [`LinkMachine`].
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Transition {
    /// Observable consequences, in order.
    pub outputs: Vec<LinkOutput>,
    /// Transport requests to issue, in order.
    pub effects: Vec<LinkEffect>,
}

impl Transition {
    /// The states entered by this transition, in order.
    pub fn states(&self) -> impl Iterator<Item = ConnectionState> + '_ {
        self.outputs.iter().filter_map(|output| match output {
            LinkOutput::StateChanged(state) => Some(*state),
            _ => None,
        })
    }

    /// Whether the transition did nothing at all.
    pub fn is_empty(&self) -> bool {
        self.outputs.is_empty() && self.effects.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Connecting,
    Resolving,
    Subscribing,
    Ready,
    Failed,
}

#[derive(Debug, Clone)]
struct LinkSession {
    id: SessionId,
    phase: Phase,
    characteristic: Option<CharacteristicHandle>,
}

/// Pure connection state machine.
///
/// At most one session is live. Every transition into `Disconnected` destroys
/// it, and events tagged with any other [`SessionId`] are dropped before they
/// can touch state.
#[derive(Debug, Default)]
pub struct LinkMachine {
    state: ConnectionState,
    session: Option<LinkSession>,
    last_issued: SessionId,
    last_error: Option<LinkError>,
}

impl LinkMachine {
    /// A machine in `Disconnected` with no session.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// The live session, if any.
    pub fn session(&self) -> Option<SessionId> {
        self.session.as_ref().map(|s| s.id)
    }

    /// The failure that put the machine into `Error`, if it is there.
    pub fn last_error(&self) -> Option<&LinkError> {
        self.last_error.as_ref()
    }

    /// Handle a connect command given the adapter's current status.
    ///
    /// Ignored unless the state is `Disconnected` or `Error`. A session left
    /// behind by a failed attempt is torn down first.
    pub fn begin_connect(&mut self, adapter: AdapterStatus) -> Transition {
        let mut t = Transition::default();
        if !self.state.accepts_connect() {
            debug!(state = ?self.state, "Connect ignored, link is busy");
            return t;
        }

        if let Some(stale) = self.session.take() {
            debug!(session = %stale.id, "Tearing down session left by failed attempt");
            t.effects.push(LinkEffect::Disconnect(stale.id));
            t.effects.push(LinkEffect::Release(stale.id));
        }

        match adapter {
            AdapterStatus::Missing => {
                self.fail_now(LinkError::TransportUnavailable, &mut t);
                return t;
            }
            AdapterStatus::PoweredOff => {
                self.fail_now(LinkError::RadioDisabled, &mut t);
                return t;
            }
            AdapterStatus::PoweredOn => {}
        }

        let id = self.last_issued.next();
        self.last_issued = id;
        self.session = Some(LinkSession {
            id,
            phase: Phase::Connecting,
            characteristic: None,
        });
        self.enter(ConnectionState::Connecting, &mut t);
        t.effects.push(LinkEffect::Connect(id));
        t
    }

    /// The connect request for `session` failed outright.
    pub fn connect_failed(&mut self, session: SessionId, reason: String) -> Transition {
        let mut t = Transition::default();
        if !self.is_live(session) {
            debug!(%session, "Dropping connect failure for stale session");
            return t;
        }
        self.session = None;
        t.effects.push(LinkEffect::Release(session));
        self.fail_now(LinkError::ConnectRequestFailed(reason), &mut t);
        t
    }

    /// A request issued for `session` failed before producing an event.
    pub fn fail(&mut self, session: SessionId, error: LinkError) -> Transition {
        let mut t = Transition::default();
        if !self.is_live(session) {
            debug!(%session, %error, "Dropping failure for stale session");
            return t;
        }
        self.fail_now(error, &mut t);
        t
    }

    /// Notifications were enabled locally for `session`.
    ///
    /// Completes the subscription when the characteristic has no descriptor
    /// to write; otherwise readiness waits for the descriptor write.
    pub fn notifications_enabled(&mut self, session: SessionId) -> Transition {
        let mut t = Transition::default();
        let Some(live) = self.live_mut(session) else {
            return t;
        };
        let needs_descriptor = live
            .characteristic
            .as_ref()
            .is_some_and(|c| c.has_notify_descriptor);
        if live.phase == Phase::Subscribing && !needs_descriptor {
            live.phase = Phase::Ready;
            self.enter(ConnectionState::Ready, &mut t);
        }
        t
    }

    /// Feed one transport event.
    pub fn apply(&mut self, event: SessionEvent) -> Transition {
        let mut t = Transition::default();
        let SessionEvent { session, event } = event;
        let Some(live) = self.live_mut(session) else {
            debug!(%session, ?event, "Dropping event for stale session");
            return t;
        };
        let phase = live.phase;

        match event {
            TransportEvent::LinkEstablished if phase == Phase::Connecting => {
                live.phase = Phase::Resolving;
                self.enter(ConnectionState::Connected, &mut t);
                self.enter(ConnectionState::DiscoveringServices, &mut t);
                t.effects.push(LinkEffect::ResolveServices(session));
            }
            TransportEvent::ConnectFailed(reason) if phase == Phase::Connecting => {
                return self.connect_failed(session, reason);
            }
            TransportEvent::LinkLost => {
                self.session = None;
                t.effects.push(LinkEffect::Release(session));
                self.enter(ConnectionState::Disconnected, &mut t);
            }
            TransportEvent::ServicesResolved(resolution) if phase == Phase::Resolving => {
                match resolution {
                    ServiceResolution::Found(handle) => {
                        live.phase = Phase::Subscribing;
                        live.characteristic = Some(handle.clone());
                        t.effects
                            .push(LinkEffect::EnableNotifications(session, handle));
                    }
                    ServiceResolution::NotFound => {
                        self.fail_now(LinkError::ServiceNotFound, &mut t);
                    }
                    ServiceResolution::Failed(reason) => {
                        self.fail_now(LinkError::ServiceDiscoveryFailed(reason), &mut t);
                    }
                }
            }
            TransportEvent::DescriptorWritten(result) if phase == Phase::Subscribing => {
                match result {
                    Ok(()) => {
                        live.phase = Phase::Ready;
                        self.enter(ConnectionState::Ready, &mut t);
                    }
                    Err(reason) => {
                        self.fail_now(LinkError::SubscriptionFailed(reason), &mut t);
                    }
                }
            }
            TransportEvent::ValueReceived(payload) => {
                t.outputs
                    .push(LinkOutput::Reading(SensorReading::decode(&payload)));
            }
            other => {
                debug!(%session, ?phase, event = ?other, "Dropping event out of sequence");
            }
        }
        t
    }

    /// Ask the transport to drop the link. Cleanup happens when the link-lost
    /// event arrives; without a session this does nothing.
    pub fn request_disconnect(&self) -> Transition {
        let mut t = Transition::default();
        if let Some(session) = self.session() {
            t.effects.push(LinkEffect::Disconnect(session));
        }
        t
    }

    /// Disconnect and release unconditionally. Safe to call repeatedly.
    pub fn close(&mut self) -> Transition {
        let mut t = Transition::default();
        if let Some(live) = self.session.take() {
            t.effects.push(LinkEffect::Disconnect(live.id));
            t.effects.push(LinkEffect::Release(live.id));
        }
        self.enter(ConnectionState::Disconnected, &mut t);
        t
    }

    /// Read the characteristic once, if the link is `Ready`.
    pub fn request_read(&self) -> Transition {
        let mut t = Transition::default();
        match self.session() {
            Some(session) if self.state == ConnectionState::Ready => {
                t.effects.push(LinkEffect::ReadValue(session));
            }
            _ => debug!(state = ?self.state, "Read ignored, link not ready"),
        }
        t
    }

    fn is_live(&self, session: SessionId) -> bool {
        self.session().is_some_and(|id| id == session)
    }

    fn live_mut(&mut self, session: SessionId) -> Option<&mut LinkSession> {
        self.session.as_mut().filter(|s| s.id == session)
    }

    fn fail_now(&mut self, error: LinkError, t: &mut Transition) {
        warn!(kind = error.kind(), "Link failed: {}", error);
        if let Some(live) = self.session.as_mut() {
            live.phase = Phase::Failed;
        }
        self.enter(ConnectionState::Error, t);
        self.last_error = Some(error.clone());
        t.outputs.push(LinkOutput::Failed(error));
    }

    fn enter(&mut self, state: ConnectionState, t: &mut Transition) {
        if self.state == state {
            return;
        }
        debug_assert!(
            self.state.can_transition_to(state),
            "illegal link transition {:?} -> {:?}",
            self.state,
            state
        );
        info!(from = ?self.state, to = ?state, "Link state changed");
        if state != ConnectionState::Error {
            self.last_error = None;
        }
        self.state = state;
        t.outputs.push(LinkOutput::StateChanged(state));
    }
}

/// Drives a [`LinkMachine`] against a [`Transport`].
pub struct LinkController {
    machine: LinkMachine,
    transport: Arc<dyn Transport>,
    config: LinkConfig,
    events: EventSink,
}

impl std::fmt::Debug for LinkController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LinkController")
            .field("machine", &self.machine)
            .field("address", &self.config.address)
            .finish()
    }
}

impl LinkController {
    /// Create a controller. Transport events for its sessions are delivered
    /// on `events`; the owner feeds them back through
    /// [`handle_event`](Self::handle_event).
    pub fn new(transport: Arc<dyn Transport>, config: LinkConfig, events: EventSink) -> Self {
        Self {
            machine: LinkMachine::new(),
            transport,
            config,
            events,
        }
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        self.machine.state()
    }

    /// The live session, if any.
    pub fn session(&self) -> Option<SessionId> {
        self.machine.session()
    }

    /// The configuration this controller connects with.
    pub fn config(&self) -> &LinkConfig {
        &self.config
    }

    /// Start a connection attempt.
    ///
    /// The adapter is only consulted when the state accepts a connect, so a
    /// busy link never touches the transport.
    pub async fn connect(&mut self) -> Vec<LinkOutput> {
        let adapter = if self.machine.state().accepts_connect() {
            self.transport.adapter_status().await
        } else {
            AdapterStatus::PoweredOn
        };
        let transition = self.machine.begin_connect(adapter);
        self.run(transition).await
    }

    /// Request a transport-level disconnect. Idempotent.
    pub async fn disconnect(&mut self) -> Vec<LinkOutput> {
        let transition = self.machine.request_disconnect();
        self.run(transition).await
    }

    /// Disconnect and release everything.
    pub async fn close(&mut self) -> Vec<LinkOutput> {
        let transition = self.machine.close();
        self.run(transition).await
    }

    /// Read the characteristic once if `Ready`.
    pub async fn read_value_once(&mut self) -> Vec<LinkOutput> {
        let transition = self.machine.request_read();
        self.run(transition).await
    }

    /// Feed an event received from the transport.
    pub async fn handle_event(&mut self, event: SessionEvent) -> Vec<LinkOutput> {
        let transition = self.machine.apply(event);
        self.run(transition).await
    }

    async fn run(&mut self, transition: Transition) -> Vec<LinkOutput> {
        let Transition {
            mut outputs,
            effects,
        } = transition;
        let mut pending: VecDeque<LinkEffect> = effects.into();

        while let Some(effect) = pending.pop_front() {
            if let Some(follow_up) = self.execute(effect).await {
                outputs.extend(follow_up.outputs);
                pending.extend(follow_up.effects);
            }
        }
        outputs
    }

    async fn execute(&mut self, effect: LinkEffect) -> Option<Transition> {
        match effect {
            LinkEffect::Connect(session) => {
                let result = self
                    .transport
                    .connect(session, &self.config, self.events.clone())
                    .await;
                result
                    .err()
                    .map(|e| self.machine.connect_failed(session, e.to_string()))
            }
            LinkEffect::ResolveServices(session) => {
                let result = self.transport.resolve_services(session).await;
                result.err().map(|e| {
                    self.machine
                        .fail(session, LinkError::ServiceDiscoveryFailed(e.to_string()))
                })
            }
            LinkEffect::EnableNotifications(session, handle) => {
                match self.transport.enable_notifications(session, &handle).await {
                    Ok(()) => Some(self.machine.notifications_enabled(session)),
                    Err(e) => Some(
                        self.machine
                            .fail(session, LinkError::SubscriptionFailed(e.to_string())),
                    ),
                }
            }
            LinkEffect::ReadValue(session) => {
                if let Err(e) = self.transport.read_value(session).await {
                    warn!(%session, "Read request failed: {}", e);
                }
                None
            }
            LinkEffect::Disconnect(session) => {
                if let Err(e) = self.transport.disconnect(session).await {
                    warn!(%session, "Disconnect request failed: {}", e);
                }
                None
            }
            LinkEffect::Release(session) => {
                self.transport.release(session).await;
                None
            }
        }
    }
}
