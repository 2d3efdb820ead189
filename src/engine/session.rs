//! Bundled [`Session`] implementation over [`Frame`]s.

use std::{
    collections::{BTreeMap, HashMap, HashSet, VecDeque},
    time::{Duration, Instant},
};

use bytes::{Buf, BytesMut};
use log::debug;
use tokio_util::codec::{Decoder, Encoder};

use super::{
    ConnectionProperties,
    Container,
    DeliveryTag,
    EngineError,
    Event,
    LinkHandle,
    ReceiverEvent,
    SaslMode,
    SaslOutcome,
    SendStatus,
    SenderEvent,
    Session,
    frame::{Frame, FrameCodec, Role},
};
use crate::message::WireMessage;

/// Mechanism offered by clients that were not given one.
const DEFAULT_MECHANISM: &str = "ANONYMOUS";

/// Input buffered beyond this many frames stops read interest.
const INPUT_FRAMES_BUFFERED: usize = 4;

/// [`Container`] producing [`FrameSession`]s.
#[derive(Clone, Debug)]
pub struct FrameContainer {
    name: String,
}

impl FrameContainer {
    /// Create a container advertising `name` as its identity.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self { Self { name: name.into() } }
}

impl Container for FrameContainer {
    type Session = FrameSession;

    fn name(&self) -> &str { &self.name }

    fn create_session(
        &mut self,
        name: &str,
        properties: ConnectionProperties,
    ) -> Result<Self::Session, EngineError> {
        Ok(FrameSession::new(name, &self.name, properties))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Endpoint {
    Uninit,
    Active,
    Closed,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Sasl {
    Disabled,
    /// Server waiting for the client's mechanism.
    AwaitingInit,
    /// Server waiting for [`Session::sasl_done`].
    Stepping,
    /// Client waiting for the server's verdict.
    AwaitingOutcome,
    Done,
}

#[derive(Debug)]
struct Link {
    name: String,
    role: Role,
    local: Endpoint,
    remote: Endpoint,
    remote_handle: Option<u32>,
    source: Option<String>,
    target: Option<String>,
    /// Sender: remaining credit. Receiver: remaining capacity.
    credit: u32,
    delivery_count: u64,
    attach_sent: bool,
    active_reported: bool,
    closed_reported: bool,
    unsettled: HashSet<DeliveryTag>,
}

impl Link {
    fn new(name: &str, role: Role, source: Option<String>, target: Option<String>) -> Self {
        Self {
            name: name.to_owned(),
            role,
            local: Endpoint::Uninit,
            remote: Endpoint::Uninit,
            remote_handle: None,
            source,
            target,
            credit: 0,
            delivery_count: 0,
            attach_sent: false,
            active_reported: false,
            closed_reported: false,
            unsettled: HashSet::new(),
        }
    }

    fn event(&self, handle: LinkHandle, sender: SenderEvent, receiver: ReceiverEvent) -> Event {
        match self.role {
            Role::Sender => Event::Sender(handle, sender),
            Role::Receiver => Event::Receiver(handle, receiver),
        }
    }
}

/// Engine session speaking length-prefixed `bincode` [`Frame`]s.
///
/// Frames are parsed only in [`Session::process`]; everything the session
/// has to report is queued as an [`Event`].
#[derive(Debug)]
pub struct FrameSession {
    name: String,
    container_id: String,
    properties: ConnectionProperties,
    codec: FrameCodec,
    input: BytesMut,
    output: BytesMut,
    eof: bool,
    failed: bool,
    sasl: Sasl,
    mechanisms: Vec<String>,
    local: Endpoint,
    remote: Endpoint,
    open_sent: bool,
    active_reported: bool,
    closed_reported: bool,
    remote_container: Option<String>,
    remote_idle: Option<Duration>,
    links: BTreeMap<LinkHandle, Link>,
    remote_handles: HashMap<u32, LinkHandle>,
    next_handle: u32,
    next_delivery: u64,
    clock: Instant,
    last_received: Instant,
    last_sent: Instant,
    events: VecDeque<Event>,
}

impl FrameSession {
    /// Create a session named `name` for container `container_id`.
    #[must_use]
    pub fn new(name: &str, container_id: &str, properties: ConnectionProperties) -> Self {
        let now = Instant::now();
        Self {
            name: name.to_owned(),
            container_id: container_id.to_owned(),
            codec: FrameCodec::new(properties.max_frame_length),
            properties,
            input: BytesMut::new(),
            output: BytesMut::new(),
            eof: false,
            failed: false,
            sasl: Sasl::Disabled,
            mechanisms: Vec::new(),
            local: Endpoint::Uninit,
            remote: Endpoint::Uninit,
            open_sent: false,
            active_reported: false,
            closed_reported: false,
            remote_container: None,
            remote_idle: None,
            links: BTreeMap::new(),
            remote_handles: HashMap::new(),
            next_handle: 0,
            next_delivery: 0,
            clock: now,
            last_received: now,
            last_sent: now,
            events: VecDeque::new(),
        }
    }

    /// Container identity announced by the peer, once its open arrived.
    #[must_use]
    pub fn remote_container(&self) -> Option<&str> { self.remote_container.as_deref() }

    fn queue(&mut self, frame: &Frame) {
        tracing::debug!(session = %self.name, frame = frame.kind(), "frame out");
        if let Err(e) = self.codec.encode(frame, &mut self.output) {
            self.fail(format!("cannot encode {} frame: {e}", frame.kind()));
            return;
        }
        self.last_sent = self.clock;
    }

    fn fail(&mut self, error: String) {
        if self.failed {
            return;
        }
        debug!("session failed: name={}, error={error}", self.name);
        self.failed = true;
        self.remote = Endpoint::Closed;
        self.events.push_back(Event::Failed { error });
        self.check_closed();
    }

    fn sasl_settled(&self) -> bool { matches!(self.sasl, Sasl::Disabled | Sasl::Done) }

    fn flush_open(&mut self) {
        if self.local != Endpoint::Active || self.open_sent || !self.sasl_settled() {
            return;
        }
        let idle_timeout_ms = self
            .properties
            .idle_timeout
            .map_or(0, |idle| u32::try_from(idle.as_millis()).unwrap_or(u32::MAX));
        self.queue(&Frame::Open {
            container_id: self.container_id.clone(),
            idle_timeout_ms,
        });
        self.open_sent = true;
        let pending: Vec<_> = self
            .links
            .iter()
            .filter(|(_, link)| link.local == Endpoint::Active && !link.attach_sent)
            .map(|(handle, _)| *handle)
            .collect();
        for handle in pending {
            self.send_attach(handle);
        }
        self.check_active();
    }

    fn check_active(&mut self) {
        if self.local == Endpoint::Active
            && self.remote == Endpoint::Active
            && self.open_sent
            && !self.active_reported
        {
            self.active_reported = true;
            self.events.push_back(Event::Active);
        }
    }

    fn check_closed(&mut self) {
        if !self.closed_reported
            && self.local == Endpoint::Closed
            && self.remote == Endpoint::Closed
            && self.output.is_empty()
        {
            self.closed_reported = true;
            self.events.push_back(Event::Closed);
        }
    }

    fn send_attach(&mut self, handle: LinkHandle) {
        let Some(link) = self.links.get_mut(&handle) else {
            return;
        };
        link.attach_sent = true;
        let attach = Frame::Attach {
            handle: handle.as_u32(),
            name: link.name.clone(),
            role: link.role,
            source: link.source.clone(),
            target: link.target.clone(),
        };
        let flow = (link.role == Role::Receiver && link.credit > 0).then(|| Frame::Flow {
            handle: handle.as_u32(),
            delivery_count: link.delivery_count,
            credit: link.credit,
        });
        self.queue(&attach);
        if let Some(flow) = flow {
            self.queue(&flow);
        }
        self.check_link_active(handle);
    }

    fn check_link_active(&mut self, handle: LinkHandle) {
        let Some(link) = self.links.get_mut(&handle) else {
            return;
        };
        if link.local == Endpoint::Active
            && link.remote == Endpoint::Active
            && link.attach_sent
            && !link.active_reported
        {
            link.active_reported = true;
            let event = link.event(handle, SenderEvent::Active, ReceiverEvent::Active);
            self.events.push_back(event);
        }
    }

    fn check_link_closed(&mut self, handle: LinkHandle) {
        let Some(link) = self.links.get_mut(&handle) else {
            return;
        };
        if link.local == Endpoint::Closed && link.remote == Endpoint::Closed && !link.closed_reported
        {
            link.closed_reported = true;
            let event = link.event(handle, SenderEvent::Closed, ReceiverEvent::Closed);
            self.events.push_back(event);
        }
    }

    fn new_link(&mut self, link: Link) -> LinkHandle {
        let handle = LinkHandle::new(self.next_handle);
        self.next_handle = self.next_handle.wrapping_add(1);
        self.links.insert(handle, link);
        handle
    }

    fn remote_link(&self, remote: u32) -> Result<LinkHandle, EngineError> {
        self.remote_handles
            .get(&remote)
            .copied()
            .ok_or_else(|| EngineError::Protocol(format!("frame for unattached handle {remote}")))
    }

    fn handle_frame(&mut self, frame: Frame) -> Result<(), EngineError> {
        tracing::debug!(session = %self.name, frame = frame.kind(), "frame in");
        if !self.sasl_settled()
            && !matches!(frame, Frame::SaslInit { .. } | Frame::SaslOutcome { .. })
        {
            return Err(EngineError::Protocol(format!(
                "{} frame before SASL completed",
                frame.kind()
            )));
        }
        match frame {
            Frame::SaslInit { mechanism } => self.on_sasl_init(&mechanism),
            Frame::SaslOutcome { ok } => self.on_sasl_outcome(ok),
            Frame::Open {
                container_id,
                idle_timeout_ms,
            } => {
                if self.remote != Endpoint::Uninit {
                    return Err(EngineError::Protocol("duplicate open".into()));
                }
                self.remote = Endpoint::Active;
                self.remote_container = Some(container_id);
                self.remote_idle =
                    (idle_timeout_ms > 0).then(|| Duration::from_millis(idle_timeout_ms.into()));
                self.check_active();
                Ok(())
            }
            Frame::Close { error } => {
                self.remote = Endpoint::Closed;
                self.events.push_back(Event::RemoteClosed { reason: error });
                self.check_closed();
                Ok(())
            }
            Frame::Empty => Ok(()),
            frame => {
                if self.remote != Endpoint::Active {
                    return Err(EngineError::Protocol(format!(
                        "{} frame outside an open connection",
                        frame.kind()
                    )));
                }
                self.handle_link_frame(frame)
            }
        }
    }

    fn on_sasl_init(&mut self, mechanism: &str) -> Result<(), EngineError> {
        if self.sasl != Sasl::AwaitingInit {
            return Err(EngineError::Protocol("unexpected sasl-init".into()));
        }
        if !self.mechanisms.iter().any(|m| m == mechanism) {
            self.queue(&Frame::SaslOutcome { ok: false });
            return Err(EngineError::Protocol(format!(
                "unsupported SASL mechanism {mechanism}"
            )));
        }
        self.sasl = Sasl::Stepping;
        self.events.push_back(Event::SaslStep);
        Ok(())
    }

    fn on_sasl_outcome(&mut self, ok: bool) -> Result<(), EngineError> {
        if self.sasl != Sasl::AwaitingOutcome {
            return Err(EngineError::Protocol("unexpected sasl-outcome".into()));
        }
        self.sasl = Sasl::Done;
        if !ok {
            self.events.push_back(Event::SaslDone {
                outcome: SaslOutcome::Auth,
            });
            return Err(EngineError::Protocol("authentication rejected".into()));
        }
        self.events.push_back(Event::SaslDone {
            outcome: SaslOutcome::Ok,
        });
        self.flush_open();
        Ok(())
    }

    fn handle_link_frame(&mut self, frame: Frame) -> Result<(), EngineError> {
        match frame {
            Frame::Attach {
                handle,
                name,
                role,
                source,
                target,
            } => self.on_attach(handle, name, role, source, target),
            Frame::Detach { handle, error } => {
                let local = self.remote_link(handle)?;
                if let Some(link) = self.links.get_mut(&local) {
                    link.remote = Endpoint::Closed;
                    let event = link.event(
                        local,
                        SenderEvent::RemoteClosed {
                            error: error.clone(),
                        },
                        ReceiverEvent::RemoteClosed { error },
                    );
                    self.events.push_back(event);
                }
                self.remote_handles.remove(&handle);
                self.check_link_closed(local);
                Ok(())
            }
            Frame::Flow {
                handle,
                delivery_count,
                credit,
            } => {
                let local = self.remote_link(handle)?;
                let Some(link) = self.links.get_mut(&local) else {
                    return Ok(());
                };
                if link.role != Role::Sender {
                    return Err(EngineError::Protocol(format!("flow for receiving {local}")));
                }
                // Transfers still in flight when the peer computed this flow
                // were already charged against its credit.
                let available = delivery_count
                    .saturating_add(u64::from(credit))
                    .saturating_sub(link.delivery_count);
                link.credit = u32::try_from(available).unwrap_or(u32::MAX);
                if link.credit > 0 {
                    self.events
                        .push_back(Event::Sender(local, SenderEvent::CreditGranted));
                }
                Ok(())
            }
            Frame::Transfer {
                handle,
                delivery,
                message,
            } => {
                let local = self.remote_link(handle)?;
                let Some(link) = self.links.get_mut(&local) else {
                    return Ok(());
                };
                if link.role != Role::Receiver {
                    return Err(EngineError::Protocol(format!(
                        "transfer for sending {local}"
                    )));
                }
                if link.credit == 0 {
                    return Err(EngineError::Protocol(format!(
                        "transfer on {local} without capacity"
                    )));
                }
                link.credit -= 1;
                link.delivery_count += 1;
                let delivery = DeliveryTag::new(delivery);
                link.unsettled.insert(delivery);
                self.events.push_back(Event::Receiver(
                    local,
                    ReceiverEvent::MessageReceived { message, delivery },
                ));
                Ok(())
            }
            Frame::Disposition {
                handle,
                delivery,
                status,
            } => {
                let local = self.remote_link(handle)?;
                let tag = DeliveryTag::new(delivery);
                if let Some(link) = self.links.get_mut(&local)
                    && link.unsettled.remove(&tag)
                {
                    self.events.push_back(Event::Sender(
                        local,
                        SenderEvent::MessageSent { tag, status },
                    ));
                }
                Ok(())
            }
            other => Err(EngineError::Protocol(format!(
                "unexpected {} frame",
                other.kind()
            ))),
        }
    }

    fn on_attach(
        &mut self,
        remote: u32,
        name: String,
        role: Role,
        source: Option<String>,
        target: Option<String>,
    ) -> Result<(), EngineError> {
        if self.remote_handles.contains_key(&remote) {
            return Err(EngineError::Protocol(format!("handle {remote} already attached")));
        }
        let local_role = role.peer();

        // An attach answering one of our own links.
        let answered = self
            .links
            .iter()
            .find(|(_, link)| {
                link.name == name && link.role == local_role && link.remote == Endpoint::Uninit
                    && link.attach_sent
            })
            .map(|(handle, _)| *handle);
        if let Some(local) = answered {
            self.remote_handles.insert(remote, local);
            if let Some(link) = self.links.get_mut(&local) {
                link.remote = Endpoint::Active;
                link.remote_handle = Some(remote);
                match local_role {
                    Role::Receiver => link.source = source.or(link.source.take()),
                    Role::Sender => link.target = target.or(link.target.take()),
                }
            }
            self.check_link_active(local);
            return Ok(());
        }

        let mut link = Link::new(&name, local_role, source.clone(), target.clone());
        link.remote = Endpoint::Active;
        link.remote_handle = Some(remote);
        let local = self.new_link(link);
        self.remote_handles.insert(remote, local);
        let event = match local_role {
            Role::Sender => Event::SenderRequested {
                link: local,
                name,
                source,
            },
            Role::Receiver => Event::ReceiverRequested {
                link: local,
                name,
                target,
            },
        };
        self.events.push_back(event);
        Ok(())
    }

    fn accept_link(
        &mut self,
        handle: LinkHandle,
        role: Role,
        address: &str,
    ) -> Result<(), EngineError> {
        let link = self
            .links
            .get_mut(&handle)
            .filter(|link| link.role == role && link.local == Endpoint::Uninit)
            .ok_or(EngineError::UnknownLink(handle))?;
        match role {
            Role::Sender => link.source = Some(address.to_owned()),
            Role::Receiver => link.target = Some(address.to_owned()),
        }
        Ok(())
    }

    fn run_timers(&mut self, now: Instant) {
        if self.failed || self.local == Endpoint::Closed {
            return;
        }
        if let Some(idle) = self.properties.idle_timeout
            && now.saturating_duration_since(self.last_received) >= idle
        {
            self.fail("idle timeout".into());
            return;
        }
        if let Some(remote_idle) = self.remote_idle
            && self.open_sent
            && now.saturating_duration_since(self.last_sent) >= remote_idle / 2
        {
            self.queue(&Frame::Empty);
        }
    }
}

impl Session for FrameSession {
    fn name(&self) -> &str { &self.name }

    fn sasl(&mut self, mode: SaslMode, mechanisms: &[&str]) {
        self.mechanisms = mechanisms.iter().map(|m| (*m).to_owned()).collect();
        match mode {
            SaslMode::Server => self.sasl = Sasl::AwaitingInit,
            SaslMode::Client => {
                let mechanism = self
                    .mechanisms
                    .first()
                    .cloned()
                    .unwrap_or_else(|| DEFAULT_MECHANISM.to_owned());
                self.queue(&Frame::SaslInit { mechanism });
                self.sasl = Sasl::AwaitingOutcome;
            }
        }
    }

    fn sasl_done(&mut self, outcome: SaslOutcome) {
        if self.sasl != Sasl::Stepping {
            return;
        }
        self.sasl = Sasl::Done;
        self.queue(&Frame::SaslOutcome {
            ok: outcome == SaslOutcome::Ok,
        });
        self.events.push_back(Event::SaslDone { outcome });
        match outcome {
            SaslOutcome::Ok => self.flush_open(),
            SaslOutcome::Auth => self.fail("authentication refused".into()),
        }
    }

    fn open(&mut self) {
        if self.local != Endpoint::Uninit {
            return;
        }
        self.local = Endpoint::Active;
        self.flush_open();
    }

    fn close(&mut self, error: Option<&str>) {
        if self.local == Endpoint::Closed {
            return;
        }
        self.local = Endpoint::Closed;
        if self.open_sent {
            self.queue(&Frame::Close {
                error: error.map(str::to_owned),
            });
        }
        self.check_closed();
    }

    fn is_closed(&self) -> bool { self.closed_reported }

    fn destroy(&mut self) {
        self.links.clear();
        self.remote_handles.clear();
        self.events.clear();
        self.input.clear();
        self.output.clear();
        self.local = Endpoint::Closed;
        self.remote = Endpoint::Closed;
        self.closed_reported = true;
    }

    fn needs_input(&self) -> bool {
        !self.eof
            && !self.failed
            && !self.closed_reported
            && self.input.len() < self.codec.max_frame_length() * INPUT_FRAMES_BUFFERED
    }

    fn push_input(&mut self, bytes: &[u8]) -> Result<(), EngineError> {
        if self.eof || self.closed_reported {
            return Err(EngineError::Closed);
        }
        self.input.extend_from_slice(bytes);
        Ok(())
    }

    fn close_input(&mut self) { self.eof = true; }

    fn has_output(&self) -> bool { !self.output.is_empty() }

    fn output(&self) -> &[u8] { &self.output }

    fn consume_output(&mut self, count: usize) {
        self.output.advance(count.min(self.output.len()));
        self.check_closed();
    }

    fn deadline(&self) -> Option<Instant> {
        if self.failed || self.local == Endpoint::Closed || self.closed_reported {
            return None;
        }
        let idle = self
            .properties
            .idle_timeout
            .map(|idle| self.last_received + idle);
        let heartbeat = self
            .remote_idle
            .filter(|_| self.open_sent)
            .map(|remote| self.last_sent + remote / 2);
        match (idle, heartbeat) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    fn process(&mut self, now: Instant) {
        self.clock = now;
        while !self.failed {
            match self.codec.decode(&mut self.input) {
                Ok(Some(frame)) => {
                    self.last_received = now;
                    if let Err(e) = self.handle_frame(frame) {
                        self.fail(e.to_string());
                    }
                }
                Ok(None) => break,
                Err(e) => self.fail(e.to_string()),
            }
        }
        if self.eof && !self.failed && self.remote != Endpoint::Closed {
            self.fail("connection dropped by peer".into());
        }
        self.run_timers(now);
        self.check_closed();
    }

    fn next_event(&mut self) -> Option<Event> { self.events.pop_front() }

    fn accept_sender(&mut self, link: LinkHandle, source: &str) -> Result<(), EngineError> {
        self.accept_link(link, Role::Sender, source)
    }

    fn accept_receiver(&mut self, link: LinkHandle, target: &str) -> Result<(), EngineError> {
        self.accept_link(link, Role::Receiver, target)
    }

    fn create_sender(
        &mut self,
        name: &str,
        source: Option<&str>,
        target: Option<&str>,
    ) -> LinkHandle {
        self.new_link(Link::new(
            name,
            Role::Sender,
            source.map(str::to_owned),
            target.map(str::to_owned),
        ))
    }

    fn create_receiver(
        &mut self,
        name: &str,
        source: Option<&str>,
        target: Option<&str>,
    ) -> LinkHandle {
        self.new_link(Link::new(
            name,
            Role::Receiver,
            source.map(str::to_owned),
            target.map(str::to_owned),
        ))
    }

    fn open_link(&mut self, link: LinkHandle) {
        let Some(state) = self.links.get_mut(&link) else {
            return;
        };
        if state.local != Endpoint::Uninit {
            return;
        }
        state.local = Endpoint::Active;
        if self.open_sent {
            self.send_attach(link);
        }
    }

    fn close_link(&mut self, link: LinkHandle, error: Option<&str>) {
        let Some(state) = self.links.get_mut(&link) else {
            return;
        };
        if state.local == Endpoint::Closed {
            return;
        }
        state.local = Endpoint::Closed;
        if state.attach_sent && self.local != Endpoint::Closed {
            let detach = Frame::Detach {
                handle: link.as_u32(),
                error: error.map(str::to_owned),
            };
            self.queue(&detach);
        }
        self.check_link_closed(link);
    }

    fn destroy_link(&mut self, link: LinkHandle) {
        if let Some(state) = self.links.remove(&link)
            && let Some(remote) = state.remote_handle
        {
            self.remote_handles.remove(&remote);
        }
    }

    fn link_name(&self, link: LinkHandle) -> Option<&str> {
        self.links.get(&link).map(|state| state.name.as_str())
    }

    fn source_address(&self, link: LinkHandle) -> Option<&str> {
        self.links.get(&link).and_then(|state| state.source.as_deref())
    }

    fn target_address(&self, link: LinkHandle) -> Option<&str> {
        self.links.get(&link).and_then(|state| state.target.as_deref())
    }

    fn credit(&self, link: LinkHandle) -> u32 {
        self.links
            .get(&link)
            .filter(|state| state.role == Role::Sender)
            .map_or(0, |state| state.credit)
    }

    fn capacity(&self, link: LinkHandle) -> u32 {
        self.links
            .get(&link)
            .filter(|state| state.role == Role::Receiver)
            .map_or(0, |state| state.credit)
    }

    fn add_capacity(&mut self, link: LinkHandle, count: u32) {
        let Some(state) = self
            .links
            .get_mut(&link)
            .filter(|state| state.role == Role::Receiver)
        else {
            return;
        };
        state.credit = state.credit.saturating_add(count);
        if state.attach_sent && state.local == Endpoint::Active {
            let flow = Frame::Flow {
                handle: link.as_u32(),
                delivery_count: state.delivery_count,
                credit: state.credit,
            };
            self.queue(&flow);
        }
    }

    fn send(&mut self, link: LinkHandle, message: WireMessage) -> Result<DeliveryTag, EngineError> {
        let state = self
            .links
            .get_mut(&link)
            .filter(|state| state.role == Role::Sender)
            .ok_or(EngineError::UnknownLink(link))?;
        if state.local != Endpoint::Active || state.remote != Endpoint::Active {
            return Err(EngineError::LinkNotOpen(link));
        }
        if state.credit == 0 {
            return Err(EngineError::NoCredit(link));
        }
        state.credit -= 1;
        state.delivery_count += 1;
        let tag = DeliveryTag::new(self.next_delivery);
        self.next_delivery += 1;
        state.unsettled.insert(tag);
        self.queue(&Frame::Transfer {
            handle: link.as_u32(),
            delivery: tag.as_u64(),
            message,
        });
        Ok(tag)
    }

    fn message_accepted(&mut self, link: LinkHandle, delivery: DeliveryTag) {
        let settled = self
            .links
            .get_mut(&link)
            .is_some_and(|state| state.unsettled.remove(&delivery));
        if settled {
            self.queue(&Frame::Disposition {
                handle: link.as_u32(),
                delivery: delivery.as_u64(),
                status: SendStatus::Accepted,
            });
        }
    }
}
