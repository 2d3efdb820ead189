//! One accepted socket bound to one engine session.

use std::{collections::BTreeMap, io, time::Instant};

use log::{debug, error, info, warn};
use tokio::net::TcpStream;

use super::link::{LinkStatus, ReceiverLink, SenderLink, queue_address};
use crate::{
    engine::{EngineError, Event, LinkHandle, SaslMode, SaslOutcome, Session},
    metrics::{self, ErrorKind},
    router::{QueueRouter, QueueStore},
};

/// SASL mechanisms offered to peers.
pub const SASL_MECHANISMS: &[&str] = &["ANONYMOUS"];

const READ_BUFFER_SIZE: usize = 16 * 1024;

/// A socket, its session and the links opened on it.
///
/// The connection never reports errors to its caller. I/O and engine
/// failures are logged and end with [`Connection::is_closed`] returning
/// `true`.
#[derive(Debug)]
pub struct Connection<S> {
    name: String,
    socket: TcpStream,
    session: S,
    senders: BTreeMap<LinkHandle, SenderLink>,
    receivers: BTreeMap<LinkHandle, ReceiverLink>,
    closed: bool,
}

impl<S: Session> Connection<S> {
    /// Bind `session` to `socket`, accept any SASL credential and open it.
    pub fn new(socket: TcpStream, mut session: S) -> Self {
        session.sasl(SaslMode::Server, SASL_MECHANISMS);
        session.open();
        Self {
            name: session.name().to_owned(),
            socket,
            session,
            senders: BTreeMap::new(),
            receivers: BTreeMap::new(),
            closed: false,
        }
    }

    /// Connection name, the peer address.
    #[must_use]
    pub fn name(&self) -> &str { &self.name }

    /// The peer socket.
    #[must_use]
    pub fn socket(&self) -> &TcpStream { &self.socket }

    /// The engine session bound to the socket.
    #[must_use]
    pub fn session(&self) -> &S { &self.session }

    /// Returns `true` once the connection should be reaped.
    #[must_use]
    pub fn is_closed(&self) -> bool { self.closed }

    /// Number of open sender and receiver links.
    #[must_use]
    pub fn link_count(&self) -> usize { self.senders.len() + self.receivers.len() }

    /// Read what the socket has, feed it to the session and handle events.
    pub fn process_input<Q: QueueStore>(&mut self, router: &mut QueueRouter<Q>, now: Instant) {
        let mut buf = [0u8; READ_BUFFER_SIZE];
        while self.session.needs_input() {
            match self.socket.try_read(&mut buf) {
                Ok(0) => {
                    self.session.close_input();
                    break;
                }
                Ok(n) => {
                    if let Err(e) = self.session.push_input(&buf[..n]) {
                        self.engine_failed(&e);
                        return;
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) => {
                    self.io_failed("read", &e);
                    return;
                }
            }
        }
        self.process_timer(router, now);
    }

    /// Advance the session clock and handle events.
    pub fn process_timer<Q: QueueStore>(&mut self, router: &mut QueueRouter<Q>, now: Instant) {
        self.session.process(now);
        self.handle_events(router);
    }

    /// Write pending session output to the socket and handle events.
    pub fn process_output<Q: QueueStore>(&mut self, router: &mut QueueRouter<Q>, now: Instant) {
        while self.session.has_output() {
            match self.socket.try_write(self.session.output()) {
                Ok(0) => {
                    self.io_failed("write", &io::ErrorKind::WriteZero.into());
                    return;
                }
                Ok(n) => self.session.consume_output(n),
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) => {
                    self.io_failed("write", &e);
                    return;
                }
            }
        }
        self.process_timer(router, now);
    }

    /// Mark the connection closed after a socket fault.
    pub fn io_failed(&mut self, operation: &str, e: &io::Error) {
        warn!(
            "connection {operation} failed: connection={}, error={e}",
            self.name
        );
        metrics::inc_errors(ErrorKind::Io);
        self.closed = true;
    }

    fn engine_failed(&mut self, e: &EngineError) {
        error!("connection failed: connection={}, error={e}", self.name);
        metrics::inc_errors(ErrorKind::Engine);
        self.closed = true;
    }

    fn handle_events<Q: QueueStore>(&mut self, router: &mut QueueRouter<Q>) {
        while let Some(event) = self.session.next_event() {
            self.handle_event(event, router);
        }
    }

    fn handle_event<Q: QueueStore>(&mut self, event: Event, router: &mut QueueRouter<Q>) {
        match event {
            Event::SaslStep => self.session.sasl_done(SaslOutcome::Ok),
            Event::SaslDone { outcome } => {
                debug!("SASL done: connection={}, outcome={outcome:?}", self.name);
            }
            Event::Active => debug!("connection open: connection={}", self.name),
            Event::RemoteClosed { reason } => {
                info!(
                    "connection closed by peer: connection={}, reason={}",
                    self.name,
                    reason.as_deref().unwrap_or("none")
                );
                self.session.close(None);
            }
            Event::Failed { error } => {
                error!("connection failed: connection={}, error={error}", self.name);
                metrics::inc_errors(ErrorKind::Engine);
                self.session.close(Some(&error));
            }
            Event::Closed => {
                debug!("connection closed: connection={}", self.name);
                self.closed = true;
            }
            Event::SenderRequested { link, name, source } => {
                let sender = SenderLink::new(link, name, queue_address(source));
                match sender.accept(&mut self.session) {
                    Ok(()) => {
                        self.senders.insert(link, sender);
                    }
                    Err(e) => warn!("cannot accept sender: connection={}, error={e}", self.name),
                }
            }
            Event::ReceiverRequested { link, name, target } => {
                let receiver = ReceiverLink::new(link, name, queue_address(target));
                match receiver.accept(&mut self.session) {
                    Ok(()) => {
                        self.receivers.insert(link, receiver);
                    }
                    Err(e) => {
                        warn!("cannot accept receiver: connection={}, error={e}", self.name);
                    }
                }
            }
            Event::Sender(link, event) => {
                let Some(sender) = self.senders.get_mut(&link) else {
                    return;
                };
                if sender.handle(event, &mut self.session, router) == LinkStatus::Closed
                    && let Some(sender) = self.senders.remove(&link)
                {
                    sender.destroy(&mut self.session);
                }
            }
            Event::Receiver(link, event) => {
                let Some(receiver) = self.receivers.get_mut(&link) else {
                    return;
                };
                if receiver.handle(event, &mut self.session, router) == LinkStatus::Closed
                    && let Some(receiver) = self.receivers.remove(&link)
                {
                    receiver.destroy(&mut self.session);
                }
            }
        }
    }

    /// Tear down links, then the session, then the socket.
    pub fn destroy(mut self) {
        for (_, sender) in std::mem::take(&mut self.senders) {
            sender.destroy(&mut self.session);
        }
        for (_, receiver) in std::mem::take(&mut self.receivers) {
            receiver.destroy(&mut self.session);
        }
        self.session.destroy();
        drop(self.socket);
        debug!("connection destroyed: connection={}", self.name);
    }
}
