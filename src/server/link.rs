//! Broker ends of links, bound to one queue address each.
//!
//! A [`SenderLink`] drains its queue towards the peer, one message per
//! granted credit. A [`ReceiverLink`] posts whatever the peer sends into its
//! queue, granting capacity one message at a time.

use log::{debug, warn};

use crate::{
    engine::{EngineError, LinkHandle, ReceiverEvent, SenderEvent, Session},
    message::{WireMessage, to_storage, to_wire},
    metrics::{self, Direction, ErrorKind},
    router::{QueueRouter, QueueStore},
};

/// Queue used when the peer names no address.
pub const DEFAULT_QUEUE: &str = "uncategorized";

/// Whether a link survives the event it just handled.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LinkStatus {
    /// Keep the link.
    Open,
    /// Both ends detached; destroy the link.
    Closed,
}

/// Resolve a requested address, substituting [`DEFAULT_QUEUE`] when absent.
#[must_use]
pub fn queue_address(requested: Option<String>) -> String {
    requested
        .filter(|address| !address.is_empty())
        .unwrap_or_else(|| DEFAULT_QUEUE.to_owned())
}

/// Link sending messages fetched from `address` to the peer.
#[derive(Debug)]
pub struct SenderLink {
    handle: LinkHandle,
    name: String,
    address: String,
}

impl SenderLink {
    /// Create a link for a peer request on `handle`.
    #[must_use]
    pub fn new(handle: LinkHandle, name: String, address: String) -> Self {
        Self {
            handle,
            name,
            address,
        }
    }

    /// Queue this link reads from.
    #[must_use]
    pub fn address(&self) -> &str { &self.address }

    /// Accept the peer's request with this link's address and attach.
    ///
    /// # Errors
    ///
    /// Returns an [`EngineError`] if the session refuses the link.
    pub fn accept<S: Session>(&self, session: &mut S) -> Result<(), EngineError> {
        session.accept_sender(self.handle, &self.address)?;
        session.open_link(self.handle);
        debug!(
            "sender link created: link={}, source={}",
            self.name, self.address
        );
        Ok(())
    }

    /// React to an engine event for this link.
    pub fn handle<S, Q>(
        &mut self,
        event: SenderEvent,
        session: &mut S,
        router: &mut QueueRouter<Q>,
    ) -> LinkStatus
    where
        S: Session,
        Q: QueueStore,
    {
        match event {
            SenderEvent::Active | SenderEvent::CreditGranted => self.send_if_credit(session, router),
            SenderEvent::MessageSent { tag, status } => {
                debug!("message sent: link={}, {tag}, status={status}", self.name);
                self.send_if_credit(session, router);
            }
            SenderEvent::RemoteClosed { error } => {
                debug!(
                    "sender link closed by peer: link={}, error={}",
                    self.name,
                    error.as_deref().unwrap_or("none")
                );
                session.close_link(self.handle, None);
            }
            SenderEvent::Closed => return LinkStatus::Closed,
        }
        LinkStatus::Open
    }

    fn send_if_credit<S: Session, Q: QueueStore>(
        &self,
        session: &mut S,
        router: &mut QueueRouter<Q>,
    ) {
        if session.credit(self.handle) > 0 {
            self.send_message(session, router);
        }
    }

    /// Send the first pending message, or a placeholder when there is none.
    fn send_message<S: Session, Q: QueueStore>(
        &self,
        session: &mut S,
        router: &mut QueueRouter<Q>,
    ) {
        let (message, consumed) = match router.fetch(&self.address).into_iter().next() {
            Some(stored) => (to_wire(stored), true),
            None => (WireMessage::placeholder(), false),
        };
        match session.send(self.handle, message) {
            Ok(tag) => {
                debug!(
                    "message queued: link={}, {tag}, placeholder={}",
                    self.name, !consumed
                );
                if consumed {
                    router.drop_queue(&self.address);
                    metrics::inc_messages(Direction::Outbound);
                }
            }
            Err(e) => {
                warn!("failed to send message: link={}, error={e}", self.name);
                metrics::inc_errors(ErrorKind::Engine);
            }
        }
    }

    /// Release the engine's link state.
    pub fn destroy<S: Session>(self, session: &mut S) {
        session.destroy_link(self.handle);
        debug!("sender link destroyed: link={}", self.name);
    }
}

/// Link posting messages received from the peer to `address`.
#[derive(Debug)]
pub struct ReceiverLink {
    handle: LinkHandle,
    name: String,
    address: String,
}

impl ReceiverLink {
    /// Create a link for a peer request on `handle`.
    #[must_use]
    pub fn new(handle: LinkHandle, name: String, address: String) -> Self {
        Self {
            handle,
            name,
            address,
        }
    }

    /// Queue this link writes to.
    #[must_use]
    pub fn address(&self) -> &str { &self.address }

    /// Accept the peer's request, attach and grant one message of capacity.
    ///
    /// # Errors
    ///
    /// Returns an [`EngineError`] if the session refuses the link.
    pub fn accept<S: Session>(&self, session: &mut S) -> Result<(), EngineError> {
        session.accept_receiver(self.handle, &self.address)?;
        session.open_link(self.handle);
        session.add_capacity(self.handle, 1);
        debug!(
            "receiver link created: link={}, target={}",
            self.name, self.address
        );
        Ok(())
    }

    /// React to an engine event for this link.
    pub fn handle<S, Q>(
        &mut self,
        event: ReceiverEvent,
        session: &mut S,
        router: &mut QueueRouter<Q>,
    ) -> LinkStatus
    where
        S: Session,
        Q: QueueStore,
    {
        match event {
            ReceiverEvent::Active => {}
            ReceiverEvent::MessageReceived { message, delivery } => {
                session.message_accepted(self.handle, delivery);
                let stored = router.post(&self.address, to_storage(message));
                if session.capacity(self.handle) < 1 {
                    session.add_capacity(self.handle, 1);
                }
                if stored {
                    metrics::inc_messages(Direction::Inbound);
                }
            }
            ReceiverEvent::RemoteClosed { error } => {
                debug!(
                    "receiver link closed by peer: link={}, error={}",
                    self.name,
                    error.as_deref().unwrap_or("none")
                );
                session.close_link(self.handle, None);
            }
            ReceiverEvent::Closed => return LinkStatus::Closed,
        }
        LinkStatus::Open
    }

    /// Release the engine's link state.
    pub fn destroy<S: Session>(self, session: &mut S) {
        session.destroy_link(self.handle);
        debug!("receiver link destroyed: link={}", self.name);
    }
}
