//! Protocol engine seam.
//!
//! The broker does not parse frames or run the connection and link state
//! machines itself. It drives an engine through the [`Container`] and
//! [`Session`] traits: bytes go in through [`Session::push_input`], bytes
//! come out through [`Session::output`], and everything the engine wants the
//! broker to react to is queued as an [`Event`] and drained with
//! [`Session::next_event`] after each call.
//!
//! Links are addressed by [`LinkHandle`]s owned by the session, so broker
//! code never holds a reference into engine state. Once a session has been
//! destroyed its handles simply resolve to nothing.
//!
//! [`FrameSession`] is the bundled engine: length-prefixed `bincode` frames
//! carrying a small link protocol with SASL, credit-based flow control and
//! idle timeouts.

use std::{fmt, time::Duration};

use bincode::{Decode, Encode};

use crate::message::WireMessage;

mod error;
pub mod frame;
mod session;

pub use error::EngineError;
pub use session::{FrameContainer, FrameSession};

/// Identifier of a link within one session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LinkHandle(u32);

impl LinkHandle {
    /// Create a handle from its raw value.
    #[must_use]
    pub const fn new(raw: u32) -> Self { Self(raw) }

    /// Return the raw value.
    #[must_use]
    pub const fn as_u32(self) -> u32 { self.0 }
}

impl fmt::Display for LinkHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "link#{}", self.0) }
}

/// Identifier of one transfer, used to settle it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeliveryTag(u64);

impl DeliveryTag {
    /// Create a tag from its raw value.
    #[must_use]
    pub const fn new(raw: u64) -> Self { Self(raw) }

    /// Return the raw value.
    #[must_use]
    pub const fn as_u64(self) -> u64 { self.0 }
}

impl fmt::Display for DeliveryTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "delivery#{}", self.0) }
}

/// Which side of the SASL exchange a session plays.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SaslMode {
    /// Wait for the peer's mechanism choice and answer it.
    Server,
    /// Offer the first configured mechanism and wait for the outcome.
    Client,
}

/// Result of a SASL exchange.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SaslOutcome {
    /// The peer is authenticated.
    Ok,
    /// Authentication was refused.
    Auth,
}

/// Settlement reported by the receiving end of a transfer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Encode, Decode)]
pub enum SendStatus {
    Accepted,
    Rejected,
    Released,
    Modified,
    Aborted,
}

impl fmt::Display for SendStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SendStatus::Accepted => "accepted",
            SendStatus::Rejected => "rejected",
            SendStatus::Released => "released",
            SendStatus::Modified => "modified",
            SendStatus::Aborted => "aborted",
        };
        f.write_str(name)
    }
}

/// Connection-scoped settings handed to [`Container::create_session`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConnectionProperties {
    /// Host name the peer connected to, if known.
    pub hostname: Option<String>,
    /// Fail the session when nothing arrives for this long.
    pub idle_timeout: Option<Duration>,
    /// Largest frame accepted or produced.
    pub max_frame_length: usize,
}

impl Default for ConnectionProperties {
    fn default() -> Self {
        Self {
            hostname: None,
            idle_timeout: None,
            max_frame_length: frame::DEFAULT_MAX_FRAME_LENGTH,
        }
    }
}

/// Notification raised by a [`Session`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Event {
    /// Both ends have opened the session.
    Active,
    /// The peer closed its end; the local end should close in turn.
    RemoteClosed { reason: Option<String> },
    /// Both ends are closed and all pending output has been handed over.
    Closed,
    /// The engine detected a failure; the session should be closed.
    Failed { error: String },
    /// The peer chose a SASL mechanism and awaits [`Session::sasl_done`].
    SaslStep,
    /// The SASL exchange finished.
    SaslDone { outcome: SaslOutcome },
    /// The peer wants to receive from `source`; accept with
    /// [`Session::accept_sender`].
    SenderRequested {
        link: LinkHandle,
        name: String,
        source: Option<String>,
    },
    /// The peer wants to send to `target`; accept with
    /// [`Session::accept_receiver`].
    ReceiverRequested {
        link: LinkHandle,
        name: String,
        target: Option<String>,
    },
    /// Event for a local sending link.
    Sender(LinkHandle, SenderEvent),
    /// Event for a local receiving link.
    Receiver(LinkHandle, ReceiverEvent),
}

/// Notification for a sending link.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SenderEvent {
    /// Both ends attached.
    Active,
    /// The peer detached.
    RemoteClosed { error: Option<String> },
    /// Both ends detached; the link may be destroyed.
    Closed,
    /// The peer granted credit.
    CreditGranted,
    /// The peer settled a transfer.
    MessageSent { tag: DeliveryTag, status: SendStatus },
}

/// Notification for a receiving link.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReceiverEvent {
    /// Both ends attached.
    Active,
    /// The peer detached.
    RemoteClosed { error: Option<String> },
    /// Both ends detached; the link may be destroyed.
    Closed,
    /// A transfer arrived and awaits [`Session::message_accepted`].
    MessageReceived {
        message: WireMessage,
        delivery: DeliveryTag,
    },
}

/// Factory of sessions sharing one container identity.
pub trait Container {
    /// Session type produced by this container.
    type Session: Session;

    /// Container identity advertised to peers.
    fn name(&self) -> &str;

    /// Create a session for a freshly accepted socket.
    ///
    /// # Errors
    ///
    /// Returns an [`EngineError`] if the session cannot be set up.
    fn create_session(
        &mut self,
        name: &str,
        properties: ConnectionProperties,
    ) -> Result<Self::Session, EngineError>;
}

/// One protocol connection together with its links.
///
/// Operations on unknown link handles are ignored unless they return a
/// `Result`.
pub trait Session {
    /// Session name, usually the peer address.
    fn name(&self) -> &str;

    /// Select the SASL role and mechanisms. Must precede [`Session::open`].
    fn sasl(&mut self, mode: SaslMode, mechanisms: &[&str]);

    /// Answer a [`Event::SaslStep`].
    fn sasl_done(&mut self, outcome: SaslOutcome);

    /// Open the local end. Sent once SASL, if configured, completes.
    fn open(&mut self);

    /// Close the local end.
    fn close(&mut self, error: Option<&str>);

    /// Returns `true` once [`Event::Closed`] has been raised.
    fn is_closed(&self) -> bool;

    /// Release all session state. No event is raised afterwards.
    fn destroy(&mut self);

    /// Returns `true` while the session accepts more input bytes.
    fn needs_input(&self) -> bool;

    /// Buffer bytes read from the socket. Parsed on the next
    /// [`Session::process`].
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Closed`] once input has been closed.
    fn push_input(&mut self, bytes: &[u8]) -> Result<(), EngineError>;

    /// Signal end of input from the socket.
    fn close_input(&mut self);

    /// Returns `true` if bytes are waiting to be written.
    fn has_output(&self) -> bool;

    /// Bytes waiting to be written.
    fn output(&self) -> &[u8];

    /// Discard the first `count` bytes of [`Session::output`].
    fn consume_output(&mut self, count: usize);

    /// Next instant at which [`Session::process`] must run, if any.
    fn deadline(&self) -> Option<std::time::Instant>;

    /// Parse buffered input and run timers due at `now`.
    fn process(&mut self, now: std::time::Instant);

    /// Pop the oldest pending event.
    fn next_event(&mut self) -> Option<Event>;

    /// Accept a peer-requested sending link, binding it to `source`.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::UnknownLink`] if `link` is not a pending
    /// sender request.
    fn accept_sender(&mut self, link: LinkHandle, source: &str) -> Result<(), EngineError>;

    /// Accept a peer-requested receiving link, binding it to `target`.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::UnknownLink`] if `link` is not a pending
    /// receiver request.
    fn accept_receiver(&mut self, link: LinkHandle, target: &str) -> Result<(), EngineError>;

    /// Create a locally initiated sending link.
    fn create_sender(&mut self, name: &str, source: Option<&str>, target: Option<&str>)
    -> LinkHandle;

    /// Create a locally initiated receiving link.
    fn create_receiver(
        &mut self,
        name: &str,
        source: Option<&str>,
        target: Option<&str>,
    ) -> LinkHandle;

    /// Attach the local end of `link`.
    fn open_link(&mut self, link: LinkHandle);

    /// Detach the local end of `link`.
    fn close_link(&mut self, link: LinkHandle, error: Option<&str>);

    /// Forget `link`.
    fn destroy_link(&mut self, link: LinkHandle);

    /// Name of `link`.
    fn link_name(&self, link: LinkHandle) -> Option<&str>;

    /// Source address of `link`.
    fn source_address(&self, link: LinkHandle) -> Option<&str>;

    /// Target address of `link`.
    fn target_address(&self, link: LinkHandle) -> Option<&str>;

    /// Transfers a sending link may still make.
    fn credit(&self, link: LinkHandle) -> u32;

    /// Transfers a receiving link may still accept.
    fn capacity(&self, link: LinkHandle) -> u32;

    /// Grant the peer `count` more transfers on a receiving link.
    fn add_capacity(&mut self, link: LinkHandle, count: u32);

    /// Transfer `message` on a sending link, consuming one credit.
    ///
    /// # Errors
    ///
    /// Returns an [`EngineError`] if the link is unknown, not attached at
    /// both ends, or out of credit.
    fn send(&mut self, link: LinkHandle, message: WireMessage) -> Result<DeliveryTag, EngineError>;

    /// Settle a received transfer as accepted.
    fn message_accepted(&mut self, link: LinkHandle, delivery: DeliveryTag);
}
