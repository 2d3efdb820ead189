//! Errors raised by the protocol engine.

use std::io;

use bincode::error::{DecodeError, EncodeError};
use thiserror::Error;

use super::LinkHandle;

/// Failures of a [`Session`](super::Session) operation or of frame parsing.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum EngineError {
    /// A frame could not be serialised.
    #[error("frame encoding failed: {0}")]
    Encode(#[from] EncodeError),
    /// A frame body could not be deserialised.
    #[error("frame decoding failed: {0}")]
    Decode(#[from] DecodeError),
    /// The length prefix was invalid or exceeded the frame limit.
    #[error("framing error: {0}")]
    Framing(#[from] io::Error),
    /// The handle does not name a link of the expected kind.
    #[error("unknown {0}")]
    UnknownLink(LinkHandle),
    /// The sending link has no credit left.
    #[error("no credit on {0}")]
    NoCredit(LinkHandle),
    /// The link is not attached at both ends.
    #[error("{0} is not open")]
    LinkNotOpen(LinkHandle),
    /// The peer broke the protocol.
    #[error("protocol violation: {0}")]
    Protocol(String),
    /// The session no longer accepts input.
    #[error("session input is closed")]
    Closed,
}
