//! Wire frames of the bundled engine and their codec.
//!
//! Each frame is a 4-byte big-endian length prefix followed by the `bincode`
//! (standard configuration) encoding of a [`Frame`]. Link frames carry the
//! *sender's* handle for the link; the receiving side maps it to its own.

use bincode::{Decode, Encode, config};
use bytes::{Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder, LengthDelimitedCodec};

use super::{EngineError, SendStatus};
use crate::message::WireMessage;

/// Minimum frame length in bytes.
///
/// Frame lengths passed to [`FrameCodec::new`] are clamped to at least this
/// value so control frames always fit.
pub const MIN_FRAME_LENGTH: usize = 64;

/// Maximum frame length in bytes (16 MiB).
pub const MAX_FRAME_LENGTH: usize = 16 * 1024 * 1024;

/// Frame limit used when none is configured (64 KiB).
pub const DEFAULT_MAX_FRAME_LENGTH: usize = 64 * 1024;

/// Length prefix header size.
pub const LENGTH_HEADER_SIZE: usize = 4;

pub(crate) fn clamp_frame_length(value: usize) -> usize {
    value.clamp(MIN_FRAME_LENGTH, MAX_FRAME_LENGTH)
}

/// Direction of a link as seen by the endpoint that sends the frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Encode, Decode)]
pub enum Role {
    Sender,
    Receiver,
}

impl Role {
    /// The role of the other end of the same link.
    #[must_use]
    pub fn peer(self) -> Self {
        match self {
            Role::Sender => Role::Receiver,
            Role::Receiver => Role::Sender,
        }
    }
}

/// A protocol frame.
#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode)]
pub enum Frame {
    /// Client's SASL mechanism choice.
    SaslInit { mechanism: String },
    /// Server's SASL verdict.
    SaslOutcome { ok: bool },
    /// Opens the connection. `idle_timeout_ms == 0` means none.
    Open {
        container_id: String,
        idle_timeout_ms: u32,
    },
    /// Closes the connection.
    Close { error: Option<String> },
    /// Attaches one end of a link.
    Attach {
        handle: u32,
        name: String,
        role: Role,
        source: Option<String>,
        target: Option<String>,
    },
    /// Detaches one end of a link.
    Detach { handle: u32, error: Option<String> },
    /// Receiver's flow state: transfers received so far and remaining credit.
    Flow {
        handle: u32,
        delivery_count: u64,
        credit: u32,
    },
    /// One message on a link.
    Transfer {
        handle: u32,
        delivery: u64,
        message: WireMessage,
    },
    /// Settlement of a transfer.
    Disposition {
        handle: u32,
        delivery: u64,
        status: SendStatus,
    },
    /// Keep-alive.
    Empty,
}

impl Frame {
    /// Short frame name for logs.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Frame::SaslInit { .. } => "sasl-init",
            Frame::SaslOutcome { .. } => "sasl-outcome",
            Frame::Open { .. } => "open",
            Frame::Close { .. } => "close",
            Frame::Attach { .. } => "attach",
            Frame::Detach { .. } => "detach",
            Frame::Flow { .. } => "flow",
            Frame::Transfer { .. } => "transfer",
            Frame::Disposition { .. } => "disposition",
            Frame::Empty => "empty",
        }
    }
}

/// Length-delimited `bincode` codec for [`Frame`]s.
#[derive(Debug)]
pub struct FrameCodec {
    inner: LengthDelimitedCodec,
    max_frame_length: usize,
}

impl FrameCodec {
    /// Construct a codec accepting frames up to `max_frame_length` bytes.
    #[must_use]
    pub fn new(max_frame_length: usize) -> Self {
        let max_frame_length = clamp_frame_length(max_frame_length);
        Self {
            inner: LengthDelimitedCodec::builder()
                .max_frame_length(max_frame_length)
                .new_codec(),
            max_frame_length,
        }
    }

    /// Return the maximum frame length accepted by this codec.
    #[must_use]
    pub fn max_frame_length(&self) -> usize { self.max_frame_length }
}

impl Default for FrameCodec {
    fn default() -> Self { Self::new(DEFAULT_MAX_FRAME_LENGTH) }
}

impl Decoder for FrameCodec {
    type Item = Frame;
    type Error = EngineError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let Some(payload) = self.inner.decode(src)? else {
            return Ok(None);
        };
        // Length claims inside the body are checked against this limit
        // before anything is allocated.
        let limited = config::standard().with_limit::<{ MAX_FRAME_LENGTH }>();
        let (frame, used) = bincode::decode_from_slice(&payload, limited)?;
        if used != payload.len() {
            return Err(EngineError::Protocol(format!(
                "{} trailing bytes after {} frame",
                payload.len() - used,
                Frame::kind(&frame)
            )));
        }
        Ok(Some(frame))
    }
}

impl Encoder<&Frame> for FrameCodec {
    type Error = EngineError;

    fn encode(&mut self, frame: &Frame, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let payload = bincode::encode_to_vec(frame, config::standard())?;
        self.inner.encode(Bytes::from(payload), dst)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    fn encode(codec: &mut FrameCodec, frame: &Frame) -> BytesMut {
        let mut buf = BytesMut::new();
        codec.encode(frame, &mut buf).expect("encode frame");
        buf
    }

    #[rstest]
    #[case(Frame::Empty)]
    #[case(Frame::Close { error: Some("bye".into()) })]
    #[case(Frame::Transfer {
        handle: 3,
        delivery: 9,
        message: WireMessage::new(*b"hi").with_ttl(42),
    })]
    fn decodes_what_it_encodes(#[case] frame: Frame) {
        let mut codec = FrameCodec::default();
        let mut buf = encode(&mut codec, &frame);
        assert_eq!(codec.decode(&mut buf).expect("decode"), Some(frame));
        assert!(buf.is_empty());
    }

    #[test]
    fn waits_for_complete_frame() {
        let mut codec = FrameCodec::default();
        let full = encode(&mut codec, &Frame::SaslInit {
            mechanism: "ANONYMOUS".into(),
        });
        let mut partial = BytesMut::from(&full[..full.len() - 1]);
        assert!(codec.decode(&mut partial).expect("decode").is_none());
        partial.extend_from_slice(&full[full.len() - 1..]);
        assert!(codec.decode(&mut partial).expect("decode").is_some());
    }

    #[test]
    fn rejects_oversized_frames() {
        let mut codec = FrameCodec::new(MIN_FRAME_LENGTH);
        let mut buf = BytesMut::new();
        buf.extend_from_slice(&u32::try_from(MIN_FRAME_LENGTH + 1).expect("fits").to_be_bytes());
        buf.extend_from_slice(&[0; MIN_FRAME_LENGTH + 1]);
        assert!(matches!(codec.decode(&mut buf), Err(EngineError::Framing(_))));
    }

    #[test]
    fn rejects_garbage_payload() {
        let mut codec = FrameCodec::default();
        let mut buf = BytesMut::new();
        buf.extend_from_slice(&[0, 0, 0, 2, 0xff, 0xff]);
        assert!(codec.decode(&mut buf).is_err());
    }

    #[test]
    fn rejects_length_claims_beyond_the_frame_limit() {
        let mut codec = FrameCodec::default();
        // `SaslInit` whose mechanism string claims 2^40 bytes.
        let mut payload = vec![0, 253];
        payload.extend_from_slice(&(1u64 << 40).to_le_bytes());
        let mut buf = BytesMut::new();
        buf.extend_from_slice(&u32::try_from(payload.len()).expect("fits").to_be_bytes());
        buf.extend_from_slice(&payload);
        assert!(matches!(
            codec.decode(&mut buf),
            Err(EngineError::Decode(bincode::error::DecodeError::LimitExceeded))
        ));
    }

    #[test]
    fn frame_length_is_clamped() {
        assert_eq!(FrameCodec::new(1).max_frame_length(), MIN_FRAME_LENGTH);
        assert_eq!(FrameCodec::new(usize::MAX).max_frame_length(), MAX_FRAME_LENGTH);
    }
}
