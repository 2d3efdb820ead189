//! Message representations and translation between them.
//!
//! [`WireMessage`] is what links carry; [`StorageMessage`] is what the queue
//! store persists. Every wire property survives the trip into storage and
//! back unchanged, except that a zero time-to-live is normalised to
//! [`DEFAULT_TTL`] on ingestion.

use bincode::{Decode, Encode};
use serde::{Deserialize, Serialize};

/// Time-to-live assigned to inbound messages that arrive with `ttl == 0`.
pub const DEFAULT_TTL: u32 = 100;

/// Priority carried by messages that do not set one.
pub const DEFAULT_PRIORITY: u8 = 4;

/// Protocol-specific message fields carried alongside the body.
#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode, Serialize, Deserialize)]
pub struct MessageProperties {
    pub priority: u8,
    pub first_acquirer: bool,
    pub delivery_count: u32,
    pub id: Option<String>,
    pub user_id: Option<Vec<u8>>,
    pub address: Option<String>,
    pub subject: Option<String>,
    pub reply_to: Option<String>,
    pub correlation_id: Option<String>,
    pub content_type: Option<String>,
    pub content_encoding: Option<String>,
    /// Absolute expiry, milliseconds since the Unix epoch.
    pub expiry_time: Option<u64>,
    /// Creation time, milliseconds since the Unix epoch.
    pub creation_time: Option<u64>,
    pub group_id: Option<String>,
    pub group_sequence: Option<u32>,
    pub reply_to_group_id: Option<String>,
    pub format: u32,
}

impl Default for MessageProperties {
    fn default() -> Self {
        Self {
            priority: DEFAULT_PRIORITY,
            first_acquirer: false,
            delivery_count: 0,
            id: None,
            user_id: None,
            address: None,
            subject: None,
            reply_to: None,
            correlation_id: None,
            content_type: None,
            content_encoding: None,
            expiry_time: None,
            creation_time: None,
            group_id: None,
            group_sequence: None,
            reply_to_group_id: None,
            format: 0,
        }
    }
}

/// A message as transferred over a link.
#[derive(Clone, Debug, Default, PartialEq, Eq, Encode, Decode)]
pub struct WireMessage {
    /// Time-to-live. Zero means "unset".
    pub ttl: u32,
    pub body: Vec<u8>,
    pub properties: MessageProperties,
}

impl WireMessage {
    /// Create a message carrying `body` with default properties.
    #[must_use]
    pub fn new(body: impl Into<Vec<u8>>) -> Self {
        Self {
            body: body.into(),
            ..Self::default()
        }
    }

    /// Set the time-to-live.
    #[must_use]
    pub fn with_ttl(mut self, ttl: u32) -> Self {
        self.ttl = ttl;
        self
    }

    /// Payload-less message sent when a queue has nothing to deliver.
    #[must_use]
    pub fn placeholder() -> Self { Self::default() }

    /// Returns `true` for messages without a body.
    #[must_use]
    pub fn is_empty(&self) -> bool { self.body.is_empty() }
}

/// A message in the shape the queue store persists.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageMessage {
    pub ttl: u32,
    pub body: Vec<u8>,
    /// Wire properties, absent for messages posted by other front-ends.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extensions: Option<MessageProperties>,
}

impl StorageMessage {
    /// Create a storage message without wire extensions.
    #[must_use]
    pub fn new(ttl: u32, body: impl Into<Vec<u8>>) -> Self {
        Self {
            ttl,
            body: body.into(),
            extensions: None,
        }
    }
}

impl From<WireMessage> for StorageMessage {
    fn from(message: WireMessage) -> Self { to_storage(message) }
}

impl From<StorageMessage> for WireMessage {
    fn from(message: StorageMessage) -> Self { to_wire(message) }
}

/// Convert an inbound wire message into its storage form.
///
/// # Examples
///
/// ```
/// use linkbroker::message::{DEFAULT_TTL, WireMessage, to_storage};
///
/// let stored = to_storage(WireMessage::new(*b"hi"));
/// assert_eq!(stored.ttl, DEFAULT_TTL);
/// assert_eq!(stored.body, b"hi");
/// ```
#[must_use]
pub fn to_storage(message: WireMessage) -> StorageMessage {
    let WireMessage {
        ttl,
        body,
        properties,
    } = message;
    StorageMessage {
        ttl: if ttl == 0 { DEFAULT_TTL } else { ttl },
        body,
        extensions: Some(properties),
    }
}

/// Convert a stored message back into wire form. `ttl` passes through as is.
#[must_use]
pub fn to_wire(message: StorageMessage) -> WireMessage {
    let StorageMessage {
        ttl,
        body,
        extensions,
    } = message;
    WireMessage {
        ttl,
        body,
        properties: extensions.unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    fn full_properties() -> MessageProperties {
        MessageProperties {
            priority: 9,
            first_acquirer: true,
            delivery_count: 3,
            id: Some("msg-1".into()),
            user_id: Some(b"alice".to_vec()),
            address: Some("orders".into()),
            subject: Some("new order".into()),
            reply_to: Some("replies".into()),
            correlation_id: Some("corr-7".into()),
            content_type: Some("application/json".into()),
            content_encoding: Some("gzip".into()),
            expiry_time: Some(1_700_000_060_000),
            creation_time: Some(1_700_000_000_000),
            group_id: Some("group-a".into()),
            group_sequence: Some(12),
            reply_to_group_id: Some("group-b".into()),
            format: 7,
        }
    }

    #[rstest]
    #[case(0, DEFAULT_TTL)]
    #[case(42, 42)]
    #[case(1, 1)]
    fn storage_round_trip_normalises_zero_ttl(#[case] ttl: u32, #[case] expected: u32) {
        let stored = StorageMessage::new(ttl, *b"hi");
        let back = to_storage(to_wire(stored));
        assert_eq!(back.ttl, expected);
        assert_eq!(back.body, b"hi");
    }

    #[test]
    fn ingestion_keeps_every_property() {
        let wire = WireMessage {
            ttl: 5,
            body: b"payload".to_vec(),
            properties: full_properties(),
        };
        let stored = to_storage(wire.clone());
        assert_eq!(stored.extensions.as_ref(), Some(&full_properties()));
        assert_eq!(to_wire(stored), wire);
    }

    #[test]
    fn messages_without_extensions_get_default_properties() {
        let wire = to_wire(StorageMessage::new(30, *b"plain"));
        assert_eq!(wire.ttl, 30);
        assert_eq!(wire.properties, MessageProperties::default());
        assert_eq!(wire.properties.priority, DEFAULT_PRIORITY);
    }

    #[test]
    fn placeholder_has_no_payload() {
        let message = WireMessage::placeholder();
        assert!(message.is_empty());
        assert_eq!(message.ttl, 0);
    }
}
