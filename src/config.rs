//! Broker configuration.
//!
//! [`BrokerConfig`] is filled in by the binary from command line flags.
//! Embedders can deserialize it from their own configuration files.

use std::time::Duration;

use serde::Deserialize;

use crate::{
    address::{AddressError, BindAddress, parse_bind_address},
    engine::{ConnectionProperties, frame::clamp_frame_length},
    router::DEFAULT_FETCH_LIMIT,
};

/// Bind string used when none is configured.
pub const DEFAULT_BIND: &str = "amqp://127.0.0.1:8888";

/// Container name used when none is configured.
pub const DEFAULT_CONTAINER: &str = "linkbroker";

/// Listen backlog used when none is configured.
pub const DEFAULT_BACKLOG: u32 = 128;

/// Settings for one broker process.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct BrokerConfig {
    /// Listening endpoint as `scheme://host[:port]`.
    pub bind: String,
    /// Container identity advertised to peers.
    pub container: String,
    /// Fail connections that stay silent this long.
    pub idle_timeout: Option<Duration>,
    /// Messages materialised per queue fetch.
    pub fetch_limit: usize,
    /// Largest frame accepted or produced, clamped to the engine's limits.
    pub max_frame_length: usize,
    /// Pending connections queued by the listening socket.
    pub backlog: u32,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            bind: DEFAULT_BIND.to_owned(),
            container: DEFAULT_CONTAINER.to_owned(),
            idle_timeout: None,
            fetch_limit: DEFAULT_FETCH_LIMIT,
            max_frame_length: crate::engine::frame::DEFAULT_MAX_FRAME_LENGTH,
            backlog: DEFAULT_BACKLOG,
        }
    }
}

impl BrokerConfig {
    /// Parse [`BrokerConfig::bind`].
    ///
    /// # Errors
    ///
    /// Returns an [`AddressError`] if the bind string is malformed.
    pub fn bind_address(&self) -> Result<BindAddress, AddressError> {
        parse_bind_address(&self.bind)
    }

    /// Properties handed to every new session.
    #[must_use]
    pub fn connection_properties(&self) -> ConnectionProperties {
        ConnectionProperties {
            hostname: None,
            idle_timeout: self.idle_timeout.filter(|idle| !idle.is_zero()),
            max_frame_length: clamp_frame_length(self.max_frame_length),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{address::DEFAULT_PORT, engine::frame::MIN_FRAME_LENGTH};

    #[test]
    fn defaults_bind_to_the_default_port() {
        let config = BrokerConfig::default();
        let address = config.bind_address().expect("default bind parses");
        assert_eq!(address.host, "127.0.0.1");
        assert_eq!(address.port, DEFAULT_PORT);
        assert_eq!(config.fetch_limit, 10);
    }

    #[test]
    fn properties_clamp_frame_length_and_ignore_zero_timeout() {
        let config = BrokerConfig {
            idle_timeout: Some(Duration::ZERO),
            max_frame_length: 1,
            ..BrokerConfig::default()
        };
        let properties = config.connection_properties();
        assert_eq!(properties.idle_timeout, None);
        assert_eq!(properties.max_frame_length, MIN_FRAME_LENGTH);
    }

    #[test]
    fn malformed_bind_is_reported() {
        let config = BrokerConfig {
            bind: "localhost".into(),
            ..BrokerConfig::default()
        };
        assert!(matches!(config.bind_address(), Err(AddressError::Syntax(_))));
    }
}
