//! Metric helpers for `linkbroker`.
//!
//! This module defines metric names and simple helper functions
//! wrapping the [`metrics`](https://docs.rs/metrics) crate. With the
//! `metrics` feature disabled every helper compiles to a no-op. No exporter
//! is installed by the library; embedders choose their own recorder.

#[cfg(feature = "metrics")]
use metrics::{counter, gauge};

/// Name of the gauge tracking live connections.
pub const CONNECTIONS_ACTIVE: &str = "linkbroker_connections_active";
/// Name of the counter tracking messages moved between links and storage.
pub const MESSAGES_TOTAL: &str = "linkbroker_messages_total";
/// Name of the counter tracking error occurrences.
pub const ERRORS_TOTAL: &str = "linkbroker_errors_total";

/// Direction of message flow relative to the broker.
#[derive(Clone, Copy, Debug)]
pub enum Direction {
    /// Messages received from a client and posted to storage.
    Inbound,
    /// Messages fetched from storage and sent to a client.
    Outbound,
}

impl Direction {
    #[cfg_attr(not(feature = "metrics"), allow(dead_code))]
    fn as_str(self) -> &'static str {
        match self {
            Direction::Inbound => "inbound",
            Direction::Outbound => "outbound",
        }
    }
}

/// Source of a recorded error.
#[derive(Clone, Copy, Debug)]
pub enum ErrorKind {
    /// Socket accept, read or write failure.
    Io,
    /// Protocol engine failure on a connection.
    Engine,
    /// Queue store fault swallowed by the router.
    Storage,
}

impl ErrorKind {
    #[cfg_attr(not(feature = "metrics"), allow(dead_code))]
    fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Io => "io",
            ErrorKind::Engine => "engine",
            ErrorKind::Storage => "storage",
        }
    }
}

/// Increment the live connections gauge.
pub fn inc_connections() {
    #[cfg(feature = "metrics")]
    gauge!(CONNECTIONS_ACTIVE).increment(1.0);
}

/// Decrement the live connections gauge.
pub fn dec_connections() {
    #[cfg(feature = "metrics")]
    gauge!(CONNECTIONS_ACTIVE).decrement(1.0);
}

/// Record a message moved in `direction`.
pub fn inc_messages(direction: Direction) {
    #[cfg(feature = "metrics")]
    counter!(MESSAGES_TOTAL, "direction" => direction.as_str()).increment(1);
    #[cfg(not(feature = "metrics"))]
    let _ = direction;
}

/// Record an error of the given kind.
pub fn inc_errors(kind: ErrorKind) {
    #[cfg(feature = "metrics")]
    counter!(ERRORS_TOTAL, "kind" => kind.as_str()).increment(1);
    #[cfg(not(feature = "metrics"))]
    let _ = kind;
}
