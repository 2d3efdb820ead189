//! Parsing of listening endpoint strings.
//!
//! The broker is configured with a URI-like bind string of the form
//! `scheme://host[:port]`. Parsing is purely syntactic: the host is not
//! resolved here and the scheme is not interpreted beyond being present.

use std::{fmt, str::FromStr};

use thiserror::Error;

/// Port used when a bind string omits one.
pub const DEFAULT_PORT: u16 = 8888;

/// Errors produced while parsing a bind string.
#[derive(Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum AddressError {
    /// The string does not match `scheme://host[:port]`.
    #[error("bad address syntax: {0}")]
    Syntax(String),
    /// The port component is not a valid TCP port.
    #[error("bad port in address {address}: {port}")]
    Port {
        /// The bind string as supplied.
        address: String,
        /// The offending port text.
        port: String,
    },
}

/// Host and port extracted from a bind string.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BindAddress {
    /// Scheme preceding `://`, for example `amqp`.
    pub scheme: String,
    /// Host name or dotted address. Not resolved.
    pub host: String,
    /// Explicit port, or [`DEFAULT_PORT`].
    pub port: u16,
}

impl fmt::Display for BindAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}:{}", self.scheme, self.host, self.port)
    }
}

impl FromStr for BindAddress {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> { parse_bind_address(s) }
}

/// Parse `scheme://host[:port]` into a [`BindAddress`].
///
/// The scheme must start with an ASCII letter and may continue with
/// letters, digits, `+`, `-` or `.`. The host accepts ASCII letters, digits,
/// `.` and `-`. A missing port yields [`DEFAULT_PORT`].
///
/// # Examples
///
/// ```
/// use linkbroker::address::{DEFAULT_PORT, parse_bind_address};
///
/// let addr = parse_bind_address("amqp://127.0.0.1").expect("valid address");
/// assert_eq!(addr.host, "127.0.0.1");
/// assert_eq!(addr.port, DEFAULT_PORT);
///
/// let addr = parse_bind_address("amqp://broker.local:5672").expect("valid address");
/// assert_eq!(addr.port, 5672);
///
/// assert!(parse_bind_address("127.0.0.1:5672").is_err());
/// ```
///
/// # Errors
///
/// Returns [`AddressError::Syntax`] if the string does not have the expected
/// shape and [`AddressError::Port`] if the port overflows a `u16`.
pub fn parse_bind_address(input: &str) -> Result<BindAddress, AddressError> {
    let syntax = || AddressError::Syntax(input.to_owned());

    let (scheme, rest) = input.split_once("://").ok_or_else(syntax)?;
    if !is_scheme(scheme) {
        return Err(syntax());
    }

    let (host, port) = match rest.split_once(':') {
        Some((host, port)) => (host, Some(port)),
        None => (rest, None),
    };
    if !is_host(host) {
        return Err(syntax());
    }

    let port = match port {
        None => DEFAULT_PORT,
        Some(digits) if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) => {
            digits.parse().map_err(|_| AddressError::Port {
                address: input.to_owned(),
                port: digits.to_owned(),
            })?
        }
        Some(_) => return Err(syntax()),
    };

    Ok(BindAddress {
        scheme: scheme.to_owned(),
        host: host.to_owned(),
        port,
    })
}

fn is_scheme(scheme: &str) -> bool {
    let mut chars = scheme.chars();
    chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}

fn is_host(host: &str) -> bool {
    !host.is_empty()
        && host
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-'))
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("amqp://127.0.0.1", "127.0.0.1", DEFAULT_PORT)]
    #[case("amqp://127.0.0.1:8888", "127.0.0.1", 8888)]
    #[case("amqp://localhost:5672", "localhost", 5672)]
    #[case("amqps://broker-1.example.org", "broker-1.example.org", DEFAULT_PORT)]
    #[case("amqp://host:0", "host", 0)]
    fn parses_valid_addresses(#[case] input: &str, #[case] host: &str, #[case] port: u16) {
        let addr = parse_bind_address(input).expect("address should parse");
        assert_eq!(addr.host, host);
        assert_eq!(addr.port, port);
    }

    #[rstest]
    #[case("")]
    #[case("127.0.0.1:8888")]
    #[case("amqp://")]
    #[case("amqp://:8888")]
    #[case("amqp://host:")]
    #[case("amqp://host:port")]
    #[case("amqp://host:88:88")]
    #[case("amqp://host/path")]
    #[case("amqp://ho st")]
    #[case("1amqp://host")]
    #[case("://host")]
    #[case("amqp://[::1]:8888")]
    fn rejects_malformed_addresses(#[case] input: &str) {
        assert!(matches!(
            parse_bind_address(input),
            Err(AddressError::Syntax(_))
        ));
    }

    #[test]
    fn rejects_port_overflow() {
        assert_eq!(
            parse_bind_address("amqp://host:65536"),
            Err(AddressError::Port {
                address: "amqp://host:65536".to_owned(),
                port: "65536".to_owned(),
            })
        );
    }

    #[test]
    fn display_includes_resolved_port() {
        let addr: BindAddress = "amqp://127.0.0.1".parse().expect("address should parse");
        assert_eq!(addr.to_string(), "amqp://127.0.0.1:8888");
    }

    proptest! {
        #[test]
        fn explicit_ports_round_trip(
            host in "[a-z][a-z0-9.-]{0,20}",
            port in any::<u16>(),
        ) {
            let addr = parse_bind_address(&format!("amqp://{host}:{port}"))
                .expect("generated address should parse");
            prop_assert_eq!(addr.host, host);
            prop_assert_eq!(addr.port, port);
        }

        #[test]
        fn omitted_port_defaults(host in "[A-Za-z0-9][A-Za-z0-9.]{0,20}") {
            let addr = parse_bind_address(&format!("amqp://{host}"))
                .expect("generated address should parse");
            prop_assert_eq!(addr.port, DEFAULT_PORT);
        }

        #[test]
        fn missing_scheme_is_rejected(host in "[a-z0-9.]{1,20}", port in any::<u16>()) {
            let input = format!("{host}:{port}");
            prop_assert!(parse_bind_address(&input).is_err());
        }
    }
}
