//! Errors raised while setting up the [`Reactor`](super::Reactor).

use std::io;

use thiserror::Error;

use crate::address::AddressError;

/// Setup failures. Once the reactor runs, nothing is reported this way.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ServerError {
    /// The bind string could not be parsed.
    #[error("invalid bind address: {0}")]
    Address(#[from] AddressError),
    /// The host could not be resolved to a socket address.
    #[error("cannot resolve {host}: {source}")]
    Resolve {
        /// Host part of the bind string.
        host: String,
        /// Underlying resolver error.
        #[source]
        source: io::Error,
    },
    /// Binding or listening on the socket failed.
    #[error("bind error: {0}")]
    Bind(#[source] io::Error),
}
