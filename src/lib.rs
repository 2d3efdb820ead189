#![doc(html_root_url = "https://docs.rs/linkbroker/latest")]
//! Public API for the `linkbroker` library.
//!
//! A single-threaded broker front-end: peers attach links over a credit-flow
//! protocol and the broker moves messages between those links and queue
//! storage. The [`server::Reactor`] drives every connection from one
//! readiness loop; the protocol itself sits behind the [`engine`] traits and
//! storage behind [`router::QueueStore`].

pub mod address;
pub mod config;
pub mod engine;
pub mod message;
pub mod metrics;
pub mod router;
pub mod server;

pub use address::{BindAddress, parse_bind_address};
pub use config::BrokerConfig;
pub use message::{StorageMessage, WireMessage, to_storage, to_wire};
pub use metrics::{CONNECTIONS_ACTIVE, Direction, ERRORS_TOTAL, MESSAGES_TOTAL};
pub use router::{QueueRouter, QueueStore, StoreError};
pub use server::{Reactor, ServerError};
