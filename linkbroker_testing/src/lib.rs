//! Test support for `linkbroker`.
//!
//! [`spawn_broker`] runs a real broker on a loopback port, [`TestClient`]
//! talks to it with the bundled frame protocol, and [`RecordingStore`]
//! captures every storage call the broker makes.
//!
//! ```no_run
//! use linkbroker::WireMessage;
//! use linkbroker_testing::{RecordingStore, TestClient, spawn_broker};
//!
//! # async fn example() -> std::io::Result<()> {
//! let store = RecordingStore::new();
//! let addr = spawn_broker(store.clone())?;
//! let mut client = TestClient::connect(addr).await?;
//! let link = client.open_sender(Some("orders")).await?;
//! client.send(link, WireMessage::new(*b"hi")).await?;
//! assert_eq!(store.posts().len(), 1);
//! # Ok(())
//! # }
//! ```

pub mod broker;
pub mod client;
pub mod logging;
pub mod store;

pub use broker::{spawn_broker, spawn_broker_with};
pub use client::{EVENT_TIMEOUT, TestClient};
pub use logging::{LoggerHandle, logger};
pub use store::{RecordingStore, StoreCall};
