//! Running a broker in the background for integration tests.

use std::{io, net::SocketAddr, sync::mpsc, thread};

use linkbroker::{BrokerConfig, Reactor, engine::FrameContainer, router::QueueStore};
use tokio::runtime::Builder;

/// Start a broker on an ephemeral loopback port and return its address.
///
/// The broker runs on its own thread with a current-thread runtime, as the
/// binary does, and lives until the test process exits.
///
/// # Errors
///
/// Returns an [`io::Error`] if the runtime cannot be built or the listener
/// cannot be bound.
pub fn spawn_broker<Q>(store: Q) -> io::Result<SocketAddr>
where
    Q: QueueStore + Send + 'static,
{
    spawn_broker_with(
        BrokerConfig {
            bind: "amqp://127.0.0.1:0".into(),
            ..BrokerConfig::default()
        },
        store,
    )
}

/// Start a broker configured by `config`.
///
/// # Errors
///
/// As for [`spawn_broker`].
pub fn spawn_broker_with<Q>(config: BrokerConfig, store: Q) -> io::Result<SocketAddr>
where
    Q: QueueStore + Send + 'static,
{
    let (ready_tx, ready_rx) = mpsc::channel();
    thread::spawn(move || {
        let runtime = match Builder::new_current_thread().enable_all().build() {
            Ok(runtime) => runtime,
            Err(e) => {
                let _ = ready_tx.send(Err(e));
                return;
            }
        };
        runtime.block_on(async move {
            let container = FrameContainer::new(config.container.clone());
            match Reactor::bind(&config, container, store).await {
                Ok(reactor) => {
                    let _ = ready_tx.send(reactor.local_addr());
                    match reactor.run().await {}
                }
                Err(e) => {
                    let _ = ready_tx.send(Err(io::Error::other(e)));
                }
            }
        });
    });
    ready_rx.recv().map_err(io::Error::other)?
}
