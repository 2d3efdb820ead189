//! Single-threaded readiness reactor.
//!
//! [`Reactor`] owns the listening socket and every live [`Connection`]. Each
//! [`Reactor::turn`] asks the sessions what they are waiting for, polls the
//! sockets once, and then handles the results synchronously in a fixed
//! order: accept, input, due timers, output, reaping. Nothing else awaits, so
//! event handling never interleaves between connections.

use std::{
    collections::{BTreeMap, BTreeSet},
    convert::Infallible,
    fmt,
    io,
    net::SocketAddr,
    time::Instant,
};

use log::{info, warn};
use tokio::net::{TcpListener, TcpSocket, TcpStream, lookup_host};

use crate::{
    config::BrokerConfig,
    engine::{ConnectionProperties, Container},
    metrics::{self, ErrorKind},
    router::{QueueRouter, QueueStore},
};

mod connection;
mod error;
mod link;
mod poll;

pub use connection::{Connection, SASL_MECHANISMS};
pub use error::ServerError;
pub use link::{DEFAULT_QUEUE, LinkStatus, ReceiverLink, SenderLink, queue_address};

/// Identifier assigned to an accepted connection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl From<u64> for ConnectionId {
    fn from(value: u64) -> Self { Self(value) }
}

impl ConnectionId {
    /// Create a new [`ConnectionId`] with the provided value.
    #[must_use]
    pub fn new(id: u64) -> Self { Self(id) }

    /// Return the inner `u64` representation.
    #[must_use]
    pub fn as_u64(&self) -> u64 { self.0 }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ConnectionId({})", self.0)
    }
}

/// The broker's event loop.
pub struct Reactor<C: Container, Q> {
    listener: TcpListener,
    container: C,
    router: QueueRouter<Q>,
    connections: BTreeMap<ConnectionId, Connection<C::Session>>,
    next_id: u64,
    properties: ConnectionProperties,
}

impl<C: Container, Q: QueueStore> Reactor<C, Q> {
    /// Resolve and listen on `config.bind`.
    ///
    /// # Errors
    ///
    /// Returns a [`ServerError`] if the bind string is malformed, the host
    /// does not resolve, or the socket cannot be bound.
    pub async fn bind(config: &BrokerConfig, container: C, store: Q) -> Result<Self, ServerError> {
        let address = config.bind_address()?;
        let resolved = lookup_host((address.host.as_str(), address.port))
            .await
            .and_then(|mut addrs| {
                addrs.next().ok_or_else(|| {
                    io::Error::new(io::ErrorKind::NotFound, "no addresses for host")
                })
            })
            .map_err(|source| ServerError::Resolve {
                host: address.host.clone(),
                source,
            })?;
        let socket = if resolved.is_ipv4() {
            TcpSocket::new_v4()
        } else {
            TcpSocket::new_v6()
        }
        .map_err(ServerError::Bind)?;
        socket.set_reuseaddr(true).map_err(ServerError::Bind)?;
        socket.bind(resolved).map_err(ServerError::Bind)?;
        let listener = socket.listen(config.backlog).map_err(ServerError::Bind)?;
        let router = QueueRouter::new(store).with_fetch_limit(config.fetch_limit);
        Ok(Self::from_listener(
            listener,
            container,
            router,
            config.connection_properties(),
        ))
    }

    /// Build a reactor around an already bound listener.
    #[must_use]
    pub fn from_listener(
        listener: TcpListener,
        container: C,
        router: QueueRouter<Q>,
        properties: ConnectionProperties,
    ) -> Self {
        Self {
            listener,
            container,
            router,
            connections: BTreeMap::new(),
            next_id: 0,
            properties,
        }
    }

    /// Address the listener is bound to.
    ///
    /// # Errors
    ///
    /// Returns the socket error if the address cannot be queried.
    pub fn local_addr(&self) -> io::Result<SocketAddr> { self.listener.local_addr() }

    /// Number of live connections.
    #[must_use]
    pub fn connection_count(&self) -> usize { self.connections.len() }

    /// The router shared by every connection.
    #[must_use]
    pub fn router(&self) -> &QueueRouter<Q> { &self.router }

    /// Run turns forever.
    pub async fn run(mut self) -> Infallible {
        loop {
            self.turn().await;
        }
    }

    /// Run one poll and handle everything it reported.
    pub async fn turn(&mut self) {
        let work = poll::need_processing(&self.connections);
        let timeout = poll::poll_timeout(&work.timers, Instant::now());
        let readiness = poll::poll(&self.listener, &self.connections, &work, timeout).await;
        self.dispatch(&work, readiness);
    }

    fn dispatch(&mut self, work: &poll::Work, readiness: poll::Readiness) {
        let mut touched = BTreeSet::new();

        match readiness.accepted {
            Some(Ok((socket, peer))) => self.register(socket, peer),
            Some(Err(e)) => {
                warn!("accept failed: error={e}");
                metrics::inc_errors(ErrorKind::Io);
            }
            None => {}
        }

        for (id, e) in &readiness.failed {
            if let Some(connection) = self.connections.get_mut(id) {
                connection.io_failed("poll", e);
                touched.insert(*id);
            }
        }

        for id in &readiness.readable {
            if let Some(connection) = self.connections.get_mut(id) {
                connection.process_input(&mut self.router, Instant::now());
                touched.insert(*id);
            }
        }

        let now = Instant::now();
        for timer in &work.timers {
            if timer.deadline > now {
                break;
            }
            if let Some(connection) = self.connections.get_mut(&timer.connection) {
                connection.process_timer(&mut self.router, now);
                touched.insert(timer.connection);
            }
        }

        for id in &readiness.writable {
            if let Some(connection) = self.connections.get_mut(id) {
                connection.process_output(&mut self.router, Instant::now());
                touched.insert(*id);
            }
        }

        self.reap(&touched);
    }

    fn register(&mut self, socket: TcpStream, peer: SocketAddr) {
        let name = peer.to_string();
        let session = match self
            .container
            .create_session(&name, self.properties.clone())
        {
            Ok(session) => session,
            Err(e) => {
                warn!("cannot create session: connection={name}, error={e}");
                metrics::inc_errors(ErrorKind::Engine);
                return;
            }
        };
        let id = ConnectionId::new(self.next_id);
        self.next_id += 1;
        info!("accepted connection: connection={name}, id={id}");
        self.connections.insert(id, Connection::new(socket, session));
        metrics::inc_connections();
    }

    fn reap(&mut self, touched: &BTreeSet<ConnectionId>) {
        let mut reaped = 0usize;
        for id in touched {
            if self
                .connections
                .get(id)
                .is_some_and(Connection::is_closed)
                && let Some(connection) = self.connections.remove(id)
            {
                connection.destroy();
                metrics::dec_connections();
                reaped += 1;
            }
        }
        if reaped > 0 {
            info!("live connections: {}", self.connections.len());
        }
    }
}

/// Bind according to `config` and run the reactor forever.
///
/// # Errors
///
/// Returns a [`ServerError`] if setup fails. Once serving, this never
/// returns.
pub async fn run<C: Container, Q: QueueStore>(
    config: &BrokerConfig,
    container: C,
    store: Q,
) -> Result<Infallible, ServerError> {
    let reactor = Reactor::bind(config, container, store).await?;
    match reactor.local_addr() {
        Ok(addr) => info!("Serving on host: {} ({addr})", config.bind),
        Err(_) => info!("Serving on host: {}", config.bind),
    }
    Ok(reactor.run().await)
}
