//! Readiness gathering for one reactor turn.

use std::{
    collections::{BTreeMap, BTreeSet},
    future, io,
    net::SocketAddr,
    time::{Duration, Instant},
};

use futures::{FutureExt, StreamExt, stream::FuturesUnordered};
use tokio::{
    io::Interest,
    net::{TcpListener, TcpStream},
    time::sleep,
};

use super::{ConnectionId, connection::Connection};
use crate::engine::Session;

/// A session deadline.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct Timer {
    pub deadline: Instant,
    pub connection: ConnectionId,
}

/// What the live connections want from the next poll.
#[derive(Debug, Default)]
pub struct Work {
    pub readable: Vec<ConnectionId>,
    pub writable: Vec<ConnectionId>,
    /// Sorted by ascending deadline.
    pub timers: Vec<Timer>,
}

/// Ask every session for its read interest, write interest and deadline.
pub fn need_processing<S: Session>(connections: &BTreeMap<ConnectionId, Connection<S>>) -> Work {
    let mut work = Work::default();
    for (id, connection) in connections {
        let session = connection.session();
        if session.needs_input() {
            work.readable.push(*id);
        }
        if session.has_output() {
            work.writable.push(*id);
        }
        if let Some(deadline) = session.deadline() {
            work.timers.push(Timer {
                deadline,
                connection: *id,
            });
        }
    }
    work.timers.sort_unstable();
    work
}

/// Zero when a timer is overdue, the wait until the first timer, or `None`
/// to wait for I/O alone.
#[must_use]
pub fn poll_timeout(timers: &[Timer], now: Instant) -> Option<Duration> {
    timers
        .first()
        .map(|timer| timer.deadline.saturating_duration_since(now))
}

/// Result of one poll.
#[derive(Debug, Default)]
pub struct Readiness {
    pub accepted: Option<io::Result<(TcpStream, SocketAddr)>>,
    pub readable: BTreeSet<ConnectionId>,
    pub writable: BTreeSet<ConnectionId>,
    pub failed: Vec<(ConnectionId, io::Error)>,
}

impl Readiness {
    fn record(&mut self, id: ConnectionId, interest: Interest, ready: io::Result<tokio::io::Ready>) {
        match ready {
            Ok(ready) => {
                if interest.is_readable() && (ready.is_readable() || ready.is_read_closed()) {
                    self.readable.insert(id);
                }
                if interest.is_writable() && (ready.is_writable() || ready.is_write_closed()) {
                    self.writable.insert(id);
                }
            }
            Err(e) => self.failed.push((id, e)),
        }
    }
}

/// Wait until the listener or a socket is ready, or `timeout` passes, then
/// collect everything else that is ready without waiting.
pub async fn poll<S: Session>(
    listener: &TcpListener,
    connections: &BTreeMap<ConnectionId, Connection<S>>,
    work: &Work,
    timeout: Option<Duration>,
) -> Readiness {
    let mut interests: BTreeMap<ConnectionId, Interest> = BTreeMap::new();
    for id in &work.readable {
        interests.insert(*id, Interest::READABLE);
    }
    for id in &work.writable {
        interests
            .entry(*id)
            .and_modify(|interest| *interest = interest.add(Interest::WRITABLE))
            .or_insert(Interest::WRITABLE);
    }

    let mut pending: FuturesUnordered<_> = interests
        .into_iter()
        .filter_map(|(id, interest)| {
            let socket = connections.get(&id)?.socket();
            Some(async move { (id, interest, socket.ready(interest).await) })
        })
        .collect();

    let expiry = async {
        match timeout {
            Some(timeout) => sleep(timeout).await,
            None => future::pending().await,
        }
    };

    if timeout == Some(Duration::ZERO) {
        // Let the driver pick up socket events before the timer branch wins.
        tokio::task::yield_now().await;
    }

    let mut readiness = Readiness::default();
    tokio::select! {
        biased;
        accepted = listener.accept() => readiness.accepted = Some(accepted),
        Some((id, interest, ready)) = pending.next(), if !pending.is_empty() => {
            readiness.record(id, interest, ready);
        }
        () = expiry => {}
    }

    while let Some(Some((id, interest, ready))) = pending.next().now_or_never() {
        readiness.record(id, interest, ready);
    }
    if readiness.accepted.is_none() {
        readiness.accepted = listener.accept().now_or_never();
    }
    readiness
}

#[cfg(test)]
mod tests {
    use super::*;

    fn timer(deadline: Instant, id: u64) -> Timer {
        Timer {
            deadline,
            connection: ConnectionId::new(id),
        }
    }

    #[test]
    fn timeout_is_zero_for_overdue_timers() {
        let now = Instant::now();
        let timers = [timer(now - Duration::from_secs(1), 1)];
        assert_eq!(poll_timeout(&timers, now), Some(Duration::ZERO));
    }

    #[test]
    fn timeout_waits_for_first_timer() {
        let now = Instant::now();
        let timers = [
            timer(now + Duration::from_millis(20), 2),
            timer(now + Duration::from_millis(90), 1),
        ];
        assert_eq!(poll_timeout(&timers, now), Some(Duration::from_millis(20)));
    }

    #[test]
    fn no_timers_means_no_timeout() {
        assert_eq!(poll_timeout(&[], Instant::now()), None);
    }

    #[test]
    fn timers_sort_by_deadline_first() {
        let now = Instant::now();
        let mut timers = vec![
            timer(now + Duration::from_millis(5), 1),
            timer(now, 9),
        ];
        timers.sort_unstable();
        assert_eq!(timers[0].connection, ConnectionId::new(9));
    }
}
