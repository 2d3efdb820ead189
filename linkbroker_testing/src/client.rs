//! A protocol client for driving a broker over a real socket.

use std::{
    collections::VecDeque,
    io,
    net::SocketAddr,
    time::{Duration, Instant},
};

use linkbroker::{
    WireMessage,
    engine::{
        ConnectionProperties,
        DeliveryTag,
        Event,
        FrameSession,
        LinkHandle,
        ReceiverEvent,
        SaslMode,
        SenderEvent,
        Session,
    },
};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpStream,
    time::timeout,
};

/// How long any single wait for the broker may take.
pub const EVENT_TIMEOUT: Duration = Duration::from_secs(5);

/// Client end of one connection, speaking the bundled frame protocol.
///
/// Every method pumps the socket until the awaited event arrives. Events
/// that arrive meanwhile are kept for later calls.
pub struct TestClient {
    stream: TcpStream,
    session: FrameSession,
    events: VecDeque<Event>,
    next_link: u32,
}

fn engine_error(e: impl std::fmt::Display) -> io::Error { io::Error::other(e.to_string()) }

impl TestClient {
    /// Connect to `addr`, authenticate anonymously and wait until the
    /// connection is open at both ends.
    ///
    /// # Errors
    ///
    /// Returns an [`io::Error`] if the socket fails, the broker fails the
    /// session or nothing arrives within [`EVENT_TIMEOUT`].
    pub async fn connect(addr: SocketAddr) -> io::Result<Self> {
        let stream = TcpStream::connect(addr).await?;
        let local = stream.local_addr()?.to_string();
        let mut session = FrameSession::new(&local, "test-client", ConnectionProperties::default());
        session.sasl(SaslMode::Client, &["ANONYMOUS"]);
        session.open();
        let mut client = Self {
            stream,
            session,
            events: VecDeque::new(),
            next_link: 0,
        };
        client.expect(|event| *event == Event::Active).await?;
        Ok(client)
    }

    async fn flush(&mut self) -> io::Result<()> {
        while self.session.has_output() {
            let n = self.session.output().len();
            self.stream.write_all(self.session.output()).await?;
            self.session.consume_output(n);
        }
        Ok(())
    }

    async fn fill(&mut self) -> io::Result<()> {
        let mut buf = [0u8; 4096];
        let n = timeout(EVENT_TIMEOUT, self.stream.read(&mut buf))
            .await
            .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "no frame from broker"))??;
        if n == 0 {
            self.session.close_input();
        } else {
            self.session.push_input(&buf[..n]).map_err(engine_error)?;
        }
        self.pump_events();
        Ok(())
    }

    fn pump_events(&mut self) {
        self.session.process(Instant::now());
        while let Some(event) = self.session.next_event() {
            self.events.push_back(event);
        }
    }

    /// Next event raised by the client session.
    ///
    /// # Errors
    ///
    /// Returns an [`io::Error`] on socket failure or timeout, or when the
    /// next event is [`Event::Failed`].
    pub async fn next_event(&mut self) -> io::Result<Event> {
        loop {
            self.flush().await?;
            if let Some(event) = self.events.pop_front() {
                if let Event::Failed { error } = &event {
                    return Err(engine_error(error));
                }
                return Ok(event);
            }
            self.fill().await?;
        }
    }

    /// Skip events until one satisfies `wanted`.
    ///
    /// # Errors
    ///
    /// As for [`TestClient::next_event`].
    pub async fn expect<F>(&mut self, mut wanted: F) -> io::Result<Event>
    where
        F: FnMut(&Event) -> bool,
    {
        loop {
            let event = self.next_event().await?;
            if wanted(&event) {
                return Ok(event);
            }
        }
    }

    fn link_name(&mut self, role: &str) -> String {
        self.next_link += 1;
        format!("test-{role}-{}", self.next_link)
    }

    /// Attach a sending link towards `target` and wait until the broker
    /// attached its end.
    ///
    /// # Errors
    ///
    /// As for [`TestClient::next_event`].
    pub async fn open_sender(&mut self, target: Option<&str>) -> io::Result<LinkHandle> {
        let name = self.link_name("sender");
        let link = self.session.create_sender(&name, None, target);
        self.session.open_link(link);
        self.expect(|event| *event == Event::Sender(link, SenderEvent::Active))
            .await?;
        Ok(link)
    }

    /// Attach a receiving link on `source` without granting credit.
    ///
    /// # Errors
    ///
    /// As for [`TestClient::next_event`].
    pub async fn open_receiver(&mut self, source: Option<&str>) -> io::Result<LinkHandle> {
        let name = self.link_name("receiver");
        let link = self.session.create_receiver(&name, source, None);
        self.session.open_link(link);
        self.expect(|event| *event == Event::Receiver(link, ReceiverEvent::Active))
            .await?;
        Ok(link)
    }

    /// Target address the broker bound `link` to.
    #[must_use]
    pub fn target_address(&self, link: LinkHandle) -> Option<&str> {
        self.session.target_address(link)
    }

    /// Source address the broker bound `link` to.
    #[must_use]
    pub fn source_address(&self, link: LinkHandle) -> Option<&str> {
        self.session.source_address(link)
    }

    /// Send `message` once the broker grants credit and wait for it to be
    /// settled.
    ///
    /// # Errors
    ///
    /// As for [`TestClient::next_event`].
    pub async fn send(&mut self, link: LinkHandle, message: WireMessage) -> io::Result<DeliveryTag> {
        while self.session.credit(link) == 0 {
            self.next_event().await?;
        }
        let tag = self.session.send(link, message).map_err(engine_error)?;
        self.expect(|event| {
            matches!(
                event,
                Event::Sender(l, SenderEvent::MessageSent { tag: t, .. }) if *l == link && *t == tag
            )
        })
        .await?;
        Ok(tag)
    }

    /// Grant one credit on `link`, wait for a message and accept it.
    ///
    /// # Errors
    ///
    /// As for [`TestClient::next_event`].
    pub async fn receive(&mut self, link: LinkHandle) -> io::Result<WireMessage> {
        self.session.add_capacity(link, 1);
        let event = self
            .expect(|event| {
                matches!(
                    event,
                    Event::Receiver(l, ReceiverEvent::MessageReceived { .. }) if *l == link
                )
            })
            .await?;
        let Event::Receiver(_, ReceiverEvent::MessageReceived { message, delivery }) = event else {
            return Err(engine_error("unexpected event"));
        };
        self.session.message_accepted(link, delivery);
        self.flush().await?;
        Ok(message)
    }

    /// Detach `link` and wait for the broker to detach its end.
    ///
    /// # Errors
    ///
    /// As for [`TestClient::next_event`].
    pub async fn close_link(&mut self, link: LinkHandle) -> io::Result<()> {
        self.session.close_link(link, None);
        self.expect(|event| {
            matches!(
                event,
                Event::Sender(l, SenderEvent::Closed) | Event::Receiver(l, ReceiverEvent::Closed)
                    if *l == link
            )
        })
        .await?;
        Ok(())
    }

    /// Close the connection and wait for the broker's close.
    ///
    /// # Errors
    ///
    /// As for [`TestClient::next_event`].
    pub async fn close(mut self) -> io::Result<()> {
        self.session.close(None);
        self.expect(|event| *event == Event::Closed).await?;
        Ok(())
    }
}
