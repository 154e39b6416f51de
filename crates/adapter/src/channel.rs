//! Session channel - persistent connection to the authoritative server
//!
//! One [`SessionChannel`] owns at most one TCP connection, driven by a spawned
//! task. The task performs the `hello`/`welcome` handshake, forwards outbound
//! intents, dispatches inbound events to subscribers, and reconnects with
//! exponential backoff after an unexpected drop.
//!
//! Status moves `Disconnected -> Connecting -> Connected` and back to
//! `Connecting` on a drop. After [`ReconnectPolicy::max_attempts`] failed
//! retries the status becomes `Exhausted` and the task stops; only an explicit
//! [`SessionChannel::connect`] starts it again.
//!
//! [`ReconnectPolicy::max_attempts`]: crate::config::ReconnectPolicy::max_attempts

use std::io;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::runtime::Handle;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::ClientConfig;
use crate::error::ChannelError;
use crate::protocol::{
    create_hello, encode_line, is_compatible_version, parse_server_line, ClientMessage, ErrorCode,
    EventTag, Frame, Intent, ServerMessage,
};
use bingo_core::SessionEvent;

/// Connection status, observable through [`SessionChannel::watch_status`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelStatus {
    Disconnected,
    /// `attempt` is 0 for the first try and counts retries after that.
    Connecting { attempt: u32 },
    /// `epoch` increases with every successful connection.
    Connected { epoch: u64 },
    Exhausted { attempts: u32 },
    Rejected { code: ErrorCode, message: String },
}

impl ChannelStatus {
    pub fn is_connected(&self) -> bool {
        matches!(self, ChannelStatus::Connected { .. })
    }

    /// The connection task has stopped and will not retry on its own.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ChannelStatus::Disconnected
                | ChannelStatus::Exhausted { .. }
                | ChannelStatus::Rejected { .. }
        )
    }
}

/// A session event as delivered to subscribers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundEvent {
    pub tag: EventTag,
    pub seq: u64,
    pub event: SessionEvent,
}

#[derive(Debug)]
enum Outbound {
    Message(ClientMessage),
    /// Flush pending messages, then close the connection.
    Close,
}

struct WriterSlot {
    generation: u64,
    tx: mpsc::UnboundedSender<Outbound>,
}

#[derive(Default)]
struct ConnState {
    /// Bumped by every connect/disconnect; tasks from older generations are ignored.
    generation: u64,
    epoch: u64,
    task: Option<JoinHandle<()>>,
    writer: Option<WriterSlot>,
}

struct Subscriber {
    id: u64,
    tags: Vec<EventTag>,
    tx: mpsc::UnboundedSender<InboundEvent>,
}

struct Shared {
    config: ClientConfig,
    status: watch::Sender<ChannelStatus>,
    conn: Mutex<ConnState>,
    subscribers: Mutex<Vec<Subscriber>>,
    next_subscriber: AtomicU64,
    wire_log: Mutex<Option<mpsc::UnboundedSender<String>>>,
}

impl Shared {
    fn set_status(&self, generation: u64, status: ChannelStatus) {
        let conn = self.conn.lock();
        if conn.generation == generation {
            self.status.send_replace(status);
        }
    }

    /// Publish a new writer and mark the channel connected. Returns the epoch,
    /// or `None` if this task has been superseded.
    fn install_writer(&self, generation: u64, tx: mpsc::UnboundedSender<Outbound>) -> Option<u64> {
        let mut conn = self.conn.lock();
        if conn.generation != generation {
            return None;
        }
        conn.epoch += 1;
        conn.writer = Some(WriterSlot { generation, tx });
        self.status.send_replace(ChannelStatus::Connected { epoch: conn.epoch });
        Some(conn.epoch)
    }

    fn is_current(&self, generation: u64) -> bool {
        self.conn.lock().generation == generation
    }

    fn clear_writer(&self, generation: u64) {
        let mut conn = self.conn.lock();
        if conn
            .writer
            .as_ref()
            .is_some_and(|w| w.generation == generation)
        {
            conn.writer = None;
        }
    }

    fn dispatch(&self, event: InboundEvent) {
        let mut subscribers = self.subscribers.lock();
        subscribers.retain(|s| !s.tx.is_closed());
        for sub in subscribers.iter().filter(|s| s.tags.contains(&event.tag)) {
            let _ = sub.tx.send(event.clone());
        }
    }

    fn ensure_wire_log(&self, runtime: &Handle) {
        let Some(path) = self.config.wire_log_path.clone() else {
            return;
        };
        let mut slot = self.wire_log.lock();
        if slot.as_ref().is_some_and(|tx| !tx.is_closed()) {
            return;
        }

        let (tx, mut rx) = mpsc::unbounded_channel::<String>();
        runtime.spawn(async move {
            use tokio::fs::OpenOptions;

            let mut file = match OpenOptions::new().create(true).append(true).open(&path).await {
                Ok(f) => f,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "wire log disabled");
                    return;
                }
            };
            while let Some(line) = rx.recv().await {
                if file.write_all(line.as_bytes()).await.is_err() {
                    break;
                }
                if file.flush().await.is_err() {
                    break;
                }
            }
        });
        *slot = Some(tx);
    }

    fn log_wire(&self, direction: &str, line: &str) {
        if let Some(tx) = self.wire_log.lock().as_ref() {
            let _ = tx.send(format!("{} {}\n", direction, line.trim_end()));
        }
    }
}

/// Handle to the connection. Share it with `Arc`; all methods take `&self`.
pub struct SessionChannel {
    shared: Arc<Shared>,
}

impl SessionChannel {
    pub fn new(config: ClientConfig) -> Self {
        let (status, _) = watch::channel(ChannelStatus::Disconnected);
        Self {
            shared: Arc::new(Shared {
                config,
                status,
                conn: Mutex::new(ConnState::default()),
                subscribers: Mutex::new(Vec::new()),
                next_subscriber: AtomicU64::new(1),
                wire_log: Mutex::new(None),
            }),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.shared.config
    }

    pub fn status(&self) -> ChannelStatus {
        self.shared.status.borrow().clone()
    }

    pub fn watch_status(&self) -> watch::Receiver<ChannelStatus> {
        self.shared.status.subscribe()
    }

    pub fn is_connected(&self) -> bool {
        self.shared.status.borrow().is_connected()
    }

    /// Start connecting with `token`. Does nothing if already connecting or
    /// connected. Must be called from within a tokio runtime.
    pub fn connect(&self, token: impl Into<String>) -> Result<(), ChannelError> {
        let runtime = Handle::try_current().map_err(|_| ChannelError::Runtime)?;

        let mut conn = self.shared.conn.lock();
        let active = matches!(
            *self.shared.status.borrow(),
            ChannelStatus::Connecting { .. } | ChannelStatus::Connected { .. }
        );
        if active {
            return Ok(());
        }

        conn.generation += 1;
        let generation = conn.generation;
        if let Some(stale) = conn.task.take() {
            stale.abort();
        }
        self.shared.ensure_wire_log(&runtime);
        self.shared
            .status
            .send_replace(ChannelStatus::Connecting { attempt: 0 });

        info!(server = %self.shared.config.server_label(), "connecting");
        conn.task = Some(runtime.spawn(run_connection(
            Arc::clone(&self.shared),
            token.into(),
            generation,
        )));
        Ok(())
    }

    /// Close the connection and cancel any pending retry.
    ///
    /// Messages already accepted by [`send`](Self::send) are flushed first.
    pub fn disconnect(&self) {
        let mut conn = self.shared.conn.lock();
        conn.generation += 1;
        let task = conn.task.take();
        let flushing = conn
            .writer
            .take()
            .is_some_and(|slot| slot.tx.send(Outbound::Close).is_ok());
        if !flushing {
            if let Some(task) = task {
                task.abort();
            }
        }
        if !matches!(*self.shared.status.borrow(), ChannelStatus::Disconnected) {
            info!("disconnected");
        }
        self.shared.status.send_replace(ChannelStatus::Disconnected);
    }

    /// Wait until connected. Fails if the connection gives up or is closed.
    pub async fn wait_connected(&self) -> Result<(), ChannelError> {
        let mut rx = self.shared.status.subscribe();
        loop {
            let status = rx.borrow_and_update().clone();
            match status {
                ChannelStatus::Connected { .. } => return Ok(()),
                ChannelStatus::Connecting { .. } => {}
                ChannelStatus::Disconnected => return Err(ChannelError::NotConnected),
                ChannelStatus::Exhausted { attempts } => {
                    return Err(ChannelError::ConnectionExhausted { attempts })
                }
                ChannelStatus::Rejected { code, message } => {
                    return Err(ChannelError::Rejected { code, message })
                }
            }
            if rx.changed().await.is_err() {
                return Err(ChannelError::Closed);
            }
        }
    }

    /// Send an intent. Fails with `NotConnected` unless connected; nothing is queued.
    pub fn send(&self, intent: Intent) -> Result<(), ChannelError> {
        let conn = self.shared.conn.lock();
        let slot = conn.writer.as_ref().ok_or(ChannelError::NotConnected)?;
        slot.tx
            .send(Outbound::Message(intent.into()))
            .map_err(|_| ChannelError::NotConnected)
    }

    /// Receive events with the given tags, from now on. Nothing is replayed.
    pub fn subscribe(&self, tags: &[EventTag]) -> Subscription {
        let id = self.shared.next_subscriber.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::unbounded_channel();
        self.shared.subscribers.lock().push(Subscriber {
            id,
            tags: tags.to_vec(),
            tx,
        });
        Subscription {
            id,
            rx,
            shared: Arc::downgrade(&self.shared),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.shared.subscribers.lock().len()
    }
}

impl Drop for SessionChannel {
    fn drop(&mut self) {
        let mut conn = self.shared.conn.lock();
        conn.generation += 1;
        conn.writer = None;
        if let Some(task) = conn.task.take() {
            task.abort();
        }
    }
}

/// Receiving end of [`SessionChannel::subscribe`]. Dropping it unsubscribes.
pub struct Subscription {
    id: u64,
    rx: mpsc::UnboundedReceiver<InboundEvent>,
    shared: Weak<Shared>,
}

impl Subscription {
    /// Next event in arrival order. `None` once the channel is gone.
    pub async fn recv(&mut self) -> Option<InboundEvent> {
        self.rx.recv().await
    }

    pub fn try_recv(&mut self) -> Option<InboundEvent> {
        self.rx.try_recv().ok()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(shared) = self.shared.upgrade() {
            shared.subscribers.lock().retain(|s| s.id != self.id);
        }
    }
}

// ============== Connection Task ==============

enum LinkEnd {
    /// We closed it.
    Closed,
    /// The peer or the network closed it.
    Dropped(String),
}

enum Step {
    Inbound(io::Result<Option<String>>),
    Outbound(Option<Outbound>),
}

/// One live TCP connection after a successful handshake.
struct Link {
    lines: Lines<BufReader<OwnedReadHalf>>,
    writer: OwnedWriteHalf,
    out_seq: u64,
    last_in_seq: u64,
}

impl Link {
    async fn open(shared: &Shared, token: &str) -> Result<Self, ChannelError> {
        let config = &shared.config;
        let stream = TcpStream::connect((config.host.as_str(), config.port)).await?;
        stream.set_nodelay(true)?;
        let (read_half, write_half) = stream.into_split();

        let mut link = Link {
            lines: BufReader::new(read_half).lines(),
            writer: write_half,
            out_seq: 0,
            last_in_seq: 0,
        };

        let seq = link.next_seq();
        link.write_frame(shared, &create_hello(seq, token)).await?;

        match tokio::time::timeout(config.handshake_timeout, link.await_welcome(shared)).await {
            Ok(result) => result?,
            Err(_) => {
                return Err(ChannelError::Handshake(
                    "timed out waiting for welcome".to_string(),
                ))
            }
        }
        Ok(link)
    }

    fn next_seq(&mut self) -> u64 {
        self.out_seq += 1;
        self.out_seq
    }

    async fn write_frame(
        &mut self,
        shared: &Shared,
        frame: &Frame<ClientMessage>,
    ) -> Result<(), ChannelError> {
        let line = encode_line(frame)?;
        self.writer.write_all(line.as_bytes()).await?;
        self.writer.flush().await?;
        shared.log_wire(">>", &line);
        Ok(())
    }

    async fn await_welcome(&mut self, shared: &Shared) -> Result<(), ChannelError> {
        loop {
            let line = self.lines.next_line().await?.ok_or(ChannelError::Closed)?;
            shared.log_wire("<<", &line);
            if line.trim().is_empty() {
                continue;
            }

            let frame = parse_server_line(&line)?;
            self.last_in_seq = frame.seq;
            match frame.body {
                ServerMessage::Welcome { protocol_version } => {
                    if !is_compatible_version(&protocol_version) {
                        return Err(ChannelError::Rejected {
                            code: ErrorCode::ProtocolMismatch,
                            message: format!("server speaks protocol {}", protocol_version),
                        });
                    }
                    return Ok(());
                }
                ServerMessage::Error { code, message } => {
                    return Err(ChannelError::Rejected { code, message })
                }
                other => debug!(?other, "ignoring message before welcome"),
            }
        }
    }

    async fn run(mut self, shared: &Shared, mut out_rx: mpsc::UnboundedReceiver<Outbound>) -> LinkEnd {
        loop {
            let step = tokio::select! {
                line = self.lines.next_line() => Step::Inbound(line),
                out = out_rx.recv() => Step::Outbound(out),
            };

            match step {
                Step::Inbound(Ok(Some(line))) => self.handle_line(shared, &line),
                Step::Inbound(Ok(None)) => {
                    return LinkEnd::Dropped("server closed the connection".to_string())
                }
                Step::Inbound(Err(e)) => return LinkEnd::Dropped(e.to_string()),
                Step::Outbound(Some(Outbound::Message(msg))) => {
                    let seq = self.next_seq();
                    debug!(seq, msg_type = msg.msg_type(), "sending");
                    if let Err(e) = self.write_frame(shared, &Frame::new(seq, msg)).await {
                        return LinkEnd::Dropped(e.to_string());
                    }
                }
                Step::Outbound(Some(Outbound::Close)) | Step::Outbound(None) => {
                    let _ = self.writer.shutdown().await;
                    return LinkEnd::Closed;
                }
            }
        }
    }

    fn handle_line(&mut self, shared: &Shared, line: &str) {
        shared.log_wire("<<", line);
        if line.trim().is_empty() {
            return;
        }

        let frame = match parse_server_line(line) {
            Ok(frame) => frame,
            Err(e) => {
                warn!(error = %e, "dropping malformed message");
                return;
            }
        };

        // Sequencing: only strictly increasing seq per connection.
        if frame.seq <= self.last_in_seq {
            debug!(
                seq = frame.seq,
                last = self.last_in_seq,
                "dropping duplicate or reordered message"
            );
            return;
        }
        self.last_in_seq = frame.seq;

        let seq = frame.seq;
        match frame.body {
            ServerMessage::Error { code, message } => {
                warn!(?code, %message, "server reported an error");
            }
            ServerMessage::Welcome { .. } => debug!(seq, "ignoring repeated welcome"),
            ServerMessage::Unknown => debug!(seq, "ignoring unknown message type"),
            body => {
                let Some(tag) = body.event_tag() else {
                    return;
                };
                if let Some(event) = body.into_session_event() {
                    shared.dispatch(InboundEvent { tag, seq, event });
                }
            }
        }
    }
}

async fn run_connection(shared: Arc<Shared>, token: String, generation: u64) {
    let policy = shared.config.reconnect;
    let mut failures: u32 = 0;

    loop {
        if !shared.is_current(generation) {
            debug!(generation, "connection task superseded");
            return;
        }
        match Link::open(&shared, &token).await {
            Ok(link) => {
                let (tx, rx) = mpsc::unbounded_channel();
                let Some(epoch) = shared.install_writer(generation, tx) else {
                    return;
                };
                failures = 0;
                info!(epoch, "connected");

                match link.run(&shared, rx).await {
                    LinkEnd::Closed => {
                        shared.clear_writer(generation);
                        debug!(epoch, "connection closed");
                        return;
                    }
                    LinkEnd::Dropped(reason) => {
                        shared.clear_writer(generation);
                        warn!(epoch, %reason, "connection dropped");
                    }
                }
            }
            Err(ChannelError::Rejected { code, message }) => {
                warn!(?code, %message, "connection rejected");
                shared.set_status(generation, ChannelStatus::Rejected { code, message });
                return;
            }
            Err(e) => {
                warn!(attempt = failures, error = %e, "connection attempt failed");
            }
        }

        failures += 1;
        if failures > policy.max_attempts {
            let attempts = failures - 1;
            warn!(attempts, "giving up on reconnecting");
            shared.set_status(generation, ChannelStatus::Exhausted { attempts });
            return;
        }

        let delay = policy.delay_for(failures);
        shared.set_status(generation, ChannelStatus::Connecting { attempt: failures });
        debug!(attempt = failures, ?delay, "reconnecting after backoff");
        tokio::time::sleep(delay).await;
    }
}
