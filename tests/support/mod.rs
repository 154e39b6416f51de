//! Scripted stand-in for the authoritative server, plus mock collaborators.
//!
//! The server answers `hello` with `welcome` (or `error` for the token "bad"),
//! optionally replies to `join` with a snapshot, records every other client
//! message, and lets the test push events or cut connections.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use bingo_session::adapter::collaborators::{PurchaseRequest, PurchaseResponse};
use bingo_session::adapter::protocol::{
    encode_line, parse_client_line, ClientMessage, ErrorCode, Frame, ServerMessage,
    PROTOCOL_VERSION,
};
use bingo_session::adapter::{
    ClientConfig, Collaborators, LocalCardCatalog, PassthroughAuth, PurchaseService,
    ReconnectPolicy,
};
use bingo_session::core::SessionState;

pub const TIMEOUT: Duration = Duration::from_secs(5);

enum ServerCmd {
    Push(ServerMessage),
    PushWithSeq(u64, ServerMessage),
    Close,
}

struct ServerShared {
    /// Command senders of live connections, registered before `welcome` is sent.
    connections: Mutex<Vec<mpsc::UnboundedSender<ServerCmd>>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    accepted: AtomicUsize,
    /// Close new connections before the handshake.
    refusing: AtomicBool,
    snapshot_on_join: Mutex<Option<SessionState>>,
    intents_tx: mpsc::UnboundedSender<ClientMessage>,
}

pub struct ScriptedServer {
    addr: SocketAddr,
    accept_task: JoinHandle<()>,
    shared: Arc<ServerShared>,
    intents_rx: mpsc::UnboundedReceiver<ClientMessage>,
}

impl ScriptedServer {
    pub async fn start() -> Self {
        Self::start_inner(None).await
    }

    /// Reply to every `join` with `state`.
    pub async fn with_snapshot(state: SessionState) -> Self {
        Self::start_inner(Some(state)).await
    }

    async fn start_inner(snapshot: Option<SessionState>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (intents_tx, intents_rx) = mpsc::unbounded_channel();
        let shared = Arc::new(ServerShared {
            connections: Mutex::new(Vec::new()),
            tasks: Mutex::new(Vec::new()),
            accepted: AtomicUsize::new(0),
            refusing: AtomicBool::new(false),
            snapshot_on_join: Mutex::new(snapshot),
            intents_tx,
        });

        let accept_shared = Arc::clone(&shared);
        let accept_task = tokio::spawn(async move {
            while let Ok((socket, _)) = listener.accept().await {
                accept_shared.accepted.fetch_add(1, Ordering::SeqCst);
                if accept_shared.refusing.load(Ordering::SeqCst) {
                    drop(socket);
                    continue;
                }
                let (tx, rx) = mpsc::unbounded_channel();
                accept_shared.connections.lock().push(tx);
                let task = tokio::spawn(serve_client(socket, Arc::clone(&accept_shared), rx));
                accept_shared.tasks.lock().push(task);
            }
        });

        Self {
            addr,
            accept_task,
            shared,
            intents_rx,
        }
    }

    /// Client config pointed at this server with fast reconnects.
    pub fn config(&self) -> ClientConfig {
        ClientConfig::default()
            .with_server("127.0.0.1", self.addr.port())
            .with_reconnect(ReconnectPolicy {
                initial_delay: Duration::from_millis(10),
                max_delay: Duration::from_millis(50),
                max_attempts: 5,
            })
    }

    pub fn accepted(&self) -> usize {
        self.shared.accepted.load(Ordering::SeqCst)
    }

    /// Broadcast an event to every live connection.
    pub fn push(&self, message: ServerMessage) {
        for tx in self.shared.connections.lock().iter() {
            let _ = tx.send(ServerCmd::Push(message.clone()));
        }
    }

    /// Broadcast with an explicit `seq`, e.g. to replay or reorder.
    pub fn push_with_seq(&self, seq: u64, message: ServerMessage) {
        for tx in self.shared.connections.lock().iter() {
            let _ = tx.send(ServerCmd::PushWithSeq(seq, message.clone()));
        }
    }

    /// Close every open connection from the server side.
    pub fn drop_connections(&self) {
        for tx in self.shared.connections.lock().drain(..) {
            let _ = tx.send(ServerCmd::Close);
        }
    }

    /// While set, every new connection is closed before `welcome`, so
    /// clients keep failing until they give up.
    pub fn set_refusing(&self, refusing: bool) {
        self.shared.refusing.store(refusing, Ordering::SeqCst);
    }

    /// Next client message after the handshake.
    pub async fn next_intent(&mut self) -> ClientMessage {
        tokio::time::timeout(TIMEOUT, self.intents_rx.recv())
            .await
            .expect("no client message in time")
            .expect("server stopped")
    }

    /// Stop listening and kill every connection.
    pub async fn shutdown(self) {
        self.accept_task.abort();
        let _ = self.accept_task.await;
        self.shared.connections.lock().clear();
        for task in self.shared.tasks.lock().drain(..) {
            task.abort();
        }
    }
}

async fn serve_client(
    socket: TcpStream,
    shared: Arc<ServerShared>,
    mut rx: mpsc::UnboundedReceiver<ServerCmd>,
) {
    let (read_half, mut writer) = socket.into_split();
    let mut lines = BufReader::new(read_half).lines();
    let mut seq: u64 = 0;

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Ok(Some(line)) = line else { return };
                let Ok(frame) = parse_client_line(&line) else { continue };
                match frame.body {
                    ClientMessage::Hello { token, .. } => {
                        seq += 1;
                        let reply = if token == "bad" {
                            ServerMessage::Error {
                                code: ErrorCode::AuthFailed,
                                message: "invalid token".to_string(),
                            }
                        } else {
                            ServerMessage::Welcome {
                                protocol_version: PROTOCOL_VERSION.to_string(),
                            }
                        };
                        if write(&mut writer, seq, reply).await.is_err() {
                            return;
                        }
                    }
                    message => {
                        let is_join = matches!(message, ClientMessage::Join { .. });
                        let _ = shared.intents_tx.send(message);
                        let snapshot = shared.snapshot_on_join.lock().clone();
                        if let (true, Some(state)) = (is_join, snapshot) {
                            seq += 1;
                            if write(&mut writer, seq, ServerMessage::SessionSnapshot { state }).await.is_err() {
                                return;
                            }
                        }
                    }
                }
            }
            cmd = rx.recv() => {
                match cmd {
                    Some(ServerCmd::Push(message)) => {
                        seq += 1;
                        if write(&mut writer, seq, message).await.is_err() {
                            return;
                        }
                    }
                    Some(ServerCmd::PushWithSeq(explicit, message)) => {
                        seq = seq.max(explicit);
                        if write(&mut writer, explicit, message).await.is_err() {
                            return;
                        }
                    }
                    Some(ServerCmd::Close) | None => return,
                }
            }
        }
    }
}

async fn write(
    writer: &mut tokio::net::tcp::OwnedWriteHalf,
    seq: u64,
    message: ServerMessage,
) -> std::io::Result<()> {
    let line = encode_line(&Frame::new(seq, message)).expect("encodable message");
    writer.write_all(line.as_bytes()).await?;
    writer.flush().await
}

// ============== Mock Collaborators ==============

/// Approves every purchase; records requests.
#[derive(Default)]
pub struct RecordingPurchases {
    pub requests: Mutex<Vec<PurchaseRequest>>,
    pub decline: bool,
}

#[async_trait]
impl PurchaseService for RecordingPurchases {
    async fn purchase(&self, request: PurchaseRequest) -> anyhow::Result<PurchaseResponse> {
        self.requests.lock().push(request);
        Ok(PurchaseResponse {
            success: !self.decline,
            balance: None,
        })
    }
}

pub fn collaborators(purchases: Arc<RecordingPurchases>, seed: u32) -> Collaborators {
    Collaborators {
        auth: Arc::new(PassthroughAuth::default()),
        purchases,
        catalog: Arc::new(LocalCardCatalog::new(seed)),
    }
}
