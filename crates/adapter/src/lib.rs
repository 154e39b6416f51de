//! Adapter crate - the networked side of a BINGO session
//!
//! This crate connects the pure session core to the authoritative game server
//! and to the external services a client needs (authentication, purchases, a
//! card catalog).
//!
//! # Protocol Overview
//!
//! The channel speaks a **line-delimited JSON protocol** over TCP:
//!
//! 1. **Connection**: client connects to the server (default: 127.0.0.1:7788)
//! 2. **Handshake**: client sends `hello` with its token, server answers `welcome` or `error`
//! 3. **Join**: client sends `join`; server replies with a full `sessionSnapshot`
//! 4. **Streaming**: server pushes `numberDrawn`, `playerJoined`, `playerLeft`, `winner`, `chat`
//! 5. **Intents**: client sends `drawNumber`, `chat`, `markNumber`, `leave`
//!
//! Every message carries `type`, `seq` and `ts`. Inbound messages whose `seq`
//! is not greater than the last accepted one are dropped.
//!
//! # Message Types
//!
//! ## Client → Server
//!
//! - **hello**: handshake with protocol version and token
//! - **join** / **leave**: enter or exit a session
//! - **drawNumber**: ask the caller to draw (host only, enforced by the server)
//! - **chat**: send a chat line
//! - **markNumber**: report a manual mark on an owned card
//!
//! ## Server → Client
//!
//! - **welcome**: handshake accepted
//! - **error**: handshake rejected or a request failed
//! - **sessionSnapshot**: full session state
//! - **numberDrawn**, **playerJoined**, **playerLeft**, **winner**, **chat**: diffs
//!
//! # Environment Variables
//!
//! - `BINGO_SERVER_HOST`: server address (default: "127.0.0.1")
//! - `BINGO_SERVER_PORT`: port number (default: 7788)
//! - `BINGO_RECONNECT_INITIAL_MS`: first backoff delay (default: 1000)
//! - `BINGO_RECONNECT_MAX_MS`: backoff cap (default: 5000)
//! - `BINGO_MAX_RECONNECT_ATTEMPTS`: retries before giving up (default: 5)
//! - `BINGO_HANDSHAKE_TIMEOUT_MS`: wait for `welcome` (default: 5000)
//! - `BINGO_WIRE_LOG_PATH`: append every line sent and received to this file
//! - `BINGO_CACHE_PATH`: local cache file
//!
//! # Example Protocol Flow
//!
//! ```text
//! Client -> Server: {"seq":1,"ts":1700000000000,"type":"hello","protocol_version":"1.0.0","token":"abc","client":{"name":"bingo-adapter","version":"0.1.0"}}
//! Server -> Client: {"seq":1,"ts":1700000000001,"type":"welcome","protocol_version":"1.0.0"}
//! Client -> Server: {"seq":2,"ts":1700000000002,"type":"join","sessionId":"s1"}
//! Server -> Client: {"seq":2,"ts":1700000000003,"type":"sessionSnapshot","state":{"status":"waiting","drawnSet":[],"players":{},"prizePool":0,"timeLeft":60}}
//! Server -> Client: {"seq":3,"ts":1700000000950,"type":"numberDrawn","number":17}
//! ```
//!
//! # Implementation
//!
//! - Uses **tokio** for async networking; one spawned task per channel
//! - See [`protocol`] for message definitions
//! - See [`channel`] for connection, reconnection and dispatch
//! - See [`controller`] for the session orchestrator

pub mod cache;
pub mod channel;
pub mod collaborators;
pub mod config;
pub mod controller;
pub mod error;
pub mod protocol;

pub use bingo_core as core;
pub use bingo_types as types;

pub use cache::LocalCache;
pub use channel::{ChannelStatus, InboundEvent, SessionChannel, Subscription};
pub use collaborators::{
    AuthService, CardCatalog, LocalCardCatalog, OfflinePurchases, PassthroughAuth, PurchaseService,
    UserProfile,
};
pub use config::{ClientConfig, ReconnectPolicy};
pub use controller::{
    Capabilities, Collaborators, ControllerSnapshot, Feedback, GameSessionController,
    PurchaseReceipt,
};
pub use error::{ChannelError, SessionError};
pub use protocol::{EventTag, Intent};
