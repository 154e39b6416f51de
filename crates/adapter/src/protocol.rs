//! Protocol module - JSON message types for the session event stream
//!
//! Line-delimited JSON: one message per line. Every message has `type`,
//! `seq` (per-connection sequence number) and `ts` (timestamp in ms); the
//! remaining fields depend on the type.

use serde::{Deserialize, Serialize};

use crate::types::{ChatMessage, Player, Winner};
use bingo_core::{SessionEvent, SessionState};

/// Version sent in `hello`. Servers with a different major version are refused.
pub const PROTOCOL_VERSION: &str = "1.0.0";

/// Envelope shared by every message on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Frame<T> {
    pub seq: u64,
    pub ts: u64,
    #[serde(flatten)]
    pub body: T,
}

impl<T> Frame<T> {
    pub fn new(seq: u64, body: T) -> Self {
        Self {
            seq,
            ts: current_timestamp_ms(),
            body,
        }
    }
}

// ============== Client -> Server Messages ==============

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientInfo {
    pub name: String,
    pub version: String,
}

impl Default for ClientInfo {
    fn default() -> Self {
        Self {
            name: env!("CARGO_PKG_NAME").to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ClientMessage {
    Hello {
        #[serde(rename = "protocol_version")]
        protocol_version: String,
        token: String,
        client: ClientInfo,
    },
    Join {
        session_id: String,
    },
    Leave {
        session_id: String,
    },
    DrawNumber {
        session_id: String,
    },
    Chat {
        session_id: String,
        message: String,
    },
    MarkNumber {
        session_id: String,
        card_id: String,
        number: u8,
    },
}

impl ClientMessage {
    pub fn msg_type(&self) -> &'static str {
        match self {
            ClientMessage::Hello { .. } => "hello",
            ClientMessage::Join { .. } => "join",
            ClientMessage::Leave { .. } => "leave",
            ClientMessage::DrawNumber { .. } => "drawNumber",
            ClientMessage::Chat { .. } => "chat",
            ClientMessage::MarkNumber { .. } => "markNumber",
        }
    }
}

/// Outbound session intents. Only accepted while the channel is connected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    Join {
        session_id: String,
    },
    Leave {
        session_id: String,
    },
    DrawNumber {
        session_id: String,
    },
    Chat {
        session_id: String,
        message: String,
    },
    MarkNumber {
        session_id: String,
        card_id: String,
        number: u8,
    },
}

impl From<Intent> for ClientMessage {
    fn from(intent: Intent) -> Self {
        match intent {
            Intent::Join { session_id } => ClientMessage::Join { session_id },
            Intent::Leave { session_id } => ClientMessage::Leave { session_id },
            Intent::DrawNumber { session_id } => ClientMessage::DrawNumber { session_id },
            Intent::Chat {
                session_id,
                message,
            } => ClientMessage::Chat {
                session_id,
                message,
            },
            Intent::MarkNumber {
                session_id,
                card_id,
                number,
            } => ClientMessage::MarkNumber {
                session_id,
                card_id,
                number,
            },
        }
    }
}

// ============== Server -> Client Messages ==============

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    AuthFailed,
    ProtocolMismatch,
    InvalidCommand,
    SessionNotFound,
    NotInSession,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ServerMessage {
    Welcome {
        #[serde(rename = "protocol_version")]
        protocol_version: String,
    },
    Error {
        code: ErrorCode,
        message: String,
    },
    SessionSnapshot {
        state: SessionState,
    },
    NumberDrawn {
        number: u8,
    },
    PlayerJoined {
        player: Player,
    },
    PlayerLeft {
        player_id: String,
    },
    Winner(Winner),
    Chat(ChatMessage),
    /// Any type this client does not know; ignored.
    #[serde(other)]
    Unknown,
}

/// Tag of an inbound session event, used for subscriptions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EventTag {
    SessionSnapshot,
    NumberDrawn,
    PlayerJoined,
    PlayerLeft,
    Winner,
    Chat,
}

impl EventTag {
    pub const ALL: [EventTag; 6] = [
        EventTag::SessionSnapshot,
        EventTag::NumberDrawn,
        EventTag::PlayerJoined,
        EventTag::PlayerLeft,
        EventTag::Winner,
        EventTag::Chat,
    ];
}

impl ServerMessage {
    /// Tag for session events; `None` for transport messages.
    pub fn event_tag(&self) -> Option<EventTag> {
        match self {
            ServerMessage::SessionSnapshot { .. } => Some(EventTag::SessionSnapshot),
            ServerMessage::NumberDrawn { .. } => Some(EventTag::NumberDrawn),
            ServerMessage::PlayerJoined { .. } => Some(EventTag::PlayerJoined),
            ServerMessage::PlayerLeft { .. } => Some(EventTag::PlayerLeft),
            ServerMessage::Winner(_) => Some(EventTag::Winner),
            ServerMessage::Chat(_) => Some(EventTag::Chat),
            ServerMessage::Welcome { .. } | ServerMessage::Error { .. } | ServerMessage::Unknown => {
                None
            }
        }
    }

    /// Convert a session event into the reducer's input.
    pub fn into_session_event(self) -> Option<SessionEvent> {
        match self {
            ServerMessage::SessionSnapshot { state } => Some(SessionEvent::Snapshot(state)),
            ServerMessage::NumberDrawn { number } => Some(SessionEvent::NumberDrawn(number)),
            ServerMessage::PlayerJoined { player } => Some(SessionEvent::PlayerJoined(player)),
            ServerMessage::PlayerLeft { player_id } => Some(SessionEvent::PlayerLeft(player_id)),
            ServerMessage::Winner(winner) => Some(SessionEvent::Winner(winner)),
            ServerMessage::Chat(message) => Some(SessionEvent::Chat(message)),
            ServerMessage::Welcome { .. } | ServerMessage::Error { .. } | ServerMessage::Unknown => {
                None
            }
        }
    }
}

// ============== Message Parsing ==============

/// Parse one inbound line.
pub fn parse_server_line(line: &str) -> Result<Frame<ServerMessage>, serde_json::Error> {
    serde_json::from_str(line.trim())
}

/// Parse one outbound line; used by test servers and the wire log reader.
pub fn parse_client_line(line: &str) -> Result<Frame<ClientMessage>, serde_json::Error> {
    serde_json::from_str(line.trim())
}

/// Encode a frame as a single line, newline included.
pub fn encode_line<T: Serialize>(frame: &Frame<T>) -> Result<String, serde_json::Error> {
    let mut line = serde_json::to_string(frame)?;
    line.push('\n');
    Ok(line)
}

/// Whether a peer's version shares our major version.
pub fn is_compatible_version(version: &str) -> bool {
    let major = |v: &str| v.split('.').next().map(str::to_string);
    major(version).is_some_and(|m| Some(m) == major(PROTOCOL_VERSION))
}

/// Create a hello message
pub fn create_hello(seq: u64, token: &str) -> Frame<ClientMessage> {
    Frame::new(
        seq,
        ClientMessage::Hello {
            protocol_version: PROTOCOL_VERSION.to_string(),
            token: token.to_string(),
            client: ClientInfo::default(),
        },
    )
}

/// Get current timestamp in milliseconds
pub fn current_timestamp_ms() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
