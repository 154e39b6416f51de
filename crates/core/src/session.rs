//! Session state module - the local copy of one authoritative game
//!
//! The server pushes a full [`SessionState`] when a client joins; everything
//! after that arrives as [`SessionEvent`] diffs. [`SessionStore::apply`] is the
//! only way the state changes, and it never performs I/O: it reports what
//! happened as an [`EventOutcome`] and leaves logging and side effects to the
//! caller.

use bingo_types::{ChatMessage, Player, PlayerMap, SessionStatus, Winner};
use serde::{Deserialize, Serialize};

use crate::drawn::{DrawError, DrawnSet};

/// Full state of a session as delivered by `sessionSnapshot`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionState {
    #[serde(default)]
    pub status: SessionStatus,
    #[serde(default)]
    pub drawn_set: DrawnSet,
    #[serde(default)]
    pub players: PlayerMap,
    #[serde(default)]
    pub prize_pool: u64,
    /// Seconds remaining, as reported by the server.
    #[serde(default)]
    pub time_left: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub winner: Option<Winner>,
}

impl SessionState {
    pub fn is_finished(&self) -> bool {
        self.status == SessionStatus::Finished
    }

    pub fn host(&self) -> Option<&str> {
        self.players
            .iter()
            .find(|(_, p)| p.is_host)
            .map(|(id, _)| id.as_str())
    }
}

/// Inbound session events, already decoded from the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    Snapshot(SessionState),
    NumberDrawn(u8),
    PlayerJoined(Player),
    PlayerLeft(String),
    Winner(Winner),
    Chat(ChatMessage),
}

/// Result of applying one event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventOutcome {
    /// A snapshot replaced the local state.
    Baseline,
    Drawn(u8),
    /// The number was already in the drawn set; state unchanged.
    DuplicateDraw(u8),
    /// The number is outside 1-75; state unchanged.
    InvalidDraw(u8),
    PlayerJoined(String),
    PlayerLeft(String),
    /// `playerLeft` for an id not in the player map.
    UnknownPlayer(String),
    Finished(Winner),
    /// Chat does not change session state; it is handed back to the caller.
    Chat(ChatMessage),
    /// A diff arrived before any snapshot and was dropped.
    NoBaseline,
}

impl EventOutcome {
    /// Whether the drawn set may have changed.
    pub fn affects_draws(&self) -> bool {
        matches!(self, EventOutcome::Baseline | EventOutcome::Drawn(_))
    }
}

/// Holds the session baseline once the first snapshot arrives.
#[derive(Debug, Clone, Default)]
pub struct SessionStore {
    state: Option<SessionState>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> Option<&SessionState> {
        self.state.as_ref()
    }

    pub fn has_baseline(&self) -> bool {
        self.state.is_some()
    }

    /// Drop the local state.
    pub fn reset(&mut self) {
        self.state = None;
    }

    pub fn apply(&mut self, event: SessionEvent) -> EventOutcome {
        match event {
            SessionEvent::Snapshot(snapshot) => {
                self.state = Some(snapshot);
                EventOutcome::Baseline
            }
            SessionEvent::Chat(message) => EventOutcome::Chat(message),
            SessionEvent::NumberDrawn(number) => {
                self.with_baseline(|state| match state.drawn_set.insert(number) {
                    Ok(()) => {
                        if state.status == SessionStatus::Waiting {
                            state.status = SessionStatus::Active;
                        }
                        EventOutcome::Drawn(number)
                    }
                    Err(DrawError::Duplicate(n)) => EventOutcome::DuplicateDraw(n),
                    Err(DrawError::OutOfRange(n)) => EventOutcome::InvalidDraw(n),
                })
            }
            SessionEvent::PlayerJoined(player) => self.with_baseline(|state| {
                let (id, info) = player.into_entry();
                state.players.insert(id.clone(), info);
                EventOutcome::PlayerJoined(id)
            }),
            SessionEvent::PlayerLeft(id) => {
                self.with_baseline(|state| match state.players.remove(&id) {
                    Some(_) => EventOutcome::PlayerLeft(id),
                    None => EventOutcome::UnknownPlayer(id),
                })
            }
            SessionEvent::Winner(winner) => self.with_baseline(|state| {
                state.winner = Some(winner.clone());
                state.status = SessionStatus::Finished;
                EventOutcome::Finished(winner)
            }),
        }
    }

    fn with_baseline(
        &mut self,
        diff: impl FnOnce(&mut SessionState) -> EventOutcome,
    ) -> EventOutcome {
        match self.state.as_mut() {
            Some(state) => diff(state),
            None => EventOutcome::NoBaseline,
        }
    }
}
