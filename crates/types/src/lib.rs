//! Core types module - shared data structures and constants
//!
//! This module defines the fundamental types used throughout the session core.
//! Types are plain data with serde derives so the same values travel through
//! the card generator, the pattern evaluator, the wire protocol and the local cache.
//!
//! # Card Layout
//!
//! A BINGO card is a 5x5 grid stored row-major. Column `c` draws its numbers
//! from a fixed 15-value band:
//!
//! | Column | Letter | Band |
//! |--------|--------|------|
//! | 0 | B | 1-15 |
//! | 1 | I | 16-30 |
//! | 2 | N | 31-45 |
//! | 3 | G | 46-60 |
//! | 4 | O | 61-75 |
//!
//! The center cell `[2][2]` is always [`Cell::Free`] and always counts as marked.
//!
//! # Pricing Tiers
//!
//! | Cards | Total | Discount |
//! |-------|-------|----------|
//! | 0 | 0 | 0% |
//! | 1-2 | count x 10 | 0% |
//! | 3-4 | 27 | 10% |
//! | 5-9 | 40 | 20% |
//! | 10-20 | 75 | 25% |
//!
//! # Examples
//!
//! ```
//! use bingo_types::{column_band, Cell, PatternTag, GRID_SIZE};
//!
//! assert_eq!(column_band(0), 1..=15);
//! assert_eq!(column_band(4), 61..=75);
//!
//! let tag: PatternTag = "col-3".parse().unwrap();
//! assert_eq!(tag, PatternTag::Column(3));
//! assert_eq!(tag.to_string(), "col-3");
//!
//! assert!(Cell::Free.is_free());
//! assert_eq!(GRID_SIZE, 5);
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::ops::RangeInclusive;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Cards are 5x5.
pub const GRID_SIZE: usize = 5;

/// Row/column index of the FREE center cell.
pub const FREE_INDEX: usize = 2;

/// Smallest number the caller can draw.
pub const MIN_NUMBER: u8 = 1;

/// Largest number the caller can draw.
pub const MAX_NUMBER: u8 = 75;

/// Width of each column band (15 numbers).
pub const BAND_WIDTH: u8 = 15;

/// Column letters, indexed by column.
pub const COLUMN_LETTERS: [char; GRID_SIZE] = ['B', 'I', 'N', 'G', 'O'];

/// Maximum number of cards a selection may hold.
pub const MAX_SELECTION: usize = 20;

/// Undiscounted price of one card, in coins.
pub const UNIT_PRICE: u32 = 10;

/// Chat messages kept in memory per session.
pub const CHAT_LOG_LIMIT: usize = 50;

/// One discounted pricing bracket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PriceTier {
    /// Smallest card count that qualifies for the tier.
    pub min_count: usize,
    pub total_price: u32,
    pub discount_percent: u8,
}

/// Discount brackets, ordered highest threshold first.
pub const PRICE_TIERS: [PriceTier; 3] = [
    PriceTier {
        min_count: 10,
        total_price: 75,
        discount_percent: 25,
    },
    PriceTier {
        min_count: 5,
        total_price: 40,
        discount_percent: 20,
    },
    PriceTier {
        min_count: 3,
        total_price: 27,
        discount_percent: 10,
    },
];

/// Inclusive number band for a column (0 = B .. 4 = O).
pub fn column_band(column: usize) -> RangeInclusive<u8> {
    let start = MIN_NUMBER + (column as u8) * BAND_WIDTH;
    start..=start + BAND_WIDTH - 1
}

/// Column a drawn number belongs to, if it is in range.
pub fn column_for_number(number: u8) -> Option<usize> {
    if (MIN_NUMBER..=MAX_NUMBER).contains(&number) {
        Some(((number - MIN_NUMBER) / BAND_WIDTH) as usize)
    } else {
        None
    }
}

/// Caller-style label for a number, e.g. `B-5` or `O-72`.
pub fn call_label(number: u8) -> Option<String> {
    column_for_number(number).map(|c| format!("{}-{}", COLUMN_LETTERS[c], number))
}


/// One cell of a card grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Cell {
    Number(u8),
    /// The center cell; always marked.
    Free,
}

impl Cell {
    pub fn is_free(self) -> bool {
        matches!(self, Cell::Free)
    }

    pub fn number(self) -> Option<u8> {
        match self {
            Cell::Number(n) => Some(n),
            Cell::Free => None,
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Number(n) => write!(f, "{}", n),
            Cell::Free => f.write_str("FREE"),
        }
    }
}

impl Serialize for Cell {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        match self {
            Cell::Number(n) => serializer.serialize_u8(*n),
            Cell::Free => serializer.serialize_str("FREE"),
        }
    }
}

impl<'de> Deserialize<'de> for Cell {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        struct V;
        impl<'de> serde::de::Visitor<'de> for V {
            type Value = Cell;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                write!(f, "a number between 1 and 75 or \"FREE\"")
            }

            fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                u8::try_from(v)
                    .map(Cell::Number)
                    .map_err(|_| E::custom("cell number out of range"))
            }

            fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                u8::try_from(v)
                    .map(Cell::Number)
                    .map_err(|_| E::custom("cell number out of range"))
            }

            fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                if v == "FREE" {
                    Ok(Cell::Free)
                } else {
                    Err(E::custom("invalid cell value"))
                }
            }
        }

        deserializer.deserialize_any(V)
    }
}

/// Row-major 5x5 grid.
pub type Grid = [[Cell; GRID_SIZE]; GRID_SIZE];

/// A BINGO card. Immutable once generated.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Card {
    id: String,
    numbers: Grid,
}

impl Card {
    pub fn new(id: impl Into<String>, numbers: Grid) -> Self {
        Self {
            id: id.into(),
            numbers,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn numbers(&self) -> &Grid {
        &self.numbers
    }

    pub fn cell(&self, row: usize, column: usize) -> Option<Cell> {
        self.numbers.get(row).and_then(|r| r.get(column)).copied()
    }

    /// Whether `number` appears anywhere on the card.
    pub fn contains(&self, number: u8) -> bool {
        self.numbers
            .iter()
            .flatten()
            .any(|c| *c == Cell::Number(number))
    }
}

/// A satisfied winning line.
///
/// Ordering is derived so tag sets compare independently of discovery order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PatternTag {
    Row(u8),
    Column(u8),
    /// Top-left to bottom-right.
    Diagonal1,
    /// Top-right to bottom-left.
    Diagonal2,
}

impl fmt::Display for PatternTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PatternTag::Row(i) => write!(f, "row-{}", i),
            PatternTag::Column(j) => write!(f, "col-{}", j),
            PatternTag::Diagonal1 => f.write_str("diagonal-1"),
            PatternTag::Diagonal2 => f.write_str("diagonal-2"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParsePatternError;

impl fmt::Display for ParsePatternError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("unknown pattern tag")
    }
}

impl std::error::Error for ParsePatternError {}

impl FromStr for PatternTag {
    type Err = ParsePatternError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let index = |rest: &str| -> Result<u8, ParsePatternError> {
            let i: u8 = rest.parse().map_err(|_| ParsePatternError)?;
            if (i as usize) < GRID_SIZE {
                Ok(i)
            } else {
                Err(ParsePatternError)
            }
        };

        if s == "diagonal-1" {
            Ok(PatternTag::Diagonal1)
        } else if s == "diagonal-2" {
            Ok(PatternTag::Diagonal2)
        } else if let Some(rest) = s.strip_prefix("row-") {
            index(rest).map(PatternTag::Row)
        } else if let Some(rest) = s.strip_prefix("col-") {
            index(rest).map(PatternTag::Column)
        } else {
            Err(ParsePatternError)
        }
    }
}

impl Serialize for PatternTag {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for PatternTag {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = <std::borrow::Cow<'de, str>>::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Lifecycle of a session as reported by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    #[default]
    Waiting,
    Active,
    Finished,
}

/// Per-player data held in the session's player map.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerInfo {
    pub name: String,
    #[serde(default)]
    pub owned_card_count: u32,
    #[serde(default)]
    pub is_host: bool,
}

/// Player record as carried by `playerJoined`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Player {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub owned_card_count: u32,
    #[serde(default)]
    pub is_host: bool,
}

impl Player {
    pub fn into_entry(self) -> (String, PlayerInfo) {
        (
            self.id,
            PlayerInfo {
                name: self.name,
                owned_card_count: self.owned_card_count,
                is_host: self.is_host,
            },
        )
    }
}

/// Player id to player info.
pub type PlayerMap = BTreeMap<String, PlayerInfo>;

/// Terminal result of a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Winner {
    pub player_id: String,
    /// Pattern name as announced by the server, usually a [`PatternTag`].
    pub pattern: String,
    pub prize: u64,
}

impl Winner {
    pub fn pattern_tag(&self) -> Option<PatternTag> {
        self.pattern.parse().ok()
    }
}

/// A chat line received from the session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub sender: String,
    pub text: String,
}
