//! Drawn numbers for one session: append-only, draw order kept, no repeats.

use arrayvec::ArrayVec;
use bingo_types::{MAX_NUMBER, MIN_NUMBER};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DrawError {
    #[error("{0} is outside the 1-75 pool")]
    OutOfRange(u8),
    #[error("{0} was already drawn")]
    Duplicate(u8),
}

/// Ordered set of drawn numbers.
///
/// Serialized as a plain array in draw order; deserialization rejects
/// out-of-range and repeated numbers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<u8>", into = "Vec<u8>")]
pub struct DrawnSet {
    order: ArrayVec<u8, { MAX_NUMBER as usize }>,
    members: u128,
}

impl DrawnSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a number. The set is left unchanged on error.
    pub fn insert(&mut self, number: u8) -> Result<(), DrawError> {
        if !(MIN_NUMBER..=MAX_NUMBER).contains(&number) {
            return Err(DrawError::OutOfRange(number));
        }
        if self.contains(number) {
            return Err(DrawError::Duplicate(number));
        }
        self.members |= 1u128 << number;
        // Capacity equals the pool size, and every member is distinct.
        self.order.push(number);
        Ok(())
    }

    pub fn contains(&self, number: u8) -> bool {
        number <= MAX_NUMBER && self.members & (1u128 << number) != 0
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Most recent draw.
    pub fn last(&self) -> Option<u8> {
        self.order.last().copied()
    }

    /// Numbers in draw order.
    pub fn as_slice(&self) -> &[u8] {
        &self.order
    }

    pub fn iter(&self) -> impl Iterator<Item = u8> + '_ {
        self.order.iter().copied()
    }
}

impl TryFrom<Vec<u8>> for DrawnSet {
    type Error = DrawError;

    fn try_from(numbers: Vec<u8>) -> Result<Self, Self::Error> {
        Self::try_from(numbers.as_slice())
    }
}

impl TryFrom<&[u8]> for DrawnSet {
    type Error = DrawError;

    fn try_from(numbers: &[u8]) -> Result<Self, Self::Error> {
        let mut set = DrawnSet::new();
        for &n in numbers {
            set.insert(n)?;
        }
        Ok(set)
    }
}

impl From<DrawnSet> for Vec<u8> {
    fn from(set: DrawnSet) -> Self {
        set.order.to_vec()
    }
}
