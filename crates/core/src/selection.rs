//! Card selection - the player's in-progress basket before purchase
//!
//! Holds up to [`MAX_SELECTION`] unique cards in insertion order and keeps a
//! current [`PriceQuote`] that is recomputed after every successful mutation.

use arrayvec::ArrayVec;
use bingo_types::{Card, MAX_SELECTION};
use thiserror::Error;

use crate::pricing::{self, PriceQuote};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SelectionError {
    #[error("card {0} is already selected")]
    DuplicateCard(String),
    #[error("selection is full ({capacity} cards)")]
    CapacityExceeded { capacity: usize },
    #[error("selected {selected} of {requested} cards: {cause}")]
    PartialSelection {
        selected: usize,
        requested: usize,
        #[source]
        cause: Box<SelectionError>,
    },
}

#[derive(Debug, Clone, Default)]
pub struct SelectionManager {
    cards: ArrayVec<Card, MAX_SELECTION>,
    quote: PriceQuote,
}

impl SelectionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a card; rejects duplicates and a full selection without changing state.
    pub fn select(&mut self, card: Card) -> Result<PriceQuote, SelectionError> {
        if self.contains(card.id()) {
            return Err(SelectionError::DuplicateCard(card.id().to_string()));
        }
        if self.cards.try_push(card).is_err() {
            return Err(SelectionError::CapacityExceeded {
                capacity: MAX_SELECTION,
            });
        }
        Ok(self.reprice())
    }

    /// Remove a card by id. Unknown ids are ignored.
    pub fn deselect(&mut self, card_id: &str) -> PriceQuote {
        if let Some(pos) = self.cards.iter().position(|c| c.id() == card_id) {
            self.cards.remove(pos);
        }
        self.reprice()
    }

    pub fn clear(&mut self) -> PriceQuote {
        self.cards.clear();
        self.reprice()
    }

    /// Select cards in order, stopping at the first failure.
    ///
    /// Cards selected before the failure stay selected; the error reports how many.
    pub fn select_all(
        &mut self,
        cards: impl IntoIterator<Item = Card>,
    ) -> Result<PriceQuote, SelectionError> {
        let cards: Vec<Card> = cards.into_iter().collect();
        let requested = cards.len();
        for (selected, card) in cards.into_iter().enumerate() {
            if let Err(cause) = self.select(card) {
                return Err(SelectionError::PartialSelection {
                    selected,
                    requested,
                    cause: Box::new(cause),
                });
            }
        }
        Ok(self.quote)
    }

    /// Remove and return every card, leaving the selection empty.
    pub fn take_all(&mut self) -> Vec<Card> {
        let cards = self.cards.drain(..).collect();
        self.reprice();
        cards
    }

    pub fn contains(&self, card_id: &str) -> bool {
        self.cards.iter().any(|c| c.id() == card_id)
    }

    pub fn cards(&self) -> &[Card] {
        &self.cards
    }

    pub fn card_ids(&self) -> Vec<String> {
        self.cards.iter().map(|c| c.id().to_string()).collect()
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    pub fn remaining_capacity(&self) -> usize {
        MAX_SELECTION - self.cards.len()
    }

    /// Current price for the selection.
    pub fn quote(&self) -> PriceQuote {
        self.quote
    }

    fn reprice(&mut self) -> PriceQuote {
        self.quote = pricing::quote(self.cards.len());
        self.quote
    }
}
