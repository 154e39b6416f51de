//! Card generation and validation
//!
//! Each column draws 5 distinct numbers from its 15-value band by rejection
//! sampling, the grid is assembled row-major, and the center becomes FREE.
//! Card ids come from a monotonic counter so ids never collide within a
//! catalog, independent of the number layout.

use bingo_types::{column_band, Card, Cell, Grid, BAND_WIDTH, FREE_INDEX, GRID_SIZE};
use thiserror::Error;

use crate::rng::SimpleRng;

/// Default id prefix, matching the `CARD_<n>` ids of the card catalog.
pub const DEFAULT_ID_PREFIX: &str = "CARD_";

/// Why a card failed validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CardError {
    #[error("card {card_id}: cell [{row}][{column}] must be FREE")]
    MissingFree { card_id: String, row: usize, column: usize },
    #[error("card {card_id}: FREE is only allowed in the center, found at [{row}][{column}]")]
    MisplacedFree { card_id: String, row: usize, column: usize },
    #[error("card {card_id}: {number} at [{row}][{column}] is outside its column band")]
    OutOfBand {
        card_id: String,
        row: usize,
        column: usize,
        number: u8,
    },
    #[error("card {card_id}: {number} appears more than once")]
    DuplicateNumber { card_id: String, number: u8 },
}

/// Check a card received from outside the generator.
pub fn validate_card(card: &Card) -> Result<(), CardError> {
    let card_id = || card.id().to_string();
    let mut seen: u128 = 0;

    for (row, cells) in card.numbers().iter().enumerate() {
        for (column, cell) in cells.iter().enumerate() {
            let is_center = row == FREE_INDEX && column == FREE_INDEX;
            match *cell {
                Cell::Free if is_center => {}
                Cell::Free => {
                    return Err(CardError::MisplacedFree {
                        card_id: card_id(),
                        row,
                        column,
                    })
                }
                Cell::Number(_) if is_center => {
                    return Err(CardError::MissingFree {
                        card_id: card_id(),
                        row,
                        column,
                    })
                }
                Cell::Number(number) => {
                    if !column_band(column).contains(&number) {
                        return Err(CardError::OutOfBand {
                            card_id: card_id(),
                            row,
                            column,
                            number,
                        });
                    }
                    let bit = 1u128 << number;
                    if seen & bit != 0 {
                        return Err(CardError::DuplicateNumber {
                            card_id: card_id(),
                            number,
                        });
                    }
                    seen |= bit;
                }
            }
        }
    }

    Ok(())
}

/// Produces valid cards with catalog-unique ids.
#[derive(Debug, Clone)]
pub struct CardGenerator {
    rng: SimpleRng,
    prefix: String,
    next_id: u64,
}

impl CardGenerator {
    /// Create a generator with the given RNG seed
    pub fn new(seed: u32) -> Self {
        Self::with_rng(SimpleRng::new(seed))
    }

    pub fn with_rng(rng: SimpleRng) -> Self {
        Self {
            rng,
            prefix: DEFAULT_ID_PREFIX.to_string(),
            next_id: 1,
        }
    }

    /// Use a different id prefix (e.g. one per catalog shard).
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Number of cards issued so far.
    pub fn issued(&self) -> u64 {
        self.next_id - 1
    }

    /// Generate one card.
    pub fn generate(&mut self) -> Card {
        let columns: [[u8; GRID_SIZE]; GRID_SIZE] =
            std::array::from_fn(|c| self.draw_column(c));

        let mut numbers: Grid =
            std::array::from_fn(|row| std::array::from_fn(|c| Cell::Number(columns[c][row])));
        numbers[FREE_INDEX][FREE_INDEX] = Cell::Free;

        let id = format!("{}{}", self.prefix, self.next_id);
        self.next_id += 1;
        Card::new(id, numbers)
    }

    pub fn generate_many(&mut self, count: usize) -> Vec<Card> {
        (0..count).map(|_| self.generate()).collect()
    }

    /// Draw 5 distinct values from a column band, in draw order.
    fn draw_column(&mut self, column: usize) -> [u8; GRID_SIZE] {
        let start = *column_band(column).start();
        let mut out = [0u8; GRID_SIZE];
        let mut taken: u16 = 0;
        let mut filled = 0usize;

        while filled < GRID_SIZE {
            let offset = self.rng.next_range(BAND_WIDTH as u32) as u8;
            let bit = 1u16 << offset;
            if taken & bit != 0 {
                continue;
            }
            taken |= bit;
            out[filled] = start + offset;
            filled += 1;
        }

        out
    }
}

impl Default for CardGenerator {
    fn default() -> Self {
        Self::with_rng(SimpleRng::from_clock())
    }
}

impl Iterator for CardGenerator {
    type Item = Card;

    fn next(&mut self) -> Option<Card> {
        Some(self.generate())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn generated_cards_validate() {
        let mut gen = CardGenerator::new(42);
        for card in gen.generate_many(500) {
            validate_card(&card).unwrap();
        }
    }

    #[test]
    fn ids_are_sequential_and_unique() {
        let mut gen = CardGenerator::new(3);
        let ids: Vec<String> = gen.generate_many(400).iter().map(|c| c.id().to_string()).collect();
        assert_eq!(ids[0], "CARD_1");
        assert_eq!(ids[399], "CARD_400");
        let unique: HashSet<&String> = ids.iter().collect();
        assert_eq!(unique.len(), 400);
        assert_eq!(gen.issued(), 400);
    }

    #[test]
    fn same_seed_same_catalog() {
        let a = CardGenerator::new(9).generate_many(20);
        let b = CardGenerator::new(9).generate_many(20);
        assert_eq!(a, b);
    }

    #[test]
    fn prefix_is_applied() {
        let mut gen = CardGenerator::new(1).with_prefix("ROOM7-");
        assert_eq!(gen.generate().id(), "ROOM7-1");
    }

    #[test]
    fn validate_rejects_duplicates_and_bands() {
        let mut gen = CardGenerator::new(5);
        let card = gen.generate();

        let mut grid = *card.numbers();
        grid[1][0] = grid[0][0];
        let dup = Card::new("dup", grid);
        assert!(matches!(
            validate_card(&dup),
            Err(CardError::DuplicateNumber { .. })
        ));

        let mut grid = *card.numbers();
        grid[0][0] = Cell::Number(16);
        let out_of_band = Card::new("band", grid);
        assert!(matches!(
            validate_card(&out_of_band),
            Err(CardError::OutOfBand { number: 16, .. })
        ));

        let mut grid = *card.numbers();
        grid[2][2] = Cell::Number(40);
        assert!(matches!(
            validate_card(&Card::new("nofree", grid)),
            Err(CardError::MissingFree { .. })
        ));

        let mut grid = *card.numbers();
        grid[0][4] = Cell::Free;
        assert!(matches!(
            validate_card(&Card::new("twofree", grid)),
            Err(CardError::MisplacedFree { row: 0, column: 4, .. })
        ));
    }
}
