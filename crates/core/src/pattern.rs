//! Pattern evaluation - which lines of a card are complete
//!
//! A cell is marked when it is FREE or its number is in the drawn set. Rows,
//! columns and both diagonals are checked independently; a card has won when
//! at least one line is complete.
//!
//! Evaluation is pure: the same card and drawn set always give the same
//! [`WinResult`], so it is safe to re-run on every draw.

use std::collections::BTreeSet;

use bingo_types::{Card, Cell, PatternTag, GRID_SIZE};
use serde::{Deserialize, Serialize};

use crate::drawn::DrawnSet;

/// 5x5 mark mask, row-major.
pub type MarkGrid = [[bool; GRID_SIZE]; GRID_SIZE];

/// Set of satisfied patterns for one card.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WinResult {
    patterns: BTreeSet<PatternTag>,
}

impl WinResult {
    pub fn has_won(&self) -> bool {
        !self.patterns.is_empty()
    }

    pub fn contains(&self, tag: PatternTag) -> bool {
        self.patterns.contains(&tag)
    }

    pub fn patterns(&self) -> &BTreeSet<PatternTag> {
        &self.patterns
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Patterns present here but not in `previous`.
    pub fn newly_completed<'a>(
        &'a self,
        previous: &'a WinResult,
    ) -> impl Iterator<Item = PatternTag> + 'a {
        self.patterns.difference(&previous.patterns).copied()
    }
}

impl FromIterator<PatternTag> for WinResult {
    fn from_iter<I: IntoIterator<Item = PatternTag>>(iter: I) -> Self {
        Self {
            patterns: iter.into_iter().collect(),
        }
    }
}

#[inline]
pub fn is_marked(cell: Cell, drawn: &DrawnSet) -> bool {
    match cell {
        Cell::Free => true,
        Cell::Number(n) => drawn.contains(n),
    }
}

/// Mark mask for rendering.
pub fn marked_cells(card: &Card, drawn: &DrawnSet) -> MarkGrid {
    let numbers = card.numbers();
    std::array::from_fn(|row| std::array::from_fn(|col| is_marked(numbers[row][col], drawn)))
}

/// Evaluate every winning line of `card` against `drawn`.
pub fn evaluate(card: &Card, drawn: &DrawnSet) -> WinResult {
    evaluate_marks(&marked_cells(card, drawn))
}

/// Evaluate a precomputed mark mask.
pub fn evaluate_marks(marks: &MarkGrid) -> WinResult {
    let mut patterns = BTreeSet::new();

    for i in 0..GRID_SIZE {
        if marks[i].iter().all(|&m| m) {
            patterns.insert(PatternTag::Row(i as u8));
        }
        if marks.iter().all(|row| row[i]) {
            patterns.insert(PatternTag::Column(i as u8));
        }
    }

    if (0..GRID_SIZE).all(|i| marks[i][i]) {
        patterns.insert(PatternTag::Diagonal1);
    }
    if (0..GRID_SIZE).all(|i| marks[i][GRID_SIZE - 1 - i]) {
        patterns.insert(PatternTag::Diagonal2);
    }

    WinResult { patterns }
}

/// How many more draws a card needs for its closest line.
pub fn numbers_to_win(card: &Card, drawn: &DrawnSet) -> usize {
    fn missing(cells: impl Iterator<Item = bool>) -> usize {
        cells.filter(|&m| !m).count()
    }

    let marks = marked_cells(card, drawn);
    let mut best = GRID_SIZE;
    for i in 0..GRID_SIZE {
        best = best.min(missing(marks[i].iter().copied()));
        best = best.min(missing(marks.iter().map(|row| row[i])));
    }
    best = best.min(missing((0..GRID_SIZE).map(|i| marks[i][i])));
    best.min(missing((0..GRID_SIZE).map(|i| marks[i][GRID_SIZE - 1 - i])))
}

#[cfg(test)]
mod tests {
    use super::*;
    use bingo_types::Cell::{Free, Number as N};

    fn sample_card() -> Card {
        Card::new(
            "CARD_1",
            [
                [N(5), N(20), N(35), N(50), N(65)],
                [N(1), N(16), N(31), N(46), N(61)],
                [N(2), N(17), Free, N(47), N(62)],
                [N(3), N(18), N(33), N(48), N(63)],
                [N(4), N(19), N(34), N(49), N(64)],
            ],
        )
    }

    fn drawn(numbers: &[u8]) -> DrawnSet {
        DrawnSet::try_from(numbers).unwrap()
    }

    #[test]
    fn empty_draw_has_no_wins() {
        let result = evaluate(&sample_card(), &DrawnSet::new());
        assert!(!result.has_won());
    }

    #[test]
    fn free_cell_counts_for_center_lines() {
        let result = evaluate(&sample_card(), &drawn(&[2, 17, 47, 62]));
        assert_eq!(result, [PatternTag::Row(2)].into_iter().collect());

        let result = evaluate(&sample_card(), &drawn(&[5, 16, 48, 64]));
        assert!(result.contains(PatternTag::Diagonal1));

        let result = evaluate(&sample_card(), &drawn(&[65, 46, 18, 4]));
        assert!(result.contains(PatternTag::Diagonal2));
    }

    #[test]
    fn numbers_to_win_counts_closest_line() {
        let card = sample_card();
        // Diagonals and the center row/column start one cell ahead.
        assert_eq!(numbers_to_win(&card, &DrawnSet::new()), 4);
        assert_eq!(numbers_to_win(&card, &drawn(&[2, 17, 47])), 1);
        assert_eq!(numbers_to_win(&card, &drawn(&[2, 17, 47, 62])), 0);
    }

    #[test]
    fn newly_completed_reports_difference() {
        let card = sample_card();
        let before = evaluate(&card, &drawn(&[5, 20, 35, 50, 65]));
        let after = evaluate(&card, &drawn(&[5, 20, 35, 50, 65, 1, 2, 3, 4]));
        let new: Vec<PatternTag> = after.newly_completed(&before).collect();
        assert_eq!(new, vec![PatternTag::Column(0)]);
    }

    #[test]
    fn serializes_as_tag_list() {
        let result = evaluate(&sample_card(), &drawn(&[5, 20, 35, 50, 65]));
        assert_eq!(serde_json::to_string(&result).unwrap(), r#"["row-0"]"#);
    }
}
