//! Read-only per-card view for renderers.

use bingo_types::Card;
use serde::Serialize;

use crate::drawn::DrawnSet;
use crate::pattern::{self, MarkGrid, WinResult};

/// A card together with its marks and satisfied patterns for one drawn set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CardView {
    pub card: Card,
    pub marks: MarkGrid,
    pub wins: WinResult,
}

impl CardView {
    pub fn evaluate(card: &Card, drawn: &DrawnSet) -> Self {
        let marks = pattern::marked_cells(card, drawn);
        Self {
            card: card.clone(),
            wins: pattern::evaluate_marks(&marks),
            marks,
        }
    }

    pub fn has_won(&self) -> bool {
        self.wins.has_won()
    }

    /// Number of marked cells, FREE included.
    pub fn marked_count(&self) -> usize {
        self.marks.iter().flatten().filter(|&&m| m).count()
    }
}
