//! Pricing module - tiered bundle pricing for card purchases
//!
//! Compatibility note:
//! Tiers are checked highest threshold first, so a count sitting on a boundary
//! takes the bigger discount. Bundle presets are priced through the same table;
//! they do not carry prices of their own.

use bingo_types::{PriceTier, MAX_SELECTION, PRICE_TIERS, UNIT_PRICE};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PricingError {
    #[error("cannot price {count} cards (allowed 0-{max})")]
    OutOfRange { count: usize, max: usize },
}

/// Price for a given number of cards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PriceQuote {
    pub count: usize,
    pub total_price: u32,
    pub discount_percent: u8,
}

impl PriceQuote {
    /// Price without any discount.
    pub fn full_price(&self) -> u32 {
        self.count as u32 * UNIT_PRICE
    }

    /// Coins saved against the undiscounted price.
    pub fn savings(&self) -> u32 {
        self.full_price().saturating_sub(self.total_price)
    }

    /// Effective per-card price; 0 for an empty selection.
    pub fn unit_price_equivalent(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.total_price as f64 / self.count as f64
        }
    }
}

/// Price `count` cards. Counts above the selection capacity are rejected.
pub fn price_for(count: usize) -> Result<PriceQuote, PricingError> {
    if count > MAX_SELECTION {
        return Err(PricingError::OutOfRange {
            count,
            max: MAX_SELECTION,
        });
    }
    Ok(quote(count))
}

/// Tier lookup without the range check; callers guarantee `count <= MAX_SELECTION`.
pub(crate) fn quote(count: usize) -> PriceQuote {
    match tier_for(count) {
        Some(tier) => PriceQuote {
            count,
            total_price: tier.total_price,
            discount_percent: tier.discount_percent,
        },
        None => PriceQuote {
            count,
            total_price: count as u32 * UNIT_PRICE,
            discount_percent: 0,
        },
    }
}

/// Discount bracket for a count, if any.
pub fn tier_for(count: usize) -> Option<&'static PriceTier> {
    PRICE_TIERS.iter().find(|t| count >= t.min_count)
}

/// A quick-select bundle offered to players.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bundle {
    pub id: &'static str,
    pub name: &'static str,
    pub count: usize,
}

impl Bundle {
    pub fn quote(&self) -> Result<PriceQuote, PricingError> {
        price_for(self.count)
    }
}

pub const BUNDLE_PRESETS: [Bundle; 4] = [
    Bundle {
        id: "beginner",
        name: "Beginner Pack",
        count: 3,
    },
    Bundle {
        id: "regular",
        name: "Regular Pack",
        count: 5,
    },
    Bundle {
        id: "pro",
        name: "Pro Pack",
        count: 10,
    },
    Bundle {
        id: "mega",
        name: "Mega Pack",
        count: 20,
    },
];

pub fn bundle(id: &str) -> Option<&'static Bundle> {
    BUNDLE_PRESETS.iter().find(|b| b.id == id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_values() {
        let expect = |count, total, discount| {
            let q = price_for(count).unwrap();
            assert_eq!((q.total_price, q.discount_percent), (total, discount), "count {}", count);
        };
        expect(0, 0, 0);
        expect(1, 10, 0);
        expect(2, 20, 0);
        expect(3, 27, 10);
        expect(4, 27, 10);
        expect(5, 40, 20);
        expect(9, 40, 20);
        expect(10, 75, 25);
        expect(20, 75, 25);
    }

    #[test]
    fn out_of_range_is_rejected() {
        assert_eq!(
            price_for(21),
            Err(PricingError::OutOfRange { count: 21, max: 20 })
        );
    }

    #[test]
    fn mega_bundle_uses_table_cap() {
        let q = bundle("mega").unwrap().quote().unwrap();
        assert_eq!(q.total_price, 75);
        assert_eq!(q.discount_percent, 25);
        assert_eq!(q.savings(), 125);
    }

    #[test]
    fn presets_are_valid_inputs() {
        for b in BUNDLE_PRESETS {
            assert!(b.quote().is_ok(), "{} must be priceable", b.id);
        }
    }

    #[test]
    fn unit_price_equivalent() {
        assert_eq!(price_for(0).unwrap().unit_price_equivalent(), 0.0);
        assert_eq!(price_for(5).unwrap().unit_price_equivalent(), 8.0);
    }
}
