//! Core session logic - pure, deterministic, and testable
//!
//! This crate holds every rule of a BINGO session that can be decided without
//! a network: card generation, pattern evaluation, pricing, the player's card
//! selection and the session state reducer. It has **no dependencies** on
//! networking or I/O, which keeps it:
//!
//! - **Deterministic**: the same seed produces the same catalog of cards
//! - **Testable**: every rule is a plain function or a `&mut self` method
//! - **Portable**: usable from the async adapter, the CLI, or a benchmark
//!
//! # Module Structure
//!
//! - [`rng`]: LCG used for card generation
//! - [`card`]: [`CardGenerator`] and [`validate_card`] for cards from remote catalogs
//! - [`drawn`]: [`DrawnSet`], the append-only list of called numbers
//! - [`pattern`]: line evaluation producing a [`WinResult`]
//! - [`pricing`]: tiered pricing and bundle presets
//! - [`selection`]: the in-progress card basket with capacity and duplicate rules
//! - [`session`]: [`SessionState`] and the [`SessionStore`] reducer
//! - [`snapshot`]: [`CardView`] for renderers
//!
//! # Example
//!
//! ```
//! use bingo_core::{evaluate, CardGenerator, DrawnSet, SelectionManager};
//!
//! let mut generator = CardGenerator::new(12345);
//! let mut selection = SelectionManager::new();
//! for card in generator.generate_many(3) {
//!     selection.select(card).unwrap();
//! }
//! assert_eq!(selection.quote().total_price, 27);
//!
//! let card = &selection.cards()[0];
//! let result = evaluate(card, &DrawnSet::new());
//! assert!(!result.has_won());
//! ```

pub mod card;
pub mod drawn;
pub mod pattern;
pub mod pricing;
pub mod rng;
pub mod selection;
pub mod session;
pub mod snapshot;

pub use bingo_types as types;

// Re-export commonly used types for convenience
pub use card::{validate_card, CardError, CardGenerator};
pub use drawn::{DrawError, DrawnSet};
pub use pattern::{evaluate, marked_cells, numbers_to_win, MarkGrid, WinResult};
pub use pricing::{bundle, price_for, Bundle, PriceQuote, PricingError, BUNDLE_PRESETS};
pub use rng::SimpleRng;
pub use selection::{SelectionError, SelectionManager};
pub use session::{EventOutcome, SessionEvent, SessionState, SessionStore};
pub use snapshot::CardView;
