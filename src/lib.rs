//! BINGO session client (workspace facade crate).
//!
//! Re-exports the workspace crates under one path: `bingo_session::{core, adapter, types}`.
//! The implementation lives in dedicated crates under `crates/`.

pub use bingo_adapter as adapter;
pub use bingo_core as core;
pub use bingo_types as types;
