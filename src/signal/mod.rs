//! Signal contracts
//!
//! Normalized trade proposals produced by strategy collaborators and
//! consumed by the risk/execution layers.

mod types;

pub use types::{EntryMode, Side, Signal, SignalOverrides, TakeProfitLevel, TrailingStop};
