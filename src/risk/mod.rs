//! Risk management module
//!
//! The admission-control stage: capital limits, daily-loss breaker,
//! cooldown, conflict resolution and position sizing.

mod decision;
mod engine;
mod limits;
mod position;
mod trailing;

pub use decision::{RejectReason, RiskDecision};
pub use engine::{RiskEngine, DEFAULT_STRATEGY_PRIORITY};
pub use limits::{DailyRiskState, RiskLimits};
pub use position::{PositionLeg, PositionState, TpProgress, SIZE_EPSILON};
pub use trailing::apply_trailing_stop;
