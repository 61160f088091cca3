//! Open position state

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::signal::{Side, TakeProfitLevel, TrailingStop};

/// Sizes at or below this are treated as flat
pub const SIZE_EPSILON: Decimal = dec!(0.00000001);

/// Single fill composing a net position
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionLeg {
    pub size: Decimal,
    pub entry_price: Decimal,
    pub fill_time: DateTime<Utc>,
    pub fee_paid: Decimal,
}

/// Which take-profit rungs have fired for this position
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct TpProgress {
    pub tp1_done: bool,
    pub tp2_done: bool,
}

/// Net open exposure for one symbol
///
/// `current_sl_price` only ever ratchets in the position's favor once
/// set; every mutation goes through [`PositionState::update_sl`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionState {
    pub symbol: String,
    pub strategy_id: String,
    pub side: Side,
    /// Remaining open size
    pub size: Decimal,
    pub entry_price: Decimal,
    pub open_time: DateTime<Utc>,
    /// Stop at entry time; fixed, defines 1R
    pub initial_sl_price: Decimal,
    /// Active stop after trailing updates
    pub current_sl_price: Decimal,
    pub trailing: TrailingStop,
    pub tp_levels: Vec<TakeProfitLevel>,
    /// Forced-exit deadline when a time-stop is armed
    pub time_stop_at: Option<DateTime<Utc>>,
    pub legs: Vec<PositionLeg>,
    pub realized_pnl: Decimal,
    pub unrealized_pnl: Decimal,
    pub tp_progress: TpProgress,
}

impl PositionState {
    /// Open a position from a single entry fill
    #[allow(clippy::too_many_arguments)]
    pub fn open(
        symbol: impl Into<String>,
        strategy_id: impl Into<String>,
        side: Side,
        size: Decimal,
        entry_price: Decimal,
        open_time: DateTime<Utc>,
        sl_price: Decimal,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            strategy_id: strategy_id.into(),
            side,
            size,
            entry_price,
            open_time,
            initial_sl_price: sl_price,
            current_sl_price: sl_price,
            trailing: TrailingStop::None,
            tp_levels: vec![],
            time_stop_at: None,
            legs: vec![PositionLeg {
                size,
                entry_price,
                fill_time: open_time,
                fee_paid: Decimal::ZERO,
            }],
            realized_pnl: Decimal::ZERO,
            unrealized_pnl: Decimal::ZERO,
            tp_progress: TpProgress::default(),
        }
    }

    /// Price distance between entry and the initial stop (1R)
    pub fn risk_per_unit(&self) -> Decimal {
        (self.entry_price - self.initial_sl_price).abs()
    }

    /// Monotonic stop update: longs only tighten upward, shorts downward
    pub fn update_sl(&mut self, candidate: Decimal) {
        let improves = match self.side {
            Side::Long => candidate > self.current_sl_price,
            Side::Short => candidate < self.current_sl_price,
        };
        if improves {
            self.current_sl_price = candidate;
        }
    }

    pub fn remaining_size(&self) -> Decimal {
        self.size
    }

    /// True once remaining size is negligible
    pub fn is_flat(&self) -> bool {
        self.size <= SIZE_EPSILON
    }

    /// Reduce remaining size by `fraction` of it, returning the closed
    /// quantity. Fractions above 1 close the whole remainder.
    pub fn reduce(&mut self, fraction: Decimal) -> Decimal {
        let fraction = fraction.min(dec!(1));
        let closed = self.size * fraction;
        self.size = (self.size - closed).max(Decimal::ZERO);
        closed
    }

    /// Signed PnL for closing `qty` at `exit_price`
    pub fn pnl_for(&self, exit_price: Decimal, qty: Decimal) -> Decimal {
        (exit_price - self.entry_price) * qty * self.side.sign()
    }

    /// Mark-to-market against the latest price
    pub fn update_mark(&mut self, last_price: Decimal) {
        self.unrealized_pnl = self.pnl_for(last_price, self.size);
    }
}
