//! Trailing-stop updater
//!
//! Candidate stops are derived from the latest price and applied through
//! the monotonic ratchet in [`PositionState::update_sl`], so a stop can
//! only ever tighten.

use rust_decimal::Decimal;

use crate::market::MarketState;
use crate::risk::position::PositionState;
use crate::signal::{Side, TrailingStop};

/// Update `position.current_sl_price` from its trailing mode and the
/// latest snapshot. Returns the stop in force afterwards.
pub fn apply_trailing_stop(position: &mut PositionState, mkt: &MarketState) -> Decimal {
    let last_price = mkt.mid_price;
    match position.trailing.clone() {
        TrailingStop::None => {}
        TrailingStop::EmaAtr {
            multiplier,
            atr_override,
        } => {
            if let Some(atr) = atr_override.or(mkt.atr_5m) {
                let offset = atr * multiplier;
                let candidate = match position.side {
                    Side::Long => last_price - offset,
                    Side::Short => last_price + offset,
                };
                position.update_sl(candidate);
            }
        }
        TrailingStop::Percent { pct } => {
            let candidate = match position.side {
                Side::Long => last_price * (Decimal::ONE - pct),
                Side::Short => last_price * (Decimal::ONE + pct),
            };
            position.update_sl(candidate);
        }
        TrailingStop::Manual { target } => {
            position.update_sl(target);
        }
    }
    position.current_sl_price
}
