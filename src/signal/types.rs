//! Signal types

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Trading side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    /// Long perpetual position
    Long,
    /// Short perpetual position
    Short,
}

impl Side {
    /// Direction multiplier: +1 for long, -1 for short
    pub fn sign(&self) -> Decimal {
        match self {
            Side::Long => dec!(1),
            Side::Short => dec!(-1),
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::Long => write!(f, "long"),
            Side::Short => write!(f, "short"),
        }
    }
}

/// How an approved decision should be turned into an order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryMode {
    /// Market order guarded by an expected-slippage cap
    #[default]
    MarketWithCap,
    /// Post-only limit armed once price retraces to the entry level
    LimitOnRetest,
}

/// Single take-profit rung for partial exits
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TakeProfitLevel {
    /// Trigger price
    pub price: Decimal,
    /// Fraction of remaining size to close, in (0, 1]
    pub size_pct: Decimal,
    /// Label for reporting ("tp1", "tp2")
    pub label: String,
}

/// Trailing-stop mode and its parameters
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "mode")]
pub enum TrailingStop {
    /// No trailing; the stop stays where risk placed it
    #[default]
    None,
    /// Trail at `last_price ∓ atr * multiplier`
    EmaAtr {
        multiplier: Decimal,
        /// Explicit ATR value; falls back to the market snapshot's ATR
        atr_override: Option<Decimal>,
    },
    /// Trail at a fixed percentage from last price
    Percent { pct: Decimal },
    /// Externally computed stop target, still subject to the ratchet rule
    Manual { target: Decimal },
}

/// Typed per-signal overrides (replaces the free-form metadata map)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SignalOverrides {
    /// Entry execution mode; defaults to market-with-cap
    pub entry_mode: Option<EntryMode>,
    /// Per-signal slippage cap in bps, overrides the limits-level cap
    pub max_slippage_bps: Option<Decimal>,
    /// Equity base for sizing this signal only
    pub virtual_equity: Option<Decimal>,
    /// Entry intent time-to-live in seconds
    pub entry_ttl_secs: Option<i64>,
    /// Seconds per bar when converting `time_stop_bars` to a deadline
    pub time_stop_bar_secs: Option<i64>,
}

/// A candidate trade proposed by a strategy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Signal {
    /// Unique signal identifier
    pub id: Uuid,
    /// Perpetual contract symbol, e.g. "BTCUSDT"
    pub symbol: String,
    /// Trade direction
    pub side: Side,
    /// Originating strategy identifier
    pub strategy_id: String,
    /// Proposed entry price
    pub entry_price: Decimal,
    /// Stop-loss price; signals without one are rejected by risk
    pub sl_price: Option<Decimal>,
    /// Explicit take-profit ladder; empty means derive from R multiples
    pub tp_levels: Vec<TakeProfitLevel>,
    /// Risk-% override for sizing
    pub target_risk_pct: Option<Decimal>,
    /// Explicit notional override, skips distance-based sizing
    pub target_notional: Option<Decimal>,
    /// Forced exit after this many bars
    pub time_stop_bars: Option<u32>,
    /// Trailing-stop configuration
    pub trailing: TrailingStop,
    /// Optional execution overrides
    pub overrides: SignalOverrides,
    /// Signal generation timestamp
    pub timestamp: DateTime<Utc>,
}

impl Signal {
    /// Create a signal with the mandatory fields; optional hints default off
    pub fn new(
        symbol: impl Into<String>,
        side: Side,
        strategy_id: impl Into<String>,
        entry_price: Decimal,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            symbol: symbol.into(),
            side,
            strategy_id: strategy_id.into(),
            entry_price,
            sl_price: None,
            tp_levels: vec![],
            target_risk_pct: None,
            target_notional: None,
            time_stop_bars: None,
            trailing: TrailingStop::None,
            overrides: SignalOverrides::default(),
            timestamp: Utc::now(),
        }
    }

    /// Price distance between entry and stop (1R), zero when no stop is set
    pub fn risk_distance(&self) -> Decimal {
        match self.sl_price {
            Some(sl) => (self.entry_price - sl).abs(),
            None => Decimal::ZERO,
        }
    }

    /// Resolved entry mode, defaulting to market-with-cap
    pub fn entry_mode(&self) -> EntryMode {
        self.overrides.entry_mode.unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_side_sign() {
        assert_eq!(Side::Long.sign(), dec!(1));
        assert_eq!(Side::Short.sign(), dec!(-1));
    }

    #[test]
    fn test_risk_distance() {
        let mut signal = Signal::new("BTCUSDT", Side::Long, "trend_a", dec!(100));
        assert_eq!(signal.risk_distance(), dec!(0));

        signal.sl_price = Some(dec!(95));
        assert_eq!(signal.risk_distance(), dec!(5));

        // Short with stop above entry
        let mut short = Signal::new("BTCUSDT", Side::Short, "trend_a", dec!(100));
        short.sl_price = Some(dec!(104));
        assert_eq!(short.risk_distance(), dec!(4));
    }

    #[test]
    fn test_entry_mode_default() {
        let mut signal = Signal::new("BTCUSDT", Side::Long, "trend_a", dec!(100));
        assert_eq!(signal.entry_mode(), EntryMode::MarketWithCap);

        signal.overrides.entry_mode = Some(EntryMode::LimitOnRetest);
        assert_eq!(signal.entry_mode(), EntryMode::LimitOnRetest);
    }

    #[test]
    fn test_trailing_default_is_none() {
        assert_eq!(TrailingStop::default(), TrailingStop::None);
    }

    #[test]
    fn test_signal_serde_round_trip() {
        let mut signal = Signal::new("ETHUSDT", Side::Short, "range_c", dec!(2000));
        signal.sl_price = Some(dec!(2040));
        signal.trailing = TrailingStop::Percent { pct: dec!(0.01) };

        let json = serde_json::to_string(&signal).unwrap();
        let back: Signal = serde_json::from_str(&json).unwrap();
        assert_eq!(back.symbol, "ETHUSDT");
        assert_eq!(back.sl_price, Some(dec!(2040)));
        assert_eq!(back.trailing, TrailingStop::Percent { pct: dec!(0.01) });
    }
}
