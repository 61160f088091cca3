//! Capital limits and session-scoped loss tracking

use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::runtime::RuntimeParams;

/// Capital and exposure rules applied to every signal
///
/// Equity, per-trade risk and the concurrency cap may be overwritten
/// between cycles by the control plane; everything else is set once at
/// startup from config.
#[derive(Debug, Clone, Deserialize)]
pub struct RiskLimits {
    /// Equity base for sizing and the daily-loss limit
    pub equity: Decimal,
    /// Fraction of equity risked per trade
    pub per_trade_risk_pct: Decimal,
    /// Daily realized-loss fraction that trips the breaker
    pub max_daily_loss_pct: Decimal,
    /// Maximum concurrently open positions
    pub max_concurrent_positions: usize,
    /// Entry block duration after a losing trade
    pub cooldown_after_loss_min: i64,
    /// Leverage cap applied to per-trade notional
    pub max_leverage: Decimal,
    /// Expected-slippage cap in bps; None disables the filter
    pub max_slippage_bps: Option<Decimal>,
    /// Per-symbol notional caps in quote currency
    #[serde(default)]
    pub symbol_max_notional: HashMap<String, Decimal>,
}

impl RiskLimits {
    /// Risk budget for one trade, honoring per-signal overrides
    pub fn risk_amount(
        &self,
        override_pct: Option<Decimal>,
        equity_override: Option<Decimal>,
    ) -> Decimal {
        let pct = override_pct.unwrap_or(self.per_trade_risk_pct);
        let equity = equity_override.unwrap_or(self.equity);
        pct * equity
    }

    /// Largest allowed notional for a symbol: leverage cap, further
    /// tightened by the per-symbol cap when one is configured.
    pub fn max_notional(&self, symbol: &str) -> Decimal {
        let leverage_cap = self.equity * self.max_leverage;
        match self.symbol_max_notional.get(symbol) {
            Some(cap) => leverage_cap.min(*cap),
            None => leverage_cap,
        }
    }

    /// Realized-PnL floor for the session; at or below this the breaker trips
    pub fn daily_loss_limit(&self) -> Decimal {
        -self.equity * self.max_daily_loss_pct
    }

    /// Apply the control-plane snapshot taken at cycle start
    pub fn apply_runtime(&mut self, params: &RuntimeParams) {
        self.equity = params.equity;
        self.per_trade_risk_pct = params.per_trade_risk_pct;
        self.max_concurrent_positions = params.max_concurrent_positions;
    }
}

impl Default for RiskLimits {
    fn default() -> Self {
        Self {
            equity: dec!(10000),
            per_trade_risk_pct: dec!(0.0035),
            max_daily_loss_pct: dec!(0.015),
            max_concurrent_positions: 2,
            cooldown_after_loss_min: 30,
            max_leverage: dec!(5),
            max_slippage_bps: None,
            symbol_max_notional: HashMap::new(),
        }
    }
}

/// Realized PnL accumulated since the session's local midnight
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyRiskState {
    /// Local calendar date the session belongs to
    pub session_date: NaiveDate,
    /// Realized PnL since session start
    pub realized_pnl: Decimal,
}

impl DailyRiskState {
    pub fn new(session_date: NaiveDate) -> Self {
        Self {
            session_date,
            realized_pnl: Decimal::ZERO,
        }
    }

    /// Start a new session, zeroing the accumulator
    pub fn reset(&mut self, new_session: NaiveDate) {
        self.session_date = new_session;
        self.realized_pnl = Decimal::ZERO;
    }

    /// True once session losses reach the configured limit
    pub fn breached(&self, limits: &RiskLimits) -> bool {
        self.realized_pnl <= limits.daily_loss_limit()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn limits() -> RiskLimits {
        RiskLimits {
            equity: dec!(10000),
            per_trade_risk_pct: dec!(0.01),
            max_daily_loss_pct: dec!(0.1),
            max_concurrent_positions: 3,
            cooldown_after_loss_min: 30,
            max_leverage: dec!(5),
            max_slippage_bps: Some(dec!(10)),
            symbol_max_notional: HashMap::from([("BTCUSDT".to_string(), dec!(500))]),
        }
    }

    #[test]
    fn test_risk_amount_defaults_and_overrides() {
        let limits = limits();
        assert_eq!(limits.risk_amount(None, None), dec!(100));
        assert_eq!(limits.risk_amount(Some(dec!(0.02)), None), dec!(200));
        assert_eq!(limits.risk_amount(None, Some(dec!(5000))), dec!(50));
    }

    #[test]
    fn test_max_notional_symbol_cap() {
        let limits = limits();
        // Leverage cap alone
        assert_eq!(limits.max_notional("ETHUSDT"), dec!(50000));
        // Tighter symbol cap wins
        assert_eq!(limits.max_notional("BTCUSDT"), dec!(500));
    }

    #[test]
    fn test_daily_breaker_threshold() {
        let limits = limits();
        let date = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let mut state = DailyRiskState::new(date);
        assert_eq!(limits.daily_loss_limit(), dec!(-1000));

        state.realized_pnl = dec!(-999);
        assert!(!state.breached(&limits));

        state.realized_pnl = dec!(-1000);
        assert!(state.breached(&limits));
    }

    #[test]
    fn test_session_reset_clears_pnl() {
        let mut state = DailyRiskState::new(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
        state.realized_pnl = dec!(-750);
        state.reset(NaiveDate::from_ymd_opt(2024, 1, 2).unwrap());
        assert_eq!(state.realized_pnl, dec!(0));
        assert_eq!(
            state.session_date,
            NaiveDate::from_ymd_opt(2024, 1, 2).unwrap()
        );
    }

    #[test]
    fn test_apply_runtime_overrides_mutable_fields() {
        let mut limits = limits();
        let params = RuntimeParams {
            trading_enabled: true,
            equity: dec!(20000),
            per_trade_risk_pct: dec!(0.005),
            max_concurrent_positions: 5,
            ..RuntimeParams::default()
        };
        limits.apply_runtime(&params);
        assert_eq!(limits.equity, dec!(20000));
        assert_eq!(limits.per_trade_risk_pct, dec!(0.005));
        assert_eq!(limits.max_concurrent_positions, 5);
        // Startup-only fields untouched
        assert_eq!(limits.max_leverage, dec!(5));
    }
}
