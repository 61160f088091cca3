//! Risk decision types

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::signal::{EntryMode, Side, Signal, TakeProfitLevel, TrailingStop};

/// Why a signal was not admitted
///
/// Rejections are expected outcomes carried as data, not errors; the
/// `Display` form is the stable reason code used in logs and telemetry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    DailyLossLimit,
    CooldownActive,
    MissingSlPrice,
    InvalidRiskAmount,
    ZeroSlDistance,
    NotionalUnderflow,
    SlippageFilter,
    MaxConcurrentPositionsReached,
    ConflictPruned,
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let code = match self {
            RejectReason::DailyLossLimit => "daily_loss_limit",
            RejectReason::CooldownActive => "cooldown_active",
            RejectReason::MissingSlPrice => "missing_sl_price",
            RejectReason::InvalidRiskAmount => "invalid_risk_amount",
            RejectReason::ZeroSlDistance => "zero_sl_distance",
            RejectReason::NotionalUnderflow => "notional_underflow",
            RejectReason::SlippageFilter => "slippage_filter",
            RejectReason::MaxConcurrentPositionsReached => "max_concurrent_positions_reached",
            RejectReason::ConflictPruned => "conflict_pruned",
        };
        write!(f, "{code}")
    }
}

/// Sized outcome of risk assessment for one signal
///
/// Every surviving signal produces exactly one decision, approved or
/// not, so rejections stay auditable downstream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskDecision {
    /// The originating signal, carried for downstream context
    pub signal: Signal,
    pub entry_mode: EntryMode,
    /// Computed size in contracts; None when rejected
    pub size: Option<Decimal>,
    /// Computed notional in quote currency; None when rejected
    pub notional: Option<Decimal>,
    pub sl_price: Option<Decimal>,
    pub tp_levels: Vec<TakeProfitLevel>,
    pub trailing: TrailingStop,
    pub time_stop_bars: Option<u32>,
    pub approved: bool,
    /// Risk budget spent on this trade
    pub risk_amount: Decimal,
    /// Set iff not approved
    pub reason: Option<RejectReason>,
}

impl RiskDecision {
    /// Seed an approved decision from a signal; sizing fills in later
    pub fn from_signal(signal: &Signal) -> Self {
        Self {
            entry_mode: signal.entry_mode(),
            size: None,
            notional: None,
            sl_price: signal.sl_price,
            tp_levels: signal.tp_levels.clone(),
            trailing: signal.trailing.clone(),
            time_stop_bars: signal.time_stop_bars,
            approved: true,
            risk_amount: Decimal::ZERO,
            reason: None,
            signal: signal.clone(),
        }
    }

    /// Turn the decision into a rejection, clearing any computed sizing
    pub fn reject(mut self, reason: RejectReason) -> Self {
        self.approved = false;
        self.reason = Some(reason);
        self.size = None;
        self.notional = None;
        self
    }

    pub fn is_rejected(&self) -> bool {
        !self.approved
    }

    pub fn symbol(&self) -> &str {
        &self.signal.symbol
    }

    pub fn side(&self) -> Side {
        self.signal.side
    }

    pub fn strategy_id(&self) -> &str {
        &self.signal.strategy_id
    }
}
