//! Risk engine: the gatekeeper between proposed trades and real exposure

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, Utc};
use rust_decimal::Decimal;
use std::collections::HashMap;

use crate::market::MarketState;
use crate::risk::decision::{RejectReason, RiskDecision};
use crate::risk::limits::{DailyRiskState, RiskLimits};
use crate::risk::position::PositionState;
use crate::risk::trailing;
use crate::runtime::RuntimeParams;
use crate::signal::Signal;
use crate::telemetry::metrics::{increment, CounterMetric};

/// Priority assigned to strategies with no configured entry, pushing
/// them behind every configured one.
pub const DEFAULT_STRATEGY_PRIORITY: u32 = 10_000;

/// Applies capital-preservation rules to strategy signals and emits
/// sized decisions. The single place the daily-loss breaker, cooldown
/// and concurrency cap are enforced.
pub struct RiskEngine {
    limits: RiskLimits,
    /// Smaller value = higher importance
    priorities: HashMap<String, u32>,
    session_offset: FixedOffset,
    daily: DailyRiskState,
    cooldown_until: Option<DateTime<Utc>>,
}

impl RiskEngine {
    /// Build an engine; `session_tz_offset_minutes` fixes the local
    /// midnight used for daily session rollover.
    pub fn new(
        limits: RiskLimits,
        priorities: HashMap<String, u32>,
        session_tz_offset_minutes: i32,
    ) -> Self {
        let session_offset = FixedOffset::east_opt(session_tz_offset_minutes * 60)
            .unwrap_or_else(|| FixedOffset::east_opt(0).expect("zero offset is valid"));
        let session_date = Utc::now().with_timezone(&session_offset).date_naive();
        Self {
            limits,
            priorities,
            session_offset,
            daily: DailyRiskState::new(session_date),
            cooldown_until: None,
        }
    }

    pub fn limits(&self) -> &RiskLimits {
        &self.limits
    }

    pub fn daily_state(&self) -> &DailyRiskState {
        &self.daily
    }

    /// Apply the control-plane snapshot taken at cycle start
    pub fn apply_runtime(&mut self, params: &RuntimeParams) {
        self.limits.apply_runtime(params);
    }

    /// Assess one cycle's signals against open exposure and market state.
    ///
    /// Every surviving signal yields a decision, approved or rejected;
    /// same-symbol conflicts are pruned beforehand by strategy priority.
    pub fn assess_signals(
        &mut self,
        signals: &[Signal],
        open_positions: &HashMap<String, PositionState>,
        market: &HashMap<String, MarketState>,
        now: DateTime<Utc>,
    ) -> Vec<RiskDecision> {
        self.roll_session(now);

        let filtered = self.resolve_conflicts(signals);
        let conflict_pruned = signals.len() - filtered.len();

        let open_count = open_positions
            .values()
            .filter(|pos| !pos.is_flat())
            .count();
        let mut available_slots = self
            .limits
            .max_concurrent_positions
            .saturating_sub(open_count);

        let mut decisions = Vec::with_capacity(filtered.len());
        let mut rejection_reasons: HashMap<String, usize> = HashMap::new();
        if conflict_pruned > 0 {
            rejection_reasons.insert(RejectReason::ConflictPruned.to_string(), conflict_pruned);
        }

        for signal in filtered {
            let mut decision = self.build_decision(signal, market.get(&signal.symbol), now);
            // A symbol already held re-enters its own slot; only brand-new
            // positions consume capacity.
            if decision.approved && !open_positions.contains_key(&signal.symbol) {
                if available_slots == 0 {
                    decision = decision.reject(RejectReason::MaxConcurrentPositionsReached);
                } else {
                    available_slots -= 1;
                }
            }
            if let Some(reason) = decision.reason {
                *rejection_reasons.entry(reason.to_string()).or_insert(0) += 1;
            }
            decisions.push(decision);
        }

        let approved = decisions.iter().filter(|d| d.approved).count();
        let rejected = decisions.len() - approved + conflict_pruned;
        increment(CounterMetric::SignalsAssessed, signals.len() as u64);
        increment(CounterMetric::DecisionsApproved, approved as u64);
        increment(CounterMetric::DecisionsRejected, rejected as u64);
        tracing::debug!(
            n_signals_in = signals.len(),
            n_conflict_pruned = conflict_pruned,
            n_approved = approved,
            n_rejected = rejected,
            rejection_reasons = ?rejection_reasons,
            "risk assessment summary"
        );
        decisions
    }

    /// Fold a realized trade result into the daily accumulator; losses
    /// arm the cooldown. A winning trade never shortens an active
    /// cooldown, it only expires by elapsing.
    pub fn record_trade_pnl(&mut self, realized_pnl: Decimal, when: DateTime<Utc>) {
        self.roll_session(when);
        self.daily.realized_pnl += realized_pnl;
        if realized_pnl < Decimal::ZERO {
            self.cooldown_until =
                Some(when + Duration::minutes(self.limits.cooldown_after_loss_min));
            tracing::info!(
                realized_pnl = %realized_pnl,
                cooldown_until = ?self.cooldown_until,
                "losing trade recorded, cooldown armed"
            );
        }
    }

    /// Trailing-stop update for one open position (monotonic ratchet)
    pub fn apply_trailing_stop(&self, position: &mut PositionState, mkt: &MarketState) -> Decimal {
        trailing::apply_trailing_stop(position, mkt)
    }

    /// True once session realized losses reach the configured limit
    pub fn breaker_tripped(&self) -> bool {
        self.daily.breached(&self.limits)
    }

    pub fn cooldown_active(&self, now: DateTime<Utc>) -> bool {
        matches!(self.cooldown_until, Some(until) if now < until)
    }

    fn local_date(&self, now: DateTime<Utc>) -> NaiveDate {
        now.with_timezone(&self.session_offset).date_naive()
    }

    /// Reset the daily accumulator and cooldown when a new local day starts
    fn roll_session(&mut self, now: DateTime<Utc>) {
        let today = self.local_date(now);
        if today != self.daily.session_date {
            tracing::info!(
                old_session = %self.daily.session_date,
                new_session = %today,
                carried_pnl = %self.daily.realized_pnl,
                "daily session rollover"
            );
            self.daily.reset(today);
            self.cooldown_until = None;
        }
    }

    fn priority_of(&self, strategy_id: &str) -> u32 {
        self.priorities
            .get(strategy_id)
            .copied()
            .unwrap_or(DEFAULT_STRATEGY_PRIORITY)
    }

    /// Keep the highest-priority signal per symbol. Survivors come back
    /// sorted by (priority, symbol) so downstream slot consumption is
    /// deterministic.
    fn resolve_conflicts<'a>(&self, signals: &'a [Signal]) -> Vec<&'a Signal> {
        let mut ordered: Vec<&Signal> = signals.iter().collect();
        ordered.sort_by(|a, b| {
            self.priority_of(&a.strategy_id)
                .cmp(&self.priority_of(&b.strategy_id))
                .then_with(|| a.symbol.cmp(&b.symbol))
        });
        let mut seen: HashMap<&str, ()> = HashMap::new();
        ordered
            .into_iter()
            .filter(|signal| seen.insert(signal.symbol.as_str(), ()).is_none())
            .collect()
    }

    fn build_decision(
        &self,
        signal: &Signal,
        mkt: Option<&MarketState>,
        now: DateTime<Utc>,
    ) -> RiskDecision {
        let mut decision = RiskDecision::from_signal(signal);

        if self.breaker_tripped() {
            return decision.reject(RejectReason::DailyLossLimit);
        }
        if self.cooldown_active(now) {
            return decision.reject(RejectReason::CooldownActive);
        }
        let Some(sl_price) = signal.sl_price else {
            return decision.reject(RejectReason::MissingSlPrice);
        };

        let risk_amount = self
            .limits
            .risk_amount(signal.target_risk_pct, signal.overrides.virtual_equity);
        decision.risk_amount = risk_amount;
        if risk_amount <= Decimal::ZERO {
            return decision.reject(RejectReason::InvalidRiskAmount);
        }

        let mut notional = match signal.target_notional {
            Some(target) => target,
            None => {
                let distance = (signal.entry_price - sl_price).abs();
                if distance <= Decimal::ZERO {
                    return decision.reject(RejectReason::ZeroSlDistance);
                }
                let size = risk_amount / distance;
                size * signal.entry_price
            }
        };
        notional = notional.min(self.limits.max_notional(&signal.symbol));
        if notional <= Decimal::ZERO {
            return decision.reject(RejectReason::NotionalUnderflow);
        }
        decision.notional = Some(notional);
        decision.size = Some(notional / signal.entry_price);

        let slippage_cap = signal
            .overrides
            .max_slippage_bps
            .or(self.limits.max_slippage_bps);
        if let (Some(cap), Some(mkt)) = (slippage_cap, mkt) {
            if mkt.expected_entry_slippage_bps() > cap {
                return decision.reject(RejectReason::SlippageFilter);
            }
        }
        decision
    }
}
