//! Execution engine: intent/order/position state machine

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::market::MarketState;
use crate::risk::{apply_trailing_stop, PositionState, RiskDecision, RiskLimits, SIZE_EPSILON};
use crate::signal::{EntryMode, Side};
use crate::telemetry::metrics::{increment, CounterMetric};

use super::sync::{sync_positions, PositionFetcher};
use super::types::{
    ActiveOrder, EntryIntent, ExecutionEvent, ExecutionReport, GatewayError, IntentStatus,
    OrderIntent, OrderStatus, OrderType, TimeInForce,
};
use super::OrderGateway;

/// Default entry intent time-to-live
pub const DEFAULT_ENTRY_TTL_SECS: i64 = 300;
/// Default seconds per bar for time-stop deadlines
pub const DEFAULT_TIME_STOP_BAR_SECS: i64 = 300;

/// Drives approved decisions through orders into positions and back out
/// through the exit ladder. The only component that talks to the
/// gateway or mutates position state.
pub struct ExecutionEngine {
    gateway: Arc<dyn OrderGateway>,
    limits: RiskLimits,
    positions: HashMap<String, PositionState>,
    intents: HashMap<Uuid, EntryIntent>,
    active_orders: HashMap<String, ActiveOrder>,
    default_entry_ttl_secs: i64,
    default_time_stop_bar_secs: i64,
    /// Reports produced outside on_market_snapshot (immediate fills),
    /// drained into the next snapshot's output.
    queued_reports: Vec<ExecutionReport>,
}

impl ExecutionEngine {
    pub fn new(gateway: Arc<dyn OrderGateway>, limits: RiskLimits) -> Self {
        Self::with_settings(
            gateway,
            limits,
            DEFAULT_ENTRY_TTL_SECS,
            DEFAULT_TIME_STOP_BAR_SECS,
        )
    }

    pub fn with_settings(
        gateway: Arc<dyn OrderGateway>,
        limits: RiskLimits,
        default_entry_ttl_secs: i64,
        default_time_stop_bar_secs: i64,
    ) -> Self {
        Self {
            gateway,
            limits,
            positions: HashMap::new(),
            intents: HashMap::new(),
            active_orders: HashMap::new(),
            default_entry_ttl_secs,
            default_time_stop_bar_secs,
            queued_reports: vec![],
        }
    }

    pub fn positions(&self) -> &HashMap<String, PositionState> {
        &self.positions
    }

    pub fn intents(&self) -> &HashMap<Uuid, EntryIntent> {
        &self.intents
    }

    pub fn active_orders(&self) -> &HashMap<String, ActiveOrder> {
        &self.active_orders
    }

    /// Swap in the limits snapshot taken at cycle start
    pub fn set_limits(&mut self, limits: RiskLimits) {
        self.limits = limits;
    }

    /// Rebuild the position map from the exchange's authoritative state.
    /// Same-symbol entries are overwritten; safe to re-run.
    pub async fn hydrate(&mut self, fetcher: &dyn PositionFetcher) -> Result<usize, GatewayError> {
        let synced = sync_positions(fetcher).await?;
        let count = synced.len();
        self.positions.extend(synced);
        tracing::info!(restored = count, "position map hydrated from exchange");
        Ok(count)
    }

    /// Turn an approved decision into an entry intent and route it.
    /// Returns the intent's state after dispatch; None when the decision
    /// carries nothing executable.
    pub async fn handle_risk_decision(
        &mut self,
        decision: &RiskDecision,
        mkt: Option<&MarketState>,
        now: DateTime<Utc>,
    ) -> Option<EntryIntent> {
        if !decision.approved {
            return None;
        }
        let (size, sl_price) = match (decision.size, decision.sl_price) {
            (Some(size), Some(sl)) => (size, sl),
            _ => return None,
        };
        let overrides = &decision.signal.overrides;
        let mut intent = EntryIntent {
            id: Uuid::new_v4(),
            symbol: decision.symbol().to_string(),
            strategy_id: decision.strategy_id().to_string(),
            side: decision.side(),
            size,
            entry_price: decision.signal.entry_price,
            sl_price,
            tp_levels: decision.tp_levels.clone(),
            entry_mode: decision.entry_mode,
            trailing: decision.trailing.clone(),
            time_stop_bars: decision.time_stop_bars,
            time_stop_bar_secs: overrides
                .time_stop_bar_secs
                .unwrap_or(self.default_time_stop_bar_secs),
            created_at: now,
            ttl_secs: overrides.entry_ttl_secs.unwrap_or(self.default_entry_ttl_secs),
            status: IntentStatus::Pending,
            filled_qty: Decimal::ZERO,
            expected_slippage_bps: None,
        };

        match intent.entry_mode {
            EntryMode::LimitOnRetest => {
                // Armed; evaluated now and then every cycle until filled,
                // cancelled or expired.
                if let Some(mkt) = mkt {
                    self.maybe_trigger_limit(&mut intent, mkt, now).await;
                }
            }
            EntryMode::MarketWithCap => {
                self.execute_market_intent(&mut intent, mkt, decision, now)
                    .await;
            }
        }

        if !intent.status.is_terminal() {
            self.intents.insert(intent.id, intent.clone());
        }
        Some(intent)
    }

    /// Per-cycle tick: expire/trigger pending limit intents, then run
    /// trailing updates and the exit ladder for every open position.
    pub async fn on_market_snapshot(
        &mut self,
        market: &HashMap<String, MarketState>,
        now: DateTime<Utc>,
    ) -> Vec<ExecutionReport> {
        let mut reports = std::mem::take(&mut self.queued_reports);
        reports.extend(self.activate_limit_retests(market, now).await);
        // Fills triggered while arming retests above
        reports.append(&mut self.queued_reports);

        let symbols: Vec<String> = self.positions.keys().cloned().collect();
        for symbol in symbols {
            let Some(mkt) = market.get(&symbol) else {
                continue;
            };
            reports.extend(self.manage_position(&symbol, mkt, now));
        }
        reports
    }

    /// Reconcile a gateway-reported order status against its intent.
    pub fn handle_order_update(
        &mut self,
        order: ActiveOrder,
        now: DateTime<Utc>,
    ) -> Vec<ExecutionReport> {
        let mut reports = vec![];
        self.active_orders
            .insert(order.order_id.clone(), order.clone());
        let Some(mut intent) = self.intents.remove(&order.intent_id) else {
            return reports;
        };
        match order.status {
            OrderStatus::Filled => {
                let mut report = self.open_position_from_fill(
                    &mut intent,
                    order.avg_fill_price,
                    order.filled_qty,
                    now,
                );
                report.order_id = Some(order.order_id.clone());
                reports.push(report);
            }
            OrderStatus::Cancelled => {
                let filled_qty = order.filled_qty.max(Decimal::ZERO);
                let remaining = (intent.size - filled_qty).max(Decimal::ZERO);
                if filled_qty > Decimal::ZERO {
                    // Realize the partial before dropping the remainder
                    let price = if order.avg_fill_price > Decimal::ZERO {
                        order.avg_fill_price
                    } else {
                        intent.entry_price
                    };
                    let mut report =
                        self.open_position_from_fill(&mut intent, price, filled_qty, now);
                    report.order_id = Some(order.order_id.clone());
                    reports.push(report);
                }
                intent.status = IntentStatus::Cancelled;
                reports.push(ExecutionReport {
                    event: ExecutionEvent::EntryCancelled,
                    symbol: intent.symbol.clone(),
                    side: intent.side,
                    quantity: remaining,
                    price: intent.entry_price,
                    timestamp: now,
                    intent_id: Some(intent.id),
                    order_id: Some(order.order_id.clone()),
                    reason: Some("order_cancelled".to_string()),
                    realized_pnl: None,
                });
            }
            OrderStatus::Rejected => {
                intent.status = IntentStatus::Rejected;
                reports.push(ExecutionReport {
                    event: ExecutionEvent::EntryRejected,
                    symbol: intent.symbol.clone(),
                    side: intent.side,
                    quantity: Decimal::ZERO,
                    price: intent.entry_price,
                    timestamp: now,
                    intent_id: Some(intent.id),
                    order_id: Some(order.order_id.clone()),
                    reason: Some("gateway_rejected".to_string()),
                    realized_pnl: None,
                });
            }
            OrderStatus::New | OrderStatus::PartiallyFilled => {
                // Wait for a terminal status; mirror the fill progress
                intent.status = IntentStatus::Active;
                intent.filled_qty = order.filled_qty;
                self.intents.insert(intent.id, intent);
            }
        }
        reports
    }

    // ------------------------------------------------------------------
    // Entry paths
    // ------------------------------------------------------------------

    async fn execute_market_intent(
        &mut self,
        intent: &mut EntryIntent,
        mkt: Option<&MarketState>,
        decision: &RiskDecision,
        now: DateTime<Utc>,
    ) {
        let expected = Self::estimate_slippage(intent, mkt);
        intent.expected_slippage_bps = Some(expected);
        let cap = decision
            .signal
            .overrides
            .max_slippage_bps
            .or(self.limits.max_slippage_bps);
        if let Some(cap) = cap {
            if expected > cap {
                tracing::warn!(
                    intent_id = %intent.id,
                    symbol = %intent.symbol,
                    expected_bps = %expected,
                    cap_bps = %cap,
                    "market entry rejected by slippage cap"
                );
                intent.status = IntentStatus::Rejected;
                return;
            }
        }
        let order = OrderIntent {
            symbol: intent.symbol.clone(),
            side: intent.side,
            order_type: OrderType::Market,
            quantity: intent.size,
            price: None,
            time_in_force: TimeInForce::Fok,
            reduce_only: false,
            post_only: false,
            client_intent_id: intent.id,
        };
        self.submit_intent_order(intent, order, now).await;
    }

    async fn activate_limit_retests(
        &mut self,
        market: &HashMap<String, MarketState>,
        now: DateTime<Utc>,
    ) -> Vec<ExecutionReport> {
        let mut reports = vec![];
        let pending: Vec<Uuid> = self
            .intents
            .iter()
            .filter(|(_, intent)| {
                intent.entry_mode == EntryMode::LimitOnRetest
                    && intent.status == IntentStatus::Pending
            })
            .map(|(id, _)| *id)
            .collect();
        for id in pending {
            let Some(mut intent) = self.intents.remove(&id) else {
                continue;
            };
            let Some(mkt) = market.get(&intent.symbol) else {
                self.intents.insert(id, intent);
                continue;
            };
            if intent.is_expired(now) {
                intent.status = IntentStatus::Cancelled;
                tracing::info!(intent_id = %id, symbol = %intent.symbol, "retest entry expired");
                reports.push(ExecutionReport {
                    event: ExecutionEvent::EntryCancelled,
                    symbol: intent.symbol.clone(),
                    side: intent.side,
                    quantity: intent.size,
                    price: intent.entry_price,
                    timestamp: now,
                    intent_id: Some(id),
                    order_id: None,
                    reason: Some("limit_on_retest_ttl".to_string()),
                    realized_pnl: None,
                });
                continue;
            }
            self.maybe_trigger_limit(&mut intent, mkt, now).await;
            if !intent.status.is_terminal() {
                self.intents.insert(id, intent);
            }
        }
        reports
    }

    /// Submit the post-only limit once price has retraced to the entry
    /// level (long: at or below; short: at or above).
    async fn maybe_trigger_limit(
        &mut self,
        intent: &mut EntryIntent,
        mkt: &MarketState,
        now: DateTime<Utc>,
    ) {
        let retested = match intent.side {
            Side::Long => mkt.mid_price <= intent.entry_price,
            Side::Short => mkt.mid_price >= intent.entry_price,
        };
        if !retested {
            return;
        }
        intent.status = IntentStatus::Active;
        let order = OrderIntent {
            symbol: intent.symbol.clone(),
            side: intent.side,
            order_type: OrderType::Limit,
            quantity: intent.size,
            price: Some(intent.entry_price),
            time_in_force: TimeInForce::Gtc,
            reduce_only: false,
            post_only: true,
            client_intent_id: intent.id,
        };
        self.submit_intent_order(intent, order, now).await;
    }

    async fn submit_intent_order(
        &mut self,
        intent: &mut EntryIntent,
        order: OrderIntent,
        now: DateTime<Utc>,
    ) {
        match self.gateway.submit_order(&order).await {
            Ok(active) => {
                self.active_orders
                    .insert(active.order_id.clone(), active.clone());
                match active.status {
                    OrderStatus::Filled => {
                        let mut report = self.open_position_from_fill(
                            intent,
                            active.avg_fill_price,
                            active.filled_qty,
                            now,
                        );
                        report.order_id = Some(active.order_id);
                        self.queued_reports.push(report);
                    }
                    OrderStatus::Rejected => {
                        intent.status = IntentStatus::Rejected;
                        self.queued_reports.push(ExecutionReport {
                            event: ExecutionEvent::EntryRejected,
                            symbol: intent.symbol.clone(),
                            side: intent.side,
                            quantity: Decimal::ZERO,
                            price: intent.entry_price,
                            timestamp: now,
                            intent_id: Some(intent.id),
                            order_id: Some(active.order_id),
                            reason: Some("gateway_rejected".to_string()),
                            realized_pnl: None,
                        });
                    }
                    _ => {
                        intent.status = IntentStatus::Active;
                        intent.filled_qty = active.filled_qty;
                    }
                }
            }
            Err(err) => {
                // Contained here: the intent dies locally, the cycle goes on
                tracing::warn!(
                    intent_id = %intent.id,
                    symbol = %intent.symbol,
                    error = %err,
                    "order submission failed"
                );
                intent.status = IntentStatus::Rejected;
            }
        }
    }

    fn open_position_from_fill(
        &mut self,
        intent: &mut EntryIntent,
        fill_price: Decimal,
        qty: Decimal,
        now: DateTime<Utc>,
    ) -> ExecutionReport {
        let mut position = PositionState::open(
            intent.symbol.clone(),
            intent.strategy_id.clone(),
            intent.side,
            qty,
            fill_price,
            now,
            intent.sl_price,
        );
        position.trailing = intent.trailing.clone();
        position.tp_levels = intent.tp_levels.clone();
        if let Some(bars) = intent.time_stop_bars {
            position.time_stop_at =
                Some(now + Duration::seconds(intent.time_stop_bar_secs * i64::from(bars)));
        }
        self.positions.insert(intent.symbol.clone(), position);
        intent.status = IntentStatus::Filled;
        intent.filled_qty = qty;
        increment(CounterMetric::EntriesFilled, 1);
        tracing::info!(
            intent_id = %intent.id,
            symbol = %intent.symbol,
            side = %intent.side,
            qty = %qty,
            price = %fill_price,
            "entry filled, position open"
        );
        ExecutionReport {
            event: ExecutionEvent::EntryFilled,
            symbol: intent.symbol.clone(),
            side: intent.side,
            quantity: qty,
            price: fill_price,
            timestamp: now,
            intent_id: Some(intent.id),
            order_id: None,
            reason: None,
            realized_pnl: None,
        }
    }

    // ------------------------------------------------------------------
    // Exit ladder
    // ------------------------------------------------------------------

    /// Fixed evaluation order: trailing update, TP1, TP2, stop (closes
    /// everything and short-circuits), time-stop.
    fn manage_position(
        &mut self,
        symbol: &str,
        mkt: &MarketState,
        now: DateTime<Utc>,
    ) -> Vec<ExecutionReport> {
        let mut reports = vec![];
        let Some(position) = self.positions.get_mut(symbol) else {
            return reports;
        };
        apply_trailing_stop(position, mkt);
        let last_price = mkt.mid_price;
        position.update_mark(last_price);

        // 1R for TP derivation; degenerate stops fall back to a small
        // fraction of price so targets stay finite.
        let mut r_value = position.risk_per_unit();
        if r_value <= Decimal::ZERO {
            r_value = (last_price.abs() * dec!(0.005)).max(SIZE_EPSILON);
        }
        let direction = position.side.sign();
        let (tp1_price, tp1_frac) = position
            .tp_levels
            .first()
            .map(|level| (level.price, level.size_pct))
            .unwrap_or((position.entry_price + direction * r_value, dec!(0.5)));
        let (tp2_price, tp2_frac) = position
            .tp_levels
            .get(1)
            .map(|level| (level.price, level.size_pct))
            .unwrap_or((
                position.entry_price + direction * dec!(2) * r_value,
                dec!(0.25),
            ));

        if !position.tp_progress.tp1_done && hit_target(position.side, last_price, tp1_price) {
            reports.push(close_fraction(
                position,
                tp1_frac,
                last_price,
                now,
                ExecutionEvent::TakeProfit,
                "tp1",
            ));
            position.tp_progress.tp1_done = true;
        }
        if !position.tp_progress.tp2_done && hit_target(position.side, last_price, tp2_price) {
            reports.push(close_fraction(
                position,
                tp2_frac,
                last_price,
                now,
                ExecutionEvent::TakeProfit,
                "tp2",
            ));
            position.tp_progress.tp2_done = true;
        }

        if hit_stop(position.side, last_price, position.current_sl_price) {
            reports.push(close_fraction(
                position,
                dec!(1),
                last_price,
                now,
                ExecutionEvent::StopLoss,
                "stop_loss",
            ));
        } else if matches!(position.time_stop_at, Some(deadline) if now >= deadline) {
            reports.push(close_fraction(
                position,
                dec!(1),
                last_price,
                now,
                ExecutionEvent::TimeStop,
                "time_stop",
            ));
        }

        if position.is_flat() {
            self.positions.remove(symbol);
            increment(CounterMetric::PositionsClosed, 1);
            tracing::info!(symbol, "position fully closed");
        }
        reports
    }

    fn estimate_slippage(intent: &EntryIntent, mkt: Option<&MarketState>) -> Decimal {
        let Some(mkt) = mkt else {
            return Decimal::ZERO;
        };
        let notional = intent.size * intent.entry_price;
        let depth = mkt.depth_pm1_quote.max(Decimal::ONE);
        let depth_component = notional / depth * dec!(10000);
        mkt.spread_bps * dec!(0.5) + depth_component
    }
}

fn hit_target(side: Side, price: Decimal, target: Decimal) -> bool {
    match side {
        Side::Long => price >= target,
        Side::Short => price <= target,
    }
}

fn hit_stop(side: Side, price: Decimal, stop: Decimal) -> bool {
    match side {
        Side::Long => price <= stop,
        Side::Short => price >= stop,
    }
}

/// Close `fraction` of the remaining size at `price`, realizing PnL on
/// the position and reporting it for the daily accumulator.
fn close_fraction(
    position: &mut PositionState,
    fraction: Decimal,
    price: Decimal,
    now: DateTime<Utc>,
    event: ExecutionEvent,
    reason: &str,
) -> ExecutionReport {
    if position.remaining_size() <= SIZE_EPSILON {
        return ExecutionReport {
            event,
            symbol: position.symbol.clone(),
            side: position.side,
            quantity: Decimal::ZERO,
            price,
            timestamp: now,
            intent_id: None,
            order_id: None,
            reason: Some(format!("{reason}_noop")),
            realized_pnl: None,
        };
    }
    let qty = position.reduce(fraction);
    let pnl = position.pnl_for(price, qty);
    position.realized_pnl += pnl;
    tracing::info!(
        symbol = %position.symbol,
        side = %position.side,
        event = %event,
        qty = %qty,
        price = %price,
        pnl = %pnl,
        remaining = %position.remaining_size(),
        "position reduced"
    );
    ExecutionReport {
        event,
        symbol: position.symbol.clone(),
        side: position.side,
        quantity: qty,
        price,
        timestamp: now,
        intent_id: None,
        order_id: None,
        reason: Some(reason.to_string()),
        realized_pnl: Some(pnl),
    }
}
