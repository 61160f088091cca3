//! Trading loop
//!
//! One cycle: snapshot runtime parameters, refresh market state, run
//! position management, feed realized PnL back into the risk engine,
//! then collect and assess new signals.

use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use std::collections::HashMap;
use std::time::Duration;

use crate::execution::{ExecutionEngine, ExecutionReport};
use crate::market::{MarketDataSource, MarketState};
use crate::risk::{PositionState, RiskDecision, RiskEngine};
use crate::runtime::ControlPlane;
use crate::signal::Signal;
use crate::telemetry::metrics::{set_gauge, GaugeMetric};

/// Produces entry candidates for one cycle from current market and
/// position state. Strategy implementations live behind this seam.
pub trait SignalSource: Send {
    fn collect(
        &mut self,
        market: &HashMap<String, MarketState>,
        positions: &HashMap<String, PositionState>,
    ) -> Vec<Signal>;
}

/// A source that never signals; exits still run
pub struct NullSignalSource;

impl SignalSource for NullSignalSource {
    fn collect(
        &mut self,
        _market: &HashMap<String, MarketState>,
        _positions: &HashMap<String, PositionState>,
    ) -> Vec<Signal> {
        vec![]
    }
}

/// Assess signals and hand every approved decision to execution.
/// Returns all decisions, rejections included, for logging upstream.
pub async fn run_signal_pipeline(
    risk: &mut RiskEngine,
    execution: &mut ExecutionEngine,
    signals: &[Signal],
    market: &HashMap<String, MarketState>,
    now: DateTime<Utc>,
) -> Vec<RiskDecision> {
    let decisions = risk.assess_signals(signals, execution.positions(), market, now);
    for decision in &decisions {
        if decision.approved {
            execution
                .handle_risk_decision(decision, market.get(decision.symbol()), now)
                .await;
        }
    }
    decisions
}

pub struct TradingLoop<M: MarketDataSource, S: SignalSource> {
    risk: RiskEngine,
    execution: ExecutionEngine,
    market_source: M,
    signal_source: S,
    control: ControlPlane,
    cycle_interval: Duration,
}

impl<M: MarketDataSource, S: SignalSource> TradingLoop<M, S> {
    pub fn new(
        risk: RiskEngine,
        execution: ExecutionEngine,
        market_source: M,
        signal_source: S,
        control: ControlPlane,
        cycle_interval: Duration,
    ) -> Self {
        Self {
            risk,
            execution,
            market_source,
            signal_source,
            control,
            cycle_interval,
        }
    }

    pub fn risk(&self) -> &RiskEngine {
        &self.risk
    }

    pub fn execution(&self) -> &ExecutionEngine {
        &self.execution
    }

    /// One full cycle. Exits and reconciliation always run; new entries
    /// only while the trading switch is on.
    pub async fn run_cycle(&mut self, now: DateTime<Utc>) -> anyhow::Result<Vec<ExecutionReport>> {
        let params = self.control.snapshot().await;
        self.risk.apply_runtime(&params);
        self.execution.set_limits(self.risk.limits().clone());

        let market = self.market_source.snapshot().await?;
        let reports = self.execution.on_market_snapshot(&market, now).await;
        for report in &reports {
            if let Some(pnl) = report.realized_pnl {
                self.risk.record_trade_pnl(pnl, now);
            }
        }

        if params.trading_enabled {
            let signals = self.signal_source.collect(&market, self.execution.positions());
            if !signals.is_empty() {
                let decisions = run_signal_pipeline(
                    &mut self.risk,
                    &mut self.execution,
                    &signals,
                    &market,
                    now,
                )
                .await;
                for decision in decisions.iter().filter(|d| d.is_rejected()) {
                    tracing::debug!(
                        symbol = %decision.symbol(),
                        strategy = %decision.strategy_id(),
                        reason = ?decision.reason,
                        "signal rejected"
                    );
                }
            }
        }

        set_gauge(
            GaugeMetric::Equity,
            self.risk.limits().equity.to_f64().unwrap_or(0.0),
        );
        set_gauge(
            GaugeMetric::DailyPnl,
            self.risk.daily_state().realized_pnl.to_f64().unwrap_or(0.0),
        );
        set_gauge(
            GaugeMetric::OpenPositions,
            self.execution.positions().len() as f64,
        );
        set_gauge(
            GaugeMetric::PendingIntents,
            self.execution.intents().len() as f64,
        );
        Ok(reports)
    }

    /// Run cycles forever. A failed cycle is logged and the next one
    /// proceeds; only startup errors abort.
    pub async fn run(&mut self) -> anyhow::Result<()> {
        tracing::info!(
            interval_secs = self.cycle_interval.as_secs(),
            "trading loop started"
        );
        let mut ticker = tokio::time::interval(self.cycle_interval);
        loop {
            ticker.tick().await;
            let now = Utc::now();
            match self.run_cycle(now).await {
                Ok(reports) => {
                    for report in &reports {
                        tracing::info!(
                            event = %report.event,
                            symbol = %report.symbol,
                            qty = %report.quantity,
                            price = %report.price,
                            "execution report"
                        );
                    }
                }
                Err(err) => {
                    tracing::error!(error = %err, "trading cycle failed");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execution::PaperGateway;
    use crate::risk::RiskLimits;
    use crate::runtime::RuntimeParams;
    use crate::signal::Side;
    use async_trait::async_trait;
    use chrono::TimeZone;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use std::sync::Arc;

    struct StaticMarket {
        mid: Decimal,
    }

    #[async_trait]
    impl MarketDataSource for StaticMarket {
        async fn snapshot(&mut self) -> anyhow::Result<HashMap<String, MarketState>> {
            Ok(HashMap::from([(
                "BTCUSDT".to_string(),
                MarketState {
                    symbol: "BTCUSDT".to_string(),
                    timestamp: Utc::now(),
                    mid_price: self.mid,
                    spread_bps: dec!(1),
                    depth_pm1_quote: dec!(10000000),
                    atr_5m: Some(dec!(2)),
                    avg_slippage_bps: dec!(1),
                },
            )]))
        }
    }

    struct OneShotSignals {
        fired: bool,
    }

    impl SignalSource for OneShotSignals {
        fn collect(
            &mut self,
            _market: &HashMap<String, MarketState>,
            _positions: &HashMap<String, PositionState>,
        ) -> Vec<Signal> {
            if self.fired {
                return vec![];
            }
            self.fired = true;
            let mut signal = Signal::new("BTCUSDT", Side::Long, "trend_a", dec!(100));
            signal.sl_price = Some(dec!(95));
            vec![signal]
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 3, 10, 0, 0).unwrap()
    }

    async fn trading_loop(mid: Decimal, enabled: bool) -> TradingLoop<StaticMarket, OneShotSignals> {
        let limits = RiskLimits::default();
        let risk = RiskEngine::new(limits.clone(), HashMap::from([("trend_a".to_string(), 1)]), 180);
        let gateway = Arc::new(PaperGateway::new());
        gateway.set_reference_price("BTCUSDT", dec!(100)).await;
        let execution = ExecutionEngine::new(gateway, limits);
        let control = ControlPlane::new(RuntimeParams {
            trading_enabled: enabled,
            ..RuntimeParams::default()
        });
        TradingLoop::new(
            risk,
            execution,
            StaticMarket { mid },
            OneShotSignals { fired: false },
            control,
            Duration::from_secs(5),
        )
    }

    #[tokio::test]
    async fn test_cycle_opens_position_when_enabled() {
        let mut trading = trading_loop(dec!(100), true).await;
        trading.run_cycle(now()).await.unwrap();
        assert_eq!(trading.execution().positions().len(), 1);
    }

    #[tokio::test]
    async fn test_cycle_skips_entries_when_disabled() {
        let mut trading = trading_loop(dec!(100), false).await;
        trading.run_cycle(now()).await.unwrap();
        assert!(trading.execution().positions().is_empty());
    }

    #[tokio::test]
    async fn test_realized_pnl_feeds_daily_state() {
        let mut trading = trading_loop(dec!(100), true).await;
        trading.run_cycle(now()).await.unwrap();
        assert_eq!(trading.execution().positions().len(), 1);

        // Price collapses through the stop; the loss lands in the
        // session accumulator and arms the cooldown
        trading.market_source.mid = dec!(94);
        trading.run_cycle(now() + chrono::Duration::minutes(1)).await.unwrap();
        assert!(trading.execution().positions().is_empty());
        assert!(trading.risk().daily_state().realized_pnl < Decimal::ZERO);
        assert!(trading
            .risk()
            .cooldown_active(now() + chrono::Duration::minutes(2)));
    }
}
