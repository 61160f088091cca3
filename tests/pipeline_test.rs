//! End-to-end pipeline tests: signal assessment through position exit

use chrono::{DateTime, Duration, TimeZone, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::HashMap;
use std::sync::Arc;

use bybit_intraday::engine::run_signal_pipeline;
use bybit_intraday::execution::{ExecutionEngine, ExecutionEvent, PaperGateway};
use bybit_intraday::market::MarketState;
use bybit_intraday::risk::{RejectReason, RiskEngine, RiskLimits};
use bybit_intraday::signal::{Side, Signal};

fn limits() -> RiskLimits {
    RiskLimits {
        equity: dec!(10000),
        per_trade_risk_pct: dec!(0.01),
        max_daily_loss_pct: dec!(0.01),
        max_concurrent_positions: 2,
        cooldown_after_loss_min: 30,
        max_leverage: dec!(5),
        max_slippage_bps: None,
        symbol_max_notional: HashMap::new(),
    }
}

fn market_map(mid: Decimal) -> HashMap<String, MarketState> {
    HashMap::from([(
        "BTCUSDT".to_string(),
        MarketState {
            symbol: "BTCUSDT".to_string(),
            timestamp: Utc::now(),
            mid_price: mid,
            spread_bps: dec!(1),
            depth_pm1_quote: dec!(10000000),
            atr_5m: Some(dec!(2)),
            avg_slippage_bps: dec!(1),
        },
    )])
}

fn long_signal() -> Signal {
    let mut signal = Signal::new("BTCUSDT", Side::Long, "trend_a", dec!(100));
    signal.sl_price = Some(dec!(95));
    signal
}

fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 3, 10, 0, 0).unwrap()
}

async fn engines() -> (RiskEngine, ExecutionEngine) {
    let risk = RiskEngine::new(
        limits(),
        HashMap::from([("trend_a".to_string(), 1)]),
        180,
    );
    let gateway = Arc::new(PaperGateway::new());
    gateway.set_reference_price("BTCUSDT", dec!(100)).await;
    let execution = ExecutionEngine::new(gateway, limits());
    (risk, execution)
}

#[tokio::test]
async fn test_full_trade_lifecycle() {
    let (mut risk, mut execution) = engines().await;
    let now = start();

    // Entry: 100 risk budget over a 5-point stop sizes 20 contracts
    let decisions = run_signal_pipeline(
        &mut risk,
        &mut execution,
        &[long_signal()],
        &market_map(dec!(100)),
        now,
    )
    .await;
    assert_eq!(decisions.len(), 1);
    assert!(decisions[0].approved);
    assert_eq!(decisions[0].size, Some(dec!(20)));
    assert_eq!(execution.positions()["BTCUSDT"].size, dec!(20));

    // TP1 at +1R (105) banks half for +50
    let reports = execution
        .on_market_snapshot(&market_map(dec!(105)), now + Duration::minutes(1))
        .await;
    let tp1 = reports
        .iter()
        .find(|r| r.event == ExecutionEvent::TakeProfit)
        .expect("tp1 fires at +1R");
    assert_eq!(tp1.quantity, dec!(10));
    assert_eq!(tp1.realized_pnl, Some(dec!(50)));
    for report in &reports {
        if let Some(pnl) = report.realized_pnl {
            risk.record_trade_pnl(pnl, now + Duration::minutes(1));
        }
    }
    // A winning exit never arms the cooldown
    assert!(!risk.cooldown_active(now + Duration::minutes(2)));

    // Stop takes out the remaining half for -60
    let reports = execution
        .on_market_snapshot(&market_map(dec!(94)), now + Duration::minutes(5))
        .await;
    let stop = reports
        .iter()
        .find(|r| r.event == ExecutionEvent::StopLoss)
        .expect("stop fires below 95");
    assert_eq!(stop.quantity, dec!(10));
    assert_eq!(stop.realized_pnl, Some(dec!(-60)));
    assert!(execution.positions().is_empty());
    for report in &reports {
        if let Some(pnl) = report.realized_pnl {
            risk.record_trade_pnl(pnl, now + Duration::minutes(5));
        }
    }
    assert_eq!(risk.daily_state().realized_pnl, dec!(-10));

    // Losing exit arms the cooldown; the next signal is rejected
    let decisions = run_signal_pipeline(
        &mut risk,
        &mut execution,
        &[long_signal()],
        &market_map(dec!(100)),
        now + Duration::minutes(10),
    )
    .await;
    assert_eq!(decisions[0].reason, Some(RejectReason::CooldownActive));
    assert!(execution.positions().is_empty());

    // Cooldown expires after 30 minutes; entries resume
    let decisions = run_signal_pipeline(
        &mut risk,
        &mut execution,
        &[long_signal()],
        &market_map(dec!(100)),
        now + Duration::minutes(36),
    )
    .await;
    assert!(decisions[0].approved);
    assert_eq!(execution.positions().len(), 1);
}

#[tokio::test]
async fn test_daily_breaker_blocks_until_rollover() {
    let (mut risk, mut execution) = engines().await;
    let now = start();

    // Session loss reaches the -100 limit
    risk.record_trade_pnl(dec!(-120), now);
    let decisions = run_signal_pipeline(
        &mut risk,
        &mut execution,
        &[long_signal()],
        &market_map(dec!(100)),
        now + Duration::hours(1),
    )
    .await;
    assert_eq!(decisions[0].reason, Some(RejectReason::DailyLossLimit));
    assert!(risk.breaker_tripped());

    // Next local day (UTC+3): accumulator resets, breaker clears.
    // 21:00 UTC on the same calendar day is already past local midnight.
    let next_session = Utc.with_ymd_and_hms(2024, 6, 3, 21, 30, 0).unwrap();
    let decisions = run_signal_pipeline(
        &mut risk,
        &mut execution,
        &[long_signal()],
        &market_map(dec!(100)),
        next_session,
    )
    .await;
    assert!(decisions[0].approved);
    assert_eq!(risk.daily_state().realized_pnl, Decimal::ZERO);
}

#[tokio::test]
async fn test_conflicting_signals_resolved_by_priority() {
    let mut risk = RiskEngine::new(
        limits(),
        HashMap::from([("trend_a".to_string(), 1), ("meanrev_b".to_string(), 2)]),
        180,
    );
    let gateway = Arc::new(PaperGateway::new());
    gateway.set_reference_price("BTCUSDT", dec!(100)).await;
    let mut execution = ExecutionEngine::new(gateway, limits());

    let mut rival = Signal::new("BTCUSDT", Side::Short, "meanrev_b", dec!(100));
    rival.sl_price = Some(dec!(103));

    let decisions = run_signal_pipeline(
        &mut risk,
        &mut execution,
        &[rival, long_signal()],
        &market_map(dec!(100)),
        start(),
    )
    .await;
    // Only the higher-priority strategy survives for the symbol
    assert_eq!(decisions.len(), 1);
    assert_eq!(decisions[0].strategy_id(), "trend_a");
    assert!(decisions[0].approved);
    assert_eq!(execution.positions()["BTCUSDT"].side, Side::Long);
}
