//! Execution types

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::signal::{EntryMode, Side, TakeProfitLevel, TrailingStop};

/// Gateway-side order identifier (exchange-assigned)
pub type OrderId = String;

/// Order submission failures, surfaced to the engine as values
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Exchange refused the order
    #[error("order rejected by exchange: {0}")]
    Rejected(String),
    /// Network or transport problem before an exchange verdict
    #[error("gateway transport failure: {0}")]
    Transport(String),
}

/// Order type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderType {
    Market,
    Limit,
}

/// Time-in-force for submitted orders
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeInForce {
    /// Good till cancelled
    Gtc,
    /// Fill or kill
    Fok,
}

/// Normalized order request handed to the gateway
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderIntent {
    pub symbol: String,
    pub side: Side,
    pub order_type: OrderType,
    pub quantity: Decimal,
    /// Limit price; None for market orders
    pub price: Option<Decimal>,
    pub time_in_force: TimeInForce,
    pub reduce_only: bool,
    pub post_only: bool,
    /// Owning intent, for reconciliation on async updates
    pub client_intent_id: Uuid,
}

/// Gateway-reported order lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    New,
    PartiallyFilled,
    Filled,
    Cancelled,
    Rejected,
}

/// Gateway-facing order record mirroring exchange-reported truth
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActiveOrder {
    pub order_id: OrderId,
    pub intent_id: Uuid,
    pub order: OrderIntent,
    pub status: OrderStatus,
    pub filled_qty: Decimal,
    pub avg_fill_price: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl ActiveOrder {
    pub fn mark_filled(&mut self, qty: Decimal, price: Decimal, now: DateTime<Utc>) {
        self.status = OrderStatus::Filled;
        self.filled_qty = qty;
        self.avg_fill_price = price;
        self.updated_at = Some(now);
    }

    pub fn mark_cancelled(&mut self, now: DateTime<Utc>) {
        self.status = OrderStatus::Cancelled;
        self.updated_at = Some(now);
    }
}

/// Entry intent lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntentStatus {
    Pending,
    Active,
    Filled,
    Cancelled,
    Rejected,
}

impl IntentStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            IntentStatus::Filled | IntentStatus::Cancelled | IntentStatus::Rejected
        )
    }
}

/// State machine between an approved decision and a filled order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntryIntent {
    pub id: Uuid,
    pub symbol: String,
    pub strategy_id: String,
    pub side: Side,
    pub size: Decimal,
    pub entry_price: Decimal,
    pub sl_price: Decimal,
    pub tp_levels: Vec<TakeProfitLevel>,
    pub entry_mode: EntryMode,
    pub trailing: TrailingStop,
    pub time_stop_bars: Option<u32>,
    /// Seconds per bar when arming the time-stop deadline
    pub time_stop_bar_secs: i64,
    pub created_at: DateTime<Utc>,
    pub ttl_secs: i64,
    pub status: IntentStatus,
    pub filled_qty: Decimal,
    pub expected_slippage_bps: Option<Decimal>,
}

impl EntryIntent {
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.created_at + Duration::seconds(self.ttl_secs)
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at()
    }
}

/// Semantic event kinds fanned out to notification/telemetry consumers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionEvent {
    EntryFilled,
    EntryCancelled,
    EntryRejected,
    ExitFilled,
    StopLoss,
    TakeProfit,
    TimeStop,
}

impl std::fmt::Display for ExecutionEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ExecutionEvent::EntryFilled => "entry_filled",
            ExecutionEvent::EntryCancelled => "entry_cancelled",
            ExecutionEvent::EntryRejected => "entry_rejected",
            ExecutionEvent::ExitFilled => "exit_filled",
            ExecutionEvent::StopLoss => "stop_loss",
            ExecutionEvent::TakeProfit => "take_profit",
            ExecutionEvent::TimeStop => "time_stop",
        };
        write!(f, "{name}")
    }
}

/// Immutable record of an entry/exit outcome
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionReport {
    pub event: ExecutionEvent,
    pub symbol: String,
    pub side: Side,
    pub quantity: Decimal,
    pub price: Decimal,
    pub timestamp: DateTime<Utc>,
    pub intent_id: Option<Uuid>,
    pub order_id: Option<OrderId>,
    /// Human reason code ("tp1", "stop_loss", "limit_on_retest_ttl", ...)
    pub reason: Option<String>,
    /// Realized PnL for exits; fed back into the daily accumulator
    pub realized_pnl: Option<Decimal>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn intent() -> EntryIntent {
        EntryIntent {
            id: Uuid::new_v4(),
            symbol: "BTCUSDT".to_string(),
            strategy_id: "trend_a".to_string(),
            side: Side::Long,
            size: dec!(1),
            entry_price: dec!(100),
            sl_price: dec!(95),
            tp_levels: vec![],
            entry_mode: EntryMode::LimitOnRetest,
            trailing: TrailingStop::None,
            time_stop_bars: None,
            time_stop_bar_secs: 300,
            created_at: Utc::now(),
            ttl_secs: 300,
            status: IntentStatus::Pending,
            filled_qty: dec!(0),
            expected_slippage_bps: None,
        }
    }

    #[test]
    fn test_intent_expiry() {
        let intent = intent();
        assert!(!intent.is_expired(intent.created_at + Duration::seconds(299)));
        assert!(intent.is_expired(intent.created_at + Duration::seconds(300)));
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(!IntentStatus::Pending.is_terminal());
        assert!(!IntentStatus::Active.is_terminal());
        assert!(IntentStatus::Filled.is_terminal());
        assert!(IntentStatus::Cancelled.is_terminal());
        assert!(IntentStatus::Rejected.is_terminal());
    }

    #[test]
    fn test_event_codes() {
        assert_eq!(ExecutionEvent::EntryFilled.to_string(), "entry_filled");
        assert_eq!(ExecutionEvent::TimeStop.to_string(), "time_stop");
    }

    #[test]
    fn test_active_order_transitions() {
        let base = intent();
        let mut order = ActiveOrder {
            order_id: "ord-1".to_string(),
            intent_id: base.id,
            order: OrderIntent {
                symbol: base.symbol.clone(),
                side: base.side,
                order_type: OrderType::Limit,
                quantity: base.size,
                price: Some(base.entry_price),
                time_in_force: TimeInForce::Gtc,
                reduce_only: false,
                post_only: true,
                client_intent_id: base.id,
            },
            status: OrderStatus::New,
            filled_qty: dec!(0),
            avg_fill_price: dec!(0),
            created_at: Utc::now(),
            updated_at: None,
        };
        let now = Utc::now();
        order.mark_filled(dec!(1), dec!(100), now);
        assert_eq!(order.status, OrderStatus::Filled);
        assert_eq!(order.avg_fill_price, dec!(100));

        order.mark_cancelled(now);
        assert_eq!(order.status, OrderStatus::Cancelled);
    }
}
