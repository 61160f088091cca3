//! Paper trading gateway with simulated fills

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::types::{ActiveOrder, GatewayError, OrderIntent, OrderStatus, OrderType};
use super::OrderGateway;

/// Simulated gateway: fills immediately at the order's limit price, or
/// at a supplied per-symbol reference price for market orders.
///
/// Tests can script non-filled outcomes with [`PaperGateway::push_status`].
pub struct PaperGateway {
    reference_prices: Arc<RwLock<HashMap<String, Decimal>>>,
    scripted_statuses: Arc<RwLock<VecDeque<OrderStatus>>>,
    submitted: Arc<RwLock<Vec<ActiveOrder>>>,
}

impl PaperGateway {
    pub fn new() -> Self {
        Self {
            reference_prices: Arc::new(RwLock::new(HashMap::new())),
            scripted_statuses: Arc::new(RwLock::new(VecDeque::new())),
            submitted: Arc::new(RwLock::new(vec![])),
        }
    }

    /// Set the reference price market orders fill at
    pub async fn set_reference_price(&self, symbol: impl Into<String>, price: Decimal) {
        self.reference_prices.write().await.insert(symbol.into(), price);
    }

    /// Queue a status for the next submitted order (default: filled)
    pub async fn push_status(&self, status: OrderStatus) {
        self.scripted_statuses.write().await.push_back(status);
    }

    /// All orders submitted so far
    pub async fn submitted_orders(&self) -> Vec<ActiveOrder> {
        self.submitted.read().await.clone()
    }
}

impl Default for PaperGateway {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl OrderGateway for PaperGateway {
    async fn submit_order(&self, order: &OrderIntent) -> Result<ActiveOrder, GatewayError> {
        let fill_price = match order.order_type {
            OrderType::Limit => order.price,
            OrderType::Market => self
                .reference_prices
                .read()
                .await
                .get(&order.symbol)
                .copied()
                .or(order.price),
        }
        .ok_or_else(|| {
            GatewayError::Transport(format!("no reference price for {}", order.symbol))
        })?;

        let status = self
            .scripted_statuses
            .write()
            .await
            .pop_front()
            .unwrap_or(OrderStatus::Filled);

        let now = Utc::now();
        let (filled_qty, avg_fill_price) = match status {
            OrderStatus::Filled => (order.quantity, fill_price),
            OrderStatus::PartiallyFilled => (order.quantity / Decimal::TWO, fill_price),
            _ => (Decimal::ZERO, Decimal::ZERO),
        };
        let active = ActiveOrder {
            order_id: Uuid::new_v4().to_string(),
            intent_id: order.client_intent_id,
            order: order.clone(),
            status,
            filled_qty,
            avg_fill_price,
            created_at: now,
            updated_at: Some(now),
        };
        self.submitted.write().await.push(active.clone());
        tracing::info!(
            order_id = %active.order_id,
            symbol = %order.symbol,
            status = ?status,
            "paper order submitted"
        );
        Ok(active)
    }

    async fn cancel_order(&self, order_id: &str) -> Result<(), GatewayError> {
        tracing::info!(order_id, "paper order cancelled");
        Ok(())
    }
}
