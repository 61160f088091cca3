//! Execution module
//!
//! The order/position state machine: turns approved risk decisions into
//! gateway orders, tracks fills, and drives every exit path.

mod engine;
mod paper;
mod sync;
mod types;

pub use engine::{ExecutionEngine, DEFAULT_ENTRY_TTL_SECS, DEFAULT_TIME_STOP_BAR_SECS};
pub use paper::PaperGateway;
pub use sync::{snapshot_to_position, sync_positions, PositionFetcher, RawPositionSnapshot};
pub use types::{
    ActiveOrder, EntryIntent, ExecutionEvent, ExecutionReport, GatewayError, IntentStatus,
    OrderId, OrderIntent, OrderStatus, OrderType, TimeInForce,
};

use async_trait::async_trait;

/// Abstracts "place/cancel order on the exchange".
///
/// Implementations are exchange REST integrations or the paper gateway.
/// Failures come back as values; the engine converts them into locally
/// rejected intents instead of propagating.
#[async_trait]
pub trait OrderGateway: Send + Sync {
    /// Submit an order, returning the exchange's view of it
    async fn submit_order(&self, order: &OrderIntent) -> Result<ActiveOrder, GatewayError>;
    /// Cancel a resting order by exchange id
    async fn cancel_order(&self, order_id: &str) -> Result<(), GatewayError>;
}
