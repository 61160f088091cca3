//! Startup reconciliation against the exchange's position list

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::collections::HashMap;

use crate::risk::PositionState;
use crate::signal::Side;

use super::types::GatewayError;

/// A position as the exchange reports it, before local enrichment.
#[derive(Debug, Clone)]
pub struct RawPositionSnapshot {
    pub symbol: String,
    pub side: Side,
    pub size: Decimal,
    pub entry_price: Decimal,
    /// Stop as resting on the exchange, when one exists
    pub sl_price: Option<Decimal>,
    /// Strategy tag recovered from order link ids, when available
    pub strategy_id: Option<String>,
    pub opened_at: Option<DateTime<Utc>>,
}

/// Read side of the exchange integration used at startup.
#[async_trait]
pub trait PositionFetcher: Send + Sync {
    async fn fetch_positions(&self) -> Result<Vec<RawPositionSnapshot>, GatewayError>;
}

/// Rebuild local state from an exchange snapshot. Entries with no
/// recoverable stop get one pinned at the entry price, which yields a
/// zero risk distance and keeps downstream sizing conservative.
pub fn snapshot_to_position(raw: &RawPositionSnapshot, now: DateTime<Utc>) -> PositionState {
    let sl_price = raw.sl_price.unwrap_or(raw.entry_price);
    let strategy_id = raw
        .strategy_id
        .clone()
        .unwrap_or_else(|| "unknown".to_string());
    PositionState::open(
        raw.symbol.clone(),
        strategy_id,
        raw.side,
        raw.size,
        raw.entry_price,
        raw.opened_at.unwrap_or(now),
        sl_price,
    )
}

/// Fetch and convert all live positions, skipping empty entries.
/// Idempotent: running it twice yields the same map.
pub async fn sync_positions(
    fetcher: &dyn PositionFetcher,
) -> Result<HashMap<String, PositionState>, GatewayError> {
    let now = Utc::now();
    let mut positions = HashMap::new();
    for raw in fetcher.fetch_positions().await? {
        if raw.size <= Decimal::ZERO {
            continue;
        }
        let position = snapshot_to_position(&raw, now);
        tracing::info!(
            symbol = %position.symbol,
            side = %position.side,
            size = %position.size,
            entry = %position.entry_price,
            sl = %position.current_sl_price,
            strategy = %position.strategy_id,
            "restored exchange position"
        );
        positions.insert(raw.symbol, position);
    }
    Ok(positions)
}
