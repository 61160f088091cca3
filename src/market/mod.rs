//! Market snapshot contract
//!
//! Per-symbol state delivered once per cycle by the market-data
//! collaborator. The engines only read the fields below; indicator
//! computation lives outside this crate.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Snapshot of one symbol's market state for the current cycle
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketState {
    /// Contract symbol
    pub symbol: String,
    /// Snapshot timestamp
    pub timestamp: DateTime<Utc>,
    /// Mid price
    pub mid_price: Decimal,
    /// Bid/ask spread in basis points
    pub spread_bps: Decimal,
    /// Aggregate quote notional within ±1% of mid
    pub depth_pm1_quote: Decimal,
    /// Trailing 5-minute ATR, absent while the indicator warms up
    pub atr_5m: Option<Decimal>,
    /// Trailing average execution slippage in bps
    pub avg_slippage_bps: Decimal,
}

impl MarketState {
    /// Expected entry slippage used by the risk-stage filter:
    /// the worse of observed slippage and half the spread.
    pub fn expected_entry_slippage_bps(&self) -> Decimal {
        self.avg_slippage_bps.max(self.spread_bps * dec!(0.5))
    }
}

/// Source of per-cycle market snapshots
#[async_trait]
pub trait MarketDataSource: Send + Sync {
    /// Refresh and return the latest snapshot for every tracked symbol
    async fn snapshot(&mut self) -> anyhow::Result<HashMap<String, MarketState>>;
}
