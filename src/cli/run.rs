//! Run command implementation

use async_trait::async_trait;
use clap::Args;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::config::{Config, ExecutionMode};
use crate::engine::{NullSignalSource, TradingLoop};
use crate::execution::{ExecutionEngine, PaperGateway};
use crate::market::{MarketDataSource, MarketState};
use crate::risk::RiskEngine;
use crate::runtime::{ControlPlane, RuntimeStore};

/// Placeholder data source until a feed adapter is plugged in; the loop
/// runs and manages nothing.
struct IdleMarketSource;

#[async_trait]
impl MarketDataSource for IdleMarketSource {
    async fn snapshot(&mut self) -> anyhow::Result<HashMap<String, MarketState>> {
        Ok(HashMap::new())
    }
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Start with entries enabled regardless of persisted state
    #[arg(long)]
    pub enable_trading: bool,
}

impl RunArgs {
    pub async fn execute(&self, config: &Config) -> anyhow::Result<()> {
        if config.execution.mode == ExecutionMode::Live {
            anyhow::bail!("live mode requires an exchange gateway; only paper mode is wired");
        }

        let store = RuntimeStore::new(&config.engine.runtime_dir);
        let mut params = store.load()?;
        if self.enable_trading {
            params.trading_enabled = true;
        }
        store.save(&params)?;
        let control = ControlPlane::new(params);

        let limits = config.limits();
        let risk = RiskEngine::new(
            limits.clone(),
            config.priorities(),
            config.risk.session_tz_offset_minutes,
        );
        let execution = ExecutionEngine::with_settings(
            Arc::new(PaperGateway::new()),
            limits,
            config.execution.default_entry_ttl_secs,
            config.execution.time_stop_bar_secs,
        );

        let mut trading = TradingLoop::new(
            risk,
            execution,
            IdleMarketSource,
            NullSignalSource,
            control,
            Duration::from_secs(config.engine.cycle_interval_secs),
        );
        trading.run().await
    }
}
