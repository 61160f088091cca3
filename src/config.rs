//! Configuration types for bybit-intraday

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::PathBuf;

use crate::risk::RiskLimits;

/// Root configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub risk: RiskSettings,
    pub execution: ExecutionSettings,
    pub engine: EngineSettings,
    pub telemetry: TelemetryConfig,
    /// Strategy registry keyed by strategy id
    #[serde(default)]
    pub strategies: HashMap<String, StrategySettings>,
}

/// Risk management configuration
#[derive(Debug, Clone, Deserialize)]
pub struct RiskSettings {
    pub equity: Decimal,
    pub per_trade_risk_pct: Decimal,
    pub max_daily_loss_pct: Decimal,
    pub max_concurrent_positions: usize,
    #[serde(default = "default_cooldown_min")]
    pub cooldown_after_loss_min: i64,
    #[serde(default = "default_max_leverage")]
    pub max_leverage: Decimal,
    /// Expected-slippage cap in bps; omit to disable the filter
    #[serde(default)]
    pub max_slippage_bps: Option<Decimal>,
    #[serde(default)]
    pub symbol_max_notional: HashMap<String, Decimal>,
    /// Session timezone as a fixed UTC offset; sessions roll at its
    /// local midnight
    #[serde(default = "default_session_tz_offset")]
    pub session_tz_offset_minutes: i32,
}

/// Execution engine configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ExecutionSettings {
    pub mode: ExecutionMode,
    #[serde(default = "default_entry_ttl_secs")]
    pub default_entry_ttl_secs: i64,
    #[serde(default = "default_time_stop_bar_secs")]
    pub time_stop_bar_secs: i64,
}

/// Execution mode: paper trading or live
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    Paper,
    Live,
}

/// Trading loop configuration
#[derive(Debug, Clone, Deserialize)]
pub struct EngineSettings {
    #[serde(default = "default_cycle_interval_secs")]
    pub cycle_interval_secs: u64,
    /// Directory for persisted runtime state
    #[serde(default = "default_runtime_dir")]
    pub runtime_dir: PathBuf,
}

/// Telemetry configuration
#[derive(Debug, Clone, Deserialize)]
pub struct TelemetryConfig {
    pub log_level: String,
    #[serde(default)]
    pub log_json: bool,
}

/// Per-strategy configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StrategySettings {
    /// Conflict-resolution priority; lower wins
    pub priority: u32,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_cooldown_min() -> i64 {
    30
}

fn default_max_leverage() -> Decimal {
    dec!(5)
}

fn default_session_tz_offset() -> i32 {
    180
}

fn default_entry_ttl_secs() -> i64 {
    300
}

fn default_time_stop_bar_secs() -> i64 {
    300
}

fn default_cycle_interval_secs() -> u64 {
    5
}

fn default_runtime_dir() -> PathBuf {
    PathBuf::from("runtime")
}

fn default_true() -> bool {
    true
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<std::path::Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Risk limits seeded from the risk section
    pub fn limits(&self) -> RiskLimits {
        RiskLimits {
            equity: self.risk.equity,
            per_trade_risk_pct: self.risk.per_trade_risk_pct,
            max_daily_loss_pct: self.risk.max_daily_loss_pct,
            max_concurrent_positions: self.risk.max_concurrent_positions,
            cooldown_after_loss_min: self.risk.cooldown_after_loss_min,
            max_leverage: self.risk.max_leverage,
            max_slippage_bps: self.risk.max_slippage_bps,
            symbol_max_notional: self.risk.symbol_max_notional.clone(),
        }
    }

    /// Conflict-resolution priorities for enabled strategies
    pub fn priorities(&self) -> HashMap<String, u32> {
        self.strategies
            .iter()
            .filter(|(_, settings)| settings.enabled)
            .map(|(id, settings)| (id.clone(), settings.priority))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
        [risk]
        equity = 10000
        per_trade_risk_pct = 0.0035
        max_daily_loss_pct = 0.015
        max_concurrent_positions = 2
        max_slippage_bps = 8

        [risk.symbol_max_notional]
        BTCUSDT = 30000

        [execution]
        mode = "paper"

        [engine]
        cycle_interval_secs = 5

        [telemetry]
        log_level = "info"

        [strategies.trend_a]
        priority = 1

        [strategies.meanrev_b]
        priority = 2
        enabled = false
    "#;

    #[test]
    fn test_config_deserialize() {
        let config: Config = toml::from_str(SAMPLE).unwrap();
        assert_eq!(config.risk.equity, dec!(10000));
        assert_eq!(config.risk.cooldown_after_loss_min, 30);
        assert_eq!(config.risk.session_tz_offset_minutes, 180);
        assert_eq!(config.execution.mode, ExecutionMode::Paper);
        assert_eq!(config.execution.default_entry_ttl_secs, 300);
        assert_eq!(config.engine.cycle_interval_secs, 5);
        assert!(!config.telemetry.log_json);
    }

    #[test]
    fn test_limits_from_config() {
        let config: Config = toml::from_str(SAMPLE).unwrap();
        let limits = config.limits();
        assert_eq!(limits.max_slippage_bps, Some(dec!(8)));
        assert_eq!(limits.symbol_max_notional["BTCUSDT"], dec!(30000));
        assert_eq!(limits.max_leverage, dec!(5));
    }

    #[test]
    fn test_priorities_skip_disabled_strategies() {
        let config: Config = toml::from_str(SAMPLE).unwrap();
        let priorities = config.priorities();
        assert_eq!(priorities.get("trend_a"), Some(&1));
        assert!(!priorities.contains_key("meanrev_b"));
    }

    #[test]
    fn test_load_missing_file() {
        let result = Config::load("/nonexistent/path/config.toml");
        assert!(result.is_err());
    }
}
