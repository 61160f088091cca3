//! Operator control plane
//!
//! A small set of runtime-adjustable parameters shared between the
//! trading loop and whatever front-end mutates them. Readers take a
//! snapshot at cycle start; writers swap fields under the same lock, so
//! a cycle never sees a half-applied update.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Parameters adjustable without a restart
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeParams {
    /// Master switch: false stops new entries, exits keep running
    pub trading_enabled: bool,
    pub equity: Decimal,
    pub per_trade_risk_pct: Decimal,
    pub max_concurrent_positions: usize,
    pub updated_at: DateTime<Utc>,
}

impl Default for RuntimeParams {
    fn default() -> Self {
        Self {
            trading_enabled: false,
            equity: dec!(10000),
            per_trade_risk_pct: dec!(0.0035),
            max_concurrent_positions: 2,
            updated_at: Utc::now(),
        }
    }
}

/// Shared handle over the runtime parameters
#[derive(Clone, Default)]
pub struct ControlPlane {
    params: Arc<RwLock<RuntimeParams>>,
}

impl ControlPlane {
    pub fn new(params: RuntimeParams) -> Self {
        Self {
            params: Arc::new(RwLock::new(params)),
        }
    }

    /// Consistent copy for one cycle
    pub async fn snapshot(&self) -> RuntimeParams {
        self.params.read().await.clone()
    }

    pub async fn set_trading_enabled(&self, enabled: bool) {
        let mut params = self.params.write().await;
        params.trading_enabled = enabled;
        params.updated_at = Utc::now();
        tracing::info!(enabled, "trading switch updated");
    }

    pub async fn set_equity(&self, equity: Decimal) {
        let mut params = self.params.write().await;
        params.equity = equity;
        params.updated_at = Utc::now();
    }

    pub async fn set_per_trade_risk_pct(&self, pct: Decimal) {
        let mut params = self.params.write().await;
        params.per_trade_risk_pct = pct;
        params.updated_at = Utc::now();
    }

    pub async fn set_max_concurrent_positions(&self, count: usize) {
        let mut params = self.params.write().await;
        params.max_concurrent_positions = count;
        params.updated_at = Utc::now();
    }

    /// Replace everything at once, e.g. after loading from disk
    pub async fn replace(&self, new_params: RuntimeParams) {
        *self.params.write().await = new_params;
    }
}

/// JSON persistence for runtime parameters across restarts
pub struct RuntimeStore {
    path: PathBuf,
}

impl RuntimeStore {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            path: dir.as_ref().join("runtime_params.json"),
        }
    }

    /// Load persisted parameters; a missing file yields defaults
    pub fn load(&self) -> anyhow::Result<RuntimeParams> {
        if !self.path.exists() {
            tracing::debug!(path = %self.path.display(), "no runtime state on disk, using defaults");
            return Ok(RuntimeParams::default());
        }
        let raw = std::fs::read_to_string(&self.path)?;
        let params = serde_json::from_str(&raw)?;
        Ok(params)
    }

    pub fn save(&self, params: &RuntimeParams) -> anyhow::Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let raw = serde_json::to_string_pretty(params)?;
        std::fs::write(&self.path, raw)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_snapshot_reflects_updates() {
        let control = ControlPlane::default();
        assert!(!control.snapshot().await.trading_enabled);

        control.set_trading_enabled(true).await;
        control.set_equity(dec!(25000)).await;
        control.set_max_concurrent_positions(4).await;

        let snapshot = control.snapshot().await;
        assert!(snapshot.trading_enabled);
        assert_eq!(snapshot.equity, dec!(25000));
        assert_eq!(snapshot.max_concurrent_positions, 4);
    }

    #[tokio::test]
    async fn test_snapshot_is_a_copy() {
        let control = ControlPlane::default();
        let before = control.snapshot().await;
        control.set_equity(dec!(99999)).await;
        // The earlier snapshot is unaffected by later writes
        assert_eq!(before.equity, dec!(10000));
    }

    #[test]
    fn test_store_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = RuntimeStore::new(dir.path());

        // Missing file: defaults
        let loaded = store.load().unwrap();
        assert!(!loaded.trading_enabled);

        let params = RuntimeParams {
            trading_enabled: true,
            equity: dec!(15000),
            ..RuntimeParams::default()
        };
        store.save(&params).unwrap();
        let loaded = store.load().unwrap();
        assert!(loaded.trading_enabled);
        assert_eq!(loaded.equity, dec!(15000));
    }
}
