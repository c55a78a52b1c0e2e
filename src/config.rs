// =============================================================================
// Configuration — per-trader settings and engine-level settings
// =============================================================================
//
// Persistence uses an atomic tmp + rename pattern to prevent corruption on
// crash. All fields carry `#[serde(default)]` so that adding new fields never
// breaks loading an older config file.
// =============================================================================

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::types::{AccountMode, TradingMode};

fn default_scan_interval_minutes() -> u64 {
    15
}

fn default_btc_eth_leverage_cap() -> u32 {
    10
}

fn default_altcoin_leverage_cap() -> u32 {
    5
}

fn default_initial_balance() -> f64 {
    1000.0
}

fn default_true() -> bool {
    true
}

fn default_ai_provider() -> String {
    "qwen".to_string()
}

/// Immutable-after-load identity and tunables for a single trader.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraderConfig {
    pub id: String,
    pub name: String,

    #[serde(default)]
    pub account_mode: AccountMode,
    #[serde(default)]
    pub trading_mode: TradingMode,

    #[serde(default = "default_ai_provider")]
    pub ai_provider: String,

    #[serde(default = "default_initial_balance")]
    pub initial_balance: f64,

    #[serde(default = "default_scan_interval_minutes")]
    pub scan_interval_minutes: u64,

    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_btc_eth_leverage_cap")]
    pub btc_eth_leverage_cap: u32,

    #[serde(default = "default_altcoin_leverage_cap")]
    pub altcoin_leverage_cap: u32,
}

impl Default for TraderConfig {
    fn default() -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: "trader".to_string(),
            account_mode: AccountMode::Demo,
            trading_mode: TradingMode::Paused,
            ai_provider: default_ai_provider(),
            initial_balance: default_initial_balance(),
            scan_interval_minutes: default_scan_interval_minutes(),
            enabled: true,
            btc_eth_leverage_cap: default_btc_eth_leverage_cap(),
            altcoin_leverage_cap: default_altcoin_leverage_cap(),
        }
    }
}

impl TraderConfig {
    pub fn leverage_cap_for(&self, symbol: &str) -> u32 {
        if symbol.starts_with("BTC") || symbol.starts_with("ETH") {
            self.btc_eth_leverage_cap
        } else {
            self.altcoin_leverage_cap
        }
    }

    /// Maximum position-size-to-equity ratio for the symbol, with a 1%
    /// tolerance applied by the caller (see decision validation rules).
    pub fn max_position_ratio_for(&self, symbol: &str) -> f64 {
        if symbol.starts_with("BTC") || symbol.starts_with("ETH") {
            10.0
        } else {
            1.5
        }
    }
}

/// Top-level, process-wide engine configuration (governs all traders and the
/// risk-v2 singleton). Every field has a serde default so older JSON files
/// missing new fields still deserialise correctly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub traders: Vec<TraderConfig>,

    /// Minimum OI value (price * OI units) in USD for a non-position candidate
    /// to be considered; positions are exempt.
    #[serde(default = "default_liquidity_floor_usd")]
    pub liquidity_floor_usd: f64,

    /// Minimum |correlation| against an existing position that rejects a new
    /// candidate.
    #[serde(default = "default_correlation_reject_threshold")]
    pub correlation_reject_threshold: f64,

    #[serde(default = "default_true")]
    pub risk_v2_enabled: bool,

    #[serde(default = "default_config_dir")]
    pub risk_v2_config_dir: String,
}

fn default_liquidity_floor_usd() -> f64 {
    15_000_000.0
}

fn default_correlation_reject_threshold() -> f64 {
    0.80
}

fn default_config_dir() -> String {
    "config/risk_v2".to_string()
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            traders: Vec::new(),
            liquidity_floor_usd: default_liquidity_floor_usd(),
            correlation_reject_threshold: default_correlation_reject_threshold(),
            risk_v2_enabled: true,
            risk_v2_config_dir: default_config_dir(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from a JSON file at `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read engine config from {}", path.display()))?;
        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse engine config from {}", path.display()))?;
        info!(path = %path.display(), traders = config.traders.len(), "engine config loaded");
        Ok(config)
    }

    /// Persist the current configuration to `path` using an atomic write
    /// (write to `.tmp`, then rename).
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let content = serde_json::to_string_pretty(self)
            .context("failed to serialise engine config to JSON")?;

        let tmp_path = path.with_extension("json.tmp");
        std::fs::write(&tmp_path, &content)
            .with_context(|| format!("failed to write tmp config to {}", tmp_path.display()))?;
        std::fs::rename(&tmp_path, path)
            .with_context(|| format!("failed to rename tmp config to {}", path.display()))?;

        info!(path = %path.display(), "engine config saved (atomic)");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_expected_values() {
        let cfg = EngineConfig::default();
        assert!(cfg.traders.is_empty());
        assert!((cfg.liquidity_floor_usd - 15_000_000.0).abs() < f64::EPSILON);
        assert!((cfg.correlation_reject_threshold - 0.80).abs() < f64::EPSILON);
        assert!(cfg.risk_v2_enabled);
    }

    #[test]
    fn deserialise_empty_json_uses_defaults() {
        let cfg: EngineConfig = serde_json::from_str("{}").unwrap();
        assert!(cfg.traders.is_empty());
        assert!(cfg.risk_v2_enabled);
    }

    #[test]
    fn deserialise_partial_json_fills_defaults() {
        let json = r#"{ "liquidity_floor_usd": 20000000.0 }"#;
        let cfg: EngineConfig = serde_json::from_str(json).unwrap();
        assert!((cfg.liquidity_floor_usd - 20_000_000.0).abs() < f64::EPSILON);
        assert!((cfg.correlation_reject_threshold - 0.80).abs() < f64::EPSILON);
    }

    #[test]
    fn roundtrip_serialisation() {
        let mut cfg = EngineConfig::default();
        cfg.traders.push(TraderConfig {
            id: "t1".to_string(),
            name: "alpha".to_string(),
            ..Default::default()
        });
        let json = serde_json::to_string(&cfg).unwrap();
        let cfg2: EngineConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(cfg.traders.len(), cfg2.traders.len());
        assert_eq!(cfg2.traders[0].id, "t1");
    }

    #[test]
    fn trader_leverage_cap_by_symbol() {
        let cfg = TraderConfig::default();
        assert_eq!(cfg.leverage_cap_for("BTCUSDT"), 10);
        assert_eq!(cfg.leverage_cap_for("ETHUSDT"), 10);
        assert_eq!(cfg.leverage_cap_for("SOLUSDT"), 5);
    }

    #[test]
    fn trader_max_position_ratio_by_symbol() {
        let cfg = TraderConfig::default();
        assert!((cfg.max_position_ratio_for("BTCUSDT") - 10.0).abs() < f64::EPSILON);
        assert!((cfg.max_position_ratio_for("SOLUSDT") - 1.5).abs() < f64::EPSILON);
    }
}
