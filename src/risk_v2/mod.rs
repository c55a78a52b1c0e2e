// =============================================================================
// Risk-control v2 — orchestrator over five submodules plus an emergency latch
// =============================================================================
//
// Mirrors the teacher's `RiskEngine` shape (config fields alongside a
// `RwLock<Inner>`, a snapshot method, a manual `Debug` impl) but fans the
// decision out across independent modules rather than one flat counter set,
// the way an orchestrator-over-submodules composes in the wider ecosystem.
// =============================================================================

pub mod committee;
pub mod config_manager;
pub mod global_risk;
pub mod liquidity;
pub mod sharpe;
pub mod store;
pub mod time_manager;

use std::collections::HashMap;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::types::MarketData;

pub use committee::{AiCommitteeMode, CommitteeDecision};
pub use global_risk::RiskLevel;
pub use sharpe::SharpeState;

/// Intended action a trader cycle is asking risk-v2 to approve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntendedAction {
    OpenLong,
    OpenShort,
    CloseLong,
    CloseShort,
}

/// Outcome of a risk decision request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskAction {
    Allow,
    Block,
    ReduceSize,
    ForceClose,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskDecision {
    pub action: RiskAction,
    pub factors: Vec<String>,
    pub confidence: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskV2Config {
    pub max_drawdown_pct: f64,
    pub emergency_stop_enabled: bool,
    pub committee_mode: AiCommitteeMode,
    pub min_consensus_level: f64,
}

impl Default for RiskV2Config {
    fn default() -> Self {
        Self {
            max_drawdown_pct: 0.15,
            emergency_stop_enabled: true,
            committee_mode: AiCommitteeMode::Normal,
            min_consensus_level: 0.6,
        }
    }
}

/// Orchestrates the five risk-v2 modules and holds the emergency-stop latch.
pub struct RiskV2Engine {
    config: RwLock<RiskV2Config>,
    time_manager: time_manager::TimeManager,
    liquidity: liquidity::LiquidityMonitor,
    sharpe: sharpe::SharpeCalculator,
    committee: committee::AiCommittee,
    global: global_risk::GlobalRiskManager,
    store: store::DataStore,
    last_sharpe_state: RwLock<SharpeState>,
}

impl RiskV2Engine {
    pub fn new(config: RiskV2Config, watermark_buffer_pct: f64, starting_equity: f64) -> Self {
        info!(
            max_drawdown_pct = config.max_drawdown_pct,
            emergency_stop_enabled = config.emergency_stop_enabled,
            "risk-v2 engine initialised"
        );
        let committee = committee::AiCommittee::new(config.committee_mode, config.min_consensus_level);
        let global =
            global_risk::GlobalRiskManager::new(config.max_drawdown_pct, config.emergency_stop_enabled);
        Self {
            time_manager: time_manager::TimeManager::new(starting_equity, watermark_buffer_pct),
            liquidity: liquidity::LiquidityMonitor::new(),
            sharpe: sharpe::SharpeCalculator::new(50, 2),
            committee,
            global,
            store: store::DataStore::new(),
            last_sharpe_state: RwLock::new(SharpeState::Neutral),
            config: RwLock::new(config),
        }
    }

    pub fn time_manager(&self) -> &time_manager::TimeManager {
        &self.time_manager
    }

    pub fn liquidity(&self) -> &liquidity::LiquidityMonitor {
        &self.liquidity
    }

    pub fn sharpe(&self) -> &sharpe::SharpeCalculator {
        &self.sharpe
    }

    pub fn store(&self) -> &store::DataStore {
        &self.store
    }

    pub fn is_emergency_stopped(&self) -> bool {
        self.global.is_emergency_stopped()
    }

    pub fn current_level(&self) -> RiskLevel {
        self.global.current_level()
    }

    /// Operator-initiated clear of the emergency-stop latch via the control
    /// plane. Does not reset drawdown/liquidity state; the next
    /// `monitor_tick()` can re-latch immediately if conditions still warrant it.
    pub fn clear_emergency_stop(&self) {
        self.global.clear_emergency_stop();
    }

    /// Apply a freshly hot-reloaded config. Only the global-risk thresholds
    /// are live-reloadable; committee mode/consensus take effect on restart.
    pub fn update_config(&self, config: RiskV2Config) {
        self.global
            .update_limits(config.max_drawdown_pct, config.emergency_stop_enabled);
        self.store.append(
            "configs",
            serde_json::json!({
                "max_drawdown_pct": config.max_drawdown_pct,
                "emergency_stop_enabled": config.emergency_stop_enabled,
                "committee_mode": config.committee_mode,
                "min_consensus_level": config.min_consensus_level,
            }),
        );
        *self.config.write() = config;
    }

    /// Feed one candidate's OI×price reading into the liquidity monitor and
    /// persist any alerts it raises, including the blacklist entry a
    /// force-close alert implies.
    pub fn observe_liquidity(&self, symbol: &str, oi_value_usd: f64) {
        let alerts = self.liquidity.observe(symbol, oi_value_usd);
        for alert in alerts {
            self.store.append(
                "risk_alerts",
                serde_json::json!({
                    "symbol": alert.symbol,
                    "kind": alert.kind,
                    "level": alert.level,
                    "message": alert.message,
                    "created_at": alert.created_at,
                    "resolved_at": alert.resolved_at,
                }),
            );
            if alert.kind == liquidity::LiquidityAlertKind::ForceClose {
                self.store.append(
                    "blacklist_entries",
                    serde_json::json!({
                        "symbol": alert.symbol,
                        "created_at": alert.created_at,
                        "expires_at": alert.created_at
                            + chrono::Duration::hours(liquidity::BLACKLIST_TTL_HOURS),
                    }),
                );
            }
        }
    }

    /// Update equity-derived state (watermark, Sharpe) for a tick.
    pub fn on_equity_update(&self, equity: f64) {
        self.time_manager.on_equity_update(equity);
        self.sharpe.on_equity_update(equity);

        let new_state = self.sharpe.current_state();
        self.store.append(
            "sharpe_records",
            serde_json::json!({ "equity": equity, "state": new_state }),
        );
        let mut last_state = self.last_sharpe_state.write();
        if *last_state != new_state {
            self.store.append(
                "sharpe_state_transitions",
                serde_json::json!({ "from": *last_state, "to": new_state, "equity": equity }),
            );
            *last_state = new_state;
        }
    }

    /// Run the risk-v2 aggregation pass; call once per monitoring interval.
    pub fn monitor_tick(&self) {
        let drawdown = self.time_manager.current_drawdown();
        let blacklist_size = self.liquidity.blacklist_size();
        let alert_count = self.liquidity.active_alert_count();
        let sharpe_state = self.sharpe.current_state();
        let level = self
            .global
            .evaluate(drawdown, blacklist_size, alert_count, sharpe_state);
        self.store.append(
            "risk_levels",
            serde_json::json!({
                "level": level,
                "drawdown": drawdown,
                "blacklist_size": blacklist_size,
                "alert_count": alert_count,
            }),
        );
    }

    /// Request a risk decision for an intended action on `symbol`.
    pub async fn decide(
        &self,
        symbol: &str,
        action: IntendedAction,
        market_data: &HashMap<String, MarketData>,
    ) -> RiskDecision {
        let decision = self.decide_inner(symbol, action, market_data).await;
        self.store.append(
            "risk_decisions",
            serde_json::json!({
                "symbol": symbol,
                "intended_action": action,
                "action": decision.action,
                "factors": decision.factors,
                "confidence": decision.confidence,
            }),
        );
        decision
    }

    async fn decide_inner(
        &self,
        symbol: &str,
        action: IntendedAction,
        market_data: &HashMap<String, MarketData>,
    ) -> RiskDecision {
        if self.global.is_emergency_stopped() {
            warn!(symbol, "risk-v2: emergency stop latch engaged, blocking");
            return RiskDecision {
                action: RiskAction::Block,
                factors: vec!["emergency_stop".to_string()],
                confidence: 1.0,
            };
        }

        if self.liquidity.is_blacklisted(symbol) {
            return RiskDecision {
                action: RiskAction::Block,
                factors: vec!["blacklisted".to_string()],
                confidence: 1.0,
            };
        }
        if self.liquidity.is_critical(symbol) {
            return RiskDecision {
                action: RiskAction::Block,
                factors: vec!["liquidity_critical".to_string()],
                confidence: 1.0,
            };
        }

        let is_open = matches!(action, IntendedAction::OpenLong | IntendedAction::OpenShort);
        let mut factors = Vec::new();

        let (max_drawdown_pct, min_consensus_level) = {
            let cfg = self.config.read();
            (cfg.max_drawdown_pct, cfg.min_consensus_level)
        };

        let time_ok = self.time_manager.current_drawdown() < max_drawdown_pct;
        if !time_ok {
            factors.push("time_manager_drawdown".to_string());
        }
        let liquidity_ok = !self.liquidity.is_critical(symbol);
        if !liquidity_ok {
            factors.push("liquidity".to_string());
        }
        let sharpe_ok = !matches!(self.sharpe.current_state(), SharpeState::VeryPoor);
        if !sharpe_ok {
            factors.push("sharpe_state".to_string());
        }

        let mut consensus_ok = true;
        if is_open {
            let md = market_data.get(symbol);
            let committee_decision = self.committee.decide(symbol, md).await;
            self.store.append(
                "committee_decisions",
                serde_json::json!({
                    "symbol": symbol,
                    "action": committee_decision.action,
                    "consensus": committee_decision.consensus,
                    "confidence": committee_decision.confidence,
                }),
            );
            consensus_ok = committee_decision.consensus >= min_consensus_level
                && committee_decision.action != committee::CommitteeAction::Hold;
            if !consensus_ok {
                factors.push("ai_committee".to_string());
            }

            if time_ok && liquidity_ok && sharpe_ok && consensus_ok {
                return RiskDecision {
                    action: RiskAction::Allow,
                    factors,
                    confidence: committee_decision.confidence,
                };
            }
            if !(time_ok && liquidity_ok && sharpe_ok) || !consensus_ok {
                return RiskDecision {
                    action: RiskAction::Block,
                    factors,
                    confidence: 0.0,
                };
            }
        }

        if factors.len() >= 3 {
            return RiskDecision {
                action: RiskAction::ReduceSize,
                factors,
                confidence: 0.5,
            };
        }

        RiskDecision {
            action: RiskAction::Allow,
            factors,
            confidence: 0.8,
        }
    }
}
