// =============================================================================
// Global risk manager — aggregates the four modules into a level + latch
// =============================================================================

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use super::sharpe::SharpeState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => Self::Low,
            1 => Self::Medium,
            2 => Self::High,
            _ => Self::Critical,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            Self::Low => 0,
            Self::Medium => 1,
            Self::High => 2,
            Self::Critical => 3,
        }
    }
}

pub struct GlobalRiskManager {
    max_drawdown_pct: RwLock<f64>,
    emergency_stop_enabled: AtomicBool,
    emergency_stop: AtomicBool,
    last_level: AtomicU8,
}

impl GlobalRiskManager {
    pub fn new(max_drawdown_pct: f64, emergency_stop_enabled: bool) -> Self {
        Self {
            max_drawdown_pct: RwLock::new(max_drawdown_pct),
            emergency_stop_enabled: AtomicBool::new(emergency_stop_enabled),
            emergency_stop: AtomicBool::new(false),
            last_level: AtomicU8::new(RiskLevel::Low.as_u8()),
        }
    }

    /// Live-update the hot-reloadable limits without disturbing the latch.
    pub fn update_limits(&self, max_drawdown_pct: f64, emergency_stop_enabled: bool) {
        *self.max_drawdown_pct.write() = max_drawdown_pct;
        self.emergency_stop_enabled
            .store(emergency_stop_enabled, Ordering::SeqCst);
        info!(
            max_drawdown_pct,
            emergency_stop_enabled, "global risk manager: limits hot-reloaded"
        );
    }

    pub fn is_emergency_stopped(&self) -> bool {
        self.emergency_stop.load(Ordering::SeqCst)
    }

    /// Risk level as of the last `evaluate()` call, for status reporting.
    pub fn current_level(&self) -> RiskLevel {
        RiskLevel::from_u8(self.last_level.load(Ordering::SeqCst))
    }

    pub fn force_emergency_stop(&self) {
        self.emergency_stop.store(true, Ordering::SeqCst);
        error!("global risk manager: emergency stop forced");
    }

    pub fn clear_emergency_stop(&self) {
        self.emergency_stop.store(false, Ordering::SeqCst);
        warn!("global risk manager: emergency stop cleared");
    }

    /// Score and classify the aggregate risk level; latches EmergencyStop
    /// when the level reaches `critical` and the latch is enabled.
    pub fn evaluate(
        &self,
        drawdown: f64,
        blacklist_size: usize,
        active_alert_count: usize,
        sharpe_state: SharpeState,
    ) -> RiskLevel {
        let mut score = 0.0;

        let max_drawdown_pct = *self.max_drawdown_pct.read();
        let drawdown_ratio = if max_drawdown_pct > 0.0 {
            drawdown / max_drawdown_pct
        } else {
            0.0
        };
        score += drawdown_ratio.min(1.5) * 40.0;
        score += (blacklist_size as f64).min(5.0) * 5.0;
        score += (active_alert_count as f64).min(10.0) * 2.0;
        score += match sharpe_state {
            SharpeState::Excellent | SharpeState::Good => 0.0,
            SharpeState::Neutral => 5.0,
            SharpeState::Poor => 15.0,
            SharpeState::VeryPoor => 25.0,
        };

        let level = if score >= 80.0 {
            RiskLevel::Critical
        } else if score >= 50.0 {
            RiskLevel::High
        } else if score >= 25.0 {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        };

        self.last_level.store(level.as_u8(), Ordering::SeqCst);

        if level == RiskLevel::Critical && self.emergency_stop_enabled.load(Ordering::SeqCst) {
            self.force_emergency_stop();
        }

        level
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn low_everything_yields_low_risk() {
        let grm = GlobalRiskManager::new(0.15, true);
        let level = grm.evaluate(0.0, 0, 0, SharpeState::Good);
        assert_eq!(level, RiskLevel::Low);
        assert!(!grm.is_emergency_stopped());
    }

    #[test]
    fn severe_drawdown_with_poor_sharpe_latches_emergency_stop() {
        let grm = GlobalRiskManager::new(0.15, true);
        let level = grm.evaluate(0.30, 4, 8, SharpeState::VeryPoor);
        assert_eq!(level, RiskLevel::Critical);
        assert!(grm.is_emergency_stopped());
        assert_eq!(grm.current_level(), RiskLevel::Critical);
    }

    #[test]
    fn disabled_latch_never_engages() {
        let grm = GlobalRiskManager::new(0.15, false);
        grm.evaluate(0.30, 4, 8, SharpeState::VeryPoor);
        assert!(!grm.is_emergency_stopped());
    }

    #[test]
    fn update_limits_changes_the_drawdown_threshold_live() {
        let grm = GlobalRiskManager::new(0.50, true);
        assert_eq!(grm.evaluate(0.30, 0, 0, SharpeState::Good), RiskLevel::Low);
        grm.update_limits(0.15, true);
        assert_eq!(grm.evaluate(0.30, 0, 0, SharpeState::Good), RiskLevel::High);
    }

    #[test]
    fn manual_clear_resets_latch() {
        let grm = GlobalRiskManager::new(0.15, true);
        grm.force_emergency_stop();
        assert!(grm.is_emergency_stopped());
        grm.clear_emergency_stop();
        assert!(!grm.is_emergency_stopped());
    }
}
