// =============================================================================
// Liquidity monitor — per-symbol OI-based liquidity level + blacklist
// =============================================================================
//
// Four liquidity levels classify a symbol's open interest in USD: High >=
// 50M, Medium >= 15M, Low >= 10M, Critical < 10M. Crossing into Critical
// force-closes the symbol and blacklists it for a TTL; level changes and
// rapid OI declines (>20% between two observations) each raise their own
// alert, subject to a per-(symbol, kind) cooldown so a flapping reading
// doesn't spam the log.
// =============================================================================

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::warn;

const HIGH_OI_USD: f64 = 50_000_000.0;
const MEDIUM_OI_USD: f64 = 15_000_000.0;
const LOW_OI_USD: f64 = 10_000_000.0;
const RAPID_DECLINE_PCT: f64 = 0.20;
pub const BLACKLIST_TTL_HOURS: i64 = 24;
const ALERT_COOLDOWN_MINUTES: i64 = 15;
const MAX_ALERTS: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LiquidityLevel {
    High,
    Medium,
    Low,
    Critical,
}

fn classify_level(oi_usd: f64) -> LiquidityLevel {
    if oi_usd >= HIGH_OI_USD {
        LiquidityLevel::High
    } else if oi_usd >= MEDIUM_OI_USD {
        LiquidityLevel::Medium
    } else if oi_usd >= LOW_OI_USD {
        LiquidityLevel::Low
    } else {
        LiquidityLevel::Critical
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LiquidityAlertKind {
    Threshold,
    RapidDecline,
    ForceClose,
}

/// A liquidity alert is a point-in-time log entry rather than an ongoing
/// condition, so `resolved_at` is always set equal to `created_at`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiquidityAlert {
    pub symbol: String,
    pub kind: LiquidityAlertKind,
    pub level: LiquidityLevel,
    pub message: String,
    pub created_at: DateTime<Utc>,
    pub resolved_at: DateTime<Utc>,
}

#[derive(Clone, Copy)]
struct SymbolState {
    last_oi_usd: f64,
    level: LiquidityLevel,
}

struct Inner {
    blacklist: HashMap<String, DateTime<Utc>>,
    symbols: HashMap<String, SymbolState>,
    last_alert_at: HashMap<(String, LiquidityAlertKind), DateTime<Utc>>,
    alerts: Vec<LiquidityAlert>,
}

pub struct LiquidityMonitor {
    state: RwLock<Inner>,
}

impl LiquidityMonitor {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(Inner {
                blacklist: HashMap::new(),
                symbols: HashMap::new(),
                last_alert_at: HashMap::new(),
                alerts: Vec::new(),
            }),
        }
    }

    /// Manually blacklist `symbol` for the default TTL — an operator override
    /// outside the force-close path triggered by `observe`.
    pub fn blacklist(&self, symbol: &str) {
        let mut s = self.state.write();
        let expires_at = Utc::now() + Duration::hours(BLACKLIST_TTL_HOURS);
        warn!(symbol, "liquidity monitor: symbol blacklisted");
        s.blacklist.insert(symbol.to_string(), expires_at);
    }

    pub fn unblacklist(&self, symbol: &str) {
        self.state.write().blacklist.remove(symbol);
    }

    /// True if `symbol` is blacklisted; lazily expires the entry past its TTL.
    pub fn is_blacklisted(&self, symbol: &str) -> bool {
        let mut s = self.state.write();
        let expired = matches!(s.blacklist.get(symbol), Some(exp) if *exp <= Utc::now());
        if expired {
            s.blacklist.remove(symbol);
        }
        s.blacklist.contains_key(symbol)
    }

    pub fn is_critical(&self, symbol: &str) -> bool {
        self.state
            .read()
            .symbols
            .get(symbol)
            .map(|s| s.level == LiquidityLevel::Critical)
            .unwrap_or(false)
    }

    pub fn blacklist_size(&self) -> usize {
        let now = Utc::now();
        self.state
            .read()
            .blacklist
            .values()
            .filter(|exp| **exp > now)
            .count()
    }

    pub fn active_alert_count(&self) -> usize {
        self.state.read().alerts.len()
    }

    pub fn recent_alerts(&self, limit: usize) -> Vec<LiquidityAlert> {
        let s = self.state.read();
        s.alerts.iter().rev().take(limit).cloned().collect()
    }

    fn cooldown_elapsed(
        last_alert_at: &mut HashMap<(String, LiquidityAlertKind), DateTime<Utc>>,
        symbol: &str,
        kind: LiquidityAlertKind,
    ) -> bool {
        let key = (symbol.to_string(), kind);
        let now = Utc::now();
        if let Some(last) = last_alert_at.get(&key) {
            if now.signed_duration_since(*last) < Duration::minutes(ALERT_COOLDOWN_MINUTES) {
                return false;
            }
        }
        last_alert_at.insert(key, now);
        true
    }

    /// Evaluate a fresh OI×price reading. Returns the alerts newly raised by
    /// this observation — empty if the level is unchanged, the decline is
    /// below threshold, and no relevant cooldown has elapsed.
    pub fn observe(&self, symbol: &str, oi_value_usd: f64) -> Vec<LiquidityAlert> {
        let mut s = self.state.write();
        let now = Utc::now();
        let level = classify_level(oi_value_usd);
        let prior = s.symbols.get(symbol).copied();
        let mut raised = Vec::new();

        if prior.map(|p| p.level) != Some(level)
            && Self::cooldown_elapsed(&mut s.last_alert_at, symbol, LiquidityAlertKind::Threshold)
        {
            raised.push(LiquidityAlert {
                symbol: symbol.to_string(),
                kind: LiquidityAlertKind::Threshold,
                level,
                message: format!(
                    "{symbol} liquidity level changed to {level:?} (OI ${oi_value_usd:.0})"
                ),
                created_at: now,
                resolved_at: now,
            });
        }

        if let Some(prior) = prior {
            if prior.last_oi_usd > 0.0 {
                let decline = (prior.last_oi_usd - oi_value_usd) / prior.last_oi_usd;
                if decline >= RAPID_DECLINE_PCT
                    && Self::cooldown_elapsed(
                        &mut s.last_alert_at,
                        symbol,
                        LiquidityAlertKind::RapidDecline,
                    )
                {
                    raised.push(LiquidityAlert {
                        symbol: symbol.to_string(),
                        kind: LiquidityAlertKind::RapidDecline,
                        level,
                        message: format!(
                            "{symbol} OI dropped {:.1}% in one observation (${:.0} -> ${:.0})",
                            decline * 100.0,
                            prior.last_oi_usd,
                            oi_value_usd
                        ),
                        created_at: now,
                        resolved_at: now,
                    });
                }
            }
        }

        if level == LiquidityLevel::Critical {
            if Self::cooldown_elapsed(&mut s.last_alert_at, symbol, LiquidityAlertKind::ForceClose)
            {
                raised.push(LiquidityAlert {
                    symbol: symbol.to_string(),
                    kind: LiquidityAlertKind::ForceClose,
                    level,
                    message: format!(
                        "{symbol} OI ${oi_value_usd:.0} below critical floor ${LOW_OI_USD:.0}, forcing close and blacklisting"
                    ),
                    created_at: now,
                    resolved_at: now,
                });
            }
            let expires_at = now + Duration::hours(BLACKLIST_TTL_HOURS);
            s.blacklist.insert(symbol.to_string(), expires_at);
        }

        s.symbols.insert(
            symbol.to_string(),
            SymbolState {
                last_oi_usd: oi_value_usd,
                level,
            },
        );

        if !raised.is_empty() {
            s.alerts.extend(raised.clone());
            while s.alerts.len() > MAX_ALERTS {
                s.alerts.remove(0);
            }
        }

        raised
    }
}

impl Default for LiquidityMonitor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn below_floor_marks_critical_and_blacklists() {
        let lm = LiquidityMonitor::new();
        lm.observe("XYZUSDT", 9_000_000.0);
        assert!(lm.is_critical("XYZUSDT"));
        assert!(lm.is_blacklisted("XYZUSDT"));
    }

    #[test]
    fn above_floor_is_not_critical() {
        let lm = LiquidityMonitor::new();
        lm.observe("BTCUSDT", 500_000_000.0);
        assert!(!lm.is_critical("BTCUSDT"));
        assert!(!lm.is_blacklisted("BTCUSDT"));
    }

    #[test]
    fn recovering_above_floor_clears_critical_but_not_the_blacklist() {
        let lm = LiquidityMonitor::new();
        lm.observe("XYZUSDT", 9_000_000.0);
        assert!(lm.is_critical("XYZUSDT"));
        lm.observe("XYZUSDT", 20_000_000.0);
        assert!(!lm.is_critical("XYZUSDT"));
        // The force-close blacklist survives recovery until its TTL expires.
        assert!(lm.is_blacklisted("XYZUSDT"));
    }

    #[test]
    fn manual_blacklist_is_independent_of_critical() {
        let lm = LiquidityMonitor::new();
        lm.blacklist("BADCOIN");
        assert!(lm.is_blacklisted("BADCOIN"));
        assert!(!lm.is_critical("BADCOIN"));
        assert_eq!(lm.blacklist_size(), 1);
    }

    #[test]
    fn level_change_raises_a_threshold_alert_once() {
        let lm = LiquidityMonitor::new();
        let first = lm.observe("ETHUSDT", 500_000_000.0);
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].kind, LiquidityAlertKind::Threshold);
        let same_level = lm.observe("ETHUSDT", 480_000_000.0);
        assert!(same_level.is_empty());
    }

    #[test]
    fn rapid_decline_raises_its_own_alert_even_without_a_level_change() {
        let lm = LiquidityMonitor::new();
        lm.observe("ETHUSDT", 500_000_000.0);
        let alerts = lm.observe("ETHUSDT", 390_000_000.0); // -22%, still High
        assert!(alerts
            .iter()
            .any(|a| a.kind == LiquidityAlertKind::RapidDecline));
    }

    #[test]
    fn crossing_critical_raises_force_close_and_blacklists() {
        let lm = LiquidityMonitor::new();
        lm.observe("XYZUSDT", 20_000_000.0);
        let alerts = lm.observe("XYZUSDT", 5_000_000.0);
        assert!(alerts
            .iter()
            .any(|a| a.kind == LiquidityAlertKind::ForceClose));
        assert!(lm.is_blacklisted("XYZUSDT"));
    }

    #[test]
    fn cooldown_suppresses_repeat_force_close_alerts() {
        let lm = LiquidityMonitor::new();
        lm.observe("XYZUSDT", 5_000_000.0);
        let alerts = lm.observe("XYZUSDT", 4_000_000.0);
        assert!(!alerts
            .iter()
            .any(|a| a.kind == LiquidityAlertKind::ForceClose));
    }

    #[test]
    fn alerts_are_self_resolved_at_creation() {
        let lm = LiquidityMonitor::new();
        let alerts = lm.observe("ETHUSDT", 500_000_000.0);
        assert!(alerts.iter().all(|a| a.resolved_at >= a.created_at));
    }
}
