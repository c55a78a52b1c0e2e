// =============================================================================
// Decision validation — §4.1 rules applied to each AI-emitted decision
// =============================================================================

use crate::config::TraderConfig;
use crate::types::{Action, Decision};

const MIN_REWARD_RISK: f64 = 3.0;
const SIZE_TOLERANCE: f64 = 1.01;

/// Validate one decision against account equity and trader config. Returns
/// `Err(reason)` for a decision that must be rejected outright.
pub fn validate(decision: &Decision, equity: f64, config: &TraderConfig) -> Result<(), String> {
    if !decision.action.is_open() {
        return Ok(());
    }

    let cap = config.leverage_cap_for(&decision.symbol);
    let leverage = decision
        .leverage
        .ok_or_else(|| "open_* decision missing leverage".to_string())?;
    if leverage < 1 || leverage > cap {
        return Err(format!("leverage {leverage} outside [1, {cap}]"));
    }

    let size = decision
        .position_size_usd
        .ok_or_else(|| "open_* decision missing position_size_usd".to_string())?;
    if size <= 0.0 {
        return Err("position size must be > 0".to_string());
    }
    let max_ratio = config.max_position_ratio_for(&decision.symbol);
    let max_size = equity * max_ratio * SIZE_TOLERANCE;
    if size > max_size {
        return Err(format!(
            "position size {size:.2} exceeds cap {max_size:.2} ({max_ratio}x equity + 1% tolerance)"
        ));
    }

    let stop = decision
        .stop_loss
        .ok_or_else(|| "open_* decision missing stop_loss".to_string())?;
    let take_profit = decision
        .take_profit
        .ok_or_else(|| "open_* decision missing take_profit".to_string())?;
    if stop <= 0.0 || take_profit <= 0.0 {
        return Err("stop_loss and take_profit must be > 0".to_string());
    }

    // Entry is assumed at 20% of the stop->tp range, per §4.1.
    let (lo, hi) = if stop < take_profit { (stop, take_profit) } else { (take_profit, stop) };
    let entry_estimate = lo + 0.20 * (hi - lo);

    match decision.action {
        Action::OpenLong => {
            if !(stop < entry_estimate && entry_estimate < take_profit) {
                return Err("long requires stop_loss < entry_estimate < take_profit".to_string());
            }
        }
        Action::OpenShort => {
            if !(take_profit < entry_estimate && entry_estimate < stop) {
                return Err("short requires take_profit < entry_estimate < stop_loss".to_string());
            }
        }
        _ => unreachable!("is_open() already filtered to open_long/open_short"),
    }

    let risk = (entry_estimate - stop).abs();
    let reward = (take_profit - entry_estimate).abs();
    if risk <= 0.0 || reward / risk < MIN_REWARD_RISK {
        return Err(format!(
            "reward:risk {:.2} below minimum {MIN_REWARD_RISK}",
            if risk > 0.0 { reward / risk } else { 0.0 }
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> TraderConfig {
        TraderConfig::default()
    }

    fn long_decision(leverage: u32, size: f64, stop: f64, tp: f64) -> Decision {
        Decision {
            action: Action::OpenLong,
            symbol: "BTCUSDT".into(),
            leverage: Some(leverage),
            position_size_usd: Some(size),
            stop_loss: Some(stop),
            take_profit: Some(tp),
            confidence: Some(80.0),
            risk_usd: Some(5.0),
            reasoning: "x".into(),
        }
    }

    #[test]
    fn valid_long_passes() {
        // entry_estimate = 95 + 0.2*(115-95) = 99; risk=4, reward=16, rr=4.0
        let d = long_decision(5, 100.0, 95.0, 115.0);
        assert!(validate(&d, 1000.0, &config()).is_ok());
    }

    #[test]
    fn leverage_above_cap_rejected() {
        let d = long_decision(50, 100.0, 95.0, 115.0);
        assert!(validate(&d, 1000.0, &config()).is_err());
    }

    #[test]
    fn oversized_position_rejected() {
        let d = long_decision(5, 20_000.0, 95.0, 115.0);
        assert!(validate(&d, 1000.0, &config()).is_err());
    }

    #[test]
    fn wrong_ordering_is_rejected_even_with_positive_stop_and_tp() {
        // stop above take_profit for a long is an invalid ordering, not a
        // reward:risk shortfall — the fixed 20%-of-range entry estimate makes
        // rr a constant 4.0 whenever ordering holds.
        let d = long_decision(5, 100.0, 115.0, 95.0);
        assert!(validate(&d, 1000.0, &config()).is_err());
    }

    #[test]
    fn wait_decision_always_valid() {
        let d = Decision::wait("BTCUSDT", "no edge");
        assert!(validate(&d, 1000.0, &config()).is_ok());
    }

    #[test]
    fn short_requires_reversed_ordering() {
        let mut d = long_decision(5, 100.0, 115.0, 95.0);
        d.action = Action::OpenShort;
        assert!(validate(&d, 1000.0, &config()).is_ok());
    }
}
