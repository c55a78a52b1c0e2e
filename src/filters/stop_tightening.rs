// =============================================================================
// Gate 8 — Stop tightening
// =============================================================================
//
// Tightens the stop-loss distance by volatility regime. If tightening would
// break the original risk:reward ratio, take-profit is re-derived to hold a
// 3:1 reward:risk.
// =============================================================================

use super::FilterContext;
use crate::regime::detector::MarketRegime;
use crate::types::{Action, Decision};

const REWARD_RISK_RATIO: f64 = 3.0;

fn max_stop_pct(regime: MarketRegime) -> f64 {
    match regime {
        MarketRegime::Volatile => 0.0200,
        MarketRegime::Dead => 0.0150,
        _ => 0.0175,
    }
}

pub fn apply(decision: &mut Decision, ctx: &FilterContext) {
    let (Some(entry), Some(stop)) = (Some(ctx.market_data.price), decision.stop_loss) else {
        return;
    };
    if entry <= 0.0 {
        return;
    }

    let cap_pct = max_stop_pct(ctx.regime);
    let current_pct = ((entry - stop) / entry).abs();
    if current_pct <= cap_pct {
        return;
    }

    let tightened_stop = match decision.action {
        Action::OpenLong => entry * (1.0 - cap_pct),
        Action::OpenShort => entry * (1.0 + cap_pct),
        _ => return,
    };
    decision.stop_loss = Some(tightened_stop);

    let stop_distance = (entry - tightened_stop).abs();
    if let Some(tp) = decision.take_profit {
        let reward_distance = (tp - entry).abs();
        let implied_ratio = if stop_distance > 0.0 {
            reward_distance / stop_distance
        } else {
            REWARD_RISK_RATIO
        };
        if implied_ratio < REWARD_RISK_RATIO {
            decision.take_profit = Some(match decision.action {
                Action::OpenLong => entry + stop_distance * REWARD_RISK_RATIO,
                Action::OpenShort => entry - stop_distance * REWARD_RISK_RATIO,
                _ => tp,
            });
        }
    }
}
