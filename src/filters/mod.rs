// =============================================================================
// Decision-filter pipeline — nine gates applied to every open_* decision
// =============================================================================
//
// Each gate returns `Option<String>` — `None` to pass, `Some(reason)` to
// reject — mirroring the teacher's `SmartFilterEngine::evaluate` shape. A
// reject downgrades the decision to `wait` via `Decision::downgrade_to_wait`;
// non-open decisions bypass the pipeline entirely.
// =============================================================================

pub mod correlation;
pub mod drawdown_sizing;
pub mod market_environment;
pub mod progressive_sizing;
pub mod regime_sizing;
pub mod signal_strength;
pub mod stop_tightening;
pub mod technical_confirmation;

use tracing::info;

use crate::regime::detector::MarketRegime;
use crate::types::{Decision, MarketData, PositionSnapshot};

/// Everything a gate needs to evaluate one decision. Built fresh per decision
/// by the trader cycle before entering the pipeline.
pub struct FilterContext<'a> {
    pub equity: f64,
    pub existing_positions: &'a [PositionSnapshot],
    pub market_data: &'a MarketData,
    pub all_market_data: &'a std::collections::HashMap<String, MarketData>,
    pub regime: MarketRegime,
    pub regime_confidence: f64,
    pub rolling_sharpe: f64,
    pub correlation_reject_threshold: f64,
    pub economic_data_window: bool,
}

/// Run the full nine-gate pipeline against `decision`, mutating it in place
/// if any gate rejects. Returns `true` if the decision survived unchanged.
pub fn run_pipeline(decision: &mut Decision, ctx: &FilterContext) -> bool {
    if !decision.action.is_open() {
        return true;
    }

    let gates: [(&str, fn(&Decision, &FilterContext) -> Option<String>); 5] = [
        ("market_environment", market_environment::gate_1_environment),
        ("correlation", correlation::gate),
        ("signal_strength", signal_strength::gate),
        ("technical_confirmation", technical_confirmation::gate),
        ("market_environment_block", market_environment::gate_9_block),
    ];

    for (name, gate) in gates {
        if let Some(reason) = gate(decision, ctx) {
            info!(symbol = %decision.symbol, gate = name, reason = %reason, "decision blocked");
            decision.downgrade_to_wait(format!("{name}: {reason}"));
            return false;
        }
    }

    // Sizing / tightening gates mutate the decision's numeric fields rather
    // than outright rejecting (unless they hit a hard zero).
    if let Some(reason) = progressive_sizing::gate(decision, ctx) {
        info!(symbol = %decision.symbol, gate = "progressive_sizing", reason = %reason, "decision blocked");
        decision.downgrade_to_wait(format!("progressive_sizing: {reason}"));
        return false;
    }
    progressive_sizing::apply_override(decision, ctx);

    regime_sizing::apply(decision, ctx);
    drawdown_sizing::apply(decision, ctx);
    stop_tightening::apply(decision, ctx);

    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Action;
    use std::collections::HashMap;

    fn sample_market_data(symbol: &str) -> MarketData {
        MarketData {
            symbol: symbol.to_string(),
            price: 100.0,
            change_1h_pct: 0.0,
            change_4h_pct: 0.0,
            change_24h_pct: 0.0,
            ema20: 98.0,
            macd: 0.5,
            rsi7: 25.0,
            rsi14: 40.0,
            intraday_prices: (0..60).map(|i| 90.0 + i as f64).collect(),
            atr3: 1.0,
            atr14: 1.2,
            open_interest_series: vec![20_000_000.0, 21_000_000.0],
            volume_24h: 1_000_000.0,
            current_volume: 2000.0,
            avg_volume: 1000.0,
        }
    }

    fn sample_decision() -> Decision {
        Decision {
            action: Action::OpenLong,
            symbol: "SOLUSDT".to_string(),
            leverage: Some(3),
            position_size_usd: Some(400.0),
            stop_loss: Some(98.0),
            take_profit: Some(112.0),
            confidence: Some(85.0),
            risk_usd: Some(48.0),
            reasoning: "breakout".to_string(),
        }
    }

    #[test]
    fn pipeline_passes_clean_long_setup() {
        let md = sample_market_data("SOLUSDT");
        let all = HashMap::new();
        let mut decision = sample_decision();
        let ctx = FilterContext {
            equity: 1000.0,
            existing_positions: &[],
            market_data: &md,
            all_market_data: &all,
            regime: MarketRegime::Trending,
            regime_confidence: 0.8,
            rolling_sharpe: 0.5,
            correlation_reject_threshold: 0.80,
            economic_data_window: false,
        };
        let survived = run_pipeline(&mut decision, &ctx);
        assert!(survived);
        assert!(decision.action.is_open());
    }

    #[test]
    fn pipeline_non_open_bypasses_gates() {
        let md = sample_market_data("SOLUSDT");
        let all = HashMap::new();
        let mut decision = Decision::wait("SOLUSDT", "no edge");
        let ctx = FilterContext {
            equity: 1000.0,
            existing_positions: &[],
            market_data: &md,
            all_market_data: &all,
            regime: MarketRegime::Dead,
            regime_confidence: 0.0,
            rolling_sharpe: -1.0,
            correlation_reject_threshold: 0.80,
            economic_data_window: true,
        };
        assert!(run_pipeline(&mut decision, &ctx));
    }

    #[test]
    fn pipeline_rejects_low_regime_confidence() {
        let md = sample_market_data("SOLUSDT");
        let all = HashMap::new();
        let mut decision = sample_decision();
        let ctx = FilterContext {
            equity: 1000.0,
            existing_positions: &[],
            market_data: &md,
            all_market_data: &all,
            regime: MarketRegime::Ranging,
            regime_confidence: 0.3,
            rolling_sharpe: 0.5,
            correlation_reject_threshold: 0.80,
            economic_data_window: false,
        };
        let survived = run_pipeline(&mut decision, &ctx);
        assert!(!survived);
        assert_eq!(decision.action, Action::Wait);
    }
}
