// =============================================================================
// Gate 1 / Gate 9 — Market environment
// =============================================================================
//
// Gate 1 runs first and also checks correlation exposure against existing
// positions (a simple exposure count, distinct from gate 3's pairwise
// correlation-matrix check). Gate 9 runs last as a final Sharpe-aware block.
// =============================================================================

use super::FilterContext;
use crate::types::Decision;

const MIN_REGIME_CONFIDENCE: f64 = 0.50;
const MIN_SHARPE_FOR_TRADING: f64 = -0.05;

pub fn gate_1_environment(_decision: &Decision, ctx: &FilterContext) -> Option<String> {
    if ctx.regime_confidence < MIN_REGIME_CONFIDENCE {
        return Some(format!(
            "regime confidence {:.2} below {:.2}",
            ctx.regime_confidence, MIN_REGIME_CONFIDENCE
        ));
    }
    if ctx.economic_data_window {
        return Some("economic data window active".to_string());
    }
    if ctx.existing_positions.len() >= 5 {
        return Some(format!(
            "correlation exposure: {} existing positions already open",
            ctx.existing_positions.len()
        ));
    }
    None
}

pub fn gate_9_block(_decision: &Decision, ctx: &FilterContext) -> Option<String> {
    if ctx.regime_confidence < MIN_REGIME_CONFIDENCE {
        return Some(format!(
            "regime confidence {:.2} below {:.2}",
            ctx.regime_confidence, MIN_REGIME_CONFIDENCE
        ));
    }
    if ctx.rolling_sharpe < MIN_SHARPE_FOR_TRADING {
        return Some(format!(
            "rolling Sharpe {:.3} below {:.3}",
            ctx.rolling_sharpe, MIN_SHARPE_FOR_TRADING
        ));
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::regime::detector::MarketRegime;
    use crate::types::{Action, MarketData};
    use std::collections::HashMap;

    fn ctx(regime_confidence: f64, sharpe: f64, econ_window: bool, positions: usize) -> (Vec<crate::types::PositionSnapshot>, MarketData, HashMap<String, MarketData>) {
        let md = MarketData {
            symbol: "BTCUSDT".into(),
            price: 100.0,
            change_1h_pct: 0.0,
            change_4h_pct: 0.0,
            change_24h_pct: 0.0,
            ema20: 100.0,
            macd: 0.0,
            rsi7: 50.0,
            rsi14: 50.0,
            intraday_prices: vec![],
            atr3: 1.0,
            atr14: 1.0,
            open_interest_series: vec![],
            volume_24h: 0.0,
            current_volume: 0.0,
            avg_volume: 0.0,
        };
        let pos = (0..positions)
            .map(|i| crate::types::PositionSnapshot {
                symbol: format!("SYM{i}"),
                side: crate::types::Side::Long,
                entry_price: 1.0,
                mark_price: 1.0,
                quantity: 1.0,
                leverage: 1,
                unrealized_pnl: 0.0,
                unrealized_pnl_pct: 0.0,
                liquidation_price: 0.0,
                margin_used: 0.0,
                opened_at: "".into(),
            })
            .collect();
        let _ = (regime_confidence, sharpe, econ_window);
        (pos, md, HashMap::new())
    }

    fn decision() -> Decision {
        Decision::wait("BTCUSDT", "x")
    }

    #[test]
    fn gate1_rejects_low_confidence() {
        let (pos, md, all) = ctx(0.3, 0.1, false, 0);
        let fc = FilterContext {
            equity: 1000.0,
            existing_positions: &pos,
            market_data: &md,
            all_market_data: &all,
            regime: MarketRegime::Ranging,
            regime_confidence: 0.3,
            rolling_sharpe: 0.1,
            correlation_reject_threshold: 0.8,
            economic_data_window: false,
        };
        let mut d = decision();
        d.action = Action::OpenLong;
        assert!(gate_1_environment(&d, &fc).is_some());
    }

    #[test]
    fn gate9_rejects_negative_sharpe() {
        let (pos, md, all) = ctx(0.9, -0.1, false, 0);
        let fc = FilterContext {
            equity: 1000.0,
            existing_positions: &pos,
            market_data: &md,
            all_market_data: &all,
            regime: MarketRegime::Trending,
            regime_confidence: 0.9,
            rolling_sharpe: -0.1,
            correlation_reject_threshold: 0.8,
            economic_data_window: false,
        };
        let mut d = decision();
        d.action = Action::OpenLong;
        assert!(gate_9_block(&d, &fc).is_some());
    }

    #[test]
    fn gate9_passes_healthy_conditions() {
        let (pos, md, all) = ctx(0.9, 0.5, false, 0);
        let fc = FilterContext {
            equity: 1000.0,
            existing_positions: &pos,
            market_data: &md,
            all_market_data: &all,
            regime: MarketRegime::Trending,
            regime_confidence: 0.9,
            rolling_sharpe: 0.5,
            correlation_reject_threshold: 0.8,
            economic_data_window: false,
        };
        let mut d = decision();
        d.action = Action::OpenLong;
        assert!(gate_9_block(&d, &fc).is_none());
    }
}
