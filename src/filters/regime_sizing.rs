// =============================================================================
// Gate 6 — Regime sizing
// =============================================================================
//
// Mutates position size by market regime. Volatile regimes shrink size;
// low-confidence Squeeze (the "uncertain" breakout-pending state) rejects
// outright rather than sizing down, since direction itself is unreliable.
// =============================================================================

use super::FilterContext;
use crate::regime::detector::MarketRegime;
use crate::types::Decision;

const VOLATILE_SIZE_FACTOR: f64 = 0.70;
const SQUEEZE_MIN_CONFIDENCE: f64 = 80.0;

pub fn apply(decision: &mut Decision, ctx: &FilterContext) {
    if ctx.regime == MarketRegime::Squeeze
        && decision.confidence.unwrap_or(0.0) < SQUEEZE_MIN_CONFIDENCE
    {
        decision.downgrade_to_wait(format!(
            "regime squeeze with confidence {:.1} below {:.1}",
            decision.confidence.unwrap_or(0.0),
            SQUEEZE_MIN_CONFIDENCE
        ));
        return;
    }

    if ctx.regime == MarketRegime::Volatile {
        if let Some(size) = decision.position_size_usd {
            decision.position_size_usd = Some(size * VOLATILE_SIZE_FACTOR);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Action, MarketData};
    use std::collections::HashMap;

    fn base_ctx<'a>(
        regime: MarketRegime,
        md: &'a MarketData,
        all: &'a HashMap<String, MarketData>,
    ) -> FilterContext<'a> {
        FilterContext {
            equity: 1000.0,
            existing_positions: &[],
            market_data: md,
            all_market_data: all,
            regime,
            regime_confidence: 0.9,
            rolling_sharpe: 0.0,
            correlation_reject_threshold: 0.8,
            economic_data_window: false,
        }
    }

    fn md() -> MarketData {
        MarketData {
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
        }
    }

    fn decision() -> Decision {
        Decision {
            action: Action::OpenLong,
            symbol: "BTCUSDT".into(),
            leverage: Some(3),
            position_size_usd: Some(100.0),
            stop_loss: Some(98.0),
            take_profit: Some(110.0),
            confidence: Some(85.0),
            risk_usd: Some(20.0),
            reasoning: "x".into(),
        }
    }

    #[test]
    fn volatile_regime_shrinks_size() {
        let m = md();
        let all = HashMap::new();
        let c = base_ctx(MarketRegime::Volatile, &m, &all);
        let mut d = decision();
        apply(&mut d, &c);
        assert!((d.position_size_usd.unwrap() - 70.0).abs() < 1e-9);
    }

    #[test]
    fn low_confidence_squeeze_is_rejected() {
        let m = md();
        let all = HashMap::new();
        let c = base_ctx(MarketRegime::Squeeze, &m, &all);
        let mut d = decision();
        d.confidence = Some(50.0);
        apply(&mut d, &c);
        assert_eq!(d.action, Action::Wait);
    }

    #[test]
    fn trending_regime_leaves_size_untouched() {
        let m = md();
        let all = HashMap::new();
        let c = base_ctx(MarketRegime::Trending, &m, &all);
        let mut d = decision();
        apply(&mut d, &c);
        assert_eq!(d.position_size_usd, Some(100.0));
    }
}
