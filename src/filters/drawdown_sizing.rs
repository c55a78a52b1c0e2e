// =============================================================================
// Gate 7 — Drawdown sizing
// =============================================================================
//
// Negative rolling Sharpe caps size at 8% of equity. Independently, every
// decision is capped so that stop-distance risk never exceeds 2% of equity
// per trade, scaling size down proportionally rather than rejecting.
// =============================================================================

use super::FilterContext;
use crate::types::Decision;

const SHARPE_DRAWDOWN_CAP_PCT: f64 = 0.08;
const PER_TRADE_RISK_CAP_PCT: f64 = 0.02;

pub fn apply(decision: &mut Decision, ctx: &FilterContext) {
    let Some(mut size) = decision.position_size_usd else {
        return;
    };

    if ctx.rolling_sharpe < 0.0 {
        let cap = ctx.equity * SHARPE_DRAWDOWN_CAP_PCT;
        if size > cap {
            size = cap;
        }
    }

    if let (Some(entry), Some(stop)) = (Some(ctx.market_data.price), decision.stop_loss) {
        let stop_distance_pct = if entry > 0.0 {
            ((entry - stop) / entry).abs()
        } else {
            0.0
        };
        if stop_distance_pct > 0.0 {
            let risk_usd = size * stop_distance_pct;
            let risk_cap = ctx.equity * PER_TRADE_RISK_CAP_PCT;
            if risk_usd > risk_cap {
                size *= risk_cap / risk_usd;
            }
            decision.risk_usd = Some(size * stop_distance_pct);
        }
    }

    decision.position_size_usd = Some(size);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Action, MarketData};
    use std::collections::HashMap;

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

    fn ctx<'a>(sharpe: f64, md: &'a MarketData, all: &'a HashMap<String, MarketData>) -> FilterContext<'a> {
        FilterContext {
            equity: 1000.0,
            existing_positions: &[],
            market_data: md,
            all_market_data: all,
            regime: crate::regime::detector::MarketRegime::Trending,
            regime_confidence: 0.9,
            rolling_sharpe: sharpe,
            correlation_reject_threshold: 0.8,
            economic_data_window: false,
        }
    }

    fn decision(size: f64, stop: f64) -> Decision {
        Decision {
            action: Action::OpenLong,
            symbol: "BTCUSDT".into(),
            leverage: Some(3),
            position_size_usd: Some(size),
            stop_loss: Some(stop),
            take_profit: Some(110.0),
            confidence: Some(85.0),
            risk_usd: None,
            reasoning: "x".into(),
        }
    }

    #[test]
    fn negative_sharpe_caps_at_eight_percent_equity() {
        let m = md();
        let all = HashMap::new();
        let c = ctx(-0.5, &m, &all);
        let mut d = decision(500.0, 99.0);
        apply(&mut d, &c);
        assert!(d.position_size_usd.unwrap() <= 80.0 + 1e-9);
    }

    #[test]
    fn per_trade_risk_never_exceeds_two_percent_equity() {
        let m = md();
        let all = HashMap::new();
        let c = ctx(0.5, &m, &all);
        // 10% stop distance on a large size would blow past the 2% risk cap.
        let mut d = decision(500.0, 90.0);
        apply(&mut d, &c);
        assert!(d.risk_usd.unwrap() <= 20.0 + 1e-6);
    }

    #[test]
    fn positive_sharpe_no_stop_distance_leaves_size() {
        let m = md();
        let all = HashMap::new();
        let c = ctx(0.5, &m, &all);
        let mut d = decision(50.0, 100.0);
        apply(&mut d, &c);
        assert_eq!(d.position_size_usd, Some(50.0));
    }
}
