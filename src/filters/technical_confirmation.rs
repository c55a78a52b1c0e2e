// =============================================================================
// Gate 5 — Technical confirmation
// =============================================================================

use super::FilterContext;
use crate::types::{Action, Decision};

pub fn gate(decision: &Decision, ctx: &FilterContext) -> Option<String> {
    let md = ctx.market_data;
    match decision.action {
        Action::OpenLong => {
            let ratio = if md.ema20 > 0.0 { md.price / md.ema20 } else { 0.0 };
            if ratio < 1.01 {
                return Some(format!("price/EMA20 {ratio:.4} < 1.01"));
            }
            if md.rsi7 >= 30.0 {
                return Some(format!("RSI7 {:.1} not < 30", md.rsi7));
            }
            if md.macd <= 0.0 {
                return Some(format!("MACD {:.4} not > 0", md.macd));
            }
            None
        }
        Action::OpenShort => {
            let ratio = if md.ema20 > 0.0 { md.price / md.ema20 } else { f64::MAX };
            if ratio > 0.99 {
                return Some(format!("price/EMA20 {ratio:.4} > 0.99"));
            }
            if md.rsi7 <= 70.0 {
                return Some(format!("RSI7 {:.1} not > 70", md.rsi7));
            }
            if md.macd >= 0.0 {
                return Some(format!("MACD {:.4} not < 0", md.macd));
            }
            None
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::MarketData;
    use std::collections::HashMap;

    fn md(price: f64, ema20: f64, rsi7: f64, macd: f64) -> MarketData {
        MarketData {
            symbol: "BTCUSDT".into(),
            price,
            change_1h_pct: 0.0,
            change_4h_pct: 0.0,
            change_24h_pct: 0.0,
            ema20,
            macd,
            rsi7,
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

    fn ctx<'a>(md: &'a MarketData, all: &'a HashMap<String, MarketData>) -> FilterContext<'a> {
        FilterContext {
            equity: 1000.0,
            existing_positions: &[],
            market_data: md,
            all_market_data: all,
            regime: crate::regime::detector::MarketRegime::Trending,
            regime_confidence: 0.9,
            rolling_sharpe: 0.0,
            correlation_reject_threshold: 0.8,
            economic_data_window: false,
        }
    }

    #[test]
    fn long_confirmed_when_all_three_align() {
        let m = md(102.0, 100.0, 25.0, 0.5);
        let all = HashMap::new();
        let c = ctx(&m, &all);
        let mut d = Decision::wait("BTCUSDT", "x");
        d.action = Action::OpenLong;
        assert!(gate(&d, &c).is_none());
    }

    #[test]
    fn long_rejected_when_rsi_not_oversold() {
        let m = md(102.0, 100.0, 50.0, 0.5);
        let all = HashMap::new();
        let c = ctx(&m, &all);
        let mut d = Decision::wait("BTCUSDT", "x");
        d.action = Action::OpenLong;
        assert!(gate(&d, &c).is_some());
    }

    #[test]
    fn short_confirmed_when_all_three_align() {
        let m = md(98.0, 100.0, 75.0, -0.5);
        let all = HashMap::new();
        let c = ctx(&m, &all);
        let mut d = Decision::wait("BTCUSDT", "x");
        d.action = Action::OpenShort;
        assert!(gate(&d, &c).is_none());
    }
}
