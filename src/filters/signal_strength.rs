// =============================================================================
// Gate 4 — Signal strength
// =============================================================================
//
// Three-dimension model (trend 40 / momentum 30 / structure 30) is
// authoritative; the legacy four-dimension model is retained for back-compat
// comparison logging only (§4.2). Thresholds shift with rolling Sharpe.
// =============================================================================

use super::FilterContext;
use crate::types::{Action, Decision};

#[derive(Debug, Clone, Copy)]
pub struct SignalScore {
    pub total: f64,
    pub direction: i8,
}

/// Three-dimension signal-strength score (authoritative).
pub fn score_three_dim(md: &crate::types::MarketData) -> SignalScore {
    let mut total = 0.0;
    let mut votes = 0i32;

    // Trend: 20 for price>EMA20, 20 for MACD>0.
    if md.price > md.ema20 {
        total += 20.0;
        votes += 1;
    }
    if md.macd > 0.0 {
        total += 20.0;
        votes += 1;
    }
    if md.price < md.ema20 {
        votes -= 1;
    }
    if md.macd < 0.0 {
        votes -= 1;
    }

    // Momentum: 15 for RSI7 in neutral band, 15 for elevated current volume.
    if md.rsi7 > 30.0 && md.rsi7 < 70.0 {
        total += 15.0;
    }
    if md.avg_volume > 0.0 && md.current_volume > 1.5 * md.avg_volume {
        total += 15.0;
    }

    // Structure: 15 for proximity to recent 50-point high/low band, 15 for
    // RSI7 in the wide band.
    if let (Some(&hi), Some(&lo)) = (
        md.intraday_prices.iter().rev().take(50).fold(None, |acc: Option<&f64>, x| {
            Some(match acc {
                Some(m) if m >= x => m,
                _ => x,
            })
        }).as_ref(),
        md.intraday_prices.iter().rev().take(50).fold(None, |acc: Option<&f64>, x| {
            Some(match acc {
                Some(m) if m <= x => m,
                _ => x,
            })
        }).as_ref(),
    ) {
        let range = hi - lo;
        if range > 0.0 {
            let pos_from_low = (md.price - lo) / range;
            if pos_from_low <= 0.20 {
                total += 15.0;
                votes += 1;
            } else if pos_from_low >= 0.80 {
                total += 15.0;
                votes -= 1;
            }
        }
    }
    if md.rsi7 > 20.0 && md.rsi7 < 80.0 {
        total += 15.0;
    }

    let direction = votes.signum() as i8;
    SignalScore { total, direction }
}

/// Legacy four-dimension model, kept for backward-compat comparison only;
/// its output is never authoritative for the gate decision (§4.2).
pub fn score_legacy_four_dim(md: &crate::types::MarketData) -> f64 {
    let trend = if md.price > md.ema20 { 25.0 } else { 0.0 };
    let momentum = if md.macd > 0.0 { 25.0 } else { 0.0 };
    let oscillator = if md.rsi14 > 30.0 && md.rsi14 < 70.0 { 25.0 } else { 0.0 };
    let volume = if md.current_volume > md.avg_volume { 25.0 } else { 0.0 };
    trend + momentum + oscillator + volume
}

fn thresholds_for_sharpe(sharpe: f64) -> (f64, f64) {
    if sharpe < -0.3 {
        (70.0, 0.70)
    } else if sharpe <= 0.0 {
        (65.0, 0.65)
    } else {
        (60.0, 0.60)
    }
}

pub fn gate(decision: &Decision, ctx: &FilterContext) -> Option<String> {
    let score = score_three_dim(ctx.market_data);
    let _legacy = score_legacy_four_dim(ctx.market_data);
    let (score_threshold, confidence_threshold) = thresholds_for_sharpe(ctx.rolling_sharpe);

    if score.total < score_threshold {
        return Some(format!(
            "score {:.1} below threshold {:.1}",
            score.total, score_threshold
        ));
    }

    let confidence = decision.confidence.unwrap_or(0.0) / 100.0;
    if confidence < confidence_threshold {
        return Some(format!(
            "confidence {:.2} below threshold {:.2}",
            confidence, confidence_threshold
        ));
    }

    let expected_direction: i8 = match decision.action {
        Action::OpenLong => 1,
        Action::OpenShort => -1,
        _ => 0,
    };
    if score.direction != expected_direction {
        return Some(format!(
            "signal direction {} does not match decision direction {}",
            score.direction, expected_direction
        ));
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::MarketData;

    fn bullish_md() -> MarketData {
        MarketData {
            symbol: "BTCUSDT".into(),
            price: 110.0,
            change_1h_pct: 0.0,
            change_4h_pct: 0.0,
            change_24h_pct: 0.0,
            ema20: 100.0,
            macd: 1.0,
            rsi7: 45.0,
            rsi14: 45.0,
            intraday_prices: (0..60).map(|i| 90.0 + i as f64 * 0.3).collect(),
            atr3: 1.0,
            atr14: 1.0,
            open_interest_series: vec![],
            volume_24h: 0.0,
            current_volume: 2000.0,
            avg_volume: 1000.0,
        }
    }

    #[test]
    fn thresholds_tighten_with_negative_sharpe() {
        let (s, c) = thresholds_for_sharpe(-0.5);
        assert_eq!(s, 70.0);
        assert!((c - 0.70).abs() < f64::EPSILON);
        let (s, c) = thresholds_for_sharpe(0.5);
        assert_eq!(s, 60.0);
        assert!((c - 0.60).abs() < f64::EPSILON);
    }

    #[test]
    fn bullish_market_scores_positive_direction() {
        let md = bullish_md();
        let score = score_three_dim(&md);
        assert!(score.total > 0.0);
    }

    #[test]
    fn legacy_score_independent_of_new_model() {
        let md = bullish_md();
        let legacy = score_legacy_four_dim(&md);
        assert!((0.0..=100.0).contains(&legacy));
    }
}
