// =============================================================================
// Gate 2 — Progressive sizing
// =============================================================================
//
// Derives a recommended position size from confidence, account equity,
// current exposure, and the ATR3/ATR14 volatility ratio. A recommendation of
// zero rejects the decision outright; otherwise the decision's size is
// overridden.
// =============================================================================

use super::FilterContext;
use crate::types::Decision;

pub fn recommend_size(
    confidence: f64,
    equity: f64,
    open_position_count: usize,
    atr3: f64,
    atr14: f64,
) -> f64 {
    if equity <= 0.0 || confidence <= 0.0 {
        return 0.0;
    }

    // Baseline: 2% of equity scaled linearly by confidence (0-100).
    let base = equity * 0.02 * (confidence / 100.0).clamp(0.0, 1.0);

    // More open positions already committed => smaller new size.
    let exposure_factor = 1.0 / (1.0 + open_position_count as f64 * 0.25);

    // Elevated short-term volatility (ATR3 >> ATR14) shrinks size.
    let vol_ratio = if atr14 > 0.0 { atr3 / atr14 } else { 1.0 };
    let vol_factor = if vol_ratio > 1.5 {
        0.5
    } else if vol_ratio > 1.2 {
        0.75
    } else {
        1.0
    };

    let size = base * exposure_factor * vol_factor;
    if size.is_finite() && size > 0.0 {
        size
    } else {
        0.0
    }
}

pub fn gate(decision: &Decision, ctx: &FilterContext) -> Option<String> {
    let confidence = decision.confidence.unwrap_or(0.0);
    let recommended = recommend_size(
        confidence,
        ctx.equity,
        ctx.existing_positions.len(),
        ctx.market_data.atr3,
        ctx.market_data.atr14,
    );

    if recommended <= 0.0 {
        return Some("progressive sizing recommender returned zero".to_string());
    }
    None
}

/// Mutating counterpart invoked by the pipeline after `gate` passes.
pub fn apply_override(decision: &mut Decision, ctx: &FilterContext) {
    let confidence = decision.confidence.unwrap_or(0.0);
    let recommended = recommend_size(
        confidence,
        ctx.equity,
        ctx.existing_positions.len(),
        ctx.market_data.atr3,
        ctx.market_data.atr14,
    );
    if recommended > 0.0 {
        decision.position_size_usd = Some(recommended);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_confidence_yields_zero_size() {
        assert_eq!(recommend_size(0.0, 1000.0, 0, 1.0, 1.0), 0.0);
    }

    #[test]
    fn zero_equity_yields_zero_size() {
        assert_eq!(recommend_size(80.0, 0.0, 0, 1.0, 1.0), 0.0);
    }

    #[test]
    fn higher_confidence_increases_size() {
        let low = recommend_size(40.0, 1000.0, 0, 1.0, 1.0);
        let high = recommend_size(90.0, 1000.0, 0, 1.0, 1.0);
        assert!(high > low);
    }

    #[test]
    fn more_open_positions_reduces_size() {
        let few = recommend_size(80.0, 1000.0, 0, 1.0, 1.0);
        let many = recommend_size(80.0, 1000.0, 4, 1.0, 1.0);
        assert!(many < few);
    }

    #[test]
    fn high_volatility_ratio_reduces_size() {
        let calm = recommend_size(80.0, 1000.0, 0, 1.0, 1.0);
        let volatile = recommend_size(80.0, 1000.0, 0, 2.0, 1.0);
        assert!(volatile < calm);
    }
}
