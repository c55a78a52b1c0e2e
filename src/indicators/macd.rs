// =============================================================================
// Moving Average Convergence/Divergence (MACD)
// =============================================================================
//
// MACD line = EMA12 - EMA26. Signal line = EMA9 of the MACD line. This module
// only exposes the MACD line value, which is all the decision pipeline and
// technical-confirmation gate consume.
// =============================================================================

use super::ema::calculate_ema;

/// Compute the MACD line series (EMA12 - EMA26) for the given closes.
///
/// Returns an empty vec when there is insufficient data for the slow EMA.
pub fn calculate_macd(closes: &[f64]) -> Vec<f64> {
    if closes.len() < 26 {
        return Vec::new();
    }

    let ema12 = calculate_ema(closes, 12);
    let ema26 = calculate_ema(closes, 26);

    // ema12 is longer than ema26 by (26-12) leading values; align on the tail.
    let offset = ema12.len().saturating_sub(ema26.len());
    ema12[offset..]
        .iter()
        .zip(ema26.iter())
        .map(|(&fast, &slow)| fast - slow)
        .collect()
}

/// Most recent MACD value, or `None` if there isn't enough data.
pub fn current_macd(closes: &[f64]) -> Option<f64> {
    calculate_macd(closes).last().copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn macd_insufficient_data() {
        let closes: Vec<f64> = (1..=20).map(|x| x as f64).collect();
        assert!(calculate_macd(&closes).is_empty());
    }

    #[test]
    fn macd_ascending_is_positive() {
        let closes: Vec<f64> = (1..=100).map(|x| x as f64).collect();
        let macd = current_macd(&closes).unwrap();
        assert!(macd > 0.0, "expected positive MACD on an uptrend, got {macd}");
    }

    #[test]
    fn macd_descending_is_negative() {
        let closes: Vec<f64> = (1..=100).rev().map(|x| x as f64).collect();
        let macd = current_macd(&closes).unwrap();
        assert!(macd < 0.0, "expected negative MACD on a downtrend, got {macd}");
    }

    #[test]
    fn macd_flat_is_near_zero() {
        let closes = vec![100.0; 100];
        let macd = current_macd(&closes).unwrap();
        assert!(macd.abs() < 1e-9);
    }
}
