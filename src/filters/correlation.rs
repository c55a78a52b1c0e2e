// =============================================================================
// Gate 3 — Correlation
// =============================================================================
//
// Rejects a candidate whose intraday price series is highly correlated
// (|rho| >= threshold) with any currently-held position.
// =============================================================================

use tracing::warn;

use super::FilterContext;
use crate::types::Decision;

/// Pearson correlation coefficient of two equal-length series. Returns `None`
/// if either series has zero variance or the lengths don't match.
pub fn pearson_correlation(a: &[f64], b: &[f64]) -> Option<f64> {
    let n = a.len().min(b.len());
    if n < 2 {
        return None;
    }
    let a = &a[a.len() - n..];
    let b = &b[b.len() - n..];

    let mean_a = a.iter().sum::<f64>() / n as f64;
    let mean_b = b.iter().sum::<f64>() / n as f64;

    let mut cov = 0.0;
    let mut var_a = 0.0;
    let mut var_b = 0.0;
    for i in 0..n {
        let da = a[i] - mean_a;
        let db = b[i] - mean_b;
        cov += da * db;
        var_a += da * da;
        var_b += db * db;
    }

    if var_a == 0.0 || var_b == 0.0 {
        return None;
    }

    let rho = cov / (var_a.sqrt() * var_b.sqrt());
    if rho.is_finite() {
        Some(rho)
    } else {
        None
    }
}

pub fn gate(decision: &Decision, ctx: &FilterContext) -> Option<String> {
    for position in ctx.existing_positions {
        if position.symbol == decision.symbol {
            continue;
        }
        let Some(other_md) = ctx.all_market_data.get(&position.symbol) else {
            // Can't check correlation against this one held position without
            // its market data, but that doesn't implicate unrelated positions.
            warn!(
                symbol = %position.symbol,
                "correlation gate: no market data for held position, skipping this comparison"
            );
            continue;
        };
        if let Some(rho) = pearson_correlation(
            &ctx.market_data.intraday_prices,
            &other_md.intraday_prices,
        ) {
            if rho.abs() >= ctx.correlation_reject_threshold {
                return Some(format!(
                    "|rho|={:.2} against existing {} position >= {:.2}",
                    rho, position.symbol, ctx.correlation_reject_threshold
                ));
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn perfectly_correlated_series() {
        let a: Vec<f64> = (0..50).map(|i| i as f64).collect();
        let b = a.clone();
        let rho = pearson_correlation(&a, &b).unwrap();
        assert!((rho - 1.0).abs() < 1e-9);
    }

    #[test]
    fn perfectly_anti_correlated_series() {
        let a: Vec<f64> = (0..50).map(|i| i as f64).collect();
        let b: Vec<f64> = a.iter().map(|&x| -x).collect();
        let rho = pearson_correlation(&a, &b).unwrap();
        assert!((rho + 1.0).abs() < 1e-9);
    }

    #[test]
    fn zero_variance_returns_none() {
        let a = vec![5.0; 50];
        let b: Vec<f64> = (0..50).map(|i| i as f64).collect();
        assert!(pearson_correlation(&a, &b).is_none());
    }

    #[test]
    fn too_short_returns_none() {
        assert!(pearson_correlation(&[1.0], &[2.0]).is_none());
    }
}
