// =============================================================================
// Sharpe calculator — rolling annualized Sharpe with a hysteresis state machine
// =============================================================================

use std::collections::VecDeque;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

const PERIODS_PER_YEAR: f64 = 252.0;
const RISK_FREE: f64 = 0.0;
const OUTLIER_SIGMA: f64 = 3.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SharpeState {
    Excellent,
    Good,
    Neutral,
    Poor,
    VeryPoor,
}

fn classify(sharpe: f64) -> SharpeState {
    if sharpe > 2.0 {
        SharpeState::Excellent
    } else if sharpe > 1.0 {
        SharpeState::Good
    } else if sharpe > 0.0 {
        SharpeState::Neutral
    } else if sharpe > -1.0 {
        SharpeState::Poor
    } else {
        SharpeState::VeryPoor
    }
}

struct Inner {
    equity_window: VecDeque<f64>,
    committed_state: SharpeState,
    pending_state: Option<SharpeState>,
    pending_count: u32,
}

pub struct SharpeCalculator {
    window_size: usize,
    buffer_cycles: u32,
    state: RwLock<Inner>,
}

impl SharpeCalculator {
    pub fn new(window_size: usize, buffer_cycles: u32) -> Self {
        Self {
            window_size,
            buffer_cycles,
            state: RwLock::new(Inner {
                equity_window: VecDeque::with_capacity(window_size),
                committed_state: SharpeState::Neutral,
                pending_state: None,
                pending_count: 0,
            }),
        }
    }

    pub fn current_state(&self) -> SharpeState {
        self.state.read().committed_state
    }

    pub fn on_equity_update(&self, equity: f64) {
        let mut s = self.state.write();
        if s.equity_window.len() == self.window_size {
            s.equity_window.pop_front();
        }
        s.equity_window.push_back(equity);

        if s.equity_window.len() < 3 {
            return;
        }

        let returns = smoothed_returns(&s.equity_window);
        let sharpe = annualized_sharpe(&returns);
        let classified = classify(sharpe);

        if classified == s.committed_state {
            s.pending_state = None;
            s.pending_count = 0;
            return;
        }

        if s.pending_state == Some(classified) {
            s.pending_count += 1;
        } else {
            s.pending_state = Some(classified);
            s.pending_count = 1;
        }

        if s.pending_count >= self.buffer_cycles {
            s.committed_state = classified;
            s.pending_state = None;
            s.pending_count = 0;
        }
    }
}

fn smoothed_returns(window: &VecDeque<f64>) -> Vec<f64> {
    let mut returns: Vec<f64> = window
        .iter()
        .zip(window.iter().skip(1))
        .map(|(a, b)| if *a != 0.0 { (b - a) / a } else { 0.0 })
        .collect();

    if returns.len() < 4 {
        return returns;
    }
    let mean = returns.iter().sum::<f64>() / returns.len() as f64;
    let variance =
        returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / returns.len() as f64;
    let sigma = variance.sqrt();
    if sigma == 0.0 {
        return returns;
    }

    for i in 0..returns.len() {
        if (returns[i] - mean).abs() > OUTLIER_SIGMA * sigma {
            let start = i.saturating_sub(3);
            let recent = &returns[start..i.max(start + 1)];
            let mut sorted = recent.to_vec();
            sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());
            let median = sorted[sorted.len() / 2];
            returns[i] = 0.5 * returns[i] + 0.5 * median;
        }
    }
    returns
}

fn annualized_sharpe(returns: &[f64]) -> f64 {
    if returns.len() < 2 {
        return 0.0;
    }
    let mean = returns.iter().sum::<f64>() / returns.len() as f64;
    let variance =
        returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / returns.len() as f64;
    let sigma = variance.sqrt();
    if sigma == 0.0 {
        return 0.0;
    }
    (mean - RISK_FREE) / sigma * PERIODS_PER_YEAR.sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn steady_gains_classify_as_positive_state() {
        let calc = SharpeCalculator::new(20, 2);
        let mut equity = 1000.0;
        for _ in 0..20 {
            equity *= 1.01;
            calc.on_equity_update(equity);
        }
        assert_ne!(calc.current_state(), SharpeState::VeryPoor);
    }

    #[test]
    fn state_change_requires_buffer_cycles_to_commit() {
        let calc = SharpeCalculator::new(10, 3);
        let initial = calc.current_state();
        let mut equity = 1000.0;
        for _ in 0..2 {
            equity *= 0.95;
            calc.on_equity_update(equity);
        }
        // Only two of the required three confirming cycles elapsed.
        assert_eq!(calc.current_state(), initial);
    }

    #[test]
    fn interrupting_update_resets_pending_transition() {
        let mut inner = Inner {
            equity_window: VecDeque::new(),
            committed_state: SharpeState::Neutral,
            pending_state: Some(SharpeState::Poor),
            pending_count: 1,
        };
        inner.pending_state = None;
        inner.pending_count = 0;
        assert!(inner.pending_state.is_none());
    }

    #[test]
    fn classify_buckets_boundaries() {
        assert_eq!(classify(2.5), SharpeState::Excellent);
        assert_eq!(classify(1.5), SharpeState::Good);
        assert_eq!(classify(0.5), SharpeState::Neutral);
        assert_eq!(classify(-0.5), SharpeState::Poor);
        assert_eq!(classify(-2.0), SharpeState::VeryPoor);
    }
}
