// =============================================================================
// Decision log — per-trader append-only ring buffer of DecisionRecord
// =============================================================================
//
// Capped ring-buffer-over-Vec, the same shape as the teacher's
// `AppState::recent_decisions` / `push_decision`. Decision logs are per-trader
// and never cross-shared (§5).
// =============================================================================

use parking_lot::RwLock;
use serde::Serialize;

use crate::types::DecisionRecord;

const MAX_RECORDS: usize = 500;

#[derive(Default)]
pub struct DecisionLog {
    records: RwLock<Vec<DecisionRecord>>,
}

#[derive(Serialize)]
pub struct DecisionLogStats {
    pub total_cycles: usize,
    pub total_decisions: usize,
    pub total_opens: usize,
    pub total_execution_failures: usize,
}

impl DecisionLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, record: DecisionRecord) {
        let mut records = self.records.write();
        records.push(record);
        while records.len() > MAX_RECORDS {
            records.remove(0);
        }
    }

    pub fn recent(&self, limit: usize) -> Vec<DecisionRecord> {
        let records = self.records.read();
        records.iter().rev().take(limit).cloned().collect()
    }

    pub fn stats(&self) -> DecisionLogStats {
        let records = self.records.read();
        let mut total_decisions = 0;
        let mut total_opens = 0;
        let mut total_execution_failures = 0;
        for r in records.iter() {
            total_decisions += r.full_decision.decisions.len();
            total_opens += r
                .full_decision
                .decisions
                .iter()
                .filter(|d| d.action.is_open())
                .count();
            total_execution_failures += r.outcomes.iter().filter(|o| !o.success).count();
        }
        DecisionLogStats {
            total_cycles: records.len(),
            total_decisions,
            total_opens,
            total_execution_failures,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AccountSnapshot, Action, Decision, ExecutionOutcome, FullDecision};

    fn sample_record(cycle: u64, opens: bool) -> DecisionRecord {
        let action = if opens { Action::OpenLong } else { Action::Wait };
        DecisionRecord {
            cycle,
            trader_id: "t1".into(),
            account_before: AccountSnapshot {
                total_equity: 1000.0,
                available_balance: 900.0,
                pnl_total: 0.0,
                pnl_total_pct: 0.0,
                margin_used: 100.0,
                margin_used_pct: 10.0,
                position_count: 0,
            },
            full_decision: FullDecision {
                user_prompt: "x".into(),
                chain_of_thought: "y".into(),
                decisions: vec![Decision {
                    action,
                    symbol: "BTCUSDT".into(),
                    leverage: Some(3),
                    position_size_usd: Some(100.0),
                    stop_loss: Some(95.0),
                    take_profit: Some(115.0),
                    confidence: Some(80.0),
                    risk_usd: Some(5.0),
                    reasoning: "x".into(),
                }],
                timestamp: chrono::Utc::now().to_rfc3339(),
            },
            outcomes: vec![ExecutionOutcome {
                symbol: "BTCUSDT".into(),
                action,
                success: opens,
                error: if opens { None } else { Some("bad".into()) },
            }],
            created_at: chrono::Utc::now().to_rfc3339(),
        }
    }

    #[test]
    fn push_and_recent_preserve_newest_first() {
        let log = DecisionLog::new();
        log.push(sample_record(1, true));
        log.push(sample_record(2, true));
        let recent = log.recent(10);
        assert_eq!(recent[0].cycle, 2);
        assert_eq!(recent[1].cycle, 1);
    }

    #[test]
    fn ring_buffer_caps_at_max_records() {
        let log = DecisionLog::new();
        for i in 0..(MAX_RECORDS + 10) {
            log.push(sample_record(i as u64, true));
        }
        assert_eq!(log.stats().total_cycles, MAX_RECORDS);
    }

    #[test]
    fn stats_count_opens_and_failures() {
        let log = DecisionLog::new();
        log.push(sample_record(1, true));
        log.push(sample_record(2, false));
        let stats = log.stats();
        assert_eq!(stats.total_cycles, 2);
        assert_eq!(stats.total_opens, 1);
        assert_eq!(stats.total_execution_failures, 1);
    }
}
