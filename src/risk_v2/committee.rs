// =============================================================================
// AI committee — plurality vote across model identities
// =============================================================================

use serde::{Deserialize, Serialize};

use crate::ai::ModelProvider;
use crate::types::MarketData;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AiCommitteeMode {
    Normal,
    RequireUnanimity,
    ConservativeMode,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommitteeAction {
    OpenLong,
    OpenShort,
    Hold,
}

#[derive(Debug, Clone)]
pub struct CommitteeDecision {
    pub action: CommitteeAction,
    pub consensus: f64,
    pub confidence: f64,
}

/// One committee member's vote, collected before plurality resolution.
struct Vote {
    action: CommitteeAction,
    confidence: f64,
}

/// Coarse market-condition label fed to each committee member alongside the
/// raw market data, derived from volatility/trend rather than passed raw.
#[derive(Debug, Clone, Copy)]
enum MarketCondition {
    Trending,
    Choppy,
    Quiet,
}

fn detect_condition(md: Option<&MarketData>) -> MarketCondition {
    let Some(md) = md else {
        return MarketCondition::Quiet;
    };
    let vol_ratio = if md.atr14 > 0.0 { md.atr3 / md.atr14 } else { 1.0 };
    if vol_ratio > 1.3 {
        MarketCondition::Choppy
    } else if md.change_24h_pct.abs() > 3.0 {
        MarketCondition::Trending
    } else {
        MarketCondition::Quiet
    }
}

/// Deterministic placeholder vote derived from the market snapshot. A real
/// deployment would route this through `HttpAiClient::call` per provider;
/// here the committee shape is exercised with indicator-derived votes so the
/// consensus/hysteresis logic is independently testable.
fn simulate_vote(condition: MarketCondition, md: Option<&MarketData>) -> Vote {
    let Some(md) = md else {
        return Vote { action: CommitteeAction::Hold, confidence: 0.0 };
    };
    match condition {
        MarketCondition::Trending if md.price > md.ema20 => Vote {
            action: CommitteeAction::OpenLong,
            confidence: 0.75,
        },
        MarketCondition::Trending => Vote {
            action: CommitteeAction::OpenShort,
            confidence: 0.75,
        },
        MarketCondition::Choppy => Vote {
            action: CommitteeAction::Hold,
            confidence: 0.4,
        },
        MarketCondition::Quiet => Vote {
            action: CommitteeAction::Hold,
            confidence: 0.5,
        },
    }
}

pub struct AiCommittee {
    mode: AiCommitteeMode,
    min_consensus_level: f64,
    members: Vec<ModelProvider>,
}

impl AiCommittee {
    pub fn new(mode: AiCommitteeMode, min_consensus_level: f64) -> Self {
        Self {
            mode,
            min_consensus_level,
            members: vec![
                ModelProvider::Qwen,
                ModelProvider::DeepSeek,
                ModelProvider::Claude,
                ModelProvider::Gpt,
            ],
        }
    }

    pub async fn decide(&self, _symbol: &str, md: Option<&MarketData>) -> CommitteeDecision {
        let condition = detect_condition(md);
        let votes: Vec<Vote> = self
            .members
            .iter()
            .map(|_| simulate_vote(condition, md))
            .collect();

        let mut long = 0usize;
        let mut short = 0usize;
        let mut hold = 0usize;
        let mut confidence_sum = 0.0;
        for v in &votes {
            match v.action {
                CommitteeAction::OpenLong => long += 1,
                CommitteeAction::OpenShort => short += 1,
                CommitteeAction::Hold => hold += 1,
            }
            confidence_sum += v.confidence;
        }
        let total = votes.len().max(1);
        let avg_confidence = confidence_sum / total as f64;

        let (winner, winner_votes) = [
            (CommitteeAction::OpenLong, long),
            (CommitteeAction::OpenShort, short),
            (CommitteeAction::Hold, hold),
        ]
        .into_iter()
        .max_by_key(|(_, v)| *v)
        .unwrap();

        let consensus = winner_votes as f64 / total as f64;

        let final_action = match self.mode {
            AiCommitteeMode::RequireUnanimity => {
                if consensus >= 0.999 {
                    winner
                } else {
                    CommitteeAction::Hold
                }
            }
            AiCommitteeMode::ConservativeMode => {
                if winner != CommitteeAction::Hold && avg_confidence >= 0.8 && consensus >= 0.8 {
                    winner
                } else {
                    CommitteeAction::Hold
                }
            }
            AiCommitteeMode::Normal => {
                if consensus >= self.min_consensus_level {
                    winner
                } else {
                    CommitteeAction::Hold
                }
            }
        };

        CommitteeDecision {
            action: final_action,
            consensus,
            confidence: avg_confidence,
        }
    }
}
