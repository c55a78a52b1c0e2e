// =============================================================================
// Trader cycle — one pass of the per-trader decision loop (§4.1)
// =============================================================================

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{error, info, warn};

use crate::ai::AiAdapter;
use crate::coin_pool::{merge_oi_overlay, CoinPoolProvider};
use crate::config::TraderConfig;
use crate::decision_log::DecisionLog;
use crate::exchange::ExchangeAdapter;
use crate::execution::ExecutionEngine;
use crate::filters::{run_pipeline, FilterContext};
use crate::frequency::FrequencyManager;
use crate::market_data::MarketDataProvider;
use crate::regime::detector::{MarketRegime, RegimeDetector};
use crate::risk_v2::{IntendedAction, RiskAction, RiskV2Engine};
use crate::types::{
    Action, CandidateCoin, Decision, DecisionRecord, ExecutionOutcome, FullDecision,
};

use super::parser::parse_response;
use super::prompt::{build_system_prompt, build_user_prompt, OptimizationSummary};
use super::validation::validate;

const MIN_CANDIDATE_K: usize = 5;
const MAX_CANDIDATE_K: usize = 20;
const LIQUIDITY_FLOOR_USD: f64 = 15_000_000.0;

/// Everything one trader needs to run its cycle loop, bundled so `TraderManager`
/// can spawn one task per trader without threading a dozen parameters.
pub struct TraderDeps {
    pub config: TraderConfig,
    pub exchange: Arc<dyn ExchangeAdapter>,
    pub market_data: Arc<dyn MarketDataProvider>,
    pub coin_pool: Arc<dyn CoinPoolProvider>,
    pub ai: Arc<dyn AiAdapter>,
    pub risk_v2: Arc<RiskV2Engine>,
    pub frequency: Arc<FrequencyManager>,
    pub regime_detector: Arc<RegimeDetector>,
    pub execution: Arc<ExecutionEngine>,
    pub decision_log: Arc<DecisionLog>,
}

/// Derive the candidate-universe breadth K from account health: healthier
/// accounts (lower drawdown) can consider more candidates.
fn candidate_k_for_drawdown(drawdown_pct: f64) -> usize {
    let k = MAX_CANDIDATE_K as f64 * (1.0 - drawdown_pct.clamp(0.0, 1.0));
    (k.round() as usize).clamp(MIN_CANDIDATE_K, MAX_CANDIDATE_K)
}

fn synthesize_sos_decision(positions: &[crate::types::PositionSnapshot]) -> FullDecision {
    let decisions = if positions.is_empty() {
        vec![Decision::wait("*", "SOS mode active")]
    } else {
        positions
            .iter()
            .map(|p| {
                let action = match p.side {
                    crate::types::Side::Long => Action::CloseLong,
                    crate::types::Side::Short => Action::CloseShort,
                };
                Decision {
                    action,
                    symbol: p.symbol.clone(),
                    leverage: None,
                    position_size_usd: None,
                    stop_loss: None,
                    take_profit: None,
                    confidence: None,
                    risk_usd: None,
                    reasoning: "SOS mode active".to_string(),
                }
            })
            .collect()
    };
    FullDecision {
        user_prompt: String::new(),
        chain_of_thought: "SOS mode active".to_string(),
        decisions,
        timestamp: chrono::Utc::now().to_rfc3339(),
    }
}

pub async fn run_cycle(deps: &TraderDeps, cycle: u64) -> anyhow::Result<()> {
    // Step 1: account + positions.
    let account = deps.exchange.get_account().await?;
    let positions = deps.exchange.get_positions().await?;

    // Step 2: candidate universe.
    let drawdown = deps.risk_v2.time_manager().current_drawdown();
    let k = candidate_k_for_drawdown(drawdown);
    let mut pool_candidates = deps.coin_pool.get_candidates().await.unwrap_or_default();
    pool_candidates.truncate(k);

    // Step 4 runs ahead of the market-data fetch so any symbol the OI-top
    // overlay introduces still gets a market-data entry below, instead of
    // being silently dropped when the prompt is built.
    let oi_top = deps.coin_pool.get_oi_top().await.unwrap_or_default();

    let mut symbols: Vec<String> = positions.iter().map(|p| p.symbol.clone()).collect();
    for c in &pool_candidates {
        if !symbols.contains(&c.symbol) {
            symbols.push(c.symbol.clone());
        }
    }
    for entry in &oi_top {
        if !symbols.contains(&entry.symbol) {
            symbols.push(entry.symbol.clone());
        }
    }

    // Step 3: concurrent market-data fetch, tolerating per-symbol failures.
    // Every successful fetch also feeds the liquidity monitor so blacklisting
    // and force-close can fire on symbols the cycle is about to consider.
    let mut market_data = HashMap::new();
    for symbol in &symbols {
        match deps.market_data.get(symbol).await {
            Ok(md) => {
                let oi_value = md.latest_oi() * md.price;
                deps.risk_v2.observe_liquidity(symbol, oi_value);
                market_data.insert(symbol.clone(), md);
            }
            Err(e) => {
                warn!(symbol, error = %e, "cycle: market data fetch failed, dropping symbol");
            }
        }
    }

    let position_symbols: std::collections::HashSet<&str> =
        positions.iter().map(|p| p.symbol.as_str()).collect();
    let mut candidates: Vec<CandidateCoin> = pool_candidates
        .into_iter()
        .filter(|c| {
            if position_symbols.contains(c.symbol.as_str()) {
                return true;
            }
            let Some(md) = market_data.get(&c.symbol) else {
                return false;
            };
            let oi_value = md.latest_oi() * md.price;
            oi_value >= LIQUIDITY_FLOOR_USD
        })
        .collect();

    candidates = merge_oi_overlay(candidates, &oi_top);

    // Step 5: optimization analysis. Regime detection itself runs off the
    // candle buffer on its own background cadence (see `TraderManager`); the
    // cycle only consumes the latest cached classification.
    let (regime, regime_confidence) = deps
        .regime_detector
        .current_regime()
        .map(|s| (s.regime, s.confidence))
        .unwrap_or((MarketRegime::Ranging, 0.5));
    let rolling_sharpe = match deps.risk_v2.sharpe().current_state() {
        crate::risk_v2::sharpe::SharpeState::Excellent => 2.5,
        crate::risk_v2::sharpe::SharpeState::Good => 1.5,
        crate::risk_v2::sharpe::SharpeState::Neutral => 0.5,
        crate::risk_v2::sharpe::SharpeState::Poor => -0.5,
        crate::risk_v2::sharpe::SharpeState::VeryPoor => -1.5,
    };

    // Step 6: SOS short-circuit.
    deps.risk_v2.on_equity_update(account.total_equity);
    deps.risk_v2.monitor_tick();
    let sos_active = deps.risk_v2.is_emergency_stopped();

    let full_decision = if sos_active {
        synthesize_sos_decision(&positions)
    } else {
        // Step 7: build prompt.
        let system_prompt = build_system_prompt(&deps.config);
        let opt = OptimizationSummary {
            regime,
            regime_confidence,
            high_correlation_pairs: vec![],
            rolling_sharpe,
            sos_active,
        };
        let user_prompt = build_user_prompt(&account, &positions, &candidates, &market_data, &opt);

        // Step 8: call AI adapter.
        let raw = deps.ai.call(&system_prompt, &user_prompt).await?;

        // Step 9: parse response.
        let parsed = parse_response(&raw)?;

        // Step 10: validate each decision.
        let mut decisions = Vec::with_capacity(parsed.decisions.len());
        for mut decision in parsed.decisions {
            if let Err(reason) = validate(&decision, account.total_equity, &deps.config) {
                info!(symbol = %decision.symbol, reason, "cycle: decision failed validation");
                decision.downgrade_to_wait(reason);
            }
            decisions.push(decision);
        }

        // Step 11: filter pipeline.
        for decision in &mut decisions {
            if !decision.action.is_open() {
                continue;
            }
            let Some(md) = market_data.get(&decision.symbol) else {
                decision.downgrade_to_wait("no market data for symbol".to_string());
                continue;
            };
            let ctx = FilterContext {
                equity: account.total_equity,
                existing_positions: &positions,
                market_data: md,
                all_market_data: &market_data,
                regime,
                regime_confidence,
                rolling_sharpe,
                correlation_reject_threshold: 0.80,
                economic_data_window: false,
            };
            run_pipeline(decision, &ctx);
        }

        // Risk-v2 decision contract, per decision that still intends to open/close.
        for decision in &mut decisions {
            let intended = match decision.action {
                Action::OpenLong => Some(IntendedAction::OpenLong),
                Action::OpenShort => Some(IntendedAction::OpenShort),
                Action::CloseLong => Some(IntendedAction::CloseLong),
                Action::CloseShort => Some(IntendedAction::CloseShort),
                _ => None,
            };
            let Some(intended) = intended else { continue };
            let risk_decision = deps.risk_v2.decide(&decision.symbol, intended, &market_data).await;
            match risk_decision.action {
                RiskAction::Block => {
                    decision.downgrade_to_wait(format!("risk_v2 block: {:?}", risk_decision.factors));
                }
                RiskAction::ReduceSize => {
                    if let Some(size) = decision.position_size_usd {
                        decision.position_size_usd = Some(size * 0.5);
                    }
                }
                RiskAction::ForceClose | RiskAction::Allow => {}
            }
        }

        // Step 12: frequency manager. Elastic mode transitions key off rolling
        // daily PnL%, not the account's cumulative PnL%.
        deps.frequency
            .update_mode(deps.risk_v2.time_manager().daily_pnl_pct());
        for decision in &mut decisions {
            if !decision.action.is_open() {
                continue;
            }
            if !deps.frequency.allowed() {
                decision.downgrade_to_wait("frequency limit exceeded".to_string());
            } else {
                deps.frequency.record_open();
            }
        }

        FullDecision {
            user_prompt,
            chain_of_thought: parsed.chain_of_thought,
            decisions,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    };

    // Step 13: execute surviving decisions.
    let mut outcomes = Vec::with_capacity(full_decision.decisions.len());
    for decision in &full_decision.decisions {
        if matches!(decision.action, Action::Hold | Action::Wait) {
            outcomes.push(ExecutionOutcome {
                symbol: decision.symbol.clone(),
                action: decision.action,
                success: true,
                error: None,
            });
            continue;
        }
        let outcome = deps.execution.execute(decision, deps.config.account_mode).await;
        if !outcome.success {
            error!(symbol = %decision.symbol, error = ?outcome.error, "cycle: execution failed");
        }
        outcomes.push(outcome);
    }

    // Step 14: log the cycle.
    deps.decision_log.push(DecisionRecord {
        cycle,
        trader_id: deps.config.id.clone(),
        account_before: account,
        full_decision,
        outcomes,
        created_at: chrono::Utc::now().to_rfc3339(),
    });

    Ok(())
}
