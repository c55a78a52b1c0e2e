// =============================================================================
// Prompt construction — system rules + dynamic user context
// =============================================================================

use std::collections::HashMap;

use crate::config::TraderConfig;
use crate::regime::detector::MarketRegime;
use crate::types::{AccountSnapshot, CandidateCoin, MarketData, PositionSnapshot};

pub struct OptimizationSummary {
    pub regime: MarketRegime,
    pub regime_confidence: f64,
    pub high_correlation_pairs: Vec<(String, String, f64)>,
    pub rolling_sharpe: f64,
    pub sos_active: bool,
}

pub fn build_system_prompt(config: &TraderConfig) -> String {
    format!(
        "You are an autonomous crypto-futures trading decision engine for trader \"{name}\".\n\
         Rules:\n\
         - BTC/ETH leverage cap: {btc_eth_cap}x. Altcoin leverage cap: {alt_cap}x.\n\
         - BTC/ETH position size cap: 10x equity. Altcoin position size cap: 1.5x equity.\n\
         - Every open_* decision must carry stop_loss and take_profit with reward:risk >= 3.0.\n\
         - Respond with chain-of-thought prose first, then a single top-level JSON array of \
           Decision objects and nothing after it.\n\
         - Valid action values: open_long, open_short, close_long, close_short, hold, wait.",
        name = config.name,
        btc_eth_cap = config.btc_eth_leverage_cap,
        alt_cap = config.altcoin_leverage_cap,
    )
}

pub fn build_user_prompt(
    account: &AccountSnapshot,
    positions: &[PositionSnapshot],
    candidates: &[CandidateCoin],
    market_data: &HashMap<String, MarketData>,
    opt: &OptimizationSummary,
) -> String {
    let mut out = String::new();

    if let Some(btc) = market_data.get("BTCUSDT") {
        out.push_str(&format!("BTC price: {:.2} ({:+.2}% 24h)\n", btc.price, btc.change_24h_pct));
    }

    out.push_str(&format!(
        "Account: equity={:.2} available={:.2} pnl={:+.2} ({:+.2}%) positions={}\n",
        account.total_equity,
        account.available_balance,
        account.pnl_total,
        account.pnl_total_pct,
        account.position_count,
    ));

    out.push_str("Positions:\n");
    for p in positions {
        let md = market_data.get(&p.symbol);
        out.push_str(&format!(
            "  {} {:?} entry={:.4} mark={:.4} qty={:.4} lev={}x pnl={:+.2} ({:+.2}%)",
            p.symbol, p.side, p.entry_price, p.mark_price, p.quantity, p.leverage,
            p.unrealized_pnl, p.unrealized_pnl_pct,
        ));
        if let Some(md) = md {
            out.push_str(&format!(" rsi7={:.1} macd={:.4}", md.rsi7, md.macd));
        }
        out.push('\n');
    }

    out.push_str("Candidates:\n");
    for c in candidates {
        if let Some(md) = market_data.get(&c.symbol) {
            out.push_str(&format!(
                "  {} tags={:?} price={:.4} rsi7={:.1} macd={:.4} ema20={:.4}\n",
                c.symbol, c.tags, md.price, md.rsi7, md.macd, md.ema20
            ));
        }
    }

    out.push_str(&format!(
        "Optimization: regime={:?} confidence={:.2} rolling_sharpe={:.3}\n",
        opt.regime, opt.regime_confidence, opt.rolling_sharpe
    ));
    if !opt.high_correlation_pairs.is_empty() {
        out.push_str("High-correlation pairs:\n");
        for (a, b, rho) in &opt.high_correlation_pairs {
            out.push_str(&format!("  {a}/{b}: rho={rho:.2}\n"));
        }
    }
    if opt.sos_active {
        out.push_str("SOS: active — disaster-recovery latch engaged.\n");
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_prompt_embeds_leverage_caps() {
        let mut config = TraderConfig::default();
        config.btc_eth_leverage_cap = 10;
        config.altcoin_leverage_cap = 5;
        let prompt = build_system_prompt(&config);
        assert!(prompt.contains("10x"));
        assert!(prompt.contains("5x"));
    }

    #[test]
    fn user_prompt_lists_positions_and_candidates() {
        let account = AccountSnapshot {
            total_equity: 1000.0,
            available_balance: 900.0,
            pnl_total: 10.0,
            pnl_total_pct: 1.0,
            margin_used: 100.0,
            margin_used_pct: 10.0,
            position_count: 0,
        };
        let opt = OptimizationSummary {
            regime: MarketRegime::Trending,
            regime_confidence: 0.8,
            high_correlation_pairs: vec![],
            rolling_sharpe: 0.5,
            sos_active: false,
        };
        let md = HashMap::new();
        let prompt = build_user_prompt(&account, &[], &[], &md, &opt);
        assert!(prompt.contains("Account:"));
        assert!(prompt.contains("Optimization:"));
    }
}
