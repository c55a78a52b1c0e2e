// =============================================================================
// Aurora Spot Nexus — Main Entry Point
// =============================================================================
//
// Multi-tenant trading engine: one `TraderConfig` per competing AI strategy,
// all observing the same shared market data and regime classification.
// Every trader starts Paused; operators flip it Live via the control plane.
// =============================================================================

// ── Module declarations ──────────────────────────────────────────────────────
mod ai;
mod api;
mod app_state;
mod coin_pool;
mod config;
mod decision_log;
mod exchange;
mod execution;
mod filters;
mod frequency;
mod futures_intel;
mod indicators;
mod market_data;
mod regime;
mod risk_v2;
mod trader;
mod types;

use std::sync::Arc;

use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::ai::HttpAiClient;
use crate::app_state::EngineState;
use crate::coin_pool::HttpCoinPool;
use crate::config::EngineConfig;
use crate::exchange::binance::BinanceFuturesClient;
use crate::execution::ExecutionEngine;
use crate::market_data::{CandleBuffer, LiveMarketDataProvider, OpenInterestHistory};
use crate::regime::detector::RegimeDetector;
use crate::risk_v2::config_manager::ModuleConfigManager;
use crate::risk_v2::{RiskV2Config, RiskV2Engine};
use crate::trader::{TraderDeps, TraderManager};
use crate::types::AccountMode;

const DEFAULT_CONFIG_PATH: &str = "engine_config.json";
const WATERMARK_BUFFER_PCT: f64 = 0.005;
const RISK_MONITOR_INTERVAL_SECS: u64 = 30;

/// Per-trader API key lookup: `{TRADER_ID}_BINANCE_API_KEY`, falling back to
/// the process-wide `BINANCE_API_KEY` for single-tenant deployments.
fn trader_env(trader_id: &str, suffix: &str) -> String {
    let scoped = format!("{}_{}", trader_id.to_uppercase(), suffix);
    std::env::var(&scoped).unwrap_or_else(|_| std::env::var(suffix).unwrap_or_default())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── 1. Environment & config ──────────────────────────────────────────
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("╔══════════════════════════════════════════════════════════╗");
    info!("║        Aurora Spot Nexus — Starting Up                  ║");
    info!("╚══════════════════════════════════════════════════════════╝");

    let mut engine_config = EngineConfig::load(DEFAULT_CONFIG_PATH).unwrap_or_else(|e| {
        warn!(error = %e, "failed to load engine config, using defaults");
        EngineConfig::default()
    });

    // SAFETY: every trader starts Paused + Demo regardless of what was saved.
    for trader in &mut engine_config.traders {
        trader.trading_mode = crate::types::TradingMode::Paused;
        trader.account_mode = AccountMode::Demo;
    }

    if engine_config.traders.is_empty() {
        warn!("no traders configured — add entries to engine_config.json to trade");
    }

    let symbols: Vec<String> = std::env::var("AURORA_SYMBOLS")
        .ok()
        .map(|s| {
            s.split(',')
                .map(|s| s.trim().to_uppercase())
                .filter(|s| !s.is_empty())
                .collect()
        })
        .filter(|v: &Vec<String>| !v.is_empty())
        .unwrap_or_else(|| {
            vec![
                "BTCUSDT".into(),
                "ETHUSDT".into(),
                "BNBUSDT".into(),
                "XRPUSDT".into(),
                "SOLUSDT".into(),
            ]
        });

    info!(symbols = ?symbols, traders = engine_config.traders.len(), "engine configured");

    // ── 2. Shared market-data plumbing ───────────────────────────────────
    // All traders observe the same market and regime classification; they
    // compete on AI provider, risk tolerance, and sizing, not on data access.
    let candle_buffer = Arc::new(CandleBuffer::new(500));
    let oi_history = Arc::new(OpenInterestHistory::new(200));
    let market_data_provider: Arc<dyn crate::market_data::MarketDataProvider> = Arc::new(
        LiveMarketDataProvider::new(candle_buffer.clone(), oi_history.clone()),
    );
    let regime_detector = RegimeDetector::new();
    let coin_pool_base_url =
        std::env::var("AURORA_COIN_POOL_URL").unwrap_or_else(|_| "http://localhost:8090".into());
    let coin_pool: Arc<dyn crate::coin_pool::CoinPoolProvider> =
        Arc::new(HttpCoinPool::new(coin_pool_base_url));

    // ── 3. Spawn kline streams feeding the shared candle buffer ──────────
    for symbol in &symbols {
        for interval in ["1m", "5m"] {
            let cb = candle_buffer.clone();
            let sym = symbol.clone();
            tokio::spawn(async move {
                loop {
                    if let Err(e) =
                        market_data::candle_buffer::run_kline_stream(&sym, interval, &cb).await
                    {
                        error!(symbol = %sym, interval, error = %e, "kline stream error — reconnecting in 5s");
                    }
                    tokio::time::sleep(tokio::time::Duration::from_secs(5)).await;
                }
            });
        }
    }
    info!(count = symbols.len(), "market data streams launched");

    // ── 4. Regime detection loop ─────────────────────────────────────────
    {
        let cb = candle_buffer.clone();
        let rd = regime_detector.clone();
        let primary_symbol = symbols.first().cloned();
        tokio::spawn(async move {
            tokio::time::sleep(tokio::time::Duration::from_secs(60)).await;
            let mut interval = tokio::time::interval(tokio::time::Duration::from_secs(30));
            loop {
                interval.tick().await;
                let Some(symbol) = &primary_symbol else { continue };
                let key = market_data::CandleKey {
                    symbol: symbol.clone(),
                    interval: "5m".to_string(),
                };
                let candles = cb.get_closed(&key, 100);
                if candles.len() >= 50 {
                    rd.update(&candles);
                }
            }
        });
    }

    // ── 5. Build one TraderManager entry per configured trader ───────────
    let mut trader_manager = TraderManager::new();
    for trader_config in &engine_config.traders {
        let api_key = trader_env(&trader_config.id, "BINANCE_API_KEY");
        let api_secret = trader_env(&trader_config.id, "BINANCE_API_SECRET");
        let exchange: Arc<dyn crate::exchange::ExchangeAdapter> =
            Arc::new(BinanceFuturesClient::new(api_key, api_secret));

        let ai_base_url = trader_env(&trader_config.id, "AI_BASE_URL");
        let ai_api_key = trader_env(&trader_config.id, "AI_API_KEY");
        let ai: Arc<dyn crate::ai::AiAdapter> = Arc::new(HttpAiClient::new(
            ai_base_url,
            ai_api_key,
            trader_config.ai_provider.clone(),
        ));

        let risk_v2 = Arc::new(RiskV2Engine::new(
            RiskV2Config::default(),
            WATERMARK_BUFFER_PCT,
            trader_config.initial_balance,
        ));
        let frequency = Arc::new(crate::frequency::FrequencyManager::new(
            crate::frequency::FrequencyLimits::default(),
        ));
        let execution = Arc::new(ExecutionEngine::new(exchange.clone()));
        let decision_log = Arc::new(crate::decision_log::DecisionLog::new());

        let deps = TraderDeps {
            config: trader_config.clone(),
            exchange,
            market_data: market_data_provider.clone(),
            coin_pool: coin_pool.clone(),
            ai,
            risk_v2: risk_v2.clone(),
            frequency,
            regime_detector: regime_detector.clone(),
            execution,
            decision_log,
        };

        trader_manager.spawn_trader(deps);

        // Risk-v2 monitoring runs independently of the cycle cadence.
        let rv2 = risk_v2.clone();
        tokio::spawn(async move {
            let mut interval =
                tokio::time::interval(tokio::time::Duration::from_secs(RISK_MONITOR_INTERVAL_SECS));
            loop {
                interval.tick().await;
                rv2.monitor_tick();
            }
        });

        // Hot-reload the global-risk limits from a per-trader config file.
        let config_mgr = ModuleConfigManager::new(format!("risk_v2_config/{}", trader_config.id));
        if let Err(e) = config_mgr.save("global_risk", &RiskV2Config::default()) {
            warn!(trader = %trader_config.id, error = %e, "failed to seed risk-v2 config file");
        }
        let rv2_for_reload = risk_v2.clone();
        tokio::spawn(async move {
            config_mgr
                .poll_loop::<RiskV2Config, _>("global_risk", move |config| {
                    rv2_for_reload.update_config(config);
                })
                .await;
        });
    }

    let engine_state = Arc::new(EngineState::new(trader_manager));

    // ── 6. Start the API server ──────────────────────────────────────────
    let api_state = engine_state.clone();
    let bind_addr = std::env::var("AURORA_BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3001".into());
    let bind_addr_clone = bind_addr.clone();

    tokio::spawn(async move {
        let app = api::rest::router(api_state);
        let listener = tokio::net::TcpListener::bind(&bind_addr_clone)
            .await
            .expect("failed to bind API server");
        info!(addr = %bind_addr_clone, "API server listening");
        axum::serve(listener, app).await.expect("API server failed");
    });

    info!("All subsystems running. Press Ctrl+C to stop.");

    // ── 7. Graceful shutdown ─────────────────────────────────────────────
    tokio::signal::ctrl_c().await?;
    warn!("shutdown signal received — stopping gracefully");

    if let Err(e) = engine_config.save(DEFAULT_CONFIG_PATH) {
        error!(error = %e, "failed to save engine config on shutdown");
    }

    info!("Aurora Spot Nexus shut down complete.");
    Ok(())
}
