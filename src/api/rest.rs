// =============================================================================
// REST API Endpoints — Axum 0.7
// =============================================================================
//
// All endpoints live under `/api/v1/` (per-trader) and `/api/v2/` (risk-v2 and
// system-wide). `/api/v1/health` requires no authentication; everything else
// requires a valid Bearer token checked via the `AuthBearer` extractor.
//
// CORS is configured permissively for development; tighten `allowed_origins`
// in production.
// =============================================================================

use std::sync::Arc;

use axum::{
    extract::{Json, Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use serde::Serialize;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

use crate::api::auth::AuthBearer;
use crate::app_state::EngineState;

// =============================================================================
// Router construction
// =============================================================================

pub fn router(state: Arc<EngineState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // ── Public ──────────────────────────────────────────────────
        .route("/api/v1/health", get(health))
        // ── Per-trader ───────────────────────────────────────────────
        .route("/api/v1/traders", get(list_traders))
        .route("/api/v1/traders/:id/status", get(trader_status))
        .route("/api/v1/traders/:id/account", get(trader_account))
        .route("/api/v1/traders/:id/positions", get(trader_positions))
        .route("/api/v1/traders/:id/decisions", get(trader_decisions))
        .route("/api/v1/traders/:id/statistics", get(trader_statistics))
        .route("/api/v1/traders/:id/pause", post(trader_pause))
        .route("/api/v1/traders/:id/resume", post(trader_resume))
        .route("/api/v1/traders/:id/kill", post(trader_kill))
        .route("/api/v1/frequency/:id", get(trader_frequency))
        // ── Risk-v2 ──────────────────────────────────────────────────
        .route("/api/v2/risk-control/:id", get(risk_control_status))
        .route(
            "/api/v2/risk-control/:id/clear-emergency-stop",
            post(risk_control_clear),
        )
        // ── System-wide ──────────────────────────────────────────────
        .route("/api/v2/system/status", get(system_status))
        .route("/api/v2/system/health", get(system_health))
        .route("/api/v2/system/stats", get(system_stats))
        .layer(cors)
        .with_state(state)
}

// =============================================================================
// Health (public)
// =============================================================================

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    uptime_secs: u64,
    server_time: i64,
}

async fn health(State(state): State<Arc<EngineState>>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        uptime_secs: state.uptime_secs(),
        server_time: chrono::Utc::now().timestamp_millis(),
    })
}

// =============================================================================
// Trader lookup helper
// =============================================================================

fn not_found(trader_id: &str) -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::NOT_FOUND,
        Json(serde_json::json!({ "error": format!("unknown trader id: {trader_id}") })),
    )
}

// =============================================================================
// Per-trader endpoints (authenticated)
// =============================================================================

#[derive(Serialize)]
struct TraderSummary {
    id: String,
    name: String,
    account_mode: String,
    trading_mode: String,
    cycle_count: u64,
}

async fn list_traders(
    _auth: AuthBearer,
    State(state): State<Arc<EngineState>>,
) -> impl IntoResponse {
    let manager = state.traders.read();
    let summaries: Vec<TraderSummary> = manager
        .traders()
        .iter()
        .map(|t| TraderSummary {
            id: t.trader_id.clone(),
            name: t.name.clone(),
            account_mode: t.account_mode.to_string(),
            trading_mode: t.trading_mode().to_string(),
            cycle_count: t.cycle_count(),
        })
        .collect();
    Json(summaries)
}

async fn trader_status(
    _auth: AuthBearer,
    State(state): State<Arc<EngineState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let manager = state.traders.read();
    match manager.trader(&id) {
        Some(t) => Json(serde_json::json!({
            "id": t.trader_id,
            "name": t.name,
            "account_mode": t.account_mode.to_string(),
            "trading_mode": t.trading_mode().to_string(),
            "cycle_count": t.cycle_count(),
            "emergency_stopped": t.risk_v2.is_emergency_stopped(),
        }))
        .into_response(),
        None => not_found(&id).into_response(),
    }
}

async fn trader_account(
    _auth: AuthBearer,
    State(state): State<Arc<EngineState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let exchange = {
        let manager = state.traders.read();
        match manager.trader(&id) {
            Some(t) => t.exchange.clone(),
            None => return not_found(&id).into_response(),
        }
    };
    match exchange.get_account().await {
        Ok(account) => Json(account).into_response(),
        Err(e) => {
            warn!(trader_id = %id, error = %e, "failed to fetch account snapshot");
            (
                StatusCode::BAD_GATEWAY,
                Json(serde_json::json!({ "error": e.to_string() })),
            )
                .into_response()
        }
    }
}

async fn trader_positions(
    _auth: AuthBearer,
    State(state): State<Arc<EngineState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let exchange = {
        let manager = state.traders.read();
        match manager.trader(&id) {
            Some(t) => t.exchange.clone(),
            None => return not_found(&id).into_response(),
        }
    };
    match exchange.get_positions().await {
        Ok(positions) => Json(positions).into_response(),
        Err(e) => {
            warn!(trader_id = %id, error = %e, "failed to fetch positions");
            (
                StatusCode::BAD_GATEWAY,
                Json(serde_json::json!({ "error": e.to_string() })),
            )
                .into_response()
        }
    }
}

async fn trader_decisions(
    _auth: AuthBearer,
    State(state): State<Arc<EngineState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let manager = state.traders.read();
    match manager.trader(&id) {
        Some(t) => Json(t.decision_log.recent(100)).into_response(),
        None => not_found(&id).into_response(),
    }
}

async fn trader_statistics(
    _auth: AuthBearer,
    State(state): State<Arc<EngineState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let manager = state.traders.read();
    match manager.trader(&id) {
        Some(t) => Json(t.decision_log.stats()).into_response(),
        None => not_found(&id).into_response(),
    }
}

async fn trader_frequency(
    _auth: AuthBearer,
    State(state): State<Arc<EngineState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let manager = state.traders.read();
    match manager.trader(&id) {
        Some(t) => Json(serde_json::json!({ "mode": t.frequency.mode() })).into_response(),
        None => not_found(&id).into_response(),
    }
}

#[derive(Serialize)]
struct ControlResponse {
    trading_mode: String,
    message: String,
}

async fn trader_pause(
    _auth: AuthBearer,
    State(state): State<Arc<EngineState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let manager = state.traders.read();
    match manager.trader(&id) {
        Some(t) => {
            t.pause();
            info!(trader_id = %id, "trader paused via API");
            Json(ControlResponse {
                trading_mode: t.trading_mode().to_string(),
                message: "trader paused".to_string(),
            })
            .into_response()
        }
        None => not_found(&id).into_response(),
    }
}

async fn trader_resume(
    _auth: AuthBearer,
    State(state): State<Arc<EngineState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let manager = state.traders.read();
    match manager.trader(&id) {
        Some(t) => {
            t.resume();
            info!(trader_id = %id, "trader resumed via API");
            Json(ControlResponse {
                trading_mode: t.trading_mode().to_string(),
                message: "trader resumed".to_string(),
            })
            .into_response()
        }
        None => not_found(&id).into_response(),
    }
}

async fn trader_kill(
    _auth: AuthBearer,
    State(state): State<Arc<EngineState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let manager = state.traders.read();
    match manager.trader(&id) {
        Some(t) => {
            t.kill();
            warn!(trader_id = %id, "trader killed via API — manual restart required");
            Json(ControlResponse {
                trading_mode: t.trading_mode().to_string(),
                message: "trader killed — manual restart required".to_string(),
            })
            .into_response()
        }
        None => not_found(&id).into_response(),
    }
}

// =============================================================================
// Risk-v2 endpoints (authenticated)
// =============================================================================

async fn risk_control_status(
    _auth: AuthBearer,
    State(state): State<Arc<EngineState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let manager = state.traders.read();
    match manager.trader(&id) {
        Some(t) => Json(serde_json::json!({
            "level": t.risk_v2.current_level(),
            "emergency_stopped": t.risk_v2.is_emergency_stopped(),
            "drawdown": t.risk_v2.time_manager().current_drawdown(),
            "watermark": t.risk_v2.time_manager().watermark(),
            "sharpe_state": t.risk_v2.sharpe().current_state(),
            "blacklist_size": t.risk_v2.liquidity().blacklist_size(),
            "active_alert_count": t.risk_v2.liquidity().active_alert_count(),
        }))
        .into_response(),
        None => not_found(&id).into_response(),
    }
}

async fn risk_control_clear(
    _auth: AuthBearer,
    State(state): State<Arc<EngineState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let manager = state.traders.read();
    match manager.trader(&id) {
        Some(t) => {
            t.risk_v2.clear_emergency_stop();
            warn!(trader_id = %id, "emergency stop cleared via API");
            Json(serde_json::json!({ "emergency_stopped": t.risk_v2.is_emergency_stopped() }))
                .into_response()
        }
        None => not_found(&id).into_response(),
    }
}

// =============================================================================
// System-wide endpoints (authenticated)
// =============================================================================

async fn system_status(
    _auth: AuthBearer,
    State(state): State<Arc<EngineState>>,
) -> impl IntoResponse {
    let manager = state.traders.read();
    let trader_count = manager.traders().len();
    let killed_count = manager
        .traders()
        .iter()
        .filter(|t| t.trading_mode() == crate::types::TradingMode::Killed)
        .count();
    Json(serde_json::json!({
        "trader_count": trader_count,
        "killed_count": killed_count,
        "uptime_secs": state.uptime_secs(),
    }))
}

async fn system_health(
    _auth: AuthBearer,
    State(state): State<Arc<EngineState>>,
) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "recent_error_count": state.recent_errors.read().len(),
    }))
}

/// Cross-trader ranking — aggregate cycle/decision statistics per trader,
/// sorted by total execution-free cycles (a simple read-only roll-up, not a
/// portfolio-level optimizer).
async fn system_stats(
    _auth: AuthBearer,
    State(state): State<Arc<EngineState>>,
) -> impl IntoResponse {
    let manager = state.traders.read();
    let mut rows: Vec<serde_json::Value> = manager
        .traders()
        .iter()
        .map(|t| {
            let stats = t.decision_log.stats();
            serde_json::json!({
                "id": t.trader_id,
                "name": t.name,
                "total_cycles": stats.total_cycles,
                "total_opens": stats.total_opens,
                "total_execution_failures": stats.total_execution_failures,
            })
        })
        .collect();
    rows.sort_by(|a, b| {
        let oa = a["total_opens"].as_u64().unwrap_or(0);
        let ob = b["total_opens"].as_u64().unwrap_or(0);
        ob.cmp(&oa)
    });
    Json(rows)
}
