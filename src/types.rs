// =============================================================================
// Shared types used across the trading engine
// =============================================================================

use serde::{Deserialize, Serialize};

/// Balance snapshot for a single asset from the exchange.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BalanceInfo {
    pub asset: String,
    #[serde(default)]
    pub free: f64,
    #[serde(default)]
    pub locked: f64,
}

/// Whether a trader is actively trading, paused, or killed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TradingMode {
    Live,
    Paused,
    Killed,
}

impl Default for TradingMode {
    fn default() -> Self {
        Self::Paused
    }
}

impl std::fmt::Display for TradingMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Live => write!(f, "Live"),
            Self::Paused => write!(f, "Paused"),
            Self::Killed => write!(f, "Killed"),
        }
    }
}

/// Whether a trader runs against real funds or a simulated account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccountMode {
    Demo,
    Live,
}

impl Default for AccountMode {
    fn default() -> Self {
        Self::Demo
    }
}

impl std::fmt::Display for AccountMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Demo => write!(f, "Demo"),
            Self::Live => write!(f, "Live"),
        }
    }
}

/// Long or short.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Long,
    Short,
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Long => write!(f, "long"),
            Self::Short => write!(f, "short"),
        }
    }
}

/// Per-cycle snapshot of account health, refreshed once at the start of a
/// cycle and never mutated afterward.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountSnapshot {
    pub total_equity: f64,
    pub available_balance: f64,
    pub pnl_total: f64,
    pub pnl_total_pct: f64,
    pub margin_used: f64,
    pub margin_used_pct: f64,
    pub position_count: usize,
}

/// Point-in-time view of one open position, immutable within a cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionSnapshot {
    pub symbol: String,
    pub side: Side,
    pub entry_price: f64,
    pub mark_price: f64,
    pub quantity: f64,
    pub leverage: u32,
    pub unrealized_pnl: f64,
    pub unrealized_pnl_pct: f64,
    pub liquidation_price: f64,
    pub margin_used: f64,
    pub opened_at: String,
}

/// A symbol under consideration for a trade this cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateCoin {
    pub symbol: String,
    /// Source tags: "ai500", "oi_top".
    pub tags: Vec<String>,
}

impl CandidateCoin {
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }
}

/// Market context bundle for a single symbol, assembled fresh every cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketData {
    pub symbol: String,
    pub price: f64,
    pub change_1h_pct: f64,
    pub change_4h_pct: f64,
    pub change_24h_pct: f64,
    pub ema20: f64,
    pub macd: f64,
    pub rsi7: f64,
    pub rsi14: f64,
    /// Intraday mid-price series, most-recent last.
    pub intraday_prices: Vec<f64>,
    pub atr3: f64,
    pub atr14: f64,
    pub open_interest_series: Vec<f64>,
    pub volume_24h: f64,
    pub current_volume: f64,
    pub avg_volume: f64,
}

impl MarketData {
    pub fn latest_oi(&self) -> f64 {
        self.open_interest_series.last().copied().unwrap_or(0.0)
    }
}

/// The six closed actions an AI-emitted decision may take.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    OpenLong,
    OpenShort,
    CloseLong,
    CloseShort,
    Hold,
    Wait,
}

impl Action {
    pub fn is_open(&self) -> bool {
        matches!(self, Action::OpenLong | Action::OpenShort)
    }

    pub fn is_close(&self) -> bool {
        matches!(self, Action::CloseLong | Action::CloseShort)
    }

    pub fn side(&self) -> Option<Side> {
        match self {
            Action::OpenLong | Action::CloseLong => Some(Side::Long),
            Action::OpenShort | Action::CloseShort => Some(Side::Short),
            _ => None,
        }
    }
}

/// One decision as emitted by the AI adapter (raw, pre-validation).
///
/// Only `open_*` variants populate the sizing/risk fields; `close_*`, `hold`
/// and `wait` only require `symbol` and `reasoning`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Decision {
    pub action: Action,
    pub symbol: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub leverage: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position_size_usd: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_loss: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub take_profit: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub risk_usd: Option<f64>,
    #[serde(default)]
    pub reasoning: String,
}

impl Decision {
    pub fn wait(symbol: impl Into<String>, reasoning: impl Into<String>) -> Self {
        Self {
            action: Action::Wait,
            symbol: symbol.into(),
            leverage: None,
            position_size_usd: None,
            stop_loss: None,
            take_profit: None,
            confidence: None,
            risk_usd: None,
            reasoning: reasoning.into(),
        }
    }

    /// Rewrite an open_* decision into a `wait`, clearing all sizing fields,
    /// as filter gates do when they block a trade.
    pub fn downgrade_to_wait(&mut self, reason: impl Into<String>) {
        self.action = Action::Wait;
        self.leverage = None;
        self.position_size_usd = None;
        self.stop_loss = None;
        self.take_profit = None;
        self.confidence = None;
        self.risk_usd = None;
        self.reasoning = reason.into();
    }
}

/// The full AI response for one cycle: chain-of-thought plus the decisions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FullDecision {
    pub user_prompt: String,
    pub chain_of_thought: String,
    pub decisions: Vec<Decision>,
    pub timestamp: String,
}

/// Per-decision execution outcome, recorded alongside the decision.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionOutcome {
    pub symbol: String,
    pub action: Action,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Persisted audit record for one decision cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionRecord {
    pub cycle: u64,
    pub trader_id: String,
    pub account_before: AccountSnapshot,
    pub full_decision: FullDecision,
    pub outcomes: Vec<ExecutionOutcome>,
    pub created_at: String,
}
