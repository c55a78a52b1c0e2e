// =============================================================================
// Exchange adapter — account, positions, and order operations
// =============================================================================

pub mod binance;

use anyhow::Result;
use async_trait::async_trait;
use thiserror::Error;

use crate::types::{AccountSnapshot, PositionSnapshot, Side};

/// Machine-readable exchange error kinds (§6).
#[derive(Debug, Error)]
pub enum ExchangeError {
    #[error("exchange authentication failed: {0}")]
    Auth(String),
    #[error("exchange rate limit exceeded: {0}")]
    RateLimit(String),
    #[error("insufficient margin: {0}")]
    InsufficientMargin(String),
    #[error("symbol not tradable: {0}")]
    SymbolNotTradable(String),
    #[error("transient exchange error: {0}")]
    Transient(String),
}

#[async_trait]
pub trait ExchangeAdapter: Send + Sync {
    async fn get_account(&self) -> Result<AccountSnapshot>;
    async fn get_positions(&self) -> Result<Vec<PositionSnapshot>>;
    async fn open_position(
        &self,
        symbol: &str,
        side: Side,
        leverage: u32,
        size_usd: f64,
        stop_loss: Option<f64>,
        take_profit: Option<f64>,
    ) -> Result<OrderOutcome>;
    async fn close_position(&self, symbol: &str, side: Side) -> Result<OrderOutcome>;
}

#[derive(Debug, Clone)]
pub struct OrderOutcome {
    pub order_id: String,
    pub filled: bool,
}
