// =============================================================================
// Execution Engine — routes surviving decisions through the exchange adapter,
// with full demo-mode simulation support
// =============================================================================

use std::sync::Arc;

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::exchange::ExchangeAdapter;
use crate::types::{Action, AccountMode, Decision, ExecutionOutcome};

/// Ties a decision to the exchange adapter (or a local simulation) and
/// produces the per-decision outcome consumed by the decision log.
pub struct ExecutionEngine {
    pub exchange: Arc<dyn ExchangeAdapter>,
}

impl ExecutionEngine {
    pub fn new(exchange: Arc<dyn ExchangeAdapter>) -> Self {
        Self { exchange }
    }

    /// Execute one surviving decision. `wait`/`hold` never reach here — the
    /// cycle filters them out before calling this.
    pub async fn execute(&self, decision: &Decision, account_mode: AccountMode) -> ExecutionOutcome {
        info!(
            symbol = %decision.symbol,
            action = ?decision.action,
            size = decision.position_size_usd,
            "execution: dispatching decision"
        );

        if account_mode == AccountMode::Demo {
            return self.execute_demo(decision);
        }

        self.execute_live(decision).await
    }

    fn execute_demo(&self, decision: &Decision) -> ExecutionOutcome {
        let sim_order_id = Uuid::new_v4().to_string();
        debug!(symbol = %decision.symbol, sim_order_id, "execution: simulated fill (demo mode)");
        ExecutionOutcome {
            symbol: decision.symbol.clone(),
            action: decision.action,
            success: true,
            error: None,
        }
    }

    async fn execute_live(&self, decision: &Decision) -> ExecutionOutcome {
        let result = match decision.action {
            Action::OpenLong | Action::OpenShort => {
                let side = decision
                    .action
                    .side()
                    .expect("open_* decisions always carry a side");
                let leverage = decision.leverage.unwrap_or(1);
                let size = decision.position_size_usd.unwrap_or(0.0);
                self.exchange
                    .open_position(
                        &decision.symbol,
                        side,
                        leverage,
                        size,
                        decision.stop_loss,
                        decision.take_profit,
                    )
                    .await
            }
            Action::CloseLong | Action::CloseShort => {
                let side = decision
                    .action
                    .side()
                    .expect("close_* decisions always carry a side");
                self.exchange.close_position(&decision.symbol, side).await
            }
            Action::Hold | Action::Wait => {
                return ExecutionOutcome {
                    symbol: decision.symbol.clone(),
                    action: decision.action,
                    success: true,
                    error: None,
                };
            }
        };

        match result {
            Ok(outcome) => {
                info!(
                    symbol = %decision.symbol,
                    order_id = %outcome.order_id,
                    filled = outcome.filled,
                    "execution: live order placed"
                );
                ExecutionOutcome {
                    symbol: decision.symbol.clone(),
                    action: decision.action,
                    success: true,
                    error: None,
                }
            }
            Err(e) => {
                warn!(symbol = %decision.symbol, error = %e, "execution: live order failed");
                ExecutionOutcome {
                    symbol: decision.symbol.clone(),
                    action: decision.action,
                    success: false,
                    error: Some(e.to_string()),
                }
            }
        }
    }
}

impl std::fmt::Debug for ExecutionEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionEngine").field("exchange", &"<dyn ExchangeAdapter>").finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exchange::{ExchangeError, OrderOutcome};
    use crate::types::{AccountSnapshot, PositionSnapshot, Side};
    use async_trait::async_trait;

    struct MockExchange {
        fail: bool,
    }

    #[async_trait]
    impl ExchangeAdapter for MockExchange {
        async fn get_account(&self) -> anyhow::Result<AccountSnapshot> {
            unimplemented!()
        }
        async fn get_positions(&self) -> anyhow::Result<Vec<PositionSnapshot>> {
            unimplemented!()
        }
        async fn open_position(
            &self,
            _symbol: &str,
            _side: Side,
            _leverage: u32,
            _size_usd: f64,
            _stop_loss: Option<f64>,
            _take_profit: Option<f64>,
        ) -> anyhow::Result<OrderOutcome> {
            if self.fail {
                Err(ExchangeError::Transient("simulated failure".into()).into())
            } else {
                Ok(OrderOutcome { order_id: "1".into(), filled: true })
            }
        }
        async fn close_position(&self, _symbol: &str, _side: Side) -> anyhow::Result<OrderOutcome> {
            Ok(OrderOutcome { order_id: "2".into(), filled: true })
        }
    }

    fn open_long_decision() -> Decision {
        Decision {
            action: Action::OpenLong,
            symbol: "BTCUSDT".into(),
            leverage: Some(5),
            position_size_usd: Some(100.0),
            stop_loss: Some(95.0),
            take_profit: Some(115.0),
            confidence: Some(80.0),
            risk_usd: Some(5.0),
            reasoning: "x".into(),
        }
    }

    #[tokio::test]
    async fn demo_mode_always_simulates_success() {
        let engine = ExecutionEngine::new(Arc::new(MockExchange { fail: true }));
        let outcome = engine.execute(&open_long_decision(), AccountMode::Demo).await;
        assert!(outcome.success);
    }

    #[tokio::test]
    async fn live_mode_propagates_exchange_failure() {
        let engine = ExecutionEngine::new(Arc::new(MockExchange { fail: true }));
        let outcome = engine.execute(&open_long_decision(), AccountMode::Live).await;
        assert!(!outcome.success);
        assert!(outcome.error.is_some());
    }

    #[tokio::test]
    async fn live_mode_succeeds_when_adapter_succeeds() {
        let engine = ExecutionEngine::new(Arc::new(MockExchange { fail: false }));
        let outcome = engine.execute(&open_long_decision(), AccountMode::Live).await;
        assert!(outcome.success);
    }
}
