// =============================================================================
// Trader manager — owns one cycle-loop task per configured trader
// =============================================================================

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::exchange::ExchangeAdapter;
use crate::frequency::FrequencyManager;
use crate::risk_v2::RiskV2Engine;
use crate::types::{AccountMode, TradingMode};

use super::cycle::{run_cycle, TraderDeps};

/// A running trader: its task handle plus the Arc handles the control-plane
/// API reads from directly, without going through the cycle loop.
pub struct TraderHandle {
    pub trader_id: String,
    pub name: String,
    pub account_mode: AccountMode,
    pub decision_log: Arc<crate::decision_log::DecisionLog>,
    pub exchange: Arc<dyn ExchangeAdapter>,
    pub risk_v2: Arc<RiskV2Engine>,
    pub frequency: Arc<FrequencyManager>,
    pub trading_mode: Arc<RwLock<TradingMode>>,
    stop_tx: watch::Sender<bool>,
    join_handle: JoinHandle<()>,
    cycle_count: Arc<AtomicU64>,
}

impl TraderHandle {
    pub fn cycle_count(&self) -> u64 {
        self.cycle_count.load(Ordering::Relaxed)
    }

    pub fn trading_mode(&self) -> TradingMode {
        *self.trading_mode.read()
    }

    pub fn pause(&self) {
        *self.trading_mode.write() = TradingMode::Paused;
    }

    pub fn resume(&self) {
        *self.trading_mode.write() = TradingMode::Live;
    }

    /// Kill is a one-way transition: the cycle loop exits entirely the next
    /// time it observes this mode, and cannot be resumed without respawning.
    pub fn kill(&self) {
        *self.trading_mode.write() = TradingMode::Killed;
    }

    /// Signal the cycle loop to stop at its next suspension point and wait
    /// for the in-flight cycle (if any) to finish.
    pub async fn stop(self) {
        let _ = self.stop_tx.send(true);
        if let Err(e) = self.join_handle.await {
            error!(trader_id = %self.trader_id, error = %e, "trader task panicked during shutdown");
        }
    }
}

pub struct TraderManager {
    traders: Vec<TraderHandle>,
}

impl TraderManager {
    pub fn new() -> Self {
        Self { traders: Vec::new() }
    }

    /// Spawn the cycle loop for one trader. The loop runs until `stop()` is
    /// called on the returned handle's manager slot.
    pub fn spawn_trader(&mut self, deps: TraderDeps) {
        let trader_id = deps.config.id.clone();
        let name = deps.config.name.clone();
        let account_mode = deps.config.account_mode;
        let scan_interval = std::time::Duration::from_secs(deps.config.scan_interval_minutes * 60);
        let decision_log = deps.decision_log.clone();
        let exchange = deps.exchange.clone();
        let risk_v2 = deps.risk_v2.clone();
        let frequency = deps.frequency.clone();
        let cycle_count = Arc::new(AtomicU64::new(0));
        let cycle_count_task = cycle_count.clone();
        let trading_mode = Arc::new(RwLock::new(deps.config.trading_mode));
        let trading_mode_task = trading_mode.clone();
        let (stop_tx, mut stop_rx) = watch::channel(false);

        let join_handle = tokio::spawn(async move {
            let mut cycle: u64 = 0;
            loop {
                if *stop_rx.borrow() {
                    info!(trader_id = %deps.config.id, "trader cycle loop stopping");
                    break;
                }

                let mode = *trading_mode_task.read();
                match mode {
                    TradingMode::Killed => {
                        info!(trader_id = %deps.config.id, "trader killed, exiting cycle loop");
                        break;
                    }
                    TradingMode::Paused => {
                        // Skip the cycle entirely; still honor stop/resume.
                    }
                    TradingMode::Live => {
                        if deps.config.enabled {
                            match run_cycle(&deps, cycle).await {
                                Ok(()) => {
                                    cycle_count_task.store(cycle, Ordering::Relaxed);
                                }
                                Err(e) => {
                                    error!(trader_id = %deps.config.id, cycle, error = %e, "trader cycle failed");
                                }
                            }
                            cycle += 1;
                        }
                    }
                }

                tokio::select! {
                    _ = tokio::time::sleep(scan_interval) => {}
                    _ = stop_rx.changed() => {
                        if *stop_rx.borrow() {
                            info!(trader_id = %deps.config.id, "trader cycle loop stopping mid-wait");
                            break;
                        }
                    }
                }
            }
        });

        self.traders.push(TraderHandle {
            trader_id,
            name,
            account_mode,
            decision_log,
            exchange,
            risk_v2,
            frequency,
            trading_mode,
            stop_tx,
            join_handle,
            cycle_count,
        });
    }

    pub fn traders(&self) -> &[TraderHandle] {
        &self.traders
    }

    pub fn trader(&self, trader_id: &str) -> Option<&TraderHandle> {
        self.traders.iter().find(|t| t.trader_id == trader_id)
    }

    /// Stop every running trader, awaiting each in-flight cycle to finish.
    pub async fn stop_all(self) {
        for trader in self.traders {
            trader.stop().await;
        }
    }
}

impl Default for TraderManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_manager_has_no_traders() {
        let manager = TraderManager::new();
        assert!(manager.traders().is_empty());
        assert!(manager.trader("missing").is_none());
    }
}
