// =============================================================================
// Central Application State — multi-trader control plane
// =============================================================================
//
// The single source of truth the HTTP control-plane surface reads from. Each
// trader owns its own decision log and risk-v2/frequency state inside
// `TraderManager`; `EngineState` only aggregates what is process-wide.
// =============================================================================

use parking_lot::RwLock;
use serde::Serialize;

use crate::trader::TraderManager;

/// A recorded error event for the dashboard error log.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorRecord {
    pub message: String,
    pub code: Option<String>,
    pub at: String,
}

const MAX_RECENT_ERRORS: usize = 50;

/// Central state shared across all async tasks via `Arc<EngineState>`.
pub struct EngineState {
    pub traders: RwLock<TraderManager>,
    pub recent_errors: RwLock<Vec<ErrorRecord>>,
    pub start_time: std::time::Instant,
}

impl EngineState {
    pub fn new(traders: TraderManager) -> Self {
        Self {
            traders: RwLock::new(traders),
            recent_errors: RwLock::new(Vec::new()),
            start_time: std::time::Instant::now(),
        }
    }

    pub fn push_error(&self, message: String) {
        self.push_error_with_code(message, None);
    }

    pub fn push_error_with_code(&self, message: String, code: Option<String>) {
        let mut errors = self.recent_errors.write();
        errors.push(ErrorRecord {
            message,
            code,
            at: chrono::Utc::now().to_rfc3339(),
        });
        while errors.len() > MAX_RECENT_ERRORS {
            errors.remove(0);
        }
    }

    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_state_has_no_errors() {
        let state = EngineState::new(TraderManager::new());
        assert!(state.recent_errors.read().is_empty());
    }

    #[test]
    fn push_error_caps_at_max_recent() {
        let state = EngineState::new(TraderManager::new());
        for i in 0..(MAX_RECENT_ERRORS + 10) {
            state.push_error(format!("err {i}"));
        }
        assert_eq!(state.recent_errors.read().len(), MAX_RECENT_ERRORS);
    }
}
