// =============================================================================
// Frequency manager — elastic rate limiter with hysteresis
// =============================================================================
//
// Generalizes the teacher's `risk.rs` daily/hourly counter pattern
// (maybe_reset_daily, RwLock<Inner>) to a two-mode limiter whose mode
// oscillates between `basic` and `elastic` based on rolling daily PnL%.
// =============================================================================

use chrono::{Timelike, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FrequencyMode {
    Basic,
    Elastic,
}

pub struct FrequencyLimits {
    pub hourly_basic: u32,
    pub daily_basic: i64,
    pub hourly_elastic: u32,
    pub daily_elastic: i64,
    pub hourly_absolute_max: u32,
    pub upgrade_threshold_pct: f64,
    pub downgrade_threshold_pct: f64,
}

impl Default for FrequencyLimits {
    fn default() -> Self {
        Self {
            hourly_basic: 4,
            daily_basic: 20,
            hourly_elastic: 10,
            daily_elastic: -1,
            hourly_absolute_max: 15,
            upgrade_threshold_pct: 2.0,
            downgrade_threshold_pct: 1.0,
        }
    }
}

struct Inner {
    mode: FrequencyMode,
    hourly_count: u32,
    daily_count: i64,
    current_hour: u32,
    current_date: String,
}

pub struct FrequencyManager {
    limits: FrequencyLimits,
    state: RwLock<Inner>,
}

impl FrequencyManager {
    pub fn new(limits: FrequencyLimits) -> Self {
        let now = Utc::now();
        Self {
            limits,
            state: RwLock::new(Inner {
                mode: FrequencyMode::Basic,
                hourly_count: 0,
                daily_count: 0,
                current_hour: now.hour(),
                current_date: now.format("%Y-%m-%d").to_string(),
            }),
        }
    }

    fn maybe_roll_windows(&self, s: &mut Inner) {
        let now = Utc::now();
        if now.hour() != s.current_hour {
            s.current_hour = now.hour();
            s.hourly_count = 0;
        }
        let today = now.format("%Y-%m-%d").to_string();
        if today != s.current_date {
            s.current_date = today;
            s.daily_count = 0;
        }
    }

    /// Reevaluate mode from rolling daily PnL%, applying hysteresis.
    pub fn update_mode(&self, daily_pnl_pct: f64) {
        let mut s = self.state.write();
        match s.mode {
            FrequencyMode::Basic if daily_pnl_pct >= self.limits.upgrade_threshold_pct => {
                s.mode = FrequencyMode::Elastic;
                info!(daily_pnl_pct, "frequency manager: upgraded to elastic");
            }
            FrequencyMode::Elastic if daily_pnl_pct <= self.limits.downgrade_threshold_pct => {
                s.mode = FrequencyMode::Basic;
                info!(daily_pnl_pct, "frequency manager: downgraded to basic");
            }
            _ => {}
        }
    }

    pub fn mode(&self) -> FrequencyMode {
        self.state.read().mode
    }

    /// Returns true iff an open_* attempt is allowed under current counters.
    pub fn allowed(&self) -> bool {
        let mut s = self.state.write();
        self.maybe_roll_windows(&mut s);

        let (hourly_limit, daily_limit) = match s.mode {
            FrequencyMode::Basic => (self.limits.hourly_basic, self.limits.daily_basic),
            FrequencyMode::Elastic => (self.limits.hourly_elastic, self.limits.daily_elastic),
        };

        if s.hourly_count >= hourly_limit {
            return false;
        }
        if s.hourly_count >= self.limits.hourly_absolute_max {
            return false;
        }
        if daily_limit != -1 && s.daily_count >= daily_limit {
            return false;
        }
        true
    }

    /// Record an executed open_*; rejected attempts must not call this.
    pub fn record_open(&self) {
        let mut s = self.state.write();
        self.maybe_roll_windows(&mut s);
        s.hourly_count += 1;
        s.daily_count += 1;
    }
}
