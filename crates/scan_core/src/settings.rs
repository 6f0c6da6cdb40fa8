use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Timing and sizing knobs for the lifecycle tracker.
///
/// Durations are stored as milliseconds so the struct reads naturally in
/// config files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerSettings {
    /// How long a finished record stays visible before it is removed.
    pub grace_period_ms: u64,
    /// Interval of the synthetic progress tick.
    pub progress_tick_ms: u64,
    /// Interval of the completion-phase tick.
    pub finish_tick_ms: u64,
    /// Status poll interval for active web jobs.
    pub poll_interval_ms: u64,
    pub synthetic_cap: u8,
    pub synthetic_max_step: u8,
    pub finish_step: u8,
    pub log_capacity: usize,
}

impl Default for TrackerSettings {
    fn default() -> Self {
        Self {
            grace_period_ms: 2_500,
            progress_tick_ms: 800,
            finish_tick_ms: 40,
            poll_interval_ms: 3_000,
            synthetic_cap: 95,
            synthetic_max_step: 3,
            finish_step: 2,
            log_capacity: 200,
        }
    }
}

impl TrackerSettings {
    pub fn progress_tick(&self) -> Duration {
        Duration::from_millis(self.progress_tick_ms.max(1))
    }

    pub fn finish_tick(&self) -> Duration {
        Duration::from_millis(self.finish_tick_ms.max(1))
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }
}
