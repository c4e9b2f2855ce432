//! Periodic task configuration

use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;

/// Scheduler configuration
#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerConfig {
    /// Run periodic tasks inside this process
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Seconds between expiration sweeps
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,

    /// Seconds between renewal reminder runs
    #[serde(default = "default_reminder_interval")]
    pub reminder_interval_secs: u64,

    /// Seconds between admin stats reports
    #[serde(default = "default_daily_stats_interval")]
    pub daily_stats_interval_secs: u64,
}

impl SchedulerConfig {
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    pub fn reminder_interval(&self) -> Duration {
        Duration::from_secs(self.reminder_interval_secs)
    }

    pub fn daily_stats_interval(&self) -> Duration {
        Duration::from_secs(self.daily_stats_interval_secs)
    }

    /// Validate scheduler configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.sweep_interval_secs == 0
            || self.reminder_interval_secs == 0
            || self.daily_stats_interval_secs == 0
        {
            return Err(ValidationError::InvalidInterval);
        }
        Ok(())
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            sweep_interval_secs: default_sweep_interval(),
            reminder_interval_secs: default_reminder_interval(),
            daily_stats_interval_secs: default_daily_stats_interval(),
        }
    }
}

fn default_enabled() -> bool {
    true
}

fn default_sweep_interval() -> u64 {
    3600
}

fn default_reminder_interval() -> u64 {
    86_400
}

fn default_daily_stats_interval() -> u64 {
    86_400
}
