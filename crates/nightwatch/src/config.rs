//! Scheduler configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Policy constants for trigger classification, timeouts and archiving.
///
/// Every literal the classifier or the tier chain relies on lives here so
/// the whole trigger policy is auditable in one place.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Concurrency for scheduled (nightly-window) runs.
    pub scheduled_jobs: u32,

    /// Fallback concurrency for manual and change-triggered runs.
    pub fallback_jobs: u32,

    /// Smoke target used when a manual request names no targets and for
    /// change-triggered runs.
    pub default_target: String,

    /// Wall-clock ceiling for the primary tier, in minutes.
    pub primary_timeout_minutes: u64,

    /// Wall-clock ceiling for the secondary (hourly) tier, in minutes.
    pub secondary_timeout_minutes: u64,

    /// Artifact retention, in days.
    pub retention_days: u32,

    /// Prefix archive keys with the run id instead of overwriting by job
    /// name across reruns.
    pub qualify_with_run_id: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            scheduled_jobs: 20,
            fallback_jobs: 32,
            default_target: "//tests/smoke:basic_health".to_string(),
            primary_timeout_minutes: 120,
            secondary_timeout_minutes: 150,
            retention_days: 14,
            qualify_with_run_id: false,
        }
    }
}

impl SchedulerConfig {
    /// Timeout ceiling for the primary tier.
    pub fn primary_timeout(&self) -> Duration {
        Duration::from_secs(self.primary_timeout_minutes * 60)
    }

    /// Timeout ceiling for the secondary tier.
    pub fn secondary_timeout(&self) -> Duration {
        Duration::from_secs(self.secondary_timeout_minutes * 60)
    }
}
