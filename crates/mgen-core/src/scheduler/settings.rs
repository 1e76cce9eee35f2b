//! Scheduler tuning derived from the config file.

use std::path::PathBuf;
use std::time::Duration;

use crate::config::MgenConfig;
use crate::credentials::SpacingPolicy;
use crate::retry::RetryPolicy;

#[derive(Debug, Clone)]
pub struct SchedulerSettings {
    pub credentials: Vec<String>,
    pub min_spacing: Duration,
    pub spacing_policy: SpacingPolicy,
    /// Delay before the first poll and base delay between polls.
    pub poll_interval: Duration,
    /// Per-iteration growth of the poll delay (1.0 = fixed).
    pub poll_backoff_factor: f64,
    pub max_poll_interval: Duration,
    /// Wall-clock cap on one job's poll loop.
    pub poll_timeout: Duration,
    pub retry: RetryPolicy,
    pub download_root: PathBuf,
}

impl SchedulerSettings {
    pub fn from_config(cfg: &MgenConfig) -> Self {
        Self {
            credentials: cfg.credentials.clone(),
            min_spacing: cfg.min_spacing(),
            spacing_policy: cfg.spacing_policy(),
            poll_interval: Duration::from_secs(cfg.poll_interval_secs),
            poll_backoff_factor: cfg.poll_backoff_factor,
            max_poll_interval: Duration::from_secs(cfg.max_poll_interval_secs),
            poll_timeout: Duration::from_secs(cfg.poll_timeout_secs),
            retry: cfg.retry_policy(),
            download_root: cfg
                .download_root
                .clone()
                .unwrap_or_else(|| PathBuf::from(".")),
        }
    }

    /// Delay before the poll after one that waited `current`.
    pub fn next_poll_delay(&self, current: Duration) -> Duration {
        let factor = if self.poll_backoff_factor.is_finite() && self.poll_backoff_factor > 1.0 {
            self.poll_backoff_factor.min(10.0)
        } else {
            1.0
        };
        current.mul_f64(factor).min(self.max_poll_interval.max(self.poll_interval))
    }
}
