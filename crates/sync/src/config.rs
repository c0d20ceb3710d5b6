//! Orchestrator configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::retry::RetryPolicy;

/// Bounds on concurrent outbound calls within one run.
pub const MIN_CONCURRENCY: usize = 1;
pub const MAX_CONCURRENCY: usize = 8;

/// What to do when mirroring a local order status change to the platform fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MirrorPolicy {
    /// Drop the failure.
    Ignore,
    /// Log it and hand it back with the committed order.
    #[default]
    Warn,
    /// Return an error; the local change stays committed.
    Fail,
}

impl std::str::FromStr for MirrorPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "ignore" => Ok(MirrorPolicy::Ignore),
            "warn" => Ok(MirrorPolicy::Warn),
            "fail" => Ok(MirrorPolicy::Fail),
            other => Err(format!("unknown mirror policy: {other}")),
        }
    }
}

/// Tuning of sync runs.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncConfig {
    /// Concurrent outbound calls per run; see [`SyncConfig::concurrency`].
    pub max_concurrency: usize,
    /// Timeout of every single adapter call.
    pub call_timeout: Duration,
    pub retry: RetryPolicy,
    /// An `InProgress` run older than this is treated as abandoned.
    pub stale_run_after: Duration,
    /// How long a failed order keeps holding the order cursor back. Older
    /// failures are given up on and the cursor moves past them.
    pub order_retry_window: Duration,
    pub order_status_mirror: MirrorPolicy,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 4,
            call_timeout: Duration::from_secs(30),
            retry: RetryPolicy::default(),
            stale_run_after: Duration::from_secs(60 * 60),
            order_retry_window: Duration::from_secs(24 * 60 * 60),
            order_status_mirror: MirrorPolicy::default(),
        }
    }
}

impl SyncConfig {
    /// Effective worker count, clamped to the supported range.
    pub fn concurrency(&self) -> usize {
        self.max_concurrency.clamp(MIN_CONCURRENCY, MAX_CONCURRENCY)
    }

    /// Sets the outbound call concurrency (clamped when used).
    pub fn with_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency;
        self
    }

    /// Sets the retry policy for transient adapter failures.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Sets the timeout of a single adapter call.
    pub fn with_call_timeout(mut self, call_timeout: Duration) -> Self {
        self.call_timeout = call_timeout;
        self
    }

    /// Sets how order status mirror failures are handled.
    pub fn with_mirror_policy(mut self, policy: MirrorPolicy) -> Self {
        self.order_status_mirror = policy;
        self
    }

    /// Sets how long failed orders hold the order cursor back.
    pub fn with_order_retry_window(mut self, window: Duration) -> Self {
        self.order_retry_window = window;
        self
    }

    pub(crate) fn stale_after(&self) -> chrono::Duration {
        chrono::Duration::from_std(self.stale_run_after).unwrap_or(chrono::Duration::hours(1))
    }

    pub(crate) fn retry_window(&self) -> chrono::Duration {
        chrono::Duration::from_std(self.order_retry_window).unwrap_or(chrono::Duration::days(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = SyncConfig::default();
        assert_eq!(config.concurrency(), 4);
        assert_eq!(config.call_timeout, Duration::from_secs(30));
        assert_eq!(config.retry.max_retries, 3);
        assert_eq!(config.order_status_mirror, MirrorPolicy::Warn);
        assert_eq!(config.retry_window(), chrono::Duration::hours(24));
    }

    #[test]
    fn concurrency_is_clamped() {
        assert_eq!(SyncConfig::default().with_concurrency(0).concurrency(), 1);
        assert_eq!(SyncConfig::default().with_concurrency(64).concurrency(), 8);
    }

    #[test]
    fn mirror_policy_parses_case_insensitively() {
        assert_eq!("FAIL".parse::<MirrorPolicy>().unwrap(), MirrorPolicy::Fail);
        assert_eq!("ignore".parse::<MirrorPolicy>().unwrap(), MirrorPolicy::Ignore);
        assert!("loud".parse::<MirrorPolicy>().is_err());
    }
}
