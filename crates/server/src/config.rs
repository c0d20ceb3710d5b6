//! Application configuration loaded from environment variables.

use std::time::Duration;

use sync::{MirrorPolicy, RetryPolicy, SyncConfig};

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST`: bind address (default: `"0.0.0.0"`)
/// - `PORT`: listen port (default: `3000`)
/// - `RUST_LOG`: tracing filter directive (default: `"info"`)
/// - `LOG_FORMAT`: `text` or `json` (default: `text`)
/// - `DATABASE_URL`: PostgreSQL URL; the in-memory store is used when unset
/// - `SYNC_INTERVAL_SECS`: default interval between scheduled syncs (default: `900`)
/// - `SCHEDULER_TICK_SECS`: how often the scheduler looks for due integrations (default: `60`)
/// - `SYNC_MAX_CONCURRENCY`: outbound calls per run (default: `4`, clamped to 1..=8)
/// - `SYNC_CALL_TIMEOUT_SECS`: timeout of one platform call (default: `30`)
/// - `SYNC_MAX_RETRIES`: retries of a transient failure (default: `3`)
/// - `ORDER_STATUS_MIRROR`: `ignore`, `warn` or `fail` (default: `warn`)
/// - `ORDER_RETRY_WINDOW_SECS`: how long a failing order is re-pulled before it is given up (default: `86400`)
/// - `SIMULATED_PLATFORMS`: comma-separated platforms served by the simulated adapter
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub log_format: LogFormat,
    pub database_url: Option<String>,
    pub sync_interval: Duration,
    pub scheduler_tick: Duration,
    pub sync: SyncConfig,
    pub simulated_platforms: Vec<String>,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration through `lookup`, falling back to defaults for
    /// missing or unparsable values.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let parsed = |key: &str| lookup(key).and_then(|v| v.trim().parse::<u64>().ok());

        let mut sync = defaults.sync.clone();
        if let Some(n) = parsed("SYNC_MAX_CONCURRENCY") {
            sync.max_concurrency = n as usize;
        }
        if let Some(secs) = parsed("SYNC_CALL_TIMEOUT_SECS") {
            sync.call_timeout = Duration::from_secs(secs);
        }
        if let Some(n) = parsed("SYNC_MAX_RETRIES") {
            sync.retry = RetryPolicy {
                max_retries: n as u32,
                ..sync.retry
            };
        }
        if let Some(secs) = parsed("ORDER_RETRY_WINDOW_SECS").filter(|secs| *secs > 0) {
            sync.order_retry_window = Duration::from_secs(secs);
        }
        if let Some(policy) = lookup("ORDER_STATUS_MIRROR").and_then(|v| v.parse::<MirrorPolicy>().ok()) {
            sync.order_status_mirror = policy;
        }

        Self {
            host: lookup("HOST").unwrap_or(defaults.host),
            port: lookup("PORT")
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.port),
            log_level: lookup("RUST_LOG").unwrap_or(defaults.log_level),
            log_format: match lookup("LOG_FORMAT").as_deref() {
                Some(f) if f.eq_ignore_ascii_case("json") => LogFormat::Json,
                _ => LogFormat::Text,
            },
            database_url: lookup("DATABASE_URL").filter(|url| !url.is_empty()),
            sync_interval: parsed("SYNC_INTERVAL_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.sync_interval),
            scheduler_tick: parsed("SCHEDULER_TICK_SECS")
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs)
                .unwrap_or(defaults.scheduler_tick),
            sync,
            simulated_platforms: lookup("SIMULATED_PLATFORMS")
                .map(|list| {
                    list.split(',')
                        .map(str::trim)
                        .filter(|p| !p.is_empty())
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or(defaults.simulated_platforms),
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// The scheduler interval as a calendar duration.
    pub fn default_sync_interval(&self) -> chrono::Duration {
        chrono::Duration::from_std(self.sync_interval).unwrap_or(chrono::Duration::minutes(15))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            log_format: LogFormat::Text,
            database_url: None,
            sync_interval: Duration::from_secs(900),
            scheduler_tick: Duration::from_secs(60),
            sync: SyncConfig::default(),
            simulated_platforms: vec![
                "TRENDYOL".to_string(),
                "HEPSIBURADA".to_string(),
                "N11".to_string(),
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn from_map(pairs: &[(&str, &str)]) -> Config {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_default_values() {
        let config = Config::default();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 3000);
        assert_eq!(config.log_level, "info");
        assert_eq!(config.log_format, LogFormat::Text);
        assert!(config.database_url.is_none());
        assert_eq!(config.sync_interval, Duration::from_secs(900));
        assert_eq!(config.scheduler_tick, Duration::from_secs(60));
    }

    #[test]
    fn test_addr_formatting() {
        let config = Config {
            host: "127.0.0.1".to_string(),
            port: 8080,
            ..Config::default()
        };
        assert_eq!(config.addr(), "127.0.0.1:8080");
    }

    #[test]
    fn test_sync_settings_from_env() {
        let config = from_map(&[
            ("SYNC_MAX_CONCURRENCY", "16"),
            ("SYNC_CALL_TIMEOUT_SECS", "5"),
            ("SYNC_MAX_RETRIES", "1"),
            ("ORDER_STATUS_MIRROR", "fail"),
            ("ORDER_RETRY_WINDOW_SECS", "7200"),
            ("LOG_FORMAT", "JSON"),
            ("DATABASE_URL", "postgres://localhost/commerce"),
            ("SIMULATED_PLATFORMS", "trendyol, n11,"),
        ]);
        assert_eq!(config.sync.concurrency(), 8);
        assert_eq!(config.sync.call_timeout, Duration::from_secs(5));
        assert_eq!(config.sync.retry.max_retries, 1);
        assert_eq!(config.sync.order_status_mirror, MirrorPolicy::Fail);
        assert_eq!(config.sync.order_retry_window, Duration::from_secs(7200));
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(config.database_url.as_deref(), Some("postgres://localhost/commerce"));
        assert_eq!(config.simulated_platforms, vec!["trendyol", "n11"]);
    }

    #[test]
    fn test_invalid_values_fall_back() {
        let config = from_map(&[
            ("PORT", "not-a-port"),
            ("SCHEDULER_TICK_SECS", "0"),
            ("ORDER_STATUS_MIRROR", "loud"),
            ("DATABASE_URL", ""),
        ]);
        assert_eq!(config.port, 3000);
        assert_eq!(config.scheduler_tick, Duration::from_secs(60));
        assert_eq!(config.sync.order_status_mirror, MirrorPolicy::Warn);
        assert!(config.database_url.is_none());
    }
}
