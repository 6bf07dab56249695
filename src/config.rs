// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Configuration for the abuse guard service.
//!
//! Defaults match the limits the site's contact and appointment forms were
//! originally tuned for: 5 attempts per minute per identifier, 10 per minute
//! per network identity, backoff doubling from one second up to five minutes.

use crate::guard::{GuardError, Limit};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;

/// Configuration for the abuse guard service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Server bind address (default: 0.0.0.0:8080)
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Rate limiting and backoff configuration
    #[serde(default)]
    pub guard: GuardConfig,

    /// Metrics configuration
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Rate limiting and backoff configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuardConfig {
    /// Default attempts allowed per identifier within the window (default: 5)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Default identifier window in milliseconds (default: 60000)
    #[serde(default = "default_window_ms")]
    pub window_ms: u64,

    /// Attempts allowed per network identity within the window (default: 10)
    #[serde(default = "default_network_max_attempts")]
    pub network_max_attempts: u32,

    /// Network identity window in milliseconds (default: 60000)
    #[serde(default = "default_window_ms")]
    pub network_window_ms: u64,

    /// Backoff unit, multiplied by 2^excess (default: 1000)
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,

    /// Upper bound on a single penalty (default: 300000)
    #[serde(default = "default_backoff_max_ms")]
    pub backoff_max_ms: u64,

    /// Keys idle for longer than this are dropped by the sweep (default: 300000)
    #[serde(default = "default_idle_ttl_ms")]
    pub idle_ttl_ms: u64,

    /// Seconds between sweeps, 0 disables (default: 60)
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
}

/// Metrics configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Enable Prometheus metrics endpoint (default: true)
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Metrics endpoint path (default: /metrics)
    #[serde(default = "default_metrics_path")]
    pub path: String,
}

// Default value functions
fn default_bind_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_max_attempts() -> u32 {
    5
}

fn default_window_ms() -> u64 {
    60_000
}

fn default_network_max_attempts() -> u32 {
    10
}

fn default_backoff_base_ms() -> u64 {
    1_000
}

fn default_backoff_max_ms() -> u64 {
    300_000 // 5 minutes
}

fn default_idle_ttl_ms() -> u64 {
    300_000
}

fn default_sweep_interval_secs() -> u64 {
    60
}

fn default_true() -> bool {
    true
}

fn default_metrics_path() -> String {
    "/metrics".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            guard: GuardConfig::default(),
            metrics: MetricsConfig::default(),
        }
    }
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            window_ms: default_window_ms(),
            network_max_attempts: default_network_max_attempts(),
            network_window_ms: default_window_ms(),
            backoff_base_ms: default_backoff_base_ms(),
            backoff_max_ms: default_backoff_max_ms(),
            idle_ttl_ms: default_idle_ttl_ms(),
            sweep_interval_secs: default_sweep_interval_secs(),
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            path: default_metrics_path(),
        }
    }
}

impl Config {
    /// Build a configuration from environment variables, falling back to
    /// defaults for anything unset or unparsable.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = GuardConfig::default();

        Config {
            bind_addr: lookup("BIND_ADDR").unwrap_or_else(default_bind_addr),
            guard: GuardConfig {
                max_attempts: parse_var(&lookup, "MAX_ATTEMPTS")
                    .unwrap_or(defaults.max_attempts),
                window_ms: parse_var(&lookup, "WINDOW_MS").unwrap_or(defaults.window_ms),
                network_max_attempts: parse_var(&lookup, "NETWORK_MAX_ATTEMPTS")
                    .unwrap_or(defaults.network_max_attempts),
                network_window_ms: parse_var(&lookup, "NETWORK_WINDOW_MS")
                    .unwrap_or(defaults.network_window_ms),
                backoff_base_ms: parse_var(&lookup, "BACKOFF_BASE_MS")
                    .unwrap_or(defaults.backoff_base_ms),
                backoff_max_ms: parse_var(&lookup, "BACKOFF_MAX_MS")
                    .unwrap_or(defaults.backoff_max_ms),
                idle_ttl_ms: parse_var(&lookup, "IDLE_TTL_MS").unwrap_or(defaults.idle_ttl_ms),
                sweep_interval_secs: parse_var(&lookup, "SWEEP_INTERVAL_SECS")
                    .unwrap_or(defaults.sweep_interval_secs),
            },
            metrics: MetricsConfig {
                enabled: parse_var(&lookup, "METRICS_ENABLED").unwrap_or_else(default_true),
                ..Default::default()
            },
        }
    }
}

fn parse_var<T, F>(lookup: &F, key: &str) -> Option<T>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    lookup(key).and_then(|v| v.trim().parse().ok())
}

impl GuardConfig {
    /// Limit applied to identifiers when a caller does not supply one.
    pub fn default_limit(&self) -> Result<Limit, GuardError> {
        Limit::new(self.max_attempts, Duration::from_millis(self.window_ms))
    }

    /// Limit applied to network identities.
    pub fn network_limit(&self) -> Result<Limit, GuardError> {
        Limit::new(
            self.network_max_attempts,
            Duration::from_millis(self.network_window_ms),
        )
    }

    pub fn backoff_base(&self) -> Duration {
        Duration::from_millis(self.backoff_base_ms)
    }

    pub fn backoff_max(&self) -> Duration {
        Duration::from_millis(self.backoff_max_ms)
    }

    pub fn idle_ttl(&self) -> Duration {
        Duration::from_millis(self.idle_ttl_ms)
    }

    /// Sweep period, or `None` when sweeping is disabled.
    pub fn sweep_interval(&self) -> Option<Duration> {
        (self.sweep_interval_secs > 0).then(|| Duration::from_secs(self.sweep_interval_secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.bind_addr, "0.0.0.0:8080");
        assert_eq!(config.guard.max_attempts, 5);
        assert_eq!(config.guard.window_ms, 60_000);
        assert_eq!(config.guard.network_max_attempts, 10);
        assert_eq!(config.guard.backoff_max_ms, 300_000);
        assert!(config.metrics.enabled);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: Config =
            serde_json::from_str(r#"{"guard": {"max_attempts": 3}}"#).unwrap();
        assert_eq!(config.guard.max_attempts, 3);
        assert_eq!(config.guard.window_ms, 60_000);
        assert_eq!(config.metrics.path, "/metrics");
    }

    #[test]
    fn test_from_lookup_overrides_and_ignores_garbage() {
        let vars: HashMap<&str, &str> = [
            ("BIND_ADDR", "127.0.0.1:9000"),
            ("MAX_ATTEMPTS", "3"),
            ("WINDOW_MS", "not-a-number"),
            ("SWEEP_INTERVAL_SECS", "0"),
            ("METRICS_ENABLED", "false"),
        ]
        .into_iter()
        .collect();

        let config = Config::from_lookup(|k| vars.get(k).map(|v| v.to_string()));
        assert_eq!(config.bind_addr, "127.0.0.1:9000");
        assert_eq!(config.guard.max_attempts, 3);
        assert_eq!(config.guard.window_ms, 60_000);
        assert_eq!(config.guard.sweep_interval(), None);
        assert!(!config.metrics.enabled);
    }

    #[test]
    fn test_zero_limit_is_rejected() {
        let guard = GuardConfig {
            max_attempts: 0,
            ..Default::default()
        };
        assert!(guard.default_limit().is_err());
        assert!(guard.network_limit().is_ok());
    }
}
