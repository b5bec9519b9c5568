//! Service configuration

use anyhow::Result;
use observer_lib::{ObserverConfig, WatchTarget};
use serde::Deserialize;
use tracing::warn;

/// Observer service configuration, loaded from `OBSERVER_*` env vars
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    /// API server port
    #[serde(default = "default_api_port")]
    pub api_port: u16,

    /// Metric store base URL
    #[serde(default = "default_metric_source_url")]
    pub metric_source_url: String,

    /// Commit listing base URL
    #[serde(default = "default_commit_source_url")]
    pub commit_source_url: String,

    /// Remediation integration gateway base URL
    #[serde(default = "default_remediation_url")]
    pub remediation_url: String,

    /// Seconds between detection ticks
    #[serde(default = "default_tick_interval")]
    pub tick_interval_secs: u64,

    /// Sigma threshold for raising an anomaly
    #[serde(default = "default_sigma_threshold")]
    pub sigma_threshold: f64,

    /// Trailing baseline window in days
    #[serde(default = "default_baseline_window_days")]
    pub baseline_window_days: i64,

    /// Short current window in minutes
    #[serde(default = "default_current_window_mins")]
    pub current_window_mins: i64,

    /// Workflow cooldown in minutes
    #[serde(default = "default_cooldown_mins")]
    pub cooldown_mins: i64,

    /// Commit correlation lookback in minutes
    #[serde(default = "default_correlation_window_mins")]
    pub correlation_window_mins: i64,

    /// Comma-separated `service:metric` pairs to watch
    #[serde(default)]
    pub watch: String,

    /// Start the detection loop immediately on boot
    #[serde(default = "default_autostart")]
    pub autostart: bool,
}

fn default_api_port() -> u16 {
    8080
}

fn default_metric_source_url() -> String {
    "http://metric-store:9200".to_string()
}

fn default_commit_source_url() -> String {
    "http://commit-proxy:8080".to_string()
}

fn default_remediation_url() -> String {
    "http://integration-gateway:8001".to_string()
}

fn default_tick_interval() -> u64 {
    60
}

fn default_sigma_threshold() -> f64 {
    3.0
}

fn default_baseline_window_days() -> i64 {
    7
}

fn default_current_window_mins() -> i64 {
    60
}

fn default_cooldown_mins() -> i64 {
    30
}

fn default_correlation_window_mins() -> i64 {
    120
}

fn default_autostart() -> bool {
    true
}

impl ServiceConfig {
    /// Load configuration from the environment
    pub fn load() -> Result<Self> {
        let config = config::Config::builder()
            .add_source(config::Environment::with_prefix("OBSERVER").try_parsing(true))
            .build()?;

        Ok(config.try_deserialize()?)
    }

    /// Parse the watch list; malformed pair specs are logged and dropped
    pub fn watch_targets(&self) -> Vec<WatchTarget> {
        self.watch
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .filter_map(|spec| {
                let target = WatchTarget::parse(spec);
                if target.is_none() {
                    warn!(spec = %spec, "Ignoring malformed watch pair, expected service:metric");
                }
                target
            })
            .collect()
    }

    /// Engine configuration derived from this service configuration
    pub fn observer_config(&self) -> ObserverConfig {
        ObserverConfig {
            tick_interval: std::time::Duration::from_secs(self.tick_interval_secs),
            sigma_threshold: self.sigma_threshold,
            baseline_window: chrono::Duration::days(self.baseline_window_days),
            current_window: chrono::Duration::minutes(self.current_window_mins),
            cooldown: chrono::Duration::minutes(self.cooldown_mins),
            correlation_window: chrono::Duration::minutes(self.correlation_window_mins),
            watch: self.watch_targets(),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with_watch(watch: &str) -> ServiceConfig {
        ServiceConfig {
            api_port: default_api_port(),
            metric_source_url: default_metric_source_url(),
            commit_source_url: default_commit_source_url(),
            remediation_url: default_remediation_url(),
            tick_interval_secs: default_tick_interval(),
            sigma_threshold: default_sigma_threshold(),
            baseline_window_days: default_baseline_window_days(),
            current_window_mins: default_current_window_mins(),
            cooldown_mins: default_cooldown_mins(),
            correlation_window_mins: default_correlation_window_mins(),
            watch: watch.to_string(),
            autostart: true,
        }
    }

    #[test]
    fn test_watch_list_parsing() {
        let config = config_with_watch("api-gateway:p99_latency, checkout:error_rate");
        let targets = config.watch_targets();
        assert_eq!(targets.len(), 2);
        assert_eq!(targets[0].service, "api-gateway");
        assert_eq!(targets[1].metric, "error_rate");
    }

    #[test]
    fn test_malformed_pairs_dropped() {
        let config = config_with_watch("good:pair,broken,also:fine,");
        assert_eq!(config.watch_targets().len(), 2);
    }

    #[test]
    fn test_engine_config_derivation() {
        let config = config_with_watch("svc:metric");
        let engine = config.observer_config();
        assert_eq!(engine.tick_interval.as_secs(), 60);
        assert_eq!(engine.cooldown, chrono::Duration::minutes(30));
        assert_eq!(engine.watch.len(), 1);
    }
}
