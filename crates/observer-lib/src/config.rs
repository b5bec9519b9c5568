//! Engine configuration
//!
//! Values only; how they are loaded (env, file) is the binary's concern.

use chrono::Duration;
use std::time::Duration as StdDuration;

/// One (service, metric) pair to watch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchTarget {
    pub service: String,
    pub metric: String,
}

impl WatchTarget {
    pub fn new(service: impl Into<String>, metric: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            metric: metric.into(),
        }
    }

    /// Parse a `service:metric` pair spec
    pub fn parse(spec: &str) -> Option<Self> {
        let (service, metric) = spec.split_once(':')?;
        if service.is_empty() || metric.is_empty() {
            return None;
        }
        Some(Self::new(service.trim(), metric.trim()))
    }
}

/// Configuration for the observer engine
#[derive(Debug, Clone)]
pub struct ObserverConfig {
    /// Interval between detection ticks (default: 60 seconds)
    pub tick_interval: StdDuration,
    /// Sigma threshold for raising an anomaly (default: 3.0)
    pub sigma_threshold: f64,
    /// Trailing baseline window (default: 7 days)
    pub baseline_window: Duration,
    /// Short current window (default: 1 hour)
    pub current_window: Duration,
    /// Minimum time between workflows for the same pair (default: 30 min)
    pub cooldown: Duration,
    /// Commit correlation lookback (default: 2 hours)
    pub correlation_window: Duration,
    /// Minimum baseline samples before detection is attempted
    pub min_baseline_samples: usize,
    /// Capacity of the recent-anomalies buffer
    pub recent_anomaly_cap: usize,
    /// Retention for terminal workflows before pruning
    pub workflow_retention: Duration,
    /// The (service, metric) pairs to evaluate each tick
    pub watch: Vec<WatchTarget>,
}

impl Default for ObserverConfig {
    fn default() -> Self {
        Self {
            tick_interval: StdDuration::from_secs(60),
            sigma_threshold: 3.0,
            baseline_window: Duration::days(7),
            current_window: Duration::hours(1),
            cooldown: Duration::minutes(30),
            correlation_window: Duration::hours(2),
            min_baseline_samples: 2,
            recent_anomaly_cap: 50,
            workflow_retention: Duration::hours(24),
            watch: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_contract() {
        let config = ObserverConfig::default();
        assert_eq!(config.tick_interval, StdDuration::from_secs(60));
        assert_eq!(config.sigma_threshold, 3.0);
        assert_eq!(config.baseline_window, Duration::days(7));
        assert_eq!(config.current_window, Duration::hours(1));
        assert_eq!(config.cooldown, Duration::minutes(30));
        assert_eq!(config.correlation_window, Duration::hours(2));
        assert_eq!(config.min_baseline_samples, 2);
    }

    #[test]
    fn test_watch_target_parse() {
        let target = WatchTarget::parse("api-gateway:p99_latency").unwrap();
        assert_eq!(target.service, "api-gateway");
        assert_eq!(target.metric, "p99_latency");

        assert!(WatchTarget::parse("no-colon").is_none());
        assert!(WatchTarget::parse(":metric").is_none());
        assert!(WatchTarget::parse("service:").is_none());
    }
}
