//! Incident observer service
//!
//! Watches configured time-series for statistical anomalies, correlates them
//! with recent code changes and proposes approval-gated remediation
//! workflows through the HTTP control surface.

use anyhow::Result;
use observer_lib::{
    health::{components, HealthRegistry},
    remediation::HttpRemediation,
    source::{HttpCommitSource, HttpMetricSource},
    ObserverEngine, ObserverMetrics,
};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod api;
mod config;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and env filter
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    info!("Starting observer");

    let service_config = config::ServiceConfig::load()?;
    let engine_config = service_config.observer_config();
    info!(
        pairs = engine_config.watch.len(),
        interval_secs = engine_config.tick_interval.as_secs(),
        sigma_threshold = engine_config.sigma_threshold,
        "Observer configured"
    );

    // Initialize the global metrics registry before anything records
    let _metrics = ObserverMetrics::new();

    let metric_source = Arc::new(
        HttpMetricSource::new(&service_config.metric_source_url)
            .map_err(|e| anyhow::anyhow!("metric source: {}", e))?,
    );
    let commit_source = Arc::new(
        HttpCommitSource::new(&service_config.commit_source_url)
            .map_err(|e| anyhow::anyhow!("commit source: {}", e))?,
    );
    let remediation = Arc::new(
        HttpRemediation::new(&service_config.remediation_url)
            .map_err(|e| anyhow::anyhow!("remediation gateway: {}", e))?,
    );

    let engine = Arc::new(ObserverEngine::new(
        engine_config,
        metric_source,
        commit_source,
        remediation,
    ));

    let health_registry = HealthRegistry::new();
    health_registry.register(components::SCHEDULER).await;
    health_registry.register(components::METRIC_SOURCE).await;
    health_registry.register(components::COMMIT_SOURCE).await;
    health_registry.register(components::REMEDIATION).await;

    let app_state = Arc::new(api::AppState::new(engine.clone(), health_registry.clone()));

    if service_config.autostart {
        engine.clone().start();
    }
    health_registry.set_ready(true).await;

    let api_handle = tokio::spawn(api::serve(service_config.api_port, app_state));

    tokio::signal::ctrl_c().await?;
    info!("SIGINT received, shutting down");

    // The in-flight tick drains; executing workflows run to completion
    engine.stop();
    api_handle.abort();

    Ok(())
}
