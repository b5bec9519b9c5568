//! Anomaly and activity feed commands

use anyhow::Result;
use tabled::Tabled;

use crate::client::{ActivityEntry, Anomaly, ApiClient};
use crate::output::{color_severity, format_sigma, print_table, OutputFormat};

/// Row for the anomalies table
#[derive(Tabled, serde::Serialize)]
struct AnomalyRow {
    #[tabled(rename = "Detected")]
    detected_at: String,
    #[tabled(rename = "Severity")]
    severity: String,
    #[tabled(rename = "Service")]
    service: String,
    #[tabled(rename = "Metric")]
    metric: String,
    #[tabled(rename = "Value")]
    value: String,
    #[tabled(rename = "Baseline")]
    baseline: String,
    #[tabled(rename = "Deviation")]
    deviation: String,
}

/// Row for the activity table
#[derive(Tabled, serde::Serialize)]
struct ActivityRow {
    #[tabled(rename = "Timestamp")]
    timestamp: String,
    #[tabled(rename = "Category")]
    category: String,
    #[tabled(rename = "Summary")]
    summary: String,
    #[tabled(rename = "Reference")]
    reference: String,
}

/// List recently detected anomalies
pub async fn list_anomalies(client: &ApiClient, limit: usize, format: OutputFormat) -> Result<()> {
    let anomalies: Vec<Anomaly> = client
        .get(&format!("/api/observer/anomalies?limit={}", limit))
        .await?;

    if let OutputFormat::Json = format {
        println!("{}", serde_json::to_string_pretty(&anomalies)?);
        return Ok(());
    }

    let rows: Vec<AnomalyRow> = anomalies
        .iter()
        .map(|a| AnomalyRow {
            detected_at: a.detected_at.to_rfc3339(),
            severity: color_severity(&a.severity),
            service: a.service.clone(),
            metric: a.metric.clone(),
            value: format!("{:.2}", a.current_value),
            baseline: format!("{:.2} ± {:.2}", a.baseline_mean, a.baseline_std),
            deviation: format_sigma(a.sigma_deviation),
        })
        .collect();
    print_table(&rows, format);
    Ok(())
}

/// Show the merged activity feed
pub async fn show_activity(client: &ApiClient, limit: usize, format: OutputFormat) -> Result<()> {
    let entries: Vec<ActivityEntry> = client
        .get(&format!("/api/observer/activity?limit={}", limit))
        .await?;

    if let OutputFormat::Json = format {
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    let rows: Vec<ActivityRow> = entries
        .iter()
        .map(|e| ActivityRow {
            timestamp: e.timestamp.to_rfc3339(),
            category: e.category.clone(),
            summary: e.summary.clone(),
            reference: e.reference.clone().unwrap_or_default(),
        })
        .collect();
    print_table(&rows, format);
    Ok(())
}
