//! Engine status and lifecycle commands

use anyhow::Result;
use colored::Colorize;

use crate::client::{ApiClient, ObserverStatus, RunStateResponse};
use crate::output::{color_severity, format_sigma, print_success, OutputFormat};

/// Show engine status with recent anomalies and pending workflows
pub async fn show_status(client: &ApiClient, format: OutputFormat) -> Result<()> {
    let status: ObserverStatus = client.get("/api/observer/status").await?;

    if let OutputFormat::Json = format {
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    let state = match status.status.as_str() {
        "running" => status.status.green().bold().to_string(),
        _ => status.status.red().bold().to_string(),
    };
    println!("Observer: {}", state);
    match status.last_tick {
        Some(t) => println!("Last tick: {}", t.to_rfc3339()),
        None => println!("Last tick: never"),
    }
    println!(
        "Interval: {}s, threshold: {:.1}σ",
        status.tick_interval_secs, status.sigma_threshold
    );

    println!();
    if status.recent_anomalies.is_empty() {
        println!("{}", "No recent anomalies".dimmed());
    } else {
        println!("Recent anomalies:");
        for a in &status.recent_anomalies {
            println!(
                "  {} {}/{} = {:.2} ({} from baseline {:.2})",
                color_severity(&a.severity),
                a.service,
                a.metric,
                a.current_value,
                format_sigma(a.sigma_deviation),
                a.baseline_mean
            );
        }
    }

    println!();
    if status.pending_workflows.is_empty() {
        println!("{}", "No workflows awaiting approval".dimmed());
    } else {
        println!("Awaiting approval:");
        for w in &status.pending_workflows {
            println!(
                "  {} {} ({}/{})",
                w.id,
                color_severity(&w.anomaly.severity),
                w.anomaly.service,
                w.anomaly.metric
            );
        }
    }

    Ok(())
}

/// Start the detection loop
pub async fn start(client: &ApiClient) -> Result<()> {
    let response: RunStateResponse = client
        .post("/api/observer/start", &serde_json::json!({}))
        .await?;
    print_success(&format!("Observer {}", response.status));
    Ok(())
}

/// Stop the detection loop; the in-flight tick drains first
pub async fn stop(client: &ApiClient) -> Result<()> {
    let response: RunStateResponse = client
        .post("/api/observer/stop", &serde_json::json!({}))
        .await?;
    print_success(&format!("Observer {}", response.status));
    Ok(())
}
