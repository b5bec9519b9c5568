//! Workflow listing and decision commands

use anyhow::Result;
use tabled::Tabled;

use crate::client::{ApiClient, DecisionRequest, Workflow};
use crate::output::{
    color_severity, color_status, format_sigma, print_success, print_table, print_warning,
    OutputFormat,
};

/// Row for the pending-workflows table
#[derive(Tabled, serde::Serialize)]
struct WorkflowRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Severity")]
    severity: String,
    #[tabled(rename = "Service")]
    service: String,
    #[tabled(rename = "Metric")]
    metric: String,
    #[tabled(rename = "Deviation")]
    deviation: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Created")]
    created_at: String,
}

impl From<&Workflow> for WorkflowRow {
    fn from(w: &Workflow) -> Self {
        Self {
            id: w.id.clone(),
            severity: color_severity(&w.anomaly.severity),
            service: w.anomaly.service.clone(),
            metric: w.anomaly.metric.clone(),
            deviation: format_sigma(w.anomaly.sigma_deviation),
            status: color_status(&w.status),
            created_at: w.created_at.to_rfc3339(),
        }
    }
}

/// List workflows awaiting approval
pub async fn list_pending(client: &ApiClient, format: OutputFormat) -> Result<()> {
    let workflows: Vec<Workflow> = client.get("/api/observer/workflows/pending").await?;

    if let OutputFormat::Json = format {
        println!("{}", serde_json::to_string_pretty(&workflows)?);
        return Ok(());
    }

    let rows: Vec<WorkflowRow> = workflows.iter().map(WorkflowRow::from).collect();
    print_table(&rows, format);
    Ok(())
}

/// Approve a pending workflow and report the execution outcome
pub async fn approve(
    client: &ApiClient,
    id: &str,
    reason: String,
    format: OutputFormat,
) -> Result<()> {
    let workflow: Workflow = client
        .post(
            &format!("/api/observer/workflows/{}/approve", id),
            &DecisionRequest { reason },
        )
        .await?;

    if let OutputFormat::Json = format {
        println!("{}", serde_json::to_string_pretty(&workflow)?);
        return Ok(());
    }

    match workflow.status.as_str() {
        "completed" => print_success(&format!("Workflow {} completed", workflow.id)),
        "failed" => {
            print_warning(&format!("Workflow {} failed", workflow.id));
            if let Some(execution) = &workflow.execution {
                if let Some(failed) = execution.get("failed_step") {
                    println!(
                        "  step {}: {}",
                        failed["action"].as_str().unwrap_or("?"),
                        failed["reason"].as_str().unwrap_or("unknown")
                    );
                }
            }
        }
        other => print_warning(&format!("Workflow {} is {}", workflow.id, other)),
    }

    if let Some(execution) = &workflow.execution {
        if let Some(steps) = execution.get("steps").and_then(|s| s.as_array()) {
            for step in steps {
                println!("  {} ok", step["action"].as_str().unwrap_or("?"));
            }
        }
    }

    Ok(())
}

/// Reject a pending workflow
pub async fn reject(
    client: &ApiClient,
    id: &str,
    reason: String,
    format: OutputFormat,
) -> Result<()> {
    let workflow: Workflow = client
        .post(
            &format!("/api/observer/workflows/{}/reject", id),
            &DecisionRequest { reason },
        )
        .await?;

    if let OutputFormat::Json = format {
        println!("{}", serde_json::to_string_pretty(&workflow)?);
        return Ok(());
    }

    print_success(&format!("Workflow {} rejected", workflow.id));
    Ok(())
}
