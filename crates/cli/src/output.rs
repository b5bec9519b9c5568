//! Output formatting utilities

use clap::ValueEnum;
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

/// Output format for CLI commands
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
    /// Table format (default)
    #[default]
    Table,
    /// JSON format
    Json,
}

/// Print a table from a list of items
pub fn print_table<T: Tabled + Serialize>(items: &[T], format: OutputFormat) {
    match format {
        OutputFormat::Table => {
            if items.is_empty() {
                println!("{}", "No items found".yellow());
                return;
            }
            let table = Table::new(items).with(Style::rounded()).to_string();
            println!("{}", table);
        }
        OutputFormat::Json => {
            if let Ok(json) = serde_json::to_string_pretty(&items) {
                println!("{}", json);
            }
        }
    }
}

/// Print a success message
pub fn print_success(message: &str) {
    println!("{} {}", "✓".green().bold(), message);
}

/// Print a warning message
pub fn print_warning(message: &str) {
    println!("{} {}", "⚠".yellow().bold(), message);
}

/// Colorize a severity label
pub fn color_severity(severity: &str) -> String {
    match severity {
        "Sev-1" => severity.red().bold().to_string(),
        "Sev-2" => severity.red().to_string(),
        "Sev-3" => severity.yellow().to_string(),
        _ => severity.to_string(),
    }
}

/// Colorize a workflow status label
pub fn color_status(status: &str) -> String {
    match status {
        "pending" => status.yellow().to_string(),
        "approved" | "executing" => status.blue().to_string(),
        "completed" => status.green().to_string(),
        "rejected" => status.dimmed().to_string(),
        "failed" => status.red().to_string(),
        _ => status.to_string(),
    }
}

/// Format a sigma deviation for display
pub fn format_sigma(sigma: f64) -> String {
    format!("{:.1}σ", sigma)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_sigma() {
        assert_eq!(format_sigma(20.013), "20.0σ");
        assert_eq!(format_sigma(3.25), "3.2σ");
    }

    #[test]
    fn test_color_passthrough_for_unknown_labels() {
        assert_eq!(color_severity("Sev-9"), "Sev-9");
        assert_eq!(color_status("archived"), "archived");
    }
}
