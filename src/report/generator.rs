//! Markdown and JSON run reports.
//!
//! This module renders what one invocation did: how the two sources
//! overlapped and what happened to each recipient.

use crate::models::{DeliveryOutcome, DeliveryState, DispatchSummary, RunReport};
use crate::reconcile::MergeStats;
use anyhow::{Context, Result};
use std::path::Path;

/// Generate a complete Markdown report.
pub fn generate_markdown_report(report: &RunReport) -> String {
    let mut output = String::new();

    output.push_str("# Referral Notifier Run\n\n");
    output.push_str(&generate_metadata_section(report));
    output.push_str(&generate_merge_section(&report.merge));
    output.push_str(&generate_dispatch_section(&report.dispatch));

    if !report.dispatch.outcomes.is_empty() {
        output.push_str(&generate_outcomes_section(&report.dispatch.outcomes));
    }

    output
}

fn generate_metadata_section(report: &RunReport) -> String {
    let mut section = String::new();

    section.push_str("## Metadata\n\n");
    section.push_str(&format!(
        "- **Started:** {}\n",
        report.started_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    section.push_str(&format!("- **Duration:** {:.1}s\n", report.duration_seconds));
    if report.dry_run {
        section.push_str("- **Mode:** dry run (nothing sent)\n");
    }
    section.push('\n');

    section
}

fn generate_merge_section(merge: &MergeStats) -> String {
    let mut section = String::new();

    section.push_str("## Reconciliation\n\n");
    section.push_str("| Users | Graph only | Indexed only | Both | No name |\n");
    section.push_str("|-------|------------|--------------|------|---------|\n");
    section.push_str(&format!(
        "| {} | {} | {} | {} | {} |\n\n",
        merge.total, merge.graph_only, merge.indexed_only, merge.matched, merge.missing_name
    ));

    section
}

fn generate_dispatch_section(dispatch: &DispatchSummary) -> String {
    let mut section = String::new();

    section.push_str("## Dispatch\n\n");
    section.push_str(&format!("- **Attempted:** {}\n", dispatch.attempted));
    section.push_str(&format!("- **Sent:** {}\n", dispatch.sent));
    section.push_str(&format!("- **Failed:** {}\n", dispatch.failed));
    if dispatch.skipped > 0 {
        section.push_str(&format!("- **Skipped:** {}\n", dispatch.skipped));
    }
    section.push('\n');

    section
}

/// Failures first, then by email, so the table is stable between runs.
fn generate_outcomes_section(outcomes: &[DeliveryOutcome]) -> String {
    let mut sorted: Vec<&DeliveryOutcome> = outcomes.iter().collect();
    sorted.sort_by(|a, b| {
        (a.state != DeliveryState::Failed, &a.email).cmp(&(b.state != DeliveryState::Failed, &b.email))
    });

    let mut section = String::new();
    section.push_str("## Recipients\n\n");
    section.push_str("| Email | State | Attempts | Error |\n");
    section.push_str("|-------|-------|----------|-------|\n");
    for outcome in sorted {
        section.push_str(&format!(
            "| {} | {} | {} | {} |\n",
            outcome.email,
            outcome.state,
            outcome.attempts,
            outcome.error.as_deref().unwrap_or("").replace('|', "\\|")
        ));
    }
    section.push('\n');

    section
}

/// Generate a JSON report.
pub fn generate_json_report(report: &RunReport) -> Result<String> {
    serde_json::to_string_pretty(report).map_err(Into::into)
}

/// Write a report to a file.
pub fn write_report(content: &str, path: &Path) -> Result<()> {
    std::fs::write(path, content)
        .with_context(|| format!("Failed to write report to {}", path.display()))
}
