//! Markdown summary generation
//!
//! This module generates human-readable markdown summaries of harvest runs,
//! including outcome counts, failure breakdowns and field coverage.

use crate::output::traits::{HarvestSummary, OutputResult};
use crate::record::ErrorKind;
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// Generates a markdown summary of a harvest run
///
/// # Arguments
///
/// * `summary` - The harvest summary data
/// * `output_path` - Path where the markdown file should be written
///
/// # Returns
///
/// * `Ok(())` - Successfully wrote markdown summary
/// * `Err(OutputError)` - Failed to write summary
pub fn generate_markdown_summary(summary: &HarvestSummary, output_path: &Path) -> OutputResult<()> {
    let markdown = format_markdown_summary(summary);

    let mut file = File::create(output_path)?;
    file.write_all(markdown.as_bytes())?;

    Ok(())
}

/// Formats a harvest summary as markdown
pub fn format_markdown_summary(summary: &HarvestSummary) -> String {
    let mut md = String::new();

    md.push_str("# Catalog Harvest Summary\n\n");

    // Run metadata
    md.push_str("## Run Information\n\n");
    md.push_str(&format!("- **Run ID**: {}\n", summary.run_id));
    md.push_str(&format!("- **Started**: {}\n", summary.started_at));
    if let Some(finished) = &summary.finished_at {
        md.push_str(&format!("- **Finished**: {}\n", finished));
    }
    if let Some(duration) = summary.duration_seconds {
        md.push_str(&format!(
            "- **Duration**: {} seconds ({:.2} minutes)\n",
            duration,
            duration as f64 / 60.0
        ));
    }
    md.push_str(&format!("- **Status**: {}\n", summary.status));
    md.push_str(&format!("- **Config Hash**: {}\n\n", summary.config_hash));

    // Outcome counts
    md.push_str("## Overall Statistics\n\n");
    md.push_str(&format!("- **Tasks**: {}\n", summary.total_tasks));
    md.push_str(&format!("- **Records**: {}\n", summary.records));
    md.push_str(&format!("- **Failures**: {}\n", summary.failures));
    let unprocessed = summary.unprocessed();
    if unprocessed > 0 {
        md.push_str(&format!("- **Unprocessed**: {}\n", unprocessed));
    }
    md.push_str(&format!(
        "- **Success Rate**: {:.2}%\n\n",
        summary.success_rate()
    ));

    if !summary.failures_by_kind.is_empty() {
        md.push_str("## Failures by Error Kind\n\n");
        md.push_str("| Error Kind | Count |\n");
        md.push_str("|------------|-------|\n");

        for kind in ErrorKind::all_kinds() {
            if let Some(count) = summary.failures_by_kind.get(&kind) {
                md.push_str(&format!("| {} | {} |\n", kind, count));
            }
        }
        md.push('\n');
    }

    if summary.records > 0 && !summary.field_coverage.is_empty() {
        md.push_str("## Field Coverage\n\n");
        md.push_str("| Field | Records | Coverage |\n");
        md.push_str("|-------|---------|----------|\n");

        for (field, count) in &summary.field_coverage {
            md.push_str(&format!(
                "| {} | {} | {:.1}% |\n",
                field,
                count,
                summary.coverage_rate(*field)
            ));
        }
        md.push('\n');
    }

    md
}
