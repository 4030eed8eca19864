// Plain-text output for both tools

use crate::probe::EndpointResult;
use crate::walk::WalkSummary;
use std::path::Path;

pub const LATENCY_REPORT_HEADER: &str = "Avg(ms)\tEndpoint";

/// Tab-separated latency table, one row per result in the order given.
pub fn generate_latency_report(results: &[EndpointResult]) -> String {
    let mut report = String::new();
    report.push_str(LATENCY_REPORT_HEADER);
    report.push('\n');

    for result in results {
        report.push_str(&format!("{}\t{}\n", result.avg_duration_millis, result.path));
    }

    report
}

pub fn generate_walk_summary(summary: &WalkSummary, log_path: &Path) -> String {
    format!(
        "Finished: {} pages, {} cursors written to {}",
        summary.pages,
        summary.cursors.len(),
        log_path.display()
    )
}
