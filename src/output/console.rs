use crate::rules::{Finding, Severity};
use crate::ScanReport;

/// Render findings as console output, grouped by severity then file path,
/// followed by analyses that could not be completed.
pub fn render(report: &ScanReport) -> String {
    let mut output = String::new();
    let findings = &report.findings;
    let verdict = &report.verdict;

    if findings.is_empty() {
        output.push_str(&format!(
            "\n  No security findings detected in {} file(s).\n",
            report.files.len()
        ));
    } else {
        // Sort by severity (critical first), then by location
        let mut sorted: Vec<&Finding> = findings.iter().collect();
        sorted.sort_by(|a, b| {
            b.severity
                .cmp(&a.severity)
                .then_with(|| a.location.file.cmp(&b.location.file))
                .then_with(|| a.location.line.cmp(&b.location.line))
        });

        output.push_str(&format!("\n  {} finding(s) detected:\n\n", findings.len()));

        for finding in &sorted {
            let severity_tag = match finding.severity {
                Severity::Critical => "[CRITICAL]",
                Severity::High => "[HIGH]    ",
                Severity::Medium => "[MEDIUM]  ",
                Severity::Low => "[LOW]     ",
                Severity::Info => "[INFO]    ",
            };

            output.push_str(&format!(
                "  {} {} {}\n",
                severity_tag, finding.finding, finding.message
            ));
            output.push_str(&format!(
                "           at {}:{}:{} ({})\n",
                finding.location.file.display(),
                finding.location.line,
                finding.location.column,
                finding.cwe_id
            ));
            output.push_str(&format!("           fix: {}\n", finding.remediation));
            output.push('\n');
        }
    }

    if !report.failures.is_empty() {
        output.push_str(&format!(
            "\n  {} analysis failure(s):\n\n",
            report.failures.len()
        ));
        for failure in &report.failures {
            output.push_str(&format!(
                "  [FAILED]   {} {}: {}\n",
                failure.finding,
                failure.file.display(),
                failure.error
            ));
        }
        output.push('\n');
    }

    // Verdict
    let status = if verdict.pass { "PASS" } else { "FAIL" };
    output.push_str(&format!(
        "  Result: {} (threshold: {}, highest: {}, failed analyses: {})\n\n",
        status,
        verdict.fail_threshold,
        verdict
            .highest_severity
            .map(|s| s.to_string())
            .unwrap_or_else(|| "none".into()),
        verdict.failed_analyses,
    ));

    output
}
