use crate::error::Result;
use crate::rules::{Finding, FindingId, Severity};
use crate::ScanReport;

use serde_json::{json, Value};
use sha2::Digest;

/// Render findings as SARIF 2.1.0.
///
/// Produces a self-contained SARIF log compatible with GitHub Code Scanning
/// and other SARIF consumers. Failed analyses become tool execution
/// notifications so a consumer never mistakes them for clean files.
pub fn render(report: &ScanReport) -> Result<String> {
    let rules: Vec<Value> = FindingId::ALL
        .iter()
        .map(|id| {
            let meta = id.metadata();
            json!({
                "id": id.code(),
                "name": meta.title,
                "shortDescription": { "text": meta.title },
                "fullDescription": { "text": meta.description },
                "help": { "text": meta.remediation },
                "defaultConfiguration": {
                    "level": severity_to_sarif_level(meta.default_severity),
                },
                "properties": {
                    "tags": ["security", meta.cwe_id],
                },
            })
        })
        .collect();

    let results: Vec<Value> = report.findings.iter().map(result).collect();

    let notifications: Vec<Value> = report
        .failures
        .iter()
        .map(|f| {
            json!({
                "level": "error",
                "message": { "text": format!("{}: {}", f.finding, f.error) },
                "associatedRule": { "id": f.finding.code() },
                "locations": [{
                    "physicalLocation": {
                        "artifactLocation": { "uri": uri(&f.file) },
                    },
                }],
            })
        })
        .collect();

    let sarif = json!({
        "$schema": "https://docs.oasis-open.org/sarif/sarif/v2.1.0/errata01/os/schemas/sarif-schema-2.1.0.json",
        "version": "2.1.0",
        "runs": [{
            "tool": {
                "driver": {
                    "name": "taintgraph",
                    "informationUri": "https://github.com/limaronaldo/taintgraph",
                    "version": env!("CARGO_PKG_VERSION"),
                    "semanticVersion": env!("CARGO_PKG_VERSION"),
                    "rules": rules,
                },
            },
            "invocations": [{
                "executionSuccessful": report.failures.is_empty(),
                "toolExecutionNotifications": notifications,
            }],
            "results": results,
            "automationDetails": {
                "id": format!("taintgraph/{}", report.target_name),
            },
        }],
    });

    let output = serde_json::to_string_pretty(&sarif)?;
    Ok(output)
}

fn result(f: &Finding) -> Value {
    let rule_index = FindingId::ALL.iter().position(|id| *id == f.finding);
    json!({
        "ruleId": f.finding.code(),
        "ruleIndex": rule_index,
        "level": severity_to_sarif_level(f.severity),
        "message": { "text": f.message },
        "locations": [{
            "physicalLocation": {
                "artifactLocation": { "uri": uri(&f.location.file) },
                "region": {
                    "startLine": f.location.line,
                    "startColumn": f.location.column,
                },
            },
        }],
        "partialFingerprints": {
            "primaryLocationLineHash": fingerprint(f),
        },
        "fixes": [{
            "description": { "text": f.remediation },
        }],
    })
}

fn uri(path: &std::path::Path) -> String {
    path.display().to_string().replace('\\', "/")
}

/// Stable across runs as long as the finding stays on the same line.
fn fingerprint(f: &Finding) -> String {
    let digest = sha2::Sha256::new()
        .chain_update(f.finding.code().as_bytes())
        .chain_update(uri(&f.location.file).as_bytes())
        .chain_update(f.location.line.to_string().as_bytes())
        .chain_update(f.message.as_bytes())
        .finalize();
    hex::encode(&digest[..16])
}

fn severity_to_sarif_level(severity: Severity) -> &'static str {
    match severity {
        Severity::Critical | Severity::High => "error",
        Severity::Medium => "warning",
        Severity::Low | Severity::Info => "note",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::SourceLocation;
    use crate::rules::policy::Policy;
    use crate::AnalysisFailure;
    use std::path::PathBuf;

    fn report() -> ScanReport {
        let meta = FindingId::F001.metadata();
        let findings = vec![Finding {
            finding: FindingId::F001,
            title: meta.title,
            severity: Severity::Critical,
            message: "SQL injection: user-controlled data reaches `db.query`".into(),
            location: SourceLocation {
                file: PathBuf::from("src/app.js"),
                line: 4,
                column: 3,
                end_line: None,
                end_column: None,
            },
            cwe_id: meta.cwe_id,
            remediation: meta.remediation,
        }];
        let failures = vec![AnalysisFailure {
            file: PathBuf::from("src/big.py"),
            finding: FindingId::F004,
            error: "Analysis aborted".into(),
        }];
        let verdict = Policy::default().evaluate(&findings, failures.len());
        ScanReport {
            target_name: "demo".into(),
            findings,
            failures,
            files: Vec::new(),
            verdict,
        }
    }

    #[test]
    fn results_reference_rules_by_index() {
        let sarif: Value = serde_json::from_str(&render(&report()).unwrap()).unwrap();
        let run = &sarif["runs"][0];
        assert_eq!(sarif["version"], "2.1.0");
        assert_eq!(run["tool"]["driver"]["rules"].as_array().unwrap().len(), 6);
        let result = &run["results"][0];
        assert_eq!(result["ruleId"], "F001");
        assert_eq!(result["ruleIndex"], 0);
        assert_eq!(result["level"], "error");
        assert_eq!(
            result["locations"][0]["physicalLocation"]["region"]["startLine"],
            4
        );
        assert_eq!(
            result["partialFingerprints"]["primaryLocationLineHash"]
                .as_str()
                .unwrap()
                .len(),
            32
        );
    }

    #[test]
    fn failures_become_notifications() {
        let sarif: Value = serde_json::from_str(&render(&report()).unwrap()).unwrap();
        let invocation = &sarif["runs"][0]["invocations"][0];
        assert_eq!(invocation["executionSuccessful"], false);
        assert_eq!(
            invocation["toolExecutionNotifications"][0]["associatedRule"]["id"],
            "F004"
        );
    }
}
