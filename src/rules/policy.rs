use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use super::{Finding, FindingId, Severity};

/// Policy verdict: the final pass/fail decision after applying the ignore
/// list and severity overrides to raw findings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyVerdict {
    pub pass: bool,
    pub total_findings: usize,
    pub effective_findings: usize,
    pub highest_severity: Option<Severity>,
    pub fail_threshold: Severity,
    /// Findings that could not be decided for some file.
    pub failed_analyses: usize,
}

/// Policy configuration loaded from `.taintgraph.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Policy {
    /// Minimum severity to fail the scan.
    #[serde(default = "default_fail_on")]
    pub fail_on: Severity,
    /// Findings to ignore entirely.
    #[serde(default)]
    pub ignore_findings: HashSet<FindingId>,
    /// Per-finding severity overrides.
    #[serde(default)]
    pub overrides: HashMap<FindingId, Severity>,
    /// Whether an analysis that failed (unsupported construct, missing
    /// rule, budget exceeded) fails the scan.
    #[serde(default = "default_fail_on_error")]
    pub fail_on_error: bool,
}

fn default_fail_on() -> Severity {
    Severity::High
}

fn default_fail_on_error() -> bool {
    true
}

impl Default for Policy {
    fn default() -> Self {
        Self {
            fail_on: default_fail_on(),
            ignore_findings: HashSet::new(),
            overrides: HashMap::new(),
            fail_on_error: default_fail_on_error(),
        }
    }
}

impl Policy {
    /// Evaluate findings against this policy and produce a verdict.
    pub fn evaluate(&self, findings: &[Finding], failed_analyses: usize) -> PolicyVerdict {
        let effective: Vec<Severity> = findings
            .iter()
            .filter(|f| !self.ignore_findings.contains(&f.finding))
            .map(|f| self.overrides.get(&f.finding).copied().unwrap_or(f.severity))
            .collect();

        let highest = effective.iter().copied().max();
        let over_threshold = effective.iter().any(|&sev| sev >= self.fail_on);
        let errored = self.fail_on_error && failed_analyses > 0;

        PolicyVerdict {
            pass: !over_threshold && !errored,
            total_findings: findings.len(),
            effective_findings: effective.len(),
            highest_severity: highest,
            fail_threshold: self.fail_on,
            failed_analyses,
        }
    }

    /// Filter findings: remove ignored ones, apply overrides.
    pub fn apply(&self, findings: &[Finding]) -> Vec<Finding> {
        findings
            .iter()
            .filter(|f| !self.ignore_findings.contains(&f.finding))
            .map(|f| {
                let mut f = f.clone();
                if let Some(&override_sev) = self.overrides.get(&f.finding) {
                    f.severity = override_sev;
                }
                f
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::SourceLocation;
    use std::path::PathBuf;

    fn make_finding(finding: FindingId, severity: Severity) -> Finding {
        let meta = finding.metadata();
        Finding {
            finding,
            title: meta.title,
            severity,
            message: "test".into(),
            location: SourceLocation {
                file: PathBuf::from("app.js"),
                line: 1,
                column: 1,
                end_line: None,
                end_column: None,
            },
            cwe_id: meta.cwe_id,
            remediation: meta.remediation,
        }
    }

    #[test]
    fn default_policy_fails_on_high() {
        let policy = Policy::default();
        let findings = vec![make_finding(FindingId::F008, Severity::High)];
        let verdict = policy.evaluate(&findings, 0);
        assert!(!verdict.pass);
    }

    #[test]
    fn default_policy_passes_on_medium() {
        let policy = Policy::default();
        let findings = vec![make_finding(FindingId::F034, Severity::Medium)];
        let verdict = policy.evaluate(&findings, 0);
        assert!(verdict.pass);
    }

    #[test]
    fn ignored_finding_is_removed() {
        let mut policy = Policy::default();
        policy.ignore_findings.insert(FindingId::F001);
        let findings = vec![make_finding(FindingId::F001, Severity::Critical)];
        let verdict = policy.evaluate(&findings, 0);
        assert!(verdict.pass);
        assert_eq!(verdict.effective_findings, 0);
        assert!(policy.apply(&findings).is_empty());
    }

    #[test]
    fn override_downgrades_severity() {
        let mut policy = Policy::default();
        policy.overrides.insert(FindingId::F001, Severity::Info);
        let findings = vec![make_finding(FindingId::F001, Severity::Critical)];
        assert!(policy.evaluate(&findings, 0).pass);
        assert_eq!(policy.apply(&findings)[0].severity, Severity::Info);
    }

    #[test]
    fn failed_analyses_fail_the_scan_unless_disabled() {
        let mut policy = Policy::default();
        let verdict = policy.evaluate(&[], 2);
        assert!(!verdict.pass);
        assert_eq!(verdict.failed_analyses, 2);

        policy.fail_on_error = false;
        assert!(policy.evaluate(&[], 2).pass);
    }

    #[test]
    fn parses_from_toml() {
        let policy: Policy = toml::from_str(
            r#"
            fail_on = "medium"
            ignore_findings = ["F034"]
            fail_on_error = false

            [overrides]
            F052 = "low"
            "#,
        )
        .unwrap();
        assert_eq!(policy.fail_on, Severity::Medium);
        assert!(policy.ignore_findings.contains(&FindingId::F034));
        assert_eq!(policy.overrides.get(&FindingId::F052), Some(&Severity::Low));
        assert!(!policy.fail_on_error);
    }
}
