//! taintgraph: graph-based taint analysis for JavaScript, TypeScript and
//! Python.
//!
//! Each source file is parsed with tree-sitter, lowered into one graph with
//! an AST layer and a control-flow layer, and evaluated per finding: does
//! attacker-controlled data reach a dangerous call, is a weak primitive used
//! on a live path. Reports render as console text, JSON or SARIF.
//!
//! # Quick Start
//!
//! ```no_run
//! use std::path::Path;
//! use taintgraph::{scan, ScanOptions};
//!
//! let options = ScanOptions::default();
//! let report = scan(Path::new("./my-web-app"), &options).unwrap();
//! println!("Pass: {}, Findings: {}", report.verdict.pass, report.findings.len());
//! ```

pub mod cfg;
pub mod config;
pub mod engine;
pub mod error;
pub mod eval;
pub mod ir;
pub mod output;
pub mod parser;
pub mod rules;
pub mod syntax;

use std::path::{Path, PathBuf};

use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info, warn};

use config::Config;
use error::{AnalysisError, Result};
use ir::{Language, SourceLocation};
use output::OutputFormat;
use rules::policy::PolicyVerdict;
use rules::{Finding, FindingId};

pub use engine::{Engine, FileReport, FindingResult, FindingStatus};

/// Options for a scan invocation.
#[derive(Debug, Clone)]
pub struct ScanOptions {
    /// Path to config file (defaults to `.taintgraph.toml` in scan dir).
    pub config_path: Option<PathBuf>,
    /// Output format.
    pub format: OutputFormat,
    /// CLI override for fail_on threshold.
    pub fail_on_override: Option<rules::Severity>,
    /// CLI override for the findings to run.
    pub findings: Option<Vec<FindingId>>,
    /// Worker threads; `None` uses rayon's default.
    pub jobs: Option<usize>,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            config_path: None,
            format: OutputFormat::Console,
            fail_on_override: None,
            findings: None,
            jobs: None,
        }
    }
}

/// A finding that could not be decided for a file.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisFailure {
    pub file: PathBuf,
    pub finding: FindingId,
    pub error: String,
}

/// Complete scan report.
#[derive(Debug, Serialize)]
pub struct ScanReport {
    pub target_name: String,
    /// Matches after the policy's ignore list and overrides.
    pub findings: Vec<Finding>,
    pub failures: Vec<AnalysisFailure>,
    pub files: Vec<FileReport>,
    pub verdict: PolicyVerdict,
}

/// Run a complete scan: walk files, analyze each in parallel, apply policy.
pub fn scan(path: &Path, options: &ScanOptions) -> Result<ScanReport> {
    let root_dir = if path.is_file() {
        path.parent().unwrap_or(Path::new("."))
    } else {
        path
    };
    let config_path = options
        .config_path
        .clone()
        .unwrap_or_else(|| root_dir.join(".taintgraph.toml"));
    let mut config = Config::load(&config_path)?;

    if let Some(fail_on) = options.fail_on_override {
        config.policy.fail_on = fail_on;
    }
    if let Some(findings) = &options.findings {
        config.analysis.findings = findings.clone();
    }
    let findings = config.analysis.selected_findings();

    let engine = Engine::from_config(&config.analysis);
    let files = collect_source_files(path, &config)?;
    info!(files = files.len(), findings = findings.len(), "scanning");

    let analyze = || -> Vec<FileReport> {
        files
            .par_iter()
            .map(|(file, language)| match std::fs::read_to_string(file) {
                Ok(source) => engine.analyze_source(file, *language, &source, &findings),
                Err(e) => {
                    warn!(file = %file.display(), error = %e, "cannot read file");
                    engine.unreadable(file, *language, &findings, e.to_string())
                }
            })
            .collect()
    };
    let reports = match options.jobs {
        Some(jobs) => rayon::ThreadPoolBuilder::new()
            .num_threads(jobs)
            .build()
            .map_err(|e| AnalysisError::Internal(format!("thread pool: {e}")))?
            .install(analyze),
        None => analyze(),
    };

    let target_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "unknown".into());

    let mut raw = Vec::new();
    let mut failures = Vec::new();
    for report in &reports {
        for result in &report.results {
            if result.status == FindingStatus::Failed
                && !config.policy.ignore_findings.contains(&result.finding)
            {
                failures.push(AnalysisFailure {
                    file: report.path.clone(),
                    finding: result.finding,
                    error: result.error.clone().unwrap_or_default(),
                });
            }
            raw.extend(result.matches.iter().map(|m| to_finding(&report.path, result.finding, m)));
        }
    }

    let effective_findings = config.policy.apply(&raw);
    let verdict = config.policy.evaluate(&raw, failures.len());

    Ok(ScanReport {
        target_name,
        findings: effective_findings,
        failures,
        files: reports,
        verdict,
    })
}

fn to_finding(file: &Path, finding: FindingId, m: &rules::Match) -> Finding {
    let meta = finding.metadata();
    Finding {
        finding,
        title: meta.title,
        severity: meta.default_severity,
        message: m.description.clone(),
        location: SourceLocation {
            file: file.to_path_buf(),
            line: m.line,
            column: m.column,
            end_line: None,
            end_column: None,
        },
        cwe_id: meta.cwe_id,
        remediation: meta.remediation,
    }
}

/// Source files under `path` in a stable order, honoring `.gitignore`,
/// the configured excludes and the size limit.
fn collect_source_files(path: &Path, config: &Config) -> Result<Vec<(PathBuf, Language)>> {
    let excludes = config
        .scan
        .exclude
        .iter()
        .map(|p| glob::Pattern::new(p))
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| AnalysisError::Config(format!("invalid exclude pattern: {e}")))?;

    let walker = ignore::WalkBuilder::new(path)
        .hidden(true)
        .git_ignore(true)
        .build();

    let mut files = Vec::new();
    for entry in walker.flatten() {
        let file = entry.path();
        if !file.is_file() {
            continue;
        }
        let ext = file
            .extension()
            .map(|e| e.to_string_lossy().to_string())
            .unwrap_or_default();
        let language = Language::from_extension(&ext);
        if matches!(language, Language::Unknown) {
            continue;
        }

        let relative = file.strip_prefix(path).unwrap_or(file);
        if excludes.iter().any(|p| p.matches_path(relative)) {
            debug!(file = %file.display(), "excluded");
            continue;
        }
        let size = std::fs::metadata(file)?.len();
        if size > config.scan.max_file_size {
            debug!(file = %file.display(), size, "skipping large file");
            continue;
        }
        files.push((file.to_path_buf(), language));
    }
    files.sort();
    Ok(files)
}

/// Render a scan report in the specified format.
pub fn render_report(report: &ScanReport, format: OutputFormat) -> Result<String> {
    output::render(report, format)
}

#[cfg(test)]
mod integration_tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::path::Path;

    fn fixture(name: &str) -> ScanReport {
        scan(
            &Path::new("tests/fixtures").join(name),
            &ScanOptions::default(),
        )
        .unwrap()
    }

    fn codes(report: &ScanReport) -> Vec<&'static str> {
        let mut codes: Vec<_> = report.findings.iter().map(|f| f.finding.code()).collect();
        codes.sort_unstable();
        codes.dedup();
        codes
    }

    #[test]
    fn safe_app_zero_findings() {
        let report = fixture("safe_app");
        assert!(report.findings.is_empty(), "{:?}", report.findings);
        assert!(report.failures.is_empty(), "{:?}", report.failures);
        assert!(report.verdict.pass);
    }

    #[test]
    fn vulnerable_express_app_detected() {
        let report = fixture("vuln_express");
        assert_eq!(codes(&report), vec!["F001", "F004", "F008", "F034", "F063"]);
        assert!(!report.verdict.pass);
    }

    #[test]
    fn vulnerable_flask_app_detected() {
        let report = fixture("vuln_flask");
        assert_eq!(codes(&report), vec!["F001", "F004", "F052", "F063"]);
        assert!(!report.verdict.pass);
    }

    #[test]
    fn typescript_service_detected() {
        let report = fixture("vuln_typescript");
        assert_eq!(codes(&report), vec!["F001", "F052"]);
    }

    #[test]
    fn findings_carry_file_and_line() {
        let report = fixture("vuln_express");
        let sql = report
            .findings
            .iter()
            .find(|f| f.finding == FindingId::F001)
            .unwrap();
        assert!(sql.location.file.ends_with("server.js"));
        assert_eq!(sql.location.line, 9);
        assert_eq!(sql.cwe_id, "CWE-89");
    }

    #[test]
    fn scan_is_deterministic() {
        let first = fixture("vuln_express");
        let second = scan(
            Path::new("tests/fixtures/vuln_express"),
            &ScanOptions {
                jobs: Some(1),
                ..ScanOptions::default()
            },
        )
        .unwrap();
        let lines = |r: &ScanReport| {
            r.findings
                .iter()
                .map(|f| (f.finding, f.location.line, f.message.clone()))
                .collect::<Vec<_>>()
        };
        assert_eq!(lines(&first), lines(&second));
    }

    #[test]
    fn findings_subset_and_ignore_policy() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("app.js"),
            "db.query(req.query.q);\nconst n = Math.random();\n",
        )
        .unwrap();
        std::fs::write(
            dir.path().join(".taintgraph.toml"),
            "[policy]\nignore_findings = [\"F001\"]\n",
        )
        .unwrap();

        let report = scan(dir.path(), &ScanOptions::default()).unwrap();
        assert_eq!(codes(&report), vec!["F034"]);
        assert!(report.verdict.pass);

        let only_random = ScanOptions {
            findings: Some(vec![FindingId::F034]),
            ..ScanOptions::default()
        };
        let report = scan(dir.path(), &only_random).unwrap();
        assert_eq!(report.files[0].results.len(), 1);
    }

    #[test]
    fn exclude_patterns_are_honored() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("vendor")).unwrap();
        std::fs::write(dir.path().join("vendor/lib.js"), "db.query(req.query.q);\n").unwrap();
        std::fs::write(dir.path().join("main.py"), "x = 1\n").unwrap();
        std::fs::write(
            dir.path().join(".taintgraph.toml"),
            "[scan]\nexclude = [\"vendor/**\"]\n",
        )
        .unwrap();

        let report = scan(dir.path(), &ScanOptions::default()).unwrap();
        assert_eq!(report.files.len(), 1);
        assert!(report.files[0].path.ends_with("main.py"));
    }

    #[test]
    fn unparsable_file_fails_the_verdict() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("broken.py"), "def f(:\n").unwrap();
        let report = scan(dir.path(), &ScanOptions::default()).unwrap();
        assert!(report.findings.is_empty());
        assert_eq!(report.failures.len(), FindingId::ALL.len());
        assert!(!report.verdict.pass);
    }

    #[test]
    fn renders_every_format() {
        let report = fixture("vuln_flask");
        for format in [OutputFormat::Console, OutputFormat::Json, OutputFormat::Sarif] {
            let out = render_report(&report, format).unwrap();
            assert!(out.contains("F001"), "{format:?}");
        }
    }
}
