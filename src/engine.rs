//! Per-file pipeline: parse, lower, thread control flow, run findings.

use std::path::{Path, PathBuf};

use serde::Serialize;
use sha2::Digest;
use tracing::{debug, warn};

use crate::cfg::{build_cfg, CfgTable};
use crate::config::AnalysisConfig;
use crate::error::Result;
use crate::eval::Evaluator;
use crate::ir::{Graph, Language};
use crate::parser::Cst;
use crate::rules::{Dispatcher, FindingId, FindingOutcome, Match};
use crate::syntax::{GraphBuilder, LoweringMode, Readers};

/// Outcome of one finding on one file, in reportable form.
#[derive(Debug, Clone, Serialize)]
pub struct FindingResult {
    pub finding: FindingId,
    pub status: FindingStatus,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub matches: Vec<Match>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FindingStatus {
    Vulnerable,
    Safe,
    NotApplicable,
    Failed,
}

impl FindingResult {
    fn new(finding: FindingId, outcome: FindingOutcome) -> Self {
        let (status, matches, error) = match outcome {
            FindingOutcome::Vulnerable(matches) => (FindingStatus::Vulnerable, matches, None),
            FindingOutcome::Safe => (FindingStatus::Safe, Vec::new(), None),
            FindingOutcome::NotApplicable => (FindingStatus::NotApplicable, Vec::new(), None),
            FindingOutcome::Failed(e) => (FindingStatus::Failed, Vec::new(), Some(e.to_string())),
        };
        Self {
            finding,
            status,
            matches,
            error,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    /// The file could not be read or parsed; nothing was analyzed.
    ParseFailure,
    /// A construct was lowered to a placeholder.
    UnsupportedConstruct,
}

#[derive(Debug, Clone, Serialize)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column: Option<usize>,
}

/// Everything learned about one file.
#[derive(Debug, Clone, Serialize)]
pub struct FileReport {
    pub path: PathBuf,
    pub language: Language,
    /// SHA-256 of the source text.
    pub content_hash: String,
    pub results: Vec<FindingResult>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub diagnostics: Vec<Diagnostic>,
}

impl FileReport {
    pub fn result(&self, finding: FindingId) -> Option<&FindingResult> {
        self.results.iter().find(|r| r.finding == finding)
    }

    pub fn status(&self, finding: FindingId) -> Option<FindingStatus> {
        self.result(finding).map(|r| r.status)
    }

    pub fn failed(&self) -> impl Iterator<Item = &FindingResult> {
        self.results
            .iter()
            .filter(|r| r.status == FindingStatus::Failed)
    }
}

pub fn content_hash(source: &str) -> String {
    hex::encode(sha2::Sha256::new().chain_update(source.as_bytes()).finalize())
}

/// Reader, CFG, evaluation and dispatch tables, built once and shared
/// read-only by every file of a scan.
pub struct Engine {
    readers: Readers,
    cfg: CfgTable,
    evaluator: Evaluator,
    dispatcher: Dispatcher,
    mode: LoweringMode,
}

impl Engine {
    pub fn new(
        readers: Readers,
        cfg: CfgTable,
        evaluator: Evaluator,
        dispatcher: Dispatcher,
        mode: LoweringMode,
    ) -> Self {
        Self {
            readers,
            cfg,
            evaluator,
            dispatcher,
            mode,
        }
    }

    /// Built-in tables. Unknown constructs become placeholders so the rest
    /// of a file is still analyzed.
    pub fn standard() -> Self {
        Self::new(
            Readers::standard(),
            CfgTable::standard(),
            Evaluator::standard(),
            Dispatcher::standard(),
            LoweringMode::Lenient,
        )
    }

    /// Built-in tables with the configured limits and catalog extensions.
    pub fn from_config(config: &AnalysisConfig) -> Self {
        let mut engine = Self::standard();
        engine.evaluator.limits = config.limits();
        for extension in &config.rules {
            engine.evaluator.catalog.extend(extension);
        }
        engine
    }

    pub fn evaluator(&self) -> &Evaluator {
        &self.evaluator
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Parse `source` and build its AST and CFG layers.
    pub fn build_graph(&self, path: &Path, language: Language, source: &str) -> Result<Graph> {
        let cst = Cst::parse(language, path, source)?;
        let mut graph = GraphBuilder::new(&self.readers, self.mode).build(&cst, path)?;
        build_cfg(&mut graph, &self.cfg);
        Ok(graph)
    }

    /// Run `findings` over one file. Never fails: parse errors and failed
    /// findings are recorded in the report.
    pub fn analyze_source(
        &self,
        path: &Path,
        language: Language,
        source: &str,
        findings: &[FindingId],
    ) -> FileReport {
        let mut report = FileReport {
            path: path.to_path_buf(),
            language,
            content_hash: content_hash(source),
            results: Vec::new(),
            diagnostics: Vec::new(),
        };

        let applicable: Vec<FindingId> = findings
            .iter()
            .copied()
            .filter(|f| self.dispatcher.entry(*f, language).is_some())
            .collect();
        if applicable.is_empty() {
            report.results = findings
                .iter()
                .map(|f| FindingResult::new(*f, FindingOutcome::NotApplicable))
                .collect();
            return report;
        }

        let mut graph = match self.build_graph(path, language, source) {
            Ok(graph) => graph,
            Err(e) => {
                warn!(file = %path.display(), error = %e, "file not analyzed");
                return report.with_failure(findings, e.to_string());
            }
        };

        for id in graph.unsupported() {
            let position = graph.position(*id);
            report.diagnostics.push(Diagnostic {
                kind: DiagnosticKind::UnsupportedConstruct,
                message: format!("no reader for `{}`", graph.node(*id).cst_kind),
                line: Some(position.line),
                column: Some(position.column),
            });
        }

        for finding in findings {
            let outcome = self.dispatcher.run(*finding, &mut graph, &self.evaluator);
            report.results.push(FindingResult::new(*finding, outcome));
        }
        debug!(
            file = %path.display(),
            nodes = graph.node_count(),
            edges = graph.edge_count(),
            "file analyzed"
        );
        report
    }

    /// Report for a file that could not be read.
    pub fn unreadable(
        &self,
        path: &Path,
        language: Language,
        findings: &[FindingId],
        message: String,
    ) -> FileReport {
        FileReport {
            path: path.to_path_buf(),
            language,
            content_hash: String::new(),
            results: Vec::new(),
            diagnostics: Vec::new(),
        }
        .with_failure(findings, message)
    }
}

impl FileReport {
    fn with_failure(mut self, findings: &[FindingId], message: String) -> Self {
        self.results = findings
            .iter()
            .map(|f| FindingResult {
                finding: *f,
                status: FindingStatus::Failed,
                matches: Vec::new(),
                error: Some(message.clone()),
            })
            .collect();
        self.diagnostics.push(Diagnostic {
            kind: DiagnosticKind::ParseFailure,
            message,
            line: None,
            column: None,
        });
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn hash_is_hex_sha256() {
        let hash = content_hash("");
        assert_eq!(
            hash,
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn unknown_language_is_not_applicable() {
        let engine = Engine::standard();
        let report = engine.analyze_source(
            Path::new("notes.txt"),
            Language::Unknown,
            "hello",
            &FindingId::ALL,
        );
        assert!(report
            .results
            .iter()
            .all(|r| r.status == FindingStatus::NotApplicable));
        assert!(report.diagnostics.is_empty());
    }

    #[cfg(feature = "javascript")]
    #[test]
    fn syntax_error_fails_every_finding() {
        let engine = Engine::standard();
        let report = engine.analyze_source(
            Path::new("bad.js"),
            Language::JavaScript,
            "function (",
            &[FindingId::F001, FindingId::F034],
        );
        assert_eq!(report.failed().count(), 2);
        assert_eq!(report.diagnostics[0].kind, DiagnosticKind::ParseFailure);
    }

    #[cfg(feature = "javascript")]
    #[test]
    fn reports_each_requested_finding() {
        let engine = Engine::standard();
        let report = engine.analyze_source(
            Path::new("app.js"),
            Language::JavaScript,
            "db.query(req.query.q);\nconst n = Math.random();\n",
            &[FindingId::F001, FindingId::F034, FindingId::F063],
        );
        assert_eq!(report.status(FindingId::F001), Some(FindingStatus::Vulnerable));
        assert_eq!(report.status(FindingId::F034), Some(FindingStatus::Vulnerable));
        assert_eq!(report.status(FindingId::F063), Some(FindingStatus::Safe));
        assert_eq!(report.status(FindingId::F052), None);
    }

    #[cfg(feature = "javascript")]
    #[test]
    fn configured_sink_is_honored() {
        let config: AnalysisConfig = toml::from_str(
            r#"
            [[rules]]
            finding = "F001"
            language = "javascript"
            sinks = ["*.runSql"]
            "#,
        )
        .unwrap();
        let engine = Engine::from_config(&config);
        let report = engine.analyze_source(
            Path::new("app.js"),
            Language::JavaScript,
            "repo.runSql(req.body.sql);\n",
            &[FindingId::F001],
        );
        assert_eq!(report.status(FindingId::F001), Some(FindingStatus::Vulnerable));
    }

    #[cfg(feature = "python")]
    #[test]
    fn definition_inside_match_reaches_sink() {
        let code = "match mode:\n    case 'a':\n        q = request.args['q']\ncursor.execute(q)\n";
        let report = Engine::standard().analyze_source(
            Path::new("app.py"),
            Language::Python,
            code,
            &[FindingId::F001],
        );
        assert_eq!(report.status(FindingId::F001), Some(FindingStatus::Vulnerable));
        assert!(report.diagnostics.is_empty(), "{:?}", report.diagnostics);
    }

    #[cfg(feature = "python")]
    #[test]
    fn definition_behind_placeholder_fails_the_finding() {
        let code = "match p:\n    case Point(x=q):\n        pass\ncursor.execute(q)\n";
        let report = Engine::standard().analyze_source(
            Path::new("app.py"),
            Language::Python,
            code,
            &[FindingId::F001],
        );
        assert_eq!(report.status(FindingId::F001), Some(FindingStatus::Failed));
        assert_eq!(report.diagnostics[0].kind, DiagnosticKind::UnsupportedConstruct);
    }
}
