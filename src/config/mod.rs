use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{AnalysisError, Result};
use crate::eval::{Limits, NamePattern};
use crate::rules::catalog::CatalogExtension;
use crate::rules::policy::Policy;
use crate::rules::FindingId;

/// Top-level configuration from `.taintgraph.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub policy: Policy,
    #[serde(default)]
    pub analysis: AnalysisConfig,
    #[serde(default)]
    pub scan: ScanConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    #[serde(default = "default_max_eval_steps")]
    pub max_eval_steps: usize,
    #[serde(default = "default_max_search_nodes")]
    pub max_search_nodes: usize,
    /// Findings to run; empty means all of them.
    #[serde(default)]
    pub findings: Vec<FindingId>,
    /// Additions to the built-in name catalog.
    #[serde(default)]
    pub rules: Vec<CatalogExtension>,
}

fn default_max_eval_steps() -> usize {
    Limits::default().max_eval_steps
}

fn default_max_search_nodes() -> usize {
    Limits::default().max_search_nodes
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            max_eval_steps: default_max_eval_steps(),
            max_search_nodes: default_max_search_nodes(),
            findings: Vec::new(),
            rules: Vec::new(),
        }
    }
}

impl AnalysisConfig {
    pub fn limits(&self) -> Limits {
        Limits {
            max_eval_steps: self.max_eval_steps,
            max_search_nodes: self.max_search_nodes,
        }
    }

    /// Findings selected for the run, in catalog order.
    pub fn selected_findings(&self) -> Vec<FindingId> {
        if self.findings.is_empty() {
            FindingId::ALL.to_vec()
        } else {
            FindingId::ALL
                .into_iter()
                .filter(|f| self.findings.contains(f))
                .collect()
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanConfig {
    /// Glob patterns, relative to the scan root, of paths to skip.
    #[serde(default)]
    pub exclude: Vec<String>,
    /// Files larger than this many bytes are skipped.
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,
}

fn default_max_file_size() -> u64 {
    1024 * 1024
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            exclude: Vec::new(),
            max_file_size: default_max_file_size(),
        }
    }
}

impl Config {
    /// Load config from a TOML file. Returns default if file doesn't exist.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.analysis.max_eval_steps == 0 || self.analysis.max_search_nodes == 0 {
            return Err(AnalysisError::Config(
                "analysis limits must be greater than zero".into(),
            ));
        }
        for pattern in &self.scan.exclude {
            glob::Pattern::new(pattern).map_err(|e| {
                AnalysisError::Config(format!("invalid exclude pattern '{pattern}': {e}"))
            })?;
        }
        for rule in &self.analysis.rules {
            for name in rule.patterns() {
                NamePattern::validate(name).map_err(|e| {
                    AnalysisError::Config(format!("invalid {} pattern '{name}': {e}", rule.finding))
                })?;
            }
        }
        Ok(())
    }

    /// Generate a starter config file.
    pub fn starter_toml() -> &'static str {
        r#"# taintgraph configuration

[policy]
# Minimum severity to fail the scan (info, low, medium, high, critical).
fail_on = "high"

# Findings to ignore entirely.
# ignore_findings = ["F034"]

# Fail the scan when a finding could not be analyzed for some file.
fail_on_error = true

# Per-finding severity overrides.
# [policy.overrides]
# F052 = "low"

[analysis]
max_eval_steps = 200000
max_search_nodes = 50000

# Run only these findings (default: all).
# findings = ["F001", "F004"]

# Extra names for the built-in catalog. Patterns: `name` exact,
# `*.suffix`, `prefix.*`, `*contains*`, `re:<regex>`; prefix with `i:` to
# ignore case.
# [[analysis.rules]]
# finding = "F001"
# language = "javascript"
# sinks = ["*.unsafeQuery"]
# sanitizers = ["sqlEscape"]

[scan]
exclude = ["node_modules/**", "**/*.min.js", "dist/**"]
max_file_size = 1048576
"#
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::Language;
    use pretty_assertions::assert_eq;

    #[test]
    fn starter_config_parses() {
        let config: Config = toml::from_str(Config::starter_toml()).unwrap();
        config.validate().unwrap();
        assert_eq!(config.analysis.limits(), Limits::default());
        assert_eq!(config.analysis.selected_findings(), FindingId::ALL.to_vec());
        assert_eq!(config.scan.exclude.len(), 3);
    }

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(&dir.path().join(".taintgraph.toml")).unwrap();
        assert!(config.policy.fail_on_error);
        assert_eq!(config.scan.max_file_size, 1024 * 1024);
    }

    #[test]
    fn reads_catalog_extensions_and_subset() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".taintgraph.toml");
        std::fs::write(
            &path,
            r#"
[analysis]
findings = ["F004", "F001"]

[[analysis.rules]]
finding = "F001"
language = "python"
sinks = ["*.run_sql"]
"#,
        )
        .unwrap();
        let config = Config::load(&path).unwrap();
        assert_eq!(
            config.analysis.selected_findings(),
            vec![FindingId::F001, FindingId::F004]
        );
        assert_eq!(config.analysis.rules[0].language, Language::Python);
        assert_eq!(config.analysis.rules[0].sinks, vec!["*.run_sql".to_string()]);
    }

    #[test]
    fn rejects_bad_exclude_pattern() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".taintgraph.toml");
        std::fs::write(&path, "[scan]\nexclude = [\"a/[\"]\n").unwrap();
        assert!(matches!(Config::load(&path), Err(AnalysisError::Config(_))));
    }

    #[test]
    fn rejects_bad_regex_pattern() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".taintgraph.toml");
        std::fs::write(
            &path,
            "[[analysis.rules]]\nfinding = \"F001\"\nlanguage = \"python\"\nsinks = [\"re:(\"]\n",
        )
        .unwrap();
        assert!(matches!(Config::load(&path), Err(AnalysisError::Config(_))));
    }

    #[test]
    fn rejects_bad_weak_curve_pattern() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".taintgraph.toml");
        std::fs::write(
            &path,
            "[[analysis.rules]]\nfinding = \"F052\"\nlanguage = \"javascript\"\nweak_curves = [\"i:re:secp[\"]\n",
        )
        .unwrap();
        assert!(matches!(Config::load(&path), Err(AnalysisError::Config(_))));
    }
}
