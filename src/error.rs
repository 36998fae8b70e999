use thiserror::Error;

use crate::ir::{LabelType, Language, NodeId};

pub type Result<T> = std::result::Result<T, AnalysisError>;

#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("Parse error in {file}: {message}")]
    Parse { file: String, message: String },

    #[error("Unsupported construct in {language}: no reader for `{kind}` at {line}:{column}")]
    UnsupportedConstruct {
        language: Language,
        kind: String,
        line: usize,
        column: usize,
    },

    #[error("Missing evaluation case: node {node} ({label_type}) has no rule")]
    MissingCase { node: NodeId, label_type: LabelType },

    #[error("Analysis aborted at node {node}: {limit} limit of {max} reached")]
    Aborted {
        node: NodeId,
        limit: &'static str,
        max: usize,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Output error: {0}")]
    Output(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AnalysisError {
    pub fn exit_code(&self) -> i32 {
        2
    }

    /// Errors that leave the analysis of a file/finding incomplete rather
    /// than breaking the whole run.
    pub fn is_capability_gap(&self) -> bool {
        matches!(
            self,
            Self::UnsupportedConstruct { .. } | Self::MissingCase { .. } | Self::Aborted { .. }
        )
    }
}
