use serde::{Deserialize, Serialize};

use crate::ir::{NodeId, SourceLocation};

/// Vulnerability classes the engine can detect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum FindingId {
    /// SQL injection.
    F001,
    /// OS command injection.
    F004,
    /// Reflected cross-site scripting.
    F008,
    /// Insecure randomness.
    F034,
    /// Insecure cryptography.
    F052,
    /// Path traversal.
    F063,
}

impl FindingId {
    pub const ALL: [FindingId; 6] = [
        Self::F001,
        Self::F004,
        Self::F008,
        Self::F034,
        Self::F052,
        Self::F063,
    ];

    pub fn code(self) -> &'static str {
        match self {
            Self::F001 => "F001",
            Self::F004 => "F004",
            Self::F008 => "F008",
            Self::F034 => "F034",
            Self::F052 => "F052",
            Self::F063 => "F063",
        }
    }

    pub fn from_str_lenient(s: &str) -> Option<Self> {
        let upper = s.trim().to_uppercase();
        Self::ALL.into_iter().find(|f| f.code() == upper)
    }

    pub fn metadata(self) -> FindingMetadata {
        let (title, description, cwe_id, default_severity, remediation) = match self {
            Self::F001 => (
                "SQL injection",
                "User-controlled data reaches a SQL query without being parameterized",
                "CWE-89",
                Severity::Critical,
                "Use parameterized queries or prepared statements instead of building SQL strings.",
            ),
            Self::F004 => (
                "OS command injection",
                "User-controlled data reaches a shell or process execution call",
                "CWE-78",
                Severity::Critical,
                "Pass arguments as a list without a shell, or validate them against an allowlist.",
            ),
            Self::F008 => (
                "Reflected cross-site scripting",
                "User-controlled data is written into an HTTP response or the DOM without encoding",
                "CWE-79",
                Severity::High,
                "Encode output for its context or use a template engine with auto-escaping.",
            ),
            Self::F034 => (
                "Insecure randomness",
                "A non-cryptographic random number generator is used",
                "CWE-338",
                Severity::Medium,
                "Use a cryptographically secure generator such as crypto.randomBytes or secrets.",
            ),
            Self::F052 => (
                "Insecure cryptography",
                "A broken or weak cryptographic algorithm or key size is used",
                "CWE-327",
                Severity::Medium,
                "Use SHA-256 or stronger hashes, AES-GCM ciphers and keys of at least 2048 bits.",
            ),
            Self::F063 => (
                "Path traversal",
                "User-controlled data is used to build a filesystem path",
                "CWE-22",
                Severity::High,
                "Resolve the path and check it stays inside an allowed base directory.",
            ),
        };
        FindingMetadata {
            id: self,
            title: title.into(),
            description: description.into(),
            cwe_id: cwe_id.into(),
            default_severity,
            remediation: remediation.into(),
        }
    }
}

impl std::fmt::Display for FindingId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn from_str_lenient(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "info" => Some(Self::Info),
            "low" => Some(Self::Low),
            "medium" | "med" => Some(Self::Medium),
            "high" => Some(Self::High),
            "critical" | "crit" => Some(Self::Critical),
            _ => None,
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Info => write!(f, "info"),
            Self::Low => write!(f, "low"),
            Self::Medium => write!(f, "medium"),
            Self::High => write!(f, "high"),
            Self::Critical => write!(f, "critical"),
        }
    }
}

/// Static description of a finding, used for `list-findings` and reports.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FindingMetadata {
    pub id: FindingId,
    pub title: String,
    pub description: String,
    pub cwe_id: String,
    pub default_severity: Severity,
    pub remediation: String,
}

/// One vulnerable location produced by an entry point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Match {
    #[serde(skip)]
    pub node: NodeId,
    pub line: usize,
    pub column: usize,
    pub description: String,
}

/// A match resolved against a file and the effective policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Finding {
    pub finding: FindingId,
    pub title: String,
    pub severity: Severity,
    pub message: String,
    pub location: SourceLocation,
    pub cwe_id: String,
    pub remediation: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_round_trip_leniently() {
        for id in FindingId::ALL {
            assert_eq!(FindingId::from_str_lenient(&id.code().to_lowercase()), Some(id));
        }
        assert_eq!(FindingId::from_str_lenient("F999"), None);
    }

    #[test]
    fn severities_are_ordered() {
        assert!(Severity::Critical > Severity::High);
        assert!(Severity::Info < Severity::Low);
        assert_eq!(Severity::from_str_lenient("MED"), Some(Severity::Medium));
    }
}
