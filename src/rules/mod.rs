pub mod builtin;
pub mod catalog;
pub mod finding;
pub mod policy;

use std::collections::BTreeMap;

use tracing::{debug, warn};

use crate::error::{AnalysisError, Result};
use crate::eval::{EvalSession, Evaluator};
use crate::ir::{Graph, Language};

pub use finding::{Finding, FindingId, FindingMetadata, Match, Severity};

/// Scans one graph for one finding. Any error fails the finding for the
/// file; it is never read as "no vulnerability".
pub type EntryPoint = fn(&mut EvalSession<'_>) -> Result<Vec<Match>>;

/// Result of running one finding on one file.
#[derive(Debug)]
pub enum FindingOutcome {
    Vulnerable(Vec<Match>),
    Safe,
    /// No entry point is registered for the file's language.
    NotApplicable,
    Failed(AnalysisError),
}

impl FindingOutcome {
    pub fn status(&self) -> &'static str {
        match self {
            Self::Vulnerable(_) => "vulnerable",
            Self::Safe => "safe",
            Self::NotApplicable => "not_applicable",
            Self::Failed(_) => "failed",
        }
    }

    pub fn matches(&self) -> &[Match] {
        match self {
            Self::Vulnerable(matches) => matches,
            _ => &[],
        }
    }
}

/// Finding to `(language, entry point)` table. Built once, then read-only.
#[derive(Clone, Default)]
pub struct Dispatcher {
    entries: BTreeMap<FindingId, Vec<(Language, EntryPoint)>>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Entry points for every built-in finding.
    pub fn standard() -> Self {
        let mut dispatcher = Self::new();
        builtin::register_entry_points(&mut dispatcher);
        dispatcher
    }

    pub fn register(
        &mut self,
        finding: FindingId,
        languages: &[Language],
        entry: EntryPoint,
    ) -> &mut Self {
        let list = self.entries.entry(finding).or_default();
        for language in languages {
            list.push((*language, entry));
        }
        self
    }

    /// First entry point registered for `language`.
    pub fn entry(&self, finding: FindingId, language: Language) -> Option<EntryPoint> {
        self.entries
            .get(&finding)?
            .iter()
            .find(|(l, _)| *l == language)
            .map(|(_, entry)| *entry)
    }

    pub fn findings(&self) -> impl Iterator<Item = FindingId> + '_ {
        self.entries.keys().copied()
    }

    pub fn languages(&self, finding: FindingId) -> Vec<Language> {
        let mut languages: Vec<Language> = self
            .entries
            .get(&finding)
            .map(|list| list.iter().map(|(l, _)| *l).collect())
            .unwrap_or_default();
        languages.sort_unstable();
        languages.dedup();
        languages
    }

    /// Run `finding` over `graph` in a fresh evaluation session.
    pub fn run(&self, finding: FindingId, graph: &mut Graph, evaluator: &Evaluator) -> FindingOutcome {
        let language = graph.language();
        let Some(entry) = self.entry(finding, language) else {
            return FindingOutcome::NotApplicable;
        };
        let mut session = evaluator.session(graph, finding);
        match entry(&mut session) {
            Ok(matches) if matches.is_empty() => FindingOutcome::Safe,
            Ok(matches) => {
                debug!(finding = %finding, count = matches.len(), "finding matched");
                FindingOutcome::Vulnerable(matches)
            }
            Err(e) => {
                warn!(
                    finding = %finding,
                    file = %session.graph().path().display(),
                    error = %e,
                    "finding failed"
                );
                FindingOutcome::Failed(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cfg::tests::with_cfg;

    fn no_matches(_session: &mut EvalSession<'_>) -> Result<Vec<Match>> {
        Ok(Vec::new())
    }

    fn always_fails(session: &mut EvalSession<'_>) -> Result<Vec<Match>> {
        let root = session
            .graph()
            .root()
            .ok_or_else(|| AnalysisError::Internal("no root".into()))?;
        Err(AnalysisError::MissingCase {
            node: root,
            label_type: crate::ir::LabelType::File,
        })
    }

    #[test]
    fn standard_table_covers_every_finding() {
        let dispatcher = Dispatcher::standard();
        for finding in FindingId::ALL {
            let languages = dispatcher.languages(finding);
            assert!(languages.contains(&Language::Python), "{finding}");
            assert!(languages.contains(&Language::JavaScript), "{finding}");
            assert!(languages.contains(&Language::TypeScript), "{finding}");
        }
    }

    #[cfg(feature = "python")]
    #[test]
    fn first_registered_entry_wins() {
        let mut dispatcher = Dispatcher::new();
        dispatcher
            .register(FindingId::F001, &[Language::Python], always_fails)
            .register(FindingId::F001, &[Language::Python], no_matches);
        let mut graph = with_cfg(Language::Python, "a.py", "x = 1\n");
        let outcome = dispatcher.run(FindingId::F001, &mut graph, &Evaluator::standard());
        assert!(matches!(outcome, FindingOutcome::Failed(_)));
        assert_eq!(outcome.status(), "failed");
    }

    #[cfg(feature = "python")]
    #[test]
    fn unregistered_language_is_not_applicable() {
        let mut dispatcher = Dispatcher::new();
        dispatcher.register(FindingId::F001, &[Language::JavaScript], no_matches);
        let mut graph = with_cfg(Language::Python, "a.py", "x = 1\n");
        let outcome = dispatcher.run(FindingId::F001, &mut graph, &Evaluator::standard());
        assert!(matches!(outcome, FindingOutcome::NotApplicable));
    }
}
