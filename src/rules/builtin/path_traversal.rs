//! F063: tainted data used as a filesystem path.

use super::{sink_scan, ALL_LANGUAGES};
use crate::error::Result;
use crate::eval::EvalSession;
use crate::rules::{Dispatcher, FindingId, Match};

pub(super) fn register(dispatcher: &mut Dispatcher) {
    dispatcher.register(FindingId::F063, ALL_LANGUAGES, scan);
}

fn scan(session: &mut EvalSession<'_>) -> Result<Vec<Match>> {
    sink_scan(session, "Path traversal")
}

#[cfg(test)]
mod tests {
    use super::super::tests::{lines, run};
    use crate::ir::Language;
    use crate::rules::{FindingId, FindingOutcome};
    use pretty_assertions::assert_eq;

    #[cfg(feature = "javascript")]
    #[test]
    fn flags_read_of_request_path() {
        let code = "const file = req.params.file;\nfs.readFileSync('/data/' + file);\n";
        let outcome = run(FindingId::F063, Language::JavaScript, code);
        assert_eq!(lines(&outcome), vec![2]);
    }

    #[cfg(feature = "javascript")]
    #[test]
    fn basename_is_a_sanitizer() {
        let code = "const file = path.basename(req.params.file);\nfs.readFileSync('/data/' + file);\n";
        let outcome = run(FindingId::F063, Language::JavaScript, code);
        assert!(matches!(outcome, FindingOutcome::Safe));
    }

    #[cfg(feature = "python")]
    #[test]
    fn flags_open_in_view_function() {
        let code = "def download():\n    name = request.args['f']\n    return open('/srv/' + name).read()\n";
        let outcome = run(FindingId::F063, Language::Python, code);
        assert_eq!(lines(&outcome), vec![3]);
    }

    #[cfg(feature = "python")]
    #[test]
    fn reassigned_constant_is_safe() {
        let code = "name = request.args['f']\nname = 'index.html'\nopen(name)\n";
        let outcome = run(FindingId::F063, Language::Python, code);
        assert!(matches!(outcome, FindingOutcome::Safe));
    }
}
