//! F008: tainted data written into a response body or the DOM.

use super::{sink_scan, ALL_LANGUAGES};
use crate::error::Result;
use crate::eval::EvalSession;
use crate::rules::{Dispatcher, FindingId, Match};

pub(super) fn register(dispatcher: &mut Dispatcher) {
    dispatcher.register(FindingId::F008, ALL_LANGUAGES, scan);
}

fn scan(session: &mut EvalSession<'_>) -> Result<Vec<Match>> {
    sink_scan(session, "Cross-site scripting")
}

#[cfg(test)]
mod tests {
    use super::super::tests::{lines, run};
    use crate::ir::Language;
    use crate::rules::{FindingId, FindingOutcome};
    use pretty_assertions::assert_eq;

    #[cfg(feature = "javascript")]
    #[test]
    fn flags_reflected_query_parameter() {
        let code = "app.get('/', (req, res) => {\n  res.send('<p>' + req.query.name + '</p>');\n});\n";
        let outcome = run(FindingId::F008, Language::JavaScript, code);
        assert_eq!(lines(&outcome), vec![2]);
    }

    #[cfg(feature = "javascript")]
    #[test]
    fn escaped_output_is_safe() {
        let code = "app.get('/', (req, res) => {\n  res.send(escapeHtml(req.query.name));\n});\n";
        let outcome = run(FindingId::F008, Language::JavaScript, code);
        assert!(matches!(outcome, FindingOutcome::Safe));
    }

    #[cfg(feature = "javascript")]
    #[test]
    fn flags_inner_html_assignment() {
        let code = "const q = location.search;\nel.innerHTML = q;\n";
        let outcome = run(FindingId::F008, Language::JavaScript, code);
        assert_eq!(lines(&outcome), vec![2]);
    }

    #[cfg(feature = "python")]
    #[test]
    fn flags_flask_make_response() {
        let code = "name = request.args.get('name')\nreturn_value = make_response('Hello ' + name)\n";
        let outcome = run(FindingId::F008, Language::Python, code);
        assert_eq!(lines(&outcome), vec![2]);
    }
}
